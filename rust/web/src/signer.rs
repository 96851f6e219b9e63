//! Result builder and signer client. When a session ends the podium is
//! packed into a canonical byte payload, signed by the external signing
//! service, and forwarded to the contract relay. Signing happens on a
//! snapshot, never under a session lock; the relay submission is
//! fire-and-forget.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tourney_engine::game::GameKind;
use tourney_engine::seat::PlayerId;

use crate::settings::Settings;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 250;

/// The tuple the contract consumes, in its fixed field order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPayload {
    pub tournament_id: String,
    pub podium: Vec<PlayerId>,
    pub game_kind: GameKind,
    pub session_id: String,
}

impl ResultPayload {
    /// Canonical encoding: fields in declaration order, each
    /// length-prefixed (u32 BE; u16 BE count for the podium). Addresses go
    /// in as raw bytes - hex-decoded when 0x-prefixed, UTF-8 otherwise -
    /// so the same ranking always signs to the same bytes.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        push_field(&mut out, self.tournament_id.as_bytes());

        let count = self.podium.len().min(u16::MAX as usize) as u16;
        out.extend_from_slice(&count.to_be_bytes());
        for player in &self.podium {
            push_field(&mut out, &address_bytes(player));
        }

        push_field(&mut out, self.game_kind.as_str().as_bytes());
        push_field(&mut out, self.session_id.as_bytes());
        out
    }
}

fn push_field(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

/// Addresses are opaque everywhere else in the core; this is the single
/// place that converts them to the contract's byte form.
fn address_bytes(player: &str) -> Vec<u8> {
    if let Some(hex_part) = player.strip_prefix("0x") {
        if let Ok(bytes) = hex::decode(hex_part) {
            return bytes;
        }
    }
    player.as_bytes().to_vec()
}

#[derive(Debug, Serialize)]
struct SignRequest<'a> {
    payload: &'a str,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    signature: String,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    payload: &'a str,
    signature: &'a str,
}

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("no signer configured")]
    NotConfigured,
    #[error("signer rejected the payload with status {0}")]
    Rejected(u16),
    #[error("signer returned a malformed response: {0}")]
    BadResponse(String),
    #[error("signer unreachable after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// Shared outbound client; safe for concurrent use across sessions.
#[derive(Debug, Clone)]
pub struct SignerClient {
    http: reqwest::Client,
    signer_url: Option<String>,
    relay_url: Option<String>,
}

impl SignerClient {
    pub fn new(settings: &Settings) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            signer_url: settings.signer_url.clone(),
            relay_url: settings.contract_relay_url.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.signer_url.is_some()
    }

    /// Sign the canonical payload. Transient failures (timeouts, 5xx) are
    /// retried with exponential backoff; a 4xx is final.
    pub async fn sign(&self, payload: &ResultPayload) -> Result<Vec<u8>, SignerError> {
        let base = self.signer_url.as_deref().ok_or(SignerError::NotConfigured)?;
        let url = format!("{}/sign", base.trim_end_matches('/'));
        let encoded = hex::encode(payload.canonical_bytes());

        let mut last_error = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                let backoff = BACKOFF_BASE_MS * (1 << (attempt - 2));
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let outcome = self
                .http
                .post(&url)
                .json(&SignRequest { payload: &encoded })
                .send()
                .await;

            match outcome {
                Ok(response) if response.status().is_success() => {
                    let body: SignResponse = response
                        .json()
                        .await
                        .map_err(|err| SignerError::BadResponse(err.to_string()))?;
                    let signature = hex::decode(body.signature.trim_start_matches("0x"))
                        .map_err(|err| SignerError::BadResponse(err.to_string()))?;
                    return Ok(signature);
                }
                Ok(response) if response.status().is_client_error() => {
                    return Err(SignerError::Rejected(response.status().as_u16()));
                }
                Ok(response) => {
                    last_error = format!("status {}", response.status());
                }
                Err(err) => {
                    last_error = err.to_string();
                }
            }
            tracing::warn!(
                session_id = %payload.session_id,
                attempt,
                error = %last_error,
                "signer call failed, will retry"
            );
        }

        Err(SignerError::Exhausted {
            attempts: MAX_ATTEMPTS,
            last: last_error,
        })
    }

    /// Hand the signed ranking to the contract relay. Errors are logged,
    /// never surfaced: pollers observe completion through `get_result`.
    pub async fn submit(&self, payload: &ResultPayload, signature: &[u8]) -> bool {
        let Some(base) = self.relay_url.as_deref() else {
            return false;
        };
        let url = format!("{}/submit_results", base.trim_end_matches('/'));
        let encoded = hex::encode(payload.canonical_bytes());
        let signature = hex::encode(signature);

        match self
            .http
            .post(&url)
            .json(&SubmitRequest {
                payload: &encoded,
                signature: &signature,
            })
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                tracing::info!(
                    session_id = %payload.session_id,
                    tournament_id = %payload.tournament_id,
                    "results submitted to contract relay"
                );
                true
            }
            Ok(response) => {
                tracing::error!(
                    session_id = %payload.session_id,
                    status = %response.status(),
                    "contract relay rejected the submission"
                );
                false
            }
            Err(err) => {
                tracing::error!(
                    session_id = %payload.session_id,
                    error = %err,
                    "contract relay unreachable"
                );
                false
            }
        }
    }
}
