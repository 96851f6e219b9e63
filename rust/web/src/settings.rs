use std::time::Duration;

use thiserror::Error;
use tourney_engine::game::EngineConfig;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_RETENTION_SECONDS: u64 = 3_600;
pub const DEFAULT_ARENA_TICK_MS: u64 = 50;
pub const DEFAULT_CHESS_CLOCK_SECONDS: u64 = 300;

/// Process configuration, read once from the environment at startup and
/// injected into the components that need it. Nothing is persisted.
#[derive(Debug, Clone)]
pub struct Settings {
    pub listen_addr: String,
    pub signer_url: Option<String>,
    pub contract_relay_url: Option<String>,
    pub session_retention: Duration,
    pub arena_tick_ms: u64,
    pub chess_clock_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            signer_url: None,
            contract_relay_url: None,
            session_retention: Duration::from_secs(DEFAULT_RETENTION_SECONDS),
            arena_tick_ms: DEFAULT_ARENA_TICK_MS,
            chess_clock_ms: DEFAULT_CHESS_CLOCK_SECONDS * 1_000,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        let mut settings = Settings::default();

        if let Ok(addr) = std::env::var("LISTEN_ADDR") {
            settings.listen_addr = addr;
        }
        if let Ok(url) = std::env::var("SIGNER_URL") {
            if !url.is_empty() {
                settings.signer_url = Some(url);
            }
        }
        if let Ok(url) = std::env::var("CONTRACT_RELAY_URL") {
            if !url.is_empty() {
                settings.contract_relay_url = Some(url);
            }
        }
        if let Ok(raw) = std::env::var("SESSION_RETENTION_SECONDS") {
            settings.session_retention = Duration::from_secs(parse_env("SESSION_RETENTION_SECONDS", &raw)?);
        }
        if let Ok(raw) = std::env::var("ARENA_TICK_MS") {
            settings.arena_tick_ms = parse_env("ARENA_TICK_MS", &raw)?;
        }
        if let Ok(raw) = std::env::var("CHESS_CLOCK_SECONDS") {
            settings.chess_clock_ms = parse_env::<u64>("CHESS_CLOCK_SECONDS", &raw)? * 1_000;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Loopback on an ephemeral port, no external services.
    pub fn for_tests() -> Self {
        Self {
            listen_addr: "127.0.0.1:0".to_string(),
            ..Settings::default()
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.listen_addr.is_empty() {
            return Err(SettingsError::Invalid(
                "LISTEN_ADDR must not be empty".to_string(),
            ));
        }
        if !(10..=1_000).contains(&self.arena_tick_ms) {
            return Err(SettingsError::Invalid(format!(
                "ARENA_TICK_MS must be within 10..=1000, got {}",
                self.arena_tick_ms
            )));
        }
        if self.chess_clock_ms == 0 {
            return Err(SettingsError::Invalid(
                "CHESS_CLOCK_SECONDS must be greater than 0".to_string(),
            ));
        }
        if self.session_retention.is_zero() {
            return Err(SettingsError::Invalid(
                "SESSION_RETENTION_SECONDS must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            arena_tick_ms: self.arena_tick_ms,
            chess_clock_ms: self.chess_clock_ms,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, SettingsError> {
    raw.parse()
        .map_err(|_| SettingsError::Invalid(format!("{name} has invalid value {raw:?}")))
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Settings::default().validate().is_ok());
        assert!(Settings::for_tests().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_band_tick() {
        let settings = Settings {
            arena_tick_ms: 5,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            arena_tick_ms: 5_000,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_zero_clock_and_retention() {
        let settings = Settings {
            chess_clock_ms: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            session_retention: Duration::ZERO,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn engine_config_carries_the_tuning() {
        let settings = Settings {
            arena_tick_ms: 100,
            chess_clock_ms: 60_000,
            ..Settings::default()
        };
        let config = settings.engine_config();
        assert_eq!(config.arena_tick_ms, 100);
        assert_eq!(config.chess_clock_ms, 60_000);
    }
}
