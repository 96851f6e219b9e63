//! Endpoint bodies for the session API. The surface follows the hub's
//! flat path names (`/chess_move`, `/join_arena_session`, ...); one
//! segment parser routes them all onto the registry, so adding a game
//! variant never adds a route table.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

use tourney_engine::chess::PromotionPiece;
use tourney_engine::game::{GameKind, MovePayload};

use crate::errors::IntoErrorResponse;
use crate::registry::{RegistryError, SessionRegistry};

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    #[serde(rename = "tournamentId")]
    pub tournament_id: String,
    pub game_type: String,
    #[serde(rename = "playerAddresses", default)]
    pub player_addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostRoute {
    Join(GameKind),
    StartGame(GameKind),
    Move(GameKind),
    SubmitScore(GameKind),
    ChessEmoji,
}

/// `join_<kind>_session`, `start_<kind>_game`, `<kind>_move`,
/// `submit_<kind>_score`, `chess_emoji`.
pub fn parse_post_segment(segment: &str) -> Option<PostRoute> {
    if segment == "chess_emoji" {
        return Some(PostRoute::ChessEmoji);
    }
    if let Some(kind) = segment
        .strip_prefix("join_")
        .and_then(|rest| rest.strip_suffix("_session"))
        .and_then(GameKind::parse)
    {
        return Some(PostRoute::Join(kind));
    }
    if let Some(kind) = segment
        .strip_prefix("start_")
        .and_then(|rest| rest.strip_suffix("_game"))
        .and_then(GameKind::parse)
    {
        return Some(PostRoute::StartGame(kind));
    }
    if let Some(kind) = segment
        .strip_prefix("submit_")
        .and_then(|rest| rest.strip_suffix("_score"))
        .and_then(GameKind::parse)
    {
        return Some(PostRoute::SubmitScore(kind));
    }
    if let Some(kind) = segment.strip_suffix("_move").and_then(GameKind::parse) {
        return Some(PostRoute::Move(kind));
    }
    None
}

/// `<kind>_game_state`.
pub fn parse_get_segment(segment: &str) -> Option<GameKind> {
    segment
        .strip_suffix("_game_state")
        .and_then(GameKind::parse)
}

/// `POST /start_session` - idempotent per tournament.
pub async fn start_session(registry: Arc<SessionRegistry>, body: Value) -> Response {
    let request: StartSessionRequest = match serde_json::from_value(body) {
        Ok(request) => request,
        Err(err) => return malformed(format!("start_session body: {err}")),
    };
    let Some(kind) = GameKind::parse(&request.game_type) else {
        return malformed(format!("unknown game_type {:?}", request.game_type));
    };
    match registry.create_or_get(&request.tournament_id, kind, &request.player_addresses) {
        Ok(session_id) => json_with(
            StatusCode::CREATED,
            &serde_json::json!({ "session_id": session_id }),
        ),
        Err(err) => err.into_http_response(),
    }
}

/// `GET /get_tournament_session?tournamentId=`.
pub async fn get_tournament_session(
    registry: Arc<SessionRegistry>,
    query: HashMap<String, String>,
) -> Response {
    let Some(tournament_id) = query.get("tournamentId") else {
        return malformed("missing tournamentId".to_string());
    };
    match registry.tournament_session(tournament_id) {
        Ok(session_id) => json_with(
            StatusCode::OK,
            &serde_json::json!({ "session_id": session_id }),
        ),
        Err(err) => err.into_http_response(),
    }
}

/// `GET /get_session_info?session_id=`.
pub async fn get_session_info(
    registry: Arc<SessionRegistry>,
    query: HashMap<String, String>,
) -> Response {
    let Some(session_id) = query.get("session_id") else {
        return malformed("missing session_id".to_string());
    };
    match registry.session_info(session_id) {
        Ok(info) => json_with(StatusCode::OK, &info),
        Err(err) => err.into_http_response(),
    }
}

/// Dynamic GET dispatch: `/<kind>_game_state?sessionId=`.
pub async fn dispatch_get(
    segment: String,
    query: HashMap<String, String>,
    registry: Arc<SessionRegistry>,
) -> Response {
    let Some(kind) = parse_get_segment(&segment) else {
        return not_found(&segment);
    };
    let Some(session_id) = query.get("sessionId") else {
        return malformed("missing sessionId".to_string());
    };
    match registry.view(session_id, Some(kind)) {
        Ok(view) => json_with(StatusCode::OK, &view),
        Err(err) => err.into_http_response(),
    }
}

/// Dynamic POST dispatch for the flat per-kind endpoints.
pub async fn dispatch_post(
    segment: String,
    query: HashMap<String, String>,
    body: Value,
    registry: Arc<SessionRegistry>,
) -> Response {
    let Some(route) = parse_post_segment(&segment) else {
        return not_found(&segment);
    };
    let result = match route {
        PostRoute::Join(kind) => handle_join(&registry, kind, &query, &body),
        PostRoute::StartGame(kind) => handle_start_game(&registry, kind, &body),
        PostRoute::Move(kind) => handle_move(&registry, kind, &body),
        PostRoute::SubmitScore(kind) => handle_submit_score(&registry, kind, &body),
        PostRoute::ChessEmoji => handle_emoji(&registry, &body),
    };
    match result {
        Ok(response) => response,
        Err(err) => err.into_http_response(),
    }
}

fn handle_join(
    registry: &Arc<SessionRegistry>,
    kind: GameKind,
    query: &HashMap<String, String>,
    body: &Value,
) -> Result<Response, RegistryError> {
    let session_id = field(query, body, "sessionId")?;
    let player = field(query, body, "player")?;
    registry.join(&session_id, kind, &player)?;
    Ok(json_with(
        StatusCode::OK,
        &serde_json::json!({ "session_id": session_id, "player": player }),
    ))
}

fn handle_start_game(
    registry: &Arc<SessionRegistry>,
    kind: GameKind,
    body: &Value,
) -> Result<Response, RegistryError> {
    let session_id = body_str(body, "sessionId")?;
    registry.start(&session_id, kind)?;
    Ok(json_with(
        StatusCode::OK,
        &serde_json::json!({ "session_id": session_id, "lifecycle": "running" }),
    ))
}

fn handle_move(
    registry: &Arc<SessionRegistry>,
    kind: GameKind,
    body: &Value,
) -> Result<Response, RegistryError> {
    let session_id = body_str(body, "sessionId")?;
    let player = body_str(body, "player")?;
    let payload = parse_move_payload(kind, body)?;
    let view = registry.apply_move(&session_id, kind, &player, &payload)?;
    Ok(json_with(StatusCode::OK, &view))
}

fn handle_submit_score(
    registry: &Arc<SessionRegistry>,
    kind: GameKind,
    body: &Value,
) -> Result<Response, RegistryError> {
    let session_id = body_str(body, "sessionId")?;
    let player = body_str(body, "player")?;
    let score = body_u32(body, "score")?;
    let authoritative = registry.submit_score(&session_id, kind, &player, score)?;
    Ok(json_with(
        StatusCode::OK,
        &serde_json::json!({ "player": player, "score": authoritative }),
    ))
}

fn handle_emoji(registry: &Arc<SessionRegistry>, body: &Value) -> Result<Response, RegistryError> {
    let session_id = body_str(body, "sessionId")?;
    let player = body_str(body, "player")?;
    let emoji = body_str(body, "emoji")?;
    registry.send_emoji(&session_id, &player, &emoji)?;
    Ok(json_with(StatusCode::OK, &serde_json::json!({ "ok": true })))
}

/// Per-kind move payload shapes, straight from the wire contract.
fn parse_move_payload(kind: GameKind, body: &Value) -> Result<MovePayload, RegistryError> {
    #[derive(Deserialize)]
    struct AimBody {
        x: f64,
        y: f64,
    }
    #[derive(Deserialize)]
    struct PieceBody {
        from: String,
        to: String,
        promotion: Option<PromotionPiece>,
    }
    #[derive(Deserialize)]
    struct DropBody {
        column: usize,
    }
    #[derive(Deserialize)]
    struct MarkBody {
        cell: usize,
    }
    #[derive(Deserialize)]
    struct PairBody {
        first: usize,
        second: usize,
    }
    #[derive(Deserialize)]
    struct SteerBody {
        ax: f64,
        ay: f64,
        #[serde(default)]
        dash: bool,
    }

    let payload = match kind {
        GameKind::Arena => {
            let AimBody { x, y } = from_body(kind, body)?;
            MovePayload::Aim { x, y }
        }
        GameKind::Chess => {
            let PieceBody {
                from,
                to,
                promotion,
            } = from_body(kind, body)?;
            MovePayload::Piece {
                from,
                to,
                promotion,
            }
        }
        GameKind::ConnectFour => {
            let DropBody { column } = from_body(kind, body)?;
            MovePayload::Drop { column }
        }
        GameKind::TicTacToe => {
            let MarkBody { cell } = from_body(kind, body)?;
            MovePayload::Mark { cell }
        }
        GameKind::TileMatch => {
            let PairBody { first, second } = from_body(kind, body)?;
            MovePayload::Pair { first, second }
        }
        GameKind::Arcade => {
            let SteerBody { ax, ay, dash } = from_body(kind, body)?;
            MovePayload::Steer { ax, ay, dash }
        }
    };
    Ok(payload)
}

fn from_body<T: serde::de::DeserializeOwned>(
    kind: GameKind,
    body: &Value,
) -> Result<T, RegistryError> {
    serde_json::from_value(body.clone())
        .map_err(|err| RegistryError::MalformedPayload(format!("{kind} move: {err}")))
}

fn field(
    query: &HashMap<String, String>,
    body: &Value,
    key: &str,
) -> Result<String, RegistryError> {
    if let Some(value) = query.get(key) {
        if !value.is_empty() {
            return Ok(value.clone());
        }
    }
    body_str(body, key)
}

fn body_str(body: &Value, key: &str) -> Result<String, RegistryError> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RegistryError::MalformedPayload(format!("missing {key}")))
}

fn body_u32(body: &Value, key: &str) -> Result<u32, RegistryError> {
    body.get(key)
        .and_then(Value::as_u64)
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| RegistryError::MalformedPayload(format!("missing or invalid {key}")))
}

fn json_with<T: serde::Serialize>(status: StatusCode, body: &T) -> Response {
    reply::with_status(reply::json(body), status).into_response()
}

fn malformed(detail: String) -> Response {
    RegistryError::MalformedPayload(detail).into_http_response()
}

fn not_found(segment: &str) -> Response {
    crate::errors::ErrorBody::new(format!("no such endpoint: /{segment}"))
        .into_response(StatusCode::NOT_FOUND)
}
