//! Session registry: owns every live session, routes external operations
//! to the engines under each session's lock, drives bots through the
//! scheduler and hands finished sessions to the signer pipeline.
//!
//! Concurrency model: many sessions run in parallel; within one session
//! every mutation is serialised by the session's mutex. The registry maps
//! are read-mostly `RwLock`s. Scheduler callbacks hold a weak registry
//! reference and re-acquire the session by id on each dispatch; nothing
//! holds a session lock across signer I/O.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use warp::http::StatusCode;

use tourney_ai::{driver_for, think_delay_ms, BotDriver};
use tourney_engine::arcade;
use tourney_engine::arena;
use tourney_engine::errors::EngineError;
use tourney_engine::game::{GameKind, GameState, GameView, MovePayload};
use tourney_engine::rng::SessionRng;
use tourney_engine::seat::{assign_seats, PlayerId, Seat};
use tourney_engine::tile_match;

use crate::errors::IntoErrorResponse;
use crate::events::{EventKind, Notifier};
use crate::scheduler::Scheduler;
use crate::settings::Settings;
use crate::signer::{ResultPayload, SignerClient, SignerError};

pub type SessionId = String;

const CHESS_CLOCK_POLL: Duration = Duration::from_millis(250);
const TILE_COUNTDOWN_POLL: Duration = Duration::from_millis(500);
const TILE_BOT_PERIOD: Duration = Duration::from_millis(1_500);
const GC_SWEEP_PERIOD: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Created,
    Running,
    Ending,
    Ended,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResult {
    pub podium: Vec<PlayerId>,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_payload: Option<String>,
    pub submitted: bool,
}

/// Full read projection served to pollers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub tournament_id: String,
    pub lifecycle: Lifecycle,
    pub seats: Vec<Seat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tick_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SessionResult>,
    /// Operator-visible note when the session ended degraded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    #[serde(flatten)]
    pub state: GameView,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub game_type: GameKind,
    pub players: Vec<PlayerId>,
    pub lifecycle: Lifecycle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SessionResult>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("session not found: {0}")]
    UnknownSession(SessionId),
    #[error("no active session for tournament {0}")]
    UnknownTournament(String),
    #[error("player {0} is not seated in this session")]
    UnknownPlayer(String),
    #[error("session is closed to joins")]
    SessionClosedToJoins,
    #[error("session is not running")]
    NotRunning,
    #[error("expected a {expected} session, found {actual}")]
    WrongGameKind { expected: GameKind, actual: GameKind },
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("session storage poisoned")]
    StoragePoisoned,
}

impl IntoErrorResponse for RegistryError {
    fn status_code(&self) -> StatusCode {
        match self {
            RegistryError::UnknownSession(_) | RegistryError::UnknownTournament(_) => {
                StatusCode::NOT_FOUND
            }
            RegistryError::Engine(EngineError::SessionEnded) => StatusCode::CONFLICT,
            RegistryError::Engine(EngineError::InvariantViolation(_))
            | RegistryError::StoragePoisoned => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn detail(&self) -> String {
        self.to_string()
    }
}

struct SessionInner {
    lifecycle: Lifecycle,
    seats: Vec<Seat>,
    engine: GameState,
    rng: SessionRng,
    /// Origin of the session's monotonic clock; reset when the game starts
    /// so engine timestamps are milliseconds from game start.
    epoch: Instant,
    last_tick_at_ms: Option<u64>,
    ends_at_ms: Option<u64>,
    last_read: Instant,
    result: Option<SessionResult>,
    diagnostic: Option<String>,
    bot_move_scheduled: bool,
}

pub struct GameSession {
    id: SessionId,
    tournament_id: String,
    kind: GameKind,
    bot: Box<dyn BotDriver>,
    inner: Mutex<SessionInner>,
}

impl std::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("id", &self.id)
            .field("tournament_id", &self.tournament_id)
            .field("kind", &self.kind)
            .field("bot", &self.bot.name())
            .finish()
    }
}

impl GameSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> GameKind {
        self.kind
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, SessionInner>, RegistryError> {
        self.inner.lock().map_err(|_| RegistryError::StoragePoisoned)
    }
}

fn now_ms(inner: &SessionInner) -> u64 {
    inner.epoch.elapsed().as_millis() as u64
}

fn game_deadline_ms(kind: GameKind) -> Option<u64> {
    match kind {
        GameKind::Arena => Some(arena::MAX_DURATION_MS),
        GameKind::Arcade => Some(arcade::MAX_DURATION_MS),
        GameKind::TileMatch => Some(tile_match::MATCH_DURATION_MS),
        _ => None,
    }
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<GameSession>>>,
    tournaments: RwLock<HashMap<String, SessionId>>,
    scheduler: Arc<Scheduler>,
    notifier: Arc<Notifier>,
    signer: Arc<SignerClient>,
    settings: Settings,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.active_sessions().len())
            .finish()
    }
}

impl SessionRegistry {
    pub fn new(
        settings: Settings,
        scheduler: Arc<Scheduler>,
        notifier: Arc<Notifier>,
        signer: Arc<SignerClient>,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            tournaments: RwLock::new(HashMap::new()),
            scheduler,
            notifier,
            signer,
            settings,
        })
    }

    /// Idempotent session creation: one active session per tournament. A
    /// second call for the same tournament returns the existing id while
    /// it is still `Created` or `Running`.
    pub fn create_or_get(
        self: &Arc<Self>,
        tournament_id: &str,
        kind: GameKind,
        players: &[PlayerId],
    ) -> Result<SessionId, RegistryError> {
        if let Some(existing) = self.active_session_for(tournament_id)? {
            return Ok(existing);
        }

        let id = Uuid::new_v4().to_string();
        let seats = assign_seats(kind, players);
        let mut rng = SessionRng::from_seed(SessionRng::seed_for_tournament(tournament_id));
        let engine = GameState::new(kind, &seats, &self.settings.engine_config(), &mut rng);
        let now = Instant::now();

        let session = Arc::new(GameSession {
            id: id.clone(),
            tournament_id: tournament_id.to_string(),
            kind,
            bot: driver_for(kind),
            inner: Mutex::new(SessionInner {
                lifecycle: Lifecycle::Created,
                seats: seats.clone(),
                engine,
                rng,
                epoch: now,
                last_tick_at_ms: None,
                ends_at_ms: None,
                last_read: now,
                result: None,
                diagnostic: None,
                bot_move_scheduled: false,
            }),
        });

        {
            let mut tournaments = self
                .tournaments
                .write()
                .map_err(|_| RegistryError::StoragePoisoned)?;
            // Lost the race: another request created it first
            if let Some(existing) = tournaments.get(tournament_id) {
                if let Some(winner) = self.peek_session(existing) {
                    if winner.lock_inner()?.lifecycle <= Lifecycle::Running {
                        return Ok(existing.clone());
                    }
                }
            }
            tournaments.insert(tournament_id.to_string(), id.clone());
            self.sessions
                .write()
                .map_err(|_| RegistryError::StoragePoisoned)?
                .insert(id.clone(), Arc::clone(&session));
        }

        tracing::info!(
            session_id = %id,
            tournament_id = %tournament_id,
            game_type = %kind,
            players = players.len(),
            "session created"
        );
        self.notifier.publish(
            EventKind::TournamentCreated,
            tournament_id,
            Some(serde_json::json!({
                "session_id": id,
                "game_type": kind,
                "players": seats.iter().map(|s| s.player_id.clone()).collect::<Vec<_>>(),
            })),
        );
        Ok(id)
    }

    /// Swap a bot seat for a late-joining human. Idempotent while the
    /// session is `Created`; anything later is closed to joins.
    pub fn join(
        &self,
        session_id: &str,
        kind: GameKind,
        player: &str,
    ) -> Result<(), RegistryError> {
        let session = self.get_session(session_id)?;
        self.check_kind(&session, kind)?;
        let mut inner = session.lock_inner()?;
        if inner.lifecycle != Lifecycle::Created {
            return Err(RegistryError::SessionClosedToJoins);
        }
        if inner.seats.iter().any(|seat| seat.player_id == player) {
            return Ok(());
        }
        let Some(seat_idx) = inner.seats.iter().position(|seat| seat.is_bot) else {
            return Err(RegistryError::SessionClosedToJoins);
        };
        inner.seats[seat_idx].player_id = player.to_string();
        inner.seats[seat_idx].is_bot = false;
        inner.engine.rename_seat(seat_idx, player);
        drop(inner);

        tracing::info!(session_id = %session_id, player = %player, seat = seat_idx, "player joined");
        self.notifier.publish(
            EventKind::PlayerJoined,
            &session.tournament_id,
            Some(serde_json::json!({ "session_id": session_id, "player": player })),
        );
        Ok(())
    }

    /// `Created -> Running`: reset the game clock epoch and arm the
    /// session's scheduler hooks. Idempotent for an already-running session.
    pub fn start(self: &Arc<Self>, session_id: &str, kind: GameKind) -> Result<(), RegistryError> {
        let session = self.get_session(session_id)?;
        self.check_kind(&session, kind)?;

        let bot_delay = {
            let mut inner = session.lock_inner()?;
            match inner.lifecycle {
                Lifecycle::Running => return Ok(()),
                Lifecycle::Created => {}
                _ => return Err(RegistryError::Engine(EngineError::SessionEnded)),
            }
            inner.lifecycle = Lifecycle::Running;
            inner.epoch = Instant::now();
            inner.ends_at_ms = game_deadline_ms(session.kind);

            if session.kind.is_turn_based() {
                self.pending_bot_delay(&mut inner)
            } else {
                None
            }
        };

        tracing::info!(session_id = %session_id, game_type = %session.kind, "session started");
        self.notifier.publish(
            EventKind::TournamentStarted,
            &session.tournament_id,
            Some(serde_json::json!({ "session_id": session_id })),
        );
        self.notifier.publish(
            EventKind::GameStarted,
            &session.tournament_id,
            Some(serde_json::json!({ "session_id": session_id, "game_type": session.kind })),
        );

        self.arm_session_tasks(&session);
        if let Some(delay) = bot_delay {
            self.schedule_bot_move(&session, delay);
        }
        Ok(())
    }

    /// Apply one player input under the session lock. Returns the updated
    /// view so the handler answers from the same linearisation point.
    pub fn apply_move(
        self: &Arc<Self>,
        session_id: &str,
        kind: GameKind,
        player: &str,
        payload: &MovePayload,
    ) -> Result<SessionView, RegistryError> {
        let session = self.get_session(session_id)?;
        self.check_kind(&session, kind)?;

        let mut game_over = false;
        let mut bot_delay = None;
        let view = {
            let mut inner = session.lock_inner()?;
            match inner.lifecycle {
                Lifecycle::Created => return Err(RegistryError::NotRunning),
                Lifecycle::Running => {}
                _ => return Err(RegistryError::Engine(EngineError::SessionEnded)),
            }
            let seat = inner
                .seats
                .iter()
                .position(|s| s.player_id == player)
                .ok_or_else(|| RegistryError::UnknownPlayer(player.to_string()))?;

            let now = now_ms(&inner);
            let outcome = match inner.engine.apply_move(seat, payload, now) {
                Ok(outcome) => outcome,
                Err(EngineError::InvariantViolation(diag)) => {
                    inner.diagnostic = Some(diag.clone());
                    tracing::error!(session_id = %session_id, diagnostic = %diag, "engine invariant violated");
                    drop(inner);
                    self.begin_end(&session, "invariant_violation");
                    return Err(RegistryError::Engine(EngineError::InvariantViolation(diag)));
                }
                Err(err) => {
                    tracing::debug!(session_id = %session_id, player = %player, error = %err, "move rejected");
                    return Err(err.into());
                }
            };

            if outcome.game_over {
                game_over = true;
            } else if session.kind.is_turn_based() {
                bot_delay = self.pending_bot_delay(&mut inner);
            }
            self.view_locked(&session, &mut inner)
        };

        if game_over {
            self.begin_end(&session, "completed");
        } else if let Some(delay) = bot_delay {
            self.schedule_bot_move(&session, delay);
        }
        Ok(view)
    }

    /// Read projection; always permitted, refreshes the GC read stamp.
    pub fn view(&self, session_id: &str, kind: Option<GameKind>) -> Result<SessionView, RegistryError> {
        let session = self.get_session(session_id)?;
        if let Some(expected) = kind {
            self.check_kind(&session, expected)?;
        }
        let mut inner = session.lock_inner()?;
        inner.last_read = Instant::now();
        Ok(self.view_locked(&session, &mut inner))
    }

    pub fn session_info(&self, session_id: &str) -> Result<SessionInfo, RegistryError> {
        let session = self.get_session(session_id)?;
        let mut inner = session.lock_inner()?;
        inner.last_read = Instant::now();
        Ok(SessionInfo {
            game_type: session.kind,
            players: inner.seats.iter().map(|s| s.player_id.clone()).collect(),
            lifecycle: inner.lifecycle,
            result: inner.result.clone(),
        })
    }

    pub fn get_result(&self, session_id: &str) -> Result<Option<SessionResult>, RegistryError> {
        let session = self.get_session(session_id)?;
        let mut inner = session.lock_inner()?;
        inner.last_read = Instant::now();
        Ok(inner.result.clone())
    }

    pub fn tournament_session(&self, tournament_id: &str) -> Result<SessionId, RegistryError> {
        self.active_session_for(tournament_id)?
            .ok_or_else(|| RegistryError::UnknownTournament(tournament_id.to_string()))
    }

    /// Chess side-channel; spectators are accepted and tagged.
    pub fn send_emoji(
        &self,
        session_id: &str,
        player: &str,
        emoji: &str,
    ) -> Result<(), RegistryError> {
        let session = self.get_session(session_id)?;
        self.check_kind(&session, GameKind::Chess)?;
        let mut inner = session.lock_inner()?;
        if inner.lifecycle >= Lifecycle::Ending {
            return Err(RegistryError::Engine(EngineError::SessionEnded));
        }
        let now = now_ms(&inner);
        match &mut inner.engine {
            GameState::Chess(chess) => {
                chess.send_emoji(player, emoji, now);
                Ok(())
            }
            _ => unreachable!("kind checked above"),
        }
    }

    /// Auxiliary TileMatch score report. The server's tally stays
    /// authoritative and is returned to the caller.
    pub fn submit_score(
        &self,
        session_id: &str,
        kind: GameKind,
        player: &str,
        score: u32,
    ) -> Result<u32, RegistryError> {
        if kind != GameKind::TileMatch {
            return Err(RegistryError::MalformedPayload(format!(
                "score submission is not supported for {kind}"
            )));
        }
        let session = self.get_session(session_id)?;
        self.check_kind(&session, kind)?;
        let mut inner = session.lock_inner()?;
        let seat = inner
            .seats
            .iter()
            .position(|s| s.player_id == player)
            .ok_or_else(|| RegistryError::UnknownPlayer(player.to_string()))?;
        match &mut inner.engine {
            GameState::TileMatch(board) => Ok(board.submit_score(seat, score)?),
            _ => unreachable!("kind checked above"),
        }
    }

    /// Explicit termination (operator or engine driven).
    pub fn end(self: &Arc<Self>, session_id: &str, reason: &str) -> Result<(), RegistryError> {
        let session = self.get_session(session_id)?;
        self.begin_end(&session, reason);
        Ok(())
    }

    pub fn active_sessions(&self) -> Vec<SessionId> {
        match self.sessions.read() {
            Ok(guard) => guard.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Drop `Ended` sessions whose last read is older than the retention
    /// window. Runs on the registry's own scheduler task.
    pub fn sweep_expired(&self) {
        let retention = self.settings.session_retention;
        let mut stale = Vec::new();
        {
            let Ok(sessions) = self.sessions.read() else {
                return;
            };
            for (id, session) in sessions.iter() {
                let Ok(inner) = session.inner.lock() else {
                    continue;
                };
                if inner.lifecycle == Lifecycle::Ended && inner.last_read.elapsed() >= retention {
                    stale.push(id.clone());
                }
            }
        }
        if stale.is_empty() {
            return;
        }
        if let Ok(mut sessions) = self.sessions.write() {
            for id in &stale {
                sessions.remove(id);
            }
        }
        tracing::info!(dropped = stale.len(), "garbage-collected expired sessions");
    }

    /// Arm the registry-wide GC sweep; called once at server start.
    pub fn spawn_gc(self: &Arc<Self>) {
        let registry = Arc::downgrade(self);
        self.scheduler
            .every("registry-gc", GC_SWEEP_PERIOD, move || match registry.upgrade() {
                Some(registry) => {
                    registry.sweep_expired();
                    true
                }
                None => false,
            });
    }

    // ---- internals ----

    fn get_session(&self, session_id: &str) -> Result<Arc<GameSession>, RegistryError> {
        self.peek_session(session_id)
            .ok_or_else(|| RegistryError::UnknownSession(session_id.to_string()))
    }

    fn peek_session(&self, session_id: &str) -> Option<Arc<GameSession>> {
        self.sessions.read().ok()?.get(session_id).cloned()
    }

    fn check_kind(&self, session: &GameSession, expected: GameKind) -> Result<(), RegistryError> {
        if session.kind == expected {
            Ok(())
        } else {
            Err(RegistryError::WrongGameKind {
                expected,
                actual: session.kind,
            })
        }
    }

    fn active_session_for(&self, tournament_id: &str) -> Result<Option<SessionId>, RegistryError> {
        let tournaments = self
            .tournaments
            .read()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        let Some(session_id) = tournaments.get(tournament_id) else {
            return Ok(None);
        };
        let Some(session) = self.peek_session(session_id) else {
            return Ok(None);
        };
        let inner = session.lock_inner()?;
        if inner.lifecycle <= Lifecycle::Running {
            Ok(Some(session_id.clone()))
        } else {
            Ok(None)
        }
    }

    fn view_locked(&self, session: &GameSession, inner: &mut SessionInner) -> SessionView {
        let now = now_ms(inner);
        inner.last_read = Instant::now();
        SessionView {
            session_id: session.id.clone(),
            tournament_id: session.tournament_id.clone(),
            lifecycle: inner.lifecycle,
            seats: inner.seats.clone(),
            last_tick_at_ms: inner.last_tick_at_ms,
            ends_at_ms: inner.ends_at_ms,
            result: inner.result.clone(),
            diagnostic: inner.diagnostic.clone(),
            state: inner.engine.view(now),
        }
    }

    /// Next-turn bot bookkeeping; returns the think-delay to arm when the
    /// seat on turn is a bot and nothing is scheduled yet.
    fn pending_bot_delay(&self, inner: &mut SessionInner) -> Option<u64> {
        if inner.bot_move_scheduled {
            return None;
        }
        let turn = inner.engine.turn()?;
        if !inner.seats.get(turn)?.is_bot {
            return None;
        }
        inner.bot_move_scheduled = true;
        Some(think_delay_ms(&mut inner.rng))
    }

    fn schedule_bot_move(self: &Arc<Self>, session: &Arc<GameSession>, delay_ms: u64) {
        let registry = Arc::downgrade(self);
        let session_id = session.id.clone();
        self.scheduler.after(
            &session.id,
            Duration::from_millis(delay_ms),
            move || {
                if let Some(registry) = registry.upgrade() {
                    registry.play_bot_move(&session_id);
                }
            },
        );
    }

    /// One bot move per dispatch; bot-vs-bot games reschedule with a fresh
    /// think-delay, through the same apply path as humans.
    fn play_bot_move(self: &Arc<Self>, session_id: &str) {
        let Some(session) = self.peek_session(session_id) else {
            return;
        };
        let mut game_over = false;
        let mut next_delay = None;
        {
            let Ok(mut inner) = session.lock_inner() else {
                return;
            };
            inner.bot_move_scheduled = false;
            if inner.lifecycle != Lifecycle::Running {
                return;
            }
            let Some(turn) = inner.engine.turn() else {
                return;
            };
            if !inner.seats[turn].is_bot {
                return;
            }

            let now = now_ms(&inner);
            let state = &mut *inner;
            let Some(payload) = session.bot.decide(&state.engine, turn, &mut state.rng) else {
                return;
            };
            match state.engine.apply_move(turn, &payload, now) {
                Ok(outcome) => {
                    if outcome.game_over {
                        game_over = true;
                    } else {
                        next_delay = self.pending_bot_delay(state);
                    }
                }
                Err(err) => {
                    // A bot emitting an illegal move is an engine bug worth
                    // surfacing, not a crash
                    tracing::error!(
                        session_id = %session_id,
                        seat = turn,
                        error = %err,
                        "bot move rejected"
                    );
                }
            }
        }
        if game_over {
            self.begin_end(&session, "completed");
        } else if let Some(delay) = next_delay {
            self.schedule_bot_move(&session, delay);
        }
    }

    fn arm_session_tasks(self: &Arc<Self>, session: &Arc<GameSession>) {
        match session.kind {
            GameKind::Arena | GameKind::Arcade => {
                let period = if session.kind == GameKind::Arena {
                    Duration::from_millis(self.settings.arena_tick_ms)
                } else {
                    Duration::from_millis(50)
                };
                self.arm_tick(session, period, true);
            }
            GameKind::Chess => {
                self.arm_tick(session, CHESS_CLOCK_POLL, false);
            }
            GameKind::TileMatch => {
                self.arm_tick(session, TILE_COUNTDOWN_POLL, false);
                self.arm_tile_bots(session);
            }
            GameKind::ConnectFour | GameKind::TicTacToe => {}
        }
    }

    fn arm_tick(self: &Arc<Self>, session: &Arc<GameSession>, period: Duration, drive_bots: bool) {
        let registry = Arc::downgrade(self);
        let session_id = session.id.clone();
        self.scheduler.every(&session.id, period, move || {
            match registry.upgrade() {
                Some(registry) => registry.run_tick(&session_id, drive_bots),
                None => false,
            }
        });
    }

    /// One engine tick under the session lock; real-time engines also run
    /// their bots here, on the same timeline as human inputs.
    fn run_tick(self: &Arc<Self>, session_id: &str, drive_bots: bool) -> bool {
        let Some(session) = self.peek_session(session_id) else {
            return false;
        };
        let mut game_over = false;
        {
            let Ok(mut inner) = session.lock_inner() else {
                return false;
            };
            if inner.lifecycle != Lifecycle::Running {
                return false;
            }
            let now = now_ms(&inner);
            let state = &mut *inner;
            let outcome = state.engine.tick(now, &mut state.rng);
            state.last_tick_at_ms = Some(now);

            if !outcome.game_over && drive_bots {
                for seat_idx in 0..state.seats.len() {
                    if !state.seats[seat_idx].is_bot {
                        continue;
                    }
                    let Some(payload) = session.bot.decide(&state.engine, seat_idx, &mut state.rng)
                    else {
                        continue;
                    };
                    if let Err(err) = state.engine.apply_move(seat_idx, &payload, now) {
                        tracing::debug!(
                            session_id = %session_id,
                            seat = seat_idx,
                            error = %err,
                            "realtime bot move rejected"
                        );
                    }
                }
            }
            sync_seat_liveness(state);
            if state.engine.is_over() {
                game_over = true;
            }
        }
        if game_over {
            self.begin_end(&session, "completed");
            return false;
        }
        true
    }

    /// TileMatch bots submit a pair every beat until the board is dry.
    fn arm_tile_bots(self: &Arc<Self>, session: &Arc<GameSession>) {
        let has_bots = session
            .lock_inner()
            .map(|inner| inner.seats.iter().any(|seat| seat.is_bot))
            .unwrap_or(false);
        if !has_bots {
            return;
        }
        let registry = Arc::downgrade(self);
        let session_id = session.id.clone();
        self.scheduler.every(&session.id, TILE_BOT_PERIOD, move || {
            let Some(registry) = registry.upgrade() else {
                return false;
            };
            let Some(session) = registry.peek_session(&session_id) else {
                return false;
            };
            let mut game_over = false;
            {
                let Ok(mut inner) = session.lock_inner() else {
                    return false;
                };
                if inner.lifecycle != Lifecycle::Running {
                    return false;
                }
                let now = now_ms(&inner);
                let state = &mut *inner;
                for seat_idx in 0..state.seats.len() {
                    if !state.seats[seat_idx].is_bot {
                        continue;
                    }
                    if let Some(payload) =
                        session.bot.decide(&state.engine, seat_idx, &mut state.rng)
                    {
                        let _ = state.engine.apply_move(seat_idx, &payload, now);
                    }
                }
                if state.engine.is_over() {
                    game_over = true;
                }
            }
            if game_over {
                registry.begin_end(&session, "completed");
                return false;
            }
            true
        });
    }

    /// `Running -> Ending`: freeze the ranking, cancel the session's
    /// timers, then sign and submit on a snapshot outside the lock.
    /// `Ending -> Ended` happens when the signer pipeline resolves.
    fn begin_end(self: &Arc<Self>, session: &Arc<GameSession>, reason: &str) {
        let payload = {
            let Ok(mut inner) = session.lock_inner() else {
                return;
            };
            if inner.lifecycle >= Lifecycle::Ending {
                return;
            }
            inner.lifecycle = Lifecycle::Ending;
            let podium = inner.engine.ranking();
            inner.result = Some(SessionResult {
                podium: podium.clone(),
                reason: reason.to_string(),
                signed_payload: None,
                submitted: false,
            });
            ResultPayload {
                tournament_id: session.tournament_id.clone(),
                podium,
                game_kind: session.kind,
                session_id: session.id.clone(),
            }
        };

        tracing::info!(
            session_id = %session.id,
            tournament_id = %session.tournament_id,
            reason = %reason,
            "session ending"
        );

        // The tournament slot frees up as soon as the session leaves Running
        if let Ok(mut tournaments) = self.tournaments.write() {
            if tournaments.get(&session.tournament_id) == Some(&session.id) {
                tournaments.remove(&session.tournament_id);
            }
        }
        self.scheduler.cancel_session(&session.id);

        let signer = Arc::clone(&self.signer);
        let notifier = Arc::clone(&self.notifier);
        let session = Arc::clone(session);
        tokio::spawn(async move {
            let signed = if signer.is_configured() {
                signer.sign(&payload).await.map(Some)
            } else {
                Ok(None)
            };

            let mut submitted = false;
            let signature = match signed {
                Ok(Some(signature)) => {
                    submitted = signer.submit(&payload, &signature).await;
                    Some(signature)
                }
                Ok(None) => None,
                Err(err) => {
                    // Degraded completion: the result stands, unsigned
                    tracing::error!(
                        session_id = %session.id,
                        error = %err,
                        "signing failed; completing without signature"
                    );
                    if let Ok(mut inner) = session.inner.lock() {
                        inner.diagnostic = Some(signer_diagnostic(&err));
                    }
                    None
                }
            };

            if let Ok(mut inner) = session.inner.lock() {
                if let Some(result) = inner.result.as_mut() {
                    result.signed_payload = signature.as_deref().map(hex::encode);
                    result.submitted = submitted;
                }
                inner.lifecycle = Lifecycle::Ended;
            }
            notifier.publish(
                EventKind::ResultsSubmitted,
                &payload.tournament_id,
                Some(serde_json::json!({
                    "session_id": payload.session_id,
                    "podium": payload.podium,
                    "signed": signature.is_some(),
                    "submitted": submitted,
                })),
            );
        });
    }
}

fn signer_diagnostic(err: &SignerError) -> String {
    format!("signer failure: {err}")
}

/// Elimination games mark seats dead in the engine; mirror that onto the
/// seat descriptors the info endpoints serve.
fn sync_seat_liveness(inner: &mut SessionInner) {
    let SessionInner { engine, seats, .. } = inner;
    match engine {
        GameState::Arena(arena) => {
            for (seat, cell) in seats.iter_mut().zip(arena.cells()) {
                seat.alive = cell.alive;
            }
        }
        GameState::Arcade(arcade) => {
            for (seat, pilot) in seats.iter_mut().zip(arcade.pilots()) {
                seat.alive = pilot.alive;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourney_engine::game::MovePayload;

    fn test_registry() -> Arc<SessionRegistry> {
        let settings = Settings::for_tests();
        let scheduler = Scheduler::new();
        let notifier = Arc::new(Notifier::new());
        let signer = Arc::new(SignerClient::new(&settings));
        SessionRegistry::new(settings, scheduler, notifier, signer)
    }

    async fn wait_for_ended(registry: &Arc<SessionRegistry>, session_id: &str) {
        for _ in 0..50 {
            let info = registry.session_info(session_id).expect("session info");
            if info.lifecycle == Lifecycle::Ended {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("session {session_id} never reached Ended");
    }

    #[tokio::test]
    async fn create_or_get_is_idempotent_per_tournament() {
        let registry = test_registry();
        let a = registry
            .create_or_get("t1", GameKind::Chess, &["alice".to_string()])
            .expect("create");
        let b = registry
            .create_or_get("t1", GameKind::Chess, &["alice".to_string()])
            .expect("get");
        assert_eq!(a, b);

        let other = registry
            .create_or_get("t2", GameKind::Chess, &["bob".to_string()])
            .expect("create");
        assert_ne!(a, other);
        assert_eq!(registry.tournament_session("t1").expect("lookup"), a);
    }

    #[tokio::test]
    async fn join_swaps_bot_and_closes_after_start() {
        let registry = test_registry();
        let id = registry
            .create_or_get("t7", GameKind::Chess, &["alice".to_string()])
            .expect("create");

        let info = registry.session_info(&id).expect("info");
        assert_eq!(info.players, vec!["alice".to_string(), "Bot_1".to_string()]);

        registry.join(&id, GameKind::Chess, "bob").expect("join");
        // Idempotent while still Created
        registry.join(&id, GameKind::Chess, "bob").expect("repeat join");
        let info = registry.session_info(&id).expect("info");
        assert_eq!(info.players, vec!["alice".to_string(), "bob".to_string()]);

        registry.start(&id, GameKind::Chess).expect("start");
        let err = registry.join(&id, GameKind::Chess, "bob").unwrap_err();
        assert!(matches!(err, RegistryError::SessionClosedToJoins));
    }

    #[tokio::test]
    async fn join_without_free_bot_seat_is_rejected() {
        let registry = test_registry();
        let id = registry
            .create_or_get(
                "t8",
                GameKind::TicTacToe,
                &["a".to_string(), "b".to_string()],
            )
            .expect("create");
        let err = registry.join(&id, GameKind::TicTacToe, "c").unwrap_err();
        assert!(matches!(err, RegistryError::SessionClosedToJoins));
    }

    #[tokio::test]
    async fn moves_require_a_running_session_and_a_seat() {
        let registry = test_registry();
        let id = registry
            .create_or_get(
                "t9",
                GameKind::TicTacToe,
                &["a".to_string(), "b".to_string()],
            )
            .expect("create");

        let mv = MovePayload::Mark { cell: 0 };
        let err = registry
            .apply_move(&id, GameKind::TicTacToe, "a", &mv)
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotRunning));

        registry.start(&id, GameKind::TicTacToe).expect("start");
        let err = registry
            .apply_move(&id, GameKind::TicTacToe, "ghost", &mv)
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownPlayer(_)));

        let err = registry
            .apply_move(&id, GameKind::Chess, "a", &mv)
            .unwrap_err();
        assert!(matches!(err, RegistryError::WrongGameKind { .. }));
    }

    #[tokio::test]
    async fn finished_game_reaches_ended_with_a_full_podium() {
        let registry = test_registry();
        let id = registry
            .create_or_get(
                "t10",
                GameKind::TicTacToe,
                &["a".to_string(), "b".to_string()],
            )
            .expect("create");
        registry.start(&id, GameKind::TicTacToe).expect("start");

        for (player, cell) in [("a", 0), ("b", 4), ("a", 1), ("b", 5), ("a", 2)] {
            registry
                .apply_move(&id, GameKind::TicTacToe, player, &MovePayload::Mark { cell })
                .expect("legal move");
        }

        wait_for_ended(&registry, &id).await;
        let result = registry.get_result(&id).expect("result").expect("present");
        assert_eq!(result.podium, vec!["a".to_string(), "b".to_string()]);
        // No signer configured: degraded-but-complete, nothing signed
        assert!(result.signed_payload.is_none());
        assert!(!result.submitted);

        // Tournament slot frees up once the session leaves Running
        assert!(registry.tournament_session("t10").is_err());

        let err = registry
            .apply_move(&id, GameKind::TicTacToe, "b", &MovePayload::Mark { cell: 8 })
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Engine(EngineError::SessionEnded)
        ));
    }

    #[tokio::test]
    async fn bot_plays_back_after_a_human_move() {
        let registry = test_registry();
        let id = registry
            .create_or_get("t11", GameKind::TicTacToe, &["a".to_string()])
            .expect("create");
        registry.start(&id, GameKind::TicTacToe).expect("start");

        registry
            .apply_move(&id, GameKind::TicTacToe, "a", &MovePayload::Mark { cell: 4 })
            .expect("human move");

        // The bot answers after its randomised think delay (200-1500 ms)
        let mut bot_moved = false;
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let view = registry.view(&id, None).expect("view");
            if let GameView::TicTacToe(board) = &view.state {
                if board.history.len() >= 2 {
                    bot_moved = true;
                    break;
                }
            }
        }
        assert!(bot_moved, "bot never played");
    }

    #[tokio::test]
    async fn sweep_drops_only_expired_ended_sessions() {
        let settings = Settings {
            session_retention: Duration::from_millis(10),
            ..Settings::for_tests()
        };
        let scheduler = Scheduler::new();
        let notifier = Arc::new(Notifier::new());
        let signer = Arc::new(SignerClient::new(&settings));
        let registry = SessionRegistry::new(settings, scheduler, notifier, signer);

        let live = registry
            .create_or_get("t12", GameKind::Chess, &["a".to_string()])
            .expect("create");
        let dead = registry
            .create_or_get("t13", GameKind::TicTacToe, &["a".to_string()])
            .expect("create");
        registry.start(&dead, GameKind::TicTacToe).expect("start");
        registry.end(&dead, "operator").expect("end");
        wait_for_ended(&registry, &dead).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        registry.sweep_expired();

        let remaining = registry.active_sessions();
        assert!(remaining.contains(&live));
        assert!(!remaining.contains(&dead));
    }
}
