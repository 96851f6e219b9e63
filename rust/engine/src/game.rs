use serde::{Deserialize, Serialize};

use crate::arcade::{ArcadeState, ArcadeView};
use crate::arena::{ArenaState, ArenaView};
use crate::chess::{ChessState, ChessView, PromotionPiece};
use crate::connect_four::{ConnectFourState, ConnectFourView};
use crate::errors::EngineError;
use crate::rng::SessionRng;
use crate::seat::{PlayerId, Seat};
use crate::tic_tac_toe::{TicTacToeState, TicTacToeView};
use crate::tile_match::{TileMatchState, TileMatchView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    Arena,
    Chess,
    ConnectFour,
    TicTacToe,
    TileMatch,
    Arcade,
}

impl GameKind {
    pub const ALL: [GameKind; 6] = [
        GameKind::Arena,
        GameKind::Chess,
        GameKind::ConnectFour,
        GameKind::TicTacToe,
        GameKind::TileMatch,
        GameKind::Arcade,
    ];

    pub fn seat_count(self) -> usize {
        match self {
            GameKind::Arena | GameKind::Arcade => 4,
            GameKind::Chess | GameKind::ConnectFour | GameKind::TicTacToe | GameKind::TileMatch => {
                2
            }
        }
    }

    /// Real-time engines advance on scheduler ticks and drive their bots
    /// every tick; turn-based engines drive bots on turn changes.
    pub fn is_realtime(self) -> bool {
        matches!(self, GameKind::Arena | GameKind::Arcade)
    }

    pub fn is_turn_based(self) -> bool {
        matches!(
            self,
            GameKind::Chess | GameKind::ConnectFour | GameKind::TicTacToe
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GameKind::Arena => "arena",
            GameKind::Chess => "chess",
            GameKind::ConnectFour => "connect_four",
            GameKind::TicTacToe => "tic_tac_toe",
            GameKind::TileMatch => "tile_match",
            GameKind::Arcade => "arcade",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        GameKind::ALL.iter().copied().find(|k| k.as_str() == value)
    }
}

impl std::fmt::Display for GameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine tuning supplied by the process configuration at session creation.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub arena_tick_ms: u64,
    pub chess_clock_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            arena_tick_ms: 50,
            chess_clock_ms: 300_000,
        }
    }
}

/// Engine-specific move payload. The HTTP layer deserialises the variant
/// matching the session's game kind; a mismatched payload is an illegal
/// move, never a panic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MovePayload {
    Aim { x: f64, y: f64 },
    Piece {
        from: String,
        to: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        promotion: Option<PromotionPiece>,
    },
    Drop { column: usize },
    Mark { cell: usize },
    Pair { first: usize, second: usize },
    Steer { ax: f64, ay: f64, dash: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub game_over: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub game_over: bool,
}

/// Read projection served to pollers; tagged like the session itself.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "game_type", rename_all = "snake_case")]
pub enum GameView {
    Arena(ArenaView),
    Chess(ChessView),
    ConnectFour(ConnectFourView),
    TicTacToe(TicTacToeView),
    TileMatch(TileMatchView),
    Arcade(ArcadeView),
}

/// The per-session engine state: one tagged variant per game, all behind
/// the same lifecycle interface. Dispatch goes through the tag; the server
/// core never inspects per-variant structure.
#[derive(Debug, Clone)]
pub enum GameState {
    Arena(ArenaState),
    Chess(ChessState),
    ConnectFour(ConnectFourState),
    TicTacToe(TicTacToeState),
    TileMatch(TileMatchState),
    Arcade(ArcadeState),
}

impl GameState {
    pub fn new(kind: GameKind, seats: &[Seat], config: &EngineConfig, rng: &mut SessionRng) -> Self {
        match kind {
            GameKind::Arena => GameState::Arena(ArenaState::new(seats, config.arena_tick_ms, rng)),
            GameKind::Chess => GameState::Chess(ChessState::new(seats, config.chess_clock_ms)),
            GameKind::ConnectFour => GameState::ConnectFour(ConnectFourState::new(seats)),
            GameKind::TicTacToe => GameState::TicTacToe(TicTacToeState::new(seats)),
            GameKind::TileMatch => GameState::TileMatch(TileMatchState::new(seats, rng)),
            GameKind::Arcade => GameState::Arcade(ArcadeState::new(seats)),
        }
    }

    pub fn kind(&self) -> GameKind {
        match self {
            GameState::Arena(_) => GameKind::Arena,
            GameState::Chess(_) => GameKind::Chess,
            GameState::ConnectFour(_) => GameKind::ConnectFour,
            GameState::TicTacToe(_) => GameKind::TicTacToe,
            GameState::TileMatch(_) => GameKind::TileMatch,
            GameState::Arcade(_) => GameKind::Arcade,
        }
    }

    /// Apply one validated player input. `now_ms` is monotonic milliseconds
    /// from session start; turn-based engines ignore it except for clocks.
    pub fn apply_move(
        &mut self,
        seat: usize,
        payload: &MovePayload,
        now_ms: u64,
    ) -> Result<MoveOutcome, EngineError> {
        if self.is_over() {
            return Err(EngineError::SessionEnded);
        }
        match (self, payload) {
            (GameState::Arena(state), MovePayload::Aim { x, y }) => {
                state.submit_aim(seat, *x, *y, now_ms)
            }
            (GameState::Chess(state), MovePayload::Piece {
                from,
                to,
                promotion,
            }) => state.apply(seat, from, to, *promotion, now_ms),
            (GameState::ConnectFour(state), MovePayload::Drop { column }) => {
                state.drop_disc(seat, *column)
            }
            (GameState::TicTacToe(state), MovePayload::Mark { cell }) => state.mark(seat, *cell),
            (GameState::TileMatch(state), MovePayload::Pair { first, second }) => {
                state.match_pair(seat, *first, *second)
            }
            (GameState::Arcade(state), MovePayload::Steer { ax, ay, dash }) => {
                state.steer(seat, *ax, *ay, *dash, now_ms)
            }
            (state, _) => Err(EngineError::illegal(format!(
                "payload does not match {} session",
                state.kind()
            ))),
        }
    }

    /// Advance time. The purely turn-based engines have no time dynamics;
    /// their tick just reports terminality.
    pub fn tick(&mut self, now_ms: u64, rng: &mut SessionRng) -> TickOutcome {
        match self {
            GameState::Arena(state) => state.tick(now_ms, rng),
            GameState::Chess(state) => state.tick(now_ms),
            GameState::TileMatch(state) => state.tick(now_ms),
            GameState::Arcade(state) => state.tick(now_ms, rng),
            GameState::ConnectFour(state) => TickOutcome {
                game_over: state.is_over(),
            },
            GameState::TicTacToe(state) => TickOutcome {
                game_over: state.is_over(),
            },
        }
    }

    pub fn view(&self, now_ms: u64) -> GameView {
        match self {
            GameState::Arena(state) => GameView::Arena(state.view()),
            GameState::Chess(state) => GameView::Chess(state.view(now_ms)),
            GameState::ConnectFour(state) => GameView::ConnectFour(state.view()),
            GameState::TicTacToe(state) => GameView::TicTacToe(state.view()),
            GameState::TileMatch(state) => GameView::TileMatch(state.view(now_ms)),
            GameState::Arcade(state) => GameView::Arcade(state.view()),
        }
    }

    /// Final ordering, best first, one entry per seat. Only meaningful once
    /// the game is over, but total at any point for degraded endings.
    pub fn ranking(&self) -> Vec<PlayerId> {
        match self {
            GameState::Arena(state) => state.ranking(),
            GameState::Chess(state) => state.ranking(),
            GameState::ConnectFour(state) => state.ranking(),
            GameState::TicTacToe(state) => state.ranking(),
            GameState::TileMatch(state) => state.ranking(),
            GameState::Arcade(state) => state.ranking(),
        }
    }

    pub fn is_over(&self) -> bool {
        match self {
            GameState::Arena(state) => state.is_over(),
            GameState::Chess(state) => state.is_over(),
            GameState::ConnectFour(state) => state.is_over(),
            GameState::TicTacToe(state) => state.is_over(),
            GameState::TileMatch(state) => state.is_over(),
            GameState::Arcade(state) => state.is_over(),
        }
    }

    /// Late joins swap a bot id for the human's; the engine keeps every
    /// other property of the seat.
    pub fn rename_seat(&mut self, seat: usize, player_id: &str) {
        match self {
            GameState::Arena(state) => state.rename_seat(seat, player_id),
            GameState::Chess(state) => state.rename_seat(seat, player_id),
            GameState::ConnectFour(state) => state.rename_seat(seat, player_id),
            GameState::TicTacToe(state) => state.rename_seat(seat, player_id),
            GameState::TileMatch(state) => state.rename_seat(seat, player_id),
            GameState::Arcade(state) => state.rename_seat(seat, player_id),
        }
    }

    /// Seat index to move, for turn-based engines still running.
    pub fn turn(&self) -> Option<usize> {
        match self {
            GameState::Chess(state) => state.turn(),
            GameState::ConnectFour(state) => state.turn(),
            GameState::TicTacToe(state) => state.turn(),
            _ => None,
        }
    }
}
