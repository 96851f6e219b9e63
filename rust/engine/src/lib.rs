//! # tourney-engine: Game Session Engine Core
//!
//! Rule engines for the tournament hub's multiplayer sessions. Every game
//! variant (a real-time arena, chess with full legality and clocks, grid
//! games, a tile puzzle, an arcade dodger) sits behind one tagged session
//! contract, so the server hosts heterogeneous games through a single
//! dispatch surface, with reproducible RNG for deterministic replay.
//!
//! ## Core Modules
//!
//! - [`game`] - `GameKind`, the tagged `GameState` and the uniform lifecycle
//!   interface (`apply_move`, `tick`, `view`, `ranking`)
//! - [`seat`] - Seat assignment, roles and bot padding
//! - [`rng`] - Deterministic per-session RNG (ChaCha20)
//! - [`arena`] - Real-time growth/absorption cells
//! - [`chess`] - Full legal chess with clocks and an emoji side-channel
//! - [`connect_four`] / [`tic_tac_toe`] - Turn-based grid games
//! - [`tile_match`] - 60-second colour-pair puzzle
//! - [`arcade`] - Hazard-dodging survival game
//! - [`errors`] - Typed move/turn outcomes
//!
//! ## Quick Start
//!
//! ```rust
//! use tourney_engine::game::{EngineConfig, GameKind, GameState, MovePayload};
//! use tourney_engine::rng::SessionRng;
//! use tourney_engine::seat::assign_seats;
//!
//! let seats = assign_seats(GameKind::TicTacToe, &["alice".to_string()]);
//! let mut rng = SessionRng::from_seed(7);
//! let mut state = GameState::new(GameKind::TicTacToe, &seats, &EngineConfig::default(), &mut rng);
//!
//! state.apply_move(0, &MovePayload::Mark { cell: 4 }, 0).expect("legal opening");
//! assert_eq!(state.turn(), Some(1));
//! ```
//!
//! ## Determinism
//!
//! All randomness (tile boards, pellet placement, hazard spawns) flows
//! through [`rng::SessionRng`]; replaying a recorded move history with its
//! timestamps under the same seed reproduces the state bitwise.

pub mod arcade;
pub mod arena;
pub mod chess;
pub mod connect_four;
pub mod errors;
pub mod game;
pub mod rng;
pub mod seat;
pub mod tic_tac_toe;
pub mod tile_match;
