//! # tourney-ai: Bot Drivers for the Session Engines
//!
//! One bot policy per game variant behind a common interface. Bots never
//! bypass validation: a driver produces a [`MovePayload`] and the server
//! feeds it through the same `apply_move` path as a human input, so an
//! illegal bot move is rejected exactly like an illegal human move.
//!
//! ## Core Components
//!
//! - [`BotDriver`] - Trait for per-engine decision making
//! - [`driver_for`] - Factory keyed by [`GameKind`]
//! - [`think_delay_ms`] - Randomised 200-1500 ms delay for turn-based bots
//!
//! ## Quick Start
//!
//! ```rust
//! use tourney_ai::driver_for;
//! use tourney_engine::game::{EngineConfig, GameKind, GameState};
//! use tourney_engine::rng::SessionRng;
//! use tourney_engine::seat::assign_seats;
//!
//! let seats = assign_seats(GameKind::TicTacToe, &["human".to_string()]);
//! let mut rng = SessionRng::from_seed(3);
//! let state = GameState::new(GameKind::TicTacToe, &seats, &EngineConfig::default(), &mut rng);
//!
//! let bot = driver_for(GameKind::TicTacToe);
//! let payload = bot.decide(&state, 1, &mut rng);
//! assert!(payload.is_none(), "not the bot's turn yet");
//! ```

use tourney_engine::game::{GameKind, GameState, MovePayload};
use tourney_engine::rng::SessionRng;

pub mod arcade;
pub mod arena;
pub mod chess;
pub mod connect_four;
pub mod tic_tac_toe;
pub mod tile_match;

/// Decision interface for a non-human seat. `decide` reads the live engine
/// state and emits the move the bot wants to play right now, or `None`
/// when there is nothing to do (dead cell, not its turn, board exhausted).
pub trait BotDriver: Send + Sync {
    fn decide(&self, state: &GameState, seat: usize, rng: &mut SessionRng)
        -> Option<MovePayload>;

    fn name(&self) -> &str;
}

/// Factory: the policy matching a session's game kind.
pub fn driver_for(kind: GameKind) -> Box<dyn BotDriver> {
    match kind {
        GameKind::Arena => Box::new(arena::ArenaBot),
        GameKind::Chess => Box::new(chess::ChessBot::default()),
        GameKind::ConnectFour => Box::new(connect_four::ConnectFourBot::default()),
        GameKind::TicTacToe => Box::new(tic_tac_toe::TicTacToeBot),
        GameKind::TileMatch => Box::new(tile_match::TileMatchBot),
        GameKind::Arcade => Box::new(arcade::ArcadeBot),
    }
}

/// Turn-based bots wait a human-looking beat before moving.
pub fn think_delay_ms(rng: &mut SessionRng) -> u64 {
    rng.range_u64(200, 1_500)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourney_engine::game::EngineConfig;
    use tourney_engine::seat::assign_seats;

    #[test]
    fn factory_covers_every_kind() {
        for kind in GameKind::ALL {
            let bot = driver_for(kind);
            assert!(!bot.name().is_empty());
        }
    }

    #[test]
    fn think_delay_stays_in_the_human_band() {
        let mut rng = SessionRng::from_seed(1);
        for _ in 0..128 {
            let delay = think_delay_ms(&mut rng);
            assert!((200..1_500).contains(&delay));
        }
    }

    #[test]
    fn every_turn_based_bot_yields_a_payload_on_its_turn() {
        for kind in [GameKind::Chess, GameKind::ConnectFour, GameKind::TicTacToe] {
            let seats = assign_seats(kind, &["human".to_string()]);
            let mut rng = SessionRng::from_seed(5);
            let state = GameState::new(kind, &seats, &EngineConfig::default(), &mut rng);
            let bot = driver_for(kind);
            assert!(bot.decide(&state, 1, &mut rng).is_none(), "seat 1 waits");

            // hand the turn to the bot by checking seat 0's decision instead
            assert!(bot.decide(&state, 0, &mut rng).is_some());
        }
    }
}
