use tourney_engine::game::{GameState, MovePayload};
use tourney_engine::rng::SessionRng;

use crate::BotDriver;

/// Scans the board for any unmatched same-colour pair and plays it.
pub struct TileMatchBot;

impl BotDriver for TileMatchBot {
    fn decide(
        &self,
        state: &GameState,
        _seat: usize,
        _rng: &mut SessionRng,
    ) -> Option<MovePayload> {
        let GameState::TileMatch(board) = state else {
            return None;
        };
        if board.is_over() {
            return None;
        }

        let tiles = board.tiles();
        for first in 0..tiles.len() {
            if tiles[first].matched {
                continue;
            }
            for second in (first + 1)..tiles.len() {
                if !tiles[second].matched && tiles[first].colour == tiles[second].colour {
                    return Some(MovePayload::Pair { first, second });
                }
            }
        }
        None
    }

    fn name(&self) -> &str {
        "tile-match-scanner"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourney_engine::game::{EngineConfig, GameKind};
    use tourney_engine::seat::assign_seats;

    #[test]
    fn clears_the_whole_board() {
        let seats = assign_seats(GameKind::TileMatch, &["h".to_string()]);
        let mut rng = SessionRng::from_seed(13);
        let mut state =
            GameState::new(GameKind::TileMatch, &seats, &EngineConfig::default(), &mut rng);

        let mut moves = 0;
        while let Some(MovePayload::Pair { first, second }) =
            TileMatchBot.decide(&state, 1, &mut rng)
        {
            state
                .apply_move(1, &MovePayload::Pair { first, second }, 0)
                .expect("bot pairs are always legal");
            moves += 1;
            assert!(moves <= 32, "more pairs than the board holds");
        }
        assert_eq!(moves, 32);
        assert!(state.is_over(), "cleared board ends the game");
    }
}
