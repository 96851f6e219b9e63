use tourney_engine::game::{GameState, MovePayload};
use tourney_engine::rng::SessionRng;
use tourney_engine::tic_tac_toe::TicTacToeState;

use crate::BotDriver;

/// Searches the full game tree; never loses a position it can draw.
pub struct TicTacToeBot;

impl BotDriver for TicTacToeBot {
    fn decide(
        &self,
        state: &GameState,
        seat: usize,
        _rng: &mut SessionRng,
    ) -> Option<MovePayload> {
        let GameState::TicTacToe(board) = state else {
            return None;
        };
        if board.turn() != Some(seat) {
            return None;
        }
        best_cell(board, seat).map(|cell| MovePayload::Mark { cell })
    }

    fn name(&self) -> &str {
        "tic-tac-toe-minimax"
    }
}

fn best_cell(state: &TicTacToeState, me: usize) -> Option<usize> {
    let mut best: Option<(usize, i32)> = None;
    for cell in 0..9 {
        if state.grid()[cell].is_some() {
            continue;
        }
        let mut next = state.clone();
        if next.mark(me, cell).is_err() {
            continue;
        }
        let score = minimax(&next, me, 1);
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((cell, score));
        }
    }
    best.map(|(cell, _)| cell)
}

/// Score from `me`'s perspective; shallower wins beat deeper ones.
fn minimax(state: &TicTacToeState, me: usize, depth: i32) -> i32 {
    if let Some(winner) = state.winner() {
        return if winner == me { 10 - depth } else { depth - 10 };
    }
    let Some(to_move) = state.turn() else {
        return 0; // draw
    };

    let mut best = if to_move == me { i32::MIN } else { i32::MAX };
    for cell in 0..9 {
        if state.grid()[cell].is_some() {
            continue;
        }
        let mut next = state.clone();
        if next.mark(to_move, cell).is_err() {
            continue;
        }
        let score = minimax(&next, me, depth + 1);
        best = if to_move == me {
            best.max(score)
        } else {
            best.min(score)
        };
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourney_engine::game::GameKind;
    use tourney_engine::seat::assign_seats;

    fn board_after(moves: &[(usize, usize)]) -> TicTacToeState {
        let seats = assign_seats(GameKind::TicTacToe, &["h".to_string()]);
        let mut state = TicTacToeState::new(&seats);
        for &(seat, cell) in moves {
            state.mark(seat, cell).expect("legal move");
        }
        state
    }

    #[test]
    fn takes_an_immediate_win() {
        // bot (seat 1) has noughts on 3 and 4; 5 completes the row
        let state = board_after(&[(0, 0), (1, 3), (0, 1), (1, 4), (0, 8)]);
        assert_eq!(best_cell(&state, 1), Some(5));
    }

    #[test]
    fn blocks_an_immediate_loss() {
        // crosses threaten 0-1-2; bot must take cell 2
        let state = board_after(&[(0, 0), (1, 4), (0, 1)]);
        assert_eq!(best_cell(&state, 1), Some(2));
    }

    #[test]
    fn perfect_play_never_loses_to_itself() {
        let seats = assign_seats(GameKind::TicTacToe, &[]);
        let mut state = TicTacToeState::new(&seats);
        while let Some(turn) = state.turn() {
            let cell = best_cell(&state, turn).expect("a move exists");
            state.mark(turn, cell).expect("legal move");
        }
        assert_eq!(state.winner(), None, "self-play must draw");
    }
}
