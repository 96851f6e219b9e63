use rand::Rng;
use tourney_engine::connect_four::{ConnectFourState, Disc, COLUMNS};
use tourney_engine::game::{GameState, MovePayload};
use tourney_engine::rng::SessionRng;

use crate::BotDriver;

/// Centre-out search order: the middle columns decide most games.
const ORDER: [usize; COLUMNS] = [3, 2, 4, 1, 5, 0, 6];

pub struct ConnectFourBot {
    depth: u32,
}

impl Default for ConnectFourBot {
    fn default() -> Self {
        Self { depth: 6 }
    }
}

impl BotDriver for ConnectFourBot {
    fn decide(
        &self,
        state: &GameState,
        seat: usize,
        rng: &mut SessionRng,
    ) -> Option<MovePayload> {
        let GameState::ConnectFour(board) = state else {
            return None;
        };
        if board.turn() != Some(seat) {
            return None;
        }
        best_column(board, seat, self.depth, rng).map(|column| MovePayload::Drop { column })
    }

    fn name(&self) -> &str {
        "connect-four-minimax"
    }
}

fn best_column(
    state: &ConnectFourState,
    me: usize,
    depth: u32,
    rng: &mut SessionRng,
) -> Option<usize> {
    let mut scored: Vec<(usize, i32)> = Vec::with_capacity(COLUMNS);
    for column in ORDER {
        let mut next = state.clone();
        if next.drop_disc(me, column).is_err() {
            continue;
        }
        scored.push((column, search(&next, me, depth, i32::MIN + 1, i32::MAX - 1)));
    }
    let best = scored.iter().map(|&(_, score)| score).max()?;
    // tie-break between equally good columns with the session RNG
    let ties: Vec<usize> = scored
        .into_iter()
        .filter(|&(_, score)| score == best)
        .map(|(column, _)| column)
        .collect();
    Some(ties[rng.random_range(0..ties.len())])
}

/// Alpha-beta over cloned engine states, so the search can never disagree
/// with the real rules. Scores are from `me`'s perspective.
fn search(state: &ConnectFourState, me: usize, depth: u32, mut alpha: i32, mut beta: i32) -> i32 {
    if let Some(winner) = state.winner() {
        let distance = depth as i32;
        return if winner == me {
            1_000 + distance
        } else {
            -1_000 - distance
        };
    }
    let Some(to_move) = state.turn() else {
        return 0; // board full
    };
    if depth == 0 {
        return heuristic(state, me);
    }

    let maximising = to_move == me;
    let mut best = if maximising { i32::MIN + 1 } else { i32::MAX - 1 };
    for column in ORDER {
        let mut next = state.clone();
        if next.drop_disc(to_move, column).is_err() {
            continue;
        }
        let score = search(&next, me, depth - 1, alpha, beta);
        if maximising {
            best = best.max(score);
            alpha = alpha.max(best);
        } else {
            best = best.min(score);
            beta = beta.min(best);
        }
        if beta <= alpha {
            break;
        }
    }
    best
}

/// Light positional tint for depth-limited leaves: centre files count.
fn heuristic(state: &ConnectFourState, me: usize) -> i32 {
    let mut score = 0;
    for row in state.grid() {
        for (col, cell) in row.iter().enumerate() {
            let Some(disc) = cell else { continue };
            let weight = 3 - (col as i32 - 3).abs().min(3);
            score += if disc_seat(*disc) == me { weight } else { -weight };
        }
    }
    score
}

fn disc_seat(disc: Disc) -> usize {
    match disc {
        Disc::Red => 0,
        Disc::Yellow => 1,
    }
}
