use tourney_engine::chess::{
    apply_unchecked, file_of, in_check, legal_moves, rank_of, Board, ChessMove, ChessState, Color,
    PieceKind, PromotionPiece, Square,
};
use tourney_engine::game::{GameState, MovePayload};
use tourney_engine::rng::SessionRng;

use crate::BotDriver;

const MATE_SCORE: i32 = 100_000;

/// Fixed-depth negamax with material counting; the central-control bonus
/// in the evaluation breaks material ties.
pub struct ChessBot {
    depth: u32,
}

impl Default for ChessBot {
    fn default() -> Self {
        Self { depth: 3 }
    }
}

impl BotDriver for ChessBot {
    fn decide(
        &self,
        state: &GameState,
        seat: usize,
        _rng: &mut SessionRng,
    ) -> Option<MovePayload> {
        let GameState::Chess(chess) = state else {
            return None;
        };
        if chess.turn() != Some(seat) {
            return None;
        }
        let best = best_move(chess, self.depth)?;
        Some(MovePayload::Piece {
            from: tourney_engine::chess::format_square(best.from),
            to: tourney_engine::chess::format_square(best.to),
            promotion: best.promotion.map(promotion_of),
        })
    }

    fn name(&self) -> &str {
        "chess-minimax"
    }
}

fn promotion_of(kind: PieceKind) -> PromotionPiece {
    match kind {
        PieceKind::Rook => PromotionPiece::Rook,
        PieceKind::Bishop => PromotionPiece::Bishop,
        PieceKind::Knight => PromotionPiece::Knight,
        _ => PromotionPiece::Queen,
    }
}

pub fn best_move(chess: &ChessState, depth: u32) -> Option<ChessMove> {
    let color = chess.side_to_move();
    let board = chess.board();
    let mut moves = chess.current_legal_moves();
    if moves.is_empty() {
        return None;
    }
    order_moves(board, &mut moves);

    let mut best: Option<(ChessMove, i32)> = None;
    for mv in moves {
        let mut scratch = board.clone();
        let applied = apply_unchecked(&mut scratch, &mv, chess.en_passant());
        let score = -negamax(
            &scratch,
            color.opponent(),
            applied.next_en_passant,
            depth.saturating_sub(1),
            -MATE_SCORE,
            MATE_SCORE,
            1,
        );
        if best.as_ref().is_none_or(|(_, s)| score > *s) {
            best = Some((mv, score));
        }
    }
    best.map(|(mv, _)| mv)
}

fn negamax(
    board: &Board,
    color: Color,
    en_passant: Option<Square>,
    depth: u32,
    mut alpha: i32,
    beta: i32,
    ply: i32,
) -> i32 {
    let mut moves = legal_moves(board, color, en_passant);
    if moves.is_empty() {
        return if in_check(board, color) {
            -(MATE_SCORE - ply) // mated: prefer the longest defence
        } else {
            0
        };
    }
    if depth == 0 {
        return evaluate(board, color);
    }
    order_moves(board, &mut moves);

    let mut best = -MATE_SCORE;
    for mv in moves {
        let mut scratch = board.clone();
        let applied = apply_unchecked(&mut scratch, &mv, en_passant);
        let score = -negamax(
            &scratch,
            color.opponent(),
            applied.next_en_passant,
            depth - 1,
            -beta,
            -alpha,
            ply + 1,
        );
        best = best.max(score);
        alpha = alpha.max(best);
        if alpha >= beta {
            break;
        }
    }
    best
}

/// Captures first, big victims before small, for earlier cutoffs.
fn order_moves(board: &Board, moves: &mut [ChessMove]) {
    moves.sort_by_key(|mv| {
        let victim = board.get(mv.to).map_or(0, |p| material(p.kind));
        -victim
    });
}

fn material(kind: PieceKind) -> i32 {
    match kind {
        PieceKind::Pawn => 100,
        PieceKind::Knight => 320,
        PieceKind::Bishop => 330,
        PieceKind::Rook => 500,
        PieceKind::Queen => 900,
        PieceKind::King => 20_000,
    }
}

/// Positive for the side to move: material difference plus a small bonus
/// for pieces controlling the middle of the board.
fn evaluate(board: &Board, perspective: Color) -> i32 {
    let mut score = 0;
    for sq in 0..64u8 {
        let Some(piece) = board.get(sq) else { continue };
        let mut value = material(piece.kind) + central_bonus(sq);
        if piece.color != perspective {
            value = -value;
        }
        score += value;
    }
    score
}

fn central_bonus(sq: Square) -> i32 {
    let (file, rank) = (file_of(sq), rank_of(sq));
    let centre_distance =
        (file as i32 - 3).abs().min((file as i32 - 4).abs()) + (rank as i32 - 3).abs().min((rank as i32 - 4).abs());
    match centre_distance {
        0 => 20,
        1 => 10,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourney_engine::game::GameKind;
    use tourney_engine::seat::assign_seats;

    fn seats() -> Vec<tourney_engine::seat::Seat> {
        assign_seats(GameKind::Chess, &["h".to_string()])
    }

    #[test]
    fn always_returns_a_legal_move() {
        let chess = ChessState::new(&seats(), 300_000);
        let mv = best_move(&chess, 2).expect("opening move");
        assert!(chess
            .current_legal_moves()
            .iter()
            .any(|m| m.from == mv.from && m.to == mv.to));
    }

    #[test]
    fn takes_a_hanging_queen() {
        // White queen sits on d4 in range of the c6 knight
        let chess = ChessState::from_fen(
            "r1b1kbnr/pppppppp/2n5/8/3Q4/8/PPPPPPPP/RNB1KBNR b KQkq - 0 1",
            &seats(),
            300_000,
        )
        .expect("fen");
        let mv = best_move(&chess, 2).expect("move");
        assert_eq!(tourney_engine::chess::format_square(mv.to), "d4");
    }

    #[test]
    fn delivers_mate_in_one() {
        // Back-rank mate: Ra8#
        let chess = ChessState::from_fen("6k1/5ppp/8/8/8/8/R4PPP/6K1 w - - 0 1", &seats(), 300_000)
            .expect("fen");
        let mv = best_move(&chess, 2).expect("move");
        assert_eq!(tourney_engine::chess::format_square(mv.to), "a8");
    }

    #[test]
    fn prefers_material_over_quiet_moves() {
        // White bishop on c4 can take the undefended rook on f7? Keep it
        // simple: white rook takes an undefended pawn-guarded-nothing
        // rook on a8 along the open file.
        let chess = ChessState::from_fen("r5k1/5ppp/8/8/8/8/R4PPP/6K1 w - - 0 1", &seats(), 300_000)
            .expect("fen");
        let mv = best_move(&chess, 3).expect("move");
        assert_eq!(tourney_engine::chess::format_square(mv.to), "a8");
    }
}
