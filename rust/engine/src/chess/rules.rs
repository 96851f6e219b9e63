//! Move generation and application. Pseudo-legal moves are generated per
//! piece, then filtered by the self-check rule; castling and en passant
//! carry their extra preconditions here.

use super::board::{file_of, format_square, rank_of, square, Board, Color, PieceKind, Square};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChessMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
}

impl ChessMove {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    pub fn uci(&self) -> String {
        let mut out = format!("{}{}", format_square(self.from), format_square(self.to));
        if let Some(promo) = self.promotion {
            out.push(match promo {
                PieceKind::Queen => 'q',
                PieceKind::Rook => 'r',
                PieceKind::Bishop => 'b',
                PieceKind::Knight => 'n',
                _ => '?',
            });
        }
        out
    }
}

/// Result of applying a move; feeds the halfmove clock and capture lists.
#[derive(Debug, Clone, Copy)]
pub struct Applied {
    pub captured: Option<PieceKind>,
    pub next_en_passant: Option<Square>,
    pub pawn_move: bool,
}

const KNIGHT_JUMPS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];
const KING_STEPS: [(i8, i8); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];
const BISHOP_RAYS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ROOK_RAYS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

fn offset(sq: Square, df: i8, dr: i8) -> Option<Square> {
    let file = file_of(sq) as i8 + df;
    let rank = rank_of(sq) as i8 + dr;
    if (0..8).contains(&file) && (0..8).contains(&rank) {
        Some(square(file as u8, rank as u8))
    } else {
        None
    }
}

/// Is `sq` attacked by any piece of `by`? Used for check, castling paths
/// and legality filtering.
pub fn is_attacked(board: &Board, sq: Square, by: Color) -> bool {
    let pawn_dir: i8 = if by == Color::White { 1 } else { -1 };
    for df in [-1i8, 1] {
        // A pawn on `from` attacks `sq` moving forward diagonally
        if let Some(from) = offset(sq, df, -pawn_dir) {
            if board
                .get(from)
                .is_some_and(|p| p.color == by && p.kind == PieceKind::Pawn)
            {
                return true;
            }
        }
    }

    for (df, dr) in KNIGHT_JUMPS {
        if let Some(from) = offset(sq, df, dr) {
            if board
                .get(from)
                .is_some_and(|p| p.color == by && p.kind == PieceKind::Knight)
            {
                return true;
            }
        }
    }

    for (df, dr) in KING_STEPS {
        if let Some(from) = offset(sq, df, dr) {
            if board
                .get(from)
                .is_some_and(|p| p.color == by && p.kind == PieceKind::King)
            {
                return true;
            }
        }
    }

    for (rays, kinds) in [
        (BISHOP_RAYS, [PieceKind::Bishop, PieceKind::Queen]),
        (ROOK_RAYS, [PieceKind::Rook, PieceKind::Queen]),
    ] {
        for (df, dr) in rays {
            let mut cursor = sq;
            while let Some(next) = offset(cursor, df, dr) {
                cursor = next;
                match board.get(cursor) {
                    Some(piece) => {
                        if piece.color == by && kinds.contains(&piece.kind) {
                            return true;
                        }
                        break;
                    }
                    None => continue,
                }
            }
        }
    }

    false
}

pub fn in_check(board: &Board, color: Color) -> bool {
    board
        .king_square(color)
        .is_some_and(|sq| is_attacked(board, sq, color.opponent()))
}

fn push_pawn_targets(moves: &mut Vec<ChessMove>, from: Square, to: Square, color: Color) {
    let last_rank = if color == Color::White { 7 } else { 0 };
    if rank_of(to) == last_rank {
        for promo in [
            PieceKind::Queen,
            PieceKind::Rook,
            PieceKind::Bishop,
            PieceKind::Knight,
        ] {
            moves.push(ChessMove {
                from,
                to,
                promotion: Some(promo),
            });
        }
    } else {
        moves.push(ChessMove::new(from, to));
    }
}

fn pawn_moves(
    board: &Board,
    from: Square,
    color: Color,
    en_passant: Option<Square>,
    moves: &mut Vec<ChessMove>,
) {
    let dir: i8 = if color == Color::White { 1 } else { -1 };
    if let Some(one) = offset(from, 0, dir) {
        if board.get(one).is_none() {
            push_pawn_targets(moves, from, one, color);
            let start_rank = if color == Color::White { 1 } else { 6 };
            if rank_of(from) == start_rank {
                if let Some(two) = offset(from, 0, 2 * dir) {
                    if board.get(two).is_none() {
                        moves.push(ChessMove::new(from, two));
                    }
                }
            }
        }
    }
    for df in [-1i8, 1] {
        if let Some(to) = offset(from, df, dir) {
            let capturable = board.get(to).is_some_and(|p| p.color != color);
            if capturable || en_passant == Some(to) {
                push_pawn_targets(moves, from, to, color);
            }
        }
    }
}

fn leaper_moves(
    board: &Board,
    from: Square,
    color: Color,
    steps: &[(i8, i8)],
    moves: &mut Vec<ChessMove>,
) {
    for &(df, dr) in steps {
        if let Some(to) = offset(from, df, dr) {
            if board.get(to).is_none_or(|p| p.color != color) {
                moves.push(ChessMove::new(from, to));
            }
        }
    }
}

fn slider_moves(
    board: &Board,
    from: Square,
    color: Color,
    rays: &[(i8, i8)],
    moves: &mut Vec<ChessMove>,
) {
    for &(df, dr) in rays {
        let mut cursor = from;
        while let Some(to) = offset(cursor, df, dr) {
            cursor = to;
            match board.get(to) {
                None => moves.push(ChessMove::new(from, to)),
                Some(piece) => {
                    if piece.color != color {
                        moves.push(ChessMove::new(from, to));
                    }
                    break;
                }
            }
        }
    }
}

fn castling_moves(board: &Board, color: Color, moves: &mut Vec<ChessMove>) {
    if in_check(board, color) {
        return;
    }
    let rank = if color == Color::White { 0 } else { 7 };
    let king_home = square(4, rank);
    let enemy = color.opponent();

    for (kingside, between, path) in [
        (true, vec![square(5, rank), square(6, rank)], [square(5, rank), square(6, rank)]),
        (
            false,
            vec![square(1, rank), square(2, rank), square(3, rank)],
            [square(3, rank), square(2, rank)],
        ),
    ] {
        if !board.castling_right(color, kingside) {
            continue;
        }
        if between.iter().any(|&sq| board.get(sq).is_some()) {
            continue;
        }
        if path.iter().any(|&sq| is_attacked(board, sq, enemy)) {
            continue;
        }
        let to = if kingside {
            square(6, rank)
        } else {
            square(2, rank)
        };
        moves.push(ChessMove::new(king_home, to));
    }
}

pub fn pseudo_moves(board: &Board, color: Color, en_passant: Option<Square>) -> Vec<ChessMove> {
    let mut moves = Vec::with_capacity(64);
    for (from, piece) in board.pieces(color) {
        match piece.kind {
            PieceKind::Pawn => pawn_moves(board, from, color, en_passant, &mut moves),
            PieceKind::Knight => leaper_moves(board, from, color, &KNIGHT_JUMPS, &mut moves),
            PieceKind::Bishop => slider_moves(board, from, color, &BISHOP_RAYS, &mut moves),
            PieceKind::Rook => slider_moves(board, from, color, &ROOK_RAYS, &mut moves),
            PieceKind::Queen => {
                slider_moves(board, from, color, &BISHOP_RAYS, &mut moves);
                slider_moves(board, from, color, &ROOK_RAYS, &mut moves);
            }
            PieceKind::King => leaper_moves(board, from, color, &KING_STEPS, &mut moves),
        }
    }
    castling_moves(board, color, &mut moves);
    moves
}

/// All moves legal under the self-check rule.
pub fn legal_moves(board: &Board, color: Color, en_passant: Option<Square>) -> Vec<ChessMove> {
    pseudo_moves(board, color, en_passant)
        .into_iter()
        .filter(|mv| {
            let mut scratch = board.clone();
            apply(&mut scratch, mv, en_passant);
            !in_check(&scratch, color)
        })
        .collect()
}

/// Apply a pseudo-legal move, handling en passant capture, castling rook
/// relocation and promotion. Returns what the caller needs for clocks and
/// capture lists.
pub fn apply(board: &mut Board, mv: &ChessMove, en_passant: Option<Square>) -> Applied {
    let mut piece = match board.take(mv.from) {
        Some(piece) => piece,
        None => {
            return Applied {
                captured: None,
                next_en_passant: None,
                pawn_move: false,
            }
        }
    };
    let color = piece.color;
    let pawn_move = piece.kind == PieceKind::Pawn;
    let mut captured = board.take(mv.to).map(|p| p.kind);

    // En passant: the captured pawn is behind the target square
    if pawn_move && captured.is_none() && en_passant == Some(mv.to) && file_of(mv.from) != file_of(mv.to)
    {
        let dir: i8 = if color == Color::White { 1 } else { -1 };
        if let Some(victim_sq) = offset(mv.to, 0, -dir) {
            captured = board.take(victim_sq).map(|p| p.kind);
        }
    }

    // Castling: king travels two files, the rook jumps over
    if piece.kind == PieceKind::King && file_of(mv.from).abs_diff(file_of(mv.to)) == 2 {
        let rank = rank_of(mv.from);
        let (rook_from, rook_to) = if file_of(mv.to) == 6 {
            (square(7, rank), square(5, rank))
        } else {
            (square(0, rank), square(3, rank))
        };
        if let Some(mut rook) = board.take(rook_from) {
            rook.has_moved = true;
            board.set(rook_to, Some(rook));
        }
    }

    let last_rank = if color == Color::White { 7 } else { 0 };
    if pawn_move && rank_of(mv.to) == last_rank {
        piece.kind = mv.promotion.unwrap_or(PieceKind::Queen);
    }
    piece.has_moved = true;
    board.set(mv.to, Some(piece));

    let next_en_passant = if pawn_move && rank_of(mv.from).abs_diff(rank_of(mv.to)) == 2 {
        let dir: i8 = if color == Color::White { 1 } else { -1 };
        offset(mv.from, 0, dir)
    } else {
        None
    };

    Applied {
        captured,
        next_en_passant,
        pawn_move,
    }
}

/// Material-only draw detection: bare kings, or a lone minor piece, or
/// same-coloured lone bishops.
pub fn insufficient_material(board: &Board) -> bool {
    let mut minors: Vec<(Color, PieceKind, Square)> = Vec::new();
    for color in [Color::White, Color::Black] {
        for (sq, piece) in board.pieces(color) {
            match piece.kind {
                PieceKind::King => {}
                PieceKind::Bishop | PieceKind::Knight => minors.push((color, piece.kind, sq)),
                _ => return false,
            }
        }
    }
    match minors.as_slice() {
        [] | [_] => true,
        [(ca, PieceKind::Bishop, sa), (cb, PieceKind::Bishop, sb)] if ca != cb => {
            let shade = |sq: &Square| (file_of(*sq) + rank_of(*sq)) % 2;
            shade(sa) == shade(sb)
        }
        _ => false,
    }
}
