use serde::{Deserialize, Serialize};

/// Square index 0..64, a1 = 0, h1 = 7, a8 = 56.
pub type Square = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opponent(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub fn seat(self) -> usize {
        match self {
            Color::White => 0,
            Color::Black => 1,
        }
    }

    pub fn for_seat(seat: usize) -> Color {
        if seat == 0 {
            Color::White
        } else {
            Color::Black
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    fn fen_char(self, color: Color) -> char {
        let c = match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        };
        match color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }

    fn from_fen_char(c: char) -> Option<(Color, PieceKind)> {
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        let kind = match c.to_ascii_lowercase() {
            'p' => PieceKind::Pawn,
            'n' => PieceKind::Knight,
            'b' => PieceKind::Bishop,
            'r' => PieceKind::Rook,
            'q' => PieceKind::Queen,
            'k' => PieceKind::King,
            _ => return None,
        };
        Some((color, kind))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub color: Color,
    pub kind: PieceKind,
    /// Castling rights derive from this; set once the piece first moves.
    pub has_moved: bool,
}

impl Piece {
    pub fn new(color: Color, kind: PieceKind) -> Self {
        Self {
            color,
            kind,
            has_moved: false,
        }
    }
}

pub fn square(file: u8, rank: u8) -> Square {
    rank * 8 + file
}

pub fn file_of(sq: Square) -> u8 {
    sq % 8
}

pub fn rank_of(sq: Square) -> u8 {
    sq / 8
}

pub fn parse_square(text: &str) -> Option<Square> {
    let bytes = text.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let file = bytes[0].to_ascii_lowercase().checked_sub(b'a')?;
    let rank = bytes[1].checked_sub(b'1')?;
    if file < 8 && rank < 8 {
        Some(square(file, rank))
    } else {
        None
    }
}

pub fn format_square(sq: Square) -> String {
    let file = (b'a' + file_of(sq)) as char;
    let rank = (b'1' + rank_of(sq)) as char;
    format!("{file}{rank}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    squares: [Option<Piece>; 64],
}

impl Board {
    pub fn empty() -> Self {
        Self {
            squares: [None; 64],
        }
    }

    pub fn initial() -> Self {
        let mut board = Self::empty();
        let back_rank = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];
        for (file, kind) in back_rank.into_iter().enumerate() {
            board.set(square(file as u8, 0), Some(Piece::new(Color::White, kind)));
            board.set(square(file as u8, 7), Some(Piece::new(Color::Black, kind)));
            board.set(
                square(file as u8, 1),
                Some(Piece::new(Color::White, PieceKind::Pawn)),
            );
            board.set(
                square(file as u8, 6),
                Some(Piece::new(Color::Black, PieceKind::Pawn)),
            );
        }
        board
    }

    pub fn get(&self, sq: Square) -> Option<Piece> {
        self.squares[sq as usize]
    }

    pub fn set(&mut self, sq: Square, piece: Option<Piece>) {
        self.squares[sq as usize] = piece;
    }

    pub fn take(&mut self, sq: Square) -> Option<Piece> {
        self.squares[sq as usize].take()
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        (0..64).find(|&sq| {
            self.get(sq)
                .is_some_and(|p| p.color == color && p.kind == PieceKind::King)
        })
    }

    pub fn pieces(&self, color: Color) -> impl Iterator<Item = (Square, Piece)> + '_ {
        (0..64).filter_map(move |sq| {
            self.get(sq)
                .filter(|p| p.color == color)
                .map(|p| (sq, p))
        })
    }

    /// Castling right on `side` for `color`: king and the matching rook
    /// still on their home squares, neither moved.
    pub fn castling_right(&self, color: Color, kingside: bool) -> bool {
        let rank = if color == Color::White { 0 } else { 7 };
        let king_home = square(4, rank);
        let rook_home = square(if kingside { 7 } else { 0 }, rank);
        let king_ok = self
            .get(king_home)
            .is_some_and(|p| p.color == color && p.kind == PieceKind::King && !p.has_moved);
        let rook_ok = self
            .get(rook_home)
            .is_some_and(|p| p.color == color && p.kind == PieceKind::Rook && !p.has_moved);
        king_ok && rook_ok
    }

    pub fn fen_placement(&self) -> String {
        let mut out = String::new();
        for rank in (0..8).rev() {
            let mut empties = 0;
            for file in 0..8 {
                match self.get(square(file, rank)) {
                    Some(piece) => {
                        if empties > 0 {
                            out.push(char::from_digit(empties, 10).unwrap_or('0'));
                            empties = 0;
                        }
                        out.push(piece.kind.fen_char(piece.color));
                    }
                    None => empties += 1,
                }
            }
            if empties > 0 {
                out.push(char::from_digit(empties, 10).unwrap_or('0'));
            }
            if rank > 0 {
                out.push('/');
            }
        }
        out
    }

    /// Reconstruct a board from a FEN placement field. `castling` restores
    /// `has_moved` on kings and rooks; pawns off their start rank are
    /// marked moved so double-steps stay correct.
    pub fn from_fen_placement(placement: &str, castling: &str) -> Result<Self, String> {
        let mut board = Self::empty();
        let ranks: Vec<&str> = placement.split('/').collect();
        if ranks.len() != 8 {
            return Err(format!("expected 8 ranks, got {}", ranks.len()));
        }
        for (i, rank_text) in ranks.iter().enumerate() {
            let rank = 7 - i as u8;
            let mut file = 0u8;
            for c in rank_text.chars() {
                if let Some(skip) = c.to_digit(10) {
                    file += skip as u8;
                    continue;
                }
                let (color, kind) = PieceKind::from_fen_char(c)
                    .ok_or_else(|| format!("bad piece char {c:?}"))?;
                if file >= 8 {
                    return Err(format!("rank {} overflows", rank + 1));
                }
                let start_rank = match (color, kind) {
                    (Color::White, PieceKind::Pawn) => Some(1),
                    (Color::Black, PieceKind::Pawn) => Some(6),
                    _ => None,
                };
                let has_moved = start_rank.is_some_and(|r| rank != r);
                board.set(
                    square(file, rank),
                    Some(Piece {
                        color,
                        kind,
                        has_moved,
                    }),
                );
                file += 1;
            }
            if file != 8 {
                return Err(format!("rank {} is short", rank + 1));
            }
        }

        // Without a castling right, mark the relevant pieces moved so the
        // derived rights match the FEN exactly.
        for (color, king_char, queen_char) in
            [(Color::White, 'K', 'Q'), (Color::Black, 'k', 'q')]
        {
            let rank = if color == Color::White { 0 } else { 7 };
            let kingside = castling.contains(king_char);
            let queenside = castling.contains(queen_char);
            if !kingside {
                mark_moved(&mut board, square(7, rank), color, PieceKind::Rook);
            }
            if !queenside {
                mark_moved(&mut board, square(0, rank), color, PieceKind::Rook);
            }
            if !kingside && !queenside {
                mark_moved(&mut board, square(4, rank), color, PieceKind::King);
            }
        }
        Ok(board)
    }

    pub fn castling_field(&self) -> String {
        let mut out = String::new();
        if self.castling_right(Color::White, true) {
            out.push('K');
        }
        if self.castling_right(Color::White, false) {
            out.push('Q');
        }
        if self.castling_right(Color::Black, true) {
            out.push('k');
        }
        if self.castling_right(Color::Black, false) {
            out.push('q');
        }
        if out.is_empty() {
            out.push('-');
        }
        out
    }
}

fn mark_moved(board: &mut Board, sq: Square, color: Color, kind: PieceKind) {
    if let Some(piece) = board.get(sq) {
        if piece.color == color && piece.kind == kind {
            board.set(
                sq,
                Some(Piece {
                    has_moved: true,
                    ..piece
                }),
            );
        }
    }
}
