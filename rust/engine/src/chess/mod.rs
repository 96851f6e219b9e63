//! Full legal chess behind the session contract: movement, castling, en
//! passant, promotion, check and the draw rules, plus per-side clocks and
//! the emoji side-channel the table UI polls.

mod board;
mod rules;

pub use board::{
    file_of, format_square, parse_square, rank_of, square, Board, Color, Piece, PieceKind, Square,
};
pub use rules::{apply as apply_unchecked, in_check, insufficient_material, is_attacked, legal_moves, Applied, ChessMove};

use std::collections::HashMap;
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::game::{MoveOutcome, TickOutcome};
use crate::seat::{PlayerId, Seat};

const EMOJI_LOG_CAPACITY: usize = 50;
const FIFTY_MOVE_HALFMOVES: u32 = 100;
const THREEFOLD: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromotionPiece {
    Queen,
    Rook,
    Bishop,
    Knight,
}

impl PromotionPiece {
    fn kind(self) -> PieceKind {
        match self {
            PromotionPiece::Queen => PieceKind::Queen,
            PromotionPiece::Rook => PieceKind::Rook,
            PromotionPiece::Bishop => PieceKind::Bishop,
            PromotionPiece::Knight => PieceKind::Knight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChessEndReason {
    Checkmate,
    Stalemate,
    Timeout,
    InsufficientMaterial,
    ThreefoldRepetition,
    FiftyMoveRule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChessOutcome {
    pub winner: Option<Color>,
    pub reason: ChessEndReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmojiEntry {
    pub player_id: PlayerId,
    pub emoji: String,
    pub at_ms: u64,
    pub spectator: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub uci: String,
    pub by: Color,
    pub at_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PieceView {
    pub color: Color,
    pub kind: PieceKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChessView {
    pub players: Vec<PlayerId>,
    pub board: Vec<Option<PieceView>>,
    pub side_to_move: Color,
    pub clocks_ms: [u64; 2],
    pub captured_by_white: Vec<PieceKind>,
    pub captured_by_black: Vec<PieceKind>,
    pub history: Vec<HistoryEntry>,
    pub emoji_log: Vec<EmojiEntry>,
    pub in_check: bool,
    pub fen: String,
    pub winner: Option<PlayerId>,
    pub reason: Option<ChessEndReason>,
    pub game_over: bool,
}

#[derive(Debug, Clone)]
pub struct ChessState {
    players: [PlayerId; 2],
    board: Board,
    side_to_move: Color,
    en_passant: Option<Square>,
    captured: [Vec<PieceKind>; 2],
    history: Vec<HistoryEntry>,
    clocks_ms: [i64; 2],
    turn_started_ms: u64,
    halfmove_clock: u32,
    fullmove_number: u32,
    repetitions: HashMap<String, u8>,
    emoji_log: VecDeque<EmojiEntry>,
    outcome: Option<ChessOutcome>,
}

impl ChessState {
    pub fn new(seats: &[Seat], clock_ms: u64) -> Self {
        let mut state = Self {
            players: [seats[0].player_id.clone(), seats[1].player_id.clone()],
            board: Board::initial(),
            side_to_move: Color::White,
            en_passant: None,
            captured: [Vec::new(), Vec::new()],
            history: Vec::new(),
            clocks_ms: [clock_ms as i64, clock_ms as i64],
            turn_started_ms: 0,
            halfmove_clock: 0,
            fullmove_number: 1,
            repetitions: HashMap::new(),
            emoji_log: VecDeque::new(),
            outcome: None,
        };
        state.count_repetition();
        state
    }

    pub fn apply(
        &mut self,
        seat: usize,
        from: &str,
        to: &str,
        promotion: Option<PromotionPiece>,
        now_ms: u64,
    ) -> Result<MoveOutcome, EngineError> {
        if self.outcome.is_some() {
            return Err(EngineError::SessionEnded);
        }
        if seat >= 2 {
            return Err(EngineError::UnknownPlayer);
        }
        let color = Color::for_seat(seat);
        if color != self.side_to_move {
            return Err(EngineError::NotYourTurn);
        }

        let from_sq =
            parse_square(from).ok_or_else(|| EngineError::illegal(format!("bad square {from:?}")))?;
        let to_sq =
            parse_square(to).ok_or_else(|| EngineError::illegal(format!("bad square {to:?}")))?;

        let candidate = legal_moves(&self.board, color, self.en_passant)
            .into_iter()
            .find(|mv| mv.from == from_sq && mv.to == to_sq)
            .ok_or_else(|| {
                EngineError::illegal(format!("{from}{to} is not a legal move"))
            })?;

        // The flag can fall between polls; an over-time move loses first
        let elapsed = now_ms.saturating_sub(self.turn_started_ms) as i64;
        if self.clocks_ms[seat] <= elapsed {
            self.clocks_ms[seat] = 0;
            self.outcome = Some(ChessOutcome {
                winner: Some(color.opponent()),
                reason: ChessEndReason::Timeout,
            });
            return Ok(MoveOutcome { game_over: true });
        }
        self.clocks_ms[seat] -= elapsed;

        let mv = ChessMove {
            from: candidate.from,
            to: candidate.to,
            promotion: candidate
                .promotion
                .map(|_| promotion.map_or(PieceKind::Queen, PromotionPiece::kind)),
        };
        let applied = rules::apply(&mut self.board, &mv, self.en_passant);
        if let Some(kind) = applied.captured {
            self.captured[seat].push(kind);
        }
        self.en_passant = applied.next_en_passant;
        if applied.pawn_move || applied.captured.is_some() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }
        if color == Color::Black {
            self.fullmove_number += 1;
        }
        self.history.push(HistoryEntry {
            uci: mv.uci(),
            by: color,
            at_ms: now_ms,
        });
        self.side_to_move = color.opponent();
        self.turn_started_ms = now_ms;
        let seen = self.count_repetition();

        self.detect_terminal(color, seen);
        Ok(MoveOutcome {
            game_over: self.outcome.is_some(),
        })
    }

    fn detect_terminal(&mut self, mover: Color, repetition_count: u8) {
        let opponent = self.side_to_move;
        if legal_moves(&self.board, opponent, self.en_passant).is_empty() {
            self.outcome = Some(if in_check(&self.board, opponent) {
                ChessOutcome {
                    winner: Some(mover),
                    reason: ChessEndReason::Checkmate,
                }
            } else {
                ChessOutcome {
                    winner: None,
                    reason: ChessEndReason::Stalemate,
                }
            });
        } else if insufficient_material(&self.board) {
            self.outcome = Some(ChessOutcome {
                winner: None,
                reason: ChessEndReason::InsufficientMaterial,
            });
        } else if self.halfmove_clock >= FIFTY_MOVE_HALFMOVES {
            self.outcome = Some(ChessOutcome {
                winner: None,
                reason: ChessEndReason::FiftyMoveRule,
            });
        } else if repetition_count >= THREEFOLD {
            self.outcome = Some(ChessOutcome {
                winner: None,
                reason: ChessEndReason::ThreefoldRepetition,
            });
        }
    }

    /// Key for the repetition table: everything FEN counts as "the same
    /// position" (placement, side to move, castling rights, en passant).
    fn position_key(&self) -> String {
        format!(
            "{} {} {} {}",
            self.board.fen_placement(),
            if self.side_to_move == Color::White { 'w' } else { 'b' },
            self.board.castling_field(),
            self.en_passant.map_or("-".to_string(), format_square),
        )
    }

    fn count_repetition(&mut self) -> u8 {
        let key = self.position_key();
        let entry = self.repetitions.entry(key).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Clock watchdog: the side to move loses when its flag falls.
    pub fn tick(&mut self, now_ms: u64) -> TickOutcome {
        if self.outcome.is_none() {
            let seat = self.side_to_move.seat();
            let elapsed = now_ms.saturating_sub(self.turn_started_ms) as i64;
            if self.clocks_ms[seat] <= elapsed {
                self.clocks_ms[seat] = 0;
                self.outcome = Some(ChessOutcome {
                    winner: Some(self.side_to_move.opponent()),
                    reason: ChessEndReason::Timeout,
                });
            }
        }
        TickOutcome {
            game_over: self.outcome.is_some(),
        }
    }

    /// Append to the bounded emoji log. Anyone may post; non-participants
    /// are tagged as spectators.
    pub fn send_emoji(&mut self, player_id: &str, emoji: &str, now_ms: u64) {
        let spectator = !self.players.iter().any(|p| p == player_id);
        self.emoji_log.push_back(EmojiEntry {
            player_id: player_id.to_string(),
            emoji: emoji.to_string(),
            at_ms: now_ms,
            spectator,
        });
        while self.emoji_log.len() > EMOJI_LOG_CAPACITY {
            self.emoji_log.pop_front();
        }
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<ChessOutcome> {
        self.outcome
    }

    pub fn turn(&self) -> Option<usize> {
        if self.outcome.is_some() {
            None
        } else {
            Some(self.side_to_move.seat())
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn rename_seat(&mut self, seat: usize, player_id: &str) {
        if let Some(slot) = self.players.get_mut(seat) {
            *slot = player_id.to_string();
        }
    }

    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    pub fn current_legal_moves(&self) -> Vec<ChessMove> {
        if self.outcome.is_some() {
            return Vec::new();
        }
        legal_moves(&self.board, self.side_to_move, self.en_passant)
    }

    pub fn ranking(&self) -> Vec<PlayerId> {
        match self.outcome.and_then(|o| o.winner) {
            Some(color) => vec![
                self.players[color.seat()].clone(),
                self.players[color.opponent().seat()].clone(),
            ],
            None => self.players.to_vec(),
        }
    }

    pub fn fen(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            self.board.fen_placement(),
            if self.side_to_move == Color::White { 'w' } else { 'b' },
            self.board.castling_field(),
            self.en_passant.map_or("-".to_string(), format_square),
            self.halfmove_clock,
            self.fullmove_number,
        )
    }

    /// Rebuild a position from FEN with fresh clocks. Used for position
    /// round-trips and test setups; history and captures start empty.
    pub fn from_fen(fen: &str, seats: &[Seat], clock_ms: u64) -> Result<Self, String> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(format!("expected 6 FEN fields, got {}", fields.len()));
        }
        let board = Board::from_fen_placement(fields[0], fields[2])?;
        let side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(format!("bad side field {other:?}")),
        };
        let en_passant = match fields[3] {
            "-" => None,
            text => Some(parse_square(text).ok_or_else(|| format!("bad ep square {text:?}"))?),
        };
        let halfmove_clock = fields[4]
            .parse()
            .map_err(|_| format!("bad halfmove clock {:?}", fields[4]))?;
        let fullmove_number = fields[5]
            .parse()
            .map_err(|_| format!("bad fullmove number {:?}", fields[5]))?;

        let mut state = Self {
            players: [seats[0].player_id.clone(), seats[1].player_id.clone()],
            board,
            side_to_move,
            en_passant,
            captured: [Vec::new(), Vec::new()],
            history: Vec::new(),
            clocks_ms: [clock_ms as i64, clock_ms as i64],
            turn_started_ms: 0,
            halfmove_clock,
            fullmove_number,
            repetitions: HashMap::new(),
            emoji_log: VecDeque::new(),
            outcome: None,
        };
        state.count_repetition();
        Ok(state)
    }

    pub fn view(&self, now_ms: u64) -> ChessView {
        let mut clocks = [
            self.clocks_ms[0].max(0) as u64,
            self.clocks_ms[1].max(0) as u64,
        ];
        if self.outcome.is_none() {
            let seat = self.side_to_move.seat();
            let elapsed = now_ms.saturating_sub(self.turn_started_ms);
            clocks[seat] = clocks[seat].saturating_sub(elapsed);
        }

        ChessView {
            players: self.players.to_vec(),
            board: (0..64)
                .map(|sq| {
                    self.board.get(sq).map(|p| PieceView {
                        color: p.color,
                        kind: p.kind,
                    })
                })
                .collect(),
            side_to_move: self.side_to_move,
            clocks_ms: clocks,
            captured_by_white: self.captured[0].clone(),
            captured_by_black: self.captured[1].clone(),
            history: self.history.clone(),
            emoji_log: self.emoji_log.iter().cloned().collect(),
            in_check: in_check(&self.board, self.side_to_move),
            fen: self.fen(),
            winner: self
                .outcome
                .and_then(|o| o.winner)
                .map(|color| self.players[color.seat()].clone()),
            reason: self.outcome.map(|o| o.reason),
            game_over: self.outcome.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameKind;
    use crate::seat::assign_seats;

    fn fresh(clock_ms: u64) -> ChessState {
        let seats = assign_seats(GameKind::Chess, &["w".to_string(), "b".to_string()]);
        ChessState::new(&seats, clock_ms)
    }

    fn play(state: &mut ChessState, moves: &[(&str, &str)]) {
        for (i, (from, to)) in moves.iter().enumerate() {
            let seat = i % 2;
            state
                .apply(seat, from, to, None, (i as u64 + 1) * 100)
                .unwrap_or_else(|e| panic!("move {from}{to} rejected: {e}"));
        }
    }

    #[test]
    fn fools_mate_is_checkmate_for_black() {
        let mut state = fresh(300_000);
        play(
            &mut state,
            &[("f2", "f3"), ("e7", "e5"), ("g2", "g4"), ("d8", "h4")],
        );
        assert!(state.is_over());
        let outcome = state.outcome().expect("outcome");
        assert_eq!(outcome.reason, ChessEndReason::Checkmate);
        assert_eq!(outcome.winner, Some(Color::Black));
        assert_eq!(state.ranking(), vec!["b".to_string(), "w".to_string()]);
    }

    #[test]
    fn out_of_turn_and_illegal_moves_are_typed() {
        let mut state = fresh(300_000);
        assert_eq!(
            state.apply(1, "e7", "e5", None, 10),
            Err(EngineError::NotYourTurn)
        );
        assert!(matches!(
            state.apply(0, "e2", "e5", None, 10),
            Err(EngineError::IllegalMove(_))
        ));
        assert!(matches!(
            state.apply(0, "z9", "e4", None, 10),
            Err(EngineError::IllegalMove(_))
        ));
    }

    #[test]
    fn clock_ticks_down_and_flags_fall() {
        let mut state = fresh(1_000);
        assert!(!state.tick(900).game_over);
        let result = state.tick(1_200);
        assert!(result.game_over);
        let outcome = state.outcome().expect("outcome");
        assert_eq!(outcome.reason, ChessEndReason::Timeout);
        assert_eq!(outcome.winner, Some(Color::Black));
        assert_eq!(state.ranking()[0], "b");
    }

    #[test]
    fn move_spends_the_mover_clock_only() {
        let mut state = fresh(300_000);
        state.apply(0, "e2", "e4", None, 2_000).expect("move");
        let view = state.view(2_000);
        assert_eq!(view.clocks_ms[0], 298_000);
        assert_eq!(view.clocks_ms[1], 300_000);
    }

    #[test]
    fn threefold_repetition_draws() {
        let mut state = fresh(300_000);
        play(
            &mut state,
            &[
                ("g1", "f3"),
                ("g8", "f6"),
                ("f3", "g1"),
                ("f6", "g8"),
                ("g1", "f3"),
                ("g8", "f6"),
                ("f3", "g1"),
                ("f6", "g8"),
            ],
        );
        assert!(state.is_over());
        assert_eq!(
            state.outcome().map(|o| o.reason),
            Some(ChessEndReason::ThreefoldRepetition)
        );
        // Draw podium keeps seat order
        assert_eq!(state.ranking(), vec!["w".to_string(), "b".to_string()]);
    }

    #[test]
    fn fen_round_trips_through_from_fen() {
        let mut state = fresh(300_000);
        play(&mut state, &[("e2", "e4"), ("c7", "c5"), ("g1", "f3")]);
        let fen = state.fen();
        let seats = assign_seats(GameKind::Chess, &["w".to_string(), "b".to_string()]);
        let rebuilt = ChessState::from_fen(&fen, &seats, 300_000).expect("parse fen");
        assert_eq!(rebuilt.fen(), fen);
    }

    #[test]
    fn en_passant_square_appears_in_fen_for_one_ply() {
        let mut state = fresh(300_000);
        play(&mut state, &[("e2", "e4")]);
        assert!(state.fen().contains("e3"));
        play_from(&mut state, 1, &[("g8", "f6")]);
        assert!(!state.fen().contains("e3"));
    }

    fn play_from(state: &mut ChessState, first_seat: usize, moves: &[(&str, &str)]) {
        for (i, (from, to)) in moves.iter().enumerate() {
            let seat = (first_seat + i) % 2;
            state
                .apply(seat, from, to, None, 10_000 + (i as u64) * 100)
                .unwrap_or_else(|e| panic!("move {from}{to} rejected: {e}"));
        }
    }

    #[test]
    fn emoji_log_is_bounded_and_tags_spectators() {
        let mut state = fresh(300_000);
        for i in 0..60 {
            state.send_emoji("w", "🔥", i);
        }
        state.send_emoji("lurker", "👀", 61);
        let view = state.view(62);
        assert_eq!(view.emoji_log.len(), EMOJI_LOG_CAPACITY);
        let last = view.emoji_log.last().expect("entry");
        assert!(last.spectator);
        assert!(!view.emoji_log[0].spectator);
    }

    #[test]
    fn captures_are_recorded_per_side() {
        let mut state = fresh(300_000);
        play(
            &mut state,
            &[("e2", "e4"), ("d7", "d5"), ("e4", "d5")],
        );
        let view = state.view(400);
        assert_eq!(view.captured_by_white, vec![PieceKind::Pawn]);
        assert!(view.captured_by_black.is_empty());
    }
}
