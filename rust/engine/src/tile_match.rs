use serde::Serialize;

use crate::errors::EngineError;
use crate::game::{MoveOutcome, TickOutcome};
use crate::rng::SessionRng;
use crate::seat::{PlayerId, Seat};

pub const BOARD_TILES: usize = 64;
pub const MATCH_DURATION_MS: u64 = 60_000;
const MATCH_SCORE_BASE: u32 = 10;
const COLOURS: [TileColour; 6] = [
    TileColour::Ruby,
    TileColour::Amber,
    TileColour::Jade,
    TileColour::Azure,
    TileColour::Violet,
    TileColour::Pearl,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TileColour {
    Ruby,
    Amber,
    Jade,
    Azure,
    Violet,
    Pearl,
}

#[derive(Debug, Clone, Serialize)]
pub struct Tile {
    pub id: usize,
    pub colour: TileColour,
    pub matched: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchEntry {
    pub player_id: PlayerId,
    pub score: u32,
    pub combo: u32,
    pub tiles_cleared: u32,
    /// Auxiliary client-reported score; informational only, the server's
    /// own tally is authoritative.
    pub submitted_score: Option<u32>,
}

/// 8x8 board of 32 colour pairs on a 60 second countdown. Both players pick
/// pairs concurrently; a same-colour pick scores and extends the combo, a
/// mismatched pick is still a legal move but resets the combo.
#[derive(Debug, Clone)]
pub struct TileMatchState {
    tiles: Vec<Tile>,
    entries: Vec<MatchEntry>,
    ended: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TileMatchView {
    pub tiles: Vec<Tile>,
    pub players: Vec<MatchEntry>,
    pub remaining_ms: u64,
    pub game_over: bool,
    pub winner: Option<PlayerId>,
}

impl TileMatchState {
    pub fn new(seats: &[Seat], rng: &mut SessionRng) -> Self {
        // 32 pairs over six colours, then a seeded shuffle of positions
        let mut colours = Vec::with_capacity(BOARD_TILES);
        for pair in 0..BOARD_TILES / 2 {
            let colour = COLOURS[pair % COLOURS.len()];
            colours.push(colour);
            colours.push(colour);
        }
        rng.shuffle(&mut colours);

        let tiles = colours
            .into_iter()
            .enumerate()
            .map(|(id, colour)| Tile {
                id,
                colour,
                matched: false,
            })
            .collect();

        let entries = seats
            .iter()
            .map(|seat| MatchEntry {
                player_id: seat.player_id.clone(),
                score: 0,
                combo: 0,
                tiles_cleared: 0,
                submitted_score: None,
            })
            .collect();

        Self {
            tiles,
            entries,
            ended: false,
        }
    }

    pub fn match_pair(
        &mut self,
        seat: usize,
        first: usize,
        second: usize,
    ) -> Result<MoveOutcome, EngineError> {
        if self.ended {
            return Err(EngineError::SessionEnded);
        }
        let entry = self
            .entries
            .get_mut(seat)
            .ok_or(EngineError::UnknownPlayer)?;
        if first == second {
            return Err(EngineError::illegal("a pair needs two distinct tiles"));
        }
        if first >= BOARD_TILES || second >= BOARD_TILES {
            return Err(EngineError::illegal("tile id out of range"));
        }
        if self.tiles[first].matched || self.tiles[second].matched {
            return Err(EngineError::illegal("tile already matched"));
        }

        if self.tiles[first].colour == self.tiles[second].colour {
            self.tiles[first].matched = true;
            self.tiles[second].matched = true;
            entry.score += MATCH_SCORE_BASE * (entry.combo + 1);
            entry.combo += 1;
            entry.tiles_cleared += 2;
        } else {
            entry.combo = 0;
        }

        if self.tiles.iter().all(|tile| tile.matched) {
            self.ended = true;
        }

        Ok(MoveOutcome {
            game_over: self.ended,
        })
    }

    /// Record an auxiliary score submission. The value is stored for
    /// operator comparison; it never replaces the server tally.
    pub fn submit_score(&mut self, seat: usize, score: u32) -> Result<u32, EngineError> {
        let entry = self
            .entries
            .get_mut(seat)
            .ok_or(EngineError::UnknownPlayer)?;
        entry.submitted_score = Some(score);
        Ok(entry.score)
    }

    pub fn tick(&mut self, now_ms: u64) -> TickOutcome {
        if !self.ended && now_ms >= MATCH_DURATION_MS {
            self.ended = true;
        }
        TickOutcome {
            game_over: self.ended,
        }
    }

    pub fn is_over(&self) -> bool {
        self.ended
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn entries(&self) -> &[MatchEntry] {
        &self.entries
    }

    pub fn rename_seat(&mut self, seat: usize, player_id: &str) {
        if let Some(entry) = self.entries.get_mut(seat) {
            entry.player_id = player_id.to_string();
        }
    }

    pub fn ranking(&self) -> Vec<PlayerId> {
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        // Seat index breaks score ties, keeping the podium deterministic
        order.sort_by(|&a, &b| {
            self.entries[b]
                .score
                .cmp(&self.entries[a].score)
                .then(a.cmp(&b))
        });
        order
            .into_iter()
            .map(|seat| self.entries[seat].player_id.clone())
            .collect()
    }

    pub fn view(&self, now_ms: u64) -> TileMatchView {
        let winner = if self.ended {
            self.ranking().first().cloned()
        } else {
            None
        };
        TileMatchView {
            tiles: self.tiles.clone(),
            players: self.entries.clone(),
            remaining_ms: MATCH_DURATION_MS.saturating_sub(now_ms),
            game_over: self.ended,
            winner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameKind;
    use crate::seat::assign_seats;

    fn fresh(seed: u64) -> TileMatchState {
        let seats = assign_seats(GameKind::TileMatch, &["a".to_string(), "b".to_string()]);
        let mut rng = SessionRng::from_seed(seed);
        TileMatchState::new(&seats, &mut rng)
    }

    fn find_pair(state: &TileMatchState) -> (usize, usize) {
        let tiles = state.tiles();
        for i in 0..tiles.len() {
            for j in (i + 1)..tiles.len() {
                if !tiles[i].matched && !tiles[j].matched && tiles[i].colour == tiles[j].colour {
                    return (i, j);
                }
            }
        }
        panic!("board has no unmatched pair");
    }

    #[test]
    fn board_holds_exact_pairs() {
        let state = fresh(3);
        assert_eq!(state.tiles().len(), BOARD_TILES);
        for colour in COLOURS {
            let count = state.tiles().iter().filter(|t| t.colour == colour).count();
            assert_eq!(count % 2, 0, "{colour:?} tiles must pair up");
        }
    }

    #[test]
    fn same_seed_same_board() {
        let a = fresh(11);
        let b = fresh(11);
        for (x, y) in a.tiles().iter().zip(b.tiles().iter()) {
            assert_eq!(x.colour, y.colour);
        }
    }

    #[test]
    fn matching_scores_and_combos() {
        let mut state = fresh(5);
        let (i, j) = find_pair(&state);
        state.match_pair(0, i, j).expect("pair accepted");
        assert_eq!(state.entries()[0].score, 10);
        assert_eq!(state.entries()[0].combo, 1);

        let (i, j) = find_pair(&state);
        state.match_pair(0, i, j).expect("pair accepted");
        assert_eq!(state.entries()[0].score, 30);
        assert_eq!(state.entries()[0].combo, 2);
    }

    #[test]
    fn mismatch_resets_combo_but_is_legal() {
        let mut state = fresh(5);
        let (i, j) = find_pair(&state);
        state.match_pair(0, i, j).expect("pair accepted");

        let tiles = state.tiles();
        let (x, y) = (0..tiles.len())
            .flat_map(|x| ((x + 1)..tiles.len()).map(move |y| (x, y)))
            .find(|&(x, y)| {
                !tiles[x].matched && !tiles[y].matched && tiles[x].colour != tiles[y].colour
            })
            .expect("mismatched pair exists");
        state.match_pair(0, x, y).expect("mismatch is still legal");
        assert_eq!(state.entries()[0].combo, 0);
        assert_eq!(state.entries()[0].score, 10);
    }

    #[test]
    fn matched_tiles_cannot_be_reused() {
        let mut state = fresh(5);
        let (i, j) = find_pair(&state);
        state.match_pair(0, i, j).expect("pair accepted");
        assert!(matches!(
            state.match_pair(1, i, j),
            Err(EngineError::IllegalMove(_))
        ));
    }

    #[test]
    fn countdown_ends_the_game() {
        let mut state = fresh(5);
        assert!(!state.tick(59_999).game_over);
        assert!(state.tick(60_000).game_over);
        assert_eq!(
            state.match_pair(0, 0, 1),
            Err(EngineError::SessionEnded)
        );
    }

    #[test]
    fn ranking_orders_by_score_then_seat() {
        let mut state = fresh(5);
        let (i, j) = find_pair(&state);
        state.match_pair(1, i, j).expect("pair accepted");
        state.tick(MATCH_DURATION_MS);
        assert_eq!(state.ranking(), vec!["b".to_string(), "a".to_string()]);

        let tied = fresh(6);
        assert_eq!(tied.ranking(), vec!["a".to_string(), "b".to_string()]);
    }
}
