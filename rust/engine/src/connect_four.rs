use serde::Serialize;

use crate::errors::EngineError;
use crate::game::MoveOutcome;
use crate::seat::{PlayerId, Seat};

pub const COLUMNS: usize = 7;
pub const ROWS: usize = 6;
const WIN_LENGTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disc {
    Red,
    Yellow,
}

impl Disc {
    fn for_seat(seat: usize) -> Self {
        if seat == 0 {
            Disc::Red
        } else {
            Disc::Yellow
        }
    }
}

/// Row 0 is the bottom of the board; discs fall to the lowest empty row.
#[derive(Debug, Clone)]
pub struct ConnectFourState {
    players: [PlayerId; 2],
    grid: [[Option<Disc>; COLUMNS]; ROWS],
    turn: usize,
    last_move: Option<(usize, usize)>,
    history: Vec<(usize, usize)>,
    winner: Option<usize>,
    drawn: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectFourView {
    pub players: Vec<PlayerId>,
    pub grid: Vec<Vec<Option<Disc>>>,
    pub current_disc: Option<Disc>,
    pub last_move: Option<(usize, usize)>,
    pub history: Vec<(usize, usize)>,
    pub winner: Option<PlayerId>,
    pub draw: bool,
    pub game_over: bool,
}

impl ConnectFourState {
    pub fn new(seats: &[Seat]) -> Self {
        Self {
            players: [seats[0].player_id.clone(), seats[1].player_id.clone()],
            grid: [[None; COLUMNS]; ROWS],
            turn: 0,
            last_move: None,
            history: Vec::new(),
            winner: None,
            drawn: false,
        }
    }

    pub fn drop_disc(&mut self, seat: usize, column: usize) -> Result<MoveOutcome, EngineError> {
        if self.is_over() {
            return Err(EngineError::SessionEnded);
        }
        if seat >= 2 {
            return Err(EngineError::UnknownPlayer);
        }
        if seat != self.turn {
            return Err(EngineError::NotYourTurn);
        }
        if column >= COLUMNS {
            return Err(EngineError::illegal(format!(
                "column {column} out of range"
            )));
        }

        let row = (0..ROWS)
            .find(|&row| self.grid[row][column].is_none())
            .ok_or_else(|| EngineError::illegal(format!("column {column} is full")))?;

        let disc = Disc::for_seat(seat);
        self.grid[row][column] = Some(disc);
        self.last_move = Some((row, column));
        self.history.push((seat, column));

        if self.wins_from(row, column, disc) {
            self.winner = Some(seat);
        } else if self.history.len() == ROWS * COLUMNS {
            self.drawn = true;
        } else {
            self.turn = 1 - self.turn;
        }

        Ok(MoveOutcome {
            game_over: self.is_over(),
        })
    }

    /// Four in a row through the just-placed disc, in any of the four axes.
    fn wins_from(&self, row: usize, column: usize, disc: Disc) -> bool {
        const AXES: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];
        AXES.iter().any(|&(dr, dc)| {
            let mut run = 1;
            for sign in [1isize, -1] {
                let mut r = row as isize + dr * sign;
                let mut c = column as isize + dc * sign;
                while (0..ROWS as isize).contains(&r)
                    && (0..COLUMNS as isize).contains(&c)
                    && self.grid[r as usize][c as usize] == Some(disc)
                {
                    run += 1;
                    r += dr * sign;
                    c += dc * sign;
                }
            }
            run >= WIN_LENGTH
        })
    }

    pub fn is_over(&self) -> bool {
        self.winner.is_some() || self.drawn
    }

    pub fn turn(&self) -> Option<usize> {
        if self.is_over() {
            None
        } else {
            Some(self.turn)
        }
    }

    pub fn winner(&self) -> Option<usize> {
        self.winner
    }

    pub fn grid(&self) -> &[[Option<Disc>; COLUMNS]; ROWS] {
        &self.grid
    }

    pub fn column_open(&self, column: usize) -> bool {
        column < COLUMNS && self.grid[ROWS - 1][column].is_none()
    }

    pub fn rename_seat(&mut self, seat: usize, player_id: &str) {
        if let Some(slot) = self.players.get_mut(seat) {
            *slot = player_id.to_string();
        }
    }

    pub fn ranking(&self) -> Vec<PlayerId> {
        match self.winner {
            Some(seat) => vec![
                self.players[seat].clone(),
                self.players[1 - seat].clone(),
            ],
            None => self.players.to_vec(),
        }
    }

    pub fn view(&self) -> ConnectFourView {
        ConnectFourView {
            players: self.players.to_vec(),
            grid: self.grid.iter().map(|row| row.to_vec()).collect(),
            current_disc: self.turn().map(Disc::for_seat),
            last_move: self.last_move,
            history: self.history.clone(),
            winner: self.winner.map(|seat| self.players[seat].clone()),
            draw: self.drawn,
            game_over: self.is_over(),
        }
    }
}
