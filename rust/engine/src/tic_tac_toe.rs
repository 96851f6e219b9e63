use serde::Serialize;

use crate::errors::EngineError;
use crate::game::MoveOutcome;
use crate::seat::{PlayerId, Seat};

/// The eight winning lines of the 3x3 grid.
const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    Cross,
    Nought,
}

impl Mark {
    fn for_seat(seat: usize) -> Self {
        if seat == 0 {
            Mark::Cross
        } else {
            Mark::Nought
        }
    }
}

#[derive(Debug, Clone)]
pub struct TicTacToeState {
    players: [PlayerId; 2],
    grid: [Option<Mark>; 9],
    turn: usize,
    history: Vec<(usize, usize)>,
    winner: Option<usize>,
    drawn: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicTacToeView {
    pub players: Vec<PlayerId>,
    pub grid: Vec<Option<Mark>>,
    pub current_mark: Option<Mark>,
    pub history: Vec<(usize, usize)>,
    pub winner: Option<PlayerId>,
    pub draw: bool,
    pub game_over: bool,
}

impl TicTacToeState {
    pub fn new(seats: &[Seat]) -> Self {
        Self {
            players: [seats[0].player_id.clone(), seats[1].player_id.clone()],
            grid: [None; 9],
            turn: 0,
            history: Vec::new(),
            winner: None,
            drawn: false,
        }
    }

    pub fn mark(&mut self, seat: usize, cell: usize) -> Result<MoveOutcome, EngineError> {
        if self.is_over() {
            return Err(EngineError::SessionEnded);
        }
        if seat >= 2 {
            return Err(EngineError::UnknownPlayer);
        }
        if seat != self.turn {
            return Err(EngineError::NotYourTurn);
        }
        if cell >= 9 {
            return Err(EngineError::illegal(format!("cell {cell} out of range")));
        }
        if self.grid[cell].is_some() {
            return Err(EngineError::illegal(format!("cell {cell} already taken")));
        }

        let mark = Mark::for_seat(seat);
        self.grid[cell] = Some(mark);
        self.history.push((seat, cell));

        if LINES
            .iter()
            .any(|line| line.iter().all(|&c| self.grid[c] == Some(mark)))
        {
            self.winner = Some(seat);
        } else if self.history.len() == 9 {
            self.drawn = true;
        } else {
            self.turn = 1 - self.turn;
        }

        Ok(MoveOutcome {
            game_over: self.is_over(),
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

    pub fn grid(&self) -> &[Option<Mark>; 9] {
        &self.grid
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
            // Draw (or unfinished) keeps seat order for determinism
            None => self.players.to_vec(),
        }
    }

    pub fn view(&self) -> TicTacToeView {
        TicTacToeView {
            players: self.players.to_vec(),
            grid: self.grid.to_vec(),
            current_mark: self.turn().map(Mark::for_seat),
            history: self.history.clone(),
            winner: self.winner.map(|seat| self.players[seat].clone()),
            draw: self.drawn,
            game_over: self.is_over(),
        }
    }
}
