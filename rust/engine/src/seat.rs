use serde::{Deserialize, Serialize};

use crate::game::GameKind;

/// Opaque external identifier (wallet address or synthetic bot id). The
/// engines never interpret it; only the result builder converts addresses
/// to the contract's byte form.
pub type PlayerId = String;

pub const BOT_PREFIX: &str = "Bot_";

/// Role fixed at session creation; determines turn priority and colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatRole {
    White,
    Black,
    Red,
    Yellow,
    Cross,
    Nought,
    Competitor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub player_id: PlayerId,
    pub role: SeatRole,
    pub is_bot: bool,
    pub alive: bool,
}

impl Seat {
    fn human(player_id: PlayerId, role: SeatRole) -> Self {
        Self {
            player_id,
            role,
            is_bot: false,
            alive: true,
        }
    }

    fn bot(index: usize, role: SeatRole) -> Self {
        Self {
            player_id: format!("{BOT_PREFIX}{index}"),
            role,
            is_bot: true,
            alive: true,
        }
    }
}

pub fn is_bot_id(player_id: &str) -> bool {
    player_id.starts_with(BOT_PREFIX)
}

/// Role for seat `index` in a `kind` session. The first seat always gets
/// white / red / cross, matching the stable seat ordering the registry
/// guarantees (first human in the caller's list sits first).
pub fn role_for(kind: GameKind, index: usize) -> SeatRole {
    match kind {
        GameKind::Chess => {
            if index == 0 {
                SeatRole::White
            } else {
                SeatRole::Black
            }
        }
        GameKind::ConnectFour => {
            if index == 0 {
                SeatRole::Red
            } else {
                SeatRole::Yellow
            }
        }
        GameKind::TicTacToe => {
            if index == 0 {
                SeatRole::Cross
            } else {
                SeatRole::Nought
            }
        }
        GameKind::Arena | GameKind::TileMatch | GameKind::Arcade => SeatRole::Competitor,
    }
}

/// Assign seats for a new session: humans in caller order, then bot seats
/// `Bot_1…Bot_k` up to the engine's required count. Extra humans beyond the
/// seat count are not seated.
pub fn assign_seats(kind: GameKind, players: &[PlayerId]) -> Vec<Seat> {
    let required = kind.seat_count();
    let mut seats = Vec::with_capacity(required);

    for player_id in players.iter().take(required) {
        let role = role_for(kind, seats.len());
        seats.push(Seat::human(player_id.clone(), role));
    }

    let mut bot_index = 1;
    while seats.len() < required {
        let role = role_for(kind, seats.len());
        seats.push(Seat::bot(bot_index, role));
        bot_index += 1;
    }

    seats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_missing_players_with_bots() {
        let seats = assign_seats(GameKind::Chess, &["alice".to_string()]);
        assert_eq!(seats.len(), 2);
        assert_eq!(seats[0].player_id, "alice");
        assert_eq!(seats[0].role, SeatRole::White);
        assert!(!seats[0].is_bot);
        assert_eq!(seats[1].player_id, "Bot_1");
        assert_eq!(seats[1].role, SeatRole::Black);
        assert!(seats[1].is_bot);
    }

    #[test]
    fn arena_pads_to_four() {
        let seats = assign_seats(GameKind::Arena, &["a".to_string(), "b".to_string()]);
        assert_eq!(seats.len(), 4);
        assert_eq!(seats[2].player_id, "Bot_1");
        assert_eq!(seats[3].player_id, "Bot_2");
        assert!(seats.iter().all(|s| s.role == SeatRole::Competitor));
    }

    #[test]
    fn extra_players_are_not_seated() {
        let players: Vec<PlayerId> = (0..5).map(|i| format!("p{i}")).collect();
        let seats = assign_seats(GameKind::TicTacToe, &players);
        assert_eq!(seats.len(), 2);
        assert_eq!(seats[1].player_id, "p1");
    }

    #[test]
    fn bot_ids_are_recognised() {
        assert!(is_bot_id("Bot_1"));
        assert!(!is_bot_id("erd1qqqbotqqq"));
    }
}
