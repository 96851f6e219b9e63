use tourney_engine::arena::{ArenaCell, ArenaState};
use tourney_engine::game::{GameState, MovePayload};
use tourney_engine::rng::SessionRng;

use crate::BotDriver;

/// A prey cell this much smaller is worth chasing.
const HUNT_RATIO: f64 = 1.15;
const HUNT_RANGE: f64 = 400.0;
/// A cell this much bigger makes nearby pellets unsafe.
const THREAT_RATIO: f64 = 1.05;
const THREAT_MARGIN: f64 = 80.0;

/// Grazer with opportunism: chase the nearest clearly-smaller cell inside
/// the hunt cone, otherwise graze the closest pellet that no larger cell
/// is sitting on.
pub struct ArenaBot;

impl BotDriver for ArenaBot {
    fn decide(
        &self,
        state: &GameState,
        seat: usize,
        _rng: &mut SessionRng,
    ) -> Option<MovePayload> {
        let GameState::Arena(arena) = state else {
            return None;
        };
        let me = arena.cells().get(seat)?;
        if !me.alive {
            return None;
        }

        let (x, y) = aim_for(arena, seat, me);
        Some(MovePayload::Aim { x, y })
    }

    fn name(&self) -> &str {
        "arena-grazer"
    }
}

fn aim_for(arena: &ArenaState, seat: usize, me: &ArenaCell) -> (f64, f64) {
    if let Some(prey) = nearest_prey(arena, seat, me) {
        return (prey.x, prey.y);
    }
    if let Some(pellet) = nearest_safe_pellet(arena, me) {
        return pellet;
    }
    // Nothing worth eating: drift to the middle and wait
    let (width, height) = arena.size();
    (width / 2.0, height / 2.0)
}

fn nearest_prey<'a>(arena: &'a ArenaState, seat: usize, me: &ArenaCell) -> Option<&'a ArenaCell> {
    arena
        .cells()
        .iter()
        .enumerate()
        .filter(|(other, cell)| {
            *other != seat
                && cell.alive
                && me.radius >= HUNT_RATIO * cell.radius
                && distance(me.x, me.y, cell.x, cell.y) <= HUNT_RANGE
        })
        .min_by(|(_, a), (_, b)| {
            distance(me.x, me.y, a.x, a.y)
                .partial_cmp(&distance(me.x, me.y, b.x, b.y))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(_, cell)| cell)
}

fn nearest_safe_pellet(arena: &ArenaState, me: &ArenaCell) -> Option<(f64, f64)> {
    let threats: Vec<&ArenaCell> = arena
        .cells()
        .iter()
        .filter(|cell| cell.alive && cell.radius >= THREAT_RATIO * me.radius)
        .collect();

    arena
        .pellets()
        .iter()
        .filter(|pellet| {
            threats.iter().all(|threat| {
                distance(threat.x, threat.y, pellet.x, pellet.y) > threat.radius + THREAT_MARGIN
            })
        })
        .min_by(|a, b| {
            distance(me.x, me.y, a.x, a.y)
                .partial_cmp(&distance(me.x, me.y, b.x, b.y))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|pellet| (pellet.x, pellet.y))
}

fn distance(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourney_engine::game::{EngineConfig, GameKind};
    use tourney_engine::seat::assign_seats;

    fn fresh() -> (GameState, SessionRng) {
        let seats = assign_seats(GameKind::Arena, &["h".to_string()]);
        let mut rng = SessionRng::from_seed(21);
        let state = GameState::new(GameKind::Arena, &seats, &EngineConfig::default(), &mut rng);
        (state, rng)
    }

    #[test]
    fn emits_an_aim_for_a_live_cell() {
        let (state, mut rng) = fresh();
        let payload = ArenaBot.decide(&state, 1, &mut rng).expect("aim");
        assert!(matches!(payload, MovePayload::Aim { .. }));
    }

    #[test]
    fn dead_cells_stay_silent() {
        let (mut state, mut rng) = fresh();
        if let GameState::Arena(arena) = &mut state {
            arena.cells_mut()[1].alive = false;
        }
        assert!(ArenaBot.decide(&state, 1, &mut rng).is_none());
    }

    #[test]
    fn prefers_vulnerable_prey_over_pellets() {
        let (mut state, mut rng) = fresh();
        if let GameState::Arena(arena) = &mut state {
            let cells = arena.cells_mut();
            cells[1].x = 500.0;
            cells[1].y = 500.0;
            cells[1].radius = 40.0;
            cells[0].x = 600.0;
            cells[0].y = 500.0;
            cells[0].radius = 15.0;
            cells[2].x = 1900.0;
            cells[2].y = 1900.0;
            cells[3].x = 1900.0;
            cells[3].y = 100.0;
        }
        let payload = ArenaBot.decide(&state, 1, &mut rng).expect("aim");
        let MovePayload::Aim { x, y } = payload else {
            panic!("expected aim");
        };
        assert_eq!((x, y), (600.0, 500.0));
    }
}
