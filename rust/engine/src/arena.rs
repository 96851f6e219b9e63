use serde::Serialize;

use crate::errors::EngineError;
use crate::game::{MoveOutcome, TickOutcome};
use crate::rng::SessionRng;
use crate::seat::{PlayerId, Seat};

pub const INITIAL_ARENA_SIZE: f64 = 2000.0;
pub const MAX_ARENA_SIZE: f64 = 4000.0;
pub const EXPANSION_STEP: f64 = 250.0;
const EXPANSION_PELLETS: usize = 40;
const EDGE_HOLD_MS: u64 = 2_000;
pub const MAX_DURATION_MS: u64 = 180_000;

pub const START_RADIUS: f64 = 20.0;
const BASE_SPEED: f64 = 180.0;
const VELOCITY_APPROACH: f64 = 0.25;
const PELLET_RADIUS: f64 = 4.0;
const PELLET_MASS: f64 = 25.0;
const INITIAL_PELLETS: usize = 150;
const SPAWN_MARGIN: f64 = 100.0;

/// A larger cell absorbs a smaller one only with a clear size edge and a
/// deep overlap, so near-equals merely bump.
const ABSORB_RATIO: f64 = 1.10;
const ABSORB_OVERLAP: f64 = 0.4;

/// Ticks longer than this (stalled scheduler, debugger) are clamped so a
/// single integration step cannot teleport cells across the arena.
const MAX_STEP_MS: u64 = 250;

#[derive(Debug, Clone, Serialize)]
pub struct ArenaCell {
    pub player_id: PlayerId,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub radius: f64,
    pub alive: bool,
    pub died_at_ms: Option<u64>,
    #[serde(skip)]
    aim: Option<(f64, f64)>,
    #[serde(skip)]
    last_aim_ms: Option<u64>,
    #[serde(skip)]
    edge_since_ms: Option<u64>,
}

impl ArenaCell {
    pub fn aim(&self) -> Option<(f64, f64)> {
        self.aim
    }

    /// Top speed shrinks as the cell grows.
    pub fn max_speed(&self) -> f64 {
        BASE_SPEED * (START_RADIUS / self.radius).sqrt()
    }

    pub fn mass(&self) -> f64 {
        self.radius * self.radius
    }

    fn distance_to(&self, x: f64, y: f64) -> f64 {
        ((self.x - x).powi(2) + (self.y - y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Pellet {
    pub x: f64,
    pub y: f64,
    pub r: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExpansionEvent {
    pub at_ms: u64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone)]
pub struct ArenaState {
    width: f64,
    height: f64,
    cells: Vec<ArenaCell>,
    pellets: Vec<Pellet>,
    expansions: Vec<ExpansionEvent>,
    tick_ms: u64,
    last_tick_ms: Option<u64>,
    ended: bool,
    winner: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArenaView {
    pub width: f64,
    pub height: f64,
    pub cells: Vec<ArenaCell>,
    pub pellets: Vec<Pellet>,
    pub expansions: Vec<ExpansionEvent>,
    pub winner: Option<PlayerId>,
    pub game_over: bool,
}

impl ArenaState {
    pub fn new(seats: &[Seat], tick_ms: u64, rng: &mut SessionRng) -> Self {
        let cells = seats
            .iter()
            .map(|seat| ArenaCell {
                player_id: seat.player_id.clone(),
                x: rng.range_f64(SPAWN_MARGIN, INITIAL_ARENA_SIZE - SPAWN_MARGIN),
                y: rng.range_f64(SPAWN_MARGIN, INITIAL_ARENA_SIZE - SPAWN_MARGIN),
                vx: 0.0,
                vy: 0.0,
                radius: START_RADIUS,
                alive: true,
                died_at_ms: None,
                aim: None,
                last_aim_ms: None,
                edge_since_ms: None,
            })
            .collect();

        let pellets = (0..INITIAL_PELLETS)
            .map(|_| Pellet {
                x: rng.range_f64(PELLET_RADIUS, INITIAL_ARENA_SIZE - PELLET_RADIUS),
                y: rng.range_f64(PELLET_RADIUS, INITIAL_ARENA_SIZE - PELLET_RADIUS),
                r: PELLET_RADIUS,
            })
            .collect();

        Self {
            width: INITIAL_ARENA_SIZE,
            height: INITIAL_ARENA_SIZE,
            cells,
            pellets,
            expansions: Vec::new(),
            tick_ms: tick_ms.max(1),
            last_tick_ms: None,
            ended: false,
            winner: None,
        }
    }

    /// Record the player's cursor target. At most one aim per tick window
    /// is kept; extras and aims for dead cells are silently dropped.
    pub fn submit_aim(
        &mut self,
        seat: usize,
        x: f64,
        y: f64,
        now_ms: u64,
    ) -> Result<MoveOutcome, EngineError> {
        if self.ended {
            return Err(EngineError::SessionEnded);
        }
        let tick_ms = self.tick_ms;
        let cell = self.cells.get_mut(seat).ok_or(EngineError::UnknownPlayer)?;
        if cell.alive {
            let window_open = cell
                .last_aim_ms
                .map_or(true, |last| now_ms >= last + tick_ms);
            if window_open {
                cell.aim = Some((x, y));
                cell.last_aim_ms = Some(now_ms);
            }
        }
        Ok(MoveOutcome { game_over: false })
    }

    pub fn tick(&mut self, now_ms: u64, rng: &mut SessionRng) -> TickOutcome {
        if self.ended {
            return TickOutcome { game_over: true };
        }

        let step_ms = match self.last_tick_ms {
            Some(last) => now_ms.saturating_sub(last).min(MAX_STEP_MS),
            None => self.tick_ms,
        };
        self.last_tick_ms = Some(now_ms);
        let dt = step_ms as f64 / 1000.0;

        self.integrate(now_ms, dt);
        self.consume_pellets();
        self.resolve_absorptions(now_ms);
        self.maybe_expand(now_ms, rng);

        let alive: Vec<usize> = (0..self.cells.len())
            .filter(|&i| self.cells[i].alive)
            .collect();
        if alive.len() <= 1 {
            self.ended = true;
            self.winner = alive.first().copied();
        } else if now_ms >= MAX_DURATION_MS {
            self.ended = true;
            self.winner = alive
                .into_iter()
                .max_by(|&a, &b| {
                    self.cells[a]
                        .radius
                        .partial_cmp(&self.cells[b].radius)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(b.cmp(&a))
                });
        }

        TickOutcome {
            game_over: self.ended,
        }
    }

    fn integrate(&mut self, now_ms: u64, dt: f64) {
        let (width, height) = (self.width, self.height);
        for cell in self.cells.iter_mut().filter(|c| c.alive) {
            let max_speed = cell.max_speed();
            let (tx, ty) = match cell.aim {
                Some((ax, ay)) => {
                    let (dx, dy) = (ax - cell.x, ay - cell.y);
                    let dist = (dx * dx + dy * dy).sqrt();
                    if dist > 1.0 {
                        (dx / dist * max_speed, dy / dist * max_speed)
                    } else {
                        (0.0, 0.0)
                    }
                }
                None => (0.0, 0.0),
            };

            cell.vx += (tx - cell.vx) * VELOCITY_APPROACH;
            cell.vy += (ty - cell.vy) * VELOCITY_APPROACH;
            let speed = (cell.vx * cell.vx + cell.vy * cell.vy).sqrt();
            if speed > max_speed {
                let scale = max_speed / speed;
                cell.vx *= scale;
                cell.vy *= scale;
            }

            cell.x = (cell.x + cell.vx * dt).clamp(cell.radius, width - cell.radius);
            cell.y = (cell.y + cell.vy * dt).clamp(cell.radius, height - cell.radius);

            let on_edge = cell.x <= cell.radius
                || cell.x >= width - cell.radius
                || cell.y <= cell.radius
                || cell.y >= height - cell.radius;
            if on_edge {
                cell.edge_since_ms.get_or_insert(now_ms);
            } else {
                cell.edge_since_ms = None;
            }
        }
    }

    fn consume_pellets(&mut self) {
        for cell in self.cells.iter_mut().filter(|c| c.alive) {
            let mut eaten = 0usize;
            self.pellets.retain(|pellet| {
                if cell.distance_to(pellet.x, pellet.y) <= cell.radius {
                    eaten += 1;
                    false
                } else {
                    true
                }
            });
            if eaten > 0 {
                cell.radius = (cell.mass() + PELLET_MASS * eaten as f64).sqrt();
            }
        }
    }

    /// Pairwise sweep in seat order so concurrent overlaps resolve the same
    /// way on every replay.
    fn resolve_absorptions(&mut self, now_ms: u64) {
        for i in 0..self.cells.len() {
            for j in (i + 1)..self.cells.len() {
                if !self.cells[i].alive || !self.cells[j].alive {
                    continue;
                }
                let (big, small) = if self.cells[i].radius >= self.cells[j].radius {
                    (i, j)
                } else {
                    (j, i)
                };
                let (rb, rs) = (self.cells[big].radius, self.cells[small].radius);
                if rb < ABSORB_RATIO * rs {
                    continue;
                }
                let dist = self.cells[big].distance_to(self.cells[small].x, self.cells[small].y);
                if dist > rb - ABSORB_OVERLAP * rs {
                    continue;
                }
                self.cells[big].radius = (rb * rb + rs * rs).sqrt();
                let loser = &mut self.cells[small];
                loser.alive = false;
                loser.died_at_ms = Some(now_ms);
                loser.vx = 0.0;
                loser.vy = 0.0;
            }
        }
    }

    fn maybe_expand(&mut self, now_ms: u64, rng: &mut SessionRng) {
        if self.width >= MAX_ARENA_SIZE {
            return;
        }
        let held = self.cells.iter().any(|cell| {
            cell.alive
                && cell
                    .edge_since_ms
                    .is_some_and(|since| now_ms.saturating_sub(since) >= EDGE_HOLD_MS)
        });
        if !held {
            return;
        }

        let (old_width, old_height) = (self.width, self.height);
        self.width = (self.width + EXPANSION_STEP).min(MAX_ARENA_SIZE);
        self.height = (self.height + EXPANSION_STEP).min(MAX_ARENA_SIZE);

        // Sprinkle new pellets only into the freshly opened bands
        for _ in 0..EXPANSION_PELLETS {
            let in_right_band = rng.range_u64(0, 2) == 0;
            let (x, y) = if in_right_band {
                (
                    rng.range_f64(old_width, self.width - PELLET_RADIUS),
                    rng.range_f64(PELLET_RADIUS, self.height - PELLET_RADIUS),
                )
            } else {
                (
                    rng.range_f64(PELLET_RADIUS, old_width),
                    rng.range_f64(old_height, self.height - PELLET_RADIUS),
                )
            };
            self.pellets.push(Pellet {
                x,
                y,
                r: PELLET_RADIUS,
            });
        }

        self.expansions.push(ExpansionEvent {
            at_ms: now_ms,
            width: self.width,
            height: self.height,
        });
        for cell in &mut self.cells {
            cell.edge_since_ms = None;
        }
    }

    pub fn is_over(&self) -> bool {
        self.ended
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn cells(&self) -> &[ArenaCell] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [ArenaCell] {
        &mut self.cells
    }

    pub fn rename_seat(&mut self, seat: usize, player_id: &str) {
        if let Some(cell) = self.cells.get_mut(seat) {
            cell.player_id = player_id.to_string();
        }
    }

    pub fn pellets(&self) -> &[Pellet] {
        &self.pellets
    }

    pub fn total_mass(&self) -> f64 {
        self.cells
            .iter()
            .filter(|c| c.alive)
            .map(|c| c.mass())
            .sum()
    }

    /// Alive cells by radius, then the fallen by time of death, latest
    /// first.
    pub fn ranking(&self) -> Vec<PlayerId> {
        let mut order: Vec<usize> = (0..self.cells.len()).collect();
        order.sort_by(|&a, &b| {
            let (ca, cb) = (&self.cells[a], &self.cells[b]);
            cb.alive.cmp(&ca.alive).then_with(|| {
                if ca.alive {
                    cb.radius
                        .partial_cmp(&ca.radius)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(a.cmp(&b))
                } else {
                    cb.died_at_ms.cmp(&ca.died_at_ms).then(a.cmp(&b))
                }
            })
        });
        order
            .into_iter()
            .map(|seat| self.cells[seat].player_id.clone())
            .collect()
    }

    pub fn view(&self) -> ArenaView {
        ArenaView {
            width: self.width,
            height: self.height,
            cells: self.cells.clone(),
            pellets: self.pellets.clone(),
            expansions: self.expansions.clone(),
            winner: self
                .winner
                .map(|seat| self.cells[seat].player_id.clone()),
            game_over: self.ended,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameKind;
    use crate::seat::assign_seats;

    fn fresh(seed: u64) -> ArenaState {
        let seats = assign_seats(
            GameKind::Arena,
            &["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()],
        );
        let mut rng = SessionRng::from_seed(seed);
        ArenaState::new(&seats, 50, &mut rng)
    }

    #[test]
    fn absorption_conserves_mass() {
        let mut state = fresh(1);
        {
            let cells = state.cells_mut();
            cells[0].x = 100.0;
            cells[0].y = 100.0;
            cells[0].radius = 20.0;
            cells[1].x = 115.0;
            cells[1].y = 100.0;
            cells[1].radius = 10.0;
            // park the other two far away
            cells[2].x = 1800.0;
            cells[2].y = 1800.0;
            cells[3].x = 1800.0;
            cells[3].y = 200.0;
        }
        state.pellets.clear();
        let mut rng = SessionRng::from_seed(2);
        state
            .submit_aim(0, 115.0, 100.0, 0)
            .expect("aim accepted");
        for step in 1..=5 {
            state.tick(step * 50, &mut rng);
        }
        assert!(!state.cells()[1].alive, "small cell should be absorbed");
        let expected = 500.0_f64.sqrt();
        assert!((state.cells()[0].radius - expected).abs() < 0.1);
    }

    #[test]
    fn near_equal_cells_do_not_absorb() {
        let mut state = fresh(1);
        {
            let cells = state.cells_mut();
            cells[0].x = 100.0;
            cells[0].y = 100.0;
            cells[0].radius = 20.0;
            cells[1].x = 105.0;
            cells[1].y = 100.0;
            cells[1].radius = 19.0;
            cells[2].x = 1800.0;
            cells[2].y = 1800.0;
            cells[3].x = 1800.0;
            cells[3].y = 200.0;
        }
        state.pellets.clear();
        let mut rng = SessionRng::from_seed(2);
        state.tick(50, &mut rng);
        assert!(state.cells()[1].alive);
    }

    #[test]
    fn pellet_growth_follows_sqrt_law() {
        let mut state = fresh(3);
        state.pellets.clear();
        state.pellets.push(Pellet {
            x: state.cells()[0].x,
            y: state.cells()[0].y,
            r: PELLET_RADIUS,
        });
        let mut rng = SessionRng::from_seed(4);
        state.tick(50, &mut rng);
        let expected = (START_RADIUS * START_RADIUS + PELLET_MASS).sqrt();
        assert!((state.cells()[0].radius - expected).abs() < 1e-9);
    }

    #[test]
    fn aim_rate_limited_to_tick_window() {
        let mut state = fresh(5);
        state.submit_aim(0, 500.0, 500.0, 100).expect("first aim");
        state.submit_aim(0, 900.0, 900.0, 120).expect("second aim");
        assert_eq!(state.cells()[0].aim(), Some((500.0, 500.0)));
        state.submit_aim(0, 900.0, 900.0, 160).expect("third aim");
        assert_eq!(state.cells()[0].aim(), Some((900.0, 900.0)));
    }

    #[test]
    fn edge_hold_expands_the_arena() {
        let mut state = fresh(6);
        state.pellets.clear();
        {
            let cells = state.cells_mut();
            cells[0].x = INITIAL_ARENA_SIZE - cells[0].radius;
            cells[0].y = 1000.0;
            cells[1].x = 300.0;
            cells[2].x = 600.0;
            cells[3].x = 900.0;
        }
        state.submit_aim(0, INITIAL_ARENA_SIZE + 500.0, 1000.0, 0).expect("aim");
        let mut rng = SessionRng::from_seed(7);
        let mut now = 0;
        for _ in 0..60 {
            now += 50;
            state.tick(now, &mut rng);
        }
        assert!(!state.expansions.is_empty(), "edge hold should expand");
        let (w, h) = state.size();
        assert_eq!(w, INITIAL_ARENA_SIZE + EXPANSION_STEP);
        assert_eq!(h, INITIAL_ARENA_SIZE + EXPANSION_STEP);
        assert!(state
            .pellets()
            .iter()
            .any(|p| p.x > INITIAL_ARENA_SIZE || p.y > INITIAL_ARENA_SIZE));
    }

    #[test]
    fn mass_is_non_decreasing_across_ticks() {
        let mut state = fresh(8);
        let mut rng = SessionRng::from_seed(9);
        for cell in state.cells_mut() {
            cell.aim = Some((1000.0, 1000.0));
        }
        let mut mass = state.total_mass();
        let mut now = 0;
        for _ in 0..100 {
            now += 50;
            state.tick(now, &mut rng);
            // Eliminations move mass into the absorber, never destroy it
            let next = state.total_mass();
            assert!(next + 1e-6 >= mass);
            mass = next;
        }
    }

    #[test]
    fn max_duration_ends_with_largest_cell_winning() {
        let mut state = fresh(10);
        let mut rng = SessionRng::from_seed(11);
        state.cells_mut()[2].radius = 40.0;
        state.tick(MAX_DURATION_MS, &mut rng);
        assert!(state.is_over());
        assert_eq!(state.view().winner.as_deref(), Some("c"));
        assert_eq!(state.ranking()[0], "c");
    }

    #[test]
    fn dead_cells_rank_by_latest_death() {
        let mut state = fresh(12);
        {
            let cells = state.cells_mut();
            cells[1].alive = false;
            cells[1].died_at_ms = Some(1_000);
            cells[2].alive = false;
            cells[2].died_at_ms = Some(5_000);
            cells[0].radius = 30.0;
        }
        let ranking = state.ranking();
        assert_eq!(ranking[0], "a");
        assert_eq!(ranking[1], "d");
        assert_eq!(ranking[2], "c");
        assert_eq!(ranking[3], "b");
    }
}
