use serde::Serialize;

use crate::errors::EngineError;
use crate::game::{MoveOutcome, TickOutcome};
use crate::rng::SessionRng;
use crate::seat::{PlayerId, Seat};

pub const FIELD_WIDTH: f64 = 800.0;
pub const FIELD_HEIGHT: f64 = 600.0;
pub const MAX_DURATION_MS: u64 = 120_000;
pub const PILOT_RADIUS: f64 = 14.0;
pub const HAZARD_RADIUS: f64 = 12.0;

const START_LIVES: u8 = 3;
const HAZARD_SPAWN_MS: u64 = 1_000;
const MAX_HAZARDS: usize = 48;
const HAZARD_SPEED_MIN: f64 = 120.0;
const HAZARD_SPEED_MAX: f64 = 260.0;
const HAZARD_DESPAWN_MARGIN: f64 = 60.0;

const PILOT_MAX_SPEED: f64 = 240.0;
const PILOT_MAX_ACCEL: f64 = 480.0;
const DASH_SPEED: f64 = 520.0;
const DASH_DECAY: f64 = 700.0;
const DASH_COOLDOWN_MS: u64 = 2_000;

/// One hit grants a short grace window, otherwise a single overlap would
/// drain all three lives across consecutive ticks.
const HIT_PROTECTION_MS: u64 = 1_000;

const MAX_STEP_MS: u64 = 250;

#[derive(Debug, Clone, Serialize)]
pub struct Pilot {
    pub player_id: PlayerId,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub lives: u8,
    pub alive: bool,
    pub died_at_ms: Option<u64>,
    pub dash_ready_ms: u64,
    #[serde(skip)]
    ax: f64,
    #[serde(skip)]
    ay: f64,
    #[serde(skip)]
    protected_until_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Hazard {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub r: f64,
}

#[derive(Debug, Clone)]
pub struct ArcadeState {
    pilots: Vec<Pilot>,
    hazards: Vec<Hazard>,
    next_spawn_ms: u64,
    last_tick_ms: Option<u64>,
    ended: bool,
    winner: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArcadeView {
    pub width: f64,
    pub height: f64,
    pub pilots: Vec<Pilot>,
    pub hazards: Vec<Hazard>,
    pub winner: Option<PlayerId>,
    pub game_over: bool,
}

impl ArcadeState {
    pub fn new(seats: &[Seat]) -> Self {
        let count = seats.len();
        let pilots = seats
            .iter()
            .enumerate()
            .map(|(i, seat)| Pilot {
                player_id: seat.player_id.clone(),
                x: FIELD_WIDTH * (i as f64 + 1.0) / (count as f64 + 1.0),
                y: FIELD_HEIGHT / 2.0,
                vx: 0.0,
                vy: 0.0,
                lives: START_LIVES,
                alive: true,
                died_at_ms: None,
                dash_ready_ms: 0,
                ax: 0.0,
                ay: 0.0,
                protected_until_ms: 0,
            })
            .collect();

        Self {
            pilots,
            hazards: Vec::new(),
            next_spawn_ms: HAZARD_SPAWN_MS,
            last_tick_ms: None,
            ended: false,
            winner: None,
        }
    }

    pub fn steer(
        &mut self,
        seat: usize,
        ax: f64,
        ay: f64,
        dash: bool,
        now_ms: u64,
    ) -> Result<MoveOutcome, EngineError> {
        if self.ended {
            return Err(EngineError::SessionEnded);
        }
        let pilot = self
            .pilots
            .get_mut(seat)
            .ok_or(EngineError::UnknownPlayer)?;
        if !pilot.alive {
            return Ok(MoveOutcome { game_over: false });
        }

        let magnitude = (ax * ax + ay * ay).sqrt();
        if magnitude > PILOT_MAX_ACCEL {
            let scale = PILOT_MAX_ACCEL / magnitude;
            pilot.ax = ax * scale;
            pilot.ay = ay * scale;
        } else {
            pilot.ax = ax;
            pilot.ay = ay;
        }

        if dash && now_ms >= pilot.dash_ready_ms {
            let (dx, dy) = if magnitude > 1e-6 {
                (ax / magnitude, ay / magnitude)
            } else {
                let speed = (pilot.vx * pilot.vx + pilot.vy * pilot.vy).sqrt();
                if speed > 1e-6 {
                    (pilot.vx / speed, pilot.vy / speed)
                } else {
                    (0.0, 0.0)
                }
            };
            if dx != 0.0 || dy != 0.0 {
                pilot.vx = dx * DASH_SPEED;
                pilot.vy = dy * DASH_SPEED;
                pilot.dash_ready_ms = now_ms + DASH_COOLDOWN_MS;
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
            None => now_ms.min(MAX_STEP_MS),
        };
        self.last_tick_ms = Some(now_ms);
        let dt = step_ms as f64 / 1000.0;

        self.spawn_hazards(now_ms, rng);
        self.integrate(dt);
        self.collide(now_ms);

        let alive: Vec<usize> = (0..self.pilots.len())
            .filter(|&i| self.pilots[i].alive)
            .collect();
        if alive.len() <= 1 {
            self.ended = true;
            self.winner = alive.first().copied();
        } else if now_ms >= MAX_DURATION_MS {
            self.ended = true;
            self.winner = alive
                .into_iter()
                .max_by(|&a, &b| {
                    self.pilots[a]
                        .lives
                        .cmp(&self.pilots[b].lives)
                        .then(b.cmp(&a))
                });
        }

        TickOutcome {
            game_over: self.ended,
        }
    }

    fn spawn_hazards(&mut self, now_ms: u64, rng: &mut SessionRng) {
        while self.next_spawn_ms <= now_ms {
            self.next_spawn_ms += HAZARD_SPAWN_MS;
            if self.hazards.len() >= MAX_HAZARDS {
                continue;
            }
            // Spawn on a random edge aimed at a random interior point
            let edge = rng.range_u64(0, 4);
            let (x, y) = match edge {
                0 => (rng.range_f64(0.0, FIELD_WIDTH), -HAZARD_RADIUS),
                1 => (rng.range_f64(0.0, FIELD_WIDTH), FIELD_HEIGHT + HAZARD_RADIUS),
                2 => (-HAZARD_RADIUS, rng.range_f64(0.0, FIELD_HEIGHT)),
                _ => (FIELD_WIDTH + HAZARD_RADIUS, rng.range_f64(0.0, FIELD_HEIGHT)),
            };
            let target_x = rng.range_f64(FIELD_WIDTH * 0.2, FIELD_WIDTH * 0.8);
            let target_y = rng.range_f64(FIELD_HEIGHT * 0.2, FIELD_HEIGHT * 0.8);
            let (dx, dy) = (target_x - x, target_y - y);
            let dist = (dx * dx + dy * dy).sqrt().max(1e-6);
            let speed = rng.range_f64(HAZARD_SPEED_MIN, HAZARD_SPEED_MAX);
            self.hazards.push(Hazard {
                x,
                y,
                vx: dx / dist * speed,
                vy: dy / dist * speed,
                r: HAZARD_RADIUS,
            });
        }
    }

    fn integrate(&mut self, dt: f64) {
        for pilot in self.pilots.iter_mut().filter(|p| p.alive) {
            pilot.vx += pilot.ax * dt;
            pilot.vy += pilot.ay * dt;
            let mut speed = (pilot.vx * pilot.vx + pilot.vy * pilot.vy).sqrt();
            if speed > DASH_SPEED {
                let scale = DASH_SPEED / speed;
                pilot.vx *= scale;
                pilot.vy *= scale;
                speed = DASH_SPEED;
            }
            if speed > PILOT_MAX_SPEED {
                // dash burst bleeds back down to cruise speed
                let decayed = (speed - DASH_DECAY * dt).max(PILOT_MAX_SPEED);
                let scale = decayed / speed;
                pilot.vx *= scale;
                pilot.vy *= scale;
            }
            pilot.x = (pilot.x + pilot.vx * dt).clamp(PILOT_RADIUS, FIELD_WIDTH - PILOT_RADIUS);
            pilot.y = (pilot.y + pilot.vy * dt).clamp(PILOT_RADIUS, FIELD_HEIGHT - PILOT_RADIUS);
        }

        for hazard in &mut self.hazards {
            hazard.x += hazard.vx * dt;
            hazard.y += hazard.vy * dt;
        }
        self.hazards.retain(|h| {
            h.x > -HAZARD_DESPAWN_MARGIN
                && h.x < FIELD_WIDTH + HAZARD_DESPAWN_MARGIN
                && h.y > -HAZARD_DESPAWN_MARGIN
                && h.y < FIELD_HEIGHT + HAZARD_DESPAWN_MARGIN
        });
    }

    fn collide(&mut self, now_ms: u64) {
        for pilot in self.pilots.iter_mut().filter(|p| p.alive) {
            if now_ms < pilot.protected_until_ms {
                continue;
            }
            let hit = self.hazards.iter().any(|h| {
                let (dx, dy) = (pilot.x - h.x, pilot.y - h.y);
                (dx * dx + dy * dy).sqrt() <= h.r + PILOT_RADIUS
            });
            if hit {
                pilot.lives = pilot.lives.saturating_sub(1);
                pilot.protected_until_ms = now_ms + HIT_PROTECTION_MS;
                if pilot.lives == 0 {
                    pilot.alive = false;
                    pilot.died_at_ms = Some(now_ms);
                }
            }
        }
    }

    pub fn is_over(&self) -> bool {
        self.ended
    }

    pub fn pilots(&self) -> &[Pilot] {
        &self.pilots
    }

    pub fn hazards(&self) -> &[Hazard] {
        &self.hazards
    }

    pub fn pilots_mut(&mut self) -> &mut [Pilot] {
        &mut self.pilots
    }

    pub fn hazards_mut(&mut self) -> &mut Vec<Hazard> {
        &mut self.hazards
    }

    pub fn rename_seat(&mut self, seat: usize, player_id: &str) {
        if let Some(pilot) = self.pilots.get_mut(seat) {
            pilot.player_id = player_id.to_string();
        }
    }

    pub fn ranking(&self) -> Vec<PlayerId> {
        let mut order: Vec<usize> = (0..self.pilots.len()).collect();
        order.sort_by(|&a, &b| {
            let (pa, pb) = (&self.pilots[a], &self.pilots[b]);
            pb.alive.cmp(&pa.alive).then_with(|| {
                if pa.alive {
                    pb.lives.cmp(&pa.lives).then(a.cmp(&b))
                } else {
                    pb.died_at_ms.cmp(&pa.died_at_ms).then(a.cmp(&b))
                }
            })
        });
        order
            .into_iter()
            .map(|seat| self.pilots[seat].player_id.clone())
            .collect()
    }

    pub fn view(&self) -> ArcadeView {
        ArcadeView {
            width: FIELD_WIDTH,
            height: FIELD_HEIGHT,
            pilots: self.pilots.clone(),
            hazards: self.hazards.clone(),
            winner: self
                .winner
                .map(|seat| self.pilots[seat].player_id.clone()),
            game_over: self.ended,
        }
    }
}
