use tourney_engine::arcade::{ArcadeState, Hazard, FIELD_HEIGHT, FIELD_WIDTH, PILOT_RADIUS};
use tourney_engine::game::{GameState, MovePayload};
use tourney_engine::rng::SessionRng;

use crate::BotDriver;

/// How far ahead incoming hazards are projected.
const LOOKAHEAD_S: f64 = 0.5;
const THREAT_MARGIN: f64 = 20.0;
const STEER_ACCEL: f64 = 480.0;
/// With this many simultaneous threats every direction is bad; dash out.
const DASH_THREATS: usize = 3;

/// Dodger: steer away from the hazard that will pass closest within the
/// lookahead window, dash when surrounded.
pub struct ArcadeBot;

impl BotDriver for ArcadeBot {
    fn decide(
        &self,
        state: &GameState,
        seat: usize,
        _rng: &mut SessionRng,
    ) -> Option<MovePayload> {
        let GameState::Arcade(arcade) = state else {
            return None;
        };
        let me = arcade.pilots().get(seat)?;
        if !me.alive {
            return None;
        }

        let mut threats: Vec<(f64, f64, f64)> = arcade
            .hazards()
            .iter()
            .filter_map(|hazard| {
                let (d, t) = closest_approach(me.x, me.y, me.vx, me.vy, hazard);
                let danger_zone = hazard.r + PILOT_RADIUS + THREAT_MARGIN;
                (d <= danger_zone).then(|| {
                    let fx = hazard.x + hazard.vx * t;
                    let fy = hazard.y + hazard.vy * t;
                    (d, fx, fy)
                })
            })
            .collect();
        threats.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let payload = match threats.first() {
            Some(&(_, fx, fy)) => {
                let (mut dx, mut dy) = (me.x - fx, me.y - fy);
                let len = (dx * dx + dy * dy).sqrt();
                if len > 1e-6 {
                    dx /= len;
                    dy /= len;
                } else {
                    dx = 1.0;
                    dy = 0.0;
                }
                MovePayload::Steer {
                    ax: dx * STEER_ACCEL,
                    ay: dy * STEER_ACCEL,
                    dash: threats.len() >= DASH_THREATS,
                }
            }
            None => {
                // idle: drift back toward the middle of the field
                let (dx, dy) = (FIELD_WIDTH / 2.0 - me.x, FIELD_HEIGHT / 2.0 - me.y);
                let len = (dx * dx + dy * dy).sqrt().max(1.0);
                MovePayload::Steer {
                    ax: dx / len * STEER_ACCEL * 0.3,
                    ay: dy / len * STEER_ACCEL * 0.3,
                    dash: false,
                }
            }
        };
        Some(payload)
    }

    fn name(&self) -> &str {
        "arcade-dodger"
    }
}

/// Minimum distance between pilot and hazard over the lookahead window,
/// and the time at which it happens.
fn closest_approach(px: f64, py: f64, pvx: f64, pvy: f64, hazard: &Hazard) -> (f64, f64) {
    let (rx, ry) = (hazard.x - px, hazard.y - py);
    let (rvx, rvy) = (hazard.vx - pvx, hazard.vy - pvy);
    let speed_sq = rvx * rvx + rvy * rvy;
    let t = if speed_sq < 1e-9 {
        0.0
    } else {
        (-(rx * rvx + ry * rvy) / speed_sq).clamp(0.0, LOOKAHEAD_S)
    };
    let (cx, cy) = (rx + rvx * t, ry + rvy * t);
    ((cx * cx + cy * cy).sqrt(), t)
}
