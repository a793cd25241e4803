//! Match state → normalized network inputs
//!
//! One fixed 20-feature layout, always encoded from the perspective of the
//! paddle being controlled.

use glam::Vec2;

use super::predict::predict_intercept;
use crate::consts::FEATURE_COUNT;
use crate::sim::{Ball, MatchState, Side};

/// Index of `(intercept_y - paddle_y) / height` in the feature vector
pub const INTERCEPT_OFFSET: usize = 7;

/// Spin magnitude that maps to ±1
const SPIN_SCALE: f32 = 10.0;
/// Intercept times beyond this (seconds) map to 1
const HORIZON_SECS: f32 = 3.0;
/// Score gap that maps to ±1
const SCORE_SCALE: f32 = 10.0;
const MAX_BALLS: f32 = 5.0;
const RALLY_SCALE: f32 = 20.0;

/// The ball this side should care about: the nearest one heading toward its
/// goal, otherwise the nearest one overall
fn threat<'a>(state: &'a MatchState, side: Side, paddle_x: f32) -> Option<&'a Ball> {
    let distance = |b: &&Ball| (b.body.position.x - paddle_x).abs();
    let by_distance = |a: &&Ball, b: &&Ball| distance(a).total_cmp(&distance(b));
    state
        .balls
        .iter()
        .filter(|b| b.body.velocity.x * side.facing() > 0.0)
        .min_by(by_distance)
        .or_else(|| state.balls.iter().min_by(by_distance))
}

/// Encode the match for `side`'s controller
pub fn encode_features(state: &MatchState, side: Side) -> [f32; FEATURE_COUNT] {
    let width = state.rules.width.max(1.0);
    let height = state.rules.height.max(1.0);
    let max_speed = state.physics.ball_max_speed.max(1.0);

    let paddle = state.paddle(side);
    let opponent = state.paddle(side.opponent());
    let paddle_pos = paddle.body.position;
    let facing = side.facing();

    let (ball_pos, ball_vel, spin, rally, radius) = match threat(state, side, paddle_pos.x) {
        Some(ball) => (
            ball.body.position,
            ball.body.velocity,
            ball.body.angular_velocity,
            ball.rally_hits,
            ball.radius,
        ),
        None => (state.center(), Vec2::ZERO, 0.0, 0, 0.0),
    };

    let face_x = paddle_pos.x - facing * (paddle.half_extents.x + radius);
    let intercept = predict_intercept(ball_pos, ball_vel, face_x, radius, height - radius);
    let approaching = ball_vel.x * facing > 0.0;
    let (intercept_y, intercept_time) = match intercept {
        Some(hit) => (hit.y, (hit.time / HORIZON_SECS).clamp(0.0, 1.0)),
        None => (ball_pos.y, 1.0),
    };

    let flag = |on: bool| if on { 1.0 } else { 0.0 };

    [
        (ball_pos.y / height).clamp(0.0, 1.0),
        (ball_vel.y / max_speed).clamp(-1.0, 1.0),
        ((paddle_pos.x - ball_pos.x).abs() / width).clamp(0.0, 1.0),
        (paddle_pos.y / height).clamp(0.0, 1.0),
        (ball_pos.x / width).clamp(0.0, 1.0),
        (ball_vel.x * facing / max_speed).clamp(-1.0, 1.0),
        (intercept_y / height).clamp(0.0, 1.0),
        ((intercept_y - paddle_pos.y) / height).clamp(-1.0, 1.0),
        intercept_time,
        (ball_vel.length() / max_speed).clamp(0.0, 1.0),
        (spin / SPIN_SCALE).clamp(-1.0, 1.0),
        (opponent.body.position.y / height).clamp(0.0, 1.0),
        (paddle.body.velocity.y / paddle.speed.max(1.0)).clamp(-1.0, 1.0),
        (state.score_differential(side) as f32 / SCORE_SCALE).clamp(-1.0, 1.0),
        flag(approaching),
        flag(state.effects.superposition_active()),
        flag(state.effects.time_dilated()),
        (state.balls.len() as f32 / MAX_BALLS).clamp(0.0, 1.0),
        (rally as f32 / RALLY_SCALE).clamp(0.0, 1.0),
        (paddle.half_extents.y / (height / 2.0)).clamp(0.0, 1.0),
    ]
}
