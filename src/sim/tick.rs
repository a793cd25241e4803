//! Fixed timestep simulation tick
//!
//! Core game loop that advances the match deterministically and feeds the
//! AI controller its decisions and outcomes.

use glam::Vec2;

use super::collision::{paddle_contact, resolve_against_wall, resolve_circle_circle, resolve_circle_rect};
use super::state::{Ball, DeferredAction, EffectKind, GameEvent, GamePhase, MatchState, Side};
use crate::ai::{Action, ModelError, NeuralController, encode_features};
use crate::consts::*;
use crate::{limit_length, perp, rotate};

/// Side driven by the neural controller
pub const AI_SIDE: Side = Side::Right;

/// Angle between a superposition ghost and its source ball (radians)
const SPLIT_ANGLE: f32 = 0.3;
/// After a paddle hit the ball keeps at least this share of the serve speed along x
const MIN_HORIZONTAL_FRACTION: f32 = 0.5;
const MIN_TIME_SCALE: f32 = 0.1;
const MAX_TIME_SCALE: f32 = 4.0;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Human paddle axis in [-1, 1] (negative = up)
    pub paddle_axis: f32,
    /// Launch ball (click/tap/space)
    pub launch: bool,
    /// Pause toggle
    pub pause: bool,
}

/// Advance the match by one fixed timestep
pub fn tick(
    state: &mut MatchState,
    ai: &mut NeuralController,
    input: &TickInput,
    dt: f32,
) -> Result<(), ModelError> {
    state.events.clear();

    // Handle pause toggle
    if input.pause {
        match state.phase {
            GamePhase::Playing | GamePhase::Serve => {
                state.phase = GamePhase::Paused;
                return Ok(());
            }
            GamePhase::Paused => {
                let in_play = state.balls.iter().any(Ball::is_moving) || !state.deferred.is_empty();
                state.phase = if in_play {
                    GamePhase::Playing
                } else {
                    GamePhase::Serve
                };
            }
            GamePhase::GameOver => {}
        }
    }

    // Don't tick if paused or game over
    if matches!(state.phase, GamePhase::Paused | GamePhase::GameOver) {
        return Ok(());
    }

    state.time_ticks += 1;
    state.elapsed += dt;

    for action in state.deferred.drain_due(state.time_ticks) {
        match action {
            DeferredAction::Serve { ball_id, toward } => state.serve_ball(ball_id, toward),
            DeferredAction::Expire(effect) => end_effect(state, effect),
        }
    }

    // Human paddle
    let axis = input.paddle_axis.clamp(-1.0, 1.0);
    let human = state.paddle_mut(AI_SIDE.opponent());
    human.steer(axis);
    human.last_action = if axis < 0.0 {
        Action::Up
    } else if axis > 0.0 {
        Action::Down
    } else {
        Action::Hold
    };

    match state.phase {
        GamePhase::Serve => {
            state.paddle_mut(AI_SIDE).steer(0.0);
            if input.launch {
                if let Some(ball_id) = state.balls.first().map(|b| b.id) {
                    let toward = state.random_side();
                    state.serve_ball(ball_id, toward);
                }
                state.phase = GamePhase::Playing;
                log::debug!("Ball launched at tick {}", state.time_ticks);
            }
        }
        GamePhase::Playing => {
            let features = encode_features(state, AI_SIDE);
            let action = ai.decide_action(&features)?;
            let paddle = state.paddle_mut(AI_SIDE);
            paddle.steer(action.direction());
            paddle.last_action = action;
            state.rally_ticks += 1;
        }
        GamePhase::Paused | GamePhase::GameOver => {}
    }

    move_paddles(state, dt);
    move_balls(state, dt * state.effects.ball_time_scale());

    collide_walls(state);
    collide_paddles(state);
    collide_obstacles(state);
    collide_balls(state);

    check_goals(state, ai)?;

    // Ensure deterministic ordering
    state.normalize_order();
    Ok(())
}

fn move_paddles(state: &mut MatchState, dt: f32) {
    let height = state.rules.height;
    for paddle in &mut state.paddles {
        paddle.half_extents.y = PADDLE_HALF_HEIGHT + state.effects.paddle_grow[paddle.side.index()];
        paddle.body.integrate(dt);
        paddle.clamp_to_field(height);
    }
}

fn move_balls(state: &mut MatchState, dt: f32) {
    let magnus = state.physics.magnus;
    for ball in &mut state.balls {
        if !ball.is_moving() {
            continue;
        }
        // Magnus: spin curves the path sideways
        let curve = perp(ball.body.velocity) * ball.body.angular_velocity * magnus;
        ball.body.apply_force(curve * ball.body.mass);
        ball.body.integrate(dt);
    }
}

fn collide_walls(state: &mut MatchState) {
    let height = state.rules.height;
    let restitution = state.physics.wall_restitution;
    for ball in &mut state.balls {
        let r = ball.radius;
        let y = ball.body.position.y;
        let bounced = if y - r < 0.0 {
            resolve_against_wall(&mut ball.body, Vec2::Y, r - y, restitution)
        } else if y + r > height {
            resolve_against_wall(&mut ball.body, Vec2::NEG_Y, y + r - height, restitution)
        } else {
            false
        };
        if bounced {
            state.events.push(GameEvent::WallBounce { ball_id: ball.id });
        }
    }
}

fn collide_paddles(state: &mut MatchState) {
    let physics = &state.physics;
    let min_vx = physics.ball_start_speed * MIN_HORIZONTAL_FRACTION;

    for paddle in &state.paddles {
        let rect = paddle.rect();
        let facing = paddle.side.facing();
        for ball in &mut state.balls {
            // Only bounce balls heading toward this paddle
            if ball.body.velocity.x * facing <= 0.0 {
                continue;
            }
            let Some(hit) = resolve_circle_rect(
                &mut ball.body,
                ball.radius,
                &rect,
                paddle.body.velocity,
                physics.paddle_restitution,
            ) else {
                continue;
            };

            let contact = paddle_contact(hit.point, &rect, physics.spin_factor, physics.perfect_band);
            let body = &mut ball.body;
            body.angular_velocity += contact.spin;
            body.velocity.y += paddle.body.velocity.y * physics.english;

            let boost = if contact.perfect {
                physics.paddle_boost * physics.perfect_boost
            } else {
                physics.paddle_boost
            };
            body.velocity *= boost;
            if body.velocity.x * facing > -min_vx {
                body.velocity.x = -facing * min_vx;
            }
            body.velocity = limit_length(body.velocity, physics.ball_max_speed);

            ball.rally_hits += 1;
            state.events.push(GameEvent::PaddleHit {
                side: paddle.side,
                ball_id: ball.id,
                offset: contact.offset,
                perfect: contact.perfect,
            });
        }
    }
}

fn collide_obstacles(state: &mut MatchState) {
    let restitution = state.physics.obstacle_restitution;
    for obstacle in &state.obstacles {
        for ball in &mut state.balls {
            if resolve_circle_rect(&mut ball.body, ball.radius, obstacle, Vec2::ZERO, restitution)
                .is_some()
            {
                state.events.push(GameEvent::ObstacleHit { ball_id: ball.id });
            }
        }
    }
}

fn collide_balls(state: &mut MatchState) {
    for i in 0..state.balls.len() {
        let (head, tail) = state.balls.split_at_mut(i + 1);
        let a = &mut head[i];
        if !a.is_moving() {
            continue;
        }
        for b in tail.iter_mut().filter(|b| b.is_moving()) {
            if resolve_circle_circle(&mut a.body, a.radius, &mut b.body, b.radius).is_some() {
                state.events.push(GameEvent::BallCollision { a: a.id, b: b.id });
            }
        }
    }
}

fn check_goals(state: &mut MatchState, ai: &mut NeuralController) -> Result<(), ModelError> {
    let width = state.rules.width;
    let goals: Vec<(u32, Side)> = state
        .balls
        .iter()
        .filter_map(|ball| {
            if ball.body.position.x < 0.0 {
                Some((ball.id, Side::Right))
            } else if ball.body.position.x > width {
                Some((ball.id, Side::Left))
            } else {
                None
            }
        })
        .collect();

    for (ball_id, scorer) in goals {
        score_point(state, ai, ball_id, scorer)?;
        if state.phase == GamePhase::GameOver {
            break;
        }
    }
    Ok(())
}

fn score_point(
    state: &mut MatchState,
    ai: &mut NeuralController,
    ball_id: u32,
    scorer: Side,
) -> Result<(), ModelError> {
    state.score[scorer.index()] += 1;
    state.rally_ticks = 0;
    state.events.push(GameEvent::Scored { scorer, ball_id });
    log::info!(
        "{:?} scores ({} - {}) at {:.1}s",
        scorer,
        state.score[0],
        state.score[1],
        state.elapsed
    );

    let features = encode_features(state, AI_SIDE);
    let chosen = state.paddle(AI_SIDE).last_action;
    let report = ai.record_outcome(&features, chosen, scorer == AI_SIDE, scorer != AI_SIDE)?;
    if !report.skipped {
        log::info!(
            "AI trained on {} samples (reward {:+.2}, epsilon {:.3})",
            report.samples,
            report.reward,
            ai.epsilon()
        );
    }

    if let Some(index) = state.balls.iter().position(|b| b.id == ball_id) {
        if state.balls[index].ghost {
            state.balls.remove(index);
        } else {
            let center = state.center();
            state.balls[index].reset(center);
            let due = state.time_ticks + state.rules.serve_delay_ticks;
            state.deferred.schedule(
                due,
                DeferredAction::Serve {
                    ball_id,
                    toward: scorer.opponent(),
                },
            );
        }
    }

    let win = state.rules.win_score;
    if win > 0 && state.score_of(scorer) >= win {
        state.phase = GamePhase::GameOver;
        state.deferred.clear();
        state.events.push(GameEvent::MatchOver { winner: scorer });
        log::info!(
            "Match over: {:?} wins {} - {} after {} ticks",
            scorer,
            state.score[0],
            state.score[1],
            state.time_ticks
        );
    }
    Ok(())
}

/// Start a timed effect; it ends `duration_ticks` ticks from now
pub fn apply_effect(state: &mut MatchState, effect: EffectKind, duration_ticks: u64) {
    match effect {
        EffectKind::Superposition { extra_balls } => {
            let sources: Vec<(Vec2, Vec2, f32, f32)> = state
                .balls
                .iter()
                .filter(|b| !b.ghost && b.is_moving())
                .map(|b| (b.body.position, b.body.velocity, b.body.angular_velocity, b.radius))
                .collect();

            for (position, velocity, spin, radius) in sources {
                let side_step = perp(velocity.normalize_or_zero()) * radius * 2.5;
                for k in 0..extra_balls {
                    // Alternate sides, widening every second copy
                    let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
                    let spread = (k / 2 + 1) as f32;
                    let id = state.next_entity_id();
                    let mut ghost = Ball::new(id, position + side_step * spread * sign, &state.physics);
                    ghost.ghost = true;
                    ghost.body.velocity = rotate(velocity, SPLIT_ANGLE * spread * sign);
                    ghost.body.angular_velocity = spin;
                    state.balls.push(ghost);
                }
            }
            state.effects.superposition += 1;
        }
        EffectKind::TimeDilation { factor } => {
            state.effects.time_dilation.push(clamp_time_scale(factor));
        }
        EffectKind::PaddleGrow {
            side,
            extra_half_height,
        } => {
            state.effects.paddle_grow[side.index()] += extra_half_height.max(0.0);
        }
    }

    let due = state.time_ticks + duration_ticks;
    state.deferred.schedule(due, DeferredAction::Expire(effect));
    state.events.push(GameEvent::EffectStarted(effect));
    log::debug!("Effect {:?} for {} ticks", effect, duration_ticks);
}

fn clamp_time_scale(factor: f32) -> f32 {
    factor.clamp(MIN_TIME_SCALE, MAX_TIME_SCALE)
}

fn end_effect(state: &mut MatchState, effect: EffectKind) {
    match effect {
        EffectKind::Superposition { .. } => {
            let active = &mut state.effects.superposition;
            *active = active.saturating_sub(1);
            if *active == 0 {
                state.balls.retain(|b| !b.ghost);
            }
        }
        EffectKind::TimeDilation { factor } => {
            let factor = clamp_time_scale(factor);
            let running = &mut state.effects.time_dilation;
            if let Some(i) = running.iter().position(|f| *f == factor) {
                running.remove(i);
            }
        }
        EffectKind::PaddleGrow {
            side,
            extra_half_height,
        } => {
            let grow = &mut state.effects.paddle_grow[side.index()];
            *grow = (*grow - extra_half_height.max(0.0)).max(0.0);
        }
    }
    state.events.push(GameEvent::EffectEnded(effect));
    log::debug!("Effect {:?} ended", effect);
}
