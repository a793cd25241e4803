//! Match state and core simulation types
//!
//! Everything the tick mutates lives in `MatchState`; there are no globals.

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::body::PhysicsBody;
use super::collision::Rect;
use crate::ai::Action;
use crate::consts::*;
use crate::settings::{PhysicsSettings, RuleSettings, Settings};

/// Which end of the field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    pub fn opponent(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// Sign of ball x-velocity that travels toward this side's goal
    pub fn facing(self) -> f32 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
        }
    }
}

/// Current phase of play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Waiting for the first launch
    Serve,
    /// Active gameplay
    Playing,
    /// Game is paused
    Paused,
    /// A side reached the winning score
    GameOver,
}

/// A paddle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paddle {
    pub side: Side,
    pub body: PhysicsBody,
    pub half_extents: Vec2,
    /// Max vertical speed (pixels/s)
    pub speed: f32,
    /// Last action taken (AI side) or derived from input (human side)
    pub last_action: Action,
}

impl Paddle {
    pub fn new(side: Side, field: &RuleSettings, speed: f32) -> Self {
        let x = match side {
            Side::Left => PADDLE_INSET,
            Side::Right => field.width - PADDLE_INSET,
        };
        let mut body = PhysicsBody::new(Vec2::new(x, field.height / 2.0), PADDLE_MASS);
        body.angular_damping = 0.0;
        Self {
            side,
            body,
            half_extents: Vec2::new(PADDLE_HALF_WIDTH, PADDLE_HALF_HEIGHT),
            speed,
            last_action: Action::Hold,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.body.position, self.half_extents)
    }

    /// Drive the paddle along y; `axis` in [-1, 1]
    pub fn steer(&mut self, axis: f32) {
        self.body.velocity = Vec2::new(0.0, axis.clamp(-1.0, 1.0) * self.speed);
    }

    /// Keep the paddle inside the field, stopping it at the walls
    pub fn clamp_to_field(&mut self, height: f32) {
        let min = self.half_extents.y;
        let max = (height - self.half_extents.y).max(min);
        let y = self.body.position.y;
        if y < min || y > max {
            self.body.position.y = y.clamp(min, max);
            self.body.velocity.y = 0.0;
        }
    }
}

/// A ball entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ball {
    pub id: u32,
    pub body: PhysicsBody,
    pub radius: f32,
    /// Paddle hits since the last serve
    pub rally_hits: u32,
    /// Extra copy spawned by superposition (removed instead of reset)
    pub ghost: bool,
}

impl Ball {
    pub fn new(id: u32, position: Vec2, physics: &PhysicsSettings) -> Self {
        let mut body = PhysicsBody::new(position, BALL_MASS);
        body.restitution = physics.ball_restitution;
        body.drag = physics.ball_drag;
        body.friction = physics.ball_friction;
        body.angular_damping = physics.spin_damping;
        body.max_velocity = physics.ball_max_speed;
        Self {
            id,
            body,
            radius: BALL_RADIUS,
            rally_hits: 0,
            ghost: false,
        }
    }

    /// Park the ball at `position` with no motion or spin
    pub fn reset(&mut self, position: Vec2) {
        self.body.position = position;
        self.body.velocity = Vec2::ZERO;
        self.body.angular_velocity = 0.0;
        self.body.rotation = 0.0;
        self.body.force = Vec2::ZERO;
        self.body.torque = 0.0;
        self.rally_hits = 0;
    }

    pub fn is_moving(&self) -> bool {
        self.body.velocity.length_squared() > 0.0
    }
}

/// Timed effect kinds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EffectKind {
    /// Split every real ball into extra ghost copies
    Superposition { extra_balls: u32 },
    /// Scale ball time by `factor`
    TimeDilation { factor: f32 },
    /// Enlarge one paddle
    PaddleGrow { side: Side, extra_half_height: f32 },
}

/// Effects currently in force
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActiveEffects {
    /// Running superposition instances; ghosts live until the last one ends
    pub superposition: u32,
    /// Running dilation factors, newest last
    pub time_dilation: Vec<f32>,
    /// Extra half height per side (indexed by `Side::index`)
    pub paddle_grow: [f32; 2],
}

impl ActiveEffects {
    pub fn superposition_active(&self) -> bool {
        self.superposition > 0
    }

    pub fn time_dilated(&self) -> bool {
        !self.time_dilation.is_empty()
    }

    /// The newest running dilation wins
    pub fn ball_time_scale(&self) -> f32 {
        self.time_dilation.last().copied().unwrap_or(1.0)
    }
}

/// Work scheduled for a future tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DeferredAction {
    /// Launch a parked ball toward `toward`
    Serve { ball_id: u32, toward: Side },
    /// End a timed effect
    Expire(EffectKind),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Deferred {
    due_tick: u64,
    seq: u64,
    action: DeferredAction,
}

/// Tick-counted queue; actions due on the same tick run in scheduling order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeferredQueue {
    entries: Vec<Deferred>,
    next_seq: u64,
}

impl DeferredQueue {
    pub fn schedule(&mut self, due_tick: u64, action: DeferredAction) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Deferred {
            due_tick,
            seq,
            action,
        });
    }

    /// Remove and return every action due at or before `now`
    pub fn drain_due(&mut self, now: u64) -> Vec<DeferredAction> {
        let mut due: Vec<Deferred> = Vec::new();
        self.entries.retain(|entry| {
            if entry.due_tick <= now {
                due.push(entry.clone());
                false
            } else {
                true
            }
        });
        due.sort_by_key(|entry| (entry.due_tick, entry.seq));
        due.into_iter().map(|entry| entry.action).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Things that happened during a tick, for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    Served { ball_id: u32, toward: Side },
    PaddleHit { side: Side, ball_id: u32, offset: f32, perfect: bool },
    WallBounce { ball_id: u32 },
    ObstacleHit { ball_id: u32 },
    BallCollision { a: u32, b: u32 },
    Scored { scorer: Side, ball_id: u32 },
    EffectStarted(EffectKind),
    EffectEnded(EffectKind),
    MatchOver { winner: Side },
}

/// RNG state wrapper for serialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u64,
    pub stream: u64,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self { seed, stream: 0 }
    }

    /// Fresh generator on the next stream; same seed gives the same sequence
    pub fn next_rng(&mut self) -> Pcg32 {
        let rng = Pcg32::new(self.seed, self.stream);
        self.stream += 1;
        rng
    }
}

/// Complete match state (deterministic, serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchState {
    /// Match seed for reproducibility
    pub seed: u64,
    pub rng_state: RngState,
    /// Points per side (indexed by `Side::index`)
    pub score: [u32; 2],
    /// Simulation tick counter
    pub time_ticks: u64,
    /// Simulated seconds since match start
    pub elapsed: f32,
    /// Ticks since the last point
    pub rally_ticks: u64,
    pub phase: GamePhase,
    /// Left then right
    pub paddles: [Paddle; 2],
    /// Active balls (sorted by id for determinism)
    pub balls: Vec<Ball>,
    /// Static rectangles balls bounce off
    pub obstacles: Vec<Rect>,
    pub effects: ActiveEffects,
    pub deferred: DeferredQueue,
    pub physics: PhysicsSettings,
    pub rules: RuleSettings,
    /// Events from the most recent tick
    #[serde(skip)]
    pub events: Vec<GameEvent>,
    /// Next entity ID
    next_id: u32,
}

impl MatchState {
    pub fn new(seed: u64, settings: &Settings) -> Self {
        let speeds = [settings.physics.paddle_speed, settings.ai_paddle_speed()];
        Self::with_parts(seed, settings.rules.clone(), settings.physics.clone(), speeds)
    }

    fn with_parts(
        seed: u64,
        rules: RuleSettings,
        physics: PhysicsSettings,
        paddle_speeds: [f32; 2],
    ) -> Self {
        let paddles = [
            Paddle::new(Side::Left, &rules, paddle_speeds[0]),
            Paddle::new(Side::Right, &rules, paddle_speeds[1]),
        ];
        let mut state = Self {
            seed,
            rng_state: RngState::new(seed),
            score: [0, 0],
            time_ticks: 0,
            elapsed: 0.0,
            rally_ticks: 0,
            phase: GamePhase::Serve,
            paddles,
            balls: Vec::new(),
            obstacles: Vec::new(),
            effects: ActiveEffects::default(),
            deferred: DeferredQueue::default(),
            physics,
            rules,
            events: Vec::new(),
            next_id: 1,
        };

        let id = state.next_entity_id();
        let center = state.center();
        state.balls.push(Ball::new(id, center, &state.physics));
        state
    }

    /// Start over with a new seed, keeping tuning and obstacles
    pub fn restart(&mut self, seed: u64) {
        let speeds = [self.paddles[0].speed, self.paddles[1].speed];
        let obstacles = std::mem::take(&mut self.obstacles);
        *self = Self::with_parts(seed, self.rules.clone(), self.physics.clone(), speeds);
        self.obstacles = obstacles;
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.rules.width / 2.0, self.rules.height / 2.0)
    }

    pub fn paddle(&self, side: Side) -> &Paddle {
        &self.paddles[side.index()]
    }

    pub fn paddle_mut(&mut self, side: Side) -> &mut Paddle {
        &mut self.paddles[side.index()]
    }

    pub fn score_of(&self, side: Side) -> u32 {
        self.score[side.index()]
    }

    /// Own score minus opponent score
    pub fn score_differential(&self, side: Side) -> i64 {
        self.score_of(side) as i64 - self.score_of(side.opponent()) as i64
    }

    /// Launch ball `ball_id` from wherever it is toward `toward`, at a random
    /// angle within the configured serve cone
    pub fn serve_ball(&mut self, ball_id: u32, toward: Side) {
        let mut rng = self.rng_state.next_rng();
        let cone = self.physics.serve_angle;
        let angle = if cone > 0.0 {
            rng.random_range(-cone..cone)
        } else {
            0.0
        };
        let speed = self.physics.ball_start_speed;
        if let Some(ball) = self.balls.iter_mut().find(|b| b.id == ball_id) {
            let dir = Vec2::new(toward.facing() * angle.cos(), angle.sin());
            ball.body.velocity = dir * speed;
            self.events.push(GameEvent::Served { ball_id, toward });
        }
    }

    /// Random side, drawn from the match RNG
    pub fn random_side(&mut self) -> Side {
        let mut rng = self.rng_state.next_rng();
        if rng.random::<bool>() {
            Side::Left
        } else {
            Side::Right
        }
    }

    /// Ensure balls are sorted by ID for deterministic iteration
    pub fn normalize_order(&mut self) {
        self.balls.sort_by_key(|b| b.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_match_layout() {
        let state = MatchState::new(1, &Settings::default());
        assert_eq!(state.phase, GamePhase::Serve);
        assert_eq!(state.balls.len(), 1);
        assert_eq!(state.balls[0].body.position, state.center());
        assert!(state.paddle(Side::Left).body.position.x < state.center().x);
        assert!(state.paddle(Side::Right).body.position.x > state.center().x);
    }

    #[test]
    fn test_deferred_queue_orders_by_due_then_schedule() {
        let mut queue = DeferredQueue::default();
        let grow = EffectKind::PaddleGrow {
            side: Side::Left,
            extra_half_height: 10.0,
        };
        queue.schedule(10, DeferredAction::Expire(grow));
        queue.schedule(5, DeferredAction::Serve { ball_id: 1, toward: Side::Left });
        queue.schedule(5, DeferredAction::Serve { ball_id: 2, toward: Side::Right });
        queue.schedule(20, DeferredAction::Serve { ball_id: 3, toward: Side::Right });

        assert!(queue.drain_due(4).is_empty());
        let due = queue.drain_due(10);
        assert_eq!(
            due,
            vec![
                DeferredAction::Serve { ball_id: 1, toward: Side::Left },
                DeferredAction::Serve { ball_id: 2, toward: Side::Right },
                DeferredAction::Expire(grow),
            ]
        );
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_serve_is_deterministic_per_seed() {
        let mut a = MatchState::new(42, &Settings::default());
        let mut b = MatchState::new(42, &Settings::default());
        let id = a.balls[0].id;
        a.serve_ball(id, Side::Right);
        b.serve_ball(id, Side::Right);
        assert_eq!(a.balls[0].body.velocity, b.balls[0].body.velocity);
        assert!(a.balls[0].body.velocity.x > 0.0);
        let speed = a.balls[0].body.speed();
        assert!((speed - a.physics.ball_start_speed).abs() < 1e-2);
    }

    #[test]
    fn test_paddle_clamped_inside_field() {
        let rules = RuleSettings::default();
        let mut paddle = Paddle::new(Side::Left, &rules, 400.0);
        paddle.body.position.y = -20.0;
        paddle.body.velocity.y = -400.0;
        paddle.clamp_to_field(rules.height);
        assert_eq!(paddle.body.position.y, paddle.half_extents.y);
        assert_eq!(paddle.body.velocity.y, 0.0);
    }

    #[test]
    fn test_restart_resets_score_and_balls() {
        let mut state = MatchState::new(1, &Settings::default());
        state.score = [3, 4];
        state.balls.push(Ball::new(99, Vec2::ZERO, &state.physics));
        state.restart(2);
        assert_eq!(state.score, [0, 0]);
        assert_eq!(state.balls.len(), 1);
        assert_eq!(state.seed, 2);
        assert_eq!(state.phase, GamePhase::Serve);
    }
}
