//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering or platform dependencies

pub mod body;
pub mod collision;
pub mod state;
pub mod tick;

pub use body::PhysicsBody;
pub use collision::{
    CANONICAL_NORMAL, CollisionResult, Contact, Rect, circle_circle_collision, circle_rect_collision,
    paddle_contact, reflect_velocity, resolve_against_wall, resolve_circle_circle, resolve_circle_rect,
};
pub use state::{
    ActiveEffects, Ball, DeferredAction, DeferredQueue, EffectKind, GameEvent, GamePhase, MatchState,
    Paddle, RngState, Side,
};
pub use tick::{AI_SIDE, TickInput, apply_effect, tick};
