//! Rigid body integrator for paddles and balls
//!
//! Forces and torques accumulate between ticks and are folded into motion by
//! `integrate`. A body with `mass <= 0` is static: it never moves and has
//! zero inverse mass in collision response.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::limit_length;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsBody {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Force accumulator, cleared by `integrate`
    pub force: Vec2,
    pub mass: f32,
    /// Elasticity (1.0 = perfectly elastic)
    pub restitution: f32,
    pub angular_velocity: f32,
    pub rotation: f32,
    /// Torque accumulator, cleared by `integrate`
    pub torque: f32,
    pub moment_of_inertia: f32,
    /// Fraction of velocity removed per tick
    pub drag: f32,
    /// Multiplicative velocity factor per tick (1.0 = frictionless)
    pub friction: f32,
    /// Multiplicative angular velocity factor per tick
    pub angular_damping: f32,
    pub max_velocity: f32,
}

impl PhysicsBody {
    pub fn new(position: Vec2, mass: f32) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            force: Vec2::ZERO,
            mass,
            restitution: 1.0,
            angular_velocity: 0.0,
            rotation: 0.0,
            torque: 0.0,
            moment_of_inertia: mass,
            drag: 0.0,
            friction: 1.0,
            angular_damping: 0.98,
            max_velocity: f32::MAX,
        }
    }

    /// A body that never moves (walls, obstacles)
    pub fn fixed(position: Vec2) -> Self {
        Self::new(position, 0.0)
    }

    pub fn is_static(&self) -> bool {
        self.mass <= 0.0
    }

    /// Inverse mass (0 for static bodies)
    #[inline]
    pub fn inverse_mass(&self) -> f32 {
        if self.is_static() { 0.0 } else { 1.0 / self.mass }
    }

    /// Accumulate a force for the next `integrate`
    pub fn apply_force(&mut self, force: Vec2) {
        self.force += force;
    }

    /// Accumulate a torque for the next `integrate`
    pub fn apply_torque(&mut self, torque: f32) {
        self.torque += torque;
    }

    /// Instantaneous velocity change
    pub fn apply_impulse(&mut self, impulse: Vec2) {
        self.velocity += impulse * self.inverse_mass();
    }

    /// Advance the body by `dt` seconds
    pub fn integrate(&mut self, dt: f32) {
        if self.is_static() {
            self.force = Vec2::ZERO;
            self.torque = 0.0;
            return;
        }

        let acceleration = self.force / self.mass;
        self.velocity += acceleration * dt;
        self.velocity -= self.velocity * self.drag;
        self.velocity *= self.friction;
        self.velocity = limit_length(self.velocity, self.max_velocity);
        self.position += self.velocity * dt;

        if self.moment_of_inertia > 0.0 {
            self.angular_velocity += self.torque / self.moment_of_inertia * dt;
        }
        self.angular_velocity *= self.angular_damping;
        self.rotation += self.angular_velocity * dt;

        self.force = Vec2::ZERO;
        self.torque = 0.0;
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }
}
