//! Quantum Pong - Pong against a paddle driven by an online-trained network
//!
//! Core modules:
//! - `sim`: Deterministic simulation (physics, collisions, match state, tick)
//! - `ai`: Neural controller (forward pass, backprop, replay buffer)
//! - `persistence`: Save/load of trained models
//! - `settings`: Data-driven physics and AI tuning

pub mod ai;
pub mod persistence;
pub mod settings;
pub mod sim;

pub use ai::{Action, NeuralController};
pub use settings::{Difficulty, Settings};

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (120 Hz for smooth physics)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Field dimensions (y grows downward, walls at y=0 and y=FIELD_HEIGHT)
    pub const FIELD_WIDTH: f32 = 800.0;
    pub const FIELD_HEIGHT: f32 = 600.0;

    /// Paddle defaults
    pub const PADDLE_HALF_WIDTH: f32 = 7.5;
    pub const PADDLE_HALF_HEIGHT: f32 = 50.0;
    /// Distance from the goal line to the paddle center
    pub const PADDLE_INSET: f32 = 30.0;
    pub const PADDLE_MASS: f32 = 10.0;

    /// Ball defaults
    pub const BALL_RADIUS: f32 = 8.0;
    pub const BALL_MASS: f32 = 1.0;
    pub const BALL_START_SPEED: f32 = 300.0;
    pub const BALL_MAX_SPEED: f32 = 900.0;

    /// Speed boost when ball hits paddle (multiplicative)
    pub const PADDLE_BOOST: f32 = 1.05;

    /// Network input/output sizes
    pub const FEATURE_COUNT: usize = 20;
    pub const ACTION_COUNT: usize = 3;
}

/// Rotate a vector counter-clockwise by `angle` radians
#[inline]
pub fn rotate(v: Vec2, angle: f32) -> Vec2 {
    Vec2::from_angle(angle).rotate(v)
}

/// Scale `v` down so its length never exceeds `max`
#[inline]
pub fn limit_length(v: Vec2, max: f32) -> Vec2 {
    if max <= 0.0 {
        return Vec2::ZERO;
    }
    v.clamp_length_max(max)
}

/// Perpendicular vector (rotated +90°)
#[inline]
pub fn perp(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_rotate_quarter_turn() {
        let v = rotate(Vec2::X, FRAC_PI_2);
        assert!(v.x.abs() < 1e-6);
        assert!((v.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_limit_length() {
        let v = limit_length(Vec2::new(30.0, 40.0), 10.0);
        assert!((v.length() - 10.0).abs() < 1e-4);
        assert_eq!(limit_length(Vec2::new(1.0, 0.0), 10.0), Vec2::new(1.0, 0.0));
        assert_eq!(limit_length(Vec2::new(1.0, 0.0), 0.0), Vec2::ZERO);
    }

    #[test]
    fn test_perp_is_orthogonal() {
        let v = Vec2::new(3.0, -2.0);
        assert!(perp(v).dot(v).abs() < 1e-6);
    }
}
