//! Neural paddle controller
//!
//! Inference runs every tick; training runs only when a point is scored.
//! Both take `&mut NeuralController` / `&NeuralController` from the single
//! owner, so a partial weight update can never overlap a forward pass.

pub mod buffer;
pub mod controller;
pub mod features;
pub mod network;
pub mod predict;

pub use buffer::{TrainingBuffer, TrainingSample};
pub use controller::{NeuralController, TrainingReport};
pub use features::encode_features;
pub use network::{Activation, ForwardPass, Layer, ModelError, ModelSnapshot, NeuralNetwork};
pub use predict::{Intercept, predict_intercept};

use serde::{Deserialize, Serialize};

use crate::consts::ACTION_COUNT;

/// Discrete paddle command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Action {
    /// Move toward negative y
    Up,
    #[default]
    Hold,
    /// Move toward positive y
    Down,
}

impl Action {
    pub const ALL: [Action; ACTION_COUNT] = [Action::Up, Action::Hold, Action::Down];

    /// Network output index: 0 → Up, 1 → Hold, 2 → Down (out of range → Hold)
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Action::Up,
            2 => Action::Down,
            _ => Action::Hold,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Action::Up => 0,
            Action::Hold => 1,
            Action::Down => 2,
        }
    }

    /// -1, 0 or +1
    pub fn as_i8(self) -> i8 {
        match self {
            Action::Up => -1,
            Action::Hold => 0,
            Action::Down => 1,
        }
    }

    /// Paddle steering axis
    pub fn direction(self) -> f32 {
        self.as_i8() as f32
    }

    pub fn one_hot(self) -> [f32; ACTION_COUNT] {
        let mut target = [0.0; ACTION_COUNT];
        target[self.index()] = 1.0;
        target
    }
}
