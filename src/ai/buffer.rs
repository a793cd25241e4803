//! Bounded replay buffer of recent decisions

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::Action;
use crate::consts::ACTION_COUNT;

/// One recorded decision: what the controller saw and what it chose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub features: Vec<f32>,
    /// One-hot target for the chosen action
    pub target: [f32; ACTION_COUNT],
}

impl TrainingSample {
    pub fn new(features: Vec<f32>, action: Action) -> Self {
        Self {
            features,
            target: action.one_hot(),
        }
    }

    /// Action encoded by the one-hot target
    pub fn action(&self) -> Action {
        let index = self
            .target
            .iter()
            .position(|&t| t > 0.5)
            .unwrap_or(Action::Hold.index());
        Action::from_index(index)
    }
}

/// FIFO that evicts the oldest sample once `capacity` is reached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingBuffer {
    capacity: usize,
    samples: VecDeque<TrainingSample>,
}

impl TrainingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: TrainingSample) {
        if self.capacity == 0 {
            return;
        }
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Up to `count` most recent samples, oldest first
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &TrainingSample> {
        let skip = self.samples.len().saturating_sub(count);
        self.samples.iter().skip(skip)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrainingSample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
