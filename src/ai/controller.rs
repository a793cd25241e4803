//! Neural paddle controller
//!
//! Owns the network, the replay buffer and the exploration schedule.
//! `decide_action` only reads the weights; `train` is the single place that
//! writes them, and it runs when a point ends.

use rand::Rng;
use rand_pcg::Pcg32;

use super::buffer::{TrainingBuffer, TrainingSample};
use super::features::INTERCEPT_OFFSET;
use super::network::{ModelError, ModelSnapshot, NeuralNetwork};
use super::Action;
use crate::consts::{ACTION_COUNT, FEATURE_COUNT};
use crate::settings::AiSettings;

/// Intercept offsets (fraction of field height) the heuristic treats as "on target"
const HEURISTIC_DEADZONE: f32 = 0.02;

/// Outcome of a `train` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingReport {
    /// Samples replayed through the network
    pub samples: usize,
    pub reward: f32,
    /// True when the buffer held fewer than `min_samples`
    pub skipped: bool,
}

impl TrainingReport {
    fn skipped(reward: f32) -> Self {
        Self {
            samples: 0,
            reward,
            skipped: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NeuralController {
    network: NeuralNetwork,
    buffer: TrainingBuffer,
    settings: AiSettings,
    epsilon: f32,
    rng: Pcg32,
    decisions: u64,
    training_rounds: u64,
}

impl NeuralController {
    /// Fresh controller with Xavier-initialized weights drawn from `settings.seed`
    pub fn new(settings: &AiSettings) -> Result<Self, ModelError> {
        let mut init_rng = Pcg32::new(settings.seed, 0);
        let network = NeuralNetwork::new(&settings.topology(), &mut init_rng)?;
        Self::with_network(settings, network)
    }

    /// Controller around an existing network (must be FEATURE_COUNT -> ACTION_COUNT)
    pub fn with_network(settings: &AiSettings, network: NeuralNetwork) -> Result<Self, ModelError> {
        check_topology(&network)?;
        log::info!(
            "AI controller ready: topology {:?}, {} parameters",
            network.topology(),
            network.parameter_count()
        );
        Ok(Self {
            network,
            buffer: TrainingBuffer::new(settings.buffer_capacity),
            settings: settings.clone(),
            epsilon: settings.epsilon_start.max(settings.epsilon_min),
            rng: Pcg32::new(settings.seed, 1),
            decisions: 0,
            training_rounds: 0,
        })
    }

    /// Action distribution for `features`, with the heuristic mixed in
    pub fn probabilities(&self, features: &[f32]) -> Result<Vec<f32>, ModelError> {
        let mut probs = self.network.predict(features)?;
        let blend = self.settings.heuristic_blend.clamp(0.0, 1.0);
        if blend > 0.0 {
            let target = heuristic_action(features).one_hot();
            for (p, h) in probs.iter_mut().zip(target) {
                *p = (1.0 - blend) * *p + blend * h;
            }
        }
        Ok(probs)
    }

    /// Greedy action, no exploration and no recording
    pub fn predict(&self, features: &[f32]) -> Result<Action, ModelError> {
        let probs = self.probabilities(features)?;
        Ok(Action::from_index(argmax(&probs)))
    }

    /// Pick the next action, explore with probability epsilon and record the
    /// decision for later training
    pub fn decide_action(&mut self, features: &[f32]) -> Result<Action, ModelError> {
        let greedy = self.predict(features)?;

        let action = if self.settings.exploration {
            let explore = self.rng.random::<f32>() < self.epsilon;
            self.epsilon = (self.epsilon * self.settings.epsilon_decay).max(self.settings.epsilon_min);
            if explore {
                Action::from_index(self.rng.random_range(0..ACTION_COUNT))
            } else {
                greedy
            }
        } else {
            greedy
        };

        self.decisions += 1;
        self.record_sample(features, action)?;
        Ok(action)
    }

    /// Buffer a decision; a feature vector of the wrong length is refused
    pub fn record_sample(&mut self, features: &[f32], action: Action) -> Result<(), ModelError> {
        self.check_input(features)?;
        self.buffer.push(TrainingSample::new(features.to_vec(), action));
        Ok(())
    }

    fn check_input(&self, features: &[f32]) -> Result<(), ModelError> {
        let expected = self.network.input_size();
        if features.len() != expected {
            return Err(ModelError::InputLength {
                expected,
                actual: features.len(),
            });
        }
        Ok(())
    }

    /// Record the point-ending decision and train on the recent history.
    /// Scoring rewards the recent choices, conceding pushes away from them;
    /// neither leaves the weights alone.
    pub fn record_outcome(
        &mut self,
        features: &[f32],
        chosen: Action,
        did_score: bool,
        did_concede: bool,
    ) -> Result<TrainingReport, ModelError> {
        self.record_sample(features, chosen)?;

        let reward = if did_score {
            self.settings.score_reward
        } else if did_concede {
            self.settings.concede_reward
        } else {
            return Ok(TrainingReport {
                samples: 0,
                reward: 0.0,
                skipped: false,
            });
        };
        self.train(reward)
    }

    /// Replay the last `batch_size` samples (oldest first) with `reward`
    pub fn train(&mut self, reward: f32) -> Result<TrainingReport, ModelError> {
        if self.buffer.len() < self.settings.min_samples {
            log::debug!(
                "Training skipped: {} samples buffered, need {}",
                self.buffer.len(),
                self.settings.min_samples
            );
            return Ok(TrainingReport::skipped(reward));
        }

        // Validate the whole batch first so an error never leaves a partial update
        let batch: Vec<&TrainingSample> = self.buffer.recent(self.settings.batch_size).collect();
        for sample in &batch {
            self.check_input(&sample.features)?;
            if sample.target.len() != self.network.output_size() {
                return Err(ModelError::TargetLength {
                    expected: self.network.output_size(),
                    actual: sample.target.len(),
                });
            }
        }

        let lr = self.settings.learning_rate;
        for sample in &batch {
            self.network.train_sample(&sample.features, &sample.target, reward, lr)?;
        }
        let samples = batch.len();
        self.training_rounds += 1;

        log::debug!(
            "Training round {}: {} samples, reward {:+.2}, epsilon {:.3}",
            self.training_rounds,
            samples,
            reward,
            self.epsilon
        );
        Ok(TrainingReport {
            samples,
            reward,
            skipped: false,
        })
    }

    /// Forget buffered experience and restart the exploration schedule
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.epsilon = self.settings.epsilon_start.max(self.settings.epsilon_min);
        self.decisions = 0;
    }

    /// Swap in a loaded network
    pub fn replace_network(&mut self, network: NeuralNetwork) -> Result<(), ModelError> {
        check_topology(&network)?;
        self.network = network;
        Ok(())
    }

    pub fn snapshot(&self) -> ModelSnapshot {
        self.network.snapshot()
    }

    pub fn network(&self) -> &NeuralNetwork {
        &self.network
    }

    pub fn buffer(&self) -> &TrainingBuffer {
        &self.buffer
    }

    pub fn settings(&self) -> &AiSettings {
        &self.settings
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn decisions(&self) -> u64 {
        self.decisions
    }

    pub fn training_rounds(&self) -> u64 {
        self.training_rounds
    }
}

fn check_topology(network: &NeuralNetwork) -> Result<(), ModelError> {
    if network.input_size() != FEATURE_COUNT || network.output_size() != ACTION_COUNT {
        return Err(ModelError::Topology {
            expected_inputs: FEATURE_COUNT,
            expected_outputs: ACTION_COUNT,
            inputs: network.input_size(),
            outputs: network.output_size(),
        });
    }
    Ok(())
}

/// Move toward the predicted intercept
fn heuristic_action(features: &[f32]) -> Action {
    match features.get(INTERCEPT_OFFSET) {
        Some(&offset) if offset < -HEURISTIC_DEADZONE => Action::Up,
        Some(&offset) if offset > HEURISTIC_DEADZONE => Action::Down,
        _ => Action::Hold,
    }
}

/// First index of the largest value (ties go to the lower index)
fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}
