//! Dense feedforward network with hand-written forward and backward passes
//!
//! Layers are stored row-major: `weights[i * units + j]` connects input `i`
//! to unit `j`. Hidden layers use ReLU, the output layer uses softmax.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Snapshot format version written by `NeuralNetwork::snapshot`
pub const SNAPSHOT_VERSION: u32 = 1;

/// Shape and contract violations. These are programming errors on the
/// caller's side, never transient conditions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("input has {actual} features, network expects {expected}")]
    InputLength { expected: usize, actual: usize },

    #[error("target has {actual} entries, network produces {expected}")]
    TargetLength { expected: usize, actual: usize },

    #[error("model is {inputs}->{outputs}, expected {expected_inputs}->{expected_outputs}")]
    Topology {
        expected_inputs: usize,
        expected_outputs: usize,
        inputs: usize,
        outputs: usize,
    },

    #[error("layer {layer} takes {actual} inputs but the previous layer has {expected} units")]
    LayerChain {
        layer: usize,
        expected: usize,
        actual: usize,
    },

    #[error("layer {layer} is malformed: {reason}")]
    LayerShape { layer: usize, reason: String },

    #[error("layer parameters are malformed: {0}")]
    LayerParts(String),

    #[error("expected {expected} parameters, got {actual}")]
    ParameterCount { expected: usize, actual: usize },

    #[error("unsupported snapshot version {0}")]
    Version(u32),

    #[error("network needs at least one layer")]
    Empty,
}

/// Per-layer activation function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    /// max(0, x)
    Relu,
    /// Normalized exponential over the whole layer
    Softmax,
}

impl Activation {
    /// Apply in place to a layer's pre-activations
    pub fn apply(self, values: &mut [f32]) {
        match self {
            Activation::Relu => {
                for v in values.iter_mut() {
                    *v = v.max(0.0);
                }
            }
            Activation::Softmax => softmax(values),
        }
    }
}

/// Numerically stable softmax (shifts by the max logit)
pub fn softmax(values: &mut [f32]) {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    if sum > 0.0 {
        for v in values.iter_mut() {
            *v /= sum;
        }
    }
}

/// A dense layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub inputs: usize,
    pub units: usize,
    pub activation: Activation,
    /// Row-major, `inputs` rows by `units` columns
    pub weights: Vec<f32>,
    pub biases: Vec<f32>,
}

impl Layer {
    /// Xavier-style init: weights uniform in ±1/√fan_in, zero biases
    pub fn new<R: Rng>(
        inputs: usize,
        units: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let limit = 1.0 / (inputs.max(1) as f32).sqrt();
        let weights = (0..inputs * units)
            .map(|_| rng.random_range(-limit..limit))
            .collect();
        Self {
            inputs,
            units,
            activation,
            weights,
            biases: vec![0.0; units],
        }
    }

    /// Build a layer from explicit parameters
    pub fn from_parts(
        weights: Vec<f32>,
        biases: Vec<f32>,
        activation: Activation,
    ) -> Result<Self, ModelError> {
        let units = biases.len();
        if units == 0 || weights.len() % units != 0 {
            return Err(ModelError::LayerParts(format!(
                "{} weights do not divide into {} units",
                weights.len(),
                units
            )));
        }
        Ok(Self {
            inputs: weights.len() / units,
            units,
            activation,
            weights,
            biases,
        })
    }

    #[inline]
    pub fn weight(&self, input: usize, unit: usize) -> f32 {
        self.weights[input * self.units + unit]
    }

    pub fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }

    fn validate(&self, layer: usize) -> Result<(), ModelError> {
        if self.inputs == 0 || self.units == 0 {
            return Err(ModelError::LayerShape {
                layer,
                reason: "zero-sized layer".to_string(),
            });
        }
        if self.weights.len() != self.inputs * self.units {
            return Err(ModelError::LayerShape {
                layer,
                reason: format!(
                    "{} weights for a {}x{} matrix",
                    self.weights.len(),
                    self.inputs,
                    self.units
                ),
            });
        }
        if self.biases.len() != self.units {
            return Err(ModelError::LayerShape {
                layer,
                reason: format!("{} biases for {} units", self.biases.len(), self.units),
            });
        }
        Ok(())
    }

    /// input × W + b, then the activation
    fn forward(&self, input: &[f32]) -> Vec<f32> {
        let mut out = self.biases.clone();
        for (i, &x) in input.iter().enumerate() {
            let row = &self.weights[i * self.units..(i + 1) * self.units];
            for (o, &w) in out.iter_mut().zip(row) {
                *o += x * w;
            }
        }
        self.activation.apply(&mut out);
        out
    }

    /// Error for the previous layer: Σ_j W[i][j] · err[j]
    fn propagate_error(&self, error: &[f32]) -> Vec<f32> {
        (0..self.inputs)
            .map(|i| {
                let row = &self.weights[i * self.units..(i + 1) * self.units];
                row.iter().zip(error).map(|(w, e)| w * e).sum()
            })
            .collect()
    }

    /// W[i][j] += lr · err[j] · in[i], b[j] += lr · err[j]
    fn apply_update(&mut self, input: &[f32], error: &[f32], learning_rate: f32) {
        for (i, &x) in input.iter().enumerate() {
            let row = &mut self.weights[i * self.units..(i + 1) * self.units];
            for (w, &e) in row.iter_mut().zip(error) {
                *w += learning_rate * e * x;
            }
        }
        for (b, &e) in self.biases.iter_mut().zip(error) {
            *b += learning_rate * e;
        }
    }
}

/// Every layer's output from one forward pass
#[derive(Debug, Clone)]
pub struct ForwardPass {
    /// `activations[0]` is the input, the last entry is the network output
    pub activations: Vec<Vec<f32>>,
}

impl ForwardPass {
    pub fn output(&self) -> &[f32] {
        self.activations.last().map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Serialized form: ordered (weights, biases, activation) triples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub version: u32,
    pub layers: Vec<Layer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralNetwork {
    layers: Vec<Layer>,
}

impl NeuralNetwork {
    /// Build from layer sizes, e.g. `[20, 32, 16, 3]`. Hidden layers are
    /// ReLU, the last layer is softmax.
    pub fn new<R: Rng>(topology: &[usize], rng: &mut R) -> Result<Self, ModelError> {
        if topology.len() < 2 {
            return Err(ModelError::Empty);
        }
        let last = topology.len() - 2;
        let layers = topology
            .windows(2)
            .enumerate()
            .map(|(index, pair)| {
                let activation = if index == last {
                    Activation::Softmax
                } else {
                    Activation::Relu
                };
                Layer::new(pair[0], pair[1], activation, rng)
            })
            .collect();
        Self::from_layers(layers)
    }

    /// Build from explicit layers, checking every shape
    pub fn from_layers(layers: Vec<Layer>) -> Result<Self, ModelError> {
        if layers.is_empty() {
            return Err(ModelError::Empty);
        }
        for (index, layer) in layers.iter().enumerate() {
            layer.validate(index)?;
            if index > 0 && layers[index - 1].units != layer.inputs {
                return Err(ModelError::LayerChain {
                    layer: index,
                    expected: layers[index - 1].units,
                    actual: layer.inputs,
                });
            }
        }
        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn input_size(&self) -> usize {
        self.layers[0].inputs
    }

    pub fn output_size(&self) -> usize {
        self.layers[self.layers.len() - 1].units
    }

    /// Layer sizes including the input, e.g. `[20, 32, 16, 3]`
    pub fn topology(&self) -> Vec<usize> {
        std::iter::once(self.input_size())
            .chain(self.layers.iter().map(|l| l.units))
            .collect()
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(Layer::parameter_count).sum()
    }

    /// Run the network, keeping every intermediate activation
    pub fn forward(&self, input: &[f32]) -> Result<ForwardPass, ModelError> {
        if input.len() != self.input_size() {
            return Err(ModelError::InputLength {
                expected: self.input_size(),
                actual: input.len(),
            });
        }

        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(input.to_vec());
        for layer in &self.layers {
            let next = layer.forward(&activations[activations.len() - 1]);
            activations.push(next);
        }
        Ok(ForwardPass { activations })
    }

    /// Output distribution only
    pub fn predict(&self, input: &[f32]) -> Result<Vec<f32>, ModelError> {
        let mut pass = self.forward(input)?;
        Ok(pass.activations.pop().unwrap_or_default())
    }

    /// One reward-scaled update toward `target`.
    ///
    /// The output error is `(target - output) * reward`. Walking from the last
    /// layer back, the error for the previous layer is taken through the
    /// weights before they are updated, and zeroed wherever a ReLU unit was
    /// inactive in the forward pass.
    pub fn train_sample(
        &mut self,
        input: &[f32],
        target: &[f32],
        reward: f32,
        learning_rate: f32,
    ) -> Result<(), ModelError> {
        if target.len() != self.output_size() {
            return Err(ModelError::TargetLength {
                expected: self.output_size(),
                actual: target.len(),
            });
        }
        let pass = self.forward(input)?;

        let mut error: Vec<f32> = target
            .iter()
            .zip(pass.output())
            .map(|(t, o)| (t - o) * reward)
            .collect();

        let kinds: Vec<Activation> = self.layers.iter().map(|l| l.activation).collect();
        for index in (0..self.layers.len()).rev() {
            let layer_input = &pass.activations[index];
            let layer = &mut self.layers[index];

            let propagated = if index > 0 {
                let mut prev = layer.propagate_error(&error);
                if kinds[index - 1] == Activation::Relu {
                    for (e, &a) in prev.iter_mut().zip(layer_input) {
                        if a <= 0.0 {
                            *e = 0.0;
                        }
                    }
                }
                Some(prev)
            } else {
                None
            };

            layer.apply_update(layer_input, &error, learning_rate);

            match propagated {
                Some(prev) => error = prev,
                None => break,
            }
        }
        Ok(())
    }

    /// All parameters in layer order: weights (row-major) then biases
    pub fn to_flat(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.parameter_count());
        for layer in &self.layers {
            out.extend_from_slice(&layer.weights);
            out.extend_from_slice(&layer.biases);
        }
        out
    }

    /// Overwrite every parameter from a flat array of exactly the right length
    pub fn load_flat(&mut self, values: &[f32]) -> Result<(), ModelError> {
        if values.len() != self.parameter_count() {
            return Err(ModelError::ParameterCount {
                expected: self.parameter_count(),
                actual: values.len(),
            });
        }
        let mut offset = 0;
        for layer in &mut self.layers {
            let n = layer.weights.len();
            layer.weights.copy_from_slice(&values[offset..offset + n]);
            offset += n;
            let n = layer.biases.len();
            layer.biases.copy_from_slice(&values[offset..offset + n]);
            offset += n;
        }
        Ok(())
    }

    pub fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            version: SNAPSHOT_VERSION,
            layers: self.layers.clone(),
        }
    }

    /// Restore a snapshot, refusing anything that is not
    /// `expected_inputs -> ... -> expected_outputs` with a softmax head.
    pub fn from_snapshot(
        snapshot: ModelSnapshot,
        expected_inputs: usize,
        expected_outputs: usize,
    ) -> Result<Self, ModelError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(ModelError::Version(snapshot.version));
        }
        let network = Self::from_layers(snapshot.layers)?;
        if network.input_size() != expected_inputs || network.output_size() != expected_outputs {
            return Err(ModelError::Topology {
                expected_inputs,
                expected_outputs,
                inputs: network.input_size(),
                outputs: network.output_size(),
            });
        }
        let head = network.layers.len() - 1;
        if network.layers[head].activation != Activation::Softmax {
            return Err(ModelError::LayerShape {
                layer: head,
                reason: "output layer must be softmax".to_string(),
            });
        }
        Ok(network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn network(topology: &[usize], seed: u64) -> NeuralNetwork {
        let mut rng = Pcg32::seed_from_u64(seed);
        NeuralNetwork::new(topology, &mut rng).expect("valid topology")
    }

    #[test]
    fn test_small_network_outputs_distribution() {
        let net = network(&[4, 8, 3], 7);
        let out = net.predict(&[0.5, 0.0, 0.5, 0.5]).unwrap();
        assert_eq!(out.len(), 3);
        let sum: f32 = out.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6, "sum was {sum}");
    }

    #[test]
    fn test_topology_and_activations() {
        let net = network(&[20, 32, 16, 3], 1);
        assert_eq!(net.topology(), vec![20, 32, 16, 3]);
        assert_eq!(net.layers()[0].activation, Activation::Relu);
        assert_eq!(net.layers()[1].activation, Activation::Relu);
        assert_eq!(net.layers()[2].activation, Activation::Softmax);
        assert_eq!(net.parameter_count(), 20 * 32 + 32 + 32 * 16 + 16 + 16 * 3 + 3);
    }

    #[test]
    fn test_xavier_bounds() {
        let net = network(&[16, 4, 3], 3);
        let limit = 1.0 / 4.0;
        assert!(net.layers()[0].weights.iter().all(|w| w.abs() <= limit));
        assert!(net.layers()[0].biases.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_input_length_mismatch_is_an_error() {
        let net = network(&[4, 8, 3], 7);
        let err = net.forward(&[1.0, 2.0]).unwrap_err();
        assert_eq!(err, ModelError::InputLength { expected: 4, actual: 2 });
    }

    #[test]
    fn test_forward_keeps_intermediate_activations() {
        let net = network(&[4, 8, 5, 3], 7);
        let pass = net.forward(&[0.1, 0.2, 0.3, 0.4]).unwrap();
        let lens: Vec<usize> = pass.activations.iter().map(Vec::len).collect();
        assert_eq!(lens, vec![4, 8, 5, 3]);
        assert!(pass.activations[1].iter().all(|&a| a >= 0.0));
    }

    #[test]
    fn test_softmax_handles_large_logits() {
        let mut v = [1000.0, 1001.0, 999.0];
        softmax(&mut v);
        assert!(v.iter().all(|x| x.is_finite()));
        assert!(v[1] > v[0] && v[0] > v[2]);
    }

    #[test]
    fn test_training_moves_output_toward_target() {
        let mut net = network(&[4, 8, 3], 11);
        let input = [0.5, 0.0, 0.5, 0.5];
        let before = net.predict(&input).unwrap()[2];
        for _ in 0..25 {
            net.train_sample(&input, &[0.0, 0.0, 1.0], 1.0, 0.01).unwrap();
        }
        let after = net.predict(&input).unwrap()[2];
        assert!(after > before, "{after} <= {before}");
    }

    #[test]
    fn test_negative_reward_moves_output_away() {
        let mut net = network(&[4, 8, 3], 11);
        let input = [0.5, 0.0, 0.5, 0.5];
        let before = net.predict(&input).unwrap()[2];
        for _ in 0..25 {
            net.train_sample(&input, &[0.0, 0.0, 1.0], -0.5, 0.01).unwrap();
        }
        let after = net.predict(&input).unwrap()[2];
        assert!(after < before, "{after} >= {before}");
    }

    #[test]
    fn test_backprop_update_rule_and_relu_gate() {
        // Identity hidden layer so unit 1 is inactive for input [1, -1]
        let hidden = Layer::from_parts(vec![1.0, 0.0, 0.0, 1.0], vec![0.0, 0.0], Activation::Relu)
            .unwrap();
        let head = Layer::from_parts(
            vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            vec![0.0, 0.0, 0.0],
            Activation::Softmax,
        )
        .unwrap();
        let mut net = NeuralNetwork::from_layers(vec![hidden, head]).unwrap();
        let input = [1.0, -1.0];
        let target = [0.0, 0.0, 1.0];
        let lr = 0.5;

        let pass = net.forward(&input).unwrap();
        assert_eq!(pass.activations[1], vec![1.0, 0.0]);
        let err: Vec<f32> = target.iter().zip(pass.output()).map(|(t, o)| t - o).collect();

        net.train_sample(&input, &target, 1.0, lr).unwrap();
        let hidden = &net.layers()[0];
        let head = &net.layers()[1];

        // Output layer: only the active hidden unit's row moves
        for j in 0..3 {
            assert!((head.weight(0, j) - ([0.0, 0.0, 1.0][j] + lr * err[j])).abs() < 1e-6);
            assert!((head.weight(1, j) - [0.0, 0.0, 1.0][j]).abs() < 1e-6);
            assert!((head.biases[j] - lr * err[j]).abs() < 1e-6);
        }

        // Hidden unit 0 gets err[2] through the old weights; unit 1 is gated
        let delta0 = err[2];
        assert!((hidden.weight(0, 0) - (1.0 + lr * delta0)).abs() < 1e-6);
        assert!((hidden.weight(1, 0) - (-lr * delta0)).abs() < 1e-6);
        assert_eq!(hidden.weight(0, 1), 0.0);
        assert_eq!(hidden.weight(1, 1), 1.0);
        assert_eq!(hidden.biases[1], 0.0);
    }

    #[test]
    fn test_target_length_mismatch_is_an_error() {
        let mut net = network(&[4, 8, 3], 7);
        let err = net.train_sample(&[0.0; 4], &[1.0, 0.0], 1.0, 0.01).unwrap_err();
        assert_eq!(err, ModelError::TargetLength { expected: 3, actual: 2 });
    }

    #[test]
    fn test_flat_round_trip_reproduces_outputs() {
        let source = network(&[4, 8, 3], 5);
        let mut restored = network(&[4, 8, 3], 99);
        restored.load_flat(&source.to_flat()).unwrap();
        let input = [0.3, -0.2, 0.9, 0.1];
        assert_eq!(source.predict(&input).unwrap(), restored.predict(&input).unwrap());
    }

    #[test]
    fn test_load_flat_rejects_wrong_length() {
        let mut net = network(&[4, 8, 3], 5);
        let before = net.clone();
        let mut values = net.to_flat();
        values.pop();
        let err = net.load_flat(&values).unwrap_err();
        assert!(matches!(err, ModelError::ParameterCount { .. }));
        assert_eq!(net, before);
    }

    #[test]
    fn test_snapshot_rejects_mismatched_topology() {
        let net = network(&[4, 8, 3], 5);
        let err = NeuralNetwork::from_snapshot(net.snapshot(), 20, 3).unwrap_err();
        assert!(matches!(err, ModelError::Topology { inputs: 4, .. }));

        let restored = NeuralNetwork::from_snapshot(net.snapshot(), 4, 3).unwrap();
        assert_eq!(restored, net);
    }

    #[test]
    fn test_snapshot_rejects_broken_layers() {
        let net = network(&[4, 8, 3], 5);
        let mut snapshot = net.snapshot();
        snapshot.layers[1].inputs = 7;
        snapshot.layers[1].weights.truncate(7 * 3);
        let err = NeuralNetwork::from_snapshot(snapshot, 4, 3).unwrap_err();
        assert!(matches!(err, ModelError::LayerChain { layer: 1, .. }));

        let mut snapshot = net.snapshot();
        snapshot.layers[0].biases.push(0.0);
        assert!(matches!(
            NeuralNetwork::from_snapshot(snapshot, 4, 3),
            Err(ModelError::LayerShape { layer: 0, .. })
        ));
    }

    #[test]
    fn test_layer_from_mismatched_parts() {
        let err = Layer::from_parts(vec![1.0; 5], vec![0.0; 2], Activation::Relu).unwrap_err();
        assert!(matches!(err, ModelError::LayerParts(_)));
        assert!(Layer::from_parts(vec![], vec![], Activation::Softmax).is_err());

        let layer = Layer::from_parts(vec![1.0; 6], vec![0.0; 2], Activation::Relu).unwrap();
        assert_eq!((layer.inputs, layer.units), (3, 2));
    }

    #[test]
    fn test_degenerate_topologies_rejected() {
        let mut rng = Pcg32::seed_from_u64(0);
        assert_eq!(NeuralNetwork::new(&[4], &mut rng), Err(ModelError::Empty));
        assert!(NeuralNetwork::new(&[4, 0, 3], &mut rng).is_err());
    }

    proptest! {
        #[test]
        fn proptest_output_is_distribution(
            inputs in proptest::collection::vec(-1.0f32..1.0, 20),
            seed in 0u64..1000,
        ) {
            let net = network(&[20, 32, 16, 3], seed);
            let out = net.predict(&inputs).unwrap();
            prop_assert_eq!(out.len(), 3);
            prop_assert!(out.iter().all(|&p| p >= 0.0));
            let sum: f32 = out.iter().sum();
            prop_assert!((sum - 1.0).abs() < 1e-5);
        }
    }
}
