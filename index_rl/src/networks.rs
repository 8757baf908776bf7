use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation::{relu, softmax};
use burn::tensor::{backend::Backend, Tensor};
use serde::{Deserialize, Serialize};

// Per-action scoring network shared by the online and target copies.

/// How the action head's output is turned into scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOutput {
    /// Softmax across actions: scores are relative preferences summing to 1.
    #[default]
    Normalized,
    /// Unconstrained linear head, as in vanilla DQN.
    Raw,
}

#[derive(Module, Debug)]
pub struct QNetwork<B: Backend> {
    layers: Vec<Linear<B>>,
    action_head: Linear<B>,
}

impl<B: Backend> QNetwork<B> {
    pub fn new(
        state_size: usize,
        hidden_size: usize,
        num_layers: usize,
        action_size: usize,
        device: &B::Device,
    ) -> Self {
        let mut in_features = state_size;
        let mut layers = Vec::new();
        for _ in 0..num_layers {
            layers.push(LinearConfig::new(in_features, hidden_size).init(device));
            in_features = hidden_size;
        }
        let action_head = LinearConfig::new(in_features, action_size).init(device);
        Self { layers, action_head }
    }

    /// Raw action-head activations, `[batch, action_size]`.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = input;
        for layer in self.layers.iter() {
            x = layer.forward(x);
            x = relu(x);
        }
        self.action_head.forward(x)
    }

    pub fn scores(&self, input: Tensor<B, 2>, output: ScoreOutput) -> Tensor<B, 2> {
        let logits = self.forward(input);
        match output {
            ScoreOutput::Normalized => softmax(logits, 1),
            ScoreOutput::Raw => logits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;

    #[test]
    fn test_q_network_forward_pass() {
        type B = NdArray;
        let device = Default::default();
        let batch_size = 4usize;
        let state_size = 10usize;
        let action_size = 5usize;
        let net: QNetwork<B> = QNetwork::new(state_size, 8, 4, action_size, &device);
        let input = Tensor::<B, 2>::zeros([batch_size, state_size], &device);
        let output = net.forward(input);
        assert_eq!(output.dims(), [batch_size, action_size]);
    }

    #[test]
    fn test_normalized_scores_sum_to_one() {
        type B = NdArray;
        let device = Default::default();
        let net: QNetwork<B> = QNetwork::new(3, 8, 2, 4, &device);
        let input = Tensor::<B, 2>::ones([2, 3], &device);
        let scores = net.scores(input, ScoreOutput::Normalized);
        let values: Vec<f32> = scores.into_data().to_vec().unwrap();
        for row in values.chunks(4) {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
            assert!(row.iter().all(|&v| v >= 0.0));
        }
    }

    #[test]
    fn test_zero_hidden_layers_is_linear_head() {
        type B = NdArray;
        let device = Default::default();
        let net: QNetwork<B> = QNetwork::new(6, 8, 0, 3, &device);
        let input = Tensor::<B, 2>::zeros([1, 6], &device);
        assert_eq!(net.scores(input, ScoreOutput::Raw).dims(), [1, 3]);
    }
}
