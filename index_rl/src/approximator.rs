// Online/target value approximator
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, Tensor, TensorData};

use crate::controller::ApproximatorFactory;
use crate::error::{AgentError, Result};
use crate::networks::{QNetwork, ScoreOutput};
use crate::settings::NetworkSettings;

/// Maps a state vector of length `state_size` to one score per action,
/// backed by two structurally identical functions: `online`, trained every
/// step, and `target`, a hard copy refreshed by [`sync_target`].
///
/// [`sync_target`]: ValueApproximator::sync_target
pub trait ValueApproximator {
    fn state_size(&self) -> usize;

    fn action_size(&self) -> usize;

    /// Scores for each state in the batch. Pure inference.
    fn predict(&self, states: &[Vec<f32>], use_target: bool) -> Result<Vec<Vec<f32>>>;

    /// One optimization step on `online` minimizing squared error against
    /// `targets`. Returns the loss; a non-finite loss is an error and the
    /// parameters are left untouched.
    fn train_step(&mut self, states: &[Vec<f32>], targets: &[Vec<f32>]) -> Result<f32>;

    /// Overwrites every `target` parameter with the current `online` one.
    fn sync_target(&mut self);

    fn predict_one(&self, state: &[f32], use_target: bool) -> Result<Vec<f32>> {
        self.predict(&[state.to_vec()], use_target)?
            .pop()
            .ok_or_else(|| AgentError::configuration("approximator returned an empty batch"))
    }
}

pub struct BurnApproximator<B: AutodiffBackend, O> {
    online: QNetwork<B>,
    target: QNetwork<B::InnerBackend>,
    optimizer: O,
    learning_rate: f64,
    output: ScoreOutput,
    state_size: usize,
    action_size: usize,
    device: B::Device,
}

/// Approximator trained with Adam, the default for the agent.
pub fn adam_approximator<B: AutodiffBackend>(
    state_size: usize,
    action_size: usize,
    settings: &NetworkSettings,
    device: &B::Device,
) -> Result<BurnApproximator<B, impl Optimizer<QNetwork<B>, B>>> {
    let optimizer = AdamConfig::new().init::<B, QNetwork<B>>();
    BurnApproximator::new(state_size, action_size, settings, optimizer, device)
}

/// Factory handing the controller an Adam-trained approximator sized from
/// its first batch of context vectors.
pub fn adam_factory<B>(
    settings: NetworkSettings,
    device: B::Device,
) -> ApproximatorFactory<BurnApproximator<B, impl Optimizer<QNetwork<B>, B>>>
where
    B: AutodiffBackend,
    B::Device: 'static,
{
    Box::new(move |state_size, action_size| {
        adam_approximator::<B>(state_size, action_size, &settings, &device)
    })
}

impl<B, O> BurnApproximator<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<QNetwork<B>, B>,
{
    pub fn new(
        state_size: usize,
        action_size: usize,
        settings: &NetworkSettings,
        optimizer: O,
        device: &B::Device,
    ) -> Result<Self> {
        if state_size == 0 || action_size == 0 {
            return Err(AgentError::configuration(format!(
                "approximator needs positive dimensions, got state={} actions={}",
                state_size, action_size
            )));
        }
        let online = QNetwork::new(
            state_size,
            settings.hidden_units,
            settings.num_layers,
            action_size,
            device,
        );
        let target = online.valid();
        Ok(Self {
            online,
            target,
            optimizer,
            learning_rate: settings.learning_rate,
            output: settings.output,
            state_size,
            action_size,
            device: device.clone(),
        })
    }

    pub fn output(&self) -> ScoreOutput {
        self.output
    }

    fn flatten(&self, rows: &[Vec<f32>], width: usize, what: &str) -> Result<Vec<f32>> {
        let mut flat = Vec::with_capacity(rows.len() * width);
        for row in rows {
            if row.len() != width {
                return Err(AgentError::configuration(format!(
                    "{} vector has length {}, expected {}",
                    what,
                    row.len(),
                    width
                )));
            }
            flat.extend_from_slice(row);
        }
        Ok(flat)
    }
}

fn into_rows(data: TensorData, width: usize) -> Result<Vec<Vec<f32>>> {
    let values: Vec<f32> = data
        .convert::<f32>()
        .to_vec()
        .map_err(|e| AgentError::Tensor(format!("{:?}", e)))?;
    Ok(values.chunks(width).map(|row| row.to_vec()).collect())
}

impl<B, O> ValueApproximator for BurnApproximator<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<QNetwork<B>, B>,
{
    fn state_size(&self) -> usize {
        self.state_size
    }

    fn action_size(&self) -> usize {
        self.action_size
    }

    fn predict(&self, states: &[Vec<f32>], use_target: bool) -> Result<Vec<Vec<f32>>> {
        if states.is_empty() {
            return Ok(Vec::new());
        }
        let flat = self.flatten(states, self.state_size, "state")?;
        let data = TensorData::new(flat, [states.len(), self.state_size]);
        let input = Tensor::<B::InnerBackend, 2>::from_data(data, &self.device);

        let scores = if use_target {
            self.target.scores(input, self.output)
        } else {
            self.online.valid().scores(input, self.output)
        };
        into_rows(scores.into_data(), self.action_size)
    }

    fn train_step(&mut self, states: &[Vec<f32>], targets: &[Vec<f32>]) -> Result<f32> {
        if states.len() != targets.len() || states.is_empty() {
            return Err(AgentError::configuration(format!(
                "training batch mismatch: {} states, {} targets",
                states.len(),
                targets.len()
            )));
        }
        let batch = states.len();
        let x = self.flatten(states, self.state_size, "state")?;
        let y = self.flatten(targets, self.action_size, "target")?;

        let x = Tensor::<B, 2>::from_data(TensorData::new(x, [batch, self.state_size]), &self.device);
        let y = Tensor::<B, 2>::from_data(TensorData::new(y, [batch, self.action_size]), &self.device);

        let predicted = self.online.scores(x, self.output);
        let loss = (predicted - y).powf_scalar(2.0).mean();
        let loss_value: f32 = loss.clone().into_scalar().elem();
        if !loss_value.is_finite() {
            return Err(AgentError::NonFiniteLoss(loss_value));
        }

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.online);
        self.online = self
            .optimizer
            .step(self.learning_rate, self.online.clone(), grads);
        Ok(loss_value)
    }

    fn sync_target(&mut self) {
        self.target = self.online.valid();
    }
}
