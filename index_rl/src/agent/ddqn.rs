// Double DQN agent with prioritized replay
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::schedule::EpsilonSchedule;
use super::targets::{argmax, double_q_target};
use crate::approximator::ValueApproximator;
use crate::error::{AgentError, Result};
use crate::memory::ReplayMemory;
use crate::settings::{AgentSettings, MemorySettings};

/// `(state, action, reward, next_state)`; `next_state == None` marks a
/// terminal transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: Vec<f32>,
    pub action: usize,
    pub reward: f32,
    pub next_state: Option<Vec<f32>>,
}

impl Transition {
    pub fn new(state: Vec<f32>, action: usize, reward: f32, next_state: Vec<f32>) -> Self {
        Self {
            state,
            action,
            reward,
            next_state: Some(next_state),
        }
    }

    pub fn terminal(state: Vec<f32>, action: usize, reward: f32) -> Self {
        Self {
            state,
            action,
            reward,
            next_state: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next_state.is_none()
    }
}

/// Outcome of one `replay()` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub step: u64,
    pub epsilon: f64,
    pub loss: f32,
    pub td_errors: Vec<f32>,
}

impl ReplayReport {
    pub fn mean_td_error(&self) -> f32 {
        if self.td_errors.is_empty() {
            return 0.0;
        }
        self.td_errors.iter().sum::<f32>() / self.td_errors.len() as f32
    }
}

/// Inputs for one training step plus the TD error of each row.
struct TargetBatch {
    states: Vec<Vec<f32>>,
    targets: Vec<Vec<f32>>,
    errors: Vec<f32>,
}

pub struct Agent<V> {
    approximator: V,
    memory: ReplayMemory<Transition>,
    schedule: EpsilonSchedule,
    gamma: f32,
    batch_size: usize,
    sync_frequency: u64,
    steps: u64,
    epsilon: f64,
    target_syncs: u64,
    rng: StdRng,
}

impl<V: ValueApproximator> Agent<V> {
    pub fn new(approximator: V, settings: &AgentSettings, memory: &MemorySettings) -> Result<Self> {
        settings.validate()?;
        memory.validate()?;
        if approximator.state_size() == 0 || approximator.action_size() == 0 {
            return Err(AgentError::configuration(
                "agent needs a non-empty state and at least one action",
            ));
        }

        let schedule = EpsilonSchedule::new(
            settings.epsilon_max,
            settings.epsilon_min,
            settings.exploration_horizon,
        );
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            approximator,
            memory: ReplayMemory::new(memory.capacity, memory.priority_epsilon, memory.priority_alpha)?,
            epsilon: schedule.value(0),
            schedule,
            gamma: settings.gamma,
            batch_size: settings.batch_size,
            sync_frequency: settings.target_sync_frequency,
            steps: 0,
            target_syncs: 0,
            rng,
        })
    }

    pub fn state_size(&self) -> usize {
        self.approximator.state_size()
    }

    pub fn action_size(&self) -> usize {
        self.approximator.action_size()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn target_syncs(&self) -> u64 {
        self.target_syncs
    }

    pub fn memory(&self) -> &ReplayMemory<Transition> {
        &self.memory
    }

    pub fn approximator(&self) -> &V {
        &self.approximator
    }

    /// Epsilon-greedy: a uniform draw below epsilon explores, otherwise the
    /// online network's best action is taken.
    pub fn act(&mut self, state: &[f32]) -> Result<usize> {
        self.check_state(state)?;
        let actions = self.action_size();
        if self.rng.gen::<f64>() < self.epsilon {
            let action = self.rng.gen_range(0..actions);
            debug!(step = self.steps, epsilon = self.epsilon, action, "exploring");
            return Ok(action);
        }
        let scores = self.approximator.predict_one(state, false)?;
        let action = argmax(&scores);
        debug!(step = self.steps, epsilon = self.epsilon, action, "exploiting");
        Ok(action)
    }

    /// Stores the transition with its current TD error as priority, then
    /// advances the step counter, syncing the target every
    /// `target_sync_frequency` steps and re-deriving epsilon.
    pub fn observe(&mut self, transition: Transition) -> Result<f32> {
        let batch = self.compute_targets(std::slice::from_ref(&transition))?;
        let td_error = batch.errors[0];
        self.memory.add(td_error as f64, transition)?;

        self.steps += 1;
        if self.steps % self.sync_frequency == 0 {
            self.approximator.sync_target();
            self.target_syncs += 1;
            debug!(step = self.steps, "target network synced");
        }
        self.epsilon = self.schedule.value(self.steps);

        debug!(step = self.steps, epsilon = self.epsilon, td_error, "observed transition");
        Ok(td_error)
    }

    /// Samples a prioritized batch, recomputes double-Q targets, trains the
    /// online network once and writes the fresh TD errors back as priorities.
    pub fn replay(&mut self) -> Result<ReplayReport> {
        if self.memory.is_empty() {
            return Err(AgentError::EmptyMemory);
        }
        let sampled = self.memory.sample(self.batch_size, &mut self.rng)?;
        let transitions: Vec<Transition> = sampled.iter().map(|e| e.item.clone()).collect();
        let batch = self.compute_targets(&transitions)?;

        let loss = self.approximator.train_step(&batch.states, &batch.targets)?;
        for (entry, &error) in sampled.iter().zip(batch.errors.iter()) {
            self.memory.update(entry.leaf_index, error as f64)?;
        }

        debug!(step = self.steps, loss, batch = sampled.len(), "replayed batch");
        Ok(ReplayReport {
            step: self.steps,
            epsilon: self.epsilon,
            loss,
            td_errors: batch.errors,
        })
    }

    fn check_state(&self, state: &[f32]) -> Result<()> {
        if state.len() != self.state_size() {
            return Err(AgentError::configuration(format!(
                "state has length {}, agent expects {}",
                state.len(),
                self.state_size()
            )));
        }
        Ok(())
    }

    fn check_transition(&self, transition: &Transition) -> Result<()> {
        self.check_state(&transition.state)?;
        if let Some(next) = &transition.next_state {
            self.check_state(next)?;
        }
        if transition.action >= self.action_size() {
            return Err(AgentError::configuration(format!(
                "transition action {} outside action space of {}",
                transition.action,
                self.action_size()
            )));
        }
        Ok(())
    }

    /// Each target row is the online prediction for the state with only the
    /// taken action's slot replaced by the double-Q target. A non-finite TD
    /// error fails the whole batch before anything reaches memory.
    fn compute_targets(&self, batch: &[Transition]) -> Result<TargetBatch> {
        for transition in batch {
            self.check_transition(transition)?;
        }
        let blank = vec![0.0; self.state_size()];
        let states: Vec<Vec<f32>> = batch.iter().map(|t| t.state.clone()).collect();
        let next_states: Vec<Vec<f32>> = batch
            .iter()
            .map(|t| t.next_state.clone().unwrap_or_else(|| blank.clone()))
            .collect();

        let predicted = self.approximator.predict(&states, false)?;
        let online_next = self.approximator.predict(&next_states, false)?;
        let target_next = self.approximator.predict(&next_states, true)?;

        let mut targets = Vec::with_capacity(batch.len());
        let mut errors = Vec::with_capacity(batch.len());
        for (i, transition) in batch.iter().enumerate() {
            let mut row = predicted[i].clone();
            let old_value = row[transition.action];
            let next = transition
                .next_state
                .as_ref()
                .map(|_| (online_next[i].as_slice(), target_next[i].as_slice()));
            let target = double_q_target(transition.reward, self.gamma, next);
            let error = (old_value - target).abs();
            if !error.is_finite() {
                return Err(AgentError::NonFiniteTdError(error));
            }
            row[transition.action] = target;
            errors.push(error);
            targets.push(row);
        }

        Ok(TargetBatch {
            states,
            targets,
            errors,
        })
    }
}
