// DDQN controller - maps arms and context vectors onto the agent
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};

use crate::agent::{Agent, ReplayReport, Transition};
use crate::approximator::ValueApproximator;
use crate::arm::Arm;
use crate::error::{AgentError, Result};
use crate::settings::{AgentSettings, ControllerSettings, MemorySettings};

/// Where `update` gets the state vectors of the transitions it feeds the
/// agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StateSource {
    /// The aggregate state built when the arm was selected; the next state
    /// is the aggregate state of the latest selection round.
    #[default]
    Observed,
    /// Fresh standard-normal vectors on every update. The learned scores are
    /// then not conditioned on the real context.
    RandomPlaceholder,
}

/// Builds the approximator once state and action sizes are known.
pub type ApproximatorFactory<V> = Box<dyn Fn(usize, usize) -> Result<V>>;

pub struct DdqnController<A, V> {
    agent_settings: AgentSettings,
    memory_settings: MemorySettings,
    state_source: StateSource,
    factory: ApproximatorFactory<V>,
    agent: Option<Agent<V>>,
    arms: Vec<A>,
    state_size: usize,
    action_size: usize,
    selection_states: HashMap<usize, Vec<f32>>,
    last_state: Option<Vec<f32>>,
    pooled_rounds: u64,
    rng: StdRng,
}

impl<A: Arm, V: ValueApproximator> DdqnController<A, V> {
    pub fn new(
        agent_settings: AgentSettings,
        memory_settings: MemorySettings,
        controller_settings: &ControllerSettings,
        factory: ApproximatorFactory<V>,
    ) -> Self {
        let rng = match agent_settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
            None => StdRng::from_entropy(),
        };
        Self {
            agent_settings,
            memory_settings,
            state_source: controller_settings.state_source,
            factory,
            agent: None,
            arms: Vec::new(),
            state_size: 0,
            action_size: 0,
            selection_states: HashMap::new(),
            last_state: None,
            pooled_rounds: 0,
            rng,
        }
    }

    /// Sizes the agent from the first batch of context vectors: state size is
    /// the length of the first vector, action count the number of vectors.
    /// Calling it again starts learning from scratch.
    pub fn initialize(&mut self, context_vectors: &[Vec<f32>]) -> Result<()> {
        let first = context_vectors.first().ok_or_else(|| {
            AgentError::configuration("initialize needs at least one context vector")
        })?;
        if first.is_empty() {
            return Err(AgentError::configuration("context vectors must not be empty"));
        }
        if let Some(bad) = context_vectors.iter().find(|cv| cv.len() != first.len()) {
            return Err(AgentError::configuration(format!(
                "inconsistent context vector lengths: {} and {}",
                first.len(),
                bad.len()
            )));
        }

        let state_size = first.len();
        let action_size = context_vectors.len();
        let approximator = (self.factory)(state_size, action_size)?;
        if approximator.state_size() != state_size || approximator.action_size() != action_size {
            return Err(AgentError::configuration(format!(
                "approximator shape {}x{} does not match context {}x{}",
                approximator.state_size(),
                approximator.action_size(),
                state_size,
                action_size
            )));
        }
        self.agent = Some(Agent::new(approximator, &self.agent_settings, &self.memory_settings)?);
        self.state_size = state_size;
        self.action_size = action_size;
        self.selection_states.clear();
        self.last_state = None;
        self.pooled_rounds = 0;

        info!(state_size, action_size, "DDQN agent initialized");
        Ok(())
    }

    /// Replaces the arm catalog. Action indices are positions in `arms`.
    pub fn set_arms(&mut self, arms: Vec<A>) {
        info!(arms = arms.len(), actions = self.action_size, "arm catalog updated");
        self.arms = arms;
        self.selection_states.clear();
    }

    /// Picks at most one arm. Shape problems fall back to mean pooling and
    /// anything else that goes wrong yields an empty selection.
    pub fn select_action(&mut self, context_vectors: &[Vec<f32>]) -> Vec<usize> {
        if context_vectors.is_empty() || self.agent.is_none() {
            debug!("no agent or no context vectors, skipping selection");
            return Vec::new();
        }
        match self.try_select(context_vectors) {
            Ok(selection) => selection,
            Err(e) => {
                warn!(error = %e, "selection failed, taking no action");
                Vec::new()
            }
        }
    }

    fn try_select(&mut self, context_vectors: &[Vec<f32>]) -> Result<Vec<usize>> {
        let state = aggregate_state(context_vectors, self.state_size)?;
        let concatenated: usize = context_vectors.iter().map(Vec::len).sum();
        if concatenated != self.state_size {
            self.pooled_rounds += 1;
            // first fallback warns, repeats are routine
            if self.pooled_rounds == 1 {
                warn!(
                    concatenated,
                    state_size = self.state_size,
                    "context length mismatch, mean pooling context vectors"
                );
            } else {
                debug!(concatenated, rounds = self.pooled_rounds, "mean pooling context vectors");
            }
        }
        let agent = self.agent.as_mut().ok_or(AgentError::Uninitialized)?;
        let action = agent.act(&state)?;

        if action >= self.arms.len() {
            let err = AgentError::OutOfRangeAction {
                action,
                arms: self.arms.len(),
            };
            warn!(error = %err, "policy chose an unknown arm");
            return Ok(Vec::new());
        }
        self.selection_states.insert(action, state.clone());
        self.last_state = Some(state);
        Ok(vec![action])
    }

    /// Feeds one transition per chosen arm that has rewards, then trains.
    /// Reward contributions for an arm are summed. A selection's recorded
    /// state is consumed by the first update that uses it.
    pub fn update(
        &mut self,
        chosen_arm_ids: &[usize],
        rewards_by_arm: &HashMap<String, Vec<f64>>,
    ) -> Result<Vec<ReplayReport>> {
        if self.agent.is_none() {
            return Err(AgentError::Uninitialized);
        }

        let mut reports = Vec::new();
        for &arm_id in chosen_arm_ids {
            let Some(name) = self.arms.get(arm_id).map(|a| a.name().to_string()) else {
                warn!(arm_id, arms = self.arms.len(), "update for unknown arm ignored");
                continue;
            };
            if arm_id >= self.action_size {
                warn!(arm_id, actions = self.action_size, "arm outside the action space ignored");
                continue;
            }
            let Some(contributions) = rewards_by_arm.get(&name) else {
                warn!(arm = %name, "no reward reported");
                continue;
            };
            let reward = contributions.iter().sum::<f64>() as f32;

            let Some((state, next_state)) = self.transition_states(arm_id) else {
                warn!(arm = %name, "no selection state recorded for arm, skipping update");
                continue;
            };

            let agent = self.agent.as_mut().ok_or(AgentError::Uninitialized)?;
            agent.observe(Transition::new(state, arm_id, reward, next_state))?;
            let report = agent.replay()?;
            debug!(arm_id, reward, loss = report.loss, "agent updated");
            reports.push(report);
        }
        Ok(reports)
    }

    /// Workload shifts are acknowledged only; exploration and memory carry on.
    pub fn workload_change(&self, event: impl fmt::Display) {
        info!(event = %event, steps = self.steps(), "workload change reported");
    }

    fn transition_states(&mut self, arm_id: usize) -> Option<(Vec<f32>, Vec<f32>)> {
        match self.state_source {
            StateSource::Observed => {
                let state = self.selection_states.remove(&arm_id)?;
                let next_state = self.last_state.clone().unwrap_or_else(|| state.clone());
                Some((state, next_state))
            }
            StateSource::RandomPlaceholder => {
                let state = self.random_state();
                let next_state = self.random_state();
                Some((state, next_state))
            }
        }
    }

    fn random_state(&mut self) -> Vec<f32> {
        (0..self.state_size)
            .map(|_| self.rng.sample::<f32, _>(StandardNormal))
            .collect()
    }

    pub fn is_initialized(&self) -> bool {
        self.agent.is_some()
    }

    pub fn agent(&self) -> Option<&Agent<V>> {
        self.agent.as_ref()
    }

    pub fn arms(&self) -> &[A] {
        &self.arms
    }

    pub fn arm(&self, arm_id: usize) -> Option<&A> {
        self.arms.get(arm_id)
    }

    pub fn state_size(&self) -> usize {
        self.state_size
    }

    /// Selection rounds that fell back to mean pooling since `initialize`.
    pub fn pooled_rounds(&self) -> u64 {
        self.pooled_rounds
    }

    pub fn action_size(&self) -> usize {
        self.action_size
    }

    pub fn steps(&self) -> u64 {
        self.agent.as_ref().map_or(0, |a| a.steps())
    }
}

/// Concatenates the context vectors; when that does not produce
/// `state_size` values, averages them element-wise instead.
pub fn aggregate_state(context_vectors: &[Vec<f32>], state_size: usize) -> Result<Vec<f32>> {
    let concatenated: Vec<f32> = context_vectors.iter().flatten().copied().collect();
    if concatenated.len() == state_size {
        return Ok(concatenated);
    }

    let width = context_vectors.first().map_or(0, |cv| cv.len());
    if width == 0 || context_vectors.iter().any(|cv| cv.len() != width) {
        return Err(AgentError::configuration(
            "context vectors have mismatched lengths and cannot be mean pooled",
        ));
    }
    let count = context_vectors.len() as f32;
    let mut pooled = vec![0.0f32; width];
    for cv in context_vectors {
        for (acc, &v) in pooled.iter_mut().zip(cv.iter()) {
            *acc += v;
        }
    }
    for v in pooled.iter_mut() {
        *v /= count;
    }
    Ok(pooled)
}
