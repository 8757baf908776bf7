// Shared fixtures for the integration tests
#![allow(dead_code)]

use std::rc::Rc;

use index_rl::approximator::ValueApproximator;
use index_rl::error::{AgentError, Result};
use index_rl::settings::{AgentSettings, MemorySettings};

type ScoreFn = Rc<dyn Fn(&[f32]) -> Vec<f32>>;

/// Approximator with hand-written score functions. Training only bumps
/// `online_version`; syncing copies it into `target_version`.
pub struct ScriptedApproximator {
    state_size: usize,
    action_size: usize,
    online: ScoreFn,
    target: ScoreFn,
    pub online_version: u64,
    pub target_version: u64,
    pub syncs: u64,
    pub train_calls: Vec<(Vec<Vec<f32>>, Vec<Vec<f32>>)>,
}

impl ScriptedApproximator {
    pub fn new(
        state_size: usize,
        action_size: usize,
        online: impl Fn(&[f32]) -> Vec<f32> + 'static,
        target: impl Fn(&[f32]) -> Vec<f32> + 'static,
    ) -> Self {
        Self {
            state_size,
            action_size,
            online: Rc::new(online),
            target: Rc::new(target),
            online_version: 0,
            target_version: 0,
            syncs: 0,
            train_calls: Vec::new(),
        }
    }

    /// Both networks return `scores` for every state.
    pub fn constant(state_size: usize, scores: Vec<f32>) -> Self {
        let action_size = scores.len();
        let online = scores.clone();
        Self::new(
            state_size,
            action_size,
            move |_| online.clone(),
            move |_| scores.clone(),
        )
    }

    /// Scores with a single 1.0 at `best`, zeros elsewhere.
    pub fn favoring(state_size: usize, action_size: usize, best: usize) -> Self {
        let mut scores = vec![0.0; action_size];
        scores[best] = 1.0;
        Self::constant(state_size, scores)
    }
}

impl ValueApproximator for ScriptedApproximator {
    fn state_size(&self) -> usize {
        self.state_size
    }

    fn action_size(&self) -> usize {
        self.action_size
    }

    fn predict(&self, states: &[Vec<f32>], use_target: bool) -> Result<Vec<Vec<f32>>> {
        let f: &dyn Fn(&[f32]) -> Vec<f32> = if use_target {
            self.target.as_ref()
        } else {
            self.online.as_ref()
        };
        states
            .iter()
            .map(|s| {
                if s.len() != self.state_size {
                    return Err(AgentError::configuration("scripted state size mismatch"));
                }
                Ok(f(s))
            })
            .collect()
    }

    fn train_step(&mut self, states: &[Vec<f32>], targets: &[Vec<f32>]) -> Result<f32> {
        let predicted = self.predict(states, false)?;
        let mut sum = 0.0;
        let mut count = 0usize;
        for (p, t) in predicted.iter().zip(targets.iter()) {
            for (a, b) in p.iter().zip(t.iter()) {
                sum += (a - b) * (a - b);
                count += 1;
            }
        }
        let loss = if count == 0 { 0.0 } else { sum / count as f32 };
        if !loss.is_finite() {
            return Err(AgentError::NonFiniteLoss(loss));
        }
        self.train_calls.push((states.to_vec(), targets.to_vec()));
        self.online_version += 1;
        Ok(loss)
    }

    fn sync_target(&mut self) {
        self.target_version = self.online_version;
        self.syncs += 1;
    }
}

pub fn seeded_agent_settings(seed: u64) -> AgentSettings {
    AgentSettings {
        seed: Some(seed),
        ..Default::default()
    }
}

/// No exploration: the agent always follows the online scores.
pub fn greedy_agent_settings(seed: u64) -> AgentSettings {
    AgentSettings {
        epsilon_max: 0.0,
        epsilon_min: 0.0,
        seed: Some(seed),
        ..Default::default()
    }
}

pub fn memory_settings() -> MemorySettings {
    MemorySettings::default()
}
