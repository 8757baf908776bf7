// Settings module - run configuration loaded from YAML
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::controller::StateSource;
use crate::database::DatabaseBackend;
use crate::error::{AgentError, Result};
use crate::networks::ScoreOutput;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RunOptions {
    pub agent: AgentSettings,
    pub memory: MemorySettings,
    pub network: NetworkSettings,
    pub controller: ControllerSettings,
    pub database: DatabaseSettings,
    pub simulation: SimulationSettings,
    pub output: OutputSettings,
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub gamma: f32,
    pub epsilon_max: f64,
    pub epsilon_min: f64,
    /// Step count by which epsilon has decayed to 1% of its range.
    pub exploration_horizon: u64,
    pub target_sync_frequency: u64,
    pub batch_size: usize,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    pub capacity: usize,
    pub priority_epsilon: f64,
    pub priority_alpha: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub hidden_units: usize,
    pub num_layers: usize,
    pub learning_rate: f64,
    pub output: ScoreOutput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ControllerSettings {
    pub state_source: StateSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub backend: DatabaseBackend,
    pub schema: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub rounds: usize,
    pub arms: usize,
    pub context_size: usize,
    pub noise: f64,
    pub queries_per_round: usize,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub run_id: String,
    pub results_dir: PathBuf,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            epsilon_max: 1.0,
            epsilon_min: 0.0,
            exploration_horizon: 1200,
            target_sync_frequency: 60,
            batch_size: 1,
            seed: None,
        }
    }
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            capacity: 900,
            priority_epsilon: 0.01,
            priority_alpha: 0.6,
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            hidden_units: 8,
            num_layers: 4,
            learning_rate: 0.001,
            output: ScoreOutput::Normalized,
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::Postgres,
            schema: "public".to_string(),
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            rounds: 100,
            arms: 8,
            context_size: 4,
            noise: 0.05,
            queries_per_round: 20,
            seed: None,
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            run_id: "ddqn".to_string(),
            results_dir: PathBuf::from("results"),
        }
    }
}

impl RunOptions {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let options: RunOptions = serde_yaml::from_str(content)?;
        options.validate()?;
        Ok(options)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn results_path(&self) -> PathBuf {
        self.output.results_dir.join(&self.output.run_id)
    }

    pub fn validate(&self) -> Result<()> {
        self.agent.validate()?;
        self.memory.validate()?;
        self.network.validate()?;
        if self.simulation.arms == 0 || self.simulation.context_size == 0 {
            return Err(AgentError::configuration(
                "simulation needs at least one arm and a non-empty context",
            ));
        }
        Ok(())
    }
}

impl AgentSettings {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(AgentError::configuration(format!(
                "gamma must be in [0, 1], got {}",
                self.gamma
            )));
        }
        if self.epsilon_min > self.epsilon_max
            || self.epsilon_min < 0.0
            || self.epsilon_max > 1.0
        {
            return Err(AgentError::configuration(format!(
                "epsilon range [{}, {}] is invalid",
                self.epsilon_min, self.epsilon_max
            )));
        }
        if self.exploration_horizon == 0 {
            return Err(AgentError::configuration("exploration_horizon must be positive"));
        }
        if self.target_sync_frequency == 0 {
            return Err(AgentError::configuration("target_sync_frequency must be positive"));
        }
        if self.batch_size == 0 {
            return Err(AgentError::configuration("batch_size must be positive"));
        }
        Ok(())
    }
}

impl MemorySettings {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(AgentError::configuration("memory capacity must be positive"));
        }
        if !(self.priority_epsilon > 0.0) {
            return Err(AgentError::configuration("priority_epsilon must be positive"));
        }
        if !(self.priority_alpha > 0.0 && self.priority_alpha <= 1.0) {
            return Err(AgentError::configuration("priority_alpha must be in (0, 1]"));
        }
        Ok(())
    }
}

impl NetworkSettings {
    pub fn validate(&self) -> Result<()> {
        if self.hidden_units == 0 && self.num_layers > 0 {
            return Err(AgentError::configuration("hidden_units must be positive"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(AgentError::configuration("learning_rate must be positive"));
        }
        Ok(())
    }
}
