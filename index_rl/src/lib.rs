// Index selection agent library
// Double DQN with prioritized experience replay behind a bandit-style controller

pub mod agent;
pub mod approximator;
pub mod arm;
pub mod controller;
pub mod database;
pub mod error;
pub mod memory;
pub mod networks;
pub mod settings;
pub mod simulation;
pub mod stats;

// Re-export main types
pub use agent::{Agent, ReplayReport, Transition};
pub use approximator::{adam_approximator, adam_factory, BurnApproximator, ValueApproximator};
pub use arm::{Arm, IndexArm};
pub use controller::{ApproximatorFactory, DdqnController, StateSource};
pub use database::DatabaseBackend;
pub use error::{AgentError, Result};
pub use settings::RunOptions;
pub use simulation::{ExperimentReport, SimulatedWorkload};
pub use stats::{ConsoleWriter, JsonLinesWriter, StatsReporter, StatsWriter};

pub fn get_version_string() -> String {
    format!("index-advisor {}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string() {
        let version = get_version_string();
        assert!(version.contains("index-advisor"));
        assert!(version.contains(env!("CARGO_PKG_VERSION")));
    }
}
