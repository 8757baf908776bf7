// Command-line interface for index-advisor
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use index_rl::controller::StateSource;
use index_rl::database::DatabaseBackend;
use index_rl::settings::RunOptions;

#[derive(Parser, Debug, Clone)]
#[command(name = "index-advisor")]
#[command(version)]
#[command(about = "Double-DQN index advisor with prioritized replay", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Debug logging comes from `--debug` or from `debug: true` in the
    /// configuration file. An unreadable file is reported later by the command.
    pub fn debug_enabled(&self) -> bool {
        match &self.command {
            Commands::Simulate(args) => {
                args.debug
                    || load_options(args.config.as_deref())
                        .map(|options| options.debug)
                        .unwrap_or(false)
            }
            _ => false,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the advisor against a simulated workload
    Simulate(SimulateArgs),

    /// Print the effective configuration as YAML
    ShowConfig {
        /// Path to the run configuration YAML file
        #[arg(value_name = "CONFIG")]
        config: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SimulateArgs {
    /// Path to the run configuration YAML file
    #[arg(value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of select/apply/update rounds
    #[arg(long)]
    pub rounds: Option<usize>,

    /// Seed for the agent and the simulated workload
    #[arg(long)]
    pub seed: Option<u64>,

    /// The identifier for the run
    #[arg(long = "run-id")]
    pub run_id: Option<String>,

    /// Results base directory
    #[arg(long = "results-dir")]
    pub results_dir: Option<PathBuf>,

    /// Database dialect for the generated index DDL (postgres, mssql)
    #[arg(long)]
    pub backend: Option<DatabaseBackend>,

    /// Feed update() random placeholder states instead of observed ones
    #[arg(long = "random-states", default_value_t = false)]
    pub random_states: bool,

    /// Whether to force-overwrite this run-id's existing results
    #[arg(long, default_value_t = false)]
    pub force: bool,

    /// Enable debug-level logging
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

impl SimulateArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.rounds == Some(0) {
            return Err("--rounds must be at least 1".to_string());
        }
        if let Some(run_id) = &self.run_id {
            if run_id.is_empty() || run_id.contains(['/', '\\']) {
                return Err(format!("--run-id '{}' is not a valid directory name", run_id));
            }
        }
        Ok(())
    }

    /// Command-line flags win over the configuration file.
    pub fn apply(&self, options: &mut RunOptions) {
        if let Some(rounds) = self.rounds {
            options.simulation.rounds = rounds;
        }
        if let Some(seed) = self.seed {
            options.agent.seed = Some(seed);
            options.simulation.seed = Some(seed);
        }
        if let Some(run_id) = &self.run_id {
            options.output.run_id = run_id.clone();
        }
        if let Some(dir) = &self.results_dir {
            options.output.results_dir = dir.clone();
        }
        if let Some(backend) = self.backend {
            options.database.backend = backend;
        }
        if self.random_states {
            options.controller.state_source = StateSource::RandomPlaceholder;
        }
        options.debug |= self.debug;
    }
}

pub fn load_options(config: Option<&Path>) -> index_rl::Result<RunOptions> {
    match config {
        Some(path) => RunOptions::from_yaml(path),
        None => Ok(RunOptions::default()),
    }
}

pub fn print_configuration(options: &RunOptions) {
    println!("\nConfiguration:");
    println!("   Run ID:         {}", options.output.run_id);
    println!("   Results Dir:    {}", options.output.results_dir.display());
    println!("   Backend:        {}", options.database.backend);
    println!("   Rounds:         {}", options.simulation.rounds);
    println!("   Arms:           {}", options.simulation.arms);
    println!("   State Source:   {:?}", options.controller.state_source);
    if let Some(seed) = options.agent.seed {
        println!("   Seed:           {}", seed);
    }
    println!();
}
