// index-advisor - runs the DDQN index advisor against a simulated workload
mod args;

use burn::backend::{Autodiff, NdArray};
use clap::Parser;
use std::error::Error;
use std::fs;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use args::{load_options, print_configuration, Cli, Commands, SimulateArgs};
use index_rl::{
    adam_factory, get_version_string, ConsoleWriter, DdqnController, IndexArm, JsonLinesWriter,
    SimulatedWorkload, StatsReporter,
};

type Backend = Autodiff<NdArray>;

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn simulate(args: &SimulateArgs) -> Result<(), Box<dyn Error>> {
    args.validate()?;
    let mut options = load_options(args.config.as_deref())?;
    args.apply(&mut options);
    options.validate()?;
    print_configuration(&options);

    let results_path = options.results_path();
    let report_path = results_path.join("report.json");
    let stats_path = results_path.join("stats.jsonl");
    if report_path.exists() && !args.force {
        return Err(format!(
            "results for run-id '{}' already exist at {}; use --force to overwrite",
            options.output.run_id,
            results_path.display()
        )
        .into());
    }
    fs::create_dir_all(&results_path)?;
    if stats_path.exists() {
        fs::remove_file(&stats_path)?;
    }
    fs::write(results_path.join("configuration.yaml"), options.to_yaml()?)?;

    let mut reporter = StatsReporter::new();
    reporter.add_writer(Box::new(ConsoleWriter::new(options.output.run_id.clone())));
    reporter.add_writer(Box::new(JsonLinesWriter::new(&stats_path, options.output.run_id.clone())?));

    let mut controller: DdqnController<IndexArm, _> = DdqnController::new(
        options.agent.clone(),
        options.memory.clone(),
        &options.controller,
        adam_factory::<Backend>(options.network.clone(), Default::default()),
    );
    let mut workload = SimulatedWorkload::new(&options.simulation, &options.database)?;
    let report = workload.run_experiment(&mut controller, options.simulation.rounds, &mut reporter)?;
    report.write_json(&report_path)?;

    let rewards = report.measure("Reward");
    let mean_reward = rewards.iter().sum::<f64>() / rewards.len().max(1) as f64;
    info!(
        steps = report.steps,
        epsilon = report.final_epsilon,
        mean_reward,
        indexes = report.ddl.len(),
        "simulation complete"
    );
    println!("Total workload time: {:.3}s", report.total_workload_time);
    if let Some(best) = workload.best_arm().and_then(|i| workload.arms().get(i)) {
        println!("Best index (hidden): {}", best.arm.index_name);
    }
    for statement in &report.ddl {
        println!("{};", statement);
    }
    println!("Results written to {}", results_path.display());
    Ok(())
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match &cli.command {
        Commands::Simulate(args) => simulate(args),
        Commands::ShowConfig { config } => {
            let options = load_options(config.as_deref())?;
            print!("{}", options.to_yaml()?);
            Ok(())
        }
        Commands::Version => {
            println!("{}", get_version_string());
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug_enabled());

    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}
