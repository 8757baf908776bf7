// Simulated index-tuning workload used to drive the controller end to end
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::approximator::ValueApproximator;
use crate::arm::{Arm, IndexArm};
use crate::controller::DdqnController;
use crate::database::DatabaseBackend;
use crate::error::{AgentError, Result};
use crate::settings::{DatabaseSettings, SimulationSettings};
use crate::stats::{self, StatsReporter};

const TABLES: [&str; 5] = ["orders", "lineitem", "customer", "part", "supplier"];

/// Per query cost with no useful index in place.
const BASE_QUERY_COST: f64 = 1.0;

/// An index candidate plus the ground truth the agent has to discover.
#[derive(Debug, Clone)]
pub struct SimulatedArm {
    pub arm: IndexArm,
    pub benefit: f64,
    pub creation_cost: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RoundOutcome {
    pub rewards: HashMap<String, Vec<f64>>,
    pub index_creation_cost: f64,
    pub query_execution_cost: f64,
    pub ddl: Vec<String>,
}

impl RoundOutcome {
    pub fn total_reward(&self) -> f64 {
        self.rewards.values().flatten().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRow {
    pub round: usize,
    pub measure: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub backend: DatabaseBackend,
    pub rounds: usize,
    pub steps: u64,
    pub final_epsilon: f64,
    /// Simulated seconds spent creating indexes and running queries.
    pub total_workload_time: f64,
    pub rows: Vec<ExperimentRow>,
    pub ddl: Vec<String>,
}

impl ExperimentReport {
    pub fn measure(&self, name: &str) -> Vec<f64> {
        self.rows
            .iter()
            .filter(|r| r.measure == name)
            .map(|r| r.value)
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

pub struct SimulatedWorkload {
    arms: Vec<SimulatedArm>,
    materialized: HashSet<usize>,
    backend: DatabaseBackend,
    schema: String,
    context_size: usize,
    queries_per_round: usize,
    noise: Normal<f64>,
    rng: StdRng,
}

impl SimulatedWorkload {
    pub fn new(simulation: &SimulationSettings, database: &DatabaseSettings) -> Result<Self> {
        if simulation.arms == 0 || simulation.context_size == 0 {
            return Err(AgentError::configuration(
                "simulation needs at least one arm and a non-empty context",
            ));
        }
        let noise = Normal::new(0.0, simulation.noise)
            .map_err(|e| AgentError::configuration(format!("invalid simulation noise: {}", e)))?;
        let mut rng = match simulation.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let arms = (0..simulation.arms)
            .map(|i| {
                let table = TABLES[i % TABLES.len()];
                let column = format!("{}_c{}", &table[..1], i);
                SimulatedArm {
                    arm: IndexArm::new(table, &[column.as_str()], &[]),
                    benefit: rng.gen_range(0.0..1.0),
                    creation_cost: rng.gen_range(0.05..0.5),
                }
            })
            .collect();

        Ok(Self {
            arms,
            materialized: HashSet::new(),
            backend: database.backend,
            schema: database.schema.clone(),
            context_size: simulation.context_size,
            queries_per_round: simulation.queries_per_round,
            noise,
            rng,
        })
    }

    pub fn catalog(&self) -> Vec<IndexArm> {
        self.arms.iter().map(|a| a.arm.clone()).collect()
    }

    pub fn arms(&self) -> &[SimulatedArm] {
        &self.arms
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    pub fn is_materialized(&self, arm_id: usize) -> bool {
        self.materialized.contains(&arm_id)
    }

    /// Index of the arm with the largest hidden benefit.
    pub fn best_arm(&self) -> Option<usize> {
        self.arms
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.benefit.total_cmp(&b.1.benefit))
            .map(|(i, _)| i)
    }

    /// One vector per arm: noisy benefit, materialized flag, noisy creation
    /// cost, then pure noise up to the context size.
    pub fn context_vectors(&mut self) -> Vec<Vec<f32>> {
        let mut contexts = Vec::with_capacity(self.arms.len());
        for (i, arm) in self.arms.iter().enumerate() {
            let mut cv = Vec::with_capacity(self.context_size);
            for feature in 0..self.context_size {
                let jitter = self.noise.sample(&mut self.rng);
                let value = match feature {
                    0 => arm.benefit + jitter,
                    1 if self.materialized.contains(&i) => 1.0,
                    1 => 0.0,
                    2 => arm.creation_cost + jitter,
                    _ => jitter,
                };
                cv.push(value as f32);
            }
            contexts.push(cv);
        }
        contexts
    }

    /// Materializes the chosen arms. Each arm reports
    /// `[query_gain, -creation_cost]`; creation is only charged once.
    pub fn apply(&mut self, chosen: &[usize]) -> RoundOutcome {
        let mut outcome = RoundOutcome::default();
        for &arm_id in chosen {
            let Some(arm) = self.arms.get(arm_id) else {
                continue;
            };
            let mut creation_cost = 0.0;
            if self.materialized.insert(arm_id) {
                creation_cost = arm.creation_cost;
                outcome
                    .ddl
                    .push(self.backend.create_index_statement(&self.schema, &arm.arm));
            }
            let query_gain = arm.benefit + self.noise.sample(&mut self.rng);
            outcome.index_creation_cost += creation_cost;
            outcome
                .rewards
                .insert(arm.arm.name().to_string(), vec![query_gain, -creation_cost]);
        }

        let gain: f64 = self
            .materialized
            .iter()
            .filter_map(|&i| self.arms.get(i))
            .map(|a| a.benefit)
            .sum();
        let queries = self.queries_per_round as f64;
        let per_query = (BASE_QUERY_COST - 0.1 * gain).max(0.1 * BASE_QUERY_COST);
        outcome.query_execution_cost = queries * per_query;
        outcome
    }

    /// Drops every materialized index, returning the DDL it would issue.
    pub fn reset(&mut self) -> Vec<String> {
        let mut ids: Vec<usize> = self.materialized.drain().collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|i| self.arms.get(i))
            .map(|a| self.backend.drop_index_statement(&self.schema, &a.arm))
            .collect()
    }

    /// Runs select, apply and update for `rounds` rounds, initializing the
    /// controller from the first round's contexts when needed.
    pub fn run_experiment<V: ValueApproximator>(
        &mut self,
        controller: &mut DdqnController<IndexArm, V>,
        rounds: usize,
        reporter: &mut StatsReporter,
    ) -> Result<ExperimentReport> {
        if !controller.is_initialized() {
            let contexts = self.context_vectors();
            controller.initialize(&contexts)?;
        }
        if controller.arms().len() != self.arms.len() {
            controller.set_arms(self.catalog());
        }
        info!(rounds, arms = self.arms.len(), backend = %self.backend, "starting experiment");

        let mut rows = Vec::new();
        let mut ddl = Vec::new();
        let mut total_workload_time = 0.0;
        for round in 1..=rounds {
            let start = Instant::now();
            let contexts = self.context_vectors();
            let chosen = controller.select_action(&contexts);
            let outcome = self.apply(&chosen);
            let reports = controller.update(&chosen, &outcome.rewards)?;
            let batch_time = start.elapsed().as_secs_f64();

            for report in &reports {
                reporter.add_stat(stats::LOSS, report.loss);
                reporter.add_stat(stats::TD_ERROR, report.mean_td_error());
            }
            let epsilon = controller.agent().map_or(0.0, |a| a.epsilon());
            let reward = outcome.total_reward();
            reporter.add_stat(stats::EPSILON, epsilon as f32);
            reporter.add_stat(stats::REWARD, reward as f32);
            reporter.add_stat(stats::BATCH_TIME, batch_time as f32);
            reporter.add_stat(stats::INDEX_CREATION_COST, outcome.index_creation_cost as f32);
            reporter.add_stat(stats::QUERY_EXECUTION_COST, outcome.query_execution_cost as f32);
            reporter.write_stats(round as u64)?;

            for (measure, value) in [
                ("Batch Time", batch_time),
                ("Index Creation Cost", outcome.index_creation_cost),
                ("Query Execution Cost", outcome.query_execution_cost),
                ("Reward", reward),
                ("Epsilon", epsilon),
            ] {
                rows.push(ExperimentRow {
                    round,
                    measure: measure.to_string(),
                    value,
                });
            }
            total_workload_time += outcome.index_creation_cost + outcome.query_execution_cost;
            debug!(round, chosen = ?chosen, reward, "round finished");
            ddl.extend(outcome.ddl);
        }

        let report = ExperimentReport {
            backend: self.backend,
            rounds,
            steps: controller.steps(),
            final_epsilon: controller.agent().map_or(0.0, |a| a.epsilon()),
            total_workload_time,
            rows,
            ddl,
        };
        info!(
            steps = report.steps,
            total_workload_time = report.total_workload_time,
            "experiment finished"
        );
        Ok(report)
    }
}
