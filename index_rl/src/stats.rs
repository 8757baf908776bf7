// Stats - per-round metric aggregation fanned out to writers
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;

pub const LOSS: &str = "Agent/Loss";
pub const EPSILON: &str = "Agent/Epsilon";
pub const TD_ERROR: &str = "Agent/TD Error";
pub const REWARD: &str = "Environment/Reward";
pub const BATCH_TIME: &str = "Experiment/Batch Time";
pub const INDEX_CREATION_COST: &str = "Experiment/Index Creation Cost";
pub const QUERY_EXECUTION_COST: &str = "Experiment/Query Execution Cost";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSummary {
    pub mean: f32,
    pub min: f32,
    pub max: f32,
    pub count: usize,
}

impl StatsSummary {
    fn from_values(values: &[f32]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let (min, max) = values
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        Some(Self {
            mean: values.iter().sum::<f32>() / values.len() as f32,
            min,
            max,
            count: values.len(),
        })
    }
}

/// Buffers values per key until `write_stats`, which summarizes them, hands
/// the summaries to every writer and starts a fresh window.
#[derive(Default)]
pub struct StatsReporter {
    stats: BTreeMap<String, Vec<f32>>,
    writers: Vec<Box<dyn StatsWriter>>,
}

impl StatsReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_writer(&mut self, writer: Box<dyn StatsWriter>) {
        self.writers.push(writer);
    }

    pub fn add_stat(&mut self, key: &str, value: f32) {
        self.stats.entry(key.to_string()).or_default().push(value);
    }

    pub fn get_stats(&self, key: &str) -> Option<&Vec<f32>> {
        self.stats.get(key)
    }

    pub fn summaries(&self) -> BTreeMap<String, StatsSummary> {
        self.stats
            .iter()
            .filter_map(|(k, v)| StatsSummary::from_values(v).map(|s| (k.clone(), s)))
            .collect()
    }

    pub fn write_stats(&mut self, step: u64) -> Result<()> {
        let summaries = self.summaries();
        if !summaries.is_empty() {
            for writer in &mut self.writers {
                writer.write(&summaries, step)?;
            }
        }
        self.stats.clear();
        Ok(())
    }
}

pub trait StatsWriter {
    fn write(&mut self, stats: &BTreeMap<String, StatsSummary>, step: u64) -> Result<()>;
}

/// Emits one `info` event per summary window.
pub struct ConsoleWriter {
    run_id: String,
}

impl ConsoleWriter {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self { run_id: run_id.into() }
    }
}

impl StatsWriter for ConsoleWriter {
    fn write(&mut self, stats: &BTreeMap<String, StatsSummary>, step: u64) -> Result<()> {
        let line = stats
            .iter()
            .map(|(k, s)| format!("{}: {:.4}", k, s.mean))
            .collect::<Vec<_>>()
            .join(". ");
        info!(run_id = %self.run_id, step, "{}", line);
        Ok(())
    }
}

#[derive(Serialize)]
struct StatsRecord<'a> {
    run_id: &'a str,
    step: u64,
    timestamp: String,
    stats: &'a BTreeMap<String, StatsSummary>,
}

/// Appends one JSON object per window to a `.jsonl` file.
pub struct JsonLinesWriter {
    run_id: String,
    path: PathBuf,
    out: BufWriter<File>,
}

impl JsonLinesWriter {
    pub fn new(path: impl AsRef<Path>, run_id: impl Into<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            run_id: run_id.into(),
            path,
            out: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatsWriter for JsonLinesWriter {
    fn write(&mut self, stats: &BTreeMap<String, StatsSummary>, step: u64) -> Result<()> {
        let record = StatsRecord {
            run_id: &self.run_id,
            step,
            timestamp: Utc::now().to_rfc3339(),
            stats,
        };
        serde_json::to_writer(&mut self.out, &record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}
