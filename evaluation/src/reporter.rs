use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::tasks::Task;

/// Outcome of one evaluation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub task: Task,
    pub max_p: bool,
    pub metrics: BTreeMap<String, f64>,
}

impl EvaluationReport {
    pub fn new(task: Task, max_p: bool, metrics: BTreeMap<String, f64>) -> Self {
        Self {
            task,
            max_p,
            metrics,
        }
    }

    /// Task name followed by one `name: value` line per metric.
    pub fn format_summary(&self) -> String {
        let mut summary = format!("Task: {}\n", self.task);
        for (name, value) in &self.metrics {
            let _ = writeln!(summary, "{}: {:.4}", name, value);
        }
        summary
    }

    pub fn print_summary(&self) {
        print!("{}", self.format_summary());
    }

    /// Writes only the metric mapping, overwriting any existing file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        write_metrics(path, &self.metrics)
    }
}

pub fn write_metrics(path: &Path, metrics: &BTreeMap<String, f64>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(metrics)?;
    fs::write(path, json)?;
    info!("Metrics written to {}", path.display());
    Ok(())
}

pub fn read_metrics(path: &Path) -> Result<BTreeMap<String, f64>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
