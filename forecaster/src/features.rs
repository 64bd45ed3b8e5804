//! Process-table feature extraction
//!
//! Reduces the raw per-process list reported by the metrics source into the
//! fixed feature vector stored alongside each utilization sample.

use serde::{Deserialize, Serialize};

/// CPU share above which a process counts as a heavy CPU consumer
const HIGH_CPU_THRESHOLD: f64 = 50.0;

/// Memory share above which a process counts as a heavy memory consumer
const HIGH_MEM_THRESHOLD: f64 = 10.0;

/// One entry of the process table as reported by the metrics source.
///
/// Both fields are optional on the wire; a missing value is treated as 0.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProcessUsage {
    #[serde(default)]
    pub cpu: Option<f64>,

    #[serde(default)]
    pub memory: Option<f64>,
}

/// Fixed feature vector derived from one process-table snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessFeatures {
    /// Total number of processes in the snapshot
    pub total_processes: usize,

    /// Processes above the heavy-CPU threshold
    pub high_cpu_count: usize,

    /// Processes above the heavy-memory threshold
    pub high_mem_count: usize,

    /// Mean per-process CPU share
    pub avg_cpu: f64,

    /// Mean per-process memory share
    pub avg_mem: f64,
}

impl ProcessFeatures {
    /// Extract the feature vector from a process table.
    ///
    /// An empty table yields the all-zero vector rather than an error; the
    /// averages use 0 as the empty-list convention.
    pub fn extract(processes: &[ProcessUsage]) -> Self {
        if processes.is_empty() {
            return Self::default();
        }

        let total = processes.len();
        let high_cpu = processes
            .iter()
            .filter(|p| p.cpu.unwrap_or(0.0) > HIGH_CPU_THRESHOLD)
            .count();
        let high_mem = processes
            .iter()
            .filter(|p| p.memory.unwrap_or(0.0) > HIGH_MEM_THRESHOLD)
            .count();

        let cpu_sum: f64 = processes.iter().map(|p| p.cpu.unwrap_or(0.0)).sum();
        let mem_sum: f64 = processes.iter().map(|p| p.memory.unwrap_or(0.0)).sum();

        Self {
            total_processes: total,
            high_cpu_count: high_cpu,
            high_mem_count: high_mem,
            avg_cpu: cpu_sum / total as f64,
            avg_mem: mem_sum / total as f64,
        }
    }
}
