//! Statistical aggregation of per-node execution timings across a run.

use crate::logging::StatSummary;

/// Accumulates `last_time_ms` samples reported by every node that ran,
/// across one or more frames of a streaming session.
pub struct ExecutionStats {
    time_ms_samples: Vec<f64>,
}

impl ExecutionStats {
    pub fn new() -> Self {
        Self {
            time_ms_samples: Vec::new(),
        }
    }

    pub fn record(&mut self, time_ms: f64) {
        self.time_ms_samples.push(time_ms);
    }

    pub fn nodes_run(&self) -> usize {
        self.time_ms_samples.len()
    }

    pub fn summary(&self) -> StatSummary {
        if self.time_ms_samples.is_empty() {
            return StatSummary {
                mean: 0.0,
                stddev: 0.0,
                min: 0.0,
                max: 0.0,
                samples: 0,
            };
        }

        let mean = self.time_ms_samples.iter().sum::<f64>() / self.time_ms_samples.len() as f64;
        let variance = self
            .time_ms_samples
            .iter()
            .map(|x| (x - mean).powi(2))
            .sum::<f64>()
            / self.time_ms_samples.len() as f64;
        let min = self.time_ms_samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.time_ms_samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        StatSummary {
            mean,
            stddev: variance.sqrt(),
            min,
            max,
            samples: self.time_ms_samples.len(),
        }
    }
}

impl Default for ExecutionStats {
    fn default() -> Self {
        Self::new()
    }
}
