use std::fmt;
use std::time::Duration;

use crate::error::ValidationError;
use crate::executor::{ExecutionResult, ExecutionStatus};

/// A catalog entry that never reached the executor
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedStrategy {
    pub label: String,
    pub reason: ValidationError,
}

/// Per-cycle aggregate. Invalid records count toward the total but never
/// toward `succeeded`.
#[derive(Debug, Clone, Default)]
pub struct CycleSummary {
    pub total_strategies: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped_invalid: usize,
    pub failed: usize,
    /// Shutdown stopped the cycle before every entry was considered
    pub interrupted: bool,
    pub duration: Duration,
    pub results: Vec<ExecutionResult>,
    pub skipped: Vec<SkippedStrategy>,
}

impl CycleSummary {
    pub fn new(total_strategies: usize) -> Self {
        Self {
            total_strategies,
            ..Default::default()
        }
    }

    pub fn record(&mut self, result: ExecutionResult) {
        self.attempted += 1;
        if result.succeeded() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    pub fn record_skipped(&mut self, label: String, reason: ValidationError) {
        self.skipped_invalid += 1;
        self.skipped.push(SkippedStrategy { label, reason });
    }

    /// Statuses in execution order
    pub fn statuses(&self) -> Vec<&ExecutionStatus> {
        self.results.iter().map(|r| &r.status).collect()
    }
}

impl fmt::Display for CycleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.succeeded, self.total_strategies)
    }
}
