use std::time::Instant;

use crate::error::CompensationError;

/// Status of a step in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StepStatus {
    /// Step executed successfully.
    Executed,
    /// Step failed during execution.
    Failed,
    /// Step was interrupted by cancellation.
    Cancelled,
    /// Step was compensated successfully.
    Compensated,
    /// Step compensation failed.
    CompensationFailed,
}

/// Record of a step's execution in the saga.
#[derive(Debug)]
pub struct StepRecord {
    /// Name of the step.
    pub name: String,
    /// Current status.
    pub status: StepStatus,
    /// When the step started executing.
    pub started_at: Instant,
    /// When the step completed (execution or compensation).
    pub completed_at: Option<Instant>,
    /// Description of compensation (if applicable).
    pub compensation_description: Option<String>,
    /// Message of the compensation failure, if compensation failed.
    pub compensation_error: Option<String>,
}

/// Audit log tracking all step executions in a saga run.
///
/// Records are kept in execution order; record `i` belongs to step `i`.
#[derive(Debug, Default)]
pub struct SagaAuditLog {
    records: Vec<StepRecord>,
}

impl SagaAuditLog {
    /// Create a new empty audit log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_start(&mut self, name: &str) {
        self.records.push(StepRecord {
            name: name.to_string(),
            status: StepStatus::Executed,
            started_at: Instant::now(),
            completed_at: None,
            compensation_description: None,
            compensation_error: None,
        });
    }

    pub(crate) fn record_failure(&mut self) {
        self.finish_last(StepStatus::Failed);
    }

    pub(crate) fn record_cancelled(&mut self) {
        self.finish_last(StepStatus::Cancelled);
    }

    pub(crate) fn record_success(&mut self, compensation_description: String) {
        if let Some(record) = self.records.last_mut() {
            record.status = StepStatus::Executed;
            record.completed_at = Some(Instant::now());
            record.compensation_description = Some(compensation_description);
        }
    }

    pub(crate) fn record_compensated(&mut self, index: usize) {
        if let Some(record) = self.records.get_mut(index) {
            record.status = StepStatus::Compensated;
            record.completed_at = Some(Instant::now());
        }
    }

    pub(crate) fn record_compensation_failed(&mut self, index: usize, message: String) {
        if let Some(record) = self.records.get_mut(index) {
            record.status = StepStatus::CompensationFailed;
            record.completed_at = Some(Instant::now());
            record.compensation_error = Some(message);
        }
    }

    fn finish_last(&mut self, status: StepStatus) {
        if let Some(record) = self.records.last_mut() {
            record.status = status;
            record.completed_at = Some(Instant::now());
        }
    }

    /// Get all records in the audit log.
    #[must_use]
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Compensations that failed during rollback, in the order they ran.
    #[must_use]
    pub fn compensation_failures(&self) -> Vec<CompensationError> {
        self.records
            .iter()
            .rev()
            .filter_map(|record| {
                record
                    .compensation_error
                    .as_ref()
                    .map(|message| CompensationError {
                        step: record.name.clone(),
                        description: record
                            .compensation_description
                            .clone()
                            .unwrap_or_default(),
                        message: message.clone(),
                    })
            })
            .collect()
    }

    /// Get a summary of the saga run for display.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for record in &self.records {
            let status = match record.status {
                StepStatus::Executed => "✓",
                StepStatus::Failed => "✗",
                StepStatus::Cancelled => "⊘",
                StepStatus::Compensated => "↩",
                StepStatus::CompensationFailed => "⚠",
            };
            lines.push(format!("{status} {}", record.name));
        }
        lines.join("\n")
    }
}
