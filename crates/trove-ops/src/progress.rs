//! Progress reporting for repository operations.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use trove_core::DEFAULT_PROGRESS_TOTAL;

use crate::OperationError;

/// Conventional total for whole-operation progress.
pub const PROGRESS_TOTAL: u64 = DEFAULT_PROGRESS_TOTAL;

/// Receives progress from a running operation.
pub trait ProgressListener {
    /// Set the total number of units.
    fn set_total(&mut self, total: u64);

    /// Set the number of completed units.
    fn set_completed(&mut self, completed: u64);

    /// Describe the current step.
    fn set_message(&mut self, _message: &str) {}

    /// The operation finished.
    fn complete(&mut self) {}
}

/// Discards all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressListener for NullProgress {
    fn set_total(&mut self, _total: u64) {}

    fn set_completed(&mut self, _completed: u64) {}
}

/// A slice `[min, max]` of the progress scale assigned to one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressInterval {
    pub min: u64,
    pub max: u64,
}

impl ProgressInterval {
    /// Create an interval. `max` is raised to `min` if smaller.
    pub fn new(min: u64, max: u64) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    /// The whole scale `[0, total]`.
    pub fn whole(total: u64) -> Self {
        Self::new(0, total)
    }

    /// Number of units covered.
    pub fn width(&self) -> u64 {
        self.max - self.min
    }

    /// Middle of the interval, rounded down.
    pub fn midpoint(&self) -> u64 {
        self.min + self.width() / 2
    }

    /// Split into `parts` consecutive sub-intervals of equal width.
    ///
    /// Each sub-interval starts where the previous one ends; the first starts at
    /// `min` and the last ends at `max`. Widths differ by at most one unit.
    pub fn split(&self, parts: usize) -> Vec<ProgressInterval> {
        let width = u128::from(self.width());
        let parts_wide = parts as u128;
        let boundary = |i: usize| self.min + (width * i as u128 / parts_wide.max(1)) as u64;

        (0..parts)
            .map(|i| ProgressInterval {
                min: boundary(i),
                max: boundary(i + 1),
            })
            .collect()
    }
}

/// The type of operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    Copy,
    Move,
    CreateFolders,
    Delete,
    Rename,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Copy => write!(f, "Copy"),
            Self::Move => write!(f, "Move"),
            Self::CreateFolders => write!(f, "Create folders"),
            Self::Delete => write!(f, "Delete"),
            Self::Rename => write!(f, "Rename"),
        }
    }
}

/// Snapshot of an ongoing operation's progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationProgress {
    /// The type of operation.
    pub operation_type: OperationType,
    /// Units completed.
    pub completed: u64,
    /// Total units.
    pub total: u64,
    /// Current step description.
    pub message: Option<String>,
    /// Whether the operation has finished.
    pub finished: bool,
}

impl OperationProgress {
    /// Create a new progress tracker for an operation.
    pub fn new(operation_type: OperationType) -> Self {
        Self {
            operation_type,
            completed: 0,
            total: 0,
            message: None,
            finished: false,
        }
    }

    /// Get the progress as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.total > 0 {
            (self.completed as f64 / self.total as f64) * 100.0
        } else if self.finished {
            100.0
        } else {
            0.0
        }
    }
}

impl ProgressListener for OperationProgress {
    fn set_total(&mut self, total: u64) {
        self.total = total;
    }

    fn set_completed(&mut self, completed: u64) {
        self.completed = completed;
    }

    fn set_message(&mut self, message: &str) {
        self.message = Some(message.to_string());
    }

    fn complete(&mut self) {
        self.completed = self.total;
        self.finished = true;
    }
}

/// Forwards every progress change through an unbounded channel.
///
/// Sending never blocks, so a synchronous operation can report to an async
/// consumer. Updates are dropped once the receiver is gone.
#[derive(Debug)]
pub struct ChannelProgress {
    state: OperationProgress,
    tx: mpsc::UnboundedSender<OperationProgress>,
}

impl ChannelProgress {
    /// Create a listener and the receiver for its updates.
    pub fn new(operation_type: OperationType) -> (Self, mpsc::UnboundedReceiver<OperationProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let progress = Self {
            state: OperationProgress::new(operation_type),
            tx,
        };
        (progress, rx)
    }

    /// Latest state.
    pub fn state(&self) -> &OperationProgress {
        &self.state
    }

    fn publish(&self) {
        let _ = self.tx.send(self.state.clone());
    }
}

impl ProgressListener for ChannelProgress {
    fn set_total(&mut self, total: u64) {
        self.state.set_total(total);
        self.publish();
    }

    fn set_completed(&mut self, completed: u64) {
        self.state.set_completed(completed);
        self.publish();
    }

    fn set_message(&mut self, message: &str) {
        self.state.set_message(message);
        self.publish();
    }

    fn complete(&mut self) {
        self.state.complete();
        self.publish();
    }
}

/// Result of a completed operation.
#[derive(Debug, Clone)]
pub struct OperationComplete {
    /// The type of operation.
    pub operation_type: OperationType,
    /// Number of items successfully processed.
    pub succeeded: usize,
    /// Number of items that failed.
    pub failed: usize,
    /// Absolute locations of the entries the operation produced.
    pub produced: Vec<String>,
    /// Errors that occurred.
    pub errors: Vec<OperationError>,
}

impl OperationComplete {
    /// An empty result for `operation_type`.
    pub fn new(operation_type: OperationType) -> Self {
        Self {
            operation_type,
            succeeded: 0,
            failed: 0,
            produced: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Check if the operation was fully successful.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Get a human-readable summary of the operation.
    pub fn summary(&self) -> String {
        let action = match self.operation_type {
            OperationType::Copy => "Copied",
            OperationType::Move => "Moved",
            OperationType::CreateFolders => "Created",
            OperationType::Delete => "Deleted",
            OperationType::Rename => "Renamed",
        };

        if self.failed == 0 {
            format!("{} {} items", action, self.succeeded)
        } else {
            format!(
                "{} {} items, {} failed",
                action, self.succeeded, self.failed
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_partitions_interval() {
        for (min, max, parts) in [(0, 100_000, 3), (10, 20, 4), (0, 7, 7), (5, 1_005, 1)] {
            let interval = ProgressInterval::new(min, max);
            let pieces = interval.split(parts);

            assert_eq!(pieces.len(), parts);
            assert_eq!(pieces[0].min, min);
            assert_eq!(pieces[parts - 1].max, max);
            for pair in pieces.windows(2) {
                assert_eq!(pair[0].max, pair[1].min);
                assert!(pair[0].min < pair[1].min);
            }
        }
    }

    #[test]
    fn test_split_zero_parts() {
        assert!(ProgressInterval::whole(10).split(0).is_empty());
    }

    #[test]
    fn test_midpoint() {
        assert_eq!(ProgressInterval::new(10, 20).midpoint(), 15);
        assert_eq!(ProgressInterval::new(20, 10).width(), 0);
    }

    #[test]
    fn test_channel_progress() {
        let (mut progress, mut rx) = ChannelProgress::new(OperationType::Copy);
        progress.set_total(PROGRESS_TOTAL);
        progress.set_completed(PROGRESS_TOTAL / 2);
        progress.complete();

        let updates: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[1].percentage(), 50.0);
        assert!(updates[2].finished);
        assert_eq!(updates[2].completed, PROGRESS_TOTAL);
    }

    #[test]
    fn test_summary() {
        let mut complete = OperationComplete::new(OperationType::Move);
        complete.succeeded = 2;
        assert_eq!(complete.summary(), "Moved 2 items");
        complete.failed = 1;
        assert!(!complete.is_success());
    }
}
