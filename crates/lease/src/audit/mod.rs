//! Audit trail: sink contract, in-memory sink, best-effort recorder.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{error, warn};

use crate::core::{AuditEntry, AuditError};

/// Append-only destination for audit entries.
///
/// Entries are owned by the recorder once appended; sinks never update
/// or delete them.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist one entry.
    async fn append(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

/// In-memory append-only sink.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: RwLock<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries, in append order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries.write().push(entry);
        Ok(())
    }
}

/// Best-effort delivery wrapper around a sink.
///
/// An audit write must never fail the lifecycle operation it describes:
/// `record` retries a bounded number of times, then logs the loss and
/// returns. Deployments that need audit-blocking compliance put a
/// synchronous sink behind this with `max_attempts = 1` and alert on
/// the error log.
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
    max_attempts: u32,
}

impl AuditRecorder {
    /// Recorder delivering to `sink` with up to `max_attempts` tries.
    pub fn new(sink: Arc<dyn AuditSink>, max_attempts: u32) -> Self {
        Self {
            sink,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Append `entry`, absorbing sink failures.
    pub async fn record(&self, entry: AuditEntry) {
        for attempt in 1..=self.max_attempts {
            match self.sink.append(entry.clone()).await {
                Ok(()) => return,
                Err(e) if attempt < self.max_attempts => {
                    warn!(
                        record_id = %entry.record_id,
                        action = %entry.action,
                        attempt,
                        error = %e,
                        "audit append failed, retrying"
                    );
                }
                Err(e) => {
                    error!(
                        record_id = %entry.record_id,
                        action = %entry.action,
                        attempts = self.max_attempts,
                        error = %e,
                        "audit entry dropped"
                    );
                }
            }
        }
    }
}
