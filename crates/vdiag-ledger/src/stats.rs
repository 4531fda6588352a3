//! Derived per-(module, action, protocol) aggregates

use chrono::{DateTime, Utc};
use serde::Serialize;
use vdiag_core::Protocol;

use crate::record::ExecutionRecord;

/// Rolling success statistics for one (module, action, protocol) key
///
/// Derived from the execution-record stream, updated incrementally per new
/// record; recomputable at any time by replaying the log.
#[derive(Debug, Clone, Serialize)]
pub struct ProtocolStats {
    pub module: String,
    pub action: String,
    pub protocol: Protocol,
    /// Total recorded attempts
    pub total: u64,
    /// Attempts that produced a positive result
    pub successes: u64,
    /// `successes / total`
    pub success_rate: f64,
    /// Incremental mean of attempt durations
    pub avg_duration_ms: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Order this key first appeared in the stream; final recommendation
    /// tie-break
    pub registered: u64,
}

impl ProtocolStats {
    pub(crate) fn first(record: &ExecutionRecord, registered: u64) -> Self {
        let mut stats = Self {
            module: record.module.clone(),
            action: record.action.clone(),
            protocol: record.protocol,
            total: 0,
            successes: 0,
            success_rate: 0.0,
            avg_duration_ms: 0.0,
            first_seen: record.timestamp,
            last_seen: record.timestamp,
            registered,
        };
        stats.absorb(record);
        stats
    }

    /// Fold one new record into the aggregate
    pub(crate) fn absorb(&mut self, record: &ExecutionRecord) {
        self.total += 1;
        if record.success {
            self.successes += 1;
        }
        self.success_rate = self.successes as f64 / self.total as f64;
        // Incremental mean: avg' = avg + (d - avg) / n
        self.avg_duration_ms +=
            (record.duration_ms as f64 - self.avg_duration_ms) / self.total as f64;
        self.last_seen = record.timestamp;
    }
}
