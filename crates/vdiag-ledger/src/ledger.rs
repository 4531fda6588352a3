//! The feedback ledger: durable log + in-memory aggregates

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};
use vdiag_core::Protocol;

use crate::error::LedgerError;
use crate::record::ExecutionRecord;
use crate::stats::ProtocolStats;

type StatsKey = (String, String, Protocol);

/// Append-only execution history with derived protocol statistics
///
/// Writes follow a single-writer append discipline; each append is
/// independent and commutative for aggregate recomputation, so readers
/// share the stats map read-only.
#[derive(Debug)]
pub struct FeedbackLedger {
    /// Append handle for the durable log; `None` for in-memory ledgers
    log: Mutex<Option<File>>,
    stats: RwLock<HashMap<StatsKey, ProtocolStats>>,
}

impl FeedbackLedger {
    /// Open a durable ledger, replaying every existing record into the
    /// aggregates
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let ledger = Self::in_memory();

        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let mut replayed = 0usize;
            for (idx, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: ExecutionRecord =
                    serde_json::from_str(&line).map_err(|e| LedgerError::Corrupt {
                        line: idx + 1,
                        reason: e.to_string(),
                    })?;
                ledger.absorb(&record);
                replayed += 1;
            }
            info!(path = %path.display(), records = replayed, "ledger replayed");
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        *ledger.log.lock() = Some(file);
        Ok(ledger)
    }

    /// A ledger without a durable log, for tests and ephemeral sessions
    pub fn in_memory() -> Self {
        Self {
            log: Mutex::new(None),
            stats: RwLock::new(HashMap::new()),
        }
    }

    /// Append one record to the log, then fold it into the aggregates
    pub fn record_execution(&self, record: ExecutionRecord) -> Result<(), LedgerError> {
        {
            let mut log = self.log.lock();
            if let Some(file) = log.as_mut() {
                let line = serde_json::to_string(&record)?;
                writeln!(file, "{line}")?;
                file.flush()?;
            }
        }

        debug!(
            module = %record.module,
            action = %record.action,
            protocol = %record.protocol,
            success = record.success,
            duration_ms = record.duration_ms,
            "execution recorded"
        );
        self.absorb(&record);
        Ok(())
    }

    fn absorb(&self, record: &ExecutionRecord) {
        let key = (
            record.module.clone(),
            record.action.clone(),
            record.protocol,
        );
        let mut stats = self.stats.write();
        let registered = stats.len() as u64;
        stats
            .entry(key)
            .and_modify(|existing| existing.absorb(record))
            .or_insert_with(|| ProtocolStats::first(record, registered));
    }

    /// The protocol most worth trying first for a module/action pair
    ///
    /// Highest success rate wins; ties break to the higher execution
    /// count, then to the first-registered protocol. `None` until at least
    /// one record exists for the key.
    pub fn recommend(&self, module: &str, action: &str) -> Option<Protocol> {
        let module = module.to_ascii_uppercase();
        let action = action.to_ascii_uppercase();
        let stats = self.stats.read();
        stats
            .values()
            .filter(|s| s.module == module && s.action == action)
            .max_by(|a, b| {
                a.success_rate
                    .partial_cmp(&b.success_rate)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.total.cmp(&b.total))
                    // Lower registration order wins the final tie
                    .then_with(|| b.registered.cmp(&a.registered))
            })
            .map(|s| s.protocol)
    }

    /// Aggregates for one module/action pair, one entry per protocol
    pub fn stats_for(&self, module: &str, action: &str) -> Vec<ProtocolStats> {
        let module = module.to_ascii_uppercase();
        let action = action.to_ascii_uppercase();
        self.stats
            .read()
            .values()
            .filter(|s| s.module == module && s.action == action)
            .cloned()
            .collect()
    }

    /// Every aggregate, in registration order
    pub fn snapshot(&self) -> Vec<ProtocolStats> {
        let mut all: Vec<ProtocolStats> = self.stats.read().values().cloned().collect();
        all.sort_by_key(|s| s.registered);
        all
    }

    /// Write the derived aggregates as a JSON snapshot; purely a
    /// convenience, the log remains the source of truth
    pub fn write_snapshot(&self, path: impl AsRef<Path>) -> Result<(), LedgerError> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
