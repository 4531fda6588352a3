//! vdiag-ledger - closed-loop feedback on protocol success
//!
//! Every diagnostic attempt, success or failure, becomes one immutable
//! [`ExecutionRecord`] appended to a durable JSON-lines log. Per
//! (module, action, protocol) aggregates are updated incrementally as
//! records land and are always reproducible by replaying the log, which is
//! how [`FeedbackLedger::open`] builds them. [`FeedbackLedger::recommend`]
//! turns that history into an adaptive protocol ordering for the workflow.

mod error;
mod ledger;
mod record;
mod stats;

pub use error::LedgerError;
pub use ledger::FeedbackLedger;
pub use record::ExecutionRecord;
pub use stats::ProtocolStats;
