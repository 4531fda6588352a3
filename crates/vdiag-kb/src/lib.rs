//! vdiag-kb - per-vehicle diagnostic knowledge base
//!
//! A compact line-oriented fact base resolves "module + action" into a
//! concrete command. One record per line, `TYPE:value KEY:value …`; five
//! record types (module, command, DTC rule, response rule, bit mapping).
//! The store loads once per vehicle and is immutable afterwards; updates
//! are appended to the source file so the audit trail survives.
//!
//! # Example
//!
//! ```
//! use vdiag_kb::KnowledgeBase;
//!
//! let kb = KnowledgeBase::parse(
//!     "MODULE:ENGINE ADDRESS:7E0 PROTOCOL:standard_obd BUS:can\n\
//!      COMMAND:ENGINE.READ_DTC SERVICE:03 PROTOCOL:standard_obd\n",
//! )
//! .unwrap();
//! assert!(kb.module("engine").is_some());
//! assert_eq!(kb.commands_for("ENGINE", "READ_DTC").len(), 1);
//! ```

mod error;
pub mod expr;
mod parser;
mod record;
mod store;

pub use error::ParseError;
pub use expr::{CalcExpr, EvalError};
pub use record::{BitMapping, CommandTemplate, DtcRule, ResponseRule};
pub use store::{action_matches, KnowledgeBase};
