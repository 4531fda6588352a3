//! vdiag-core - shared models and error taxonomy for the vdiag engine
//!
//! This crate holds the types every other layer agrees on: the protocol
//! variant an execution ran under, the bus a module lives on, the module
//! descriptor itself, and the engine-level error taxonomy that attempts
//! are classified against.

pub mod error;
pub mod models;

pub use error::{DiagError, DiagResult};
pub use models::{Bus, ModuleDescriptor, Protocol};
