//! Transport layer for AT-command diagnostic adapters
//!
//! This crate owns the only blocking boundary in the engine: the serial
//! channel to the adapter. It provides:
//! - Serial link for ELM327-class adapters (reset/init handshake, prompt
//!   framing, byte-ceiling guard)
//! - Mock link for testing
//! - Bus configurator that issues protocol/addressing/flow-control commands
//!
//! # Example
//!
//! ```ignore
//! use vdiag_link::{create_link, LinkConfig};
//!
//! let config = LinkConfig::Mock(Default::default());
//! let link = create_link(&config).await?;
//! let response = link.send_raw("0100", Duration::from_secs(5)).await?;
//! ```

mod adapter;
pub mod bus;
pub mod config;
pub mod error;
pub mod mock;
pub mod serial;

pub use adapter::{AdapterLink, LinkDescription};
pub use bus::BusConfigurator;
pub use config::{LinkConfig, MockConfig, SerialConfig};
pub use error::LinkError;
pub use mock::MockLink;
pub use serial::SerialAtLink;

use std::sync::Arc;

/// Create an adapter link based on configuration
pub async fn create_link(config: &LinkConfig) -> Result<Arc<dyn AdapterLink>, LinkError> {
    match config {
        LinkConfig::Serial(cfg) => {
            let link = SerialAtLink::connect(cfg).await?;
            Ok(Arc::new(link))
        }
        LinkConfig::Mock(cfg) => Ok(Arc::new(MockLink::new(cfg))),
    }
}
