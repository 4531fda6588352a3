//! Adapter bus configuration
//!
//! Issues the protocol/addressing/flow-control commands that point the
//! adapter at a specific module. Adapters rarely NACK configuration, so
//! success is "got any response". None of this state survives an adapter
//! reset; the full setup is reissued whenever the target module changes.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use vdiag_core::{Bus, ModuleDescriptor};

use crate::adapter::AdapterLink;
use crate::error::LinkError;

/// Issues protocol/addressing/flow-control configuration on an open link
pub struct BusConfigurator {
    link: Arc<dyn AdapterLink>,
    timeout: Duration,
}

impl BusConfigurator {
    pub fn new(link: Arc<dyn AdapterLink>, timeout: Duration) -> Self {
        Self { link, timeout }
    }

    /// Select the adapter protocol for a bus (`AT SP n`)
    pub async fn set_protocol(&self, bus: Bus) -> Result<(), LinkError> {
        self.command(&format!("AT SP {}", bus.adapter_protocol()))
            .await
    }

    /// Set the request header / arbitration ID (`AT SH hhh`)
    pub async fn set_header(&self, address: u16) -> Result<(), LinkError> {
        self.command(&format!("AT SH {:03X}", address)).await
    }

    /// Configure ISO-TP flow control for a module's response address
    pub async fn set_flow_control(&self, address: u16) -> Result<(), LinkError> {
        // Response ID is request ID + 8 on 11-bit CAN
        self.command(&format!("AT FC SH {:03X}", address + 8))
            .await?;
        self.command("AT FC SD 30 00 00").await?;
        self.command("AT FC SM 1").await
    }

    /// Reissue the full addressing setup for a module
    pub async fn apply(&self, module: &ModuleDescriptor) -> Result<(), LinkError> {
        debug!(module = %module.name, address = %module.header_string(), bus = %module.bus, "configuring bus");
        self.set_protocol(module.bus).await?;
        self.set_header(module.address).await?;
        if matches!(module.bus, Bus::Can | Bus::CanExtended) {
            self.set_flow_control(module.address).await?;
        }
        Ok(())
    }

    async fn command(&self, command: &str) -> Result<(), LinkError> {
        match self.link.send_raw(command, self.timeout).await? {
            Some(_) => Ok(()),
            None => Err(LinkError::NoResponse(command.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MockConfig;
    use crate::mock::MockLink;
    use vdiag_core::Protocol;

    fn engine_module() -> ModuleDescriptor {
        ModuleDescriptor {
            name: "ENGINE".into(),
            address: 0x7E0,
            protocol: Protocol::StandardObd,
            bus: Bus::Can,
        }
    }

    #[tokio::test]
    async fn test_apply_reissues_full_setup() {
        let link = Arc::new(MockLink::new(&MockConfig::default()));
        let bus = BusConfigurator::new(link.clone(), Duration::from_secs(1));

        bus.apply(&engine_module()).await.unwrap();

        let sent = link.transcript();
        assert_eq!(
            sent,
            vec![
                "AT SP 6",
                "AT SH 7E0",
                "AT FC SH 7E8",
                "AT FC SD 30 00 00",
                "AT FC SM 1",
            ]
        );
    }

    #[tokio::test]
    async fn test_kline_module_skips_flow_control() {
        let link = Arc::new(MockLink::new(&MockConfig::default()));
        let bus = BusConfigurator::new(link.clone(), Duration::from_secs(1));

        let module = ModuleDescriptor {
            name: "CLUSTER".into(),
            address: 0x60,
            protocol: Protocol::Manufacturer,
            bus: Bus::KLine,
        };
        bus.apply(&module).await.unwrap();

        let sent = link.transcript();
        assert_eq!(sent, vec!["AT SP 3", "AT SH 060"]);
    }
}
