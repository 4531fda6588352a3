//! Explicitly constructed engine context
//!
//! Everything the workflow touches is built here and threaded through; no
//! module-level registries, no hidden singletons.

use std::sync::Arc;

use tracing::info;
use vdiag_core::DiagError;
use vdiag_kb::KnowledgeBase;
use vdiag_ledger::FeedbackLedger;
use vdiag_link::{create_link, AdapterLink, BusConfigurator};
use vdiag_proto::DiagnosticSession;

use crate::config::EngineConfig;

/// Shared handles for one orchestration: knowledge, history, transport
#[derive(Clone)]
pub struct EngineContext {
    pub knowledge: Arc<KnowledgeBase>,
    pub ledger: Arc<FeedbackLedger>,
    pub session: Arc<DiagnosticSession>,
    pub bus: Arc<BusConfigurator>,
}

impl EngineContext {
    /// Assemble a context from already-built parts (the test path)
    pub fn new(
        knowledge: Arc<KnowledgeBase>,
        ledger: Arc<FeedbackLedger>,
        session: Arc<DiagnosticSession>,
        bus: Arc<BusConfigurator>,
    ) -> Self {
        Self {
            knowledge,
            ledger,
            session,
            bus,
        }
    }

    /// Connect the link and load knowledge/history per configuration
    pub async fn from_config(config: &EngineConfig) -> Result<Self, DiagError> {
        let link: Arc<dyn AdapterLink> = create_link(&config.link)
            .await
            .map_err(|e| DiagError::Connection(e.to_string()))?;

        let knowledge = KnowledgeBase::load(&config.knowledge_path)
            .map_err(|e| DiagError::KnowledgeParse(e.to_string()))?;

        let ledger = match &config.ledger_path {
            Some(path) => FeedbackLedger::open(path)
                .map_err(|e| DiagError::Internal(format!("ledger open failed: {e}")))?,
            None => FeedbackLedger::in_memory(),
        };

        let bus = BusConfigurator::new(Arc::clone(&link), config.session.request_timeout());
        let session = DiagnosticSession::new(link, config.session.clone());

        info!("engine context ready");
        Ok(Self::new(
            Arc::new(knowledge),
            Arc::new(ledger),
            Arc::new(session),
            Arc::new(bus),
        ))
    }

    /// Close the session and release the adapter
    pub async fn shutdown(&self) {
        self.session.close().await;
        if let Err(e) = self.session.link().disconnect().await {
            tracing::warn!(error = %e, "link disconnect failed");
        }
    }
}
