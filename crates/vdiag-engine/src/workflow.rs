//! The diagnostic workflow
//!
//! `resolve module → resolve procedure → attempt → fall back → record`.
//! Resolution misses are terminal but still recorded, so the ledger
//! reflects coverage gaps as well as protocol failures.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use vdiag_core::{DiagError, ModuleDescriptor, Protocol};
use vdiag_kb::CommandTemplate;
use vdiag_ledger::ExecutionRecord;
use vdiag_link::LinkError;
use vdiag_proto::request::dtc_sub_function;
use vdiag_proto::units::be_u16;
use vdiag_proto::{decode_dtcs, DtcEncoding, ServiceRequest, ServiceResult, SessionError};

use crate::context::EngineContext;
use crate::report::{DiagnosticOutcome, DiagnosticReport, FaultEntry};

/// Orchestrates one diagnostic action at a time over a shared context
pub struct DiagnosticWorkflow {
    ctx: EngineContext,
}

impl DiagnosticWorkflow {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// The protocol history currently favors for a module/action pair
    pub fn recommend_protocol(&self, module: &str, action: &str) -> Option<Protocol> {
        self.ctx.ledger.recommend(module, action)
    }

    /// Resolve a module and action against the knowledge base, then execute
    /// candidates in adaptive order until one succeeds
    pub async fn resolve_and_execute(
        &self,
        module_name: &str,
        action: &str,
    ) -> Result<DiagnosticReport, DiagError> {
        debug!(module = module_name, action, state = "resolve_module");
        let Some(module) = self.ctx.knowledge.module(module_name).cloned() else {
            let err = DiagError::NotFound(format!("module {module_name}"));
            self.record(
                module_name,
                action,
                Protocol::StandardObd,
                false,
                Duration::ZERO,
                Some(describe(&err)),
            );
            return Err(err);
        };

        debug!(module = %module.name, action, state = "resolve_procedure");
        let candidates = self.ctx.knowledge.commands_for(&module.name, action);
        if candidates.is_empty() {
            let err = DiagError::NotFound(format!("no procedure for {}.{}", module.name, action));
            self.record(
                &module.name,
                action,
                module.protocol,
                false,
                Duration::ZERO,
                Some(describe(&err)),
            );
            return Err(err);
        }

        let ordered = self.order_candidates(candidates, &module.name, action);
        let mut last_err = DiagError::Internal("no candidates attempted".to_string());

        for command in ordered {
            debug!(command = %command.id, protocol = %command.protocol, state = "attempt");
            let started = Instant::now();

            match self.attempt(&module, command).await {
                Ok(outcome) => {
                    let duration = started.elapsed();
                    self.record(&module.name, action, command.protocol, true, duration, None);
                    info!(
                        command = %command.id,
                        protocol = %command.protocol,
                        duration_ms = duration.as_millis() as u64,
                        state = "done",
                        "diagnostic action succeeded"
                    );
                    return Ok(DiagnosticReport {
                        module: module.name.clone(),
                        action: action.to_ascii_uppercase(),
                        protocol: command.protocol,
                        command_id: command.id.clone(),
                        duration_ms: duration.as_millis() as u64,
                        outcome,
                    });
                }
                Err(err) => {
                    self.record(
                        &module.name,
                        action,
                        command.protocol,
                        false,
                        started.elapsed(),
                        Some(describe(&err)),
                    );
                    if matches!(err, DiagError::Connection(_)) {
                        // Fatal for the session; nothing left to fall back on
                        return Err(err);
                    }
                    warn!(command = %command.id, error = %err, "attempt failed, falling back");
                    last_err = err;
                }
            }
        }

        debug!(module = %module.name, action, state = "failed");
        Err(last_err)
    }

    /// Candidates ordered standard-then-fallback, with the ledger's
    /// recommendation floated to the front once history exists
    fn order_candidates<'a>(
        &self,
        mut candidates: Vec<&'a CommandTemplate>,
        module: &str,
        action: &str,
    ) -> Vec<&'a CommandTemplate> {
        candidates.sort_by_key(|c| match c.protocol {
            Protocol::StandardObd => 0,
            Protocol::Uds => 1,
            Protocol::Manufacturer => 2,
        });

        if let Some(preferred) = self.ctx.ledger.recommend(module, action) {
            debug!(module, action, preferred = %preferred, "adaptive ordering from ledger");
            // Stable: file order survives within each class
            candidates.sort_by_key(|c| (c.protocol != preferred) as u8);
        }

        candidates
    }

    async fn attempt(
        &self,
        module: &ModuleDescriptor,
        command: &CommandTemplate,
    ) -> Result<DiagnosticOutcome, DiagError> {
        // Adapter state does not survive resets; reissue the addressing
        // setup on every attempt.
        self.ctx.bus.apply(module).await.map_err(map_link_error)?;

        if command.protocol != Protocol::StandardObd {
            match self.ctx.session.enter_extended().await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(command = %command.id, "extended session unavailable, staying in default")
                }
                Err(e) => return Err(map_session_error(e)),
            }
        }

        let request = build_request(command)?;
        let result = self
            .ctx
            .session
            .invoke(&request)
            .await
            .map_err(map_session_error)?;

        match result {
            ServiceResult::Positive(payload) => self.interpret(command, &request, payload),
            ServiceResult::Timeout => Err(DiagError::Timeout),
            ServiceResult::NoData => {
                if request.dtc_encoding().is_some() {
                    // Reachable module with nothing stored
                    Ok(DiagnosticOutcome::TroubleCodes { faults: vec![] })
                } else {
                    Err(DiagError::NoData)
                }
            }
            ServiceResult::Negative(neg) => Err(DiagError::NegativeResponse {
                service_id: neg.service_id,
                nrc: neg.nrc.into(),
                retryable: neg.is_retryable(),
            }),
        }
    }

    fn interpret(
        &self,
        command: &CommandTemplate,
        request: &ServiceRequest,
        payload: Vec<u8>,
    ) -> Result<DiagnosticOutcome, DiagError> {
        // Count sub-function: [sub echo] [availability mask] [format] [count]
        if let ServiceRequest::ReadDtcInfo {
            sub_function: dtc_sub_function::REPORT_COUNT_BY_STATUS_MASK,
            ..
        } = request
        {
            if payload.len() < 5 {
                return Err(DiagError::Decode(format!(
                    "DTC count response too short: {} bytes",
                    payload.len() + 1
                )));
            }
            return Ok(DiagnosticOutcome::Value {
                name: "DTC_COUNT".to_string(),
                value: be_u16(payload[3], payload[4]) as f64,
                unit: None,
            });
        }

        if let Some(encoding) = request.dtc_encoding() {
            let records = match encoding {
                DtcEncoding::Obd2 => &payload[..],
                // Skip the sub-function echo and availability mask
                DtcEncoding::Uds => payload.get(2..).ok_or_else(|| {
                    DiagError::Decode("fault response lost its availability mask".to_string())
                })?,
            };
            let faults = decode_dtcs(records, encoding)
                .map_err(|e| DiagError::Decode(e.to_string()))?
                .into_iter()
                .map(|dtc| {
                    let code = dtc.code();
                    let rule = self.ctx.knowledge.dtc_rule_for(&code);
                    FaultEntry {
                        code,
                        system: rule.map(|r| r.system.clone()),
                        description: rule.and_then(|r| r.description.clone()),
                        dtc,
                    }
                })
                .collect();
            return Ok(DiagnosticOutcome::TroubleCodes { faults });
        }

        if matches!(
            request,
            ServiceRequest::ClearStoredDtcs | ServiceRequest::ClearDiagnosticInfo { .. }
        ) {
            return Ok(DiagnosticOutcome::Cleared);
        }

        // Response rules match against the full frame, marker included
        let mut frame = Vec::with_capacity(payload.len() + 1);
        frame.push(request.positive_marker());
        frame.extend_from_slice(&payload);

        for rule in self.ctx.knowledge.response_rules_for(&command.id) {
            if rule.matches(&frame) {
                let value = rule
                    .evaluate(&frame)
                    .map_err(|e| DiagError::Decode(e.to_string()))?;
                return Ok(DiagnosticOutcome::Value {
                    name: rule.name.clone(),
                    value,
                    unit: rule.unit.clone(),
                });
            }
        }

        Ok(DiagnosticOutcome::Raw { payload })
    }

    fn record(
        &self,
        module: &str,
        action: &str,
        protocol: Protocol,
        success: bool,
        duration: Duration,
        error: Option<String>,
    ) {
        let record = ExecutionRecord::new(module, action, protocol, success, duration, error);
        if let Err(e) = self.ctx.ledger.record_execution(record) {
            warn!(error = %e, "ledger append failed");
        }
    }
}

fn describe(err: &DiagError) -> String {
    format!("{}: {err}", err.class())
}

fn map_link_error(e: LinkError) -> DiagError {
    match e {
        LinkError::Timeout => DiagError::Timeout,
        other => DiagError::Connection(other.to_string()),
    }
}

fn map_session_error(e: SessionError) -> DiagError {
    match e {
        SessionError::Closed => DiagError::Connection("session closed".to_string()),
        SessionError::Decode(d) => DiagError::Decode(d.to_string()),
        SessionError::Link(l) => map_link_error(l),
    }
}

/// Build the service request a command template describes
fn build_request(command: &CommandTemplate) -> Result<ServiceRequest, DiagError> {
    let missing = |field: &str| {
        DiagError::KnowledgeParse(format!("command {} is missing {field}", command.id))
    };

    match command.service {
        0x01 => Ok(ServiceRequest::CurrentData {
            pid: command.pid.ok_or_else(|| missing("PID"))?,
        }),
        0x03 => Ok(ServiceRequest::StoredDtcs),
        0x04 => Ok(ServiceRequest::ClearStoredDtcs),
        0x07 => Ok(ServiceRequest::PendingDtcs),
        0x09 => Ok(ServiceRequest::VehicleInfo {
            // PID 02 is the VIN, by far the common case
            pid: command.pid.unwrap_or(0x02),
        }),
        0x10 => Ok(ServiceRequest::SessionControl {
            session: command.sub_function.unwrap_or(0x03),
        }),
        0x14 => Ok(ServiceRequest::ClearDiagnosticInfo {
            group: command.group.unwrap_or(0xFF_FFFF),
        }),
        0x19 => Ok(ServiceRequest::ReadDtcInfo {
            sub_function: command.sub_function.unwrap_or(0x02),
            status_mask: command.status_mask.unwrap_or(0xFF),
        }),
        0x22 => Ok(ServiceRequest::ReadDataById {
            did: command.did.ok_or_else(|| missing("DID"))?,
        }),
        0x27 => Ok(ServiceRequest::SecurityAccessSeed {
            level: command.level.unwrap_or(1),
        }),
        0x2F => Ok(ServiceRequest::IoControlProbe {
            ioid: command.ioid.ok_or_else(|| missing("IOID"))?,
        }),
        0x31 => Ok(ServiceRequest::RoutineResults {
            routine_id: command.routine.ok_or_else(|| missing("ROUTINE"))?,
        }),
        0x3E => Ok(ServiceRequest::TesterPresent),
        other => Err(DiagError::KnowledgeParse(format!(
            "command {} uses unsupported service 0x{other:02X}",
            command.id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(service: u8) -> CommandTemplate {
        CommandTemplate {
            id: "ENGINE.TEST".into(),
            module: "ENGINE".into(),
            action: "TEST".into(),
            protocol: Protocol::Uds,
            service,
            pid: None,
            did: None,
            sub_function: None,
            status_mask: None,
            group: None,
            routine: None,
            ioid: None,
            level: None,
        }
    }

    #[test]
    fn test_build_request_defaults() {
        assert_eq!(
            build_request(&template(0x19)).unwrap(),
            ServiceRequest::ReadDtcInfo {
                sub_function: 0x02,
                status_mask: 0xFF
            }
        );
        assert_eq!(
            build_request(&template(0x14)).unwrap(),
            ServiceRequest::ClearDiagnosticInfo { group: 0xFF_FFFF }
        );
    }

    #[test]
    fn test_build_request_requires_parameters() {
        let err = build_request(&template(0x22)).unwrap_err();
        assert!(matches!(err, DiagError::KnowledgeParse(_)));

        let err = build_request(&template(0xAA)).unwrap_err();
        assert!(matches!(err, DiagError::KnowledgeParse(_)));
    }

    #[test]
    fn test_did_command_builds_read() {
        let mut cmd = template(0x22);
        cmd.did = Some(0x1E1C);
        assert_eq!(
            build_request(&cmd).unwrap(),
            ServiceRequest::ReadDataById { did: 0x1E1C }
        );
    }
}
