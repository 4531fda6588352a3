//! End-to-end workflow tests over the mock adapter link
//!
//! These exercise the full path: knowledge resolution, bus configuration,
//! session invocation, decode, ledger recording and adaptive reordering.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use vdiag_engine::{
    get_trouble_codes, DiagError, DiagnosticOutcome, DiagnosticWorkflow, DtcEncoding,
    EngineConfig, EngineContext, FeedbackLedger, KnowledgeBase, Protocol,
};
use vdiag_link::{AdapterLink, BusConfigurator, MockConfig, MockLink};
use vdiag_proto::{DiagnosticSession, KeepaliveConfig, SessionConfig};

const VEHICLE_KB: &str = "\
# vehicle: COROLLA_2015
MODULE:ENGINE ADDRESS:7E0 PROTOCOL:standard_obd BUS:can
MODULE:HVAC ADDRESS:7B0 PROTOCOL:uds BUS:can
COMMAND:ENGINE.READ_DTC SERVICE:03 PROTOCOL:standard_obd
COMMAND:ENGINE.READ_RPM SERVICE:01 PID:0C PROTOCOL:standard_obd
COMMAND:ENGINE.READ_RPM_UDS SERVICE:22 DID:F40C PROTOCOL:uds ACTION:READ_RPM
COMMAND:HVAC.CABIN_TEMP SERVICE:22 DID:1E1C PROTOCOL:uds
COMMAND:HVAC.READ_DTC SERVICE:19 SUB:02 MASK:FF PROTOCOL:uds
COMMAND:HVAC.DTC_COUNT SERVICE:19 SUB:01 MASK:FF PROTOCOL:uds
DTC_RULE:P01 SYSTEM:fuel_air_metering DESC:Fuel_and_air_metering
RESPONSE_RULE:ENGINE.READ_RPM MATCH:410C EXTRACT:A,B CALC:(A*256+B)/4 UNIT:rpm
RESPONSE_RULE:ENGINE.READ_RPM_UDS MATCH:62F40C EXTRACT:A,B CALC:(A*256+B)/4 UNIT:rpm
RESPONSE_RULE:HVAC.CABIN_TEMP MATCH:621E1C EXTRACT:A CALC:A-40 UNIT:C
";

fn scripted_link() -> Arc<MockLink> {
    Arc::new(
        MockLink::new(&MockConfig::default())
            .with_response("03", "43 01 02 03 04")
            .with_response("22F40C", "62 F4 0C 1A F8")
            .with_response("221E1C", "62 1E 1C 5A")
            .with_response("1902FF", "7F 19 31")
            .with_response("1901FF", "59 01 FF 01 00 05")
            .with_response("1003", "50 03 00 19 01 F4"),
    )
}

fn workflow_over(link: Arc<MockLink>) -> DiagnosticWorkflow {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let knowledge = Arc::new(KnowledgeBase::parse(VEHICLE_KB).unwrap());
    let ledger = Arc::new(FeedbackLedger::in_memory());
    let session_config = SessionConfig {
        response_pending_delay_ms: 1,
        keepalive: KeepaliveConfig {
            enabled: false,
            interval_ms: 1000,
        },
        ..SessionConfig::default()
    };
    let bus = Arc::new(BusConfigurator::new(
        link.clone() as Arc<dyn AdapterLink>,
        Duration::from_secs(1),
    ));
    let session = Arc::new(DiagnosticSession::new(link, session_config));

    DiagnosticWorkflow::new(EngineContext::new(knowledge, ledger, session, bus))
}

#[tokio::test]
async fn test_read_stored_codes_end_to_end() {
    let link = scripted_link();
    let workflow = workflow_over(link.clone());

    let report = workflow
        .resolve_and_execute("engine", "read codes")
        .await
        .unwrap();

    assert_eq!(report.module, "ENGINE");
    assert_eq!(report.protocol, Protocol::StandardObd);
    assert_eq!(report.command_id, "ENGINE.READ_DTC");

    let DiagnosticOutcome::TroubleCodes { faults } = &report.outcome else {
        panic!("expected trouble codes, got {:?}", report.outcome);
    };
    let codes: Vec<&str> = faults.iter().map(|f| f.code.as_str()).collect();
    assert_eq!(codes, vec!["P0102", "P0304"]);

    // The P01 rule annotated the first code, not the second
    assert_eq!(faults[0].system.as_deref(), Some("fuel_air_metering"));
    assert_eq!(faults[1].system, None);

    // Bus setup preceded the service frame
    let transcript = link.transcript();
    let sp = transcript.iter().position(|c| c == "AT SP 6").unwrap();
    let sh = transcript.iter().position(|c| c == "AT SH 7E0").unwrap();
    let frame = transcript.iter().position(|c| c == "03").unwrap();
    assert!(sp < sh && sh < frame);

    // The attempt landed in the ledger
    let stats = workflow.context().ledger.stats_for("ENGINE", "READ_DTC");
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].total, 1);
    assert_eq!(stats[0].success_rate, 1.0);
}

#[tokio::test]
async fn test_response_rule_computes_cabin_temperature() {
    let workflow = workflow_over(scripted_link());

    let report = workflow
        .resolve_and_execute("HVAC", "CABIN_TEMP")
        .await
        .unwrap();

    assert_eq!(report.protocol, Protocol::Uds);
    match report.outcome {
        DiagnosticOutcome::Value { ref name, value, ref unit } => {
            assert_eq!(name, "CABIN_TEMP");
            assert_eq!(value, 50.0);
            assert_eq!(unit.as_deref(), Some("C"));
        }
        other => panic!("expected value outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fallback_then_adaptive_reordering() {
    let link = scripted_link();
    let workflow = workflow_over(link.clone());

    // Standard OBD read gets nothing; the UDS template answers
    let report = workflow
        .resolve_and_execute("ENGINE", "READ_RPM")
        .await
        .unwrap();
    assert_eq!(report.protocol, Protocol::Uds);
    match report.outcome {
        DiagnosticOutcome::Value { value, .. } => assert_eq!(value, 1726.0),
        other => panic!("expected value outcome, got {other:?}"),
    }

    // Both attempts were recorded: one failure, one success
    let mut stats = workflow.context().ledger.stats_for("ENGINE", "READ_RPM");
    stats.sort_by_key(|s| s.registered);
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].protocol, Protocol::StandardObd);
    assert_eq!(stats[0].successes, 0);
    assert_eq!(stats[1].protocol, Protocol::Uds);
    assert_eq!(stats[1].successes, 1);

    assert_eq!(
        workflow.recommend_protocol("ENGINE", "READ_RPM"),
        Some(Protocol::Uds)
    );

    // Second run goes straight to the recommended protocol
    let obd_attempts_before = count(&link, "010C");
    let report = workflow
        .resolve_and_execute("ENGINE", "READ_RPM")
        .await
        .unwrap();
    assert_eq!(report.protocol, Protocol::Uds);
    assert_eq!(count(&link, "010C"), obd_attempts_before);
    assert_eq!(count(&link, "22F40C"), 2);
}

#[tokio::test]
async fn test_dtc_count_sub_function() {
    let workflow = workflow_over(scripted_link());

    let report = workflow
        .resolve_and_execute("HVAC", "DTC_COUNT")
        .await
        .unwrap();

    match report.outcome {
        DiagnosticOutcome::Value { ref name, value, .. } => {
            assert_eq!(name, "DTC_COUNT");
            assert_eq!(value, 5.0);
        }
        other => panic!("expected value outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn test_terminal_negative_surfaces_and_is_recorded() {
    let workflow = workflow_over(scripted_link());

    let err = workflow
        .resolve_and_execute("HVAC", "READ_DTC")
        .await
        .unwrap_err();

    match err {
        DiagError::NegativeResponse {
            service_id,
            nrc,
            retryable,
        } => {
            assert_eq!(service_id, 0x19);
            assert_eq!(nrc, 0x31);
            assert!(!retryable);
        }
        other => panic!("expected negative response, got {other}"),
    }

    let stats = workflow.context().ledger.stats_for("HVAC", "READ_DTC");
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].total, 1);
    assert_eq!(stats[0].successes, 0);
}

#[tokio::test]
async fn test_unknown_module_records_coverage_gap() {
    let workflow = workflow_over(scripted_link());

    let err = workflow
        .resolve_and_execute("GEARBOX", "READ_DTC")
        .await
        .unwrap_err();
    assert!(matches!(err, DiagError::NotFound(_)));

    let stats = workflow.context().ledger.stats_for("GEARBOX", "READ_DTC");
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].successes, 0);

    // Unknown action on a known module is the same story
    let err = workflow
        .resolve_and_execute("ENGINE", "OPEN_SUNROOF")
        .await
        .unwrap_err();
    assert!(matches!(err, DiagError::NotFound(_)));
    assert_eq!(
        workflow
            .context()
            .ledger
            .stats_for("ENGINE", "OPEN_SUNROOF")
            .len(),
        1
    );
}

#[tokio::test]
async fn test_context_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let kb_path = dir.path().join("vehicle.kb");
    std::fs::write(&kb_path, VEHICLE_KB).unwrap();

    let config_path = dir.path().join("engine.toml");
    std::fs::write(
        &config_path,
        format!(
            "knowledge_path = {kb_path:?}\n\
             [link]\n\
             type = \"mock\"\n\
             [session.keepalive]\n\
             enabled = false\n"
        ),
    )
    .unwrap();

    let config = EngineConfig::from_file(&config_path).unwrap();
    let ctx = EngineContext::from_config(&config).await.unwrap();
    assert!(ctx.knowledge.module("ENGINE").is_some());
    assert_eq!(ctx.ledger.recommend("ENGINE", "READ_DTC"), None);

    ctx.shutdown().await;
    assert!(!ctx.session.link().is_connected());
}

#[tokio::test]
async fn test_trouble_code_call_surface() {
    let codes = get_trouble_codes(&[0x01, 0x02, 0x03, 0x04], DtcEncoding::Obd2).unwrap();
    assert_eq!(codes.len(), 2);
    assert_eq!(codes[0].code(), "P0102");

    let err = get_trouble_codes(&[0x01], DtcEncoding::Obd2).unwrap_err();
    assert!(matches!(err, DiagError::Decode(_)));
}

fn count(link: &MockLink, frame: &str) -> usize {
    link.transcript()
        .iter()
        .filter(|c| c.as_str() == frame)
        .count()
}
