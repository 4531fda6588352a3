//! Knowledge base store and lookups

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use tracing::{debug, info};
use vdiag_core::ModuleDescriptor;

use crate::error::ParseError;
use crate::parser::parse_source;
use crate::record::{BitMapping, CommandTemplate, DtcRule, ResponseRule};

/// Keyword groups treated as the same action
const SYNONYM_GROUPS: &[&[&str]] = &[
    &[
        "READ_DTC",
        "READ_CODES",
        "READ_FAULTS",
        "DTCS",
        "FAULTS",
        "TROUBLE_CODES",
    ],
    &["PENDING_DTC", "PENDING_CODES", "PENDING_FAULTS"],
    &[
        "CLEAR_DTC",
        "CLEAR_CODES",
        "CLEAR_FAULTS",
        "ERASE_CODES",
        "RESET_CODES",
    ],
    &["READ_VIN", "VIN", "VEHICLE_ID"],
    &["COOLANT_TEMP", "COOLANT_TEMPERATURE", "ENGINE_TEMP"],
    &["RPM", "ENGINE_RPM", "ENGINE_SPEED"],
];

/// Whether a template's action keyword serves a requested action
///
/// Total over arbitrary input: exact match after normalization, otherwise
/// membership in the same synonym group.
pub fn action_matches(candidate: &str, keyword: &str) -> bool {
    let candidate = normalize_keyword(candidate);
    let keyword = normalize_keyword(keyword);
    if candidate == keyword {
        return true;
    }
    SYNONYM_GROUPS.iter().any(|group| {
        group.contains(&candidate.as_str()) && group.contains(&keyword.as_str())
    })
}

fn normalize_keyword(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_sep = false;
    for c in s.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_uppercase());
            last_was_sep = false;
        } else if !last_was_sep && !out.is_empty() {
            out.push('_');
            last_was_sep = true;
        }
    }
    out.trim_end_matches('_').to_string()
}

/// Indexed, immutable per-vehicle fact base
///
/// Module and command lookups are O(1); rule lookups scan in file order so
/// the first matching record wins.
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    modules: HashMap<String, ModuleDescriptor>,
    module_order: Vec<String>,
    commands: HashMap<String, CommandTemplate>,
    command_order: Vec<String>,
    dtc_rules: Vec<DtcRule>,
    response_rules: Vec<ResponseRule>,
    bit_mappings: Vec<BitMapping>,
}

impl KnowledgeBase {
    pub(crate) fn empty() -> Self {
        Self::default()
    }

    /// Parse a fact base in one linear pass
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let kb = parse_source(source)?;
        info!(
            modules = kb.module_order.len(),
            commands = kb.command_order.len(),
            response_rules = kb.response_rules.len(),
            "knowledge base loaded"
        );
        Ok(kb)
    }

    /// Load a fact base from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let source = std::fs::read_to_string(path)?;
        Self::parse(&source)
    }

    // Duplicate keys keep the first occurrence; the appended audit trail
    // never rewrites what an earlier line established.
    pub(crate) fn insert_module(&mut self, module: ModuleDescriptor) {
        if self.modules.contains_key(&module.name) {
            debug!(module = %module.name, "duplicate module record ignored");
            return;
        }
        self.module_order.push(module.name.clone());
        self.modules.insert(module.name.clone(), module);
    }

    pub(crate) fn insert_command(&mut self, command: CommandTemplate) {
        if self.commands.contains_key(&command.id) {
            debug!(command = %command.id, "duplicate command record ignored");
            return;
        }
        self.command_order.push(command.id.clone());
        self.commands.insert(command.id.clone(), command);
    }

    pub(crate) fn insert_dtc_rule(&mut self, rule: DtcRule) {
        self.dtc_rules.push(rule);
    }

    pub(crate) fn insert_response_rule(&mut self, rule: ResponseRule) {
        self.response_rules.push(rule);
    }

    pub(crate) fn insert_bit_mapping(&mut self, mapping: BitMapping) {
        self.bit_mappings.push(mapping);
    }

    /// Look up a module by name, case-insensitively
    pub fn module(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.modules.get(&name.to_ascii_uppercase())
    }

    /// Look up a command by id (`"<MODULE>.<NAME>"`)
    pub fn command(&self, id: &str) -> Option<&CommandTemplate> {
        self.commands.get(&id.to_ascii_uppercase())
    }

    /// Every command of a module serving an action keyword, in file order
    pub fn commands_for(&self, module: &str, action: &str) -> Vec<&CommandTemplate> {
        let module = module.to_ascii_uppercase();
        self.command_order
            .iter()
            .filter_map(|id| self.commands.get(id))
            .filter(|cmd| cmd.module == module && action_matches(&cmd.action, action))
            .collect()
    }

    /// First DTC rule covering a decoded code, in file order
    pub fn dtc_rule_for(&self, code: &str) -> Option<&DtcRule> {
        self.dtc_rules.iter().find(|rule| rule.covers(code))
    }

    /// Response rules declared for a command, in file order
    pub fn response_rules_for(&self, command_id: &str) -> Vec<&ResponseRule> {
        let command_id = command_id.to_ascii_uppercase();
        self.response_rules
            .iter()
            .filter(|rule| rule.command_id == command_id)
            .collect()
    }

    /// Bit mappings declared for a signal id, in file order
    pub fn bit_mappings_for(&self, id: &str) -> Vec<&BitMapping> {
        let id = id.to_ascii_uppercase();
        self.bit_mappings
            .iter()
            .filter(|mapping| mapping.id == id)
            .collect()
    }

    /// Modules in file order
    pub fn modules(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.module_order
            .iter()
            .filter_map(|name| self.modules.get(name))
    }

    /// Commands in file order
    pub fn commands(&self) -> impl Iterator<Item = &CommandTemplate> {
        self.command_order
            .iter()
            .filter_map(|id| self.commands.get(id))
    }

    /// Append one record line to a fact-base file
    ///
    /// The line must parse as a known record type; existing lines are never
    /// rewritten. The in-memory store stays as loaded — callers re-parse to
    /// pick the record up.
    pub fn append_record(path: impl AsRef<Path>, line: &str) -> Result<(), ParseError> {
        let parsed = parse_source(line)?;
        if parsed.record_count() == 0 {
            return Err(ParseError::BadValue {
                line: 1,
                field: "TYPE",
                value: line.to_string(),
            });
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        writeln!(file, "{}", line.trim())?;
        debug!(path = %path.as_ref().display(), "knowledge record appended");
        Ok(())
    }

    fn record_count(&self) -> usize {
        self.module_order.len()
            + self.command_order.len()
            + self.dtc_rules.len()
            + self.response_rules.len()
            + self.bit_mappings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vdiag_core::{Bus, Protocol};

    const SAMPLE: &str = "\
# vehicle: COROLLA_2015
MODULE:ENGINE ADDRESS:7E0 PROTOCOL:standard_obd BUS:can
MODULE:HVAC ADDRESS:7B0 PROTOCOL:uds BUS:can
COMMAND:ENGINE.READ_DTC SERVICE:03 PROTOCOL:standard_obd
COMMAND:ENGINE.READ_DTC_UDS SERVICE:19 SUB:02 MASK:FF PROTOCOL:uds ACTION:READ_DTC
COMMAND:ENGINE.COOLANT_TEMP SERVICE:01 PID:05 PROTOCOL:standard_obd
COMMAND:HVAC.READ_DTC SERVICE:19 SUB:02 MASK:FF PROTOCOL:uds
DTC_RULE:P01 SYSTEM:fuel_air_metering DESC:Fuel_and_air_metering
RESPONSE_RULE:ENGINE.COOLANT_TEMP MATCH:4105 EXTRACT:A CALC:A-40 UNIT:C
BIT_MAPPING:ENGINE.STATUS BIT:7 NAME:mil_on
";

    #[test]
    fn test_parse_sample() {
        let kb = KnowledgeBase::parse(SAMPLE).unwrap();

        let engine = kb.module("engine").unwrap();
        assert_eq!(engine.address, 0x7E0);
        assert_eq!(engine.protocol, Protocol::StandardObd);
        assert_eq!(engine.bus, Bus::Can);

        let command = kb.command("ENGINE.COOLANT_TEMP").unwrap();
        assert_eq!(command.service, 0x01);
        assert_eq!(command.pid, Some(0x05));

        assert_eq!(kb.response_rules_for("engine.coolant_temp").len(), 1);
        assert_eq!(kb.bit_mappings_for("ENGINE.STATUS").len(), 1);
    }

    #[test]
    fn test_commands_for_uses_file_order_and_synonyms() {
        let kb = KnowledgeBase::parse(SAMPLE).unwrap();

        let commands = kb.commands_for("ENGINE", "read_codes");
        assert_eq!(commands.len(), 2);
        // Ties resolve first-match-in-file-order
        assert_eq!(commands[0].id, "ENGINE.READ_DTC");
        assert_eq!(commands[1].id, "ENGINE.READ_DTC_UDS");

        assert!(kb.commands_for("ENGINE", "OPEN_SUNROOF").is_empty());
        assert!(kb.commands_for("GEARBOX", "READ_DTC").is_empty());
    }

    #[test]
    fn test_action_matches_is_total() {
        assert!(action_matches("READ_DTC", "read dtc"));
        assert!(action_matches("READ_DTC", "trouble-codes"));
        assert!(action_matches("COOLANT_TEMP", "engine temp"));
        assert!(!action_matches("READ_DTC", "CLEAR_DTC"));
        assert!(!action_matches("", "READ_DTC"));
        assert!(action_matches("", ""));
    }

    #[test]
    fn test_unknown_record_type_skipped() {
        let kb = KnowledgeBase::parse(
            "ACTUATOR_MAP:ENGINE.FAN CHANNEL:2\n\
             MODULE:ENGINE ADDRESS:7E0\n",
        )
        .unwrap();
        assert!(kb.module("ENGINE").is_some());
    }

    #[test]
    fn test_missing_required_field_names_line() {
        let err = KnowledgeBase::parse(
            "MODULE:ENGINE ADDRESS:7E0\n\
             COMMAND:ENGINE.READ_DTC PROTOCOL:standard_obd\n",
        )
        .unwrap_err();
        match err {
            ParseError::MissingField { line, record, field } => {
                assert_eq!(line, 2);
                assert_eq!(record, "COMMAND");
                assert_eq!(field, "SERVICE");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_keys_first_occurrence_wins() {
        let kb = KnowledgeBase::parse(
            "MODULE:ENGINE ADDRESS:7E0\n\
             MODULE:ENGINE ADDRESS:7E1\n",
        )
        .unwrap();
        assert_eq!(kb.module("ENGINE").unwrap().address, 0x7E0);
        assert_eq!(kb.modules().count(), 1);
    }

    #[test]
    fn test_calc_referencing_unextracted_byte_fails_load() {
        let err = KnowledgeBase::parse(
            "RESPONSE_RULE:ENGINE.RPM MATCH:410C EXTRACT:A CALC:(A*256+B)/4\n",
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::BadExpression { line: 1, .. }));
    }

    #[test]
    fn test_append_yields_strict_superset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vehicle.kb");
        std::fs::write(&path, SAMPLE).unwrap();

        let before = KnowledgeBase::load(&path).unwrap();
        KnowledgeBase::append_record(
            &path,
            "COMMAND:HVAC.BLOWER_STATE SERVICE:22 DID:2101 PROTOCOL:uds",
        )
        .unwrap();

        let after = KnowledgeBase::load(&path).unwrap();
        // Everything present before is still present...
        for command in before.commands() {
            assert_eq!(after.command(&command.id), Some(command));
        }
        for module in before.modules() {
            assert_eq!(after.module(&module.name), Some(module));
        }
        // ...plus the appended record
        assert!(after.command("HVAC.BLOWER_STATE").is_some());
        assert_eq!(after.commands().count(), before.commands().count() + 1);
    }

    #[test]
    fn test_append_rejects_malformed_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vehicle.kb");
        std::fs::write(&path, SAMPLE).unwrap();

        assert!(KnowledgeBase::append_record(&path, "COMMAND:NO_DOT SERVICE:22").is_err());
        assert!(KnowledgeBase::append_record(&path, "WIRING:ENGINE PIN:4").is_err());

        // The file is untouched by rejected appends
        let after = KnowledgeBase::load(&path).unwrap();
        assert_eq!(after.commands().count(), 4);
    }
}
