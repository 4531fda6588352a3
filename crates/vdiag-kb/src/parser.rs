//! Line-oriented knowledge base parser
//!
//! One record per line, `TYPE:value KEY:value …`, `#` for comment and
//! metadata lines. Unknown record types are skipped so newer fact bases
//! still load; a malformed record of a known type fails the whole parse,
//! naming the offending line. Values cannot contain whitespace; record
//! authors use underscores.

use std::str::FromStr;

use tracing::debug;
use vdiag_core::{Bus, ModuleDescriptor, Protocol};

use crate::error::ParseError;
use crate::expr::CalcExpr;
use crate::record::{BitMapping, CommandTemplate, DtcRule, ResponseRule};
use crate::store::KnowledgeBase;

pub(crate) fn parse_source(source: &str) -> Result<KnowledgeBase, ParseError> {
    let mut kb = KnowledgeBase::empty();

    for (idx, raw_line) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields = Fields::tokenize(line, line_no)?;
        match fields.record_type() {
            "MODULE" => kb.insert_module(parse_module(&fields)?),
            "COMMAND" => kb.insert_command(parse_command(&fields)?),
            "DTC_RULE" => kb.insert_dtc_rule(parse_dtc_rule(&fields)?),
            "RESPONSE_RULE" => kb.insert_response_rule(parse_response_rule(&fields)?),
            "BIT_MAPPING" => kb.insert_bit_mapping(parse_bit_mapping(&fields)?),
            other => {
                debug!(line = line_no, record_type = other, "skipping unknown record type");
            }
        }
    }

    Ok(kb)
}

/// Tokenized `KEY:value` fields of one record line
struct Fields<'a> {
    line: usize,
    /// First token, upper-cased key and raw value
    head: (String, &'a str),
    rest: Vec<(String, &'a str)>,
}

impl<'a> Fields<'a> {
    fn tokenize(line: &'a str, line_no: usize) -> Result<Self, ParseError> {
        let mut pairs = Vec::new();
        for token in line.split_whitespace() {
            let (key, value) = token.split_once(':').ok_or_else(|| ParseError::BadToken {
                line: line_no,
                token: token.to_string(),
            })?;
            pairs.push((key.to_ascii_uppercase(), value));
        }
        // split_whitespace on a non-empty trimmed line yields at least one token
        let head = pairs.remove(0);
        Ok(Self {
            line: line_no,
            head,
            rest: pairs,
        })
    }

    fn record_type(&self) -> &str {
        &self.head.0
    }

    fn record_value(&self) -> &'a str {
        self.head.1
    }

    fn get(&self, key: &str) -> Option<&'a str> {
        self.rest
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }

    fn require(&self, record: &'static str, key: &'static str) -> Result<&'a str, ParseError> {
        self.get(key).ok_or(ParseError::MissingField {
            line: self.line,
            record,
            field: key,
        })
    }

    fn bad_value(&self, field: &'static str, value: &str) -> ParseError {
        ParseError::BadValue {
            line: self.line,
            field,
            value: value.to_string(),
        }
    }

    fn hex<T: HexField>(&self, field: &'static str, value: &str) -> Result<T, ParseError> {
        T::parse_hex(value).ok_or_else(|| self.bad_value(field, value))
    }

    fn optional_hex<T: HexField>(&self, field: &'static str) -> Result<Option<T>, ParseError> {
        self.get(field)
            .map(|value| self.hex(field, value))
            .transpose()
    }
}

trait HexField: Sized {
    fn parse_hex(value: &str) -> Option<Self>;
}

macro_rules! hex_field {
    ($($ty:ty),*) => {
        $(impl HexField for $ty {
            fn parse_hex(value: &str) -> Option<Self> {
                let value = value.trim_start_matches("0x").trim_start_matches("0X");
                <$ty>::from_str_radix(value, 16).ok()
            }
        })*
    };
}

hex_field!(u8, u16, u32);

fn parse_module(fields: &Fields<'_>) -> Result<ModuleDescriptor, ParseError> {
    let name = fields.record_value().to_ascii_uppercase();
    if name.is_empty() {
        return Err(fields.bad_value("MODULE", ""));
    }

    let address_text = fields.require("MODULE", "ADDRESS")?;
    let address: u16 = fields.hex("ADDRESS", address_text)?;

    let protocol = match fields.get("PROTOCOL") {
        Some(text) => Protocol::from_str(text).map_err(|_| fields.bad_value("PROTOCOL", text))?,
        None => Protocol::StandardObd,
    };
    let bus = match fields.get("BUS") {
        Some(text) => Bus::from_str(text).map_err(|_| fields.bad_value("BUS", text))?,
        None => Bus::Can,
    };

    Ok(ModuleDescriptor {
        name,
        address,
        protocol,
        bus,
    })
}

fn parse_command(fields: &Fields<'_>) -> Result<CommandTemplate, ParseError> {
    let id = fields.record_value().to_ascii_uppercase();
    let Some((module, name)) = id.split_once('.') else {
        return Err(fields.bad_value("COMMAND", &id));
    };
    if module.is_empty() || name.is_empty() {
        return Err(fields.bad_value("COMMAND", &id));
    }
    let module = module.to_string();
    let name = name.to_string();

    let service_text = fields.require("COMMAND", "SERVICE")?;
    let service: u8 = fields.hex("SERVICE", service_text)?;

    let action = fields
        .get("ACTION")
        .map(|a| a.to_ascii_uppercase())
        .unwrap_or_else(|| name.clone());

    let protocol = match fields.get("PROTOCOL") {
        Some(text) => Protocol::from_str(text).map_err(|_| fields.bad_value("PROTOCOL", text))?,
        None => Protocol::StandardObd,
    };

    Ok(CommandTemplate {
        id,
        module,
        action,
        protocol,
        service,
        pid: fields.optional_hex("PID")?,
        did: fields.optional_hex("DID")?,
        sub_function: fields.optional_hex("SUB")?,
        status_mask: fields.optional_hex("MASK")?,
        group: fields.optional_hex("GROUP")?,
        routine: fields.optional_hex("ROUTINE")?,
        ioid: fields.optional_hex("IOID")?,
        level: fields.optional_hex("LEVEL")?,
    })
}

fn parse_dtc_rule(fields: &Fields<'_>) -> Result<DtcRule, ParseError> {
    let prefix = fields.record_value().to_ascii_uppercase();
    if prefix.is_empty() || !prefix.starts_with(['P', 'C', 'B', 'U']) {
        return Err(fields.bad_value("DTC_RULE", &prefix));
    }

    Ok(DtcRule {
        prefix,
        system: fields.require("DTC_RULE", "SYSTEM")?.to_string(),
        description: fields.get("DESC").map(str::to_string),
    })
}

fn parse_response_rule(fields: &Fields<'_>) -> Result<ResponseRule, ParseError> {
    let command_id = fields.record_value().to_ascii_uppercase();
    let Some((_, name)) = command_id.split_once('.') else {
        return Err(fields.bad_value("RESPONSE_RULE", &command_id));
    };
    let name = name.to_string();

    let pattern = fields.require("RESPONSE_RULE", "MATCH")?.to_ascii_uppercase();
    if pattern.is_empty()
        || pattern.len() % 2 != 0
        || !pattern.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(fields.bad_value("MATCH", &pattern));
    }

    let extract_count = match fields.get("EXTRACT") {
        Some(list) => parse_extract(fields, list)?,
        None => 1,
    };

    let calc = fields
        .get("CALC")
        .map(|text| {
            CalcExpr::parse(text).map_err(|reason| ParseError::BadExpression {
                line: fields.line,
                reason,
            })
        })
        .transpose()?;

    if let Some(max_var) = calc.as_ref().and_then(CalcExpr::max_var) {
        if max_var >= extract_count {
            return Err(ParseError::BadExpression {
                line: fields.line,
                reason: format!(
                    "references byte {} but only {extract_count} extracted",
                    (b'A' + max_var as u8) as char
                ),
            });
        }
    }

    Ok(ResponseRule {
        command_id,
        match_pattern: pattern,
        extract_count,
        calc,
        unit: fields.get("UNIT").map(str::to_string),
        name: fields
            .get("NAME")
            .map(|n| n.to_ascii_uppercase())
            .unwrap_or(name),
    })
}

/// `EXTRACT:A,B,C` names the payload bytes bound for calculation; the
/// letters must be consecutive from `A`.
fn parse_extract(fields: &Fields<'_>, list: &str) -> Result<usize, ParseError> {
    let letters: Vec<&str> = list.split(',').collect();
    for (i, letter) in letters.iter().enumerate() {
        let expected = (b'A' + i as u8) as char;
        if letter.trim().to_ascii_uppercase() != expected.to_string() {
            return Err(fields.bad_value("EXTRACT", list));
        }
    }
    if letters.is_empty() || letters.len() > 8 {
        return Err(fields.bad_value("EXTRACT", list));
    }
    Ok(letters.len())
}

fn parse_bit_mapping(fields: &Fields<'_>) -> Result<BitMapping, ParseError> {
    let id = fields.record_value().to_ascii_uppercase();
    if id.is_empty() {
        return Err(fields.bad_value("BIT_MAPPING", &id));
    }

    let bit_text = fields.require("BIT_MAPPING", "BIT")?;
    let bit: u8 = bit_text
        .parse()
        .ok()
        .filter(|b| *b < 8)
        .ok_or_else(|| fields.bad_value("BIT", bit_text))?;

    Ok(BitMapping {
        id,
        bit,
        name: fields.require("BIT_MAPPING", "NAME")?.to_string(),
    })
}
