//! TEXT decoder driven by type descriptors
//!
//! Matching is regular-expression based. Tokens are matched anchored at
//! the read position; free-form content (charstrings) runs until the
//! nearest enclosing boundary token.

use regex::Regex;
use ttcn3_value::descriptor::{FieldDescriptor, TypeDescriptor, TypeKind};
use ttcn3_value::error::{CodecError, CodecResult, ErrorPolicy};
use ttcn3_value::value::{IntegerValue, Record, RecordOf, Value};

use super::{require_text, token_pattern};

const INTEGER_PATTERN: &str = "[+-]?[0-9]+";
const FLOAT_PATTERN: &str =
    "[+-]?(?:infinity|not_a_number|[0-9]+(?:\\.[0-9]+)?(?:[eE][+-]?[0-9]+)?)";
const BOOLEAN_PATTERN: &str = "(?i:true|false)";
const OCTETS_PATTERN: &str = "(?:[0-9A-Fa-f]{2})*";

/// TEXT decoder over a character buffer
pub struct TextDecoder<'a> {
    input: &'a str,
    pos: usize,
    policy: &'a ErrorPolicy,
}

impl<'a> TextDecoder<'a> {
    pub fn new(input: &'a str, policy: &'a ErrorPolicy) -> Self {
        Self {
            input,
            pos: 0,
            policy,
        }
    }

    pub fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    pub fn has_remaining(&self) -> bool {
        self.pos < self.input.len()
    }

    /// Decode one value; `stop` is the boundary pattern of the enclosing
    /// structure, used to delimit free-form content
    pub fn decode(
        &mut self,
        descriptor: &'static TypeDescriptor,
        stop: Option<&str>,
    ) -> CodecResult<Value> {
        let text = require_text(descriptor)?;
        if let Some(token) = &text.begin {
            self.expect_pattern(&token_pattern(token), descriptor)?;
        }
        let end_pattern = text.end.as_ref().map(|t| token_pattern(t));
        let inner_stop = end_pattern.as_deref().or(stop);

        let value = match &descriptor.kind {
            TypeKind::Boolean => {
                let matched = self.expect_pattern(BOOLEAN_PATTERN, descriptor)?;
                Value::Boolean(matched.eq_ignore_ascii_case("true"))
            }
            TypeKind::Integer => {
                let matched = self.expect_pattern(INTEGER_PATTERN, descriptor)?;
                let parsed = IntegerValue::parse(matched).ok_or_else(|| {
                    CodecError::InvalidData(format!("unparsable integer {:?}", matched))
                })?;
                Value::Integer(parsed)
            }
            TypeKind::Float => {
                let matched = self.expect_pattern(FLOAT_PATTERN, descriptor)?;
                Value::Float(parse_float(matched)?)
            }
            TypeKind::CharString => Value::from(self.take_until(inner_stop)?),
            TypeKind::OctetString => {
                let matched = self.expect_pattern(OCTETS_PATTERN, descriptor)?;
                let mut octets = Vec::with_capacity(matched.len() / 2);
                for i in (0..matched.len()).step_by(2) {
                    let octet = u8::from_str_radix(&matched[i..i + 2], 16).map_err(|_| {
                        CodecError::Internal("hex pattern matched non-hex text".to_string())
                    })?;
                    octets.push(octet);
                }
                Value::from(octets)
            }
            TypeKind::Record { fields, is_set } => {
                let separator = text.separator.as_ref().map(|t| token_pattern(t));
                if *is_set {
                    self.decode_set(fields, descriptor, separator.as_deref(), inner_stop)?
                } else {
                    self.decode_sequence(fields, descriptor, separator.as_deref(), inner_stop)?
                }
            }
            TypeKind::RecordOf { element, .. } => {
                let separator = text.separator.as_ref().map(|t| token_pattern(t));
                self.decode_record_of(element, separator.as_deref(), inner_stop)?
            }
            TypeKind::Empty => Value::EmptyRecord,
        };

        if let Some(pattern) = &end_pattern {
            self.expect_pattern(pattern, descriptor)?;
        }
        Ok(value)
    }

    fn decode_sequence(
        &mut self,
        fields: &'static [FieldDescriptor],
        descriptor: &'static TypeDescriptor,
        separator: Option<&str>,
        stop: Option<&str>,
    ) -> CodecResult<Value> {
        let mut record = Record::new(fields.len());
        let mut any_decoded = false;
        for (index, field_descr) in fields.iter().enumerate() {
            let snapshot = self.pos;
            let boundary = boundary_pattern(separator, stop);
            let result = (|| -> CodecResult<Value> {
                if any_decoded {
                    if let Some(sep) = separator {
                        self.expect_pattern(sep, descriptor)?;
                    }
                }
                self.decode(field_descr.ty, boundary.as_deref())
            })();
            match result {
                Ok(value) => {
                    record.set_field(index, value)?;
                    any_decoded = true;
                }
                Err(_) if field_descr.optional => {
                    self.pos = snapshot;
                    record.set_field(index, Value::Omitted)?;
                }
                Err(error) => return Err(error),
            }
        }
        Ok(Value::Record(record))
    }

    /// Set fields arrive in any order; keep trying undecoded fields
    /// until a full pass makes no progress
    fn decode_set(
        &mut self,
        fields: &'static [FieldDescriptor],
        descriptor: &'static TypeDescriptor,
        separator: Option<&str>,
        stop: Option<&str>,
    ) -> CodecResult<Value> {
        let mut record = Record::new(fields.len());
        let mut decoded = vec![false; fields.len()];
        let mut any_decoded = false;
        loop {
            let mut progressed = false;
            for (index, field_descr) in fields.iter().enumerate() {
                let repeatable = field_descr
                    .ty
                    .text
                    .is_some_and(|t| t.repeatable)
                    && field_descr.ty.is_record_of();
                if decoded[index] && !repeatable {
                    continue;
                }
                let snapshot = self.pos;
                let boundary = boundary_pattern(separator, stop);
                let result = (|| -> CodecResult<Value> {
                    if any_decoded {
                        if let Some(sep) = separator {
                            self.expect_pattern(sep, descriptor)?;
                        }
                    }
                    self.decode(field_descr.ty, boundary.as_deref())
                })();
                match result {
                    Ok(value) => {
                        if decoded[index] && repeatable {
                            // A repeatable sequence field accumulates
                            // across appearances
                            let earlier = record.get_field(index)?.as_record_of()?.clone();
                            let merged = earlier.concat(value.as_record_of()?);
                            record.set_field(index, Value::RecordOf(merged))?;
                        } else {
                            record.set_field(index, value)?;
                        }
                        decoded[index] = true;
                        any_decoded = true;
                        progressed = true;
                        break;
                    }
                    Err(_) => {
                        self.pos = snapshot;
                    }
                }
            }
            if !progressed {
                break;
            }
        }
        for (index, field_descr) in fields.iter().enumerate() {
            if decoded[index] {
                continue;
            }
            let value = if field_descr.optional {
                Value::Omitted
            } else if let Some(default) = field_descr.default {
                default()
            } else {
                self.policy.dispatch(CodecError::Incomplete(format!(
                    "mandatory field {} of {} is missing",
                    field_descr.name, descriptor.name
                )))?;
                Value::Unbound
            };
            record.set_field(index, value)?;
        }
        Ok(Value::Record(record))
    }

    fn decode_record_of(
        &mut self,
        element: &'static TypeDescriptor,
        separator: Option<&str>,
        stop: Option<&str>,
    ) -> CodecResult<Value> {
        let mut sequence = RecordOf::new();
        let mut index = 0;
        loop {
            let snapshot = self.pos;
            let boundary = boundary_pattern(separator, stop);
            let result = (|| -> CodecResult<Value> {
                if index > 0 {
                    if let Some(sep) = separator {
                        self.expect_pattern(sep, element)?;
                    }
                }
                self.decode(element, boundary.as_deref())
            })();
            match result {
                Ok(value) => {
                    *sequence.get_at_mut(index)? = value;
                    index += 1;
                }
                Err(_) => {
                    self.pos = snapshot;
                    break;
                }
            }
        }
        Ok(Value::RecordOf(sequence))
    }

    /// Match a pattern anchored at the read position
    fn expect_pattern(
        &mut self,
        pattern: &str,
        descriptor: &'static TypeDescriptor,
    ) -> CodecResult<&'a str> {
        let regex = anchored(pattern)?;
        match regex.find(self.remaining()) {
            Some(found) if found.start() == 0 => {
                let matched = &self.remaining()[..found.end()];
                self.pos += found.end();
                Ok(matched)
            }
            _ => Err(CodecError::InvalidToken(format!(
                "type {} expects /{}/ at {:?}",
                descriptor.name,
                pattern,
                truncate(self.remaining())
            ))),
        }
    }

    /// Consume text up to the first occurrence of `stop`, or all of it
    fn take_until(&mut self, stop: Option<&str>) -> CodecResult<&'a str> {
        let content = match stop {
            Some(pattern) => {
                let regex = Regex::new(pattern).map_err(|e| {
                    CodecError::Internal(format!("bad boundary pattern /{}/: {}", pattern, e))
                })?;
                match regex.find(self.remaining()) {
                    Some(found) => &self.remaining()[..found.start()],
                    None => self.remaining(),
                }
            }
            None => self.remaining(),
        };
        self.pos += content.len();
        Ok(content)
    }
}

fn anchored(pattern: &str) -> CodecResult<Regex> {
    Regex::new(&format!("^(?:{})", pattern))
        .map_err(|e| CodecError::Internal(format!("bad token pattern /{}/: {}", pattern, e)))
}

/// Alternation of separator and end patterns, whichever exist
fn boundary_pattern(separator: Option<&str>, stop: Option<&str>) -> Option<String> {
    match (separator, stop) {
        (Some(sep), Some(stop)) => Some(format!("(?:{})|(?:{})", sep, stop)),
        (Some(sep), None) => Some(sep.to_string()),
        (None, Some(stop)) => Some(stop.to_string()),
        (None, None) => None,
    }
}

fn parse_float(text: &str) -> CodecResult<f64> {
    match text.trim_start_matches('+') {
        "infinity" => Ok(f64::INFINITY),
        "-infinity" => Ok(f64::NEG_INFINITY),
        "not_a_number" | "-not_a_number" => Ok(f64::NAN),
        other => other
            .parse::<f64>()
            .map_err(|_| CodecError::InvalidData(format!("unparsable float {:?}", text))),
    }
}

fn truncate(text: &str) -> &str {
    let end = text
        .char_indices()
        .nth(24)
        .map_or(text.len(), |(pos, _)| pos);
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ttcn3_value::descriptor::text::{TextDescriptor, TextToken};
    use ttcn3_value::descriptor::{self, FieldDescriptor, TypeDescriptor, TypeKind};

    static KEYED_INT_TEXT: TextDescriptor = TextDescriptor {
        begin: Some(TextToken::Literal("id=")),
        ..TextDescriptor::PLAIN
    };

    static KEYED_INT: TypeDescriptor = TypeDescriptor {
        name: "KeyedInt",
        kind: TypeKind::Integer,
        ber: None,
        raw: None,
        text: Some(&KEYED_INT_TEXT),
        xer: None,
        json: None,
    };

    static KEYED_NAME_TEXT: TextDescriptor = TextDescriptor {
        begin: Some(TextToken::Literal("name=")),
        ..TextDescriptor::PLAIN
    };

    static KEYED_NAME: TypeDescriptor = TypeDescriptor {
        name: "KeyedName",
        kind: TypeKind::CharString,
        ber: None,
        raw: None,
        text: Some(&KEYED_NAME_TEXT),
        xer: None,
        json: None,
    };

    static PAIR_TEXT: TextDescriptor = TextDescriptor {
        begin: Some(TextToken::Literal("{")),
        end: Some(TextToken::Literal("}")),
        separator: Some(TextToken::Literal(";")),
        ..TextDescriptor::PLAIN
    };

    static PAIR_SET: TypeDescriptor = TypeDescriptor {
        name: "PairSet",
        kind: TypeKind::Record {
            fields: &[
                FieldDescriptor {
                    name: "id",
                    ty: &KEYED_INT,
                    optional: false,
                    default: None,
                },
                FieldDescriptor {
                    name: "name",
                    ty: &KEYED_NAME,
                    optional: false,
                    default: None,
                },
            ],
            is_set: true,
        },
        ber: None,
        raw: None,
        text: Some(&PAIR_TEXT),
        xer: None,
        json: None,
    };

    static KEYED_MARK_TEXT: TextDescriptor = TextDescriptor {
        begin: Some(TextToken::Literal("mark=")),
        ..TextDescriptor::PLAIN
    };

    static KEYED_MARK: TypeDescriptor = TypeDescriptor {
        name: "KeyedMark",
        kind: TypeKind::Integer,
        ber: None,
        raw: None,
        text: Some(&KEYED_MARK_TEXT),
        xer: None,
        json: None,
    };

    static OPTION_SET: TypeDescriptor = TypeDescriptor {
        name: "OptionSet",
        kind: TypeKind::Record {
            fields: &[
                FieldDescriptor {
                    name: "id",
                    ty: &KEYED_INT,
                    optional: false,
                    default: None,
                },
                FieldDescriptor {
                    name: "name",
                    ty: &KEYED_NAME,
                    optional: true,
                    default: None,
                },
                FieldDescriptor {
                    name: "mark",
                    ty: &KEYED_MARK,
                    optional: true,
                    default: None,
                },
            ],
            is_set: true,
        },
        ber: None,
        raw: None,
        text: Some(&PAIR_TEXT),
        xer: None,
        json: None,
    };

    static CSV_TEXT: TextDescriptor = TextDescriptor {
        separator: Some(TextToken::Literal(",")),
        ..TextDescriptor::PLAIN
    };

    static CSV_INTS: TypeDescriptor = TypeDescriptor {
        name: "CsvInts",
        kind: TypeKind::RecordOf {
            element: &descriptor::INTEGER,
            is_set_of: false,
        },
        ber: None,
        raw: None,
        text: Some(&CSV_TEXT),
        xer: None,
        json: None,
    };

    #[test]
    fn test_scalar_roundtrip() {
        let policy = ErrorPolicy::new();
        let encoded =
            super::super::encode(&Value::from(-17i64), &descriptor::INTEGER, &policy, None)
                .unwrap();
        assert_eq!(encoded, b"-17");
        let decoded = super::super::decode(&encoded, &descriptor::INTEGER, &policy).unwrap();
        assert_eq!(decoded.as_i64().unwrap(), -17);
    }

    #[test]
    fn test_csv_record_of_roundtrip() {
        let value = Value::RecordOf(ttcn3_value::value::RecordOf::from_elements(vec![
            Value::from(1i64),
            Value::from(2i64),
            Value::from(3i64),
        ]));
        let policy = ErrorPolicy::new();
        let encoded = super::super::encode(&value, &CSV_INTS, &policy, None).unwrap();
        assert_eq!(encoded, b"1,2,3");
        let decoded = super::super::decode(&encoded, &CSV_INTS, &policy).unwrap();
        assert!(decoded.is_equal(&value));
    }

    #[test]
    fn test_set_fields_decode_in_any_order() {
        let policy = ErrorPolicy::new();
        let decoded =
            super::super::decode(b"{name=alice;id=7}", &PAIR_SET, &policy).unwrap();
        let record = decoded.as_record().unwrap();
        assert_eq!(record.get_field(0).unwrap().as_i64().unwrap(), 7);
        assert_eq!(record.get_field(1).unwrap().as_str().unwrap(), "alice");
    }

    #[test]
    fn test_set_with_untried_optional_backtracks() {
        let policy = ErrorPolicy::new();

        let decoded =
            super::super::decode(b"{id=7;name=alice}", &OPTION_SET, &policy).unwrap();
        let record = decoded.as_record().unwrap();
        assert_eq!(record.get_field(0).unwrap().as_i64().unwrap(), 7);
        assert_eq!(record.get_field(1).unwrap().as_str().unwrap(), "alice");
        assert!(matches!(record.get_field(2).unwrap(), Value::Omitted));

        // The optional arriving first forces a failed attempt at each
        // earlier field before it matches
        let decoded = super::super::decode(b"{mark=3;id=7}", &OPTION_SET, &policy).unwrap();
        let record = decoded.as_record().unwrap();
        assert_eq!(record.get_field(0).unwrap().as_i64().unwrap(), 7);
        assert!(matches!(record.get_field(1).unwrap(), Value::Omitted));
        assert_eq!(record.get_field(2).unwrap().as_i64().unwrap(), 3);
    }

    #[test]
    fn test_missing_set_field_is_incomplete() {
        let policy = ErrorPolicy::new();
        let result = super::super::decode(b"{id=7}", &PAIR_SET, &policy);
        assert!(matches!(result.unwrap_err(), CodecError::Incomplete(_)));
    }

    #[test]
    fn test_octetstring_hex() {
        let policy = ErrorPolicy::new();
        let encoded = super::super::encode(
            &Value::from(vec![0xDE, 0xAD]),
            &descriptor::OCTETSTRING,
            &policy,
            None,
        )
        .unwrap();
        assert_eq!(encoded, b"DEAD");
        let decoded =
            super::super::decode(&encoded, &descriptor::OCTETSTRING, &policy).unwrap();
        assert_eq!(decoded.as_octets().unwrap(), &[0xDE, 0xAD]);
    }
}
