//! JSON decoder driven by type descriptors

use ttcn3_value::descriptor::{FieldDescriptor, TypeDescriptor, TypeKind};
use ttcn3_value::error::{CodecError, CodecResult, ErrorPolicy};
use ttcn3_value::value::{IntegerValue, Record, RecordOf, Value};

use super::tokenizer::{JsonToken, JsonTokenizer};
use super::{parse_hex, require_json};

/// JSON decoder pulling tokens from a JSON text
pub struct JsonDecoder<'a> {
    lexer: JsonTokenizer<'a>,
    policy: &'a ErrorPolicy,
}

impl<'a> JsonDecoder<'a> {
    pub fn new(input: &'a str, policy: &'a ErrorPolicy) -> Self {
        Self {
            lexer: JsonTokenizer::new(input),
            policy,
        }
    }

    pub fn decode(&mut self, descriptor: &'static TypeDescriptor) -> CodecResult<Value> {
        require_json(descriptor)?;
        match &descriptor.kind {
            TypeKind::Boolean => match self.next_token(descriptor)? {
                JsonToken::True => Ok(Value::Boolean(true)),
                JsonToken::False => Ok(Value::Boolean(false)),
                other => Err(self.type_error(descriptor, &other)),
            },
            TypeKind::Integer => match self.next_token(descriptor)? {
                JsonToken::Number(text) => {
                    if text.contains(['.', 'e', 'E']) {
                        return Err(CodecError::InvalidData(format!(
                            "number {} is not an integer",
                            text
                        )));
                    }
                    IntegerValue::parse(&text).map(Value::Integer).ok_or_else(|| {
                        CodecError::InvalidData(format!("unparsable integer {:?}", text))
                    })
                }
                other => Err(self.type_error(descriptor, &other)),
            },
            TypeKind::Float => match self.next_token(descriptor)? {
                JsonToken::Number(text) => {
                    let value = text.parse::<f64>().map_err(|_| {
                        CodecError::InvalidData(format!("unparsable float {:?}", text))
                    })?;
                    Ok(Value::Float(value))
                }
                JsonToken::String(text) => match text.as_str() {
                    "infinity" => Ok(Value::Float(f64::INFINITY)),
                    "-infinity" => Ok(Value::Float(f64::NEG_INFINITY)),
                    "not_a_number" => Ok(Value::Float(f64::NAN)),
                    other => Err(CodecError::InvalidData(format!(
                        "{:?} is not a float value",
                        other
                    ))),
                },
                other => Err(self.type_error(descriptor, &other)),
            },
            TypeKind::CharString => match self.next_token(descriptor)? {
                JsonToken::String(text) => Ok(Value::from(text)),
                other => Err(self.type_error(descriptor, &other)),
            },
            TypeKind::OctetString => match self.next_token(descriptor)? {
                JsonToken::String(text) => Ok(Value::from(parse_hex(&text)?)),
                other => Err(self.type_error(descriptor, &other)),
            },
            TypeKind::Record { fields, .. } => self.decode_record(descriptor, fields),
            TypeKind::RecordOf { element, .. } => {
                match self.next_token(descriptor)? {
                    JsonToken::ArrayStart => {}
                    other => return Err(self.type_error(descriptor, &other)),
                }
                let element_json = require_json(element)?;
                let mut sequence = RecordOf::new();
                let mut index = 0;
                loop {
                    match self.lexer.peek()? {
                        Some(JsonToken::ArrayEnd) => {
                            self.lexer.next()?;
                            break;
                        }
                        Some(_) => {
                            let value = if element_json.metainfo_unbound
                                && self.unbound_element_marker()?
                            {
                                Value::Unbound
                            } else {
                                self.decode(element)?
                            };
                            *sequence.get_at_mut(index)? = value;
                            index += 1;
                        }
                        None => {
                            return Err(CodecError::Incomplete(format!(
                                "array of type {} is not closed",
                                descriptor.name
                            )));
                        }
                    }
                }
                Ok(Value::RecordOf(sequence))
            }
            TypeKind::Empty => {
                match self.next_token(descriptor)? {
                    JsonToken::ObjectStart => {}
                    other => return Err(self.type_error(descriptor, &other)),
                }
                loop {
                    match self.next_token(descriptor)? {
                        JsonToken::ObjectEnd => break,
                        JsonToken::Name(name) => {
                            self.policy.dispatch(CodecError::Superfluous(format!(
                                "member {:?} in empty record type {}",
                                name, descriptor.name
                            )))?;
                            self.skip_value(descriptor)?;
                        }
                        other => return Err(self.type_error(descriptor, &other)),
                    }
                }
                Ok(Value::EmptyRecord)
            }
        }
    }

    /// Check that nothing follows the decoded value
    pub fn finish(&mut self) -> CodecResult<()> {
        if let Some(token) = self.lexer.next()? {
            self.policy.dispatch(CodecError::Superfluous(format!(
                "content after the end of the message: {:?}",
                token
            )))?;
        }
        Ok(())
    }

    fn decode_record(
        &mut self,
        descriptor: &'static TypeDescriptor,
        fields: &'static [FieldDescriptor],
    ) -> CodecResult<Value> {
        let json = require_json(descriptor)?;
        if json.as_value && fields.len() == 1 {
            let inner = self.decode(fields[0].ty)?;
            return Ok(Value::Record(Record::from_fields(vec![inner])));
        }

        match self.next_token(descriptor)? {
            JsonToken::ObjectStart => {}
            other => return Err(self.type_error(descriptor, &other)),
        }
        let mut record = Record::new(fields.len());
        let mut decoded = vec![false; fields.len()];
        let mut meta_unbound = vec![false; fields.len()];
        loop {
            match self.next_token(descriptor)? {
                JsonToken::ObjectEnd => break,
                JsonToken::Name(name) => {
                    if let Some(target) = name.strip_prefix("metainfo ") {
                        self.decode_metainfo(
                            descriptor,
                            fields,
                            target,
                            &mut meta_unbound,
                        )?;
                        continue;
                    }
                    let found = fields
                        .iter()
                        .enumerate()
                        .find(|(index, f)| !decoded[*index] && member_name(f) == name);
                    match found {
                        Some((index, field_descr)) => {
                            decoded[index] = true;
                            if matches!(self.lexer.peek()?, Some(JsonToken::Null)) {
                                self.lexer.next()?;
                                record.set_field(
                                    index,
                                    self.null_member(field_descr, descriptor)?,
                                )?;
                            } else {
                                let value = self.decode(field_descr.ty)?;
                                record.set_field(index, value)?;
                            }
                        }
                        None => {
                            self.policy.dispatch(CodecError::Superfluous(format!(
                                "unknown member {:?} in type {}",
                                name, descriptor.name
                            )))?;
                            self.skip_value(descriptor)?;
                        }
                    }
                }
                other => return Err(self.type_error(descriptor, &other)),
            }
        }

        for (index, field_descr) in fields.iter().enumerate() {
            if meta_unbound[index] {
                record.set_field(index, Value::Unbound)?;
                continue;
            }
            if decoded[index] {
                continue;
            }
            let field_json = require_json(field_descr.ty)?;
            if let Some(text) = field_json.default_value {
                let mut nested = JsonDecoder::new(text, self.policy);
                let value = nested.decode(field_descr.ty)?;
                nested.finish()?;
                record.set_field(index, value)?;
            } else if field_descr.optional {
                record.set_field(index, Value::Omitted)?;
            } else if let Some(default) = field_descr.default {
                record.set_field(index, default())?;
            } else {
                self.policy.dispatch(CodecError::Incomplete(format!(
                    "mandatory field {} of {} is missing",
                    field_descr.name, descriptor.name
                )))?;
                record.set_field(index, Value::Unbound)?;
            }
        }
        Ok(Value::Record(record))
    }

    /// A `"metainfo <field>": "unbound"` member
    fn decode_metainfo(
        &mut self,
        descriptor: &'static TypeDescriptor,
        fields: &'static [FieldDescriptor],
        target: &str,
        meta_unbound: &mut [bool],
    ) -> CodecResult<()> {
        let found = fields.iter().enumerate().find(|(_, f)| {
            member_name(f) == target && f.ty.json.is_some_and(|j| j.metainfo_unbound)
        });
        let value = self.next_token(descriptor)?;
        match found {
            Some((index, _)) if value == JsonToken::String("unbound".to_string()) => {
                meta_unbound[index] = true;
                Ok(())
            }
            _ => self.policy.dispatch(CodecError::Superfluous(format!(
                "unusable metainfo member for {:?} in type {}",
                target, descriptor.name
            ))),
        }
    }

    /// An `{"metainfo []":"unbound"}` object standing in for an array
    /// element; anything else leaves the reader where it was
    fn unbound_element_marker(&mut self) -> CodecResult<bool> {
        if !matches!(self.lexer.peek()?, Some(JsonToken::ObjectStart)) {
            return Ok(false);
        }
        let mark = self.lexer.snapshot();
        self.lexer.next()?;
        if matches!(self.lexer.next()?, Some(JsonToken::Name(name)) if name == "metainfo []")
            && matches!(self.lexer.next()?, Some(JsonToken::String(text)) if text == "unbound")
            && matches!(self.lexer.next()?, Some(JsonToken::ObjectEnd))
        {
            return Ok(true);
        }
        self.lexer.restore(mark);
        Ok(false)
    }

    /// A null in place of a field value
    fn null_member(
        &mut self,
        field_descr: &'static FieldDescriptor,
        descriptor: &'static TypeDescriptor,
    ) -> CodecResult<Value> {
        if field_descr.optional {
            return Ok(Value::Omitted);
        }
        if field_descr.ty.json.is_some_and(|j| j.metainfo_unbound) {
            // The metainfo member may confirm this later; unbound either way
            return Ok(Value::Unbound);
        }
        self.policy.dispatch(CodecError::InvalidData(format!(
            "null for mandatory field {} of {}",
            field_descr.name, descriptor.name
        )))?;
        Ok(Value::Unbound)
    }

    /// Consume one complete value of any shape
    fn skip_value(&mut self, descriptor: &'static TypeDescriptor) -> CodecResult<()> {
        let mut depth = 0usize;
        loop {
            match self.next_token(descriptor)? {
                JsonToken::ObjectStart | JsonToken::ArrayStart => depth += 1,
                JsonToken::ObjectEnd | JsonToken::ArrayEnd => {
                    if depth == 0 {
                        return Err(CodecError::InvalidToken(format!(
                            "unbalanced structure in type {}",
                            descriptor.name
                        )));
                    }
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                JsonToken::Name(_) => continue,
                _ => {
                    if depth == 0 {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn next_token(&mut self, descriptor: &'static TypeDescriptor) -> CodecResult<JsonToken> {
        self.lexer.next()?.ok_or_else(|| {
            CodecError::Incomplete(format!(
                "message ends inside a value of type {}",
                descriptor.name
            ))
        })
    }

    fn type_error(&self, descriptor: &'static TypeDescriptor, token: &JsonToken) -> CodecError {
        CodecError::InvalidData(format!(
            "token {:?} does not fit type {}",
            token, descriptor.name
        ))
    }
}

/// The JSON member name of a field: its alias when one is set
fn member_name(field_descr: &'static FieldDescriptor) -> &'static str {
    field_descr
        .ty
        .json
        .and_then(|j| j.alias)
        .unwrap_or(field_descr.name)
}

#[cfg(test)]
mod tests {
    use super::super::{decode, encode};
    use super::*;
    use ttcn3_value::descriptor::json::JsonDescriptor;
    use ttcn3_value::descriptor::{self, TypeDescriptor, TypeKind};
    use ttcn3_value::error::{ErrorKind, ErrorSeverity};

    static AGE_JSON: JsonDescriptor = JsonDescriptor {
        omit_as_null: true,
        alias: Some("years"),
        as_value: false,
        default_value: None,
        metainfo_unbound: false,
    };

    static AGE: TypeDescriptor = TypeDescriptor {
        name: "Age",
        kind: TypeKind::Integer,
        ber: None,
        raw: None,
        text: None,
        xer: None,
        json: Some(&AGE_JSON),
    };

    static TAG_JSON: JsonDescriptor = JsonDescriptor {
        omit_as_null: false,
        alias: None,
        as_value: false,
        default_value: Some("\"none\""),
        metainfo_unbound: false,
    };

    static TAG: TypeDescriptor = TypeDescriptor {
        name: "Tag",
        kind: TypeKind::CharString,
        ber: None,
        raw: None,
        text: None,
        xer: None,
        json: Some(&TAG_JSON),
    };

    static META_JSON: JsonDescriptor = JsonDescriptor {
        omit_as_null: false,
        alias: None,
        as_value: false,
        default_value: None,
        metainfo_unbound: true,
    };

    static SCORE: TypeDescriptor = TypeDescriptor {
        name: "Score",
        kind: TypeKind::Integer,
        ber: None,
        raw: None,
        text: None,
        xer: None,
        json: Some(&META_JSON),
    };

    static PERSON: TypeDescriptor = TypeDescriptor {
        name: "Person",
        kind: TypeKind::Record {
            fields: &[
                FieldDescriptor {
                    name: "name",
                    ty: &descriptor::CHARSTRING,
                    optional: false,
                    default: None,
                },
                FieldDescriptor {
                    name: "age",
                    ty: &AGE,
                    optional: true,
                    default: None,
                },
                FieldDescriptor {
                    name: "tag",
                    ty: &TAG,
                    optional: false,
                    default: None,
                },
            ],
            is_set: false,
        },
        ber: None,
        raw: None,
        text: None,
        xer: None,
        json: Some(&JsonDescriptor::PLAIN),
    };

    static SCORED: TypeDescriptor = TypeDescriptor {
        name: "Scored",
        kind: TypeKind::Record {
            fields: &[
                FieldDescriptor {
                    name: "score",
                    ty: &SCORE,
                    optional: false,
                    default: None,
                },
                FieldDescriptor {
                    name: "label",
                    ty: &descriptor::CHARSTRING,
                    optional: false,
                    default: None,
                },
            ],
            is_set: false,
        },
        ber: None,
        raw: None,
        text: None,
        xer: None,
        json: Some(&JsonDescriptor::PLAIN),
    };

    static SCORES: TypeDescriptor = TypeDescriptor {
        name: "Scores",
        kind: TypeKind::RecordOf {
            element: &SCORE,
            is_set_of: false,
        },
        ber: None,
        raw: None,
        text: None,
        xer: None,
        json: Some(&JsonDescriptor::PLAIN),
    };

    fn person(name: &str, age: Option<i64>, tag: &str) -> Value {
        Value::Record(Record::from_fields(vec![
            Value::from(name),
            age.map_or(Value::Omitted, Value::from),
            Value::from(tag),
        ]))
    }

    #[test]
    fn test_alias_and_omit_as_null() {
        let policy = ErrorPolicy::new();
        let encoded = encode(&person("alice", None, "x"), &PERSON, false, &policy, None).unwrap();
        let text = String::from_utf8(encoded.clone()).unwrap();
        assert_eq!(text, "{\"name\":\"alice\",\"years\":null,\"tag\":\"x\"}");
        let decoded = decode(&encoded, &PERSON, &policy).unwrap();
        assert!(decoded.is_equal(&person("alice", None, "x")));
    }

    #[test]
    fn test_default_value_restored() {
        let policy = ErrorPolicy::new();
        let decoded = decode(b"{\"name\":\"bob\"}", &PERSON, &policy).unwrap();
        assert!(decoded.is_equal(&person("bob", None, "none")));
    }

    #[test]
    fn test_metainfo_unbound_roundtrip() {
        let policy = ErrorPolicy::new();
        let value = Value::Record(Record::from_fields(vec![Value::Unbound, Value::from("x")]));
        let encoded = encode(&value, &SCORED, false, &policy, None).unwrap();
        let text = String::from_utf8(encoded.clone()).unwrap();
        assert_eq!(
            text,
            "{\"score\":null,\"metainfo score\":\"unbound\",\"label\":\"x\"}"
        );
        let decoded = decode(&encoded, &SCORED, &policy).unwrap();
        let record = decoded.as_record().unwrap();
        assert!(!record.get_field(0).unwrap().is_bound());
        assert_eq!(record.get_field(1).unwrap().as_str().unwrap(), "x");
    }

    #[test]
    fn test_unbound_array_element_marker_roundtrip() {
        let policy = ErrorPolicy::new();
        let value = Value::RecordOf(RecordOf::from_elements(vec![
            Value::from(1i64),
            Value::Unbound,
            Value::from(3i64),
        ]));
        let encoded = encode(&value, &SCORES, false, &policy, None).unwrap();
        let text = String::from_utf8(encoded.clone()).unwrap();
        assert_eq!(text, "[1,{\"metainfo []\":\"unbound\"},3]");
        let decoded = decode(&encoded, &SCORES, &policy).unwrap();
        let sequence = decoded.as_record_of().unwrap();
        assert_eq!(sequence.len(), 3);
        assert_eq!(sequence.get_at(0).unwrap().as_i64().unwrap(), 1);
        assert!(matches!(
            sequence.get_at(1).unwrap_err(),
            CodecError::Unbound(_)
        ));
        assert_eq!(sequence.get_at(2).unwrap().as_i64().unwrap(), 3);
    }

    #[test]
    fn test_unknown_member_policy() {
        let policy = ErrorPolicy::new();
        let input = b"{\"name\":\"eve\",\"tag\":\"t\",\"extra\":[1,2]}";
        assert!(matches!(
            decode(input, &PERSON, &policy).unwrap_err(),
            CodecError::Superfluous(_)
        ));
        let mut lenient = ErrorPolicy::new();
        lenient.set(ErrorKind::Superfluous, ErrorSeverity::Warning);
        let decoded = decode(input, &PERSON, &lenient).unwrap();
        assert!(decoded.is_equal(&person("eve", None, "t")));
    }

    #[test]
    fn test_pretty_output_shape() {
        let policy = ErrorPolicy::new();
        let encoded = encode(&person("a", Some(3), "b"), &PERSON, true, &policy, None).unwrap();
        let text = String::from_utf8(encoded).unwrap();
        assert_eq!(
            text,
            "{\n\t\"name\": \"a\",\n\t\"years\": 3,\n\t\"tag\": \"b\"\n}"
        );
    }

    #[test]
    fn test_big_integer_roundtrip() {
        let policy = ErrorPolicy::new();
        let value = Value::Integer(IntegerValue::parse("123456789012345678901234567890").unwrap());
        let encoded = encode(&value, &descriptor::INTEGER, false, &policy, None).unwrap();
        assert_eq!(encoded, b"123456789012345678901234567890");
        let decoded = decode(&encoded, &descriptor::INTEGER, &policy).unwrap();
        assert!(decoded.is_equal(&value));
    }
}
