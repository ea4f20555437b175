//! JSON encoder driven by type descriptors

use ttcn3_value::descriptor::json::JsonDescriptor;
use ttcn3_value::descriptor::{TypeDescriptor, TypeKind};
use ttcn3_value::erroneous::{ErroneousDescriptor, ErroneousValue, ValueOverride};
use ttcn3_value::error::{CodecError, CodecResult, ErrorPolicy};
use ttcn3_value::value::Value;

use super::tokenizer::JsonWriter;
use super::{hex_upper, require_json};

/// JSON encoder appending tokens to a writer
pub struct JsonEncoder<'a> {
    policy: &'a ErrorPolicy,
}

impl<'a> JsonEncoder<'a> {
    pub fn new(policy: &'a ErrorPolicy) -> Self {
        Self { policy }
    }

    pub fn encode(
        &self,
        value: &Value,
        descriptor: &'static TypeDescriptor,
        out: &mut JsonWriter,
        erroneous: Option<&ErroneousDescriptor>,
    ) -> CodecResult<()> {
        let json = require_json(descriptor)?;
        if !value.is_bound() {
            self.policy.dispatch(CodecError::Unbound(format!(
                "encoding an unbound value of type {}",
                descriptor.name
            )))?;
            out.raw("null");
            return Ok(());
        }
        match &descriptor.kind {
            TypeKind::Boolean => {
                out.raw(if value.as_bool()? { "true" } else { "false" });
                Ok(())
            }
            TypeKind::Integer => {
                out.raw(&value.as_integer()?.to_string());
                Ok(())
            }
            TypeKind::Float => {
                self.encode_float(value.as_float()?, out);
                Ok(())
            }
            TypeKind::CharString => {
                out.string(value.as_str()?);
                Ok(())
            }
            TypeKind::OctetString => {
                out.string(&hex_upper(value.as_octets()?));
                Ok(())
            }
            TypeKind::Record { fields, .. } => {
                if json.as_value && fields.len() == 1 {
                    let record = value.as_record()?;
                    return self.encode(record.get_field(0)?, fields[0].ty, out, None);
                }
                let record = value.as_record()?;
                if record.field_count() != fields.len() {
                    return Err(CodecError::Internal(format!(
                        "value of type {} has {} fields, descriptor says {}",
                        descriptor.name,
                        record.field_count(),
                        fields.len()
                    )));
                }
                out.object_start();
                for (index, field_descr) in fields.iter().enumerate() {
                    if let Some(e) = erroneous {
                        if e.is_field_omitted(index) {
                            continue;
                        }
                    }
                    let field_json = require_json(field_descr.ty)?;
                    let member = field_json.alias.unwrap_or(field_descr.name);
                    let over = erroneous.and_then(|e| e.override_for(index));
                    if let Some(over) = over {
                        if let Some(payload) = &over.before {
                            self.erroneous_member(payload, out)?;
                        }
                    }
                    match over.and_then(|o| o.value.as_ref()) {
                        Some(ValueOverride::Omit) => {}
                        Some(ValueOverride::Replace(payload)) => {
                            out.name(member);
                            self.erroneous_value(payload, out)?;
                        }
                        None => {
                            let field = record.get_field(index)?;
                            let nested = over.and_then(|o| o.nested.as_deref());
                            self.encode_member(
                                field, field_descr.ty, field_json, member, out, nested,
                            )?;
                        }
                    }
                    if let Some(over) = over {
                        if let Some(payload) = &over.after {
                            self.erroneous_member(payload, out)?;
                        }
                    }
                }
                out.object_end();
                Ok(())
            }
            TypeKind::RecordOf { element, .. } => {
                let element_json = require_json(element)?;
                let sequence = value.as_record_of()?;
                out.array_start();
                for (index, elem) in sequence.iter().enumerate() {
                    if let Some(e) = erroneous {
                        if e.is_field_omitted(index) {
                            continue;
                        }
                    }
                    let over = erroneous.and_then(|e| e.override_for(index));
                    if let Some(over) = over {
                        if let Some(payload) = &over.before {
                            self.erroneous_value(payload, out)?;
                        }
                    }
                    match over.and_then(|o| o.value.as_ref()) {
                        Some(ValueOverride::Omit) => {}
                        Some(ValueOverride::Replace(payload)) => {
                            self.erroneous_value(payload, out)?;
                        }
                        None if !elem.is_bound() && element_json.metainfo_unbound => {
                            // Unbound elements keep their position through a
                            // synthetic marker object
                            out.object_start();
                            out.name("metainfo []");
                            out.string("unbound");
                            out.object_end();
                        }
                        None => {
                            let nested = over.and_then(|o| o.nested.as_deref());
                            self.encode(elem, element, out, nested)?;
                        }
                    }
                    if let Some(over) = over {
                        if let Some(payload) = &over.after {
                            self.erroneous_value(payload, out)?;
                        }
                    }
                }
                out.array_end();
                Ok(())
            }
            TypeKind::Empty => {
                out.object_start();
                out.object_end();
                Ok(())
            }
        }
    }

    fn encode_member(
        &self,
        field: &Value,
        ty: &'static TypeDescriptor,
        field_json: &'static JsonDescriptor,
        member: &str,
        out: &mut JsonWriter,
        erroneous: Option<&ErroneousDescriptor>,
    ) -> CodecResult<()> {
        match field {
            Value::Omitted => {
                if field_json.omit_as_null {
                    out.name(member);
                    out.raw("null");
                }
                Ok(())
            }
            Value::Unbound if field_json.metainfo_unbound => {
                out.name(member);
                out.raw("null");
                out.name(&format!("metainfo {}", member));
                out.string("unbound");
                Ok(())
            }
            _ => {
                out.name(member);
                self.encode(field, ty, out, erroneous)
            }
        }
    }

    /// Floats follow the text rules of the runtime: specials become
    /// string literals because JSON numbers cannot express them
    fn encode_float(&self, value: f64, out: &mut JsonWriter) {
        if value.is_nan() {
            out.string("not_a_number");
        } else if value == f64::INFINITY {
            out.string("infinity");
        } else if value == f64::NEG_INFINITY {
            out.string("-infinity");
        } else if value == value.trunc() && value.abs() < 1e15 {
            out.raw(&format!("{:.6}", value));
        } else {
            out.raw(&format!("{:e}", value));
        }
    }

    fn erroneous_member(&self, payload: &ErroneousValue, out: &mut JsonWriter) -> CodecResult<()> {
        payload.check()?;
        match payload {
            ErroneousValue::Raw(bytes) => {
                out.raw(&String::from_utf8_lossy(bytes));
                Ok(())
            }
            ErroneousValue::Typed { value, descriptor } => {
                out.name(descriptor.name);
                self.encode(value, descriptor, out, None)
            }
        }
    }

    fn erroneous_value(&self, payload: &ErroneousValue, out: &mut JsonWriter) -> CodecResult<()> {
        payload.check()?;
        match payload {
            ErroneousValue::Raw(bytes) => {
                out.raw(&String::from_utf8_lossy(bytes));
                Ok(())
            }
            ErroneousValue::Typed { value, descriptor } => self.encode(value, descriptor, out, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ttcn3_value::descriptor;

    fn encode_compact(value: &Value, descriptor: &'static TypeDescriptor) -> String {
        let policy = ErrorPolicy::new();
        let mut out = JsonWriter::new(false);
        JsonEncoder::new(&policy)
            .encode(value, descriptor, &mut out, None)
            .unwrap();
        out.into_string()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(encode_compact(&Value::from(true), &descriptor::BOOLEAN), "true");
        assert_eq!(encode_compact(&Value::from(-5i64), &descriptor::INTEGER), "-5");
        assert_eq!(
            encode_compact(&Value::from("a\"b"), &descriptor::CHARSTRING),
            "\"a\\\"b\""
        );
        assert_eq!(
            encode_compact(
                &Value::from(vec![0xDEu8, 0xAD]),
                &descriptor::OCTETSTRING
            ),
            "\"DEAD\""
        );
    }

    #[test]
    fn test_float_spellings() {
        assert_eq!(encode_compact(&Value::from(4.0f64), &descriptor::FLOAT), "4.000000");
        assert_eq!(
            encode_compact(&Value::from(f64::INFINITY), &descriptor::FLOAT),
            "\"infinity\""
        );
        assert_eq!(
            encode_compact(&Value::from(f64::NAN), &descriptor::FLOAT),
            "\"not_a_number\""
        );
    }
}
