//! TEXT encoder driven by type descriptors

use ttcn3_value::descriptor::text::{TextCase, TextDescriptor, TextJust};
use ttcn3_value::descriptor::{TypeDescriptor, TypeKind};
use ttcn3_value::erroneous::{ErroneousDescriptor, ErroneousValue, ValueOverride};
use ttcn3_value::error::{CodecError, CodecResult, ErrorPolicy};
use ttcn3_value::value::Value;

use super::require_text;

/// TEXT encoder appending characters to a byte vector
pub struct TextEncoder<'a> {
    policy: &'a ErrorPolicy,
}

impl<'a> TextEncoder<'a> {
    pub fn new(policy: &'a ErrorPolicy) -> Self {
        Self { policy }
    }

    pub fn encode(
        &self,
        value: &Value,
        descriptor: &'static TypeDescriptor,
        out: &mut Vec<u8>,
        erroneous: Option<&ErroneousDescriptor>,
    ) -> CodecResult<()> {
        let text = require_text(descriptor)?;
        if !value.is_bound() {
            self.policy.dispatch(CodecError::Unbound(format!(
                "encoding an unbound value of type {}",
                descriptor.name
            )))?;
            return Ok(());
        }
        if let Some(token) = &text.begin {
            out.extend_from_slice(token.encode_str().as_bytes());
        }
        match &descriptor.kind {
            TypeKind::Boolean => {
                let content = if value.as_bool()? { "true" } else { "false" };
                out.extend_from_slice(self.format_scalar(content, text).as_bytes());
            }
            TypeKind::Integer => {
                let content = value.as_integer()?.to_string();
                out.extend_from_slice(self.format_scalar(&content, text).as_bytes());
            }
            TypeKind::Float => {
                let content = format_float(value.as_float()?);
                out.extend_from_slice(self.format_scalar(&content, text).as_bytes());
            }
            TypeKind::CharString => {
                out.extend_from_slice(self.format_scalar(value.as_str()?, text).as_bytes());
            }
            TypeKind::OctetString => {
                let mut hex = String::with_capacity(value.as_octets()?.len() * 2);
                for octet in value.as_octets()? {
                    hex.push_str(&format!("{:02X}", octet));
                }
                out.extend_from_slice(self.format_scalar(&hex, text).as_bytes());
            }
            TypeKind::Record { fields, .. } => {
                let record = value.as_record()?;
                let mut first = true;
                for (index, field_descr) in fields.iter().enumerate() {
                    if let Some(e) = erroneous {
                        if e.is_field_omitted(index) {
                            continue;
                        }
                    }
                    let over = erroneous.and_then(|e| e.override_for(index));
                    if let Some(over) = over {
                        if let Some(payload) = &over.before {
                            self.erroneous_chars(payload, out)?;
                        }
                    }
                    match over.and_then(|o| o.value.as_ref()) {
                        Some(ValueOverride::Omit) => {}
                        Some(ValueOverride::Replace(payload)) => {
                            self.separator(text, &mut first, out);
                            self.erroneous_chars(payload, out)?;
                        }
                        None => {
                            let field = record.get_field(index)?;
                            if !matches!(field, Value::Omitted) {
                                self.separator(text, &mut first, out);
                                let nested = over.and_then(|o| o.nested.as_deref());
                                self.encode(field, field_descr.ty, out, nested)?;
                            }
                        }
                    }
                    if let Some(over) = over {
                        if let Some(payload) = &over.after {
                            self.erroneous_chars(payload, out)?;
                        }
                    }
                }
            }
            TypeKind::RecordOf { element, .. } => {
                let sequence = value.as_record_of()?;
                let mut first = true;
                for (index, elem) in sequence.iter().enumerate() {
                    if let Some(e) = erroneous {
                        if e.is_field_omitted(index) {
                            continue;
                        }
                    }
                    let over = erroneous.and_then(|e| e.override_for(index));
                    if let Some(over) = over {
                        if let Some(payload) = &over.before {
                            self.erroneous_chars(payload, out)?;
                        }
                    }
                    match over.and_then(|o| o.value.as_ref()) {
                        Some(ValueOverride::Omit) => {}
                        Some(ValueOverride::Replace(payload)) => {
                            self.separator(text, &mut first, out);
                            self.erroneous_chars(payload, out)?;
                        }
                        None => {
                            self.separator(text, &mut first, out);
                            let nested = over.and_then(|o| o.nested.as_deref());
                            self.encode(elem, element, out, nested)?;
                        }
                    }
                    if let Some(over) = over {
                        if let Some(payload) = &over.after {
                            self.erroneous_chars(payload, out)?;
                        }
                    }
                }
            }
            TypeKind::Empty => {}
        }
        if let Some(token) = &text.end {
            out.extend_from_slice(token.encode_str().as_bytes());
        }
        Ok(())
    }

    fn separator(&self, text: &TextDescriptor, first: &mut bool, out: &mut Vec<u8>) {
        if *first {
            *first = false;
        } else if let Some(token) = &text.separator {
            out.extend_from_slice(token.encode_str().as_bytes());
        }
    }

    /// Apply case conversion, width padding and justification
    fn format_scalar(&self, content: &str, text: &TextDescriptor) -> String {
        let converted = match text.convert {
            TextCase::None => content.to_string(),
            TextCase::Upper => content.to_uppercase(),
            TextCase::Lower => content.to_lowercase(),
        };
        let width = text.min_length;
        if converted.chars().count() >= width {
            return converted;
        }
        if text.leading_zero {
            // Zeros go between the sign and the digits
            let (sign, digits) = match converted.strip_prefix('-') {
                Some(rest) => ("-", rest),
                None => ("", converted.as_str()),
            };
            let fill = width - converted.chars().count();
            return format!("{}{}{}", sign, "0".repeat(fill), digits);
        }
        let fill = width - converted.chars().count();
        match text.just {
            TextJust::Left => format!("{}{}", converted, " ".repeat(fill)),
            TextJust::Right => format!("{}{}", " ".repeat(fill), converted),
            TextJust::Center => {
                let left = fill / 2;
                format!(
                    "{}{}{}",
                    " ".repeat(left),
                    converted,
                    " ".repeat(fill - left)
                )
            }
        }
    }

    fn erroneous_chars(&self, payload: &ErroneousValue, out: &mut Vec<u8>) -> CodecResult<()> {
        payload.check()?;
        match payload {
            ErroneousValue::Raw(bytes) => {
                out.extend_from_slice(bytes);
                Ok(())
            }
            ErroneousValue::Typed { value, descriptor } => {
                self.encode(value, descriptor, out, None)
            }
        }
    }
}

/// Decimal text form of a float, keeping infinities spelled out
pub(super) fn format_float(value: f64) -> String {
    if value.is_nan() {
        "not_a_number".to_string()
    } else if value == f64::INFINITY {
        "infinity".to_string()
    } else if value == f64::NEG_INFINITY {
        "-infinity".to_string()
    } else if value == value.trunc() && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_forms() {
        assert_eq!(format_float(4.0), "4.0");
        assert_eq!(format_float(-0.25), "-0.25");
        assert_eq!(format_float(f64::INFINITY), "infinity");
        assert_eq!(format_float(f64::NAN), "not_a_number");
    }

    #[test]
    fn test_leading_zero_padding() {
        let policy = ErrorPolicy::new();
        let encoder = TextEncoder::new(&policy);
        let text = TextDescriptor {
            min_length: 5,
            leading_zero: true,
            ..TextDescriptor::PLAIN
        };
        assert_eq!(encoder.format_scalar("-42", &text), "-0042");
        assert_eq!(encoder.format_scalar("123456", &text), "123456");
    }

    #[test]
    fn test_center_justification() {
        let policy = ErrorPolicy::new();
        let encoder = TextEncoder::new(&policy);
        let text = TextDescriptor {
            min_length: 6,
            just: TextJust::Center,
            ..TextDescriptor::PLAIN
        };
        assert_eq!(encoder.format_scalar("ab", &text), "  ab  ");
    }
}
