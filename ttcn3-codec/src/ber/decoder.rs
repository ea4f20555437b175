//! BER decoder driven by type descriptors
//!
//! Decoding happens in two passes: the octets are first parsed into a
//! TLV tree (which absorbs the definite/indefinite length split and
//! string fragmentation), then the tree is matched against the type
//! descriptor to build the value.

use ttcn3_value::descriptor::ber::BerTag;
use ttcn3_value::descriptor::{FieldDescriptor, TypeDescriptor, TypeKind};
use ttcn3_value::error::{CodecError, CodecResult, ErrorPolicy};
use ttcn3_value::value::{IntegerValue, Record, RecordOf, Value};

use super::encoder::require_ber;
use super::types::{decode_tag, BerLength};
use super::BerVariant;

/// BER/CER/DER decoder over a byte buffer
pub struct BerDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    variant: BerVariant,
    policy: &'a ErrorPolicy,
}

/// One parsed TLV
struct Tlv<'a> {
    tag: BerTag,
    content: TlvContent<'a>,
}

enum TlvContent<'a> {
    Primitive(&'a [u8]),
    Constructed(Vec<Tlv<'a>>),
}

impl<'a> BerDecoder<'a> {
    pub fn new(data: &'a [u8], variant: BerVariant, policy: &'a ErrorPolicy) -> Self {
        Self {
            data,
            pos: 0,
            variant,
            policy,
        }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn has_remaining(&self) -> bool {
        self.pos < self.data.len()
    }

    /// Decode one value of the given type
    pub fn decode(&mut self, descriptor: &'static TypeDescriptor) -> CodecResult<Value> {
        let tlv = self.parse_tlv()?;
        self.decode_value(&tlv, descriptor)
    }

    fn parse_tlv(&mut self) -> CodecResult<Tlv<'a>> {
        let (tag, tag_len) = decode_tag(&self.data[self.pos..])?;
        self.pos += tag_len;
        let (length, length_len) = BerLength::decode(&self.data[self.pos..])?;
        self.pos += length_len;

        if !tag.constructed {
            let len = match length {
                BerLength::Definite(len) => len,
                BerLength::Indefinite => {
                    return Err(CodecError::InvalidData(
                        "indefinite length on a primitive value".to_string(),
                    ));
                }
            };
            if self.remaining() < len {
                return Err(CodecError::Incomplete(format!(
                    "content needs {} octets, {} available",
                    len,
                    self.remaining()
                )));
            }
            let content = &self.data[self.pos..self.pos + len];
            self.pos += len;
            return Ok(Tlv {
                tag,
                content: TlvContent::Primitive(content),
            });
        }

        let mut children = Vec::new();
        match length {
            BerLength::Definite(len) => {
                if self.remaining() < len {
                    return Err(CodecError::Incomplete(format!(
                        "content needs {} octets, {} available",
                        len,
                        self.remaining()
                    )));
                }
                let end = self.pos + len;
                while self.pos < end {
                    children.push(self.parse_tlv()?);
                }
                if self.pos != end {
                    return Err(CodecError::InvalidData(
                        "nested TLV overruns its parent".to_string(),
                    ));
                }
            }
            BerLength::Indefinite => loop {
                if self.remaining() >= 2
                    && self.data[self.pos] == 0x00
                    && self.data[self.pos + 1] == 0x00
                {
                    self.pos += 2;
                    break;
                }
                if !self.has_remaining() {
                    return Err(CodecError::Incomplete(
                        "missing end-of-contents marker".to_string(),
                    ));
                }
                children.push(self.parse_tlv()?);
            },
        }
        Ok(Tlv {
            tag,
            content: TlvContent::Constructed(children),
        })
    }

    fn decode_value(
        &self,
        tlv: &Tlv<'a>,
        descriptor: &'static TypeDescriptor,
    ) -> CodecResult<Value> {
        let ber = require_ber(descriptor)?;

        // Unwrap the tag chain from outside in
        let mut current = tlv;
        for (depth, expected) in ber.tags.iter().enumerate() {
            if !tag_matches(&current.tag, expected) {
                self.policy.dispatch(CodecError::TagMismatch(format!(
                    "type {} expects tag [{:?} {}], found [{:?} {}]",
                    descriptor.name,
                    expected.class,
                    expected.number,
                    current.tag.class,
                    current.tag.number
                )))?;
            }
            if depth < ber.tags.len() - 1 {
                current = match &current.content {
                    TlvContent::Constructed(children) if children.len() == 1 => &children[0],
                    TlvContent::Constructed(_) => {
                        return Err(CodecError::InvalidData(format!(
                            "explicit tag of type {} must wrap exactly one value",
                            descriptor.name
                        )));
                    }
                    TlvContent::Primitive(_) => {
                        return Err(CodecError::InvalidData(format!(
                            "explicit tag of type {} is not constructed",
                            descriptor.name
                        )));
                    }
                };
            }
        }

        match &descriptor.kind {
            TypeKind::Boolean => {
                let content = primitive_content(current, descriptor)?;
                if content.len() != 1 {
                    self.policy.dispatch(CodecError::InvalidData(format!(
                        "BOOLEAN content of {} octets",
                        content.len()
                    )))?;
                }
                let octet = content.first().copied().unwrap_or(0);
                // The canonical rules allow exactly 0x00 and 0xFF
                if self.variant != BerVariant::Ber && octet != 0x00 && octet != 0xFF {
                    self.policy.dispatch(CodecError::InvalidData(format!(
                        "non-canonical BOOLEAN content {:#04x}",
                        octet
                    )))?;
                }
                Ok(Value::Boolean(octet != 0))
            }
            TypeKind::Integer => {
                let content = primitive_content(current, descriptor)?;
                if content.is_empty() {
                    return Err(CodecError::InvalidData(
                        "INTEGER with empty content".to_string(),
                    ));
                }
                Ok(Value::Integer(IntegerValue::from_signed_bytes_be(content)))
            }
            TypeKind::Float => {
                let content = primitive_content(current, descriptor)?;
                Ok(Value::Float(decode_real(content)?))
            }
            TypeKind::CharString => {
                let bytes = flatten_string(current);
                let text = String::from_utf8(bytes).map_err(|_| {
                    CodecError::InvalidData(format!(
                        "charstring content of type {} is not valid UTF-8",
                        descriptor.name
                    ))
                })?;
                Ok(Value::from(text))
            }
            TypeKind::OctetString => Ok(Value::from(flatten_string(current))),
            TypeKind::Record { fields, is_set } => {
                let children = constructed_children(current, descriptor)?;
                if *is_set {
                    self.decode_set(children, fields, descriptor)
                } else {
                    self.decode_sequence(children, fields, descriptor)
                }
            }
            TypeKind::RecordOf { element, .. } => {
                let children = constructed_children(current, descriptor)?;
                let mut sequence = RecordOf::new();
                for (index, child) in children.iter().enumerate() {
                    *sequence.get_at_mut(index)? = self.decode_value(child, element)?;
                }
                Ok(Value::RecordOf(sequence))
            }
            TypeKind::Empty => {
                let children = constructed_children(current, descriptor)?;
                if !children.is_empty() {
                    self.policy.dispatch(CodecError::Superfluous(format!(
                        "{} values inside empty type {}",
                        children.len(),
                        descriptor.name
                    )))?;
                }
                Ok(Value::EmptyRecord)
            }
        }
    }

    fn decode_sequence(
        &self,
        children: &[Tlv<'a>],
        fields: &'static [FieldDescriptor],
        descriptor: &'static TypeDescriptor,
    ) -> CodecResult<Value> {
        let mut record = Record::new(fields.len());
        let mut cursor = 0;
        for (index, field_descr) in fields.iter().enumerate() {
            let field_tag = require_ber(field_descr.ty)?.outer_tag();
            let matched = children
                .get(cursor)
                .is_some_and(|child| tag_matches(&child.tag, &field_tag));
            let value = if matched {
                let value = self.decode_value(&children[cursor], field_descr.ty)?;
                cursor += 1;
                value
            } else if field_descr.optional {
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
        if cursor < children.len() {
            self.policy.dispatch(CodecError::Superfluous(format!(
                "{} unexpected values at the end of {}",
                children.len() - cursor,
                descriptor.name
            )))?;
        }
        Ok(Value::Record(record))
    }

    /// Set fields arrive in any order; match each child by tag
    fn decode_set(
        &self,
        children: &[Tlv<'a>],
        fields: &'static [FieldDescriptor],
        descriptor: &'static TypeDescriptor,
    ) -> CodecResult<Value> {
        let mut record = Record::new(fields.len());
        for child in children {
            let matched = fields.iter().enumerate().find(|(_, f)| {
                f.ty.ber
                    .is_some_and(|b| tag_matches(&child.tag, &b.outer_tag()))
            });
            match matched {
                Some((index, field_descr)) => {
                    if record.get_field(index)?.is_bound() {
                        self.policy.dispatch(CodecError::Superfluous(format!(
                            "field {} of {} appears twice",
                            field_descr.name, descriptor.name
                        )))?;
                    }
                    let value = self.decode_value(child, field_descr.ty)?;
                    record.set_field(index, value)?;
                }
                None => {
                    self.policy.dispatch(CodecError::Superfluous(format!(
                        "unexpected tag [{:?} {}] inside {}",
                        child.tag.class, child.tag.number, descriptor.name
                    )))?;
                }
            }
        }
        for (index, field_descr) in fields.iter().enumerate() {
            if record.get_field(index)?.is_bound() {
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
}

/// Class and number identify a tag; the constructed bit is content shape
fn tag_matches(found: &BerTag, expected: &BerTag) -> bool {
    found.class == expected.class && found.number == expected.number
}

fn primitive_content<'a>(
    tlv: &Tlv<'a>,
    descriptor: &'static TypeDescriptor,
) -> CodecResult<&'a [u8]> {
    match &tlv.content {
        TlvContent::Primitive(content) => Ok(content),
        TlvContent::Constructed(_) => Err(CodecError::InvalidData(format!(
            "type {} expects primitive content",
            descriptor.name
        ))),
    }
}

fn constructed_children<'t, 'a>(
    tlv: &'t Tlv<'a>,
    descriptor: &'static TypeDescriptor,
) -> CodecResult<&'t [Tlv<'a>]> {
    match &tlv.content {
        TlvContent::Constructed(children) => Ok(children),
        TlvContent::Primitive(_) => Err(CodecError::InvalidData(format!(
            "type {} expects constructed content",
            descriptor.name
        ))),
    }
}

/// Concatenate the content of a possibly fragmented string
fn flatten_string(tlv: &Tlv<'_>) -> Vec<u8> {
    fn walk(tlv: &Tlv<'_>, out: &mut Vec<u8>) {
        match &tlv.content {
            TlvContent::Primitive(content) => out.extend_from_slice(content),
            TlvContent::Constructed(children) => {
                for child in children {
                    walk(child, out);
                }
            }
        }
    }
    let mut out = Vec::new();
    walk(tlv, &mut out);
    out
}

/// Decode X.690 REAL content octets
fn decode_real(content: &[u8]) -> CodecResult<f64> {
    let Some(&first) = content.first() else {
        return Ok(0.0);
    };
    match first {
        0x40 => return Ok(f64::INFINITY),
        0x41 => return Ok(f64::NEG_INFINITY),
        0x42 => return Ok(f64::NAN),
        0x43 => return Ok(-0.0),
        _ => {}
    }
    if first & 0x80 != 0 {
        return decode_binary_real(content);
    }
    if first & 0xC0 == 0 {
        // ISO 6093 decimal form
        let text = std::str::from_utf8(&content[1..])
            .map_err(|_| CodecError::InvalidData("REAL decimal form is not ASCII".to_string()))?;
        return text
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .map_err(|_| CodecError::InvalidData(format!("unparsable REAL value {:?}", text)));
    }
    Err(CodecError::InvalidData(format!(
        "unsupported REAL leading octet {:#04x}",
        first
    )))
}

fn decode_binary_real(content: &[u8]) -> CodecResult<f64> {
    let first = content[0];
    let negative = first & 0x40 != 0;
    let base = match (first >> 4) & 0x03 {
        0 => 2.0f64,
        1 => 8.0,
        2 => 16.0,
        _ => {
            return Err(CodecError::InvalidData(
                "reserved REAL base".to_string(),
            ));
        }
    };
    let scale = ((first >> 2) & 0x03) as i32;
    let (exponent_len, mut offset) = match first & 0x03 {
        3 => {
            let len = *content.get(1).ok_or_else(|| {
                CodecError::Incomplete("truncated REAL exponent".to_string())
            })? as usize;
            (len, 2)
        }
        code => (code as usize + 1, 1),
    };
    if content.len() < offset + exponent_len || exponent_len == 0 || exponent_len > 8 {
        return Err(CodecError::InvalidData("malformed REAL exponent".to_string()));
    }
    let mut exponent = if content[offset] & 0x80 != 0 { -1i64 } else { 0 };
    for &octet in &content[offset..offset + exponent_len] {
        exponent = (exponent << 8) | octet as i64;
    }
    offset += exponent_len;

    let mut mantissa = 0u64;
    for &octet in &content[offset..] {
        mantissa = mantissa
            .checked_shl(8)
            .and_then(|m| m.checked_add(octet as u64))
            .ok_or_else(|| CodecError::InvalidData("REAL mantissa overflow".to_string()))?;
    }
    let mut value = mantissa as f64 * 2f64.powi(scale) * base.powi(exponent as i32);
    if negative {
        value = -value;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::super::encoder::{encode_real, BerEncoder};
    use super::*;

    fn roundtrip(value: &Value, descriptor: &'static TypeDescriptor, variant: BerVariant) -> Value {
        let policy = ErrorPolicy::new();
        let encoded = BerEncoder::new(variant, &policy)
            .encode(value, descriptor, None)
            .unwrap();
        let mut decoder = BerDecoder::new(&encoded, variant, &policy);
        let decoded = decoder.decode(descriptor).unwrap();
        assert!(!decoder.has_remaining());
        decoded
    }

    #[test]
    fn test_scalar_roundtrips() {
        for variant in [BerVariant::Ber, BerVariant::Cer, BerVariant::Der] {
            let decoded = roundtrip(
                &Value::from(-70000i64),
                &ttcn3_value::descriptor::INTEGER,
                variant,
            );
            assert_eq!(decoded.as_i64().unwrap(), -70000);

            let decoded = roundtrip(
                &Value::from("hello"),
                &ttcn3_value::descriptor::CHARSTRING,
                variant,
            );
            assert_eq!(decoded.as_str().unwrap(), "hello");
        }
    }

    #[test]
    fn test_real_roundtrip() {
        for v in [0.0, -0.0, 0.5, -3.75, 1.0e10, f64::INFINITY] {
            let decoded = decode_real(&encode_real(v)).unwrap();
            assert_eq!(decoded, v);
            assert_eq!(decoded.is_sign_negative(), v.is_sign_negative());
        }
        assert!(decode_real(&encode_real(f64::NAN)).unwrap().is_nan());
    }

    #[test]
    fn test_cer_fragmented_string_roundtrip() {
        let long = "y".repeat(2500);
        let decoded = roundtrip(
            &Value::from(long.as_str()),
            &ttcn3_value::descriptor::CHARSTRING,
            BerVariant::Cer,
        );
        assert_eq!(decoded.as_str().unwrap(), long);
    }

    #[test]
    fn test_truncated_input_is_incomplete() {
        let policy = ErrorPolicy::new();
        let mut decoder = BerDecoder::new(&[0x02, 0x04, 0x01], BerVariant::Ber, &policy);
        assert!(matches!(
            decoder.decode(&ttcn3_value::descriptor::INTEGER).unwrap_err(),
            CodecError::Incomplete(_)
        ));
    }
}
