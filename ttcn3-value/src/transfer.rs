//! Internal length-prefixed transfer format
//!
//! Moves a value between cooperating processes that already agree on its
//! type: no tags, no padding, nothing self-describing. A string is an
//! `i32` length plus raw octets, a record-of is an `i32` count plus that
//! many elements, a record is the concatenation of its fields with a
//! one-octet presence marker ahead of each optional field. Decoding
//! trusts the descriptor completely.

use crate::buffer::OctetBuffer;
use crate::descriptor::{TypeDescriptor, TypeKind};
use crate::error::{CodecError, CodecResult};
use crate::value::{IntegerValue, Record, RecordOf, Value};

/// Encode `value` into the transfer form
pub fn encode_transfer(
    value: &Value,
    descriptor: &'static TypeDescriptor,
    buf: &mut OctetBuffer,
) -> CodecResult<()> {
    if !value.is_bound() {
        return Err(CodecError::Unbound(format!(
            "transfer encoding of an unbound value of type {}",
            descriptor.name
        )));
    }
    match &descriptor.kind {
        TypeKind::Boolean => buf.put_u8(if value.as_bool()? { 1 } else { 0 }),
        TypeKind::Integer => {
            let bytes = value.as_integer()?.to_signed_bytes_be();
            put_length(buf, bytes.len())?;
            buf.put_slice(&bytes)
        }
        TypeKind::Float => buf.put_slice(&value.as_float()?.to_be_bytes()),
        TypeKind::CharString => {
            let text = value.as_str()?;
            put_length(buf, text.len())?;
            buf.put_slice(text.as_bytes())
        }
        TypeKind::OctetString => {
            let octets = value.as_octets()?;
            put_length(buf, octets.len())?;
            buf.put_slice(octets)
        }
        TypeKind::Record { fields, .. } => {
            let record = value.as_record()?;
            if record.field_count() != fields.len() {
                return Err(CodecError::Internal(format!(
                    "record of type {} has {} fields, descriptor says {}",
                    descriptor.name,
                    record.field_count(),
                    fields.len()
                )));
            }
            for (index, field_descr) in fields.iter().enumerate() {
                let field = record.get_field(index)?;
                if field_descr.optional {
                    if field.is_present() {
                        buf.put_u8(1)?;
                        encode_transfer(field, field_descr.ty, buf)?;
                    } else if matches!(field, Value::Omitted) {
                        buf.put_u8(0)?;
                    } else {
                        return Err(CodecError::Unbound(format!(
                            "field {} of {} is unbound",
                            field_descr.name, descriptor.name
                        )));
                    }
                } else {
                    encode_transfer(field, field_descr.ty, buf)?;
                }
            }
            Ok(())
        }
        TypeKind::RecordOf { element, .. } => {
            let sequence = value.as_record_of()?;
            put_length(buf, sequence.len())?;
            for elem in sequence.iter() {
                encode_transfer(elem, element, buf)?;
            }
            Ok(())
        }
        TypeKind::Empty => Ok(()),
    }
}

/// Decode a value of the given type from the transfer form
pub fn decode_transfer(
    descriptor: &'static TypeDescriptor,
    buf: &mut OctetBuffer,
) -> CodecResult<Value> {
    match &descriptor.kind {
        TypeKind::Boolean => Ok(Value::Boolean(buf.pull_u8()? != 0)),
        TypeKind::Integer => {
            let len = pull_length(buf)?;
            let bytes = buf.pull_slice(len)?;
            Ok(Value::Integer(IntegerValue::from_signed_bytes_be(bytes)))
        }
        TypeKind::Float => {
            let bytes: [u8; 8] = buf.pull_slice(8)?.try_into().unwrap();
            Ok(Value::Float(f64::from_be_bytes(bytes)))
        }
        TypeKind::CharString => {
            let len = pull_length(buf)?;
            let bytes = buf.pull_slice(len)?;
            let text = std::str::from_utf8(bytes).map_err(|_| {
                CodecError::InvalidData(format!(
                    "charstring of type {} is not valid UTF-8",
                    descriptor.name
                ))
            })?;
            Ok(Value::from(text))
        }
        TypeKind::OctetString => {
            let len = pull_length(buf)?;
            Ok(Value::from(buf.pull_slice(len)?.to_vec()))
        }
        TypeKind::Record { fields, .. } => {
            let mut record = Record::new(fields.len());
            for (index, field_descr) in fields.iter().enumerate() {
                let field = if field_descr.optional {
                    match buf.pull_u8()? {
                        0 => Value::Omitted,
                        1 => decode_transfer(field_descr.ty, buf)?,
                        other => {
                            return Err(CodecError::InvalidData(format!(
                                "invalid presence marker {} for field {} of {}",
                                other, field_descr.name, descriptor.name
                            )));
                        }
                    }
                } else {
                    decode_transfer(field_descr.ty, buf)?
                };
                record.set_field(index, field)?;
            }
            Ok(Value::Record(record))
        }
        TypeKind::RecordOf { element, .. } => {
            let count = pull_length(buf)?;
            let mut sequence = RecordOf::new();
            for index in 0..count {
                *sequence.get_at_mut(index)? = decode_transfer(element, buf)?;
            }
            Ok(Value::RecordOf(sequence))
        }
        TypeKind::Empty => Ok(Value::EmptyRecord),
    }
}

fn put_length(buf: &mut OctetBuffer, len: usize) -> CodecResult<()> {
    let len = i32::try_from(len)
        .map_err(|_| CodecError::Internal(format!("transfer length {} overflows i32", len)))?;
    buf.put_slice(&len.to_be_bytes())
}

fn pull_length(buf: &mut OctetBuffer) -> CodecResult<usize> {
    let bytes: [u8; 4] = buf.pull_slice(4)?.try_into().unwrap();
    let len = i32::from_be_bytes(bytes);
    if len < 0 {
        return Err(CodecError::InvalidData(format!(
            "negative transfer length {}",
            len
        )));
    }
    Ok(len as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{self, FieldDescriptor, TypeDescriptor, TypeKind};

    static PAIR: TypeDescriptor = TypeDescriptor {
        name: "Pair",
        kind: TypeKind::Record {
            fields: &[
                FieldDescriptor {
                    name: "id",
                    ty: &descriptor::INTEGER,
                    optional: false,
                    default: None,
                },
                FieldDescriptor {
                    name: "note",
                    ty: &descriptor::CHARSTRING,
                    optional: true,
                    default: None,
                },
            ],
            is_set: false,
        },
        ber: None,
        raw: None,
        text: None,
        xer: None,
        json: None,
    };

    static INTS: TypeDescriptor = TypeDescriptor {
        name: "Ints",
        kind: TypeKind::RecordOf {
            element: &descriptor::INTEGER,
            is_set_of: false,
        },
        ber: None,
        raw: None,
        text: None,
        xer: None,
        json: None,
    };

    #[test]
    fn test_string_shape() {
        let mut buf = OctetBuffer::new();
        encode_transfer(&Value::from("ab"), &descriptor::CHARSTRING, &mut buf).unwrap();
        assert_eq!(buf.as_slice(), b"\x00\x00\x00\x02ab");
    }

    #[test]
    fn test_record_roundtrip_with_omitted_optional() {
        let value = Value::Record(Record::from_fields(vec![
            Value::from(300i64),
            Value::Omitted,
        ]));
        let mut buf = OctetBuffer::new();
        encode_transfer(&value, &PAIR, &mut buf).unwrap();
        let decoded = decode_transfer(&PAIR, &mut buf).unwrap();
        assert!(decoded.is_equal(&value));
    }

    #[test]
    fn test_record_of_roundtrip() {
        let value = Value::RecordOf(RecordOf::from_elements(vec![
            Value::from(1i64),
            Value::from(-40000i64),
        ]));
        let mut buf = OctetBuffer::new();
        encode_transfer(&value, &INTS, &mut buf).unwrap();
        let decoded = decode_transfer(&INTS, &mut buf).unwrap();
        assert!(decoded.is_equal(&value));
    }

    #[test]
    fn test_unbound_encode_is_error() {
        let mut buf = OctetBuffer::new();
        assert!(matches!(
            encode_transfer(&Value::Unbound, &descriptor::INTEGER, &mut buf).unwrap_err(),
            CodecError::Unbound(_)
        ));
    }

    #[test]
    fn test_truncated_decode_is_incomplete() {
        let mut buf = OctetBuffer::from_slice(b"\x00\x00\x00\x05ab");
        assert!(matches!(
            decode_transfer(&descriptor::CHARSTRING, &mut buf).unwrap_err(),
            CodecError::Incomplete(_)
        ));
    }
}
