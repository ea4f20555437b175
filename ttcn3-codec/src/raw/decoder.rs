//! RAW decoder driven by type descriptors

use log::warn;
use ttcn3_value::buffer::OctetBuffer;
use ttcn3_value::descriptor::raw::{ExtBit, RawAlign, RawDescriptor, RawOrder, RawSign};
use ttcn3_value::descriptor::{TypeDescriptor, TypeKind};
use ttcn3_value::error::{CodecError, CodecResult, ErrorPolicy};
use ttcn3_value::value::{IntegerValue, Record, RecordOf, Value};

use super::encoder::{low_mask, require_raw};

/// RAW decoder walking a bit-addressable buffer
pub struct RawDecoder<'a> {
    policy: &'a ErrorPolicy,
}

impl<'a> RawDecoder<'a> {
    pub fn new(policy: &'a ErrorPolicy) -> Self {
        Self { policy }
    }

    pub fn decode(
        &self,
        descriptor: &'static TypeDescriptor,
        buf: &mut OctetBuffer,
    ) -> CodecResult<Value> {
        let raw = require_raw(descriptor)?;
        buf.pad_read_to(raw.prepadding);
        let value = match &descriptor.kind {
            TypeKind::Boolean => {
                let width = raw.fieldlength.max(1);
                Value::Boolean(self.read_int_field(buf, width, raw)? != 0)
            }
            TypeKind::Integer => self.decode_integer(raw, buf)?,
            TypeKind::Float => match raw.fieldlength {
                32 => {
                    let bits = self.read_int_field(buf, 32, raw)? as u32;
                    Value::Float(f32::from_bits(bits) as f64)
                }
                0 | 64 => {
                    let bits = self.read_int_field(buf, 64, raw)?;
                    Value::Float(f64::from_bits(bits))
                }
                other => {
                    return Err(CodecError::Internal(format!(
                        "float field width {} of type {}",
                        other, descriptor.name
                    )));
                }
            },
            TypeKind::CharString => {
                let bytes = self.decode_bytes(raw, buf)?;
                // Filler octets of a fixed-width field are not payload
                let trimmed = match raw.align {
                    RawAlign::Left => {
                        let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
                        &bytes[..end]
                    }
                    RawAlign::Right => {
                        let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
                        &bytes[start..]
                    }
                };
                if std::str::from_utf8(trimmed).is_err() {
                    self.policy.dispatch(CodecError::InvalidData(format!(
                        "charstring content of type {} is not valid UTF-8",
                        descriptor.name
                    )))?;
                }
                Value::from(String::from_utf8_lossy(trimmed).into_owned())
            }
            TypeKind::OctetString => Value::from(self.decode_bytes(raw, buf)?),
            TypeKind::Record { fields, .. } => {
                let mut record = Record::new(fields.len());
                for (index, field_descr) in fields.iter().enumerate() {
                    // Without presence markers an optional field is only
                    // recognizable by the buffer running dry
                    if field_descr.optional && !buf.has_remaining() {
                        record.set_field(index, Value::Omitted)?;
                        continue;
                    }
                    let field = self.decode(field_descr.ty, buf)?;
                    record.set_field(index, field)?;
                }
                Value::Record(record)
            }
            TypeKind::RecordOf { element, .. } => {
                self.decode_record_of(descriptor, element, raw, buf)?
            }
            TypeKind::Empty => Value::EmptyRecord,
        };
        buf.pad_read_to(raw.padding);
        Ok(value)
    }

    fn decode_integer(&self, raw: &RawDescriptor, buf: &mut OctetBuffer) -> CodecResult<Value> {
        let width = if raw.fieldlength == 0 {
            8
        } else {
            raw.fieldlength
        };
        let bits = self.read_int_field(buf, width, raw)?;
        let value = match raw.comp {
            RawSign::NoSign => bits as i64,
            RawSign::TwosCompl => {
                if width < 64 && bits & (1 << (width - 1)) != 0 {
                    (bits | !low_mask(width)) as i64
                } else {
                    bits as i64
                }
            }
            RawSign::SignBit => {
                let magnitude = (bits & low_mask(width - 1)) as i64;
                if bits >> (width - 1) & 1 != 0 {
                    -magnitude
                } else {
                    magnitude
                }
            }
        };
        Ok(Value::Integer(IntegerValue::Native(value)))
    }

    fn decode_bytes(&self, raw: &RawDescriptor, buf: &mut OctetBuffer) -> CodecResult<Vec<u8>> {
        if raw.fieldlength > 0 {
            return buf.read_bit_slice(raw.fieldlength);
        }
        // Variable width: the field extends to the end of the buffer
        let bits = buf.remaining_bits() / 8 * 8;
        buf.read_bit_slice(bits)
    }

    fn decode_record_of(
        &self,
        descriptor: &'static TypeDescriptor,
        element: &'static TypeDescriptor,
        raw: &RawDescriptor,
        buf: &mut OctetBuffer,
    ) -> CodecResult<Value> {
        let mut sequence = RecordOf::new();

        if let Some(count) = raw.repeat_count {
            for index in 0..count {
                *sequence.get_at_mut(index)? = self.decode(element, buf)?;
            }
            return Ok(Value::RecordOf(sequence));
        }

        if raw.extension_bit != ExtBit::No {
            let mut index = 0;
            loop {
                *sequence.get_at_mut(index)? = self.decode(element, buf)?;
                index += 1;
                let marker = buf.read_bits(1, true)? != 0;
                let more = match raw.extension_bit {
                    ExtBit::Yes => marker,
                    ExtBit::Reverse => !marker,
                    ExtBit::No => unreachable!(),
                };
                if !more {
                    break;
                }
            }
            return Ok(Value::RecordOf(sequence));
        }

        // Open-ended sequence: elements until the buffer runs out. When
        // an element fails mid-stream the already decoded prefix is kept
        // and the buffer is rewound to the failure point.
        let mut index = 0;
        while buf.has_remaining() {
            let mark = buf.bit_pos();
            // Fewer than eight leftover bits are alignment filler
            if buf.remaining_bits() < 8 && index > 0 {
                break;
            }
            match self.decode(element, buf) {
                Ok(element_value) => {
                    *sequence.get_at_mut(index)? = element_value;
                    index += 1;
                }
                Err(error) if index > 0 => {
                    warn!(
                        "element {} of {} failed to decode ({}); keeping {} elements",
                        index, descriptor.name, error, index
                    );
                    buf.set_bit_pos(mark);
                    break;
                }
                Err(error) => return Err(error),
            }
        }
        Ok(Value::RecordOf(sequence))
    }

    /// Read an integer-shaped field honoring bit and byte order
    fn read_int_field(
        &self,
        buf: &mut OctetBuffer,
        width: usize,
        raw: &RawDescriptor,
    ) -> CodecResult<u64> {
        let msb_first = raw.bitorder == RawOrder::Msb;
        if raw.byteorder == RawOrder::Lsb && width % 8 == 0 && width > 8 {
            let mut value = 0u64;
            for i in 0..width / 8 {
                value |= buf.read_bits(8, msb_first)? << (i * 8);
            }
            Ok(value)
        } else {
            buf.read_bits(width, msb_first)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::encoder::RawEncoder;
    use super::*;
    use ttcn3_value::descriptor::raw::{ExtBit, RawDescriptor, RawSign};
    use ttcn3_value::descriptor::{self, FieldDescriptor, TypeDescriptor, TypeKind};

    static NIBBLE_RAW: RawDescriptor = RawDescriptor {
        fieldlength: 4,
        ..RawDescriptor::DEFAULT
    };

    static NIBBLE: TypeDescriptor = TypeDescriptor {
        name: "Nibble",
        kind: TypeKind::Integer,
        ber: None,
        raw: Some(&NIBBLE_RAW),
        text: None,
        xer: None,
        json: None,
    };

    static TWELVE_RAW: RawDescriptor = RawDescriptor {
        fieldlength: 12,
        comp: RawSign::TwosCompl,
        ..RawDescriptor::DEFAULT
    };

    static TWELVE: TypeDescriptor = TypeDescriptor {
        name: "Twelve",
        kind: TypeKind::Integer,
        ber: None,
        raw: Some(&TWELVE_RAW),
        text: None,
        xer: None,
        json: None,
    };

    static HEADER_RAW: RawDescriptor = RawDescriptor::DEFAULT;

    static HEADER: TypeDescriptor = TypeDescriptor {
        name: "Header",
        kind: TypeKind::Record {
            fields: &[
                FieldDescriptor {
                    name: "version",
                    ty: &NIBBLE,
                    optional: false,
                    default: None,
                },
                FieldDescriptor {
                    name: "kind",
                    ty: &NIBBLE,
                    optional: false,
                    default: None,
                },
                FieldDescriptor {
                    name: "length",
                    ty: &TWELVE,
                    optional: false,
                    default: None,
                },
            ],
            is_set: false,
        },
        ber: None,
        raw: Some(&HEADER_RAW),
        text: None,
        xer: None,
        json: None,
    };

    static EXT_LIST_RAW: RawDescriptor = RawDescriptor {
        extension_bit: ExtBit::Yes,
        ..RawDescriptor::DEFAULT
    };

    static BYTES_RAW: RawDescriptor = RawDescriptor::DEFAULT;

    static BYTE_LIST: TypeDescriptor = TypeDescriptor {
        name: "ByteList",
        kind: TypeKind::RecordOf {
            element: &descriptor::INTEGER,
            is_set_of: false,
        },
        ber: None,
        raw: Some(&EXT_LIST_RAW),
        text: None,
        xer: None,
        json: None,
    };

    static PLAIN_LIST: TypeDescriptor = TypeDescriptor {
        name: "PlainList",
        kind: TypeKind::RecordOf {
            element: &TWELVE,
            is_set_of: false,
        },
        ber: None,
        raw: Some(&BYTES_RAW),
        text: None,
        xer: None,
        json: None,
    };

    fn record(fields: Vec<Value>) -> Value {
        Value::Record(Record::from_fields(fields))
    }

    #[test]
    fn test_packed_header_layout_is_deterministic() {
        // 4-bit version, 4-bit kind, 12-bit length: 20 bits, padded to 3
        // octets on the wire
        let value = record(vec![
            Value::from(2i64),
            Value::from(0xBi64),
            Value::from(0x123i64),
        ]);
        let policy = ErrorPolicy::new();
        let encoded = super::super::encode(&value, &HEADER, &policy, None).unwrap();
        assert_eq!(encoded, vec![0x2B, 0x12, 0x30]);

        let decoded = super::super::decode(&encoded, &HEADER, &policy).unwrap();
        assert!(decoded.is_equal(&value));
    }

    #[test]
    fn test_extension_bit_list_roundtrip() {
        let value = Value::RecordOf(RecordOf::from_elements(vec![
            Value::from(10i64),
            Value::from(20i64),
            Value::from(30i64),
        ]));
        let policy = ErrorPolicy::new();
        let encoded = super::super::encode(&value, &BYTE_LIST, &policy, None).unwrap();
        let decoded = super::super::decode(&encoded, &BYTE_LIST, &policy).unwrap();
        assert!(decoded.is_equal(&value));
    }

    #[test]
    fn decode_record_of_keeps_prefix_on_element_failure() {
        // Two full 12-bit elements, then 8 stray bits that cannot form a
        // third one
        let mut buf = OctetBuffer::new();
        buf.put_bits(0x001, 12, true).unwrap();
        buf.put_bits(0x002, 12, true).unwrap();
        buf.put_bits(0xAB, 8, true).unwrap();
        let data = buf.into_vec();

        let policy = ErrorPolicy::new();
        let decoded = super::super::decode(&data, &PLAIN_LIST, &policy);
        // The stray octet is superfluous under the default policy
        assert!(decoded.is_err());

        let mut lenient = ErrorPolicy::new();
        lenient.set(
            ttcn3_value::error::ErrorKind::Superfluous,
            ttcn3_value::error::ErrorSeverity::Warning,
        );
        let decoded = super::super::decode(&data, &PLAIN_LIST, &lenient).unwrap();
        let seq = decoded.as_record_of().unwrap();
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.get_at(0).unwrap().as_i64().unwrap(), 1);
    }

    #[test]
    fn test_signed_twelve_bit_roundtrip() {
        let policy = ErrorPolicy::new();
        let encoded =
            super::super::encode(&Value::from(-5i64), &TWELVE, &policy, None).unwrap();
        let decoded = super::super::decode(&encoded, &TWELVE, &policy).unwrap();
        assert_eq!(decoded.as_i64().unwrap(), -5);
    }

    #[test]
    fn test_unbound_field_is_fatal_by_default() {
        let value = record(vec![Value::from(1i64), Value::Unbound, Value::from(7i64)]);
        let policy = ErrorPolicy::new();
        let mut buf = OctetBuffer::new();
        let result = RawEncoder::new(&policy).encode(&value, &HEADER, &mut buf, None);
        assert!(matches!(result.unwrap_err(), CodecError::Unbound(_)));
    }
}
