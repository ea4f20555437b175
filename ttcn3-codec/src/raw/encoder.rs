//! RAW encoder driven by type descriptors

use ttcn3_value::buffer::OctetBuffer;
use ttcn3_value::descriptor::raw::{ExtBit, RawAlign, RawDescriptor, RawOrder, RawSign};
use ttcn3_value::descriptor::{TypeDescriptor, TypeKind};
use ttcn3_value::erroneous::{ErroneousDescriptor, ErroneousValue, ValueOverride};
use ttcn3_value::error::{CodecError, CodecResult, ErrorPolicy};
use ttcn3_value::value::Value;

/// RAW encoder appending bits to a shared buffer
pub struct RawEncoder<'a> {
    policy: &'a ErrorPolicy,
}

impl<'a> RawEncoder<'a> {
    pub fn new(policy: &'a ErrorPolicy) -> Self {
        Self { policy }
    }

    pub fn encode(
        &self,
        value: &Value,
        descriptor: &'static TypeDescriptor,
        buf: &mut OctetBuffer,
        erroneous: Option<&ErroneousDescriptor>,
    ) -> CodecResult<()> {
        let raw = require_raw(descriptor)?;
        buf.pad_write_to(raw.prepadding);
        if !value.is_bound() {
            self.policy.dispatch(CodecError::Unbound(format!(
                "encoding an unbound value of type {}",
                descriptor.name
            )))?;
            // Survivable only for fixed-width fields, where zero filler
            // keeps the rest of the message in place
            put_zero_bits(buf, raw.fieldlength)?;
            buf.pad_write_to(raw.padding);
            return Ok(());
        }
        match &descriptor.kind {
            TypeKind::Boolean => {
                let width = raw.fieldlength.max(1);
                self.put_int_field(buf, value.as_bool()? as u64, width, raw)?;
            }
            TypeKind::Integer => self.encode_integer(value, descriptor, raw, buf)?,
            TypeKind::Float => {
                let float = value.as_float()?;
                match raw.fieldlength {
                    32 => self.put_int_field(buf, (float as f32).to_bits() as u64, 32, raw)?,
                    0 | 64 => self.put_int_field(buf, float.to_bits(), 64, raw)?,
                    other => {
                        return Err(CodecError::Internal(format!(
                            "float field width {} of type {}",
                            other, descriptor.name
                        )));
                    }
                }
            }
            TypeKind::CharString => {
                self.encode_bytes(value.as_str()?.as_bytes(), descriptor, raw, buf)?;
            }
            TypeKind::OctetString => {
                self.encode_bytes(value.as_octets()?, descriptor, raw, buf)?;
            }
            TypeKind::Record { fields, .. } => {
                let record = value.as_record()?;
                for (index, field_descr) in fields.iter().enumerate() {
                    if let Some(e) = erroneous {
                        if e.is_field_omitted(index) {
                            continue;
                        }
                    }
                    let over = erroneous.and_then(|e| e.override_for(index));
                    if let Some(over) = over {
                        if let Some(payload) = &over.before {
                            self.erroneous_bits(payload, buf)?;
                        }
                    }
                    match over.and_then(|o| o.value.as_ref()) {
                        Some(ValueOverride::Omit) => {}
                        Some(ValueOverride::Replace(payload)) => {
                            self.erroneous_bits(payload, buf)?;
                        }
                        None => {
                            let field = record.get_field(index)?;
                            // RAW has no presence markers; an omitted
                            // optional simply contributes no bits
                            if !matches!(field, Value::Omitted) {
                                let nested = over.and_then(|o| o.nested.as_deref());
                                self.encode(field, field_descr.ty, buf, nested)?;
                            }
                        }
                    }
                    if let Some(over) = over {
                        if let Some(payload) = &over.after {
                            self.erroneous_bits(payload, buf)?;
                        }
                    }
                }
            }
            TypeKind::RecordOf { element, .. } => {
                self.encode_record_of(value, descriptor, element, raw, buf, erroneous)?;
            }
            TypeKind::Empty => {}
        }
        buf.pad_write_to(raw.padding);
        Ok(())
    }

    fn encode_integer(
        &self,
        value: &Value,
        descriptor: &'static TypeDescriptor,
        raw: &RawDescriptor,
        buf: &mut OctetBuffer,
    ) -> CodecResult<()> {
        let width = if raw.fieldlength == 0 {
            8
        } else {
            raw.fieldlength
        };
        let int = value.as_integer()?;
        let Some(native) = int.to_i64() else {
            return Err(CodecError::Constraint(format!(
                "integer {} of type {} does not fit a RAW field",
                int, descriptor.name
            )));
        };
        let bits = match raw.comp {
            RawSign::NoSign => {
                if native < 0 {
                    self.policy.dispatch(CodecError::Constraint(format!(
                        "negative value {} in unsigned field of {}",
                        native, descriptor.name
                    )))?;
                }
                if !fits_unsigned(native, width) {
                    self.range_warning(native, width, descriptor)?;
                }
                native as u64
            }
            RawSign::TwosCompl => {
                if !fits_signed(native, width) {
                    self.range_warning(native, width, descriptor)?;
                }
                native as u64
            }
            RawSign::SignBit => {
                let magnitude = native.unsigned_abs();
                if width == 0 || magnitude >> (width - 1).min(63) > 0 {
                    self.range_warning(native, width, descriptor)?;
                }
                let sign = (native < 0) as u64;
                (sign << (width - 1)) | (magnitude & low_mask(width - 1))
            }
        };
        self.put_int_field(buf, bits & low_mask(width), width, raw)
    }

    fn range_warning(
        &self,
        value: i64,
        width: usize,
        descriptor: &'static TypeDescriptor,
    ) -> CodecResult<()> {
        self.policy.dispatch(CodecError::Constraint(format!(
            "value {} of type {} does not fit {} bits",
            value, descriptor.name, width
        )))
    }

    fn encode_bytes(
        &self,
        bytes: &[u8],
        descriptor: &'static TypeDescriptor,
        raw: &RawDescriptor,
        buf: &mut OctetBuffer,
    ) -> CodecResult<()> {
        if raw.fieldlength == 0 {
            return buf.put_bit_slice(bytes, bytes.len() * 8);
        }
        if bytes.len() * 8 > raw.fieldlength {
            self.policy.dispatch(CodecError::Constraint(format!(
                "{} octets of type {} truncated to a {}-bit field",
                bytes.len(),
                descriptor.name,
                raw.fieldlength
            )))?;
            return buf.put_bit_slice(bytes, raw.fieldlength);
        }
        let filler_bits = raw.fieldlength - bytes.len() * 8;
        match raw.align {
            RawAlign::Left => {
                buf.put_bit_slice(bytes, bytes.len() * 8)?;
                put_zero_bits(buf, filler_bits)?;
            }
            RawAlign::Right => {
                put_zero_bits(buf, filler_bits)?;
                buf.put_bit_slice(bytes, bytes.len() * 8)?;
            }
        }
        Ok(())
    }

    fn encode_record_of(
        &self,
        value: &Value,
        descriptor: &'static TypeDescriptor,
        element: &'static TypeDescriptor,
        raw: &RawDescriptor,
        buf: &mut OctetBuffer,
        erroneous: Option<&ErroneousDescriptor>,
    ) -> CodecResult<()> {
        let sequence = value.as_record_of()?;
        if let Some(expected) = raw.repeat_count {
            if sequence.len() != expected {
                self.policy.dispatch(CodecError::Constraint(format!(
                    "type {} expects {} elements, value has {}",
                    descriptor.name,
                    expected,
                    sequence.len()
                )))?;
            }
        }
        let count = sequence.len();
        for (index, elem) in sequence.iter().enumerate() {
            if let Some(e) = erroneous {
                if e.is_field_omitted(index) {
                    continue;
                }
            }
            let over = erroneous.and_then(|e| e.override_for(index));
            if let Some(over) = over {
                if let Some(payload) = &over.before {
                    self.erroneous_bits(payload, buf)?;
                }
            }
            match over.and_then(|o| o.value.as_ref()) {
                Some(ValueOverride::Omit) => {}
                Some(ValueOverride::Replace(payload)) => {
                    self.erroneous_bits(payload, buf)?;
                }
                None => {
                    let nested = over.and_then(|o| o.nested.as_deref());
                    self.encode(elem, element, buf, nested)?;
                }
            }
            if let Some(over) = over {
                if let Some(payload) = &over.after {
                    self.erroneous_bits(payload, buf)?;
                }
            }
            let more = index + 1 < count;
            match raw.extension_bit {
                ExtBit::No => {}
                ExtBit::Yes => buf.put_bits(more as u64, 1, true)?,
                ExtBit::Reverse => buf.put_bits(!more as u64, 1, true)?,
            }
        }
        Ok(())
    }

    /// Write an integer-shaped field honoring bit and byte order
    fn put_int_field(
        &self,
        buf: &mut OctetBuffer,
        bits: u64,
        width: usize,
        raw: &RawDescriptor,
    ) -> CodecResult<()> {
        let msb_first = raw.bitorder == RawOrder::Msb;
        if raw.byteorder == RawOrder::Lsb && width % 8 == 0 && width > 8 {
            for i in 0..width / 8 {
                buf.put_bits((bits >> (i * 8)) & 0xFF, 8, msb_first)?;
            }
            Ok(())
        } else {
            buf.put_bits(bits, width, msb_first)
        }
    }

    fn erroneous_bits(&self, payload: &ErroneousValue, buf: &mut OctetBuffer) -> CodecResult<()> {
        payload.check()?;
        match payload {
            ErroneousValue::Raw(bytes) => buf.put_bit_slice(bytes, bytes.len() * 8),
            ErroneousValue::Typed { value, descriptor } => {
                self.encode(value, descriptor, buf, None)
            }
        }
    }
}

pub(super) fn require_raw(
    descriptor: &'static TypeDescriptor,
) -> CodecResult<&'static RawDescriptor> {
    descriptor.raw.ok_or(CodecError::NoCodec {
        format: "RAW",
        type_name: descriptor.name,
    })
}

pub(super) fn low_mask(width: usize) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

pub(super) fn fits_unsigned(value: i64, width: usize) -> bool {
    value >= 0 && (width >= 64 || (value as u64) <= low_mask(width))
}

pub(super) fn fits_signed(value: i64, width: usize) -> bool {
    if width >= 64 {
        return true;
    }
    let half = 1i64 << (width - 1);
    value >= -half && value < half
}

/// Zero filler of any width
fn put_zero_bits(buf: &mut OctetBuffer, mut count: usize) -> CodecResult<()> {
    while count > 0 {
        let chunk = count.min(64);
        buf.put_bits(0, chunk, true)?;
        count -= chunk;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fits() {
        assert!(fits_signed(-128, 8));
        assert!(!fits_signed(128, 8));
        assert!(fits_unsigned(255, 8));
        assert!(!fits_unsigned(-1, 8));
    }

    #[test]
    fn test_integer_eight_bits() {
        let policy = ErrorPolicy::new();
        let mut buf = OctetBuffer::new();
        RawEncoder::new(&policy)
            .encode(
                &Value::from(-2i64),
                &ttcn3_value::descriptor::INTEGER,
                &mut buf,
                None,
            )
            .unwrap();
        assert_eq!(buf.as_slice(), &[0xFE]);
    }
}
