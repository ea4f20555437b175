//! BER encoder driven by type descriptors

use ttcn3_value::descriptor::ber::{BerDescriptor, BerTag};
use ttcn3_value::descriptor::{FieldDescriptor, TypeDescriptor, TypeKind};
use ttcn3_value::erroneous::{ErroneousDescriptor, ErroneousValue, ValueOverride};
use ttcn3_value::error::{CodecError, CodecResult, ErrorPolicy};
use ttcn3_value::value::Value;

use super::types::{encode_tag, BerLength};
use super::BerVariant;

/// CER fragments primitive string content longer than this
const FRAGMENT_SIZE: usize = 1000;

/// BER/CER/DER encoder
///
/// Encoding works bottom-up: the content octets of a value are produced
/// first, then wrapped in the tag chain of its descriptor. Under CER
/// every constructed wrapper uses the indefinite length form.
pub struct BerEncoder<'a> {
    variant: BerVariant,
    policy: &'a ErrorPolicy,
}

impl<'a> BerEncoder<'a> {
    pub fn new(variant: BerVariant, policy: &'a ErrorPolicy) -> Self {
        Self { variant, policy }
    }

    /// Encode a value into a complete TLV
    pub fn encode(
        &self,
        value: &Value,
        descriptor: &'static TypeDescriptor,
        erroneous: Option<&ErroneousDescriptor>,
    ) -> CodecResult<Vec<u8>> {
        let ber = require_ber(descriptor)?;
        if !value.is_bound() {
            // An unbound value cannot produce content; a warning policy
            // still gets a well-formed zero-length TLV so the rest of
            // the message survives.
            self.policy.dispatch(CodecError::Unbound(format!(
                "encoding an unbound value of type {}",
                descriptor.name
            )))?;
            return Ok(self.wrap(ber, Vec::new(), descriptor.is_record() || descriptor.is_record_of()));
        }
        let (content, constructed) = self.encode_content(value, descriptor, erroneous)?;
        Ok(self.wrap(ber, content, constructed))
    }

    /// Content octets of a value, plus whether they are constructed
    fn encode_content(
        &self,
        value: &Value,
        descriptor: &'static TypeDescriptor,
        erroneous: Option<&ErroneousDescriptor>,
    ) -> CodecResult<(Vec<u8>, bool)> {
        match &descriptor.kind {
            TypeKind::Boolean => {
                // X.690 11.1: canonical true is 0xFF
                Ok((vec![if value.as_bool()? { 0xFF } else { 0x00 }], false))
            }
            TypeKind::Integer => Ok((value.as_integer()?.to_signed_bytes_be(), false)),
            TypeKind::Float => Ok((encode_real(value.as_float()?), false)),
            TypeKind::CharString => self.string_content(value.as_str()?.as_bytes()),
            TypeKind::OctetString => self.string_content(value.as_octets()?),
            TypeKind::Record { fields, is_set } => {
                self.record_content(value, descriptor, fields, *is_set, erroneous)
            }
            TypeKind::RecordOf { element, is_set_of } => {
                self.record_of_content(value, element, *is_set_of, erroneous)
            }
            TypeKind::Empty => Ok((Vec::new(), true)),
        }
    }

    /// String content, fragmented under CER when it exceeds the limit
    ///
    /// Fragments are primitive OCTET STRING segments inside a
    /// constructed wrapper, per X.690 9.2.
    fn string_content(&self, bytes: &[u8]) -> CodecResult<(Vec<u8>, bool)> {
        if self.variant != BerVariant::Cer || bytes.len() <= FRAGMENT_SIZE {
            return Ok((bytes.to_vec(), false));
        }
        let segment_tag = BerTag::universal(false, 4);
        let mut out = Vec::with_capacity(bytes.len() + bytes.len() / FRAGMENT_SIZE * 4);
        for chunk in bytes.chunks(FRAGMENT_SIZE) {
            out.extend_from_slice(&encode_tag(&segment_tag, false));
            out.extend_from_slice(&BerLength::Definite(chunk.len()).encode());
            out.extend_from_slice(chunk);
        }
        Ok((out, true))
    }

    fn record_content(
        &self,
        value: &Value,
        descriptor: &'static TypeDescriptor,
        fields: &'static [FieldDescriptor],
        is_set: bool,
        erroneous: Option<&ErroneousDescriptor>,
    ) -> CodecResult<(Vec<u8>, bool)> {
        let record = value.as_record()?;
        if record.field_count() != fields.len() {
            return Err(CodecError::Internal(format!(
                "value of type {} has {} fields, descriptor says {}",
                descriptor.name,
                record.field_count(),
                fields.len()
            )));
        }
        let mut pieces: Vec<(BerTag, Vec<u8>)> = Vec::with_capacity(fields.len());
        for (index, field_descr) in fields.iter().enumerate() {
            if let Some(e) = erroneous {
                if e.is_field_omitted(index) {
                    continue;
                }
            }
            let over = erroneous.and_then(|e| e.override_for(index));
            let field_tag = require_ber(field_descr.ty)?.outer_tag();
            if let Some(over) = over {
                if let Some(payload) = &over.before {
                    pieces.push((field_tag, self.erroneous_bytes(payload)?));
                }
            }
            match over.and_then(|o| o.value.as_ref()) {
                Some(ValueOverride::Omit) => {}
                Some(ValueOverride::Replace(payload)) => {
                    pieces.push((field_tag, self.erroneous_bytes(payload)?));
                }
                None => {
                    let field = record.get_field(index)?;
                    let skip = match field {
                        Value::Omitted if field_descr.optional => true,
                        _ => self.field_matches_default(field, field_descr),
                    };
                    if !skip {
                        let nested = over.and_then(|o| o.nested.as_deref());
                        let tlv = self.encode(field, field_descr.ty, nested)?;
                        pieces.push((field_tag, tlv));
                    }
                }
            }
            if let Some(over) = over {
                if let Some(payload) = &over.after {
                    pieces.push((field_tag, self.erroneous_bytes(payload)?));
                }
            }
        }
        // Canonical set ordering only applies to untampered output; an
        // overlay deliberately produces a non-canonical message.
        if is_set && self.variant != BerVariant::Ber && erroneous.is_none() {
            pieces.sort_by_key(|(tag, _)| tag.order_key());
        }
        let mut content = Vec::new();
        for (_, tlv) in pieces {
            content.extend_from_slice(&tlv);
        }
        Ok((content, true))
    }

    /// DER leaves out a field whose value equals its default
    fn field_matches_default(&self, field: &Value, field_descr: &FieldDescriptor) -> bool {
        if self.variant != BerVariant::Der {
            return false;
        }
        match field_descr.default {
            Some(default) => field.is_equal(&default()),
            None => false,
        }
    }

    fn record_of_content(
        &self,
        value: &Value,
        element: &'static TypeDescriptor,
        is_set_of: bool,
        erroneous: Option<&ErroneousDescriptor>,
    ) -> CodecResult<(Vec<u8>, bool)> {
        let sequence = value.as_record_of()?;
        let mut content = Vec::new();
        let mut encoded: Vec<Vec<u8>> = Vec::with_capacity(sequence.len());
        for (index, elem) in sequence.iter().enumerate() {
            let over = erroneous.and_then(|e| e.override_for(index));
            if let Some(e) = erroneous {
                if e.is_field_omitted(index) {
                    continue;
                }
            }
            if let Some(over) = over {
                if let Some(payload) = &over.before {
                    encoded.push(self.erroneous_bytes(payload)?);
                }
            }
            match over.and_then(|o| o.value.as_ref()) {
                Some(ValueOverride::Omit) => {}
                Some(ValueOverride::Replace(payload)) => {
                    encoded.push(self.erroneous_bytes(payload)?);
                }
                None => {
                    let nested = over.and_then(|o| o.nested.as_deref());
                    encoded.push(self.encode(elem, element, nested)?);
                }
            }
            if let Some(over) = over {
                if let Some(payload) = &over.after {
                    encoded.push(self.erroneous_bytes(payload)?);
                }
            }
        }
        // Canonical set-of ordering sorts the encodings themselves
        if is_set_of && self.variant != BerVariant::Ber && erroneous.is_none() {
            encoded.sort();
        }
        for tlv in encoded {
            content.extend_from_slice(&tlv);
        }
        Ok((content, true))
    }

    /// Octets produced by an overlay payload
    fn erroneous_bytes(&self, payload: &ErroneousValue) -> CodecResult<Vec<u8>> {
        payload.check()?;
        match payload {
            ErroneousValue::Raw(bytes) => Ok(bytes.clone()),
            ErroneousValue::Typed { value, descriptor } => self.encode(value, descriptor, None),
        }
    }

    /// Wrap content octets in the tag chain, innermost tag first
    fn wrap(&self, ber: &BerDescriptor, content: Vec<u8>, constructed: bool) -> Vec<u8> {
        let mut current = content;
        for (depth, tag) in ber.tags.iter().rev().enumerate() {
            // Outer tags of an explicit tagging chain are always
            // constructed, whatever their descriptor says
            let is_constructed = if depth == 0 {
                constructed || tag.constructed
            } else {
                true
            };
            current = self.wrap_one(tag, current, is_constructed);
        }
        current
    }

    fn wrap_one(&self, tag: &BerTag, content: Vec<u8>, constructed: bool) -> Vec<u8> {
        let mut out = encode_tag(tag, constructed);
        if constructed && self.variant == BerVariant::Cer {
            out.extend_from_slice(&BerLength::Indefinite.encode());
            out.extend_from_slice(&content);
            out.extend_from_slice(&[0x00, 0x00]);
        } else {
            out.extend_from_slice(&BerLength::Definite(content.len()).encode());
            out.extend_from_slice(&content);
        }
        out
    }
}

pub(super) fn require_ber(
    descriptor: &'static TypeDescriptor,
) -> CodecResult<&'static BerDescriptor> {
    descriptor.ber.ok_or(CodecError::NoCodec {
        format: "BER",
        type_name: descriptor.name,
    })
}

/// Encode an f64 as X.690 REAL content octets
///
/// Finite nonzero values use the base-2 binary form with the mantissa
/// normalized to odd, which is the canonical choice and valid plain BER
/// as well. Zero encodes as empty content, the specials as their
/// dedicated single octets.
pub(super) fn encode_real(value: f64) -> Vec<u8> {
    if value == 0.0 {
        return if value.is_sign_negative() {
            vec![0x43]
        } else {
            Vec::new()
        };
    }
    if value.is_infinite() {
        return vec![if value > 0.0 { 0x40 } else { 0x41 }];
    }
    if value.is_nan() {
        return vec![0x42];
    }

    let bits = value.to_bits();
    let negative = bits >> 63 == 1;
    let raw_exponent = ((bits >> 52) & 0x7FF) as i32;
    let fraction = bits & 0x000F_FFFF_FFFF_FFFF;
    let (mut mantissa, mut exponent) = if raw_exponent == 0 {
        (fraction, -1074i32)
    } else {
        (fraction | (1 << 52), raw_exponent - 1075)
    };
    while mantissa & 1 == 0 {
        mantissa >>= 1;
        exponent += 1;
    }

    let exponent_octets = minimal_signed_bytes(exponent as i64);
    let mut out = vec![0x80 | (negative as u8) << 6 | (exponent_octets.len() as u8 - 1)];
    out.extend_from_slice(&exponent_octets);

    let mut mantissa_octets = Vec::new();
    while mantissa > 0 {
        mantissa_octets.push((mantissa & 0xFF) as u8);
        mantissa >>= 8;
    }
    mantissa_octets.reverse();
    out.extend_from_slice(&mantissa_octets);
    out
}

fn minimal_signed_bytes(value: i64) -> Vec<u8> {
    let mut bytes = value.to_be_bytes().to_vec();
    while bytes.len() > 1 {
        let drop = (bytes[0] == 0x00 && bytes[1] & 0x80 == 0)
            || (bytes[0] == 0xFF && bytes[1] & 0x80 != 0);
        if !drop {
            break;
        }
        bytes.remove(0);
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_tlv() {
        let policy = ErrorPolicy::new();
        let encoder = BerEncoder::new(BerVariant::Ber, &policy);
        let bytes = encoder
            .encode(
                &Value::from(127i64),
                &ttcn3_value::descriptor::INTEGER,
                None,
            )
            .unwrap();
        assert_eq!(bytes, vec![0x02, 0x01, 0x7F]);
    }

    #[test]
    fn test_boolean_canonical_true() {
        let policy = ErrorPolicy::new();
        let encoder = BerEncoder::new(BerVariant::Der, &policy);
        let bytes = encoder
            .encode(&Value::from(true), &ttcn3_value::descriptor::BOOLEAN, None)
            .unwrap();
        assert_eq!(bytes, vec![0x01, 0x01, 0xFF]);
    }

    #[test]
    fn test_real_one_half() {
        // 0.5 = 1 * 2^-1
        assert_eq!(encode_real(0.5), vec![0x80, 0xFF, 0x01]);
    }

    #[test]
    fn test_real_specials() {
        assert_eq!(encode_real(0.0), Vec::<u8>::new());
        assert_eq!(encode_real(f64::INFINITY), vec![0x40]);
        assert_eq!(encode_real(f64::NEG_INFINITY), vec![0x41]);
        assert_eq!(encode_real(f64::NAN), vec![0x42]);
        assert_eq!(encode_real(-0.0), vec![0x43]);
    }

    #[test]
    fn test_cer_uses_indefinite_length_for_constructed() {
        let policy = ErrorPolicy::new();
        let encoder = BerEncoder::new(BerVariant::Cer, &policy);
        let long = "x".repeat(2500);
        let bytes = encoder
            .encode(
                &Value::from(long.as_str()),
                &ttcn3_value::descriptor::CHARSTRING,
                None,
            )
            .unwrap();
        // Constructed IA5String, indefinite length, three fragments
        assert_eq!(bytes[0], 0x36);
        assert_eq!(bytes[1], 0x80);
        assert_eq!(&bytes[bytes.len() - 2..], &[0x00, 0x00]);
    }
}
