//! BER codec engine (ITU-T X.690)
//!
//! Covers the plain BER rules plus the two canonical restrictions: CER
//! (indefinite lengths for constructed values, long strings fragmented)
//! and DER (definite lengths, set members sorted, defaulted fields
//! omitted). One engine serves all three; the variant only changes the
//! length form, ordering and fragmentation decisions.

pub mod types;

mod decoder;
mod encoder;

pub use decoder::BerDecoder;
pub use encoder::BerEncoder;

use ttcn3_value::descriptor::TypeDescriptor;
use ttcn3_value::erroneous::ErroneousDescriptor;
use ttcn3_value::error::{CodecError, CodecResult, ErrorPolicy};
use ttcn3_value::value::Value;

/// Encoding rule variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BerVariant {
    Ber,
    Cer,
    Der,
}

pub fn encode(
    value: &Value,
    descriptor: &'static TypeDescriptor,
    variant: BerVariant,
    policy: &ErrorPolicy,
    erroneous: Option<&ErroneousDescriptor>,
) -> CodecResult<Vec<u8>> {
    BerEncoder::new(variant, policy).encode(value, descriptor, erroneous)
}

pub fn decode(
    data: &[u8],
    descriptor: &'static TypeDescriptor,
    variant: BerVariant,
    policy: &ErrorPolicy,
) -> CodecResult<Value> {
    let mut decoder = BerDecoder::new(data, variant, policy);
    let value = decoder.decode(descriptor)?;
    if decoder.has_remaining() {
        policy.dispatch(CodecError::Superfluous(format!(
            "{} octets after the end of the message",
            decoder.remaining()
        )))?;
    }
    Ok(value)
}
