//! RAW codec engine: positional bit-level layouts
//!
//! RAW messages carry no tags or delimiters; every field's width,
//! padding and bit order comes from its descriptor. Encoding appends
//! bits to a shared buffer, decoding walks the same layout forward.

mod decoder;
mod encoder;

pub use decoder::RawDecoder;
pub use encoder::RawEncoder;

use ttcn3_value::buffer::OctetBuffer;
use ttcn3_value::descriptor::TypeDescriptor;
use ttcn3_value::erroneous::ErroneousDescriptor;
use ttcn3_value::error::{CodecError, CodecResult, ErrorPolicy};
use ttcn3_value::value::Value;

pub fn encode(
    value: &Value,
    descriptor: &'static TypeDescriptor,
    policy: &ErrorPolicy,
    erroneous: Option<&ErroneousDescriptor>,
) -> CodecResult<Vec<u8>> {
    let mut buf = OctetBuffer::new();
    RawEncoder::new(policy).encode(value, descriptor, &mut buf, erroneous)?;
    // A message is always a whole number of octets on the wire
    buf.align_write();
    Ok(buf.into_vec())
}

pub fn decode(
    data: &[u8],
    descriptor: &'static TypeDescriptor,
    policy: &ErrorPolicy,
) -> CodecResult<Value> {
    let mut buf = OctetBuffer::from_slice(data);
    let value = RawDecoder::new(policy).decode(descriptor, &mut buf)?;
    // Up to seven trailing bits are alignment padding; whole octets are
    // someone else's data
    if buf.remaining_bits() >= 8 {
        policy.dispatch(CodecError::Superfluous(format!(
            "{} bits after the end of the message",
            buf.remaining_bits()
        )))?;
    }
    Ok(value)
}
