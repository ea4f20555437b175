//! TEXT codec engine: token-framed character encodings
//!
//! A TEXT message is plain characters: optional begin/end tokens frame
//! each value, separators sit between record fields and sequence
//! elements, and the scalar content in between is decimal, hex or
//! verbatim text. Decoding is regular-expression driven; every token
//! either matches literally or through the pattern its descriptor
//! carries.

mod decoder;
mod encoder;

pub use decoder::TextDecoder;
pub use encoder::TextEncoder;

use ttcn3_value::descriptor::text::{TextDescriptor, TextToken};
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
    let mut out = Vec::new();
    TextEncoder::new(policy).encode(value, descriptor, &mut out, erroneous)?;
    Ok(out)
}

pub fn decode(
    data: &[u8],
    descriptor: &'static TypeDescriptor,
    policy: &ErrorPolicy,
) -> CodecResult<Value> {
    let input = std::str::from_utf8(data)
        .map_err(|_| CodecError::InvalidData("TEXT message is not valid UTF-8".to_string()))?;
    let mut decoder = TextDecoder::new(input, policy);
    let value = decoder.decode(descriptor, None)?;
    if decoder.has_remaining() {
        policy.dispatch(CodecError::Superfluous(format!(
            "{} characters after the end of the message",
            decoder.remaining().len()
        )))?;
    }
    Ok(value)
}

pub(super) fn require_text(
    descriptor: &'static TypeDescriptor,
) -> CodecResult<&'static TextDescriptor> {
    descriptor.text.ok_or(CodecError::NoCodec {
        format: "TEXT",
        type_name: descriptor.name,
    })
}

/// Decode-side pattern of a token, unanchored
pub(super) fn token_pattern(token: &TextToken) -> String {
    match token {
        TextToken::Literal(s) => regex::escape(s),
        TextToken::Pattern { pattern, .. } => (*pattern).to_string(),
    }
}
