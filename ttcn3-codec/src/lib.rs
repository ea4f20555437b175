//! Codec engines for the TTCN-3 runtime
//!
//! Five wire formats share one entry point: a value plus its type
//! descriptor go in, octets come out, and the descriptor's per-format
//! sub-descriptor drives the engine. A type without a sub-descriptor for
//! the requested format cannot be encoded in it at all.

pub mod ber;
pub mod json;
pub mod raw;
pub mod text;
pub mod xer;

use ttcn3_value::descriptor::TypeDescriptor;
use ttcn3_value::erroneous::ErroneousDescriptor;
use ttcn3_value::error::{CodecError, CodecResult, ErrorPolicy};
use ttcn3_value::value::Value;

pub use ber::BerVariant;
pub use xer::XerFlavor;

/// Wire format selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecFormat {
    Ber(BerVariant),
    Raw,
    Text,
    Xer(XerFlavor),
    Json {
        /// Indented multi-line output instead of the compact form
        pretty: bool,
    },
}

impl CodecFormat {
    pub fn name(&self) -> &'static str {
        match self {
            CodecFormat::Ber(_) => "BER",
            CodecFormat::Raw => "RAW",
            CodecFormat::Text => "TEXT",
            CodecFormat::Xer(_) => "XER",
            CodecFormat::Json { .. } => "JSON",
        }
    }
}

/// Encode a value in the given format
pub fn encode(
    value: &Value,
    descriptor: &'static TypeDescriptor,
    format: CodecFormat,
    policy: &ErrorPolicy,
) -> CodecResult<Vec<u8>> {
    encode_erroneous(value, descriptor, format, policy, None)
}

/// Encode a value with an erroneous overlay applied to its fields
///
/// The overlay only touches composite layers; passing one for a scalar
/// type is a no-op.
pub fn encode_erroneous(
    value: &Value,
    descriptor: &'static TypeDescriptor,
    format: CodecFormat,
    policy: &ErrorPolicy,
    erroneous: Option<&ErroneousDescriptor>,
) -> CodecResult<Vec<u8>> {
    match format {
        CodecFormat::Ber(variant) => {
            check_codec(descriptor.ber.is_some(), format, descriptor)?;
            ber::encode(value, descriptor, variant, policy, erroneous)
        }
        CodecFormat::Raw => {
            check_codec(descriptor.raw.is_some(), format, descriptor)?;
            raw::encode(value, descriptor, policy, erroneous)
        }
        CodecFormat::Text => {
            check_codec(descriptor.text.is_some(), format, descriptor)?;
            text::encode(value, descriptor, policy, erroneous)
        }
        CodecFormat::Xer(flavor) => {
            check_codec(descriptor.xer.is_some(), format, descriptor)?;
            xer::encode(value, descriptor, flavor, policy, erroneous)
        }
        CodecFormat::Json { pretty } => {
            check_codec(descriptor.json.is_some(), format, descriptor)?;
            json::encode(value, descriptor, pretty, policy, erroneous)
        }
    }
}

/// Decode a value of the given type from its encoded form
pub fn decode(
    data: &[u8],
    descriptor: &'static TypeDescriptor,
    format: CodecFormat,
    policy: &ErrorPolicy,
) -> CodecResult<Value> {
    match format {
        CodecFormat::Ber(variant) => {
            check_codec(descriptor.ber.is_some(), format, descriptor)?;
            ber::decode(data, descriptor, variant, policy)
        }
        CodecFormat::Raw => {
            check_codec(descriptor.raw.is_some(), format, descriptor)?;
            raw::decode(data, descriptor, policy)
        }
        CodecFormat::Text => {
            check_codec(descriptor.text.is_some(), format, descriptor)?;
            text::decode(data, descriptor, policy)
        }
        CodecFormat::Xer(flavor) => {
            check_codec(descriptor.xer.is_some(), format, descriptor)?;
            xer::decode(data, descriptor, flavor, policy)
        }
        CodecFormat::Json { .. } => {
            check_codec(descriptor.json.is_some(), format, descriptor)?;
            json::decode(data, descriptor, policy)
        }
    }
}

fn check_codec(
    present: bool,
    format: CodecFormat,
    descriptor: &'static TypeDescriptor,
) -> CodecResult<()> {
    if present {
        Ok(())
    } else {
        Err(CodecError::NoCodec {
            format: format.name(),
            type_name: descriptor.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ttcn3_value::descriptor::{TypeDescriptor, TypeKind};

    static NO_CODECS: TypeDescriptor = TypeDescriptor {
        name: "Opaque",
        kind: TypeKind::Integer,
        ber: None,
        raw: None,
        text: None,
        xer: None,
        json: None,
    };

    #[test]
    fn test_missing_codec_is_rejected() {
        let policy = ErrorPolicy::new();
        let err = encode(
            &Value::from(1i64),
            &NO_CODECS,
            CodecFormat::Ber(BerVariant::Ber),
            &policy,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CodecError::NoCodec {
                format: "BER",
                type_name: "Opaque"
            }
        ));
    }
}
