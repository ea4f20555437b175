//! TTCN-3 value encoding runtime
//!
//! This library implements the value model and message codecs of a TTCN-3
//! runtime: abstract test values are turned into wire messages and back
//! through type descriptors, without any generated per-type code paths.
//!
//! # Architecture
//!
//! The library is organized as a workspace with multiple crates:
//!
//! - `ttcn3-value`: Value model, type descriptors, bit-addressable buffers,
//!   error policy and the internal transfer format
//! - `ttcn3-codec`: The message codecs (BER/CER/DER, RAW, TEXT, XER, JSON)
//!
//! # Usage
//!
//! ```
//! use ttcn3::codec::{decode, encode, CodecFormat};
//! use ttcn3::{descriptor, ErrorPolicy, Value};
//!
//! let policy = ErrorPolicy::new();
//! let value = Value::from(42i64);
//! let message = encode(
//!     &value,
//!     &descriptor::INTEGER,
//!     CodecFormat::Json { pretty: false },
//!     &policy,
//! )
//! .unwrap();
//! assert_eq!(message, b"42");
//! let back = decode(
//!     &message,
//!     &descriptor::INTEGER,
//!     CodecFormat::Json { pretty: false },
//!     &policy,
//! )
//! .unwrap();
//! assert!(back.is_equal(&value));
//! ```

// Re-export the value model
pub use ttcn3_value::{
    CodecError, CodecResult, ErrorKind, ErrorPolicy, ErrorSeverity, IntegerValue, OctetBuffer,
    Record, RecordOf, Value,
};
pub use ttcn3_value::{decode_transfer, encode_transfer};
pub use ttcn3_value::{ErroneousDescriptor, ErroneousValue, FieldOverride, ValueOverride};

// Re-export the descriptor tables
pub mod descriptor {
    pub use ttcn3_value::descriptor::*;
}

// Re-export the codec API
pub mod codec {
    pub use ttcn3_codec::*;
}

#[cfg(test)]
mod tests {
    use super::codec::{decode, encode, BerVariant, CodecFormat, XerFlavor};
    use super::*;

    #[test]
    fn test_one_value_through_every_format() {
        // Small enough to fit the 8-bit RAW layout of the built-in INTEGER
        let policy = ErrorPolicy::new();
        let value = Value::from(42i64);
        for format in [
            CodecFormat::Ber(BerVariant::Ber),
            CodecFormat::Ber(BerVariant::Cer),
            CodecFormat::Ber(BerVariant::Der),
            CodecFormat::Xer(XerFlavor::Basic),
            CodecFormat::Xer(XerFlavor::Canonical),
            CodecFormat::Xer(XerFlavor::Extended),
            CodecFormat::Json { pretty: false },
            CodecFormat::Json { pretty: true },
            CodecFormat::Raw,
            CodecFormat::Text,
        ] {
            let message = encode(&value, &descriptor::INTEGER, format, &policy).unwrap();
            let back = decode(&message, &descriptor::INTEGER, format, &policy).unwrap();
            assert!(back.is_equal(&value), "format {}", format.name());
        }
    }

    #[test]
    fn test_transfer_format_reexport() {
        let value = Value::from("hello");
        let mut buf = OctetBuffer::new();
        encode_transfer(&value, &descriptor::CHARSTRING, &mut buf).unwrap();
        let mut buf = OctetBuffer::from_slice(&buf.into_vec());
        let back = decode_transfer(&descriptor::CHARSTRING, &mut buf).unwrap();
        assert!(back.is_equal(&value));
    }
}
