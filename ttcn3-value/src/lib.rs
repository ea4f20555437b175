//! Value model, type descriptors and buffers for the TTCN-3 codec runtime
//!
//! This crate provides the polymorphic value representation, the
//! descriptor tables driving the codec engines, the bit-addressable
//! encode/decode buffer and the error handling used throughout the
//! runtime.

pub mod buffer;
pub mod descriptor;
pub mod erroneous;
pub mod error;
pub mod transfer;
pub mod value;

pub use buffer::OctetBuffer;
pub use descriptor::{FieldDescriptor, TypeDescriptor, TypeKind};
pub use erroneous::{ErroneousDescriptor, ErroneousValue, FieldOverride, ValueOverride};
pub use error::{CodecError, CodecResult, ErrorKind, ErrorPolicy, ErrorSeverity};
pub use transfer::{decode_transfer, encode_transfer};
pub use value::{IntegerValue, Record, RecordOf, Value};
