//! The polymorphic value model
//!
//! [`Value`] is the one entity every codec engine encodes and decodes. The
//! original runtime expressed this as a virtual base class with one
//! overridable operation per wire format; here it is an enum of variants
//! matched explicitly, with the per-format dispatch living in the codec
//! crate next to the engines.
//!
//! Boundness states:
//! - `Unbound`: no content yet (freshly created, or cleaned up)
//! - `Omitted`: an optional field deliberately left out; this is a definite
//!   state and counts as bound
//! - everything else: bound content

pub mod integer;
pub mod record;
pub mod record_of;
pub mod storage;

use std::fmt;

use crate::error::{CodecError, CodecResult};

pub use integer::IntegerValue;
pub use record::Record;
pub use record_of::RecordOf;
pub use storage::{SharedBytes, SharedChars};

/// A typed, structured test value
#[derive(Debug, Clone)]
pub enum Value {
    /// No content
    Unbound,
    /// Optional field deliberately absent
    Omitted,
    Boolean(bool),
    Integer(IntegerValue),
    Float(f64),
    CharString(SharedChars),
    OctetString(SharedBytes),
    Record(Record),
    RecordOf(RecordOf),
    /// Zero-field struct, kept as its own variant: it has no fields to
    /// carry boundness, so the variant itself is the bound state
    EmptyRecord,
}

impl Value {
    /// Short variant name for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Unbound => "unbound",
            Value::Omitted => "omit",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::CharString(_) => "charstring",
            Value::OctetString(_) => "octetstring",
            Value::Record(_) => "record",
            Value::RecordOf(_) => "record of",
            Value::EmptyRecord => "empty record",
        }
    }

    pub fn is_bound(&self) -> bool {
        !matches!(self, Value::Unbound)
    }

    /// Present/omitted state of an optional field slot
    pub fn is_present(&self) -> bool {
        !matches!(self, Value::Unbound | Value::Omitted)
    }

    /// Fully initialized: bound with no unbound parts anywhere below
    pub fn is_value(&self) -> bool {
        match self {
            Value::Unbound => false,
            Value::Record(rec) => rec.is_value(),
            Value::RecordOf(seq) => seq.is_value(),
            _ => true,
        }
    }

    /// Structural equality; an unbound value equals nothing, including
    /// another unbound value
    pub fn is_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Unbound, _) | (_, Value::Unbound) => false,
            (Value::Omitted, Value::Omitted) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::CharString(a), Value::CharString(b)) => a.as_str() == b.as_str(),
            (Value::OctetString(a), Value::OctetString(b)) => a.as_slice() == b.as_slice(),
            (Value::Record(a), Value::Record(b)) => a.is_equal(b),
            (Value::RecordOf(a), Value::RecordOf(b)) => a.is_equal(b),
            (Value::EmptyRecord, Value::EmptyRecord) => true,
            _ => false,
        }
    }

    /// Reset to unbound, releasing any storage reference
    pub fn clean_up(&mut self) {
        *self = Value::Unbound;
    }

    // --- typed accessors --------------------------------------------------

    pub fn as_bool(&self) -> CodecResult<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            _ => Err(self.type_error("boolean")),
        }
    }

    pub fn as_integer(&self) -> CodecResult<&IntegerValue> {
        match self {
            Value::Integer(i) => Ok(i),
            _ => Err(self.type_error("integer")),
        }
    }

    /// The integer content as i64; fails on a type mismatch or a bignum
    /// that does not fit
    pub fn as_i64(&self) -> CodecResult<i64> {
        let integer = self.as_integer()?;
        integer.to_i64().ok_or_else(|| {
            CodecError::InvalidData(format!("integer {} does not fit in 64 bits", integer))
        })
    }

    pub fn as_float(&self) -> CodecResult<f64> {
        match self {
            Value::Float(f) => Ok(*f),
            _ => Err(self.type_error("float")),
        }
    }

    pub fn as_str(&self) -> CodecResult<&str> {
        match self {
            Value::CharString(s) => Ok(s.as_str()),
            _ => Err(self.type_error("charstring")),
        }
    }

    pub fn as_octets(&self) -> CodecResult<&[u8]> {
        match self {
            Value::OctetString(s) => Ok(s.as_slice()),
            _ => Err(self.type_error("octetstring")),
        }
    }

    pub fn as_record(&self) -> CodecResult<&Record> {
        match self {
            Value::Record(r) => Ok(r),
            _ => Err(self.type_error("record")),
        }
    }

    pub fn as_record_mut(&mut self) -> CodecResult<&mut Record> {
        match self {
            Value::Record(r) => Ok(r),
            _ => Err(self.type_error("record")),
        }
    }

    pub fn as_record_of(&self) -> CodecResult<&RecordOf> {
        match self {
            Value::RecordOf(r) => Ok(r),
            _ => Err(self.type_error("record of")),
        }
    }

    pub fn as_record_of_mut(&mut self) -> CodecResult<&mut RecordOf> {
        match self {
            Value::RecordOf(r) => Ok(r),
            _ => Err(self.type_error("record of")),
        }
    }

    fn type_error(&self, expected: &str) -> CodecError {
        CodecError::InvalidData(format!("expected {}, got {}", expected, self.kind_name()))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal(other)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(IntegerValue::Native(value))
    }
}

impl From<IntegerValue> for Value {
    fn from(value: IntegerValue) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::CharString(SharedChars::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::CharString(SharedChars::new(value))
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::OctetString(SharedBytes::new(value))
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Record(value)
    }
}

impl From<RecordOf> for Value {
    fn from(value: RecordOf) -> Self {
        Value::RecordOf(value)
    }
}

impl fmt::Display for Value {
    /// The logging form of a value
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unbound => write!(f, "<unbound>"),
            Value::Omitted => write!(f, "omit"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::CharString(s) => write!(f, "{:?}", s.as_str()),
            Value::OctetString(s) => {
                write!(f, "'")?;
                for byte in s.as_slice() {
                    write!(f, "{:02X}", byte)?;
                }
                write!(f, "'O")
            }
            Value::Record(rec) => {
                write!(f, "{{ ")?;
                for (i, field) in rec.fields().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, " }}")
            }
            Value::RecordOf(seq) => {
                write!(f, "{{ ")?;
                for (i, element) in seq.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, " }}")
            }
            Value::EmptyRecord => write!(f, "{{ }}"),
        }
    }
}
