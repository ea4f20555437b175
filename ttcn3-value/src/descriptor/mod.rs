//! Type descriptor tables
//!
//! One immutable descriptor per logical type, holding a sub-descriptor per
//! wire format. Descriptors are compile-time constants produced by the
//! (out-of-scope) code generator; the codec engines only ever read them.
//! A `None` in a format slot means the type has no codec for that format,
//! and any encode/decode attempt through that slot fails.

pub mod ber;
pub mod json;
pub mod raw;
pub mod text;
pub mod xer;

use crate::value::Value;

pub use ber::BerDescriptor;
pub use json::JsonDescriptor;
pub use raw::RawDescriptor;
pub use text::TextDescriptor;
pub use xer::XerDescriptor;

/// Per-type, per-format encoding metadata
#[derive(Debug)]
pub struct TypeDescriptor {
    /// Name of the type as it appears in diagnostics
    pub name: &'static str,
    pub kind: TypeKind,
    pub ber: Option<&'static BerDescriptor>,
    pub raw: Option<&'static RawDescriptor>,
    pub text: Option<&'static TextDescriptor>,
    pub xer: Option<&'static XerDescriptor>,
    pub json: Option<&'static JsonDescriptor>,
}

/// Structural kind of a type
#[derive(Debug)]
pub enum TypeKind {
    Boolean,
    Integer,
    Float,
    CharString,
    OctetString,
    Record {
        fields: &'static [FieldDescriptor],
        /// "set": unordered field matching on decode, tag-sorted under DER
        is_set: bool,
    },
    RecordOf {
        element: &'static TypeDescriptor,
        /// "set of": element order is not significant, sorted under DER
        is_set_of: bool,
    },
    /// Zero-field struct
    Empty,
}

/// One field of a record/set type
#[derive(Debug)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub ty: &'static TypeDescriptor,
    pub optional: bool,
    /// Default value factory; a field equal to its default may be left out
    /// of DER output and is restored on decode when absent
    pub default: Option<fn() -> Value>,
}

impl TypeDescriptor {
    pub fn is_record(&self) -> bool {
        matches!(self.kind, TypeKind::Record { .. })
    }

    pub fn is_record_of(&self) -> bool {
        matches!(self.kind, TypeKind::RecordOf { .. })
    }

    /// Field list of a record type; empty for anything else
    pub fn fields(&self) -> &'static [FieldDescriptor] {
        match self.kind {
            TypeKind::Record { fields, .. } => fields,
            _ => &[],
        }
    }

    /// Element descriptor of a record-of type
    pub fn element(&self) -> Option<&'static TypeDescriptor> {
        match self.kind {
            TypeKind::RecordOf { element, .. } => Some(element),
            _ => None,
        }
    }
}

// Built-in leaf descriptors, supplied by the runtime the way the original
// supplies INTEGER_descr_ and friends. User-defined types are emitted by
// the code generator as statics of the same shape.

pub static BOOLEAN: TypeDescriptor = TypeDescriptor {
    name: "BOOLEAN",
    kind: TypeKind::Boolean,
    ber: Some(&ber::BOOLEAN_BER),
    raw: Some(&raw::BOOLEAN_RAW),
    text: Some(&text::PLAIN_TEXT),
    xer: Some(&xer::BOOLEAN_XER),
    json: Some(&json::PLAIN_JSON),
};

pub static INTEGER: TypeDescriptor = TypeDescriptor {
    name: "INTEGER",
    kind: TypeKind::Integer,
    ber: Some(&ber::INTEGER_BER),
    raw: Some(&raw::INTEGER_RAW),
    text: Some(&text::PLAIN_TEXT),
    xer: Some(&xer::INTEGER_XER),
    json: Some(&json::PLAIN_JSON),
};

pub static FLOAT: TypeDescriptor = TypeDescriptor {
    name: "REAL",
    kind: TypeKind::Float,
    ber: Some(&ber::REAL_BER),
    raw: Some(&raw::FLOAT_RAW),
    text: Some(&text::PLAIN_TEXT),
    xer: Some(&xer::FLOAT_XER),
    json: Some(&json::PLAIN_JSON),
};

pub static CHARSTRING: TypeDescriptor = TypeDescriptor {
    name: "charstring",
    kind: TypeKind::CharString,
    ber: Some(&ber::CHARSTRING_BER),
    raw: Some(&raw::CHARSTRING_RAW),
    text: Some(&text::PLAIN_TEXT),
    xer: Some(&xer::CHARSTRING_XER),
    json: Some(&json::PLAIN_JSON),
};

pub static OCTETSTRING: TypeDescriptor = TypeDescriptor {
    name: "octetstring",
    kind: TypeKind::OctetString,
    ber: Some(&ber::OCTETSTRING_BER),
    raw: Some(&raw::OCTETSTRING_RAW),
    text: Some(&text::PLAIN_TEXT),
    xer: Some(&xer::OCTETSTRING_XER),
    json: Some(&json::PLAIN_JSON),
};
