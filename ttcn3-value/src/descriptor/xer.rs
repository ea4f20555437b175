//! XER sub-descriptor: element names, namespaces and encoding instructions
//!
//! The instruction bitmask mirrors the XML encoding instructions of the
//! source notation; each bit changes how the start/end tags, attributes
//! and children of a value are produced and consumed.

/// XML encoding instruction bits
pub mod instr {
    /// No start/end tag; the content is pasted into the parent
    pub const UNTAGGED: u32 = 1 << 0;
    /// The value is a charstring holding a complete XML element, copied
    /// verbatim
    pub const ANY_ELEMENT: u32 = 1 << 1;
    /// The value is a charstring holding a complete XML attribute, copied
    /// into the parent's start tag
    pub const ANY_ATTRIBUTE: u32 = 1 << 2;
    /// Encode as an attribute of the parent element instead of a child
    /// element
    pub const ATTRIBUTE: u32 = 1 << 3;
    /// Record-of scalars encoded space-separated inside one element
    pub const LIST: u32 = 1 << 4;
    /// Absent optional content collapses to xsi:nil="true" on the parent
    pub const USE_NIL: u32 = 1 << 5;
    /// Sibling fields are emitted in the permutation held by the order
    /// field (field 0, a record-of integer)
    pub const USE_ORDER: u32 = 1 << 6;
    /// A (uri, name) pair encoded as a qualified name in element content
    pub const USE_QNAME: u32 = 1 << 7;
    /// Accepted for completeness; selects the alternative of a union by a
    /// type attribute. The data model has no union variant, so the bit has
    /// no effect.
    pub const USE_TYPE: u32 = 1 << 8;
    /// Text from the embed field (field 0, a record-of charstring) is
    /// interleaved between sibling elements
    pub const EMBED_VALUES: u32 = 1 << 9;
    /// Octet content in base64 instead of hex
    pub const BASE_64: u32 = 1 << 10;
}

/// Whitespace normalization applied to decoded text content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whitespace {
    Preserve,
    /// Tabs, CR and LF become spaces
    Replace,
    /// Replace, then runs of spaces collapse and edges are trimmed
    Collapse,
}

/// A namespace declaration attached to a type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XerNamespace {
    pub prefix: &'static str,
    pub uri: &'static str,
}

/// XER information of a type
#[derive(Debug)]
pub struct XerDescriptor {
    /// Element name used for the start/end tags
    pub name: &'static str,
    pub namespace: Option<XerNamespace>,
    /// Bitmask over [`instr`]
    pub instructions: u32,
    pub whitespace: Whitespace,
}

impl XerDescriptor {
    pub const fn plain(name: &'static str) -> XerDescriptor {
        XerDescriptor {
            name,
            namespace: None,
            instructions: 0,
            whitespace: Whitespace::Collapse,
        }
    }

    pub fn has(&self, bit: u32) -> bool {
        self.instructions & bit != 0
    }
}

pub static BOOLEAN_XER: XerDescriptor = XerDescriptor::plain("BOOLEAN");
pub static INTEGER_XER: XerDescriptor = XerDescriptor::plain("INTEGER");
pub static FLOAT_XER: XerDescriptor = XerDescriptor::plain("REAL");
pub static CHARSTRING_XER: XerDescriptor = XerDescriptor::plain("charstring");
pub static OCTETSTRING_XER: XerDescriptor = XerDescriptor::plain("OCTET_STRING");
