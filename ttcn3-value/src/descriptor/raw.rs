//! RAW sub-descriptor: positional bit-level layout
//!
//! RAW has no tags; every field's position and width comes from this
//! table. Lengths are in bits.

/// How negative integers are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawSign {
    /// No sign; encoding a negative value is an error
    NoSign,
    /// Two's complement within the field width
    TwosCompl,
    /// Most significant bit of the field carries the sign, the rest the
    /// magnitude
    SignBit,
}

/// Bit order of the value within its field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawOrder {
    Msb,
    Lsb,
}

/// Which side of an over-wide field the value sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawAlign {
    Left,
    Right,
}

/// Extension-bit termination of a variable-length sequence
///
/// When in use, every element is followed by one marker bit. This is a
/// positional rendition of the classic MSB-stealing scheme: the marker
/// sits after the element instead of inside its last octet, which keeps
/// element payloads whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtBit {
    /// No extension bit; the sequence ends with the bit budget
    No,
    /// Marker 1 = more elements follow, 0 = last element
    Yes,
    /// Marker 0 = more elements follow, 1 = last element
    Reverse,
}

/// RAW layout of a type
#[derive(Debug)]
pub struct RawDescriptor {
    /// Field width in bits; 0 = variable (derived from the value)
    pub fieldlength: usize,
    pub comp: RawSign,
    pub byteorder: RawOrder,
    pub bitorder: RawOrder,
    pub align: RawAlign,
    /// Pad after the field until the total bit length is a multiple of
    /// this many bits; 0 or 1 = no padding
    pub padding: usize,
    /// Same, applied before the field
    pub prepadding: usize,
    pub extension_bit: ExtBit,
    /// Fixed element count for a record-of; `None` = unbounded
    pub repeat_count: Option<usize>,
}

impl RawDescriptor {
    /// Layout with no padding, MSB order, unsigned, variable length
    pub const DEFAULT: RawDescriptor = RawDescriptor {
        fieldlength: 0,
        comp: RawSign::NoSign,
        byteorder: RawOrder::Msb,
        bitorder: RawOrder::Msb,
        align: RawAlign::Right,
        padding: 0,
        prepadding: 0,
        extension_bit: ExtBit::No,
        repeat_count: None,
    };
}

pub static BOOLEAN_RAW: RawDescriptor = RawDescriptor {
    fieldlength: 1,
    ..RawDescriptor::DEFAULT
};

pub static INTEGER_RAW: RawDescriptor = RawDescriptor {
    fieldlength: 8,
    comp: RawSign::TwosCompl,
    ..RawDescriptor::DEFAULT
};

pub static FLOAT_RAW: RawDescriptor = RawDescriptor {
    fieldlength: 64,
    ..RawDescriptor::DEFAULT
};

pub static CHARSTRING_RAW: RawDescriptor = RawDescriptor::DEFAULT;

pub static OCTETSTRING_RAW: RawDescriptor = RawDescriptor::DEFAULT;
