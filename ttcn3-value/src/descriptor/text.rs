//! TEXT sub-descriptor: tokens, padding and case rules

/// A begin/end/separator token
///
/// A literal token is emitted as-is on encode and matched literally on
/// decode. A patterned token carries a fixed string for encode and a
/// regular expression for decode.
#[derive(Debug)]
pub enum TextToken {
    Literal(&'static str),
    Pattern {
        encode: &'static str,
        /// Regular expression matched at decode time, without anchors;
        /// the engine anchors it as needed
        pattern: &'static str,
    },
}

impl TextToken {
    /// The string written on encode
    pub fn encode_str(&self) -> &'static str {
        match self {
            TextToken::Literal(s) => s,
            TextToken::Pattern { encode, .. } => encode,
        }
    }
}

/// Case conversion applied on encode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCase {
    None,
    Upper,
    Lower,
}

/// Justification of a field padded up to its minimum width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextJust {
    Left,
    Right,
    Center,
}

/// TEXT layout of a type
#[derive(Debug)]
pub struct TextDescriptor {
    pub begin: Option<TextToken>,
    pub end: Option<TextToken>,
    pub separator: Option<TextToken>,
    /// Minimum encoded width in characters; shorter output is padded
    /// according to `just`. 0 = no padding.
    pub min_length: usize,
    pub just: TextJust,
    pub convert: TextCase,
    /// Pad numbers with leading zeros instead of spaces
    pub leading_zero: bool,
    /// A record-of under this descriptor may consume its element token
    /// repeatedly during set decoding
    pub repeatable: bool,
}

impl TextDescriptor {
    pub const PLAIN: TextDescriptor = TextDescriptor {
        begin: None,
        end: None,
        separator: None,
        min_length: 0,
        just: TextJust::Left,
        convert: TextCase::None,
        leading_zero: false,
        repeatable: false,
    };
}

pub static PLAIN_TEXT: TextDescriptor = TextDescriptor::PLAIN;
