//! XER codec engine: XML encodings
//!
//! Three flavors share the engine. Basic produces indented plain XML and
//! ignores the fancier encoding instructions; Canonical produces the
//! same infoset without any inter-element whitespace; Extended honors
//! the full instruction set of the descriptors (attributes, lists,
//! nillable elements, field ordering, embedded values and friends).

mod decoder;
mod encoder;
mod tokenizer;

pub use decoder::XerDecoder;
pub use encoder::XerEncoder;
pub use tokenizer::{XmlToken, XmlTokenizer};

use ttcn3_value::descriptor::xer::{Whitespace, XerDescriptor};
use ttcn3_value::descriptor::TypeDescriptor;
use ttcn3_value::erroneous::ErroneousDescriptor;
use ttcn3_value::error::{CodecError, CodecResult, ErrorPolicy};
use ttcn3_value::value::Value;

/// XML encoding flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XerFlavor {
    /// Indented, encoding instructions ignored
    Basic,
    /// No whitespace between elements, encoding instructions ignored
    Canonical,
    /// Encoding instructions honored
    Extended,
}

impl XerFlavor {
    pub(crate) fn extended(self) -> bool {
        self == XerFlavor::Extended
    }
}

pub fn encode(
    value: &Value,
    descriptor: &'static TypeDescriptor,
    flavor: XerFlavor,
    policy: &ErrorPolicy,
    erroneous: Option<&ErroneousDescriptor>,
) -> CodecResult<Vec<u8>> {
    let mut out = String::new();
    XerEncoder::new(flavor, policy).encode_message(value, descriptor, &mut out, erroneous)?;
    if flavor != XerFlavor::Canonical {
        out.push('\n');
    }
    Ok(out.into_bytes())
}

pub fn decode(
    data: &[u8],
    descriptor: &'static TypeDescriptor,
    flavor: XerFlavor,
    policy: &ErrorPolicy,
) -> CodecResult<Value> {
    let input = std::str::from_utf8(data)
        .map_err(|_| CodecError::InvalidData("XER message is not valid UTF-8".to_string()))?;
    let mut decoder = XerDecoder::new(input, flavor, policy);
    let value = decoder.decode(descriptor)?;
    decoder.finish()?;
    Ok(value)
}

pub(super) fn require_xer(
    descriptor: &'static TypeDescriptor,
) -> CodecResult<&'static XerDescriptor> {
    descriptor.xer.ok_or(CodecError::NoCodec {
        format: "XER",
        type_name: descriptor.name,
    })
}

/// Apply a whitespace facet to decoded text content
pub(crate) fn normalize_whitespace(text: &str, policy: Whitespace) -> String {
    match policy {
        Whitespace::Preserve => text.to_string(),
        Whitespace::Replace => text
            .chars()
            .map(|c| if matches!(c, '\t' | '\r' | '\n') { ' ' } else { c })
            .collect(),
        Whitespace::Collapse => text.split_ascii_whitespace().collect::<Vec<_>>().join(" "),
    }
}

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// RFC 4648 base64 without line breaks
pub(crate) fn encode_base64(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(3) * 4);
    for chunk in data.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let triple = (b0 << 16) | (b1 << 8) | b2;
        out.push(BASE64_ALPHABET[(triple >> 18) as usize & 0x3F] as char);
        out.push(BASE64_ALPHABET[(triple >> 12) as usize & 0x3F] as char);
        out.push(if chunk.len() > 1 {
            BASE64_ALPHABET[(triple >> 6) as usize & 0x3F] as char
        } else {
            '='
        });
        out.push(if chunk.len() > 2 {
            BASE64_ALPHABET[triple as usize & 0x3F] as char
        } else {
            '='
        });
    }
    out
}

pub(crate) fn decode_base64(text: &str) -> CodecResult<Vec<u8>> {
    fn value_of(c: u8) -> CodecResult<u32> {
        match c {
            b'A'..=b'Z' => Ok((c - b'A') as u32),
            b'a'..=b'z' => Ok((c - b'a') as u32 + 26),
            b'0'..=b'9' => Ok((c - b'0') as u32 + 52),
            b'+' => Ok(62),
            b'/' => Ok(63),
            _ => Err(CodecError::InvalidData(format!(
                "invalid base64 character {:?}",
                c as char
            ))),
        }
    }
    let cleaned: Vec<u8> = text
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let stripped = match cleaned.iter().position(|&b| b == b'=') {
        Some(pad_start) => {
            if cleaned[pad_start..].iter().any(|&b| b != b'=') {
                return Err(CodecError::InvalidData(
                    "base64 padding in the middle of the data".to_string(),
                ));
            }
            &cleaned[..pad_start]
        }
        None => &cleaned[..],
    };
    if stripped.len() % 4 == 1 {
        return Err(CodecError::InvalidData("truncated base64 data".to_string()));
    }
    let mut out = Vec::with_capacity(stripped.len() / 4 * 3 + 2);
    for chunk in stripped.chunks(4) {
        let mut triple = 0u32;
        for (i, &c) in chunk.iter().enumerate() {
            triple |= value_of(c)? << (18 - 6 * i);
        }
        out.push((triple >> 16) as u8);
        if chunk.len() > 2 {
            out.push((triple >> 8) as u8);
        }
        if chunk.len() > 3 {
            out.push(triple as u8);
        }
    }
    Ok(out)
}

pub(crate) fn encode_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for octet in data {
        out.push_str(&format!("{:02X}", octet));
    }
    out
}

pub(crate) fn decode_hex(text: &str) -> CodecResult<Vec<u8>> {
    let cleaned: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if !cleaned.is_ascii() {
        return Err(CodecError::InvalidData(
            "non-ASCII character in hex data".to_string(),
        ));
    }
    if cleaned.len() % 2 != 0 {
        return Err(CodecError::InvalidData(
            "odd number of hex digits".to_string(),
        ));
    }
    let mut out = Vec::with_capacity(cleaned.len() / 2);
    for i in (0..cleaned.len()).step_by(2) {
        let octet = u8::from_str_radix(&cleaned[i..i + 2], 16).map_err(|_| {
            CodecError::InvalidData(format!("invalid hex digits {:?}", &cleaned[i..i + 2]))
        })?;
        out.push(octet);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_roundtrip() {
        for data in [&b""[..], b"f", b"fo", b"foo", b"foob", b"\xDE\xAD\xBE\xEF"] {
            let encoded = encode_base64(data);
            assert_eq!(decode_base64(&encoded).unwrap(), data);
        }
        assert_eq!(encode_base64(b"foo"), "Zm9v");
        assert_eq!(encode_base64(b"fo"), "Zm8=");
    }

    #[test]
    fn test_whitespace_facets() {
        assert_eq!(
            normalize_whitespace(" a\tb \n c ", Whitespace::Collapse),
            "a b c"
        );
        assert_eq!(
            normalize_whitespace("a\tb\nc", Whitespace::Replace),
            "a b c"
        );
        assert_eq!(
            normalize_whitespace("a\tb", Whitespace::Preserve),
            "a\tb"
        );
    }

    #[test]
    fn test_hex_roundtrip() {
        assert_eq!(encode_hex(&[0xAB, 0x01]), "AB01");
        assert_eq!(decode_hex("ab 01").unwrap(), vec![0xAB, 0x01]);
        assert!(decode_hex("abc").is_err());
    }
}
