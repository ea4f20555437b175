//! BER wire primitives: tag and length octets
//!
//! Tag semantics (class, number, constructed) live in the type
//! descriptors; this module only turns them into identifier octets and
//! back, and handles the definite/indefinite length forms of ITU-T X.690.

use ttcn3_value::descriptor::ber::{BerTag, TagClass};
use ttcn3_value::error::{CodecError, CodecResult};

/// Encoded length of a TLV
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BerLength {
    Definite(usize),
    /// Content runs until an end-of-contents marker (00 00)
    Indefinite,
}

/// Encode identifier octets
///
/// Tag numbers up to 30 fit the low five bits of a single octet; larger
/// numbers use the high-tag-number form, base-128 with continuation bits.
pub fn encode_tag(tag: &BerTag, constructed: bool) -> Vec<u8> {
    let leading = ((tag.class as u8) << 6) | if constructed { 0x20 } else { 0x00 };
    if tag.number < 31 {
        return vec![leading | tag.number as u8];
    }
    let mut out = vec![leading | 0x1F];
    let mut groups = Vec::new();
    let mut number = tag.number;
    loop {
        groups.push((number & 0x7F) as u8);
        number >>= 7;
        if number == 0 {
            break;
        }
    }
    for (i, &group) in groups.iter().rev().enumerate() {
        if i < groups.len() - 1 {
            out.push(group | 0x80);
        } else {
            out.push(group);
        }
    }
    out
}

/// Decode identifier octets
///
/// Returns the tag (with its constructed flag) and the number of octets
/// consumed.
pub fn decode_tag(data: &[u8]) -> CodecResult<(BerTag, usize)> {
    let first = *data
        .first()
        .ok_or_else(|| CodecError::Incomplete("missing identifier octet".to_string()))?;
    let class = match first >> 6 {
        0 => TagClass::Universal,
        1 => TagClass::Application,
        2 => TagClass::ContextSpecific,
        _ => TagClass::Private,
    };
    let constructed = first & 0x20 != 0;
    if first & 0x1F != 0x1F {
        return Ok((
            BerTag {
                class,
                constructed,
                number: (first & 0x1F) as u32,
            },
            1,
        ));
    }
    // High tag number form
    let mut number = 0u32;
    let mut consumed = 1;
    loop {
        let octet = *data.get(consumed).ok_or_else(|| {
            CodecError::Incomplete("truncated high tag number".to_string())
        })?;
        consumed += 1;
        number = number
            .checked_shl(7)
            .and_then(|n| n.checked_add((octet & 0x7F) as u32))
            .ok_or_else(|| CodecError::InvalidData("tag number overflow".to_string()))?;
        if octet & 0x80 == 0 {
            break;
        }
    }
    Ok((
        BerTag {
            class,
            constructed,
            number,
        },
        consumed,
    ))
}

impl BerLength {
    /// Encode length octets
    ///
    /// Lengths below 128 use the short form; larger lengths the long
    /// form with a leading octet count.
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            BerLength::Indefinite => vec![0x80],
            BerLength::Definite(len) if len < 0x80 => vec![len as u8],
            BerLength::Definite(len) => {
                let mut octets = Vec::new();
                let mut remaining = len;
                while remaining > 0 {
                    octets.push((remaining & 0xFF) as u8);
                    remaining >>= 8;
                }
                octets.push(0x80 | octets.len() as u8);
                octets.reverse();
                octets
            }
        }
    }

    /// Decode length octets, returning the length and octets consumed
    pub fn decode(data: &[u8]) -> CodecResult<(BerLength, usize)> {
        let first = *data
            .first()
            .ok_or_else(|| CodecError::Incomplete("missing length octet".to_string()))?;
        if first == 0x80 {
            return Ok((BerLength::Indefinite, 1));
        }
        if first & 0x80 == 0 {
            return Ok((BerLength::Definite(first as usize), 1));
        }
        let count = (first & 0x7F) as usize;
        if count > std::mem::size_of::<usize>() {
            return Err(CodecError::InvalidData(format!(
                "length of {} octets is not supported",
                count
            )));
        }
        if data.len() < 1 + count {
            return Err(CodecError::Incomplete("truncated long form length".to_string()));
        }
        let mut len = 0usize;
        for &octet in &data[1..1 + count] {
            len = (len << 8) | octet as usize;
        }
        Ok((BerLength::Definite(len), 1 + count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip_low_and_high() {
        for tag in [
            BerTag::universal(false, 2),
            BerTag::universal(true, 16),
            BerTag::context(true, 30),
            BerTag::application(false, 12345),
        ] {
            let encoded = encode_tag(&tag, tag.constructed);
            let (decoded, consumed) = decode_tag(&encoded).unwrap();
            assert_eq!(consumed, encoded.len());
            assert_eq!(decoded, tag);
        }
    }

    #[test]
    fn test_length_forms() {
        assert_eq!(BerLength::Definite(5).encode(), vec![0x05]);
        assert_eq!(BerLength::Definite(300).encode(), vec![0x82, 0x01, 0x2C]);
        assert_eq!(BerLength::Indefinite.encode(), vec![0x80]);

        let (len, consumed) = BerLength::decode(&[0x82, 0x01, 0x2C, 0xFF]).unwrap();
        assert_eq!(len, BerLength::Definite(300));
        assert_eq!(consumed, 3);
        assert_eq!(
            BerLength::decode(&[0x80]).unwrap().0,
            BerLength::Indefinite
        );
    }

    #[test]
    fn test_truncated_length_is_incomplete() {
        assert!(matches!(
            BerLength::decode(&[0x82, 0x01]).unwrap_err(),
            CodecError::Incomplete(_)
        ));
    }
}
