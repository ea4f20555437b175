//! Integer value with an arbitrary-precision fallback
//!
//! Values that fit a native i64 stay native; anything wider is promoted to
//! a bignum. The BER engine needs the wide path for ASN.1 INTEGERs of
//! unrestricted size.

use num_bigint::BigInt;
use std::fmt;

/// Signed integer of unrestricted size
#[derive(Debug, Clone)]
pub enum IntegerValue {
    Native(i64),
    Big(BigInt),
}

impl IntegerValue {
    /// Build from a bignum, demoting to native when it fits
    pub fn from_big(value: BigInt) -> Self {
        match i64::try_from(&value) {
            Ok(native) => IntegerValue::Native(native),
            Err(_) => IntegerValue::Big(value),
        }
    }

    /// The value as i64, if it fits
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            IntegerValue::Native(v) => Some(*v),
            IntegerValue::Big(v) => i64::try_from(v).ok(),
        }
    }

    /// The value as a bignum (copies the native case)
    pub fn to_big(&self) -> BigInt {
        match self {
            IntegerValue::Native(v) => BigInt::from(*v),
            IntegerValue::Big(v) => v.clone(),
        }
    }

    pub fn is_negative(&self) -> bool {
        match self {
            IntegerValue::Native(v) => *v < 0,
            IntegerValue::Big(v) => v.sign() == num_bigint::Sign::Minus,
        }
    }

    /// Minimal big-endian two's complement encoding
    ///
    /// The sign bit of the first octet carries the sign; 0 encodes as a
    /// single zero octet.
    pub fn to_signed_bytes_be(&self) -> Vec<u8> {
        match self {
            IntegerValue::Native(value) => {
                let mut bytes = Vec::new();
                if *value < 0 {
                    let mut temp = *value;
                    while temp != -1 {
                        bytes.push((temp & 0xFF) as u8);
                        temp >>= 8;
                    }
                    // keep the sign bit set in the top octet
                    if bytes.is_empty() || (bytes[bytes.len() - 1] & 0x80) == 0 {
                        bytes.push(0xFF);
                    }
                } else {
                    let mut temp = *value;
                    while temp > 0 {
                        bytes.push((temp & 0xFF) as u8);
                        temp >>= 8;
                    }
                    if bytes.is_empty() {
                        bytes.push(0);
                    } else if (bytes[bytes.len() - 1] & 0x80) != 0 {
                        bytes.push(0x00);
                    }
                }
                bytes.reverse();
                bytes
            }
            IntegerValue::Big(value) => value.to_signed_bytes_be(),
        }
    }

    /// Decode a minimal big-endian two's complement encoding
    pub fn from_signed_bytes_be(bytes: &[u8]) -> Self {
        if bytes.len() <= 8 {
            let negative = !bytes.is_empty() && (bytes[0] & 0x80) != 0;
            let mut value: i64 = if negative { -1 } else { 0 };
            for &byte in bytes {
                value = (value << 8) | (byte as i64);
            }
            IntegerValue::Native(value)
        } else {
            IntegerValue::from_big(BigInt::from_signed_bytes_be(bytes))
        }
    }

    /// Parse a decimal string (with optional sign)
    pub fn parse(text: &str) -> Option<Self> {
        if let Ok(native) = text.parse::<i64>() {
            return Some(IntegerValue::Native(native));
        }
        text.parse::<BigInt>().ok().map(IntegerValue::from_big)
    }
}

impl PartialEq for IntegerValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (IntegerValue::Native(a), IntegerValue::Native(b)) => a == b,
            (IntegerValue::Big(a), IntegerValue::Big(b)) => a == b,
            // mixed representations can still hold the same number
            (a, b) => a.to_big() == b.to_big(),
        }
    }
}

impl Eq for IntegerValue {}

impl From<i64> for IntegerValue {
    fn from(value: i64) -> Self {
        IntegerValue::Native(value)
    }
}

impl fmt::Display for IntegerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegerValue::Native(v) => write!(f, "{}", v),
            IntegerValue::Big(v) => write!(f, "{}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_twos_complement() {
        assert_eq!(IntegerValue::Native(0).to_signed_bytes_be(), vec![0]);
        assert_eq!(IntegerValue::Native(127).to_signed_bytes_be(), vec![0x7F]);
        assert_eq!(
            IntegerValue::Native(128).to_signed_bytes_be(),
            vec![0x00, 0x80]
        );
        assert_eq!(IntegerValue::Native(-1).to_signed_bytes_be(), vec![0xFF]);
        assert_eq!(
            IntegerValue::Native(-129).to_signed_bytes_be(),
            vec![0xFF, 0x7F]
        );
    }

    #[test]
    fn test_roundtrip_native() {
        for v in [0i64, 1, -1, 255, -256, i64::MAX, i64::MIN] {
            let bytes = IntegerValue::Native(v).to_signed_bytes_be();
            assert_eq!(
                IntegerValue::from_signed_bytes_be(&bytes),
                IntegerValue::Native(v)
            );
        }
    }

    #[test]
    fn test_big_promotion_and_demotion() {
        let big = IntegerValue::parse("123456789012345678901234567890").unwrap();
        assert!(matches!(big, IntegerValue::Big(_)));
        let bytes = big.to_signed_bytes_be();
        assert_eq!(IntegerValue::from_signed_bytes_be(&bytes), big);

        let small = IntegerValue::from_big(BigInt::from(42));
        assert_eq!(small, IntegerValue::Native(42));
    }

    #[test]
    fn test_mixed_equality() {
        let a = IntegerValue::Native(7);
        let b = IntegerValue::Big(BigInt::from(7));
        assert_eq!(a, b);
    }
}
