//! Growable octet buffer with independent read and write cursors
//!
//! Every codec engine encodes into and decodes from an [`OctetBuffer`].
//! The buffer is byte-oriented but additionally bit-addressable: the RAW
//! engine writes and reads sub-octet fields through the `*_bits` methods
//! while the other engines stay on whole octets.
//!
//! Bits are placed most-significant-first within each octet (network
//! order). The `msb_first` flag of the bit methods controls the order of
//! the *value* bits only, not their physical placement.

use crate::error::{CodecError, CodecResult};
use bytes::{BufMut, BytesMut};

/// Byte buffer with a read position, a write position and bit addressing
#[derive(Debug, Default)]
pub struct OctetBuffer {
    data: BytesMut,
    /// Read position in whole octets
    pos: usize,
    /// Read offset within the current octet, 0..8
    read_bit: u8,
    /// Number of bits already written into the last octet, 0 = aligned
    write_bit: u8,
}

impl OctetBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with pre-allocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Create a buffer holding a copy of `data`, read cursor at the start
    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            data: BytesMut::from(data),
            ..Self::default()
        }
    }

    /// Length of the contents in whole octets (a partially written last
    /// octet counts)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Length of the contents in bits
    pub fn bit_len(&self) -> usize {
        if self.write_bit == 0 {
            self.data.len() * 8
        } else {
            (self.data.len() - 1) * 8 + self.write_bit as usize
        }
    }

    /// The whole contents, including already-read octets
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer, returning its contents
    pub fn into_vec(self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Discard contents and reset both cursors
    pub fn clear(&mut self) {
        self.data.clear();
        self.pos = 0;
        self.read_bit = 0;
        self.write_bit = 0;
    }

    // --- write side -------------------------------------------------------

    /// Append one octet; the write cursor must be octet-aligned
    pub fn put_u8(&mut self, value: u8) -> CodecResult<()> {
        self.check_write_aligned()?;
        self.data.put_u8(value);
        Ok(())
    }

    /// Append a run of octets; the write cursor must be octet-aligned
    pub fn put_slice(&mut self, value: &[u8]) -> CodecResult<()> {
        self.check_write_aligned()?;
        self.data.put_slice(value);
        Ok(())
    }

    /// Append a UTF-8 string; the write cursor must be octet-aligned
    pub fn put_str(&mut self, value: &str) -> CodecResult<()> {
        self.put_slice(value.as_bytes())
    }

    /// Append the low `count` bits of `value`
    ///
    /// With `msb_first` the most significant of the `count` bits is written
    /// first; otherwise the least significant one is.
    pub fn put_bits(&mut self, value: u64, count: usize, msb_first: bool) -> CodecResult<()> {
        if count > 64 {
            return Err(CodecError::Internal(format!(
                "put_bits: count {} exceeds 64",
                count
            )));
        }
        for i in 0..count {
            let shift = if msb_first { count - 1 - i } else { i };
            self.push_bit((value >> shift) & 1 != 0);
        }
        Ok(())
    }

    /// Append `count` bits taken most-significant-first from `bytes`
    pub fn put_bit_slice(&mut self, bytes: &[u8], count: usize) -> CodecResult<()> {
        if count > bytes.len() * 8 {
            return Err(CodecError::Internal(format!(
                "put_bit_slice: {} bits requested from {} octets",
                count,
                bytes.len()
            )));
        }
        for i in 0..count {
            let bit = bytes[i / 8] & (0x80 >> (i % 8)) != 0;
            self.push_bit(bit);
        }
        Ok(())
    }

    /// Pad the write cursor with zero bits up to the next octet boundary
    pub fn align_write(&mut self) {
        while self.write_bit != 0 {
            self.push_bit(false);
        }
    }

    /// Pad the write cursor with zero bits until the total bit length is a
    /// multiple of `unit` bits; `unit` of 0 or 1 is a no-op
    pub fn pad_write_to(&mut self, unit: usize) {
        if unit > 1 {
            while self.bit_len() % unit != 0 {
                self.push_bit(false);
            }
        }
    }

    fn push_bit(&mut self, bit: bool) {
        if self.write_bit == 0 {
            self.data.put_u8(0);
        }
        if bit {
            let last = self.data.len() - 1;
            self.data[last] |= 0x80 >> self.write_bit;
        }
        self.write_bit = (self.write_bit + 1) % 8;
    }

    /// Overwrite a single already-written bit, addressed from the start
    ///
    /// Used by the RAW engine to fix up extension bits after the fact.
    pub fn set_bit_at(&mut self, bit_index: usize, bit: bool) -> CodecResult<()> {
        if bit_index >= self.bit_len() {
            return Err(CodecError::Internal(format!(
                "set_bit_at: index {} out of {} bits",
                bit_index,
                self.bit_len()
            )));
        }
        let mask = 0x80 >> (bit_index % 8);
        if bit {
            self.data[bit_index / 8] |= mask;
        } else {
            self.data[bit_index / 8] &= !mask;
        }
        Ok(())
    }

    fn check_write_aligned(&self) -> CodecResult<()> {
        if self.write_bit != 0 {
            return Err(CodecError::Internal(
                "octet write on an unaligned buffer".to_string(),
            ));
        }
        Ok(())
    }

    // --- read side --------------------------------------------------------

    /// Read position in whole octets
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Move the read cursor to an octet position, clearing the bit offset
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
        self.read_bit = 0;
    }

    /// Read position in bits
    pub fn bit_pos(&self) -> usize {
        self.pos * 8 + self.read_bit as usize
    }

    /// Move the read cursor to a bit position
    pub fn set_bit_pos(&mut self, bit_pos: usize) {
        let bit_pos = bit_pos.min(self.bit_len());
        self.pos = bit_pos / 8;
        self.read_bit = (bit_pos % 8) as u8;
    }

    /// Octets left to read (whole octets only)
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Bits left to read
    pub fn remaining_bits(&self) -> usize {
        self.bit_len().saturating_sub(self.bit_pos())
    }

    pub fn has_remaining(&self) -> bool {
        self.remaining_bits() > 0
    }

    /// The unread part of the contents; the read cursor must be aligned
    pub fn remaining_slice(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    /// Read one octet; the read cursor must be octet-aligned
    pub fn pull_u8(&mut self) -> CodecResult<u8> {
        self.check_read_aligned()?;
        if self.pos >= self.data.len() {
            return Err(CodecError::Incomplete(
                "buffer exhausted while reading octet".to_string(),
            ));
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Read `count` octets; the read cursor must be octet-aligned
    pub fn pull_slice(&mut self, count: usize) -> CodecResult<&[u8]> {
        self.check_read_aligned()?;
        if self.pos + count > self.data.len() {
            return Err(CodecError::Incomplete(format!(
                "buffer exhausted: need {} octets, have {}",
                count,
                self.data.len() - self.pos
            )));
        }
        let start = self.pos;
        self.pos += count;
        Ok(&self.data[start..start + count])
    }

    /// Read `count` bits into the low bits of a u64
    pub fn read_bits(&mut self, count: usize, msb_first: bool) -> CodecResult<u64> {
        if count > 64 {
            return Err(CodecError::Internal(format!(
                "read_bits: count {} exceeds 64",
                count
            )));
        }
        if self.remaining_bits() < count {
            return Err(CodecError::Incomplete(format!(
                "buffer exhausted: need {} bits, have {}",
                count,
                self.remaining_bits()
            )));
        }
        let mut value = 0u64;
        for i in 0..count {
            let bit = self.next_bit();
            if bit {
                let shift = if msb_first { count - 1 - i } else { i };
                value |= 1 << shift;
            }
        }
        Ok(value)
    }

    /// Read `count` bits, packed most-significant-first into octets
    pub fn read_bit_slice(&mut self, count: usize) -> CodecResult<Vec<u8>> {
        if self.remaining_bits() < count {
            return Err(CodecError::Incomplete(format!(
                "buffer exhausted: need {} bits, have {}",
                count,
                self.remaining_bits()
            )));
        }
        let mut out = vec![0u8; count.div_ceil(8)];
        for i in 0..count {
            if self.next_bit() {
                out[i / 8] |= 0x80 >> (i % 8);
            }
        }
        Ok(out)
    }

    /// Advance the read cursor to the next octet boundary
    pub fn align_read(&mut self) {
        if self.read_bit != 0 {
            self.read_bit = 0;
            self.pos += 1;
        }
    }

    /// Advance the read cursor until its bit position is a multiple of
    /// `unit` bits
    pub fn pad_read_to(&mut self, unit: usize) {
        if unit > 1 {
            let rem = self.bit_pos() % unit;
            if rem != 0 {
                self.set_bit_pos(self.bit_pos() + unit - rem);
            }
        }
    }

    fn next_bit(&mut self) -> bool {
        let bit = self.data[self.pos] & (0x80 >> self.read_bit) != 0;
        self.read_bit += 1;
        if self.read_bit == 8 {
            self.read_bit = 0;
            self.pos += 1;
        }
        bit
    }

    fn check_read_aligned(&self) -> CodecResult<()> {
        if self.read_bit != 0 {
            return Err(CodecError::Internal(
                "octet read on an unaligned buffer".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_roundtrip() {
        let mut buf = OctetBuffer::new();
        buf.put_slice(b"\x01\x02\x03").unwrap();
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.pull_u8().unwrap(), 1);
        assert_eq!(buf.pull_slice(2).unwrap(), b"\x02\x03");
        assert!(buf.pull_u8().is_err());
    }

    #[test]
    fn test_bit_packing_msb() {
        let mut buf = OctetBuffer::new();
        // 4-bit 0xA then 4-bit 0x5 -> one octet 0xA5
        buf.put_bits(0xA, 4, true).unwrap();
        buf.put_bits(0x5, 4, true).unwrap();
        assert_eq!(buf.as_slice(), &[0xA5]);
        assert_eq!(buf.read_bits(4, true).unwrap(), 0xA);
        assert_eq!(buf.read_bits(4, true).unwrap(), 0x5);
    }

    #[test]
    fn test_bit_underflow_is_incomplete() {
        let mut buf = OctetBuffer::from_slice(&[0xFF]);
        buf.read_bits(6, true).unwrap();
        let err = buf.read_bits(4, true).unwrap_err();
        assert!(matches!(err, CodecError::Incomplete(_)));
    }

    #[test]
    fn test_align_and_pad() {
        let mut buf = OctetBuffer::new();
        buf.put_bits(1, 1, true).unwrap();
        buf.align_write();
        assert_eq!(buf.as_slice(), &[0x80]);
        buf.put_bits(0x3, 2, true).unwrap();
        buf.pad_write_to(8);
        assert_eq!(buf.as_slice(), &[0x80, 0xC0]);
    }

    #[test]
    fn test_unaligned_octet_access_is_internal_error() {
        let mut buf = OctetBuffer::new();
        buf.put_bits(1, 3, true).unwrap();
        assert!(matches!(
            buf.put_u8(0).unwrap_err(),
            CodecError::Internal(_)
        ));
    }

    #[test]
    fn test_set_bit_at() {
        let mut buf = OctetBuffer::new();
        buf.put_slice(&[0x00]).unwrap();
        buf.set_bit_at(0, true).unwrap();
        assert_eq!(buf.as_slice(), &[0x80]);
    }

    #[test]
    fn test_bit_slice_roundtrip() {
        let mut buf = OctetBuffer::new();
        buf.put_bit_slice(&[0xDE, 0xAD], 12).unwrap();
        assert_eq!(buf.bit_len(), 12);
        let got = buf.read_bit_slice(12).unwrap();
        assert_eq!(got, vec![0xDE, 0xA0]);
    }
}
