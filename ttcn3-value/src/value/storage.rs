//! Reference-counted, copy-on-write backing storage
//!
//! String-like scalars share their character data across value copies
//! until one of the copies writes; the write clones the block first.
//! The reference count of the `Rc` is the reference count of the block,
//! and `Rc::make_mut` is the clone-on-write step.

use std::fmt;
use std::rc::Rc;

/// Copy-on-write octet block backing `Value::OctetString`
#[derive(Clone, PartialEq, Eq)]
pub struct SharedBytes(Rc<Vec<u8>>);

impl SharedBytes {
    pub fn new(data: Vec<u8>) -> Self {
        SharedBytes(Rc::new(data))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of value copies sharing this block
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Mutable access; clones the block first when it is shared
    pub fn make_mut(&mut self) -> &mut Vec<u8> {
        Rc::make_mut(&mut self.0)
    }
}

impl From<&[u8]> for SharedBytes {
    fn from(data: &[u8]) -> Self {
        SharedBytes::new(data.to_vec())
    }
}

impl fmt::Debug for SharedBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedBytes({} octets)", self.0.len())
    }
}

/// Copy-on-write character block backing `Value::CharString`
#[derive(Clone, PartialEq, Eq)]
pub struct SharedChars(Rc<String>);

impl SharedChars {
    pub fn new(data: String) -> Self {
        SharedChars(Rc::new(data))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Mutable access; clones the block first when it is shared
    pub fn make_mut(&mut self) -> &mut String {
        Rc::make_mut(&mut self.0)
    }
}

impl From<&str> for SharedChars {
    fn from(data: &str) -> Self {
        SharedChars::new(data.to_string())
    }
}

impl fmt::Debug for SharedChars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedChars({:?})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_until_written() {
        let a = SharedBytes::new(vec![1, 2, 3]);
        let mut b = a.clone();
        assert_eq!(a.ref_count(), 2);
        b.make_mut().push(4);
        assert_eq!(a.as_slice(), &[1, 2, 3]);
        assert_eq!(b.as_slice(), &[1, 2, 3, 4]);
        assert_eq!(a.ref_count(), 1);
    }

    #[test]
    fn test_chars_copy_on_write() {
        let a = SharedChars::from("abc");
        let mut b = a.clone();
        b.make_mut().push('d');
        assert_eq!(a.as_str(), "abc");
        assert_eq!(b.as_str(), "abcd");
    }
}
