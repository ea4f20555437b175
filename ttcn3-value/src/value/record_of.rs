//! Homogeneous sequence container ("record of"/"set of")
//!
//! The element array is reference-counted and copy-on-write: assigning one
//! record-of to another shares the array until either side writes. On top
//! of that sits the external index reference table: an accessor that hands
//! out an element position registers the index here, and while the
//! reference is held the physical slot at that index is never deallocated,
//! only zeroed in place. This keeps positional accessors stable across
//! shrinking, which is a policy choice, not a memory-safety need.

use std::collections::BTreeSet;
use std::rc::Rc;

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Variable-length, ordered sequence of homogeneous elements
#[derive(Debug, Default)]
pub struct RecordOf {
    /// Physical element slots; may be longer than `len` while aliased
    /// indices past the logical end are still held
    elements: Rc<Vec<Value>>,
    /// Logical element count
    len: usize,
    /// Indices currently aliased by in-place accessors
    index_refs: BTreeSet<usize>,
}

impl RecordOf {
    /// Create an empty sequence
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_elements(elements: Vec<Value>) -> Self {
        Self {
            len: elements.len(),
            elements: Rc::new(elements),
            index_refs: BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of physical slots currently allocated
    pub fn storage_len(&self) -> usize {
        self.elements.len()
    }

    /// Number of handles sharing the element array
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.elements)
    }

    /// Grow or shrink the sequence
    ///
    /// Growing appends unbound elements. Shrinking clears the removed
    /// elements; slots at aliased indices are zeroed in place and their
    /// storage survives until the alias is released.
    pub fn set_size(&mut self, new_size: usize) -> CodecResult<()> {
        let elements = Rc::make_mut(&mut self.elements);
        if new_size >= self.len {
            // Slots past the logical end may survive a previous shrink
            // while aliased; they re-enter the sequence unbound.
            for slot in elements.iter_mut().take(new_size).skip(self.len) {
                *slot = Value::Unbound;
            }
            if elements.len() < new_size {
                elements.resize(new_size, Value::Unbound);
            }
        } else {
            for slot in elements.iter_mut().take(self.len).skip(new_size) {
                *slot = Value::Unbound;
            }
            let keep = match self.index_refs.iter().next_back() {
                Some(&highest) if highest >= new_size => highest + 1,
                _ => new_size,
            };
            elements.truncate(keep);
        }
        self.len = new_size;
        Ok(())
    }

    /// Read access; out-of-range or unbound access is an error
    pub fn get_at(&self, index: usize) -> CodecResult<&Value> {
        if index >= self.len {
            return Err(CodecError::Constraint(format!(
                "index {} out of range ({} elements)",
                index, self.len
            )));
        }
        let element = &self.elements[index];
        if !element.is_bound() {
            return Err(CodecError::Unbound(format!(
                "element {} is unbound",
                index
            )));
        }
        Ok(element)
    }

    /// Write access; extends the sequence on demand
    pub fn get_at_mut(&mut self, index: usize) -> CodecResult<&mut Value> {
        if index >= self.len {
            self.set_size(index + 1)?;
        }
        Ok(&mut Rc::make_mut(&mut self.elements)[index])
    }

    /// Register an external reference to `index`
    pub fn add_index_ref(&mut self, index: usize) {
        self.index_refs.insert(index);
    }

    /// Release an external reference; trims slots kept alive only by it
    pub fn remove_index_ref(&mut self, index: usize) {
        self.index_refs.remove(&index);
        let keep = match self.index_refs.iter().next_back() {
            Some(&highest) if highest >= self.len => highest + 1,
            _ => self.len,
        };
        if keep < self.elements.len() {
            Rc::make_mut(&mut self.elements).truncate(keep);
        }
    }

    pub fn has_index_refs(&self) -> bool {
        !self.index_refs.is_empty()
    }

    /// Iterate the logical elements
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.elements[..self.len].iter()
    }

    pub fn is_value(&self) -> bool {
        self.iter().all(|e| e.is_value())
    }

    pub fn is_equal(&self, other: &RecordOf) -> bool {
        self.len == other.len
            && self
                .iter()
                .zip(other.iter())
                .all(|(a, b)| a.is_equal(b))
    }

    // The four sequence builders return a new sequence instead of mutating
    // in place; element payloads stay shared through their own
    // copy-on-write blocks.

    pub fn rotate_left(&self, count: usize) -> RecordOf {
        if self.len == 0 {
            return RecordOf::new();
        }
        let mut elements: Vec<Value> = self.iter().cloned().collect();
        elements.rotate_left(count % self.len);
        RecordOf::from_elements(elements)
    }

    pub fn rotate_right(&self, count: usize) -> RecordOf {
        if self.len == 0 {
            return RecordOf::new();
        }
        let mut elements: Vec<Value> = self.iter().cloned().collect();
        elements.rotate_right(count % self.len);
        RecordOf::from_elements(elements)
    }

    pub fn concat(&self, other: &RecordOf) -> RecordOf {
        let mut elements: Vec<Value> = self.iter().cloned().collect();
        elements.extend(other.iter().cloned());
        RecordOf::from_elements(elements)
    }

    pub fn substr(&self, start: usize, count: usize) -> CodecResult<RecordOf> {
        let end = start.checked_add(count).filter(|&end| end <= self.len);
        let Some(end) = end else {
            return Err(CodecError::Constraint(format!(
                "substr({}, {}) exceeds {} elements",
                start, count, self.len
            )));
        };
        Ok(RecordOf::from_elements(self.elements[start..end].to_vec()))
    }

    pub fn replace(
        &self,
        start: usize,
        count: usize,
        replacement: &RecordOf,
    ) -> CodecResult<RecordOf> {
        let end = start.checked_add(count).filter(|&end| end <= self.len);
        let Some(end) = end else {
            return Err(CodecError::Constraint(format!(
                "replace({}, {}) exceeds {} elements",
                start, count, self.len
            )));
        };
        let mut elements: Vec<Value> = self.elements[..start].to_vec();
        elements.extend(replacement.iter().cloned());
        elements.extend_from_slice(&self.elements[end..self.len]);
        Ok(RecordOf::from_elements(elements))
    }
}

impl Clone for RecordOf {
    /// Assignment shares the element array unless external index
    /// references are active, in which case the source is deep-copied so
    /// the aliased slots stay put.
    fn clone(&self) -> Self {
        if self.index_refs.is_empty() {
            Self {
                elements: Rc::clone(&self.elements),
                len: self.len,
                index_refs: BTreeSet::new(),
            }
        } else {
            Self {
                elements: Rc::new(self.elements[..self.len].to_vec()),
                len: self.len,
                index_refs: BTreeSet::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(values: &[i64]) -> RecordOf {
        RecordOf::from_elements(values.iter().map(|&v| Value::from(v)).collect())
    }

    #[test]
    fn test_copy_on_write_isolation() {
        let a = seq(&[1, 2, 3]);
        let mut b = a.clone();
        assert_eq!(a.ref_count(), 2);
        *b.get_at_mut(0).unwrap() = Value::from(99i64);
        assert_eq!(a.get_at(0).unwrap().as_i64().unwrap(), 1);
        assert_eq!(b.get_at(0).unwrap().as_i64().unwrap(), 99);
    }

    #[test]
    fn test_aliased_slot_survives_shrink() {
        let mut a = seq(&[10, 11, 12, 13, 14]);
        a.add_index_ref(2);
        a.set_size(1).unwrap();
        assert_eq!(a.len(), 1);
        // slot 2 still allocated, zeroed in place
        assert_eq!(a.storage_len(), 3);
        a.remove_index_ref(2);
        assert_eq!(a.storage_len(), 1);
    }

    #[test]
    fn test_clone_with_alias_deep_copies() {
        let mut a = seq(&[1, 2]);
        a.add_index_ref(0);
        let b = a.clone();
        assert_eq!(a.ref_count(), 1);
        assert_eq!(b.ref_count(), 1);
        assert!(b.is_equal(&a));
    }

    #[test]
    fn test_shrink_clears_every_removed_slot() {
        let mut a = seq(&[10, 11, 12, 13, 14]);
        a.add_index_ref(4);
        a.set_size(1).unwrap();
        // slots 1..4 survive physically only for the alias on 4
        assert_eq!(a.storage_len(), 5);
        a.set_size(4).unwrap();
        for i in 1..4 {
            assert!(matches!(a.get_at(i).unwrap_err(), CodecError::Unbound(_)));
        }
        assert_eq!(a.get_at(0).unwrap().as_i64().unwrap(), 10);
    }

    #[test]
    fn test_substr_replace_range_overflow() {
        let a = seq(&[1, 2, 3]);
        assert!(matches!(
            a.substr(usize::MAX, 2).unwrap_err(),
            CodecError::Constraint(_)
        ));
        assert!(matches!(
            a.replace(2, usize::MAX, &seq(&[9])).unwrap_err(),
            CodecError::Constraint(_)
        ));
    }

    #[test]
    fn test_const_access_errors() {
        let a = seq(&[1]);
        assert!(matches!(
            a.get_at(3).unwrap_err(),
            CodecError::Constraint(_)
        ));
        let mut b = RecordOf::new();
        b.set_size(1).unwrap();
        assert!(matches!(b.get_at(0).unwrap_err(), CodecError::Unbound(_)));
    }

    #[test]
    fn test_builders_do_not_mutate() {
        let a = seq(&[1, 2, 3, 4]);
        let rotated = a.rotate_left(1);
        assert_eq!(rotated.get_at(0).unwrap().as_i64().unwrap(), 2);
        assert_eq!(a.get_at(0).unwrap().as_i64().unwrap(), 1);

        let sub = a.substr(1, 2).unwrap();
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.get_at(0).unwrap().as_i64().unwrap(), 2);

        let joined = a.concat(&sub);
        assert_eq!(joined.len(), 6);

        let replaced = a.replace(0, 2, &sub).unwrap();
        assert_eq!(replaced.get_at(0).unwrap().as_i64().unwrap(), 2);
        assert_eq!(replaced.len(), 4);
    }
}
