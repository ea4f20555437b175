//! Struct-of-fields container ("record"/"set")
//!
//! A record has a fixed field count fixed by its type descriptor. Fields
//! are stored in declaration order; optional fields that are left out hold
//! [`Value::Omitted`]. The container itself does not know field names or
//! optionality, that knowledge lives in the descriptor.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Fixed, ordered set of heterogeneous fields
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: Vec<Value>,
}

impl Record {
    /// Create a record with `field_count` unbound fields
    pub fn new(field_count: usize) -> Self {
        Self {
            fields: vec![Value::Unbound; field_count],
        }
    }

    /// Create a record from already-built field values
    pub fn from_fields(fields: Vec<Value>) -> Self {
        Self { fields }
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Read access to a field by declaration index
    pub fn get_field(&self, index: usize) -> CodecResult<&Value> {
        self.fields.get(index).ok_or_else(|| {
            CodecError::Internal(format!(
                "field index {} out of range ({} fields)",
                index,
                self.fields.len()
            ))
        })
    }

    /// Write access to a field by declaration index
    pub fn get_field_mut(&mut self, index: usize) -> CodecResult<&mut Value> {
        let count = self.fields.len();
        self.fields.get_mut(index).ok_or_else(|| {
            CodecError::Internal(format!(
                "field index {} out of range ({} fields)",
                index, count
            ))
        })
    }

    pub fn set_field(&mut self, index: usize, value: Value) -> CodecResult<()> {
        *self.get_field_mut(index)? = value;
        Ok(())
    }

    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    /// A record is bound once any of its fields has been given content
    /// (an omitted optional counts as content)
    pub fn is_bound(&self) -> bool {
        self.fields
            .iter()
            .any(|f| f.is_bound() || matches!(f, Value::Omitted))
    }

    /// A record is a value when every field is either omitted or fully
    /// initialized
    pub fn is_value(&self) -> bool {
        self.fields
            .iter()
            .all(|f| matches!(f, Value::Omitted) || f.is_value())
    }

    pub fn is_equal(&self, other: &Record) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|(a, b)| a.is_equal(b))
    }

    /// Reset every field to unbound
    pub fn clean_up(&mut self) {
        for field in &mut self.fields {
            *field = Value::Unbound;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_unbound() {
        let rec = Record::new(3);
        assert!(!rec.is_bound());
        assert!(!rec.is_value());
    }

    #[test]
    fn test_partial_record_is_bound_but_not_value() {
        let mut rec = Record::new(2);
        rec.set_field(0, Value::from(5i64)).unwrap();
        assert!(rec.is_bound());
        assert!(!rec.is_value());
        rec.set_field(1, Value::Omitted).unwrap();
        assert!(rec.is_value());
    }

    #[test]
    fn test_field_index_out_of_range() {
        let rec = Record::new(1);
        assert!(matches!(
            rec.get_field(5).unwrap_err(),
            CodecError::Internal(_)
        ));
    }

    #[test]
    fn test_record_equality() {
        let a = Record::from_fields(vec![Value::from(1i64), Value::Omitted]);
        let b = Record::from_fields(vec![Value::from(1i64), Value::Omitted]);
        let c = Record::from_fields(vec![Value::from(2i64), Value::Omitted]);
        assert!(a.is_equal(&b));
        assert!(!a.is_equal(&c));
    }
}
