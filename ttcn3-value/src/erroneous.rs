//! Erroneous-value overlay for negative testing
//!
//! An overlay maps field/element indices of a composite value to override
//! actions, letting a test deliberately corrupt an otherwise well-formed
//! encoding: insert extra content before or after a field, replace the
//! field, or drop it. Two sequence-wide cutoffs additionally suppress
//! every field before/after a threshold. The overlay is consulted once per
//! field by every engine's encode path and is never part of the value
//! itself; decoding has no counterpart, the corrupted bytes are meant for
//! an external system under test.

use crate::descriptor::TypeDescriptor;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Payload of an override action
#[derive(Debug)]
pub enum ErroneousValue {
    /// Raw octets spliced into the output without any encoding
    Raw(Vec<u8>),
    /// A value encoded with its own descriptor in the surrounding format
    Typed {
        value: Value,
        descriptor: &'static TypeDescriptor,
    },
}

/// What to do with the field itself
#[derive(Debug)]
pub enum ValueOverride {
    /// Encode this payload instead of the real field
    Replace(ErroneousValue),
    /// Leave the field out entirely
    Omit,
}

/// Overrides attached to one field/element index
#[derive(Debug, Default)]
pub struct FieldOverride {
    pub before: Option<ErroneousValue>,
    pub value: Option<ValueOverride>,
    pub after: Option<ErroneousValue>,
    /// Overlay applied inside the field when the real encoder recurses
    /// into a nested composite
    pub nested: Option<Box<ErroneousDescriptor>>,
}

/// Per-encode-call override table for one composite value
#[derive(Debug, Default)]
pub struct ErroneousDescriptor {
    /// Fields with an index lower than this are suppressed
    omit_before: Option<usize>,
    /// Fields with an index higher than this are suppressed
    omit_after: Option<usize>,
    overrides: Vec<(usize, FieldOverride)>,
}

impl ErroneousDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_omit_before(&mut self, index: usize) -> &mut Self {
        self.omit_before = Some(index);
        self
    }

    pub fn set_omit_after(&mut self, index: usize) -> &mut Self {
        self.omit_after = Some(index);
        self
    }

    pub fn add_override(&mut self, index: usize, field_override: FieldOverride) -> &mut Self {
        self.overrides.push((index, field_override));
        self
    }

    /// Whether a sequence-wide cutoff suppresses this index
    pub fn is_field_omitted(&self, index: usize) -> bool {
        if let Some(before) = self.omit_before {
            if index < before {
                return true;
            }
        }
        if let Some(after) = self.omit_after {
            if index > after {
                return true;
            }
        }
        false
    }

    /// The override entry of this index, if any
    pub fn override_for(&self, index: usize) -> Option<&FieldOverride> {
        self.overrides
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, o)| o)
    }

    pub fn is_empty(&self) -> bool {
        self.omit_before.is_none() && self.omit_after.is_none() && self.overrides.is_empty()
    }
}

impl ErroneousValue {
    /// Validate a typed payload before handing it to an engine
    ///
    /// A misconfigured override (typed payload whose descriptor lacks the
    /// requested codec, checked by the engine; or an unbound payload,
    /// checked here) is a programming error in the test, not a condition
    /// the overlay is meant to create, so it is always fatal.
    pub fn check(&self) -> CodecResult<()> {
        match self {
            ErroneousValue::Raw(_) => Ok(()),
            ErroneousValue::Typed { value, descriptor } => {
                if !value.is_bound() {
                    return Err(CodecError::Internal(format!(
                        "erroneous override for type {} holds an unbound value",
                        descriptor.name
                    )));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cutoffs() {
        let mut descr = ErroneousDescriptor::new();
        descr.set_omit_before(2).set_omit_after(4);
        assert!(descr.is_field_omitted(0));
        assert!(descr.is_field_omitted(1));
        assert!(!descr.is_field_omitted(2));
        assert!(!descr.is_field_omitted(4));
        assert!(descr.is_field_omitted(5));
    }

    #[test]
    fn test_override_lookup() {
        let mut descr = ErroneousDescriptor::new();
        descr.add_override(
            1,
            FieldOverride {
                value: Some(ValueOverride::Omit),
                ..FieldOverride::default()
            },
        );
        assert!(descr.override_for(0).is_none());
        assert!(matches!(
            descr.override_for(1).unwrap().value,
            Some(ValueOverride::Omit)
        ));
    }

    #[test]
    fn test_unbound_typed_payload_is_internal_error() {
        let payload = ErroneousValue::Typed {
            value: Value::Unbound,
            descriptor: &crate::descriptor::INTEGER,
        };
        assert!(matches!(
            payload.check().unwrap_err(),
            CodecError::Internal(_)
        ));
    }
}
