//! JSON sub-descriptor

/// JSON information of a type
///
/// Field-for-field the shape the original runtime uses; the decoder always
/// accepts both the omitted and the null spelling of an absent optional,
/// whatever `omit_as_null` says.
#[derive(Debug)]
pub struct JsonDescriptor {
    /// Encode an omitted optional field as `"name": null` instead of
    /// leaving the pair out entirely
    pub omit_as_null: bool,
    /// Encoded/decoded in place of the field's real name
    pub alias: Option<&'static str>,
    /// Encode the bare value without wrapping it in a one-pair object
    pub as_value: bool,
    /// JSON text decoded for the field when it is absent from the input
    pub default_value: Option<&'static str>,
    /// Encode unbound fields/elements as null plus a
    /// `"metainfo <name>": "unbound"` marker, and honor the marker on
    /// decode
    pub metainfo_unbound: bool,
}

impl JsonDescriptor {
    pub const PLAIN: JsonDescriptor = JsonDescriptor {
        omit_as_null: false,
        alias: None,
        as_value: false,
        default_value: None,
        metainfo_unbound: false,
    };
}

pub static PLAIN_JSON: JsonDescriptor = JsonDescriptor::PLAIN;
