//! JSON codec engine
//!
//! Scalars map onto native JSON tokens, octetstrings onto uppercase hex
//! strings, records onto objects and record-ofs onto arrays. The JSON
//! sub-descriptors steer member naming (aliases), null handling for
//! omitted optionals, unbound markers and decode-time defaults.

mod decoder;
mod encoder;
mod tokenizer;

pub use decoder::JsonDecoder;
pub use encoder::JsonEncoder;
pub use tokenizer::{JsonToken, JsonTokenizer, JsonWriter};

use ttcn3_value::descriptor::json::JsonDescriptor;
use ttcn3_value::descriptor::TypeDescriptor;
use ttcn3_value::erroneous::ErroneousDescriptor;
use ttcn3_value::error::{CodecError, CodecResult, ErrorPolicy};
use ttcn3_value::value::Value;

pub fn encode(
    value: &Value,
    descriptor: &'static TypeDescriptor,
    pretty: bool,
    policy: &ErrorPolicy,
    erroneous: Option<&ErroneousDescriptor>,
) -> CodecResult<Vec<u8>> {
    let mut out = JsonWriter::new(pretty);
    JsonEncoder::new(policy).encode(value, descriptor, &mut out, erroneous)?;
    Ok(out.into_string().into_bytes())
}

pub fn decode(
    data: &[u8],
    descriptor: &'static TypeDescriptor,
    policy: &ErrorPolicy,
) -> CodecResult<Value> {
    let input = std::str::from_utf8(data)
        .map_err(|_| CodecError::InvalidData("JSON message is not valid UTF-8".to_string()))?;
    let mut decoder = JsonDecoder::new(input, policy);
    let value = decoder.decode(descriptor)?;
    decoder.finish()?;
    Ok(value)
}

pub(super) fn require_json(
    descriptor: &'static TypeDescriptor,
) -> CodecResult<&'static JsonDescriptor> {
    descriptor.json.ok_or(CodecError::NoCodec {
        format: "JSON",
        type_name: descriptor.name,
    })
}

pub(crate) fn hex_upper(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for octet in data {
        out.push_str(&format!("{:02X}", octet));
    }
    out
}

pub(crate) fn parse_hex(text: &str) -> CodecResult<Vec<u8>> {
    if !text.is_ascii() {
        return Err(CodecError::InvalidData(
            "non-ASCII character in hex string".to_string(),
        ));
    }
    if text.len() % 2 != 0 {
        return Err(CodecError::InvalidData(
            "odd number of hex digits".to_string(),
        ));
    }
    let mut out = Vec::with_capacity(text.len() / 2);
    for i in (0..text.len()).step_by(2) {
        let octet = u8::from_str_radix(&text[i..i + 2], 16).map_err(|_| {
            CodecError::InvalidData(format!("invalid hex digits {:?}", &text[i..i + 2]))
        })?;
        out.push(octet);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ttcn3_value::descriptor;
    use ttcn3_value::value::RecordOf;

    #[test]
    fn test_array_roundtrip() {
        static INTS: TypeDescriptor = TypeDescriptor {
            name: "Ints",
            kind: ttcn3_value::descriptor::TypeKind::RecordOf {
                element: &descriptor::INTEGER,
                is_set_of: false,
            },
            ber: None,
            raw: None,
            text: None,
            xer: None,
            json: Some(&JsonDescriptor::PLAIN),
        };
        let policy = ErrorPolicy::new();
        let value = Value::RecordOf(RecordOf::from_elements(vec![
            Value::from(1i64),
            Value::from(-2i64),
            Value::from(3i64),
        ]));
        let encoded = encode(&value, &INTS, false, &policy, None).unwrap();
        assert_eq!(encoded, b"[1,-2,3]");
        let decoded = decode(&encoded, &INTS, &policy).unwrap();
        assert!(decoded.is_equal(&value));
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(hex_upper(&[0xAB, 0x01]), "AB01");
        assert_eq!(parse_hex("AB01").unwrap(), vec![0xAB, 0x01]);
        assert!(parse_hex("A").is_err());
    }
}
