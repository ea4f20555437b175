//! Cross-engine properties: one record through every wire format,
//! canonical set ordering, and the erroneous-value overlay.

use ttcn3::codec::{decode, encode, encode_erroneous, BerVariant, CodecFormat, XerFlavor};
use ttcn3::descriptor::ber::{self, BerDescriptor, BerTag};
use ttcn3::descriptor::json::JsonDescriptor;
use ttcn3::descriptor::raw::RawDescriptor;
use ttcn3::descriptor::text::{TextDescriptor, TextToken};
use ttcn3::descriptor::xer::XerDescriptor;
use ttcn3::descriptor::{self, FieldDescriptor, TypeDescriptor, TypeKind};
use ttcn3::{
    ErroneousDescriptor, ErroneousValue, ErrorPolicy, FieldOverride, Record, Value, ValueOverride,
};

static ITEM_TEXT: TextDescriptor = TextDescriptor {
    begin: Some(TextToken::Literal("{")),
    end: Some(TextToken::Literal("}")),
    separator: Some(TextToken::Literal(",")),
    ..TextDescriptor::PLAIN
};

static ITEM_XER: XerDescriptor = XerDescriptor::plain("Item");

static ITEM: TypeDescriptor = TypeDescriptor {
    name: "Item",
    kind: TypeKind::Record {
        fields: &[
            FieldDescriptor {
                name: "count",
                ty: &descriptor::INTEGER,
                optional: false,
                default: None,
            },
            FieldDescriptor {
                name: "name",
                ty: &descriptor::CHARSTRING,
                optional: false,
                default: None,
            },
        ],
        is_set: false,
    },
    ber: Some(&ber::SEQUENCE_BER),
    raw: Some(&RawDescriptor::DEFAULT),
    text: Some(&ITEM_TEXT),
    xer: Some(&ITEM_XER),
    json: Some(&JsonDescriptor::PLAIN),
};

// A set whose declaration order deliberately disagrees with tag order
static HIGH_TAG_BER: BerDescriptor = BerDescriptor {
    tags: &[BerTag::context(false, 2)],
};

static HIGH: TypeDescriptor = TypeDescriptor {
    name: "High",
    kind: TypeKind::Integer,
    ber: Some(&HIGH_TAG_BER),
    raw: None,
    text: None,
    xer: None,
    json: None,
};

static LOW_TAG_BER: BerDescriptor = BerDescriptor {
    tags: &[BerTag::context(false, 1)],
};

static LOW: TypeDescriptor = TypeDescriptor {
    name: "Low",
    kind: TypeKind::Integer,
    ber: Some(&LOW_TAG_BER),
    raw: None,
    text: None,
    xer: None,
    json: None,
};

static TAGGED_SET: TypeDescriptor = TypeDescriptor {
    name: "TaggedSet",
    kind: TypeKind::Record {
        fields: &[
            FieldDescriptor {
                name: "high",
                ty: &HIGH,
                optional: false,
                default: None,
            },
            FieldDescriptor {
                name: "low",
                ty: &LOW,
                optional: false,
                default: None,
            },
        ],
        is_set: true,
    },
    ber: Some(&ber::SET_BER),
    raw: None,
    text: None,
    xer: None,
    json: None,
};

fn item(count: i64, name: &str) -> Value {
    Value::Record(Record::from_fields(vec![
        Value::from(count),
        Value::from(name),
    ]))
}

const ALL_FORMATS: [CodecFormat; 10] = [
    CodecFormat::Ber(BerVariant::Ber),
    CodecFormat::Ber(BerVariant::Cer),
    CodecFormat::Ber(BerVariant::Der),
    CodecFormat::Raw,
    CodecFormat::Text,
    CodecFormat::Xer(XerFlavor::Basic),
    CodecFormat::Xer(XerFlavor::Canonical),
    CodecFormat::Xer(XerFlavor::Extended),
    CodecFormat::Json { pretty: false },
    CodecFormat::Json { pretty: true },
];

#[test]
fn record_roundtrips_through_every_format() {
    let policy = ErrorPolicy::new();
    let value = item(42, "probe");
    for format in ALL_FORMATS {
        let message = encode(&value, &ITEM, format, &policy).unwrap();
        let back = decode(&message, &ITEM, format, &policy).unwrap();
        assert!(back.is_equal(&value), "format {}", format.name());
    }
}

#[test]
fn text_encoding_is_token_framed() {
    let policy = ErrorPolicy::new();
    let message = encode(&item(5, "abc"), &ITEM, CodecFormat::Text, &policy).unwrap();
    assert_eq!(message, b"{5,abc}");
}

#[test]
fn der_sorts_set_members_by_tag() {
    let policy = ErrorPolicy::new();
    let value = Value::Record(Record::from_fields(vec![
        Value::from(10i64),
        Value::from(20i64),
    ]));

    // Plain BER keeps declaration order: [2] before [1]
    let plain = encode(&value, &TAGGED_SET, CodecFormat::Ber(BerVariant::Ber), &policy).unwrap();
    assert_eq!(plain[2], 0x82);

    // DER orders members by tag: [1] before [2]
    let der = encode(&value, &TAGGED_SET, CodecFormat::Ber(BerVariant::Der), &policy).unwrap();
    assert_eq!(der[2], 0x81);

    let back = decode(&der, &TAGGED_SET, CodecFormat::Ber(BerVariant::Der), &policy).unwrap();
    assert!(back.is_equal(&value));
}

#[test]
fn empty_overlay_leaves_output_untouched() {
    let policy = ErrorPolicy::new();
    let value = item(7, "x");
    let overlay = ErroneousDescriptor::new();
    for format in ALL_FORMATS {
        let plain = encode(&value, &ITEM, format, &policy).unwrap();
        let overlaid =
            encode_erroneous(&value, &ITEM, format, &policy, Some(&overlay)).unwrap();
        assert_eq!(plain, overlaid, "format {}", format.name());
    }
}

#[test]
fn overlay_omits_one_field() {
    let policy = ErrorPolicy::new();
    let mut overlay = ErroneousDescriptor::new();
    overlay.add_override(
        0,
        FieldOverride {
            value: Some(ValueOverride::Omit),
            ..FieldOverride::default()
        },
    );
    let message = encode_erroneous(
        &item(7, "x"),
        &ITEM,
        CodecFormat::Json { pretty: false },
        &policy,
        Some(&overlay),
    )
    .unwrap();
    assert_eq!(message, b"{\"name\":\"x\"}");
}

#[test]
fn overlay_replaces_a_field_with_a_typed_payload() {
    let policy = ErrorPolicy::new();
    let mut overlay = ErroneousDescriptor::new();
    overlay.add_override(
        0,
        FieldOverride {
            value: Some(ValueOverride::Replace(ErroneousValue::Typed {
                value: Value::from(false),
                descriptor: &descriptor::BOOLEAN,
            })),
            ..FieldOverride::default()
        },
    );
    let message = encode_erroneous(
        &item(7, "x"),
        &ITEM,
        CodecFormat::Json { pretty: false },
        &policy,
        Some(&overlay),
    )
    .unwrap();
    assert_eq!(message, b"{\"count\":false,\"name\":\"x\"}");
}

#[test]
fn overlay_inserts_raw_bytes_after_a_field() {
    let policy = ErrorPolicy::new();
    let mut overlay = ErroneousDescriptor::new();
    overlay.add_override(
        1,
        FieldOverride {
            after: Some(ErroneousValue::Raw(b"garbage".to_vec())),
            ..FieldOverride::default()
        },
    );
    let message = encode_erroneous(
        &item(5, "abc"),
        &ITEM,
        CodecFormat::Text,
        &policy,
        Some(&overlay),
    )
    .unwrap();
    assert_eq!(message, b"{5,abcgarbage}");
}
