use chrono::{TimeZone, Utc};
use interchange::{
    Attachment, AttachmentRef, BigInteger, Codec, JsonCodec, JsonLinesCodec, MsgPackCodec,
    NativeCodec, Value, XmlCodec, YamlCodec,
};
use proptest::prelude::*;
use serde_json::json;
use url::Url;

fn corpus() -> Vec<Value> {
    vec![
        Value::Null,
        Value::Undefined,
        Value::Bool(true),
        Value::Bool(false),
        Value::from(0),
        Value::from(-7),
        Value::from(4_294_967_296u64),
        Value::from(3.25),
        Value::from(-0.001),
        Value::Number(f64::NAN),
        Value::Number(f64::INFINITY),
        Value::Number(f64::NEG_INFINITY),
        Value::BigInteger("-987654321098765432109876543210".parse().unwrap()),
        Value::from(""),
        Value::from("plain"),
        Value::from("multi-script: héllo, Привет, 你好, مرحبا, 🎉"),
        Value::from("quotes \" and \\ and\nnewlines\t<tags> & entities"),
        Value::bytes([]),
        Value::bytes([0, 1, 127, 128, 255]),
        Value::list(Vec::<Value>::new()),
        Value::list([Value::from(1), Value::from("two"), Value::Null]),
        Value::object([("a", 1), ("b", 2)]),
        Value::object([("type", "Buffer"), ("data", "not really")]),
        Value::object([("type", "!already"), ("data", "escaped")]),
        Value::object([("type", "record"), ("data", "plain")]),
        Value::map([
            (Value::from(1), Value::from("int key")),
            (Value::Bool(true), Value::from("bool key")),
            (Value::list([1, 2]), Value::from("list key")),
            (Value::from("s"), Value::from("string key")),
        ]),
        Value::set([Value::from(1), Value::from("a"), Value::list([Value::Null])]),
        Value::date(Utc.with_ymd_and_hms(2024, 2, 29, 12, 30, 45).unwrap()),
        Value::date_millis(-86_400_123).unwrap(),
        Value::Url(Url::parse("https://example.com/path?q=1#frag").unwrap()),
        Value::AttachmentRef(AttachmentRef::new([0xab; 32], "image/png")),
        Value::Attachment(Attachment::new("text/plain", b"attached".to_vec())),
        Value::object([(
            "nested",
            Value::list([
                Value::object([("deep", Value::set([Value::bytes([1])]))]),
                Value::map([(Value::Undefined, Value::Number(f64::NAN))]),
            ]),
        )]),
    ]
}

fn assert_round_trip(codec: &dyn Codec, value: &Value) {
    let bytes = codec
        .encode(value)
        .unwrap_or_else(|e| panic!("{} encode {value:?}: {e}", codec.name()));
    let decoded = codec
        .decode(&bytes)
        .unwrap_or_else(|e| panic!("{} decode {value:?}: {e}", codec.name()));
    assert_eq!(&decoded, value, "{} round trip", codec.name());
}

#[test]
fn whole_document_codecs_round_trip_the_corpus() {
    let codecs: Vec<Box<dyn Codec>> = vec![
        Box::new(JsonCodec::new()),
        Box::new(YamlCodec::new()),
        Box::new(MsgPackCodec::new()),
        Box::new(NativeCodec::new()),
        Box::new(XmlCodec::new()),
    ];
    for codec in &codecs {
        for value in corpus() {
            assert_round_trip(codec.as_ref(), &value);
        }
    }
}

#[test]
fn json_lines_round_trips_lists() {
    assert_round_trip(&JsonLinesCodec::new(), &Value::List(corpus()));
}

#[test]
fn printed_output_decodes_to_the_same_value() {
    let codecs: Vec<Box<dyn Codec>> = vec![
        Box::new(JsonCodec::new()),
        Box::new(YamlCodec::new()),
        Box::new(XmlCodec::new()),
    ];
    let value = Value::List(corpus());
    for codec in &codecs {
        let printed = codec.print(&value).unwrap();
        assert_eq!(codec.decode(printed.as_bytes()).unwrap(), value, "{}", codec.name());
    }
}

#[test]
fn print_is_unsupported_for_binary_formats() {
    assert!(MsgPackCodec::new().print(&Value::Null).is_err());
    assert!(NativeCodec::new().print(&Value::Null).is_err());
}

#[test]
fn json_wire_shapes() {
    let codec = JsonCodec::new();
    let encoded = |v: Value| -> serde_json::Value {
        serde_json::from_slice(&codec.encode(&v).unwrap()).unwrap()
    };
    assert_eq!(encoded(Value::bytes([1, 2])), json!({"type": "Buffer", "data": [1, 2]}));
    assert_eq!(encoded(Value::set([1])), json!({"type": "Set", "data": [1]}));
    assert_eq!(
        encoded(Value::map([(Value::from(1), Value::from("x"))])),
        json!({"type": "Map", "data": [[1, "x"]]})
    );
    assert_eq!(
        encoded(Value::date_millis(1_000).unwrap()),
        json!({"type": "Date", "data": 1000})
    );
    assert_eq!(
        encoded(Value::BigInteger(BigInteger::from(12u64))),
        json!({"type": "BigInteger", "data": "12"})
    );
    assert_eq!(encoded(Value::Undefined), json!({"type": "constant", "data": "undefined"}));
    assert_eq!(encoded(Value::Number(f64::NAN)), json!({"type": "constant", "data": "NaN"}));
    assert_eq!(
        encoded(Value::object([("type", Value::from("Set")), ("data", Value::from(1))])),
        json!({"type": "!Set", "data": 1})
    );
    assert_eq!(
        encoded(Value::object([("type", Value::from("record")), ("data", Value::from(1))])),
        json!({"type": "record", "data": 1})
    );
}

#[test]
fn deeply_nested_input_fails_cleanly() {
    let json = format!("{}{}", "[".repeat(100_000), "]".repeat(100_000));
    assert!(JsonCodec::new().decode(json.as_bytes()).is_err());
    assert!(JsonLinesCodec::new().decode(json.as_bytes()).is_err());
    assert!(YamlCodec::new().decode(json.as_bytes()).is_err());

    let mut msgpack = vec![0x91; 100_000];
    msgpack.push(0xc0);
    assert!(MsgPackCodec::new().decode(&msgpack).is_err());
    let streamed: Result<Vec<Value>, _> = MsgPackCodec::new()
        .decode_stream(Box::new(std::iter::once(msgpack)))
        .unwrap()
        .collect();
    assert!(streamed.is_err());

    let xml = "<array>".repeat(100_000);
    assert!(XmlCodec::new().decode(xml.as_bytes()).is_err());
}

#[test]
fn yaml_buffers_are_hex_text() {
    let text = String::from_utf8(YamlCodec::new().encode(&Value::bytes([0xde, 0xad])).unwrap())
        .unwrap();
    assert!(text.contains("type: Buffer"), "{text}");
    assert!(text.contains("data: dead"), "{text}");
}

#[test]
fn decode_errors_are_reported() {
    assert!(JsonCodec::new().decode(b"{\"a\":").is_err());
    assert!(YamlCodec::new().decode(b"a: [1, 2").is_err());
    assert!(MsgPackCodec::new().decode(&[0xc1]).is_err());
    assert!(NativeCodec::new().decode(b"nope").is_err());
    assert!(XmlCodec::new().decode(b"<a><b></a>").is_err());
    assert!(JsonCodec::new()
        .decode(br#"{"type": "Date", "data": "not a date"}"#)
        .is_err());
}

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        Just(Value::Undefined),
        any::<bool>().prop_map(Value::Bool),
        any::<f64>().prop_map(Value::Number),
        any::<i64>().prop_map(|n| Value::BigInteger(BigInteger::from(n))),
        ".*".prop_map(Value::String),
        proptest::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
        (-10_000_000_000_000i64..10_000_000_000_000i64)
            .prop_map(|ms| Value::date_millis(ms).unwrap_or(Value::Null)),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..6).prop_map(Value::List),
            proptest::collection::vec(("[a-z]{0,6}", inner.clone()), 0..6)
                .prop_map(|entries| Value::object(entries)),
            proptest::collection::vec((inner.clone(), inner.clone()), 0..4)
                .prop_map(|entries| Value::map(entries)),
            proptest::collection::vec(inner, 0..4).prop_map(|items| Value::set(items)),
        ]
    })
}

proptest! {
    #[test]
    fn prop_round_trip_json(v in arb_value()) {
        let codec = JsonCodec::new();
        prop_assert_eq!(codec.decode(&codec.encode(&v).unwrap()).unwrap(), v);
    }

    #[test]
    fn prop_round_trip_yaml(v in arb_value()) {
        let codec = YamlCodec::new();
        prop_assert_eq!(codec.decode(&codec.encode(&v).unwrap()).unwrap(), v);
    }

    #[test]
    fn prop_json_lines_stream_round_trip(
        values in proptest::collection::vec(arb_value(), 0..8),
        chunk in 1usize..64,
    ) {
        let codec = JsonLinesCodec::new();
        let bytes: Vec<u8> = codec
            .encode_iterable(Box::new(values.clone().into_iter()))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
            .concat();
        let chunks: Vec<Vec<u8>> = bytes.chunks(chunk).map(<[u8]>::to_vec).collect();
        let decoded: Vec<Value> = codec
            .decode_stream(Box::new(chunks.into_iter()))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        prop_assert_eq!(decoded, values);
    }

    #[test]
    fn prop_msgpack_stream_round_trip(
        values in proptest::collection::vec(arb_value(), 0..8),
        chunk in 1usize..64,
    ) {
        let codec = MsgPackCodec::new();
        let bytes: Vec<u8> = codec
            .encode_iterable(Box::new(values.clone().into_iter()))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
            .concat();
        let chunks: Vec<Vec<u8>> = bytes.chunks(chunk).map(<[u8]>::to_vec).collect();
        let decoded: Vec<Value> = codec
            .decode_stream(Box::new(chunks.into_iter()))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        prop_assert_eq!(decoded, values);
    }

    #[test]
    fn prop_round_trip_msgpack(v in arb_value()) {
        let codec = MsgPackCodec::new();
        prop_assert_eq!(codec.decode(&codec.encode(&v).unwrap()).unwrap(), v);
    }

    #[test]
    fn prop_round_trip_native(v in arb_value()) {
        let codec = NativeCodec::new();
        prop_assert_eq!(codec.decode(&codec.encode(&v).unwrap()).unwrap(), v);
    }

    #[test]
    fn prop_round_trip_xml(v in arb_value()) {
        let codec = XmlCodec::new();
        prop_assert_eq!(codec.decode(&codec.encode(&v).unwrap()).unwrap(), v);
    }
}
