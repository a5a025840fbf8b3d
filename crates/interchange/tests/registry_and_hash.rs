use std::collections::HashSet;
use std::sync::Arc;

use interchange::{
    content_hash, hash_value, Attachment, BigInteger, Codec, CodecError, CodecRegistry,
    ContentHasher, NativeCodec, Value,
};

#[test]
fn every_registered_codec_is_reachable_by_its_own_tables() {
    let registry = CodecRegistry::with_defaults();
    for codec in registry.codecs() {
        for media_type in codec.handles() {
            assert_eq!(registry.lookup(media_type).unwrap().name(), codec.name());
            let upper = media_type.to_ascii_uppercase();
            assert_eq!(registry.lookup(&upper).unwrap().name(), codec.name());
        }
        for ext in codec.extensions() {
            let file = format!("some/dir/export.{ext}");
            assert_eq!(registry.lookup(&file).unwrap().name(), codec.name());
        }
    }
}

#[test]
fn registry_dispatches_encode_and_decode() {
    let registry = CodecRegistry::with_defaults();
    let value = Value::object([("when", Value::date_millis(1_700_000_000_000).unwrap())]);
    for query in ["out.json", "out.yaml", "out.msgpack", "out.xml", "application/jsonl"] {
        let codec = registry.resolve(query).unwrap();
        let bytes = codec.encode(&value).unwrap();
        let decoded = codec.decode(&bytes).unwrap();
        if codec.name() == "jsonl" {
            let entry = Value::list([Value::from("when"), value.get("when").unwrap().clone()]);
            assert_eq!(decoded, Value::list([entry]));
        } else {
            assert_eq!(decoded, value, "{query}");
        }
    }
}

#[test]
fn unknown_queries_do_not_resolve() {
    let registry = CodecRegistry::with_defaults();
    for query in ["", "text/plain", "archive.tar.gz", "json", "data.native"] {
        assert!(registry.lookup(query).is_none(), "{query}");
    }
    assert!(matches!(
        registry.resolve("text/plain"),
        Err(CodecError::SourceIdentification { .. })
    ));
}

#[test]
fn explicit_registration_can_add_native() {
    let mut registry = CodecRegistry::new();
    registry.register(Arc::new(NativeCodec::new()));
    assert_eq!(registry.by_name("NATIVE").unwrap().name(), "native");
    assert!(registry.lookup("application/json").is_none());
}

#[test]
fn object_key_order_does_not_change_the_hash() {
    let a = Value::object([("a", 1), ("b", 2)]);
    let b = Value::object([("b", 2), ("a", 1)]);
    assert_eq!(hash_value(&a), hash_value(&b));

    let nested_a = Value::list([Value::map([
        (Value::from(1), a.clone()),
        (Value::from("k"), Value::set([1, 2, 3])),
    ])]);
    let nested_b = Value::list([Value::map([
        (Value::from("k"), Value::set([3, 1, 2])),
        (Value::from(1), b.clone()),
    ])]);
    assert_eq!(hash_value(&nested_a), hash_value(&nested_b));
}

#[test]
fn hash_survives_a_native_round_trip() {
    let value = Value::object([
        ("n", Value::Number(-0.0)),
        ("nan", Value::Number(f64::NAN)),
        ("big", Value::BigInteger(BigInteger::from(-12i64))),
        ("att", Value::Attachment(Attachment::new("a/b", vec![1, 2, 3]))),
        ("set", Value::set([Value::from("x"), Value::Undefined])),
    ]);
    let codec = NativeCodec::new();
    let decoded = codec.decode(&codec.encode(&value).unwrap()).unwrap();
    assert_eq!(hash_value(&decoded), hash_value(&value));
}

#[test]
fn distinct_values_hash_differently() {
    let corpus = vec![
        Value::Null,
        Value::Undefined,
        Value::Bool(false),
        Value::Bool(true),
        Value::from(0),
        Value::from(1),
        Value::Number(f64::NAN),
        Value::Number(f64::INFINITY),
        Value::BigInteger(BigInteger::from(1u64)),
        Value::from(""),
        Value::from("1"),
        Value::from("null"),
        Value::bytes([]),
        Value::bytes([1]),
        Value::bytes(*b"1"),
        Value::list(Vec::<Value>::new()),
        Value::list([Value::Null]),
        Value::list([Value::list(Vec::<Value>::new())]),
        Value::object(Vec::<(String, Value)>::new()),
        Value::object([("a", Value::Null)]),
        Value::object([("a", Value::Undefined)]),
        Value::object([("ab", Value::from(""))]),
        Value::object([("a", Value::from("b"))]),
        Value::map(Vec::<(Value, Value)>::new()),
        Value::map([(Value::from("a"), Value::Null)]),
        Value::set(Vec::<Value>::new()),
        Value::set([Value::Null]),
        Value::list([Value::from("a"), Value::from("b")]),
        Value::list([Value::from("ab")]),
        Value::date_millis(0).unwrap(),
        Value::date_millis(1).unwrap(),
    ];
    let hashes: HashSet<_> = corpus.iter().map(hash_value).collect();
    assert_eq!(hashes.len(), corpus.len());
}

#[test]
fn incremental_content_hash_matches_one_shot() {
    let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let mut hasher = ContentHasher::new();
    for chunk in data.chunks(333) {
        hasher.update(chunk);
    }
    assert_eq!(hasher.size(), data.len() as u64);
    assert_eq!(hasher.finalize(), content_hash(&data));
    assert_eq!(*Attachment::new("x/y", data.clone()).hash(), content_hash(&data));
}
