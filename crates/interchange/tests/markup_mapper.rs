use interchange::xml::{from_document, to_document, Element, XmlParser, ARBITRARY_NS};
use interchange::{hash_value, Codec, DatasetEntry, Pipeline, Value, XmlCodec};

#[test]
fn object_encodes_to_the_expected_markup() {
    let value = Value::object([
        (
            "foo",
            Value::list([
                Value::from(5),
                Value::from("12"),
                Value::Bool(false),
                Value::Null,
                Value::Bool(true),
            ]),
        ),
        ("bar", Value::from("no thanks")),
    ]);
    let xml = String::from_utf8(XmlCodec::new().encode(&value).unwrap()).unwrap();
    assert_eq!(
        xml,
        format!(
            "<object xmlns=\"{ARBITRARY_NS}\"><array name=\"foo\"><number>5</number>\
             <string>12</string><false/><null/><true/></array>\
             <string name=\"bar\">no thanks</string></object>"
        )
    );
    assert_eq!(XmlCodec::new().decode(xml.as_bytes()).unwrap(), value);
}

#[test]
fn plain_markup_decodes_to_a_tagged_tree() {
    let decoded = XmlCodec::new()
        .decode(br#"<root><foo arg="1">msg</foo></root>"#)
        .unwrap();
    let expected = Value::list([
        Value::from("root"),
        Value::list([
            Value::from("foo"),
            Value::object([("arg", "1")]),
            Value::from("msg"),
        ]),
    ]);
    assert_eq!(decoded, expected);
    // The tree writes back as the same markup.
    assert_eq!(
        XmlCodec::new().encode(&expected).unwrap(),
        br#"<root><foo arg="1">msg</foo></root>"#
    );
}

#[test]
fn documents_from_outside_keep_their_structure() {
    let doc = "<?xml version=\"1.0\"?>\n<!-- feed -->\n<feed lang=\"en\">\n  <entry><![CDATA[a < b]]></entry>\n  <entry>x &amp; y&#33;</entry>\n</feed>";
    let root = XmlParser::parse_bytes(doc.as_bytes()).unwrap();
    assert_eq!(root.tag, "feed");
    assert_eq!(root.get_attr("lang"), Some("en"));
    let texts: Vec<String> = root.elements().map(Element::inner_text).collect();
    assert_eq!(texts, ["a < b", "x & y!"]);
    assert_eq!(
        from_document(&root).unwrap(),
        Value::list([
            Value::from("feed"),
            Value::object([("lang", "en")]),
            Value::list([Value::from("entry"), Value::from("a < b")]),
            Value::list([Value::from("entry"), Value::from("x & y!")]),
        ])
    );
}

#[test]
fn lists_that_are_not_tagged_trees_are_encoded() {
    let not_a_tree = Value::list([Value::from("has space"), Value::from(1)]);
    let root = to_document(&not_a_tree);
    assert_eq!(root.tag, "array");
    assert_eq!(root.get_attr("xmlns"), Some(ARBITRARY_NS));
    assert_eq!(from_document(&root).unwrap(), not_a_tree);
}

#[test]
fn pretty_output_decodes_like_compact_output() {
    let value = Value::object([
        ("nested", Value::list([Value::object([("x", Value::bytes([1, 2]))])])),
        ("text", Value::from("  padded  ")),
    ]);
    let codec = XmlCodec::new();
    let pretty = codec.print(&value).unwrap();
    assert!(pretty.contains("\n  <array name=\"nested\">"), "{pretty}");
    assert_eq!(codec.decode(pretty.as_bytes()).unwrap(), value);
}

#[test]
fn entries_export_carries_record_attributes() {
    let value = Value::object([("title", "first")]);
    let entry = DatasetEntry {
        id: "rec-1".to_owned(),
        hash: hash_value(&value),
        version: 3,
        value: value.clone(),
    };
    let chunks: Vec<Vec<u8>> = Pipeline::new(XmlCodec::new().entries_encoder(), vec![entry].into_iter())
        .collect::<Result<_, _>>()
        .unwrap();
    let text = String::from_utf8(chunks.concat()).unwrap();
    let root = XmlParser::new(&text).parse().unwrap();
    assert_eq!(root.tag, "array");
    let record = root.elements().next().unwrap();
    assert_eq!(record.tag, "entry");
    assert_eq!(record.get_attr("id"), Some("rec-1"));
    assert_eq!(record.get_attr("hash"), Some(hex::encode(hash_value(&value)).as_str()));
    assert_eq!(record.get_attr("version"), Some("3"));
    assert_eq!(record.elements().next().map(|el| el.tag.as_str()), Some("object"));
    assert_eq!(XmlCodec::new().decode(text.as_bytes()).unwrap(), Value::list([value]));
}
