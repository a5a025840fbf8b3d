use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use interchange::{
    decoder_duplex, encoder_duplex, Codec, CodecError, DecodeError, DuplexOptions, EnvelopeError,
    JsonCodec, JsonLinesCodec, MsgPackCodec, Value,
};

fn values() -> Vec<Value> {
    vec![
        Value::from(1),
        Value::object([("a", Value::set(["x", "y"]))]),
        Value::Null,
        Value::bytes([9, 8, 7]),
    ]
}

#[tokio::test]
async fn encoder_and_decoder_chain_through_channels() {
    let (writer, mut reader) = encoder_duplex(&JsonCodec::new(), DuplexOptions::default()).unwrap();
    let producer = tokio::spawn(async move {
        for v in values() {
            writer.write(v).await.unwrap();
        }
        writer.end();
    });
    let mut chunks = Vec::new();
    while let Some(chunk) = reader.read().await {
        chunks.push(chunk.unwrap());
    }
    producer.await.unwrap();

    let (writer, reader) = decoder_duplex(&JsonCodec::new(), DuplexOptions::default()).unwrap();
    let producer = tokio::spawn(async move {
        for chunk in chunks {
            for byte in chunk {
                writer.write(vec![byte]).await.unwrap();
            }
        }
    });
    let decoded: Vec<Value> = reader.map(Result::unwrap).collect().await;
    producer.await.unwrap();
    assert_eq!(decoded, values());
}

#[tokio::test]
async fn wrapped_mode_frames_values_on_both_sides() {
    let options = DuplexOptions {
        wrap: true,
        ..DuplexOptions::default()
    };
    let (writer, reader) = encoder_duplex(&JsonLinesCodec::new(), options).unwrap();
    for v in values() {
        writer.write(Value::object([("value", v)])).await.unwrap();
    }
    writer.end();
    let lines: Vec<Vec<u8>> = reader.map(Result::unwrap).collect().await;
    assert_eq!(lines.len(), values().len());

    let (writer, reader) = decoder_duplex(&JsonLinesCodec::new(), options).unwrap();
    for line in lines {
        writer.write(line).await.unwrap();
    }
    drop(writer);
    let framed: Vec<Value> = reader.map(Result::unwrap).collect().await;
    let expected: Vec<Value> = values()
        .into_iter()
        .map(|v| Value::object([("value", v)]))
        .collect();
    assert_eq!(framed, expected);
}

#[tokio::test]
async fn wrapped_mode_rejects_bare_values() {
    let options = DuplexOptions {
        wrap: true,
        ..DuplexOptions::default()
    };
    let (writer, mut reader) = encoder_duplex(&JsonCodec::new(), options).unwrap();
    writer.write(Value::from(5)).await.unwrap();
    assert!(matches!(
        reader.read().await,
        Some(Err(CodecError::Decode(DecodeError::Envelope(EnvelopeError::NotWrapped))))
    ));
    assert!(reader.read().await.is_none());
}

#[tokio::test]
async fn writer_waits_for_the_reader() {
    let (writer, mut reader) = decoder_duplex(
        &JsonLinesCodec::new(),
        DuplexOptions {
            capacity: 2,
            ..DuplexOptions::default()
        },
    )
    .unwrap();
    let written = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&written);
    let producer = tokio::spawn(async move {
        for i in 0..10 {
            writer.write(format!("{i}\n").into_bytes()).await.unwrap();
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    assert_eq!(written.load(Ordering::SeqCst), 2);

    let mut seen = Vec::new();
    while let Some(v) = reader.read().await {
        seen.push(v.unwrap());
    }
    producer.await.unwrap();
    assert_eq!(seen, (0..10).map(Value::from).collect::<Vec<_>>());
}

#[tokio::test]
async fn decode_errors_end_the_stream_and_close_the_writer() {
    let (writer, mut reader) = decoder_duplex(&JsonCodec::new(), DuplexOptions::default()).unwrap();
    writer.write(b"[1, ".to_vec()).await.unwrap();
    writer.write(b"}".to_vec()).await.unwrap();
    assert_eq!(reader.read().await.unwrap().unwrap(), Value::from(1));
    assert!(matches!(reader.read().await, Some(Err(CodecError::Decode(_)))));
    assert!(reader.read().await.is_none());
    assert!(matches!(
        writer.write(b"2]".to_vec()).await,
        Err(CodecError::StreamClosed)
    ));
}

#[tokio::test]
async fn abort_fails_pending_writes() {
    let (writer, mut reader) = decoder_duplex(&JsonCodec::new(), DuplexOptions::default()).unwrap();
    writer.write(b"[1, 2".to_vec()).await.unwrap();
    reader.abort();
    assert!(matches!(
        writer.write(b"]".to_vec()).await,
        Err(CodecError::StreamClosed)
    ));
    assert!(reader.read().await.is_none());
}

#[tokio::test]
async fn msgpack_values_survive_byte_by_byte_delivery() {
    let (writer, reader) = encoder_duplex(&MsgPackCodec::new(), DuplexOptions::default()).unwrap();
    for v in values() {
        writer.write(v).await.unwrap();
    }
    writer.end();
    let chunks: Vec<Vec<u8>> = reader.map(Result::unwrap).collect().await;
    assert_eq!(chunks.len(), values().len());

    let (writer, reader) = decoder_duplex(&MsgPackCodec::new(), DuplexOptions::default()).unwrap();
    let producer = tokio::spawn(async move {
        for byte in chunks.concat() {
            writer.write(vec![byte]).await.unwrap();
        }
    });
    let decoded: Vec<Value> = reader.map(Result::unwrap).collect().await;
    producer.await.unwrap();
    assert_eq!(decoded, values());
}

/// Whole-document codec with no streaming support.
struct Snapshot;

impl Codec for Snapshot {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        JsonCodec::new().encode(value)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        JsonCodec::new().decode(bytes)
    }
}

#[test]
fn codecs_without_streaming_report_it() {
    assert!(matches!(
        encoder_duplex(&Snapshot, DuplexOptions::default()),
        Err(CodecError::UnsupportedOperation { codec: "snapshot", operation: "encoder" })
    ));
    assert!(matches!(
        decoder_duplex(&Snapshot, DuplexOptions::default()),
        Err(CodecError::UnsupportedOperation { codec: "snapshot", operation: "decoder" })
    ));
}
