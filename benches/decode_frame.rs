/// Benchmarks for inbound frame decoding.
///
/// Every frame the socket delivers passes through `frame::decode`, so this is
/// the hot path of the read loop: heartbeat replies, chat payloads, and the
/// malformed frames that get dropped.
use chat_ws_client::ws::frame::{InboundFrame, decode};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame/decode");

    let pong = r#"{"type":"pong","timestamp":1704110400000}"#;
    group.throughput(Throughput::Bytes(pong.len() as u64));
    group.bench_function("heartbeat_reply", |b| {
        b.iter(|| {
            let frame = decode(std::hint::black_box(pong)).expect("decode should succeed");
            assert!(matches!(frame, InboundFrame::HeartbeatReply));
        });
    });

    let chat = r#"{"message":{"from":"alice","message":"hey, are you coming tonight?"}}"#;
    group.throughput(Throughput::Bytes(chat.len() as u64));
    group.bench_function("chat_message", |b| {
        b.iter(|| {
            let frame = decode(std::hint::black_box(chat)).expect("decode should succeed");
            assert!(matches!(frame, InboundFrame::Application(_)));
        });
    });

    let large = serde_json::json!({
        "message": {
            "from": "bob",
            "message": "lorem ipsum dolor sit amet ".repeat(64),
        },
        "meta": {
            "client": "web",
            "tags": ["inbox", "direct", "urgent"],
        }
    })
    .to_string();
    group.throughput(Throughput::Bytes(large.len() as u64));
    group.bench_function("large_payload", |b| {
        b.iter(|| {
            let frame = decode(std::hint::black_box(&large)).expect("decode should succeed");
            assert!(matches!(frame, InboundFrame::Application(_)));
        });
    });

    let malformed = r#"{"message":{"from":"alice","#;
    group.throughput(Throughput::Bytes(malformed.len() as u64));
    group.bench_function("malformed", |b| {
        b.iter(|| {
            let _ = decode(std::hint::black_box(malformed));
        });
    });

    group.finish();
}

criterion_group!(frame_benches, bench_decode);
criterion_main!(frame_benches);
