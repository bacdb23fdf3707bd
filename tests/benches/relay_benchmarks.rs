//! # Relay Benchmarks
//!
//! Hot paths of the relay and endpoint:
//!
//! | Path | What is measured |
//! |------|------------------|
//! | envelope | parse and encode of a typical request |
//! | forward | follower request stamped and queued for the maestro |
//! | broadcast | maestro notification fanned out to N peers |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ens_02_peer_registry::{MaestroLossPolicy, PeerRegistry};
use serde_json::json;
use shared_bus::InMemoryEventBus;
use shared_types::{RequestId, RpcEnvelope};
use std::sync::Arc;
use tokio::sync::mpsc;

// ============================================================================
// FIXTURES
// ============================================================================

fn registry_with_peers(count: usize) -> (PeerRegistry, Vec<mpsc::UnboundedReceiver<String>>) {
    let registry = PeerRegistry::new(
        MaestroLossPolicy::Reject,
        Arc::new(InMemoryEventBus::new()),
    );
    let mut inboxes = Vec::with_capacity(count);
    for index in 0..count {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = format!("peer-{}", index);
        registry.register(Some(&id), index == 0, tx);
        inboxes.push(rx);
    }
    for inbox in &mut inboxes {
        while inbox.try_recv().is_ok() {}
    }
    (registry, inboxes)
}

fn drain(inboxes: &mut [mpsc::UnboundedReceiver<String>]) -> usize {
    let mut drained = 0;
    for inbox in inboxes {
        while inbox.try_recv().is_ok() {
            drained += 1;
        }
    }
    drained
}

fn sample_request() -> String {
    RpcEnvelope::request(
        "engine|module|scoreboard|action|add_points",
        json!({ "points": 3 }),
        RequestId::Number(1),
    )
    .to_text()
    .unwrap_or_default()
}

// ============================================================================
// BENCHMARKS
// ============================================================================

fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope");
    let text = sample_request();

    group.bench_function("parse_request", |b| {
        b.iter(|| black_box(RpcEnvelope::parse(black_box(&text)).is_ok()))
    });

    let envelope = RpcEnvelope::parse(&text).ok();
    group.bench_function("encode_request", |b| {
        b.iter(|| black_box(envelope.as_ref().map(|e| e.to_text().is_ok())))
    });

    group.finish();
}

fn bench_forward_to_maestro(c: &mut Criterion) {
    let (registry, mut inboxes) = registry_with_peers(2);
    let follower = shared_types::PeerId::new("peer-1");
    let text = sample_request();

    c.bench_function("forward_to_maestro", |b| {
        b.iter(|| {
            black_box(registry.relay(&follower, &text));
            drain(&mut inboxes)
        })
    });
}

fn bench_broadcast(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast");
    let notification = RpcEnvelope::notification(
        "shared_state.set",
        json!({ "key": "engine|module|scoreboard|state.shared|score", "data": 42 }),
    )
    .to_text()
    .unwrap_or_default();

    for peers in [2, 8, 32, 128] {
        let (registry, mut inboxes) = registry_with_peers(peers);
        let maestro = shared_types::PeerId::new("peer-0");

        group.throughput(Throughput::Elements(peers as u64 - 1));
        group.bench_with_input(BenchmarkId::new("fan_out", peers), &notification, |b, text| {
            b.iter(|| {
                black_box(registry.relay(&maestro, text));
                drain(&mut inboxes)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_envelope, bench_forward_to_maestro, bench_broadcast);
criterion_main!(benches);
