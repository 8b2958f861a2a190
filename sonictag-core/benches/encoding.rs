use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sonictag_core::config::SonicTagConfig;
use sonictag_core::transceiver::Transmitter;

fn benchmark_encode_short_payload(c: &mut Criterion) {
    let tx = Transmitter::new(SonicTagConfig::default()).unwrap();
    let payload = b"benchmark payload";

    c.bench_function("encode_17_byte_payload", |b| {
        b.iter(|| tx.encode(black_box(payload)).unwrap())
    });
}

fn benchmark_encode_by_payload_size(c: &mut Criterion) {
    let cfg = SonicTagConfig::default();
    let tx = Transmitter::new(cfg.clone()).unwrap();
    let mut group = c.benchmark_group("encode_by_payload_size");

    for size in [1usize, 16, 64, 128, cfg.max_payload_len()] {
        let payload = vec![0xA5u8; size];
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| tx.encode(black_box(payload)).unwrap())
        });
    }
    group.finish();
}

fn benchmark_chirp_generation(c: &mut Criterion) {
    c.bench_function("transmitter_construction", |b| {
        b.iter(|| Transmitter::new(black_box(SonicTagConfig::default())).unwrap())
    });
}

criterion_group!(
    benches,
    benchmark_encode_short_payload,
    benchmark_encode_by_payload_size,
    benchmark_chirp_generation
);
criterion_main!(benches);
