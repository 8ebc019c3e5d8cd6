//! Criterion benchmark untuk Ring Buffer dan Channel
//!
//! Run dengan: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use ringpipe::core::RingBuffer;
use ringpipe::{Endpoint, Identity, Mode, PipeConfig};

fn bench_write_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_buffer");
    let payload = [0x5Au8; 16];
    let mut out = [0u8; 16];

    group.throughput(Throughput::Bytes(payload.len() as u64));

    // Benchmark write (overwrite path setelah buffer penuh)
    group.bench_function("write_overwrite", |b| {
        let mut rb = RingBuffer::with_capacity(4096).unwrap();
        b.iter(|| {
            black_box(rb.write(black_box(&payload)));
        });
    });

    // Benchmark write+read cycle
    group.bench_function("write_read_cycle", |b| {
        let mut rb = RingBuffer::with_capacity(4096).unwrap();
        b.iter(|| {
            rb.write(black_box(&payload));
            rb.read_into(black_box(&mut out)).unwrap();
        });
    });

    // Wraparound di setiap iterasi: kapasitas bukan kelipatan payload
    group.bench_function("write_read_wrapping", |b| {
        let mut rb = RingBuffer::with_capacity(37).unwrap();
        b.iter(|| {
            rb.write(black_box(&payload));
            rb.read_into(black_box(&mut out)).unwrap();
        });
    });

    group.finish();
}

fn bench_channel(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel");

    for chunk in [8usize, 256, 4096].iter() {
        let endpoint = Endpoint::with_config(PipeConfig::with_capacity(64 * 1024).unwrap()).unwrap();
        let writer = endpoint.open(Identity(1), Mode::Write).unwrap();
        let reader = endpoint.open(Identity(1), Mode::Read).unwrap();
        let payload = vec![0u8; *chunk];
        let mut out = vec![0u8; *chunk];

        group.throughput(Throughput::Bytes(*chunk as u64));
        group.bench_function(format!("locked_cycle_{}", chunk), |b| {
            b.iter(|| {
                writer.write(black_box(&payload)).unwrap();
                reader.read_into(black_box(&mut out)).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_write_read, bench_channel);
criterion_main!(benches);
