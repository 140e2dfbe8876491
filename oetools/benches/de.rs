#[allow(unused_imports)]
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use oetools::{de, ser, SpikeEvent, TtlEvent, SPIKE, TTL};

fn decode_ttl(c: &mut Criterion) {
    let mut b: Vec<u8> = Vec::new();
    ser::ttl(&mut b, &TtlEvent { node_id: 1, state: true, channel: 3 }).unwrap();
    c.bench_function("decode_ttl", |bench| {
        bench.iter(|| de::event(black_box(TTL), black_box(&b)))
    });
}

fn decode_spike(c: &mut Criterion) {
    // 4 channels of 40 i16-sized samples behind the header
    let waveform = vec![0u8; 4 * 40 * 2];
    let mut b: Vec<u8> = Vec::new();
    ser::spike(&mut b, &SpikeEvent { sorted_id: 2, ..Default::default() }, &waveform).unwrap();
    c.bench_function("decode_spike", |bench| {
        bench.iter(|| de::event(black_box(SPIKE), black_box(&b)))
    });
}

criterion_group!(benches, decode_ttl, decode_spike);
criterion_main!(benches);
