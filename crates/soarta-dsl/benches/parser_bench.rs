use criterion::{black_box, criterion_group, criterion_main, Criterion};

const COUNTER: &str = include_str!("../../../agents/counter.soar");
const TRAFFIC: &str = include_str!("../../../agents/traffic.soar");

fn bench_parse_counter(c: &mut Criterion) {
    c.bench_function("parse_counter", |b| {
        b.iter(|| soarta_dsl::parse(black_box(COUNTER), "counter.soar").unwrap())
    });
}

fn bench_parse_traffic(c: &mut Criterion) {
    c.bench_function("parse_traffic", |b| {
        b.iter(|| soarta_dsl::parse(black_box(TRAFFIC), "traffic.soar").unwrap())
    });
}

criterion_group!(benches, bench_parse_counter, bench_parse_traffic);
criterion_main!(benches);
