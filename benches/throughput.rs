//! Throughput benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use nmeamon_core::core::buffer::FrameBuffer;
use nmeamon_core::core::dispatch::DispatchChain;
use nmeamon_core::core::protocol::{checksum, LineSplitter};
use nmeamon_core::core::telemetry::TelemetryState;
use std::collections::HashMap;

fn sample_stream() -> Vec<u8> {
    let sentences = [
        checksum::append("$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,"),
        checksum::append("$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W"),
        checksum::append("$HEHDT,271.5,T"),
        "$PDKEY,5".to_string(),
    ];
    let mut data = Vec::new();
    for _ in 0..16 {
        for s in &sentences {
            data.extend_from_slice(s.as_bytes());
            data.extend_from_slice(b"\r\n");
        }
    }
    data
}

fn buffer_benchmark(c: &mut Criterion) {
    let data: Vec<u8> = (0..4096).map(|i| (i % 256) as u8).collect();

    let mut group = c.benchmark_group("buffer");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("write_drain_64", |b| {
        let mut buffer = FrameBuffer::new(1024);
        let mut chunk = [0u8; 64];
        b.iter(|| {
            for piece in black_box(&data).chunks(256) {
                buffer.write(piece);
                while buffer.read_into(&mut chunk) > 0 {}
            }
        })
    });

    group.bench_function("overflow", |b| {
        let mut buffer = FrameBuffer::new(1024);
        b.iter(|| black_box(buffer.write(black_box(&data))))
    });

    group.finish();
}

fn ingest_benchmark(c: &mut Criterion) {
    let data = sample_stream();
    let names = vec!["nmea-key".to_string(), "nmea".to_string()];

    let mut group = c.benchmark_group("ingest");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("split_and_dispatch", |b| {
        let mut chain = DispatchChain::from_catalog(&names, &HashMap::new()).unwrap();
        let mut splitter = LineSplitter::default();
        let mut state = TelemetryState::default();
        b.iter(|| {
            splitter.push(black_box(&data), |line| {
                chain.parse_line(line, &mut state);
            });
        })
    });

    group.bench_function("checksum_verify", |b| {
        let line = checksum::append("$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W");
        b.iter(|| black_box(checksum::verify(black_box(&line))))
    });

    group.finish();
}

criterion_group!(benches, buffer_benchmark, ingest_benchmark);
criterion_main!(benches);
