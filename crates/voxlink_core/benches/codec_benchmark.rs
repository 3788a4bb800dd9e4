//! Benchmark for the wire codec.
//!
//! Run with: cargo bench --package voxlink_core --bench codec_benchmark

// criterion_group! generates undocumented public items.
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use voxlink_core::{CompressedReader, CompressedWriter, WireReader, WireWriter};

const DENSE_CHUNK: usize = 32 * 32 * 32;

fn benchmark_dense_array(c: &mut Criterion) {
    let values: Vec<u32> = (0..DENSE_CHUNK as u32).map(|i| i % 7).collect();
    let mut group = c.benchmark_group("dense_array");
    group.throughput(Throughput::Bytes((DENSE_CHUNK * 4) as u64));

    group.bench_function("write", |b| {
        let mut writer = WireWriter::new();
        b.iter(|| {
            writer.reset();
            writer.write_u32_slice(black_box(&values));
            black_box(writer.len())
        });
    });

    let mut writer = WireWriter::new();
    writer.write_u32_slice(&values);
    group.bench_function("read", |b| {
        let mut reader = WireReader::new();
        let mut out = vec![0u32; DENSE_CHUNK];
        b.iter(|| {
            reader.load_data(writer.current_bytes());
            reader.read_u32_into(&mut out).unwrap();
            black_box(out[DENSE_CHUNK - 1])
        });
    });

    group.finish();
}

fn benchmark_compressed(c: &mut Criterion) {
    let values: Vec<u32> = (0..DENSE_CHUNK as u32).map(|i| (i / 1024) % 4).collect();
    let mut group = c.benchmark_group("compressed_array");
    group.throughput(Throughput::Bytes((DENSE_CHUNK * 4) as u64));

    group.bench_function("compress", |b| {
        let mut compressed = CompressedWriter::new();
        let mut out = WireWriter::new();
        b.iter(|| {
            out.reset();
            compressed.write_u32_slice(&values);
            compressed.finish_into(&mut out).unwrap();
            black_box(out.len())
        });
    });

    let mut compressed = CompressedWriter::new();
    let mut out = WireWriter::new();
    compressed.write_u32_slice(&values);
    compressed.finish_into(&mut out).unwrap();
    group.bench_function("decompress", |b| {
        let mut source = WireReader::new();
        let mut reader = CompressedReader::new();
        b.iter(|| {
            source.load_data(out.current_bytes());
            reader.load_from(&mut source).unwrap();
            black_box(reader.remaining())
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_dense_array, benchmark_compressed);
criterion_main!(benches);
