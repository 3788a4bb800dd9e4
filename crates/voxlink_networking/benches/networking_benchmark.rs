//! Benchmark for packet pooling, framing and chunk packet encoding.
//!
//! Run with: cargo bench --package voxlink_networking --bench networking_benchmark

// criterion_group! generates undocumented public items.
#![allow(missing_docs)]

use std::sync::Arc;

use criterion::measurement::WallTime;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkGroup, Criterion};
use voxlink_core::{ArrayPool, RawIdRemap, WireWriter};
use voxlink_networking::protocol::{
    ChunkData, Clientbound, CompressedChunkData, DecodeContext, PlayerMove, Serverbound,
};
use voxlink_networking::{ConnectionBase, ConnectionId, LocalTransport, Packet, PacketCatalog, PacketPool};
use voxlink_world::{ChunkGenerator, ChunkPos, FlatGenerator};

fn benchmark_pool(c: &mut Criterion) {
    let pool = PacketPool::shared();
    c.bench_function("pool_get_return", |b| {
        b.iter(|| {
            let mut packet = pool.get::<PlayerMove>();
            packet.position = black_box([1.0, 2.0, 3.0]);
        });
    });
}

fn benchmark_round_trip(c: &mut Criterion) {
    let (client, server) = LocalTransport::pair();
    let packets = PacketPool::shared();
    let mut client = ConnectionBase::<Serverbound, Clientbound>::open(
        ConnectionId(0),
        Box::new(client),
        PacketCatalog::serverbound().build(),
        PacketCatalog::clientbound().build(),
        Arc::clone(&packets),
    )
    .unwrap();
    let mut server = ConnectionBase::<Clientbound, Serverbound>::open(
        ConnectionId(1),
        Box::new(server),
        PacketCatalog::clientbound().build(),
        PacketCatalog::serverbound().build(),
        packets,
    )
    .unwrap();

    let blocks = RawIdRemap::identity("blocks", 4);
    let entities = RawIdRemap::identity("entities", 1);
    let arrays = ArrayPool::shared();
    let ctx = DecodeContext {
        blocks: &blocks,
        entities: &entities,
        arrays: &arrays,
    };
    let movement = PlayerMove {
        position: [1.0, 2.0, 3.0],
    };

    c.bench_function("player_move_send_receive", |b| {
        b.iter(|| {
            client.send(&movement).unwrap();
            let packet = server.receive(&ctx).unwrap();
            black_box(packet.is_some())
        });
    });
}

fn benchmark_chunk_packet(c: &mut Criterion) {
    let pool = ArrayPool::shared();
    let storage = FlatGenerator::new(1, 2, 3).generate(ChunkPos::default(), &pool);
    let mut group = c.benchmark_group("chunk_data_write");

    let raw = storage.generate_copy();
    let compact = storage.compact();

    let simple = ChunkData { pos: ChunkPos::default(), storage: raw };
    let paletted = ChunkData { pos: ChunkPos::default(), storage: compact.clone() };
    let lz4 = CompressedChunkData { pos: ChunkPos::default(), storage: compact };
    bench_write(&mut group, "simple_raw", &simple);
    bench_write(&mut group, "paletted_raw", &paletted);
    bench_write(&mut group, "paletted_lz4", &lz4);
    group.finish();
}

fn bench_write<P: Packet>(group: &mut BenchmarkGroup<'_, WallTime>, name: &str, packet: &P) {
    group.bench_function(name, |b| {
        let mut writer = WireWriter::new();
        b.iter(|| {
            writer.reset();
            packet.write(&mut writer).unwrap();
            black_box(writer.current_bytes().len())
        });
    });
}

criterion_group!(benches, benchmark_pool, benchmark_round_trip, benchmark_chunk_packet);
criterion_main!(benches);
