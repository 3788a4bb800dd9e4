//! Chunk storage sent between two processes whose registries disagree.

use voxlink_core::{
    ArrayPool, Block, ContentDatabase, ContentPack, CoreResult, ResourceKey, WireReader, WireWriter,
};
use voxlink_world::{ChunkStorage, LocalPos, StorageKind, World, WorldError, CHUNK_VOLUME};

/// Registers the core blocks in reverse order plus one extra block.
struct ShuffledPack;

impl ContentPack for ShuffledPack {
    fn name(&self) -> &str {
        "shuffled"
    }

    fn load(&self, content: &mut ContentDatabase) -> CoreResult<()> {
        content.register_block(Block::passable(ResourceKey::core("air")))?;
        for name in ["glass", "grass", "dirt", "stone"] {
            content.register_block(Block::solid(ResourceKey::core(name)))?;
        }
        Ok(())
    }
}

fn synced_client() -> (ContentDatabase, ContentDatabase, voxlink_core::ContentRemap) {
    let server = ContentDatabase::with_core().unwrap();
    let mut client = ContentDatabase::new();
    client.load_pack(&ShuffledPack).unwrap();
    client.finish().unwrap();

    let mut writer = WireWriter::new();
    server.write_sync(&mut writer).unwrap();
    let mut reader = WireReader::new();
    reader.load_data(writer.current_bytes());
    let remap = client.read_sync(&mut reader).unwrap();
    (server, client, remap)
}

fn key_of(content: &ContentDatabase, raw: u32) -> &str {
    content.blocks().raw_to_key(raw).unwrap().name()
}

#[test]
fn test_storage_translates_through_remap() {
    let (server, client, remap) = synced_client();
    let pool = ArrayPool::shared();
    let stone = server.blocks().key_to_raw(&ResourceKey::core("stone")).unwrap();
    let dirt = server.blocks().key_to_raw(&ResourceKey::core("dirt")).unwrap();

    let mut storage = ChunkStorage::Single(stone);
    storage.set_block(LocalPos::new(1, 2, 3).index(), dirt, &pool);

    for encoded in [storage.clone(), storage.compact()] {
        let mut writer = WireWriter::new();
        encoded.write(&mut writer).unwrap();
        let mut reader = WireReader::new();
        reader.load_data(writer.current_bytes());
        let decoded = ChunkStorage::read(&mut reader, &remap.blocks, &pool).unwrap();

        for local in LocalPos::all() {
            let expected = if local == LocalPos::new(1, 2, 3) { "dirt" } else { "stone" };
            assert_eq!(key_of(&client, decoded.get_block(local.index())), expected);
        }
    }
}

#[test]
fn test_unknown_server_block_fails_decode() {
    let (_, client, _) = synced_client();
    let pool = ArrayPool::shared();

    // Client knows a block the server never sent; the reverse direction has
    // one unresolved key.
    let mut writer = WireWriter::new();
    client.write_sync(&mut writer).unwrap();
    let mut reader = WireReader::new();
    reader.load_data(writer.current_bytes());
    let server = ContentDatabase::with_core().unwrap();
    let remap = server.read_sync(&mut reader).unwrap();
    assert_eq!(remap.blocks.unresolved(), 1);

    let glass = client.blocks().key_to_raw(&ResourceKey::core("glass")).unwrap();
    let mut writer = WireWriter::new();
    ChunkStorage::Single(glass).write(&mut writer).unwrap();
    let mut reader = WireReader::new();
    reader.load_data(writer.current_bytes());
    assert_eq!(
        ChunkStorage::read(&mut reader, &remap.blocks, &pool).unwrap_err(),
        WorldError::InvalidRawId(glass)
    );
}

#[test]
fn test_truncated_simple_payload() {
    let pool = ArrayPool::shared();
    let mut storage = ChunkStorage::Void;
    storage.set_block(0, 1, &pool);
    let mut writer = WireWriter::new();
    storage.write(&mut writer).unwrap();
    let bytes = &writer.current_bytes()[..writer.len() - 4];

    let mut reader = WireReader::new();
    reader.load_data(bytes);
    let remap = voxlink_core::RawIdRemap::identity("blocks", 4);
    assert!(matches!(
        ChunkStorage::read(&mut reader, &remap, &pool),
        Err(WorldError::Codec(_))
    ));
}

#[test]
fn test_world_replaces_storage_from_wire() {
    let pool = ArrayPool::shared();
    let mut world = World::new(pool.clone());
    let pos = voxlink_world::ChunkPos::new(2, 0, -1);
    world.set_block([64, 0, -32], 3);
    assert_eq!(world.chunk(pos).map(|c| c.kind()), Some(StorageKind::Simple));

    world.set_storage(pos, ChunkStorage::Single(1));
    assert_eq!(world.get_block([64, 0, -32]), 1);
    assert_eq!(world.get_block([95, 31, -1]), 1);
    // The replaced dense array went back to the pool.
    assert_eq!(pool.cached(CHUNK_VOLUME), 1);
}
