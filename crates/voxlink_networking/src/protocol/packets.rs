//! # Packet Definitions
//!
//! Every packet the session protocol speaks.
//!
//! ## Handshake
//!
//! ```text
//! CLIENT                                   SERVER
//!   |--- packet map (first frame) ----------->|
//!   |<----------- packet map (first frame) ---|
//!   |--- ClientHello {version, name} -------->|  assigns player id
//!   |<------------------------- RegistrySync -|
//!   |<---------------- HandshakeDone {id} ----|
//!   |  builds remaps, enters Gameplay         |
//!   |--- ClientHandshakeDone ---------------->|  registers player,
//!   |                                         |  enters Gameplay
//!   |<------- ChunkData / CompressedChunkData -|
//! ```
//!
//! ## Raw IDs
//!
//! Block and entity raw IDs are always written in the **server's** raw ID
//! space. Clients translate on receive and translate back before sending.

use uuid::Uuid;
use voxlink_core::{CompressedReader, CompressedWriter, ContentDatabase, ContentRemap, CoreResult, RawId, WireReader, WireWriter};
use voxlink_world::{ChunkPos, ChunkStorage};

use crate::error::NetResult;
use crate::protocol::{Clientbound, DecodeContext, Packet, Serverbound};

// ============================================================================
// CLIENT -> SERVER
// ============================================================================

/// Opens the handshake.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientHello {
    /// The client's protocol version.
    pub protocol_version: u32,
    /// Requested display name. Must not be empty.
    pub player_name: String,
}

impl Packet for ClientHello {
    const NAME: &'static str = "voxlink:client_hello";
    type Direction = Serverbound;

    fn write(&self, writer: &mut WireWriter) -> NetResult<()> {
        writer.write_u32(self.protocol_version);
        writer.write_string(&self.player_name)?;
        Ok(())
    }

    fn read(&mut self, reader: &mut WireReader, _: &DecodeContext<'_>) -> NetResult<()> {
        self.protocol_version = reader.read_u32()?;
        self.player_name = reader.read_string()?;
        Ok(())
    }
}

/// The client has applied the registry sync and entered gameplay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClientHandshakeDone;

impl Packet for ClientHandshakeDone {
    const NAME: &'static str = "voxlink:client_handshake_done";
    type Direction = Serverbound;

    fn write(&self, _: &mut WireWriter) -> NetResult<()> {
        Ok(())
    }

    fn read(&mut self, _: &mut WireReader, _: &DecodeContext<'_>) -> NetResult<()> {
        Ok(())
    }
}

/// The client's player moved.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlayerMove {
    /// New position in world units.
    pub position: [f32; 3],
}

impl Packet for PlayerMove {
    const NAME: &'static str = "voxlink:player_move";
    type Direction = Serverbound;

    fn write(&self, writer: &mut WireWriter) -> NetResult<()> {
        writer.write_vec3(self.position);
        Ok(())
    }

    fn read(&mut self, reader: &mut WireReader, _: &DecodeContext<'_>) -> NetResult<()> {
        self.position = reader.read_vec3()?;
        Ok(())
    }
}

/// Request to set one block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaceBlock {
    /// World block position.
    pub block: [i32; 3],
    /// Block to place, as a server raw ID.
    pub raw: RawId,
}

impl Packet for PlaceBlock {
    const NAME: &'static str = "voxlink:place_block";
    type Direction = Serverbound;

    fn write(&self, writer: &mut WireWriter) -> NetResult<()> {
        writer.write_ivec3(self.block);
        writer.write_u32(self.raw);
        Ok(())
    }

    fn read(&mut self, reader: &mut WireReader, ctx: &DecodeContext<'_>) -> NetResult<()> {
        self.block = reader.read_ivec3()?;
        self.raw = ctx.blocks.translate(reader.read_u32()?)?;
        Ok(())
    }
}

/// The client is leaving.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientDisconnect {
    /// Human-readable reason.
    pub reason: String,
}

impl Packet for ClientDisconnect {
    const NAME: &'static str = "voxlink:client_disconnect";
    type Direction = Serverbound;

    fn write(&self, writer: &mut WireWriter) -> NetResult<()> {
        writer.write_string(&self.reason)?;
        Ok(())
    }

    fn read(&mut self, reader: &mut WireReader, _: &DecodeContext<'_>) -> NetResult<()> {
        self.reason = reader.read_string()?;
        Ok(())
    }
}

// ============================================================================
// SERVER -> CLIENT
// ============================================================================

/// The server's registry tables, as a registry sync frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistrySync {
    /// Encoded registry sync frame.
    pub payload: Vec<u8>,
}

impl RegistrySync {
    /// Encodes `content`'s registries into the payload.
    ///
    /// # Errors
    ///
    /// [`CoreError::RegistryNotFrozen`](voxlink_core::CoreError::RegistryNotFrozen)
    /// before `content` is finished.
    pub fn fill(&mut self, content: &ContentDatabase) -> CoreResult<()> {
        let mut writer = WireWriter::new();
        content.write_sync(&mut writer)?;
        self.payload.clear();
        self.payload.extend_from_slice(writer.current_bytes());
        Ok(())
    }

    /// Builds remaps from the payload against local `content`.
    ///
    /// # Errors
    ///
    /// Codec errors on a corrupt payload, or an unknown registry name.
    pub fn apply(&self, content: &ContentDatabase) -> CoreResult<ContentRemap> {
        let mut reader = WireReader::new();
        reader.load_data(&self.payload);
        content.read_sync(&mut reader)
    }
}

impl Packet for RegistrySync {
    const NAME: &'static str = "voxlink:registry_sync";
    type Direction = Clientbound;

    fn write(&self, writer: &mut WireWriter) -> NetResult<()> {
        writer.write_bytes(&self.payload)?;
        Ok(())
    }

    fn read(&mut self, reader: &mut WireReader, _: &DecodeContext<'_>) -> NetResult<()> {
        let bytes = reader.read_bytes()?;
        self.payload.clear();
        self.payload.extend_from_slice(bytes);
        Ok(())
    }
}

/// The server accepted the client and assigned its player identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HandshakeDone {
    /// The client's player ID.
    pub player_id: Uuid,
}

impl Packet for HandshakeDone {
    const NAME: &'static str = "voxlink:handshake_done";
    type Direction = Clientbound;

    fn write(&self, writer: &mut WireWriter) -> NetResult<()> {
        writer.write_guid(&self.player_id);
        Ok(())
    }

    fn read(&mut self, reader: &mut WireReader, _: &DecodeContext<'_>) -> NetResult<()> {
        self.player_id = reader.read_guid()?;
        Ok(())
    }
}

/// Full contents of one chunk.
///
/// Wire: `[pos: 3 x i32] [storage type: i32] [payload]`, the chunk storage
/// frame exactly as [`ChunkStorage::write`] lays it out.
#[derive(Clone, Debug, Default)]
pub struct ChunkData {
    /// Chunk position.
    pub pos: ChunkPos,
    /// Chunk storage (compacted by the sender).
    pub storage: ChunkStorage,
}

impl Packet for ChunkData {
    const NAME: &'static str = "voxlink:chunk_data";
    type Direction = Clientbound;

    fn write(&self, writer: &mut WireWriter) -> NetResult<()> {
        self.pos.write(writer);
        self.storage.write(writer)?;
        Ok(())
    }

    fn read(&mut self, reader: &mut WireReader, ctx: &DecodeContext<'_>) -> NetResult<()> {
        self.pos = ChunkPos::read(reader)?;
        self.storage = ChunkStorage::read(reader, ctx.blocks, ctx.arrays)?;
        Ok(())
    }
}

/// [`ChunkData`] with the storage frame LZ4-compressed.
///
/// Wire: `[pos: 3 x i32] [compressed block of the storage frame]`.
#[derive(Clone, Debug, Default)]
pub struct CompressedChunkData {
    /// Chunk position.
    pub pos: ChunkPos,
    /// Chunk storage (compacted by the sender).
    pub storage: ChunkStorage,
}

impl Packet for CompressedChunkData {
    const NAME: &'static str = "voxlink:chunk_data_lz4";
    type Direction = Clientbound;

    fn write(&self, writer: &mut WireWriter) -> NetResult<()> {
        self.pos.write(writer);
        let mut block = CompressedWriter::new();
        self.storage.write(&mut block)?;
        block.finish_into(writer)?;
        Ok(())
    }

    fn read(&mut self, reader: &mut WireReader, ctx: &DecodeContext<'_>) -> NetResult<()> {
        self.pos = ChunkPos::read(reader)?;
        let mut block = CompressedReader::new();
        block.load_from(reader)?;
        self.storage = ChunkStorage::read(&mut block, ctx.blocks, ctx.arrays)?;
        Ok(())
    }
}

/// The client should drop a chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UnloadChunk {
    /// Chunk position.
    pub pos: ChunkPos,
}

impl Packet for UnloadChunk {
    const NAME: &'static str = "voxlink:unload_chunk";
    type Direction = Clientbound;

    fn write(&self, writer: &mut WireWriter) -> NetResult<()> {
        self.pos.write(writer);
        Ok(())
    }

    fn read(&mut self, reader: &mut WireReader, _: &DecodeContext<'_>) -> NetResult<()> {
        self.pos = ChunkPos::read(reader)?;
        Ok(())
    }
}

/// A new entity is visible.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntitySpawn {
    /// Entity identity.
    pub entity: Uuid,
    /// Entity kind raw ID.
    pub kind: RawId,
    /// Display name. Must not be empty.
    pub name: String,
    /// Position in world units.
    pub position: [f32; 3],
}

impl Packet for EntitySpawn {
    const NAME: &'static str = "voxlink:entity_spawn";
    type Direction = Clientbound;

    fn write(&self, writer: &mut WireWriter) -> NetResult<()> {
        writer.write_guid(&self.entity);
        writer.write_u32(self.kind);
        writer.write_string(&self.name)?;
        writer.write_vec3(self.position);
        Ok(())
    }

    fn read(&mut self, reader: &mut WireReader, ctx: &DecodeContext<'_>) -> NetResult<()> {
        self.entity = reader.read_guid()?;
        self.kind = ctx.entities.translate(reader.read_u32()?)?;
        self.name = reader.read_string()?;
        self.position = reader.read_vec3()?;
        Ok(())
    }
}

/// An entity moved.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EntityUpdate {
    /// Entity identity.
    pub entity: Uuid,
    /// New position.
    pub position: [f32; 3],
}

impl Packet for EntityUpdate {
    const NAME: &'static str = "voxlink:entity_update";
    type Direction = Clientbound;

    fn write(&self, writer: &mut WireWriter) -> NetResult<()> {
        writer.write_guid(&self.entity);
        writer.write_vec3(self.position);
        Ok(())
    }

    fn read(&mut self, reader: &mut WireReader, _: &DecodeContext<'_>) -> NetResult<()> {
        self.entity = reader.read_guid()?;
        self.position = reader.read_vec3()?;
        Ok(())
    }
}

/// An entity is gone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntityRemove {
    /// Entity identity.
    pub entity: Uuid,
}

impl Packet for EntityRemove {
    const NAME: &'static str = "voxlink:entity_remove";
    type Direction = Clientbound;

    fn write(&self, writer: &mut WireWriter) -> NetResult<()> {
        writer.write_guid(&self.entity);
        Ok(())
    }

    fn read(&mut self, reader: &mut WireReader, _: &DecodeContext<'_>) -> NetResult<()> {
        self.entity = reader.read_guid()?;
        Ok(())
    }
}

/// The server is dropping the client.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerDisconnect {
    /// Human-readable reason.
    pub reason: String,
}

impl Packet for ServerDisconnect {
    const NAME: &'static str = "voxlink:server_disconnect";
    type Direction = Clientbound;

    fn write(&self, writer: &mut WireWriter) -> NetResult<()> {
        writer.write_string(&self.reason)?;
        Ok(())
    }

    fn read(&mut self, reader: &mut WireReader, _: &DecodeContext<'_>) -> NetResult<()> {
        self.reason = reader.read_string()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use voxlink_core::{ArrayPool, RawIdRemap};

    fn roundtrip<T: Packet>(packet: &T, remap: &RawIdRemap) -> T {
        let mut writer = WireWriter::new();
        packet.write(&mut writer).unwrap();
        let mut reader = WireReader::new();
        reader.load_data(writer.current_bytes());
        let arrays: Arc<ArrayPool> = ArrayPool::shared();
        let ctx = DecodeContext {
            blocks: remap,
            entities: remap,
            arrays: &arrays,
        };
        let mut decoded = T::default();
        decoded.read(&mut reader, &ctx).unwrap();
        assert_eq!(reader.remaining(), 0, "{} left bytes unread", T::NAME);
        decoded
    }

    #[test]
    fn test_chunk_data_compressed_and_plain() {
        let remap = RawIdRemap::identity("blocks", 4);
        let arrays = ArrayPool::shared();
        let mut storage = ChunkStorage::Single(1);
        storage.set_block(10, 2, &arrays);
        let pos = ChunkPos::new(1, -2, 3);

        let plain = roundtrip(&ChunkData { pos, storage: storage.clone() }, &remap);
        let packed = roundtrip(&CompressedChunkData { pos, storage }, &remap);
        for decoded in [plain.storage, packed.storage] {
            assert_eq!(decoded.get_block(10), 2);
            assert_eq!(decoded.get_block(11), 1);
        }
        assert_eq!(plain.pos, pos);
        assert_eq!(packed.pos, pos);
    }

    #[test]
    fn test_chunk_data_is_position_then_storage_frame() {
        let packet = ChunkData {
            pos: ChunkPos::new(1, -2, 3),
            storage: ChunkStorage::Single(1),
        };
        let mut writer = WireWriter::new();
        packet.write(&mut writer).unwrap();

        let mut expected = Vec::new();
        for value in [1i32, -2, 3, 0] {
            expected.extend_from_slice(&value.to_le_bytes());
        }
        expected.extend_from_slice(&1u32.to_le_bytes());
        assert_eq!(writer.current_bytes(), expected.as_slice());

        // The storage frame is the same bytes a chunk writes on its own.
        let mut frame = WireWriter::new();
        packet.storage.write(&mut frame).unwrap();
        assert_eq!(&writer.current_bytes()[12..], frame.current_bytes());
    }

    #[test]
    fn test_chunk_data_reset_releases_array() {
        let arrays = ArrayPool::shared();
        let mut storage = ChunkStorage::Single(0);
        storage.set_block(0, 1, &arrays);
        let mut packet = ChunkData {
            storage,
            ..ChunkData::default()
        };
        packet.on_return_to_pool();
        assert!(matches!(packet.storage, ChunkStorage::Void));
        assert_eq!(arrays.cached(voxlink_world::CHUNK_VOLUME), 1);
    }

    #[test]
    fn test_spawn_translates_kind() {
        let mut remote_to_local = RawIdRemap::identity("entities", 1);
        let spawn = EntitySpawn {
            entity: Uuid::new_v4(),
            kind: 0,
            name: "steve".into(),
            position: [0.5, 16.0, 0.5],
        };
        assert_eq!(roundtrip(&spawn, &remote_to_local), spawn);

        remote_to_local = RawIdRemap::identity("entities", 0);
        let mut writer = WireWriter::new();
        spawn.write(&mut writer).unwrap();
        let mut reader = WireReader::new();
        reader.load_data(writer.current_bytes());
        let arrays = ArrayPool::shared();
        let ctx = DecodeContext {
            blocks: &remote_to_local,
            entities: &remote_to_local,
            arrays: &arrays,
        };
        assert!(EntitySpawn::default().read(&mut reader, &ctx).is_err());
    }

    #[test]
    fn test_empty_hello_name_rejected() {
        let hello = ClientHello {
            protocol_version: 1,
            player_name: String::new(),
        };
        assert!(hello.write(&mut WireWriter::new()).is_err());
    }

    #[test]
    fn test_registry_sync_applies() {
        let content = ContentDatabase::with_core().unwrap();
        let mut sync = RegistrySync::default();
        sync.fill(&content).unwrap();
        let decoded = roundtrip(&sync, &RawIdRemap::identity("blocks", 0));
        let remap = decoded.apply(&content).unwrap();
        assert_eq!(remap.blocks.translate(3).unwrap(), 3);
    }
}
