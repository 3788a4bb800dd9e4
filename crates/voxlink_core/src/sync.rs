//! # Registry Sync
//!
//! Transmits the server's key -> raw tables so a client can translate the
//! server's raw IDs into its own.
//!
//! ## Frame
//!
//! ```text
//! [registryCount: i32]
//!   ( [registryName: string] [entryCount: i32] ( [key: string] [raw: u32] )* )*
//! ```
//!
//! Client and server may load packs in different orders, so the same key can
//! carry different raw IDs on each side. Nothing here assumes otherwise.

use std::collections::HashMap;

use crate::codec::{WireReader, WireWriter};
use crate::content::{ContentDatabase, BLOCKS_REGISTRY, ENTITIES_REGISTRY};
use crate::error::{CodecError, CoreError, CoreResult};
use crate::key::ResourceKey;
use crate::registry::{RawId, Registry};

/// Translates a remote peer's raw IDs into local raw IDs for one registry.
#[derive(Clone, Debug)]
pub struct RawIdRemap {
    registry: String,
    table: Vec<Option<RawId>>,
    unresolved: usize,
}

impl RawIdRemap {
    /// A remap for a peer that shares this process's registry.
    #[must_use]
    pub fn identity(registry: impl Into<String>, len: usize) -> Self {
        Self {
            registry: registry.into(),
            table: (0..len).map(|raw| Some(raw as RawId)).collect(),
            unresolved: 0,
        }
    }

    /// Identity remap sized to a local registry.
    #[must_use]
    pub fn identity_for<T: Clone + Eq + std::hash::Hash>(registry: &Registry<T>) -> Self {
        Self::identity(registry.name(), registry.len())
    }

    /// Builds a remap from the remote `(key, remote raw)` pairs.
    ///
    /// Keys missing locally map to nothing; using such an ID later fails
    /// that one decode.
    pub fn build<T: Clone + Eq + std::hash::Hash>(
        local: &Registry<T>,
        remote: &[(ResourceKey, RawId)],
    ) -> Self {
        let len = remote.iter().map(|(_, raw)| *raw as usize + 1).max().unwrap_or(0);
        let mut table = vec![None; len];
        let mut unresolved = 0;
        for (key, remote_raw) in remote {
            match local.key_to_raw(key) {
                Some(local_raw) => table[*remote_raw as usize] = Some(local_raw),
                None => {
                    unresolved += 1;
                    tracing::warn!(registry = local.name(), %key, "remote key unknown locally");
                }
            }
        }
        Self {
            registry: local.name().to_owned(),
            table,
            unresolved,
        }
    }

    /// Translates a remote raw ID.
    ///
    /// # Errors
    ///
    /// [`CoreError::UnknownRawId`] if the remote ID has no local counterpart.
    pub fn translate(&self, remote: RawId) -> CoreResult<RawId> {
        self.table
            .get(remote as usize)
            .copied()
            .flatten()
            .ok_or_else(|| CoreError::UnknownRawId {
                registry: self.registry.clone(),
                raw: remote,
            })
    }

    /// The remote raw ID that translates to `local`, for sending back.
    #[must_use]
    pub fn to_remote(&self, local: RawId) -> Option<RawId> {
        self.table
            .iter()
            .position(|entry| *entry == Some(local))
            .map(|remote| remote as RawId)
    }

    /// Number of remote keys with no local counterpart.
    #[must_use]
    pub const fn unresolved(&self) -> usize {
        self.unresolved
    }

    /// Name of the registry this remap belongs to.
    #[must_use]
    pub fn registry(&self) -> &str {
        &self.registry
    }
}

/// Remaps for every synced registry.
#[derive(Clone, Debug)]
pub struct ContentRemap {
    /// Block raw IDs.
    pub blocks: RawIdRemap,
    /// Entity kind raw IDs.
    pub entities: RawIdRemap,
}

impl ContentRemap {
    /// Identity remaps for a peer sharing `content`.
    #[must_use]
    pub fn identity(content: &ContentDatabase) -> Self {
        Self {
            blocks: RawIdRemap::identity_for(content.blocks()),
            entities: RawIdRemap::identity_for(content.entities()),
        }
    }
}

fn write_registry<T: Clone + Eq + std::hash::Hash>(
    registry: &Registry<T>,
    writer: &mut WireWriter,
) -> CoreResult<()> {
    if !registry.is_frozen() {
        return Err(CoreError::RegistryNotFrozen(registry.name().to_owned()));
    }
    writer.write_string(registry.name())?;
    writer.write_i32(len_i32(registry.len())?);
    for (raw, key, _) in registry.iter() {
        key.write(writer)?;
        writer.write_u32(raw);
    }
    Ok(())
}

fn len_i32(len: usize) -> CoreResult<i32> {
    i32::try_from(len).map_err(|_| CodecError::LengthOutOfRange(len as i64).into())
}

fn read_count(reader: &mut WireReader) -> CoreResult<usize> {
    let count = reader.read_i32()?;
    usize::try_from(count).map_err(|_| CodecError::LengthOutOfRange(i64::from(count)).into())
}

impl ContentDatabase {
    /// Writes the registry sync frame for every registry.
    ///
    /// # Errors
    ///
    /// Fails if the database is not finished or a table does not fit the wire's length prefix.
    pub fn write_sync(&self, writer: &mut WireWriter) -> CoreResult<()> {
        writer.write_i32(2);
        write_registry(self.blocks(), writer)?;
        write_registry(self.entities(), writer)?;
        Ok(())
    }

    /// Reads a registry sync frame and builds remaps against local content.
    ///
    /// # Errors
    ///
    /// Fails on malformed data or an unknown registry name. Registries this
    /// side knows but the frame omits get empty remaps.
    pub fn read_sync(&self, reader: &mut WireReader) -> CoreResult<ContentRemap> {
        let registry_count = read_count(reader)?;
        let mut remote: HashMap<String, Vec<(ResourceKey, RawId)>> = HashMap::new();

        for _ in 0..registry_count {
            let name = reader.read_string()?;
            let entry_count = read_count(reader)?;
            // Each entry is at least 9 bytes; reject counts the data cannot hold.
            if entry_count > reader.remaining() / 9 {
                return Err(CodecError::LengthOutOfRange(entry_count as i64).into());
            }
            let mut entries = Vec::with_capacity(entry_count);
            for _ in 0..entry_count {
                let key = ResourceKey::read(reader)?;
                let raw = reader.read_u32()?;
                // Raw IDs are dense, so each one is below the entry count.
                if raw as usize >= entry_count {
                    return Err(CodecError::LengthOutOfRange(i64::from(raw)).into());
                }
                entries.push((key, raw));
            }
            if name != BLOCKS_REGISTRY && name != ENTITIES_REGISTRY {
                return Err(CoreError::UnknownRegistry(name));
            }
            remote.insert(name, entries);
        }

        let empty = Vec::new();
        let blocks = RawIdRemap::build(
            self.blocks(),
            remote.get(BLOCKS_REGISTRY).unwrap_or(&empty),
        );
        let entities = RawIdRemap::build(
            self.entities(),
            remote.get(ENTITIES_REGISTRY).unwrap_or(&empty),
        );
        tracing::debug!(
            blocks_unresolved = blocks.unresolved(),
            entities_unresolved = entities.unresolved(),
            "registry sync applied"
        );
        Ok(ContentRemap { blocks, entities })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Block, ContentPack, CorePack};

    struct ReversedPack;

    impl ContentPack for ReversedPack {
        fn name(&self) -> &str {
            "reversed"
        }

        fn load(&self, content: &mut ContentDatabase) -> CoreResult<()> {
            for name in ["grass", "dirt", "stone", "air"] {
                let key = ResourceKey::core(name);
                let block = if name == "air" {
                    Block::passable(key)
                } else {
                    Block::solid(key)
                };
                content.register_block(block)?;
            }
            Ok(())
        }
    }

    #[test]
    fn test_sync_translates_between_orders() {
        let server = ContentDatabase::with_core().unwrap();

        let mut client = ContentDatabase::new();
        client.load_pack(&ReversedPack).unwrap();
        client.finish().unwrap();

        let mut writer = WireWriter::new();
        server.write_sync(&mut writer).unwrap();
        let mut reader = WireReader::new();
        reader.load_data(writer.current_bytes());

        let remap = client.read_sync(&mut reader).unwrap();
        let stone_on_server = server.blocks().key_to_raw(&ResourceKey::core("stone")).unwrap();
        let stone_on_client = remap.blocks.translate(stone_on_server).unwrap();
        assert_eq!(
            client.blocks().raw_to_key(stone_on_client),
            Some(&ResourceKey::core("stone"))
        );
        // Air is pinned to raw 0, so the reversed order starts at grass = 1.
        assert_eq!(stone_on_client, 3);
        assert_eq!(remap.blocks.to_remote(stone_on_client), Some(stone_on_server));
        // The client has no entity kinds at all.
        assert_eq!(remap.entities.unresolved(), 1);
        assert!(remap.entities.translate(0).is_err());
    }

    #[test]
    fn test_unknown_remote_raw_fails() {
        let content = ContentDatabase::with_core().unwrap();
        let remap = ContentRemap::identity(&content);
        assert_eq!(remap.blocks.translate(3).unwrap(), 3);
        assert!(matches!(
            remap.blocks.translate(99),
            Err(CoreError::UnknownRawId { raw: 99, .. })
        ));
    }

    #[test]
    fn test_unknown_registry_rejected() {
        let mut writer = WireWriter::new();
        writer.write_i32(1);
        writer.write_string("biomes").unwrap();
        writer.write_i32(0);
        let mut reader = WireReader::new();
        reader.load_data(writer.current_bytes());

        let mut content = ContentDatabase::new();
        content.load_pack(&CorePack).unwrap();
        content.finish().unwrap();
        assert!(matches!(
            content.read_sync(&mut reader),
            Err(CoreError::UnknownRegistry(_))
        ));
    }

    #[test]
    fn test_write_requires_finish() {
        let mut content = ContentDatabase::new();
        content.load_pack(&CorePack).unwrap();
        let mut writer = WireWriter::new();
        assert!(content.write_sync(&mut writer).is_err());
    }
}
