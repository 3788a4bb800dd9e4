//! # Packet Map
//!
//! Per-connection translation between packet types and raw packet IDs.
//!
//! ## Negotiation
//!
//! Each side enumerates its outgoing catalog, numbering entries from 0, and
//! sends that table as the first frame on the connection:
//!
//! ```text
//! [count: i32] ( [name: string] [raw: u32] )*
//! ```
//!
//! The receiver resolves every name against its own incoming catalog.
//! Names it does not know are disabled for the session: frames carrying
//! their raw ID are dropped, never fatal. Until the peer's table arrives the
//! map is unsynced and no other frame can be interpreted.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use voxlink_core::{WireReader, WireWriter};

use crate::error::{NetError, NetResult};
use crate::protocol::{CatalogEntry, Direction, PacketCatalog};

/// Raw IDs are dense; anything larger than this is not a real table.
const MAX_MAP_ENTRIES: usize = 4096;

/// Outgoing `type -> raw` and incoming `raw -> type` tables of one
/// connection.
pub struct PacketMap<Out: Direction, In: Direction> {
    outgoing: HashMap<TypeId, u32>,
    outgoing_catalog: Arc<PacketCatalog<Out>>,
    incoming_catalog: Arc<PacketCatalog<In>>,
    incoming: Option<Vec<Option<CatalogEntry>>>,
    unresolved: Vec<String>,
}

impl<Out: Direction, In: Direction> PacketMap<Out, In> {
    /// Builds the outgoing table from the local catalog.
    #[must_use]
    pub fn new(outgoing: Arc<PacketCatalog<Out>>, incoming: Arc<PacketCatalog<In>>) -> Self {
        let table = outgoing
            .entries()
            .iter()
            .enumerate()
            .map(|(raw, entry)| (entry.type_id(), raw as u32))
            .collect();
        Self {
            outgoing: table,
            outgoing_catalog: outgoing,
            incoming_catalog: incoming,
            incoming: None,
            unresolved: Vec::new(),
        }
    }

    /// Writes the outgoing table as the sync frame.
    ///
    /// # Errors
    ///
    /// Fails if the catalog does not fit the wire's length prefix.
    pub fn write_sync(&self, writer: &mut WireWriter) -> NetResult<()> {
        let entries = self.outgoing_catalog.entries();
        writer.write_i32(i32::try_from(entries.len()).map_err(|_| {
            NetError::MalformedPacketMap(format!("{} outgoing entries", entries.len()))
        })?);
        for (raw, entry) in entries.iter().enumerate() {
            writer.write_string(entry.name())?;
            writer.write_u32(raw as u32);
        }
        Ok(())
    }

    /// Applies the peer's sync frame. Returns the number of names that did
    /// not resolve locally.
    ///
    /// # Errors
    ///
    /// [`NetError::MalformedPacketMap`] on a bad count, a raw ID outside
    /// the table, or a raw ID given twice; codec errors on truncation.
    pub fn read_sync(&mut self, reader: &mut WireReader) -> NetResult<usize> {
        let count = reader.read_i32()?;
        let count = usize::try_from(count)
            .ok()
            .filter(|&c| c <= MAX_MAP_ENTRIES)
            .ok_or_else(|| NetError::MalformedPacketMap(format!("entry count {count}")))?;

        let mut table: Vec<Option<CatalogEntry>> = vec![None; count];
        let mut seen = vec![false; count];
        let mut unresolved = Vec::new();
        for _ in 0..count {
            let name = reader.read_string()?;
            let raw = reader.read_u32()? as usize;
            if raw >= count || std::mem::replace(&mut seen[raw], true) {
                return Err(NetError::MalformedPacketMap(format!(
                    "raw id {raw} for {name} is out of range or repeated"
                )));
            }
            match self.incoming_catalog.by_name(&name) {
                Some(entry) => table[raw] = Some(*entry),
                None => {
                    tracing::warn!(
                        direction = In::LABEL,
                        packet = %name,
                        raw,
                        "peer packet unknown locally; disabled for this session"
                    );
                    unresolved.push(name);
                }
            }
        }
        tracing::debug!(
            direction = In::LABEL,
            entries = count,
            unresolved = unresolved.len(),
            "packet map synced"
        );
        let missing = unresolved.len();
        self.unresolved = unresolved;
        self.incoming = Some(table);
        Ok(missing)
    }

    /// Returns true once the peer's table has been applied.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.incoming.is_some()
    }

    /// Raw ID this side sends for packet type `type_id`.
    #[must_use]
    pub fn outgoing_raw(&self, type_id: TypeId) -> Option<u32> {
        self.outgoing.get(&type_id).copied()
    }

    /// Packet type the peer means by `raw`. `None` before sync, for raw IDs
    /// outside the table, and for disabled names.
    #[must_use]
    pub fn incoming_entry(&self, raw: u32) -> Option<&CatalogEntry> {
        self.incoming
            .as_ref()
            .and_then(|table| table.get(raw as usize))
            .and_then(Option::as_ref)
    }

    /// Peer packet names that did not resolve.
    #[must_use]
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }
}
