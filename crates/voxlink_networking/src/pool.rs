//! # Packet Pool
//!
//! Type-keyed free lists of packet instances.
//!
//! ## Ownership
//!
//! ```text
//! get::<T>() ──▶ Pooled<T> ──drop──▶ on_return_to_pool() ──▶ free list
//! acquire(..) ──▶ PooledPacket ──drop──┘
//! ```
//!
//! Dropping the handle is the only way to release an instance, so a packet
//! cannot be used after it went back. Each instance is owned by exactly one
//! handle, so concurrent callers never receive the same one.
//!
//! Capacity is unbounded: a burst grows a free list and it never shrinks.

use std::any::TypeId;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::protocol::{AnyPacket, Packet};

/// Pool counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PacketPoolStats {
    /// Requests served from a free list.
    pub reused: u64,
    /// Requests that constructed a fresh instance.
    pub created: u64,
    /// Instances returned.
    pub returned: u64,
}

/// Shared packet free lists.
#[derive(Default)]
pub struct PacketPool {
    free: Mutex<HashMap<TypeId, Vec<Box<dyn AnyPacket>>>>,
    reused: AtomicU64,
    created: AtomicU64,
    returned: AtomicU64,
}

impl PacketPool {
    /// Creates an empty pool behind an `Arc`.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn pop(&self, type_id: TypeId) -> Option<Box<dyn AnyPacket>> {
        let found = self.free.lock().get_mut(&type_id).and_then(Vec::pop);
        let counter = if found.is_some() { &self.reused } else { &self.created };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Returns a ready-to-use `T`.
    #[must_use]
    pub fn get<T: Packet>(self: &Arc<Self>) -> Pooled<T> {
        let packet = self
            .pop(TypeId::of::<T>())
            .and_then(|boxed| boxed.into_any().downcast::<T>().ok())
            .unwrap_or_default();
        Pooled {
            packet: Some(packet),
            pool: Arc::clone(self),
        }
    }

    /// Returns a ready-to-use `T` behind an erased handle.
    #[must_use]
    pub fn acquire<T: Packet>(self: &Arc<Self>) -> PooledPacket {
        let packet = self
            .pop(TypeId::of::<T>())
            .unwrap_or_else(|| Box::<T>::default() as Box<dyn AnyPacket>);
        PooledPacket {
            packet: Some(packet),
            pool: Arc::clone(self),
        }
    }

    fn give_back(&self, mut packet: Box<dyn AnyPacket>) {
        packet.reset();
        let type_id = packet.as_any().type_id();
        self.returned.fetch_add(1, Ordering::Relaxed);
        self.free.lock().entry(type_id).or_default().push(packet);
    }

    /// Number of idle `T` instances.
    #[must_use]
    pub fn idle<T: Packet>(&self) -> usize {
        self.free.lock().get(&TypeId::of::<T>()).map_or(0, Vec::len)
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> PacketPoolStats {
        PacketPoolStats {
            reused: self.reused.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            returned: self.returned.load(Ordering::Relaxed),
        }
    }
}

/// A pooled `T`. Returns to its pool on drop.
pub struct Pooled<T: Packet> {
    packet: Option<Box<T>>,
    pool: Arc<PacketPool>,
}

impl<T: Packet> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.packet.as_deref().unwrap_or_else(|| unreachable!("packet taken before drop"))
    }
}

impl<T: Packet> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.packet.as_deref_mut().unwrap_or_else(|| unreachable!("packet taken before drop"))
    }
}

impl<T: Packet> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(packet) = self.packet.take() {
            self.pool.give_back(packet);
        }
    }
}

/// A pooled packet of some type. Returns to its pool on drop.
pub struct PooledPacket {
    packet: Option<Box<dyn AnyPacket>>,
    pool: Arc<PacketPool>,
}

impl PooledPacket {
    fn inner(&self) -> &dyn AnyPacket {
        self.packet.as_deref().unwrap_or_else(|| unreachable!("packet taken before drop"))
    }

    /// Mutable access to the erased packet.
    pub fn inner_mut(&mut self) -> &mut dyn AnyPacket {
        self.packet.as_deref_mut().unwrap_or_else(|| unreachable!("packet taken before drop"))
    }

    /// The packet's map name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner().name()
    }

    /// Runtime type of the packet.
    #[must_use]
    pub fn packet_type(&self) -> TypeId {
        self.inner().as_any().type_id()
    }

    /// Returns true if the packet is a `T`.
    #[must_use]
    pub fn is<T: Packet>(&self) -> bool {
        self.inner().as_any().is::<T>()
    }

    /// Borrows the packet as `T`.
    #[must_use]
    pub fn downcast_ref<T: Packet>(&self) -> Option<&T> {
        self.inner().as_any().downcast_ref::<T>()
    }

    /// Mutably borrows the packet as `T`.
    pub fn downcast_mut<T: Packet>(&mut self) -> Option<&mut T> {
        self.inner_mut().as_any_mut().downcast_mut::<T>()
    }
}

impl std::fmt::Debug for PooledPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PooledPacket").field(&self.name()).finish()
    }
}

impl Drop for PooledPacket {
    fn drop(&mut self) {
        if let Some(packet) = self.packet.take() {
            self.pool.give_back(packet);
        }
    }
}
