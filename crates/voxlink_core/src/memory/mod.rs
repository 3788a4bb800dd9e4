//! # Memory Management
//!
//! Shared pools that keep hot paths off the allocator.
//!
//! ## Design Philosophy
//!
//! Pools are explicit services: constructed once at startup, passed by
//! `Arc` into whatever needs them, and dropped (or `clear`ed) between test
//! cases. There is no process-global pool.

mod pool;

pub use pool::{ArrayPool, DirtyArray, PoolStats, PooledArray};
