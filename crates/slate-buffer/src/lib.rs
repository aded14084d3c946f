//! Buffer pool management for SlateDB.
//!
//! This crate provides the transactional page cache for heap files:
//! - Fixed-size buffer pool with configurable page count
//! - Page-level shared/exclusive locks with a wait timeout
//! - Clock eviction of clean pages (dirty pages stay until commit or abort)
//! - Commit write-back and abort rollback from before images

mod frame;
mod lock;
mod pool;
mod replacer;

pub use frame::{BufferFrame, FrameId};
pub use lock::LockManager;
pub use pool::{BufferPool, BufferPoolConfig, BufferPoolStats};
pub use replacer::{ClockReplacer, Replacer};
