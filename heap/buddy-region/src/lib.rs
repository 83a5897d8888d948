//! # Region providers for the buddy heap
//!
//! Implementations of [`buddy_alloc::RegionProvider`]:
//! * [`MmapRegion`] — an anonymous private `mmap(2)` mapping, placed near the
//!   heap's hint when the kernel allows it (unix only).
//! * [`FixedRegion`] — a caller-supplied buffer, for embedding the heap in
//!   static storage or backing it in tests.

mod fixed;
#[cfg(unix)]
mod mmap;

pub use fixed::{ArenaBuffer, FixedRegion};
#[cfg(unix)]
pub use mmap::MmapRegion;
