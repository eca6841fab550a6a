//! # fitalloc - A Free-List Memory Allocator Library
//!
//! This crate provides a `malloc`-style allocator that carves every request
//! out of a single growable heap, keeps released blocks in an address-ordered
//! free list, and reuses them with a configurable fit strategy.
//!
//! ## Overview
//!
//! ```text
//!   Heap after a few allocations and releases:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                         HEAP MEMORY                                  │
//!   │                                                                      │
//!   │   ┌──────┬──────┬──────┬──────┬──────┬───────────────────────────┐   │
//!   │   │  A1  │ free │  A3  │  A4  │ free │         A6                │   │
//!   │   └──────┴──┬───┴──────┴──────┴──┬───┴───────────────────────────┘   │
//!   │             │                    │                               ▲   │
//!   │             └──── free list ─────┘                               │   │
//!   │            (ascending addresses)                             Program │
//!   │                                                               Break  │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   allocate:  search the free list (first / best / worst fit),
//!              split the hit, or grow the heap on a miss.
//!   release:   shrink the heap if the block is large and on top,
//!              otherwise insert it into the free list and merge neighbors.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   fitalloc
//!   ├── align      - Alignment macros (align!, align_to!) and align_up
//!   ├── config     - Alignment unit, trim threshold, fit strategy
//!   ├── heap       - HeapGrowth trait, Sbrk and Region heaps
//!   ├── block      - Block header, split / merge / detach (internal)
//!   ├── free_list  - Address-ordered free list and fit searches
//!   ├── counters   - Event counters, fragmentation, Stats
//!   ├── allocator  - FreeListAllocator
//!   └── locked     - LockedAllocator (GlobalAlloc)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use fitalloc::{FreeListAllocator, Region};
//!
//! let heap = Region::with_capacity(1 << 20).unwrap();
//! let mut allocator = FreeListAllocator::new(heap);
//!
//! let ptr = allocator.allocate(64).unwrap();
//! unsafe {
//!     ptr.as_ptr().write_bytes(0x2A, 64);
//!     allocator.release(Some(ptr));
//! }
//!
//! assert_eq!(allocator.free_list().length(), 1);
//! ```
//!
//! ## Block Layout
//!
//! ```text
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Block Header       │         User Data              │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ capacity: C     │  │  ┌──────────────────────────┐  │
//!   │  │ size:     N     │  │  │  N bytes requested,      │  │
//!   │  │ prev:     ptr   │  │  │  C bytes owned           │  │
//!   │  │ next:     ptr   │  │  └──────────────────────────┘  │
//!   │  └─────────────────┘  │                                │
//!   │   HEADER_SIZE bytes   │                                │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Pointer returned to user
//! ```
//!
//! ## Limitations
//!
//! - **Single heap**: one contiguous region per allocator
//! - **Unsynchronized core**: wrap in [`LockedAllocator`] to share
//! - **Alignment**: payloads are aligned to the configured unit only
//! - **Unix-only**: requires `libc` (`sbrk`, `mmap`)

/// Emits a `tracing` event when the `tracing` feature is on.
macro_rules! trace_event {
  ($level:ident, $($arg:tt)+) => {
    #[cfg(feature = "tracing")]
    ::tracing::$level!($($arg)+);
  };
}

pub mod align;
mod allocator;
mod block;
mod config;
mod counters;
mod free_list;
mod heap;
mod locked;

pub use allocator::FreeListAllocator;
pub use block::HEADER_SIZE;
pub use config::{Config, ConfigError, FitStrategy};
pub use counters::{Counters, Stats, external_fragmentation, internal_fragmentation};
pub use free_list::{FreeBlock, FreeList};
pub use heap::{HeapError, HeapGrowth, Region, Sbrk};
pub use locked::LockedAllocator;
