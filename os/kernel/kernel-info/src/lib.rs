//! # Kernel Memory Configuration
//!
//! The authoritative source for the physical memory layout that the page
//! allocator, the page tables and the hardware page walker must agree on.
//!
//! ```text
//! Physical memory (128 MiB):
//!
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │   Firmware / low memory         │
//! 0x0020_0000 ├─────────────────────────────────┤ KERNEL_START_PAGE
//!             │   Kernel image (owned, count 1) │
//! 0x0030_0000 ├─────────────────────────────────┤ ARENA_BASE
//!             │   Buddy arena                   │
//!             │   (2^MAX_ORDER pages = 64 MiB)  │
//! 0x0430_0000 ├─────────────────────────────────┤ ARENA_END
//!             │   Unmanaged                     │
//! 0x0800_0000 └─────────────────────────────────┘ MEMORY_SIZE
//! ```
//!
//! Virtual memory of a user process is translated by a two-level tree:
//!
//! ```text
//! | 29‒21     | 20‒12     | 11‒0   |
//! | directory |   table   | offset |
//! ```
//!
//! The kernel itself reaches physical memory through the direct-mapping
//! window selected by [`DMW_MASK`](memory::DMW_MASK).

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod memory;
