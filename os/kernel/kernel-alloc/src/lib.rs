//! # Kernel Memory Allocation and Virtual Memory Management
//!
//! Physical page management and the fault-driven side of virtual memory for
//! the `LoongArch` kernel.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                Virtual Memory Manager (Vmm)         │
//! │    • write-protect (copy-on-write) faults           │
//! │    • not-present faults, demand loading             │
//! │    • fork / exit of whole address spaces            │
//! └─────────────────┬───────────────────────────────────┘
//!                   │  FrameAlloc + PhysMapper (kernel-vmem)
//! ┌─────────────────▼───────────────────────────────────┐
//! │              Buddy Allocator                        │
//! │    • per-order free lists + presence bitmap         │
//! │    • split on allocate, buddy merge on free         │
//! │    • page reference table (sharing)                 │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │              Physical Mapper (DMW0)                 │
//! │    • pa ↔ pa | DMW_MASK                             │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! - [`buddy`]: the [`BuddyAllocator`] over one naturally aligned arena of
//!   `2^max_order` pages, with [`MergePolicy`] selecting how eagerly freed
//!   blocks coalesce.
//! - [`page_ref`]: one owner counter per physical page. A block returns to the
//!   free lists only when all of its pages are unowned.
//! - [`frame_alloc`]: the single-page [`FrameAlloc`](kernel_vmem::FrameAlloc)
//!   view used by the page tables; inconsistencies there are fatal.
//! - [`phys_mapper`]: [`DmwPhysMapper`] and the `phys_to_dmw` / `dmw_to_phys`
//!   conversions.
//! - [`vmm`]: the fault handlers and address-space lifecycle.
//! - [`mem_init`]: boot-time bring-up of the arena and the paging registers.
//! - [`SharedFrameAlloc`]: one spin lock around the allocator for multi-core use.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_alloc::buddy::{BlockSlot, BuddyConfig, FreeOutcome};
//! use kernel_alloc::mem_init;
//! use kernel_registers::ShadowRegisters;
//! use kernel_vmem::HostPhysMemory;
//!
//! let config = BuddyConfig { max_order: 6, ..BuddyConfig::default() };
//! let ram = HostPhysMemory::covering(config.base, config.end());
//! let regs = ShadowRegisters::new();
//! let mut slots = vec![BlockSlot::default(); config.arena_pages()];
//! let mut counts = vec![0; config.frames_needed()];
//!
//! let mut buddy = mem_init(config, &ram, &regs, &mut slots, &mut counts).unwrap();
//! let block = buddy.allocate(16 * 1024).unwrap();
//! assert_eq!(
//!     buddy.free(block.base(), 16 * 1024),
//!     Ok(FreeOutcome::Released { order: 6 })
//! );
//! ```
//!
//! On the target, the storage lives in statics sized by
//! [`BuddyConfig::arena_pages`] and [`BuddyConfig::frames_needed`], and the
//! mapper is [`DmwPhysMapper`].

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod buddy;
pub mod frame_alloc;
mod init;
pub mod page_ref;
pub mod phys_mapper;
mod shared;
pub mod vmm;

pub use crate::buddy::{BuddyAllocator, BuddyConfig, BuddyError, FreeOutcome, MergePolicy};
pub use crate::init::mem_init;
pub use crate::page_ref::{PageRefError, PageRefTable};
pub use crate::phys_mapper::DmwPhysMapper;
pub use crate::shared::SharedFrameAlloc;
