//! # Physical and Virtual Address Types
//!
//! Strongly typed wrappers for the two address kinds the memory core deals
//! with. A page allocator hands out [`PhysicalPage`]s, page tables translate
//! [`VirtualAddress`]es, and the two must never be mixed by accident.
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] | A byte address in physical memory (RAM or MMIO). |
//! | [`PhysicalPage<S>`] | A page-aligned physical base of a page of size `S`. |
//! | [`VirtualAddress`] | A byte address as seen through the page tables. |
//! | [`VirtualPage<S>`] | A page-aligned virtual base of a page of size `S`. |
//!
//! ## Page Sizes
//!
//! The two-level translation scheme knows two granularities, both expressed as
//! marker types implementing [`PageSize`]:
//!
//! - [`Size4K`]: one leaf page (4 KiB). This is the allocation unit.
//! - [`Size2M`]: the span covered by one page-directory entry (512 leaves).
//!
//! ## Frame Numbers
//!
//! Allocator metadata is indexed by *frame number* (`address >> 12`), so
//! [`PhysicalPage<Size4K>`] converts to and from frame numbers directly:
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let pa = PhysicalAddress::new(0x0030_2123);
//! let page = pa.page::<Size4K>();
//! assert_eq!(page.base().as_u64(), 0x0030_2000);
//! assert_eq!(page.frame_number(), 0x302);
//! assert_eq!(PhysicalPage::<Size4K>::from_frame_number(0x302), page);
//! ```
//!
//! Crossing from one address kind to the other is never done with bit tricks
//! on a raw integer; the owning subsystem provides one explicit conversion per
//! direction (see the direct-mapping window helpers in `kernel-alloc`).

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod page_size;
mod physical_address;
mod physical_page;
mod virtual_address;
mod virtual_page;

pub use crate::page_size::{PageSize, Size2M, Size4K};
pub use crate::physical_address::PhysicalAddress;
pub use crate::physical_page::PhysicalPage;
pub use crate::virtual_address::VirtualAddress;
pub use crate::virtual_page::VirtualPage;
