//! # Two-Level Page Tables
//!
//! ```text
//! | 63‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |   —   |  Dir  | Table | Offset |
//! ```
//!
//! A [`PageDirectory`](pd::PageDirectory) entry holds the physical address of
//! a [`PageTable`](pt::PageTable); a page-table entry maps one 4 KiB page.
//! Both levels are one page of 512 eight-byte entries.

pub mod pd;
pub mod pt;

use crate::addresses::VirtualAddress;
use crate::page_table::pd::DirIndex;
use crate::page_table::pt::TableIndex;

/// Number of entries in a directory or a table.
pub const ENTRIES: usize = kernel_info::memory::ENTRIES_PER_TABLE;

#[inline]
#[must_use]
pub const fn split_indices(va: VirtualAddress) -> (DirIndex, TableIndex) {
    (DirIndex::from(va), TableIndex::from(va))
}

/// The lowest virtual address translated through `(dir, table)`.
#[inline]
#[must_use]
pub const fn join_indices(dir: DirIndex, table: TableIndex) -> VirtualAddress {
    VirtualAddress::new(
        ((dir.as_usize() as u64) << kernel_info::memory::PWCL_DIR_BASE)
            | ((table.as_usize() as u64) << kernel_info::memory::PWCL_PT_BASE),
    )
}
