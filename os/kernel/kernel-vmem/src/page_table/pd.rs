//! # Page Directory
//!
//! - [`DirIndex`]: index type for VA bits `[29:21]`.
//! - [`PdEntry`]: the physical address of a leaf table, or zero.
//! - [`PageDirectory`]: a 4 KiB-aligned array of 512 entries.
//!
//! Directory entries carry no attribute bits; any non-zero value is a present
//! table.

use crate::addresses::{PageSize, PhysicalAddress, PhysicalPage, Size2M, Size4K, VirtualAddress};
use crate::page_table::ENTRIES;

/// Index into the page directory (VA bits `[29:21]`).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DirIndex(u16);

/// One directory entry.
#[doc(alias = "PDE")]
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PdEntry(u64);

/// The root of an address space: 512 entries, 4 KiB-aligned.
#[doc(alias = "PGD")]
#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [PdEntry; ENTRIES],
}

impl DirIndex {
    #[inline]
    #[must_use]
    pub const fn from(va: VirtualAddress) -> Self {
        Self::new(((va.as_u64() >> Size2M::SHIFT) & 0x1FF) as u16)
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!((v as usize) < ENTRIES);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Every directory slot in ascending order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..ENTRIES as u16).map(Self::new)
    }
}

impl PdEntry {
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// An entry linking the table in `page`.
    #[inline]
    #[must_use]
    pub const fn table(page: PhysicalPage<Size4K>) -> Self {
        Self(page.base().as_u64())
    }

    #[inline]
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.0 != 0
    }

    /// The linked table, if any.
    #[inline]
    #[must_use]
    pub const fn next_table(self) -> Option<PhysicalPage<Size4K>> {
        if self.is_present() {
            Some(PhysicalPage::from_addr(PhysicalAddress::new(self.0)))
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl PageDirectory {
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PdEntry::zero(); ENTRIES],
        }
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: DirIndex) -> PdEntry {
        self.entries[i.as_usize()]
    }

    #[inline]
    pub const fn set(&mut self, i: DirIndex, e: PdEntry) {
        self.entries[i.as_usize()] = e;
    }

    /// Slots holding a table, with the table's page.
    pub fn tables(&self) -> impl Iterator<Item = (DirIndex, PhysicalPage<Size4K>)> + '_ {
        DirIndex::all().filter_map(|i| self.get(i).next_table().map(|t| (i, t)))
    }
}
