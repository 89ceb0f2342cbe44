//! # Page Table
//!
//! - [`TableIndex`]: index type for VA bits `[20:12]`.
//! - [`PtEntry`]: a leaf entry mapping one 4 KiB page.
//! - [`PageTable`]: a 4 KiB-aligned array of 512 entries.
//!
//! An entry is *empty* when all 64 bits are zero. A non-empty entry is live
//! and must be cleared before it may be written again.

use crate::PageEntryBits;
use crate::addresses::{PageSize, PhysicalPage, Size4K, VirtualAddress};
use crate::page_table::ENTRIES;

/// Index into a page table (VA bits `[20:12]`).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TableIndex(u16);

/// A single leaf entry.
#[doc(alias = "PTE")]
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PtEntry(PageEntryBits);

/// A leaf table: 512 entries, 4 KiB-aligned.
#[doc(alias = "PT")]
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PtEntry; ENTRIES],
}

impl TableIndex {
    #[inline]
    #[must_use]
    pub const fn from(va: VirtualAddress) -> Self {
        Self::new(((va.as_u64() >> Size4K::SHIFT) & 0x1FF) as u16)
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

    pub fn all() -> impl Iterator<Item = Self> {
        (0..ENTRIES as u16).map(Self::new)
    }
}

impl PtEntry {
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(PageEntryBits::new())
    }

    /// Map `page` with `attributes`; any frame bits in `attributes` are replaced.
    #[inline]
    #[must_use]
    pub const fn new(page: PhysicalPage<Size4K>, attributes: PageEntryBits) -> Self {
        Self(attributes.with_page(page))
    }

    /// `true` for an all-zero entry.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0.into_bits() == 0
    }

    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0.valid()
    }

    #[inline]
    #[must_use]
    pub const fn is_dirty(self) -> bool {
        self.0.dirty()
    }

    #[inline]
    pub const fn set_dirty(&mut self, dirty: bool) {
        self.0.set_dirty(dirty);
    }

    #[inline]
    #[must_use]
    pub const fn flags(self) -> PageEntryBits {
        self.0
    }

    /// The mapped page of a live entry.
    #[inline]
    #[must_use]
    pub const fn page(self) -> Option<PhysicalPage<Size4K>> {
        if self.is_empty() {
            None
        } else {
            Some(self.0.page())
        }
    }

    #[inline]
    pub const fn clear(&mut self) {
        *self = Self::zero();
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0.into_bits()
    }

    #[inline]
    #[must_use]
    pub const fn from_raw(v: u64) -> Self {
        Self(PageEntryBits::from_bits(v))
    }
}

impl PageTable {
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PtEntry::zero(); ENTRIES],
        }
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: TableIndex) -> PtEntry {
        self.entries[i.as_usize()]
    }

    #[inline]
    pub const fn get_mut(&mut self, i: TableIndex) -> &mut PtEntry {
        &mut self.entries[i.as_usize()]
    }

    #[inline]
    pub const fn set(&mut self, i: TableIndex, e: PtEntry) {
        self.entries[i.as_usize()] = e;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::addresses::PhysicalAddress;

    #[test]
    fn user_leaf_encoding() {
        let page = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x5555_0000));
        let e = PtEntry::new(page, PageEntryBits::user_rw());
        assert_eq!(e.raw(), 0x5555_0000 | 0b1111);
        assert_eq!(e.page(), Some(page));
        assert!(e.is_valid());
        assert!(e.is_dirty());
    }

    #[test]
    fn clearing_dirty_keeps_mapping() {
        let page = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x0030_1000));
        let mut e = PtEntry::new(page, PageEntryBits::user_rw());
        e.set_dirty(false);
        assert_eq!(e.raw(), 0x0030_1000 | 0b1101);
        assert_eq!(e.page(), Some(page));
    }

    #[test]
    fn empty_entry_has_no_page() {
        let mut e = PtEntry::from_raw(0x0030_0000 | 1);
        assert!(!e.is_empty());
        e.clear();
        assert!(e.is_empty());
        assert_eq!(e.page(), None);
    }
}
