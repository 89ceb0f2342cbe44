//! # Address Space (`LoongArch`, directory-rooted)
//!
//! Strongly-typed helpers to build, tear down and duplicate a **single** user
//! address space: one [`PageDirectory`] whose present entries link
//! [`PageTable`]s of 4 KiB leaves.
//!
//! ## Highlights
//!
//! - [`AddressSpace::get_entry`] resolves the leaf slot of a virtual address,
//!   creating the table on first use.
//! - [`AddressSpace::map_page`] installs one mapping; a live slot is never
//!   overwritten.
//! - [`AddressSpace::unmap_address_space`] releases every mapped page and
//!   every table.
//! - [`AddressSpace::clone_into`] shares every private page copy-on-write
//!   with a second address space.
//!
//! ## Invariants
//!
//! - Every live leaf holds one reference on its page in the [`FrameAlloc`].
//! - Table pages hold exactly one reference and are never shared.
//! - Every mutation of a leaf is followed by a TLB invalidation before the
//!   mutating call returns.

use crate::addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};
use crate::page_table::pd::{DirIndex, PageDirectory, PdEntry};
use crate::page_table::pt::{PageTable, PtEntry, TableIndex};
use crate::page_table::{join_indices, split_indices};
use crate::{FrameAlloc, MapError, PageEntryBits, PhysMapper, SharedMemoryRegistry};
use kernel_registers::ControlRegisters;
use log::{debug, trace};

/// The directory page of an [`AddressSpace`].
pub type RootPage = PhysicalPage<Size4K>;

/// Handle to a single, concrete address space.
///
/// Mutation requires `&mut self`; an address space reachable from several
/// cores must be wrapped in a lock by its owner.
pub struct AddressSpace<'m, M: PhysMapper, R: ControlRegisters> {
    root: RootPage,
    mapper: &'m M,
    regs: &'m R,
}

/// What [`AddressSpace::unmap_address_space`] released.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct Teardown {
    /// Leaf mappings removed (one reference each).
    pub pages: usize,
    /// Shared-memory attachments detached.
    pub detached: usize,
    /// Table pages freed.
    pub tables: usize,
}

/// What [`AddressSpace::clone_into`] did.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct CloneStats {
    /// Leaves now shared copy-on-write.
    pub shared: usize,
    /// Shared writable leaves left out of the child.
    pub skipped: usize,
    /// Tables allocated in the destination.
    pub tables: usize,
}

impl<'m, M: PhysMapper, R: ControlRegisters> AddressSpace<'m, M, R> {
    /// Adopt an existing directory page.
    #[inline]
    pub const fn from_root(mapper: &'m M, regs: &'m R, root: RootPage) -> Self {
        Self { root, mapper, regs }
    }

    /// Allocate a fresh, empty directory.
    ///
    /// # Errors
    /// [`MapError::OutOfMemory`] when no frame is available.
    pub fn create<A: FrameAlloc>(
        mapper: &'m M,
        regs: &'m R,
        alloc: &mut A,
    ) -> Result<Self, MapError> {
        let root = alloc.alloc_4k().ok_or(MapError::OutOfMemory)?;
        debug!("new address space, directory at {root}");
        Ok(Self::from_root(mapper, regs, root))
    }

    /// Physical page of the directory.
    #[inline]
    pub const fn root_page(&self) -> RootPage {
        self.root
    }

    #[inline]
    pub(crate) fn pd_mut(&self) -> &mut PageDirectory {
        // Safety: the directory page is owned by this address space.
        unsafe { self.mapper.phys_to_mut(self.root.base()) }
    }

    #[inline]
    pub(crate) fn pt_mut(&self, page: PhysicalPage<Size4K>) -> &mut PageTable {
        // Safety: table pages linked from our directory are owned by us.
        unsafe { self.mapper.phys_to_mut(page.base()) }
    }

    /// The table covering `dir`, allocated and linked if absent.
    fn ensure_table<A: FrameAlloc>(
        &mut self,
        alloc: &mut A,
        dir: DirIndex,
    ) -> Result<PhysicalPage<Size4K>, MapError> {
        let pd = self.pd_mut();
        if let Some(table) = pd.get(dir).next_table() {
            return Ok(table);
        }
        let table = alloc.alloc_4k().ok_or(MapError::OutOfMemory)?;
        pd.set(dir, PdEntry::table(table));
        debug!("page table {table} for directory slot {}", dir.as_usize());
        Ok(table)
    }

    /// The leaf slot for `va`, creating its table on first use.
    ///
    /// # Panics
    /// When a table is needed and physical memory is exhausted.
    pub fn get_entry<A: FrameAlloc>(&mut self, alloc: &mut A, va: VirtualAddress) -> &mut PtEntry {
        let (dir, idx) = split_indices(va);
        let table = match self.ensure_table(alloc, dir) {
            Ok(table) => table,
            Err(_) => panic!("panic: out of memory!"),
        };
        self.pt_mut(table).get_mut(idx)
    }

    /// The leaf slot for `va` if its table exists and the slot is live.
    pub fn lookup_mut(&mut self, va: VirtualAddress) -> Option<&mut PtEntry> {
        let (dir, idx) = split_indices(va);
        let table = self.pd_mut().get(dir).next_table()?;
        let entry = self.pt_mut(table).get_mut(idx);
        (!entry.is_empty()).then_some(entry)
    }

    /// A copy of the live leaf for `va`, never allocating.
    #[must_use]
    pub fn lookup(&self, va: VirtualAddress) -> Option<PtEntry> {
        let (dir, idx) = split_indices(va);
        let table = self.pd_mut().get(dir).next_table()?;
        let entry = self.pt_mut(table).get(idx);
        (!entry.is_empty()).then_some(entry)
    }

    /// Translate `va` if it is mapped by a valid leaf.
    #[must_use]
    pub fn query(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        let entry = self.lookup(va)?;
        if !entry.is_valid() {
            return None;
        }
        let page = entry.page()?;
        Some(page.base() + va.offset::<Size4K>())
    }

    /// Map the page containing `va` to `page`.
    ///
    /// # Panics
    /// - When the slot is already live ("panic: try to remap!").
    /// - When a table is needed and physical memory is exhausted.
    pub fn map_page<A: FrameAlloc>(
        &mut self,
        alloc: &mut A,
        va: VirtualAddress,
        page: PhysicalPage<Size4K>,
        attributes: PageEntryBits,
    ) {
        let entry = self.get_entry(alloc, va);
        if !entry.is_empty() {
            panic!("panic: try to remap!");
        }
        *entry = PtEntry::new(page, attributes);
        trace!("map {va} -> {page} ({:#x})", entry.raw());
        self.regs.invalidate_tlb();
    }

    /// Like [`map_page`](Self::map_page), reporting failures instead.
    ///
    /// # Errors
    /// - [`MapError::AlreadyMapped`] when the slot is live; nothing changes.
    /// - [`MapError::OutOfMemory`] when a table could not be allocated.
    pub fn try_map_page<A: FrameAlloc>(
        &mut self,
        alloc: &mut A,
        va: VirtualAddress,
        page: PhysicalPage<Size4K>,
        attributes: PageEntryBits,
    ) -> Result<(), MapError> {
        let (dir, idx) = split_indices(va);
        let table = self.ensure_table(alloc, dir)?;
        let entry = self.pt_mut(table).get_mut(idx);
        if !entry.is_empty() {
            return Err(MapError::AlreadyMapped(va));
        }
        *entry = PtEntry::new(page, attributes);
        trace!("map {va} -> {page} ({:#x})", entry.raw());
        self.regs.invalidate_tlb();
        Ok(())
    }

    /// Remove the mapping of `va` and drop its page reference.
    ///
    /// Returns the page that was mapped, or `None` if the slot was empty.
    pub fn unmap_page<A: FrameAlloc>(
        &mut self,
        alloc: &mut A,
        va: VirtualAddress,
    ) -> Option<PhysicalPage<Size4K>> {
        let entry = self.lookup_mut(va)?;
        let page = entry.page()?;
        entry.clear();
        alloc.free_4k(page);
        trace!("unmap {va} (was {page})");
        self.regs.invalidate_tlb();
        Some(page)
    }

    /// Release every mapped page and every table of this address space.
    ///
    /// The directory itself stays allocated and empty. A page that is shared
    /// and writable is a shared-memory attachment: `shm` is told before the
    /// reference is dropped.
    pub fn unmap_address_space<A: FrameAlloc, S: SharedMemoryRegistry + ?Sized>(
        &mut self,
        alloc: &mut A,
        shm: &mut S,
    ) -> Teardown {
        let mut stats = Teardown::default();
        let pd = self.pd_mut();

        for dir in DirIndex::all() {
            let Some(table) = pd.get(dir).next_table() else {
                continue;
            };
            let pt = self.pt_mut(table);
            for idx in TableIndex::all() {
                let entry = pt.get_mut(idx);
                let Some(page) = entry.page() else {
                    continue;
                };
                if alloc.is_shared(page) && entry.is_dirty() {
                    shm.detach(page);
                    stats.detached += 1;
                }
                alloc.free_4k(page);
                entry.clear();
                stats.pages += 1;
            }
            alloc.free_4k(table);
            pd.set(dir, PdEntry::zero());
            stats.tables += 1;
        }

        self.regs.invalidate_tlb();
        debug!(
            "address space {} torn down: {} pages, {} tables, {} detached",
            self.root, stats.pages, stats.tables, stats.detached
        );
        stats
    }

    /// Share this address space copy-on-write with `to`.
    ///
    /// Each live leaf gains one reference and loses its dirty bit here; the
    /// same read-only entry is installed in `to`. Shared writable leaves
    /// (shared-memory attachments) are not inherited. Existing tables in `to`
    /// are reused.
    ///
    /// # Panics
    /// - When `to` already maps one of the cloned addresses.
    /// - When a destination table cannot be allocated.
    pub fn clone_into<A: FrameAlloc>(&mut self, to: &mut Self, alloc: &mut A) -> CloneStats {
        let mut stats = CloneStats::default();
        let src_pd = self.pd_mut();

        for (dir, src_table) in src_pd.tables() {
            let dst_table = match to.pd_mut().get(dir).next_table() {
                Some(table) => table,
                None => {
                    let table = alloc.get_page();
                    to.pd_mut().set(dir, PdEntry::table(table));
                    stats.tables += 1;
                    table
                }
            };

            let src = self.pt_mut(src_table);
            let dst = to.pt_mut(dst_table);
            for idx in TableIndex::all() {
                let entry = src.get_mut(idx);
                let Some(page) = entry.page() else {
                    continue;
                };
                if alloc.is_shared(page) && entry.is_dirty() {
                    trace!("skip shared attachment {page} at {}", join_indices(dir, idx));
                    stats.skipped += 1;
                    continue;
                }
                if !dst.get(idx).is_empty() {
                    panic!("panic: try to remap!");
                }
                alloc.share_4k(page);
                entry.set_dirty(false);
                dst.set(idx, *entry);
                stats.shared += 1;
            }
        }

        self.regs.invalidate_tlb();
        debug!(
            "cloned {} into {}: {} shared, {} skipped, {} new tables",
            self.root, to.root, stats.shared, stats.skipped, stats.tables
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addresses::{PhysicalAddress, VirtualAddress};
    use crate::{HostPhysMemory, zero_frame};
    use kernel_registers::ShadowRegisters;
    use std::collections::BTreeMap;

    const RAM_BASE: u64 = 0x30_0000;

    /// Bump allocator with reuse and per-page counts, enough to watch the
    /// address space take and drop references.
    struct CountingAlloc<'r> {
        ram: &'r HostPhysMemory,
        next: u64,
        end: u64,
        recycled: Vec<PhysicalPage<Size4K>>,
        counts: BTreeMap<u64, u8>,
    }

    impl<'r> CountingAlloc<'r> {
        fn new(ram: &'r HostPhysMemory) -> Self {
            Self::with_capacity(ram, ram.pages())
        }

        fn with_capacity(ram: &'r HostPhysMemory, pages: usize) -> Self {
            let start = ram.base().as_u64();
            Self {
                ram,
                next: start,
                end: start + (pages as u64) * 4096,
                recycled: Vec::new(),
                counts: BTreeMap::new(),
            }
        }

        fn in_use(&self) -> usize {
            self.counts.len()
        }
    }

    impl FrameAlloc for CountingAlloc<'_> {
        fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>> {
            let page = match self.recycled.pop() {
                Some(page) => page,
                None if self.next < self.end => {
                    let page = PhysicalPage::from_addr(PhysicalAddress::new(self.next));
                    self.next += 4096;
                    page
                }
                None => return None,
            };
            zero_frame(self.ram, page);
            self.counts.insert(page.frame_number(), 1);
            Some(page)
        }

        fn free_4k(&mut self, page: PhysicalPage<Size4K>) {
            let count = self.counts.get_mut(&page.frame_number()).expect("double free");
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&page.frame_number());
                self.recycled.push(page);
            }
        }

        fn share_4k(&mut self, page: PhysicalPage<Size4K>) {
            *self
                .counts
                .get_mut(&page.frame_number())
                .expect("panic: try to share free page!") += 1;
        }

        fn share_count(&self, page: PhysicalPage<Size4K>) -> u8 {
            self.counts.get(&page.frame_number()).copied().unwrap_or(0)
        }
    }

    #[derive(Default)]
    struct Attachments(Vec<PhysicalPage<Size4K>>);

    impl SharedMemoryRegistry for Attachments {
        fn detach(&mut self, page: PhysicalPage<Size4K>) {
            self.0.push(page);
        }
    }

    fn va(v: u64) -> VirtualAddress {
        VirtualAddress::new(v)
    }

    #[test]
    fn map_page_creates_table_and_leaf() {
        let ram = HostPhysMemory::new(PhysicalAddress::new(RAM_BASE), 16);
        let regs = ShadowRegisters::new();
        let mut alloc = CountingAlloc::new(&ram);
        let mut aspace = AddressSpace::create(&ram, &regs, &mut alloc).unwrap();

        let page = alloc.get_page();
        aspace.map_page(&mut alloc, va(0x12_3000), page, PageEntryBits::user_rw());

        // directory + table + leaf
        assert_eq!(alloc.in_use(), 3);
        assert_eq!(regs.tlb_flushes(), 1);
        assert_eq!(
            aspace.query(va(0x12_3456)),
            Some(page.base() + 0x456)
        );
        assert_eq!(aspace.query(va(0x12_4000)), None);

        let entry = aspace.lookup(va(0x12_3000)).unwrap();
        assert_eq!(entry.raw(), page.base().as_u64() | 0b1111);
    }

    #[test]
    fn neighbouring_pages_share_one_table() {
        let ram = HostPhysMemory::new(PhysicalAddress::new(RAM_BASE), 16);
        let regs = ShadowRegisters::new();
        let mut alloc = CountingAlloc::new(&ram);
        let mut aspace = AddressSpace::create(&ram, &regs, &mut alloc).unwrap();

        for i in 0..4 {
            let page = alloc.get_page();
            aspace.map_page(&mut alloc, va(0x40_0000 + i * 4096), page, PageEntryBits::user_rw());
        }
        assert_eq!(alloc.in_use(), 1 + 1 + 4);
    }

    #[test]
    #[should_panic(expected = "panic: try to remap!")]
    fn remapping_a_live_entry_is_fatal() {
        let ram = HostPhysMemory::new(PhysicalAddress::new(RAM_BASE), 16);
        let regs = ShadowRegisters::new();
        let mut alloc = CountingAlloc::new(&ram);
        let mut aspace = AddressSpace::create(&ram, &regs, &mut alloc).unwrap();

        let a = alloc.get_page();
        let b = alloc.get_page();
        aspace.map_page(&mut alloc, va(0x1000), a, PageEntryBits::user_rw());
        aspace.map_page(&mut alloc, va(0x1000), b, PageEntryBits::user_rw());
    }

    #[test]
    fn try_map_page_reports_live_entry() {
        let ram = HostPhysMemory::new(PhysicalAddress::new(RAM_BASE), 16);
        let regs = ShadowRegisters::new();
        let mut alloc = CountingAlloc::new(&ram);
        let mut aspace = AddressSpace::create(&ram, &regs, &mut alloc).unwrap();

        let a = alloc.get_page();
        let b = alloc.get_page();
        aspace
            .try_map_page(&mut alloc, va(0x1000), a, PageEntryBits::user_rw())
            .unwrap();
        assert_eq!(
            aspace.try_map_page(&mut alloc, va(0x1abc), b, PageEntryBits::user_rw()),
            Err(MapError::AlreadyMapped(va(0x1abc)))
        );
        assert_eq!(aspace.lookup(va(0x1000)).and_then(PtEntry::page), Some(a));
        assert_eq!(regs.tlb_flushes(), 1);
    }

    #[test]
    fn try_map_page_reports_exhaustion() {
        let ram = HostPhysMemory::new(PhysicalAddress::new(RAM_BASE), 16);
        let regs = ShadowRegisters::new();
        let mut alloc = CountingAlloc::with_capacity(&ram, 2);
        let mut aspace = AddressSpace::create(&ram, &regs, &mut alloc).unwrap();
        let page = alloc.get_page();

        assert_eq!(
            aspace.try_map_page(&mut alloc, va(0x1000), page, PageEntryBits::user_rw()),
            Err(MapError::OutOfMemory)
        );
        assert!(aspace.lookup(va(0x1000)).is_none());
        assert_eq!(regs.tlb_flushes(), 0);
    }

    #[test]
    #[should_panic(expected = "panic: out of memory!")]
    fn get_entry_without_memory_is_fatal() {
        let ram = HostPhysMemory::new(PhysicalAddress::new(RAM_BASE), 16);
        let regs = ShadowRegisters::new();
        let mut alloc = CountingAlloc::with_capacity(&ram, 1);
        let mut aspace = AddressSpace::create(&ram, &regs, &mut alloc).unwrap();
        let _ = aspace.get_entry(&mut alloc, va(0x1000));
    }

    #[test]
    fn unmap_page_allows_a_deliberate_remap() {
        let ram = HostPhysMemory::new(PhysicalAddress::new(RAM_BASE), 16);
        let regs = ShadowRegisters::new();
        let mut alloc = CountingAlloc::new(&ram);
        let mut aspace = AddressSpace::create(&ram, &regs, &mut alloc).unwrap();

        let a = alloc.get_page();
        aspace.map_page(&mut alloc, va(0x5000), a, PageEntryBits::user_rw());
        assert_eq!(aspace.unmap_page(&mut alloc, va(0x5000)), Some(a));
        assert_eq!(alloc.share_count(a), 0);
        assert_eq!(aspace.unmap_page(&mut alloc, va(0x5000)), None);

        let b = alloc.get_page();
        aspace.map_page(&mut alloc, va(0x5000), b, PageEntryBits::user_rw());
        assert_eq!(aspace.query(va(0x5000)), Some(b.base()));
    }

    #[test]
    fn teardown_releases_pages_and_tables() {
        let ram = HostPhysMemory::new(PhysicalAddress::new(RAM_BASE), 32);
        let regs = ShadowRegisters::new();
        let mut alloc = CountingAlloc::new(&ram);
        let mut aspace = AddressSpace::create(&ram, &regs, &mut alloc).unwrap();

        for v in [0x1000, 0x2000, 0x20_0000, 0x3fe0_0000] {
            let page = alloc.get_page();
            aspace.map_page(&mut alloc, va(v), page, PageEntryBits::user_rw());
        }

        // A shared-memory segment attached writable by a second process.
        let shm_page = alloc.get_page();
        alloc.share_4k(shm_page);
        aspace.map_page(&mut alloc, va(0x3000), shm_page, PageEntryBits::user_rw());

        let mut registry = Attachments::default();
        let stats = aspace.unmap_address_space(&mut alloc, &mut registry);

        assert_eq!(
            stats,
            Teardown {
                pages: 5,
                detached: 1,
                tables: 3
            }
        );
        assert_eq!(registry.0, vec![shm_page]);
        assert_eq!(alloc.share_count(shm_page), 1);
        // directory + the other process's reference on the segment
        assert_eq!(alloc.in_use(), 2);
        assert!(aspace.lookup(va(0x1000)).is_none());
    }

    #[test]
    fn clone_shares_private_pages_read_only() {
        let ram = HostPhysMemory::new(PhysicalAddress::new(RAM_BASE), 32);
        let regs = ShadowRegisters::new();
        let mut alloc = CountingAlloc::new(&ram);
        let mut parent = AddressSpace::create(&ram, &regs, &mut alloc).unwrap();
        let mut child = AddressSpace::create(&ram, &regs, &mut alloc).unwrap();

        let data = alloc.get_page();
        let stack = alloc.get_page();
        parent.map_page(&mut alloc, va(0x1000), data, PageEntryBits::user_rw());
        parent.map_page(&mut alloc, va(0x3f_f000), stack, PageEntryBits::user_rw());
        let flushes = regs.tlb_flushes();

        let stats = parent.clone_into(&mut child, &mut alloc);
        assert_eq!(
            stats,
            CloneStats {
                shared: 2,
                skipped: 0,
                tables: 2
            }
        );
        assert_eq!(regs.tlb_flushes(), flushes + 1);

        for (v, page) in [(0x1000, data), (0x3f_f000, stack)] {
            let p = parent.lookup(va(v)).unwrap();
            let c = child.lookup(va(v)).unwrap();
            assert_eq!(p, c);
            assert_eq!(p.page(), Some(page));
            assert!(p.is_valid());
            assert!(!p.is_dirty());
            assert_eq!(alloc.share_count(page), 2);
        }
    }

    #[test]
    fn clone_twice_counts_every_clone() {
        let ram = HostPhysMemory::new(PhysicalAddress::new(RAM_BASE), 32);
        let regs = ShadowRegisters::new();
        let mut alloc = CountingAlloc::new(&ram);
        let mut parent = AddressSpace::create(&ram, &regs, &mut alloc).unwrap();
        let mut a = AddressSpace::create(&ram, &regs, &mut alloc).unwrap();
        let mut b = AddressSpace::create(&ram, &regs, &mut alloc).unwrap();

        let page = alloc.get_page();
        parent.map_page(&mut alloc, va(0x1000), page, PageEntryBits::user_rw());
        parent.clone_into(&mut a, &mut alloc);
        parent.clone_into(&mut b, &mut alloc);

        assert_eq!(alloc.share_count(page), 3);
    }

    #[test]
    fn clone_skips_shared_writable_attachments() {
        let ram = HostPhysMemory::new(PhysicalAddress::new(RAM_BASE), 32);
        let regs = ShadowRegisters::new();
        let mut alloc = CountingAlloc::new(&ram);
        let mut parent = AddressSpace::create(&ram, &regs, &mut alloc).unwrap();
        let mut child = AddressSpace::create(&ram, &regs, &mut alloc).unwrap();

        let segment = alloc.get_page();
        alloc.share_4k(segment);
        parent.map_page(&mut alloc, va(0x8000), segment, PageEntryBits::user_rw());

        let stats = parent.clone_into(&mut child, &mut alloc);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.shared, 0);
        assert!(child.lookup(va(0x8000)).is_none());
        assert!(parent.lookup(va(0x8000)).unwrap().is_dirty());
        assert_eq!(alloc.share_count(segment), 2);
    }

    #[test]
    fn clone_reuses_destination_tables() {
        let ram = HostPhysMemory::new(PhysicalAddress::new(RAM_BASE), 32);
        let regs = ShadowRegisters::new();
        let mut alloc = CountingAlloc::new(&ram);
        let mut parent = AddressSpace::create(&ram, &regs, &mut alloc).unwrap();
        let mut child = AddressSpace::create(&ram, &regs, &mut alloc).unwrap();

        let own = alloc.get_page();
        child.map_page(&mut alloc, va(0x2000), own, PageEntryBits::user_rw());
        let inherited = alloc.get_page();
        parent.map_page(&mut alloc, va(0x1000), inherited, PageEntryBits::user_rw());

        let stats = parent.clone_into(&mut child, &mut alloc);
        assert_eq!(stats.tables, 0);
        assert_eq!(child.query(va(0x2000)), Some(own.base()));
        assert_eq!(child.query(va(0x1000)), Some(inherited.base()));
    }

    #[test]
    #[should_panic(expected = "panic: try to remap!")]
    fn clone_over_a_live_destination_entry_is_fatal() {
        let ram = HostPhysMemory::new(PhysicalAddress::new(RAM_BASE), 32);
        let regs = ShadowRegisters::new();
        let mut alloc = CountingAlloc::new(&ram);
        let mut parent = AddressSpace::create(&ram, &regs, &mut alloc).unwrap();
        let mut child = AddressSpace::create(&ram, &regs, &mut alloc).unwrap();

        let a = alloc.get_page();
        let b = alloc.get_page();
        parent.map_page(&mut alloc, va(0x1000), a, PageEntryBits::user_rw());
        child.map_page(&mut alloc, va(0x1000), b, PageEntryBits::user_rw());
        parent.clone_into(&mut child, &mut alloc);
    }
}
