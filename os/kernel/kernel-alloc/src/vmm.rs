//! # Virtual Memory Manager
//!
//! Process-facing glue between the frame allocator, the page tables of one
//! process and the fault registers:
//!
//! - [`Vmm::handle_write_fault`] resolves a store to a read-only (copy-on-write)
//!   page.
//! - [`Vmm::handle_missing_page`] backs a not-present page, loading it from
//!   the executable image when it lies below the image end.
//! - [`Vmm::fork_address_space`] / [`Vmm::release_address_space`] create and
//!   retire whole trees.
//!
//! Both handlers read the faulting address from `BADV`, run to completion on
//! the faulting context and treat physical memory exhaustion as fatal.
//!
//! # Example
//! ```rust
//! use kernel_alloc::buddy::{BlockSlot, BuddyAllocator, BuddyConfig};
//! use kernel_alloc::vmm::{FaultResolution, Process, Vmm};
//! use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualAddress};
//! use kernel_registers::{Badv, ControlRegisters, ShadowRegisters};
//! use kernel_vmem::HostPhysMemory;
//!
//! struct Task(PhysicalPage<Size4K>);
//!
//! impl Process for Task {
//!     fn page_directory(&self) -> PhysicalPage<Size4K> {
//!         self.0
//!     }
//!     fn image_end(&self) -> VirtualAddress {
//!         VirtualAddress::zero()
//!     }
//! }
//!
//! let config = BuddyConfig { max_order: 4, ..BuddyConfig::default() };
//! let ram = HostPhysMemory::covering(config.base, config.end());
//! let mut slots = vec![BlockSlot::default(); config.arena_pages()];
//! let mut counts = vec![0; config.frames_needed()];
//! let mut buddy = BuddyAllocator::init(config, &ram, &mut slots, &mut counts).unwrap();
//! let regs = ShadowRegisters::new();
//!
//! let mut vmm = Vmm::new(&ram, &regs, &mut buddy);
//! let task = Task(vmm.create_address_space().unwrap());
//!
//! regs.store(Badv::new(VirtualAddress::new(0x40_0123)));
//! let FaultResolution::Populated { loaded, .. } = vmm.handle_missing_page(&task, &mut ()) else {
//!     unreachable!()
//! };
//! assert!(!loaded);
//! ```

use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualAddress, VirtualPage};
use kernel_registers::{Badv, ControlRegisters};
use kernel_vmem::address_space::{CloneStats, RootPage, Teardown};
use kernel_vmem::{
    AddressSpace, FrameAlloc, MapError, PageEntryBits, PhysMapper, PtEntry, SharedMemoryRegistry,
    copy_frame,
};
use log::{debug, trace};

/// What the memory core needs to know about a process.
pub trait Process {
    /// Directory page of the process's page-table tree.
    fn page_directory(&self) -> RootPage;

    /// First virtual address past the executable image. Pages below it are
    /// file-backed, pages above are anonymous.
    fn image_end(&self) -> VirtualAddress;
}

/// Source of executable-image contents for demand paging.
pub trait ExecutableLoader {
    /// Fill `into` with the image bytes that belong at `page`.
    fn load_page(&mut self, page: VirtualPage<Size4K>, into: PhysicalPage<Size4K>);
}

/// No image: every page stays zero-filled.
impl ExecutableLoader for () {
    #[inline]
    fn load_page(&mut self, _page: VirtualPage<Size4K>, _into: PhysicalPage<Size4K>) {}
}

/// How a fault was resolved.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FaultResolution {
    /// The page was shared: the faulting process now owns a private copy.
    Copied {
        from: PhysicalPage<Size4K>,
        to: PhysicalPage<Size4K>,
    },
    /// The page had a single owner and was made writable in place.
    MadeWritable(PhysicalPage<Size4K>),
    /// A fresh page was mapped; `loaded` when it came from the image.
    Populated {
        page: PhysicalPage<Size4K>,
        loaded: bool,
    },
}

/// Virtual memory manager for the processes of one core.
pub struct Vmm<'m, M: PhysMapper, R: ControlRegisters, A: FrameAlloc> {
    mapper: &'m M,
    regs: &'m R,
    alloc: A,
}

impl<'m, M: PhysMapper, R: ControlRegisters, A: FrameAlloc> Vmm<'m, M, R, A> {
    /// `alloc` is typically `&mut BuddyAllocator` or `&SharedFrameAlloc`.
    pub const fn new(mapper: &'m M, regs: &'m R, alloc: A) -> Self {
        Self {
            mapper,
            regs,
            alloc,
        }
    }

    /// The frame allocator backing this manager.
    pub const fn alloc(&mut self) -> &mut A {
        &mut self.alloc
    }

    /// The page-table tree of `process`.
    pub fn address_space<P: Process + ?Sized>(&self, process: &P) -> AddressSpace<'m, M, R> {
        AddressSpace::from_root(self.mapper, self.regs, process.page_directory())
    }

    /// Allocate an empty directory for a new process.
    ///
    /// # Errors
    /// [`MapError::OutOfMemory`] when no frame is available.
    pub fn create_address_space(&mut self) -> Result<RootPage, MapError> {
        AddressSpace::create(self.mapper, self.regs, &mut self.alloc).map(|space| space.root_page())
    }

    /// Resolve a write to a read-only page of `process` at `BADV`.
    ///
    /// A page with several owners is copied into a fresh private page which
    /// replaces it writable in the faulting process; the old page loses one
    /// owner. A page with one owner is made writable in place.
    ///
    /// # Panics
    /// - When `BADV` is not mapped in `process`.
    /// - When physical memory is exhausted ("panic: out of memory!").
    pub fn handle_write_fault<P: Process + ?Sized>(&mut self, process: &P) -> FaultResolution {
        let va = self.regs.load::<Badv>().address();
        let mut space = self.address_space(process);
        let Some((entry, old)) = space
            .lookup_mut(va)
            .and_then(|entry| entry.page().map(|page| (entry, page)))
        else {
            panic!("panic: write fault on unmapped address {va}");
        };

        let resolution = if self.alloc.is_shared(old) {
            let new = self.alloc.get_page();
            copy_frame(self.mapper, old, new);
            *entry = PtEntry::new(new, PageEntryBits::user_rw());
            self.alloc.free_4k(old);
            debug!("write fault at {va}: copied shared {old} into {new}");
            FaultResolution::Copied { from: old, to: new }
        } else {
            entry.set_dirty(true);
            debug!("write fault at {va}: {old} writable again");
            FaultResolution::MadeWritable(old)
        };

        self.regs.invalidate_tlb();
        resolution
    }

    /// Back the not-present page of `process` containing `BADV`.
    ///
    /// The fresh page is filled by `loader` when it lies below
    /// [`Process::image_end`] and stays zeroed otherwise.
    ///
    /// # Panics
    /// - When physical memory is exhausted ("panic: out of memory!").
    /// - When the page is already mapped ("panic: try to remap!").
    pub fn handle_missing_page<P, L>(&mut self, process: &P, loader: &mut L) -> FaultResolution
    where
        P: Process + ?Sized,
        L: ExecutableLoader + ?Sized,
    {
        let va = self.regs.load::<Badv>().address();
        let vpage = VirtualPage::<Size4K>::containing_address(va);
        let page = self.alloc.get_page();

        let loaded = vpage.base() < process.image_end();
        if loaded {
            loader.load_page(vpage, page);
        }

        let mut space = self.address_space(process);
        space.map_page(&mut self.alloc, vpage.base(), page, PageEntryBits::user_rw());
        trace!("missing page {vpage} backed by {page} (loaded: {loaded})");
        FaultResolution::Populated { page, loaded }
    }

    /// Create the directory of a child of `parent` and share every mapping
    /// of the parent with it copy-on-write.
    ///
    /// # Errors
    /// [`MapError::OutOfMemory`] when the child directory cannot be
    /// allocated; the parent is untouched in that case.
    ///
    /// # Panics
    /// When physical memory runs out while building the child's tables.
    pub fn fork_address_space<P: Process + ?Sized>(
        &mut self,
        parent: &P,
    ) -> Result<(RootPage, CloneStats), MapError> {
        let mut child = AddressSpace::create(self.mapper, self.regs, &mut self.alloc)?;
        let stats = self.address_space(parent).clone_into(&mut child, &mut self.alloc);
        Ok((child.root_page(), stats))
    }

    /// Release every page, table and finally the directory of `process`.
    ///
    /// Shared writable pages are reported to `shm` first.
    pub fn release_address_space<P, S>(&mut self, process: &P, shm: &mut S) -> Teardown
    where
        P: Process + ?Sized,
        S: SharedMemoryRegistry + ?Sized,
    {
        let mut space = self.address_space(process);
        let teardown = space.unmap_address_space(&mut self.alloc, shm);
        self.alloc.free_4k(space.root_page());
        teardown
    }
}
