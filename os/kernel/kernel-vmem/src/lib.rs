//! # Virtual Memory Support
//!
//! Two-level `LoongArch` paging for user address spaces.
//!
//! ## What you get
//! - An [`AddressSpace`] rooted at one page directory, with lazy table
//!   creation, mapping, teardown and copy-on-write cloning.
//! - The [`PageEntryBits`] leaf encoding and typed [`PageDirectory`] /
//!   [`PageTable`] frames with index helpers.
//! - The seams to the rest of the kernel: [`FrameAlloc`] (physical pages and
//!   their share counts), [`PhysMapper`] (reaching a physical frame from the
//!   kernel) and [`SharedMemoryRegistry`].
//!
//! ## Virtual Address → Physical Address Walk
//!
//! ```text
//! | 29‒21 | 20‒12 | 11‒0   |
//! |  Dir  | Table | Offset |
//!
//!  PGD ──► PT ──► 4 KiB page
//! ```
//!
//! The page-walk controller is programmed for exactly this split (see
//! `kernel_registers::Pwcl::two_level`). A directory entry is the raw physical
//! address of its table; a leaf entry is `frame | PLV | D | V`.
//!
//! ## Sharing
//!
//! Every mapped leaf holds one reference on its physical page. Cloning an
//! address space adds a reference and clears the dirty bit on both sides, so
//! the next write from either side faults and resolves the copy.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

pub mod address_space;
#[cfg(any(test, feature = "host-memory"))]
mod host_memory;
mod page_entry_bits;
pub mod page_table;

#[cfg(any(test, feature = "host-memory"))]
extern crate alloc;

pub use crate::address_space::AddressSpace;
#[cfg(any(test, feature = "host-memory"))]
pub use crate::host_memory::HostPhysMemory;
pub use crate::page_entry_bits::{PageEntryBits, Privilege};
pub use crate::page_table::pd::{DirIndex, PageDirectory, PdEntry};
pub use crate::page_table::pt::{PageTable, PtEntry, TableIndex};
pub use kernel_memory_addresses as addresses;

use crate::addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};

/// Re-export constants as info module.
pub use kernel_info::memory as info;

/// Source of physical 4 KiB frames and owner of their reference counts.
///
/// A frame handed out by [`alloc_4k`](Self::alloc_4k) is zero-filled and has
/// a count of 1. [`share_4k`](Self::share_4k) adds a reference,
/// [`free_4k`](Self::free_4k) drops one; the frame returns to the pool when
/// the last reference is dropped.
pub trait FrameAlloc {
    /// Allocate one zeroed frame; `None` when physical memory is exhausted.
    fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>>;

    /// Drop one reference on `page`.
    ///
    /// # Panics
    /// Implementations panic when `page` holds no reference; page tables never
    /// point at free frames.
    fn free_4k(&mut self, page: PhysicalPage<Size4K>);

    /// Add one reference on an allocated `page`.
    ///
    /// # Panics
    /// Implementations panic when `page` is free.
    fn share_4k(&mut self, page: PhysicalPage<Size4K>);

    /// Current number of references on `page`; 0 means free.
    fn share_count(&self, page: PhysicalPage<Size4K>) -> u8;

    /// `true` when more than one mapping refers to `page`.
    #[inline]
    fn is_shared(&self, page: PhysicalPage<Size4K>) -> bool {
        self.share_count(page) > 1
    }

    /// Allocate a frame or stop the kernel.
    ///
    /// # Panics
    /// When physical memory is exhausted.
    #[inline]
    fn get_page(&mut self) -> PhysicalPage<Size4K> {
        match self.alloc_4k() {
            Some(page) => page,
            None => panic!("panic: out of memory!"),
        }
    }
}

impl<A: FrameAlloc + ?Sized> FrameAlloc for &mut A {
    #[inline]
    fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>> {
        (**self).alloc_4k()
    }

    #[inline]
    fn free_4k(&mut self, page: PhysicalPage<Size4K>) {
        (**self).free_4k(page);
    }

    #[inline]
    fn share_4k(&mut self, page: PhysicalPage<Size4K>) {
        (**self).share_4k(page);
    }

    #[inline]
    fn share_count(&self, page: PhysicalPage<Size4K>) -> u8 {
        (**self).share_count(page)
    }
}

/// Converts physical addresses to usable references in the kernel's view of
/// memory (on `LoongArch`, the direct-mapping window).
///
/// # Safety
/// - `pa` must be reachable and writable through the mapping.
/// - Lifetime `'a` is not tied to anything; the mapping must stay valid and
///   the caller must not create overlapping `&mut` to the same bytes.
/// - Type `T` must match the bytes at `pa`.
pub trait PhysMapper {
    /// Convert a *physical* address to a usable mutable reference.
    ///
    /// # Safety
    /// See the trait documentation.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}

impl<M: PhysMapper + ?Sized> PhysMapper for &M {
    #[inline]
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        unsafe { (**self).phys_to_mut(pa) }
    }
}

/// The bytes of one physical page.
#[repr(C, align(4096))]
pub struct Frame(pub [u8; 4096]);

impl Frame {
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self([0; 4096])
    }
}

/// Fill `page` with zeroes.
#[inline]
pub fn zero_frame<M: PhysMapper + ?Sized>(mapper: &M, page: PhysicalPage<Size4K>) {
    // Safety: a frame owned by the caller is reachable through the mapper.
    let frame: &mut Frame = unsafe { mapper.phys_to_mut(page.base()) };
    frame.0.fill(0);
}

/// Copy the contents of `from` into `to`.
///
/// # Panics
/// In debug builds, when `from == to`.
#[inline]
pub fn copy_frame<M: PhysMapper + ?Sized>(
    mapper: &M,
    from: PhysicalPage<Size4K>,
    to: PhysicalPage<Size4K>,
) {
    debug_assert_ne!(from, to, "copy onto itself");
    // Safety: distinct frames, so the two references do not overlap.
    let src: &mut Frame = unsafe { mapper.phys_to_mut(from.base()) };
    let dst: &mut Frame = unsafe { mapper.phys_to_mut(to.base()) };
    dst.0.copy_from_slice(&src.0);
}

/// Bookkeeping for pages attached to several processes as shared memory.
///
/// Consulted only for leaves that are shared *and* writable when an address
/// space is torn down.
pub trait SharedMemoryRegistry {
    /// One attachment of `page` went away.
    fn detach(&mut self, page: PhysicalPage<Size4K>);
}

/// No shared-memory segments exist.
impl SharedMemoryRegistry for () {
    #[inline]
    fn detach(&mut self, _page: PhysicalPage<Size4K>) {}
}

/// Failures of [`AddressSpace::try_map_page`] and [`AddressSpace::create`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MapError {
    #[error("out of physical memory while building page tables")]
    OutOfMemory,
    #[error("virtual address {0} is already mapped")]
    AlreadyMapped(VirtualAddress),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_copy_frames() {
        let ram = HostPhysMemory::new(PhysicalAddress::new(0x10_0000), 2);
        let a = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x10_0000));
        let b = a.add_pages(1);

        ram.write_bytes(a.base() + 100, b"cow");
        copy_frame(&ram, a, b);
        assert_eq!(ram.read_bytes(b.base() + 100, 3), b"cow");

        zero_frame(&ram, a);
        assert_eq!(ram.read_bytes(a.base() + 100, 3), [0, 0, 0]);
        assert_eq!(ram.read_bytes(b.base() + 100, 3), b"cow");
    }

    struct Empty;

    impl FrameAlloc for Empty {
        fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>> {
            None
        }
        fn free_4k(&mut self, _page: PhysicalPage<Size4K>) {}
        fn share_4k(&mut self, _page: PhysicalPage<Size4K>) {}
        fn share_count(&self, _page: PhysicalPage<Size4K>) -> u8 {
            0
        }
    }

    #[test]
    #[should_panic(expected = "panic: out of memory!")]
    fn get_page_panics_when_exhausted() {
        let _ = Empty.get_page();
    }

    #[test]
    fn map_error_messages() {
        let e = MapError::AlreadyMapped(VirtualAddress::new(0x1000));
        assert!(e.to_string().contains("already mapped"));
    }
}
