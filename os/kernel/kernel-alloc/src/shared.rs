//! A [`BuddyAllocator`] usable from several cores.
//!
//! One [`SpinLock`] guards the free lists, the presence bitmap and the
//! reference table together; every operation holds it for exactly one call.

use crate::buddy::{BuddyAllocator, BuddyError, FreeOutcome};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};
use kernel_sync::SpinLock;
use kernel_vmem::{FrameAlloc, PhysMapper};

pub struct SharedFrameAlloc<'m, M: PhysMapper> {
    inner: SpinLock<BuddyAllocator<'m, M>>,
}

impl<'m, M: PhysMapper> SharedFrameAlloc<'m, M> {
    pub const fn new(buddy: BuddyAllocator<'m, M>) -> Self {
        Self {
            inner: SpinLock::new(buddy),
        }
    }

    /// Run `f` with the allocator locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut BuddyAllocator<'m, M>) -> R) -> R {
        self.inner.with_lock(f)
    }

    /// See [`BuddyAllocator::allocate`].
    ///
    /// # Errors
    /// [`BuddyError::OutOfMemory`].
    pub fn allocate(&self, size: usize) -> Result<PhysicalPage<Size4K>, BuddyError> {
        self.with(|buddy| buddy.allocate(size))
    }

    /// See [`BuddyAllocator::free`].
    ///
    /// # Errors
    /// As [`BuddyAllocator::free`].
    pub fn free(&self, address: PhysicalAddress, size: usize) -> Result<FreeOutcome, BuddyError> {
        self.with(|buddy| buddy.free(address, size))
    }

    pub fn into_inner(self) -> BuddyAllocator<'m, M> {
        self.inner.into_inner()
    }
}

impl<M: PhysMapper> FrameAlloc for &SharedFrameAlloc<'_, M> {
    #[inline]
    fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>> {
        self.with(|buddy| buddy.alloc_4k())
    }

    #[inline]
    fn free_4k(&mut self, page: PhysicalPage<Size4K>) {
        self.with(|buddy| buddy.free_4k(page));
    }

    #[inline]
    fn share_4k(&mut self, page: PhysicalPage<Size4K>) {
        self.with(|buddy| buddy.share_4k(page));
    }

    #[inline]
    fn share_count(&self, page: PhysicalPage<Size4K>) -> u8 {
        self.with(|buddy| buddy.share_count(page))
    }
}
