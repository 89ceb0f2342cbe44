//! [`FrameAlloc`] on top of the buddy arena.
//!
//! The page-table code only ever deals in single 4 KiB frames, so each call
//! maps onto an order-0 [`BuddyAllocator::allocate`] / [`BuddyAllocator::free`].
//! The page tables never point at free frames; a failed release or share from
//! this path means the tables and the reference table disagree, which is
//! fatal.

use crate::buddy::{BuddyAllocator, BuddyError};
use crate::page_ref::PageRefError;
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::{PhysicalPage, Size4K};
use kernel_vmem::{FrameAlloc, PhysMapper};

impl<M: PhysMapper> FrameAlloc for BuddyAllocator<'_, M> {
    #[inline]
    fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>> {
        self.allocate(PAGE_SIZE as usize).ok()
    }

    /// # Panics
    /// When `page` is already free or not an arena page.
    fn free_4k(&mut self, page: PhysicalPage<Size4K>) {
        if let Err(e) = self.free(page.base(), PAGE_SIZE as usize) {
            panic!("panic: bad page release: {e}");
        }
    }

    /// # Panics
    /// When `page` is free ("panic: try to share free page!").
    fn share_4k(&mut self, page: PhysicalPage<Size4K>) {
        match self.share(page) {
            Ok(_) => {}
            Err(BuddyError::Ref(PageRefError::SharedFree(_))) => {
                panic!("panic: try to share free page!")
            }
            Err(e) => panic!("panic: bad page share: {e}"),
        }
    }

    #[inline]
    fn share_count(&self, page: PhysicalPage<Size4K>) -> u8 {
        BuddyAllocator::share_count(self, page)
    }
}
