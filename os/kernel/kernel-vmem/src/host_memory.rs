//! Heap-backed physical memory for running the memory core on a host.

use crate::addresses::{PhysicalAddress, PhysicalPage, Size4K};
use crate::{Frame, PhysMapper};
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::UnsafeCell;

/// A window of "physical RAM" made of 4 KiB-aligned heap frames.
///
/// Physical address `base + n * 4096` is frame `n`. Accesses outside the
/// window panic, which turns a stray page-table pointer into a test failure
/// instead of heap corruption.
pub struct HostPhysMemory {
    base: PhysicalAddress,
    frames: Box<[UnsafeCell<Frame>]>,
}

// Safety: callers of `phys_to_mut` uphold the aliasing rules of `PhysMapper`.
unsafe impl Sync for HostPhysMemory {}

impl HostPhysMemory {
    /// `pages` zeroed frames starting at physical address `base`.
    ///
    /// # Panics
    /// When `base` is not page-aligned.
    #[must_use]
    pub fn new(base: PhysicalAddress, pages: usize) -> Self {
        assert!(base.is_aligned_to(4096), "unaligned RAM base {base}");
        let frames = (0..pages)
            .map(|_| UnsafeCell::new(Frame::zeroed()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { base, frames }
    }

    /// RAM covering `[start, end)`, both page-aligned.
    #[must_use]
    pub fn covering(start: PhysicalAddress, end: PhysicalAddress) -> Self {
        let pages = (end.as_u64() - start.as_u64()) >> 12;
        Self::new(start, pages as usize)
    }

    #[must_use]
    pub const fn base(&self) -> PhysicalAddress {
        self.base
    }

    #[must_use]
    pub const fn pages(&self) -> usize {
        self.frames.len()
    }

    fn frame(&self, pa: PhysicalAddress) -> *mut Frame {
        let idx = pa
            .as_u64()
            .checked_sub(self.base.as_u64())
            .map(|off| (off >> 12) as usize)
            .filter(|&idx| idx < self.frames.len());
        match idx {
            Some(idx) => self.frames[idx].get(),
            None => panic!("physical address {pa} outside host memory"),
        }
    }

    /// Copy `bytes` to `pa`; the range must not cross a page.
    pub fn write_bytes(&self, pa: PhysicalAddress, bytes: &[u8]) {
        let off = pa.offset::<Size4K>() as usize;
        // Safety: exclusive for the duration of the copy.
        let frame = unsafe { &mut *self.frame(pa) };
        frame.0[off..off + bytes.len()].copy_from_slice(bytes);
    }

    /// Read `len` bytes at `pa`; the range must not cross a page.
    #[must_use]
    pub fn read_bytes(&self, pa: PhysicalAddress, len: usize) -> Vec<u8> {
        let off = pa.offset::<Size4K>() as usize;
        // Safety: shared for the duration of the copy.
        let frame = unsafe { &*self.frame(pa) };
        frame.0[off..off + len].to_vec()
    }

    /// Fill the whole of `page` with `byte`.
    pub fn fill(&self, page: PhysicalPage<Size4K>, byte: u8) {
        // Safety: exclusive for the duration of the fill.
        let frame = unsafe { &mut *self.frame(page.base()) };
        frame.0.fill(byte);
    }

    /// `true` when every byte of `page` is zero.
    #[must_use]
    pub fn is_zeroed(&self, page: PhysicalPage<Size4K>) -> bool {
        // Safety: shared for the duration of the scan.
        let frame = unsafe { &*self.frame(page.base()) };
        frame.0.iter().all(|&b| b == 0)
    }
}

impl PhysMapper for HostPhysMemory {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        debug_assert!(size_of::<T>() <= 4096 - pa.offset::<Size4K>() as usize);
        let frame = self.frame(pa).cast::<u8>();
        // Safety: in-bounds offset inside one frame; the caller promises `T` matches.
        unsafe { &mut *frame.add(pa.offset::<Size4K>() as usize).cast::<T>() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_independent() {
        let ram = HostPhysMemory::new(PhysicalAddress::new(0x30_0000), 4);
        let p1 = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x30_1000));
        ram.fill(p1, 0xaa);
        assert!(ram.is_zeroed(p1.add_pages(1)));
        assert_eq!(ram.read_bytes(p1.base() + 4095, 1), [0xaa]);
    }

    #[test]
    #[should_panic(expected = "outside host memory")]
    fn below_base_panics() {
        let ram = HostPhysMemory::new(PhysicalAddress::new(0x30_0000), 1);
        let _ = ram.read_bytes(PhysicalAddress::new(0x2f_f000), 1);
    }

    #[test]
    #[should_panic(expected = "outside host memory")]
    fn past_end_panics() {
        let ram = HostPhysMemory::covering(
            PhysicalAddress::new(0x30_0000),
            PhysicalAddress::new(0x30_2000),
        );
        assert_eq!(ram.pages(), 2);
        ram.fill(PhysicalPage::from_addr(PhysicalAddress::new(0x30_2000)), 1);
    }
}
