//! # DMW-based `PhysMapper`
//!
//! The kernel runs with direct-mapping window 0 configured for the segment in
//! [`DMW_MASK`]: physical address `pa` is visible at `pa | DMW_MASK` without
//! any page-table walk. This module is the only place where the two address
//! spaces are converted into each other.
//!
//! ```rust
//! use kernel_alloc::phys_mapper::{dmw_to_phys, phys_to_dmw};
//! use kernel_memory_addresses::PhysicalAddress;
//!
//! let pa = PhysicalAddress::new(0x30_1000);
//! let va = phys_to_dmw(pa);
//! assert_eq!(va.as_u64(), 0x9000_0000_0030_1000);
//! assert_eq!(dmw_to_phys(va), Some(pa));
//! ```

use kernel_info::memory::{DMW_MASK, MEMORY_SIZE};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_vmem::PhysMapper;

/// Kernel view of a physical address through DMW0.
#[inline]
#[must_use]
pub const fn phys_to_dmw(pa: PhysicalAddress) -> VirtualAddress {
    VirtualAddress::new(pa.as_u64() | DMW_MASK)
}

/// Physical address behind a DMW0 address; `None` outside the window or
/// beyond physical memory.
#[inline]
#[must_use]
pub const fn dmw_to_phys(va: VirtualAddress) -> Option<PhysicalAddress> {
    let raw = va.as_u64();
    if raw & DMW_MASK != DMW_MASK {
        return None;
    }
    let pa = raw & !DMW_MASK;
    if pa < MEMORY_SIZE {
        Some(PhysicalAddress::new(pa))
    } else {
        None
    }
}

/// [`PhysMapper`] for a kernel running with DMW0 programmed by
/// [`mem_init`](crate::mem_init).
///
/// # Safety
/// Only meaningful on the target: the window must be active and cover the
/// referenced physical range.
#[derive(Copy, Clone, Debug, Default)]
pub struct DmwPhysMapper;

impl PhysMapper for DmwPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va = phys_to_dmw(pa).as_u64() as *mut T;
        // Safety: the caller guarantees the address is valid and mapped via DMW0.
        unsafe { &mut *va }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_round_trip() {
        for raw in [0, 0x20_0000, 0x30_0000, MEMORY_SIZE - 4096] {
            let pa = PhysicalAddress::new(raw);
            assert_eq!(dmw_to_phys(phys_to_dmw(pa)), Some(pa));
        }
    }

    #[test]
    fn addresses_outside_the_window_are_rejected() {
        assert_eq!(dmw_to_phys(VirtualAddress::new(0x30_0000)), None);
        assert_eq!(dmw_to_phys(VirtualAddress::new(0x8000_0000_0030_0000)), None);
        assert_eq!(dmw_to_phys(phys_to_dmw(PhysicalAddress::new(MEMORY_SIZE))), None);
    }
}
