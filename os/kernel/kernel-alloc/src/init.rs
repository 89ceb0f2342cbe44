//! Bring-up of the memory core.

use crate::buddy::{BlockSlot, BuddyAllocator, BuddyConfig, BuddyError};
use kernel_info::memory::{DMW_MASK, KERNEL_END_PAGE, KERNEL_START_PAGE};
use kernel_memory_addresses::PhysicalPage;
use kernel_registers::{ControlRegisters, Csr, Dmw, Pwcl};
use kernel_vmem::PhysMapper;
use log::info;

/// Initialise physical memory management on the boot core.
///
/// 1. Build the buddy arena described by `config` (one free block).
/// 2. Mark the kernel image pages as owned in the reference table.
/// 3. Program DMW0 as the kernel's direct-mapping window and disable DMW3.
/// 4. Program the page walker for the two-level directory/table layout.
/// 5. Invalidate the TLB.
///
/// # Errors
/// Whatever [`BuddyAllocator::init`] or [`BuddyAllocator::reserve`] reject;
/// no register is written in that case.
pub fn mem_init<'m, M: PhysMapper, R: ControlRegisters + ?Sized>(
    config: BuddyConfig,
    mapper: &'m M,
    regs: &R,
    slots: &'m mut [BlockSlot],
    counts: &'m mut [u8],
) -> Result<BuddyAllocator<'m, M>, BuddyError> {
    let mut buddy = BuddyAllocator::init(config, mapper, slots, counts)?;
    info!(
        "buddy arena {}..{} ({} pages, max order {})",
        config.base,
        config.end(),
        config.arena_pages(),
        config.max_order
    );

    let kernel = PhysicalPage::from_frame_number(KERNEL_START_PAGE);
    buddy.reserve(kernel, KERNEL_END_PAGE - KERNEL_START_PAGE)?;
    info!(
        "kernel image {}..{} reserved",
        kernel,
        PhysicalPage::from_frame_number(KERNEL_END_PAGE)
    );

    regs.store_to(Csr::Dmw0, Dmw::kernel_window(DMW_MASK));
    regs.store_to(Csr::Dmw3, Dmw::disabled());
    regs.store(Pwcl::two_level());
    regs.invalidate_tlb();
    info!("direct-mapping window at {DMW_MASK:#x}, two-level page walk enabled");

    Ok(buddy)
}
