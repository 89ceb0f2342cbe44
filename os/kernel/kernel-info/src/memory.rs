//! # Memory Layout

use kernel_memory_addresses::PhysicalAddress;

/// Size of one page in bytes.
pub const PAGE_SIZE: u64 = 4096;

/// log2 of [`PAGE_SIZE`].
pub const PAGE_SHIFT: u32 = 12;

/// Total physical memory managed by the kernel.
pub const MEMORY_SIZE: u64 = 0x800_0000; // 128 MiB

/// Number of physical pages; one page-reference counter exists per page.
pub const NR_PAGES: usize = (MEMORY_SIZE >> PAGE_SHIFT) as usize;

/// First page of the kernel image.
pub const KERNEL_START_PAGE: u64 = 0x20_0000 >> PAGE_SHIFT;

/// First page past the kernel image.
pub const KERNEL_END_PAGE: u64 = 0x30_0000 >> PAGE_SHIFT;

/// Highest buddy order. The arena is a single block of this order.
pub const MAX_ORDER: u8 = 14;

/// Physical base of the buddy arena.
pub const ARENA_BASE: PhysicalAddress = PhysicalAddress::new(0x30_0000);

/// First byte past the buddy arena.
pub const ARENA_END: PhysicalAddress =
    PhysicalAddress::new(ARENA_BASE.as_u64() + (PAGE_SIZE << MAX_ORDER));

/// Entries per page directory and per page table.
pub const ENTRIES_PER_TABLE: usize = 512;

/// Size of one directory or table entry in bytes.
pub const ENTRY_SIZE: usize = 8;

/// Virtual segment selected by direct-mapping window 0.
///
/// Physical address `pa` is visible to the kernel at `pa | DMW_MASK`.
pub const DMW_MASK: u64 = 0x9000_0000_0000_0000;

/// Page-walk layout: leaf table index starts at bit 12 ...
pub const PWCL_PT_BASE: u8 = 12;
/// ... and is 9 bits wide.
pub const PWCL_PT_WIDTH: u8 = 9;
/// Directory index starts at bit 21 ...
pub const PWCL_DIR_BASE: u8 = 21;
/// ... and is 9 bits wide.
pub const PWCL_DIR_WIDTH: u8 = 9;
/// Entry width selector: 0 means 64-bit entries.
pub const PWCL_ENTRY_WIDTH: u8 = 0;

/// Size of the user virtual address range one directory can translate.
pub const USER_VA_SPAN: u64 = 1 << (PWCL_DIR_BASE + PWCL_DIR_WIDTH);

const _: () = {
    assert!(PAGE_SIZE == 1 << PAGE_SHIFT);
    assert!(ENTRIES_PER_TABLE * ENTRY_SIZE == PAGE_SIZE as usize);
    assert!(KERNEL_END_PAGE << PAGE_SHIFT <= ARENA_BASE.as_u64());
    assert!(ARENA_END.as_u64() <= MEMORY_SIZE);
    assert!(ARENA_BASE.as_u64().is_multiple_of(PAGE_SIZE));
    assert!(PWCL_DIR_BASE == PWCL_PT_BASE + PWCL_PT_WIDTH);
    assert!(MEMORY_SIZE < DMW_MASK);
};
