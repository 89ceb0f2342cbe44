use crate::addresses::{PhysicalPage, Size4K};
use bitfield_struct::bitfield;

/// Privilege level a page is accessible from.
///
/// A page is reachable from every level numerically less than or equal to
/// its own; `User` pages are therefore accessible from everywhere.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u8)]
pub enum Privilege {
    Kernel = 0,
    Plv1 = 1,
    Plv2 = 2,
    User = 3,
}

impl Privilege {
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn from_bits(value: u8) -> Self {
        match value & 0b11 {
            0 => Self::Kernel,
            1 => Self::Plv1,
            2 => Self::Plv2,
            _ => Self::User,
        }
    }
}

/// A `LoongArch` page-table leaf entry in its raw bitfield form.
///
/// ### Bit layout
///
/// | Bits  | Name    | Meaning |
/// |-------|---------|---------|
/// | 0     | `V`     | Valid; the entry translates |
/// | 1     | `D`     | Dirty; writes are permitted without a page-modify fault |
/// | 2–3   | `PLV`   | Privilege level |
/// | 4–11  | —       | Reserved, written as zero |
/// | 12–63 | `frame` | Physical frame number |
///
/// The dirty bit doubles as the write permission: copy-on-write pages are
/// mapped valid but clean, so the first store raises a page-modify fault.
///
/// ### Example
/// ```rust
/// # use kernel_vmem::{PageEntryBits, Privilege};
/// # use kernel_vmem::addresses::{PhysicalAddress, PhysicalPage, Size4K};
/// let page = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x0030_2000));
/// let e = PageEntryBits::user_rw().with_page(page);
/// assert_eq!(e.into_bits(), 0x0030_2000 | 0b1111);
/// assert_eq!(e.plv(), Privilege::User);
/// ```
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    /// Valid (V, bit 0).
    pub valid: bool,

    /// Dirty (D, bit 1).
    ///
    /// Clear on a valid entry makes the page read-only: the next store traps
    /// into the write-protect fault handler.
    pub dirty: bool,

    /// Privilege level (PLV, bits 2–3).
    #[bits(2)]
    pub plv: Privilege,

    #[bits(8)]
    __: u8,

    /// Physical frame number (bits 12–63).
    #[bits(52)]
    pub frame: u64,
}

impl PageEntryBits {
    /// Attributes of a private, writable user page: `PLV3 | D | V`.
    #[inline]
    #[must_use]
    pub const fn user_rw() -> Self {
        Self::new()
            .with_valid(true)
            .with_dirty(true)
            .with_plv(Privilege::User)
    }

    /// The same attributes with the dirty bit cleared.
    #[inline]
    #[must_use]
    pub const fn read_only(self) -> Self {
        self.with_dirty(false)
    }

    /// The physical page this entry points at.
    #[inline]
    #[must_use]
    pub const fn page(self) -> PhysicalPage<Size4K> {
        PhysicalPage::from_frame_number(self.frame())
    }

    #[inline]
    #[must_use]
    pub const fn with_page(self, page: PhysicalPage<Size4K>) -> Self {
        self.with_frame(page.frame_number())
    }

    /// Only the attribute bits (low 12 bits) of this entry.
    #[inline]
    #[must_use]
    pub const fn attributes(self) -> Self {
        self.with_frame(0)
    }
}
