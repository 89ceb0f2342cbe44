use crate::{Csr, CsrRegister};
use bitfield_struct::bitfield;
use kernel_info::memory::{
    PWCL_DIR_BASE, PWCL_DIR_WIDTH, PWCL_ENTRY_WIDTH, PWCL_PT_BASE, PWCL_PT_WIDTH,
};

/// PWCL: Page Walk Controller, lower half.
///
/// Tells the hardware walker where each index field sits in a virtual
/// address. Only the leaf table and the first directory level are used by the
/// two-level layout; `dir2` stays zero.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct Pwcl {
    /// Bits 0–4: start bit of the leaf table index.
    #[bits(5)]
    pub pt_base: u8,

    /// Bits 5–9: width of the leaf table index.
    #[bits(5)]
    pub pt_width: u8,

    /// Bits 10–14: start bit of the first directory index.
    #[bits(5)]
    pub dir1_base: u8,

    /// Bits 15–19: width of the first directory index.
    #[bits(5)]
    pub dir1_width: u8,

    /// Bits 20–24: start bit of the second directory index.
    #[bits(5)]
    pub dir2_base: u8,

    /// Bits 25–29: width of the second directory index.
    #[bits(5)]
    pub dir2_width: u8,

    /// Bits 30–31: entry width; 0 selects 64-bit entries.
    #[bits(2)]
    pub pte_width: u8,

    #[bits(32)]
    __: u32,
}

impl Pwcl {
    /// The directory + table layout used for every user address space.
    #[must_use]
    pub const fn two_level() -> Self {
        Self::new()
            .with_pt_base(PWCL_PT_BASE)
            .with_pt_width(PWCL_PT_WIDTH)
            .with_dir1_base(PWCL_DIR_BASE)
            .with_dir1_width(PWCL_DIR_WIDTH)
            .with_pte_width(PWCL_ENTRY_WIDTH)
    }
}

impl CsrRegister for Pwcl {
    const CSR: Csr = Csr::Pwcl;

    #[inline]
    fn from_raw(raw: u64) -> Self {
        Self::from_bits(raw)
    }

    #[inline]
    fn into_raw(self) -> u64 {
        self.into_bits()
    }
}
