use crate::{Csr, CsrRegister};
use bitfield_struct::bitfield;

/// DMW0..DMW3 — Direct Mapping configuration Window.
///
/// A window translates every virtual address whose top four bits equal
/// `vseg` to the physical address in the remaining bits, bypassing the page
/// tables. Each `plvN` bit permits use of the window at that privilege level.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct Dmw {
    /// Bit 0 — window usable at PLV0 (kernel).
    pub plv0: bool,
    /// Bit 1 — window usable at PLV1.
    pub plv1: bool,
    /// Bit 2 — window usable at PLV2.
    pub plv2: bool,
    /// Bit 3 — window usable at PLV3 (user).
    pub plv3: bool,

    /// Bits 4–5 — memory access type of accesses through the window.
    #[bits(2)]
    pub mat: u8,

    #[bits(54)]
    __: u64,

    /// Bits 60–63 — virtual segment selected by this window.
    #[bits(4)]
    pub vseg: u8,
}

impl Dmw {
    /// A kernel-only window for the segment whose base is `segment_mask`
    /// (only the top four bits are used).
    #[must_use]
    pub const fn kernel_window(segment_mask: u64) -> Self {
        Self::new()
            .with_plv0(true)
            .with_vseg((segment_mask >> 60) as u8)
    }

    /// A window that translates nothing.
    #[must_use]
    pub const fn disabled() -> Self {
        Self::new()
    }
}

impl CsrRegister for Dmw {
    const CSR: Csr = Csr::Dmw0;

    #[inline]
    fn from_raw(raw: u64) -> Self {
        Self::from_bits(raw)
    }

    #[inline]
    fn into_raw(self) -> u64 {
        self.into_bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_info::memory::DMW_MASK;

    #[test]
    fn kernel_window_is_plv0_or_mask() {
        let dmw = Dmw::kernel_window(DMW_MASK);
        assert_eq!(dmw.into_bits(), DMW_MASK | 1);
        assert!(dmw.plv0());
        assert!(!dmw.plv3());
        assert_eq!(dmw.vseg(), 0x9);
    }

    #[test]
    fn disabled_window_is_zero() {
        assert_eq!(Dmw::disabled().into_bits(), 0);
    }
}
