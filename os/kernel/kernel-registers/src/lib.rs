//! # Typed `LoongArch` Control and Status Registers
//!
//! The memory core touches a handful of CSRs: the bad virtual address latched
//! by a page fault ([`Badv`]), the page-walk layout ([`Pwcl`]), the
//! direct-mapping windows ([`Dmw`]), and the TLB invalidation primitive.
//!
//! All access goes through the [`ControlRegisters`] trait so the same code runs
//! against real hardware ([`LoongArchCsr`], feature `asm`) or against an
//! in-memory register file ([`ShadowRegisters`]).
//!
//! ```rust
//! use kernel_registers::{Badv, ControlRegisters, Csr, ShadowRegisters};
//!
//! let regs = ShadowRegisters::new();
//! regs.write_csr(Csr::Badv, 0x1234_5678);
//! assert_eq!(regs.load::<Badv>().address().as_u64(), 0x1234_5678);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod badv;
mod dmw;
#[cfg(all(feature = "asm", target_arch = "loongarch64"))]
mod loongarch;
mod pwcl;
mod shadow;

pub use crate::badv::Badv;
pub use crate::dmw::Dmw;
#[cfg(all(feature = "asm", target_arch = "loongarch64"))]
pub use crate::loongarch::LoongArchCsr;
pub use crate::pwcl::Pwcl;
pub use crate::shadow::ShadowRegisters;

/// CSR numbers used by the memory core.
#[repr(u16)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Csr {
    /// Bad virtual address of the last address-related exception.
    Badv = 0x7,
    /// Page-walk controller, lower half.
    Pwcl = 0x1c,
    /// Direct-mapping configuration windows.
    Dmw0 = 0x180,
    Dmw1 = 0x181,
    Dmw2 = 0x182,
    Dmw3 = 0x183,
}

impl Csr {
    /// Every CSR known to this crate.
    pub const ALL: [Self; 6] = [
        Self::Badv,
        Self::Pwcl,
        Self::Dmw0,
        Self::Dmw1,
        Self::Dmw2,
        Self::Dmw3,
    ];

    #[inline]
    #[must_use]
    pub const fn number(self) -> u16 {
        self as u16
    }
}

/// A typed image of a CSR value.
pub trait CsrRegister: Sized {
    /// The register this image is loaded from by [`ControlRegisters::load`].
    const CSR: Csr;

    fn from_raw(raw: u64) -> Self;
    fn into_raw(self) -> u64;
}

/// Access to the control and status registers of the executing core.
///
/// Implementations perform privileged operations; they must only be used by
/// code running at PLV0.
pub trait ControlRegisters {
    fn read_csr(&self, csr: Csr) -> u64;

    fn write_csr(&self, csr: Csr, value: u64);

    /// Drop every cached translation of this core.
    ///
    /// Required after any page-table mutation that may already be cached.
    fn invalidate_tlb(&self);

    /// Read `R` from its home register.
    #[inline]
    fn load<R: CsrRegister>(&self) -> R {
        R::from_raw(self.read_csr(R::CSR))
    }

    /// Write `value` to its home register.
    #[inline]
    fn store<R: CsrRegister>(&self, value: R) {
        self.write_csr(R::CSR, value.into_raw());
    }

    /// Write `value` to an explicit register, e.g. one of the four DMW slots.
    #[inline]
    fn store_to<R: CsrRegister>(&self, csr: Csr, value: R) {
        self.write_csr(csr, value.into_raw());
    }
}

impl<T: ControlRegisters + ?Sized> ControlRegisters for &T {
    #[inline]
    fn read_csr(&self, csr: Csr) -> u64 {
        (**self).read_csr(csr)
    }

    #[inline]
    fn write_csr(&self, csr: Csr, value: u64) {
        (**self).write_csr(csr, value);
    }

    #[inline]
    fn invalidate_tlb(&self) {
        (**self).invalidate_tlb();
    }
}
