use crate::{ControlRegisters, Csr};
use core::arch::asm;

/// The CSRs of the executing `LoongArch` core.
///
/// `csrrd`/`csrwr` encode the register number as an immediate, so every
/// [`Csr`] gets its own instruction.
#[derive(Copy, Clone, Debug, Default)]
pub struct LoongArchCsr;

macro_rules! csr_read {
    ($num:literal) => {{
        let value: u64;
        // SAFETY: reading a CSR has no side effects on the registers used here.
        unsafe {
            asm!(concat!("csrrd {0}, ", $num), out(reg) value, options(nomem, nostack, preserves_flags));
        }
        value
    }};
}

macro_rules! csr_write {
    ($num:literal, $value:expr) => {{
        let mut value: u64 = $value;
        // SAFETY: the caller runs at PLV0; `csrwr` swaps the old value into `value`.
        unsafe {
            asm!(concat!("csrwr {0}, ", $num), inout(reg) value, options(nostack, preserves_flags));
        }
        let _ = value;
    }};
}

impl ControlRegisters for LoongArchCsr {
    #[inline]
    fn read_csr(&self, csr: Csr) -> u64 {
        match csr {
            Csr::Badv => csr_read!("0x7"),
            Csr::Pwcl => csr_read!("0x1c"),
            Csr::Dmw0 => csr_read!("0x180"),
            Csr::Dmw1 => csr_read!("0x181"),
            Csr::Dmw2 => csr_read!("0x182"),
            Csr::Dmw3 => csr_read!("0x183"),
        }
    }

    #[inline]
    fn write_csr(&self, csr: Csr, value: u64) {
        match csr {
            Csr::Badv => csr_write!("0x7", value),
            Csr::Pwcl => csr_write!("0x1c", value),
            Csr::Dmw0 => csr_write!("0x180", value),
            Csr::Dmw1 => csr_write!("0x181", value),
            Csr::Dmw2 => csr_write!("0x182", value),
            Csr::Dmw3 => csr_write!("0x183", value),
        }
    }

    #[inline]
    fn invalidate_tlb(&self) {
        // SAFETY: op 0 drops every TLB entry; the page tables stay authoritative.
        unsafe {
            asm!("invtlb 0x0, $zero, $zero", options(nostack, preserves_flags));
        }
    }
}
