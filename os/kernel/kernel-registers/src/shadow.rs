use crate::{ControlRegisters, Csr};
use core::cell::Cell;

/// An in-memory register file.
///
/// Stands in for the CSRs when the memory core runs on a development host and
/// lets tests inject a faulting address or check what initialization wrote.
/// TLB invalidations are counted rather than performed.
#[derive(Debug, Default)]
pub struct ShadowRegisters {
    values: [Cell<u64>; Csr::ALL.len()],
    tlb_flushes: Cell<usize>,
}

impl ShadowRegisters {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            values: [const { Cell::new(0) }; Csr::ALL.len()],
            tlb_flushes: Cell::new(0),
        }
    }

    /// Number of [`ControlRegisters::invalidate_tlb`] calls so far.
    #[must_use]
    pub fn tlb_flushes(&self) -> usize {
        self.tlb_flushes.get()
    }

    const fn slot(csr: Csr) -> usize {
        match csr {
            Csr::Badv => 0,
            Csr::Pwcl => 1,
            Csr::Dmw0 => 2,
            Csr::Dmw1 => 3,
            Csr::Dmw2 => 4,
            Csr::Dmw3 => 5,
        }
    }
}

impl ControlRegisters for ShadowRegisters {
    fn read_csr(&self, csr: Csr) -> u64 {
        self.values[Self::slot(csr)].get()
    }

    fn write_csr(&self, csr: Csr, value: u64) {
        self.values[Self::slot(csr)].set(value);
    }

    fn invalidate_tlb(&self) {
        self.tlb_flushes.set(self.tlb_flushes.get() + 1);
    }
}
