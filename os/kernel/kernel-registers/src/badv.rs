use crate::{Csr, CsrRegister};
use kernel_memory_addresses::VirtualAddress;

/// BADV — Bad Virtual Address.
///
/// Latched by the hardware on page-invalid, page-modify and address-error
/// exceptions; the fault handlers read it to learn which page to resolve.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Badv(VirtualAddress);

impl Badv {
    #[inline]
    #[must_use]
    pub const fn new(address: VirtualAddress) -> Self {
        Self(address)
    }

    /// The faulting virtual address.
    #[inline]
    #[must_use]
    pub const fn address(self) -> VirtualAddress {
        self.0
    }
}

impl CsrRegister for Badv {
    const CSR: Csr = Csr::Badv;

    #[inline]
    fn from_raw(raw: u64) -> Self {
        Self(VirtualAddress::new(raw))
    }

    #[inline]
    fn into_raw(self) -> u64 {
        self.0.as_u64()
    }
}
