use core::fmt;
use core::hash::Hash;

mod sealed {
    pub trait Sealed {}
}

/// Granularity marker for [`PhysicalPage`](crate::PhysicalPage) and
/// [`VirtualPage`](crate::VirtualPage). Only the sizes the two-level tables
/// translate exist.
pub trait PageSize:
    sealed::Sealed + Clone + Copy + Eq + PartialEq + Ord + PartialOrd + Hash + fmt::Debug
{
    /// Page size in bytes.
    const SIZE: u64 = 1 << Self::SHIFT;
    /// Offset bits within a page.
    const SHIFT: u32;
    /// Short name for diagnostics.
    const NAME: &'static str;
}

macro_rules! page_size {
    ($(#[$doc:meta])* $name:ident, $shift:expr, $label:literal) => {
        $(#[$doc])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $name;

        impl sealed::Sealed for $name {}

        impl PageSize for $name {
            const SHIFT: u32 = $shift;
            const NAME: &'static str = $label;
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(Self::NAME)
            }
        }
    };
}

page_size!(
    /// 4 KiB leaf page; the allocation unit of the buddy allocator.
    Size4K,
    12,
    "4K"
);

page_size!(
    /// 2 MiB span translated by one page-directory entry (512 leaves).
    Size2M,
    21,
    "2M"
);
