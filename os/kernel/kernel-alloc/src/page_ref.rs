//! # Page Reference Table
//!
//! One byte per physical frame, indexed by frame number:
//!
//! | Count | Meaning |
//! |-------|---------|
//! | 0     | free, or never handed out |
//! | 1     | owned by exactly one mapping or allocation |
//! | n ≥ 2 | shared by `n` mappings (copy-on-write or shared memory) |
//!
//! The table covers all of physical memory, not just the buddy arena, so
//! pages outside the arena (the kernel image) can be marked owned as well.

use kernel_memory_addresses::{PhysicalPage, Size4K};

type Page = PhysicalPage<Size4K>;

/// Rejected reference-count transitions. None of them mutate the table.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum PageRefError {
    #[error("page {0} is free and cannot be shared")]
    SharedFree(Page),
    #[error("page {0} released more often than referenced")]
    DoubleFree(Page),
    #[error("page {0} has too many references")]
    ShareOverflow(Page),
    #[error("page {0} lies outside physical memory")]
    OutOfRange(Page),
}

/// Reference counters over caller-provided storage.
pub struct PageRefTable<'m> {
    counts: &'m mut [u8],
}

impl<'m> PageRefTable<'m> {
    /// Take over `counts` (one byte per frame) and mark every frame free.
    pub fn new(counts: &'m mut [u8]) -> Self {
        counts.fill(0);
        Self { counts }
    }

    /// Number of frames covered.
    #[must_use]
    pub const fn frames(&self) -> usize {
        self.counts.len()
    }

    fn slot(&self, page: Page) -> Result<usize, PageRefError> {
        let pfn = usize::try_from(page.frame_number()).map_err(|_| PageRefError::OutOfRange(page))?;
        if pfn < self.counts.len() {
            Ok(pfn)
        } else {
            Err(PageRefError::OutOfRange(page))
        }
    }

    /// References on `page`; frames outside the table count as free.
    #[must_use]
    pub fn count(&self, page: Page) -> u8 {
        self.slot(page).map_or(0, |i| self.counts[i])
    }

    #[must_use]
    pub fn is_free(&self, page: Page) -> bool {
        self.count(page) == 0
    }

    /// Give a free frame its first reference.
    pub(crate) fn claim(&mut self, page: Page) -> Result<(), PageRefError> {
        let i = self.slot(page)?;
        debug_assert_eq!(self.counts[i], 0, "claiming owned page {page}");
        self.counts[i] = 1;
        Ok(())
    }

    /// Add a reference to an owned frame; returns the new count.
    ///
    /// # Errors
    /// - [`PageRefError::SharedFree`] when the frame is free.
    /// - [`PageRefError::ShareOverflow`] when the counter is saturated.
    pub fn share(&mut self, page: Page) -> Result<u8, PageRefError> {
        let i = self.slot(page)?;
        match self.counts[i] {
            0 => Err(PageRefError::SharedFree(page)),
            u8::MAX => Err(PageRefError::ShareOverflow(page)),
            n => {
                self.counts[i] = n + 1;
                Ok(n + 1)
            }
        }
    }

    /// Check that every page in `first..first + pages` can lose a reference.
    pub(crate) fn check_release(&self, first: Page, pages: u64) -> Result<(), PageRefError> {
        for n in 0..pages {
            let page = first.add_pages(n);
            if self.counts[self.slot(page)?] == 0 {
                return Err(PageRefError::DoubleFree(page));
            }
        }
        Ok(())
    }

    /// Drop one reference from every page in `first..first + pages`.
    ///
    /// Returns `true` when every one of them is now free. Nothing changes on
    /// error.
    pub(crate) fn release(&mut self, first: Page, pages: u64) -> Result<bool, PageRefError> {
        self.check_release(first, pages)?;
        let mut all_free = true;
        for n in 0..pages {
            let i = self.slot(first.add_pages(n))?;
            self.counts[i] -= 1;
            all_free &= self.counts[i] == 0;
        }
        Ok(all_free)
    }

    /// Mark `pages` frames from `first` as owned outside any allocator.
    ///
    /// # Errors
    /// [`PageRefError::OutOfRange`] when the range leaves the table; nothing
    /// changes in that case.
    pub fn reserve(&mut self, first: Page, pages: u64) -> Result<(), PageRefError> {
        if pages > 0 {
            self.slot(first.add_pages(pages - 1))?;
        }
        for n in 0..pages {
            let i = self.slot(first.add_pages(n))?;
            self.counts[i] = self.counts[i].max(1);
        }
        Ok(())
    }

    /// Frames with at least one reference.
    #[must_use]
    pub fn owned_frames(&self) -> usize {
        self.counts.iter().filter(|&&c| c != 0).count()
    }
}
