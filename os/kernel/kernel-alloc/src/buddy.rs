//! # Buddy Page Allocator
//!
//! Manages one naturally aligned arena of `2^max_order` pages. A block of
//! order `o` spans `2^o` pages and starts at an arena offset that is a
//! multiple of its own size, so the buddy of the block at page offset `i` is
//! simply `i ^ 2^o`.
//!
//! ```text
//!  order 2 │               0               │
//!  order 1 │       0       │       2       │
//!  order 0 │   0   │   1   │   2   │   3   │
//! ```
//!
//! ## Bookkeeping
//!
//! - One intrusive, doubly linked free list per order, threaded through a
//!   page-indexed array of [`BlockSlot`]s. Pushing and unlinking are O(1).
//! - A presence bitmap with bit `o` set iff list `o` is non-empty, so the
//!   search for the smallest fitting order is a single `trailing_zeros`.
//! - A [`PageRefTable`] holding the owner count of every page. A block only
//!   ever enters a free list once all of its pages are back at zero.
//!
//! Allocation pops the lowest available order and pushes the upper half of
//! each split back; freeing folds the block together with its buddy for as
//! long as the [`MergePolicy`] finds the buddy free.

use crate::page_ref::{PageRefError, PageRefTable};
use kernel_info::memory::{ARENA_BASE, MAX_ORDER, PAGE_SIZE};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};
use kernel_vmem::{PhysMapper, zero_frame};
use log::{debug, trace, warn};

/// Upper bound for [`BuddyConfig::max_order`]; orders index a `u32` bitmap.
pub const ORDER_LIMIT: u8 = 31;

const ORDER_SLOTS: usize = ORDER_LIMIT as usize + 1;

/// Smallest order whose blocks hold `size` bytes. A size of 0 is treated
/// like a single byte.
///
/// ```rust
/// # use kernel_alloc::buddy::order_for;
/// assert_eq!(order_for(0), 0);
/// assert_eq!(order_for(1), 0);
/// assert_eq!(order_for(4096), 0);
/// assert_eq!(order_for(4097), 1);
/// assert_eq!(order_for(16 * 1024), 2);
/// ```
#[must_use]
pub const fn order_for(size: usize) -> u8 {
    let pages = if size == 0 {
        1
    } else {
        size.div_ceil(PAGE_SIZE as usize)
    };
    (usize::BITS - (pages - 1).leading_zeros()) as u8
}

/// How [`BuddyAllocator::free`] decides that a buddy may be merged.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum MergePolicy {
    /// Merge only when the buddy is the head of its order's free list.
    ///
    /// Cheaper to reason about but leaves free buddies unmerged whenever the
    /// buddy was pushed before another block of the same order.
    HeadOnly,
    /// Merge whenever the buddy is anywhere on its order's free list.
    #[default]
    FullMembership,
}

/// Free-list membership of the block starting at a page.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum BlockState {
    /// Not the head page of a free block.
    #[default]
    Unlisted,
    /// Head page of a free block on list `order`.
    Listed { order: u8 },
}

/// Per-page free-list node. Only the first page of a free block is
/// [`Listed`](BlockState::Listed); `prev`/`next` are arena page offsets.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BlockSlot {
    state: BlockState,
    prev: Option<u32>,
    next: Option<u32>,
}

impl BlockSlot {
    #[must_use]
    pub const fn state(&self) -> BlockState {
        self.state
    }
}

/// Arena geometry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BuddyConfig {
    /// Physical address of the first arena page.
    pub base: PhysicalAddress,
    /// The arena is one block of this order.
    pub max_order: u8,
    pub merge: MergePolicy,
}

impl BuddyConfig {
    /// The kernel arena: `2^MAX_ORDER` pages from `ARENA_BASE`.
    #[must_use]
    pub const fn kernel() -> Self {
        Self {
            base: ARENA_BASE,
            max_order: MAX_ORDER,
            merge: MergePolicy::FullMembership,
        }
    }

    #[must_use]
    pub const fn with_merge(self, merge: MergePolicy) -> Self {
        Self { merge, ..self }
    }

    /// Pages in the arena; the length required of the slot storage.
    #[must_use]
    pub const fn arena_pages(&self) -> usize {
        1 << self.max_order
    }

    /// First address past the arena.
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.base.as_u64() + ((self.arena_pages() as u64) << 12))
    }

    /// Frames the reference table must cover: everything below [`end`](Self::end).
    #[must_use]
    pub const fn frames_needed(&self) -> usize {
        (self.end().as_u64() >> 12) as usize
    }
}

impl Default for BuddyConfig {
    fn default() -> Self {
        Self::kernel()
    }
}

/// Errors reported by the [`BuddyAllocator`]. None of them leave a partial
/// state change behind.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum BuddyError {
    #[error("out of memory: no free block of order {order} or above")]
    OutOfMemory { order: u8 },
    #[error("order {order} exceeds the maximum order {max}")]
    OrderTooLarge { order: u8, max: u8 },
    #[error("{0} does not belong to the buddy arena")]
    NotInArena(PhysicalAddress),
    #[error("{0} belongs to the buddy arena")]
    InsideArena(PhysicalAddress),
    #[error("{address} is not the start of an order-{order} block")]
    Misaligned { address: PhysicalAddress, order: u8 },
    #[error("{needed} storage entries required, {provided} provided")]
    StorageTooSmall { needed: usize, provided: usize },
    #[error("invalid arena configuration: {0}")]
    InvalidConfig(&'static str),
    #[error(transparent)]
    Ref(#[from] PageRefError),
}

/// Result of a successful [`BuddyAllocator::free`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FreeOutcome {
    /// The block (possibly merged) is back on the free list of `order`.
    Released { order: u8 },
    /// Some page of the block still has owners; nothing was listed.
    StillReferenced,
}

/// Buddy-system page allocator over caller-provided storage.
///
/// The constructor is the initialisation: an allocator exists only in its
/// initialised state. All mutation goes through `&mut self`; see
/// [`SharedFrameAlloc`](crate::SharedFrameAlloc) for use from several cores.
pub struct BuddyAllocator<'m, M: PhysMapper> {
    config: BuddyConfig,
    mapper: &'m M,
    heads: [Option<u32>; ORDER_SLOTS],
    presence: u32,
    slots: &'m mut [BlockSlot],
    refs: PageRefTable<'m>,
}

impl<'m, M: PhysMapper> BuddyAllocator<'m, M> {
    /// Build an allocator whose only free block is the whole arena.
    ///
    /// `slots` needs [`BuddyConfig::arena_pages`] entries and `counts`
    /// [`BuddyConfig::frames_needed`]; both are cleared.
    ///
    /// # Errors
    /// [`BuddyError::InvalidConfig`] or [`BuddyError::StorageTooSmall`].
    pub fn init(
        config: BuddyConfig,
        mapper: &'m M,
        slots: &'m mut [BlockSlot],
        counts: &'m mut [u8],
    ) -> Result<Self, BuddyError> {
        if config.max_order > ORDER_LIMIT {
            return Err(BuddyError::InvalidConfig("max_order above 31"));
        }
        if !config.base.is_aligned_to(PAGE_SIZE) {
            return Err(BuddyError::InvalidConfig("arena base not page aligned"));
        }
        if slots.len() < config.arena_pages() {
            return Err(BuddyError::StorageTooSmall {
                needed: config.arena_pages(),
                provided: slots.len(),
            });
        }
        if counts.len() < config.frames_needed() {
            return Err(BuddyError::StorageTooSmall {
                needed: config.frames_needed(),
                provided: counts.len(),
            });
        }

        slots.fill(BlockSlot::default());
        let mut this = Self {
            config,
            mapper,
            heads: [None; ORDER_SLOTS],
            presence: 0,
            slots,
            refs: PageRefTable::new(counts),
        };
        this.push(0, config.max_order);
        debug!(
            "buddy arena {}..{}: one order-{} block, {:?} merging",
            config.base,
            config.end(),
            config.max_order,
            config.merge
        );
        Ok(this)
    }

    #[must_use]
    pub const fn config(&self) -> &BuddyConfig {
        &self.config
    }

    /// The owner counts of all physical pages.
    #[must_use]
    pub const fn refs(&self) -> &PageRefTable<'m> {
        &self.refs
    }

    /// Bit `o` is set iff a free block of order `o` exists.
    #[must_use]
    pub const fn presence_bitmap(&self) -> u32 {
        self.presence
    }

    fn page_of(&self, index: u32) -> PhysicalPage<Size4K> {
        PhysicalPage::from_addr(self.config.base + (u64::from(index) << 12))
    }

    fn index_of(&self, address: PhysicalAddress) -> Result<u32, BuddyError> {
        let offset = address
            .as_u64()
            .checked_sub(self.config.base.as_u64())
            .filter(|&off| off < self.config.end().as_u64() - self.config.base.as_u64())
            .ok_or(BuddyError::NotInArena(address))?;
        if offset % PAGE_SIZE != 0 {
            return Err(BuddyError::Misaligned { address, order: 0 });
        }
        Ok((offset >> 12) as u32)
    }

    fn push(&mut self, index: u32, order: u8) {
        let old = self.heads[order as usize];
        self.slots[index as usize] = BlockSlot {
            state: BlockState::Listed { order },
            prev: None,
            next: old,
        };
        if let Some(old) = old {
            self.slots[old as usize].prev = Some(index);
        }
        self.heads[order as usize] = Some(index);
        self.presence |= 1 << order;
    }

    fn unlink(&mut self, index: u32, order: u8) {
        let BlockSlot { prev, next, .. } = self.slots[index as usize];
        match prev {
            Some(prev) => self.slots[prev as usize].next = next,
            None => self.heads[order as usize] = next,
        }
        if let Some(next) = next {
            self.slots[next as usize].prev = prev;
        }
        self.slots[index as usize] = BlockSlot::default();
        if self.heads[order as usize].is_none() {
            self.presence &= !(1 << order);
        }
    }

    fn pop(&mut self, order: u8) -> Option<u32> {
        let head = self.heads[order as usize]?;
        self.unlink(head, order);
        Some(head)
    }

    fn buddy_is_free(&self, buddy: u32, order: u8) -> bool {
        match self.config.merge {
            MergePolicy::HeadOnly => self.heads[order as usize] == Some(buddy),
            MergePolicy::FullMembership => {
                self.slots[buddy as usize].state == BlockState::Listed { order }
            }
        }
    }

    /// Lowest order `>= order` with a free block.
    fn lowest_available(&self, order: u8) -> Option<u8> {
        if order > self.config.max_order {
            return None;
        }
        let candidates = self.presence & (u32::MAX << order);
        (candidates != 0).then(|| candidates.trailing_zeros() as u8)
    }

    /// Allocate a zero-filled block of at least `size` bytes.
    ///
    /// Every page of the block gets an owner count of 1.
    ///
    /// # Errors
    /// [`BuddyError::OutOfMemory`] when no block of a fitting order is free,
    /// including every request larger than the arena. Nothing changes.
    pub fn allocate(&mut self, size: usize) -> Result<PhysicalPage<Size4K>, BuddyError> {
        let order = order_for(size);
        let Some((found, index)) = self
            .lowest_available(order)
            .and_then(|found| self.pop(found).map(|index| (found, index)))
        else {
            warn!("out of memory: {size} bytes (order {order})");
            return Err(BuddyError::OutOfMemory { order });
        };

        let mut current = found;
        while current > order {
            current -= 1;
            let upper = index + (1 << current);
            self.push(upper, current);
            debug!(
                "split order-{} block {}: upper half {} listed",
                current + 1,
                self.page_of(index),
                self.page_of(upper)
            );
        }

        let first = self.page_of(index);
        for n in 0..(1_u64 << order) {
            let page = first.add_pages(n);
            self.refs.claim(page)?;
            zero_frame(self.mapper, page);
        }
        trace!("allocate {size} bytes: order {order} at {first}");
        Ok(first)
    }

    /// Drop one reference from every page of the order-`order_for(size)`
    /// block at `address`, and return the block to the free lists once all of
    /// them reach zero.
    ///
    /// # Errors
    /// - [`BuddyError::OrderTooLarge`] when `size` exceeds the arena order.
    /// - [`BuddyError::NotInArena`] / [`BuddyError::Misaligned`] for addresses
    ///   that cannot start a block of that order.
    /// - [`PageRefError::DoubleFree`] (as [`BuddyError::Ref`]) when any page is
    ///   already free.
    ///
    /// Nothing changes on error.
    pub fn free(&mut self, address: PhysicalAddress, size: usize) -> Result<FreeOutcome, BuddyError> {
        let order = order_for(size);
        if order > self.config.max_order {
            warn!("rejected free of {address}: order {order} too large");
            return Err(BuddyError::OrderTooLarge {
                order,
                max: self.config.max_order,
            });
        }
        let mut index = self.index_of(address)?;
        if index & ((1 << order) - 1) != 0 {
            warn!("rejected free of {address}: not an order-{order} block");
            return Err(BuddyError::Misaligned { address, order });
        }

        let first = self.page_of(index);
        match self.refs.release(first, 1 << order) {
            Ok(true) => {}
            Ok(false) => {
                trace!("free {first} (order {order}): still referenced");
                return Ok(FreeOutcome::StillReferenced);
            }
            Err(e) => {
                warn!("rejected free of {address}: {e}");
                return Err(e.into());
            }
        }

        let mut order = order;
        while order < self.config.max_order {
            let buddy = index ^ (1 << order);
            if !self.buddy_is_free(buddy, order) {
                break;
            }
            self.unlink(buddy, order);
            index = index.min(buddy);
            order += 1;
            debug!("merge into order-{order} block at {}", self.page_of(index));
        }
        self.push(index, order);
        trace!("free {first}: listed as order {order} at {}", self.page_of(index));
        Ok(FreeOutcome::Released { order })
    }

    /// Add an owner to an allocated page; returns the new count.
    ///
    /// # Errors
    /// [`PageRefError::SharedFree`] or [`PageRefError::ShareOverflow`].
    pub fn share(&mut self, page: PhysicalPage<Size4K>) -> Result<u8, BuddyError> {
        let count = self.refs.share(page)?;
        trace!("share {page}: {count} owners");
        Ok(count)
    }

    #[must_use]
    pub fn share_count(&self, page: PhysicalPage<Size4K>) -> u8 {
        self.refs.count(page)
    }

    /// Mark pages outside the arena (e.g. the kernel image) as owned.
    ///
    /// # Errors
    /// [`BuddyError::InsideArena`] when the range overlaps the arena;
    /// [`PageRefError::OutOfRange`] when it leaves physical memory.
    pub fn reserve(&mut self, first: PhysicalPage<Size4K>, pages: u64) -> Result<(), BuddyError> {
        let start = first.base().as_u64();
        let end = start + (pages << 12);
        if start < self.config.end().as_u64() && self.config.base.as_u64() < end {
            return Err(BuddyError::InsideArena(first.base()));
        }
        self.refs.reserve(first, pages)?;
        debug!("reserved {pages} pages from {first}");
        Ok(())
    }

    /// The free blocks of `order`, most recently freed first.
    pub fn free_blocks(&self, order: u8) -> impl Iterator<Item = PhysicalPage<Size4K>> + '_ {
        let mut cursor = self.heads.get(order as usize).copied().flatten();
        core::iter::from_fn(move || {
            let index = cursor?;
            cursor = self.slots[index as usize].next;
            Some(self.page_of(index))
        })
    }

    /// Pages on all free lists.
    #[must_use]
    pub fn free_pages(&self) -> usize {
        (0..=self.config.max_order)
            .map(|order| self.free_blocks(order).count() << order)
            .sum()
    }

    /// Retire the allocator, reporting how many arena pages are still out.
    pub fn shutdown(self) -> usize {
        let outstanding = self.config.arena_pages() - self.free_pages();
        if outstanding == 0 {
            debug!("buddy arena {} retired clean", self.config.base);
        } else {
            warn!(
                "buddy arena {} retired with {outstanding} pages outstanding",
                self.config.base
            );
        }
        outstanding
    }
}
