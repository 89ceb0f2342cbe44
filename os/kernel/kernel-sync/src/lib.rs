//! # Kernel synchronization primitives
//!
//! The memory core only needs one: a test-and-test-and-set [`SpinLock`]
//! serializing every mutation of the physical frame allocator.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod spin_lock;

pub use spin_lock::{SpinLock, SpinLockGuard};
