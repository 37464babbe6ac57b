//! Generic allocator adapter
//!
//! Lets a region back third-party containers that take an allocation
//! function pair of the shape `(size, context) -> address` and
//! `(address, size, context)`. Memory is max-aligned and not zeroed;
//! exhaustion returns `None`. Freeing only reclaims the most recent block.

use core::ptr::NonNull;

use crate::arena::{AllocFlags, Arena, MAX_ALIGN};

/// Allocate `size` bytes from `arena`, `None` on exhaustion
pub fn malloc(size: usize, arena: &Arena) -> Option<NonNull<u8>> {
    arena.try_alloc(1, MAX_ALIGN, size, AllocFlags::NO_INIT)
}

/// Give `size` bytes at `ptr` back to `arena`
///
/// Only takes effect when the block is the region's most recent allocation.
///
/// # Safety
///
/// `ptr` must come from [`malloc`] on the same region with the same `size`,
/// and must not be used afterwards.
pub unsafe fn free(ptr: NonNull<u8>, size: usize, arena: &Arena) {
    arena.free(ptr, size);
}

/// Allocator handle for containers that keep their context alongside the functions
#[derive(Debug, Clone, Copy)]
pub struct ArenaAllocator<'a> {
    arena: &'a Arena,
}

impl<'a> ArenaAllocator<'a> {
    pub fn new(arena: &'a Arena) -> Self {
        Self { arena }
    }

    #[inline]
    pub fn arena(&self) -> &'a Arena {
        self.arena
    }

    #[inline]
    pub fn malloc(&self, size: usize) -> Option<NonNull<u8>> {
        malloc(size, self.arena)
    }

    /// # Safety
    ///
    /// Same contract as [`free`].
    #[inline]
    pub unsafe fn free(&self, ptr: NonNull<u8>, size: usize) {
        free(ptr, size, self.arena)
    }
}
