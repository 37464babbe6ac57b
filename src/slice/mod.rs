//! Growable buffers living in a region
//!
//! Design: `{data, len, cap}` triple that delegates growth to the region:
//! 1. `cap == 0` - migrate from wherever the data lives (possibly outside any region)
//! 2. buffer ends at the region tip - extend in place, no copy
//! 3. otherwise - relocate with 1.5x capacity
//!
//! Elements are `Copy` and never dropped, like everything else in a region.


use core::fmt;
use core::marker::PhantomData;
use core::mem::{align_of, size_of};
use core::ops::Deref;
use core::ptr::{self, NonNull};

use crate::arena::{AllocFlags, Arena};
use crate::error::AllocResult;

/// Growable buffer of `T` backed by a region
///
/// Not `Clone`: two buffers sharing spare capacity would hand out the same
/// slots. Use [`Slice::clone_in`] for an independent copy.
pub struct Slice<'a, T> {
    data: NonNull<T>,
    len: usize,
    cap: usize,
    _marker: PhantomData<&'a [T]>,
}

impl<'a, T: Copy> Slice<'a, T> {
    /// Empty buffer with no storage
    pub const fn new() -> Self {
        Self {
            data: NonNull::dangling(),
            len: 0,
            cap: 0,
            _marker: PhantomData,
        }
    }

    /// Read-only view of foreign data, copied into a region on first growth
    pub fn from_foreign(items: &'a [T]) -> Self {
        Self {
            data: NonNull::from(items).cast::<T>(),
            len: items.len(),
            cap: 0,
            _marker: PhantomData,
        }
    }

    /// Empty buffer with room for `cap` elements
    pub fn with_capacity(arena: &'a Arena, cap: usize) -> AllocResult<Self> {
        if cap == 0 {
            return Ok(Self::new());
        }
        let data = arena.alloc(size_of::<T>(), align_of::<T>(), cap, AllocFlags::NO_INIT)?;
        Ok(Self {
            data: data.cast::<T>(),
            len: 0,
            cap,
            _marker: PhantomData,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Whether the elements still live outside of any region
    #[inline]
    pub fn is_foreign(&self) -> bool {
        self.cap == 0 && self.len > 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: data points to len initialized elements (dangling only when len == 0)
        unsafe { core::slice::from_raw_parts(self.data.as_ptr(), self.len) }
    }

    /// Mutable access; foreign buffers must be migrated first
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        assert!(!self.is_foreign(), "foreign slice must be made owned before mutation");
        // SAFETY: region-owned storage, uniquely referenced by this buffer
        unsafe { core::slice::from_raw_parts_mut(self.data.as_ptr(), self.len) }
    }

    /// Append `value`, growing through `arena` if full, and return its slot
    pub fn push(&mut self, arena: &'a Arena, value: T) -> AllocResult<&mut T> {
        if self.len >= self.cap {
            self.grow(arena)?;
        }

        // SAFETY: len < cap after growth, slot lies in region-owned storage
        unsafe {
            let slot = self.data.as_ptr().add(self.len);
            slot.write(value);
            self.len += 1;
            Ok(&mut *slot)
        }
    }

    pub fn extend_from_slice(&mut self, arena: &'a Arena, items: &[T]) -> AllocResult<()> {
        for &item in items {
            self.push(arena, item)?;
        }
        Ok(())
    }

    /// Copy foreign data into `arena` so the buffer can be mutated
    pub fn make_owned(&mut self, arena: &'a Arena) -> AllocResult<()> {
        if self.is_foreign() {
            self.grow(arena)?;
        }
        Ok(())
    }

    /// Independent copy of `len` elements starting at `start`
    ///
    /// The copy's capacity equals its length, so its first push relocates.
    pub fn clone_subrange(&self, arena: &'a Arena, start: usize, len: usize) -> AllocResult<Slice<'a, T>> {
        let end = start.checked_add(len);
        assert!(
            end.map_or(false, |end| end <= self.len),
            "invalid slice range {}..{}+{} for length {}",
            start,
            start,
            len,
            self.len
        );

        if len == 0 {
            return Ok(Self::new());
        }

        // SAFETY: start + len <= self.len, so the source is initialized
        let data = unsafe {
            arena.alloc_from(
                size_of::<T>(),
                align_of::<T>(),
                len,
                self.data.as_ptr().add(start).cast::<u8>(),
            )?
        };

        Ok(Slice {
            data: data.cast::<T>(),
            len,
            cap: len,
            _marker: PhantomData,
        })
    }

    pub fn clone_in(&self, arena: &'a Arena) -> AllocResult<Slice<'a, T>> {
        self.clone_subrange(arena, 0, self.len)
    }

    /// Whether the buffer's storage ends exactly at the region tip
    #[inline]
    fn ends_at_tip(&self, arena: &Arena) -> bool {
        // SAFETY: one past the end of our storage
        let end = unsafe { self.data.as_ptr().add(self.cap) };
        arena.is_tip(end.cast::<u8>())
    }

    #[cold]
    fn grow(&mut self, arena: &'a Arena) -> AllocResult<()> {
        let size = size_of::<T>();
        let align = align_of::<T>();
        let growth = arena.slice_growth();

        if size == 0 {
            self.cap = usize::MAX;
            return Ok(());
        }

        if self.cap == 0 {
            // Migrate from foreign (or no) storage
            let cap = self.len + growth;
            let data = arena.alloc(size, align, cap, AllocFlags::NO_INIT)?.cast::<T>();
            if self.len > 0 {
                // SAFETY: source holds len elements; the fresh block cannot overlap it
                unsafe { ptr::copy_nonoverlapping(self.data.as_ptr(), data.as_ptr(), self.len) };
            }
            self.data = data;
            self.cap = cap;
        } else if self.ends_at_tip(arena) {
            // Extend in place
            let extra = arena.alloc(size, align, growth, AllocFlags::NO_INIT)?;
            debug_assert_eq!(
                extra.as_ptr() as usize,
                self.data.as_ptr() as usize + self.cap * size,
                "in-place growth must be contiguous"
            );
            self.cap += growth;
        } else {
            let cap = self.cap + (self.cap / 2).max(growth);
            let data = arena.alloc(size, align, cap, AllocFlags::NO_INIT)?.cast::<T>();
            // SAFETY: old storage holds len elements and precedes the new block
            unsafe { ptr::copy_nonoverlapping(self.data.as_ptr(), data.as_ptr(), self.len) };
            self.data = data;
            self.cap = cap;
        }

        Ok(())
    }
}

impl<T: Copy> Default for Slice<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> Deref for Slice<'_, T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Copy + fmt::Debug> fmt::Debug for Slice<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<'s, T: Copy> IntoIterator for &'s Slice<'_, T> {
    type Item = &'s T;
    type IntoIter = core::slice::Iter<'s, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}
