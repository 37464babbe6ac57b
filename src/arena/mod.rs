//! Region allocator - bump allocation over one contiguous range
//!
//! Design: Three layers, cheapest first:
//! 1. Bump allocation (fast path, one compare and one add)
//! 2. Commit-on-demand growth (slow path, virtual memory backing only)
//! 3. OOM policy (abort, or hand an error to the enclosing recovery scope)
//!
//! Every view handed out by a region borrows it, so `reset` and `restore`,
//! which take `&mut self`, can only run once all views are gone. Scratch scopes
//! hand out a child region over the same memory that cannot outlive the scope.

mod flags;
mod poison;
mod vm;


pub use flags::{AllocFlags, OomPolicy};
pub use poison::POISON_BYTE;
pub use vm::page_size;

use core::cell::Cell;
use core::fmt;
use core::mem::{align_of, size_of};
use core::ops::Deref;
use core::ptr::{self, NonNull};
use std::alloc::{alloc, dealloc, Layout};

use bytemuck::Zeroable;

use crate::config::{ArenaConfig, BackingKind};
use crate::error::{AllocError, AllocResult, InitError};
use crate::logging;
use vm::VirtualMemory;

/// Pages committed per growth step unless configured otherwise
pub const DEFAULT_COMMIT_PAGE_COUNT: usize = 1024;

/// Reservation size as a multiple of the commit chunk
pub const RESERVE_FACTOR: usize = 1024;

/// Elements added to a slice per growth step unless configured otherwise
pub const DEFAULT_SLICE_GROWTH: usize = 10;

/// Alignment used by the generic allocator adapter and for owned heap buffers
pub const MAX_ALIGN: usize = 16;

/// Who owns the bytes behind a region
enum Backing {
    /// Zero-sized region, every non-empty allocation fails
    Empty,
    /// Buffer allocated by the region itself
    Heap(Layout),
    /// Adopted `Box<[u8]>` of the given length
    Boxed(usize),
    /// Caller-owned memory
    Raw,
    /// Reserved address space, committed in chunks
    Virtual(VirtualMemory),
    /// Child of a scratch scope, memory belongs to the parent
    Scratch,
}

impl Backing {
    fn name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Heap(_) => "heap",
            Self::Boxed(_) => "boxed",
            Self::Raw => "raw",
            Self::Virtual(_) => "virtual",
            Self::Scratch => "scratch",
        }
    }
}

/// A memory region with bump-pointer allocation and group reclamation
///
/// Offsets are relative to `base`:
/// `0 <= cursor <= limit <= reserved`, where `limit` is the committed end.
/// A region with `commit_size == 0` cannot grow.
///
/// Allocation goes through `&self`, so many views into one region can be alive
/// at once. A region is single-owner: it is `Send` but not `Sync`.
pub struct Arena {
    base: NonNull<u8>,
    cursor: Cell<usize>,
    limit: Cell<usize>,
    reserved: usize,
    commit_size: usize,
    policy: OomPolicy,
    recovery_depth: Cell<u32>,
    scoped: Cell<bool>,
    slice_growth: usize,
    commits: Cell<usize>,
    peak: Cell<usize>,
    backing: Backing,
}

// SAFETY: the region exclusively owns (or, for raw buffers, was handed exclusive use of)
// its memory. Interior mutability is `Cell`, which keeps it `!Sync`.
unsafe impl Send for Arena {}

/// Saved region state, see [`Arena::snapshot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    base: usize,
    cursor: usize,
}

impl Snapshot {
    /// Bytes in use when the snapshot was taken
    #[inline]
    pub fn used(&self) -> usize {
        self.cursor
    }
}

/// Region statistics for monitoring and debugging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    pub used: usize,
    pub committed: usize,
    pub reserved: usize,
    pub remaining: usize,
    pub peak: usize,
    pub commits: usize,
    pub growable: bool,
}

impl Arena {
    /// Build a region from configuration
    pub fn new(config: &ArenaConfig) -> Result<Self, InitError> {
        config.validate()?;

        let arena = match config.backing {
            BackingKind::Fixed => Self::with_capacity(config.capacity)?,
            BackingKind::Virtual => {
                Self::virtual_memory(config.commit_page_count, config.reserve_page_count())?
            }
        };

        Ok(arena
            .with_policy(config.oom)
            .with_slice_growth(config.slice_growth))
    }

    /// Fixed-size region over a freshly allocated heap buffer
    ///
    /// A zero `size` yields an empty region in which every non-empty allocation
    /// is exhaustion.
    pub fn with_capacity(size: usize) -> Result<Self, InitError> {
        if size == 0 {
            return Ok(Self::from_parts(NonNull::dangling(), 0, 0, 0, Backing::Empty));
        }

        let layout = Layout::from_size_align(size, MAX_ALIGN).map_err(|_| InitError::Layout { size })?;

        // SAFETY: layout has non-zero size
        let ptr = unsafe { alloc(layout) };
        let base = NonNull::new(ptr).ok_or_else(|| InitError::Commit {
            size,
            source: std::io::ErrorKind::OutOfMemory.into(),
        })?;

        Ok(Self::from_parts(base, size, size, 0, Backing::Heap(layout)))
    }

    /// Fixed-size region adopting an existing buffer, freed when the region drops
    pub fn from_buffer(buffer: Box<[u8]>) -> Self {
        let len = buffer.len();
        if len == 0 {
            return Self::from_parts(NonNull::dangling(), 0, 0, 0, Backing::Empty);
        }

        let base = NonNull::from(Box::leak(buffer)).cast::<u8>();
        Self::from_parts(base, len, len, 0, Backing::Boxed(len))
    }

    /// Fixed-size region over caller-owned memory
    ///
    /// # Safety
    ///
    /// `ptr..ptr + size` must be valid for reads and writes, and not accessed
    /// through any other path, for as long as the region is alive.
    pub unsafe fn from_raw_parts(ptr: NonNull<u8>, size: usize) -> Self {
        Self::from_parts(ptr, size, size, 0, Backing::Raw)
    }

    /// Growable region backed by reserved virtual memory
    ///
    /// Reserves `reserve_page_count` pages and commits `commit_page_count` of
    /// them; later growth commits `commit_page_count` pages at a time.
    pub fn virtual_memory(commit_page_count: usize, reserve_page_count: usize) -> Result<Self, InitError> {
        assert!(commit_page_count > 0, "commit page count must be positive");
        assert!(
            reserve_page_count >= commit_page_count,
            "reservation must hold at least one commit chunk"
        );

        let page = vm::page_size();
        let commit_size = page
            .checked_mul(commit_page_count)
            .ok_or(InitError::Layout { size: usize::MAX })?;
        let reserve_size = page
            .checked_mul(reserve_page_count)
            .ok_or(InitError::Layout { size: usize::MAX })?;

        let memory = VirtualMemory::reserve(reserve_size)?;
        memory
            .commit(0, commit_size)
            .map_err(|source| InitError::Commit { size: commit_size, source })?;

        let base = memory.base();
        Ok(Self::from_parts(
            base,
            commit_size,
            reserve_size,
            commit_size,
            Backing::Virtual(memory),
        ))
    }

    fn from_parts(base: NonNull<u8>, limit: usize, reserved: usize, commit_size: usize, backing: Backing) -> Self {
        // SAFETY: [base, base + limit) is committed and owned by the new region
        unsafe { poison::poison(base.as_ptr(), limit) };

        tracing::debug!(
            target: "arena",
            backing = backing.name(),
            committed = limit,
            reserved,
            commit_size,
            "region initialized"
        );

        Self {
            base,
            cursor: Cell::new(0),
            limit: Cell::new(limit),
            reserved,
            commit_size,
            policy: OomPolicy::default(),
            recovery_depth: Cell::new(0),
            scoped: Cell::new(false),
            slice_growth: DEFAULT_SLICE_GROWTH,
            commits: Cell::new(0),
            peak: Cell::new(0),
            backing,
        }
    }

    pub fn with_policy(mut self, policy: OomPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_slice_growth(mut self, growth: usize) -> Self {
        assert!(growth > 0, "slice growth must be positive");
        self.slice_growth = growth;
        self
    }

    #[inline]
    pub fn policy(&self) -> OomPolicy {
        self.policy
    }

    #[inline]
    pub fn slice_growth(&self) -> usize {
        self.slice_growth
    }

    /// Allocate `count` elements of `size` bytes aligned to `align`
    ///
    /// The memory is zero-filled unless `flags` has [`AllocFlags::NO_INIT`].
    /// Size overflow and exhaustion go through the OOM policy; with
    /// [`AllocFlags::OOM_NULL`] the error is returned to the caller directly.
    /// A failed call never moves the cursor.
    #[inline]
    pub fn alloc(&self, size: usize, align: usize, count: usize, flags: AllocFlags) -> AllocResult<NonNull<u8>> {
        assert!(align.is_power_of_two(), "alignment must be a power of two");
        assert!(!self.scoped.get(), "region is borrowed by an active scratch scope");

        let Some(total) = size.checked_mul(count) else {
            return Err(self.out_of_memory(AllocError::Overflow { size, count }, flags));
        };

        let cursor = self.cursor.get();
        let pad = self.tip_addr().wrapping_neg() & (align - 1);
        let Some(needed) = total.checked_add(pad) else {
            return Err(self.out_of_memory(AllocError::Overflow { size, count }, flags));
        };

        if needed > self.limit.get() - cursor {
            if let Err(err) = self.grow(needed) {
                return Err(self.out_of_memory(err, flags));
            }
        }

        Ok(self.bump(pad, total, flags))
    }

    /// [`alloc`](Self::alloc) with [`AllocFlags::OOM_NULL`], as an `Option`
    #[inline]
    pub fn try_alloc(&self, size: usize, align: usize, count: usize, flags: AllocFlags) -> Option<NonNull<u8>> {
        self.alloc(size, align, count, flags | AllocFlags::OOM_NULL).ok()
    }

    /// Allocate uninitialized memory and copy `size * count` bytes from `source`
    ///
    /// # Safety
    ///
    /// `source` must be valid for reads of `size * count` bytes.
    pub unsafe fn alloc_from(&self, size: usize, align: usize, count: usize, source: *const u8) -> AllocResult<NonNull<u8>> {
        assert!(!source.is_null(), "source cannot be null");
        let ptr = self.alloc(size, align, count, AllocFlags::NO_INIT)?;
        // size * count was checked by alloc
        ptr::copy(source, ptr.as_ptr(), size * count);
        Ok(ptr)
    }

    /// Allocate one zeroed `T`
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_zeroed<T: Zeroable>(&self) -> AllocResult<&mut T> {
        let ptr = self.alloc(size_of::<T>(), align_of::<T>(), 1, AllocFlags::empty())?;
        // SAFETY: fresh, aligned, zero-filled and T is valid when zeroed
        Ok(unsafe { &mut *ptr.as_ptr().cast::<T>() })
    }

    /// Allocate `count` zeroed `T`s
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_zeroed<T: Zeroable>(&self, count: usize) -> AllocResult<&mut [T]> {
        let ptr = self.alloc(size_of::<T>(), align_of::<T>(), count, AllocFlags::empty())?;
        // SAFETY: as above, for `count` elements
        Ok(unsafe { core::slice::from_raw_parts_mut(ptr.as_ptr().cast::<T>(), count) })
    }

    /// Move `value` into the region. It is never dropped.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_value<T>(&self, value: T) -> AllocResult<&mut T> {
        let ptr = self
            .alloc(size_of::<T>(), align_of::<T>(), 1, AllocFlags::NO_INIT)?
            .cast::<T>();
        // SAFETY: fresh and aligned for T
        unsafe {
            ptr.as_ptr().write(value);
            Ok(&mut *ptr.as_ptr())
        }
    }

    /// Copy `src` into the region
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_copy<T: Copy>(&self, src: &[T]) -> AllocResult<&mut [T]> {
        // SAFETY: src is a valid slice of src.len() elements
        let ptr = unsafe {
            self.alloc_from(size_of::<T>(), align_of::<T>(), src.len(), src.as_ptr().cast::<u8>())?
        };
        Ok(unsafe { core::slice::from_raw_parts_mut(ptr.as_ptr().cast::<T>(), src.len()) })
    }

    #[inline(always)]
    fn bump(&self, pad: usize, total: usize, flags: AllocFlags) -> NonNull<u8> {
        let start = self.cursor.get() + pad;
        let end = start + total;
        self.cursor.set(end);
        if end > self.peak.get() {
            self.peak.set(end);
        }

        // SAFETY: start + total <= limit, inside the committed range
        unsafe {
            let ptr = self.base.as_ptr().add(start);
            if !flags.contains(AllocFlags::NO_INIT) {
                ptr::write_bytes(ptr, 0, total);
            }
            NonNull::new_unchecked(ptr)
        }
    }

    /// Commit chunks until `needed` bytes fit after the cursor
    #[cold]
    fn grow(&self, needed: usize) -> AllocResult<()> {
        let cursor = self.cursor.get();
        let exhausted = AllocError::Exhausted {
            requested: needed,
            available: self.reserved - cursor,
        };

        if self.commit_size == 0 || needed > self.reserved - cursor {
            return Err(exhausted);
        }

        while self.limit.get() - cursor < needed {
            let limit = self.limit.get();
            let chunk = self.commit_size.min(self.reserved - limit);

            // SAFETY: [limit, limit + chunk) is inside the reservation
            let committed = unsafe { vm::commit_raw(self.base.as_ptr().add(limit), chunk) };
            if let Err(err) = committed {
                logging::log_commit_failure(chunk, &err);
                return Err(exhausted);
            }

            // SAFETY: just committed, not yet handed out
            unsafe { poison::poison(self.base.as_ptr().add(limit), chunk) };
            self.limit.set(limit + chunk);
            self.commits.set(self.commits.get() + 1);
            logging::log_commit(limit + chunk, chunk);
        }

        Ok(())
    }

    /// The single OOM decision point
    #[cold]
    fn out_of_memory(&self, err: AllocError, flags: AllocFlags) -> AllocError {
        if flags.contains(AllocFlags::OOM_NULL) {
            logging::log_exhausted(&err, "returned to caller");
            return err;
        }

        match self.policy {
            OomPolicy::Abort => {
                logging::log_fatal_exhaustion(&err);
                std::process::abort()
            }
            OomPolicy::Recover => {
                assert!(
                    self.recovery_depth.get() > 0,
                    "arena exhausted outside of a recovery scope: {}",
                    err
                );
                logging::log_exhausted(&err, "unwinding to recovery scope");
                err
            }
        }
    }

    /// Run `f` as a recovery scope
    ///
    /// Under [`OomPolicy::Recover`], exhaustion inside `f` surfaces as `Err`,
    /// which `f` propagates with `?` back here. The failing allocation has no
    /// side effects; allocations made earlier in `f` stay allocated. The scope
    /// hands `f` this region for its full lifetime, so `f` may return values
    /// borrowed from it.
    pub fn recover<'a, T>(&'a self, f: impl FnOnce(&'a Arena) -> AllocResult<T>) -> AllocResult<T> {
        struct Depth<'a>(&'a Cell<u32>);

        impl Drop for Depth<'_> {
            fn drop(&mut self) {
                self.0.set(self.0.get() - 1);
            }
        }

        self.recovery_depth.set(self.recovery_depth.get() + 1);
        let _depth = Depth(&self.recovery_depth);

        let result = f(self);
        if let Err(err) = &result {
            tracing::debug!(target: "arena::oom", %err, "recovery scope caught exhaustion");
        }
        result
    }

    /// Rewind to the start of the region, invalidating everything allocated
    pub fn reset(&mut self) {
        // SAFETY: &mut self guarantees no outstanding views
        unsafe { poison::poison(self.base.as_ptr(), self.limit.get()) };
        tracing::trace!(target: "arena", used = self.cursor.get(), "region reset");
        self.cursor.set(0);
    }

    /// Capture the current cursor
    #[inline]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            base: self.base.as_ptr() as usize,
            cursor: self.cursor.get(),
        }
    }

    /// Return to a snapshot, invalidating everything allocated since
    ///
    /// Snapshots need not be restored in LIFO order; restoring the same one
    /// twice leaves the cursor where the first restore put it.
    pub fn restore(&mut self, snapshot: Snapshot) {
        assert_eq!(
            snapshot.base,
            self.base.as_ptr() as usize,
            "snapshot belongs to another region"
        );
        assert!(snapshot.cursor <= self.limit.get(), "snapshot is past the committed end");

        let cursor = self.cursor.get();
        if cursor > snapshot.cursor {
            // SAFETY: &mut self, and the range is committed
            unsafe {
                poison::poison(self.base.as_ptr().add(snapshot.cursor), cursor - snapshot.cursor)
            };
        }
        self.cursor.set(snapshot.cursor);
    }

    /// Open a scratch scope
    ///
    /// The returned guard derefs to a child region starting at the current
    /// cursor. Allocations through it cannot outlive the guard, and the parent
    /// refuses to allocate while the guard is alive. Dropping the guard, on any
    /// exit path, leaves the parent exactly as it was.
    pub fn scratch(&self) -> Scratch<'_> {
        assert!(!self.scoped.get(), "region already has an active scratch scope");
        self.scoped.set(true);

        let start = self.cursor.get();
        // SAFETY: start <= limit <= reserved
        let base = unsafe { NonNull::new_unchecked(self.base.as_ptr().add(start)) };

        tracing::trace!(target: "arena::scratch", start, "scratch scope opened");

        Scratch {
            parent: self,
            arena: Arena {
                base,
                cursor: Cell::new(0),
                limit: Cell::new(self.limit.get() - start),
                reserved: self.reserved - start,
                commit_size: self.commit_size,
                policy: self.policy,
                recovery_depth: Cell::new(self.recovery_depth.get()),
                scoped: Cell::new(false),
                slice_growth: self.slice_growth,
                commits: Cell::new(0),
                peak: Cell::new(0),
                backing: Backing::Scratch,
            },
        }
    }

    /// Run `f` inside a scratch scope
    pub fn scoped<R>(&self, f: impl FnOnce(&Arena) -> R) -> R {
        let scratch = self.scratch();
        f(&scratch)
    }

    /// Give back the most recent allocation
    ///
    /// Rewinds the cursor if `ptr..ptr + size` ends exactly at the tip,
    /// otherwise does nothing.
    ///
    /// # Safety
    ///
    /// Nothing may reference the block afterwards, including views that were
    /// extended over it by tip-adjacent growth.
    pub unsafe fn free(&self, ptr: NonNull<u8>, size: usize) {
        assert!(!self.scoped.get(), "region is borrowed by an active scratch scope");

        let start = ptr.as_ptr() as usize;
        let base = self.base.as_ptr() as usize;
        if start >= base && start.wrapping_add(size) == self.tip_addr() {
            poison::poison(ptr.as_ptr(), size);
            self.cursor.set(start - base);
        }
    }

    /// Address of the next free byte
    #[inline]
    pub fn tip(&self) -> *const u8 {
        // SAFETY: cursor <= limit
        unsafe { self.base.as_ptr().add(self.cursor.get()) }
    }

    #[inline]
    fn tip_addr(&self) -> usize {
        self.base.as_ptr() as usize + self.cursor.get()
    }

    /// Whether a block ending at `end` is the most recent allocation
    #[inline]
    pub fn is_tip(&self, end: *const u8) -> bool {
        end as usize == self.tip_addr()
    }

    /// Reset the cursor to `used` if it has not moved past `expected` since
    pub(crate) fn rewind_if_tip(&self, expected: usize, used: usize) {
        if !self.scoped.get() && self.cursor.get() == expected && used <= expected {
            // SAFETY: the caller owned [used, expected) and has dropped every view into it
            unsafe { poison::poison(self.base.as_ptr().add(used), expected - used) };
            self.cursor.set(used);
        }
    }

    /// Start of the region
    #[inline]
    pub fn begin(&self) -> *const u8 {
        self.base.as_ptr()
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.cursor.get()
    }

    #[inline]
    pub fn committed(&self) -> usize {
        self.limit.get()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.limit.get() - self.cursor.get()
    }

    #[inline]
    pub fn reserved(&self) -> usize {
        self.reserved
    }

    #[inline]
    pub fn is_growable(&self) -> bool {
        self.commit_size != 0
    }

    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            used: self.used(),
            committed: self.committed(),
            reserved: self.reserved,
            remaining: self.remaining(),
            peak: self.peak.get(),
            commits: self.commits.get(),
            growable: self.is_growable(),
        }
    }

    /// Emit the region state as a debug event
    pub fn log_state(&self, label: &str) {
        // SAFETY: limit <= reserved
        let end = unsafe { self.base.as_ptr().add(self.limit.get()) };
        tracing::debug!(
            target: "arena",
            label,
            cur = ?self.tip(),
            end = ?end,
            used = self.used(),
            free = self.remaining(),
            "region state"
        );
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        match &self.backing {
            Backing::Heap(layout) => {
                // SAFETY: allocated in with_capacity with this layout
                unsafe { dealloc(self.base.as_ptr(), *layout) }
            }
            Backing::Boxed(len) => {
                // SAFETY: leaked from a Box<[u8]> of this length in from_buffer
                drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(self.base.as_ptr(), *len)) });
            }
            Backing::Virtual(memory) => {
                // VirtualMemory releases the reservation in its own Drop
                tracing::trace!(target: "arena::vm", reserved = memory.size(), "releasing reservation");
            }
            Backing::Empty | Backing::Raw | Backing::Scratch => {}
        }
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("backing", &self.backing.name())
            .field("begin", &self.base)
            .field("used", &self.used())
            .field("committed", &self.committed())
            .field("reserved", &self.reserved)
            .field("policy", &self.policy)
            .finish()
    }
}

/// Guard for a scratch scope, see [`Arena::scratch`]
pub struct Scratch<'a> {
    parent: &'a Arena,
    arena: Arena,
}

impl Scratch<'_> {
    /// Discard everything allocated in this scope so far
    pub fn reset(&mut self) {
        self.arena.reset();
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        self.arena.restore(snapshot);
    }
}

impl Deref for Scratch<'_> {
    type Target = Arena;

    #[inline]
    fn deref(&self) -> &Arena {
        &self.arena
    }
}

impl Drop for Scratch<'_> {
    fn drop(&mut self) {
        let used = self.arena.used();
        // SAFETY: the guard is being dropped, so nothing borrows the child anymore
        unsafe { poison::poison(self.arena.base.as_ptr(), used) };

        let parent = self.parent;
        let start = parent.cursor.get();
        parent.limit.set(parent.limit.get().max(start + self.arena.limit.get()));
        parent.commits.set(parent.commits.get() + self.arena.commits.get());
        parent.peak.set(parent.peak.get().max(start + self.arena.peak.get()));
        parent.scoped.set(false);

        tracing::trace!(target: "arena::scratch", used, "scratch scope closed");
    }
}
