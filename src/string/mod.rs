//! Arena strings - immutable byte views with copy-avoiding concatenation
//!
//! Design: A string is `{data, len}`, never NUL-terminated. Strings that end
//! at the region tip can be extended by appending after them, so building a
//! string piece by piece costs one copy per piece instead of one per step.

mod split;

#[cfg(test)]
mod tests;

pub use split::{Split, SplitAny};

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::ptr::NonNull;
use std::ffi::{CStr, CString};

use crate::arena::{AllocFlags, Arena};
use crate::error::AllocResult;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// Immutable byte string, usually owned by a region
#[derive(Clone, Copy)]
pub struct Str<'a> {
    data: NonNull<u8>,
    len: usize,
    _marker: PhantomData<&'a [u8]>,
}

impl<'a> Str<'a> {
    /// View over existing bytes, nothing is copied
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self {
            // SAFETY: slice pointers are never null
            data: unsafe { NonNull::new_unchecked(bytes.as_ptr() as *mut u8) },
            len: bytes.len(),
            _marker: PhantomData,
        }
    }

    /// View over a string literal
    pub const fn lit(s: &'a str) -> Self {
        Self::new(s.as_bytes())
    }

    pub const fn empty() -> Self {
        Self::new(&[])
    }

    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        // SAFETY: data points to len immutable bytes alive for 'a
        unsafe { core::slice::from_raw_parts(self.data.as_ptr(), self.len) }
    }

    /// UTF-8 view, if the bytes are valid UTF-8
    pub fn to_str(&self) -> Option<&'a str> {
        core::str::from_utf8(self.as_bytes()).ok()
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
    fn end(&self) -> *const u8 {
        // SAFETY: one past the end of our bytes
        unsafe { self.data.as_ptr().add(self.len) }
    }

    /// Whether this string is the most recent allocation in `arena`
    #[inline]
    pub fn is_at_tip(&self, arena: &Arena) -> bool {
        arena.is_tip(self.end())
    }

    /// Copy into `arena`, unless empty or already at its tip
    pub fn clone_in(self, arena: &'a Arena) -> AllocResult<Str<'a>> {
        if self.is_empty() || self.is_at_tip(arena) {
            return Ok(self);
        }
        copy_bytes(arena, self.as_bytes())
    }

    /// `self` followed by `tail`
    ///
    /// The head is moved to the region tip (a no-op if it already is there)
    /// and the tail is copied right after it. An empty head yields the tail,
    /// copied only if it is not already at the tip.
    pub fn concat(self, arena: &'a Arena, tail: Str<'a>) -> AllocResult<Str<'a>> {
        if self.is_empty() {
            return tail.clone_in(arena);
        }
        self.append(arena, tail.as_bytes())
    }

    /// `self` followed by a copy of `bytes`
    pub fn cat_bytes(self, arena: &'a Arena, bytes: &[u8]) -> AllocResult<Str<'a>> {
        if self.is_empty() {
            return copy_bytes(arena, bytes);
        }
        self.append(arena, bytes)
    }

    pub fn cat_str(self, arena: &'a Arena, s: &str) -> AllocResult<Str<'a>> {
        self.cat_bytes(arena, s.as_bytes())
    }

    fn append(self, arena: &'a Arena, bytes: &[u8]) -> AllocResult<Str<'a>> {
        let mut head = self.clone_in(arena)?;
        if bytes.is_empty() {
            return Ok(head);
        }

        // Always copy: a tail that already sits at the tip overlaps the head's end
        let tail = copy_bytes(arena, bytes)?;
        debug_assert_eq!(tail.data.as_ptr() as *const u8, head.end(), "tail must follow head");
        head.len += tail.len;
        Ok(head)
    }

    /// Run `f` with a NUL-terminated copy of this string
    ///
    /// The copy is truncated at the first interior NUL. Its space is handed
    /// back afterwards unless `f` allocated from `arena` in the meantime.
    pub fn with_cstr<R>(self, arena: &'a Arena, f: impl FnOnce(&CStr) -> R) -> AllocResult<R> {
        let used = arena.used();
        let terminated = self.cat_bytes(arena, b"\0")?;
        let expected = arena.used();

        let cstr = CStr::from_bytes_until_nul(terminated.as_bytes()).unwrap_or_default();
        let result = f(cstr);

        arena.rewind_if_tip(expected, used);
        Ok(result)
    }

    /// Heap-owned NUL-terminated copy, truncated at the first interior NUL
    pub fn to_cstring(&self) -> CString {
        let bytes = self.as_bytes();
        let end = memchr::memchr(0, bytes).unwrap_or(bytes.len());
        // SAFETY: bytes[..end] contains no NUL
        unsafe { CString::from_vec_unchecked(bytes[..end].to_vec()) }
    }

    pub fn starts_with(&self, prefix: impl AsRef<[u8]>) -> bool {
        self.as_bytes().starts_with(prefix.as_ref())
    }

    pub fn ends_with(&self, suffix: impl AsRef<[u8]>) -> bool {
        self.as_bytes().ends_with(suffix.as_ref())
    }

    /// Up to `len` bytes starting at `pos`
    pub fn substr(&self, pos: usize, len: usize) -> Str<'a> {
        assert!(pos <= self.len, "substr position {} out of range for length {}", pos, self.len);
        let len = len.min(self.len - pos);
        Str::new(&self.as_bytes()[pos..pos + len])
    }

    /// Bytes `p1..p2`, with `p2` clamped to the length
    pub fn slice(&self, p1: usize, p2: usize) -> Str<'a> {
        assert!(
            p1 <= p2 && p1 <= self.len,
            "invalid slice {}..{} for length {}",
            p1,
            p2,
            self.len
        );
        let p2 = p2.min(self.len);
        Str::new(&self.as_bytes()[p1..p2])
    }

    /// Drop leading bytes `<= b' '`
    pub fn trim_left(&self) -> Str<'a> {
        let bytes = self.as_bytes();
        let start = bytes.iter().position(|&b| b > b' ').unwrap_or(bytes.len());
        Str::new(&bytes[start..])
    }

    /// Drop trailing bytes `<= b' '`
    pub fn trim_right(&self) -> Str<'a> {
        let bytes = self.as_bytes();
        let end = bytes.iter().rposition(|&b| b > b' ').map_or(0, |i| i + 1);
        Str::new(&bytes[..end])
    }

    pub fn trim(&self) -> Str<'a> {
        self.trim_left().trim_right()
    }

    /// 64-bit FNV-1a
    pub fn hash64(&self) -> u64 {
        self.as_bytes()
            .iter()
            .fold(FNV_OFFSET_BASIS, |hash, &b| (hash ^ b as u64).wrapping_mul(FNV_PRIME))
    }

    /// Fields separated by `sep`; empty fields are kept
    pub fn split<'p>(&self, sep: &'p [u8]) -> Split<'a, 'p> {
        Split::new(self.as_bytes(), sep)
    }

    /// Tokens separated by runs of any byte in `charset`
    pub fn split_any(&self, charset: &[u8]) -> SplitAny<'a> {
        SplitAny::new(self.as_bytes(), charset)
    }
}

fn copy_bytes<'a>(arena: &'a Arena, bytes: &[u8]) -> AllocResult<Str<'a>> {
    if bytes.is_empty() {
        return Ok(Str::empty());
    }
    // SAFETY: bytes is a valid slice
    let data = unsafe { arena.alloc_from(1, 1, bytes.len(), bytes.as_ptr())? };
    Ok(Str {
        data,
        len: bytes.len(),
        _marker: PhantomData,
    })
}

impl Arena {
    /// Copy `s` into the region
    pub fn alloc_str(&self, s: &str) -> AllocResult<Str<'_>> {
        copy_bytes(self, s.as_bytes())
    }

    /// Copy `bytes` into the region
    pub fn alloc_bytes(&self, bytes: &[u8]) -> AllocResult<Str<'_>> {
        copy_bytes(self, bytes)
    }

    /// Format into a string allocated at the exact required length
    ///
    /// Measures first, then writes into the allocation. Prefer the
    /// [`format_in!`](crate::format_in) macro.
    pub fn format(&self, args: fmt::Arguments<'_>) -> AllocResult<Str<'_>> {
        if let Some(s) = args.as_str() {
            return self.alloc_str(s);
        }

        let mut counter = Counter(0);
        let measured = fmt::write(&mut counter, args);
        assert!(measured.is_ok(), "a formatting trait implementation returned an error");
        let len = counter.0;

        let data = self.alloc(1, 1, len, AllocFlags::NO_INIT)?;
        let mut filler = Filler {
            ptr: data.as_ptr(),
            cap: len,
            written: 0,
        };
        let written = fmt::write(&mut filler, args);
        assert!(
            written.is_ok() && filler.written == len,
            "formatting produced a different length on the second pass"
        );

        Ok(Str {
            data,
            len,
            _marker: PhantomData,
        })
    }
}

struct Counter(usize);

impl fmt::Write for Counter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}

struct Filler {
    ptr: *mut u8,
    cap: usize,
    written: usize,
}

impl fmt::Write for Filler {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.written + s.len() > self.cap {
            return Err(fmt::Error);
        }
        // SAFETY: bounds checked against the allocation above
        unsafe {
            core::ptr::copy_nonoverlapping(s.as_ptr(), self.ptr.add(self.written), s.len());
        }
        self.written += s.len();
        Ok(())
    }
}

/// Format into a region: `format_in!(arena, "{}-{}", a, b)`
#[macro_export]
macro_rules! format_in {
    ($arena:expr, $($arg:tt)*) => {
        $arena.format(::core::format_args!($($arg)*))
    };
}

impl Default for Str<'_> {
    fn default() -> Self {
        Self::empty()
    }
}

impl AsRef<[u8]> for Str<'_> {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl<'a> From<&'a str> for Str<'a> {
    fn from(s: &'a str) -> Self {
        Self::lit(s)
    }
}

impl<'a> From<&'a [u8]> for Str<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::new(bytes)
    }
}

impl PartialEq for Str<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Str<'_> {}

impl PartialEq<str> for Str<'_> {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<&str> for Str<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<[u8]> for Str<'_> {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl Hash for Str<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl fmt::Display for Str<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&String::from_utf8_lossy(self.as_bytes()), f)
    }
}

impl fmt::Debug for Str<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&String::from_utf8_lossy(self.as_bytes()), f)
    }
}
