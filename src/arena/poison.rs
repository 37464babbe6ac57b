//! Use-after-reset instrumentation
//!
//! Released and not-yet-allocated memory is filled with [`POISON_BYTE`] in
//! debug builds and with the `poison` feature. Reads through a stale raw
//! pointer then see an obvious pattern instead of plausible old data.
//! Unpoisoning is a no-op: allocation either zero-fills or hands the bytes
//! out untouched.

pub const POISON_BYTE: u8 = 0xCD;

/// Whether this build poisons memory at all
pub const ENABLED: bool = cfg!(any(debug_assertions, feature = "poison"));

/// Fill `len` bytes at `ptr` with the poison pattern
///
/// # Safety
///
/// `ptr..ptr + len` must be committed, writable memory not referenced by any live borrow.
#[inline]
pub unsafe fn poison(ptr: *mut u8, len: usize) {
    if ENABLED && len > 0 {
        core::ptr::write_bytes(ptr, POISON_BYTE, len);
    }
}
