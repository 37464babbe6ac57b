//! Virtual memory backing - reserve address space up front, commit on demand
//!
//! Design: One large reservation per region with no access rights. Pages are
//! made readable and writable in fixed-size chunks as the bump cursor advances.
//! Nothing is decommitted until the reservation is released on drop.

use core::ptr::NonNull;
use std::io;

use crate::error::InitError;

/// A reserved range of address space
pub struct VirtualMemory {
    base: NonNull<u8>,
    size: usize,
}

impl VirtualMemory {
    /// Reserve `size` bytes without committing any of them
    pub fn reserve(size: usize) -> Result<Self, InitError> {
        let base = os::reserve(size).map_err(|source| InitError::Reserve { size, source })?;
        Ok(Self { base, size })
    }

    /// Make `[offset, offset + size)` of the reservation readable and writable
    pub fn commit(&self, offset: usize, size: usize) -> io::Result<()> {
        debug_assert!(offset + size <= self.size, "commit past reservation");
        // SAFETY: the range lies inside our reservation
        unsafe { commit_raw(self.base.as_ptr().add(offset), size) }
    }

    #[inline]
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// Reserved bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }
}

impl Drop for VirtualMemory {
    fn drop(&mut self) {
        // SAFETY: base/size describe exactly the mapping created in `reserve`
        unsafe { os::release(self.base.as_ptr(), self.size) }
    }
}

/// Make `size` bytes at `ptr` readable and writable
///
/// # Safety
///
/// The range must lie inside a reservation made by [`VirtualMemory::reserve`].
pub unsafe fn commit_raw(ptr: *mut u8, size: usize) -> io::Result<()> {
    os::commit(ptr, size)
}

/// System page size in bytes
pub fn page_size() -> usize {
    os::page_size()
}

#[cfg(unix)]
mod os {
    use core::ptr::{self, NonNull};
    use std::io;

    pub fn page_size() -> usize {
        // SAFETY: sysconf has no preconditions
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size < 1 {
            4096
        } else {
            size as usize
        }
    }

    pub fn reserve(size: usize) -> io::Result<NonNull<u8>> {
        // SAFETY: anonymous private mapping with no fixed address
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        NonNull::new(ptr as *mut u8).ok_or_else(|| io::Error::from(io::ErrorKind::OutOfMemory))
    }

    pub unsafe fn commit(ptr: *mut u8, size: usize) -> io::Result<()> {
        if libc::mprotect(ptr as *mut libc::c_void, size, libc::PROT_READ | libc::PROT_WRITE) == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    pub unsafe fn release(ptr: *mut u8, size: usize) {
        libc::munmap(ptr as *mut libc::c_void, size);
    }
}

#[cfg(windows)]
mod os {
    use core::ptr::{self, NonNull};
    use std::io;
    use winapi::um::memoryapi::{VirtualAlloc, VirtualFree};
    use winapi::um::sysinfoapi::{GetSystemInfo, SYSTEM_INFO};
    use winapi::um::winnt::{MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_NOACCESS, PAGE_READWRITE};

    pub fn page_size() -> usize {
        // SAFETY: GetSystemInfo fills the zeroed struct
        let mut info: SYSTEM_INFO = unsafe { core::mem::zeroed() };
        unsafe { GetSystemInfo(&mut info) };
        info.dwPageSize as usize
    }

    pub fn reserve(size: usize) -> io::Result<NonNull<u8>> {
        // SAFETY: reserving with no base address
        let ptr = unsafe { VirtualAlloc(ptr::null_mut(), size, MEM_RESERVE, PAGE_NOACCESS) };
        NonNull::new(ptr as *mut u8).ok_or_else(io::Error::last_os_error)
    }

    pub unsafe fn commit(ptr: *mut u8, size: usize) -> io::Result<()> {
        let p = VirtualAlloc(ptr as *mut _, size, MEM_COMMIT, PAGE_READWRITE);
        if p.is_null() {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    pub unsafe fn release(ptr: *mut u8, _size: usize) {
        VirtualFree(ptr as *mut _, 0, MEM_RELEASE);
    }
}
