use buddy_alloc::{RegionError, RegionProvider};
use core::ffi::c_void;
use core::ptr::NonNull;

/// Region provider backed by an anonymous private memory mapping.
///
/// The heap's placement hint is passed to `mmap(2)` as the preferred address
/// (without `MAP_FIXED`, so the kernel is free to place the region
/// elsewhere); the address actually chosen is what the heap computes with.
/// The mapping is released when the provider drops.
pub struct MmapRegion {
    mapping: Option<(NonNull<u8>, usize)>,
}

// Safety: the mapping is owned exclusively by this provider.
unsafe impl Send for MmapRegion {}

impl MmapRegion {
    /// A provider that has not mapped anything yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { mapping: None }
    }
}

impl Default for MmapRegion {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionProvider for MmapRegion {
    fn acquire(&mut self, hint: usize, len: usize) -> Result<NonNull<u8>, RegionError> {
        if let Some((base, _)) = self.mapping {
            return Ok(base);
        }

        // Safety: anonymous mapping, no file descriptor; the hint address is
        // advisory and may be null or unmapped.
        let ptr = unsafe {
            libc::mmap(
                hint as *mut c_void,
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANON,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            return Err(RegionError::MapFailed { errno });
        }

        let base = NonNull::new(ptr.cast::<u8>()).ok_or(RegionError::MapFailed { errno: 0 })?;
        self.mapping = Some((base, len));
        log::debug!(
            "mapped {len} bytes at {:#x} (hint {hint:#x})",
            base.as_ptr() as usize
        );
        Ok(base)
    }
}

impl Drop for MmapRegion {
    fn drop(&mut self) {
        if let Some((base, len)) = self.mapping.take() {
            // Safety: `base` is a live mapping of exactly `len` bytes and no
            // heap can outlive its provider.
            let _ = unsafe { libc::munmap(base.as_ptr().cast::<c_void>(), len) };
        }
    }
}
