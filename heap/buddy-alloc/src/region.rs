use core::ptr::NonNull;

/// Source of the arena a [`BuddyHeap`](crate::BuddyHeap) manages.
///
/// The heap calls [`acquire`](Self::acquire) exactly once, lazily, on the
/// first allocation. The provider keeps ownership of the backing storage for
/// the lifetime of the heap; the heap never releases it.
///
/// Implementations must hand out a region that is
/// - readable and writable for at least `len` bytes,
/// - aligned to at least [`NODE_ALIGN`](crate::NODE_ALIGN),
/// - exclusive to the heap until the provider is dropped.
///
/// `hint` is a preferred placement address and may be ignored; the heap bases
/// all of its arithmetic on the address actually returned.
pub trait RegionProvider {
    /// Obtain the arena.
    ///
    /// # Errors
    /// Returns a [`RegionError`] when the backing storage cannot be obtained
    /// or does not satisfy the contract above.
    fn acquire(&mut self, hint: usize, len: usize) -> Result<NonNull<u8>, RegionError>;
}

/// Failure to obtain an arena from a [`RegionProvider`].
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegionError {
    /// The operating system refused the mapping.
    #[error("mapping the arena failed (errno {errno})")]
    MapFailed {
        /// Raw OS error code.
        errno: i32,
    },
    /// The backing buffer is shorter than the requested arena.
    #[error("backing buffer holds {got} bytes, the arena needs {needed}")]
    TooSmall {
        /// Bytes the arena requires.
        needed: usize,
        /// Bytes the buffer provides.
        got: usize,
    },
    /// The backing buffer cannot host the free-node preamble.
    #[error("backing buffer is not aligned for the free-node preamble")]
    Misaligned,
}
