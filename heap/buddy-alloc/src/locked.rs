use crate::heap::BuddyHeap;
use crate::region::RegionProvider;
use buddy_sync::SpinLock;
use core::ptr::NonNull;

/// A [`BuddyHeap`] behind a spin lock.
///
/// The heap itself is single-threaded by design; sharing it requires every
/// operation — the free-list scan together with any splits or merges it
/// performs — to run under one lock acquisition, which is exactly what this
/// wrapper does.
///
/// ```
/// use buddy_alloc::{ARENA_BYTES, BuddyHeap, LockedBuddyHeap};
/// use buddy_region::{ArenaBuffer, FixedRegion};
///
/// let arena = Box::leak(Box::new(ArenaBuffer::<ARENA_BYTES>::new()));
/// let heap = LockedBuddyHeap::new(BuddyHeap::new(FixedRegion::new(arena.0.as_mut_slice())));
///
/// let p = heap.allocate(100).expect("fresh arena");
/// unsafe { heap.free(p) };
/// assert_eq!(heap.with_heap(|h| h.free_bytes()), ARENA_BYTES);
/// ```
pub struct LockedBuddyHeap<R> {
    inner: SpinLock<BuddyHeap<R>>,
}

impl<R: RegionProvider> LockedBuddyHeap<R> {
    /// Wrap a heap for shared use.
    pub const fn new(heap: BuddyHeap<R>) -> Self {
        Self {
            inner: SpinLock::new(heap),
        }
    }

    /// Allocate a buffer of `n` bytes; see [`BuddyHeap::allocate`].
    #[must_use = "the buffer leaks unless it is eventually freed"]
    pub fn allocate(&self, n: usize) -> Option<NonNull<u8>> {
        self.inner.with_lock(|heap| heap.allocate(n))
    }

    /// Return a buffer obtained from [`allocate`](Self::allocate).
    ///
    /// # Safety
    /// Same contract as [`BuddyHeap::free`].
    pub unsafe fn free(&self, ptr: NonNull<u8>) {
        self.inner.with_lock(|heap| {
            // Safety: forwarded from the caller.
            unsafe { heap.free(ptr) };
        });
    }

    /// Run `f` against the heap under the lock, e.g. to walk its free list.
    pub fn with_heap<T>(&self, f: impl FnOnce(&BuddyHeap<R>) -> T) -> T {
        self.inner.with_lock(|heap| f(heap))
    }
}
