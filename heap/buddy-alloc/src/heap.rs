use crate::free_list::{BlockHeader, FreeBlocks, FreeNode};
use crate::layout::{buddy_offset, extent_of, right_child_offset};
use crate::region::RegionProvider;
use crate::{ARENA_BYTES, HEADER_BYTES, INITIAL_ADDR, MAGIC, NODE_BYTES};
use core::ptr::{self, NonNull};

/// A first-fit buddy allocator over a single fixed-size arena.
///
/// The arena is obtained lazily from the [`RegionProvider`] on the first
/// allocation and then managed entirely in-band: free blocks carry a
/// free-node preamble that threads them into a singly linked list, and
/// allocated blocks keep their node chained with `size == 0` followed by an
/// allocation header. Blocks halve on allocation until the smallest
/// power-of-two extent that still fits the request, and merge with their
/// buddy on free, climbing until the buddy is missing or the whole arena is
/// one block again.
///
/// # Invariants
/// - Every free block's extent (`size + NODE_BYTES`) is `arena_bytes / 2^k`
///   and starts at an arena offset that is a multiple of that extent.
/// - Free extents plus live-allocation extents always sum to `arena_bytes`.
/// - The list is acyclic and chains allocated blocks (`size == 0`) so that a
///   buddy probe can read any block's size straight from its address.
///
/// The heap is single-threaded; wrap it in
/// [`LockedBuddyHeap`](crate::LockedBuddyHeap) to share it.
pub struct BuddyHeap<R> {
    /// Where the arena comes from; consulted once.
    provider: R,
    /// Placement hint forwarded to the provider.
    hint: usize,
    /// Arena base; null until the first allocation.
    base: *mut u8,
    /// Arena length in bytes.
    arena_bytes: usize,
    /// First node of the free list; null until the first allocation.
    head: *mut FreeNode,
}

// Safety: the raw pointers all target the provider-owned arena, which moves
// with the heap; access is exclusive through &mut self.
unsafe impl<R: Send> Send for BuddyHeap<R> {}

impl<R: RegionProvider> BuddyHeap<R> {
    /// Construct a heap over the default arena size and placement hint.
    pub const fn new(provider: R) -> Self {
        Self::with_arena(provider, INITIAL_ADDR, ARENA_BYTES)
    }

    /// Construct a heap over an arena of `arena_bytes` placed near `hint`.
    ///
    /// # Panics
    /// If `arena_bytes` is not a power of two, too small to hold a free node
    /// and a header, or too large for the header's size field.
    pub const fn with_arena(provider: R, hint: usize, arena_bytes: usize) -> Self {
        assert!(arena_bytes.is_power_of_two());
        assert!(arena_bytes >= 2 * NODE_BYTES);
        assert!(arena_bytes <= u32::MAX as usize);
        Self {
            provider,
            hint,
            base: ptr::null_mut(),
            arena_bytes,
            head: ptr::null_mut(),
        }
    }

    /// Whether the arena has been acquired yet.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        !self.head.is_null()
    }

    /// Arena base address, once acquired.
    #[must_use]
    pub fn base(&self) -> Option<NonNull<u8>> {
        NonNull::new(self.base)
    }

    /// Arena length in bytes.
    #[must_use]
    pub const fn arena_bytes(&self) -> usize {
        self.arena_bytes
    }

    /// Allocate a buffer of `n` bytes.
    ///
    /// Scans the free list first-fit, halves the chosen block until the
    /// smallest extent that still fits `n` plus the allocation header, and
    /// returns a pointer to the payload. Returns `None` when no free block
    /// is large enough; the free list is left untouched in that case.
    ///
    /// # Panics
    /// On the first call only, if the region provider fails to produce the
    /// arena. That is a broken precondition, not an allocation failure.
    #[must_use = "the buffer leaks unless it is eventually freed"]
    pub fn allocate(&mut self, n: usize) -> Option<NonNull<u8>> {
        self.ensure_init();
        let needed = n.checked_add(HEADER_BYTES)?;

        let mut prev: *mut FreeNode = ptr::null_mut();
        let mut cur = self.head;
        while !cur.is_null() {
            // Safety: the list only chains nodes inside the arena. Allocated
            // entries carry size 0 and can never satisfy `needed`.
            if unsafe { (*cur).size } >= needed {
                // Safety: `cur` is a free in-arena node with room for `needed`.
                return Some(unsafe { self.place(prev, cur, needed) });
            }
            prev = cur;
            cur = unsafe { (*cur).next };
        }
        None
    }

    /// Return a buffer obtained from [`allocate`](Self::allocate).
    ///
    /// The allocation header in front of `ptr` is validated first; if its
    /// magic value does not match (a wild or stale pointer), the call logs a
    /// warning and leaves all state untouched. Otherwise the block's free
    /// node is resurrected in place and merged with its buddy as long as the
    /// buddy is free and of identical size.
    ///
    /// # Safety
    /// `ptr` must point into this heap's arena. Pointers outside it are
    /// rejected up front, and in-arena pointers with no valid header are
    /// ignored; but if the bytes in front of `ptr` do spell out a valid
    /// header, the pointer must be a live allocation returned by
    /// [`allocate`](Self::allocate), or the free list will be corrupted.
    pub unsafe fn free(&mut self, ptr: NonNull<u8>) {
        let addr = ptr.as_ptr() as usize;
        if self.head.is_null() {
            log::warn!("free of {addr:#x} before any allocation, ignored");
            return;
        }
        let base = self.base as usize;
        if addr < base + NODE_BYTES + HEADER_BYTES || addr > base + self.arena_bytes {
            log::warn!("free of {addr:#x}: outside the arena, ignored");
            return;
        }

        let header = (addr - HEADER_BYTES) as *const BlockHeader;
        // Safety: `header` lies within the arena. Read unaligned: a wild
        // pointer need not sit on a header boundary.
        let BlockHeader { size, magic } = unsafe { ptr::read_unaligned(header) };
        if magic != MAGIC {
            log::warn!("free of {addr:#x}: no allocation header, ignored");
            return;
        }

        let node = (addr - HEADER_BYTES - NODE_BYTES) as *mut FreeNode;
        // Safety: the magic matched, so per this function's contract `node`
        // is the preamble of a live block. Its `next` field still chains the
        // block into the list; only `size` is rewritten here.
        unsafe {
            (*node).size = size as usize + HEADER_BYTES;
            self.coalesce(node);
        }
    }

    /// Iterate over the free blocks, in list order.
    ///
    /// Purely observational; two back-to-back walks yield the same sequence.
    #[must_use]
    pub const fn free_blocks(&self) -> FreeBlocks<'_> {
        FreeBlocks::new(self.head)
    }

    /// Total bytes held by the free list, counting each block's full extent.
    ///
    /// Zero before the arena is acquired.
    #[must_use]
    pub fn free_bytes(&self) -> usize {
        self.free_blocks().map(|block| extent_of(block.size)).sum()
    }

    /// Acquire the arena and seed the free list with one whole-arena block.
    fn ensure_init(&mut self) {
        if !self.head.is_null() {
            return;
        }
        let base = match self.provider.acquire(self.hint, self.arena_bytes) {
            Ok(base) => base.as_ptr(),
            Err(err) => panic!("arena acquisition failed: {err}"),
        };
        // Safety: the provider contract guarantees `arena_bytes` writable
        // bytes at `base`, aligned for `FreeNode`.
        unsafe {
            ptr::write_bytes(base, 0, self.arena_bytes);
            let node = base.cast::<FreeNode>();
            ptr::write(
                node,
                FreeNode {
                    size: self.arena_bytes - NODE_BYTES,
                    next: ptr::null_mut(),
                },
            );
            self.base = base;
            self.head = node;
        }
        log::debug!(
            "arena of {} bytes at {:#x}",
            self.arena_bytes,
            self.base as usize
        );
    }

    /// Carve an allocation out of `cur`, which the scan found large enough.
    ///
    /// `prev` is the scan's trailing cursor (null when `cur` is the head).
    /// Writes the allocation header, marks the node allocated by zeroing its
    /// size while keeping it chained, and returns the payload pointer.
    ///
    /// # Safety
    /// `cur` must be a free node in this heap's list with `size >= needed`,
    /// and `prev` its predecessor in the list or null.
    #[allow(clippy::cast_possible_truncation)]
    unsafe fn place(
        &mut self,
        prev: *mut FreeNode,
        cur: *mut FreeNode,
        needed: usize,
    ) -> NonNull<u8> {
        // Safety: forwarded from the caller.
        let target = unsafe { self.split(cur, needed) };

        // Safety: `split` hands back the (possibly halved) block it was
        // given, still large enough for `needed`. The header and payload it
        // derives lie strictly inside that block.
        let payload = unsafe {
            let size = (*target).size;
            let header = (target as usize + NODE_BYTES) as *mut BlockHeader;
            ptr::write(
                header,
                BlockHeader {
                    size: (size - HEADER_BYTES) as u32,
                    magic: MAGIC,
                },
            );
            // Zero size marks the block allocated; `next` keeps chaining it.
            (*target).size = 0;
            (target as usize + NODE_BYTES + HEADER_BYTES) as *mut u8
        };

        if prev.is_null() {
            self.head = target;
        } else {
            // Safety: `prev` precedes `cur` in the list, and `split` mutated
            // `cur` in place, so the link stays consistent.
            unsafe { (*prev).next = target };
        }

        // Safety: the payload starts past the node and header, inside the arena.
        unsafe { NonNull::new_unchecked(payload) }
    }

    /// Halve `node` until one more halving would no longer fit `needed`.
    ///
    /// Each round materializes the right child in the middle of the block,
    /// links it after the (shrunken) left child, and continues with the left
    /// child. Returns the final left child, which is `node` itself.
    ///
    /// # Safety
    /// `node` must be a free node in this heap's list with `size >= needed`.
    unsafe fn split(&mut self, node: *mut FreeNode, needed: usize) -> *mut FreeNode {
        let base = self.base as usize;
        let cur = node;
        loop {
            // Safety: `cur` is a free in-arena node throughout the loop.
            let splitable = unsafe { (*cur).size } - NODE_BYTES;
            if splitable / 2 <= needed {
                return cur;
            }

            let offset = cur as usize - base;
            let right = (base + right_child_offset(offset, splitable)) as *mut FreeNode;
            // Safety: the right child starts at the block's midpoint, well
            // inside the arena, on a node-aligned boundary.
            unsafe {
                let next = (*cur).next;
                (*cur).size = splitable / 2;
                (*cur).next = right;
                ptr::write(
                    right,
                    FreeNode {
                        size: splitable / 2,
                        next,
                    },
                );
            }
            log::trace!(
                "split block at {offset:#x} into two of {} payload bytes",
                splitable / 2
            );
        }
    }

    /// Merge `node` with its buddy while the buddy is free and of equal
    /// size, climbing until the whole arena is one block again.
    ///
    /// The buddy is found by index arithmetic: a block whose arena offset
    /// divided by its extent is even sits left of its buddy, odd sits right.
    /// The buddy's size is read straight from the buddy's address; allocated
    /// blocks carry size 0 and partially split buddies a smaller size, so
    /// both stop the climb.
    ///
    /// # Safety
    /// `node` must be the preamble of a free in-arena block whose size is a
    /// ladder value (`arena_bytes / 2^k - NODE_BYTES`).
    unsafe fn coalesce(&mut self, node: *mut FreeNode) {
        let base = self.base as usize;
        let whole = self.arena_bytes - NODE_BYTES;

        let mut cur = node;
        // Safety: `cur` starts as a valid free node and each merge yields the
        // equally valid parent block.
        while unsafe { (*cur).size } != whole {
            let size = unsafe { (*cur).size };
            let extent = extent_of(size);
            let offset = cur as usize - base;
            let buddy = (base + buddy_offset(offset, extent)) as *mut FreeNode;

            // Safety: a sub-arena block at an extent-aligned offset always
            // has its buddy inside the arena.
            if unsafe { (*buddy).size } != size {
                break;
            }

            let (lower, upper) = if offset / extent % 2 == 0 {
                (cur, buddy)
            } else {
                (buddy, cur)
            };
            // Safety: `lower` and `upper` are adjacent same-size blocks; the
            // merged block takes over the lower address and the upper block's
            // successor.
            unsafe {
                let after = (*upper).next;
                (*upper).next = ptr::null_mut();
                (*lower).size = size + size + NODE_BYTES;
                (*lower).next = after;
            }
            log::trace!(
                "merged buddies of {size} payload bytes at {:#x}",
                lower as usize - base
            );
            cur = lower;
        }
    }
}
