use core::marker::PhantomData;

/// Preamble stored at the beginning of every **free** block.
///
/// A free block in the arena has the following layout:
///
/// ```text
/// +----------------------+-------------------------+
/// | FreeNode (preamble)  |      payload (size)     |
/// +----------------------+-------------------------+
/// ^ block_addr           ^ block_addr + size_of::<FreeNode>()
/// ```
///
/// - `size` is the number of payload bytes **after** the preamble. A size of
///   zero marks a block that is currently allocated: such blocks stay chained
///   through `next` so that a buddy probe can read their size directly from
///   their address.
/// - `next` links to the next block in the list, allocated blocks included.
#[repr(C)]
pub(crate) struct FreeNode {
    /// Size of the payload (bytes) following this preamble; 0 while allocated.
    pub(crate) size: usize,
    /// Pointer to the next chained block (or null).
    pub(crate) next: *mut FreeNode,
}

/// Preamble of every **allocated** block, written right after the spot the
/// [`FreeNode`] occupied:
///
/// ```text
/// +----------+-------------+------------------+
/// | FreeNode | BlockHeader |     payload      |
/// +----------+-------------+------------------+
///                          ^ pointer returned to the caller
/// ```
///
/// `magic` is checked on free; a mismatch means the pointer never came from
/// this allocator and the free is refused.
#[repr(C)]
pub(crate) struct BlockHeader {
    /// Usable payload bytes following the header.
    pub(crate) size: u32,
    /// Sentinel distinguishing live allocations from arbitrary arena bytes.
    pub(crate) magic: u32,
}

/// Bytes occupied by the free-node preamble (16 on 64-bit targets).
pub const NODE_BYTES: usize = size_of::<FreeNode>();

/// Bytes occupied by the allocation header (8 on 64-bit targets).
pub const HEADER_BYTES: usize = size_of::<BlockHeader>();

/// Minimum alignment the arena base must provide so node writes are aligned.
pub const NODE_ALIGN: usize = align_of::<FreeNode>();

/// One free block, as reported by [`FreeBlocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeBlock {
    /// Address of the block's free-node preamble.
    pub addr: usize,
    /// Payload bytes of the block, excluding the preamble.
    pub size: usize,
}

/// Iterator over the free blocks of a heap, in list order.
///
/// Allocated blocks (chained with `size == 0`) are skipped; only blocks that
/// are actually free are yielded. Created by
/// [`BuddyHeap::free_blocks`](crate::BuddyHeap::free_blocks); the borrow on
/// the heap keeps the walk read-only.
pub struct FreeBlocks<'a> {
    cur: *const FreeNode,
    _heap: PhantomData<&'a ()>,
}

impl FreeBlocks<'_> {
    pub(crate) const fn new(head: *const FreeNode) -> Self {
        Self {
            cur: head,
            _heap: PhantomData,
        }
    }
}

impl Iterator for FreeBlocks<'_> {
    type Item = FreeBlock;

    fn next(&mut self) -> Option<FreeBlock> {
        while !self.cur.is_null() {
            // Safety: the list only chains nodes inside the arena, and the
            // shared borrow on the heap rules out concurrent mutation.
            let (addr, size, next) =
                unsafe { (self.cur as usize, (*self.cur).size, (*self.cur).next) };
            self.cur = next;
            if size != 0 {
                return Some(FreeBlock { addr, size });
            }
        }
        None
    }
}
