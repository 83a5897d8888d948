//! Exercise driver for the buddy heap.
//!
//! Allocates 200, 200 and 1000 bytes out of an mmap-backed arena, then frees
//! the middle, first and last allocation in that order, dumping the free
//! list after every step. Set `BUDDY_DEMO_LOG=trace` to watch the individual
//! splits and merges.

mod logger;

use buddy_alloc::{BuddyHeap, LockedBuddyHeap};
use buddy_region::MmapRegion;
use log::info;

fn main() {
    logger::init();

    let heap = LockedBuddyHeap::new(BuddyHeap::new(MmapRegion::new()));

    let first = heap.allocate(200).expect("allocate 200 bytes");
    dump(&heap, "allocate(200)");
    let second = heap.allocate(200).expect("allocate 200 bytes");
    dump(&heap, "allocate(200)");
    let third = heap.allocate(1000).expect("allocate 1000 bytes");
    dump(&heap, "allocate(1000)");

    // Safety: all three pointers come from `allocate` above; each is freed
    // exactly once.
    unsafe {
        heap.free(second);
        dump(&heap, "free(second)");
        heap.free(first);
        dump(&heap, "free(first)");
        heap.free(third);
        dump(&heap, "free(third)");
    }
}

fn dump(heap: &LockedBuddyHeap<MmapRegion>, label: &str) {
    heap.with_heap(|heap| {
        info!("after {label}:");
        for block in heap.free_blocks() {
            info!("  free block at {:#x}, {} payload bytes", block.addr, block.size);
        }
        info!("  {} of {} bytes free", heap.free_bytes(), heap.arena_bytes());
    });
}
