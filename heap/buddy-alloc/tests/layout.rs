use buddy_alloc::layout::{buddy_offset, extent_of, right_child_offset};
use buddy_alloc::{ARENA_BYTES, NODE_BYTES};

#[test]
fn extents_include_the_preamble() {
    assert_eq!(extent_of(240), 256);
    assert_eq!(extent_of(ARENA_BYTES - NODE_BYTES), ARENA_BYTES);
}

#[test]
fn buddies_pair_up_symmetrically() {
    // Left halves point right, right halves point left.
    assert_eq!(buddy_offset(0, 2048), 2048);
    assert_eq!(buddy_offset(2048, 2048), 0);
    assert_eq!(buddy_offset(1024, 512), 1536);
    assert_eq!(buddy_offset(1536, 512), 1024);
    assert_eq!(buddy_offset(256, 256), 0);

    for extent in [32_usize, 64, 256, 1024, 2048] {
        for index in 0..(ARENA_BYTES / extent) {
            let offset = index * extent;
            let buddy = buddy_offset(offset, extent);
            assert_eq!(buddy_offset(buddy, extent), offset);
            assert_eq!(offset.abs_diff(buddy), extent);
        }
    }
}

#[test]
fn right_child_sits_past_the_left_half() {
    // Splitting the whole arena: 4080 payload bytes minus one preamble
    // leaves 4064 to divide, and the right child lands mid-arena.
    assert_eq!(right_child_offset(0, ARENA_BYTES - 2 * NODE_BYTES), 2048);
    // Splitting the 2048-extent block at 2048 puts its right child at 3072.
    assert_eq!(right_child_offset(2048, 2032 - NODE_BYTES), 3072);
}
