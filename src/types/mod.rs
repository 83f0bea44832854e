pub mod error;
pub mod item_id;
pub mod page;

/// 1-based index into a page's line pointer array. Zero is never a valid slot.
pub type OffsetNumber = u16;

pub const INVALID_OFFSET_NUMBER: OffsetNumber = 0;
pub const FIRST_OFFSET_NUMBER: OffsetNumber = 1;

// Page format parameters, fixed for a given layout version
pub const PAGE_SIZE: usize = 8192;
pub const MAXALIGN: usize = 8;
pub const PAGE_HEADER_SIZE: usize = 24;
pub const ITEM_ID_SIZE: usize = 4; // off(15 bits) | flags(2 bits) | len(15 bits)
pub const PAGE_LAYOUT_VERSION: u8 = 4;

/// Upper bound on line pointers a single page could ever hold.
pub const MAX_OFFSET_NUMBER: OffsetNumber = (PAGE_SIZE / ITEM_ID_SIZE) as OffsetNumber;

/// Round `len` up to the next multiple of [`MAXALIGN`].
#[inline]
pub const fn maxalign(len: usize) -> usize {
    (len + MAXALIGN - 1) & !(MAXALIGN - 1)
}
