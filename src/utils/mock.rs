//! Page builders shared by tests and benchmarks.

use crate::storage::AddMode;
use crate::types::{
    ITEM_ID_SIZE, OffsetNumber, PAGE_HEADER_SIZE, PAGE_SIZE,
    item_id::{ItemId, LpState},
    maxalign,
    page::Page,
};

/// Deterministic, recognisable item bytes.
pub fn sample_item(id: u32, len: usize) -> Vec<u8> {
    let seed = id.wrapping_mul(31).wrapping_add(7);
    (0..len)
        .map(|i| (seed.wrapping_add(i as u32 * 13) % 251) as u8)
        .collect()
}

/// A fresh page holding one item of each length, appended in order.
pub fn page_with_items(lengths: &[usize]) -> Page {
    let mut page = Page::new(0).expect("empty page");
    for (i, &len) in lengths.iter().enumerate() {
        let offnum = page
            .add_item(&sample_item(i as u32, len), None, AddMode::Shuffle)
            .expect("healthy page")
            .expect("items fit on page");
        assert_eq!(offnum as usize, i + 1);
    }
    page
}

/// A page whose data area stores `items` in the order given by `placement`,
/// with `gap` bytes of garbage between consecutive items.
///
/// Slot `i + 1` always points at `items[i]`; only the physical order of the
/// data changes, so a compaction has to move items past each other.
pub fn scattered_page(items: &[Vec<u8>], placement: &[usize], gap: usize) -> Page {
    assert_eq!(items.len(), placement.len(), "placement must cover every item");
    let mut page = Page::new(0).expect("empty page");
    let gap = maxalign(gap);
    let lower = PAGE_HEADER_SIZE + items.len() * ITEM_ID_SIZE;
    let mut upper = PAGE_SIZE;

    for &index in placement {
        let item = &items[index];
        let aligned = maxalign(item.len());
        assert!(upper >= lower + aligned + gap, "layout does not fit on one page");
        upper -= gap;
        page.bytes_mut()[upper..upper + gap].fill(0xEE);
        upper -= aligned;
        page.bytes_mut()[upper..upper + item.len()].copy_from_slice(item);
        page.write_item_id(
            index as OffsetNumber + 1,
            ItemId::new(upper as u16, LpState::Normal, item.len() as u16),
        );
    }

    page.update_header(|h| {
        h.lower = lower as u16;
        h.upper = upper as u16;
    });
    page
}

/// Offset numbers of the slots that currently hold an item.
pub fn stored_offsets<B: AsRef<[u8]>>(page: &Page<B>) -> Vec<OffsetNumber> {
    page.item_ids()
        .filter(|(_, id)| id.is_used() && id.has_storage())
        .map(|(offnum, _)| offnum)
        .collect()
}
