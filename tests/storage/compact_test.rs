use halaman::{
    storage::AddMode,
    types::{
        PAGE_SIZE, maxalign,
        error::PageError,
        item_id::{ItemId, LpState},
        page::Page,
    },
    utils::{
        hash::live_items_digest,
        mock::{page_with_items, sample_item, scattered_page, stored_offsets},
    },
};

fn items(lengths: &[usize]) -> Vec<Vec<u8>> {
    lengths
        .iter()
        .enumerate()
        .map(|(i, &len)| sample_item(i as u32, len))
        .collect()
}

fn packed_upper(lengths: &[usize]) -> usize {
    PAGE_SIZE - lengths.iter().map(|&len| maxalign(len)).sum::<usize>()
}

#[test]
fn test_repair_reclaims_dead_items() {
    let mut page = page_with_items(&[10, 20, 5]);
    page.mark_dead(2).unwrap();

    let unused = page.repair_fragmentation().unwrap();

    assert_eq!(unused, vec![2]);
    assert_eq!(page.item_id(2), Some(ItemId::unused()));
    assert_eq!(page.max_offset_number(), 3);
    assert_eq!(page.upper() as usize, packed_upper(&[10, 5]));
    assert_eq!(page.item(1), Some(sample_item(0, 10).as_slice()));
    assert_eq!(page.item(3), Some(sample_item(2, 5).as_slice()));
    assert!(page.has_free_line_pointers());
}

#[test]
fn test_repair_without_holes_keeps_layout() {
    let mut page = page_with_items(&[10, 20, 5]);
    page.set_has_free_line_pointers();
    let before = page.item_ids().collect::<Vec<_>>();

    let unused = page.repair_fragmentation().unwrap();

    assert!(unused.is_empty());
    assert_eq!(page.item_ids().collect::<Vec<_>>(), before);
    assert!(!page.has_free_line_pointers());
}

#[test]
fn test_repair_zeroes_unused_slots_with_storage() {
    let mut page = page_with_items(&[10, 20, 5]);
    let id = page.item_id(1).unwrap();
    page.set_item_id(1, ItemId::new(id.offset, LpState::Unused, id.length))
        .unwrap();

    assert_eq!(page.repair_fragmentation().unwrap(), vec![1]);
    assert_eq!(page.item_id(1), Some(ItemId::unused()));
    assert_eq!(page.upper() as usize, packed_upper(&[20, 5]));
    assert_eq!(
        page.add_item(b"again", Some(1), AddMode::Overwrite).unwrap(),
        Some(1)
    );
}

#[test]
fn test_repair_all_dead_resets_data_area() {
    let mut page = page_with_items(&[10, 20, 5]);
    for offnum in 1..=3 {
        page.mark_dead(offnum).unwrap();
    }

    assert_eq!(page.repair_fragmentation().unwrap(), vec![1, 2, 3]);
    assert_eq!(page.upper(), page.special());
    assert_eq!(page.max_offset_number(), 3);
    assert!(stored_offsets(&page).is_empty());
}

#[test]
fn test_repair_closes_gaps_between_items() {
    let lengths = [12, 40, 7, 64, 3];
    let items = items(&lengths);
    let mut page = scattered_page(&items, &[3, 0, 4, 1, 2], 24);
    let digest = live_items_digest(&page);

    page.repair_fragmentation().unwrap();

    assert_eq!(page.upper() as usize, packed_upper(&lengths));
    assert_eq!(live_items_digest(&page), digest);
    for (i, item) in items.iter().enumerate() {
        assert_eq!(page.item(i as u16 + 1), Some(item.as_slice()));
    }
}

#[test]
fn test_repair_keeps_redirect_pointers() {
    let mut page = page_with_items(&[10, 20]);
    page.add_item_with_state(b"", None, AddMode::Shuffle, LpState::Redirect)
        .unwrap();
    let redirect = page.item_id(3).unwrap();
    page.mark_dead(1).unwrap();

    assert_eq!(page.repair_fragmentation().unwrap(), vec![1]);
    assert_eq!(page.item_id(3), Some(redirect));
    assert_eq!(page.upper() as usize, packed_upper(&[20]));
}

#[test]
fn test_repair_is_idempotent() {
    let mut page = page_with_items(&[10, 20, 5, 30]);
    page.mark_dead(3).unwrap();

    let first = page.repair_fragmentation().unwrap();
    let snapshot = page.clone();
    let second = page.repair_fragmentation().unwrap();

    assert_eq!(first, second);
    assert_eq!(page, snapshot);
}

#[test]
fn test_repair_on_empty_page() {
    let mut page = Page::new(32).unwrap();

    assert!(page.repair_fragmentation().unwrap().is_empty());
    assert_eq!(page.upper(), page.special());
}

#[test]
fn test_repair_detects_out_of_range_item() {
    let mut page = page_with_items(&[10, 20, 5]);
    page.set_item_id(2, ItemId::new(8, LpState::Normal, 20)).unwrap();
    let snapshot = page.clone();

    let err = page.repair_fragmentation().unwrap_err();
    assert!(matches!(err, PageError::CorruptedItemPointer { offset: 8, .. }));
    assert!(err.is_corruption());
    assert!(!err.is_fatal());
    assert_eq!(page, snapshot);
}

#[test]
fn test_repair_detects_overlapping_items() {
    let mut page = page_with_items(&[16, 16, 16]);
    let first = page.item_id(1).unwrap();
    page.set_item_id(2, ItemId::new(first.offset - 8, LpState::Normal, 16))
        .unwrap();
    let snapshot = page.clone();

    assert!(matches!(
        page.repair_fragmentation(),
        Err(PageError::CorruptedItemPointer { .. })
    ));
    assert_eq!(page, snapshot);
}

#[test]
fn test_repair_detects_impossible_total_length() {
    let mut page = page_with_items(&[10, 20, 5]);
    page.add_item(&[0u8; 3000], None, AddMode::Shuffle).unwrap();
    // Each pointer is in range on its own, together they claim more than the page holds
    let big = page.item_id(4).unwrap();
    for offnum in 1..=3 {
        page.set_item_id(offnum, big).unwrap();
    }
    let snapshot = page.clone();

    let err = page.repair_fragmentation().unwrap_err();
    assert!(matches!(err, PageError::CorruptedItemLengths { total: 12000, .. }));
    assert_eq!(page, snapshot);
}
