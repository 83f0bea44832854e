use halaman::{
    storage::{AddMode, PageHeader, header::PD_HAS_FREE_LINES},
    types::{
        ITEM_ID_SIZE, PAGE_HEADER_SIZE, PAGE_LAYOUT_VERSION, PAGE_SIZE,
        error::{PageError, Severity},
        item_id::{ItemId, LpState},
        page::Page,
    },
    utils::mock::{page_with_items, sample_item},
};

fn rewrite_header(page: &Page, f: impl FnOnce(&mut PageHeader)) -> Page {
    let mut header = page.header();
    f(&mut header);
    let mut bytes = page.as_bytes().to_vec();
    header.write_to(&mut bytes);
    Page::from_bytes(&bytes).unwrap()
}

#[test]
fn test_init_lays_down_empty_page() {
    let page = Page::new(0).unwrap();

    assert_eq!(page.lower() as usize, PAGE_HEADER_SIZE);
    assert_eq!(page.upper() as usize, PAGE_SIZE);
    assert_eq!(page.special() as usize, PAGE_SIZE);
    assert_eq!(page.page_size(), PAGE_SIZE);
    assert_eq!(page.layout_version(), PAGE_LAYOUT_VERSION);
    assert_eq!(page.flags(), 0);
    assert_eq!(page.lsn(), 0);
    assert_eq!(page.prune_xid(), 0);
    assert!(page.is_empty());
    assert!(!page.is_new());
    assert!(page.validate_header());
}

#[test]
fn test_init_aligns_special_space() {
    let page = Page::new(10).unwrap();

    assert_eq!(page.special() as usize, PAGE_SIZE - 16);
    assert_eq!(page.upper(), page.special());
    assert_eq!(page.special_area().len(), 16);
    assert!(page.validate_header());
}

#[test]
fn test_init_rejects_bad_parameters() {
    let mut page = Page::zeroed();

    let err = page.init(4096, 0).unwrap_err();
    assert!(matches!(err, PageError::InvalidInitParams { page_size: 4096, .. }));
    assert_eq!(err.severity(), Severity::Fatal);

    let err = page.init(PAGE_SIZE, PAGE_SIZE).unwrap_err();
    assert!(err.is_fatal());
    assert!(page.is_all_zero());

    for special_size in [PAGE_SIZE + 1, usize::MAX - 3, usize::MAX] {
        let err = page.init(PAGE_SIZE, special_size).unwrap_err();
        assert!(matches!(err, PageError::InvalidInitParams { .. }));
        assert!(err.is_fatal());
    }
    assert!(matches!(
        Page::new(usize::MAX),
        Err(PageError::InvalidInitParams { .. })
    ));
    assert!(page.is_all_zero());
}

#[test]
fn test_init_clears_previous_contents() {
    let mut page = page_with_items(&[10, 20, 5]);
    page.set_lsn(42);

    page.init(PAGE_SIZE, 0).unwrap();
    assert_eq!(page.max_offset_number(), 0);
    assert_eq!(page.lsn(), 0);
    assert!(page.as_bytes()[PAGE_HEADER_SIZE..].iter().all(|&b| b == 0));
}

#[test]
fn test_all_zero_page_is_valid() {
    let page = Page::zeroed();

    assert!(page.is_new());
    assert!(page.is_all_zero());
    assert!(page.validate_header());
    assert!(page.verify_header().is_ok());
}

#[test]
fn test_nonzero_garbage_is_invalid() {
    let mut bytes = vec![0u8; PAGE_SIZE];
    bytes[PAGE_SIZE - 1] = 1;
    let page = Page::from_bytes(&bytes).unwrap();

    assert!(!page.validate_header());
    assert!(matches!(
        page.verify_header(),
        Err(PageError::InvalidHeader { .. })
    ));
}

#[test]
fn test_validate_detects_corrupt_headers() {
    let page = Page::new(0).unwrap();

    let inverted = rewrite_header(&page, |h| {
        h.lower = 200;
        h.upper = 100;
    });
    assert!(!inverted.validate_header());

    let oversized = rewrite_header(&page, |h| h.special = PAGE_SIZE as u16 + 8);
    assert!(!oversized.validate_header());

    let wrong_version = rewrite_header(&page, |h| {
        h.set_page_size_and_version(PAGE_SIZE, PAGE_LAYOUT_VERSION + 1)
    });
    assert!(!wrong_version.validate_header());

    let bad_flags = rewrite_header(&page, |h| h.flags = 0x8000);
    assert!(!bad_flags.validate_header());

    let low_lower = rewrite_header(&page, |h| h.lower = 8);
    assert!(!low_lower.validate_header());

    let hinted = rewrite_header(&page, |h| h.flags = PD_HAS_FREE_LINES);
    assert!(hinted.validate_header());
}

#[test]
fn test_page_from_storage_round_trip() {
    let mut page = page_with_items(&[10, 20, 5]);
    page.set_lsn(0x0000_0001_0000_0A00);
    page.set_tli(3);
    page.set_prune_xid(900);

    let restored = Page::from_bytes(page.as_bytes()).unwrap();
    assert_eq!(restored, page);
    assert_eq!(restored.lsn(), 0x0000_0001_0000_0A00);
    assert_eq!(restored.tli(), 3);
    assert_eq!(restored.prune_xid(), 900);
    assert_eq!(restored.item(2), Some(sample_item(1, 20).as_slice()));
}

#[test]
fn test_free_space_accounting() {
    let mut page = Page::new(0).unwrap();
    let fresh = PAGE_SIZE - PAGE_HEADER_SIZE - ITEM_ID_SIZE;
    assert_eq!(page.free_space(), fresh);
    assert_eq!(page.exact_free_space(), (PAGE_SIZE - PAGE_HEADER_SIZE) as isize);

    page.add_item(&[1u8; 10], None, AddMode::Shuffle).unwrap();
    assert_eq!(page.free_space(), fresh - 16 - ITEM_ID_SIZE);
}

#[test]
fn test_free_space_never_negative() {
    let page = Page::new(0).unwrap();
    let inverted = rewrite_header(&page, |h| {
        h.lower = 300;
        h.upper = 298;
    });

    assert_eq!(inverted.free_space(), 0);
    assert_eq!(inverted.exact_free_space(), -2);
}

#[test]
fn test_item_accessors() {
    let mut page = page_with_items(&[10, 20]);

    assert_eq!(page.item(1), Some(sample_item(0, 10).as_slice()));
    assert_eq!(page.item(0), None);
    assert_eq!(page.item(3), None);
    assert_eq!(page.item_id(3), None);
    assert_eq!(page.item_ids().count(), 2);

    page.mark_dead(1).unwrap();
    assert_eq!(page.item_id(1).map(|id| id.state), Some(LpState::Dead));
    assert!(page.item(1).is_some());

    page.set_item_id(1, ItemId::unused()).unwrap();
    assert_eq!(page.item(1), None);
    assert!(matches!(
        page.set_item_id(3, ItemId::unused()),
        Err(PageError::InvalidOffsetNumber { offnum: 3, max: 2 })
    ));
    assert!(page.mark_dead(0).is_err());
}

#[test]
fn test_flag_setters() {
    let mut page = Page::new(0).unwrap();

    page.set_has_free_line_pointers();
    page.set_full();
    assert!(page.has_free_line_pointers());
    assert!(page.is_full());
    assert!(page.validate_header());

    page.clear_has_free_line_pointers();
    page.clear_full();
    assert_eq!(page.flags(), 0);
}

#[test]
fn test_special_area_is_writable() {
    let mut page = Page::new(16).unwrap();
    page.special_area_mut().copy_from_slice(&[7u8; 16]);
    page.add_item(&[1u8; 100], None, AddMode::Shuffle).unwrap();

    assert_eq!(page.special_area(), &[7u8; 16]);
}

#[test]
fn test_temp_copy_keeps_header_and_special() {
    let mut page = Page::new(16).unwrap();
    page.set_lsn(77);
    page.special_area_mut().copy_from_slice(&[9u8; 16]);
    page.add_item(b"payload", None, AddMode::Shuffle).unwrap();

    let temp = page.temp_copy(16);
    assert_eq!(temp.lower() as usize, PAGE_HEADER_SIZE);
    assert_eq!(temp.upper() as usize, PAGE_SIZE - 16);
    assert_eq!(temp.lsn(), 77);
    assert_eq!(temp.special_area(), &[9u8; 16]);
    assert_eq!(temp.max_offset_number(), 0);
    assert!(temp.as_bytes()[PAGE_HEADER_SIZE..PAGE_SIZE - 16]
        .iter()
        .all(|&b| b == 0));
}

#[test]
fn test_restore_from_temp_page() {
    let mut page = page_with_items(&[10, 20, 5]);
    let mut temp = page.temp_copy(0);
    temp.add_item(b"rebuilt", None, AddMode::Shuffle).unwrap();

    page.restore_from(temp);
    assert_eq!(page.max_offset_number(), 1);
    assert_eq!(page.item(1), Some(b"rebuilt".as_slice()));
    assert!(page.validate_header());
}

#[test]
fn test_operations_on_borrowed_frame() {
    let mut frame = vec![0u8; PAGE_SIZE];
    {
        let mut page = Page::from_buffer(frame.as_mut_slice()).unwrap();
        page.init(PAGE_SIZE, 0).unwrap();
        page.add_item(b"in place", None, AddMode::Shuffle).unwrap();
    }

    let page = Page::from_buffer(frame.as_slice()).unwrap();
    assert_eq!(page.item(1), Some(b"in place".as_slice()));
    assert!(Page::from_buffer(&frame[..100]).is_err());
}
