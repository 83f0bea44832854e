use tracing::trace;

use crate::storage::header::{PD_HAS_FREE_LINES, PD_PAGE_FULL, PageHeader};
use crate::types::{
    FIRST_OFFSET_NUMBER, ITEM_ID_SIZE, OffsetNumber, PAGE_HEADER_SIZE, PAGE_LAYOUT_VERSION,
    PAGE_SIZE,
    error::{PageError, Result},
    item_id::{ItemId, LpState},
    maxalign,
};

/*
 * Page Layout (PAGE_SIZE bytes)
 * ┌─────────────────────────────────────────────────────────────────┐
 * │                    PAGE HEADER (24 bytes)                       │
 * ├─────────────────────────────────────────────────────────────────┤
 * │  LINE POINTERS  [lp1] [lp2] [lp3] ...  (4 bytes each)  → lower  │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                    FREE SPACE                                   │
 * ├─────────────────────────────────────────────────────────────────┤
 * │  upper →  ITEM DATA  [...item 3...] [...item 2...] [...item 1...]│
 * ├─────────────────────────────────────────────────────────────────┤
 * │  special →  ACCESS-METHOD SPECIAL SPACE                         │
 * └─────────────────────────────────────────────────────────────────┘
 */

/// A view over one fixed-size page buffer.
///
/// The buffer may be owned (`Vec<u8>`) or borrowed from a buffer pool frame
/// (`&mut [u8]`). All state lives in the bytes and the view caches nothing.
/// The holder must have exclusive access for the duration of a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<B = Vec<u8>> {
    buf: B,
}

impl Page<Vec<u8>> {
    /// Allocate and initialize an empty page with `special_size` bytes of special space.
    pub fn new(special_size: usize) -> Result<Self> {
        let mut page = Self::zeroed();
        page.init(PAGE_SIZE, special_size)?;
        Ok(page)
    }

    /// An all-zero page, as found in a freshly extended file.
    pub fn zeroed() -> Self {
        Self {
            buf: vec![0u8; PAGE_SIZE],
        }
    }

    /// Copy a page image read from storage.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        check_len(bytes.len())?;
        Ok(Self {
            buf: bytes.to_vec(),
        })
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

fn check_len(actual: usize) -> Result<()> {
    if actual != PAGE_SIZE {
        return Err(PageError::InvalidBufferSize {
            expected: PAGE_SIZE,
            actual,
        });
    }
    Ok(())
}

#[inline]
pub(crate) fn item_id_position(offnum: OffsetNumber) -> usize {
    PAGE_HEADER_SIZE + (offnum as usize - 1) * ITEM_ID_SIZE
}

impl<B: AsRef<[u8]>> Page<B> {
    /// Wrap an existing buffer without copying it.
    pub fn from_buffer(buf: B) -> Result<Self> {
        check_len(buf.as_ref().len())?;
        Ok(Self { buf })
    }

    pub fn into_inner(self) -> B {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_ref()
    }

    pub fn to_owned_page(&self) -> Page<Vec<u8>> {
        Page {
            buf: self.as_bytes().to_vec(),
        }
    }

    pub fn header(&self) -> PageHeader {
        PageHeader::from_bytes(self.as_bytes())
    }

    pub fn lower(&self) -> u16 {
        self.header().lower
    }

    pub fn upper(&self) -> u16 {
        self.header().upper
    }

    pub fn special(&self) -> u16 {
        self.header().special
    }

    pub fn flags(&self) -> u16 {
        self.header().flags
    }

    pub fn lsn(&self) -> u64 {
        self.header().lsn
    }

    pub fn tli(&self) -> u16 {
        self.header().tli
    }

    pub fn prune_xid(&self) -> u32 {
        self.header().prune_xid
    }

    pub fn page_size(&self) -> usize {
        self.header().page_size()
    }

    pub fn layout_version(&self) -> u8 {
        self.header().layout_version()
    }

    /// A page that was never initialized (its `upper` is still zero).
    pub fn is_new(&self) -> bool {
        self.upper() == 0
    }

    /// No line pointers at all.
    pub fn is_empty(&self) -> bool {
        self.lower() as usize <= PAGE_HEADER_SIZE
    }

    pub fn is_all_zero(&self) -> bool {
        self.as_bytes().iter().all(|&b| b == 0)
    }

    pub fn has_free_line_pointers(&self) -> bool {
        self.flags() & PD_HAS_FREE_LINES != 0
    }

    pub fn is_full(&self) -> bool {
        self.flags() & PD_PAGE_FULL != 0
    }

    /// Cheap sanity check for a page that was just read from storage.
    ///
    /// Accepts both a well-formed header and an all-zero page (a page whose
    /// file extension was never followed by a write).
    pub fn validate_header(&self) -> bool {
        self.verify_header().is_ok()
    }

    /// Like [`Page::validate_header`], reporting why the header was rejected.
    pub fn verify_header(&self) -> Result<()> {
        match self.header().verify() {
            Ok(()) => Ok(()),
            Err(_) if self.is_all_zero() => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Number of line pointers, i.e. the highest offset number in use.
    pub fn max_offset_number(&self) -> OffsetNumber {
        let lower = self.lower() as usize;
        if lower <= PAGE_HEADER_SIZE {
            return 0;
        }
        ((lower - PAGE_HEADER_SIZE) / ITEM_ID_SIZE) as OffsetNumber
    }

    pub fn item_id(&self, offnum: OffsetNumber) -> Option<ItemId> {
        if offnum < FIRST_OFFSET_NUMBER || offnum > self.max_offset_number() {
            return None;
        }
        self.read_item_id(offnum)
    }

    pub(crate) fn read_item_id(&self, offnum: OffsetNumber) -> Option<ItemId> {
        let pos = item_id_position(offnum);
        let bytes = self.as_bytes().get(pos..pos + ITEM_ID_SIZE)?;
        Some(ItemId::from_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// All line pointers paired with their offset numbers.
    pub fn item_ids(&self) -> impl Iterator<Item = (OffsetNumber, ItemId)> + '_ {
        (FIRST_OFFSET_NUMBER..=self.max_offset_number())
            .filter_map(|offnum| self.item_id(offnum).map(|id| (offnum, id)))
    }

    /// Bytes of the item stored at `offnum`, if that slot is used and not a redirect.
    ///
    /// A zero-length item reads back as an empty slice.
    pub fn item(&self, offnum: OffsetNumber) -> Option<&[u8]> {
        let id = self.item_id(offnum)?;
        if !id.is_used() || id.state == LpState::Redirect {
            return None;
        }
        if !id.has_storage() {
            return Some(&[]);
        }
        let start = id.offset as usize;
        self.as_bytes().get(start..start + id.length as usize)
    }

    pub fn special_area(&self) -> &[u8] {
        let special = (self.special() as usize).min(PAGE_SIZE);
        &self.as_bytes()[special..]
    }

    /// Free space available to a new item, after reserving room for its line pointer.
    pub fn free_space(&self) -> usize {
        let header = self.header();
        // Signed so an inverted lower/upper pair reads as "no space"
        let space = header.upper as i32 - header.lower as i32;
        if space < ITEM_ID_SIZE as i32 {
            return 0;
        }
        (space - ITEM_ID_SIZE as i32) as usize
    }

    /// Raw gap between the line pointer array and the item data.
    ///
    /// Callers reusing an existing line pointer need no reservation for one.
    pub fn exact_free_space(&self) -> isize {
        let header = self.header();
        header.upper as isize - header.lower as isize
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Page<B> {
    /// Zero the buffer and lay down an empty page with `special_size` bytes of special space.
    pub fn init(&mut self, page_size: usize, special_size: usize) -> Result<()> {
        if page_size != PAGE_SIZE || special_size > page_size {
            return Err(PageError::InvalidInitParams {
                page_size,
                special_size,
            });
        }
        let special_size = maxalign(special_size);
        if special_size + PAGE_HEADER_SIZE > page_size {
            return Err(PageError::InvalidInitParams {
                page_size,
                special_size,
            });
        }

        self.bytes_mut().fill(0);
        let mut header = PageHeader {
            lower: PAGE_HEADER_SIZE as u16,
            upper: (page_size - special_size) as u16,
            special: (page_size - special_size) as u16,
            ..Default::default()
        };
        header.set_page_size_and_version(page_size, PAGE_LAYOUT_VERSION);
        self.write_header(&header);
        trace!(special_size, "initialized page");
        Ok(())
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        self.buf.as_mut()
    }

    pub(crate) fn write_header(&mut self, header: &PageHeader) {
        header.write_to(self.bytes_mut());
    }

    pub(crate) fn update_header(&mut self, f: impl FnOnce(&mut PageHeader)) {
        let mut header = self.header();
        f(&mut header);
        self.write_header(&header);
    }

    pub(crate) fn write_item_id(&mut self, offnum: OffsetNumber, id: ItemId) {
        let pos = item_id_position(offnum);
        self.bytes_mut()[pos..pos + ITEM_ID_SIZE].copy_from_slice(&id.to_bytes());
    }

    pub fn set_lsn(&mut self, lsn: u64) {
        self.update_header(|h| h.lsn = lsn);
    }

    pub fn set_tli(&mut self, tli: u16) {
        self.update_header(|h| h.tli = tli);
    }

    pub fn set_prune_xid(&mut self, xid: u32) {
        self.update_header(|h| h.prune_xid = xid);
    }

    pub fn set_has_free_line_pointers(&mut self) {
        self.update_header(|h| h.flags |= PD_HAS_FREE_LINES);
    }

    pub fn clear_has_free_line_pointers(&mut self) {
        self.update_header(|h| h.flags &= !PD_HAS_FREE_LINES);
    }

    pub fn set_full(&mut self) {
        self.update_header(|h| h.flags |= PD_PAGE_FULL);
    }

    pub fn clear_full(&mut self) {
        self.update_header(|h| h.flags &= !PD_PAGE_FULL);
    }

    /// Overwrite the line pointer at `offnum`.
    pub fn set_item_id(&mut self, offnum: OffsetNumber, id: ItemId) -> Result<()> {
        let max = self.max_offset_number();
        if offnum < FIRST_OFFSET_NUMBER || offnum > max {
            return Err(PageError::InvalidOffsetNumber { offnum, max });
        }
        self.write_item_id(offnum, id);
        Ok(())
    }

    /// Flag the item at `offnum` as dead. Its storage stays put until the page is repaired.
    pub fn mark_dead(&mut self, offnum: OffsetNumber) -> Result<()> {
        let max = self.max_offset_number();
        let mut id = self
            .item_id(offnum)
            .ok_or(PageError::InvalidOffsetNumber { offnum, max })?;
        id.state = LpState::Dead;
        self.write_item_id(offnum, id);
        Ok(())
    }

    pub fn special_area_mut(&mut self) -> &mut [u8] {
        let special = (self.special() as usize).min(PAGE_SIZE);
        &mut self.bytes_mut()[special..]
    }
}
