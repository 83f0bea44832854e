use tracing::error;

use crate::types::{
    MAXALIGN, PAGE_HEADER_SIZE, PAGE_LAYOUT_VERSION, PAGE_SIZE,
    error::{PageError, Severity},
};

/// Hint that at least one line pointer is unused and deallocated.
pub const PD_HAS_FREE_LINES: u16 = 0x0001;
/// Hint that a recent insert found no room on the page.
pub const PD_PAGE_FULL: u16 = 0x0002;
pub const PD_VALID_FLAG_BITS: u16 = PD_HAS_FREE_LINES | PD_PAGE_FULL;

const LSN_OFFSET: usize = 0;
const TLI_OFFSET: usize = 8;
const FLAGS_OFFSET: usize = 10;
const LOWER_OFFSET: usize = 12;
const UPPER_OFFSET: usize = 14;
const SPECIAL_OFFSET: usize = 16;
const SIZE_VERSION_OFFSET: usize = 18;
const PRUNE_XID_OFFSET: usize = 20;

/*
 * Page Header Layout (24 bytes, little-endian)
 * ┌──────────┬─────────┬──────────┬──────────┬──────────┬────────────┬──────────────────┬───────────────┐
 * │ lsn(8)   │ tli(2)  │ flags(2) │ lower(2) │ upper(2) │ special(2) │ size|version(2)  │ prune_xid(4)  │
 * └──────────┴─────────┴──────────┴──────────┴──────────┴────────────┴──────────────────┴───────────────┘
 */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageHeader {
    pub lsn: u64,
    pub tli: u16,
    pub flags: u16,
    pub lower: u16,
    pub upper: u16,
    pub special: u16,
    pub pagesize_version: u16,
    pub prune_xid: u32,
}

impl PageHeader {
    pub fn to_bytes(&self) -> [u8; PAGE_HEADER_SIZE] {
        let mut buffer = [0u8; PAGE_HEADER_SIZE];
        self.write_to(&mut buffer);
        buffer
    }

    pub fn write_to(&self, bytes: &mut [u8]) {
        bytes[LSN_OFFSET..LSN_OFFSET + 8].copy_from_slice(&self.lsn.to_le_bytes());
        write_u16(bytes, TLI_OFFSET, self.tli);
        write_u16(bytes, FLAGS_OFFSET, self.flags);
        write_u16(bytes, LOWER_OFFSET, self.lower);
        write_u16(bytes, UPPER_OFFSET, self.upper);
        write_u16(bytes, SPECIAL_OFFSET, self.special);
        write_u16(bytes, SIZE_VERSION_OFFSET, self.pagesize_version);
        bytes[PRUNE_XID_OFFSET..PRUNE_XID_OFFSET + 4]
            .copy_from_slice(&self.prune_xid.to_le_bytes());
    }

    /// Decode the header from the first [`PAGE_HEADER_SIZE`] bytes of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let lsn = u64::from_le_bytes([
            bytes[LSN_OFFSET],
            bytes[LSN_OFFSET + 1],
            bytes[LSN_OFFSET + 2],
            bytes[LSN_OFFSET + 3],
            bytes[LSN_OFFSET + 4],
            bytes[LSN_OFFSET + 5],
            bytes[LSN_OFFSET + 6],
            bytes[LSN_OFFSET + 7],
        ]);
        let prune_xid = u32::from_le_bytes([
            bytes[PRUNE_XID_OFFSET],
            bytes[PRUNE_XID_OFFSET + 1],
            bytes[PRUNE_XID_OFFSET + 2],
            bytes[PRUNE_XID_OFFSET + 3],
        ]);

        Self {
            lsn,
            tli: read_u16(bytes, TLI_OFFSET),
            flags: read_u16(bytes, FLAGS_OFFSET),
            lower: read_u16(bytes, LOWER_OFFSET),
            upper: read_u16(bytes, UPPER_OFFSET),
            special: read_u16(bytes, SPECIAL_OFFSET),
            pagesize_version: read_u16(bytes, SIZE_VERSION_OFFSET),
            prune_xid,
        }
    }

    pub fn page_size(&self) -> usize {
        (self.pagesize_version & 0xFF00) as usize
    }

    pub fn layout_version(&self) -> u8 {
        (self.pagesize_version & 0x00FF) as u8
    }

    pub fn set_page_size_and_version(&mut self, page_size: usize, version: u8) {
        self.pagesize_version = (page_size as u16 & 0xFF00) | version as u16;
    }

    fn pointers_in_order(&self) -> bool {
        self.lower as usize >= PAGE_HEADER_SIZE
            && self.lower <= self.upper
            && self.upper <= self.special
            && self.special as usize <= PAGE_SIZE
            && self.special as usize % MAXALIGN == 0
    }

    /// Check `header ≤ lower ≤ upper ≤ special ≤ PAGE_SIZE` with an aligned `special`.
    ///
    /// Mutating operations call this before trusting any offset on the page.
    pub fn check_pointers(&self, severity: Severity) -> Result<(), PageError> {
        if self.pointers_in_order() {
            return Ok(());
        }
        error!(
            lower = self.lower,
            upper = self.upper,
            special = self.special,
            %severity,
            "corrupted page pointers"
        );
        Err(PageError::CorruptedPointers {
            lower: self.lower,
            upper: self.upper,
            special: self.special,
            severity,
        })
    }

    /// Full validation of a header that was just read from storage.
    ///
    /// Does not accept the all-zero page; see `Page::validate_header` for that.
    pub fn verify(&self) -> Result<(), PageError> {
        if self.page_size() != PAGE_SIZE {
            return Err(PageError::InvalidHeader {
                reason: format!("Unsupported page size: {}", self.page_size()),
            });
        }
        if self.layout_version() != PAGE_LAYOUT_VERSION {
            return Err(PageError::InvalidHeader {
                reason: format!("Unsupported layout version: {}", self.layout_version()),
            });
        }
        if self.flags & !PD_VALID_FLAG_BITS != 0 {
            return Err(PageError::InvalidHeader {
                reason: format!("Unknown flag bits: {:#06x}", self.flags),
            });
        }
        if !self.pointers_in_order() {
            return Err(PageError::InvalidHeader {
                reason: format!(
                    "Pointers out of order: lower = {}, upper = {}, special = {}",
                    self.lower, self.upper, self.special
                ),
            });
        }
        Ok(())
    }
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn write_u16(bytes: &mut [u8], offset: usize, value: u16) {
    bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}
