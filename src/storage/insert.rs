use tracing::{trace, warn};

use crate::types::{
    FIRST_OFFSET_NUMBER, INVALID_OFFSET_NUMBER, ITEM_ID_SIZE, OffsetNumber,
    error::{Result, Severity},
    item_id::{ItemId, LpState},
    maxalign,
    page::{Page, item_id_position},
};

/// What to do when the caller names an offset number that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddMode {
    /// Shift the existing line pointers from the target onward up by one slot.
    #[default]
    Shuffle,
    /// Reuse the target slot, which must be unused and deallocated.
    Overwrite,
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Page<B> {
    /// Add a normal item to the page. See [`Page::add_item_with_state`].
    pub fn add_item(
        &mut self,
        item: &[u8],
        target: Option<OffsetNumber>,
        mode: AddMode,
    ) -> Result<Option<OffsetNumber>> {
        self.add_item_with_state(item, target, mode, LpState::Normal)
    }

    /// Copy `item` into the page and point a line pointer at it.
    ///
    /// Returns the offset number the item landed on, or `Ok(None)` when the
    /// page has no room or the requested slot cannot be used. Only corrupted
    /// header pointers produce an error, and that error is
    /// [`Severity::Fatal`]: the buffer is presumed shared and must not be
    /// touched further.
    pub fn add_item_with_state(
        &mut self,
        item: &[u8],
        target: Option<OffsetNumber>,
        mode: AddMode,
        state: LpState,
    ) -> Result<Option<OffsetNumber>> {
        let header = self.header();
        header.check_pointers(Severity::Fatal)?;

        let limit = self.max_offset_number() + 1;
        let mut needshuffle = false;

        let offnum = match target.filter(|&offnum| offnum != INVALID_OFFSET_NUMBER) {
            Some(offnum) => {
                match mode {
                    AddMode::Overwrite if offnum < limit => {
                        let existing = self.read_item_id(offnum).unwrap_or_default();
                        if existing.is_used() || existing.length != 0 {
                            warn!(offnum, "will not overwrite a used item id");
                            return Ok(None);
                        }
                    }
                    AddMode::Shuffle if offnum < limit => needshuffle = true,
                    _ => {}
                }
                offnum
            }
            None if self.has_free_line_pointers() => {
                match (FIRST_OFFSET_NUMBER..limit).find(|&offnum| {
                    self.read_item_id(offnum)
                        .is_some_and(|id| id.is_recyclable())
                }) {
                    Some(offnum) => offnum,
                    None => {
                        // the hint was stale
                        self.clear_has_free_line_pointers();
                        limit
                    }
                }
            }
            None => limit,
        };

        if offnum > limit {
            warn!(offnum, limit, "specified item offset is too large");
            return Ok(None);
        }

        let aligned_size = maxalign(item.len());
        let lower = if offnum == limit || needshuffle {
            header.lower as i32 + ITEM_ID_SIZE as i32
        } else {
            header.lower as i32
        };
        let upper = header.upper as i32 - aligned_size as i32;
        if lower > upper {
            return Ok(None);
        }

        let upper = upper as usize;
        let bytes = self.bytes_mut();
        if needshuffle {
            let start = item_id_position(offnum);
            let end = item_id_position(limit);
            bytes.copy_within(start..end, start + ITEM_ID_SIZE);
        }
        bytes[upper..upper + item.len()].copy_from_slice(item);

        self.write_item_id(offnum, ItemId::new(upper as u16, state, item.len() as u16));
        self.update_header(|h| {
            h.lower = lower as u16;
            h.upper = upper as u16;
        });

        trace!(offnum, len = item.len(), upper, "added item");
        Ok(Some(offnum))
    }
}
