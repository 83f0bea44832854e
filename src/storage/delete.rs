use tracing::{debug, error};

use crate::storage::compact::{
    ItemSortEntry, check_item_bounds, check_total_length, sort_for_repack,
};
use crate::types::{
    FIRST_OFFSET_NUMBER, ITEM_ID_SIZE, OffsetNumber, PAGE_HEADER_SIZE,
    error::{PageError, Result, Severity},
    item_id::ItemId,
    maxalign,
    page::{Page, item_id_position},
};

/// Batches at or below this size go through repeated [`Page::delete_item`].
///
/// Both paths produce the same page. Slots without storage keep their
/// pointer as is on either path.
pub const MULTI_DELETE_RETAIL_THRESHOLD: usize = 2;

/// `offnums` must be strictly increasing and name existing slots.
fn check_offset_list(offnums: &[OffsetNumber], max: OffsetNumber) -> Result<()> {
    let mut matched = 0;
    let mut prev = 0;
    for &offnum in offnums {
        if offnum <= prev || offnum > max {
            break;
        }
        prev = offnum;
        matched += 1;
    }
    if matched != offnums.len() {
        error!(supplied = offnums.len(), matched, "incorrect index offsets supplied");
        return Err(PageError::IncorrectOffsets {
            supplied: offnums.len(),
            matched,
        });
    }
    Ok(())
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Page<B> {
    /// Remove one item and its line pointer, closing both gaps.
    ///
    /// Every later slot is renumbered down by one. Costs O(items) per call, so
    /// batches should use [`Page::multi_delete`].
    pub fn delete_item(&mut self, offnum: OffsetNumber) -> Result<()> {
        let header = self.header();
        header.check_pointers(Severity::Recoverable)?;

        let nline = self.max_offset_number();
        if offnum < FIRST_OFFSET_NUMBER || offnum > nline {
            return Err(PageError::InvalidOffsetNumber { offnum, max: nline });
        }

        let target = self
            .read_item_id(offnum)
            .ok_or(PageError::InvalidOffsetNumber { offnum, max: nline })?;
        if target.has_storage() {
            check_item_bounds(&target, header.upper, header.special)?;
        }

        let offset = target.offset as usize;
        let size = maxalign(target.length as usize);
        let upper = header.upper as usize;
        let lower = header.lower as usize;

        let bytes = self.bytes_mut();
        // Close the hole in the line pointer array
        let next = item_id_position(offnum) + ITEM_ID_SIZE;
        if next < lower {
            bytes.copy_within(next..lower, item_id_position(offnum));
        }
        // Slide everything stored below the item up over it
        if offset > upper && size > 0 {
            bytes.copy_within(upper..offset, upper + size);
        }

        self.update_header(|h| {
            h.upper += size as u16;
            h.lower -= ITEM_ID_SIZE as u16;
        });

        if size > 0 {
            for i in FIRST_OFFSET_NUMBER..nline {
                let Some(mut id) = self.read_item_id(i) else {
                    continue;
                };
                if id.has_storage() && id.offset as usize <= offset {
                    id.offset += size as u16;
                    self.write_item_id(i, id);
                }
            }
        }

        debug!(offnum, size, "deleted item");
        Ok(())
    }

    /// Remove several items at once, compacting the line pointer array.
    ///
    /// `offnums` must be sorted ascending without duplicates. Surviving items
    /// are renumbered `1..=n` in their original order. On any error the page
    /// is left untouched.
    pub fn multi_delete(&mut self, offnums: &[OffsetNumber]) -> Result<()> {
        self.multi_delete_with_threshold(offnums, MULTI_DELETE_RETAIL_THRESHOLD)
    }

    /// [`Page::multi_delete`] with an explicit retail/batch cut-over.
    pub fn multi_delete_with_threshold(
        &mut self,
        offnums: &[OffsetNumber],
        retail_threshold: usize,
    ) -> Result<()> {
        let header = self.header();
        header.check_pointers(Severity::Recoverable)?;
        let nline = self.max_offset_number();

        if offnums.len() <= retail_threshold {
            check_offset_list(offnums, nline)?;
            for &offnum in offnums {
                if let Some(id) = self.read_item_id(offnum).filter(ItemId::has_storage) {
                    check_item_bounds(&id, header.upper, header.special)?;
                }
            }
            // Highest first, so earlier deletions never renumber later targets
            for &offnum in offnums.iter().rev() {
                self.delete_item(offnum)?;
            }
            return Ok(());
        }

        let mut entries = Vec::with_capacity(nline as usize);
        let mut total = 0usize;
        let mut next = 0usize;
        for (offnum, id) in self.item_ids() {
            if id.has_storage() {
                check_item_bounds(&id, header.upper, header.special)?;
            }
            if next < offnums.len() && offnum == offnums[next] {
                next += 1;
                continue;
            }
            let entry = ItemSortEntry::new(entries.len() as OffsetNumber + 1, id);
            total += entry.aligned_len;
            entries.push(entry);
        }

        // Anything not strictly increasing or past the last slot is left unmatched
        if next != offnums.len() {
            error!(supplied = offnums.len(), matched = next, "incorrect index offsets supplied");
            return Err(PageError::IncorrectOffsets {
                supplied: offnums.len(),
                matched: next,
            });
        }

        check_total_length(total, header.lower, header.special)?;
        let nused = entries.len();
        sort_for_repack(&mut entries)?;

        let upper = self.compactify(&entries, header.special as usize);
        self.update_header(|h| {
            h.lower = (PAGE_HEADER_SIZE + nused * ITEM_ID_SIZE) as u16;
            h.upper = upper as u16;
        });

        debug!(deleted = offnums.len(), remaining = nused, upper, "multi-deleted items");
        Ok(())
    }

    /// Delete items while keeping every surviving slot's offset number.
    ///
    /// Listed slots, plus any used slot without storage, become unused; the
    /// data area is defragmented; trailing unused line pointers are dropped.
    /// `offnums` must be sorted ascending and name used slots only. On any
    /// error the page is left untouched.
    pub fn delete_no_compact(&mut self, offnums: &[OffsetNumber]) -> Result<()> {
        let header = self.header();
        header.check_pointers(Severity::Recoverable)?;

        let mut ids: Vec<ItemId> = self.item_ids().map(|(_, id)| id).collect();
        let mut next = 0usize;
        let mut empty = true;
        for (index, id) in ids.iter_mut().enumerate() {
            if !id.is_used() {
                continue;
            }
            if id.has_storage() {
                check_item_bounds(id, header.upper, header.special)?;
            }
            let offnum = index as OffsetNumber + 1;
            if next < offnums.len() && offnum == offnums[next] {
                id.set_unused();
                next += 1;
            } else if id.has_storage() {
                empty = false;
            } else {
                id.set_unused();
            }
        }

        if next != offnums.len() {
            error!(supplied = offnums.len(), matched = next, "incorrect index offsets supplied");
            return Err(PageError::IncorrectOffsets {
                supplied: offnums.len(),
                matched: next,
            });
        }

        if empty {
            debug!(deleted = offnums.len(), "no live items left, resetting page");
            self.update_header(|h| {
                h.lower = PAGE_HEADER_SIZE as u16;
                h.upper = h.special;
            });
            self.clear_has_free_line_pointers();
            return Ok(());
        }

        let mut entries: Vec<ItemSortEntry> = ids
            .iter()
            .enumerate()
            .filter(|(_, id)| id.is_used())
            .map(|(index, id)| ItemSortEntry::new(index as OffsetNumber + 1, *id))
            .collect();
        let total: usize = entries.iter().map(|e| e.aligned_len).sum();
        check_total_length(total, header.lower, header.special)?;
        sort_for_repack(&mut entries)?;

        // Highest surviving slot bounds the new line pointer array
        let keep = ids.iter().rposition(|id| id.is_used()).map_or(0, |i| i + 1);
        let mut has_free = false;
        for (index, id) in ids.iter().enumerate().take(keep) {
            if !id.is_used() {
                has_free = true;
                self.write_item_id(index as OffsetNumber + 1, ItemId::unused());
            }
        }

        let upper = self.compactify(&entries, header.special as usize);
        self.update_header(|h| {
            h.lower = (PAGE_HEADER_SIZE + keep * ITEM_ID_SIZE) as u16;
            h.upper = upper as u16;
        });
        if has_free {
            self.set_has_free_line_pointers();
        } else {
            self.clear_has_free_line_pointers();
        }

        debug!(
            deleted = offnums.len(),
            remaining = entries.len(),
            slots = keep,
            upper,
            "deleted items without compacting line pointers"
        );
        Ok(())
    }
}
