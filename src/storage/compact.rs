use std::cmp::Ordering;

use tracing::{debug, error};

use crate::types::{
    MAXALIGN, OffsetNumber,
    error::{PageError, Result, Severity},
    item_id::ItemId,
    maxalign,
    page::Page,
};

/// A line pointer that survives a compaction, and where its data sits today.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ItemSortEntry {
    /// Slot the line pointer is written back to.
    pub(crate) slot: OffsetNumber,
    pub(crate) item_off: usize,
    pub(crate) aligned_len: usize,
    pub(crate) item_id: ItemId,
}

impl ItemSortEntry {
    pub(crate) fn new(slot: OffsetNumber, item_id: ItemId) -> Self {
        let aligned_len = if item_id.has_storage() {
            maxalign(item_id.length as usize)
        } else {
            0
        };
        Self {
            slot,
            item_off: item_id.offset as usize,
            aligned_len,
            item_id,
        }
    }
}

/// Orders entries by decreasing data offset, highest item first.
pub(crate) fn item_off_descending(a: &ItemSortEntry, b: &ItemSortEntry) -> Ordering {
    b.item_off.cmp(&a.item_off)
}

/// Reject an item whose aligned extent falls outside `[upper, special)` or starts unaligned.
pub(crate) fn check_item_bounds(id: &ItemId, upper: u16, special: u16) -> Result<()> {
    let offset = id.offset as usize;
    let end = offset + maxalign(id.length as usize);
    if offset < upper as usize || end > special as usize || offset % MAXALIGN != 0 {
        error!(offset, size = id.length, upper, special, "corrupted item pointer");
        return Err(PageError::CorruptedItemPointer {
            offset: id.offset,
            size: id.length,
        });
    }
    Ok(())
}

pub(crate) fn check_total_length(total: usize, lower: u16, special: u16) -> Result<()> {
    let available = special.saturating_sub(lower) as usize;
    if total > available {
        error!(total, available, "corrupted item lengths");
        return Err(PageError::CorruptedItemLengths { total, available });
    }
    Ok(())
}

/// Sort `entries` for [`Page::compactify`] and make sure no two stored items overlap.
///
/// Non-overlap is what makes the top-down repack safe: once sorted, every
/// unprocessed source range lies strictly below the one being copied.
pub(crate) fn sort_for_repack(entries: &mut [ItemSortEntry]) -> Result<()> {
    entries.sort_by(item_off_descending);

    let mut above: Option<&ItemSortEntry> = None;
    for entry in entries.iter().filter(|e| e.aligned_len > 0) {
        if let Some(prev) = above {
            if entry.item_off + entry.aligned_len > prev.item_off {
                error!(
                    offset = entry.item_off,
                    size = entry.item_id.length,
                    overlaps = prev.item_off,
                    "corrupted item pointer"
                );
                return Err(PageError::CorruptedItemPointer {
                    offset: entry.item_id.offset,
                    size: entry.item_id.length,
                });
            }
        }
        above = Some(entry);
    }
    Ok(())
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Page<B> {
    /// Pack the items of `entries` tightly against `special` and install their line pointers.
    ///
    /// `entries` must already be ordered by [`sort_for_repack`]. Returns the new `upper`.
    pub(crate) fn compactify(&mut self, entries: &[ItemSortEntry], special: usize) -> usize {
        let mut upper = special;
        for entry in entries {
            if entry.aligned_len == 0 {
                self.write_item_id(entry.slot, entry.item_id);
                continue;
            }
            upper -= entry.aligned_len;
            // Destination never starts below the source, and all unmoved sources lie below it
            debug_assert!(upper >= entry.item_off);
            self.bytes_mut().copy_within(
                entry.item_off..entry.item_off + entry.aligned_len,
                upper,
            );
            self.write_item_id(
                entry.slot,
                ItemId {
                    offset: upper as u16,
                    ..entry.item_id
                },
            );
        }
        upper
    }

    /// Squeeze out the holes between stored items without renumbering any slot.
    ///
    /// Dead line pointers become unused first. Every unused slot ends up with
    /// zero length so `add_item` may recycle it. Returns the offset numbers of
    /// the unused slots.
    pub fn repair_fragmentation(&mut self) -> Result<Vec<OffsetNumber>> {
        let header = self.header();
        header.check_pointers(Severity::Recoverable)?;

        let mut entries = Vec::new();
        let mut unused = Vec::new();
        let mut total = 0usize;
        for (offnum, id) in self.item_ids() {
            if !id.is_used() || id.is_dead() {
                unused.push(offnum);
                continue;
            }
            if id.has_storage() {
                check_item_bounds(&id, header.upper, header.special)?;
            }
            let entry = ItemSortEntry::new(offnum, id);
            total += entry.aligned_len;
            entries.push(entry);
        }

        check_total_length(total, header.lower, header.special)?;
        sort_for_repack(&mut entries)?;

        for &offnum in &unused {
            self.write_item_id(offnum, ItemId::unused());
        }

        let upper = if entries.iter().all(|e| e.aligned_len == 0) {
            debug!(unused = unused.len(), "page holds no stored items, resetting data area");
            header.special as usize
        } else {
            self.compactify(&entries, header.special as usize)
        };

        self.update_header(|h| h.upper = upper as u16);
        if unused.is_empty() {
            self.clear_has_free_line_pointers();
        } else {
            self.set_has_free_line_pointers();
        }

        debug!(
            upper,
            reclaimed = upper.saturating_sub(header.upper as usize),
            unused = unused.len(),
            "repaired page fragmentation"
        );
        Ok(unused)
    }
}
