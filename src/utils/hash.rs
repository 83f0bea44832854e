use crc32fast::Hasher;

use crate::types::page::Page;

/// crc32 of a whole page image.
pub fn page_checksum(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

pub fn verify_page_checksum(bytes: &[u8], expected_checksum: u32) -> bool {
    page_checksum(bytes) == expected_checksum
}

/// crc32 over `(offset number, item bytes)` of every stored item, in slot order.
///
/// Independent of where the items sit in the data area, so it stays fixed
/// across any compaction that keeps slot numbers.
pub fn live_items_digest<B: AsRef<[u8]>>(page: &Page<B>) -> u32 {
    let mut hasher = Hasher::new();
    for (offnum, _) in page.item_ids() {
        if let Some(item) = page.item(offnum) {
            hasher.update(&offnum.to_le_bytes());
            hasher.update(&(item.len() as u32).to_le_bytes());
            hasher.update(item);
        }
    }
    hasher.finalize()
}

/// crc32 over the stored items' bytes in slot order, ignoring slot numbers.
///
/// Used to compare pages whose surviving items were renumbered.
pub fn item_contents_digest<B: AsRef<[u8]>>(page: &Page<B>) -> u32 {
    let mut hasher = Hasher::new();
    for (offnum, _) in page.item_ids() {
        if let Some(item) = page.item(offnum) {
            hasher.update(&(item.len() as u32).to_le_bytes());
            hasher.update(item);
        }
    }
    hasher.finalize()
}
