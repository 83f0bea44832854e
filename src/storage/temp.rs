use crate::types::{PAGE_HEADER_SIZE, PAGE_SIZE, maxalign, page::Page};

impl<B: AsRef<[u8]>> Page<B> {
    /// Scratch copy of this page with the line pointers and item data cleared.
    ///
    /// The header (apart from `lower`/`upper`) and the last `special_size`
    /// bytes are kept, so an access method can rebuild the page contents in
    /// the copy and swap it back in with [`Page::restore_from`].
    pub fn temp_copy(&self, special_size: usize) -> Page<Vec<u8>> {
        let mut temp = self.to_owned_page();
        let special_start = PAGE_SIZE.saturating_sub(maxalign(special_size.min(PAGE_SIZE)));
        if special_start > PAGE_HEADER_SIZE {
            temp.bytes_mut()[PAGE_HEADER_SIZE..special_start].fill(0);
        }
        temp.update_header(|h| {
            h.lower = PAGE_HEADER_SIZE as u16;
            h.upper = special_start as u16;
        });
        temp
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Page<B> {
    /// Copy a scratch page back over this one, consuming the scratch page.
    pub fn restore_from<T: AsRef<[u8]>>(&mut self, temp: Page<T>) {
        self.bytes_mut().copy_from_slice(temp.as_bytes());
    }
}
