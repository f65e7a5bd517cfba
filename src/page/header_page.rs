use std::fmt::Debug;

use byteorder::{ByteOrder, LittleEndian};

// header page format:
// | free page offset | root page offset | number of pages | reserved |
// |        8B        |        8B        |       8B        |   ...    |

const FREE_PAGE_OFFSET: usize = 0;
const ROOT_PAGE_OFFSET: usize = 8;
const NUMBER_OF_PAGES: usize = 16;

pub const HEADER_FIELDS_SIZE: usize = 24;

/// Header page fields over a page buffer.
pub struct HeaderView<B> {
    buf: B,
}

impl<B: AsRef<[u8]>> HeaderView<B> {
    pub fn new(buf: B) -> Self {
        Self { buf }
    }

    /// Head of the free list, 0 when the list is empty.
    pub fn free_page_offset(&self) -> u64 {
        LittleEndian::read_u64(&self.buf.as_ref()[FREE_PAGE_OFFSET..])
    }

    pub fn root_page_offset(&self) -> u64 {
        LittleEndian::read_u64(&self.buf.as_ref()[ROOT_PAGE_OFFSET..])
    }

    /// Pages in the file, the header included.
    pub fn number_of_pages(&self) -> u64 {
        LittleEndian::read_u64(&self.buf.as_ref()[NUMBER_OF_PAGES..])
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> HeaderView<B> {
    /// Resets the header of an empty database: no free pages, no root, only
    /// the header page itself counted.
    pub fn init(&mut self) {
        self.buf.as_mut()[..HEADER_FIELDS_SIZE].fill(0);
        self.set_number_of_pages(1);
    }

    pub fn set_free_page_offset(&mut self, offset: u64) {
        LittleEndian::write_u64(&mut self.buf.as_mut()[FREE_PAGE_OFFSET..], offset);
    }

    pub fn set_root_page_offset(&mut self, offset: u64) {
        LittleEndian::write_u64(&mut self.buf.as_mut()[ROOT_PAGE_OFFSET..], offset);
    }

    pub fn set_number_of_pages(&mut self, count: u64) {
        LittleEndian::write_u64(&mut self.buf.as_mut()[NUMBER_OF_PAGES..], count);
    }
}

impl<B: AsRef<[u8]>> Debug for HeaderView<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HeaderPage {{ free_page_offset: {}, root_page_offset: {}, number_of_pages: {} }}",
            self.free_page_offset(),
            self.root_page_offset(),
            self.number_of_pages()
        )
    }
}
