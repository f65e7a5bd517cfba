use std::fmt::Debug;

use byteorder::{ByteOrder, LittleEndian};

// free page format:
// | next free page offset | unused |
// |          8B           |  ...   |

const NEXT_FREE_PAGE_OFFSET: usize = 0;

/// Free-list link over a page buffer.
pub struct FreeView<B> {
    buf: B,
}

impl<B: AsRef<[u8]>> FreeView<B> {
    pub fn new(buf: B) -> Self {
        Self { buf }
    }

    /// Offset of the next free page, 0 at the end of the list.
    pub fn next_free_page_offset(&self) -> u64 {
        LittleEndian::read_u64(&self.buf.as_ref()[NEXT_FREE_PAGE_OFFSET..])
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> FreeView<B> {
    pub fn set_next_free_page_offset(&mut self, offset: u64) {
        LittleEndian::write_u64(&mut self.buf.as_mut()[NEXT_FREE_PAGE_OFFSET..], offset);
    }
}

impl<B: AsRef<[u8]>> Debug for FreeView<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FreePage {{ next: {} }}", self.next_free_page_offset())
    }
}
