use std::fmt::Debug;

use byteorder::{ByteOrder, LittleEndian};

// node header format:
// | parent | is_leaf | nkeys | reserved | extra |  payload  |
// |   8B   |   4B    |  4B   |   104B   |  8B   | ...       |
//
// `extra` is the right sibling of a leaf or the leftmost child of an
// internal node. The payload belongs to the tree layer.

const PARENT_PAGE_OFFSET: usize = 0;
const IS_LEAF: usize = 8;
const NUMBER_OF_KEYS: usize = 12;
const EXTRA_PAGE_OFFSET: usize = 120;

pub const NODE_HEADER_SIZE: usize = 128;

/// B+Tree node header over a page buffer.
pub struct NodeView<B> {
    buf: B,
}

impl<B: AsRef<[u8]>> NodeView<B> {
    pub fn new(buf: B) -> Self {
        Self { buf }
    }

    pub fn parent_page_offset(&self) -> u64 {
        LittleEndian::read_u64(&self.buf.as_ref()[PARENT_PAGE_OFFSET..])
    }

    pub fn is_leaf(&self) -> bool {
        LittleEndian::read_u32(&self.buf.as_ref()[IS_LEAF..]) != 0
    }

    pub fn number_of_keys(&self) -> u32 {
        LittleEndian::read_u32(&self.buf.as_ref()[NUMBER_OF_KEYS..])
    }

    pub fn extra_page_offset(&self) -> u64 {
        LittleEndian::read_u64(&self.buf.as_ref()[EXTRA_PAGE_OFFSET..])
    }

    /// Bytes after the node header.
    pub fn payload(&self) -> &[u8] {
        &self.buf.as_ref()[NODE_HEADER_SIZE..]
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> NodeView<B> {
    /// Clears the whole node header and stamps the node type. The payload
    /// is left as is; with zero keys none of it is interpreted.
    pub fn reset(&mut self, is_leaf: bool) {
        self.buf.as_mut()[..NODE_HEADER_SIZE].fill(0);
        self.set_is_leaf(is_leaf);
    }

    pub fn set_parent_page_offset(&mut self, offset: u64) {
        LittleEndian::write_u64(&mut self.buf.as_mut()[PARENT_PAGE_OFFSET..], offset);
    }

    pub fn set_is_leaf(&mut self, is_leaf: bool) {
        LittleEndian::write_u32(&mut self.buf.as_mut()[IS_LEAF..], is_leaf as u32);
    }

    pub fn set_number_of_keys(&mut self, nkeys: u32) {
        LittleEndian::write_u32(&mut self.buf.as_mut()[NUMBER_OF_KEYS..], nkeys);
    }

    pub fn set_extra_page_offset(&mut self, offset: u64) {
        LittleEndian::write_u64(&mut self.buf.as_mut()[EXTRA_PAGE_OFFSET..], offset);
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buf.as_mut()[NODE_HEADER_SIZE..]
    }
}

impl<B: AsRef<[u8]>> Debug for NodeView<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Node {{ leaf: {}, nkeys: {}, parent: {}, extra: {} }}",
            self.is_leaf(),
            self.number_of_keys(),
            self.parent_page_offset(),
            self.extra_page_offset()
        )
    }
}
