pub mod free_page;
pub mod header_page;
pub mod node_page;

use std::fmt::Debug;

use crate::prelude::*;

pub use self::{free_page::FreeView, header_page::HeaderView, node_page::NodeView};

/// Size of every page in the file. All page offsets are multiples of it.
pub const PAGE_SIZE: usize = 4096;

// Offsets are stored as 8 byte integers; the page size has to keep them aligned.
const _: () = assert!(PAGE_SIZE % 8 == 0);

/// What a page is going to be used for. Storage-wise every kind is the same
/// `PAGE_SIZE` buffer, only the interpretation differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Header,
    Free,
    Leaf,
    Internal,
}

/// A page resident in memory: its offset in the file and an owned buffer.
///
/// Pages are never shared. Every read from disk hands out a fresh copy and
/// dropping the page releases the buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Page {
    offset: u64,
    data: Box<[u8]>,
}

impl Page {
    /// Allocates a zeroed page for `offset`.
    pub fn new(offset: u64) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(PAGE_SIZE)
            .map_err(|_| Error::Allocation)?;
        data.resize(PAGE_SIZE, 0);
        Ok(Self {
            offset,
            data: data.into_boxed_slice(),
        })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zeroes the whole buffer.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn as_header(&self) -> HeaderView<&[u8]> {
        HeaderView::new(&self.data[..])
    }

    pub fn as_header_mut(&mut self) -> HeaderView<&mut [u8]> {
        HeaderView::new(&mut self.data[..])
    }

    pub fn as_free(&self) -> FreeView<&[u8]> {
        FreeView::new(&self.data[..])
    }

    pub fn as_free_mut(&mut self) -> FreeView<&mut [u8]> {
        FreeView::new(&mut self.data[..])
    }

    pub fn as_node(&self) -> NodeView<&[u8]> {
        NodeView::new(&self.data[..])
    }

    pub fn as_node_mut(&mut self) -> NodeView<&mut [u8]> {
        NodeView::new(&mut self.data[..])
    }
}

impl Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let used = self.data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        write!(f, "Page {{ offset: {}, used_bytes: {} }}", self.offset, used)
    }
}
