pub mod page_manager;

use crate::prelude::*;

use std::{collections::HashSet, fs::File};

use tracing::{debug, warn};

use crate::page::{Page, PAGE_SIZE};

use self::page_manager::{check_alignment, page_index, page_offset, PageManager, Storage};

/// Singly-linked list of free pages threaded through the file.
///
/// The list head, the root offset and the page count live in the header
/// page, which the free list keeps resident. The in-memory header always
/// matches the last header that was written successfully: every mutation
/// that fails to persist is rolled back.
pub struct FreeList<S: Storage = File> {
    header: Page,
    page_manager: PageManager<S>,
    /// Pages appended when the list runs dry
    batch_size: u64,
}

impl<S: Storage> FreeList<S> {
    pub fn new(page_manager: PageManager<S>, header: Page, batch_size: u64) -> Self {
        Self {
            header,
            page_manager,
            batch_size,
        }
    }

    /// Loads and validates the header page of an existing database.
    pub fn load(mut page_manager: PageManager<S>, batch_size: u64) -> Result<Self> {
        let header = page_manager.read_page(0)?;
        let file_size = page_manager.size()?;

        let fields = header.as_header();
        let total = fields.number_of_pages();
        // compared in pages so a garbage count cannot overflow the offset math
        if total < 2 || total > file_size / PAGE_SIZE as u64 {
            return Err(Error::Corrupt(f!(
                "header claims {} pages in a file of {} bytes",
                total,
                file_size
            )));
        }

        let free_list = Self::new(page_manager, header, batch_size);
        free_list.check_link(free_list.head())?;
        free_list.check_page(free_list.root_page_offset())?;
        Ok(free_list)
    }

    pub fn header(&self) -> &Page {
        &self.header
    }

    /// Offset of the first free page, 0 when the list is empty.
    pub fn head(&self) -> u64 {
        self.header.as_header().free_page_offset()
    }

    pub fn root_page_offset(&self) -> u64 {
        self.header.as_header().root_page_offset()
    }

    pub fn number_of_pages(&self) -> u64 {
        self.header.as_header().number_of_pages()
    }

    pub fn page_manager(&mut self) -> &mut PageManager<S> {
        &mut self.page_manager
    }

    /// Appends `count` free pages to the file and puts them in front of the list.
    ///
    /// The page bodies are written first. They lie past the committed page
    /// count, so nothing can reach them until the header write names them.
    pub fn extend(&mut self, count: u64) -> Result<()> {
        if count == 0 {
            return Ok(());
        }

        let prev_head = self.head();
        let first = self.number_of_pages();

        for i in 0..count {
            let index = first + i;
            let mut page = Page::new(page_offset(index))?;
            let next = if i + 1 == count {
                prev_head
            } else {
                page_offset(index + 1)
            };
            page.as_free_mut().set_next_free_page_offset(next);

            if let Err(err) = self.page_manager.write_page(&page) {
                warn!(requested = count, confirmed = i, "free page extension failed: {}", err);
                return Err(Error::PartialExtension {
                    requested: count,
                    confirmed: i,
                    source: Box::new(err),
                });
            }
        }

        let mut fields = self.header.as_header_mut();
        fields.set_free_page_offset(page_offset(first));
        fields.set_number_of_pages(first + count);
        if let Err(err) = self.page_manager.write_page(&self.header) {
            let mut fields = self.header.as_header_mut();
            fields.set_free_page_offset(prev_head);
            fields.set_number_of_pages(first);
            warn!("header commit failed, extension rolled back: {}", err);
            return Err(err);
        }

        debug!(count, number_of_pages = first + count, "extended free list");
        Ok(())
    }

    /// Pops the head of the list, growing the file by a batch when it is empty.
    ///
    /// The page still carries its free-list link; the caller overwrites it.
    pub fn acquire(&mut self) -> Result<Page> {
        if self.head() == 0 {
            self.extend(self.batch_size)?;
        }

        let offset = self.head();
        self.check_page(offset)?;
        let page = self.page_manager.read_page(offset)?;
        let next = page.as_free().next_free_page_offset();
        self.check_link(next)?;

        self.header.as_header_mut().set_free_page_offset(next);
        if let Err(err) = self.page_manager.write_page(&self.header) {
            self.header.as_header_mut().set_free_page_offset(page.offset());
            warn!(offset, "header commit failed, free page returned to the list: {}", err);
            return Err(err);
        }

        debug!(offset, next, "acquired free page");
        Ok(page)
    }

    /// Pushes the page at `offset` onto the list. Whatever it held is lost.
    pub fn release(&mut self, offset: u64) -> Result<()> {
        check_alignment(offset)?;
        if offset == 0 {
            return Err(Error::Static("the header page cannot be released"));
        }
        if offset == self.root_page_offset() {
            return Err(Error::Static("the root page cannot be released"));
        }
        if offset == self.head() {
            return Err(Error::Static("the page is already at the head of the free list"));
        }
        self.check_page(offset)?;

        let prev_head = self.head();
        let mut page = Page::new(offset)?;
        page.as_free_mut().set_next_free_page_offset(prev_head);
        self.page_manager.write_page(&page)?;

        self.header.as_header_mut().set_free_page_offset(offset);
        if let Err(err) = self.page_manager.write_page(&self.header) {
            self.header.as_header_mut().set_free_page_offset(prev_head);
            warn!(offset, "header commit failed, release rolled back: {}", err);
            return Err(err);
        }

        debug!(offset, "released page");
        Ok(())
    }

    /// Persists a new root page offset in the header.
    pub fn set_root_page_offset(&mut self, offset: u64) -> Result<()> {
        self.check_root(offset)?;

        let prev_root = self.root_page_offset();
        self.header.as_header_mut().set_root_page_offset(offset);
        if let Err(err) = self.page_manager.write_page(&self.header) {
            self.header.as_header_mut().set_root_page_offset(prev_root);
            warn!(offset, "header commit failed, root offset rolled back: {}", err);
            return Err(err);
        }
        Ok(())
    }

    /// Offsets on the list, head first.
    pub fn free_pages(&mut self) -> Result<Vec<u64>> {
        let mut pages = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = self.head();
        while offset != 0 {
            self.check_page(offset)?;
            if !seen.insert(offset) {
                return Err(Error::Corrupt(f!("free list loops back to {}", offset)));
            }
            pages.push(offset);
            offset = self
                .page_manager
                .read_page(offset)?
                .as_free()
                .next_free_page_offset();
        }
        Ok(pages)
    }

    pub fn close(self) -> Result<S> {
        self.page_manager.close()
    }

    /// Any aligned page inside the committed extent, the header included.
    pub(crate) fn check_extent(&self, offset: u64) -> Result<()> {
        check_alignment(offset)?;
        let number_of_pages = self.number_of_pages();
        if page_index(offset) >= number_of_pages {
            return Err(Error::OutOfBounds {
                offset,
                number_of_pages,
            });
        }
        Ok(())
    }

    /// Where a root page may live.
    pub(crate) fn check_root(&self, offset: u64) -> Result<()> {
        check_alignment(offset)?;
        self.check_page(offset)
    }

    /// A page other than the header inside the committed extent.
    fn check_page(&self, offset: u64) -> Result<()> {
        if offset == 0 || offset % page_offset(1) != 0 || page_index(offset) >= self.number_of_pages()
        {
            return Err(Error::Corrupt(f!(
                "page offset {} outside of {} pages",
                offset,
                self.number_of_pages()
            )));
        }
        Ok(())
    }

    fn check_link(&self, next: u64) -> Result<()> {
        if next == 0 {
            return Ok(());
        }
        self.check_page(next)
    }
}

#[cfg(test)]
impl<S: Storage> FreeList<S> {
    pub fn debug_free_list(&mut self) {
        match self.free_pages() {
            Ok(pages) if pages.is_empty() => println!("free list is empty"),
            Ok(pages) => {
                for offset in pages {
                    println!("Page {}: {:?}", offset, self.page_manager.read_page(offset));
                }
            }
            Err(err) => println!("free list is broken: {}", err),
        }
    }
}
