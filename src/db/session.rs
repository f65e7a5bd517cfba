use tracing::debug;

use crate::{
    free_list::{
        page_manager::{page_offset, PageManager, Storage},
        FreeList,
    },
    page::Page,
    prelude::*,
};

use super::new_header_page;

/// Everything an open database keeps resident: the free list (which owns
/// the file and the header page) and the root page.
pub struct Session<S: Storage> {
    pub free_list: FreeList<S>,
    pub root: Page,
}

impl<S: Storage> Session<S> {
    /// Writes a new database: a header page and an empty internal root
    /// right behind it.
    pub fn create(mut page_manager: PageManager<S>, batch_size: u64) -> Result<Self> {
        let root_offset = page_offset(1);
        let mut root = Page::new(root_offset)?;
        root.as_node_mut().reset(false);

        let mut header = new_header_page()?;
        let mut fields = header.as_header_mut();
        fields.set_root_page_offset(root_offset);
        fields.set_number_of_pages(2);

        // root first so the header never names a page that is not there
        page_manager.write_page(&root)?;
        page_manager.write_page(&header)?;

        debug!(root_offset, "created database");
        Ok(Self {
            free_list: FreeList::new(page_manager, header, batch_size),
            root,
        })
    }

    pub fn load(page_manager: PageManager<S>, batch_size: u64) -> Result<Self> {
        let mut free_list = FreeList::load(page_manager, batch_size)?;
        let root_offset = free_list.root_page_offset();
        let root = free_list.page_manager().read_page(root_offset)?;

        debug!(
            root_offset,
            number_of_pages = free_list.number_of_pages(),
            free_page_offset = free_list.head(),
            "loaded database"
        );
        Ok(Self { free_list, root })
    }

    pub fn close(self) -> Result<S> {
        self.free_list.close()
    }
}
