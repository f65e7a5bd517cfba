mod session;

use std::{
    fs::{File, OpenOptions},
    path::Path,
};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::{
    free_list::page_manager::{PageManager, Storage},
    options::StoreOptions,
    page::{HeaderView, Page, PageKind},
    prelude::*,
};

use self::session::Session;

/// A fresh header page for an empty database. Nothing is written.
pub fn new_header_page() -> Result<Page> {
    let mut page = Page::new(0)?;
    page.as_header_mut().init();
    Ok(page)
}

/// Handle to one database file.
///
/// Holds at most one open session. Everything except `new_page(Header)`
/// fails with [`Error::NotOpen`] while no session is open.
pub struct Database<S: Storage = File> {
    options: StoreOptions,
    session: Option<Session<S>>,
}

impl Database<File> {
    /// Opens the database at `path`, creating it when the file does not
    /// exist. A session that was already open is closed first.
    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.release();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        if self.options.lock_file && file.try_lock_exclusive().is_err() {
            return Err(Error::Locked(path.to_path_buf()));
        }

        debug!(path = %path.display(), "opening database");
        self.open_storage(file)
    }
}

impl<S: Storage> Database<S> {
    pub fn new(options: StoreOptions) -> Self {
        Self {
            options,
            session: None,
        }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Opens a session over `storage`. Empty storage becomes a new database,
    /// anything else has to hold one.
    pub fn open_storage(&mut self, storage: S) -> Result<()> {
        self.release();
        self.options.validate()?;

        let mut page_manager = PageManager::new(storage, self.options.durability);
        let batch_size = self.options.free_batch_size;
        let session = if page_manager.size()? == 0 {
            Session::create(page_manager, batch_size)?
        } else {
            Session::load(page_manager, batch_size)?
        };

        self.session = Some(session);
        Ok(())
    }

    /// Flushes and closes the file. The cached header and root go with it.
    pub fn close(&mut self) -> Result<()> {
        let session = self.session.take().ok_or(Error::NotOpen)?;
        session.close()?;
        debug!("closed database");
        Ok(())
    }

    /// Drops the current session, if any. Close failures are only logged:
    /// every page write was already synced.
    fn release(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(err) = session.close() {
                warn!("failed to close previous session: {}", err);
            }
        }
    }

    fn session(&self) -> Result<&Session<S>> {
        self.session.as_ref().ok_or(Error::NotOpen)
    }

    fn session_mut(&mut self) -> Result<&mut Session<S>> {
        self.session.as_mut().ok_or(Error::NotOpen)
    }

    pub fn header(&self) -> Result<HeaderView<&[u8]>> {
        Ok(self.session()?.free_list.header().as_header())
    }

    pub fn header_page(&self) -> Result<&Page> {
        Ok(self.session()?.free_list.header())
    }

    pub fn root(&self) -> Result<&Page> {
        Ok(&self.session()?.root)
    }

    /// The cached root page. Changes reach the disk through [`Database::write_root`].
    pub fn root_mut(&mut self) -> Result<&mut Page> {
        Ok(&mut self.session_mut()?.root)
    }

    pub fn write_root(&mut self) -> Result<()> {
        let session = self.session_mut()?;
        session.free_list.page_manager().write_page(&session.root)
    }

    /// Makes `root` the new root: the page is written, then the header is
    /// pointed at it. The offset is checked before anything is written.
    pub fn set_root(&mut self, root: Page) -> Result<()> {
        let session = self.session_mut()?;
        session.free_list.check_root(root.offset())?;
        session.free_list.page_manager().write_page(&root)?;
        session.free_list.set_root_page_offset(root.offset())?;
        debug!(offset = root.offset(), "new root page");
        session.root = root;
        Ok(())
    }

    /// Hands out a page of the given kind.
    ///
    /// A header page is built in memory only and has to be written by the
    /// caller. Every other kind is taken from the free list; node pages get
    /// a clean node header with zero keys.
    pub fn new_page(&mut self, kind: PageKind) -> Result<Page> {
        match kind {
            PageKind::Header => new_header_page(),
            PageKind::Free => self.session_mut()?.free_list.acquire(),
            PageKind::Leaf | PageKind::Internal => {
                let mut page = self.session_mut()?.free_list.acquire()?;
                page.as_node_mut().reset(kind == PageKind::Leaf);
                Ok(page)
            }
        }
    }

    /// Reads a page inside the committed extent.
    pub fn read_page(&mut self, offset: u64) -> Result<Page> {
        let session = self.session_mut()?;
        session.free_list.check_extent(offset)?;
        session.free_list.page_manager().read_page(offset)
    }

    /// Writes a page inside the committed extent. The header page belongs to
    /// the session and is refused; writing the root page refreshes the
    /// cached root.
    pub fn write_page(&mut self, page: &Page) -> Result<()> {
        let session = self.session_mut()?;
        session.free_list.check_extent(page.offset())?;
        if page.offset() == 0 {
            return Err(Error::Static("the header page is written by the session"));
        }
        session.free_list.page_manager().write_page(page)?;
        if page.offset() == session.root.offset() {
            session.root = page.clone();
        }
        Ok(())
    }

    /// Returns the page at `offset` to the free list.
    pub fn release_page(&mut self, offset: u64) -> Result<()> {
        self.session_mut()?.free_list.release(offset)
    }

    /// Offsets currently on the free list, head first.
    pub fn free_pages(&mut self) -> Result<Vec<u64>> {
        self.session_mut()?.free_list.free_pages()
    }
}

impl Default for Database<File> {
    fn default() -> Self {
        Self::new(StoreOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, io::Cursor};

    use tempfile::TempDir;

    use super::*;
    use crate::{
        free_list::page_manager::page_offset,
        options::Durability,
        page::PAGE_SIZE,
        testing::FaultyStorage,
    };

    fn setup_test_dir() -> TempDir {
        tempfile::tempdir().unwrap()
    }

    fn memory_db() -> Database<Cursor<Vec<u8>>> {
        let mut db = Database::new(StoreOptions::new().durability(Durability::Flush));
        db.open_storage(Cursor::new(Vec::new())).unwrap();
        db
    }

    #[test]
    fn test_not_open() {
        let mut db = Database::default();
        assert!(!db.is_open());
        assert!(matches!(db.header(), Err(Error::NotOpen)));
        assert!(matches!(db.root(), Err(Error::NotOpen)));
        assert!(matches!(db.read_page(0), Err(Error::NotOpen)));
        assert!(matches!(db.new_page(PageKind::Leaf), Err(Error::NotOpen)));
        assert!(matches!(db.release_page(PAGE_SIZE as u64), Err(Error::NotOpen)));
        assert!(matches!(db.close(), Err(Error::NotOpen)));
    }

    #[test]
    fn test_header_page_needs_no_session() {
        let mut db = Database::default();
        let page = db.new_page(PageKind::Header).unwrap();
        let header = page.as_header();
        assert_eq!(page.offset(), 0);
        assert_eq!(header.free_page_offset(), 0);
        assert_eq!(header.root_page_offset(), 0);
        assert_eq!(header.number_of_pages(), 1);
    }

    #[test]
    fn test_create_new_file() {
        let temp_dir = setup_test_dir();
        let path = temp_dir.path().join("test.db");
        let mut db = Database::default();
        db.open(&path).unwrap();

        let header = db.header().unwrap();
        assert_eq!(header.free_page_offset(), 0);
        assert_eq!(header.root_page_offset(), page_offset(1));
        assert_eq!(header.number_of_pages(), 2);

        let root = db.root().unwrap().as_node();
        assert!(!root.is_leaf());
        assert_eq!(root.number_of_keys(), 0);

        db.close().unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), page_offset(2));
    }

    #[test]
    fn test_reopen_restores_fields() {
        let temp_dir = setup_test_dir();
        let path = temp_dir.path().join("test.db");
        let mut db = Database::default();
        db.open(&path).unwrap();
        let leaf = db.new_page(PageKind::Leaf).unwrap();
        db.write_page(&leaf).unwrap();
        db.set_root(leaf.clone()).unwrap();
        db.close().unwrap();

        db.open(&path).unwrap();
        let header = db.header().unwrap();
        assert_eq!(header.root_page_offset(), leaf.offset());
        assert_eq!(header.number_of_pages(), 12);
        assert_eq!(header.free_page_offset(), leaf.offset() + PAGE_SIZE as u64);
        assert_eq!(db.root().unwrap(), &leaf);
        assert!(db.root().unwrap().as_node().is_leaf());
    }

    #[test]
    fn test_open_twice_replaces_session() {
        let temp_dir = setup_test_dir();
        let first = temp_dir.path().join("first.db");
        let second = temp_dir.path().join("second.db");
        let mut db = Database::default();

        db.open(&first).unwrap();
        db.new_page(PageKind::Free).unwrap();
        db.open(&second).unwrap();

        assert_eq!(db.header().unwrap().number_of_pages(), 2);
        db.close().unwrap();
        assert!(!db.is_open());
    }

    #[test]
    fn test_new_node_pages_have_clean_header() {
        let mut db = memory_db();

        let free = db.new_page(PageKind::Free).unwrap();
        assert_eq!(free.as_free().next_free_page_offset(), free.offset() + PAGE_SIZE as u64);

        // The recycled page still links to the next free page; none of that
        // may show through the node header.
        let leaf = db.new_page(PageKind::Leaf).unwrap();
        let node = leaf.as_node();
        assert!(node.is_leaf());
        assert_eq!(node.number_of_keys(), 0);
        assert_eq!(node.parent_page_offset(), 0);
        assert_eq!(node.extra_page_offset(), 0);

        let internal = db.new_page(PageKind::Internal).unwrap();
        assert!(!internal.as_node().is_leaf());
        assert_eq!(internal.as_node().parent_page_offset(), 0);
    }

    #[test]
    fn test_released_node_comes_back_clean() {
        let mut db = memory_db();
        let mut leaf = db.new_page(PageKind::Leaf).unwrap();
        let mut node = leaf.as_node_mut();
        node.set_number_of_keys(31);
        node.set_parent_page_offset(page_offset(1));
        node.set_extra_page_offset(page_offset(5));
        db.write_page(&leaf).unwrap();

        db.release_page(leaf.offset()).unwrap();
        let again = db.new_page(PageKind::Internal).unwrap();
        assert_eq!(again.offset(), leaf.offset());
        let node = again.as_node();
        assert!(!node.is_leaf());
        assert_eq!(node.number_of_keys(), 0);
        assert_eq!(node.parent_page_offset(), 0);
        assert_eq!(node.extra_page_offset(), 0);
    }

    #[test]
    fn test_write_page_guards_header_and_tracks_root() {
        let mut db = memory_db();
        let header = db.header_page().unwrap().clone();
        assert!(matches!(db.write_page(&header), Err(Error::Static(_))));

        let mut root = db.root().unwrap().clone();
        root.as_node_mut().set_number_of_keys(3);
        db.write_page(&root).unwrap();
        assert_eq!(db.root().unwrap().as_node().number_of_keys(), 3);
    }

    #[test]
    fn test_write_root() {
        let mut db = memory_db();
        db.root_mut().unwrap().as_node_mut().set_number_of_keys(4);
        db.write_root().unwrap();

        let offset = db.root().unwrap().offset();
        assert_eq!(db.read_page(offset).unwrap().as_node().number_of_keys(), 4);
    }

    #[test]
    fn test_rollback_through_session() {
        let (storage, faults) = FaultyStorage::new();
        let mut db = Database::new(StoreOptions::new());
        db.open_storage(storage).unwrap();
        db.new_page(PageKind::Leaf).unwrap();
        let head = db.header().unwrap().free_page_offset();

        faults.borrow_mut().fail_write_at(0);
        assert!(db.new_page(PageKind::Leaf).unwrap_err().is_io());
        assert_eq!(db.header().unwrap().free_page_offset(), head);

        faults.borrow_mut().heal();
        let page = db.new_page(PageKind::Leaf).unwrap();
        assert_eq!(page.offset(), head);
    }

    #[test]
    fn test_set_root_checks_offset_before_writing() {
        let mut db = memory_db();
        let before = db.read_page(0).unwrap();

        let mut at_header = Page::new(0).unwrap();
        at_header.as_node_mut().reset(true);
        assert!(matches!(db.set_root(at_header), Err(Error::Corrupt(_))));

        let mut past_end = Page::new(page_offset(40)).unwrap();
        past_end.as_node_mut().reset(true);
        assert!(matches!(db.set_root(past_end), Err(Error::Corrupt(_))));

        assert_eq!(db.read_page(0).unwrap(), before);
        assert_eq!(db.root().unwrap().offset(), page_offset(1));

        let storage = db.session.take().unwrap().close().unwrap();
        assert_eq!(storage.get_ref().len() as u64, page_offset(2));
        let mut reopened = Database::new(StoreOptions::new());
        reopened.open_storage(storage).unwrap();
        assert_eq!(reopened.header().unwrap().root_page_offset(), page_offset(1));
    }

    #[test]
    fn test_page_io_stays_inside_extent() {
        let (storage, faults) = FaultyStorage::new();
        let mut db = Database::new(StoreOptions::new());
        db.open_storage(storage).unwrap();

        // the extension's bodies reach the file, its header commit does not
        faults.borrow_mut().fail_write_at(0);
        assert!(db.new_page(PageKind::Leaf).is_err());
        faults.borrow_mut().heal();
        assert_eq!(db.header().unwrap().number_of_pages(), 2);

        assert!(matches!(
            db.read_page(page_offset(5)),
            Err(Error::OutOfBounds { .. })
        ));
        let far = Page::new(page_offset(50)).unwrap();
        assert!(matches!(
            db.write_page(&far),
            Err(Error::OutOfBounds { .. })
        ));
        assert!(db.read_page(0).is_ok());
        assert!(db.read_page(page_offset(1)).is_ok());
    }

    #[test]
    fn test_create_fails_when_root_write_fails() {
        let (storage, faults) = FaultyStorage::new();
        faults.borrow_mut().fail_write_at(page_offset(1));
        let mut db = Database::new(StoreOptions::new());

        assert!(db.open_storage(storage).is_err());
        assert!(!db.is_open());
    }

    #[test]
    fn test_open_garbage_file() {
        let temp_dir = setup_test_dir();
        let path = temp_dir.path().join("garbage.db");
        fs::write(&path, vec![0xffu8; 100]).unwrap();

        let mut db = Database::default();
        assert!(matches!(db.open(&path), Err(Error::ShortRead { .. })));
        assert!(!db.is_open());
    }

    #[test]
    fn test_invalid_options_refused() {
        let mut db = Database::new(StoreOptions::new().free_batch_size(0));
        assert!(db.open_storage(Cursor::new(Vec::new())).is_err());
    }

    #[test]
    fn test_lock_file() {
        let temp_dir = setup_test_dir();
        let path = temp_dir.path().join("locked.db");
        let options = StoreOptions::new().lock_file(true);

        let mut first = Database::new(options.clone());
        first.open(&path).unwrap();

        let mut second = Database::new(options.clone());
        assert!(matches!(second.open(&path), Err(Error::Locked(_))));

        first.close().unwrap();
        second.open(&path).unwrap();
    }
}
