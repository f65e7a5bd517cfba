use std::{
    fs::File,
    io::{self, Cursor, ErrorKind, Read, Seek, SeekFrom, Write},
};

use tracing::trace;

use crate::{
    options::Durability,
    page::{Page, PAGE_SIZE},
    prelude::*,
};

/// Backing medium of a database: a seekable byte store that can be forced to disk.
pub trait Storage: Read + Write + Seek {
    fn sync(&mut self, durability: Durability) -> io::Result<()>;

    /// Physical size in bytes.
    fn size(&mut self) -> io::Result<u64> {
        let position = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(position))?;
        Ok(end)
    }
}

impl Storage for File {
    fn sync(&mut self, durability: Durability) -> io::Result<()> {
        match durability {
            Durability::Flush => self.flush(),
            Durability::SyncData => self.sync_data(),
            Durability::SyncAll => self.sync_all(),
        }
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

/// Memory-only database, nothing to sync.
impl Storage for Cursor<Vec<u8>> {
    fn sync(&mut self, _durability: Durability) -> io::Result<()> {
        Ok(())
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(self.get_ref().len() as u64)
    }
}

/// Byte offset of the page with the given index.
pub fn page_offset(index: u64) -> u64 {
    index * PAGE_SIZE as u64
}

/// Index of the page starting at `offset`. The offset must be aligned.
pub fn page_index(offset: u64) -> u64 {
    offset / PAGE_SIZE as u64
}

pub fn check_alignment(offset: u64) -> Result<()> {
    if offset % PAGE_SIZE as u64 != 0 {
        return Err(Error::Misaligned {
            offset,
            page_size: PAGE_SIZE,
        });
    }
    Ok(())
}

/// Reads and writes whole pages at page aligned offsets. Every write is
/// pushed to the storage medium before `write_page` returns.
pub struct PageManager<S: Storage = File> {
    storage: S,
    durability: Durability,
}

impl<S: Storage> PageManager<S> {
    pub fn new(storage: S, durability: Durability) -> Self {
        Self {
            storage,
            durability,
        }
    }

    pub fn read_page(&mut self, offset: u64) -> Result<Page> {
        check_alignment(offset)?;
        let mut page = Page::new(offset)?;

        self.storage.seek(SeekFrom::Start(offset))?;
        let buf = page.data_mut();
        let mut read = 0;
        while read < PAGE_SIZE {
            match self.storage.read(&mut buf[read..]) {
                Ok(0) => break,
                Ok(n) => read += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(Error::IO(err)),
            }
        }
        if read < PAGE_SIZE {
            return Err(Error::ShortRead {
                offset,
                expected: PAGE_SIZE,
                actual: read,
            });
        }

        trace!(offset, "read page");
        Ok(page)
    }

    pub fn write_page(&mut self, page: &Page) -> Result<()> {
        let offset = page.offset();
        check_alignment(offset)?;

        self.storage.seek(SeekFrom::Start(offset))?;
        let buf = page.data();
        let mut written = 0;
        while written < PAGE_SIZE {
            match self.storage.write(&buf[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(Error::IO(err)),
            }
        }
        if written < PAGE_SIZE {
            return Err(Error::ShortWrite {
                offset,
                expected: PAGE_SIZE,
                actual: written,
            });
        }

        // Not durable until this returns.
        self.storage.flush()?;
        self.storage.sync(self.durability)?;

        trace!(offset, "wrote page");
        Ok(())
    }

    /// Physical size of the storage in bytes.
    pub fn size(&mut self) -> Result<u64> {
        Ok(self.storage.size()?)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Flushes and fully syncs the storage, then hands it back.
    pub fn close(mut self) -> Result<S> {
        self.storage.flush()?;
        self.storage.sync(Durability::SyncAll)?;
        Ok(self.storage)
    }
}
