//! In-memory storage with injectable failures for unit tests.

use std::{
    cell::RefCell,
    collections::HashSet,
    io::{self, Cursor, Read, Seek, SeekFrom, Write},
    rc::Rc,
};

use crate::{free_list::page_manager::Storage, options::Durability};

#[derive(Default)]
pub struct Faults {
    fail_writes: HashSet<u64>,
    short_writes: HashSet<u64>,
    fail_reads: HashSet<u64>,
    pub reads: usize,
    pub writes: usize,
    pub seeks: usize,
    pub syncs: usize,
}

impl Faults {
    /// Every write starting at `offset` fails with an I/O error.
    pub fn fail_write_at(&mut self, offset: u64) {
        self.fail_writes.insert(offset);
    }

    /// Every write starting at `offset` accepts zero bytes.
    pub fn short_write_at(&mut self, offset: u64) {
        self.short_writes.insert(offset);
    }

    pub fn fail_read_at(&mut self, offset: u64) {
        self.fail_reads.insert(offset);
    }

    pub fn heal(&mut self) {
        self.fail_writes.clear();
        self.short_writes.clear();
        self.fail_reads.clear();
    }

    pub fn operations(&self) -> usize {
        self.reads + self.writes + self.seeks + self.syncs
    }
}

pub struct FaultyStorage {
    inner: Cursor<Vec<u8>>,
    faults: Rc<RefCell<Faults>>,
}

impl FaultyStorage {
    pub fn new() -> (Self, Rc<RefCell<Faults>>) {
        let faults = Rc::new(RefCell::new(Faults::default()));
        let storage = Self {
            inner: Cursor::new(Vec::new()),
            faults: faults.clone(),
        };
        (storage, faults)
    }
}

impl Read for FaultyStorage {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut faults = self.faults.borrow_mut();
        faults.reads += 1;
        if faults.fail_reads.contains(&self.inner.position()) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected read failure"));
        }
        self.inner.read(buf)
    }
}

impl Write for FaultyStorage {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut faults = self.faults.borrow_mut();
        faults.writes += 1;
        let position = self.inner.position();
        if faults.fail_writes.contains(&position) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }
        if faults.short_writes.contains(&position) {
            return Ok(0);
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for FaultyStorage {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.faults.borrow_mut().seeks += 1;
        self.inner.seek(pos)
    }
}

impl Storage for FaultyStorage {
    fn sync(&mut self, _durability: Durability) -> io::Result<()> {
        self.faults.borrow_mut().syncs += 1;
        Ok(())
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(self.inner.get_ref().len() as u64)
    }
}
