use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Generic {0}")]
    Generic(String),

    #[error("Static {0}")]
    Static(&'static str),

    #[error(transparent)]
    IO(#[from] std::io::Error),

    #[error("short read at offset {offset}: expected {expected} bytes, got {actual}")]
    ShortRead {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    #[error("short write at offset {offset}: expected {expected} bytes, got {actual}")]
    ShortWrite {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    #[error("offset {offset} is not a multiple of the page size {page_size}")]
    Misaligned { offset: u64, page_size: usize },

    #[error("offset {offset} is past the last of {number_of_pages} pages")]
    OutOfBounds { offset: u64, number_of_pages: u64 },

    #[error("failed to allocate a page buffer")]
    Allocation,

    #[error("database is not open")]
    NotOpen,

    #[error("extension of {requested} free pages failed after {confirmed} were written: {source}")]
    PartialExtension {
        requested: u64,
        confirmed: u64,
        #[source]
        source: Box<Error>,
    },

    #[error("corrupt database: {0}")]
    Corrupt(String),

    #[error("database file is locked by another handle: {}", .0.display())]
    Locked(PathBuf),

    #[error("invalid options: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// True for every failure of the page I/O class: OS errors, short
    /// transfers and misaligned offsets.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Error::IO(_) | Error::ShortRead { .. } | Error::ShortWrite { .. } | Error::Misaligned { .. }
        ) || matches!(self, Error::PartialExtension { source, .. } if source.is_io())
    }

    pub fn is_alignment(&self) -> bool {
        matches!(self, Error::Misaligned { .. })
    }
}
