use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Number of pages appended to the file whenever the free list runs dry.
pub const DEFAULT_FREE_BATCH_SIZE: u64 = 10;

/// How far a page write is pushed towards the disk before `write_page` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    /// Flush userspace buffers only.
    Flush,
    /// `fdatasync` after every page write.
    #[default]
    SyncData,
    /// `fsync` after every page write.
    SyncAll,
}

/// Options for opening a database file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    pub free_batch_size: u64,
    pub durability: Durability,
    /// Take an advisory exclusive lock on the file for the lifetime of the session.
    pub lock_file: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            free_batch_size: DEFAULT_FREE_BATCH_SIZE,
            durability: Durability::default(),
            lock_file: false,
        }
    }
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn free_batch_size(mut self, free_batch_size: u64) -> Self {
        self.free_batch_size = free_batch_size;
        self
    }

    #[must_use]
    pub fn durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    #[must_use]
    pub fn lock_file(mut self, lock_file: bool) -> Self {
        self.lock_file = lock_file;
        self
    }

    /// Parses options from JSON. Missing fields take their default value.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: StoreOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Loads options from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.free_batch_size == 0 {
            return Err(Error::Static("free_batch_size must be at least 1"));
        }
        Ok(())
    }
}
