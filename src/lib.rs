//! Page storage for an on-disk B+Tree: fixed-size pages in a single file, a
//! free-page list threaded through the file, and the header and root pages
//! that anchor the tree.

pub mod db;
mod error;
pub mod free_list;
pub mod options;
pub mod page;
pub mod prelude;

#[cfg(test)]
mod testing;

pub use db::Database;
pub use free_list::page_manager::Storage;
pub use options::{Durability, StoreOptions};
pub use page::{Page, PageKind, PAGE_SIZE};
pub use prelude::{Error, Result};
