//! Store implementations.

mod memory;
mod sqlite;

pub use memory::{InMemoryCatalogue, InMemoryItemStore};
pub use sqlite::{SqliteCatalogueStore, SqliteItemStore};
