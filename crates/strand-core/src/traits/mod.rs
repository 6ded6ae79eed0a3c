//! Storage abstractions.
//!
//! The core composes these traits instead of assuming a single physical
//! store: items and history live behind [`ItemStore`], catalogue metadata
//! behind [`CatalogueStore`], and session state behind [`SessionRepository`].

mod catalogue;
mod item_store;
mod session_repository;

pub use catalogue::CatalogueStore;
pub use item_store::{ItemStore, QualityAverage, ReviewCommit};
pub use session_repository::SessionRepository;

#[cfg(test)]
pub use catalogue::MockCatalogueStore;
#[cfg(test)]
pub use item_store::MockItemStore;
#[cfg(test)]
pub use session_repository::MockSessionRepository;
