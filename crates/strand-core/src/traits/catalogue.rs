//! Catalogue storage trait.

use crate::error::StrandResult;
use crate::types::CatalogueNode;

/// Read access to the external knowledge catalogue.
#[cfg_attr(test, mockall::automock)]
pub trait CatalogueStore: Send + Sync {
    /// All nodes, ordered by id.
    fn nodes(&self) -> StrandResult<Vec<CatalogueNode>>;

    /// One node by id.
    fn node(&self, node_id: &str) -> StrandResult<Option<CatalogueNode>>;
}
