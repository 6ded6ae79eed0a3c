//! Session planning.
//!
//! Balance history feeds the pressure weights, which the allocator turns into
//! per-strand time budgets filled from the candidate pools.

mod allocator;
mod candidates;
mod selection;

pub use allocator::{SessionAllocator, NO_MATERIALS_NOTE};
pub use candidates::CandidateCatalogue;
pub use selection::{instructions, select, strand_pool};
