//! Core types for strand scheduling.

mod balance;
mod item;
mod learner;
mod plan;
mod session;
mod strand;

pub use balance::*;
pub use item::*;
pub use learner::*;
pub use plan::*;
pub use session::*;
pub use strand::*;
