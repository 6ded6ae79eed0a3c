//! Strand balance tracking and rebalancing pressure.

mod pressure;
mod tracker;

pub use pressure::{compute_weights, preference_from_goal, pressure, WEIGHT_TOTAL};
pub use tracker::{compute_balance, window_start};
