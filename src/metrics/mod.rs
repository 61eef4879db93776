//! Metrics module for sitewatch.
//!
//! Sliding windows of probe outcomes, their percentile estimate, the
//! availability alert and the store that holds them per target.

mod alert;
mod models;
mod percentile;
mod store;
mod window;

pub use alert::*;
pub use models::*;
pub use percentile::*;
pub use store::*;
pub use window::*;
