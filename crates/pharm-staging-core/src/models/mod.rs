//! Domain models for the pharmacy staging batch.

mod catalog;
mod patient;
mod transaction;

pub use catalog::*;
pub use patient::*;
pub use transaction::*;
