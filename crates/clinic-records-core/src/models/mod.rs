//! Domain models for clinic records.

mod patient;
mod validation;
mod visit;
mod vitals;

pub use patient::*;
pub use validation::*;
pub use visit::*;
pub use vitals::*;
