//! Value objects used to stamp events.

mod datetime;
mod id;

pub use datetime::DateTime;
pub use id::Id;
