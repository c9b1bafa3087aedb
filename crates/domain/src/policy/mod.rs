//! The policy record and its status machine.

mod record;
mod status;

pub use record::{PolicyRecord, PolicyTransition};
pub use status::{PolicyStatus, RailStatus};
