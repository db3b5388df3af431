//! Concrete repositories, one per table.

pub mod presence;
pub mod profile;
