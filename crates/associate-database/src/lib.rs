//! # associate-database
//!
//! PostgreSQL connection management and the repositories backing the
//! presence store: `presence_status` rows and the `profiles` they join to.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::presence::PresenceRepository;
pub use repositories::profile::ProfileRepository;
