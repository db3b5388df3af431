//! # associate-entity
//!
//! Domain models for Associate presence. Every struct in this crate is either
//! a validated image of a database row (`PresenceRecord`, `ProfileSummary`) or
//! a value derived from one. Rows coming from the store or the change feed are
//! converted into these types at the boundary; nothing downstream handles
//! untyped JSON.

pub mod presence;
pub mod profile;

pub use presence::{
    ChangeFilter, ChangeOperation, Freshness, PresenceChange, PresenceRecord, SubjectKind,
};
pub use profile::{AdvisorPresence, Avatar, Gender, ProfileSummary};
