//! Core type definitions used across the Associate workspace.

pub mod id;

pub use id::SubjectId;
