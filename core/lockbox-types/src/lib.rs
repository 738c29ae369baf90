//! Core type definitions for Lockbox.
//!
//! This crate defines the shapes shared by the client vault, the server and
//! the sync engine:
//! - Local and remote entry identifiers
//! - Millisecond timestamps used for last-write-wins comparison
//! - The closed set of entity classes (passwords, cards, texts, binaries)
//! - Entry summaries and full entries, parameterized by which side owns the id
//!
//! Entry data is opaque here. Encryption happens before bytes reach these types.

mod class;
mod entry;
mod ids;
mod timestamp;

pub use class::EntityClass;
pub use entry::{
    ClientEntry, ClientSummary, Entry, EntrySummary, NewEntry, ServerEntry, ServerSummary,
};
pub use ids::{LocalId, RemoteId};
pub use timestamp::Timestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid entity class: {0}")]
    InvalidEntityClass(String),

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
