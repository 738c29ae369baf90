//! Identifier types for vault entries.
//!
//! Each side of a sync pair assigns its own integer ids. `LocalId` is only
//! meaningful inside one client vault, `RemoteId` only on the server. Keeping
//! them as distinct types stops a client id from being sent where a server id
//! is expected.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of an entry in the client vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(i64);

impl LocalId {
    /// Wraps a raw row id.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw row id.
    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LocalId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>()
            .map(Self)
            .map_err(|_| Error::InvalidId(s.to_string()))
    }
}

/// Identifier of an entry on the server.
///
/// A client entry stores the `RemoteId` of its server counterpart as its
/// remote link. Zero is never a valid remote id: persisted zero means
/// "not linked yet" and is mapped to `None` by [`RemoteId::link_from_raw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(i64);

impl RemoteId {
    /// Wraps a raw server row id.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw server row id.
    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }

    /// Decodes a persisted remote link, where `0` means "unlinked".
    #[must_use]
    pub const fn link_from_raw(raw: i64) -> Option<Self> {
        if raw == 0 { None } else { Some(Self(raw)) }
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemoteId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>()
            .map(Self)
            .map_err(|_| Error::InvalidId(s.to_string()))
    }
}
