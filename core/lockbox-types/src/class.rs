//! Entity class selector.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A category of secret, reconciled independently of the others.
///
/// The set is closed: every class maps to one table in the client vault and
/// one table on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityClass {
    /// Login credentials.
    Passwords,
    /// Bank cards.
    Cards,
    /// Free-form text notes.
    Texts,
    /// Arbitrary files.
    Binaries,
}

impl EntityClass {
    /// Every entity class, in a fixed order.
    pub const ALL: [Self; 4] = [Self::Passwords, Self::Cards, Self::Texts, Self::Binaries];

    /// Returns the selector string used on the wire and in the CLI.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Passwords => "passwords",
            Self::Cards => "cards",
            Self::Texts => "texts",
            Self::Binaries => "binaries",
        }
    }

    /// Returns the SQL table holding entries of this class.
    #[must_use]
    pub const fn table_name(&self) -> &'static str {
        match self {
            Self::Passwords => "password_entries",
            Self::Cards => "card_entries",
            Self::Texts => "text_entries",
            Self::Binaries => "binary_entries",
        }
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passwords" => Ok(Self::Passwords),
            "cards" => Ok(Self::Cards),
            "texts" => Ok(Self::Texts),
            "binaries" => Ok(Self::Binaries),
            other => Err(Error::InvalidEntityClass(other.to_string())),
        }
    }
}
