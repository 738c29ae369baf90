//! Entry summaries and full entries.
//!
//! Both sides of a sync pair store the same record shape. The only difference
//! is which namespace the id belongs to, so the shapes are generic over the id
//! type. Server-side values always carry `remote_link: None`; the server has
//! no notion of a remote from its own point of view.

use crate::{LocalId, RemoteId, Timestamp};
use serde::{Deserialize, Serialize};

/// Lightweight projection used to detect divergence without payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySummary<I> {
    /// Id assigned by the side that owns this summary.
    pub id: I,
    /// Name, unique within one entity class on one side.
    pub name: String,
    /// Last modification time.
    pub updated_at: Timestamp,
    /// Server counterpart of a client entry, if one has been confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_link: Option<RemoteId>,
}

/// A full entry including its opaque data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry<I> {
    /// Id assigned by the side that owns this entry.
    pub id: I,
    /// Name, unique within one entity class on one side.
    pub name: String,
    /// Opaque bytes produced by the encryption layer.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
    /// Tombstone flag. Deleted entries keep syncing so removals propagate.
    #[serde(default)]
    pub deleted: bool,
    /// Server counterpart of a client entry, if one has been confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_link: Option<RemoteId>,
}

/// Summary as seen by the server.
pub type ServerSummary = EntrySummary<RemoteId>;
/// Summary as seen by the client vault.
pub type ClientSummary = EntrySummary<LocalId>;
/// Entry as stored on the server.
pub type ServerEntry = Entry<RemoteId>;
/// Entry as stored in the client vault.
pub type ClientEntry = Entry<LocalId>;

impl<I: Copy> Entry<I> {
    /// Projects this entry to its summary.
    #[must_use]
    pub fn summary(&self) -> EntrySummary<I> {
        EntrySummary {
            id: self.id,
            name: self.name.clone(),
            updated_at: self.updated_at,
            remote_link: self.remote_link,
        }
    }
}

impl ClientEntry {
    /// Strips the local id and link, producing a record for first-time insertion.
    #[must_use]
    pub fn into_new_entry(self) -> NewEntry {
        NewEntry {
            name: self.name,
            data: self.data,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted: self.deleted,
        }
    }

    /// Re-addresses this entry to an existing server row.
    #[must_use]
    pub fn into_server_entry(self, id: RemoteId) -> ServerEntry {
        Entry {
            id,
            name: self.name,
            data: self.data,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted: self.deleted,
            remote_link: None,
        }
    }
}

/// An entry without an id, submitted for first-time insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub name: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub deleted: bool,
}

impl NewEntry {
    /// Creates a live entry stamped with the current time.
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let now = Timestamp::now();
        Self {
            name: name.into(),
            data: data.into(),
            created_at: now,
            updated_at: now,
            deleted: false,
        }
    }

    /// Attaches an id, producing a full entry.
    #[must_use]
    pub fn with_id<I>(self, id: I) -> Entry<I> {
        Entry {
            id,
            name: self.name,
            data: self.data,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted: self.deleted,
            remote_link: None,
        }
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
