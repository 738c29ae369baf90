//! HTTP sync protocol bodies.
//!
//! The client and the server exchange JSON over a small REST surface, one
//! resource per entity class:
//!
//! | Method | Path | Body | Response |
//! |---|---|---|---|
//! | GET  | `/api/v1/{class}/summaries` | | `[ServerSummary]` |
//! | GET  | `/api/v1/{class}/entries` | | `[ServerEntry]` |
//! | POST | `/api/v1/{class}/entries/fetch` | [`FetchRequest`] | `[ServerEntry]` |
//! | POST | `/api/v1/{class}/entries` | [`InsertRequest`] | [`InsertResponse`] |
//! | PUT  | `/api/v1/{class}/entries` | [`UpdateRequest`] | 204 |
//!
//! Every `/api/v1` call carries `Authorization: Bearer <token>`. Errors come
//! back as [`ErrorBody`].

use lockbox_types::{EntityClass, NewEntry, RemoteId, ServerEntry};
use serde::{Deserialize, Serialize};

/// Protocol version for compatibility checking.
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum number of entries transferred in a single request.
pub const MAX_BATCH_SIZE: usize = 100;

/// Prefix of every authenticated route.
pub const API_PREFIX: &str = "/api/v1";

/// Path of the summaries resource for a class.
pub fn summaries_path(class: EntityClass) -> String {
    format!("{API_PREFIX}/{class}/summaries")
}

/// Path of the entries resource for a class.
pub fn entries_path(class: EntityClass) -> String {
    format!("{API_PREFIX}/{class}/entries")
}

/// Path of the batched fetch resource for a class.
pub fn fetch_path(class: EntityClass) -> String {
    format!("{API_PREFIX}/{class}/entries/fetch")
}

/// Request for entries by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub ids: Vec<RemoteId>,
}

/// Request to insert entries for the first time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertRequest {
    pub entries: Vec<NewEntry>,
}

/// Ids assigned to inserted entries, one per submitted entry, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertResponse {
    pub ids: Vec<RemoteId>,
}

/// Request to overwrite existing entries by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub entries: Vec<ServerEntry>,
}

/// Liveness and version information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub protocol_version: u32,
}

impl HealthResponse {
    /// A healthy response for this protocol version.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            protocol_version: PROTOCOL_VERSION,
        }
    }
}

/// Machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    InvalidEntityClass,
    NotFound,
    Conflict,
    BadRequest,
    Internal,
}

/// Error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub error: String,
}

impl ErrorBody {
    /// Creates an error body.
    pub fn new(code: ErrorCode, error: impl Into<String>) -> Self {
        Self {
            code,
            error: error.into(),
        }
    }
}
