//! Sync engine for Lockbox.
//!
//! Reconciles the client vault with the account's rows on the server, one
//! entity class at a time.
//!
//! # Architecture
//!
//! - **Adapter**: [`LocalStore`] and [`RemoteStore`] describe what the engine
//!   needs from each side. [`VaultStore`](lockbox_storage::VaultStore) is the
//!   local implementation; [`HttpRemoteStore`] talks to a Lockbox server.
//! - **Engine**: [`plan`] compares summaries and decides what moves where;
//!   [`SyncEngine::reconcile`] carries the plan out in batches.
//! - **Protocol**: JSON bodies and routes shared with the server.
//! - **Coordinator**: runs passes for several classes concurrently and on a
//!   timer.
//!
//! ## Sync Pass
//!
//! 1. **Summaries**: fetch `(id, name, updated_at)` from the server, then from
//!    the vault. No entry data moves yet.
//! 2. **Bootstrap**: an empty side is seeded with everything the other holds.
//! 3. **Plan**: match vault entries to server rows by remote link, then by name.
//!    The newer `updated_at` wins; equal timestamps mean nothing to do.
//! 4. **Transfer**: push new entries and record their links, overwrite server
//!    rows that are older, pull server rows that are newer.
//!
//! # Example
//!
//! ```
//! use lockbox_sync::adapter::mock::{MockLocalStore, MockRemoteStore};
//! use lockbox_sync::{SyncConfig, SyncEngine};
//! use lockbox_types::EntityClass;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let engine = SyncEngine::new(SyncConfig::default());
//! let report = engine
//!     .reconcile(
//!         EntityClass::Passwords,
//!         &MockRemoteStore::new(),
//!         &MockLocalStore::new(),
//!         &CancellationToken::new(),
//!     )
//!     .await
//!     .unwrap();
//! assert!(report.is_noop());
//! # });
//! ```

pub mod adapter;
mod coordinator;
mod engine;
mod error;
mod local;
pub mod protocol;
mod remote;

pub use adapter::{LocalStore, RemoteStore};
pub use coordinator::{SyncCoordinator, SyncOutcome};
pub use engine::{Pairing, SyncConfig, SyncEngine, SyncPlan, SyncReport, plan};
pub use error::{SyncError, SyncResult};
pub use protocol::{MAX_BATCH_SIZE, PROTOCOL_VERSION};
pub use remote::{HttpRemoteStore, RemoteConfig};
