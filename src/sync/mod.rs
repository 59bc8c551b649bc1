//! Synchronization engine.
//!
//! Layout:
//! - `entity.rs`: per-collection specs (`EntitySpec`, `KeySpec`) and row bindings
//! - `batch.rs`: chunked upsert/delete
//! - `mirror.rs`: snapshot reconciliation (upsert, then delete what the snapshot omits)
//! - `version.rs`: the persisted `data_version` marker
//! - `plan.rs`: upstream documents -> typed row sets
//! - `apply.rs`: one transaction per cycle
//! - `orchestrator.rs`: manifest fetch and mode dispatch

pub mod apply;
pub mod batch;
pub mod entity;
pub mod mirror;
pub mod orchestrator;
pub mod plan;
pub mod version;

pub use apply::{EntityChange, SyncEngine, SyncReport};
pub use batch::{BatchDeleter, BatchSizes, BatchUpserter};
pub use entity::{EntityKey, EntityKind, EntitySpec, KeySpec, MirrorEntity};
pub use mirror::{MirrorReconciler, TableChange};
pub use orchestrator::{SyncOrchestrator, import_bundle};
pub use plan::{Deletion, DeltaPlan, SnapshotPlan};
pub use version::{DATA_VERSION_KEY, VersionStore};
