use ahash::AHashSet;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use super::batch::{BatchDeleter, BatchSizes, BatchUpserter, load_keys};
use super::entity::{EntityKey, MirrorEntity};
use crate::error::MirrorError;

/// Rows written and removed in one collection during a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableChange {
    pub upserted: u64,
    pub deleted: u64,
}

impl TableChange {
    pub fn total(&self) -> u64 {
        self.upserted + self.deleted
    }
}

/// Makes a collection equal to a complete incoming snapshot.
#[derive(Debug, Clone, Copy)]
pub struct MirrorReconciler {
    upserter: BatchUpserter,
    deleter: BatchDeleter,
}

impl MirrorReconciler {
    pub fn new(batches: BatchSizes) -> Self {
        Self {
            upserter: BatchUpserter::new(batches.upsert),
            deleter: BatchDeleter::new(batches.delete),
        }
    }

    pub async fn mirror<E: MirrorEntity>(
        &self,
        conn: &mut SqliteConnection,
        incoming: &[E],
    ) -> Result<TableChange, MirrorError> {
        let spec = &E::SPEC;
        let upserted = self.upserter.upsert(conn, incoming).await?;

        // Local keys are read after the upsert so the diff sees exactly what the snapshot
        // left untouched.
        let local = load_keys(conn, spec).await?;
        let incoming_keys: AHashSet<EntityKey> = incoming.iter().map(|row| row.key()).collect();

        let mut obsolete: Vec<EntityKey> = local
            .into_iter()
            .filter(|key| !incoming_keys.contains(key))
            .collect();
        obsolete.sort();

        if !obsolete.is_empty() {
            debug!(
                table = spec.table,
                obsolete = obsolete.len(),
                "removing rows absent from snapshot"
            );
        }
        let deleted = self.deleter.delete(conn, spec, &obsolete).await?;

        info!(table = spec.table, upserted, deleted, "table mirrored");
        Ok(TableChange { upserted, deleted })
    }
}
