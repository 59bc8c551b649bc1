//! One sync cycle against the store: every collection plus the version marker in a single
//! transaction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};
use zymirror_schema::SyncMode;

use super::batch::{BatchDeleter, BatchSizes, BatchUpserter};
use super::entity::EntityKind;
use super::mirror::{MirrorReconciler, TableChange};
use super::plan::{DeltaPlan, SnapshotPlan};
use super::version::VersionStore;
use crate::error::MirrorError;

#[derive(Debug, Clone, Serialize)]
pub struct EntityChange {
    pub entity: EntityKind,
    #[serde(flatten)]
    pub change: TableChange,
}

/// Outcome of a cycle: the version the mirror now reflects and what each collection saw.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    #[serde(serialize_with = "serialize_mode")]
    pub mode: SyncMode,
    pub version: Option<String>,
    pub changes: Vec<EntityChange>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    pub fn unchanged(version: Option<String>) -> Self {
        Self {
            mode: SyncMode::Unchanged,
            version,
            changes: Vec::new(),
            finished_at: Utc::now(),
        }
    }

    pub fn change(&self, entity: EntityKind) -> TableChange {
        self.changes
            .iter()
            .find(|c| c.entity == entity)
            .map(|c| c.change)
            .unwrap_or_default()
    }

    pub fn rows_affected(&self) -> u64 {
        self.changes.iter().map(|c| c.change.total()).sum()
    }

    fn record(&mut self, entity: EntityKind, change: TableChange) {
        match self.changes.iter_mut().find(|c| c.entity == entity) {
            Some(existing) => {
                existing.change.upserted += change.upserted;
                existing.change.deleted += change.deleted;
            }
            None => self.changes.push(EntityChange { entity, change }),
        }
    }
}

fn serialize_mode<S>(mode: &SyncMode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(mode.as_str())
}

/// Drives the batch components over all collections. Cheap to copy; holds no connection.
#[derive(Debug, Clone, Copy)]
pub struct SyncEngine {
    reconciler: MirrorReconciler,
    upserter: BatchUpserter,
    deleter: BatchDeleter,
}

impl SyncEngine {
    pub fn new(batches: BatchSizes) -> Self {
        Self {
            reconciler: MirrorReconciler::new(batches),
            upserter: BatchUpserter::new(batches.upsert),
            deleter: BatchDeleter::new(batches.delete),
        }
    }

    /// Opens a transaction, mirrors every collection, writes the version, commits.
    /// On any error the transaction is rolled back and the version stays put.
    pub async fn apply_full_reset(
        &self,
        pool: &SqlitePool,
        plan: &SnapshotPlan,
    ) -> Result<SyncReport, MirrorError> {
        let mut tx = pool.begin().await?;

        match self.full_reset_in(&mut *tx, plan).await {
            Ok(report) => {
                tx.commit().await?;
                info!(
                    version = %plan.version,
                    rows_affected = report.rows_affected(),
                    "full reset committed"
                );
                Ok(report)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback after failed full reset failed");
                }
                Err(e)
            }
        }
    }

    /// Same contract as [`SyncEngine::apply_full_reset`] for an incremental plan.
    pub async fn apply_delta(
        &self,
        pool: &SqlitePool,
        plan: &DeltaPlan,
    ) -> Result<SyncReport, MirrorError> {
        let mut tx = pool.begin().await?;

        match self.delta_in(&mut *tx, plan).await {
            Ok(report) => {
                tx.commit().await?;
                info!(
                    version = %plan.version,
                    rows_affected = report.rows_affected(),
                    "delta update committed"
                );
                Ok(report)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback after failed delta update failed");
                }
                Err(e)
            }
        }
    }

    /// Full-reset statements on a connection the caller already put inside a transaction.
    /// Categories go before wrappers.
    pub async fn full_reset_in(
        &self,
        conn: &mut SqliteConnection,
        plan: &SnapshotPlan,
    ) -> Result<SyncReport, MirrorError> {
        let mut report = SyncReport {
            mode: SyncMode::FullReset,
            version: Some(plan.version.clone()),
            changes: Vec::with_capacity(EntityKind::DEPENDENCY_ORDER.len()),
            finished_at: Utc::now(),
        };

        let change = self.reconciler.mirror(conn, &plan.categories).await?;
        report.record(EntityKind::Category, change);

        let change = self.reconciler.mirror(conn, &plan.languages).await?;
        report.record(EntityKind::Language, change);

        let change = self.reconciler.mirror(conn, &plan.ai_models).await?;
        report.record(EntityKind::AiModel, change);

        let change = self.reconciler.mirror(conn, &plan.block_templates).await?;
        report.record(EntityKind::BlockTemplate, change);

        let change = self.reconciler.mirror(conn, &plan.wrappers).await?;
        report.record(EntityKind::Wrapper, change);

        VersionStore::set(conn, &plan.version).await?;
        report.finished_at = Utc::now();
        Ok(report)
    }

    /// Delta statements on a connection the caller already put inside a transaction.
    ///
    /// Upserts run in dependency order, then deletions in reverse dependency order. A key
    /// both upserted and deleted by the same payload therefore ends up deleted.
    pub async fn delta_in(
        &self,
        conn: &mut SqliteConnection,
        plan: &DeltaPlan,
    ) -> Result<SyncReport, MirrorError> {
        let mut report = SyncReport {
            mode: SyncMode::DeltaUpdate,
            version: Some(plan.version.clone()),
            changes: Vec::new(),
            finished_at: Utc::now(),
        };

        let upserted = self.upserter.upsert(conn, &plan.categories).await?;
        report.record(EntityKind::Category, upserted_only(upserted));

        let upserted = self.upserter.upsert(conn, &plan.languages).await?;
        report.record(EntityKind::Language, upserted_only(upserted));

        let upserted = self.upserter.upsert(conn, &plan.ai_models).await?;
        report.record(EntityKind::AiModel, upserted_only(upserted));

        let upserted = self.upserter.upsert(conn, &plan.block_templates).await?;
        report.record(EntityKind::BlockTemplate, upserted_only(upserted));

        let upserted = self.upserter.upsert(conn, &plan.wrappers).await?;
        report.record(EntityKind::Wrapper, upserted_only(upserted));

        for kind in EntityKind::DEPENDENCY_ORDER.into_iter().rev() {
            let keys = plan.deletions_for(kind);
            if keys.is_empty() {
                continue;
            }
            let deleted = self.deleter.delete(conn, kind.spec(), &keys).await?;
            report.record(
                kind,
                TableChange {
                    upserted: 0,
                    deleted,
                },
            );
        }

        VersionStore::set(conn, &plan.version).await?;
        report.finished_at = Utc::now();
        Ok(report)
    }
}

fn upserted_only(upserted: u64) -> TableChange {
    TableChange {
        upserted,
        deleted: 0,
    }
}
