//! Chunked upsert/delete over any [`MirrorEntity`].
//!
//! Chunking only bounds statement size; it never commits. Callers pass a connection that is
//! already inside the cycle's transaction, so a failing chunk takes the whole cycle down.

use ahash::AHashMap;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use tracing::debug;

use super::entity::{EntityKey, EntitySpec, MirrorEntity};
use crate::config::SyncConfig;
use crate::error::MirrorError;

/// SQLite's default bound-parameter limit (`SQLITE_MAX_VARIABLE_NUMBER`, 3.32+).
pub const SQLITE_MAX_VARIABLES: usize = 32766;

/// Largest chunk a statement binding `per_item` values per row/key can carry.
fn effective_chunk(batch_size: usize, per_item: usize) -> usize {
    batch_size.min(SQLITE_MAX_VARIABLES / per_item.max(1)).max(1)
}

/// Rows per upsert statement and keys per delete statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSizes {
    pub upsert: usize,
    pub delete: usize,
}

impl BatchSizes {
    pub fn uniform(size: usize) -> Self {
        Self {
            upsert: size,
            delete: size,
        }
    }
}

impl Default for BatchSizes {
    fn default() -> Self {
        SyncConfig::default().into()
    }
}

impl From<SyncConfig> for BatchSizes {
    fn from(cfg: SyncConfig) -> Self {
        Self {
            upsert: cfg.upsert_batch_size,
            delete: cfg.delete_batch_size,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchUpserter {
    batch_size: usize,
}

impl BatchUpserter {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Inserts new keys and overwrites every non-key column of existing ones.
    ///
    /// A key mentioned twice keeps its last occurrence. Returns the number of distinct
    /// rows written.
    pub async fn upsert<E: MirrorEntity>(
        &self,
        conn: &mut SqliteConnection,
        rows: &[E],
    ) -> Result<u64, MirrorError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let spec = &E::SPEC;
        let rows = last_occurrence_wins(rows);
        let insert_head = format!("INSERT INTO {} ({}) ", spec.table, spec.columns.join(", "));
        let upsert_clause = spec.upsert_clause();

        let chunk_size = effective_chunk(self.batch_size, spec.columns.len());
        for (index, chunk) in rows.chunks(chunk_size).enumerate() {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(insert_head.as_str());
            qb.push_values(chunk.iter().copied(), |mut b, row| row.push_columns(&mut b));
            qb.push(upsert_clause.as_str());

            let res = qb.build().execute(&mut *conn).await?;
            debug!(
                table = spec.table,
                chunk = index,
                rows = chunk.len(),
                affected = res.rows_affected(),
                "upsert chunk applied"
            );
        }

        Ok(rows.len() as u64)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchDeleter {
    batch_size: usize,
}

impl BatchDeleter {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Deletes the given keys; unknown keys are skipped silently.
    /// Returns the number of rows actually removed.
    pub async fn delete(
        &self,
        conn: &mut SqliteConnection,
        spec: &EntitySpec,
        keys: &[EntityKey],
    ) -> Result<u64, MirrorError> {
        if keys.is_empty() {
            return Ok(0);
        }

        let arity = spec.key.arity();
        if let Some(bad) = keys.iter().find(|key| key.arity() != arity) {
            return Err(MirrorError::malformed(format!(
                "key '{bad}' does not match the {arity}-column key of {}",
                spec.table
            )));
        }

        let delete_head = format!(
            "DELETE FROM {} WHERE {} IN (",
            spec.table,
            spec.key.match_expr()
        );

        let mut removed = 0u64;
        let chunk_size = effective_chunk(self.batch_size, arity);
        for (index, chunk) in keys.chunks(chunk_size).enumerate() {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(delete_head.as_str());
            qb.push_values(chunk, |mut b, key| {
                for part in key.parts() {
                    b.push_bind(part.clone());
                }
            });
            qb.push(")");

            let res = qb.build().execute(&mut *conn).await?;
            removed += res.rows_affected();
            debug!(
                table = spec.table,
                chunk = index,
                keys = chunk.len(),
                affected = res.rows_affected(),
                "delete chunk applied"
            );
        }

        Ok(removed)
    }
}

/// Reads every key currently stored for `spec`.
pub(crate) async fn load_keys(
    conn: &mut SqliteConnection,
    spec: &EntitySpec,
) -> Result<Vec<EntityKey>, MirrorError> {
    let columns = spec.key.columns();
    let sql = format!("SELECT {} FROM {}", columns.join(", "), spec.table);

    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    rows.iter()
        .map(|row| -> Result<EntityKey, MirrorError> {
            let parts = (0..columns.len())
                .map(|i| row.try_get::<String, _>(i))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(EntityKey::composite(parts))
        })
        .collect()
}

fn last_occurrence_wins<E: MirrorEntity>(rows: &[E]) -> Vec<&E> {
    let mut last: AHashMap<EntityKey, usize> = AHashMap::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        last.insert(row.key(), index);
    }

    rows.iter()
        .enumerate()
        .filter(|(index, row)| last.get(&row.key()) == Some(index))
        .map(|(_, row)| row)
        .collect()
}
