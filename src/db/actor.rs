use crate::db::models::{DbAiModel, DbBlockTemplate, DbCategory, DbLanguage, DbWrapper};
use crate::db::schema::SQLITE_INIT;
use crate::error::MirrorError;
use crate::sync::{BatchSizes, DeltaPlan, SnapshotPlan, SyncEngine, SyncReport, VersionStore};
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::{str::FromStr, time::Duration};
use tracing::info;

#[derive(Debug)]
pub enum DbActorMessage {
    /// Read the last committed upstream version.
    CurrentVersion(RpcReplyPort<Result<Option<String>, MirrorError>>),

    /// Mirror a complete snapshot in one transaction.
    ApplyFullReset(Box<SnapshotPlan>, RpcReplyPort<Result<SyncReport, MirrorError>>),

    /// Apply an incremental plan in one transaction.
    ApplyDelta(Box<DeltaPlan>, RpcReplyPort<Result<SyncReport, MirrorError>>),

    /// List categories by display ordering.
    ListCategories(RpcReplyPort<Result<Vec<DbCategory>, MirrorError>>),

    /// List languages by display ordering.
    ListLanguages(RpcReplyPort<Result<Vec<DbLanguage>, MirrorError>>),

    /// List AI models by display ordering.
    ListAiModels(RpcReplyPort<Result<Vec<DbAiModel>, MirrorError>>),

    /// List block templates by (type, name).
    ListBlockTemplates(RpcReplyPort<Result<Vec<DbBlockTemplate>, MirrorError>>),

    /// List the wrappers of one category by display ordering.
    ListWrappersByCategory(String, RpcReplyPort<Result<Vec<DbWrapper>, MirrorError>>),
}

/// Cloneable handle to the single actor that owns the mirror database.
///
/// The mailbox is processed one message at a time, so two sync cycles issued through the
/// same handle never overlap.
#[derive(Clone)]
pub struct DbActorHandle {
    actor: ActorRef<DbActorMessage>,
}

impl DbActorHandle {
    pub async fn current_version(&self) -> Result<Option<String>, MirrorError> {
        ractor::call!(self.actor, DbActorMessage::CurrentVersion).map_err(|e| {
            MirrorError::RactorError(format!("DbActor CurrentVersion RPC failed: {e}"))
        })?
    }

    pub async fn apply_full_reset(&self, plan: SnapshotPlan) -> Result<SyncReport, MirrorError> {
        ractor::call!(self.actor, DbActorMessage::ApplyFullReset, Box::new(plan)).map_err(|e| {
            MirrorError::RactorError(format!("DbActor ApplyFullReset RPC failed: {e}"))
        })?
    }

    pub async fn apply_delta(&self, plan: DeltaPlan) -> Result<SyncReport, MirrorError> {
        ractor::call!(self.actor, DbActorMessage::ApplyDelta, Box::new(plan))
            .map_err(|e| MirrorError::RactorError(format!("DbActor ApplyDelta RPC failed: {e}")))?
    }

    pub async fn list_categories(&self) -> Result<Vec<DbCategory>, MirrorError> {
        ractor::call!(self.actor, DbActorMessage::ListCategories).map_err(|e| {
            MirrorError::RactorError(format!("DbActor ListCategories RPC failed: {e}"))
        })?
    }

    pub async fn list_languages(&self) -> Result<Vec<DbLanguage>, MirrorError> {
        ractor::call!(self.actor, DbActorMessage::ListLanguages).map_err(|e| {
            MirrorError::RactorError(format!("DbActor ListLanguages RPC failed: {e}"))
        })?
    }

    pub async fn list_ai_models(&self) -> Result<Vec<DbAiModel>, MirrorError> {
        ractor::call!(self.actor, DbActorMessage::ListAiModels).map_err(|e| {
            MirrorError::RactorError(format!("DbActor ListAiModels RPC failed: {e}"))
        })?
    }

    pub async fn list_block_templates(&self) -> Result<Vec<DbBlockTemplate>, MirrorError> {
        ractor::call!(self.actor, DbActorMessage::ListBlockTemplates).map_err(|e| {
            MirrorError::RactorError(format!("DbActor ListBlockTemplates RPC failed: {e}"))
        })?
    }

    pub async fn list_wrappers_by_category(
        &self,
        category_code: &str,
    ) -> Result<Vec<DbWrapper>, MirrorError> {
        ractor::call!(
            self.actor,
            DbActorMessage::ListWrappersByCategory,
            category_code.to_string()
        )
        .map_err(|e| {
            MirrorError::RactorError(format!("DbActor ListWrappersByCategory RPC failed: {e}"))
        })?
    }
}

struct DbActorState {
    pool: SqlitePool,
    engine: SyncEngine,
}

struct DbActor;

#[ractor::async_trait]
impl Actor for DbActor {
    type Msg = DbActorMessage;
    type State = DbActorState;
    type Arguments = (String, BatchSizes);

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        (database_url, batches): Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let pool = connect(&database_url)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db init failed: {e}")))?;

        info!(
            upsert_batch_size = batches.upsert,
            delete_batch_size = batches.delete,
            "DbActor initialized"
        );
        Ok(DbActorState {
            pool,
            engine: SyncEngine::new(batches),
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            DbActorMessage::CurrentVersion(reply) => {
                let res = self.current_version(&state.pool).await;
                let _ = reply.send(res);
            }
            DbActorMessage::ApplyFullReset(plan, reply) => {
                let res = state.engine.apply_full_reset(&state.pool, &plan).await;
                let _ = reply.send(res);
            }
            DbActorMessage::ApplyDelta(plan, reply) => {
                let res = state.engine.apply_delta(&state.pool, &plan).await;
                let _ = reply.send(res);
            }
            DbActorMessage::ListCategories(reply) => {
                let res = self.list_categories(&state.pool).await;
                let _ = reply.send(res);
            }
            DbActorMessage::ListLanguages(reply) => {
                let res = self.list_languages(&state.pool).await;
                let _ = reply.send(res);
            }
            DbActorMessage::ListAiModels(reply) => {
                let res = self.list_ai_models(&state.pool).await;
                let _ = reply.send(res);
            }
            DbActorMessage::ListBlockTemplates(reply) => {
                let res = self.list_block_templates(&state.pool).await;
                let _ = reply.send(res);
            }
            DbActorMessage::ListWrappersByCategory(category_code, reply) => {
                let res = self
                    .list_wrappers_by_category(&state.pool, &category_code)
                    .await;
                let _ = reply.send(res);
            }
        }
        Ok(())
    }
}

impl DbActor {
    async fn current_version(&self, pool: &SqlitePool) -> Result<Option<String>, MirrorError> {
        let mut conn = pool.acquire().await?;
        VersionStore::get(&mut *conn).await
    }

    async fn list_categories(&self, pool: &SqlitePool) -> Result<Vec<DbCategory>, MirrorError> {
        let rows = sqlx::query_as::<_, DbCategory>(
            r#"
        SELECT code, name, ordering
        FROM categories
        ORDER BY ordering ASC, code ASC
        "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    async fn list_languages(&self, pool: &SqlitePool) -> Result<Vec<DbLanguage>, MirrorError> {
        let rows = sqlx::query_as::<_, DbLanguage>(
            r#"
        SELECT code, name, ordering
        FROM languages
        ORDER BY ordering ASC, code ASC
        "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    async fn list_ai_models(&self, pool: &SqlitePool) -> Result<Vec<DbAiModel>, MirrorError> {
        let rows = sqlx::query_as::<_, DbAiModel>(
            r#"
        SELECT code, name, provider_id, ordering
        FROM ai_models
        ORDER BY ordering ASC, code ASC
        "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    async fn list_block_templates(
        &self,
        pool: &SqlitePool,
    ) -> Result<Vec<DbBlockTemplate>, MirrorError> {
        let rows = sqlx::query_as::<_, DbBlockTemplate>(
            r#"
        SELECT type, code, name
        FROM block_templates
        ORDER BY type ASC, name ASC
        "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    async fn list_wrappers_by_category(
        &self,
        pool: &SqlitePool,
        category_code: &str,
    ) -> Result<Vec<DbWrapper>, MirrorError> {
        let rows = sqlx::query_as::<_, DbWrapper>(
            r#"
        SELECT code, name, description, category_code, featured, base, ordering
        FROM wrappers
        WHERE category_code = ?
        ORDER BY ordering ASC, code ASC
        "#,
        )
        .bind(category_code)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }
}

/// Spawn the database actor and return a cloneable handle.
pub async fn spawn(database_url: &str, batches: BatchSizes) -> Result<DbActorHandle, MirrorError> {
    // Unnamed: one process may hold several mirrors (tests, imports into scratch files).
    let (actor, _jh) = ractor::Actor::spawn(
        None,
        DbActor,
        (database_url.to_string(), batches),
    )
    .await
    .map_err(|e| MirrorError::RactorError(format!("failed to spawn DbActor: {e}")))?;

    Ok(DbActorHandle { actor })
}

/// Open (creating if missing) the SQLite mirror and apply the schema.
pub async fn connect(database_url: &str) -> Result<SqlitePool, MirrorError> {
    let connect_opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5))
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new().connect_with(connect_opts).await?;
    apply_schema(&pool).await?;
    Ok(pool)
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), MirrorError> {
    for stmt in SQLITE_INIT.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await?;
    }
    Ok(())
}
