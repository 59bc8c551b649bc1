use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use zymirror_schema::{ManifestResponse, SyncMode};

use super::apply::SyncReport;
use super::plan::{DeltaPlan, SnapshotPlan};
use crate::db::DbActorHandle;
use crate::error::MirrorError;
use crate::upstream::{CatalogSource, load_bundle_file};

/// Runs sync cycles: manifest fetch, mode dispatch, then one store transaction.
///
/// Network work and payload validation finish before the database actor is asked to write.
#[derive(Clone)]
pub struct SyncOrchestrator {
    source: Arc<dyn CatalogSource>,
    db: DbActorHandle,
}

impl SyncOrchestrator {
    pub fn new(source: Arc<dyn CatalogSource>, db: DbActorHandle) -> Self {
        Self { source, db }
    }

    /// One cycle. On error the mirror and its version are left as they were.
    pub async fn run_cycle(&self) -> Result<SyncReport, MirrorError> {
        let local_version = self.db.current_version().await?;
        info!(
            local_version = local_version.as_deref().unwrap_or("<none>"),
            "sync cycle started"
        );

        let manifest = self
            .source
            .fetch_manifest(local_version.as_deref())
            .await?;
        let mode = manifest.sync_mode();
        info!(%mode, raw_mode = manifest.mode.as_deref().unwrap_or("<missing>"), "manifest mode");

        let report = match mode {
            SyncMode::FullReset => self.full_reset(manifest).await?,
            SyncMode::DeltaUpdate => self.delta_update(&manifest).await?,
            SyncMode::Unchanged => {
                info!(
                    version = local_version.as_deref().unwrap_or("<none>"),
                    "mirror is up to date"
                );
                SyncReport::unchanged(local_version)
            }
        };

        Ok(report)
    }

    async fn full_reset(&self, manifest: ManifestResponse) -> Result<SyncReport, MirrorError> {
        let wrappers = manifest.wrappers.unwrap_or_default();
        let download_url = wrappers
            .download_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| MirrorError::malformed("FULL_RESET manifest has no downloadUrl"))?;

        let doc = self.source.fetch_bundle(&download_url).await?;
        let plan = SnapshotPlan::from_bundle(doc, wrappers.version)?;
        info!(
            version = %plan.version,
            categories = plan.categories.len(),
            languages = plan.languages.len(),
            ai_models = plan.ai_models.len(),
            block_templates = plan.block_templates.len(),
            wrappers = plan.wrappers.len(),
            "applying full reset"
        );

        self.db.apply_full_reset(plan).await
    }

    async fn delta_update(&self, manifest: &ManifestResponse) -> Result<SyncReport, MirrorError> {
        if manifest.has_legacy_updates() {
            warn!("manifest carries templates under `updates`; legacy layout ignored");
        }

        let plan = DeltaPlan::from_manifest(manifest)?;
        info!(
            version = %plan.version,
            wrappers = plan.wrappers.len(),
            deletions = plan.deletions.len(),
            "applying delta update"
        );

        self.db.apply_delta(plan).await
    }
}

/// Applies a bundle file from disk as a full reset, using the document's own version.
pub async fn import_bundle(db: &DbActorHandle, path: &Path) -> Result<SyncReport, MirrorError> {
    let doc = load_bundle_file(path)?;
    let plan = SnapshotPlan::from_bundle(doc, None)?;
    db.apply_full_reset(plan).await
}
