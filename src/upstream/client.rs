use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::{path::Path, time::Duration};
use tracing::{debug, info, warn};
use url::Url;
use zymirror_schema::{BundleDocument, ManifestResponse};

use super::{
    CatalogSource, UPSTREAM_BODY_PREVIEW_CHARS,
    bundle::{extract_bundle_document, save_bundle_file},
};
use crate::config::UpstreamConfig;
use crate::error::MirrorError;
use crate::utils::logging::{body_preview, with_pretty_json_debug};

const USER_AGENT: &str = concat!("zymirror/", env!("CARGO_PKG_VERSION"));

/// Export service client: bearer-authenticated GETs with backoff on transient failures.
#[derive(Clone)]
pub struct HttpCatalogSource {
    client: reqwest::Client,
    updates_url: Url,
    export_url: Url,
    api_key: String,
    retry_policy: ExponentialBuilder,
}

impl HttpCatalogSource {
    pub fn new(cfg: &UpstreamConfig) -> Result<Self, MirrorError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)));

        if let Some(proxy_url) = &cfg.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }

        let retry_policy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(5))
            .with_max_times(cfg.retry_max_times)
            .with_jitter();

        Ok(Self {
            client: builder.build()?,
            updates_url: cfg.updates_url.clone(),
            export_url: cfg.export_url.clone(),
            api_key: cfg.api_key.clone(),
            retry_policy,
        })
    }

    /// GET with retries on connect errors and 5xx. Other statuses are returned as-is.
    async fn get_with_retry(
        &self,
        url: &Url,
        accept: &'static str,
    ) -> Result<reqwest::Response, reqwest::Error> {
        (|| async move {
            let resp = self
                .client
                .get(url.clone())
                .bearer_auth(&self.api_key)
                .header(ACCEPT, accept)
                .send()
                .await?;

            if resp.status().is_server_error() {
                let status = resp.status();
                let err = resp.error_for_status_ref().unwrap_err();
                debug!(%status, url = %url, "upstream server error (will retry)");
                return Err(err);
            }

            Ok(resp)
        })
        .retry(self.retry_policy)
        .notify(|err: &reqwest::Error, dur: Duration| {
            warn!(error = %err, retry_in = ?dur, "upstream request failed, retrying");
        })
        .await
    }

    /// Archive GET shared by sync bundles and `download`.
    async fn fetch_archive(&self, url: &Url) -> Result<Vec<u8>, MirrorError> {
        let resp = self.get_with_retry(url, "application/zip").await?;
        let resp = ensure_success(resp).await?;

        // The service answers errors with a 200 JSON/HTML body instead of an archive.
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if content_type.contains("application/json") || content_type.contains("text/html") {
            let preview = read_preview(resp).await;
            return Err(MirrorError::Bundle(format!(
                "expected an archive, got {content_type}: {preview}"
            )));
        }

        Ok(resp.bytes().await?.to_vec())
    }

    /// Saves the full export archive to `out` without touching the mirror.
    ///
    /// The archive must contain a parseable bundle document, so `out` is only
    /// written when a later `import` of it would be accepted.
    pub async fn download_export(&self, out: &Path) -> Result<usize, MirrorError> {
        info!(url = %self.export_url, out = %out.display(), "downloading export archive");
        let archive = self.fetch_archive(&self.export_url).await?;

        let doc = extract_bundle_document(&archive)?;
        save_bundle_file(out, &archive)?;
        info!(
            bytes = archive.len(),
            version = doc.version.as_deref().unwrap_or("<none>"),
            "export archive saved"
        );
        Ok(archive.len())
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch_manifest(
        &self,
        from_version: Option<&str>,
    ) -> Result<ManifestResponse, MirrorError> {
        let mut url = self.updates_url.clone();
        if let Some(version) = from_version.filter(|v| !v.is_empty()) {
            url.query_pairs_mut().append_pair("fromVersion", version);
        }

        info!(url = %url, from_version = from_version.unwrap_or("<none>"), "fetching manifest");
        let resp = self.get_with_retry(&url, "application/json").await?;
        let resp = ensure_success(resp).await?;

        let body = resp.bytes().await?;
        let manifest: ManifestResponse = serde_json::from_slice(&body)?;
        with_pretty_json_debug(&manifest, |json| {
            debug!(manifest = %json, "manifest received");
        });
        Ok(manifest)
    }

    async fn fetch_bundle(&self, download_url: &str) -> Result<BundleDocument, MirrorError> {
        let url = Url::parse(download_url)?;

        info!(url = %url, "downloading full bundle");
        let archive = self.fetch_archive(&url).await?;
        info!(bytes = archive.len(), "bundle downloaded");
        extract_bundle_document(&archive)
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, MirrorError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let url = resp.url().clone();
    let preview = read_preview(resp).await;
    warn!(%status, url = %url, body = %preview, "upstream returned an error status");
    Err(MirrorError::UpstreamStatus(status))
}

async fn read_preview(resp: reqwest::Response) -> String {
    match resp.bytes().await {
        Ok(bytes) => body_preview(&bytes, UPSTREAM_BODY_PREVIEW_CHARS),
        Err(e) => format!("<failed to read body: {e}>"),
    }
}
