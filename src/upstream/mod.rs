//! Upstream export service: manifest fetch and full-bundle acquisition.
//!
//! Everything here runs before a sync transaction opens.

pub mod bundle;
pub mod client;

pub use bundle::{
    extract_bundle_document, load_bundle_file, parse_bundle_document, save_bundle_file,
};
pub use client::HttpCatalogSource;

use async_trait::async_trait;
use zymirror_schema::{BundleDocument, ManifestResponse};

use crate::error::MirrorError;

/// Longest slice of an upstream error body that ends up in logs.
pub const UPSTREAM_BODY_PREVIEW_CHARS: usize = 512;

/// Where sync cycles get their manifest and full bundles from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// `from_version` is the last committed version; `None` asks for a bootstrap.
    async fn fetch_manifest(
        &self,
        from_version: Option<&str>,
    ) -> Result<ManifestResponse, MirrorError>;

    /// Downloads and unpacks the bundle a FULL_RESET manifest points at.
    async fn fetch_bundle(&self, download_url: &str) -> Result<BundleDocument, MirrorError>;
}
