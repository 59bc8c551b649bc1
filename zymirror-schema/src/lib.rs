//! Wire types for the upstream catalog export service.
//!
//! - `manifest`: the `updates` endpoint response (mode switch + delta lists)
//! - `bundle`: the `zywrap-data.json` document shipped inside a full bundle archive

pub mod bundle;
pub mod manifest;

mod lax;

pub use bundle::{
    BUNDLE_DOCUMENT_NAME, BundleAiModel, BundleCategory, BundleDocument, BundleWrapper,
};
pub use manifest::{
    AiModelItem, DeletionEntry, DeltaMetadata, ManifestResponse, OrderedItem, SyncMode,
    TemplateItem, WrapperItem, WrappersSection,
};
