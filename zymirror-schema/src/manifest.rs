use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Response of `GET /v1/sdk/export/updates?fromVersion=...`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestResponse {
    #[serde(default)]
    pub mode: Option<String>,

    #[serde(default)]
    pub wrappers: Option<WrappersSection>,

    #[serde(default)]
    pub metadata: Option<DeltaMetadata>,

    /// Legacy delta shape (`updates.<type>`); read only to warn about it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updates: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deletions: Vec<DeletionEntry>,

    #[serde(default, deserialize_with = "crate::lax::version_token")]
    pub new_version: Option<String>,
}

impl ManifestResponse {
    pub fn sync_mode(&self) -> SyncMode {
        SyncMode::from_wire(self.mode.as_deref())
    }

    /// True when the payload still uses the `updates.<type>` layout with content in it.
    pub fn has_legacy_updates(&self) -> bool {
        match &self.updates {
            Some(Value::Object(map)) => !map.is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncMode {
    FullReset,
    DeltaUpdate,
    /// Anything else the service answers with (`NO_UPDATES`, unknown, missing).
    Unchanged,
}

impl SyncMode {
    pub fn from_wire(mode: Option<&str>) -> Self {
        match mode.map(str::trim) {
            Some("FULL_RESET") => SyncMode::FullReset,
            Some("DELTA_UPDATE") => SyncMode::DeltaUpdate,
            _ => SyncMode::Unchanged,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::FullReset => "FULL_RESET",
            SyncMode::DeltaUpdate => "DELTA_UPDATE",
            SyncMode::Unchanged => "UNCHANGED",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `wrappers` carries the bundle pointer in FULL_RESET and the wrapper delta in DELTA_UPDATE.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappersSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,

    #[serde(
        default,
        deserialize_with = "crate::lax::version_token",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upserts: Vec<WrapperItem>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deletes: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaMetadata {
    #[serde(default)]
    pub categories: Vec<OrderedItem>,

    #[serde(default)]
    pub languages: Vec<OrderedItem>,

    #[serde(default)]
    pub ai_models: Vec<AiModelItem>,

    /// `type => [{code, label|name}]`
    #[serde(default)]
    pub templates: IndexMap<String, Vec<TemplateItem>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OrderedItem {
    pub code: String,
    pub name: String,
    pub ordering: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AiModelItem {
    pub code: String,
    pub name: String,
    #[serde(default, rename = "provider_id", alias = "providerId")]
    pub provider_id: Option<String>,
    pub ordering: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TemplateItem {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl TemplateItem {
    /// `label` is preferred, `name` is the older spelling.
    pub fn display_name(&self) -> Option<&str> {
        self.label.as_deref().or(self.name.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WrapperItem {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category_code: String,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub base: bool,
    pub ordering: i64,
}

/// Generic deletion instruction: `{ "entity": "categories", "code": "x" }`.
/// Block templates additionally carry `"type"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeletionEntry {
    pub entity: String,
    pub code: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub template_type: Option<String>,
}
