use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Name of the document inside the full-bundle archive.
pub const BUNDLE_DOCUMENT_NAME: &str = "zywrap-data.json";

/// Full snapshot document. Every collection is a map keyed by code; entry order is
/// significant because it becomes the display `ordering`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleDocument {
    #[serde(default, deserialize_with = "crate::lax::version_token")]
    pub version: Option<String>,

    #[serde(default)]
    pub categories: IndexMap<String, BundleCategory>,

    /// `code => name`
    #[serde(default)]
    pub languages: IndexMap<String, String>,

    #[serde(default)]
    pub ai_models: IndexMap<String, BundleAiModel>,

    /// `type => { code => name }`
    #[serde(default)]
    pub templates: IndexMap<String, IndexMap<String, String>>,

    #[serde(default)]
    pub wrappers: IndexMap<String, BundleWrapper>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BundleCategory {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleAiModel {
    pub name: String,
    #[serde(default)]
    pub prov_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BundleWrapper {
    pub name: String,
    #[serde(default)]
    pub desc: Option<String>,
    pub cat: String,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub base: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_keeps_entry_order() {
        let raw = r#"{
            "version": "v9",
            "categories": { "zeta": { "name": "Z" }, "alpha": { "name": "A" } },
            "languages": { "fr": "French", "de": "German" },
            "aiModels": { "m1": { "name": "Model", "provId": "openai" } },
            "templates": { "tones": { "warm": "Warm", "cold": "Cold" } },
            "wrappers": {
                "w1": { "name": "W1", "desc": "d", "cat": "zeta", "featured": true, "base": false }
            }
        }"#;

        let doc: BundleDocument = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.version.as_deref(), Some("v9"));

        let codes: Vec<&str> = doc.categories.keys().map(String::as_str).collect();
        assert_eq!(codes, vec!["zeta", "alpha"]);

        let langs: Vec<&str> = doc.languages.keys().map(String::as_str).collect();
        assert_eq!(langs, vec!["fr", "de"]);

        assert_eq!(doc.ai_models["m1"].prov_id.as_deref(), Some("openai"));
        assert_eq!(doc.templates["tones"].get_index(1).unwrap().0, "cold");
        assert!(doc.wrappers["w1"].featured);
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let doc: BundleDocument = serde_json::from_str(r#"{ "version": 42 }"#).unwrap();
        assert_eq!(doc.version.as_deref(), Some("42"));
        assert!(doc.categories.is_empty());
        assert!(doc.wrappers.is_empty());
    }
}
