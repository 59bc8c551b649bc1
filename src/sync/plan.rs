//! Typed row sets built from upstream documents before any transaction opens.
//!
//! Validation happens here so that a malformed payload never reaches the store.

use serde::Serialize;
use zymirror_schema::{BundleDocument, ManifestResponse};

use super::entity::{EntityKey, EntityKind};
use crate::db::{DbAiModel, DbBlockTemplate, DbCategory, DbLanguage, DbWrapper};
use crate::error::MirrorError;

/// A complete snapshot: after applying it, each collection holds exactly these rows.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SnapshotPlan {
    pub version: String,
    pub categories: Vec<DbCategory>,
    pub languages: Vec<DbLanguage>,
    pub ai_models: Vec<DbAiModel>,
    pub block_templates: Vec<DbBlockTemplate>,
    pub wrappers: Vec<DbWrapper>,
}

impl SnapshotPlan {
    /// Bundle maps carry no ordering; an entry's 1-based position in the document is its
    /// `ordering`. The document's own `version` wins over `fallback_version` (the manifest's
    /// `wrappers.version`).
    pub fn from_bundle(
        doc: BundleDocument,
        fallback_version: Option<String>,
    ) -> Result<Self, MirrorError> {
        let version = doc
            .version
            .or(fallback_version)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| MirrorError::malformed("full bundle carries no version"))?;

        let categories = doc
            .categories
            .into_iter()
            .zip(1i64..)
            .map(|((code, category), ordering)| DbCategory {
                code,
                name: category.name,
                ordering,
            })
            .collect();

        let languages = doc
            .languages
            .into_iter()
            .zip(1i64..)
            .map(|((code, name), ordering)| DbLanguage {
                code,
                name,
                ordering,
            })
            .collect();

        let ai_models = doc
            .ai_models
            .into_iter()
            .zip(1i64..)
            .map(|((code, model), ordering)| DbAiModel {
                code,
                name: model.name,
                provider_id: model.prov_id,
                ordering,
            })
            .collect();

        let block_templates = doc
            .templates
            .into_iter()
            .flat_map(|(template_type, items)| {
                items.into_iter().map(move |(code, name)| DbBlockTemplate {
                    template_type: template_type.clone(),
                    code,
                    name,
                })
            })
            .collect();

        let wrappers = doc
            .wrappers
            .into_iter()
            .zip(1i64..)
            .map(|((code, wrapper), ordering)| DbWrapper {
                code,
                name: wrapper.name,
                description: wrapper.desc,
                category_code: wrapper.cat,
                featured: wrapper.featured,
                base: wrapper.base,
                ordering,
            })
            .collect();

        Ok(Self {
            version,
            categories,
            languages,
            ai_models,
            block_templates,
            wrappers,
        })
    }
}

/// An explicit deletion instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deletion {
    pub kind: EntityKind,
    pub key: EntityKey,
}

/// Incremental changes since a previous version. Absence from a delta means "unchanged",
/// never "deleted".
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeltaPlan {
    pub version: String,
    pub categories: Vec<DbCategory>,
    pub languages: Vec<DbLanguage>,
    pub ai_models: Vec<DbAiModel>,
    pub block_templates: Vec<DbBlockTemplate>,
    pub wrappers: Vec<DbWrapper>,
    pub deletions: Vec<Deletion>,
}

impl DeltaPlan {
    pub fn from_manifest(manifest: &ManifestResponse) -> Result<Self, MirrorError> {
        let version = manifest
            .new_version
            .clone()
            .ok_or_else(|| MirrorError::malformed("delta update carries no newVersion"))?;

        let mut plan = DeltaPlan {
            version,
            ..Default::default()
        };

        if let Some(metadata) = &manifest.metadata {
            plan.categories = metadata
                .categories
                .iter()
                .map(|item| DbCategory {
                    code: item.code.clone(),
                    name: item.name.clone(),
                    ordering: item.ordering,
                })
                .collect();

            plan.languages = metadata
                .languages
                .iter()
                .map(|item| DbLanguage {
                    code: item.code.clone(),
                    name: item.name.clone(),
                    ordering: item.ordering,
                })
                .collect();

            plan.ai_models = metadata
                .ai_models
                .iter()
                .map(|item| DbAiModel {
                    code: item.code.clone(),
                    name: item.name.clone(),
                    provider_id: item.provider_id.clone(),
                    ordering: item.ordering,
                })
                .collect();

            for (template_type, items) in &metadata.templates {
                for item in items {
                    let name = item.display_name().ok_or_else(|| {
                        MirrorError::malformed(format!(
                            "template {template_type}/{} has neither label nor name",
                            item.code
                        ))
                    })?;
                    plan.block_templates.push(DbBlockTemplate {
                        template_type: template_type.clone(),
                        code: item.code.clone(),
                        name: name.to_string(),
                    });
                }
            }
        }

        if let Some(wrappers) = &manifest.wrappers {
            plan.wrappers = wrappers
                .upserts
                .iter()
                .map(|item| DbWrapper {
                    code: item.code.clone(),
                    name: item.name.clone(),
                    description: item.description.clone(),
                    category_code: item.category_code.clone(),
                    featured: item.featured,
                    base: item.base,
                    ordering: item.ordering,
                })
                .collect();

            plan.deletions
                .extend(wrappers.deletes.iter().map(|code| Deletion {
                    kind: EntityKind::Wrapper,
                    key: EntityKey::single(code.as_str()),
                }));
        }

        for entry in &manifest.deletions {
            let kind = EntityKind::from_wire(&entry.entity).ok_or_else(|| {
                MirrorError::malformed(format!("unknown deletion entity '{}'", entry.entity))
            })?;

            let key = match (kind, entry.template_type.as_deref()) {
                (EntityKind::BlockTemplate, Some(template_type)) => {
                    EntityKey::composite([template_type, entry.code.as_str()])
                }
                (EntityKind::BlockTemplate, None) => {
                    return Err(MirrorError::malformed(format!(
                        "template deletion '{}' has no type",
                        entry.code
                    )));
                }
                (_, _) => EntityKey::single(entry.code.as_str()),
            };
            plan.deletions.push(Deletion { kind, key });
        }

        Ok(plan)
    }

    /// Keys to delete for one collection, in payload order.
    pub fn deletions_for(&self, kind: EntityKind) -> Vec<EntityKey> {
        self.deletions
            .iter()
            .filter(|deletion| deletion.kind == kind)
            .map(|deletion| deletion.key.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bundle_ordering_follows_document_position() {
        // Raw text: `json!` would sort the object keys before they reach the ordered maps.
        let doc: BundleDocument = serde_json::from_str(
            r#"{
                "version": "v1",
                "categories": { "b": { "name": "B" }, "a": { "name": "A" } },
                "templates": {
                    "tones": { "warm": "Warm" },
                    "styles": { "terse": "Terse", "warm": "Warm style" }
                },
                "wrappers": {
                    "w1": { "name": "W1", "desc": "d", "cat": "a", "featured": true, "base": false }
                }
            }"#,
        )
        .unwrap();

        let plan = SnapshotPlan::from_bundle(doc, None).unwrap();
        assert_eq!(plan.version, "v1");
        assert_eq!(
            plan.categories,
            vec![
                DbCategory {
                    code: "b".into(),
                    name: "B".into(),
                    ordering: 1
                },
                DbCategory {
                    code: "a".into(),
                    name: "A".into(),
                    ordering: 2
                },
            ]
        );
        assert_eq!(plan.block_templates.len(), 3);
        assert_eq!(plan.block_templates[2].template_type, "styles");
        assert_eq!(plan.block_templates[2].code, "warm");
        assert_eq!(plan.wrappers[0].category_code, "a");
        assert_eq!(plan.wrappers[0].ordering, 1);
    }

    #[test]
    fn bundle_version_falls_back_to_manifest() {
        let plan = SnapshotPlan::from_bundle(BundleDocument::default(), Some("m7".into())).unwrap();
        assert_eq!(plan.version, "m7");

        let err = SnapshotPlan::from_bundle(BundleDocument::default(), None).unwrap_err();
        assert!(matches!(err, MirrorError::MalformedPayload(_)));
    }

    #[test]
    fn delta_collects_upserts_and_deletions() {
        let manifest: ManifestResponse = serde_json::from_value(json!({
            "mode": "DELTA_UPDATE",
            "metadata": {
                "languages": [{ "code": "fr", "name": "French", "ordering": 3 }],
                "templates": { "tones": [{ "code": "warm", "name": "Warm" }] }
            },
            "wrappers": { "deletes": ["w1"] },
            "deletions": [
                { "entity": "categories", "code": "old" },
                { "entity": "templates", "type": "tones", "code": "cold" }
            ],
            "newVersion": "v2"
        }))
        .unwrap();

        let plan = DeltaPlan::from_manifest(&manifest).unwrap();
        assert_eq!(plan.version, "v2");
        assert_eq!(plan.languages[0].ordering, 3);
        assert_eq!(plan.block_templates[0].name, "Warm");
        assert_eq!(
            plan.deletions_for(EntityKind::Wrapper),
            vec![EntityKey::single("w1")]
        );
        assert_eq!(
            plan.deletions_for(EntityKind::BlockTemplate),
            vec![EntityKey::composite(["tones", "cold"])]
        );
        assert_eq!(
            plan.deletions_for(EntityKind::Category),
            vec![EntityKey::single("old")]
        );
    }

    #[test]
    fn delta_rejects_incomplete_payloads() {
        let missing_version: ManifestResponse =
            serde_json::from_value(json!({ "mode": "DELTA_UPDATE" })).unwrap();
        assert!(DeltaPlan::from_manifest(&missing_version).is_err());

        let untyped_template: ManifestResponse = serde_json::from_value(json!({
            "mode": "DELTA_UPDATE",
            "deletions": [{ "entity": "templates", "code": "warm" }],
            "newVersion": "v3"
        }))
        .unwrap();
        assert!(DeltaPlan::from_manifest(&untyped_template).is_err());

        let unknown_entity: ManifestResponse = serde_json::from_value(json!({
            "mode": "DELTA_UPDATE",
            "deletions": [{ "entity": "settings", "code": "data_version" }],
            "newVersion": "v3"
        }))
        .unwrap();
        assert!(DeltaPlan::from_manifest(&unknown_entity).is_err());
    }
}
