//! Static descriptions of the mirrored collections.
//!
//! Every statement the engine issues is assembled from an [`EntitySpec`]; row values are
//! always bound, never spliced into SQL text.

use serde::{Deserialize, Serialize};
use sqlx::Sqlite;
use sqlx::query_builder::Separated;
use std::fmt;

use crate::db::{DbAiModel, DbBlockTemplate, DbCategory, DbLanguage, DbWrapper};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Category,
    Language,
    AiModel,
    BlockTemplate,
    Wrapper,
}

impl EntityKind {
    /// Referenced collections come before the collections that reference them.
    pub const DEPENDENCY_ORDER: [EntityKind; 5] = [
        EntityKind::Category,
        EntityKind::Language,
        EntityKind::AiModel,
        EntityKind::BlockTemplate,
        EntityKind::Wrapper,
    ];

    pub fn spec(self) -> &'static EntitySpec {
        match self {
            EntityKind::Category => &DbCategory::SPEC,
            EntityKind::Language => &DbLanguage::SPEC,
            EntityKind::AiModel => &DbAiModel::SPEC,
            EntityKind::BlockTemplate => &DbBlockTemplate::SPEC,
            EntityKind::Wrapper => &DbWrapper::SPEC,
        }
    }

    /// Accepts the names the export service uses for deletion instructions.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name.trim() {
            "categories" | "category" => Some(EntityKind::Category),
            "languages" | "language" => Some(EntityKind::Language),
            "aiModels" | "ai_models" | "aiModel" => Some(EntityKind::AiModel),
            "templates" | "blockTemplates" | "block_templates" => {
                Some(EntityKind::BlockTemplate)
            }
            "wrappers" | "wrapper" => Some(EntityKind::Wrapper),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.spec().table
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpec {
    Single(&'static str),
    Composite(&'static [&'static str]),
}

impl KeySpec {
    pub fn columns(&self) -> &[&'static str] {
        match self {
            KeySpec::Single(column) => std::slice::from_ref(column),
            KeySpec::Composite(columns) => columns,
        }
    }

    pub fn arity(&self) -> usize {
        self.columns().len()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns().contains(&column)
    }

    /// Left-hand side of a key match: `code` or `(type, code)`.
    pub(crate) fn match_expr(&self) -> String {
        match self {
            KeySpec::Single(column) => (*column).to_string(),
            KeySpec::Composite(columns) => format!("({})", columns.join(", ")),
        }
    }
}

#[derive(Debug)]
pub struct EntitySpec {
    pub kind: EntityKind,
    pub table: &'static str,
    /// Insert order of bound values; key columns included.
    pub columns: &'static [&'static str],
    pub key: KeySpec,
}

impl EntitySpec {
    pub fn update_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns
            .iter()
            .copied()
            .filter(|column| !self.key.contains(column))
    }

    /// ` ON CONFLICT(<key>) DO UPDATE SET <col> = excluded.<col>, ...`
    pub(crate) fn upsert_clause(&self) -> String {
        let target = self.key.columns().join(", ");
        let assignments: Vec<String> = self
            .update_columns()
            .map(|column| format!("{column} = excluded.{column}"))
            .collect();

        if assignments.is_empty() {
            format!(" ON CONFLICT({target}) DO NOTHING")
        } else {
            format!(
                " ON CONFLICT({target}) DO UPDATE SET {}",
                assignments.join(", ")
            )
        }
    }
}

/// Key values in `KeySpec` column order. Composite keys compare as tuples.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey(Vec<String>);

impl EntityKey {
    pub fn single(code: impl Into<String>) -> Self {
        Self(vec![code.into()])
    }

    pub fn composite<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// A row type the engine can upsert, diff and delete generically.
pub trait MirrorEntity: Send + Sync {
    const SPEC: EntitySpec;

    fn key(&self) -> EntityKey;

    /// Binds one value per `SPEC.columns` entry, in that order.
    fn push_columns(&self, row: &mut Separated<'_, '_, Sqlite, &'static str>);
}

impl MirrorEntity for DbCategory {
    const SPEC: EntitySpec = EntitySpec {
        kind: EntityKind::Category,
        table: "categories",
        columns: &["code", "name", "ordering"],
        key: KeySpec::Single("code"),
    };

    fn key(&self) -> EntityKey {
        EntityKey::single(self.code.as_str())
    }

    fn push_columns(&self, row: &mut Separated<'_, '_, Sqlite, &'static str>) {
        row.push_bind(self.code.clone())
            .push_bind(self.name.clone())
            .push_bind(self.ordering);
    }
}

impl MirrorEntity for DbLanguage {
    const SPEC: EntitySpec = EntitySpec {
        kind: EntityKind::Language,
        table: "languages",
        columns: &["code", "name", "ordering"],
        key: KeySpec::Single("code"),
    };

    fn key(&self) -> EntityKey {
        EntityKey::single(self.code.as_str())
    }

    fn push_columns(&self, row: &mut Separated<'_, '_, Sqlite, &'static str>) {
        row.push_bind(self.code.clone())
            .push_bind(self.name.clone())
            .push_bind(self.ordering);
    }
}

impl MirrorEntity for DbAiModel {
    const SPEC: EntitySpec = EntitySpec {
        kind: EntityKind::AiModel,
        table: "ai_models",
        columns: &["code", "name", "provider_id", "ordering"],
        key: KeySpec::Single("code"),
    };

    fn key(&self) -> EntityKey {
        EntityKey::single(self.code.as_str())
    }

    fn push_columns(&self, row: &mut Separated<'_, '_, Sqlite, &'static str>) {
        row.push_bind(self.code.clone())
            .push_bind(self.name.clone())
            .push_bind(self.provider_id.clone())
            .push_bind(self.ordering);
    }
}

impl MirrorEntity for DbBlockTemplate {
    const SPEC: EntitySpec = EntitySpec {
        kind: EntityKind::BlockTemplate,
        table: "block_templates",
        columns: &["type", "code", "name"],
        key: KeySpec::Composite(&["type", "code"]),
    };

    fn key(&self) -> EntityKey {
        EntityKey::composite([self.template_type.as_str(), self.code.as_str()])
    }

    fn push_columns(&self, row: &mut Separated<'_, '_, Sqlite, &'static str>) {
        row.push_bind(self.template_type.clone())
            .push_bind(self.code.clone())
            .push_bind(self.name.clone());
    }
}

impl MirrorEntity for DbWrapper {
    const SPEC: EntitySpec = EntitySpec {
        kind: EntityKind::Wrapper,
        table: "wrappers",
        columns: &[
            "code",
            "name",
            "description",
            "category_code",
            "featured",
            "base",
            "ordering",
        ],
        key: KeySpec::Single("code"),
    };

    fn key(&self) -> EntityKey {
        EntityKey::single(self.code.as_str())
    }

    fn push_columns(&self, row: &mut Separated<'_, '_, Sqlite, &'static str>) {
        row.push_bind(self.code.clone())
            .push_bind(self.name.clone())
            .push_bind(self.description.clone())
            .push_bind(self.category_code.clone())
            .push_bind(self.featured)
            .push_bind(self.base)
            .push_bind(self.ordering);
    }
}
