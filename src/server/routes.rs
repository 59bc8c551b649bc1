use axum::{
    Json,
    extract::{Query, State},
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::db::{DbAiModel, DbBlockTemplate, DbCategory, DbLanguage, DbWrapper};
use crate::error::MirrorError;
use crate::server::router::MirrorState;

/// `{code, name}` entry shared by the flat lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamedItem {
    pub code: String,
    pub name: String,
}

impl From<DbCategory> for NamedItem {
    fn from(row: DbCategory) -> Self {
        Self {
            code: row.code,
            name: row.name,
        }
    }
}

impl From<DbLanguage> for NamedItem {
    fn from(row: DbLanguage) -> Self {
        Self {
            code: row.code,
            name: row.name,
        }
    }
}

impl From<DbAiModel> for NamedItem {
    fn from(row: DbAiModel) -> Self {
        Self {
            code: row.code,
            name: row.name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WrapperItem {
    pub code: String,
    pub name: String,
    pub featured: bool,
    pub base: bool,
}

impl From<DbWrapper> for WrapperItem {
    fn from(row: DbWrapper) -> Self {
        Self {
            code: row.code,
            name: row.name,
            featured: row.featured,
            base: row.base,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionResponse {
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WrapperQuery {
    pub category: Option<String>,
}

pub async fn categories_handler(
    State(state): State<MirrorState>,
) -> Result<Json<Vec<NamedItem>>, MirrorError> {
    let rows = state.db.list_categories().await?;
    Ok(Json(rows.into_iter().map(NamedItem::from).collect()))
}

pub async fn languages_handler(
    State(state): State<MirrorState>,
) -> Result<Json<Vec<NamedItem>>, MirrorError> {
    let rows = state.db.list_languages().await?;
    Ok(Json(rows.into_iter().map(NamedItem::from).collect()))
}

pub async fn ai_models_handler(
    State(state): State<MirrorState>,
) -> Result<Json<Vec<NamedItem>>, MirrorError> {
    let rows = state.db.list_ai_models().await?;
    Ok(Json(rows.into_iter().map(NamedItem::from).collect()))
}

/// Templates grouped by type; rows arrive sorted by (type, name) so groups keep that order.
pub async fn block_templates_handler(
    State(state): State<MirrorState>,
) -> Result<Json<IndexMap<String, Vec<NamedItem>>>, MirrorError> {
    let rows = state.db.list_block_templates().await?;
    Ok(Json(group_templates(rows)))
}

pub async fn wrappers_handler(
    State(state): State<MirrorState>,
    Query(query): Query<WrapperQuery>,
) -> Result<Json<Vec<WrapperItem>>, MirrorError> {
    let Some(category) = query.category.filter(|c| !c.is_empty()) else {
        return Ok(Json(Vec::new()));
    };

    let rows = state.db.list_wrappers_by_category(&category).await?;
    Ok(Json(rows.into_iter().map(WrapperItem::from).collect()))
}

pub async fn version_handler(
    State(state): State<MirrorState>,
) -> Result<Json<VersionResponse>, MirrorError> {
    let version = state.db.current_version().await?;
    Ok(Json(VersionResponse { version }))
}

fn group_templates(rows: Vec<DbBlockTemplate>) -> IndexMap<String, Vec<NamedItem>> {
    let mut grouped: IndexMap<String, Vec<NamedItem>> = IndexMap::new();
    for row in rows {
        grouped.entry(row.template_type).or_default().push(NamedItem {
            code: row.code,
            name: row.name,
        });
    }
    grouped
}
