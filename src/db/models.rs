use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, FromRow)]
pub struct DbCategory {
    pub code: String,
    pub name: String,
    pub ordering: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, FromRow)]
pub struct DbLanguage {
    pub code: String,
    pub name: String,
    pub ordering: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, FromRow)]
pub struct DbAiModel {
    pub code: String,
    pub name: String,
    pub provider_id: Option<String>,
    pub ordering: i64,
}

/// Unique per (`type`, `code`); `type` partitions templates (tones, styles, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, FromRow)]
pub struct DbBlockTemplate {
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub template_type: String,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, FromRow)]
pub struct DbWrapper {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    /// References `categories.code` (checked at commit).
    pub category_code: String,
    pub featured: bool,
    pub base: bool,
    pub ordering: i64,
}
