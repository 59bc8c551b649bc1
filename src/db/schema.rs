//! SQL DDL for initializing the mirror database.
//! SQLite-first design; table and column names match the other readers of the mirror.

/// SQLite schema includes:
/// - the five catalog tables (`categories`, `languages`, `ai_models`, `block_templates`, `wrappers`)
/// - `settings`, holding the `data_version` marker of the last committed sync
pub const SQLITE_INIT: &str = r#"
-- ---------------------------------------------------------------------------
-- Categories
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS categories (
    code TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    ordering INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_categories_ordering ON categories(ordering);

-- ---------------------------------------------------------------------------
-- Languages
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS languages (
    code TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    ordering INTEGER NOT NULL DEFAULT 0
);

-- ---------------------------------------------------------------------------
-- AI models
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS ai_models (
    code TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    provider_id TEXT NULL,
    ordering INTEGER NOT NULL DEFAULT 0
);

-- ---------------------------------------------------------------------------
-- Block templates (one (type, code) per row)
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS block_templates (
    type TEXT NOT NULL,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    PRIMARY KEY (type, code)
);

-- ---------------------------------------------------------------------------
-- Wrappers (category reference is checked at commit, so a cycle may reorder
-- categories and wrappers freely inside its transaction)
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS wrappers (
    code TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    description TEXT NULL,
    category_code TEXT NOT NULL
        REFERENCES categories(code) DEFERRABLE INITIALLY DEFERRED,
    featured INTEGER NOT NULL DEFAULT 0,
    base INTEGER NOT NULL DEFAULT 0,
    ordering INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_wrappers_category ON wrappers(category_code, ordering);

-- ---------------------------------------------------------------------------
-- Settings (singleton `data_version` row)
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS settings (
    setting_key TEXT PRIMARY KEY NOT NULL,
    setting_value TEXT NULL
);
"#;
