use sqlx::SqliteConnection;

use crate::error::MirrorError;

/// `settings` key of the version marker.
pub const DATA_VERSION_KEY: &str = "data_version";

/// The persisted marker of the last upstream version that fully committed.
pub struct VersionStore;

impl VersionStore {
    /// `None` means the mirror was never synced: bootstrap with a full reset.
    pub async fn get(conn: &mut SqliteConnection) -> Result<Option<String>, MirrorError> {
        let value: Option<Option<String>> =
            sqlx::query_scalar("SELECT setting_value FROM settings WHERE setting_key = ?")
                .bind(DATA_VERSION_KEY)
                .fetch_optional(&mut *conn)
                .await?;

        Ok(value.flatten().filter(|v| !v.is_empty()))
    }

    /// Must be the last statement of a committing cycle transaction.
    pub async fn set(conn: &mut SqliteConnection, version: &str) -> Result<(), MirrorError> {
        sqlx::query(
            r#"
            INSERT INTO settings (setting_key, setting_value)
            VALUES (?, ?)
            ON CONFLICT(setting_key) DO UPDATE SET
                setting_value = excluded.setting_value
            "#,
        )
        .bind(DATA_VERSION_KEY)
        .bind(version)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
