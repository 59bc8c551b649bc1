use serde_json::json;
use sqlx::SqlitePool;
use std::{
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};
use zymirror::db::{DbCategory, DbLanguage, DbWrapper};
use zymirror::sync::{
    BatchSizes, DeltaPlan, EntityKind, SnapshotPlan, SyncEngine, TableChange, VersionStore,
};
use zymirror_schema::{BundleDocument, ManifestResponse};

fn unique_sqlite_path(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();

    let mut temp_path = std::env::temp_dir();
    temp_path.push(format!(
        "zymirror-cycle-{tag}-{}-{}.sqlite",
        std::process::id(),
        nanos
    ));
    temp_path
}

async fn open_pool(tag: &str) -> (PathBuf, SqlitePool) {
    let temp_path = unique_sqlite_path(tag);
    let database_url = format!("sqlite:{}", temp_path.display());
    let pool = zymirror::db::connect(&database_url)
        .await
        .expect("failed to open mirror database");
    (temp_path, pool)
}

async fn cleanup(temp_path: PathBuf, pool: SqlitePool) {
    pool.close().await;
    let _ = tokio::fs::remove_file(&temp_path).await;
}

async fn version(pool: &SqlitePool) -> Option<String> {
    let mut conn = pool.acquire().await.expect("acquire failed");
    VersionStore::get(&mut conn).await.expect("version read failed")
}

async fn category_codes(pool: &SqlitePool) -> Vec<String> {
    sqlx::query_scalar("SELECT code FROM categories ORDER BY code")
        .fetch_all(pool)
        .await
        .expect("failed to read categories")
}

async fn language_codes(pool: &SqlitePool) -> Vec<String> {
    sqlx::query_scalar("SELECT code FROM languages ORDER BY code")
        .fetch_all(pool)
        .await
        .expect("failed to read languages")
}

async fn wrappers(pool: &SqlitePool) -> Vec<DbWrapper> {
    sqlx::query_as::<_, DbWrapper>(
        "SELECT code, name, description, category_code, featured, base, ordering \
         FROM wrappers ORDER BY code",
    )
    .fetch_all(pool)
    .await
    .expect("failed to read wrappers")
}

async fn provider_of(pool: &SqlitePool, model: &str) -> Option<String> {
    sqlx::query_scalar("SELECT provider_id FROM ai_models WHERE code = ?")
        .bind(model)
        .fetch_one(pool)
        .await
        .expect("failed to read ai model")
}

/// Parsed from text so entry order survives into the ordered maps.
fn bundle(raw: &str) -> SnapshotPlan {
    let doc: BundleDocument = serde_json::from_str(raw).expect("bad bundle fixture");
    SnapshotPlan::from_bundle(doc, None).expect("bundle fixture has no version")
}

fn delta(value: serde_json::Value) -> DeltaPlan {
    let manifest: ManifestResponse = serde_json::from_value(value).expect("bad delta fixture");
    DeltaPlan::from_manifest(&manifest).expect("delta fixture rejected")
}

fn bootstrap_v1() -> SnapshotPlan {
    bundle(
        r#"{
            "version": "v1",
            "categories": { "a": { "name": "A" } },
            "languages": { "en": "English" },
            "aiModels": { "m1": { "name": "Model 1", "provId": "p1" } },
            "templates": { "tones": { "warm": "Warm", "cold": "Cold" } },
            "wrappers": {
                "w1": { "name": "W1", "desc": "first", "cat": "a", "featured": true, "base": false }
            }
        }"#,
    )
}

#[tokio::test]
async fn full_reset_bootstraps_an_empty_mirror() {
    let (temp_path, pool) = open_pool("bootstrap").await;
    let engine = SyncEngine::new(BatchSizes::default());
    assert_eq!(version(&pool).await, None);

    let report = engine
        .apply_full_reset(&pool, &bootstrap_v1())
        .await
        .expect("full reset failed");

    assert_eq!(report.version.as_deref(), Some("v1"));
    assert_eq!(report.change(EntityKind::BlockTemplate).upserted, 2);
    assert_eq!(category_codes(&pool).await, vec!["a"]);
    assert_eq!(
        wrappers(&pool).await,
        vec![DbWrapper {
            code: "w1".into(),
            name: "W1".into(),
            description: Some("first".into()),
            category_code: "a".into(),
            featured: true,
            base: false,
            ordering: 1,
        }]
    );
    assert_eq!(provider_of(&pool, "m1").await.as_deref(), Some("p1"));
    assert_eq!(version(&pool).await.as_deref(), Some("v1"));

    cleanup(temp_path, pool).await;
}

#[tokio::test]
async fn full_reset_removes_obsolete_rows_across_the_foreign_key() {
    let (temp_path, pool) = open_pool("obsolete").await;
    let engine = SyncEngine::new(BatchSizes::uniform(1));

    engine
        .apply_full_reset(
            &pool,
            &bundle(
                r#"{
                    "version": "v1",
                    "categories": { "a": { "name": "A" }, "b": { "name": "B" } },
                    "wrappers": {
                        "w1": { "name": "W1", "cat": "a" },
                        "w2": { "name": "W2", "cat": "b" }
                    }
                }"#,
            ),
        )
        .await
        .expect("seed");

    // `b` disappears while `w2` still points at it until wrappers are mirrored.
    let report = engine
        .apply_full_reset(
            &pool,
            &bundle(
                r#"{
                    "version": "v2",
                    "categories": { "a": { "name": "A" } },
                    "wrappers": { "w1": { "name": "W1", "cat": "a" } }
                }"#,
            ),
        )
        .await
        .expect("reset with removals failed");

    assert_eq!(
        report.change(EntityKind::Category),
        TableChange {
            upserted: 1,
            deleted: 1
        }
    );
    assert_eq!(report.change(EntityKind::Wrapper).deleted, 1);
    assert_eq!(category_codes(&pool).await, vec!["a"]);
    assert_eq!(wrappers(&pool).await.len(), 1);
    assert_eq!(version(&pool).await.as_deref(), Some("v2"));

    cleanup(temp_path, pool).await;
}

#[tokio::test]
async fn failed_full_reset_leaves_state_and_version_untouched() {
    let (temp_path, pool) = open_pool("atomic").await;
    let engine = SyncEngine::new(BatchSizes::default());
    engine
        .apply_full_reset(&pool, &bootstrap_v1())
        .await
        .expect("seed");

    // Categories and languages are written before wrappers; the wrapper write aborts.
    sqlx::query(
        "CREATE TRIGGER fail_wrapper_insert BEFORE INSERT ON wrappers \
         BEGIN SELECT RAISE(ABORT, 'injected failure'); END",
    )
    .execute(&pool)
    .await
    .expect("failed to install trigger");

    let err = engine
        .apply_full_reset(
            &pool,
            &bundle(
                r#"{
                    "version": "v2",
                    "categories": { "z": { "name": "Z" } },
                    "languages": { "fr": "French" },
                    "wrappers": { "w9": { "name": "W9", "cat": "z" } }
                }"#,
            ),
        )
        .await
        .expect_err("injected failure should abort the cycle");
    assert!(matches!(err, zymirror::MirrorError::DatabaseError(_)));

    assert_eq!(category_codes(&pool).await, vec!["a"]);
    assert_eq!(language_codes(&pool).await, vec!["en"]);
    assert_eq!(wrappers(&pool).await[0].code, "w1");
    assert_eq!(version(&pool).await.as_deref(), Some("v1"));

    cleanup(temp_path, pool).await;
}

#[tokio::test]
async fn wrapper_with_unknown_category_fails_at_commit() {
    let (temp_path, pool) = open_pool("fk").await;
    let engine = SyncEngine::new(BatchSizes::default());
    engine
        .apply_full_reset(&pool, &bootstrap_v1())
        .await
        .expect("seed");

    let result = engine
        .apply_full_reset(
            &pool,
            &bundle(
                r#"{
                    "version": "v2",
                    "categories": { "a": { "name": "A renamed" } },
                    "wrappers": { "w1": { "name": "W1", "cat": "nowhere" } }
                }"#,
            ),
        )
        .await;

    assert!(result.is_err(), "dangling category reference must not commit");
    let names: Vec<String> = sqlx::query_scalar("SELECT name FROM categories")
        .fetch_all(&pool)
        .await
        .expect("read failed");
    assert_eq!(names, vec!["A"]);
    assert_eq!(wrappers(&pool).await[0].category_code, "a");
    assert_eq!(version(&pool).await.as_deref(), Some("v1"));

    cleanup(temp_path, pool).await;
}

#[tokio::test]
async fn delta_deletes_wrapper_and_advances_version() {
    let (temp_path, pool) = open_pool("delta-delete").await;
    let engine = SyncEngine::new(BatchSizes::default());
    engine
        .apply_full_reset(&pool, &bootstrap_v1())
        .await
        .expect("seed");

    let report = engine
        .apply_delta(
            &pool,
            &delta(json!({
                "mode": "DELTA_UPDATE",
                "wrappers": { "deletes": ["w1"] },
                "newVersion": "v2"
            })),
        )
        .await
        .expect("delta failed");

    assert_eq!(report.change(EntityKind::Wrapper).deleted, 1);
    assert!(wrappers(&pool).await.is_empty());
    assert_eq!(category_codes(&pool).await, vec!["a"]);
    assert_eq!(version(&pool).await.as_deref(), Some("v2"));

    cleanup(temp_path, pool).await;
}

#[tokio::test]
async fn delta_upserts_in_place_and_leaves_absent_rows_alone() {
    let (temp_path, pool) = open_pool("delta-upsert").await;
    let engine = SyncEngine::new(BatchSizes::default());
    engine
        .apply_full_reset(&pool, &bootstrap_v1())
        .await
        .expect("seed");

    engine
        .apply_delta(
            &pool,
            &delta(json!({
                "mode": "DELTA_UPDATE",
                "metadata": {
                    "categories": [{ "code": "b", "name": "B", "ordering": 2 }],
                    "languages": [{ "code": "en", "name": "English (US)", "ordering": 5 }],
                    "aiModels": [
                        { "code": "m1", "name": "Model 1", "provider_id": "p2", "ordering": 1 },
                        { "code": "m2", "name": "Model 2", "providerId": "p3", "ordering": 2 }
                    ]
                },
                "wrappers": {
                    "upserts": [{
                        "code": "w2", "name": "W2", "description": null,
                        "categoryCode": "b", "featured": false, "base": true, "ordering": 3
                    }]
                },
                "newVersion": "v2"
            })),
        )
        .await
        .expect("delta failed");

    let languages = sqlx::query_as::<_, DbLanguage>("SELECT code, name, ordering FROM languages")
        .fetch_all(&pool)
        .await
        .expect("read failed");
    assert_eq!(
        languages,
        vec![DbLanguage {
            code: "en".into(),
            name: "English (US)".into(),
            ordering: 5
        }]
    );
    assert_eq!(provider_of(&pool, "m1").await.as_deref(), Some("p2"));
    assert_eq!(provider_of(&pool, "m2").await.as_deref(), Some("p3"));
    assert_eq!(category_codes(&pool).await, vec!["a", "b"]);
    let codes: Vec<String> = wrappers(&pool).await.into_iter().map(|w| w.code).collect();
    assert_eq!(codes, vec!["w1", "w2"]);

    cleanup(temp_path, pool).await;
}

#[tokio::test]
async fn contradictory_delta_ends_with_the_row_deleted() {
    let (temp_path, pool) = open_pool("delta-contradict").await;
    let engine = SyncEngine::new(BatchSizes::default());
    engine
        .apply_full_reset(&pool, &bootstrap_v1())
        .await
        .expect("seed");

    engine
        .apply_delta(
            &pool,
            &delta(json!({
                "mode": "DELTA_UPDATE",
                "metadata": {
                    "categories": [{ "code": "gone", "name": "Gone", "ordering": 9 }],
                    "templates": { "tones": [{ "code": "cold", "label": "Chilly" }] }
                },
                "wrappers": {
                    "upserts": [{
                        "code": "w2", "name": "W2", "categoryCode": "a",
                        "featured": false, "base": false, "ordering": 2
                    }],
                    "deletes": ["w2"]
                },
                "deletions": [
                    { "entity": "categories", "code": "gone" },
                    { "entity": "templates", "type": "tones", "code": "cold" }
                ],
                "newVersion": "v2"
            })),
        )
        .await
        .expect("delta failed");

    assert_eq!(category_codes(&pool).await, vec!["a"]);
    let codes: Vec<String> = wrappers(&pool).await.into_iter().map(|w| w.code).collect();
    assert_eq!(codes, vec!["w1"]);
    let templates: Vec<String> =
        sqlx::query_scalar("SELECT type || '/' || code FROM block_templates ORDER BY code")
            .fetch_all(&pool)
            .await
            .expect("read failed");
    assert_eq!(templates, vec!["tones/warm"]);
    assert_eq!(version(&pool).await.as_deref(), Some("v2"));

    cleanup(temp_path, pool).await;
}

#[tokio::test]
async fn reapplying_the_same_delta_is_harmless() {
    let (temp_path, pool) = open_pool("delta-replay").await;
    let engine = SyncEngine::new(BatchSizes::default());
    engine
        .apply_full_reset(&pool, &bootstrap_v1())
        .await
        .expect("seed");

    let plan = delta(json!({
        "mode": "DELTA_UPDATE",
        "metadata": { "categories": [{ "code": "c", "name": "C", "ordering": 3 }] },
        "wrappers": { "deletes": ["w1"] },
        "newVersion": "v2"
    }));

    engine.apply_delta(&pool, &plan).await.expect("first apply");
    let replay = engine.apply_delta(&pool, &plan).await.expect("replay");

    assert_eq!(replay.change(EntityKind::Wrapper).deleted, 0);
    assert_eq!(category_codes(&pool).await, vec!["a", "c"]);
    assert!(wrappers(&pool).await.is_empty());
    assert_eq!(version(&pool).await.as_deref(), Some("v2"));

    cleanup(temp_path, pool).await;
}

#[tokio::test]
async fn delta_deleting_a_referenced_category_rolls_back() {
    let (temp_path, pool) = open_pool("delta-fk").await;
    let engine = SyncEngine::new(BatchSizes::default());
    engine
        .apply_full_reset(&pool, &bootstrap_v1())
        .await
        .expect("seed");

    let result = engine
        .apply_delta(
            &pool,
            &delta(json!({
                "mode": "DELTA_UPDATE",
                "metadata": { "languages": [{ "code": "de", "name": "German", "ordering": 2 }] },
                "deletions": [{ "entity": "categories", "code": "a" }],
                "newVersion": "v2"
            })),
        )
        .await;

    assert!(result.is_err());
    assert_eq!(category_codes(&pool).await, vec!["a"]);
    assert_eq!(language_codes(&pool).await, vec!["en"]);
    assert_eq!(version(&pool).await.as_deref(), Some("v1"));

    let seeded: Vec<DbCategory> =
        sqlx::query_as("SELECT code, name, ordering FROM categories")
            .fetch_all(&pool)
            .await
            .expect("read failed");
    assert_eq!(seeded[0].name, "A");

    cleanup(temp_path, pool).await;
}
