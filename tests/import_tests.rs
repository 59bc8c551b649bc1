use serde_json::json;
use std::{
    io::{Cursor, Write},
    time::{SystemTime, UNIX_EPOCH},
};
use zip::{ZipWriter, write::SimpleFileOptions};
use zymirror::sync::{BatchSizes, import_bundle};

#[tokio::test]
async fn import_accepts_archives_and_bare_documents() {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let stem = format!("zymirror-import-{}-{}", std::process::id(), nanos);
    let temp_dir = std::env::temp_dir();

    let db_path = temp_dir.join(format!("{stem}.sqlite"));
    let database_url = format!("sqlite:{}", db_path.display());
    let db = zymirror::db::spawn(&database_url, BatchSizes::uniform(2))
        .await
        .expect("failed to spawn db actor");

    // 1) zip archive
    let first = json!({
        "version": "v1",
        "categories": { "a": { "name": "A" }, "b": { "name": "B" } },
        "wrappers": { "w1": { "name": "W1", "cat": "b" } }
    });
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("zywrap-data.json", SimpleFileOptions::default())
        .expect("start_file failed");
    zip.write_all(first.to_string().as_bytes())
        .expect("write failed");
    let archive = zip.finish().expect("finish failed").into_inner();
    let zip_path = temp_dir.join(format!("{stem}.zip"));
    tokio::fs::write(&zip_path, archive)
        .await
        .expect("failed to write archive");

    let report = import_bundle(&db, &zip_path).await.expect("zip import failed");
    assert_eq!(report.version.as_deref(), Some("v1"));
    assert_eq!(db.list_categories().await.unwrap().len(), 2);

    // 2) bare document replaces the snapshot
    let second = json!({
        "version": "v2",
        "categories": { "a": { "name": "A" } },
        "wrappers": {}
    });
    let json_path = temp_dir.join(format!("{stem}.json"));
    tokio::fs::write(&json_path, second.to_string())
        .await
        .expect("failed to write document");

    import_bundle(&db, &json_path).await.expect("json import failed");
    let codes: Vec<String> = db
        .list_categories()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.code)
        .collect();
    assert_eq!(codes, vec!["a"]);
    assert_eq!(db.current_version().await.unwrap().as_deref(), Some("v2"));

    // 3) a document without a version is refused
    let unversioned = temp_dir.join(format!("{stem}-unversioned.json"));
    tokio::fs::write(&unversioned, r#"{ "categories": {} }"#)
        .await
        .expect("failed to write document");
    assert!(import_bundle(&db, &unversioned).await.is_err());
    assert_eq!(db.current_version().await.unwrap().as_deref(), Some("v2"));

    for path in [db_path, zip_path, json_path, unversioned] {
        let _ = tokio::fs::remove_file(&path).await;
    }
}
