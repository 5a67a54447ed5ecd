//! WebDAV adapter over the in-process server.

use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::Method;
use std::sync::Arc;

use swiftdav_core::webdav::Depth;
use swiftdav_core::{
    BackendError, ErrorKind, FilesystemAdapter, MemoryDavClient, ObjectMetadata, WebDavAdapter,
    WriteConfig,
};

use super::helpers::{init_tracing, webdav_adapter, FaultyDavClient};
use super::scenarios;

macro_rules! scenario_tests {
    ($prefix:expr; $($name:ident),* $(,)?) => {
        $(
            #[tokio::test]
            async fn $name() {
                let (_client, adapter) = webdav_adapter($prefix);
                scenarios::$name(&adapter).await;
            }
        )*
    };
}

scenario_tests!(
    "";
    write_then_read,
    overwrite_replaces_content,
    write_stream_then_read,
    content_type_from_config,
    create_directory_then_exists,
    directory_exists_from_children,
    write_delete_exists,
    delete_missing_fails,
    delete_directory_removes_everything,
    copy_keeps_source,
    move_removes_source,
    copy_missing_source_fails,
    set_visibility_always_fails,
    list_direct_children,
    attribute_of_directory_fails,
    unicode_and_spaces_in_paths,
    paths_cannot_escape_root,
    root_is_not_a_file,
);

mod prefixed {
    use super::*;

    scenario_tests!(
        "remote.php/files/alice";
        write_then_read,
        create_directory_then_exists,
        delete_directory_removes_everything,
        move_removes_source,
        list_direct_children,
        paths_cannot_escape_root,
        root_is_not_a_file,
    );
}

#[tokio::test]
async fn test_delete_directory_partial_failure() {
    init_tracing();
    let server = MemoryDavClient::new();
    let faulty = FaultyDavClient::new(server.clone(), 2);
    let adapter = WebDavAdapter::new(Arc::new(faulty.clone()), "");
    let config = WriteConfig::default();
    for name in ["dir/1.txt", "dir/2.txt", "dir/3.txt"] {
        adapter.write(name, Bytes::from(name), &config).await.unwrap();
    }

    let err = adapter.delete_directory("dir").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeleteFailed);
    assert_eq!(faulty.deletes(), 2);

    let remaining: Vec<ObjectMetadata> = adapter
        .list_contents("dir", false)
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].path(), "dir/3.txt");
    assert!(adapter.directory_exists("dir").await.unwrap());
}

#[tokio::test]
async fn test_write_encodes_segments_and_makes_parents() {
    let (client, adapter) = webdav_adapter("");
    adapter
        .write("a b/c#d/e?.txt", Bytes::from("x"), &WriteConfig::default())
        .await
        .unwrap();

    let sent = client.requests();
    let put = sent
        .iter()
        .find(|(method, _)| *method == Method::PUT)
        .map(|(_, path)| path.as_str());
    assert_eq!(put, Some("a%20b/c%23d/e%3F.txt"));

    let mkcols: Vec<&str> = sent
        .iter()
        .filter(|(method, _)| method.as_str() == "MKCOL")
        .map(|(_, path)| path.as_str())
        .collect();
    assert_eq!(mkcols, vec!["a%20b", "a%20b/c%23d"]);

    assert!(adapter.directory_exists("a b/c#d").await.unwrap());
    assert_eq!(
        adapter.read("a b/c#d/e?.txt").await.unwrap(),
        Bytes::from("x")
    );
}

#[tokio::test]
async fn test_existing_parents_are_not_recreated() {
    let (client, adapter) = webdav_adapter("");
    let config = WriteConfig::default();
    adapter.create_directory("shared", &config).await.unwrap();
    adapter.write("shared/one.txt", Bytes::from("1"), &config).await.unwrap();
    adapter.write("shared/two.txt", Bytes::from("2"), &config).await.unwrap();

    let mkcols = client
        .requests()
        .iter()
        .filter(|(method, _)| method.as_str() == "MKCOL")
        .count();
    assert_eq!(mkcols, 1);
}

#[tokio::test]
async fn test_collections_are_not_files() {
    let (_client, adapter) = webdav_adapter("");
    adapter
        .create_directory("coll", &WriteConfig::default())
        .await
        .unwrap();
    assert!(!adapter.file_exists("coll").await.unwrap());

    let err = adapter.read("coll").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReadFailed);
}

#[tokio::test]
async fn test_listing_is_one_level() {
    let (_client, adapter) = webdav_adapter("");
    let config = WriteConfig::default();
    for name in ["logs/a.log", "logs/2024/c.log", "logs/2024/d.log"] {
        adapter.write(name, Bytes::from("l"), &config).await.unwrap();
    }

    let entries: Vec<ObjectMetadata> = adapter
        .list_contents("logs", true)
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    let summary: Vec<(&str, bool)> = entries.iter().map(|e| (e.path(), e.is_dir())).collect();
    assert_eq!(summary, vec![("logs/2024", true), ("logs/a.log", false)]);
}

#[tokio::test]
async fn test_post_only_headers_reach_mkcol() {
    let (_client, adapter) = webdav_adapter("");
    let config = WriteConfig::new()
        .with("contentType", "text/plain")
        .with("headers", serde_json::json!({ "X-Trace": "abc" }));
    adapter.create_directory("traced", &config).await.unwrap();
    assert!(adapter.directory_exists("traced").await.unwrap());
}

#[tokio::test]
async fn test_invalid_header_is_write_failure() {
    let (client, adapter) = webdav_adapter("");
    let config = WriteConfig::new().with("headers", serde_json::json!({ "bad header": "v" }));
    let err = adapter
        .write("h.txt", Bytes::from("h"), &config)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WriteFailed);
    assert!(client.is_empty());
}

#[tokio::test]
async fn test_listing_failure() {
    init_tracing();
    let server = MemoryDavClient::new();
    let faulty = FaultyDavClient::new(server, 0).failing_prop_find(Depth::One);
    let adapter = WebDavAdapter::new(Arc::new(faulty), "");

    let err = adapter
        .list_contents("reports", false)
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::ListingFailed);
    assert!(err.to_string().contains("reports"));
    assert!(matches!(
        err.backend_error(),
        Some(BackendError::Http { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_existence_check_failure() {
    let (server, writer) = webdav_adapter("");
    writer
        .write("docs/a.txt", Bytes::from("a"), &WriteConfig::default())
        .await
        .unwrap();

    let faulty = FaultyDavClient::new(server, 0).failing_prop_find(Depth::Zero);
    let adapter = WebDavAdapter::new(Arc::new(faulty), "");
    let err = adapter.file_exists("docs/a.txt").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExistenceCheckFailed);
    assert!(err.to_string().contains("docs/a.txt"));
    assert!(matches!(
        err.backend_error(),
        Some(BackendError::Http { status: 503, .. })
    ));

    let err = adapter.directory_exists("docs").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExistenceCheckFailed);
    assert!(err.to_string().contains("docs"));
}

#[tokio::test]
async fn test_traversal_sends_nothing() {
    let (client, adapter) = webdav_adapter("remote.php/files/alice");
    let err = adapter
        .write("../bob/diary.txt", Bytes::from("x"), &WriteConfig::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WriteFailed);
    assert!(client.is_empty());
}
