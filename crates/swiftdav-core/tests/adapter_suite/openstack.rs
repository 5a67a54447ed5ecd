//! OpenStack adapter over the in-memory object store.

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;

use swiftdav_core::{
    BackendError, ErrorKind, FilesystemAdapter, MemoryObjectStore, ObjectMetadata,
    OpenStackAdapter, WriteConfig,
};

use super::helpers::{init_tracing, openstack_adapter, FaultyObjectStore};
use super::scenarios;

macro_rules! scenario_tests {
    ($prefix:expr; $($name:ident),* $(,)?) => {
        $(
            #[tokio::test]
            async fn $name() {
                let (_store, adapter) = openstack_adapter($prefix);
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
        "/tenants/acme/";
        write_then_read,
        create_directory_then_exists,
        delete_directory_removes_everything,
        move_removes_source,
        list_direct_children,
        paths_cannot_escape_root,
        root_is_not_a_file,
    );
}

async fn collect(adapter: &dyn FilesystemAdapter, path: &str) -> Vec<ObjectMetadata> {
    adapter
        .list_contents(path, true)
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_delete_directory_partial_failure() {
    init_tracing();
    let store = FaultyObjectStore::new(MemoryObjectStore::new(), 2);
    let adapter = OpenStackAdapter::new(Arc::new(store.clone()), "test-container", "");
    let config = WriteConfig::default();
    for name in ["dir/1.txt", "dir/2.txt", "dir/3.txt"] {
        adapter.write(name, Bytes::from(name), &config).await.unwrap();
    }

    let err = adapter.delete_directory("dir").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeleteFailed);
    assert_eq!(store.deletes(), 2);

    let remaining = collect(&adapter, "dir").await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].path(), "dir/3.txt");
}

#[tokio::test]
async fn test_prefixes_share_a_container() {
    init_tracing();
    let store = MemoryObjectStore::new();
    let alpha = OpenStackAdapter::new(Arc::new(store.clone()), "shared", "alpha");
    let beta = OpenStackAdapter::new(Arc::new(store.clone()), "shared", "beta");
    let root = OpenStackAdapter::new(Arc::new(store), "shared", "");
    let config = WriteConfig::default();

    alpha.write("same.txt", Bytes::from("a"), &config).await.unwrap();
    beta.write("same.txt", Bytes::from("b"), &config).await.unwrap();

    assert_eq!(alpha.read("same.txt").await.unwrap(), Bytes::from("a"));
    assert_eq!(beta.read("same.txt").await.unwrap(), Bytes::from("b"));
    assert!(root.file_exists("alpha/same.txt").await.unwrap());

    let listed = collect(&alpha, "").await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].path(), "same.txt");

    alpha.delete_directory("").await.unwrap();
    assert!(!alpha.file_exists("same.txt").await.unwrap());
    assert!(beta.file_exists("same.txt").await.unwrap());
}

#[tokio::test]
async fn test_listing_is_flat_and_paged() {
    let (store, _) = openstack_adapter("");
    let adapter =
        OpenStackAdapter::new(Arc::new(store), "test-container", "").with_page_size(2);
    let config = WriteConfig::default();
    adapter.create_directory("logs", &config).await.unwrap();
    for name in ["logs/a.log", "logs/b.log", "logs/2024/c.log", "logs/2024/d.log"] {
        adapter.write(name, Bytes::from("l"), &config).await.unwrap();
    }

    let paths: Vec<String> = collect(&adapter, "logs")
        .await
        .iter()
        .map(|e| e.path().to_string())
        .collect();
    assert_eq!(
        paths,
        vec![
            "logs/2024",
            "logs/2024/c.log",
            "logs/2024/d.log",
            "logs/a.log",
            "logs/b.log"
        ]
    );

    let everything = collect(&adapter, "").await;
    assert_eq!(everything.len(), 6);
    let dirs: Vec<&str> = everything
        .iter()
        .filter(|e| e.is_dir())
        .map(|e| e.path())
        .collect();
    assert_eq!(dirs, vec!["logs", "logs/2024"]);
}

#[tokio::test]
async fn test_listing_implies_directories() {
    let (_store, adapter) = openstack_adapter("/tenants/acme/");
    let config = WriteConfig::default();
    adapter.write("a/b/c.txt", Bytes::from("c"), &config).await.unwrap();
    adapter.write("a/d.txt", Bytes::from("d"), &config).await.unwrap();
    adapter.create_directory("a/e", &config).await.unwrap();

    let summary: Vec<(String, bool)> = collect(&adapter, "")
        .await
        .iter()
        .map(|e| (e.path().to_string(), e.is_dir()))
        .collect();
    let expected: Vec<(String, bool)> = [
        ("a", true),
        ("a/b", true),
        ("a/b/c.txt", false),
        ("a/d.txt", false),
        ("a/e", true),
    ]
    .iter()
    .map(|(path, dir)| (path.to_string(), *dir))
    .collect();
    assert_eq!(summary, expected);
}

#[tokio::test]
async fn test_listing_failure_mid_stream() {
    init_tracing();
    let (store, writer) = openstack_adapter("");
    let config = WriteConfig::default();
    for name in ["logs/a.log", "logs/b.log", "logs/c.log"] {
        writer.write(name, Bytes::from("l"), &config).await.unwrap();
    }

    // Pages of one object: the third page request fails.
    let faulty = FaultyObjectStore::new(store, 0).failing_listing_page(3);
    let adapter =
        OpenStackAdapter::new(Arc::new(faulty), "test-container", "").with_page_size(1);
    let items: Vec<_> = adapter
        .list_contents("logs", true)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].as_ref().unwrap().path(), "logs/a.log");
    assert_eq!(items[1].as_ref().unwrap().path(), "logs/b.log");
    let err = items[2].as_ref().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ListingFailed);
    assert!(err.to_string().contains("logs"));
    assert!(matches!(
        err.backend_error(),
        Some(BackendError::Http { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_listing_failure_on_first_page() {
    let (store, _) = openstack_adapter("");
    let faulty = FaultyObjectStore::new(store, 0).failing_listing_page(1);
    let adapter = OpenStackAdapter::new(Arc::new(faulty), "test-container", "");

    let err = adapter
        .list_contents("reports", false)
        .await
        .unwrap()
        .try_collect::<Vec<ObjectMetadata>>()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ListingFailed);
    assert!(err.to_string().contains("reports"));
}

#[tokio::test]
async fn test_existence_check_failure() {
    let (store, writer) = openstack_adapter("");
    writer
        .write("a.txt", Bytes::from("a"), &WriteConfig::default())
        .await
        .unwrap();

    let faulty = FaultyObjectStore::new(store.clone(), 0).failing_lookups();
    let adapter = OpenStackAdapter::new(Arc::new(faulty), "test-container", "");
    let err = adapter.file_exists("a.txt").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExistenceCheckFailed);
    assert!(err.to_string().contains("a.txt"));
    assert!(matches!(
        err.backend_error(),
        Some(BackendError::Http { status: 503, .. })
    ));

    // No children, so the marker lookup decides and fails.
    let err = adapter.directory_exists("empty").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExistenceCheckFailed);
    assert!(err.to_string().contains("empty"));

    let listing = FaultyObjectStore::new(store, 0).failing_listing_page(1);
    let adapter = OpenStackAdapter::new(Arc::new(listing), "test-container", "");
    let err = adapter.directory_exists("a").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExistenceCheckFailed);
    assert!(err.backend_error().is_some());
}

#[tokio::test]
async fn test_directory_marker_is_an_object() {
    let (_store, adapter) = openstack_adapter("");
    adapter
        .create_directory("markers", &WriteConfig::default())
        .await
        .unwrap();
    assert!(adapter.file_exists("markers").await.unwrap());
    assert!(adapter.metadata("markers").await.unwrap().is_dir());
}

#[tokio::test]
async fn test_create_directory_ignores_put_only_options() {
    let (_store, adapter) = openstack_adapter("");
    let config = WriteConfig::new()
        .with("contentType", "text/plain")
        .with("detectContentType", true);
    adapter.create_directory("typed", &config).await.unwrap();
    assert!(adapter.directory_exists("typed").await.unwrap());
    assert!(adapter.metadata("typed").await.unwrap().is_dir());
}

#[tokio::test]
async fn test_detect_content_type() {
    let (_store, adapter) = openstack_adapter("");
    let config = WriteConfig::new().with("detectContentType", true);
    adapter
        .write("page.html", Bytes::from("<p>"), &config)
        .await
        .unwrap();
    assert_eq!(adapter.mime_type("page.html").await.unwrap(), "text/html");
}
