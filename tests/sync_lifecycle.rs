//! The directory facade across refreshes, outages and shutdown.

mod common;

use common::{BASE_DN, GROUPS_QUERY, USERS_QUERY, group_dn, settings, user_dn};
use ldap_sql_bridge::config::DirectoryConfig;
use ldap_sql_bridge::handlers::{CollectingResponder, MatchAll};
use ldap_sql_bridge::store::{InMemoryStore, StoreError};
use ldap_sql_bridge::{Directory, ResultCode, Scope, SearchRequest, SyncState};
use std::time::Duration;
use tokio::time;

#[tokio::test(start_paused = true)]
async fn test_directory_serves_last_snapshot_while_disconnected() {
    common::init_logging();
    let store = common::seeded_store().await;
    let mut directory = Directory::new(settings());

    assert_eq!(directory.state(), SyncState::Disconnected);
    assert_eq!(
        directory.bind(&user_dn("alice"), "secret"),
        Err(ResultCode::NoSuchObject)
    );

    directory.start(store.clone());
    let mut state = directory.subscribe().expect("started");
    state.wait_for(|s| *s == SyncState::Ready).await.unwrap();

    let served = directory.snapshot();
    assert_eq!(served.generation(), 1);
    assert_eq!(directory.bind(&user_dn("alice"), "secret"), Ok(()));

    // backend goes away and alice is deleted meanwhile
    store.drop_connection().await;
    store.refuse_connections(usize::MAX).await;
    store.set_rows(USERS_QUERY, vec![]).await;
    time::sleep(Duration::from_millis(1500)).await;

    assert_ne!(directory.state(), SyncState::Ready);
    assert_eq!(directory.snapshot().generation(), 1);
    assert_eq!(directory.bind(&user_dn("alice"), "secret"), Ok(()));

    let mut responder = CollectingResponder::new();
    let sent = directory
        .search(&SearchRequest::new(BASE_DN, Scope::Sub), &MatchAll, &mut responder)
        .unwrap();
    assert_eq!(sent, 7);

    // backend returns
    store.refuse_connections(0).await;
    time::sleep(Duration::from_millis(500)).await;
    state.wait_for(|s| *s == SyncState::Ready).await.unwrap();

    assert_eq!(directory.snapshot().generation(), 2);
    assert_eq!(
        directory.bind(&user_dn("alice"), "secret"),
        Err(ResultCode::NoSuchObject)
    );
    // a request that loaded the old snapshot keeps seeing it
    assert!(served.user(&user_dn("alice")).is_some());

    directory.shutdown().await;
    assert_eq!(directory.state(), SyncState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_backend_serves_empty_tree() {
    common::init_logging();
    let store = common::seeded_store().await;
    store.refuse_connections(usize::MAX).await;

    let mut directory = Directory::new(settings());
    directory.start(store.clone());
    time::sleep(Duration::from_secs(5)).await;

    assert_ne!(directory.state(), SyncState::Ready);
    assert_eq!(directory.snapshot().generation(), 0);
    assert!(store.stats().await.connect_attempts > 10);

    let mut responder = CollectingResponder::new();
    directory
        .search(&SearchRequest::new(BASE_DN, Scope::Sub), &MatchAll, &mut responder)
        .unwrap();
    assert_eq!(
        responder.dns(),
        [
            "dc=example,dc=com",
            "ou=groups,dc=example,dc=com",
            "ou=users,dc=example,dc=com"
        ]
    );

    directory.shutdown().await;
    assert_eq!(directory.state(), SyncState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_query_error_keeps_serving_and_recovers_on_next_tick() {
    common::init_logging();
    let store = common::seeded_store().await;
    let mut directory = Directory::new(settings());
    directory.start(store.clone());

    let mut state = directory.subscribe().expect("started");
    state.wait_for(|s| *s == SyncState::Ready).await.unwrap();

    store
        .fail_next_query(StoreError::query("Table 'users' is locked"))
        .await;
    time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(directory.snapshot().generation(), 1);
    assert_eq!(directory.state(), SyncState::Ready);
    assert_eq!(store.stats().await.successful_connects, 1);

    time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(directory.snapshot().generation(), 2);

    let snapshot = directory.snapshot();
    let admins = snapshot.group(&group_dn("admins")).unwrap();
    assert_eq!(admins.values("member").len(), 2);

    directory.shutdown().await;
}

#[tokio::test]
async fn test_search_requires_bound_user_when_configured() {
    common::init_logging();
    let mut config = common::fixtures::config_json();
    config["access"] = serde_json::json!({ "require_bind_for_search": true });
    let settings = common::settings_from(config);

    let store = InMemoryStore::new();
    store.set_rows(USERS_QUERY, common::fixtures::user_rows()).await;
    store.set_rows(GROUPS_QUERY, common::fixtures::group_rows()).await;

    let mut directory = Directory::new(settings);
    directory.start(store);
    let mut state = directory.subscribe().expect("started");
    state.wait_for(|s| *s == SyncState::Ready).await.unwrap();

    let request = SearchRequest::new(BASE_DN, Scope::One);
    let mut responder = CollectingResponder::new();
    assert_eq!(
        directory.search(&request, &MatchAll, &mut responder),
        Err(ResultCode::InsufficientAccess)
    );
    assert_eq!(responder.failure, Some(ResultCode::InsufficientAccess));

    let request = request.with_requester(user_dn("carol"));
    let mut responder = CollectingResponder::new();
    assert_eq!(directory.search(&request, &MatchAll, &mut responder), Ok(2));

    directory.shutdown().await;
}

#[tokio::test]
async fn test_load_config_with_query_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::fixtures::config_json();
    config["users"]
        .as_object_mut()
        .unwrap()
        .remove("query");
    config["users"]["query_file"] = serde_json::json!("queries/users.sql");

    tokio::fs::create_dir(dir.path().join("queries")).await.unwrap();
    tokio::fs::write(dir.path().join("queries/users.sql"), format!("{}\n", USERS_QUERY))
        .await
        .unwrap();
    let path = dir.path().join("directory.json");
    tokio::fs::write(&path, config.to_string()).await.unwrap();

    let settings = DirectoryConfig::load(&path).await.unwrap();
    assert_eq!(settings.users.query, USERS_QUERY);
    assert_eq!(settings.groups.query, GROUPS_QUERY);

    let store = common::seeded_store().await;
    let mut directory = Directory::new(settings);
    directory.start(store);
    let mut state = directory.subscribe().expect("started");
    state.wait_for(|s| *s == SyncState::Ready).await.unwrap();
    assert_eq!(directory.bind(&user_dn("carol"), "password"), Ok(()));
    directory.shutdown().await;
}
