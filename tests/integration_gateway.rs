//! Conversation gateway behavior over SQLite

mod common;

use std::sync::Arc;

use nymval::auth::StaticIdentity;
use nymval::chat::{now_millis, ChatMessage, Role, DEFAULT_SESSION_TITLE};
use nymval::error::NymvalError;
use nymval::storage::{ConversationGateway, SqliteStorage};

fn error_of(err: &anyhow::Error) -> &NymvalError {
    err.downcast_ref::<NymvalError>()
        .expect("error should be a NymvalError")
}

#[tokio::test]
async fn test_sessions_survive_reopen() {
    let (storage, dir) = common::create_temp_storage("alice");
    let session = storage.create_session("Keep me", "qwen-72b").await.unwrap();
    storage
        .append_message(&session.id, ChatMessage::user("persist this"))
        .await
        .unwrap();
    drop(storage);

    let reopened = SqliteStorage::new_with_path(
        dir.path().join("history.db"),
        Arc::new(StaticIdentity::new("alice")),
    )
    .unwrap();
    let loaded = reopened.get_session(&session.id).await.unwrap();
    assert_eq!(loaded.title, "Keep me");
    assert_eq!(loaded.messages.len(), 1);
    assert_eq!(loaded.models, vec!["qwen-72b".to_string()]);
}

#[tokio::test]
async fn test_users_do_not_see_each_other() {
    let (alice, dir) = common::create_temp_storage("alice");
    let bob = SqliteStorage::new_with_path(
        dir.path().join("history.db"),
        Arc::new(StaticIdentity::new("bob")),
    )
    .unwrap();

    let session = alice.create_session("", "llama3-70b").await.unwrap();
    assert_eq!(session.title, DEFAULT_SESSION_TITLE);

    assert!(bob.list_sessions_for_user().await.unwrap().is_empty());
    let err = bob.get_session(&session.id).await.unwrap_err();
    assert!(matches!(error_of(&err), NymvalError::NotFound(_)));

    let err = bob
        .append_message(&session.id, ChatMessage::user("sneaky"))
        .await
        .unwrap_err();
    assert!(matches!(error_of(&err), NymvalError::NotFound(_)));

    assert!(!bob.delete_session(&session.id).await.unwrap());
    assert_eq!(alice.list_sessions_for_user().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_anonymous_access_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let storage = SqliteStorage::new_with_path(
        dir.path().join("history.db"),
        Arc::new(StaticIdentity::anonymous()),
    )
    .unwrap();

    let err = storage.list_sessions_for_user().await.unwrap_err();
    assert!(matches!(error_of(&err), NymvalError::Authentication(_)));
}

#[tokio::test]
async fn test_listing_orders_by_latest_activity() {
    let (storage, _dir) = common::create_temp_storage("alice");
    let older = storage.create_session("older", "llama3-70b").await.unwrap();
    let newer = storage.create_session("newer", "llama3-70b").await.unwrap();

    storage
        .touch_session(&older.id, newer.last_message_date + 60_000)
        .await
        .unwrap();

    let listed = storage.list_sessions_for_user().await.unwrap();
    assert_eq!(listed[0].id, older.id);
    assert_eq!(listed[1].id, newer.id);
}

#[tokio::test]
async fn test_delete_cascades_messages() {
    let (storage, _dir) = common::create_temp_storage("alice");
    let session = storage.create_session("gone", "llama3-70b").await.unwrap();
    storage
        .append_message(&session.id, ChatMessage::user("bye"))
        .await
        .unwrap();

    assert!(storage.delete_session(&session.id).await.unwrap());
    let err = storage.get_session(&session.id).await.unwrap_err();
    assert!(matches!(error_of(&err), NymvalError::NotFound(_)));
    assert!(!storage.delete_session(&session.id).await.unwrap());
}

#[tokio::test]
async fn test_message_timestamps_never_go_backwards() {
    let (storage, _dir) = common::create_temp_storage("alice");
    let session = storage.create_session("", "llama3-70b").await.unwrap();

    let future = session.last_message_date + 3_600_000;
    storage.touch_session(&session.id, future).await.unwrap();

    let stored = storage
        .append_message(&session.id, ChatMessage::user("late clock"))
        .await
        .unwrap();
    assert!(stored.created_at >= future);
}

#[tokio::test]
async fn test_appended_message_round_trips_through_listing() {
    let (storage, _dir) = common::create_temp_storage("alice");
    let session = storage.create_session("", "llama3-70b").await.unwrap();
    let start = now_millis();

    let sent = ChatMessage::user("round trip");
    let stored = storage
        .append_message(&session.id, sent.clone())
        .await
        .unwrap();
    assert_eq!(stored.id, sent.id);

    let listed = storage.list_sessions_for_user().await.unwrap();
    let loaded = listed
        .iter()
        .find(|s| s.id == session.id)
        .and_then(|s| s.messages.iter().find(|m| m.id == sent.id))
        .expect("appended message is listed");

    assert_eq!(loaded.id, sent.id);
    assert_eq!(loaded.role, Role::User);
    assert_eq!(loaded.content, "round trip");
    assert_eq!(loaded.model, None);
    assert_eq!(loaded.created_at, stored.created_at);
    assert!(loaded.created_at >= start);
}
