//! Callback orchestration scenarios: staged-field merge, pending-entry
//! consumption, abort paths, and the documented duplicate-account behavior
//! on retried callbacks.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use creatorlink_common::{Platform, ServiceKind};
use creatorlink_linking::testing::MockAdapter;
use creatorlink_linking::{
    complete_link, AccountStore, CallbackParams, LinkError, PendingRegistrations,
};
use creatorlink_store::testing::{MemoryDocumentStore, MemoryKv};
use serde_json::json;
use social_client::ProviderError;

struct Harness {
    docs: Arc<MemoryDocumentStore>,
    kv: Arc<MemoryKv>,
    accounts: AccountStore<Arc<MemoryDocumentStore>>,
    pending: PendingRegistrations<Arc<MemoryKv>>,
}

fn harness() -> Harness {
    let docs = Arc::new(MemoryDocumentStore::new());
    let kv = Arc::new(MemoryKv::new());
    Harness {
        accounts: AccountStore::new(docs.clone()),
        pending: PendingRegistrations::new(kv.clone()),
        docs,
        kv,
    }
}

fn params(code: Option<&str>, state: Option<&str>) -> CallbackParams {
    CallbackParams {
        code: code.map(str::to_string),
        state: state.map(str::to_string),
    }
}

#[tokio::test]
async fn callback_merges_staged_fields_and_consumes_the_pending_entry() {
    let h = harness();
    h.pending
        .stage("u1", json!({ "category": "fashion", "prices": { "follow": 5.0 } }))
        .await
        .unwrap();

    let adapter = MockAdapter::new(Platform::Instagram);
    let account = complete_link(&adapter, &h.accounts, &h.pending, params(Some("abc"), Some("u1")))
        .await
        .unwrap();

    assert_eq!(account.platform, Platform::Instagram);
    assert_eq!(account.user_id, "u1");
    assert_eq!(account.category.as_deref(), Some("fashion"));
    assert_eq!(account.prices[&ServiceKind::Follow], 5.0);
    assert!(account.is_active);
    assert!(!h.kv.contains("pending:u1"), "pending entry must be consumed");

    let stored = h.accounts.get(account.id).await.unwrap().unwrap();
    assert_eq!(stored.token, "mock-access");
    assert!(stored.token_expiry.is_some());
}

#[tokio::test]
async fn callback_without_staged_fields_links_from_token_material_alone() {
    let h = harness();
    let adapter = MockAdapter::new(Platform::LinkedIn);

    let account = complete_link(&adapter, &h.accounts, &h.pending, params(Some("abc"), Some("u2")))
        .await
        .unwrap();

    assert_eq!(account.user_id, "u2");
    assert!(account.category.is_none());
    assert!(account.prices.is_empty());
    assert_eq!(h.docs.document_count("accounts"), 1);
}

#[tokio::test]
async fn missing_code_aborts_before_any_side_effect() {
    let h = harness();
    h.pending.stage("u1", json!({ "category": "food" })).await.unwrap();
    let adapter = MockAdapter::new(Platform::TikTok);

    let err = complete_link(&adapter, &h.accounts, &h.pending, params(None, Some("u1")))
        .await
        .unwrap_err();

    assert!(matches!(err, LinkError::MissingParam("code")));
    assert_eq!(adapter.exchange_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.docs.document_count("accounts"), 0);
    assert!(h.kv.contains("pending:u1"), "pending entry must survive an abort");
}

#[tokio::test]
async fn missing_state_aborts_with_no_account() {
    let h = harness();
    let adapter = MockAdapter::new(Platform::Twitter);

    let err = complete_link(&adapter, &h.accounts, &h.pending, params(Some("abc"), None))
        .await
        .unwrap_err();

    assert!(matches!(err, LinkError::MissingParam("state")));
    assert_eq!(h.docs.document_count("accounts"), 0);
}

#[tokio::test]
async fn empty_parameters_count_as_missing() {
    let h = harness();
    let adapter = MockAdapter::new(Platform::Facebook);

    let err = complete_link(&adapter, &h.accounts, &h.pending, params(Some(""), Some("u1")))
        .await
        .unwrap_err();
    assert!(matches!(err, LinkError::MissingParam("code")));
}

#[tokio::test]
async fn rejected_exchange_surfaces_and_keeps_the_pending_entry() {
    let h = harness();
    h.pending.stage("u1", json!({ "category": "gaming" })).await.unwrap();
    let adapter = MockAdapter::new(Platform::YouTube).failing_exchange();

    let err = complete_link(&adapter, &h.accounts, &h.pending, params(Some("bad"), Some("u1")))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LinkError::Provider(ProviderError::AuthExchange { .. })
    ));
    assert_eq!(h.docs.document_count("accounts"), 0);
    assert!(h.kv.contains("pending:u1"));
}

#[tokio::test]
async fn retried_callback_mints_a_second_account() {
    // No idempotency key on the exchange: a replayed callback creates a
    // duplicate account, the second one without the staged fields the first
    // consumed.
    let h = harness();
    h.pending.stage("u1", json!({ "category": "fashion" })).await.unwrap();
    let adapter = MockAdapter::new(Platform::Instagram);

    let first = complete_link(&adapter, &h.accounts, &h.pending, params(Some("abc"), Some("u1")))
        .await
        .unwrap();
    let second = complete_link(&adapter, &h.accounts, &h.pending, params(Some("abc"), Some("u1")))
        .await
        .unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(first.category.as_deref(), Some("fashion"));
    assert!(second.category.is_none());
    assert_eq!(h.docs.document_count("accounts"), 2);
}

#[tokio::test]
async fn unreadable_staged_fields_are_dropped_not_fatal() {
    let h = harness();
    h.pending.stage("u1", json!("not an object")).await.unwrap();
    let adapter = MockAdapter::new(Platform::Instagram);

    let account = complete_link(&adapter, &h.accounts, &h.pending, params(Some("abc"), Some("u1")))
        .await
        .unwrap();

    assert!(account.category.is_none());
    assert_eq!(h.docs.document_count("accounts"), 1);
}
