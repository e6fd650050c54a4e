//! End-to-end username resolution through the batching engine.

mod common;

use std::sync::Arc;

use coalesce_client::UserResolver;
use coalesce_domain::{LookupError, ValidationError};
use futures::future::join_all;

use common::{test_config, FakeUserApi};

fn resolver(api: &Arc<FakeUserApi>) -> UserResolver<Arc<FakeUserApi>> {
    UserResolver::new(Arc::clone(api), test_config()).unwrap()
}

/// Test: Spellings of one username collapse into a single lookup
#[tokio::test(start_paused = true)]
async fn test_case_and_whitespace_variants_share_one_lookup() {
    // Arrange
    let api = Arc::new(FakeUserApi::with_users(&[("alice", "u-1")]));
    let resolver = resolver(&api);

    // Act
    let results = join_all(
        ["alice", "Alice", " ALICE ", "alice\t"]
            .into_iter()
            .map(|name| resolver.user_id(name)),
    )
    .await;

    // Assert
    for result in results {
        assert_eq!(result.unwrap(), Some("u-1".to_string()));
    }
    assert_eq!(api.batches(), vec![vec!["alice".to_string()]]);
}

/// Test: Unknown usernames are remembered as negatives
#[tokio::test(start_paused = true)]
async fn test_unknown_user_is_negative_cached() {
    let api = Arc::new(FakeUserApi::default());
    let resolver = resolver(&api);

    assert_eq!(resolver.user_id("nobody").await.unwrap(), None);
    assert_eq!(resolver.user_id("Nobody").await.unwrap(), None);

    assert_eq!(api.bulk_calls(), 1);
}

/// Test: Existence confirmation ignores a cached negative and caches the
/// fresh positive
#[tokio::test(start_paused = true)]
async fn test_confirm_exists_bypasses_cached_negative() {
    let api = Arc::new(FakeUserApi::default());
    let resolver = resolver(&api);
    assert_eq!(resolver.user_id("newcomer").await.unwrap(), None);

    api.add_user("newcomer", "u-7");
    let confirmed = resolver.confirm_exists("newcomer").await.unwrap();

    assert!(confirmed);
    assert_eq!(
        resolver.user_id("newcomer").await.unwrap(),
        Some("u-7".to_string())
    );
    assert_eq!(api.bulk_calls(), 2);
}

/// Test: A fresh negative never overwrites a cached positive
#[tokio::test(start_paused = true)]
async fn test_cached_positive_is_not_downgraded() {
    let api = Arc::new(FakeUserApi::with_users(&[("bob", "u-2")]));
    let resolver = resolver(&api);
    resolver.user_id("bob").await.unwrap();

    api.remove_user("bob");
    let confirmed = resolver.confirm_exists("bob").await.unwrap();

    assert!(!confirmed);
    assert_eq!(resolver.user_id("bob").await.unwrap(), Some("u-2".to_string()));

    // Explicit invalidation is the way to drop it
    resolver.forget("BOB").await;
    assert_eq!(resolver.user_id("bob").await.unwrap(), None);
    assert_eq!(api.bulk_calls(), 3);
}

/// Test: Mixed batches resolve each name independently, in input order
#[tokio::test(start_paused = true)]
async fn test_user_ids_preserve_input_order() {
    let api = Arc::new(FakeUserApi::with_users(&[("alice", "u-1"), ("carol", "u-3")]));
    let resolver = resolver(&api);

    let results = resolver.user_ids(["carol", "nobody", "alice", "bad name"]).await;

    assert_eq!(results[0], Ok(Some("u-3".to_string())));
    assert_eq!(results[1], Ok(None));
    assert_eq!(results[2], Ok(Some("u-1".to_string())));
    assert!(matches!(
        results[3],
        Err(LookupError::Validation(ValidationError::Malformed { field: "username", .. }))
    ));
    assert_eq!(
        api.batches(),
        vec![vec![
            "carol".to_string(),
            "nobody".to_string(),
            "alice".to_string()
        ]]
    );
}

/// Test: Empty usernames are rejected without a network call
#[tokio::test(start_paused = true)]
async fn test_blank_username_is_rejected() {
    let api = Arc::new(FakeUserApi::default());
    let resolver = resolver(&api);

    let result = resolver.user_id("   ").await;

    assert_eq!(
        result,
        Err(LookupError::Validation(ValidationError::Empty { field: "username" }))
    );
    assert_eq!(api.bulk_calls(), 0);
}

/// Test: The single-item endpoint skips batching but still feeds the cache
#[tokio::test(start_paused = true)]
async fn test_user_id_now_uses_single_endpoint() {
    let api = Arc::new(FakeUserApi::with_users(&[("dave", "u-4")]).with_single_lookup());
    let resolver = resolver(&api);

    let id = resolver.user_id_now("Dave").await.unwrap();

    assert_eq!(id, Some("u-4".to_string()));
    assert_eq!(api.single_calls(), 1);
    assert_eq!(api.bulk_calls(), 0);

    assert_eq!(resolver.user_id("dave").await.unwrap(), Some("u-4".to_string()));
    assert_eq!(api.bulk_calls(), 0);
}

/// Test: Without a single-item endpoint the fallback reports Unsupported
#[tokio::test(start_paused = true)]
async fn test_user_id_now_without_single_endpoint() {
    let api = Arc::new(FakeUserApi::default());
    let resolver = resolver(&api);

    let result = resolver.user_id_now("erin").await;

    assert_eq!(
        result,
        Err(LookupError::Unsupported {
            operation: "lookup_username"
        })
    );
}
