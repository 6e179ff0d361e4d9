use crate::utils::{log_record_init, InMemoryCache, InMemoryRepository, RecordingLogger};
use chrono::{Duration as ChronoDuration, Utc};
use flagcore::{
    AccessControl, ErrorKind, EvaluationContext, EvaluationMode, EvaluatorType,
    EvaluationManager, FeatureFlag, FlagEvaluator, FlagVariations,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod utils;

fn enabled_flag(key: &str) -> FeatureFlag {
    FeatureFlag::new(key).with_modes([EvaluationMode::Enabled])
}

fn evaluator_with(repository: &Arc<InMemoryRepository>) -> FlagEvaluator {
    FlagEvaluator::new(repository.clone()).unwrap()
}

#[tokio::test]
async fn enabled_flag_is_on() {
    let repository = Arc::new(InMemoryRepository::with_flags(vec![enabled_flag("f1")]));
    let evaluator = evaluator_with(&repository);
    let ctx = EvaluationContext::new().user_id("u1");

    let result = evaluator
        .evaluate("f1", &ctx, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.is_enabled);
    assert_eq!(result.variation, "on");
    assert_eq!(result.reason, "Feature flag 'f1' is explicitly enabled");
}

#[tokio::test]
async fn zero_percent_rollout_is_off() {
    let mut flag = FeatureFlag::new("beta").with_modes([EvaluationMode::UserRolloutPercentage]);
    flag.user_access_control = AccessControl::rollout(0);
    let repository = Arc::new(InMemoryRepository::with_flags(vec![flag]));
    let evaluator = evaluator_with(&repository);

    let result = evaluator
        .evaluate(
            "beta",
            &EvaluationContext::new().user_id("u1"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(!result.is_enabled);
    assert_eq!(result.variation, "off");
    assert_eq!(result.reason, "Access restricted to all users");
}

#[tokio::test]
async fn unknown_flag_is_auto_created_once() {
    let repository = Arc::new(InMemoryRepository::new());
    let evaluator = evaluator_with(&repository);
    let ctx = EvaluationContext::new();
    let token = CancellationToken::new();

    let first = evaluator.evaluate("ghost", &ctx, &token).await.unwrap();
    assert!(!first.is_enabled);
    assert_eq!(first.variation, "off");
    assert_eq!(first.reason, "Feature flag 'ghost' is explicitly disabled");

    let second = evaluator.evaluate("ghost", &ctx, &token).await.unwrap();
    assert_eq!(first, second);

    assert_eq!(repository.count("ghost"), 1);
    assert_eq!(repository.create_calls.load(Ordering::SeqCst), 1);
    let stored = repository.stored("ghost").unwrap();
    assert_eq!(stored.description, "Auto-created flag for ghost");
    assert_eq!(stored.audit.created.unwrap().actor, "system");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_auto_create_is_idempotent() {
    let repository = Arc::new(InMemoryRepository::new().with_delay(Duration::from_millis(10)));
    let evaluator = Arc::new(evaluator_with(&repository));

    let mut handles = Vec::new();
    for i in 0..8 {
        let evaluator = Arc::clone(&evaluator);
        handles.push(tokio::spawn(async move {
            let ctx = EvaluationContext::new().user_id(format!("u{i}").as_str());
            evaluator
                .evaluate("race", &ctx, &CancellationToken::new())
                .await
        }));
    }
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert!(!result.is_enabled);
        assert_eq!(result.variation, "off");
    }

    assert_eq!(repository.count("race"), 1);
}

#[tokio::test]
async fn concurrently_created_flag_wins_over_default() {
    let repository = Arc::new(InMemoryRepository::with_flags(vec![enabled_flag("f")]));
    repository.missed_gets.store(1, Ordering::SeqCst);
    let cache = Arc::new(InMemoryCache::new());
    let evaluator = FlagEvaluator::builder(repository.clone())
        .cache(cache.clone())
        .build()
        .unwrap();
    let ctx = EvaluationContext::new();
    let token = CancellationToken::new();

    assert!(evaluator.is_enabled("f", &ctx, &token).await.unwrap());
    assert!(evaluator.is_enabled("f", &ctx, &token).await.unwrap());

    assert_eq!(repository.create_calls.load(Ordering::SeqCst), 1);
    assert_eq!(repository.get_calls.load(Ordering::SeqCst), 2);
    assert!(cache.contains("f"));
}

#[tokio::test]
async fn unreadable_concurrent_flag_is_not_cached() {
    let repository = Arc::new(InMemoryRepository::with_flags(vec![enabled_flag("f")]));
    repository.missed_gets.store(2, Ordering::SeqCst);
    let cache = Arc::new(InMemoryCache::new());
    let evaluator = FlagEvaluator::builder(repository.clone())
        .cache(cache.clone())
        .build()
        .unwrap();
    let ctx = EvaluationContext::new();
    let token = CancellationToken::new();

    assert!(!evaluator.is_enabled("f", &ctx, &token).await.unwrap());
    assert!(!cache.contains("f"));

    assert!(evaluator.is_enabled("f", &ctx, &token).await.unwrap());
    assert!(cache.contains("f"));
}

#[tokio::test]
async fn created_flag_is_cached() {
    let repository = Arc::new(InMemoryRepository::new());
    let cache = Arc::new(InMemoryCache::new());
    let evaluator = FlagEvaluator::builder(repository.clone())
        .cache(cache.clone())
        .build()
        .unwrap();

    let result = evaluator
        .evaluate("ghost", &EvaluationContext::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.is_enabled);
    assert!(cache.contains("ghost"));
}

#[tokio::test]
async fn create_failure_is_swallowed() {
    let repository = Arc::new(InMemoryRepository::new());
    repository.fail_create.store(true, Ordering::SeqCst);
    let cache = Arc::new(InMemoryCache::new());
    let evaluator = FlagEvaluator::builder(repository.clone())
        .cache(cache.clone())
        .build()
        .unwrap();

    let result = evaluator
        .evaluate("ghost", &EvaluationContext::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.is_enabled);
    assert!(repository.stored("ghost").is_none());
    assert!(!cache.contains("ghost"));
}

#[tokio::test]
async fn repository_failure_is_reported() {
    let repository = Arc::new(InMemoryRepository::new());
    repository.fail_get.store(true, Ordering::SeqCst);
    let evaluator = evaluator_with(&repository);

    let err = evaluator
        .evaluate("f1", &EvaluationContext::new(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::RepositoryFailure);
    assert_eq!(repository.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cache_hit_skips_repository() {
    let repository = Arc::new(InMemoryRepository::new());
    let cache = Arc::new(InMemoryCache::new());
    cache.insert(enabled_flag("cached"));
    let evaluator = FlagEvaluator::builder(repository.clone())
        .cache(cache.clone())
        .build()
        .unwrap();

    let enabled = evaluator
        .is_enabled("cached", &EvaluationContext::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(enabled);
    assert_eq!(repository.get_calls.load(Ordering::SeqCst), 0);
    assert_eq!(cache.get_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn repository_hit_populates_cache() {
    let repository = Arc::new(InMemoryRepository::with_flags(vec![enabled_flag("f1")]));
    let cache = Arc::new(InMemoryCache::new());
    let evaluator = FlagEvaluator::builder(repository.clone())
        .cache(cache.clone())
        .cache_ttl(Duration::from_secs(60))
        .build()
        .unwrap();
    let ctx = EvaluationContext::new();
    let token = CancellationToken::new();

    assert!(evaluator.is_enabled("f1", &ctx, &token).await.unwrap());
    assert!(evaluator.is_enabled("f1", &ctx, &token).await.unwrap());

    assert!(cache.contains("f1"));
    assert_eq!(*cache.last_ttl.lock().unwrap(), Some(Duration::from_secs(60)));
    assert_eq!(repository.get_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cache_failure_falls_back_to_repository() {
    let repository = Arc::new(InMemoryRepository::with_flags(vec![enabled_flag("f1")]));
    let cache = Arc::new(InMemoryCache::new());
    cache.fail.store(true, Ordering::SeqCst);
    let evaluator = FlagEvaluator::builder(repository.clone())
        .cache(cache.clone())
        .build()
        .unwrap();

    let enabled = evaluator
        .is_enabled("f1", &EvaluationContext::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(enabled);
    assert_eq!(repository.get_calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.set_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invalidate_and_clear() {
    let repository = Arc::new(InMemoryRepository::with_flags(vec![
        enabled_flag("f1"),
        enabled_flag("f2"),
    ]));
    let cache = Arc::new(InMemoryCache::new());
    let evaluator = FlagEvaluator::builder(repository.clone())
        .cache(cache.clone())
        .build()
        .unwrap();
    let ctx = EvaluationContext::new();
    let token = CancellationToken::new();

    evaluator.evaluate("f1", &ctx, &token).await.unwrap();
    evaluator.evaluate("f2", &ctx, &token).await.unwrap();
    assert!(cache.contains("f1") && cache.contains("f2"));

    evaluator.invalidate("f1", &token).await.unwrap();
    assert!(!cache.contains("f1"));
    assert!(cache.contains("f2"));

    evaluator.clear_cache(&token).await.unwrap();
    assert!(!cache.contains("f2"));

    cache.fail.store(true, Ordering::SeqCst);
    let err = evaluator.clear_cache(&token).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::CacheFailure);
}

#[tokio::test]
async fn cancelled_token_fails_fast() {
    let repository = Arc::new(InMemoryRepository::with_flags(vec![enabled_flag("f1")]));
    let evaluator = evaluator_with(&repository);
    let token = CancellationToken::new();
    token.cancel();

    let err = evaluator
        .evaluate("f1", &EvaluationContext::new(), &token)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Cancelled);
    assert!(err.is_cancellation());
    assert_eq!(repository.get_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancellation_during_lookup() {
    let repository = Arc::new(InMemoryRepository::new().with_delay(Duration::from_secs(5)));
    let evaluator = evaluator_with(&repository);
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = evaluator
        .evaluate("slow", &EvaluationContext::new(), &token)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Cancelled);
    assert_eq!(repository.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn slow_repository_times_out() {
    let repository = Arc::new(InMemoryRepository::new().with_delay(Duration::from_secs(5)));
    let evaluator = FlagEvaluator::builder(repository.clone())
        .operation_timeout(Duration::from_millis(30))
        .build()
        .unwrap();

    let err = evaluator
        .evaluate("slow", &EvaluationContext::new(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::TimedOut);
    assert_eq!(err.to_string(), "Operation 'repository get' timed out after 30ms.");
}

#[test]
fn zero_durations_are_rejected() {
    let repository = Arc::new(InMemoryRepository::new());

    let ttl = FlagEvaluator::builder(repository.clone())
        .cache_ttl(Duration::ZERO)
        .build();
    assert_eq!(ttl.err().unwrap().kind, ErrorKind::InvalidOptions);

    let timeout = FlagEvaluator::builder(repository)
        .operation_timeout(Duration::ZERO)
        .build();
    assert_eq!(timeout.err().unwrap().kind, ErrorKind::InvalidOptions);
}

#[tokio::test]
async fn custom_manager_without_terminal_state() {
    let repository = Arc::new(InMemoryRepository::with_flags(vec![enabled_flag("f1")]));
    let evaluator = FlagEvaluator::builder(repository.clone())
        .manager(EvaluationManager::new(&[EvaluatorType::CustomTargeting]))
        .build()
        .unwrap();

    let err = evaluator
        .evaluate("f1", &EvaluationContext::new(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::NoEvaluator);
}

#[derive(Deserialize, Debug, PartialEq)]
struct Banner {
    title: String,
    weight: i64,
}

fn variations_flag() -> FeatureFlag {
    let mut flag = enabled_flag("variations");
    flag.variations = FlagVariations::new(
        HashMap::from([
            ("on".to_owned(), json!({"title": "Spring sale", "weight": 3})),
            ("off".to_owned(), json!(null)),
        ]),
        "off",
    );
    flag
}

#[tokio::test]
async fn get_variation_of_disabled_flag_is_default() {
    let repository = Arc::new(InMemoryRepository::new());
    let evaluator = evaluator_with(&repository);

    let value = evaluator
        .get_variation(
            "ghost",
            "default".to_owned(),
            &EvaluationContext::new(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(value, "default");
}

#[tokio::test]
async fn get_variation_typed() {
    let mut number = enabled_flag("page-size");
    number.variations = FlagVariations::new(HashMap::from([("on".to_owned(), json!("50"))]), "off");
    let repository = Arc::new(InMemoryRepository::with_flags(vec![number, variations_flag()]));
    let evaluator = evaluator_with(&repository);
    let ctx = EvaluationContext::new();
    let token = CancellationToken::new();

    let size: i64 = evaluator
        .get_variation("page-size", 20, &ctx, &token)
        .await
        .unwrap();
    assert_eq!(size, 50);

    let banner = evaluator
        .get_variation(
            "variations",
            Banner {
                title: "none".to_owned(),
                weight: 0,
            },
            &ctx,
            &token,
        )
        .await
        .unwrap();
    assert_eq!(banner.title, "Spring sale");
    assert_eq!(banner.weight, 3);
}

#[tokio::test]
async fn get_variation_falls_back_to_default() {
    log_record_init();
    let mut flag = enabled_flag("missing");
    flag.variations = FlagVariations::new(HashMap::new(), "off");
    let repository = Arc::new(InMemoryRepository::with_flags(vec![flag, variations_flag()]));
    let evaluator = evaluator_with(&repository);
    let ctx = EvaluationContext::new();
    let token = CancellationToken::new();

    let missing = evaluator.get_variation("missing", 7, &ctx, &token).await.unwrap();
    assert_eq!(missing, 7);

    let mismatch = evaluator
        .get_variation("variations", false, &ctx, &token)
        .await
        .unwrap();
    assert!(!mismatch);

    let logs = RecordingLogger::LOGS.take();
    assert!(logs.contains(
        "WARNING [2300] Flag 'missing' served the variation 'on' which has no value."
    ));
    assert!(logs.contains("WARNING [2301]"));
}

#[tokio::test]
async fn expired_flag_is_still_evaluated() {
    log_record_init();
    let mut flag = enabled_flag("old");
    flag.retention.expiration_date = Some(Utc::now() - ChronoDuration::days(1));
    let repository = Arc::new(InMemoryRepository::with_flags(vec![flag]));
    let evaluator = evaluator_with(&repository);

    let enabled = evaluator
        .is_enabled("old", &EvaluationContext::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(enabled);
    let logs = RecordingLogger::LOGS.take();
    assert!(logs.contains("WARNING [2200] Flag 'old' has passed its expiration date"));
}

#[tokio::test]
async fn missing_identifier_for_rollout_only_flag() {
    let flag = FeatureFlag::new("ids").with_modes([EvaluationMode::TenantRolloutPercentage]);
    let repository = Arc::new(InMemoryRepository::with_flags(vec![flag]));
    let evaluator = evaluator_with(&repository);

    let err = evaluator
        .evaluate("ids", &EvaluationContext::new(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::NoEvaluator);
}
