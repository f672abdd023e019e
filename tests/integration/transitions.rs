//! Transition integration tests.
//!
//! Tests that verify stop/start behavior, per-service fault isolation and
//! start/stop tag reconciliation.

use crate::common::{context, fleet, tagged_config};
use tagsched::testing::discover;
use tagsched::{
    EcsService, Event, Operation, ProviderError, SAVED_CAPACITY_TAG, ServiceFixture,
    ServiceState, TagPair,
};

/// Test: Stopping a service already at zero makes no calls and reports nothing.
#[tokio::test]
async fn test_stop_is_idempotent() {
    let ecs = fleet(10);
    ecs.add_service(ServiceFixture::new("prod", "idle", 0).with_tag("Schedule", "office"));
    let (ctx, handler) = context(&ecs, tagged_config()).await;
    let resources = discover(&ecs, &ctx.config).await;
    ecs.clear_calls();

    let results = EcsService::new().stop_resources(&ctx, &resources).await;

    assert!(results.is_empty());
    assert!(ecs.calls().is_empty());
    assert!(handler.events().await.is_empty());
}

/// Test: Starting a running service makes no calls and reports nothing.
#[tokio::test]
async fn test_start_skips_running_services() {
    let ecs = fleet(10);
    ecs.add_service(ServiceFixture::new("prod", "api", 2).with_tag("Schedule", "office"));
    let (ctx, _) = context(&ecs, tagged_config()).await;
    let resources = discover(&ecs, &ctx.config).await;
    ecs.clear_calls();

    let results = EcsService::new().start_resources(&ctx, &resources).await;

    assert!(results.is_empty());
    assert!(ecs.calls().is_empty());
}

/// Test: One failing service does not affect the others in the batch.
#[tokio::test]
async fn test_batch_fault_isolation() {
    let ecs = fleet(10);
    for name in ["first", "second", "third"] {
        ecs.add_service(ServiceFixture::new("prod", name, 2).with_tag("Schedule", "office"));
    }
    ecs.fail_on(
        Operation::UpdateService,
        "second",
        ProviderError::Transport("connection reset".into()),
    );
    let (ctx, handler) = context(&ecs, tagged_config()).await;
    let resources = discover(&ecs, &ctx.config).await;

    let results = EcsService::new().stop_resources(&ctx, &resources).await;

    let stopped: Vec<_> = results.iter().map(|r| r.service_id.as_str()).collect();
    assert_eq!(stopped, vec!["first", "third"]);
    assert_eq!(ecs.desired_count("prod", "first"), Some(0));
    assert_eq!(ecs.desired_count("prod", "second"), Some(2));
    assert_eq!(ecs.desired_count("prod", "third"), Some(0));

    let failures: Vec<_> = handler
        .events()
        .await
        .into_iter()
        .filter_map(|e| match e {
            Event::TransitionFailed {
                service_id,
                target,
                error,
                ..
            } => Some((service_id, target, error)),
            _ => None,
        })
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0.as_str(), "second");
    assert_eq!(failures[0].1, ServiceState::Stopped);
    assert!(failures[0].2.contains("connection reset"));

    // The failed service was never tagged.
    let second_arn = ecs.service_arn("prod", "second");
    assert!(!ecs.tags(&second_arn).contains_key(SAVED_CAPACITY_TAG));
}

/// Test: A failure while saving the desired count skips the service.
#[tokio::test]
async fn test_saved_capacity_tag_failure_skips_service() {
    let ecs = fleet(10);
    let arn = ecs.add_service(ServiceFixture::new("prod", "api", 2).with_tag("Schedule", "office"));
    ecs.add_service(ServiceFixture::new("prod", "web", 3).with_tag("Schedule", "office"));
    ecs.fail_on(
        Operation::TagResource,
        arn,
        ProviderError::AccessDenied("ecs:TagResource".into()),
    );
    let (ctx, _) = context(&ecs, tagged_config()).await;
    let resources = discover(&ecs, &ctx.config).await;

    let results = EcsService::new().stop_resources(&ctx, &resources).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].service_id.as_str(), "web");
}

/// Test: Starting without a saved desired count restores exactly one task.
#[tokio::test]
async fn test_start_defaults_to_one() {
    let ecs = fleet(10);
    ecs.add_service(ServiceFixture::new("prod", "api", 0).with_tag("Schedule", "office"));
    let (ctx, handler) = context(&ecs, tagged_config()).await;
    let resources = discover(&ecs, &ctx.config).await;

    let results = EcsService::new().start_resources(&ctx, &resources).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].label(), "running");
    assert_eq!(ecs.desired_count("prod", "api"), Some(1));
    assert_eq!(
        handler
            .count(|e| matches!(e, Event::SavedCapacityMissing { .. }))
            .await,
        1
    );
}

/// Test: Starting with a saved desired count restores it.
#[tokio::test]
async fn test_start_restores_saved_capacity() {
    let ecs = fleet(10);
    let arn = ecs.add_service(
        ServiceFixture::new("prod", "api", 0)
            .with_tag("Schedule", "office")
            .with_tag(SAVED_CAPACITY_TAG, "4"),
    );
    let (ctx, handler) = context(&ecs, tagged_config()).await;
    let resources = discover(&ecs, &ctx.config).await;

    EcsService::new().start_resources(&ctx, &resources).await;

    assert_eq!(ecs.desired_count("prod", "api"), Some(4));
    assert!(!ecs.tags(&arn).contains_key(SAVED_CAPACITY_TAG));
    assert_eq!(
        handler
            .count(|e| matches!(e, Event::SavedCapacityMissing { .. }))
            .await,
        0
    );
}

/// Test: A saved desired count of zero is restored as zero, not the default.
#[tokio::test]
async fn test_start_restores_saved_zero() {
    let ecs = fleet(10);
    let arn = ecs.add_service(
        ServiceFixture::new("prod", "api", 0)
            .with_tag("Schedule", "office")
            .with_tag(SAVED_CAPACITY_TAG, "0"),
    );
    let (ctx, handler) = context(&ecs, tagged_config()).await;
    let resources = discover(&ecs, &ctx.config).await;

    let results = EcsService::new().start_resources(&ctx, &resources).await;

    assert_eq!(results.len(), 1);
    assert_eq!(ecs.desired_count("prod", "api"), Some(0));
    assert!(!ecs.tags(&arn).contains_key(SAVED_CAPACITY_TAG));
    assert_eq!(
        handler
            .count(|e| matches!(e, Event::SavedCapacityMissing { .. }))
            .await,
        0
    );
}

/// Test: One failing service does not affect the others in a start batch.
#[tokio::test]
async fn test_start_batch_fault_isolation() {
    let ecs = fleet(10);
    for name in ["first", "second", "third"] {
        ecs.add_service(
            ServiceFixture::new("prod", name, 0)
                .with_tag("Schedule", "office")
                .with_tag(SAVED_CAPACITY_TAG, "3"),
        );
    }
    ecs.fail_on(
        Operation::UpdateService,
        "second",
        ProviderError::Throttled("rate exceeded".into()),
    );
    let (ctx, handler) = context(&ecs, tagged_config()).await;
    let resources = discover(&ecs, &ctx.config).await;

    let results = EcsService::new().start_resources(&ctx, &resources).await;

    let started: Vec<_> = results.iter().map(|r| r.service_id.as_str()).collect();
    assert_eq!(started, vec!["first", "third"]);
    assert!(results.iter().all(|r| r.state == ServiceState::Running));
    assert_eq!(ecs.desired_count("prod", "first"), Some(3));
    assert_eq!(ecs.desired_count("prod", "second"), Some(0));
    assert_eq!(ecs.desired_count("prod", "third"), Some(3));

    let failures: Vec<_> = handler
        .events()
        .await
        .into_iter()
        .filter_map(|e| match e {
            Event::TransitionFailed {
                service_id,
                target,
                error,
                ..
            } => Some((service_id, target, error)),
            _ => None,
        })
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0.as_str(), "second");
    assert_eq!(failures[0].1, ServiceState::Running);
    assert!(failures[0].2.contains("rate exceeded"));

    // The failed service keeps its saved desired count for the next start.
    let second_arn = ecs.service_arn("prod", "second");
    assert_eq!(
        ecs.tags(&second_arn)
            .get(SAVED_CAPACITY_TAG)
            .map(String::as_str),
        Some("3")
    );
}

/// Test: A failure while clearing the saved desired count skips the service.
#[tokio::test]
async fn test_saved_capacity_untag_failure_skips_service() {
    let ecs = fleet(10);
    ecs.add_service(ServiceFixture::new("prod", "api", 0).with_tag("Schedule", "office"));
    let web_arn =
        ecs.add_service(ServiceFixture::new("prod", "web", 0).with_tag("Schedule", "office"));
    ecs.add_service(ServiceFixture::new("prod", "worker", 0).with_tag("Schedule", "office"));
    ecs.fail_on(
        Operation::UntagResource,
        web_arn,
        ProviderError::AccessDenied("ecs:UntagResource".into()),
    );
    let (ctx, handler) = context(&ecs, tagged_config()).await;
    let resources = discover(&ecs, &ctx.config).await;

    let results = EcsService::new().start_resources(&ctx, &resources).await;

    let started: Vec<_> = results.iter().map(|r| r.service_id.as_str()).collect();
    assert_eq!(started, vec!["api", "worker"]);
    assert_eq!(
        handler
            .count(|e| matches!(e, Event::TransitionFailed { .. }))
            .await,
        1
    );
    assert_eq!(
        handler
            .count(|e| matches!(e, Event::ServiceStarted { .. }))
            .await,
        2
    );
}

/// Test: A tag reconcile failure during start does not fail the start.
#[tokio::test]
async fn test_start_tag_failure_does_not_fail_transition() {
    let ecs = fleet(10);
    let arn = ecs.add_service(
        ServiceFixture::new("prod", "api", 0)
            .with_tag("Schedule", "office")
            .with_tag(SAVED_CAPACITY_TAG, "2"),
    );
    ecs.fail_on(
        Operation::TagResource,
        arn.clone(),
        ProviderError::AccessDenied("ecs:TagResource".into()),
    );
    let (ctx, handler) = context(&ecs, tagged_config()).await;
    let resources = discover(&ecs, &ctx.config).await;

    let results = EcsService::new().start_resources(&ctx, &resources).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].state, ServiceState::Running);
    assert_eq!(ecs.desired_count("prod", "api"), Some(2));
    assert!(!ecs.tags(&arn).contains_key("StartedBy"));

    let events = handler.events().await;
    assert!(events.iter().any(|e| matches!(
        e,
        Event::TagReconcileFailed {
            target: ServiceState::Running,
            ..
        }
    )));
    assert!(events.iter().any(|e| matches!(e, Event::ServiceStarted { .. })));
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, Event::TransitionFailed { .. }))
    );
}

/// Test: Disallowed characters in tag values are replaced and reported once.
#[tokio::test]
async fn test_tag_values_are_sanitized() {
    let ecs = fleet(10);
    let arn = ecs.add_service(ServiceFixture::new("prod", "api", 2).with_tag("Schedule", "office"));
    let config = tagged_config().with_stopped_tags(vec![
        TagPair::new("Note", "héllo!!\nworld"),
        TagPair::new("State", "stopped"),
    ]);
    let (ctx, handler) = context(&ecs, config).await;
    let resources = discover(&ecs, &ctx.config).await;

    EcsService::new().stop_resources(&ctx, &resources).await;

    assert_eq!(
        ecs.tags(&arn).get("Note").map(String::as_str),
        Some("héllo   world")
    );
    let sanitized: Vec<_> = handler
        .events()
        .await
        .into_iter()
        .filter_map(|e| match e {
            Event::TagValueSanitized {
                key,
                original,
                sanitized,
                ..
            } => Some((key, original, sanitized)),
            _ => None,
        })
        .collect();
    assert_eq!(sanitized.len(), 1);
    assert_eq!(sanitized[0].0, "Note");
    assert_eq!(sanitized[0].1, "héllo!!\nworld");
    assert_eq!(sanitized[0].2, "héllo   world");
}

/// Test: Reconciliation removes only opposite-direction keys not shared.
#[tokio::test]
async fn test_reconcile_never_removes_shared_keys() {
    let ecs = fleet(10);
    let arn = ecs.add_service(
        ServiceFixture::new("prod", "api", 0)
            .with_tag("Schedule", "office")
            .with_tag("State", "stopped")
            .with_tag("StoppedBy", "tagsched")
            .with_tag(SAVED_CAPACITY_TAG, "2"),
    );
    let (ctx, _) = context(&ecs, tagged_config()).await;
    let resources = discover(&ecs, &ctx.config).await;
    ecs.clear_calls();

    EcsService::new().start_resources(&ctx, &resources).await;

    let untags = ecs.calls_for(Operation::UntagResource);
    assert_eq!(untags.len(), 2);
    assert_eq!(untags[0].detail, vec![SAVED_CAPACITY_TAG.to_string()]);
    assert_eq!(untags[1].detail, vec!["StoppedBy".to_string()]);

    let tags = ecs.tags(&arn);
    assert_eq!(tags.get("State").map(String::as_str), Some("running"));
    assert_eq!(tags.get("StartedBy").map(String::as_str), Some("tagsched"));
    assert!(!tags.contains_key("StoppedBy"));
}

/// Test: Results follow the input order, not discovery order.
#[tokio::test]
async fn test_results_follow_input_order() {
    let ecs = fleet(10);
    for name in ["a", "b", "c"] {
        ecs.add_service(ServiceFixture::new("prod", name, 1).with_tag("Schedule", "office"));
    }
    let (ctx, _) = context(&ecs, tagged_config()).await;
    let mut resources = discover(&ecs, &ctx.config).await;
    resources.reverse();

    let results = EcsService::new().stop_resources(&ctx, &resources).await;

    let order: Vec<_> = results.iter().map(|r| r.service_id.as_str()).collect();
    assert_eq!(order, vec!["c", "b", "a"]);
    let updates: Vec<_> = ecs
        .calls_for(Operation::UpdateService)
        .into_iter()
        .map(|c| c.target)
        .collect();
    assert_eq!(updates, vec!["c", "b", "a"]);
}
