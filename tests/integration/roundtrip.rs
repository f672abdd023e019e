//! Stop/start round trip integration tests.
//!
//! Tests that verify the saved desired count survives a stop and is
//! consumed by the following start.

use crate::common::{context, fleet, tagged_config};
use tagsched::testing::discover;
use tagsched::{EcsService, SAVED_CAPACITY_TAG, ServiceFixture, ServiceState};

/// Test: stop(4) saves "4" and scales to zero; start restores 4 and drops the tag.
#[tokio::test]
async fn test_stop_then_start_restores_capacity() {
    let ecs = fleet(10);
    let arn = ecs.add_service(ServiceFixture::new("prod", "api", 4).with_tag("Schedule", "office"));
    let (ctx, _) = context(&ecs, tagged_config()).await;
    let service = EcsService::new();

    let running = discover(&ecs, &ctx.config).await;
    assert_eq!(running[0].state, ServiceState::Running);
    service.stop_resources(&ctx, &running).await;

    assert_eq!(ecs.desired_count("prod", "api"), Some(0));
    assert_eq!(
        ecs.tags(&arn).get(SAVED_CAPACITY_TAG).map(String::as_str),
        Some("4")
    );

    let stopped = discover(&ecs, &ctx.config).await;
    assert_eq!(stopped[0].state, ServiceState::Stopped);
    assert_eq!(stopped[0].saved_capacity.as_deref(), Some("4"));
    service.start_resources(&ctx, &stopped).await;

    assert_eq!(ecs.desired_count("prod", "api"), Some(4));
    assert!(!ecs.tags(&arn).contains_key(SAVED_CAPACITY_TAG));

    let restarted = discover(&ecs, &ctx.config).await;
    assert_eq!(restarted[0].state, ServiceState::Running);
    assert_eq!(restarted[0].saved_capacity, None);
}

/// Test: Tags flip between the stop and start sets over several cycles.
#[tokio::test]
async fn test_repeated_cycles_keep_tags_consistent() {
    let ecs = fleet(10);
    let arn = ecs.add_service(ServiceFixture::new("prod", "api", 2).with_tag("Schedule", "office"));
    let (ctx, _) = context(&ecs, tagged_config()).await;
    let service = EcsService::new();

    for _ in 0..3 {
        let resources = discover(&ecs, &ctx.config).await;
        service.stop_resources(&ctx, &resources).await;
        let tags = ecs.tags(&arn);
        assert_eq!(tags.get("State").map(String::as_str), Some("stopped"));
        assert!(tags.contains_key("StoppedBy"));
        assert!(!tags.contains_key("StartedBy"));

        let resources = discover(&ecs, &ctx.config).await;
        service.start_resources(&ctx, &resources).await;
        let tags = ecs.tags(&arn);
        assert_eq!(tags.get("State").map(String::as_str), Some("running"));
        assert!(tags.contains_key("StartedBy"));
        assert!(!tags.contains_key("StoppedBy"));
        assert!(!tags.contains_key(SAVED_CAPACITY_TAG));
    }

    assert_eq!(ecs.desired_count("prod", "api"), Some(2));
    // The schedule tag itself is never touched.
    assert_eq!(
        ecs.tags(&arn).get("Schedule").map(String::as_str),
        Some("office")
    );
}

/// Test: The saved value is the desired count seen at discovery.
#[tokio::test]
async fn test_stop_uses_discovered_capacity() {
    let ecs = fleet(10);
    let arn = ecs.add_service(ServiceFixture::new("prod", "api", 5).with_tag("Schedule", "office"));
    let (ctx, _) = context(&ecs, tagged_config()).await;

    let resources = discover(&ecs, &ctx.config).await;
    EcsService::new().stop_resources(&ctx, &resources).await;

    assert_eq!(
        ecs.tags(&arn).get(SAVED_CAPACITY_TAG).map(String::as_str),
        Some("5")
    );
}
