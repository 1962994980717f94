//! Generate, select and publish through the service facade

use std::sync::Arc;

use libfanpost::error::WorkflowError;
use libfanpost::media::MediaLocator;
use libfanpost::mock::{MockContentGenerator, MockImageGenerator, MockPostingApi, MockProbe, MockTunnel};
use libfanpost::service::events::Event;
use libfanpost::service::FanpostService;
use libfanpost::workflow::WorkflowStatus;
use libfanpost::{FanpostError, Platform, PlatformOptions};
use tempfile::TempDir;

fn service(api: Arc<MockPostingApi>) -> FanpostService {
    let locator = MediaLocator::new(
        Arc::new(MockTunnel::new("https://abc123.ngrok.app")),
        Arc::new(MockProbe::reachable()),
        "static/uploads",
    );
    FanpostService::from_parts(api, locator)
}

#[tokio::test]
async fn generated_image_is_published_with_selected_variants() {
    let dir = TempDir::new().unwrap();
    let image = dir.path().join("generated.png");
    std::fs::write(&image, b"png").unwrap();

    let api = Arc::new(MockPostingApi::new());
    let service = service(api.clone());
    let workflows = service.workflow_service(
        Arc::new(MockContentGenerator::numbered()),
        Some(Arc::new(MockImageGenerator::new(&image))),
    );

    let id = workflows
        .start("autumn in the city", vec![Platform::Instagram, Platform::X])
        .await
        .unwrap();
    workflows.select_variant(id, Platform::Instagram, 1).await.unwrap();

    let report = workflows.publish(id, PlatformOptions::default()).await.unwrap();

    assert!(report.all_succeeded());
    let instagram = &api.calls_for(Platform::Instagram)[0];
    assert_eq!(instagram.content, "Instagram variant 2");
    assert_eq!(
        instagram.media_items[0].url,
        "https://abc123.ngrok.app/static/uploads/generated.png"
    );
    assert_eq!(api.calls_for(Platform::X)[0].content, "X variant 1");

    let workflow = workflows.status(id).await.unwrap();
    assert_eq!(workflow.status, WorkflowStatus::Published);
    assert!(workflow.media[0].is_resolved());
}

#[tokio::test]
async fn failed_workflow_can_be_published_again() {
    let api = Arc::new(MockPostingApi::new());
    let service = service(api.clone());
    let workflows = service.workflow_service(Arc::new(MockContentGenerator::numbered()), None);

    // Instagram without media fails validation, so the first publish fails everywhere
    let id = workflows.start("launch", vec![Platform::Instagram]).await.unwrap();
    let first = workflows.publish(id, PlatformOptions::default()).await.unwrap();
    assert!(!first.any_succeeded());
    assert_eq!(workflows.status(id).await.unwrap().status, WorkflowStatus::Failed);
    assert!(api.calls().is_empty());

    workflows
        .attach_media(id, libfanpost::MediaReference::remote("https://cdn.example.com/launch.jpg"))
        .await
        .unwrap();
    let second = workflows.publish(id, PlatformOptions::default()).await.unwrap();
    assert!(second.all_succeeded());
    assert_eq!(workflows.status(id).await.unwrap().status, WorkflowStatus::Published);
}

#[tokio::test]
async fn workflow_publish_emits_dispatch_events() {
    let service = service(Arc::new(MockPostingApi::new()));
    let mut events = service.subscribe();
    let workflows = service.workflow_service(Arc::new(MockContentGenerator::numbered()), None);

    let id = workflows.start("events", vec![Platform::LinkedIn]).await.unwrap();
    workflows.publish(id, PlatformOptions::default()).await.unwrap();

    let mut finished = 0;
    while let Ok(event) = events.try_recv() {
        if let Event::PlatformFinished { result, .. } = event {
            assert_eq!(result.platform, Platform::LinkedIn);
            assert!(result.is_success());
            finished += 1;
        }
    }
    assert_eq!(finished, 1);
}

#[tokio::test]
async fn unknown_workflow_is_not_found() {
    let service = service(Arc::new(MockPostingApi::new()));
    let workflows = service.workflow_service(Arc::new(MockContentGenerator::numbered()), None);
    let missing = uuid::Uuid::new_v4();

    let err = workflows.publish(missing, PlatformOptions::default()).await.unwrap_err();
    assert!(matches!(
        err,
        FanpostError::Workflow(WorkflowError::NotFound(id)) if id == missing
    ));
}

#[tokio::test]
async fn purge_removes_only_stale_workflows() {
    let service = service(Arc::new(MockPostingApi::new()));
    let workflows = service.workflow_service(Arc::new(MockContentGenerator::numbered()), None);
    let id = workflows.start("fresh", vec![Platform::X]).await.unwrap();

    assert_eq!(workflows.purge_older_than(chrono::Duration::hours(1)).await, 0);
    assert!(workflows.status(id).await.is_ok());
    assert_eq!(workflows.purge_older_than(chrono::Duration::zero() - chrono::Duration::seconds(1)).await, 1);
    assert!(service.workflows().is_empty().await);
}
