//! Content-creation workflows
//!
//! Ties the generators, the workflow store and the dispatcher together:
//! generate per-platform variants for a topic, let the caller pick one per
//! platform, then publish and record the results on the workflow.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::dispatch::Dispatcher;
use crate::error::{FanpostError, Result, WorkflowError};
use crate::generation::{check_variants, ContentGenerator, ImageGenerator};
use crate::platforms::Platform;
use crate::types::{MediaReference, PlatformOptions, PostRequest, PublishReport};
use crate::workflow::{Workflow, WorkflowStatus, WorkflowStore};

#[derive(Clone)]
pub struct WorkflowService {
    store: Arc<WorkflowStore>,
    content: Arc<dyn ContentGenerator>,
    images: Option<Arc<dyn ImageGenerator>>,
    dispatcher: Dispatcher,
}

impl WorkflowService {
    pub fn new(store: Arc<WorkflowStore>, content: Arc<dyn ContentGenerator>, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            content,
            images: None,
            dispatcher,
        }
    }

    pub fn with_image_generator(mut self, images: Arc<dyn ImageGenerator>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn store(&self) -> &Arc<WorkflowStore> {
        &self.store
    }

    /// Create a workflow and generate its content variants
    ///
    /// Repeated platforms are kept once, in first-seen order.
    /// The workflow is recorded even when generation fails, with status
    /// `Failed`. A failed image generation is logged and skipped.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty platform list, `Generation` when the
    /// content generator fails or returns no variants for a platform.
    pub async fn start(&self, topic: &str, requested: Vec<Platform>) -> Result<Uuid> {
        let mut platforms = Vec::with_capacity(requested.len());
        for platform in requested {
            if !platforms.contains(&platform) {
                platforms.push(platform);
            }
        }
        if platforms.is_empty() {
            return Err(FanpostError::InvalidInput(
                "At least one platform must be selected".to_string(),
            ));
        }

        let id = self.store.insert(Workflow::new(topic, platforms.clone())).await;
        let handle = self.store.handle(id).await?;
        let mut workflow = handle.lock().await;
        info!(workflow_id = %id, topic, platforms = ?platforms, "Starting workflow");

        let generated = self
            .content
            .generate(topic, &platforms)
            .await
            .and_then(|variants| check_variants(&platforms, variants));
        match generated {
            Ok(variants) => workflow.record_variants(variants),
            Err(e) => {
                warn!(workflow_id = %id, error = %e, "Content generation failed");
                workflow.fail(e.to_string());
                return Err(e.into());
            }
        }

        if let Some(images) = &self.images {
            match images.generate_image(topic).await {
                Ok(Some(path)) => workflow.attach_media(MediaReference::local(path)),
                Ok(None) => {}
                Err(e) => warn!(workflow_id = %id, error = %e, "Image generation failed, continuing without image"),
            }
        }

        Ok(id)
    }

    /// Choose which generated variant is published on `platform`
    ///
    /// # Arguments
    ///
    /// * `id` - The workflow
    /// * `platform` - A platform the workflow has variants for
    /// * `index` - Zero-based index into that platform's variants
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown workflow, `NoVariants` if the platform has no
    /// variants, `VariantOutOfRange` if `index` is past the last variant.
    pub async fn select_variant(&self, id: Uuid, platform: Platform, index: usize) -> Result<()> {
        self.store
            .update(id, |workflow| workflow.select(platform, index))
            .await?;
        Ok(())
    }

    /// Add a media file or URL to everything the workflow publishes
    ///
    /// Local files are resolved to public URLs at publish time, not here.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown workflow.
    pub async fn attach_media(&self, id: Uuid, media: MediaReference) -> Result<()> {
        self.store
            .update(id, |workflow| {
                workflow.attach_media(media);
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Publish the selected variants
    ///
    /// Platforms that share a selected text go out in one dispatch. The
    /// workflow stays locked for the whole publish, so a concurrent selection
    /// waits until the results are recorded.
    ///
    /// # Errors
    ///
    /// `NotReady` unless the workflow is `Ready` or `Failed`; `NothingSelected`
    /// if no platform has text to publish. Per-platform failures are in the
    /// returned report.
    pub async fn publish(&self, id: Uuid, options: PlatformOptions) -> Result<PublishReport> {
        let handle = self.store.handle(id).await?;
        let mut workflow = handle.lock().await;

        if !matches!(workflow.status, WorkflowStatus::Ready | WorkflowStatus::Failed) {
            return Err(WorkflowError::NotReady {
                status: workflow.status,
            }
            .into());
        }
        let groups = workflow.publish_groups();
        if groups.is_empty() {
            return Err(WorkflowError::NothingSelected.into());
        }

        workflow.status = WorkflowStatus::Publishing;
        let mut media = workflow.media.clone();
        let mut report = PublishReport::default();

        for (text, platforms) in groups {
            let request = PostRequest {
                id: Uuid::new_v4().to_string(),
                content: text,
                media,
                options: options.clone(),
                platforms,
            };
            report.merge(self.dispatcher.publish(&request).await);
            // carries resolved media URLs over to the next group
            media = request.media;
        }

        workflow.media = media;
        workflow.record_results(report.clone());
        info!(
            workflow_id = %id,
            status = %workflow.status,
            succeeded = report.succeeded_count(),
            "Workflow published"
        );
        Ok(report)
    }

    pub async fn status(&self, id: Uuid) -> Result<Workflow> {
        Ok(self.store.snapshot(id).await?)
    }

    pub async fn cleanup(&self, id: Uuid) -> Result<()> {
        if self.store.remove(id).await {
            Ok(())
        } else {
            Err(WorkflowError::NotFound(id).into())
        }
    }

    pub async fn purge_older_than(&self, max_age: chrono::Duration) -> usize {
        self.store.purge_older_than(max_age).await
    }
}
