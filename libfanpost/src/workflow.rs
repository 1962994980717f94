//! In-memory workflow store
//!
//! A workflow tracks one content-creation job from generated variants to
//! publish results. The store is an explicit handle shared through `Arc`.
//! Each workflow sits behind its own async mutex, so operations on the same
//! id are serialized while different ids proceed independently.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::platforms::Platform;
use crate::types::{MediaReference, PublishReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Waiting for the content generator
    Generating,
    /// Variants recorded, may be selected and published
    Ready,
    Publishing,
    /// At least one platform accepted the post
    Published,
    Failed,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowStatus::Generating => "generating",
            WorkflowStatus::Ready => "ready",
            WorkflowStatus::Publishing => "publishing",
            WorkflowStatus::Published => "published",
            WorkflowStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Workflow {
    pub id: Uuid,
    pub topic: String,
    pub status: WorkflowStatus,
    pub platforms: Vec<Platform>,
    pub variants: BTreeMap<Platform, Vec<String>>,
    /// Chosen variant index; platforms without an entry use their first variant
    pub selected: BTreeMap<Platform, usize>,
    pub media: Vec<MediaReference>,
    pub results: PublishReport,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(topic: impl Into<String>, platforms: Vec<Platform>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            status: WorkflowStatus::Generating,
            platforms,
            variants: BTreeMap::new(),
            selected: BTreeMap::new(),
            media: Vec::new(),
            results: PublishReport::default(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn record_variants(&mut self, variants: BTreeMap<Platform, Vec<String>>) {
        self.variants = variants;
        self.selected.clear();
        self.status = WorkflowStatus::Ready;
        self.touch();
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = WorkflowStatus::Failed;
        self.error = Some(error.into());
        self.touch();
    }

    pub fn select(&mut self, platform: Platform, index: usize) -> Result<(), WorkflowError> {
        let available = self
            .variants
            .get(&platform)
            .map(Vec::len)
            .filter(|n| *n > 0)
            .ok_or(WorkflowError::NoVariants { platform })?;
        if index >= available {
            return Err(WorkflowError::VariantOutOfRange {
                platform,
                index,
                available,
            });
        }
        self.selected.insert(platform, index);
        self.touch();
        Ok(())
    }

    /// Text that would be published on `platform`
    pub fn selected_text(&self, platform: Platform) -> Option<&str> {
        let index = self.selected.get(&platform).copied().unwrap_or(0);
        self.variants
            .get(&platform)
            .and_then(|v| v.get(index))
            .map(String::as_str)
    }

    pub fn attach_media(&mut self, media: MediaReference) {
        self.media.push(media);
        self.touch();
    }

    /// Platforms grouped by the text selected for them
    pub fn publish_groups(&self) -> BTreeMap<String, Vec<Platform>> {
        let mut groups: BTreeMap<String, Vec<Platform>> = BTreeMap::new();
        for &platform in &self.platforms {
            if let Some(text) = self.selected_text(platform) {
                groups.entry(text.to_string()).or_default().push(platform);
            }
        }
        groups
    }

    pub fn record_results(&mut self, report: PublishReport) {
        self.status = if report.any_succeeded() {
            WorkflowStatus::Published
        } else {
            WorkflowStatus::Failed
        };
        self.error = if report.any_succeeded() {
            None
        } else {
            Some("All platforms failed".to_string())
        };
        self.results.merge(report);
        self.touch();
    }
}

/// Shared handle to one workflow
pub type WorkflowHandle = Arc<Mutex<Workflow>>;

#[derive(Default)]
pub struct WorkflowStore {
    workflows: RwLock<HashMap<Uuid, WorkflowHandle>>,
}

impl WorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, workflow: Workflow) -> Uuid {
        let id = workflow.id;
        self.workflows
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(workflow)));
        id
    }

    /// The workflow's handle; lock it to read or update
    pub async fn handle(&self, id: Uuid) -> Result<WorkflowHandle, WorkflowError> {
        self.workflows
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(WorkflowError::NotFound(id))
    }

    /// A copy of the workflow as it is now
    pub async fn snapshot(&self, id: Uuid) -> Result<Workflow, WorkflowError> {
        let handle = self.handle(id).await?;
        let workflow = handle.lock().await;
        Ok(workflow.clone())
    }

    /// Apply `f` while holding the workflow's lock
    pub async fn update<T, F>(&self, id: Uuid, f: F) -> Result<T, WorkflowError>
    where
        F: FnOnce(&mut Workflow) -> Result<T, WorkflowError>,
    {
        let handle = self.handle(id).await?;
        let mut workflow = handle.lock().await;
        f(&mut workflow)
    }

    /// Returns `true` if the workflow existed
    pub async fn remove(&self, id: Uuid) -> bool {
        self.workflows.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.workflows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.workflows.read().await.is_empty()
    }

    pub async fn ids(&self) -> Vec<Uuid> {
        self.workflows.read().await.keys().copied().collect()
    }

    /// Remove workflows not updated within `max_age`; returns how many were removed
    ///
    /// A workflow that is locked by an in-flight operation counts as fresh.
    pub async fn purge_older_than(&self, max_age: chrono::Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut workflows = self.workflows.write().await;
        let before = workflows.len();
        workflows.retain(|_, handle| match handle.try_lock() {
            Ok(workflow) => workflow.updated_at >= cutoff,
            Err(_) => true,
        });
        before - workflows.len()
    }
}
