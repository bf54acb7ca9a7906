//! In-memory fakes for collaborator traits (testing only)
//!
//! Provides `MemoryBuildProvider`, `MemoryObjectStore`, `MemorySecretStore`,
//! `RecordingChannel`, and `RecordingCommentApi`. Each one records calls and
//! can be told to fail so pipeline tests can exercise every error path
//! without a network.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::PortError;
use crate::ports::*;

fn injected(slot: &Mutex<Option<PortError>>) -> PortResult<()> {
    match slot.lock().unwrap().clone() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// MemoryBuildProvider
// ---------------------------------------------------------------------------

/// Build provider backed by a `HashMap<build id, RawBuild>`.
///
/// Builds are visible only under the project id they were inserted with.
#[derive(Debug, Default)]
pub struct MemoryBuildProvider {
    builds: Mutex<HashMap<(String, String), RawBuild>>,
    failure: Mutex<Option<PortError>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MemoryBuildProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, project_id: &str, build: RawBuild) {
        let mut builds = self.builds.lock().unwrap();
        builds.insert((project_id.to_string(), build.id.clone()), build);
    }

    pub fn fail_with(&self, err: PortError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    /// `(build id, project id)` pairs in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BuildProvider for MemoryBuildProvider {
    async fn get_build(&self, build_id: &str, project_id: &str) -> PortResult<Option<RawBuild>> {
        self.calls
            .lock()
            .unwrap()
            .push((build_id.to_string(), project_id.to_string()));
        injected(&self.failure)?;
        let builds = self.builds.lock().unwrap();
        Ok(builds
            .get(&(project_id.to_string(), build_id.to_string()))
            .cloned())
    }
}

// ---------------------------------------------------------------------------
// MemoryObjectStore
// ---------------------------------------------------------------------------

/// Object store backed by a `HashMap<(bucket, path), bytes>`.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    failure: Mutex<Option<PortError>>,
    lookups: Mutex<Vec<(String, String)>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bucket: &str, path: &str, data: impl Into<Vec<u8>>) {
        let mut objects = self.objects.lock().unwrap();
        objects.insert((bucket.to_string(), path.to_string()), data.into());
    }

    pub fn fail_with(&self, err: PortError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    /// `(bucket, path)` pairs passed to `exists`, in call order.
    pub fn lookups(&self) -> Vec<(String, String)> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn exists(&self, bucket: &str, path: &str) -> PortResult<bool> {
        self.lookups
            .lock()
            .unwrap()
            .push((bucket.to_string(), path.to_string()));
        injected(&self.failure)?;
        let objects = self.objects.lock().unwrap();
        Ok(objects.contains_key(&(bucket.to_string(), path.to_string())))
    }

    async fn download(&self, bucket: &str, path: &str) -> PortResult<Vec<u8>> {
        injected(&self.failure)?;
        let objects = self.objects.lock().unwrap();
        objects
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| PortError::Status {
                service: "memory-object-store".to_string(),
                status: 404,
                body: format!("{}/{}", bucket, path),
            })
    }
}

// ---------------------------------------------------------------------------
// MemorySecretStore
// ---------------------------------------------------------------------------

/// Secret store backed by a `HashMap<name, value>`.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, String>>,
    requested: Mutex<Vec<String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(name: &str, value: &str) -> Self {
        let store = Self::default();
        store
            .secrets
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
        store
    }

    /// Secret names requested so far.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn latest_secret_version(&self, name: &str) -> PortResult<String> {
        self.requested.lock().unwrap().push(name.to_string());
        let secrets = self.secrets.lock().unwrap();
        secrets.get(name).cloned().ok_or_else(|| PortError::Status {
            service: "memory-secret-store".to_string(),
            status: 404,
            body: format!("secret {} not found", name),
        })
    }
}

// ---------------------------------------------------------------------------
// RecordingChannel
// ---------------------------------------------------------------------------

/// Messaging channel that keeps every delivered payload.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<NotificationPayload>>,
    failure: Mutex<Option<PortError>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, err: PortError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn sent(&self) -> Vec<NotificationPayload> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingChannel for RecordingChannel {
    async fn send(&self, payload: &NotificationPayload) -> PortResult<()> {
        injected(&self.failure)?;
        self.sent.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingCommentApi
// ---------------------------------------------------------------------------

/// Review-comment API that keeps every posted comment with its credential.
#[derive(Debug, Default)]
pub struct RecordingCommentApi {
    posted: Mutex<Vec<(CommentRequest, String)>>,
    failure: Mutex<Option<PortError>>,
}

impl RecordingCommentApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, err: PortError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn posted(&self) -> Vec<(CommentRequest, String)> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReviewCommentApi for RecordingCommentApi {
    async fn post_comment(&self, request: &CommentRequest, credential: &str) -> PortResult<()> {
        injected(&self.failure)?;
        self.posted
            .lock()
            .unwrap()
            .push((request.clone(), credential.to_string()));
        Ok(())
    }
}
