//! Abstract external collaborators
//!
//! The engine depends on two services it does not implement: a membership
//! gate (only consulted for the project start transition) and an image blob
//! store (the engine persists reference lists, never bytes). Both are async
//! trait seams; in-process implementations are provided for the common case.

use crate::error::EngineError;
use async_trait::async_trait;
use dashmap::DashMap;
use qrw_model::{ActorId, ImageRef, ProjectId};
use qrw_store::DocumentStore;
use std::sync::Arc;
use ulid::Ulid;

/// Answers "is this actor assigned to this project?"
#[async_trait]
pub trait MembershipGate: Send + Sync + std::fmt::Debug {
    /// Whether the actor may start the project
    async fn is_member(&self, project_id: ProjectId, actor_id: ActorId) -> bool;
}

/// Membership gate backed by the document store's membership rows
#[derive(Debug, Clone)]
pub struct StoreMembershipGate {
    store: Arc<DocumentStore>,
}

impl StoreMembershipGate {
    /// Create a gate over the shared store
    #[inline]
    #[must_use]
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MembershipGate for StoreMembershipGate {
    async fn is_member(&self, project_id: ProjectId, actor_id: ActorId) -> bool {
        self.store.is_member(project_id, actor_id)
    }
}

/// An image blob held by the in-memory store
#[derive(Debug, Clone)]
pub struct StoredImage {
    /// Original filename
    pub filename: String,
    /// MIME type
    pub content_type: String,
    /// Raw bytes
    pub bytes: Vec<u8>,
}

/// Accepts image bytes, hands back an opaque reference
#[async_trait]
pub trait ImageStore: Send + Sync + std::fmt::Debug {
    /// Store an image owned by a question, returning its reference
    ///
    /// # Errors
    /// Implementation-defined; the in-memory store never fails.
    async fn put(
        &self,
        owner_question: &str,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<ImageRef, EngineError>;

    /// Fetch a previously stored image
    async fn get(&self, reference: &ImageRef) -> Option<StoredImage>;
}

/// In-memory image store
#[derive(Debug, Default)]
pub struct MemoryImageStore {
    blobs: DashMap<ImageRef, StoredImage>,
}

impl MemoryImageStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Whether the store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn put(
        &self,
        _owner_question: &str,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<ImageRef, EngineError> {
        let reference = ImageRef::new(format!("img/{}", Ulid::new()));
        self.blobs.insert(
            reference.clone(),
            StoredImage {
                filename: filename.to_string(),
                content_type: content_type.to_string(),
                bytes,
            },
        );
        Ok(reference)
    }

    async fn get(&self, reference: &ImageRef) -> Option<StoredImage> {
        self.blobs.get(reference).map(|r| r.value().clone())
    }
}
