//! The engine facade
//!
//! [`ReviewEngine`] wires every service onto one shared [`DocumentStore`]
//! and the external collaborators, so embedders construct a single value and
//! reach the services through accessors.

use crate::answers::AnswerService;
use crate::approval::ApprovalService;
use crate::checklist::ChecklistService;
use crate::clone::Cloner;
use crate::config::EngineConfig;
use crate::external::{ImageStore, MembershipGate, MemoryImageStore, StoreMembershipGate};
use crate::project::ProjectService;
use crate::reconcile::ReconciliationEngine;
use crate::template::TemplateService;
use qrw_store::DocumentStore;
use std::sync::Arc;

/// All workflow services over one shared store
#[derive(Debug)]
pub struct ReviewEngine {
    store: Arc<DocumentStore>,
    templates: TemplateService,
    cloner: Cloner,
    reconciler: ReconciliationEngine,
    answers: AnswerService,
    approvals: ApprovalService,
    projects: ProjectService,
    checklists: ChecklistService,
}

impl ReviewEngine {
    /// Create an engine with a fresh in-memory store, the store-backed
    /// membership gate, and the in-memory image store
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let store = Arc::new(DocumentStore::new());
        let membership = Arc::new(StoreMembershipGate::new(store.clone()));
        let images = Arc::new(MemoryImageStore::new());
        Self::with_collaborators(store, config, membership, images)
    }

    /// Create an engine over an existing store and custom collaborators
    #[must_use]
    pub fn with_collaborators(
        store: Arc<DocumentStore>,
        config: EngineConfig,
        membership: Arc<dyn MembershipGate>,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        let reconciler = ReconciliationEngine::new(store.clone(), config.clone());
        Self {
            templates: TemplateService::new(store.clone(), config),
            cloner: Cloner::new(store.clone()),
            answers: AnswerService::new(store.clone(), reconciler.clone(), images),
            approvals: ApprovalService::new(store.clone()),
            projects: ProjectService::new(store.clone(), membership),
            checklists: ChecklistService::new(store.clone()),
            reconciler,
            store,
        }
    }

    /// Template operations
    #[inline]
    #[must_use]
    pub fn templates(&self) -> &TemplateService {
        &self.templates
    }

    /// Template-to-project cloning
    #[inline]
    #[must_use]
    pub fn cloner(&self) -> &Cloner {
        &self.cloner
    }

    /// Answer store operations
    #[inline]
    #[must_use]
    pub fn answers(&self) -> &AnswerService {
        &self.answers
    }

    /// Defect reconciliation and category suggestion
    #[inline]
    #[must_use]
    pub fn reconciler(&self) -> &ReconciliationEngine {
        &self.reconciler
    }

    /// Approval state machine
    #[inline]
    #[must_use]
    pub fn approvals(&self) -> &ApprovalService {
        &self.approvals
    }

    /// Project lifecycle operations
    #[inline]
    #[must_use]
    pub fn projects(&self) -> &ProjectService {
        &self.projects
    }

    /// Checklist lifecycle operations
    #[inline]
    #[must_use]
    pub fn checklists(&self) -> &ChecklistService {
        &self.checklists
    }

    /// The shared document store (read-only consumers: export, reporting)
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }
}

impl Default for ReviewEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_shares_one_store() {
        let engine = ReviewEngine::default();
        engine.templates().seed_sample(None).unwrap();
        assert!(engine.store().has_template());
        assert!(engine.templates().get_template().is_ok());
    }
}
