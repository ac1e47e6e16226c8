//! Checklist lifecycle
//!
//! The per-checklist review loop: submit for review, approve, or request
//! changes, each appended to the audit transaction log. Separate from the
//! phase-level SDH approval, which gates stage advancement.

use crate::error::EngineError;
use qrw_model::{
    ActorId, Checklist, ChecklistId, ChecklistStatus, ChecklistTransaction, Severity, StageId,
    TransactionAction,
};
use qrw_store::DocumentStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Field updates for a checklist
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChecklistPatch {
    /// New name
    pub checklist_name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New status
    pub status: Option<ChecklistStatus>,
    /// Checklist-level defect category
    pub defect_category: Option<qrw_model::CategoryId>,
    /// Checklist-level defect severity
    pub defect_severity: Option<Severity>,
    /// Reviewer remark
    pub remark: Option<String>,
}

impl ChecklistPatch {
    fn is_empty(&self) -> bool {
        self.checklist_name.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.defect_category.is_none()
            && self.defect_severity.is_none()
            && self.remark.is_none()
    }
}

/// Checklist reads, updates, and the review-loop actions
#[derive(Debug, Clone)]
pub struct ChecklistService {
    store: Arc<DocumentStore>,
}

impl ChecklistService {
    /// Create the service over the shared store
    #[inline]
    #[must_use]
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    /// Checklists of a stage in creation order
    ///
    /// # Errors
    /// `NotFound` for a missing stage.
    pub fn list_for_stage(&self, stage_id: StageId) -> Result<Vec<Checklist>, EngineError> {
        self.store
            .stage(stage_id)
            .ok_or_else(|| EngineError::NotFound(format!("stage {stage_id}")))?;
        Ok(self.store.checklists_for_stage(stage_id))
    }

    /// Checklist by id
    ///
    /// # Errors
    /// `NotFound` for a missing checklist.
    pub fn get(&self, checklist_id: ChecklistId) -> Result<Checklist, EngineError> {
        self.store
            .checklist(checklist_id)
            .ok_or_else(|| EngineError::NotFound(format!("checklist {checklist_id}")))
    }

    /// Update checklist fields
    ///
    /// # Errors
    /// `NotFound` for a missing checklist, `InvalidArgument` for an empty
    /// patch.
    pub fn update(
        &self,
        checklist_id: ChecklistId,
        patch: ChecklistPatch,
    ) -> Result<Checklist, EngineError> {
        if patch.is_empty() {
            return Err(EngineError::InvalidArgument(
                "no valid fields provided to update".to_string(),
            ));
        }
        let checklist = self.store.update_checklist(checklist_id, |c| {
            if let Some(checklist_name) = patch.checklist_name {
                c.checklist_name = checklist_name;
            }
            if let Some(description) = patch.description {
                c.description = description;
            }
            if let Some(status) = patch.status {
                c.status = status;
            }
            if let Some(category) = patch.defect_category {
                c.defect_category = Some(category);
            }
            if let Some(severity) = patch.defect_severity {
                c.defect_severity = Some(severity);
            }
            if let Some(remark) = patch.remark {
                c.remark = remark;
            }
        })?;
        Ok(checklist)
    }

    /// Submit the checklist for review: status pending, revision bumped
    ///
    /// # Errors
    /// `NotFound` for a missing checklist.
    pub fn submit(
        &self,
        checklist_id: ChecklistId,
        actor: Option<ActorId>,
    ) -> Result<Checklist, EngineError> {
        let checklist = self.store.update_checklist(checklist_id, |c| {
            c.status = ChecklistStatus::Pending;
            c.revision_number += 1;
        })?;
        self.store.append_transaction(ChecklistTransaction::new(
            checklist_id,
            actor,
            TransactionAction::SubmittedForReview,
            format!(
                "Checklist \"{}\" was submitted for review.",
                checklist.checklist_name
            ),
        ));
        tracing::info!(checklist = %checklist_id, revision = checklist.revision_number, "checklist submitted for review");
        Ok(checklist)
    }

    /// Approve the checklist
    ///
    /// # Errors
    /// `NotFound` for a missing checklist.
    pub fn approve(
        &self,
        checklist_id: ChecklistId,
        actor: Option<ActorId>,
    ) -> Result<Checklist, EngineError> {
        let checklist = self
            .store
            .update_checklist(checklist_id, |c| c.status = ChecklistStatus::Approved)?;
        self.store.append_transaction(ChecklistTransaction::new(
            checklist_id,
            actor,
            TransactionAction::Approved,
            format!("Checklist \"{}\" was approved.", checklist.checklist_name),
        ));
        Ok(checklist)
    }

    /// Send the checklist back with requested changes
    ///
    /// # Errors
    /// `NotFound` for a missing checklist.
    pub fn request_changes(
        &self,
        checklist_id: ChecklistId,
        actor: Option<ActorId>,
        message: Option<&str>,
    ) -> Result<Checklist, EngineError> {
        let checklist = self
            .store
            .update_checklist(checklist_id, |c| c.status = ChecklistStatus::ChangesRequested)?;
        let description = message.map(str::to_string).unwrap_or_else(|| {
            format!(
                "Changes were requested for checklist \"{}\".",
                checklist.checklist_name
            )
        });
        self.store.append_transaction(ChecklistTransaction::new(
            checklist_id,
            actor,
            TransactionAction::ChangesRequested,
            description,
        ));
        Ok(checklist)
    }

    /// The checklist's audit history in append order
    ///
    /// # Errors
    /// `NotFound` for a missing checklist.
    pub fn history(
        &self,
        checklist_id: ChecklistId,
    ) -> Result<Vec<ChecklistTransaction>, EngineError> {
        self.get(checklist_id)?;
        Ok(self.store.transactions_for_checklist(checklist_id))
    }
}
