//! Project-owned records
//!
//! Everything materialized from the template at project start lives here:
//! projects, stages (phase instances), checklists, and checkpoints, plus the
//! checklist audit transactions and minimal membership rows.

use crate::answer::AnswerValue;
use crate::ids::{
    ActorId, CategoryId, ChecklistId, CheckpointId, ImageRef, ProjectId, StageId, TransactionId,
};
use crate::phase::PhaseKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Project lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Created, review not started
    Pending,
    /// Review running; template has been cloned
    InProgress,
    /// Final phase approved
    Completed,
}

/// A review project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Project identifier
    pub id: ProjectId,
    /// External project number
    pub project_no: String,
    /// Project name
    pub name: String,
    /// Free-text description
    pub description: String,
    /// Lifecycle status
    pub status: ProjectStatus,
    /// Creating actor
    pub created_by: Option<ActorId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create a pending project
    #[must_use]
    pub fn new(
        project_no: impl Into<String>,
        name: impl Into<String>,
        created_by: Option<ActorId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ProjectId::new(),
            project_no: project_no.into(),
            name: name.into(),
            description: String::new(),
            status: ProjectStatus::Pending,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// With a description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Stage lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Waiting for earlier phases
    Pending,
    /// Active phase
    InProgress,
    /// Approved and closed
    Completed,
}

/// A phase instance owned by a project, cloned from one template phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Stage identifier
    pub id: StageId,
    /// Owning project
    pub project_id: ProjectId,
    /// Human display name (custom template name or `Phase <N>`)
    pub stage_name: String,
    /// Template phase key this stage was cloned from
    pub stage_key: PhaseKey,
    /// Lifecycle status
    pub status: StageStatus,
    /// Times the phase was reopened for both roles by an SDH revert
    pub loopback_count: u32,
    /// Times the phase was sent back to the executor only
    pub conflict_count: u32,
    /// Creating actor
    pub created_by: Option<ActorId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Stage {
    /// Create a pending stage for a project phase
    #[must_use]
    pub fn new(
        project_id: ProjectId,
        stage_name: impl Into<String>,
        stage_key: PhaseKey,
        created_by: Option<ActorId>,
    ) -> Self {
        Self {
            id: StageId::new(),
            project_id,
            stage_name: stage_name.into(),
            stage_key,
            status: StageStatus::Pending,
            loopback_count: 0,
            conflict_count: 0,
            created_by,
            created_at: Utc::now(),
        }
    }
}

/// Checklist review status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistStatus {
    /// Being filled in
    Draft,
    /// Submitted for review
    Pending,
    /// Review passed
    Approved,
    /// Sent back with requested changes
    ChangesRequested,
}

/// Defect severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Blocks phase sign-off
    Critical,
    /// Recorded but non-blocking
    NonCritical,
}

impl Severity {
    /// Parse the wire values used by clients (`Critical`/`Non-Critical`)
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Critical" | "C" => Some(Self::Critical),
            "Non-Critical" | "NC" => Some(Self::NonCritical),
            _ => None,
        }
    }
}

/// A checklist instance, cloned 1:1 from a template checklist group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checklist {
    /// Checklist identifier
    pub id: ChecklistId,
    /// Owning stage
    pub stage_id: StageId,
    /// Checklist name (the template group's text)
    pub checklist_name: String,
    /// Free-text description
    pub description: String,
    /// Review status
    pub status: ChecklistStatus,
    /// Count of submit-for-review cycles
    pub revision_number: u32,
    /// Checklist-level defect category
    pub defect_category: Option<CategoryId>,
    /// Checklist-level defect severity
    pub defect_severity: Option<Severity>,
    /// Reviewer remark
    pub remark: String,
    /// Creating actor
    pub created_by: Option<ActorId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Checklist {
    /// Create a draft checklist under a stage
    #[must_use]
    pub fn new(
        stage_id: StageId,
        checklist_name: impl Into<String>,
        created_by: Option<ActorId>,
    ) -> Self {
        Self {
            id: ChecklistId::new(),
            stage_id,
            checklist_name: checklist_name.into(),
            description: String::new(),
            status: ChecklistStatus::Draft,
            revision_number: 0,
            defect_category: None,
            defect_severity: None,
            remark: String::new(),
            created_by,
            created_at: Utc::now(),
        }
    }
}

/// One role's response recorded directly on a checkpoint
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoleResponse {
    /// Yes/No answer, unanswered when `None`
    pub answer: Option<AnswerValue>,
    /// Free-text remark
    pub remark: String,
    /// Attached image references
    pub images: Vec<ImageRef>,
    /// When the role last responded
    pub responded_at: Option<DateTime<Utc>>,
}

/// Defect state derived from answer reconciliation or manual flagging
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DefectState {
    /// Whether a defect is currently detected
    pub is_detected: bool,
    /// Assigned defect category
    pub category_id: Option<CategoryId>,
    /// Assigned severity
    pub severity: Option<Severity>,
    /// When the current defect was detected
    pub detected_at: Option<DateTime<Utc>>,
    /// Monotonic count of false-to-detected transitions; never decremented,
    /// survives resolution as the durable audit record
    pub history_count: u32,
}

/// A single reviewable question instance owned by a checklist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Checkpoint identifier
    pub id: CheckpointId,
    /// Owning checklist
    pub checklist_id: ChecklistId,
    /// Owning project, denormalized at clone time
    pub project_id: ProjectId,
    /// Phase number, denormalized at clone time
    pub phase: u8,
    /// Question text
    pub question: String,
    /// Category copied from the template checkpoint
    pub category_id: Option<CategoryId>,
    /// Executor's response
    pub executor_response: RoleResponse,
    /// Reviewer's response
    pub reviewer_response: RoleResponse,
    /// Reconciled defect state
    pub defect: DefectState,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Create a checkpoint under a checklist
    #[must_use]
    pub fn new(
        checklist_id: ChecklistId,
        project_id: ProjectId,
        phase: u8,
        question: impl Into<String>,
    ) -> Self {
        Self {
            id: CheckpointId::new(),
            checklist_id,
            project_id,
            phase,
            question: question.into().trim().to_string(),
            category_id: None,
            executor_response: RoleResponse::default(),
            reviewer_response: RoleResponse::default(),
            defect: DefectState::default(),
            created_at: Utc::now(),
        }
    }

    /// With a template-assigned category
    #[inline]
    #[must_use]
    pub fn with_category(mut self, category_id: Option<CategoryId>) -> Self {
        self.category_id = category_id;
        self
    }
}

/// Checklist lifecycle actions recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionAction {
    /// Checklist submitted for review
    SubmittedForReview,
    /// Checklist approved
    Approved,
    /// Changes requested on the checklist
    ChangesRequested,
}

/// Append-only audit record of a checklist lifecycle action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistTransaction {
    /// Transaction identifier
    pub id: TransactionId,
    /// Checklist the action applies to
    pub checklist_id: ChecklistId,
    /// Acting user, if authenticated
    pub actor: Option<ActorId>,
    /// What happened
    pub action: TransactionAction,
    /// Human-readable description
    pub description: String,
    /// When it happened
    pub created_at: DateTime<Utc>,
}

impl ChecklistTransaction {
    /// Record an action against a checklist
    #[must_use]
    pub fn new(
        checklist_id: ChecklistId,
        actor: Option<ActorId>,
        action: TransactionAction,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            checklist_id,
            actor,
            action,
            description: description.into(),
            created_at: Utc::now(),
        }
    }
}

/// Minimal membership row: gates the start transition, cascade-deleted with
/// the project. Full membership CRUD lives outside the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    /// Project the actor is assigned to
    pub project_id: ProjectId,
    /// Assigned actor
    pub actor_id: ActorId,
    /// When the assignment was made
    pub added_at: DateTime<Utc>,
}

impl Membership {
    /// Assign an actor to a project
    #[must_use]
    pub fn new(project_id: ProjectId, actor_id: ActorId) -> Self {
        Self {
            project_id,
            actor_id,
            added_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_project_is_pending() {
        let p = Project::new("P-100", "Line upgrade", None);
        assert_eq!(p.status, ProjectStatus::Pending);
        assert!(p.description.is_empty());
    }

    #[test]
    fn new_stage_has_zero_counters() {
        let key: PhaseKey = "stage1".parse().unwrap();
        let s = Stage::new(ProjectId::new(), "Phase 1", key, None);
        assert_eq!(s.status, StageStatus::Pending);
        assert_eq!(s.loopback_count, 0);
        assert_eq!(s.conflict_count, 0);
    }

    #[test]
    fn new_checklist_is_draft_revision_zero() {
        let c = Checklist::new(StageId::new(), "Safety", None);
        assert_eq!(c.status, ChecklistStatus::Draft);
        assert_eq!(c.revision_number, 0);
    }

    #[test]
    fn checkpoint_trims_question() {
        let cp = Checkpoint::new(ChecklistId::new(), ProjectId::new(), 1, "  Is area clear?  ");
        assert_eq!(cp.question, "Is area clear?");
        assert!(!cp.defect.is_detected);
        assert_eq!(cp.defect.history_count, 0);
    }

    #[test]
    fn severity_parses_wire_values() {
        assert_eq!(Severity::parse("Critical"), Some(Severity::Critical));
        assert_eq!(Severity::parse("Non-Critical"), Some(Severity::NonCritical));
        assert_eq!(Severity::parse("NC"), Some(Severity::NonCritical));
        assert_eq!(Severity::parse("severe"), None);
    }
}
