//! Answer and approval records
//!
//! The primary answer flow is free-text keyed: one `ChecklistAnswer` row per
//! `(project, phase, role, sub_question)`, upserted on every save. Approval
//! records carry the SDH decision per `(project, phase)`.

use crate::ids::{ActorId, CheckpointId, ImageRef, ProjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Answering role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Performs the work and answers first
    Executor,
    /// Independently answers the same questions to cross-check
    Reviewer,
}

impl Role {
    /// Parse a role name, case-insensitively
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "executor" => Some(Self::Executor),
            "reviewer" => Some(Self::Reviewer),
            _ => None,
        }
    }

    /// Role name as stored
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Executor => "executor",
            Self::Reviewer => "reviewer",
        }
    }

    /// The cross-checking counterpart
    #[inline]
    #[must_use]
    pub fn other(&self) -> Self {
        match self {
            Self::Executor => Self::Reviewer,
            Self::Reviewer => Self::Executor,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Yes/No answer; unanswered questions carry `None`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnswerValue {
    /// Affirmative
    Yes,
    /// Negative
    No,
}

impl AnswerValue {
    /// Parse the wire values (`Yes`/`No`)
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Yes" => Some(Self::Yes),
            "No" => Some(Self::No),
            _ => None,
        }
    }

    /// Wire representation
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "Yes",
            Self::No => "No",
        }
    }
}

/// Composite uniqueness key for answer rows
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnswerKey {
    /// Owning project
    pub project_id: ProjectId,
    /// Phase number (1-based)
    pub phase: u8,
    /// Answering role
    pub role: Role,
    /// Question text key
    pub sub_question: String,
}

impl AnswerKey {
    /// Build a key
    #[must_use]
    pub fn new(project_id: ProjectId, phase: u8, role: Role, sub_question: impl Into<String>) -> Self {
        Self {
            project_id,
            phase,
            role,
            sub_question: sub_question.into(),
        }
    }
}

/// One role's answer to one sub-question in one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistAnswer {
    /// Owning project
    pub project_id: ProjectId,
    /// Phase number (1-based)
    pub phase: u8,
    /// Answering role
    pub role: Role,
    /// Question text key
    pub sub_question: String,
    /// Stable join to the materialized checkpoint, stamped at save time
    pub checkpoint_id: Option<CheckpointId>,
    /// Yes/No answer, `None` while unanswered
    pub answer: Option<AnswerValue>,
    /// Free-text remark
    pub remark: String,
    /// Attached image references
    pub images: Vec<ImageRef>,
    /// Who answered
    pub answered_by: Option<ActorId>,
    /// When the answer was last edited
    pub answered_at: DateTime<Utc>,
    /// Whether the role has submitted this phase since the last edit
    pub is_submitted: bool,
    /// When the role last submitted
    pub submitted_at: Option<DateTime<Utc>>,
}

impl ChecklistAnswer {
    /// Create an unanswered row for a key
    #[must_use]
    pub fn new(key: AnswerKey) -> Self {
        Self {
            project_id: key.project_id,
            phase: key.phase,
            role: key.role,
            sub_question: key.sub_question,
            checkpoint_id: None,
            answer: None,
            remark: String::new(),
            images: Vec::new(),
            answered_by: None,
            answered_at: Utc::now(),
            is_submitted: false,
            submitted_at: None,
        }
    }

    /// The row's composite key
    #[must_use]
    pub fn key(&self) -> AnswerKey {
        AnswerKey::new(self.project_id, self.phase, self.role, self.sub_question.clone())
    }
}

/// SDH decision state for one project phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting SDH decision
    Pending,
    /// Phase approved, project advanced
    Approved,
    /// Phase reopened for both roles
    Reverted,
    /// Phase sent back to the executor only
    RevertedToExecutor,
}

/// The single approval record per `(project, phase)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistApproval {
    /// Owning project
    pub project_id: ProjectId,
    /// Phase number (1-based)
    pub phase: u8,
    /// Decision state
    pub status: ApprovalStatus,
    /// When approval was last requested
    pub requested_at: DateTime<Utc>,
    /// When the SDH decided
    pub decided_at: Option<DateTime<Utc>>,
    /// Deciding actor
    pub decided_by: Option<ActorId>,
    /// Decision notes
    pub notes: String,
    /// Counter maintained by the standalone increment operation
    pub revert_count: u32,
}

impl ChecklistApproval {
    /// Create a pending approval request
    #[must_use]
    pub fn new(project_id: ProjectId, phase: u8) -> Self {
        Self {
            project_id,
            phase,
            status: ApprovalStatus::Pending,
            requested_at: Utc::now(),
            decided_at: None,
            decided_by: None,
            notes: String::new(),
            revert_count: 0,
        }
    }
}
