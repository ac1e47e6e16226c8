//! QRW Model - domain types for the quality-review workflow engine
//!
//! Defines the shared vocabulary of the workspace:
//! - Typed ULID identifiers for every entity
//! - Validated `stage<N>` phase keys
//! - The singleton template schema (phases, groups, sections, checkpoints,
//!   defect categories)
//! - Project-owned records materialized at clone time
//! - Answer, approval, and audit-transaction records

#![warn(unreachable_pub)]

pub mod answer;
pub mod ids;
pub mod phase;
pub mod records;
pub mod template;

// Re-exports for convenience
pub use answer::{
    AnswerKey, AnswerValue, ApprovalStatus, ChecklistAnswer, ChecklistApproval, Role,
};
pub use ids::{
    ActorId, CategoryId, ChecklistId, CheckpointId, GroupId, ImageRef, ProjectId, SectionId,
    StageId, TransactionId,
};
pub use phase::{PhaseKey, PhaseKeyError, MAX_PHASE};
pub use records::{
    Checklist, ChecklistStatus, ChecklistTransaction, Checkpoint, DefectState, Membership,
    Project, ProjectStatus, RoleResponse, Severity, Stage, StageStatus, TransactionAction,
};
pub use template::{
    ChecklistGroup, CheckpointTemplate, DefectCategory, PhaseDefinition, Section, Template,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
