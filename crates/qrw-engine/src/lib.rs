//! QRW Engine - multi-phase quality-review workflow services
//!
//! The engine behind a checklist-driven review process:
//! - A singleton, admin-editable template of phases, checklist groups,
//!   sections, and checkpoints
//! - Idempotent template-to-project cloning at project start
//! - Dual-role (executor/reviewer) answer flow with submission flags
//! - Defect reconciliation: answer divergence becomes tracked defects with a
//!   durable history counter
//! - Keyword-based defect category suggestion
//! - SDH approval state machine gating phase advancement
//!
//! # Example
//!
//! ```rust,ignore
//! use qrw_engine::{EngineConfig, ReviewEngine};
//! use qrw_engine::project::NewProject;
//!
//! # async fn example() -> Result<(), qrw_engine::EngineError> {
//! let engine = ReviewEngine::new(EngineConfig::new());
//! engine.templates().seed_sample(None)?;
//!
//! let project = engine.projects().create_project(
//!     NewProject {
//!         project_no: "P-100".into(),
//!         name: "Line upgrade".into(),
//!         description: None,
//!     },
//!     None,
//! )?;
//!
//! let member = qrw_model::ActorId::new();
//! engine.projects().add_member(project.id, member)?;
//! let (_, outcome) = engine.projects().start_project(project.id, Some(member)).await?;
//! println!("cloned: {outcome:?}");
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod answers;
pub mod approval;
pub mod categorize;
pub mod checklist;
pub mod clone;
pub mod config;
pub mod engine;
pub mod error;
pub mod external;
pub mod project;
pub mod reconcile;
pub mod template;

// Re-exports for convenience
pub use answers::{AnswerPatch, AnswerService, AnswerView, SaveReport, SubmissionStatus};
pub use approval::{ApprovalOutcome, ApprovalService};
pub use categorize::CategorySuggestion;
pub use checklist::{ChecklistPatch, ChecklistService};
pub use clone::{CloneOutcome, Cloner};
pub use config::EngineConfig;
pub use engine::ReviewEngine;
pub use error::EngineError;
pub use external::{ImageStore, MembershipGate, MemoryImageStore, StoreMembershipGate};
pub use project::{DeleteReport, NewProject, ProjectPatch, ProjectService, StagePatch};
pub use reconcile::{ComparisonReport, DefectStats, ReconcileReport, ReconciliationEngine};
pub use template::TemplateService;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the workflow engine
    pub use crate::{
        AnswerPatch, CloneOutcome, EngineConfig, EngineError, NewProject, ReviewEngine,
    };
    pub use qrw_model::{ActorId, AnswerValue, PhaseKey, ProjectId, Role};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
