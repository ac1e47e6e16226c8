//! Approval and phase advancement
//!
//! The SDH decision state machine per `(project, phase)`: a request opens (or
//! reopens) the record to pending; approve, revert, and revert-to-executor
//! decide it. Approval is the only phase-advance signal: the current stage
//! completes and the next materialized stage activates, or the project
//! completes when no next stage exists.
//!
//! "Next" is an exact `stage<phase+1>` key match against the project's own
//! cloned stages, never a re-derivation from the template.

use crate::error::EngineError;
use chrono::Utc;
use qrw_model::{
    ActorId, ApprovalStatus, ChecklistApproval, PhaseKey, ProjectId, ProjectStatus, Role, Stage,
    StageId, StageStatus,
};
use qrw_store::DocumentStore;
use std::sync::Arc;

/// What an approval changed
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    /// The decided approval record
    pub approval: ChecklistApproval,
    /// Stage marked completed, when one was materialized for the phase
    pub completed_stage: Option<StageId>,
    /// Next stage activated by the approval
    pub activated_stage: Option<Stage>,
    /// Whether this approval completed the whole project
    pub project_completed: bool,
}

/// SDH decisions and submission resets
#[derive(Debug, Clone)]
pub struct ApprovalService {
    store: Arc<DocumentStore>,
}

impl ApprovalService {
    /// Create the service over the shared store
    #[inline]
    #[must_use]
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    /// Open (or reopen) the phase's approval record as pending
    ///
    /// Repeatable: a fresh request after a decision returns the record to
    /// pending with a new request time.
    ///
    /// # Errors
    /// `InvalidArgument` for phase 0, `NotFound` for a missing project.
    pub fn request_approval(
        &self,
        project_id: ProjectId,
        phase: u8,
        notes: Option<&str>,
    ) -> Result<ChecklistApproval, EngineError> {
        self.check_scope(project_id, phase)?;
        let now = Utc::now();
        let record = self.store.upsert_approval(project_id, phase, |a| {
            a.status = ApprovalStatus::Pending;
            a.requested_at = now;
            a.notes = notes.unwrap_or_default().to_string();
        });
        tracing::info!(%project_id, phase, "approval requested");
        Ok(record)
    }

    /// Approve the phase and advance the project
    ///
    /// Marks the phase's stage completed, activates `stage<phase+1>` when
    /// the project materialized one, and otherwise completes the project.
    /// The next phase's answers are untouched: its checklists were already
    /// materialized at clone time.
    ///
    /// # Errors
    /// `InvalidArgument` for an out-of-range phase, `NotFound` for a missing
    /// project.
    pub fn approve(
        &self,
        project_id: ProjectId,
        phase: u8,
        actor: Option<ActorId>,
    ) -> Result<ApprovalOutcome, EngineError> {
        self.check_scope(project_id, phase)?;
        let key = PhaseKey::from_number(phase)?;
        let now = Utc::now();

        let approval = self.store.upsert_approval(project_id, phase, |a| {
            a.status = ApprovalStatus::Approved;
            a.decided_at = Some(now);
            a.decided_by = actor;
        });

        let completed_stage = match self.store.find_stage_by_key(project_id, key) {
            Some(stage) => {
                self.store
                    .update_stage(stage.id, |s| s.status = StageStatus::Completed)?;
                Some(stage.id)
            }
            None => {
                tracing::warn!(%project_id, %key, "no stage materialized for approved phase");
                None
            }
        };

        let next_stage = key
            .next()
            .and_then(|next_key| self.store.find_stage_by_key(project_id, next_key));

        let (activated_stage, project_completed) = match next_stage {
            Some(stage) => {
                let activated = self
                    .store
                    .update_stage(stage.id, |s| s.status = StageStatus::InProgress)?;
                tracing::info!(%project_id, phase, next = %activated.stage_key, "phase approved, next stage activated");
                (Some(activated), false)
            }
            None => {
                self.store.update_project(project_id, |p| {
                    p.status = ProjectStatus::Completed;
                    p.updated_at = now;
                })?;
                tracing::info!(%project_id, phase, "final phase approved, project completed");
                (None, true)
            }
        };

        Ok(ApprovalOutcome {
            approval,
            completed_stage,
            activated_stage,
            project_completed,
        })
    }

    /// Revert the phase: reopen editing for both roles
    ///
    /// Clears `is_submitted` on every answer in the phase and bumps the
    /// stage's loopback counter.
    ///
    /// # Errors
    /// `InvalidArgument` for phase 0, `NotFound` for a missing project.
    pub fn revert(
        &self,
        project_id: ProjectId,
        phase: u8,
        notes: Option<&str>,
        actor: Option<ActorId>,
    ) -> Result<ChecklistApproval, EngineError> {
        self.check_scope(project_id, phase)?;
        let now = Utc::now();
        let record = self.store.upsert_approval(project_id, phase, |a| {
            a.status = ApprovalStatus::Reverted;
            a.decided_at = Some(now);
            a.decided_by = actor;
            a.notes = notes.unwrap_or_default().to_string();
        });

        let reopened = self
            .store
            .update_answers_in_scope(project_id, phase, None, |a| a.is_submitted = false);
        self.bump_stage_counter(project_id, phase, |s| s.loopback_count += 1);
        tracing::info!(%project_id, phase, reopened, "phase reverted for both roles");
        Ok(record)
    }

    /// Send the phase back to the executor only
    ///
    /// Clears the executor's submission flags and times; the reviewer's
    /// prior submission stands, so only the executor resubmits. Bumps the
    /// stage's conflict counter. This is the executor-reviewer micro-loop,
    /// distinct from the SDH-level revert.
    ///
    /// # Errors
    /// `InvalidArgument` for phase 0, `NotFound` for a missing project.
    pub fn revert_to_executor(
        &self,
        project_id: ProjectId,
        phase: u8,
        notes: Option<&str>,
        actor: Option<ActorId>,
    ) -> Result<ChecklistApproval, EngineError> {
        self.check_scope(project_id, phase)?;
        let now = Utc::now();
        let record = self.store.upsert_approval(project_id, phase, |a| {
            a.status = ApprovalStatus::RevertedToExecutor;
            a.decided_at = Some(now);
            a.decided_by = actor;
            a.notes = notes.unwrap_or_default().to_string();
        });

        let reopened =
            self.store
                .update_answers_in_scope(project_id, phase, Some(Role::Executor), |a| {
                    a.is_submitted = false;
                    a.submitted_at = None;
                });
        self.bump_stage_counter(project_id, phase, |s| s.conflict_count += 1);
        tracing::info!(%project_id, phase, reopened, "phase reverted to executor");
        Ok(record)
    }

    /// The phase's approval record; absence is a valid state
    ///
    /// # Errors
    /// `InvalidArgument` for phase 0, `NotFound` for a missing project.
    pub fn approval_status(
        &self,
        project_id: ProjectId,
        phase: u8,
    ) -> Result<Option<ChecklistApproval>, EngineError> {
        self.check_scope(project_id, phase)?;
        Ok(self.store.approval(project_id, phase))
    }

    /// The phase's revert counter; 0 when no record exists
    ///
    /// # Errors
    /// `InvalidArgument` for phase 0, `NotFound` for a missing project.
    pub fn revert_count(&self, project_id: ProjectId, phase: u8) -> Result<u32, EngineError> {
        self.check_scope(project_id, phase)?;
        Ok(self
            .store
            .approval(project_id, phase)
            .map(|a| a.revert_count)
            .unwrap_or(0))
    }

    /// Bump the phase's revert counter
    ///
    /// Standalone counter upsert; `revert` itself leaves the counter alone.
    ///
    /// # Errors
    /// `InvalidArgument` for phase 0, `NotFound` for a missing project.
    pub fn increment_revert_count(
        &self,
        project_id: ProjectId,
        phase: u8,
    ) -> Result<ChecklistApproval, EngineError> {
        self.check_scope(project_id, phase)?;
        Ok(self
            .store
            .upsert_approval(project_id, phase, |a| a.revert_count += 1))
    }

    fn bump_stage_counter(
        &self,
        project_id: ProjectId,
        phase: u8,
        f: impl FnOnce(&mut Stage),
    ) {
        let Ok(key) = PhaseKey::from_number(phase) else {
            return;
        };
        match self.store.find_stage_by_key(project_id, key) {
            Some(stage) => {
                if let Err(err) = self.store.update_stage(stage.id, f) {
                    tracing::warn!(%project_id, phase, %err, "stage counter update failed");
                }
            }
            None => {
                tracing::warn!(%project_id, phase, "no stage materialized for reverted phase");
            }
        }
    }

    fn check_scope(&self, project_id: ProjectId, phase: u8) -> Result<(), EngineError> {
        if phase == 0 {
            return Err(EngineError::InvalidArgument("phase must be >= 1".to_string()));
        }
        if self.store.project(project_id).is_none() {
            return Err(EngineError::NotFound(format!("project {project_id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrw_model::{AnswerKey, ApprovalStatus, Project};

    fn setup() -> (Arc<DocumentStore>, ApprovalService, ProjectId) {
        let store = Arc::new(DocumentStore::new());
        let service = ApprovalService::new(store.clone());
        let project = Project::new("P-1", "Test", None);
        let project_id = project.id;
        store.insert_project(project);
        (store, service, project_id)
    }

    fn seed_stage(store: &DocumentStore, project_id: ProjectId, n: u8) -> StageId {
        let key = PhaseKey::from_number(n).unwrap();
        let stage = Stage::new(project_id, key.default_display_name(), key, None);
        let id = stage.id;
        store.insert_stage(stage);
        id
    }

    fn seed_submitted_answer(store: &DocumentStore, project_id: ProjectId, role: Role, q: &str) {
        store.upsert_answer(AnswerKey::new(project_id, 1, role, q), |a| {
            a.is_submitted = true;
            a.submitted_at = Some(Utc::now());
        });
    }

    #[test]
    fn request_is_repeatable_and_reopens() {
        let (_, service, project_id) = setup();

        let first = service.request_approval(project_id, 1, Some("ready")).unwrap();
        assert_eq!(first.status, ApprovalStatus::Pending);

        service.approve(project_id, 1, None).unwrap();
        let reopened = service.request_approval(project_id, 1, None).unwrap();
        assert_eq!(reopened.status, ApprovalStatus::Pending);
    }

    #[test]
    fn approve_with_next_stage_advances() {
        let (store, service, project_id) = setup();
        let first = seed_stage(&store, project_id, 1);
        let second = seed_stage(&store, project_id, 2);

        let outcome = service.approve(project_id, 1, None).unwrap();
        assert_eq!(outcome.completed_stage, Some(first));
        assert_eq!(outcome.activated_stage.as_ref().map(|s| s.id), Some(second));
        assert!(!outcome.project_completed);

        assert_eq!(store.stage(first).unwrap().status, StageStatus::Completed);
        assert_eq!(store.stage(second).unwrap().status, StageStatus::InProgress);
        assert_eq!(store.project(project_id).unwrap().status, ProjectStatus::Pending);
    }

    #[test]
    fn approve_final_phase_completes_project() {
        let (store, service, project_id) = setup();
        seed_stage(&store, project_id, 1);

        let outcome = service.approve(project_id, 1, None).unwrap();
        assert!(outcome.project_completed);
        assert!(outcome.activated_stage.is_none());
        assert_eq!(
            store.project(project_id).unwrap().status,
            ProjectStatus::Completed
        );
    }

    #[test]
    fn revert_reopens_both_roles_and_counts_loopback() {
        let (store, service, project_id) = setup();
        let stage_id = seed_stage(&store, project_id, 1);
        seed_submitted_answer(&store, project_id, Role::Executor, "q1");
        seed_submitted_answer(&store, project_id, Role::Reviewer, "q1");

        let record = service.revert(project_id, 1, Some("rework"), None).unwrap();
        assert_eq!(record.status, ApprovalStatus::Reverted);
        assert_eq!(record.notes, "rework");

        for role in [Role::Executor, Role::Reviewer] {
            let rows = store.answers_for_phase(project_id, 1, Some(role));
            assert!(!rows[0].is_submitted);
        }
        assert_eq!(store.stage(stage_id).unwrap().loopback_count, 1);
        assert_eq!(store.stage(stage_id).unwrap().conflict_count, 0);
    }

    #[test]
    fn revert_to_executor_preserves_reviewer_submission() {
        let (store, service, project_id) = setup();
        let stage_id = seed_stage(&store, project_id, 1);
        seed_submitted_answer(&store, project_id, Role::Executor, "q1");
        seed_submitted_answer(&store, project_id, Role::Reviewer, "q1");

        let record = service
            .revert_to_executor(project_id, 1, None, None)
            .unwrap();
        assert_eq!(record.status, ApprovalStatus::RevertedToExecutor);

        let executor = store.answers_for_phase(project_id, 1, Some(Role::Executor));
        assert!(!executor[0].is_submitted);
        assert!(executor[0].submitted_at.is_none());

        let reviewer = store.answers_for_phase(project_id, 1, Some(Role::Reviewer));
        assert!(reviewer[0].is_submitted);
        assert!(reviewer[0].submitted_at.is_some());

        assert_eq!(store.stage(stage_id).unwrap().conflict_count, 1);
        assert_eq!(store.stage(stage_id).unwrap().loopback_count, 0);
    }

    #[test]
    fn absent_approval_record_is_valid() {
        let (_, service, project_id) = setup();
        assert!(service.approval_status(project_id, 1).unwrap().is_none());
        assert_eq!(service.revert_count(project_id, 1).unwrap(), 0);
    }

    #[test]
    fn revert_count_moves_only_via_increment() {
        let (store, service, project_id) = setup();
        seed_stage(&store, project_id, 1);

        service.revert(project_id, 1, None, None).unwrap();
        assert_eq!(service.revert_count(project_id, 1).unwrap(), 0);

        service.increment_revert_count(project_id, 1).unwrap();
        service.increment_revert_count(project_id, 1).unwrap();
        assert_eq!(service.revert_count(project_id, 1).unwrap(), 2);
    }

    #[test]
    fn scope_validation() {
        let (_, service, project_id) = setup();
        assert!(service
            .approve(project_id, 0, None)
            .unwrap_err()
            .is_invalid_argument());
        assert!(service
            .approve(ProjectId::new(), 1, None)
            .unwrap_err()
            .is_not_found());
    }
}
