//! Answer store
//!
//! Free-text keyed answer flow: one row per `(project, phase, role,
//! sub_question)`, upserted on every save. Saving anything un-submits the
//! whole role scope; submission is an explicit second step. Every save ends
//! with a reconciliation pass over the phase.

use crate::error::EngineError;
use crate::external::ImageStore;
use crate::reconcile::{ReconcileReport, ReconciliationEngine};
use chrono::{DateTime, Utc};
use qrw_model::{
    ActorId, AnswerKey, AnswerValue, CategoryId, CheckpointId, ImageRef, ProjectId, Role,
    Severity,
};
use qrw_store::DocumentStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One sub-question's payload in a save request
///
/// `answer` carries the wire values `"Yes"`/`"No"`; anything else marks the
/// entry invalid and it is skipped, tolerating partial client payloads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerPatch {
    /// Wire answer value; absent means null (unanswered)
    pub answer: Option<String>,
    /// Remark; absent clears to empty
    pub remark: Option<String>,
    /// Image references; absent clears to empty
    pub images: Option<Vec<ImageRef>>,
    /// Defect category to propagate onto the matching checkpoint
    pub category_id: Option<CategoryId>,
    /// Defect severity wire value (`Critical`/`Non-Critical`)
    pub severity: Option<String>,
}

/// Read view of one answer row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerView {
    /// Yes/No answer, `None` while unanswered
    pub answer: Option<AnswerValue>,
    /// Remark text
    pub remark: String,
    /// Attached image references
    pub images: Vec<ImageRef>,
    /// Who answered
    pub answered_by: Option<ActorId>,
    /// Last edit time
    pub answered_at: DateTime<Utc>,
    /// Whether the row is currently submitted
    pub is_submitted: bool,
}

/// Outcome of a save call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    /// Rows upserted
    pub saved: usize,
    /// Entries skipped for invalid answer values
    pub skipped: usize,
    /// The reconciliation pass that followed the save
    pub reconciliation: ReconcileReport,
}

/// Submission state of one `(project, phase, role)` scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionStatus {
    /// True when ANY row in the scope is submitted (existing behavior kept:
    /// this is deliberately not "all rows submitted")
    pub is_submitted: bool,
    /// Rows in the scope
    pub answer_count: usize,
    /// Latest submission time among submitted rows
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Answer CRUD plus the submission flags
#[derive(Debug, Clone)]
pub struct AnswerService {
    store: Arc<DocumentStore>,
    reconciler: ReconciliationEngine,
    images: Arc<dyn ImageStore>,
}

impl AnswerService {
    /// Create the service over the shared store
    #[must_use]
    pub fn new(
        store: Arc<DocumentStore>,
        reconciler: ReconciliationEngine,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            store,
            reconciler,
            images,
        }
    }

    /// Answers of one role for a phase, keyed by sub-question
    ///
    /// # Errors
    /// `InvalidArgument` for phase 0, `NotFound` for a missing project.
    pub fn get_answers(
        &self,
        project_id: ProjectId,
        phase: u8,
        role: Role,
    ) -> Result<BTreeMap<String, AnswerView>, EngineError> {
        self.check_scope(project_id, phase)?;
        let rows = self.store.answers_for_phase(project_id, phase, Some(role));
        Ok(rows
            .into_iter()
            .map(|a| {
                (
                    a.sub_question,
                    AnswerView {
                        answer: a.answer,
                        remark: a.remark,
                        images: a.images,
                        answered_by: a.answered_by,
                        answered_at: a.answered_at,
                        is_submitted: a.is_submitted,
                    },
                )
            })
            .collect())
    }

    /// Save a batch of answers for one role
    ///
    /// Side effects in order: the whole role scope is un-submitted, each
    /// valid entry is upserted (stamping the checkpoint join id), category
    /// and severity ride along onto the matching checkpoint best-effort, and
    /// the phase is reconciled.
    ///
    /// # Errors
    /// `InvalidArgument` for phase 0, `NotFound` for a missing project.
    /// Invalid answer values never error; those entries are skipped.
    pub fn save_answers(
        &self,
        project_id: ProjectId,
        phase: u8,
        role: Role,
        answers: &BTreeMap<String, AnswerPatch>,
        actor: Option<ActorId>,
    ) -> Result<SaveReport, EngineError> {
        self.check_scope(project_id, phase)?;
        tracing::debug!(%project_id, phase, %role, entries = answers.len(), "saving answers");

        // Any save re-opens the scope for editing
        self.store
            .update_answers_in_scope(project_id, phase, Some(role), |a| a.is_submitted = false);

        let mut saved = 0usize;
        let mut skipped = 0usize;

        for (sub_question, patch) in answers {
            let sub_question = sub_question.trim();
            if sub_question.is_empty() {
                skipped += 1;
                continue;
            }
            let parsed = match &patch.answer {
                None => None,
                Some(value) => match AnswerValue::parse(value) {
                    Some(parsed) => Some(parsed),
                    None => {
                        skipped += 1;
                        continue;
                    }
                },
            };

            let key = AnswerKey::new(project_id, phase, role, sub_question);
            let checkpoint_id = self.resolve_checkpoint(&key);
            let now = Utc::now();
            self.store.upsert_answer(key, |a| {
                a.answer = parsed;
                a.remark = patch.remark.clone().unwrap_or_default();
                a.images = patch.images.clone().unwrap_or_default();
                a.answered_by = actor;
                a.answered_at = now;
                a.is_submitted = false;
                if a.checkpoint_id.is_none() {
                    a.checkpoint_id = checkpoint_id;
                }
            });
            saved += 1;

            self.propagate_defect_fields(checkpoint_id, patch);
        }

        let reconciliation = self.reconciler.reconcile_phase(project_id, phase);
        tracing::info!(%project_id, phase, %role, saved, skipped, "answers saved");
        Ok(SaveReport {
            saved,
            skipped,
            reconciliation,
        })
    }

    /// Mark every answer in the scope as submitted
    ///
    /// Completeness is not validated: a phase may be submitted with
    /// unanswered questions.
    ///
    /// # Errors
    /// `InvalidArgument` for phase 0, `NotFound` for a missing project.
    pub fn submit(
        &self,
        project_id: ProjectId,
        phase: u8,
        role: Role,
    ) -> Result<usize, EngineError> {
        self.check_scope(project_id, phase)?;
        let now = Utc::now();
        let updated = self
            .store
            .update_answers_in_scope(project_id, phase, Some(role), |a| {
                a.is_submitted = true;
                a.submitted_at = Some(now);
            });
        tracing::info!(%project_id, phase, %role, updated, "answers submitted");
        Ok(updated)
    }

    /// Submission state of the scope
    ///
    /// # Errors
    /// `InvalidArgument` for phase 0, `NotFound` for a missing project.
    pub fn submission_status(
        &self,
        project_id: ProjectId,
        phase: u8,
        role: Role,
    ) -> Result<SubmissionStatus, EngineError> {
        self.check_scope(project_id, phase)?;
        let rows = self.store.answers_for_phase(project_id, phase, Some(role));
        let submitted_at = rows
            .iter()
            .filter(|a| a.is_submitted)
            .filter_map(|a| a.submitted_at)
            .max();
        Ok(SubmissionStatus {
            is_submitted: rows.iter().any(|a| a.is_submitted),
            answer_count: rows.len(),
            submitted_at,
        })
    }

    /// Store an image through the blob collaborator and attach its reference
    /// to the answer row, creating the row when needed. Counts as an edit:
    /// the role scope is un-submitted.
    ///
    /// # Errors
    /// `InvalidArgument` for phase 0 or an empty question, `NotFound` for a
    /// missing project, plus whatever the blob store surfaces.
    pub async fn attach_image(
        &self,
        project_id: ProjectId,
        phase: u8,
        role: Role,
        sub_question: &str,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
        actor: Option<ActorId>,
    ) -> Result<ImageRef, EngineError> {
        self.check_scope(project_id, phase)?;
        let sub_question = sub_question.trim();
        if sub_question.is_empty() {
            return Err(EngineError::InvalidArgument("sub_question is required".to_string()));
        }

        let reference = self
            .images
            .put(sub_question, bytes, filename, content_type)
            .await?;

        self.store
            .update_answers_in_scope(project_id, phase, Some(role), |a| a.is_submitted = false);

        let key = AnswerKey::new(project_id, phase, role, sub_question);
        let checkpoint_id = self.resolve_checkpoint(&key);
        let now = Utc::now();
        self.store.upsert_answer(key, |a| {
            a.images.push(reference.clone());
            a.answered_by = actor;
            a.answered_at = now;
            a.is_submitted = false;
            if a.checkpoint_id.is_none() {
                a.checkpoint_id = checkpoint_id;
            }
        });
        tracing::debug!(%project_id, phase, %role, %reference, "image attached");
        Ok(reference)
    }

    /// Resolve the stable checkpoint join for an answer key: the stamp
    /// already on the row, else the first checkpoint with matching question
    /// text in the phase.
    fn resolve_checkpoint(&self, key: &AnswerKey) -> Option<CheckpointId> {
        if let Some(existing) = self.store.answer(key).and_then(|a| a.checkpoint_id) {
            return Some(existing);
        }
        self.store
            .find_checkpoint_by_question(key.project_id, key.phase, &key.sub_question)
            .map(|cp| cp.id)
    }

    /// Best-effort propagation of category/severity from a save entry onto
    /// the matching checkpoint's defect state. Failures are logged, never
    /// surfaced: the answer save must not fail on checkpoint drift.
    fn propagate_defect_fields(&self, checkpoint_id: Option<CheckpointId>, patch: &AnswerPatch) {
        let severity = patch.severity.as_deref().and_then(Severity::parse);
        if patch.category_id.is_none() && severity.is_none() {
            return;
        }
        let Some(checkpoint_id) = checkpoint_id else {
            tracing::debug!("no checkpoint matched; category propagation skipped");
            return;
        };
        let result = self.store.update_checkpoint(checkpoint_id, |cp| {
            if let Some(category) = patch.category_id {
                cp.defect.category_id = Some(category);
            }
            if let Some(severity) = severity {
                cp.defect.severity = Some(severity);
            }
        });
        if let Err(err) = result {
            tracing::warn!(checkpoint = %checkpoint_id, %err, "defect field propagation failed");
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
    use crate::config::EngineConfig;
    use crate::external::MemoryImageStore;
    use pretty_assertions::assert_eq;
    use qrw_model::{Checklist, Checkpoint, Project, Stage};

    fn service() -> (Arc<DocumentStore>, AnswerService) {
        let store = Arc::new(DocumentStore::new());
        let reconciler = ReconciliationEngine::new(store.clone(), EngineConfig::default());
        let service = AnswerService::new(store.clone(), reconciler, Arc::new(MemoryImageStore::new()));
        (store, service)
    }

    fn seed_project(store: &DocumentStore) -> ProjectId {
        let project = Project::new("P-1", "Test", None);
        let id = project.id;
        store.insert_project(project);
        id
    }

    fn seed_checkpoint(store: &DocumentStore, project_id: ProjectId, question: &str) -> CheckpointId {
        let stage = Stage::new(project_id, "Phase 1", "stage1".parse().unwrap(), None);
        let stage_id = stage.id;
        store.insert_stage(stage);
        let checklist = Checklist::new(stage_id, "Safety", None);
        let checklist_id = checklist.id;
        store.insert_checklist(checklist);
        let checkpoint = Checkpoint::new(checklist_id, project_id, 1, question);
        let id = checkpoint.id;
        store.insert_checkpoint(checkpoint);
        id
    }

    fn patch(answer: &str) -> AnswerPatch {
        AnswerPatch {
            answer: Some(answer.to_string()),
            ..AnswerPatch::default()
        }
    }

    #[test]
    fn save_upserts_one_row_per_question() {
        let (store, service) = service();
        let project_id = seed_project(&store);

        let mut answers = BTreeMap::new();
        answers.insert("Is area clear?".to_string(), patch("Yes"));
        service
            .save_answers(project_id, 1, Role::Executor, &answers, None)
            .unwrap();

        answers.insert("Is area clear?".to_string(), patch("No"));
        let report = service
            .save_answers(project_id, 1, Role::Executor, &answers, None)
            .unwrap();
        assert_eq!(report.saved, 1);

        let view = service.get_answers(project_id, 1, Role::Executor).unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view["Is area clear?"].answer, Some(AnswerValue::No));
    }

    #[test]
    fn invalid_answers_are_skipped_silently() {
        let (store, service) = service();
        let project_id = seed_project(&store);

        let mut answers = BTreeMap::new();
        answers.insert("q1".to_string(), patch("Yes"));
        answers.insert("q2".to_string(), patch("Maybe"));
        answers.insert("q3".to_string(), AnswerPatch::default());

        let report = service
            .save_answers(project_id, 1, Role::Executor, &answers, None)
            .unwrap();
        assert_eq!(report.saved, 2);
        assert_eq!(report.skipped, 1);

        let view = service.get_answers(project_id, 1, Role::Executor).unwrap();
        assert_eq!(view["q3"].answer, None);
        assert!(!view.contains_key("q2"));
    }

    #[test]
    fn any_save_unsubmits_the_whole_role_scope() {
        let (store, service) = service();
        let project_id = seed_project(&store);

        let mut answers = BTreeMap::new();
        answers.insert("q1".to_string(), patch("Yes"));
        answers.insert("q2".to_string(), patch("Yes"));
        service
            .save_answers(project_id, 1, Role::Executor, &answers, None)
            .unwrap();
        service.submit(project_id, 1, Role::Executor).unwrap();
        assert!(service
            .submission_status(project_id, 1, Role::Executor)
            .unwrap()
            .is_submitted);

        // Editing only q1 re-opens q2 as well
        let mut edit = BTreeMap::new();
        edit.insert("q1".to_string(), patch("No"));
        service
            .save_answers(project_id, 1, Role::Executor, &edit, None)
            .unwrap();

        let view = service.get_answers(project_id, 1, Role::Executor).unwrap();
        assert!(!view["q1"].is_submitted);
        assert!(!view["q2"].is_submitted);
        assert!(!service
            .submission_status(project_id, 1, Role::Executor)
            .unwrap()
            .is_submitted);
    }

    #[test]
    fn submission_status_means_any_not_all() {
        let (store, service) = service();
        let project_id = seed_project(&store);

        let mut answers = BTreeMap::new();
        answers.insert("q1".to_string(), patch("Yes"));
        service
            .save_answers(project_id, 1, Role::Executor, &answers, None)
            .unwrap();
        service.submit(project_id, 1, Role::Executor).unwrap();

        // New unsaved question appears via a later save of q2 only; the save
        // un-submits everything, then submitting again flags both rows
        let mut more = BTreeMap::new();
        more.insert("q2".to_string(), AnswerPatch::default());
        service
            .save_answers(project_id, 1, Role::Executor, &more, None)
            .unwrap();
        service.submit(project_id, 1, Role::Executor).unwrap();

        let status = service
            .submission_status(project_id, 1, Role::Executor)
            .unwrap();
        assert!(status.is_submitted);
        assert_eq!(status.answer_count, 2);
        assert!(status.submitted_at.is_some());
    }

    #[test]
    fn save_stamps_checkpoint_join() {
        let (store, service) = service();
        let project_id = seed_project(&store);
        let checkpoint_id = seed_checkpoint(&store, project_id, "Is area clear?");

        let mut answers = BTreeMap::new();
        answers.insert("Is area clear?".to_string(), patch("Yes"));
        service
            .save_answers(project_id, 1, Role::Executor, &answers, None)
            .unwrap();

        let key = AnswerKey::new(project_id, 1, Role::Executor, "Is area clear?");
        assert_eq!(store.answer(&key).unwrap().checkpoint_id, Some(checkpoint_id));
    }

    #[test]
    fn category_and_severity_ride_along_to_checkpoint() {
        let (store, service) = service();
        let project_id = seed_project(&store);
        let checkpoint_id = seed_checkpoint(&store, project_id, "Is area clear?");
        let category = CategoryId::new();

        let mut answers = BTreeMap::new();
        answers.insert(
            "Is area clear?".to_string(),
            AnswerPatch {
                answer: Some("No".to_string()),
                remark: Some("debris near panel".to_string()),
                category_id: Some(category),
                severity: Some("Critical".to_string()),
                ..AnswerPatch::default()
            },
        );
        service
            .save_answers(project_id, 1, Role::Executor, &answers, None)
            .unwrap();

        let cp = store.checkpoint(checkpoint_id).unwrap();
        assert_eq!(cp.defect.category_id, Some(category));
        assert_eq!(cp.defect.severity, Some(Severity::Critical));
    }

    #[test]
    fn scope_validation() {
        let (store, service) = service();
        let project_id = seed_project(&store);

        let err = service
            .save_answers(project_id, 0, Role::Executor, &BTreeMap::new(), None)
            .unwrap_err();
        assert!(err.is_invalid_argument());

        let err = service
            .get_answers(ProjectId::new(), 1, Role::Executor)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn answer_patch_deserializes_from_wire_json() {
        let patch: AnswerPatch = serde_json::from_str(
            r#"{"answer":"Yes","remark":"verified on site","images":[]}"#,
        )
        .unwrap();
        assert_eq!(patch.answer.as_deref(), Some("Yes"));
        assert_eq!(patch.remark.as_deref(), Some("verified on site"));
        assert!(patch.category_id.is_none());
    }

    #[tokio::test]
    async fn attach_image_appends_reference_and_unsubmits() {
        let (store, service) = service();
        let project_id = seed_project(&store);

        let mut answers = BTreeMap::new();
        answers.insert("q1".to_string(), patch("Yes"));
        service
            .save_answers(project_id, 1, Role::Executor, &answers, None)
            .unwrap();
        service.submit(project_id, 1, Role::Executor).unwrap();

        let reference = service
            .attach_image(
                project_id,
                1,
                Role::Executor,
                "q1",
                vec![0xFF, 0xD8],
                "defect.jpg",
                "image/jpeg",
                None,
            )
            .await
            .unwrap();

        let view = service.get_answers(project_id, 1, Role::Executor).unwrap();
        assert_eq!(view["q1"].images, vec![reference]);
        assert!(!view["q1"].is_submitted);
    }
}
