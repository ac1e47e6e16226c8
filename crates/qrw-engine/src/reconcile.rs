//! Defect reconciliation
//!
//! Compares executor and reviewer answers per question and derives each
//! checkpoint's defect state. Runs after every answer save; the whole pass is
//! idempotent, so redundant triggers re-derive the same state.
//!
//! The answer-to-checkpoint join prefers the stable checkpoint id stamped on
//! answer rows at save time and falls back to exact question-text equality
//! for rows that never matched a checkpoint.

use crate::categorize::{self, CategorySuggestion};
use crate::config::EngineConfig;
use crate::error::EngineError;
use chrono::Utc;
use qrw_model::{
    AnswerValue, CategoryId, ChecklistAnswer, ChecklistId, Checkpoint, CheckpointId, ProjectId,
    Role, Severity,
};
use qrw_store::DocumentStore;
use std::collections::HashMap;
use std::sync::Arc;

/// Summary of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Questions where both roles had answered
    pub questions_compared: usize,
    /// Checkpoints that transitioned to detected
    pub defects_detected: usize,
    /// Checkpoints that transitioned back to clear
    pub defects_cleared: usize,
    /// Compared questions with no matching checkpoint
    pub unmatched_questions: usize,
}

/// Historical defect statistics for one checklist
#[derive(Debug, Clone, PartialEq)]
pub struct DefectStats {
    /// Checklist the stats cover
    pub checklist_id: ChecklistId,
    /// Checkpoints in the checklist
    pub total_checkpoints: usize,
    /// Checkpoints that were ever defective (`history_count > 0`)
    pub defects_in_history: usize,
    /// Checkpoints currently detected
    pub current_defects: usize,
    /// Historical defect percentage, two decimals
    pub defect_rate: f64,
}

/// Result of comparing both roles' answer maps for a phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonReport {
    /// Whether every question's answers agree (missing answers compare as null)
    pub matched: bool,
    /// Executor answer rows in the phase
    pub executor_count: usize,
    /// Reviewer answer rows in the phase
    pub reviewer_count: usize,
}

/// Join key for grouping the two roles' rows
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum JoinKey {
    Checkpoint(CheckpointId),
    Question(String),
}

#[derive(Debug, Default)]
struct RolePair {
    executor: Option<ChecklistAnswer>,
    reviewer: Option<ChecklistAnswer>,
}

/// Derives checkpoint defect state from answer divergence
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    store: Arc<DocumentStore>,
    config: EngineConfig,
}

impl ReconciliationEngine {
    /// Create the engine over the shared store
    #[inline]
    #[must_use]
    pub fn new(store: Arc<DocumentStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Recompute defect state for every question in a phase
    ///
    /// Safe to re-run; a redundant pass derives identical state.
    pub fn reconcile_phase(&self, project_id: ProjectId, phase: u8) -> ReconcileReport {
        let rows = self.store.answers_for_phase(project_id, phase, None);
        let mut pairs: HashMap<JoinKey, RolePair> = HashMap::new();
        for row in rows {
            let key = match row.checkpoint_id {
                Some(id) => JoinKey::Checkpoint(id),
                None => JoinKey::Question(row.sub_question.clone()),
            };
            let pair = pairs.entry(key).or_default();
            match row.role {
                Role::Executor => pair.executor = Some(row),
                Role::Reviewer => pair.reviewer = Some(row),
            }
        }

        let mut report = ReconcileReport::default();
        for (key, pair) in pairs {
            let checkpoint = self.locate_checkpoint(project_id, phase, &key, &pair);
            let Some(checkpoint) = checkpoint else {
                if both_answered(&pair) {
                    report.unmatched_questions += 1;
                }
                continue;
            };

            let result = self.store.update_checkpoint(checkpoint.id, |cp| {
                mirror_responses(cp, &pair);
                if let (Some(exec), Some(rev)) = (
                    pair.executor.as_ref().and_then(|a| a.answer),
                    pair.reviewer.as_ref().and_then(|a| a.answer),
                ) {
                    let answers_match = exec == rev;
                    let was_detected = cp.defect.is_detected;
                    if answers_match {
                        cp.defect.is_detected = false;
                        cp.defect.category_id = None;
                        cp.defect.detected_at = None;
                        // history_count is the durable audit record, never reset
                    } else {
                        cp.defect.is_detected = true;
                        cp.defect.detected_at = Some(Utc::now());
                        if !was_detected {
                            cp.defect.history_count += 1;
                        }
                        if cp.defect.category_id.is_none() {
                            cp.defect.category_id = cp.category_id;
                        }
                    }
                }
            });

            match result {
                Ok(updated) => {
                    if both_answered(&pair) {
                        report.questions_compared += 1;
                        let was = checkpoint.defect.is_detected;
                        let is = updated.defect.is_detected;
                        if is && !was {
                            report.defects_detected += 1;
                        } else if was && !is {
                            report.defects_cleared += 1;
                        }
                    }
                }
                Err(err) => {
                    // Checkpoint vanished mid-scan; the pass stays best-effort
                    tracing::warn!(%project_id, phase, %err, "checkpoint update lost during reconciliation");
                }
            }
        }

        tracing::debug!(
            %project_id,
            phase,
            compared = report.questions_compared,
            detected = report.defects_detected,
            cleared = report.defects_cleared,
            "reconciliation pass finished"
        );
        report
    }

    /// Manually flag a checkpoint as defective, independent of answer match
    ///
    /// Bumps `history_count` from 0 to 1 so a manual flag is recorded even
    /// when no mismatch ever occurred.
    ///
    /// # Errors
    /// `NotFound` when the checkpoint does not exist.
    pub fn assign_defect_category(
        &self,
        checkpoint_id: CheckpointId,
        category_id: CategoryId,
        severity: Option<Severity>,
    ) -> Result<Checkpoint, EngineError> {
        let updated = self.store.update_checkpoint(checkpoint_id, |cp| {
            cp.defect.is_detected = true;
            cp.defect.category_id = Some(category_id);
            cp.defect.detected_at = Some(Utc::now());
            if let Some(severity) = severity {
                cp.defect.severity = Some(severity);
            }
            if cp.defect.history_count == 0 {
                cp.defect.history_count = 1;
            }
        })?;
        tracing::info!(checkpoint = %checkpoint_id, category = %category_id, "defect category assigned");
        Ok(updated)
    }

    /// Historical defect statistics for a checklist
    ///
    /// The rate counts checkpoints that were ever defective, so resolved
    /// defects stay visible.
    ///
    /// # Errors
    /// `NotFound` when the checklist does not exist.
    pub fn defect_stats(&self, checklist_id: ChecklistId) -> Result<DefectStats, EngineError> {
        self.store
            .checklist(checklist_id)
            .ok_or_else(|| EngineError::NotFound(format!("checklist {checklist_id}")))?;
        let checkpoints = self.store.checkpoints_for_checklist(checklist_id);
        let total = checkpoints.len();
        let ever = checkpoints.iter().filter(|cp| cp.defect.history_count > 0).count();
        let current = checkpoints.iter().filter(|cp| cp.defect.is_detected).count();
        let rate = if total > 0 {
            (ever as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
        } else {
            0.0
        };
        Ok(DefectStats {
            checklist_id,
            total_checkpoints: total,
            defects_in_history: ever,
            current_defects: current,
            defect_rate: rate,
        })
    }

    /// Compare both roles' answer maps for a phase
    ///
    /// A question missing from one role compares as null, so a lone answer
    /// counts as a mismatch.
    pub fn compare_answers(&self, project_id: ProjectId, phase: u8) -> ComparisonReport {
        let executor = self.store.answers_for_phase(project_id, phase, Some(Role::Executor));
        let reviewer = self.store.answers_for_phase(project_id, phase, Some(Role::Reviewer));

        let exec_map: HashMap<&str, Option<AnswerValue>> = executor
            .iter()
            .map(|a| (a.sub_question.as_str(), a.answer))
            .collect();
        let rev_map: HashMap<&str, Option<AnswerValue>> = reviewer
            .iter()
            .map(|a| (a.sub_question.as_str(), a.answer))
            .collect();

        let matched = exec_map
            .keys()
            .chain(rev_map.keys())
            .all(|q| exec_map.get(q).copied().flatten() == rev_map.get(q).copied().flatten());

        ComparisonReport {
            matched,
            executor_count: executor.len(),
            reviewer_count: reviewer.len(),
        }
    }

    /// Suggest a defect category for a remark from the template's keyword hints
    ///
    /// Missing template or empty category list yields an empty suggestion,
    /// not an error.
    #[must_use]
    pub fn suggest_category(&self, remark: &str) -> CategorySuggestion {
        let categories = self
            .store
            .template()
            .map(|t| t.defect_categories)
            .unwrap_or_default();
        categorize::suggest(remark, &categories, &self.config)
    }

    fn locate_checkpoint(
        &self,
        project_id: ProjectId,
        phase: u8,
        key: &JoinKey,
        pair: &RolePair,
    ) -> Option<Checkpoint> {
        match key {
            JoinKey::Checkpoint(id) => self.store.checkpoint(*id),
            JoinKey::Question(question) => {
                let found = self.store.find_checkpoint_by_question(project_id, phase, question);
                if found.is_some() && both_answered(pair) {
                    tracing::debug!(%project_id, phase, question, "joined answers to checkpoint by text");
                }
                found
            }
        }
    }
}

fn both_answered(pair: &RolePair) -> bool {
    pair.executor.as_ref().and_then(|a| a.answer).is_some()
        && pair.reviewer.as_ref().and_then(|a| a.answer).is_some()
}

fn mirror_responses(cp: &mut Checkpoint, pair: &RolePair) {
    if let Some(exec) = &pair.executor {
        cp.executor_response.answer = exec.answer;
        cp.executor_response.remark = exec.remark.clone();
        cp.executor_response.images = exec.images.clone();
        cp.executor_response.responded_at = Some(exec.answered_at);
    }
    if let Some(rev) = &pair.reviewer {
        cp.reviewer_response.answer = rev.answer;
        cp.reviewer_response.remark = rev.remark.clone();
        cp.reviewer_response.images = rev.images.clone();
        cp.reviewer_response.responded_at = Some(rev.answered_at);
    }
}
