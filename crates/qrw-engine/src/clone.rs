//! Template-to-project cloning
//!
//! The single place where template structure becomes project-owned data. One
//! stage per template phase in ascending numeric order, one checklist per
//! group, one checkpoint per template checkpoint (group-level and inside
//! every section). Template edits after cloning never reach the project.

use crate::error::EngineError;
use qrw_model::{ActorId, Checklist, Checkpoint, ProjectId, Stage, StageStatus};
use qrw_store::DocumentStore;
use std::sync::Arc;

/// Result of a clone invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneOutcome {
    /// Template was materialized into the project
    Cloned {
        /// Stages created, in phase order
        stages: usize,
        /// Checklists created
        checklists: usize,
        /// Checkpoints created
        checkpoints: usize,
    },
    /// Project already had stages; nothing was created
    Skipped {
        /// Stage count that tripped the guard
        existing_stages: usize,
    },
}

/// Materializes the template snapshot into a project
#[derive(Debug, Clone)]
pub struct Cloner {
    store: Arc<DocumentStore>,
}

impl Cloner {
    /// Create the cloner over the shared store
    #[inline]
    #[must_use]
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    /// Clone the template into a project
    ///
    /// Idempotency guard: a project that already owns at least one stage is
    /// left untouched and the call reports [`CloneOutcome::Skipped`]. The
    /// guard also blocks re-invocation after a partial clone; the sequence
    /// is not transactional and partial state is not rolled back.
    ///
    /// # Errors
    /// `NotFound` when the project or the template is missing.
    pub fn clone_template_into_project(
        &self,
        project_id: ProjectId,
        actor: Option<ActorId>,
    ) -> Result<CloneOutcome, EngineError> {
        let project = self
            .store
            .project(project_id)
            .ok_or_else(|| EngineError::NotFound(format!("project {project_id}")))?;
        let template = self
            .store
            .template()
            .ok_or_else(|| EngineError::NotFound("template".to_string()))?;

        let existing_stages = self.store.stage_count_for_project(project_id);
        if existing_stages > 0 {
            tracing::info!(
                %project_id,
                existing_stages,
                "project already has stages, skipping clone"
            );
            return Ok(CloneOutcome::Skipped { existing_stages });
        }

        let actor = actor.or(project.created_by);
        let keys = template.sorted_phase_keys();
        tracing::info!(%project_id, phases = keys.len(), "cloning template into project");

        let mut stages = 0usize;
        let mut checklists = 0usize;
        let mut checkpoints = 0usize;

        for (index, key) in keys.iter().enumerate() {
            let mut stage = Stage::new(project_id, template.display_name_for(*key), *key, actor);
            if index == 0 {
                stage.status = StageStatus::InProgress;
            }
            let stage_id = stage.id;
            self.store.insert_stage(stage);
            stages += 1;

            let phase_number = key.number();
            let groups = template.phase(*key).map(|p| p.groups.as_slice()).unwrap_or(&[]);
            for group in groups {
                let checklist = Checklist::new(stage_id, group.text.clone(), actor);
                let checklist_id = checklist.id;
                self.store.insert_checklist(checklist);
                checklists += 1;

                for template_checkpoint in group.all_checkpoints() {
                    let checkpoint = Checkpoint::new(
                        checklist_id,
                        project_id,
                        phase_number,
                        template_checkpoint.text.clone(),
                    )
                    .with_category(template_checkpoint.category_id);
                    self.store.insert_checkpoint(checkpoint);
                    checkpoints += 1;
                }
            }
        }

        tracing::info!(%project_id, stages, checklists, checkpoints, "clone completed");
        Ok(CloneOutcome::Cloned {
            stages,
            checklists,
            checkpoints,
        })
    }

    /// Best-effort backfill of template checkpoint categories onto an
    /// already-cloned project, matched by group text and question text.
    ///
    /// Never fails the caller: a missing template or vanished rows are
    /// logged and counted as zero.
    pub fn sync_checkpoint_categories(&self, project_id: ProjectId) -> usize {
        let Some(template) = self.store.template() else {
            tracing::warn!(%project_id, "no template to sync categories from");
            return 0;
        };

        let mut synced = 0usize;
        for stage in self.store.stages_for_project(project_id) {
            let Some(phase) = template.phase(stage.stage_key) else {
                continue;
            };
            for checklist in self.store.checklists_for_stage(stage.id) {
                let Some(group) = phase.groups.iter().find(|g| g.text == checklist.checklist_name)
                else {
                    continue;
                };
                for checkpoint in self.store.checkpoints_for_checklist(checklist.id) {
                    let category = group
                        .all_checkpoints()
                        .find(|tc| tc.text == checkpoint.question)
                        .and_then(|tc| tc.category_id);
                    let Some(category) = category else { continue };
                    if checkpoint.category_id == Some(category) {
                        continue;
                    }
                    match self
                        .store
                        .update_checkpoint(checkpoint.id, |cp| cp.category_id = Some(category))
                    {
                        Ok(_) => synced += 1,
                        Err(err) => {
                            tracing::warn!(%project_id, checkpoint = %checkpoint.id, %err,
                                "failed to sync checkpoint category");
                        }
                    }
                }
            }
        }
        if synced > 0 {
            tracing::info!(%project_id, synced, "checkpoint categories synced with template");
        }
        synced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::template::TemplateService;
    use qrw_model::{PhaseKey, Project};

    fn setup() -> (Arc<DocumentStore>, Cloner, TemplateService) {
        let store = Arc::new(DocumentStore::new());
        let cloner = Cloner::new(store.clone());
        let templates = TemplateService::new(store.clone(), EngineConfig::default());
        (store, cloner, templates)
    }

    fn stage(n: u8) -> PhaseKey {
        PhaseKey::from_number(n).unwrap()
    }

    #[test]
    fn clone_materializes_single_phase_template() {
        let (store, cloner, templates) = setup();
        templates.ensure_template(None, None);
        templates.add_phase("stage1", None, None).unwrap();
        let group = templates.add_group(stage(1), "Safety", None).unwrap();
        templates
            .add_checkpoint(stage(1), group.id, None, "Is area clear?", None, None)
            .unwrap();

        let project = Project::new("P-1", "Line upgrade", None);
        let project_id = project.id;
        store.insert_project(project);

        let outcome = cloner.clone_template_into_project(project_id, None).unwrap();
        assert_eq!(
            outcome,
            CloneOutcome::Cloned {
                stages: 1,
                checklists: 1,
                checkpoints: 1
            }
        );

        let stages = store.stages_for_project(project_id);
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].stage_key, stage(1));
        assert_eq!(stages[0].status, StageStatus::InProgress);

        let checklists = store.checklists_for_stage(stages[0].id);
        assert_eq!(checklists.len(), 1);
        assert_eq!(checklists[0].checklist_name, "Safety");

        let checkpoints = store.checkpoints_for_checklist(checklists[0].id);
        assert_eq!(checkpoints.len(), 1);
        assert_eq!(checkpoints[0].question, "Is area clear?");
        assert_eq!(checkpoints[0].phase, 1);
    }

    #[test]
    fn clone_is_idempotent() {
        let (store, cloner, templates) = setup();
        templates.seed_sample(None).unwrap();

        let project = Project::new("P-2", "Retrofit", None);
        let project_id = project.id;
        store.insert_project(project);

        cloner.clone_template_into_project(project_id, None).unwrap();
        let first: Vec<_> = store.stages_for_project(project_id);

        let second = cloner.clone_template_into_project(project_id, None).unwrap();
        assert_eq!(
            second,
            CloneOutcome::Skipped {
                existing_stages: first.len()
            }
        );
        assert_eq!(store.stages_for_project(project_id).len(), first.len());
    }

    #[test]
    fn clone_walks_phases_in_numeric_order_with_display_names() {
        let (store, cloner, templates) = setup();
        templates.ensure_template(None, None);
        // Added out of order; clone must walk numerically
        templates.add_phase("stage3", None, None).unwrap();
        templates.add_phase("stage1", Some("Kickoff"), None).unwrap();

        let project = Project::new("P-3", "Panel build", None);
        let project_id = project.id;
        store.insert_project(project);

        cloner.clone_template_into_project(project_id, None).unwrap();
        let stages = store.stages_for_project(project_id);
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].stage_name, "Kickoff");
        assert_eq!(stages[0].stage_key, stage(1));
        assert_eq!(stages[0].status, StageStatus::InProgress);
        assert_eq!(stages[1].stage_name, "Phase 3");
        assert_eq!(stages[1].status, StageStatus::Pending);
    }

    #[test]
    fn clone_includes_section_checkpoints() {
        let (store, cloner, templates) = setup();
        templates.ensure_template(None, None);
        templates.add_phase("stage1", None, None).unwrap();
        let group = templates.add_group(stage(1), "Wiring", None).unwrap();
        let section = templates
            .add_section(stage(1), group.id, "Cabinet", None)
            .unwrap();
        templates
            .add_checkpoint(stage(1), group.id, None, "Cable routed?", None, None)
            .unwrap();
        templates
            .add_checkpoint(stage(1), group.id, Some(section.id), "Terminals torqued?", None, None)
            .unwrap();

        let project = Project::new("P-4", "Cabinet", None);
        let project_id = project.id;
        store.insert_project(project);

        let outcome = cloner.clone_template_into_project(project_id, None).unwrap();
        assert_eq!(
            outcome,
            CloneOutcome::Cloned {
                stages: 1,
                checklists: 1,
                checkpoints: 2
            }
        );
    }

    #[test]
    fn clone_requires_template() {
        let (store, cloner, _templates) = setup();
        let project = Project::new("P-5", "No template", None);
        let project_id = project.id;
        store.insert_project(project);

        let err = cloner.clone_template_into_project(project_id, None).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn sync_backfills_categories() {
        let (store, cloner, templates) = setup();
        templates.ensure_template(None, None);
        templates.add_phase("stage1", None, None).unwrap();
        let group = templates.add_group(stage(1), "Safety", None).unwrap();
        templates
            .add_checkpoint(stage(1), group.id, None, "Is area clear?", None, None)
            .unwrap();

        let project = Project::new("P-6", "Backfill", None);
        let project_id = project.id;
        store.insert_project(project);
        cloner.clone_template_into_project(project_id, None).unwrap();

        // Category assigned in the template after cloning
        let category = qrw_model::DefectCategory::new("Housekeeping");
        let category_id = category.id;
        templates.set_defect_categories(vec![category], None).unwrap();
        let template = templates.get_template().unwrap();
        let checkpoint_id = template.phase(stage(1)).unwrap().groups[0].checkpoints[0].id;
        templates
            .update_checkpoint(
                stage(1),
                group.id,
                None,
                checkpoint_id,
                "Is area clear?",
                Some(category_id),
                None,
            )
            .unwrap();

        assert_eq!(cloner.sync_checkpoint_categories(project_id), 1);

        let stages = store.stages_for_project(project_id);
        let checklists = store.checklists_for_stage(stages[0].id);
        let checkpoints = store.checkpoints_for_checklist(checklists[0].id);
        assert_eq!(checkpoints[0].category_id, Some(category_id));
    }
}
