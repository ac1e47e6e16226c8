//! Project lifecycle
//!
//! Creation, the membership-gated start transition (which triggers template
//! cloning), field updates, stage accessors, membership rows, and the
//! explicit cascade delete.

use crate::clone::{CloneOutcome, Cloner};
use crate::error::EngineError;
use crate::external::MembershipGate;
use chrono::Utc;
use qrw_model::{
    ActorId, Membership, Project, ProjectId, ProjectStatus, Stage, StageId, StageStatus,
};
use qrw_store::DocumentStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Input for project creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    /// External project number
    pub project_no: String,
    /// Project name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
}

/// Field updates for a project
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectPatch {
    /// New project number
    pub project_no: Option<String>,
    /// New name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New status; the pending-to-in-progress transition is rejected here
    /// and must go through [`ProjectService::start_project`]
    pub status: Option<ProjectStatus>,
}

/// Field updates for a stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagePatch {
    /// New display name
    pub stage_name: Option<String>,
    /// New status
    pub status: Option<StageStatus>,
}

/// Rows removed by a cascade delete, per collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// Membership rows removed
    pub memberships: usize,
    /// Answer rows removed
    pub answers: usize,
    /// Approval records removed
    pub approvals: usize,
    /// Audit transactions removed
    pub transactions: usize,
    /// Checkpoints removed
    pub checkpoints: usize,
    /// Checklists removed
    pub checklists: usize,
    /// Stages removed
    pub stages: usize,
}

/// Project CRUD and the start transition
#[derive(Debug, Clone)]
pub struct ProjectService {
    store: Arc<DocumentStore>,
    membership: Arc<dyn MembershipGate>,
    cloner: Cloner,
}

impl ProjectService {
    /// Create the service over the shared store
    #[must_use]
    pub fn new(store: Arc<DocumentStore>, membership: Arc<dyn MembershipGate>) -> Self {
        let cloner = Cloner::new(store.clone());
        Self {
            store,
            membership,
            cloner,
        }
    }

    /// Create a pending project
    ///
    /// # Errors
    /// `InvalidArgument` for an empty name.
    pub fn create_project(
        &self,
        input: NewProject,
        actor: Option<ActorId>,
    ) -> Result<Project, EngineError> {
        if input.name.trim().is_empty() {
            return Err(EngineError::InvalidArgument("project name is required".to_string()));
        }
        let mut project = Project::new(input.project_no, input.name.trim(), actor);
        if let Some(description) = input.description {
            project = project.with_description(description);
        }
        self.store.insert_project(project.clone());
        tracing::info!(project = %project.id, "project created");
        Ok(project)
    }

    /// Start a pending project: the membership-gated transition to
    /// in-progress, which triggers template cloning
    ///
    /// # Errors
    /// `Unauthorized` with no actor, `Forbidden` for a non-member,
    /// `Conflict` when the project is not pending, `NotFound` for missing
    /// project or template. A clone failure after the status change leaves
    /// the project in-progress with partial stages; the stage guard blocks
    /// re-cloning (documented limitation).
    pub async fn start_project(
        &self,
        project_id: ProjectId,
        actor: Option<ActorId>,
    ) -> Result<(Project, CloneOutcome), EngineError> {
        let project = self.get_project(project_id)?;
        match project.status {
            ProjectStatus::Pending => {}
            ProjectStatus::InProgress => {
                return Err(EngineError::Conflict("project already started".to_string()));
            }
            ProjectStatus::Completed => {
                return Err(EngineError::Conflict("project already completed".to_string()));
            }
        }

        let actor_id = actor.ok_or_else(|| {
            EngineError::Unauthorized("starting a project requires an authenticated actor".to_string())
        })?;
        if !self.membership.is_member(project_id, actor_id).await {
            return Err(EngineError::Forbidden(
                "only assigned members can start this project".to_string(),
            ));
        }

        let project = self.store.update_project(project_id, |p| {
            p.status = ProjectStatus::InProgress;
            p.updated_at = Utc::now();
        })?;
        tracing::info!(%project_id, "project started");

        let outcome = self.cloner.clone_template_into_project(project_id, Some(actor_id))?;
        Ok((project, outcome))
    }

    /// Update project fields
    ///
    /// # Errors
    /// `NotFound` for a missing project, `InvalidArgument` when the patch is
    /// empty or tries to start the project through this path.
    pub fn update_project(
        &self,
        project_id: ProjectId,
        patch: ProjectPatch,
    ) -> Result<Project, EngineError> {
        if patch.project_no.is_none()
            && patch.name.is_none()
            && patch.description.is_none()
            && patch.status.is_none()
        {
            return Err(EngineError::InvalidArgument(
                "no valid fields provided to update".to_string(),
            ));
        }
        let current = self.get_project(project_id)?;
        if current.status == ProjectStatus::Pending && patch.status == Some(ProjectStatus::InProgress)
        {
            return Err(EngineError::InvalidArgument(
                "starting a project goes through the membership-gated start transition".to_string(),
            ));
        }

        let project = self.store.update_project(project_id, |p| {
            if let Some(project_no) = patch.project_no {
                p.project_no = project_no;
            }
            if let Some(name) = patch.name {
                p.name = name;
            }
            if let Some(description) = patch.description {
                p.description = description;
            }
            if let Some(status) = patch.status {
                p.status = status;
            }
            p.updated_at = Utc::now();
        })?;
        Ok(project)
    }

    /// Project by id
    ///
    /// # Errors
    /// `NotFound` for a missing project.
    pub fn get_project(&self, project_id: ProjectId) -> Result<Project, EngineError> {
        self.store
            .project(project_id)
            .ok_or_else(|| EngineError::NotFound(format!("project {project_id}")))
    }

    /// All projects, newest first
    #[must_use]
    pub fn list_projects(&self) -> Vec<Project> {
        self.store.projects()
    }

    /// The project's materialized stages in creation order
    ///
    /// # Errors
    /// `NotFound` for a missing project.
    pub fn stages_for_project(&self, project_id: ProjectId) -> Result<Vec<Stage>, EngineError> {
        self.get_project(project_id)?;
        Ok(self.store.stages_for_project(project_id))
    }

    /// Stage by id
    ///
    /// # Errors
    /// `NotFound` for a missing stage.
    pub fn get_stage(&self, stage_id: StageId) -> Result<Stage, EngineError> {
        self.store
            .stage(stage_id)
            .ok_or_else(|| EngineError::NotFound(format!("stage {stage_id}")))
    }

    /// Update stage fields
    ///
    /// # Errors
    /// `NotFound` for a missing stage, `InvalidArgument` for an empty patch.
    pub fn update_stage(&self, stage_id: StageId, patch: StagePatch) -> Result<Stage, EngineError> {
        if patch.stage_name.is_none() && patch.status.is_none() {
            return Err(EngineError::InvalidArgument(
                "no valid fields provided to update".to_string(),
            ));
        }
        let stage = self.store.update_stage(stage_id, |s| {
            if let Some(stage_name) = patch.stage_name {
                s.stage_name = stage_name;
            }
            if let Some(status) = patch.status {
                s.status = status;
            }
        })?;
        Ok(stage)
    }

    /// Assign an actor to the project
    ///
    /// # Errors
    /// `NotFound` for a missing project, `Conflict` when already assigned.
    pub fn add_member(
        &self,
        project_id: ProjectId,
        actor_id: ActorId,
    ) -> Result<Membership, EngineError> {
        self.get_project(project_id)?;
        let membership = Membership::new(project_id, actor_id);
        if !self.store.add_membership(membership.clone()) {
            return Err(EngineError::Conflict(
                "actor is already assigned to this project".to_string(),
            ));
        }
        Ok(membership)
    }

    /// Remove an actor's assignment
    ///
    /// # Errors
    /// `NotFound` when the assignment does not exist.
    pub fn remove_member(&self, project_id: ProjectId, actor_id: ActorId) -> Result<(), EngineError> {
        if !self.store.remove_membership(project_id, actor_id) {
            return Err(EngineError::NotFound("project membership".to_string()));
        }
        Ok(())
    }

    /// Delete a project and everything it owns
    ///
    /// Explicit cascade in dependency order: memberships, answers,
    /// approvals, audit transactions, checkpoints, checklists, stages, then
    /// the project row. The sequence is not transactional; a failure partway
    /// leaves partial state rather than rolling back.
    ///
    /// # Errors
    /// `NotFound` for a missing project.
    pub fn delete_project(&self, project_id: ProjectId) -> Result<DeleteReport, EngineError> {
        self.get_project(project_id)?;

        let stage_ids: Vec<StageId> = self
            .store
            .stages_for_project(project_id)
            .into_iter()
            .map(|s| s.id)
            .collect();
        let checklist_ids: Vec<_> = stage_ids
            .iter()
            .flat_map(|stage_id| self.store.checklists_for_stage(*stage_id))
            .map(|c| c.id)
            .collect();

        // Struct fields evaluate in source order, which is the dependency order
        let report = DeleteReport {
            memberships: self.store.remove_memberships_for_project(project_id),
            answers: self.store.remove_answers_for_project(project_id),
            approvals: self.store.remove_approvals_for_project(project_id),
            transactions: self.store.remove_transactions_for_checklists(&checklist_ids),
            checkpoints: self.store.remove_checkpoints_for_project(project_id),
            checklists: self.store.remove_checklists_for_stages(&stage_ids).len(),
            stages: self.store.remove_stages_for_project(project_id),
        };
        self.store.remove_project(project_id);

        tracing::info!(%project_id, ?report, "project deleted with cascade");
        Ok(report)
    }
}
