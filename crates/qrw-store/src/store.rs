//! The in-memory document store
//!
//! Provides [`DocumentStore`]: typed collections behind `DashMap`s plus a
//! `RwLock` for the singleton template and the append-only transaction log.
//!
//! Every mutating method is atomic per document: upserts go through the
//! entry API and in-place closures, so concurrent callers never observe a
//! torn record. Multi-document sequences (cloning, cascade delete,
//! reconciliation scans) are intentionally not transactional; callers own
//! those semantics.

use crate::error::StoreError;
use dashmap::DashMap;
use parking_lot::RwLock;
use qrw_model::{
    ActorId, AnswerKey, ChecklistAnswer, ChecklistApproval, Checklist, ChecklistId,
    ChecklistTransaction, Checkpoint, CheckpointId, Membership, PhaseKey, Project, ProjectId,
    Role, Stage, StageId, Template,
};

/// Shared document store for all engine services
#[derive(Debug, Default)]
pub struct DocumentStore {
    /// Singleton template; `None` until first created
    template: RwLock<Option<Template>>,
    /// Projects by id
    projects: DashMap<ProjectId, Project>,
    /// Stages by id
    stages: DashMap<StageId, Stage>,
    /// Checklists by id
    checklists: DashMap<ChecklistId, Checklist>,
    /// Checkpoints by id
    checkpoints: DashMap<CheckpointId, Checkpoint>,
    /// Answer rows keyed by their composite uniqueness key
    answers: DashMap<AnswerKey, ChecklistAnswer>,
    /// Approval records, one per (project, phase)
    approvals: DashMap<(ProjectId, u8), ChecklistApproval>,
    /// Append-only checklist audit log
    transactions: RwLock<Vec<ChecklistTransaction>>,
    /// Membership rows keyed by (project, actor)
    memberships: DashMap<(ProjectId, ActorId), Membership>,
}

impl DocumentStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- template ---

    /// Current template, if one exists
    #[must_use]
    pub fn template(&self) -> Option<Template> {
        self.template.read().clone()
    }

    /// Whether a template has been created
    #[inline]
    #[must_use]
    pub fn has_template(&self) -> bool {
        self.template.read().is_some()
    }

    /// Replace the template wholesale
    pub fn set_template(&self, template: Template) {
        *self.template.write() = Some(template);
    }

    /// Mutate the template in place under the write lock, returning whatever
    /// the closure produces
    ///
    /// # Errors
    /// `TemplateMissing` if no template exists yet.
    pub fn update_template<R>(&self, f: impl FnOnce(&mut Template) -> R) -> Result<R, StoreError> {
        let mut guard = self.template.write();
        let template = guard.as_mut().ok_or(StoreError::TemplateMissing)?;
        Ok(f(template))
    }

    // --- projects ---

    /// Insert a project
    pub fn insert_project(&self, project: Project) {
        self.projects.insert(project.id, project);
    }

    /// Project by id
    #[must_use]
    pub fn project(&self, id: ProjectId) -> Option<Project> {
        self.projects.get(&id).map(|r| r.value().clone())
    }

    /// All projects, newest first
    #[must_use]
    pub fn projects(&self) -> Vec<Project> {
        let mut all: Vec<Project> = self.projects.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    /// Mutate a project in place
    ///
    /// # Errors
    /// `NotFound` if the project does not exist.
    pub fn update_project<F>(&self, id: ProjectId, f: F) -> Result<Project, StoreError>
    where
        F: FnOnce(&mut Project),
    {
        let mut entry = self
            .projects
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("project", id))?;
        f(entry.value_mut());
        Ok(entry.value().clone())
    }

    /// Remove a project row (cascade handled by the caller)
    pub fn remove_project(&self, id: ProjectId) -> Option<Project> {
        self.projects.remove(&id).map(|(_, p)| p)
    }

    // --- stages ---

    /// Insert a stage
    pub fn insert_stage(&self, stage: Stage) {
        self.stages.insert(stage.id, stage);
    }

    /// Stage by id
    #[must_use]
    pub fn stage(&self, id: StageId) -> Option<Stage> {
        self.stages.get(&id).map(|r| r.value().clone())
    }

    /// Mutate a stage in place
    ///
    /// # Errors
    /// `NotFound` if the stage does not exist.
    pub fn update_stage<F>(&self, id: StageId, f: F) -> Result<Stage, StoreError>
    where
        F: FnOnce(&mut Stage),
    {
        let mut entry = self
            .stages
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("stage", id))?;
        f(entry.value_mut());
        Ok(entry.value().clone())
    }

    /// Stages of a project in creation order
    #[must_use]
    pub fn stages_for_project(&self, project_id: ProjectId) -> Vec<Stage> {
        let mut stages: Vec<Stage> = self
            .stages
            .iter()
            .filter(|e| e.value().project_id == project_id)
            .map(|e| e.value().clone())
            .collect();
        stages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        stages
    }

    /// Number of stages a project owns (the clone guard reads this)
    #[must_use]
    pub fn stage_count_for_project(&self, project_id: ProjectId) -> usize {
        self.stages
            .iter()
            .filter(|e| e.value().project_id == project_id)
            .count()
    }

    /// Stage of a project matching an exact phase key
    #[must_use]
    pub fn find_stage_by_key(&self, project_id: ProjectId, key: PhaseKey) -> Option<Stage> {
        self.stages
            .iter()
            .find(|e| e.value().project_id == project_id && e.value().stage_key == key)
            .map(|e| e.value().clone())
    }

    /// Remove every stage of a project, returning how many went away
    pub fn remove_stages_for_project(&self, project_id: ProjectId) -> usize {
        let ids: Vec<StageId> = self
            .stages
            .iter()
            .filter(|e| e.value().project_id == project_id)
            .map(|e| *e.key())
            .collect();
        for id in &ids {
            self.stages.remove(id);
        }
        ids.len()
    }

    // --- checklists ---

    /// Insert a checklist
    pub fn insert_checklist(&self, checklist: Checklist) {
        self.checklists.insert(checklist.id, checklist);
    }

    /// Checklist by id
    #[must_use]
    pub fn checklist(&self, id: ChecklistId) -> Option<Checklist> {
        self.checklists.get(&id).map(|r| r.value().clone())
    }

    /// Mutate a checklist in place
    ///
    /// # Errors
    /// `NotFound` if the checklist does not exist.
    pub fn update_checklist<F>(&self, id: ChecklistId, f: F) -> Result<Checklist, StoreError>
    where
        F: FnOnce(&mut Checklist),
    {
        let mut entry = self
            .checklists
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("checklist", id))?;
        f(entry.value_mut());
        Ok(entry.value().clone())
    }

    /// Checklists of a stage in creation order
    #[must_use]
    pub fn checklists_for_stage(&self, stage_id: StageId) -> Vec<Checklist> {
        let mut lists: Vec<Checklist> = self
            .checklists
            .iter()
            .filter(|e| e.value().stage_id == stage_id)
            .map(|e| e.value().clone())
            .collect();
        lists.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        lists
    }

    /// Remove checklists belonging to any of the given stages
    pub fn remove_checklists_for_stages(&self, stage_ids: &[StageId]) -> Vec<ChecklistId> {
        let ids: Vec<ChecklistId> = self
            .checklists
            .iter()
            .filter(|e| stage_ids.contains(&e.value().stage_id))
            .map(|e| *e.key())
            .collect();
        for id in &ids {
            self.checklists.remove(id);
        }
        ids
    }

    // --- checkpoints ---

    /// Insert a checkpoint
    pub fn insert_checkpoint(&self, checkpoint: Checkpoint) {
        self.checkpoints.insert(checkpoint.id, checkpoint);
    }

    /// Checkpoint by id
    #[must_use]
    pub fn checkpoint(&self, id: CheckpointId) -> Option<Checkpoint> {
        self.checkpoints.get(&id).map(|r| r.value().clone())
    }

    /// Mutate a checkpoint in place
    ///
    /// # Errors
    /// `NotFound` if the checkpoint does not exist.
    pub fn update_checkpoint<F>(&self, id: CheckpointId, f: F) -> Result<Checkpoint, StoreError>
    where
        F: FnOnce(&mut Checkpoint),
    {
        let mut entry = self
            .checkpoints
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("checkpoint", id))?;
        f(entry.value_mut());
        Ok(entry.value().clone())
    }

    /// Checkpoints of a checklist in creation order
    #[must_use]
    pub fn checkpoints_for_checklist(&self, checklist_id: ChecklistId) -> Vec<Checkpoint> {
        let mut points: Vec<Checkpoint> = self
            .checkpoints
            .iter()
            .filter(|e| e.value().checklist_id == checklist_id)
            .map(|e| e.value().clone())
            .collect();
        points.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        points
    }

    /// All checkpoints materialized for a project phase
    #[must_use]
    pub fn checkpoints_for_phase(&self, project_id: ProjectId, phase: u8) -> Vec<Checkpoint> {
        let mut points: Vec<Checkpoint> = self
            .checkpoints
            .iter()
            .filter(|e| e.value().project_id == project_id && e.value().phase == phase)
            .map(|e| e.value().clone())
            .collect();
        points.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        points
    }

    /// First checkpoint in a phase whose question text matches exactly
    #[must_use]
    pub fn find_checkpoint_by_question(
        &self,
        project_id: ProjectId,
        phase: u8,
        question: &str,
    ) -> Option<Checkpoint> {
        self.checkpoints_for_phase(project_id, phase)
            .into_iter()
            .find(|cp| cp.question == question)
    }

    /// Remove every checkpoint of a project
    pub fn remove_checkpoints_for_project(&self, project_id: ProjectId) -> usize {
        let ids: Vec<CheckpointId> = self
            .checkpoints
            .iter()
            .filter(|e| e.value().project_id == project_id)
            .map(|e| *e.key())
            .collect();
        for id in &ids {
            self.checkpoints.remove(id);
        }
        ids.len()
    }

    // --- answers ---

    /// Upsert an answer row: inserts an unanswered row for the key when
    /// absent, then applies the mutation. Atomic for the row.
    pub fn upsert_answer<F>(&self, key: AnswerKey, f: F) -> ChecklistAnswer
    where
        F: FnOnce(&mut ChecklistAnswer),
    {
        let mut entry = self
            .answers
            .entry(key.clone())
            .or_insert_with(|| ChecklistAnswer::new(key));
        f(entry.value_mut());
        entry.value().clone()
    }

    /// Answer row by composite key
    #[must_use]
    pub fn answer(&self, key: &AnswerKey) -> Option<ChecklistAnswer> {
        self.answers.get(key).map(|r| r.value().clone())
    }

    /// Answer rows for a phase, optionally narrowed to one role
    #[must_use]
    pub fn answers_for_phase(
        &self,
        project_id: ProjectId,
        phase: u8,
        role: Option<Role>,
    ) -> Vec<ChecklistAnswer> {
        let mut rows: Vec<ChecklistAnswer> = self
            .answers
            .iter()
            .filter(|e| {
                let a = e.value();
                a.project_id == project_id
                    && a.phase == phase
                    && role.map_or(true, |r| a.role == r)
            })
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by(|a, b| a.sub_question.cmp(&b.sub_question));
        rows
    }

    /// Apply a mutation to every answer row in a `(project, phase[, role])`
    /// scope. Each row update is individually atomic. Returns rows touched.
    pub fn update_answers_in_scope<F>(
        &self,
        project_id: ProjectId,
        phase: u8,
        role: Option<Role>,
        mut f: F,
    ) -> usize
    where
        F: FnMut(&mut ChecklistAnswer),
    {
        let mut touched = 0;
        for mut entry in self.answers.iter_mut() {
            let a = entry.value_mut();
            if a.project_id == project_id && a.phase == phase && role.map_or(true, |r| a.role == r)
            {
                f(a);
                touched += 1;
            }
        }
        touched
    }

    /// Remove every answer row of a project
    pub fn remove_answers_for_project(&self, project_id: ProjectId) -> usize {
        let keys: Vec<AnswerKey> = self
            .answers
            .iter()
            .filter(|e| e.value().project_id == project_id)
            .map(|e| e.key().clone())
            .collect();
        for key in &keys {
            self.answers.remove(key);
        }
        keys.len()
    }

    // --- approvals ---

    /// Upsert the approval record for a phase. Atomic for the record.
    pub fn upsert_approval<F>(&self, project_id: ProjectId, phase: u8, f: F) -> ChecklistApproval
    where
        F: FnOnce(&mut ChecklistApproval),
    {
        let mut entry = self
            .approvals
            .entry((project_id, phase))
            .or_insert_with(|| ChecklistApproval::new(project_id, phase));
        f(entry.value_mut());
        entry.value().clone()
    }

    /// Approval record for a phase, if any
    #[must_use]
    pub fn approval(&self, project_id: ProjectId, phase: u8) -> Option<ChecklistApproval> {
        self.approvals.get(&(project_id, phase)).map(|r| r.value().clone())
    }

    /// Remove every approval record of a project
    pub fn remove_approvals_for_project(&self, project_id: ProjectId) -> usize {
        let keys: Vec<(ProjectId, u8)> = self
            .approvals
            .iter()
            .filter(|e| e.key().0 == project_id)
            .map(|e| *e.key())
            .collect();
        for key in &keys {
            self.approvals.remove(key);
        }
        keys.len()
    }

    // --- checklist transactions ---

    /// Append an audit transaction
    pub fn append_transaction(&self, transaction: ChecklistTransaction) {
        self.transactions.write().push(transaction);
    }

    /// Transactions of a checklist in append order
    #[must_use]
    pub fn transactions_for_checklist(&self, checklist_id: ChecklistId) -> Vec<ChecklistTransaction> {
        self.transactions
            .read()
            .iter()
            .filter(|t| t.checklist_id == checklist_id)
            .cloned()
            .collect()
    }

    /// Remove transactions belonging to any of the given checklists
    pub fn remove_transactions_for_checklists(&self, checklist_ids: &[ChecklistId]) -> usize {
        let mut guard = self.transactions.write();
        let before = guard.len();
        guard.retain(|t| !checklist_ids.contains(&t.checklist_id));
        before - guard.len()
    }

    // --- memberships ---

    /// Add a membership row; returns false when the assignment already exists
    pub fn add_membership(&self, membership: Membership) -> bool {
        let key = (membership.project_id, membership.actor_id);
        if self.memberships.contains_key(&key) {
            return false;
        }
        self.memberships.insert(key, membership);
        true
    }

    /// Whether an actor is assigned to a project
    #[must_use]
    pub fn is_member(&self, project_id: ProjectId, actor_id: ActorId) -> bool {
        self.memberships.contains_key(&(project_id, actor_id))
    }

    /// Remove one membership row
    pub fn remove_membership(&self, project_id: ProjectId, actor_id: ActorId) -> bool {
        self.memberships.remove(&(project_id, actor_id)).is_some()
    }

    /// Remove every membership row of a project
    pub fn remove_memberships_for_project(&self, project_id: ProjectId) -> usize {
        let keys: Vec<(ProjectId, ActorId)> = self
            .memberships
            .iter()
            .filter(|e| e.key().0 == project_id)
            .map(|e| *e.key())
            .collect();
        for key in &keys {
            self.memberships.remove(key);
        }
        keys.len()
    }
}
