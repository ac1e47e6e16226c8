//! Template store
//!
//! Admin-facing mutations of the singleton review template: phases, checklist
//! groups, sections, checkpoints, and the defect category list. Every nested
//! entity receives a generated id at creation, so repeated calls are
//! distinguishable and deletes address exactly one node.

use crate::config::EngineConfig;
use crate::error::EngineError;
use qrw_model::{
    ActorId, CategoryId, ChecklistGroup, CheckpointId, CheckpointTemplate, DefectCategory,
    GroupId, PhaseDefinition, PhaseKey, Section, SectionId, Template,
};
use qrw_store::DocumentStore;
use std::sync::Arc;

/// Admin operations over the singleton template
#[derive(Debug, Clone)]
pub struct TemplateService {
    store: Arc<DocumentStore>,
    config: EngineConfig,
}

impl TemplateService {
    /// Create the service over the shared store
    #[inline]
    #[must_use]
    pub fn new(store: Arc<DocumentStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Fetch the template
    ///
    /// # Errors
    /// `NotFound` when no template has been created.
    pub fn get_template(&self) -> Result<Template, EngineError> {
        self.store
            .template()
            .ok_or_else(|| EngineError::NotFound("template".to_string()))
    }

    /// Create the template, or update its name if one already exists
    ///
    /// Singleton enforcement: creation against an existing template is a
    /// name update, never a second document.
    pub fn ensure_template(&self, name: Option<&str>, actor: Option<ActorId>) -> Template {
        if self.store.has_template() {
            // Existing template: no-op create, optionally rename
            let result = self.store.update_template(|t| {
                if let Some(name) = name {
                    t.name = name.trim().to_string();
                }
                t.touch(actor);
                t.clone()
            });
            if let Ok(template) = result {
                return template;
            }
        }
        let mut template =
            Template::new(name.unwrap_or(self.config.default_template_name.as_str()).trim());
        template.modified_by = actor;
        self.store.set_template(template.clone());
        tracing::info!(name = %template.name, "template created");
        template
    }

    /// Seed a fresh install with the sample template
    ///
    /// # Errors
    /// `Conflict` when a template already exists.
    pub fn seed_sample(&self, actor: Option<ActorId>) -> Result<Template, EngineError> {
        if self.store.has_template() {
            return Err(EngineError::Conflict(
                "template already exists, delete it before seeding".to_string(),
            ));
        }
        let mut template = Template::sample();
        template.modified_by = actor;
        self.store.set_template(template.clone());
        tracing::info!("sample template seeded");
        Ok(template)
    }

    /// Add an empty phase under a new `stage<N>` key
    ///
    /// # Errors
    /// `PhaseKey` for malformed keys, `Conflict` when the key already exists.
    pub fn add_phase(
        &self,
        key: &str,
        display_name: Option<&str>,
        actor: Option<ActorId>,
    ) -> Result<Template, EngineError> {
        let key: PhaseKey = key.parse()?;
        self.with_template(|t| {
            if t.phases.contains_key(&key) {
                return Err(EngineError::Conflict(format!("phase {key} already exists")));
            }
            t.phases.insert(
                key,
                PhaseDefinition {
                    display_name: display_name.map(|n| n.trim().to_string()),
                    groups: Vec::new(),
                },
            );
            t.touch(actor);
            Ok(())
        })
    }

    /// Remove a phase and its display name
    ///
    /// Already-cloned projects keep their materialized snapshot; nothing
    /// cascades.
    ///
    /// # Errors
    /// `NotFound` when the key is not present.
    pub fn delete_phase(&self, key: PhaseKey, actor: Option<ActorId>) -> Result<Template, EngineError> {
        self.with_template(|t| {
            if t.phases.shift_remove(&key).is_none() {
                return Err(EngineError::NotFound(format!("phase {key}")));
            }
            t.touch(actor);
            Ok(())
        })
    }

    /// Set a phase's human display name
    ///
    /// # Errors
    /// `NotFound` when the key is not present.
    pub fn rename_phase(
        &self,
        key: PhaseKey,
        display_name: &str,
        actor: Option<ActorId>,
    ) -> Result<Template, EngineError> {
        let display_name = non_empty(display_name, "display_name")?;
        self.with_template(|t| {
            let phase = t
                .phase_mut(key)
                .ok_or_else(|| EngineError::NotFound(format!("phase {key}")))?;
            phase.display_name = Some(display_name);
            t.touch(actor);
            Ok(())
        })
    }

    /// Add a checklist group to a phase
    ///
    /// # Errors
    /// `InvalidArgument` for empty text, `NotFound` for a missing phase.
    pub fn add_group(
        &self,
        key: PhaseKey,
        text: &str,
        actor: Option<ActorId>,
    ) -> Result<ChecklistGroup, EngineError> {
        let text = non_empty(text, "text")?;
        self.with_entity(|t| {
            let phase = t
                .phase_mut(key)
                .ok_or_else(|| EngineError::NotFound(format!("phase {key}")))?;
            let group = ChecklistGroup::new(text);
            phase.groups.push(group.clone());
            t.touch(actor);
            Ok(group)
        })
    }

    /// Rename a checklist group
    ///
    /// # Errors
    /// `NotFound` for a missing phase or group.
    pub fn update_group(
        &self,
        key: PhaseKey,
        group_id: GroupId,
        text: &str,
        actor: Option<ActorId>,
    ) -> Result<Template, EngineError> {
        let text = non_empty(text, "text")?;
        self.with_template(|t| {
            let group = find_group(t, key, group_id)?;
            group.text = text;
            t.touch(actor);
            Ok(())
        })
    }

    /// Remove a checklist group from a phase
    ///
    /// # Errors
    /// `NotFound` for a missing phase or group.
    pub fn delete_group(
        &self,
        key: PhaseKey,
        group_id: GroupId,
        actor: Option<ActorId>,
    ) -> Result<Template, EngineError> {
        self.with_template(|t| {
            let phase = t
                .phase_mut(key)
                .ok_or_else(|| EngineError::NotFound(format!("phase {key}")))?;
            let before = phase.groups.len();
            phase.groups.retain(|g| g.id != group_id);
            if phase.groups.len() == before {
                return Err(EngineError::NotFound(format!("group {group_id}")));
            }
            t.touch(actor);
            Ok(())
        })
    }

    /// Add a section to a checklist group
    ///
    /// # Errors
    /// `NotFound` for a missing phase or group.
    pub fn add_section(
        &self,
        key: PhaseKey,
        group_id: GroupId,
        text: &str,
        actor: Option<ActorId>,
    ) -> Result<Section, EngineError> {
        let text = non_empty(text, "text")?;
        self.with_entity(|t| {
            let group = find_group(t, key, group_id)?;
            let section = Section::new(text);
            group.sections.push(section.clone());
            t.touch(actor);
            Ok(section)
        })
    }

    /// Rename a section
    ///
    /// # Errors
    /// `NotFound` for a missing phase, group, or section.
    pub fn update_section(
        &self,
        key: PhaseKey,
        group_id: GroupId,
        section_id: SectionId,
        text: &str,
        actor: Option<ActorId>,
    ) -> Result<Template, EngineError> {
        let text = non_empty(text, "text")?;
        self.with_template(|t| {
            let section = find_section(t, key, group_id, section_id)?;
            section.text = text;
            t.touch(actor);
            Ok(())
        })
    }

    /// Remove a section and its checkpoints
    ///
    /// # Errors
    /// `NotFound` for a missing phase, group, or section.
    pub fn delete_section(
        &self,
        key: PhaseKey,
        group_id: GroupId,
        section_id: SectionId,
        actor: Option<ActorId>,
    ) -> Result<Template, EngineError> {
        self.with_template(|t| {
            let group = find_group(t, key, group_id)?;
            let before = group.sections.len();
            group.sections.retain(|s| s.id != section_id);
            if group.sections.len() == before {
                return Err(EngineError::NotFound(format!("section {section_id}")));
            }
            t.touch(actor);
            Ok(())
        })
    }

    /// Add a checkpoint at group level, or inside a section when one is given
    ///
    /// # Errors
    /// `InvalidArgument` for empty text, `NotFound` for missing containers.
    pub fn add_checkpoint(
        &self,
        key: PhaseKey,
        group_id: GroupId,
        section_id: Option<SectionId>,
        text: &str,
        category_id: Option<CategoryId>,
        actor: Option<ActorId>,
    ) -> Result<CheckpointTemplate, EngineError> {
        let text = non_empty(text, "question")?;
        self.with_entity(|t| {
            let checkpoints = find_checkpoint_list(t, key, group_id, section_id)?;
            let mut checkpoint = CheckpointTemplate::new(text);
            checkpoint.category_id = category_id;
            checkpoints.push(checkpoint.clone());
            t.touch(actor);
            Ok(checkpoint)
        })
    }

    /// Update a checkpoint's question text and category
    ///
    /// # Errors
    /// `NotFound` for missing containers or checkpoint.
    pub fn update_checkpoint(
        &self,
        key: PhaseKey,
        group_id: GroupId,
        section_id: Option<SectionId>,
        checkpoint_id: CheckpointId,
        text: &str,
        category_id: Option<CategoryId>,
        actor: Option<ActorId>,
    ) -> Result<Template, EngineError> {
        let text = non_empty(text, "question")?;
        self.with_template(|t| {
            let checkpoints = find_checkpoint_list(t, key, group_id, section_id)?;
            let checkpoint = checkpoints
                .iter_mut()
                .find(|c| c.id == checkpoint_id)
                .ok_or_else(|| EngineError::NotFound(format!("checkpoint {checkpoint_id}")))?;
            checkpoint.text = text;
            checkpoint.category_id = category_id;
            t.touch(actor);
            Ok(())
        })
    }

    /// Remove a checkpoint
    ///
    /// # Errors
    /// `NotFound` for missing containers or checkpoint.
    pub fn delete_checkpoint(
        &self,
        key: PhaseKey,
        group_id: GroupId,
        section_id: Option<SectionId>,
        checkpoint_id: CheckpointId,
        actor: Option<ActorId>,
    ) -> Result<Template, EngineError> {
        self.with_template(|t| {
            let checkpoints = find_checkpoint_list(t, key, group_id, section_id)?;
            let before = checkpoints.len();
            checkpoints.retain(|c| c.id != checkpoint_id);
            if checkpoints.len() == before {
                return Err(EngineError::NotFound(format!("checkpoint {checkpoint_id}")));
            }
            t.touch(actor);
            Ok(())
        })
    }

    /// Replace the defect category list wholesale
    ///
    /// # Errors
    /// `NotFound` when no template exists.
    pub fn set_defect_categories(
        &self,
        categories: Vec<DefectCategory>,
        actor: Option<ActorId>,
    ) -> Result<Template, EngineError> {
        self.with_template(|t| {
            t.defect_categories = categories;
            t.touch(actor);
            Ok(())
        })
    }

    /// Run a fallible mutation, returning the updated template
    fn with_template(
        &self,
        f: impl FnOnce(&mut Template) -> Result<(), EngineError>,
    ) -> Result<Template, EngineError> {
        self.store
            .update_template(|t| f(t).map(|()| t.clone()))
            .map_err(EngineError::from)?
    }

    /// Run a fallible mutation, returning the entity it produced
    fn with_entity<T>(
        &self,
        f: impl FnOnce(&mut Template) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        self.store.update_template(f).map_err(EngineError::from)?
    }
}

fn non_empty(value: &str, field: &str) -> Result<String, EngineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidArgument(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn find_group(
    template: &mut Template,
    key: PhaseKey,
    group_id: GroupId,
) -> Result<&mut ChecklistGroup, EngineError> {
    let phase = template
        .phase_mut(key)
        .ok_or_else(|| EngineError::NotFound(format!("phase {key}")))?;
    phase
        .groups
        .iter_mut()
        .find(|g| g.id == group_id)
        .ok_or_else(|| EngineError::NotFound(format!("group {group_id}")))
}

fn find_section(
    template: &mut Template,
    key: PhaseKey,
    group_id: GroupId,
    section_id: SectionId,
) -> Result<&mut Section, EngineError> {
    let group = find_group(template, key, group_id)?;
    group
        .sections
        .iter_mut()
        .find(|s| s.id == section_id)
        .ok_or_else(|| EngineError::NotFound(format!("section {section_id}")))
}

fn find_checkpoint_list(
    template: &mut Template,
    key: PhaseKey,
    group_id: GroupId,
    section_id: Option<SectionId>,
) -> Result<&mut Vec<CheckpointTemplate>, EngineError> {
    match section_id {
        Some(section_id) => {
            Ok(&mut find_section(template, key, group_id, section_id)?.checkpoints)
        }
        None => Ok(&mut find_group(template, key, group_id)?.checkpoints),
    }
}
