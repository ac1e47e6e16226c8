//! Template schema
//!
//! The template is the singleton, admin-editable blueprint of the review
//! process: an ordered mapping of phase keys to phase definitions, where each
//! phase holds checklist groups, optional sections, and checkpoints. Projects
//! materialize a snapshot of this structure when they start; later template
//! edits never touch already-cloned projects.

use crate::ids::{ActorId, CategoryId, CheckpointId, GroupId, SectionId};
use crate::phase::PhaseKey;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Default color assigned to new defect categories
pub const DEFAULT_CATEGORY_COLOR: &str = "#2196F3";

/// A named defect category with keyword hints for auto-suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefectCategory {
    /// Category identifier
    pub id: CategoryId,
    /// Display name
    pub name: String,
    /// Display color (hex)
    pub color: String,
    /// Keyword hints matched against defect remarks
    pub keywords: Vec<String>,
}

impl DefectCategory {
    /// Create a category with the default color and no keywords
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CategoryId::new(),
            name: name.into(),
            color: DEFAULT_CATEGORY_COLOR.to_string(),
            keywords: Vec::new(),
        }
    }

    /// With keyword hints
    #[inline]
    #[must_use]
    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    /// With a display color
    #[inline]
    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }
}

/// A single checklist question inside the template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointTemplate {
    /// Checkpoint identifier (a cloned instance gets a fresh one)
    pub id: CheckpointId,
    /// Question text
    pub text: String,
    /// Pre-assigned defect category
    pub category_id: Option<CategoryId>,
}

impl CheckpointTemplate {
    /// Create a checkpoint with trimmed question text
    #[inline]
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: CheckpointId::new(),
            text: text.into().trim().to_string(),
            category_id: None,
        }
    }

    /// With a pre-assigned category
    #[inline]
    #[must_use]
    pub fn with_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

/// Optional grouping container inside a checklist group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Section identifier
    pub id: SectionId,
    /// Section heading
    pub text: String,
    /// Checkpoints under this section
    pub checkpoints: Vec<CheckpointTemplate>,
}

impl Section {
    /// Create an empty section
    #[inline]
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: SectionId::new(),
            text: text.into().trim().to_string(),
            checkpoints: Vec::new(),
        }
    }
}

/// A checklist group: the template counterpart of a project checklist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistGroup {
    /// Group identifier
    pub id: GroupId,
    /// Group name (becomes the cloned checklist's name)
    pub text: String,
    /// Group-level checkpoints
    pub checkpoints: Vec<CheckpointTemplate>,
    /// Optional sections, each with its own checkpoints
    pub sections: Vec<Section>,
}

impl ChecklistGroup {
    /// Create an empty group
    #[inline]
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: GroupId::new(),
            text: text.into().trim().to_string(),
            checkpoints: Vec::new(),
            sections: Vec::new(),
        }
    }

    /// All checkpoints in clone order: group-level first, then each section's
    pub fn all_checkpoints(&self) -> impl Iterator<Item = &CheckpointTemplate> {
        self.checkpoints
            .iter()
            .chain(self.sections.iter().flat_map(|s| s.checkpoints.iter()))
    }

    /// Total checkpoint count including sections
    #[must_use]
    pub fn checkpoint_count(&self) -> usize {
        self.all_checkpoints().count()
    }
}

/// One phase of the template: display name plus its checklist groups
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PhaseDefinition {
    /// Custom display name; `Phase <N>` is derived when absent
    pub display_name: Option<String>,
    /// Checklist groups in this phase
    pub groups: Vec<ChecklistGroup>,
}

/// The singleton review-process template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Template name
    pub name: String,
    /// Ordered phase-key to phase-definition mapping
    pub phases: IndexMap<PhaseKey, PhaseDefinition>,
    /// Defect categories with keyword hints
    pub defect_categories: Vec<DefectCategory>,
    /// Who last modified the template
    pub modified_by: Option<ActorId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Template {
    /// Create an empty template
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            phases: IndexMap::new(),
            defect_categories: Vec::new(),
            modified_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Phase keys in ascending numeric order
    ///
    /// Keys may have been added out of order or made sparse by deletions;
    /// clone order is always numeric.
    #[must_use]
    pub fn sorted_phase_keys(&self) -> Vec<PhaseKey> {
        let mut keys: Vec<PhaseKey> = self.phases.keys().copied().collect();
        keys.sort();
        keys
    }

    /// Phase definition for a key
    #[inline]
    #[must_use]
    pub fn phase(&self, key: PhaseKey) -> Option<&PhaseDefinition> {
        self.phases.get(&key)
    }

    /// Mutable phase definition for a key
    #[inline]
    pub fn phase_mut(&mut self, key: PhaseKey) -> Option<&mut PhaseDefinition> {
        self.phases.get_mut(&key)
    }

    /// Display name for a phase: custom name or `Phase <N>`
    #[must_use]
    pub fn display_name_for(&self, key: PhaseKey) -> String {
        self.phases
            .get(&key)
            .and_then(|p| p.display_name.clone())
            .unwrap_or_else(|| key.default_display_name())
    }

    /// Look up a defect category by id
    #[must_use]
    pub fn category(&self, id: CategoryId) -> Option<&DefectCategory> {
        self.defect_categories.iter().find(|c| c.id == id)
    }

    /// Record a modification
    pub fn touch(&mut self, actor: Option<ActorId>) {
        self.modified_by = actor;
        self.updated_at = Utc::now();
    }

    /// Representative sample template used for seeding fresh installs
    #[must_use]
    pub fn sample() -> Self {
        let mut template = Template::new("Quality Review Process Template");

        let phase1 = PhaseDefinition {
            display_name: None,
            groups: vec![
                group_with(
                    "Planning & Requirements",
                    &[
                        "Project scope documented and approved",
                        "Requirements clearly defined",
                        "Timeline and budget approved",
                    ],
                ),
                group_with(
                    "Team Setup",
                    &[
                        "Team members assigned",
                        "Roles and responsibilities defined",
                        "Communication channels established",
                    ],
                ),
            ],
        };
        let phase2 = PhaseDefinition {
            display_name: None,
            groups: vec![
                group_with(
                    "Development & Testing",
                    &[
                        "Code review completed",
                        "Unit tests written and passed",
                        "Integration testing done",
                    ],
                ),
                group_with(
                    "Quality Assurance",
                    &[
                        "All bugs documented and fixed",
                        "Performance testing completed",
                        "Security review done",
                    ],
                ),
            ],
        };
        let phase3 = PhaseDefinition {
            display_name: None,
            groups: vec![
                group_with(
                    "Deployment Preparation",
                    &[
                        "Deployment plan documented",
                        "Rollback plan prepared",
                        "Production environment ready",
                    ],
                ),
                group_with(
                    "Post-Deployment",
                    &[
                        "Deployment successful",
                        "Monitoring and logging active",
                        "User documentation complete",
                    ],
                ),
            ],
        };

        template
            .phases
            .insert(PhaseKey::from_number(1).expect("valid phase"), phase1);
        template
            .phases
            .insert(PhaseKey::from_number(2).expect("valid phase"), phase2);
        template
            .phases
            .insert(PhaseKey::from_number(3).expect("valid phase"), phase3);
        template
    }
}

fn group_with(name: &str, questions: &[&str]) -> ChecklistGroup {
    let mut group = ChecklistGroup::new(name);
    group.checkpoints = questions.iter().map(|q| CheckpointTemplate::new(*q)).collect();
    group
}
