//! Typed identifiers for all QRW entities
//!
//! Every persisted record is keyed by a ULID newtype (sortable by creation
//! time). Blob references returned by the image store are opaque strings.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Ulid);

        impl $name {
            /// Generate a fresh identifier
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Project identifier
    ProjectId
);
entity_id!(
    /// Stage (phase instance) identifier
    StageId
);
entity_id!(
    /// Checklist instance identifier
    ChecklistId
);
entity_id!(
    /// Checkpoint identifier (template entry or cloned instance)
    CheckpointId
);
entity_id!(
    /// Template checklist-group identifier
    GroupId
);
entity_id!(
    /// Template section identifier
    SectionId
);
entity_id!(
    /// Defect category identifier
    CategoryId
);
entity_id!(
    /// Checklist audit transaction identifier
    TransactionId
);
entity_id!(
    /// Opaque actor identifier supplied by the identity provider
    ActorId
);

/// Reference to a stored image blob
///
/// The engine never holds image bytes; the blob store hands back a reference
/// and answer/checkpoint records keep lists of these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef(pub String);

impl ImageRef {
    /// Wrap a blob-store reference
    #[inline]
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Reference as a string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(ProjectId::new(), ProjectId::new());
        assert_ne!(CheckpointId::new(), CheckpointId::new());
    }

    #[test]
    fn ids_sort_by_creation() {
        let a = StageId::new();
        let b = StageId::new();
        assert!(a <= b);
    }

    #[test]
    fn image_ref_display() {
        let r = ImageRef::new("img/42");
        assert_eq!(r.to_string(), "img/42");
        assert_eq!(r.as_str(), "img/42");
    }
}
