//! Store errors

/// Errors surfaced by the document store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Referenced document does not exist
    #[error("{collection} not found: {id}")]
    NotFound {
        /// Collection name
        collection: &'static str,
        /// Offending identifier
        id: String,
    },

    /// Singleton template has not been created yet
    #[error("template not found")]
    TemplateMissing,
}

impl StoreError {
    /// Build a `NotFound` for a collection and id
    #[inline]
    #[must_use]
    pub fn not_found(collection: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            collection,
            id: id.to_string(),
        }
    }
}
