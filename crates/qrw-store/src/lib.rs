//! QRW Store - the abstract document store
//!
//! An in-memory, concurrency-safe implementation of the document collections
//! the workflow engine runs against: the singleton template, projects,
//! stages, checklists, checkpoints, answer rows, approval records, the
//! checklist audit log, and membership rows.
//!
//! Uniqueness constraints live in the key shapes (composite answer keys,
//! `(project, phase)` approval keys) so they hold by construction. The
//! persistence technology behind this facade is out of scope; a durable
//! engine would reimplement [`DocumentStore`] behind the same surface.

#![warn(unreachable_pub)]

pub mod error;
pub mod store;

pub use error::StoreError;
pub use store::DocumentStore;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
