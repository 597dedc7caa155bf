//! Core domain logic for the pagetree document store.
//! This crate is the single source of truth for document lifecycle and
//! tree-integrity invariants.

pub mod access;
pub mod config;
pub mod db;
pub mod identity;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod tree;

pub use access::AccessError;
pub use config::CoreConfig;
pub use identity::{Anonymous, Identity, IdentityGate};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::document::{
    filter_by_title, normalize_title, Document, DocumentId, DocumentPatch, DocumentView,
    PublicDocument, UserId, UNTITLED_TITLE,
};
pub use repo::document_repo::{
    DocumentRepoError, DocumentRepoResult, DocumentRepository, SqliteDocumentRepository,
};
pub use service::document_service::{
    DocumentService, DocumentServiceError, DocumentServiceResult,
};
pub use tree::{PropagationDirection, PropagationError, PropagationJob, PropagationStats};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
