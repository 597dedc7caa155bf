//! Document use-case service.
//!
//! # Responsibility
//! - Expose create/update/archive/restore/remove and the four read
//!   projections (sidebar, trash, search, single fetch).
//! - Enforce identity and ownership before any store access that mutates.
//! - Hand subtree propagation to the background worker after the root write
//!   commits.
//!
//! # Invariants
//! - Every root-level effect is one atomic store write, applied while the
//!   connection lock is held together with its precondition checks.
//! - Propagation failures never reach the caller; they are logged by the
//!   worker.
//! - New documents only ever attach to a parent owned by the same caller.

use crate::access::{
    authorize_parent, authorize_read, authorize_write, require_identity, AccessError,
};
use crate::db::{lock, DbError, SharedConnection};
use crate::identity::IdentityGate;
use crate::model::document::{Document, DocumentId, DocumentPatch, DocumentView};
use crate::repo::document_repo::{
    DocumentRepoError, DocumentRepository, SqliteDocumentRepository,
};
use crate::tree::{
    PropagationDirection, PropagationError, PropagationJob, PropagationStats, PropagationWorker,
};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Errors from document service operations.
#[derive(Debug)]
pub enum DocumentServiceError {
    /// Identity missing, or caller does not own the target.
    Unauthorized,
    /// Referenced document id does not resolve.
    NotFound(DocumentId),
    /// Propagation worker could not be started.
    Propagation(PropagationError),
    /// Repository-level failure.
    Repo(DocumentRepoError),
}

impl Display for DocumentServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "Unauthorized"),
            Self::NotFound(id) => write!(f, "Document not found: {id}"),
            Self::Propagation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DocumentServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Propagation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AccessError> for DocumentServiceError {
    fn from(value: AccessError) -> Self {
        match value {
            AccessError::Unauthorized => Self::Unauthorized,
            AccessError::NotFound(id) => Self::NotFound(id),
        }
    }
}

impl From<DocumentRepoError> for DocumentServiceError {
    fn from(value: DocumentRepoError) -> Self {
        match value {
            DocumentRepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<DbError> for DocumentServiceError {
    fn from(value: DbError) -> Self {
        Self::Repo(DocumentRepoError::Db(value))
    }
}

impl From<PropagationError> for DocumentServiceError {
    fn from(value: PropagationError) -> Self {
        Self::Propagation(value)
    }
}

pub type DocumentServiceResult<T> = Result<T, DocumentServiceError>;

/// Document service facade over a shared connection.
///
/// Owns the propagation worker; dropping the service drains the queue and
/// stops the worker thread.
pub struct DocumentService {
    conn: SharedConnection,
    propagation: PropagationWorker,
}

impl DocumentService {
    /// Creates the service from a migrated shared connection and starts the
    /// propagation worker on it.
    pub fn new(conn: SharedConnection) -> DocumentServiceResult<Self> {
        {
            let guard = lock(&conn);
            SqliteDocumentRepository::try_new(&guard)?;
        }
        let propagation = PropagationWorker::spawn(conn.clone())?;
        Ok(Self { conn, propagation })
    }

    /// Creates a document owned by the caller and returns its id.
    ///
    /// Blank titles become `"Untitled"`. A parent, when given, must exist and
    /// belong to the caller.
    pub fn create(
        &self,
        gate: &impl IdentityGate,
        title: &str,
        parent_id: Option<DocumentId>,
    ) -> DocumentServiceResult<DocumentId> {
        let caller = require_identity(gate)?;
        let document = Document::new(caller.subject.as_str(), title, parent_id);

        let created = self.with_repo(|repo| {
            if let Some(parent_id) = parent_id {
                authorize_parent(parent_id, repo.get_document(parent_id)?, &caller)?;
            }
            Ok(repo.insert_document(&document)?)
        })?;

        info!(
            "event=document_create module=service status=ok document_id={} has_parent={}",
            created.id,
            created.parent_id.is_some()
        );
        Ok(created.id)
    }

    /// Lists the caller's active documents directly under `parent_id`
    /// (`None` = roots), newest first.
    pub fn get_sidebar(
        &self,
        gate: &impl IdentityGate,
        parent_id: Option<DocumentId>,
    ) -> DocumentServiceResult<Vec<Document>> {
        let caller = require_identity(gate)?;
        self.with_repo(|repo| Ok(repo.list_by_parent(&caller.subject, parent_id, false)?))
    }

    /// Lists the caller's archived documents, newest first.
    pub fn get_trash(&self, gate: &impl IdentityGate) -> DocumentServiceResult<Vec<Document>> {
        let caller = require_identity(gate)?;
        self.with_repo(|repo| Ok(repo.list_by_owner(&caller.subject, true)?))
    }

    /// Lists every active document of the caller, newest first.
    ///
    /// Text matching is left to the caller (see `filter_by_title`).
    pub fn get_search(&self, gate: &impl IdentityGate) -> DocumentServiceResult<Vec<Document>> {
        let caller = require_identity(gate)?;
        self.with_repo(|repo| Ok(repo.list_by_owner(&caller.subject, false)?))
    }

    /// Fetches one document, shaped by the access policy.
    pub fn get_by_id(
        &self,
        gate: &impl IdentityGate,
        id: DocumentId,
    ) -> DocumentServiceResult<DocumentView> {
        let caller = gate.identity();
        self.with_repo(|repo| Ok(authorize_read(id, repo.get_document(id)?, caller.as_ref())?))
    }

    /// Applies a partial update to an owned document.
    pub fn update(
        &self,
        gate: &impl IdentityGate,
        id: DocumentId,
        patch: DocumentPatch,
    ) -> DocumentServiceResult<Document> {
        let caller = require_identity(gate)?;
        let patch = patch.normalized();
        let updated = self.with_repo(|repo| {
            authorize_write(id, repo.get_document(id)?, &caller)?;
            Ok(repo.apply_patch(id, &patch)?)
        })?;
        info!("event=document_update module=service status=ok document_id={id}");
        Ok(updated)
    }

    /// Archives an owned document and queues archiving of its descendants.
    ///
    /// Returns once the root is archived; descendants converge afterwards.
    pub fn archive(
        &self,
        gate: &impl IdentityGate,
        id: DocumentId,
    ) -> DocumentServiceResult<Document> {
        let caller = require_identity(gate)?;
        let archived = self.with_repo(|repo| {
            authorize_write(id, repo.get_document(id)?, &caller)?;
            Ok(repo.set_archived(id, true, false)?)
        })?;

        info!("event=document_archive module=service status=ok document_id={id}");
        self.queue_propagation(&archived, PropagationDirection::Archive);
        Ok(archived)
    }

    /// Restores an owned document and queues restoring of its descendants.
    ///
    /// An archived document whose parent is still archived is promoted to a
    /// root in the same write. A parent that no longer exists keeps the link.
    pub fn restore(
        &self,
        gate: &impl IdentityGate,
        id: DocumentId,
    ) -> DocumentServiceResult<Document> {
        let caller = require_identity(gate)?;
        let restored = self.with_repo(|repo| {
            let existing = authorize_write(id, repo.get_document(id)?, &caller)?;
            // Active documents are left untouched, wherever they sit.
            let detach_parent = match existing.parent_id {
                Some(parent_id) if existing.is_archived => repo
                    .get_document(parent_id)?
                    .is_some_and(|parent| parent.is_archived),
                _ => false,
            };
            Ok(repo.set_archived(id, false, detach_parent)?)
        })?;

        info!(
            "event=document_restore module=service status=ok document_id={id} is_root={}",
            restored.is_root()
        );
        self.queue_propagation(&restored, PropagationDirection::Restore);
        Ok(restored)
    }

    /// Permanently deletes one owned document and returns its last state.
    ///
    /// Children are not touched and keep pointing at the removed id.
    pub fn remove(
        &self,
        gate: &impl IdentityGate,
        id: DocumentId,
    ) -> DocumentServiceResult<Document> {
        let caller = require_identity(gate)?;
        let removed = self.with_repo(|repo| {
            authorize_write(id, repo.get_document(id)?, &caller)?;
            Ok(repo.delete_document(id)?)
        })?;
        info!("event=document_remove module=service status=ok document_id={id}");
        Ok(removed)
    }

    /// Clears the icon of an owned document.
    pub fn remove_icon(
        &self,
        gate: &impl IdentityGate,
        id: DocumentId,
    ) -> DocumentServiceResult<Document> {
        let caller = require_identity(gate)?;
        self.with_repo(|repo| {
            authorize_write(id, repo.get_document(id)?, &caller)?;
            Ok(repo.clear_icon(id)?)
        })
    }

    /// Clears the cover image of an owned document.
    pub fn remove_cover_image(
        &self,
        gate: &impl IdentityGate,
        id: DocumentId,
    ) -> DocumentServiceResult<Document> {
        let caller = require_identity(gate)?;
        self.with_repo(|repo| {
            authorize_write(id, repo.get_document(id)?, &caller)?;
            Ok(repo.clear_cover_image(id)?)
        })
    }

    /// Re-queues propagation so descendants converge to the document's
    /// current archived state. Repairs subtrees left mixed by an interrupted
    /// walk.
    pub fn reconcile(
        &self,
        gate: &impl IdentityGate,
        id: DocumentId,
    ) -> DocumentServiceResult<Document> {
        let caller = require_identity(gate)?;
        let document =
            self.with_repo(|repo| Ok(authorize_write(id, repo.get_document(id)?, &caller)?))?;
        info!(
            "event=document_reconcile module=service status=start document_id={id} is_archived={}",
            document.is_archived
        );
        self.queue_propagation(
            &document,
            PropagationDirection::from_archived(document.is_archived),
        );
        Ok(document)
    }

    /// Blocks until queued propagation has finished or `timeout` elapses.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.propagation.wait_idle(timeout)
    }

    pub fn propagation_stats(&self) -> PropagationStats {
        self.propagation.stats()
    }

    fn with_repo<T>(
        &self,
        f: impl FnOnce(&SqliteDocumentRepository<'_>) -> DocumentServiceResult<T>,
    ) -> DocumentServiceResult<T> {
        let guard = lock(&self.conn);
        let repo = SqliteDocumentRepository::assume_ready(&guard);
        f(&repo)
    }

    fn queue_propagation(&self, root: &Document, direction: PropagationDirection) {
        let job = PropagationJob {
            root_id: root.id,
            owner_id: root.owner_id.clone(),
            direction,
        };
        if let Err(err) = self.propagation.enqueue(job) {
            // Root write is already committed; reconcile can repair later.
            error!(
                "event=subtree_propagation module=service status=error root_id={} error_code=enqueue_failed error={}",
                root.id, err
            );
        }
    }
}
