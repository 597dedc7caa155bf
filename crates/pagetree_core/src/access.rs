//! Access policy over documents.
//!
//! # Responsibility
//! - Decide whether a caller may read or mutate a document.
//! - Shape single-document reads into owner or public views.
//!
//! # Invariants
//! - `NotFound` is decided before ownership for every targeted operation.
//! - Published, non-archived documents are readable without identity.
//! - Every mutation requires identity; targeted mutations require ownership.

use crate::identity::{Identity, IdentityGate};
use crate::model::document::{Document, DocumentId, DocumentView, PublicDocument};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Policy-level denial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// Identity missing, or caller does not own the target.
    Unauthorized,
    /// Target document id does not resolve.
    NotFound(DocumentId),
}

impl Display for AccessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::NotFound(id) => write!(f, "document not found: {id}"),
        }
    }
}

impl Error for AccessError {}

/// Resolves identity or fails with `Unauthorized`.
pub fn require_identity(gate: &impl IdentityGate) -> Result<Identity, AccessError> {
    gate.identity().ok_or(AccessError::Unauthorized)
}

/// Authorizes a single-document read.
///
/// Rules, in order:
/// 1. Missing document -> `NotFound`.
/// 2. Published and active -> readable by anyone; owners still get the full
///    record.
/// 3. Otherwise identity is required and must match the owner.
pub fn authorize_read(
    id: DocumentId,
    document: Option<Document>,
    caller: Option<&Identity>,
) -> Result<DocumentView, AccessError> {
    let document = document.ok_or(AccessError::NotFound(id))?;
    let is_owner = caller.is_some_and(|identity| owns(identity, &document));

    if is_owner {
        return Ok(DocumentView::Owner(document));
    }
    if document.is_publicly_readable() {
        return Ok(DocumentView::Public(PublicDocument::from(&document)));
    }
    Err(AccessError::Unauthorized)
}

/// Authorizes a mutation that targets an existing document.
pub fn authorize_write(
    id: DocumentId,
    document: Option<Document>,
    caller: &Identity,
) -> Result<Document, AccessError> {
    let document = document.ok_or(AccessError::NotFound(id))?;
    if !owns(caller, &document) {
        return Err(AccessError::Unauthorized);
    }
    Ok(document)
}

/// Authorizes attaching a new document under `parent_id`.
///
/// Parents must exist and belong to the caller, so every edge the engine
/// creates stays inside one owner's forest.
pub fn authorize_parent(
    parent_id: DocumentId,
    parent: Option<Document>,
    caller: &Identity,
) -> Result<Document, AccessError> {
    authorize_write(parent_id, parent, caller)
}

fn owns(identity: &Identity, document: &Document) -> bool {
    identity.subject == document.owner_id
}

#[cfg(test)]
mod tests {
    use super::{authorize_read, authorize_write, require_identity, AccessError};
    use crate::identity::{Anonymous, Identity};
    use crate::model::document::{Document, DocumentView};

    fn doc(owner: &str) -> Document {
        Document::new(owner, "Doc", None)
    }

    #[test]
    fn missing_identity_is_unauthorized() {
        assert_eq!(require_identity(&Anonymous), Err(AccessError::Unauthorized));
    }

    #[test]
    fn not_found_wins_over_ownership() {
        let id = uuid::Uuid::new_v4();
        let stranger = Identity::new("stranger");
        assert_eq!(
            authorize_write(id, None, &stranger),
            Err(AccessError::NotFound(id))
        );
        assert_eq!(authorize_read(id, None, None), Err(AccessError::NotFound(id)));
    }

    #[test]
    fn private_document_requires_owner() {
        let document = doc("alice");
        let id = document.id;
        let bob = Identity::new("bob");
        assert_eq!(
            authorize_read(id, Some(document.clone()), Some(&bob)),
            Err(AccessError::Unauthorized)
        );
        assert_eq!(
            authorize_read(id, Some(document.clone()), None),
            Err(AccessError::Unauthorized)
        );
        let alice = Identity::new("alice");
        assert!(matches!(
            authorize_read(id, Some(document), Some(&alice)),
            Ok(DocumentView::Owner(_))
        ));
    }

    #[test]
    fn published_active_document_is_public() {
        let mut document = doc("alice");
        document.is_published = true;
        let id = document.id;
        let view = authorize_read(id, Some(document.clone()), None).unwrap();
        assert!(matches!(view, DocumentView::Public(ref public) if public.id == id));

        document.is_archived = true;
        assert_eq!(
            authorize_read(id, Some(document), None),
            Err(AccessError::Unauthorized)
        );
    }

    #[test]
    fn write_rejects_non_owner() {
        let document = doc("alice");
        let id = document.id;
        assert_eq!(
            authorize_write(id, Some(document), &Identity::new("bob")),
            Err(AccessError::Unauthorized)
        );
    }
}
