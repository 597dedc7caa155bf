//! Identity gate contracts.
//!
//! # Responsibility
//! - Resolve the caller identity for every operation, or signal absence.
//!
//! # Invariants
//! - Resolution has no side effects.
//! - A blank subject is never treated as a present identity.

use crate::model::document::UserId;

/// Verified caller identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Stable user id issued by the identity provider.
    pub subject: UserId,
}

impl Identity {
    pub fn new(subject: impl Into<UserId>) -> Self {
        Self {
            subject: subject.into(),
        }
    }
}

/// Source of the caller identity for one request.
///
/// Authentication itself happens outside core; implementations only hand
/// over what the outer layer already verified.
pub trait IdentityGate {
    /// Returns the verified identity, or `None` for anonymous callers.
    fn identity(&self) -> Option<Identity>;
}

/// Caller without identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Anonymous;

impl IdentityGate for Anonymous {
    fn identity(&self) -> Option<Identity> {
        None
    }
}

impl IdentityGate for Identity {
    fn identity(&self) -> Option<Identity> {
        present(self)
    }
}

impl IdentityGate for Option<Identity> {
    fn identity(&self) -> Option<Identity> {
        self.as_ref().and_then(present)
    }
}

impl<G: IdentityGate + ?Sized> IdentityGate for &G {
    fn identity(&self) -> Option<Identity> {
        (**self).identity()
    }
}

fn present(identity: &Identity) -> Option<Identity> {
    if identity.subject.trim().is_empty() {
        None
    } else {
        Some(identity.clone())
    }
}
