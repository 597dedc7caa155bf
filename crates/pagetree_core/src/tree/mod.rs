//! Tree integrity engine.
//!
//! # Responsibility
//! - Converge the archived flag of a document's descendants to the flag of
//!   the document itself after archive/restore.
//!
//! # Invariants
//! - Propagation runs off the caller's thread; callers never wait on it.
//! - Each descendant write is conditional on the opposite current state, so
//!   overlapping or repeated jobs converge without double-processing.
//! - Traversal follows `(owner_id, parent_id)` edges only, never crossing
//!   into another owner's documents.

mod propagation;

pub use propagation::{
    PropagationDirection, PropagationError, PropagationJob, PropagationStats, PropagationWorker,
};
