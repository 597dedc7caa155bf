//! Domain model for the hierarchical document store.
//!
//! # Responsibility
//! - Define the canonical `Document` record and its patch/view shapes.
//!
//! # Invariants
//! - Every document is identified by a stable `DocumentId`.
//! - `owner_id` is set once from the caller identity and never patched.

pub mod document;
