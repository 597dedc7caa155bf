//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for documents.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Every listing is scoped by owner and archived flag so it is served by
//!   the `(owner_id, ...)` secondary indexes.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod document_repo;
