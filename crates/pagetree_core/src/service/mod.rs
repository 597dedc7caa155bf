//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate identity, access policy, repository calls and subtree
//!   propagation into the operations exposed to front ends.
//! - Keep UI/CLI layers decoupled from storage details.

pub mod document_service;
