//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate index, cache, and repository calls into note lifecycle APIs.
//! - Keep upper layers decoupled from storage and caching details.

pub mod note_manager;
