//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Turn repository precondition misses into typed service errors.

pub mod person_service;
