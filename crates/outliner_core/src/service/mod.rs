//! Use-case services above the outline model.
//!
//! # Responsibility
//! - Account-level folders, tags and cascades (`account`).
//! - Outline lifecycle against a persistence collaborator
//!   (`outline_service`).

pub mod account;
pub mod outline_service;
