//! Persistence contracts and their SQLite implementation.
//!
//! # Invariants
//! - Stores return semantic errors (`NotFound`) besides transport errors.
//! - Stores never validate tree structure; `Outline::load` does.

pub mod row_repo;
