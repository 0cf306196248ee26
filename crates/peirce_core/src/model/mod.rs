//! Domain model for existential graphs.
//!
//! # Responsibility
//! - Define cuts, symbols, containers and identifier-free patterns.
//! - Define the editor modes that gate operations.
//!
//! # Invariants
//! - Every cut and symbol is identified by a stable `ObjectId`.
//! - Object variants are distinguished by `ObjectKind`, never by runtime type tests.

pub mod mode;
pub mod object;
pub mod pattern;
