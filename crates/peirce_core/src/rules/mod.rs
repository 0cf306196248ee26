//! Proof transformation rules.
//!
//! # Responsibility
//! - Validate and apply double-cut insertion/removal, insertion, erasure,
//!   iteration and deiteration.
//!
//! # Invariants
//! - Legality is decided on area levels: an object's area level is the level
//!   of the container it sits in, 0 for the sheet.
//! - Insertion targets odd areas, erasure removes from even areas.
//! - A rule either applies completely or returns a `RuleRejection` untouched.

pub mod engine;
pub mod error;

pub use engine::{Rule, RuleEffect, RuleEngine, RuleRequest};
pub use error::{RuleRejection, RuleResult};
