//! Containment hierarchy.
//!
//! # Responsibility
//! - Own graph objects (`store`).
//! - Derive the containment tree from geometry (`resolver`).
//! - Capture validated selections (`subgraph`).

pub mod resolver;
pub mod store;
pub mod subgraph;
