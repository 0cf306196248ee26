//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate graph, geometry, rules and persistence into editor-level APIs.
//! - Keep host layers decoupled from storage and containment details.

pub mod editor_service;
pub mod mode_controller;
