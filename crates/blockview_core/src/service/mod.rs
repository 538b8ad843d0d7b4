//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own transaction boundaries and cache maintenance.
//! - Keep the api layer decoupled from storage details.

pub mod av_service;
pub mod cell_mutator;
pub mod index_service;
pub mod view_renderer;
