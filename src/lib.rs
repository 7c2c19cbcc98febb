//! Tabdeel Pulse operations backend.
//!
//! A JSON API over Postgres for finance approvals, service jobs, messaging,
//! tasks, announcements and user administration, plus the static SPA.

pub mod announcements;
pub mod core;
pub mod dashboard;
pub mod directory;
pub mod finance;
pub mod jobs;
pub mod llm;
pub mod main_module;
pub mod messaging;
pub mod projects;
pub mod security;
pub mod tasks;

pub use crate::core::config::AppConfig;
pub use crate::core::shared::state::AppState;
pub use crate::main_module::build_router;
