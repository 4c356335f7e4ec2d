//! Shared test fixtures for the tessera workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`fixtures`]: sample configurations, components and registrations
//! - [`project`]: [`project::TestProject`] temporary project directories
//! - [`git`]: git repositories usable as external directories

pub mod fixtures;
pub mod git;
pub mod project;
