//! HTTP API module.
//!
//! This module provides the HTTP server, the event collector and the API types
//! of the profile router.

pub mod collector;
pub mod logs;
pub mod server;
pub mod types;

pub use collector::{EventService, InMemoryEvents, InMemoryProfiles, ProfileService};
pub use logs::*;
pub use server::{build_router, start_server, AppState};
pub use types::*;
