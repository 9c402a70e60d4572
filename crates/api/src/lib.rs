//! comfyremote API server library.
//!
//! Exposes the core building blocks (config, state, error handling, routes)
//! so integration tests and the binary entrypoint can both access them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod query;
pub mod response;
pub mod routes;
pub mod state;

/// Path of the artifact proxy endpoint, used to build job image URLs.
pub const VIEW_PATH: &str = "/api/v1/engine/view";
