//! Domain core for the ComfyUI remote-run service.
//!
//! Holds the workflow graph model, input introspection, run preparation
//! (overrides and seed resolution), the bounded job history, and the
//! collaborator traits for the execution engine and the workflow store.
//! Nothing in this crate speaks HTTP.

pub mod engine;
pub mod error;
pub mod graph;
pub mod introspection;
pub mod job;
pub mod run;
pub mod types;
pub mod workflow_store;
