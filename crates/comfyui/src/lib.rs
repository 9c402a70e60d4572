//! ComfyUI REST client and job tracking.
//!
//! Provides the HTTP API wrapper that implements the core
//! `ExecutionEngine` trait, the polling backoff policy, and the
//! [`tracker::JobTracker`] that follows submitted runs to completion.

pub mod api;
pub mod backoff;
pub mod tracker;
