//! Manifold - discovery and health-scheduling core for LLM inference fleets
//!
//! This library maintains the authoritative view of which model-serving
//! backends exist, which are reachable, and which models each currently
//! serves. A proxy layer consumes this view to select a target for each
//! incoming request.

pub mod config;
pub mod discovery;
pub mod health;
pub mod registry;
pub mod repository;
