//! Model control plane HTTP server
//!
//! Exposes the REST surface over `plane_lib` and the operational
//! `/healthz`, `/readyz` and `/metrics` endpoints.

pub mod api;
pub mod config;
