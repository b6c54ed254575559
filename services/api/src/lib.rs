//! services/api/src/lib.rs
//!
//! The HTTP service for the document dashboard: adapters behind the core
//! ports, configuration, error rendering and the axum router.

pub mod adapters;
pub mod config;
pub mod error;
pub mod password;
pub mod web;
