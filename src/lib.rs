//! SovereignSeas platform sandbox
//!
//! In-process simulation of the SovereignSeas module platform (registry,
//! router, initialization, access control, token conversion) with an HTTP API.

pub mod api;
pub mod config;
pub mod modules;
pub mod platform;
pub mod types;
