// Library root module for ultra-router
// This file defines the public API and module structure for the ultra-router library
// It exports the route search, quoting and split optimization core
//
// Numan Thabit 2025 Nov

pub mod config;
pub mod control;
pub mod domain;
pub mod errors;
pub mod metrics;
pub mod router;
pub mod state;
pub mod tokens;
pub mod venues;
