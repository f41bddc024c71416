//! Language Server Protocol implementation for Buildkite pipelines
//!
//! This crate provides IDE intelligence for Buildkite pipeline YAML
//! files: completions, hover, symbols, signature help, definitions,
//! code actions, semantic tokens, and diagnostics backed by the
//! Buildkite pipeline schema and per-plugin schemas.

pub mod backend;
pub mod capabilities;
pub mod catalog;
pub mod code_actions;
pub mod completions;
pub mod context;
pub mod definition;
pub mod diagnostics;
pub mod document;
pub mod hover;
pub mod pipeline;
pub mod plugins;
pub mod schema;
pub mod semantic_highlighting;
pub mod server;
pub mod signature_help;
pub mod symbols;

// Re-export main types
pub use backend::Backend;
pub use server::run_stdio_server;

use std::time::Duration;

/// Shared HTTP client configuration for schema fetches.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent("buildkite-ls")
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}
