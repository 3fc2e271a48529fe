//! Type transformation and projection compiler.
//!
//! Reads a design (user types, attribute contexts and requests) and emits Go
//! code: conversion functions between structurally matching types, reduced
//! per-view projections of result types, and validation functions.
pub mod cli;
pub mod code;
pub mod context;
pub mod design;
pub mod error;
pub mod expr;
pub mod jq_exec;
pub mod matcher;
pub mod path_de;
pub mod projection;
pub mod render;
pub mod session;
pub mod transform;
pub mod validation;

pub use design::Design;
pub use error::{DesignError, TransformError};

/// Installs the stderr subscriber. `RUST_LOG` wins unless `verbose` asks
/// for debug output of this crate.
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("typeform=debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("typeform=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
