//! Error types for Brickyard operations.
//!
//! This module provides the main error type [`BrickyardError`] which wraps
//! the error conditions of reading, editing and re-synthesizing documents.

use std::io;

use thiserror::Error;

use brickyard_core::{lsynth::SynthesisError, tree::TreeError};
use brickyard_parser::error::ParseError;

/// The main error type for Brickyard operations.
///
/// # Diagnostic Variants
///
/// The `Parse` variant is only produced in strict mode and carries the
/// source text, so callers can render the diagnostics with their spans.
#[derive(Debug, Error)]
pub enum BrickyardError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{err}")]
    Parse { err: ParseError, src: String },

    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0} cannot be transformed")]
    NotTransformable(&'static str),

    #[error("No model named `{0}`")]
    UnknownModel(String),

    #[error("Document has no models")]
    EmptyDocument,
}

impl BrickyardError {
    /// Create a new `Parse` error with the associated source code.
    pub fn new_parse_error(err: ParseError, src: impl Into<String>) -> Self {
        Self::Parse {
            err,
            src: src.into(),
        }
    }
}
