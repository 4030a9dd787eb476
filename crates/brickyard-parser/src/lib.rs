//! # Brickyard Parser
//!
//! Permissive reader for LDraw `.ldr` and `.mpd` text. Every line either
//! becomes a typed directive or is kept verbatim as an opaque one, so
//! reading a file never fails; problems are reported as diagnostics next to
//! the tree.
//!
//! `0 SYNTH BEGIN … 0 SYNTH END` blocks are recognized and become LSynth
//! block nodes with their constraints and synthesized parts. A block that
//! breaks off is kept line by line instead.
//!
//! ## Usage
//!
//! ```
//! # use brickyard_parser::{parse, ParseConfig};
//!
//! let source = "0 Bracket\r\n1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\r\n";
//! let parsed = parse(source, &ParseConfig::default());
//!
//! assert!(parsed.diagnostics.is_empty());
//! assert_eq!(parsed.tree.models().len(), 1);
//! ```

mod builder;
pub mod error;
mod line;
mod lsynth;
mod span;

pub use span::Span;

use brickyard_core::{lsynth::RuleTable, tree::DirectiveTree};

use builder::Builder;
use error::Diagnostic;

/// Settings for reading a document.
#[derive(Debug, Clone)]
pub struct ParseConfig {
    rules: RuleTable,
}

impl ParseConfig {
    /// Creates a configuration that classifies LSynth blocks with `rules`.
    pub fn new(rules: RuleTable) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self::new(RuleTable::builtin())
    }
}

/// A document read from text, with everything noticed along the way.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub tree: DirectiveTree,
    pub diagnostics: Vec<Diagnostic>,
}

impl Parsed {
    /// Returns true if any diagnostic is an error rather than a warning.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diagnostic| diagnostic.severity().is_error())
    }
}

/// Parse LDraw text into a directive tree.
///
/// Line terminators may be `\n` or `\r\n`. Unknown `0` meta commands become
/// comments and unreadable lines become opaque directives, each with a
/// warning.
///
/// # Example
///
/// ```
/// # use brickyard_parser::{parse, ParseConfig};
///
/// let parsed = parse("0 FILE main.ldr\n0 STEP\n0 NOFILE\n", &ParseConfig::default());
/// assert!(parsed.tree.is_mpd());
/// ```
pub fn parse(source: &str, config: &ParseConfig) -> Parsed {
    Builder::new(&config.rules).build(source)
}
