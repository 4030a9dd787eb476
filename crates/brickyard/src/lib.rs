//! Brickyard - editing LDraw brick models with LSynth re-synthesis.
//!
//! Reading, editing and writing LDraw `.ldr` / `.mpd` documents. Hoses,
//! bands and chains described by LSynth blocks are regenerated from their
//! constraints whenever those change.

pub mod config;

mod document;
mod error;

pub use brickyard_core::{color, directive, edit, geometry, lsynth, part_library, report, tree};

pub use document::{Document, GridSpacing, InsertionMode, SynthesisOutcome};
pub use error::BrickyardError;

use log::{debug, info, trace};

use brickyard_core::part_library::PartCatalog;
use brickyard_parser::{ParseConfig, error::ParseError};

use config::AppConfig;

/// Builder for reading and writing Brickyard documents.
///
/// # Examples
///
/// ```rust
/// use brickyard::{DocumentBuilder, config::AppConfig};
///
/// let source = "0 Bracket\n1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n";
///
/// let builder = DocumentBuilder::new(AppConfig::default());
/// let document = builder.parse(source).expect("Failed to parse");
///
/// let text = builder.write(&document);
/// assert_eq!(text, "0 Bracket\r\n1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\r\n");
/// ```
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    config: AppConfig,
}

impl DocumentBuilder {
    /// Create a new document builder with the given configuration.
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The part catalog described by the configuration.
    pub fn library(&self) -> PartCatalog {
        self.config.library().catalog()
    }

    /// Parse LDraw text into a document.
    ///
    /// Problems with individual lines or LSynth blocks are kept as
    /// diagnostics on the document and the offending lines are preserved
    /// verbatim.
    ///
    /// # Errors
    ///
    /// In strict mode, returns [`BrickyardError::Parse`] if any diagnostic is
    /// an error.
    pub fn parse(&self, source: &str) -> Result<Document, BrickyardError> {
        info!(bytes = source.len(); "Parsing document");

        let rules = self.config.synthesis().rule_table();
        let parsed = brickyard_parser::parse(source, &ParseConfig::new(rules.clone()));

        if self.config.parse().strict() && parsed.has_errors() {
            return Err(BrickyardError::new_parse_error(
                ParseError::new(parsed.diagnostics),
                source,
            ));
        }
        for diagnostic in &parsed.diagnostics {
            debug!(diagnostic:% = diagnostic; "Kept going after diagnostic");
        }

        let mut document =
            Document::with_diagnostics(parsed.tree, parsed.diagnostics, rules, *self.config.grid());
        if self.config.synthesis().translucent() {
            document.set_synthesized_translucent(true)?;
        }

        debug!(
            models = document.tree().models().len(),
            blocks = document.tree().blocks().len();
            "Document parsed successfully"
        );
        Ok(document)
    }

    /// Write a document as LDraw text, exactly as it is.
    ///
    /// Stale LSynth blocks are written with their current synthesized
    /// parts; use [`Document::write`] to bring them up to date first.
    pub fn write(&self, document: &Document) -> String {
        let text = document.tree().to_ldraw_string();
        trace!(bytes = text.len(); "Document written");
        text
    }
}
