//! Collector for accumulating diagnostics during a parse.

use crate::error::Diagnostic;

/// Accumulates every diagnostic found while reading one document.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
    has_errors: bool,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a diagnostic to this collector.
    pub fn emit(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity().is_error() {
            self.has_errors = true;
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Returns every diagnostic, warnings included, in emission order.
    pub fn finish(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorCode, span::Span};

    #[test]
    fn test_collector_keeps_warnings() {
        let mut collector = DiagnosticCollector::new();

        collector.emit(Diagnostic::warning("warning 1"));
        collector.emit(Diagnostic::warning("warning 2"));

        assert!(!collector.has_errors());
        assert_eq!(collector.len(), 2);
        assert_eq!(collector.finish().len(), 2);
    }

    #[test]
    fn test_collector_tracks_errors() {
        let mut collector = DiagnosticCollector::new();

        collector.emit(
            Diagnostic::error("unterminated LSynth block")
                .with_code(ErrorCode::E201)
                .with_label(Span::new(10..20), "here"),
        );
        collector.emit(Diagnostic::warning("test warning"));

        assert!(collector.has_errors());
        let diagnostics = collector.finish();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].message(), "unterminated LSynth block");
    }
}
