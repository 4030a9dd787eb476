//! Error and diagnostic system for the Brickyard parser.
//!
//! Parsing never aborts on bad input. Lines that cannot be understood are
//! kept verbatim and reported here instead:
//! - Error codes for documentation and searchability
//! - Labeled byte spans into the source
//! - Severity levels
//! - A collector accumulating everything found in one pass
//!
//! # Example
//!
//! ```
//! # use brickyard_parser::error::{Diagnostic, ErrorCode};
//! # use brickyard_parser::Span;
//!
//! let diag = Diagnostic::warning("malformed line kept verbatim")
//!     .with_code(ErrorCode::E100)
//!     .with_label(Span::new(12..40), "expected 14 fields after the line type")
//!     .with_help("the line is written back unchanged");
//! ```

mod collector;
mod diagnostic;
mod error_code;
mod label;
mod parse_error;
mod severity;

pub(crate) use collector::DiagnosticCollector;

pub use diagnostic::Diagnostic;
pub use error_code::ErrorCode;
pub use label::Label;
pub use parse_error::ParseError;
pub use severity::Severity;
