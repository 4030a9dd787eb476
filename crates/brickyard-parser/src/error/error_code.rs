//! Error codes for the Brickyard diagnostic system.
//!
//! Error codes are organized by phase:
//! - `E1xx` - Line errors
//! - `E2xx` - LSynth block structure errors
//! - `E3xx` - LSynth content warnings

use std::fmt;

/// Error codes for categorizing diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // =========================================================================
    // Line Errors (E1xx)
    // =========================================================================
    /// Malformed line.
    ///
    /// The line starts with a known line type but its fields do not match
    /// the layout of that type. The line is kept verbatim.
    E100,

    /// Invalid number.
    ///
    /// A coordinate or matrix entry is not a finite number.
    E101,

    /// Invalid color.
    ///
    /// The color field is neither a color code nor a direct `0x2RRGGBB` color.
    E102,

    // =========================================================================
    // LSynth Block Errors (E2xx)
    // =========================================================================
    /// Malformed LSynth block.
    ///
    /// A line appeared that is not allowed in the current section of an
    /// LSynth block. The block's lines are kept verbatim.
    E200,

    /// Unterminated LSynth block.
    ///
    /// The input ended before `0 SYNTH END`.
    E201,

    /// Stray LSynth marker.
    ///
    /// A `0 SYNTH` section marker appeared outside any block.
    E202,

    // =========================================================================
    // LSynth Content Warnings (E3xx)
    // =========================================================================
    /// Unknown synthesis type.
    ///
    /// The block's type has no synthesis rule; it is kept but cannot be
    /// regenerated.
    E300,
}

impl ErrorCode {
    /// Returns the code as a string (e.g., "E100").
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E100 => "E100",
            ErrorCode::E101 => "E101",
            ErrorCode::E102 => "E102",
            ErrorCode::E200 => "E200",
            ErrorCode::E201 => "E201",
            ErrorCode::E202 => "E202",
            ErrorCode::E300 => "E300",
        }
    }

    /// Returns a short description of what this error code means.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::E100 => "malformed line",
            ErrorCode::E101 => "invalid number",
            ErrorCode::E102 => "invalid color",
            ErrorCode::E200 => "malformed LSynth block",
            ErrorCode::E201 => "unterminated LSynth block",
            ErrorCode::E202 => "stray LSynth marker",
            ErrorCode::E300 => "unknown synthesis type",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
