//! LDraw color keys and their resolution to displayable colors.
//!
//! Directives store only a [`ColorCode`], the key written in the file. Turning
//! a key into an actual color is the job of a [`ColorLibrary`] collaborator.

use std::{
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};

use color::DynamicColor;
use thiserror::Error;

/// A color key as written in an LDraw line.
///
/// # Examples
///
/// ```
/// # use brickyard_core::color::ColorCode;
/// let red: ColorCode = "4".parse().unwrap();
/// assert_eq!(red, ColorCode::Indexed(4));
///
/// let direct: ColorCode = "0x2FF8000".parse().unwrap();
/// assert_eq!(direct, ColorCode::Direct { r: 0xFF, g: 0x80, b: 0x00 });
/// assert_eq!(direct.to_string(), "0x2FF8000");
///
/// assert_eq!(ColorCode::from_code(16), ColorCode::Current);
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColorCode {
    /// Code 16: inherit the color of the referencing part
    #[default]
    Current,
    /// Code 24: the complement edge color
    Edge,
    /// Any other numbered palette entry
    Indexed(u32),
    /// An explicit RGB value, written `0x2RRGGBB`
    Direct { r: u8, g: u8, b: u8 },
}

impl ColorCode {
    pub const CURRENT: u32 = 16;
    pub const EDGE: u32 = 24;

    /// Maps a numeric code to its key.
    pub fn from_code(code: u32) -> Self {
        match code {
            Self::CURRENT => Self::Current,
            Self::EDGE => Self::Edge,
            other => Self::Indexed(other),
        }
    }

    /// Returns the numeric code, or `None` for a direct color
    pub fn code(&self) -> Option<u32> {
        match self {
            Self::Current => Some(Self::CURRENT),
            Self::Edge => Some(Self::EDGE),
            Self::Indexed(code) => Some(*code),
            Self::Direct { .. } => None,
        }
    }
}

impl fmt::Display for ColorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct { r, g, b } => write!(f, "0x2{r:02X}{g:02X}{b:02X}"),
            other => write!(f, "{}", other.code().unwrap_or(Self::CURRENT)),
        }
    }
}

/// Error returned when a color token is neither a code nor a direct color.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid color `{0}`")]
pub struct ColorParseError(String);

impl FromStr for ColorCode {
    type Err = ColorParseError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let invalid = || ColorParseError(token.to_string());

        if let Ok(code) = token.parse::<u32>() {
            return Ok(Self::from_code(code));
        }

        let hex = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .or_else(|| token.strip_prefix('#'))
            .and_then(|rest| rest.strip_prefix('2'))
            .ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |at: usize| u8::from_str_radix(&hex[at..at + 2], 16).map_err(|_| invalid());
        Ok(Self::Direct {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

/// Capability of directives that carry a color.
pub trait Colorable {
    fn color(&self) -> ColorCode;

    fn set_color(&mut self, color: ColorCode);
}

/// A displayable color.
///
/// Wraps the `DynamicColor` type from the color crate.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Color {
    color: DynamicColor,
}

impl Eq for Color {}

impl Hash for Color {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

impl Color {
    /// Create a new `Color` from a CSS color string such as `"#b40000"`.
    ///
    /// # Examples
    ///
    /// ```
    /// use brickyard_core::color::Color;
    ///
    /// assert!(Color::new("#b40000").is_ok());
    /// assert!(Color::new("not-a-color").is_err());
    /// ```
    pub fn new(color_str: &str) -> Result<Self, String> {
        match DynamicColor::from_str(color_str) {
            Ok(color) => Ok(Self { color }),
            Err(err) => Err(format!("invalid color `{color_str}`: {err}")),
        }
    }

    fn from_rgb(r: u8, g: u8, b: u8) -> Option<Self> {
        Self::new(&format!("#{r:02x}{g:02x}{b:02x}")).ok()
    }

    /// Creates a new color with the specified alpha value.
    ///
    /// # Examples
    ///
    /// ```
    /// use brickyard_core::color::Color;
    ///
    /// let red = Color::new("red").unwrap();
    /// assert_eq!(red.with_alpha(0.5).alpha(), 0.5);
    /// ```
    pub fn with_alpha(self, alpha: f32) -> Self {
        Color {
            color: self.color.with_alpha(alpha),
        }
    }

    /// Returns the alpha component, 0.0 (transparent) to 1.0 (opaque).
    pub fn alpha(&self) -> f32 {
        self.color.components[3]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.color)
    }
}

/// Alpha used when synthesized parts are shown translucent.
pub const TRANSLUCENT_ALPHA: f32 = 0.25;

/// Resolves color keys to displayable colors.
pub trait ColorLibrary {
    /// Returns the color for `code`, or `None` when the key is inherited
    /// (`Current`, `Edge`) or unknown to the library.
    fn resolve(&self, code: ColorCode) -> Option<Color>;

    /// Resolves `code` for display, dimming it when `translucent` is set.
    fn resolve_for_display(&self, code: ColorCode, translucent: bool) -> Option<Color> {
        let color = self.resolve(code)?;
        Some(if translucent {
            color.with_alpha(TRANSLUCENT_ALPHA)
        } else {
            color
        })
    }
}

/// A small built-in palette of the most common LDraw colors.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardColors;

impl StandardColors {
    const PALETTE: &'static [(u32, &'static str)] = &[
        (0, "#1b2a34"),
        (1, "#1e5aa8"),
        (2, "#00852b"),
        (4, "#b40000"),
        (14, "#fac80a"),
        (15, "#f4f4f4"),
        (19, "#d7ba8c"),
        (25, "#d67923"),
        (70, "#5f3109"),
        (71, "#a0a5a9"),
        (72, "#6c6e68"),
    ];
}

impl ColorLibrary for StandardColors {
    fn resolve(&self, code: ColorCode) -> Option<Color> {
        match code {
            ColorCode::Direct { r, g, b } => Color::from_rgb(r, g, b),
            ColorCode::Indexed(index) => Self::PALETTE
                .iter()
                .find(|(entry, _)| *entry == index)
                .and_then(|(_, css)| Color::new(css).ok()),
            ColorCode::Current | ColorCode::Edge => None,
        }
    }
}
