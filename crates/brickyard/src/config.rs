//! Configuration types for Brickyard documents.
//!
//! All types implement [`serde::Deserialize`] so they can be loaded from
//! TOML. Every section and field is optional; missing values fall back to
//! the defaults documented on each type.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining every section.
//! - [`SynthesisConfig`] - Synthesis rule overrides and presentation.
//! - [`GridConfig`] - Nudge and snap steps for each [`GridSpacing`].
//! - [`LibraryConfig`] - An in-memory part catalog.
//! - [`ParseOptions`] - How strictly documents are read.
//!
//! # Example
//!
//! ```
//! # use brickyard::{GridSpacing, config::AppConfig};
//! let config: AppConfig = toml::from_str(
//!     r#"
//!     [grid.fine]
//!     spacing = 2.0
//!     angle = 5.0
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.grid().step(GridSpacing::Fine).spacing(), 2.0);
//! assert_eq!(config.grid().step(GridSpacing::Coarse).angle(), 90.0);
//! ```

use serde::Deserialize;

use brickyard_core::{
    geometry::{BoundingBox, Point3},
    lsynth::{Curve, RuleTable, SynthClass, SynthesisRule},
    part_library::PartCatalog,
};

use crate::GridSpacing;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Synthesis configuration section.
    #[serde(default)]
    synthesis: SynthesisConfig,

    /// Grid configuration section.
    #[serde(default)]
    grid: GridConfig,

    /// Part catalog section.
    #[serde(default)]
    library: LibraryConfig,

    /// Reading options.
    #[serde(default)]
    parse: ParseOptions,
}

impl AppConfig {
    /// Creates a new [`AppConfig`] from its sections.
    pub fn new(
        synthesis: SynthesisConfig,
        grid: GridConfig,
        library: LibraryConfig,
        parse: ParseOptions,
    ) -> Self {
        Self {
            synthesis,
            grid,
            library,
            parse,
        }
    }

    /// Returns the synthesis configuration.
    pub fn synthesis(&self) -> &SynthesisConfig {
        &self.synthesis
    }

    /// Returns the grid configuration.
    pub fn grid(&self) -> &GridConfig {
        &self.grid
    }

    /// Returns the part catalog configuration.
    pub fn library(&self) -> &LibraryConfig {
        &self.library
    }

    /// Returns the reading options.
    pub fn parse(&self) -> &ParseOptions {
        &self.parse
    }
}

/// Synthesis settings.
///
/// Configured rules override built-in rules of the same name and add new
/// ones; built-in rules without an override stay available.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SynthesisConfig {
    /// Show synthesized parts translucent.
    #[serde(default)]
    translucent: bool,

    #[serde(default)]
    rules: Vec<RuleConfig>,
}

impl SynthesisConfig {
    pub fn new(translucent: bool, rules: Vec<RuleConfig>) -> Self {
        Self { translucent, rules }
    }

    pub fn translucent(&self) -> bool {
        self.translucent
    }

    pub fn rules(&self) -> &[RuleConfig] {
        &self.rules
    }

    /// The built-in rule table with the configured rules applied on top.
    pub fn rule_table(&self) -> RuleTable {
        let mut table = RuleTable::builtin();
        for rule in &self.rules {
            table.insert(&rule.name, rule.to_rule());
        }
        table
    }
}

/// One synthesis rule as written in the configuration file.
///
/// ```toml
/// [[synthesis.rules]]
/// name = "pneumatic-hose"
/// class = "hose"
/// parts = ["LS72.dat"]
/// spacing = 5.0
/// curve = "catmull-rom"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RuleConfig {
    name: String,
    class: SynthClass,
    parts: Vec<String>,
    spacing: f64,
    #[serde(default)]
    curve: Curve,
    #[serde(default)]
    closed: bool,
}

impl RuleConfig {
    pub fn new(name: impl Into<String>, class: SynthClass, parts: Vec<String>, spacing: f64) -> Self {
        Self {
            name: name.into(),
            class,
            parts,
            spacing,
            curve: Curve::default(),
            closed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    fn to_rule(&self) -> SynthesisRule {
        SynthesisRule::new(self.class, self.parts.clone(), self.spacing)
            .with_curve(self.curve)
            .with_closed(self.closed)
    }
}

/// Translation step and minimum angle of one grid setting.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GridStep {
    /// Translation step in LDraw units
    spacing: f64,
    /// Rotation step in degrees
    angle: f64,
}

impl GridStep {
    pub fn new(spacing: f64, angle: f64) -> Self {
        Self { spacing, angle }
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }
}

/// Grid steps for nudging and snapping.
///
/// Defaults: fine 1 LDU / 15°, medium 10 LDU / 45°, coarse 20 LDU / 90°.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_fine")]
    fine: GridStep,
    #[serde(default = "default_medium")]
    medium: GridStep,
    #[serde(default = "default_coarse")]
    coarse: GridStep,
}

fn default_fine() -> GridStep {
    GridStep::new(1.0, 15.0)
}

fn default_medium() -> GridStep {
    GridStep::new(10.0, 45.0)
}

fn default_coarse() -> GridStep {
    GridStep::new(20.0, 90.0)
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            fine: default_fine(),
            medium: default_medium(),
            coarse: default_coarse(),
        }
    }
}

impl GridConfig {
    pub fn new(fine: GridStep, medium: GridStep, coarse: GridStep) -> Self {
        Self { fine, medium, coarse }
    }

    /// Returns the step configured for `spacing`.
    pub fn step(&self, spacing: GridSpacing) -> GridStep {
        match spacing {
            GridSpacing::Fine => self.fine,
            GridSpacing::Medium => self.medium,
            GridSpacing::Coarse => self.coarse,
        }
    }
}

/// A part known to the in-memory catalog, with its bounds in LDraw units.
///
/// ```toml
/// [[library.parts]]
/// name = "3001.dat"
/// min = [-40.0, -4.0, -20.0]
/// max = [40.0, 24.0, 20.0]
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogEntry {
    name: String,
    min: [f64; 3],
    max: [f64; 3],
}

impl CatalogEntry {
    pub fn new(name: impl Into<String>, min: [f64; 3], max: [f64; 3]) -> Self {
        Self {
            name: name.into(),
            min,
            max,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(Point3::from(self.min), Point3::from(self.max))
    }
}

/// Parts the application knows about without a part library on disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryConfig {
    #[serde(default)]
    parts: Vec<CatalogEntry>,
}

impl LibraryConfig {
    pub fn new(parts: Vec<CatalogEntry>) -> Self {
        Self { parts }
    }

    pub fn parts(&self) -> &[CatalogEntry] {
        &self.parts
    }

    /// Builds the catalog described by this section.
    pub fn catalog(&self) -> PartCatalog {
        let mut catalog = PartCatalog::new();
        for entry in &self.parts {
            catalog.insert(&entry.name, entry.bounds());
        }
        catalog
    }
}

/// How documents are read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ParseOptions {
    /// Reject documents that produce error diagnostics instead of keeping
    /// the offending lines verbatim.
    #[serde(default)]
    strict: bool,
}

impl ParseOptions {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn strict(&self) -> bool {
        self.strict
    }
}
