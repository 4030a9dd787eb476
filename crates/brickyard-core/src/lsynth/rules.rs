use std::collections::HashMap;

use serde::Deserialize;

use super::block::SynthClass;

/// How the path between consecutive constraints is interpolated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Curve {
    /// Straight segments between constraints
    #[default]
    Linear,
    /// A Catmull-Rom spline through the constraints
    CatmullRom,
}

/// Placement rule for one synthesis type.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRule {
    class: SynthClass,
    parts: Vec<String>,
    spacing: f64,
    curve: Curve,
    closed: bool,
}

impl SynthesisRule {
    /// Creates an open, linear rule placing `parts` (cycled) every `spacing`
    /// LDU along the path.
    pub fn new(class: SynthClass, parts: Vec<String>, spacing: f64) -> Self {
        Self {
            class,
            parts,
            spacing,
            curve: Curve::Linear,
            closed: false,
        }
    }

    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curve = curve;
        self
    }

    /// Makes the path loop back from the last constraint to the first.
    pub fn with_closed(mut self, closed: bool) -> Self {
        self.closed = closed;
        self
    }

    pub fn class(&self) -> SynthClass {
        self.class
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Part placed at the `index`-th sample, cycling through the list.
    pub fn part_for(&self, index: usize) -> Option<&str> {
        if self.parts.is_empty() {
            None
        } else {
            Some(&self.parts[index % self.parts.len()])
        }
    }
}

/// Synthesis rules keyed by type name (case-insensitive).
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: HashMap<String, SynthesisRule>,
}

impl RuleTable {
    /// A table with no rules
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// The built-in rules.
    ///
    /// | type            | class | curve       | spacing | loop |
    /// |-----------------|-------|-------------|---------|------|
    /// | `rigid-hose`    | hose  | linear      | 10      | no   |
    /// | `flexible-hose` | hose  | catmull-rom | 4       | no   |
    /// | `ribbed-hose`   | hose  | catmull-rom | 6       | no   |
    /// | `rubber-band`   | band  | linear      | 2       | yes  |
    /// | `chain`         | chain | linear      | 16      | yes  |
    /// | `technic-chain` | chain | linear      | 16      | yes  |
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        let parts = |names: &[&str]| -> Vec<String> { names.iter().map(|name| name.to_string()).collect() };

        table.insert("rigid-hose", SynthesisRule::new(SynthClass::Hose, parts(&["LS71.dat"]), 10.0));
        table.insert(
            "flexible-hose",
            SynthesisRule::new(SynthClass::Hose, parts(&["LS70.dat"]), 4.0).with_curve(Curve::CatmullRom),
        );
        table.insert(
            "ribbed-hose",
            SynthesisRule::new(SynthClass::Hose, parts(&["79.dat"]), 6.0).with_curve(Curve::CatmullRom),
        );
        table.insert(
            "rubber-band",
            SynthesisRule::new(SynthClass::Band, parts(&["LS50.dat"]), 2.0).with_closed(true),
        );
        table.insert(
            "chain",
            SynthesisRule::new(SynthClass::Chain, parts(&["3711.dat"]), 16.0).with_closed(true),
        );
        table.insert(
            "technic-chain",
            SynthesisRule::new(SynthClass::Chain, parts(&["3711.dat"]), 16.0).with_closed(true),
        );
        table
    }

    /// Adds or replaces the rule for `synth_type`.
    pub fn insert(&mut self, synth_type: &str, rule: SynthesisRule) {
        self.rules.insert(synth_type.to_ascii_lowercase(), rule);
    }

    pub fn get(&self, synth_type: &str) -> Option<&SynthesisRule> {
        self.rules.get(&synth_type.to_ascii_lowercase())
    }

    /// Returns the known type names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::builtin()
    }
}
