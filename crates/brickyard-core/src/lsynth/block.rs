use std::{fmt, str::FromStr};

use serde::Deserialize;
use thiserror::Error;

use crate::{
    color::{ColorCode, Colorable},
    directive::DirectiveKind,
    geometry::Transform,
    tree::{DirectiveId, DirectiveTree, TreeError},
};

/// Family of synthesized geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthClass {
    Hose,
    Band,
    Chain,
}

impl SynthClass {
    /// Numeric class identifier
    pub fn id(self) -> i32 {
        match self {
            Self::Hose => 1,
            Self::Band => 2,
            Self::Chain => 3,
        }
    }
}

/// Role of a constraint within its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintRole {
    Start,
    Mid,
    End,
    /// Shape hint for the profile; not a point of the path
    CrossSection,
}

impl ConstraintRole {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Mid => "MID",
            Self::End => "END",
            Self::CrossSection => "CROSS",
        }
    }

    /// Whether the constraint is a point of the synthesis path
    pub fn is_path_point(self) -> bool {
        self != Self::CrossSection
    }
}

impl fmt::Display for ConstraintRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown constraint role `{0}`")]
pub struct UnknownRole(String);

impl FromStr for ConstraintRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "START" => Ok(Self::Start),
            "MID" => Ok(Self::Mid),
            "END" => Ok(Self::End),
            "CROSS" => Ok(Self::CrossSection),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Parameters of an LSynth block.
///
/// The constraints and synthesized parts are the node's children and
/// synthesized lists in the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct LSynthBlock {
    synth_type: String,
    class: Option<SynthClass>,
    color: ColorCode,
    hidden: bool,
    translucent: bool,
    subdirective_selected: bool,
    stale: bool,
}

/// A synthesis type that cannot be written as the single word of a
/// `0 SYNTH BEGIN` line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("synthesis type `{0}` must be one word without whitespace")]
pub struct InvalidSynthType(String);

fn checked_synth_type(synth_type: String) -> Result<String, InvalidSynthType> {
    if synth_type.is_empty() || synth_type.contains(char::is_whitespace) {
        return Err(InvalidSynthType(synth_type));
    }
    Ok(synth_type)
}

impl LSynthBlock {
    /// Creates a block of the given type. New blocks start stale.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSynthType`] when the type is empty or contains
    /// whitespace.
    pub fn new(
        synth_type: impl Into<String>,
        class: Option<SynthClass>,
        color: ColorCode,
    ) -> Result<Self, InvalidSynthType> {
        Ok(Self {
            synth_type: checked_synth_type(synth_type.into())?,
            class,
            color,
            hidden: false,
            translucent: false,
            subdirective_selected: false,
            stale: true,
        })
    }

    /// Key into the rule table, as written in the file
    pub fn synth_type(&self) -> &str {
        &self.synth_type
    }

    /// Changes the type. The block is left untouched on error.
    pub fn set_synth_type(
        &mut self,
        synth_type: impl Into<String>,
        class: Option<SynthClass>,
    ) -> Result<(), InvalidSynthType> {
        self.synth_type = checked_synth_type(synth_type.into())?;
        self.class = class;
        self.stale = true;
        Ok(())
    }

    pub fn class(&self) -> Option<SynthClass> {
        self.class
    }

    /// Integer class identifier; 0 when the type is unknown.
    pub fn lsynth_class(&self) -> i32 {
        self.class.map_or(0, SynthClass::id)
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn is_translucent(&self) -> bool {
        self.translucent
    }

    pub(crate) fn set_translucent(&mut self, translucent: bool) {
        self.translucent = translucent;
    }

    /// Whether any constraint of the block is selected
    pub fn is_subdirective_selected(&self) -> bool {
        self.subdirective_selected
    }

    pub(crate) fn set_subdirective_selected(&mut self, selected: bool) {
        self.subdirective_selected = selected;
    }

    /// Whether the synthesized parts are out of date
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn set_stale(&mut self, stale: bool) {
        self.stale = stale;
    }
}

impl Colorable for LSynthBlock {
    fn color(&self) -> ColorCode {
        self.color
    }

    fn set_color(&mut self, color: ColorCode) {
        self.color = color;
        self.stale = true;
    }
}

/// Placement of the block itself: the transform of its first constraint,
/// identity when it has none.
pub fn block_placement(tree: &DirectiveTree, block: DirectiveId) -> Result<Transform, TreeError> {
    tree.block(block)?;
    match tree.children(block)?.first() {
        Some(first) => Ok(*tree.part(*first)?.transform()),
        None => Ok(Transform::identity()),
    }
}

/// Shows or hides the synthesized parts of `block` translucent.
///
/// Presentation only: the flag lives on the block, is re-applied after every
/// synthesis and is never written.
pub fn color_synthesized_parts_translucent(
    tree: &mut DirectiveTree,
    block: DirectiveId,
    translucent: bool,
) -> Result<(), TreeError> {
    tree.block_mut(block)?.set_translucent(translucent);
    let synthesized = tree.synthesized(block)?.to_vec();
    for part in synthesized {
        tree.set_translucent(part, translucent)?;
    }
    Ok(())
}

/// Relabels constraint roles after constraints were dragged in, out or
/// around: the first path constraint becomes `Start`, the last `End`, the
/// rest `Mid`. Cross-section hints keep their role. Marks the block stale.
pub fn drag_drop_donate_cleanup(tree: &mut DirectiveTree, block: DirectiveId) -> Result<(), TreeError> {
    tree.block(block)?;
    let path: Vec<DirectiveId> = tree
        .children(block)?
        .iter()
        .copied()
        .filter(|id| {
            !matches!(
                tree.kind(*id),
                Ok(DirectiveKind::Part(part))
                    if part.constraint_role() == Some(ConstraintRole::CrossSection)
            )
        })
        .collect();

    let last = path.len().saturating_sub(1);
    for (index, id) in path.into_iter().enumerate() {
        let role = match index {
            0 => ConstraintRole::Start,
            i if i == last => ConstraintRole::End,
            _ => ConstraintRole::Mid,
        };
        tree.part_mut(id)?.set_constraint_role(Some(role));
    }
    tree.block_mut(block)?.set_stale(true);
    Ok(())
}
