//! LSynth blocks and the synthesis engine.
//!
//! An LSynth block is a container whose children are *constraints*: part
//! references marking control points of a hose, band or chain. Synthesis
//! walks the path through those points and regenerates the block's
//! *synthesized* parts from scratch.
//!
//! - [`LSynthBlock`] - Parameters of a block
//! - [`RuleTable`] - Per-type placement rules
//! - [`Synthesizer`] - Runs synthesis against a [`PartLibrary`](crate::part_library::PartLibrary)

mod block;
mod rules;
mod synthesize;

pub use block::{
    ConstraintRole, InvalidSynthType, LSynthBlock, SynthClass, block_placement,
    color_synthesized_parts_translucent, drag_drop_donate_cleanup,
};
pub use rules::{Curve, RuleTable, SynthesisRule};
pub use synthesize::{SynthesisError, SynthesisReport, Synthesizer};
