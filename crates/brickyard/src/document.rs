//! The editing boundary around a directive tree.
//!
//! A [`Document`] owns the tree read from a file together with the rule
//! table and grid settings it was opened with. Every change goes through an
//! [`Edit`], so each editing call returns the edit that undoes it; keeping
//! the undo history is the caller's business.
//!
//! LSynth blocks touched by an edit are re-synthesized right away while one
//! of their constraints is selected (the user is dragging it around) and
//! otherwise only marked stale, to be regenerated on
//! [`Document::resynthesize_stale`] or [`Document::write`].

use log::{debug, info, trace, warn};

use brickyard_core::{
    color::ColorCode,
    directive::DirectiveKind,
    edit::Edit,
    geometry::{Point3, Transform, Vec3, decompose, recompose},
    lsynth::{
        ConstraintRole, RuleTable, SynthesisError, SynthesisReport, Synthesizer,
        color_synthesized_parts_translucent, drag_drop_donate_cleanup,
    },
    part_library::PartLibrary,
    report::{self, Dimensions, PartReport},
    tree::{DirectiveId, DirectiveTree, TreeError},
};
use brickyard_parser::error::Diagnostic;

use crate::{BrickyardError, config::GridConfig};

/// Grid setting used for nudging and snapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GridSpacing {
    #[default]
    Fine,
    Medium,
    Coarse,
}

/// Where [`Document::add_directive`] places the new directive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InsertionMode {
    AtBeginning,
    #[default]
    AtEnd,
}

/// Result of synthesizing one block.
pub type SynthesisOutcome = (DirectiveId, Result<SynthesisReport, SynthesisError>);

/// An open LDraw document.
#[derive(Debug, Clone)]
pub struct Document {
    tree: DirectiveTree,
    diagnostics: Vec<Diagnostic>,
    rules: RuleTable,
    grid: GridConfig,
}

impl Document {
    /// Wraps a tree built in code.
    pub fn new(tree: DirectiveTree, rules: RuleTable, grid: GridConfig) -> Self {
        Self::with_diagnostics(tree, Vec::new(), rules, grid)
    }

    pub(crate) fn with_diagnostics(
        tree: DirectiveTree,
        diagnostics: Vec<Diagnostic>,
        rules: RuleTable,
        grid: GridConfig,
    ) -> Self {
        Self {
            tree,
            diagnostics,
            rules,
            grid,
        }
    }

    pub fn tree(&self) -> &DirectiveTree {
        &self.tree
    }

    /// Problems noticed while reading the document.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn grid(&self) -> &GridConfig {
        &self.grid
    }

    /// The first model, which LDraw treats as the main one.
    pub fn main_model(&self) -> Option<DirectiveId> {
        self.tree.models().first().copied()
    }

    /// The model called `name`, or the main model when no name is given.
    pub fn model(&self, name: Option<&str>) -> Result<DirectiveId, BrickyardError> {
        match name {
            Some(name) => self
                .tree
                .find_model(name)
                .ok_or_else(|| BrickyardError::UnknownModel(name.to_string())),
            None => self.main_model().ok_or(BrickyardError::EmptyDocument),
        }
    }

    // ============================================================================
    // Edits
    // ============================================================================

    /// Applies `edit` and returns its inverse.
    ///
    /// Moves into, out of or within an LSynth block relabel the block's
    /// constraint roles, and the returned edit puts the old roles back.
    /// Edits that set roles themselves, such as those inverses, are applied
    /// as given. Affected blocks whose constraints are selected are
    /// re-synthesized immediately; the others stay stale. Synthesis problems
    /// are logged and never fail the edit.
    ///
    /// # Errors
    ///
    /// Returns [`BrickyardError::Tree`] if the edit violates the tree's
    /// structure; the tree is left unchanged.
    pub fn apply(&mut self, edit: &Edit, library: &dyn PartLibrary) -> Result<Edit, BrickyardError> {
        let mut inverse = edit.apply(&mut self.tree)?;
        let blocks = self.affected_blocks(edit, &inverse);
        trace!(blocks = blocks.len(); "Edit applied");

        if contains_move(edit) && !sets_roles(edit) {
            let mut restores = Vec::new();
            for block in &blocks {
                let before = self.constraint_roles(*block)?;
                drag_drop_donate_cleanup(&mut self.tree, *block)?;
                for (node, role) in before {
                    restores.push(Edit::set_role(&self.tree, node, role)?);
                }
            }
            if !restores.is_empty() {
                restores.push(inverse);
                inverse = Edit::Compound(restores);
            }
        }

        let synthesizer = Synthesizer::new(&self.rules, library);
        for block in blocks {
            let eager = self
                .tree
                .block(block)
                .is_ok_and(|params| params.is_stale() && params.is_subdirective_selected());
            if eager {
                let outcome = synthesizer.synthesize(&mut self.tree, block);
                log_outcome(&(block, outcome));
            }
        }
        Ok(inverse)
    }

    /// Creates a directive and attaches it to `parent`.
    ///
    /// Returns the new node and the edit that removes it again.
    pub fn add_directive(
        &mut self,
        kind: DirectiveKind,
        parent: DirectiveId,
        mode: InsertionMode,
        library: &dyn PartLibrary,
    ) -> Result<(DirectiveId, Edit), BrickyardError> {
        let index = match mode {
            InsertionMode::AtBeginning => 0,
            InsertionMode::AtEnd => self.tree.children(parent)?.len(),
        };
        let node = self.tree.create(kind);
        let edit = Edit::Insert { node, parent, index };
        match self.apply(&edit, library) {
            Ok(inverse) => Ok((node, inverse)),
            Err(err) => {
                if let Err(cleanup) = self.tree.delete_subtree(node) {
                    warn!(err:% = cleanup; "Could not free rejected directive");
                }
                Err(err)
            }
        }
    }

    /// Moves a part by `direction` times the translation step of `spacing`.
    pub fn nudge(
        &mut self,
        id: DirectiveId,
        direction: Vec3,
        spacing: GridSpacing,
        library: &dyn PartLibrary,
    ) -> Result<Edit, BrickyardError> {
        let step = self.grid.step(spacing).spacing();
        let transform = self.part_transform(id)?;
        self.set_transform(id, transform.nudged(direction * step), library)
    }

    /// Rotates a part by `degrees` around `axis` through `pivot`.
    pub fn rotate_part(
        &mut self,
        id: DirectiveId,
        axis: Vec3,
        degrees: f64,
        pivot: Point3,
        library: &dyn PartLibrary,
    ) -> Result<Edit, BrickyardError> {
        let transform = self.part_transform(id)?;
        self.set_transform(id, transform.rotated_about(axis, degrees, pivot), library)
    }

    /// Rounds a part's position and rotation to the grid of `spacing`.
    ///
    /// # Errors
    ///
    /// Returns [`BrickyardError::NotTransformable`] for directives other than
    /// parts and for parts whose matrix cannot be decomposed.
    pub fn snap_to_grid(
        &mut self,
        id: DirectiveId,
        spacing: GridSpacing,
        library: &dyn PartLibrary,
    ) -> Result<Edit, BrickyardError> {
        let step = self.grid.step(spacing);
        let transform = self.part_transform(id)?;
        let components =
            decompose(&transform).ok_or(BrickyardError::NotTransformable("a singular matrix"))?;
        let snapped = recompose(&components.snapped_to_grid(step.spacing(), step.angle()));
        self.set_transform(id, snapped, library)
    }

    pub fn set_color(
        &mut self,
        id: DirectiveId,
        color: ColorCode,
        library: &dyn PartLibrary,
    ) -> Result<Edit, BrickyardError> {
        let edit = Edit::set_color(&self.tree, id, color)?;
        self.apply(&edit, library)
    }

    pub fn set_hidden(
        &mut self,
        id: DirectiveId,
        hidden: bool,
        library: &dyn PartLibrary,
    ) -> Result<Edit, BrickyardError> {
        let edit = Edit::set_hidden(&self.tree, id, hidden)?;
        self.apply(&edit, library)
    }

    /// Detaches a directive. It stays in the arena so the returned edit can
    /// put it back.
    pub fn delete(&mut self, id: DirectiveId, library: &dyn PartLibrary) -> Result<Edit, BrickyardError> {
        let parent = self.tree.parent(id)?.ok_or(TreeError::DetachedNode)?;
        let edit = Edit::Remove { node: id, parent };
        self.apply(&edit, library)
    }

    /// Selects or deselects a directive.
    pub fn select(&mut self, id: DirectiveId, selected: bool) -> Result<(), BrickyardError> {
        self.tree.set_selected(id, selected)?;
        Ok(())
    }

    fn set_transform(
        &mut self,
        id: DirectiveId,
        transform: Transform,
        library: &dyn PartLibrary,
    ) -> Result<Edit, BrickyardError> {
        let edit = Edit::set_transform(&self.tree, id, transform)?;
        self.apply(&edit, library)
    }

    fn part_transform(&self, id: DirectiveId) -> Result<Transform, BrickyardError> {
        match self.tree.kind(id)? {
            DirectiveKind::Part(part) if !self.tree.is_synthesized(id) => Ok(*part.transform()),
            DirectiveKind::Part(_) => Err(BrickyardError::NotTransformable("a synthesized part")),
            other => Err(BrickyardError::NotTransformable(other.name())),
        }
    }

    fn constraint_roles(
        &self,
        block: DirectiveId,
    ) -> Result<Vec<(DirectiveId, Option<ConstraintRole>)>, BrickyardError> {
        let mut roles = Vec::new();
        for id in self.tree.children(block)? {
            roles.push((*id, self.tree.part(*id)?.constraint_role()));
        }
        Ok(roles)
    }

    /// Blocks containing, or being, any node the edit or its inverse touch.
    fn affected_blocks(&self, edit: &Edit, inverse: &Edit) -> Vec<DirectiveId> {
        let mut blocks: Vec<DirectiveId> = Vec::new();
        for id in edit.touched().into_iter().chain(inverse.touched()) {
            let block = match self.tree.kind(id) {
                Ok(DirectiveKind::LSynth(_)) => Some(id),
                Ok(_) => self.tree.enclosing_block(id).ok().flatten(),
                Err(_) => None,
            };
            match block {
                Some(block) if !blocks.contains(&block) => blocks.push(block),
                _ => {}
            }
        }
        blocks
    }

    // ============================================================================
    // Synthesis
    // ============================================================================

    /// Regenerates every block marked stale.
    pub fn resynthesize_stale(&mut self, library: &dyn PartLibrary) -> Vec<SynthesisOutcome> {
        let outcomes = Synthesizer::new(&self.rules, library).synthesize_stale(&mut self.tree);
        outcomes.iter().for_each(log_outcome);
        outcomes
    }

    /// Regenerates every block, stale or not.
    pub fn resynthesize_all(&mut self, library: &dyn PartLibrary) -> Vec<SynthesisOutcome> {
        let outcomes = Synthesizer::new(&self.rules, library).synthesize_all(&mut self.tree);
        outcomes.iter().for_each(log_outcome);
        info!(blocks = outcomes.len(); "Re-synthesized all LSynth blocks");
        outcomes
    }

    /// Shows the synthesized parts of every block translucent, or opaque
    /// again. Presentation only; nothing is written.
    pub fn set_synthesized_translucent(&mut self, translucent: bool) -> Result<(), BrickyardError> {
        for block in self.tree.blocks() {
            color_synthesized_parts_translucent(&mut self.tree, block, translucent)?;
        }
        Ok(())
    }

    // ============================================================================
    // Output
    // ============================================================================

    /// Brings stale blocks up to date and returns the document as LDraw text.
    pub fn write(&mut self, library: &dyn PartLibrary) -> String {
        self.resynthesize_stale(library);
        self.tree.to_ldraw_string()
    }

    /// Piece count of `model`, including its sub-models.
    pub fn part_report(&self, model: DirectiveId) -> Result<PartReport, BrickyardError> {
        Ok(PartReport::collect(&self.tree, model)?)
    }

    /// Bounding box of `model` in LDraw units.
    pub fn dimensions(
        &self,
        model: DirectiveId,
        library: &dyn PartLibrary,
    ) -> Result<Dimensions, BrickyardError> {
        Ok(report::dimensions(&self.tree, model, library)?)
    }
}

fn contains_move(edit: &Edit) -> bool {
    match edit {
        Edit::Move { .. } => true,
        Edit::Compound(edits) => edits.iter().any(contains_move),
        _ => false,
    }
}

fn sets_roles(edit: &Edit) -> bool {
    match edit {
        Edit::SetRole { .. } => true,
        Edit::Compound(edits) => edits.iter().any(sets_roles),
        _ => false,
    }
}

fn log_outcome((block, outcome): &SynthesisOutcome) {
    match outcome {
        Ok(report) => debug!(
            block:? = block,
            placed = report.placed,
            unresolved = report.unresolved.len();
            "Synthesized LSynth block"
        ),
        Err(err) => warn!(block:? = block, err:% = err; "LSynth block kept as is"),
    }
}
