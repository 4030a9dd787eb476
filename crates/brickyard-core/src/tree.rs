//! The directive tree: an arena of directives rooted at a single file.
//!
//! Nodes live in a [`SlotMap`] and are addressed by [`DirectiveId`]. Each
//! container owns an ordered child list; each node keeps a non-owning
//! back-reference to its container. The list order is the line order of the
//! written file.
//!
//! Removing a node only detaches it. Detached nodes stay in the arena so an
//! inverse edit can put them back; [`DirectiveTree::delete_subtree`] frees
//! them for good.

use log::trace;
use slotmap::{SlotMap, new_key_type};
use thiserror::Error;

use crate::{
    color::Colorable,
    directive::{Directive, DirectiveKind, File, Model, Part, Step},
    lsynth::{ConstraintRole, InvalidSynthType, LSynthBlock},
};

new_key_type! {
    /// Stable handle to a node of a [`DirectiveTree`].
    pub struct DirectiveId;
}

/// Contract violations of the tree API.
///
/// These are programming errors on the caller's side and are never corrected
/// silently.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("index {index} out of range for a container of {len} children")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("directive is not a child of the given container")]
    NotAChild,

    #[error("directive is not attached to a container")]
    DetachedNode,

    #[error("unknown directive")]
    UnknownNode,

    #[error("a {0} cannot hold children")]
    NotAContainer(&'static str),

    #[error("a {container} cannot hold a {child}")]
    InvalidChild {
        container: &'static str,
        child: &'static str,
    },

    #[error("directive is already attached to a container")]
    AlreadyAttached,

    #[error("a directive cannot be inserted into its own subtree")]
    Cycle,

    #[error("synthesized parts cannot be edited individually")]
    DerivedNode,

    #[error("the document root cannot be detached")]
    RootNode,

    #[error("expected a {expected}, found a {found}")]
    UnexpectedKind {
        expected: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    SynthType(#[from] InvalidSynthType),
}

/// A document: the arena of directives and its root file node.
#[derive(Debug, Clone)]
pub struct DirectiveTree {
    nodes: SlotMap<DirectiveId, Directive>,
    root: DirectiveId,
}

impl Default for DirectiveTree {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! typed_access {
    ($get:ident, $get_mut:ident, $variant:ident, $ty:ty, $name:literal) => {
        pub fn $get(&self, id: DirectiveId) -> Result<&$ty, TreeError> {
            match self.kind(id)? {
                DirectiveKind::$variant(value) => Ok(value),
                other => Err(TreeError::UnexpectedKind {
                    expected: $name,
                    found: other.name(),
                }),
            }
        }

        pub fn $get_mut(&mut self, id: DirectiveId) -> Result<&mut $ty, TreeError> {
            match self.kind_mut(id)? {
                DirectiveKind::$variant(value) => Ok(value),
                other => Err(TreeError::UnexpectedKind {
                    expected: $name,
                    found: other.name(),
                }),
            }
        }
    };
}

impl DirectiveTree {
    /// Creates an empty document.
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Directive::new(DirectiveKind::File(File::new())));
        Self { nodes, root }
    }

    pub fn root(&self) -> DirectiveId {
        self.root
    }

    /// Number of nodes in the arena, attached or not
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena holds nothing but the root
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Adds a detached node to the arena.
    pub fn create(&mut self, kind: DirectiveKind) -> DirectiveId {
        self.nodes.insert(Directive::new(kind))
    }

    pub fn contains(&self, id: DirectiveId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: DirectiveId) -> Result<&Directive, TreeError> {
        self.nodes.get(id).ok_or(TreeError::UnknownNode)
    }

    fn get_mut(&mut self, id: DirectiveId) -> Result<&mut Directive, TreeError> {
        self.nodes.get_mut(id).ok_or(TreeError::UnknownNode)
    }

    pub fn kind(&self, id: DirectiveId) -> Result<&DirectiveKind, TreeError> {
        Ok(self.get(id)?.kind())
    }

    pub(crate) fn kind_mut(&mut self, id: DirectiveId) -> Result<&mut DirectiveKind, TreeError> {
        Ok(self.get_mut(id)?.kind_mut())
    }

    typed_access!(part, part_mut, Part, Part, "part");
    typed_access!(block, block_mut, LSynth, LSynthBlock, "LSynth block");
    typed_access!(model, model_mut, Model, Model, "model");
    typed_access!(step, step_mut, Step, Step, "step");

    pub fn colorable(&self, id: DirectiveId) -> Result<&dyn Colorable, TreeError> {
        let kind = self.kind(id)?;
        kind.as_colorable().ok_or(TreeError::UnexpectedKind {
            expected: "colored directive",
            found: kind.name(),
        })
    }

    pub fn colorable_mut(&mut self, id: DirectiveId) -> Result<&mut dyn Colorable, TreeError> {
        let kind = self.kind_mut(id)?;
        let found = kind.name();
        kind.as_colorable_mut().ok_or(TreeError::UnexpectedKind {
            expected: "colored directive",
            found,
        })
    }

    pub fn parent(&self, id: DirectiveId) -> Result<Option<DirectiveId>, TreeError> {
        Ok(self.get(id)?.parent())
    }

    pub fn children(&self, id: DirectiveId) -> Result<&[DirectiveId], TreeError> {
        Ok(self.get(id)?.children())
    }

    /// Synthesized parts of an LSynth block; empty for other nodes.
    pub fn synthesized(&self, id: DirectiveId) -> Result<&[DirectiveId], TreeError> {
        Ok(self.get(id)?.synthesized())
    }

    /// Position of `id` among its container's children.
    ///
    /// # Errors
    ///
    /// [`TreeError::DetachedNode`] for detached nodes, and
    /// [`TreeError::DerivedNode`] for synthesized parts, which are not
    /// children.
    pub fn index_in_parent(&self, id: DirectiveId) -> Result<usize, TreeError> {
        let parent = self.parent(id)?.ok_or(TreeError::DetachedNode)?;
        let container = self.get(parent)?;
        container
            .children()
            .iter()
            .position(|child| *child == id)
            .ok_or(TreeError::DerivedNode)
    }

    /// Whether `id` is one of the synthesized parts of its container.
    pub fn is_synthesized(&self, id: DirectiveId) -> bool {
        self.get(id)
            .ok()
            .and_then(|node| node.parent())
            .and_then(|parent| self.nodes.get(parent))
            .is_some_and(|container| container.synthesized().contains(&id))
    }

    /// Models of the document, in file order.
    pub fn models(&self) -> &[DirectiveId] {
        self.nodes
            .get(self.root)
            .map(Directive::children)
            .unwrap_or_default()
    }

    /// Whether the document is written as a multi-part file.
    pub fn is_mpd(&self) -> bool {
        let flagged = matches!(
            self.kind(self.root),
            Ok(DirectiveKind::File(file)) if file.is_mpd()
        );
        flagged || self.models().len() > 1
    }

    pub fn set_mpd(&mut self, mpd: bool) {
        if let Ok(DirectiveKind::File(file)) = self.kind_mut(self.root) {
            file.set_mpd(mpd);
        }
    }

    /// Inserts a detached node into `container` at `index`.
    ///
    /// `index == len` appends. A part inserted into an LSynth block becomes a
    /// constraint (role `Mid` unless it already has one) and the block is
    /// marked stale; a part inserted anywhere else loses its role.
    ///
    /// # Errors
    ///
    /// - [`TreeError::AlreadyAttached`] if the node already has a container
    /// - [`TreeError::NotAContainer`] / [`TreeError::InvalidChild`] if the
    ///   container cannot hold the node
    /// - [`TreeError::Cycle`] if the node is the container or one of its
    ///   ancestors
    /// - [`TreeError::IndexOutOfRange`] if `index > len`
    pub fn insert(
        &mut self,
        child: DirectiveId,
        container: DirectiveId,
        index: usize,
    ) -> Result<(), TreeError> {
        self.check_insertable(child, container)?;
        if self.get(child)?.parent().is_some() {
            return Err(TreeError::AlreadyAttached);
        }
        let len = self.children(container)?.len();
        if index > len {
            return Err(TreeError::IndexOutOfRange { index, len });
        }

        self.get_mut(container)?.children_mut().insert(index, child);
        self.get_mut(child)?.set_parent(Some(container));
        self.adopt(child, container)?;
        trace!(index = index; "Inserted directive");
        Ok(())
    }

    /// Appends a detached node at the end of `container`.
    pub fn append(&mut self, child: DirectiveId, container: DirectiveId) -> Result<(), TreeError> {
        let len = self.children(container)?.len();
        self.insert(child, container, len)
    }

    /// Detaches `child` from `expected_parent`, returning its former index.
    ///
    /// The node stays in the arena with its subtree.
    ///
    /// # Errors
    ///
    /// - [`TreeError::NotAChild`] if `child` is not held by `expected_parent`
    /// - [`TreeError::DerivedNode`] if `child` is a synthesized part
    pub fn remove(
        &mut self,
        child: DirectiveId,
        expected_parent: DirectiveId,
    ) -> Result<usize, TreeError> {
        if child == self.root {
            return Err(TreeError::RootNode);
        }
        if self.get(child)?.parent() != Some(expected_parent) {
            return Err(TreeError::NotAChild);
        }
        let index = self.index_in_parent(child)?;

        self.get_mut(expected_parent)?.children_mut().remove(index);
        self.get_mut(child)?.set_parent(None);
        if let Ok(block) = self.block_mut(expected_parent) {
            block.set_stale(true);
        }
        self.refresh_subdirective_selected(expected_parent);
        trace!(index = index; "Removed directive");
        Ok(index)
    }

    /// Detaches `child` from whatever holds it, returning the former
    /// container and index.
    pub fn detach(&mut self, child: DirectiveId) -> Result<(DirectiveId, usize), TreeError> {
        let parent = self.parent(child)?.ok_or(TreeError::DetachedNode)?;
        let index = self.remove(child, parent)?;
        Ok((parent, index))
    }

    /// Moves `child` to `index` of `container` in one step.
    ///
    /// Within the same container `index` refers to the list as it was before
    /// the move: a target after the original position shifts down by one
    /// once the node is detached. On error nothing changes.
    pub fn move_node(
        &mut self,
        child: DirectiveId,
        container: DirectiveId,
        index: usize,
    ) -> Result<(), TreeError> {
        let from = self.parent(child)?.ok_or(TreeError::DetachedNode)?;
        let from_index = self.index_in_parent(child)?;
        self.check_insertable(child, container)?;

        let same = from == container;
        let len = self.children(container)?.len() - usize::from(same);
        let target = if same && index > from_index {
            index - 1
        } else {
            index
        };
        if target > len {
            return Err(TreeError::IndexOutOfRange { index, len });
        }

        self.remove(child, from)?;
        self.insert(child, container, target)
    }

    /// Frees `id` and everything below it, detaching it first if needed.
    pub fn delete_subtree(&mut self, id: DirectiveId) -> Result<(), TreeError> {
        if let Some(parent) = self.parent(id)? {
            if self.is_synthesized(id) {
                return Err(TreeError::DerivedNode);
            }
            self.remove(id, parent)?;
        } else if id == self.root {
            return Err(TreeError::RootNode);
        }
        for node in self.descendants(id)? {
            self.nodes.remove(node);
        }
        Ok(())
    }

    /// `id` followed by all nodes below it, in write order.
    pub fn descendants(&self, id: DirectiveId) -> Result<Vec<DirectiveId>, TreeError> {
        self.get(id)?;
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            order.push(current);
            if let Some(node) = self.nodes.get(current) {
                stack.extend(node.synthesized().iter().rev());
                stack.extend(node.children().iter().rev());
            }
        }
        Ok(order)
    }

    /// All LSynth blocks of the document, in write order.
    pub fn blocks(&self) -> Vec<DirectiveId> {
        self.descendants(self.root)
            .unwrap_or_default()
            .into_iter()
            .filter(|id| matches!(self.kind(*id), Ok(DirectiveKind::LSynth(_))))
            .collect()
    }

    /// The step holding `id`, if any.
    pub fn enclosing_step(&self, id: DirectiveId) -> Result<Option<DirectiveId>, TreeError> {
        self.enclosing(id, |kind| matches!(kind, DirectiveKind::Step(_)))
    }

    /// The model holding `id`, if any.
    pub fn enclosing_model(&self, id: DirectiveId) -> Result<Option<DirectiveId>, TreeError> {
        self.enclosing(id, |kind| matches!(kind, DirectiveKind::Model(_)))
    }

    /// The LSynth block holding `id` as a constraint or synthesized part.
    pub fn enclosing_block(&self, id: DirectiveId) -> Result<Option<DirectiveId>, TreeError> {
        self.enclosing(id, |kind| matches!(kind, DirectiveKind::LSynth(_)))
    }

    fn enclosing(
        &self,
        id: DirectiveId,
        wanted: impl Fn(&DirectiveKind) -> bool,
    ) -> Result<Option<DirectiveId>, TreeError> {
        let mut current = self.parent(id)?.ok_or(TreeError::DetachedNode)?;
        loop {
            let node = self.get(current)?;
            if wanted(node.kind()) {
                return Ok(Some(current));
            }
            match node.parent() {
                Some(parent) => current = parent,
                None => return Ok(None),
            }
        }
    }

    /// Selects or deselects `id`.
    ///
    /// Selecting a constraint updates the block's `subdirective_selected`
    /// flag, which decides whether edits re-synthesize eagerly.
    pub fn set_selected(&mut self, id: DirectiveId, selected: bool) -> Result<(), TreeError> {
        self.get_mut(id)?.flags_mut().selected = selected;
        if let Some(parent) = self.parent(id)? {
            self.refresh_subdirective_selected(parent);
        }
        Ok(())
    }

    pub fn is_selected(&self, id: DirectiveId) -> Result<bool, TreeError> {
        Ok(self.get(id)?.flags().selected)
    }

    /// Hides or shows `id`. For an LSynth block this is the written
    /// `SHOW`/`HIDE` state; for other nodes a transient flag.
    pub fn set_hidden(&mut self, id: DirectiveId, hidden: bool) -> Result<(), TreeError> {
        if matches!(self.kind(id)?, DirectiveKind::LSynth(_)) {
            self.block_mut(id)?.set_hidden(hidden);
        } else {
            self.get_mut(id)?.flags_mut().hidden = hidden;
        }
        Ok(())
    }

    pub fn is_hidden(&self, id: DirectiveId) -> Result<bool, TreeError> {
        let node = self.get(id)?;
        Ok(match node.kind() {
            DirectiveKind::LSynth(block) => block.is_hidden(),
            _ => node.flags().hidden,
        })
    }

    pub(crate) fn set_translucent(&mut self, id: DirectiveId, translucent: bool) -> Result<(), TreeError> {
        self.get_mut(id)?.flags_mut().translucent = translucent;
        Ok(())
    }

    /// Marks the block affected by a change to `id` stale: `id` itself if it
    /// is a block, or its block if it is a constraint.
    pub fn mark_stale(&mut self, id: DirectiveId) -> Result<(), TreeError> {
        let target = match self.kind(id)? {
            DirectiveKind::LSynth(_) => Some(id),
            _ => self
                .parent(id)?
                .filter(|parent| matches!(self.kind(*parent), Ok(DirectiveKind::LSynth(_)))),
        };
        if let Some(block) = target {
            self.block_mut(block)?.set_stale(true);
        }
        Ok(())
    }

    /// The model whose name matches the reference name of `part`, if it is
    /// a model of this document.
    pub fn referenced_submodel(&self, part: DirectiveId) -> Result<Option<DirectiveId>, TreeError> {
        let name = self.part(part)?.reference_name().to_string();
        Ok(self.find_model(&name))
    }

    /// Finds a model by `0 FILE` name or `0 Name:` header, ignoring case.
    pub fn find_model(&self, name: &str) -> Option<DirectiveId> {
        self.models()
            .iter()
            .copied()
            .find(|id| self.model(*id).is_ok_and(|model| model.answers_to(name)))
    }

    /// Adds a synthesized part to `block`.
    ///
    /// Used by synthesis and when reading a block back from a file.
    pub fn insert_synthesized(&mut self, block: DirectiveId, part: Part) -> Result<DirectiveId, TreeError> {
        self.block(block)?;
        let mut part = part;
        part.set_constraint_role(None);
        let id = self.create(DirectiveKind::Part(part));
        self.get_mut(block)?.synthesized_mut().push(id);
        self.get_mut(id)?.set_parent(Some(block));
        Ok(id)
    }

    /// Frees every synthesized part of `block`, returning how many there were.
    pub fn clear_synthesized(&mut self, block: DirectiveId) -> Result<usize, TreeError> {
        self.block(block)?;
        let discarded = std::mem::take(self.get_mut(block)?.synthesized_mut());
        for id in &discarded {
            self.nodes.remove(*id);
        }
        Ok(discarded.len())
    }

    fn check_insertable(&self, child: DirectiveId, container: DirectiveId) -> Result<(), TreeError> {
        let child_kind = self.kind(child)?;
        let container_kind = self.kind(container)?;
        if !container_kind.is_container() {
            return Err(TreeError::NotAContainer(container_kind.name()));
        }
        if !container_kind.accepts(child_kind) {
            return Err(TreeError::InvalidChild {
                container: container_kind.name(),
                child: child_kind.name(),
            });
        }
        if self.is_synthesized(child) {
            return Err(TreeError::DerivedNode);
        }
        let mut current = Some(container);
        while let Some(id) = current {
            if id == child {
                return Err(TreeError::Cycle);
            }
            current = self.get(id)?.parent();
        }
        Ok(())
    }

    /// Applies the container-specific effects of a fresh insertion.
    fn adopt(&mut self, child: DirectiveId, container: DirectiveId) -> Result<(), TreeError> {
        let into_block = matches!(self.kind(container)?, DirectiveKind::LSynth(_));
        if let Ok(part) = self.part_mut(child) {
            if into_block {
                if part.constraint_role().is_none() {
                    part.set_constraint_role(Some(ConstraintRole::Mid));
                }
            } else {
                part.set_constraint_role(None);
            }
        }
        if into_block {
            self.block_mut(container)?.set_stale(true);
            self.refresh_subdirective_selected(container);
        }
        Ok(())
    }

    fn refresh_subdirective_selected(&mut self, container: DirectiveId) {
        let Some(node) = self.nodes.get(container) else {
            return;
        };
        if !matches!(node.kind(), DirectiveKind::LSynth(_)) {
            return;
        }
        let selected = node
            .children()
            .iter()
            .any(|id| self.nodes.get(*id).is_some_and(|child| child.flags().selected));
        if let Ok(block) = self.block_mut(container) {
            block.set_subdirective_selected(selected);
        }
    }
}


#[cfg(test)]
mod proptest_tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{color::ColorCode, geometry::Transform};

    #[derive(Debug, Clone)]
    enum Op {
        Insert { step: usize, index: usize },
        Remove { node: usize },
        Move { node: usize, step: usize, index: usize },
    }

    // ===================
    // Strategies
    // ===================

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..3, 0usize..8).prop_map(|(step, index)| Op::Insert { step, index }),
            (0usize..16).prop_map(|node| Op::Remove { node }),
            (0usize..16, 0usize..3, 0usize..8).prop_map(|(node, step, index)| Op::Move {
                node,
                step,
                index
            }),
        ]
    }

    // ===================
    // Property Test Functions
    // ===================

    /// Every attached node is listed exactly once, by the container its
    /// back-reference names.
    fn check_ownership_invariant(ops: Vec<Op>) -> Result<(), TestCaseError> {
        let mut tree = DirectiveTree::new();
        let model = tree.create(DirectiveKind::Model(Model::new()));
        tree.append(model, tree.root()).unwrap();
        let steps: Vec<DirectiveId> = (0..3)
            .map(|_| {
                let step = tree.create(DirectiveKind::Step(Step::new()));
                tree.append(step, model).unwrap();
                step
            })
            .collect();
        let mut parts: Vec<DirectiveId> = Vec::new();

        for op in ops {
            // Contract violations are expected here; they must leave the
            // tree consistent.
            match op {
                Op::Insert { step, index } => {
                    let id = tree.create(DirectiveKind::Part(Part::new(
                        "3001.dat",
                        ColorCode::Indexed(1),
                        Transform::identity(),
                    )));
                    parts.push(id);
                    let _ = tree.insert(id, steps[step], index);
                }
                Op::Remove { node } => {
                    if let Some(id) = parts.get(node) {
                        if let Ok(Some(parent)) = tree.parent(*id) {
                            let _ = tree.remove(*id, parent);
                        }
                    }
                }
                Op::Move { node, step, index } => {
                    if let Some(id) = parts.get(node) {
                        let _ = tree.move_node(*id, steps[step], index);
                    }
                }
            }

            let mut seen = std::collections::HashSet::new();
            for step in &steps {
                for child in tree.children(*step).unwrap() {
                    prop_assert!(seen.insert(*child), "node held twice");
                    prop_assert_eq!(tree.parent(*child).unwrap(), Some(*step));
                }
            }
            for id in &parts {
                if let Some(parent) = tree.parent(*id).unwrap() {
                    prop_assert!(tree.children(parent).unwrap().contains(id));
                } else {
                    prop_assert!(!seen.contains(id));
                }
            }
        }
        Ok(())
    }

    // ===================
    // Proptest Wrappers
    // ===================

    proptest! {
        #[test]
        fn ownership_invariant(ops in prop::collection::vec(op_strategy(), 1..40)) {
            check_ownership_invariant(ops)?;
        }
    }
}
