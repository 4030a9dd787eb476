//! Reversible edit commands.
//!
//! An [`Edit`] is a plain value. [`Edit::apply`] performs it on a tree and
//! returns the edit that undoes it; keeping a history is up to the caller.

use log::{trace, warn};

use crate::{
    color::ColorCode,
    geometry::Transform,
    lsynth::ConstraintRole,
    tree::{DirectiveId, DirectiveTree, TreeError},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// Attach a detached node at `index` of `parent`
    Insert {
        node: DirectiveId,
        parent: DirectiveId,
        index: usize,
    },
    /// Detach a node from `parent`; it stays in the arena
    Remove {
        node: DirectiveId,
        parent: DirectiveId,
    },
    /// Move a node; `index` is interpreted as in [`DirectiveTree::move_node`]
    Move {
        node: DirectiveId,
        parent: DirectiveId,
        index: usize,
    },
    SetTransform {
        node: DirectiveId,
        old: Transform,
        new: Transform,
    },
    SetColor {
        node: DirectiveId,
        old: ColorCode,
        new: ColorCode,
    },
    SetHidden {
        node: DirectiveId,
        old: bool,
        new: bool,
    },
    /// Relabel a constraint
    SetRole {
        node: DirectiveId,
        old: Option<ConstraintRole>,
        new: Option<ConstraintRole>,
    },
    /// Several edits applied in order, undone in reverse
    Compound(Vec<Edit>),
}

impl Edit {
    /// Builds a transform change for a part, capturing its current transform.
    pub fn set_transform(
        tree: &DirectiveTree,
        node: DirectiveId,
        new: Transform,
    ) -> Result<Self, TreeError> {
        let old = *tree.part(node)?.transform();
        Ok(Self::SetTransform { node, old, new })
    }

    /// Builds a color change, capturing the current color.
    pub fn set_color(tree: &DirectiveTree, node: DirectiveId, new: ColorCode) -> Result<Self, TreeError> {
        let old = tree.colorable(node)?.color();
        Ok(Self::SetColor { node, old, new })
    }

    pub fn set_hidden(tree: &DirectiveTree, node: DirectiveId, new: bool) -> Result<Self, TreeError> {
        let old = tree.is_hidden(node)?;
        Ok(Self::SetHidden { node, old, new })
    }

    /// Builds a constraint role change, capturing the current role.
    pub fn set_role(
        tree: &DirectiveTree,
        node: DirectiveId,
        new: Option<ConstraintRole>,
    ) -> Result<Self, TreeError> {
        let old = tree.part(node)?.constraint_role();
        Ok(Self::SetRole { node, old, new })
    }

    /// Nodes whose containing block may need re-synthesis after this edit.
    pub fn touched(&self) -> Vec<DirectiveId> {
        match self {
            Self::Insert { node, parent, .. }
            | Self::Remove { node, parent }
            | Self::Move { node, parent, .. } => vec![*node, *parent],
            Self::SetTransform { node, .. }
            | Self::SetColor { node, .. }
            | Self::SetHidden { node, .. }
            | Self::SetRole { node, .. } => vec![*node],
            Self::Compound(edits) => edits.iter().flat_map(Edit::touched).collect(),
        }
    }

    /// Performs the edit and returns its inverse.
    ///
    /// A move that changes the node's constraint role, by taking it into
    /// or out of an LSynth block, is undone by a compound of the reverse
    /// move and the role change. A compound edit that fails part-way is
    /// rolled back before the error is returned.
    pub fn apply(&self, tree: &mut DirectiveTree) -> Result<Edit, TreeError> {
        match self {
            Self::Insert { node, parent, index } => {
                tree.insert(*node, *parent, *index)?;
                Ok(Self::Remove {
                    node: *node,
                    parent: *parent,
                })
            }
            Self::Remove { node, parent } => {
                let index = tree.remove(*node, *parent)?;
                Ok(Self::Insert {
                    node: *node,
                    parent: *parent,
                    index,
                })
            }
            Self::Move { node, parent, index } => {
                let from = tree.parent(*node)?.ok_or(TreeError::DetachedNode)?;
                let from_index = tree.index_in_parent(*node)?;
                let role_before = role_of(tree, *node);
                tree.move_node(*node, *parent, *index)?;
                let now = tree.index_in_parent(*node)?;
                // Moving back within one container counts the node itself
                let back = if from == *parent && from_index > now {
                    from_index + 1
                } else {
                    from_index
                };
                let undo_move = Self::Move {
                    node: *node,
                    parent: from,
                    index: back,
                };
                let role_after = role_of(tree, *node);
                if role_before == role_after {
                    Ok(undo_move)
                } else {
                    Ok(Self::Compound(vec![
                        undo_move,
                        Self::SetRole {
                            node: *node,
                            old: role_after,
                            new: role_before,
                        },
                    ]))
                }
            }
            Self::SetTransform { node, old, new } => {
                tree.part_mut(*node)?.set_transform(*new);
                tree.mark_stale(*node)?;
                Ok(Self::SetTransform {
                    node: *node,
                    old: *new,
                    new: *old,
                })
            }
            Self::SetColor { node, old, new } => {
                tree.colorable_mut(*node)?.set_color(*new);
                tree.mark_stale(*node)?;
                Ok(Self::SetColor {
                    node: *node,
                    old: *new,
                    new: *old,
                })
            }
            Self::SetHidden { node, old, new } => {
                tree.set_hidden(*node, *new)?;
                tree.mark_stale(*node)?;
                Ok(Self::SetHidden {
                    node: *node,
                    old: *new,
                    new: *old,
                })
            }
            Self::SetRole { node, old, new } => {
                tree.part_mut(*node)?.set_constraint_role(*new);
                tree.mark_stale(*node)?;
                Ok(Self::SetRole {
                    node: *node,
                    old: *new,
                    new: *old,
                })
            }
            Self::Compound(edits) => {
                let mut inverses: Vec<Edit> = Vec::with_capacity(edits.len());
                for edit in edits {
                    match edit.apply(tree) {
                        Ok(inverse) => inverses.push(inverse),
                        Err(err) => {
                            trace!(applied = inverses.len(); "Rolling back compound edit");
                            for inverse in inverses.iter().rev() {
                                if let Err(rollback) = inverse.apply(tree) {
                                    warn!(err:% = rollback; "Could not roll back compound edit");
                                }
                            }
                            return Err(err);
                        }
                    }
                }
                inverses.reverse();
                Ok(Self::Compound(inverses))
            }
        }
    }
}

fn role_of(tree: &DirectiveTree, node: DirectiveId) -> Option<ConstraintRole> {
    tree.part(node).ok().and_then(|part| part.constraint_role())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        color::Colorable,
        directive::{DirectiveKind, Model, Part, Step},
        geometry::Vec3,
        lsynth::{LSynthBlock, SynthClass},
    };

    fn setup(names: &[&str]) -> (DirectiveTree, DirectiveId, Vec<DirectiveId>) {
        let mut tree = DirectiveTree::new();
        let model = tree.create(DirectiveKind::Model(Model::new()));
        tree.append(model, tree.root()).unwrap();
        let step = tree.create(DirectiveKind::Step(Step::new()));
        tree.append(step, model).unwrap();
        let parts = names
            .iter()
            .map(|name| {
                let id = tree.create(DirectiveKind::Part(Part::new(
                    *name,
                    ColorCode::Indexed(1),
                    Transform::identity(),
                )));
                tree.append(id, step).unwrap();
                id
            })
            .collect();
        (tree, step, parts)
    }

    #[test]
    fn test_insert_and_undo() {
        let (mut tree, step, parts) = setup(&["a.dat"]);
        let extra = tree.create(DirectiveKind::Part(Part::new(
            "b.dat",
            ColorCode::Indexed(2),
            Transform::identity(),
        )));
        let before = tree.write();

        let inverse = Edit::Insert {
            node: extra,
            parent: step,
            index: 0,
        }
        .apply(&mut tree)
        .unwrap();
        assert_eq!(tree.children(step).unwrap(), &[extra, parts[0]]);

        let redo = inverse.apply(&mut tree).unwrap();
        assert_eq!(tree.write(), before);
        assert_eq!(
            redo,
            Edit::Insert {
                node: extra,
                parent: step,
                index: 0
            }
        );
    }

    #[test]
    fn test_move_undo_restores_order() {
        let (mut tree, step, parts) = setup(&["a.dat", "b.dat", "x.dat"]);

        let inverse = Edit::Move {
            node: parts[2],
            parent: step,
            index: 0,
        }
        .apply(&mut tree)
        .unwrap();
        assert_eq!(tree.children(step).unwrap(), &[parts[2], parts[0], parts[1]]);

        inverse.apply(&mut tree).unwrap();
        assert_eq!(tree.children(step).unwrap(), parts.as_slice());
    }

    #[test]
    fn test_move_forward_undo() {
        let (mut tree, step, parts) = setup(&["a.dat", "b.dat", "c.dat"]);

        let inverse = Edit::Move {
            node: parts[0],
            parent: step,
            index: 3,
        }
        .apply(&mut tree)
        .unwrap();
        assert_eq!(tree.children(step).unwrap(), &[parts[1], parts[2], parts[0]]);

        inverse.apply(&mut tree).unwrap();
        assert_eq!(tree.children(step).unwrap(), parts.as_slice());
    }

    #[test]
    fn test_set_color_inverse() {
        let (mut tree, _, parts) = setup(&["a.dat"]);
        let edit = Edit::set_color(&tree, parts[0], ColorCode::Indexed(14)).unwrap();

        let inverse = edit.apply(&mut tree).unwrap();
        assert_eq!(tree.part(parts[0]).unwrap().color(), ColorCode::Indexed(14));

        inverse.apply(&mut tree).unwrap();
        assert_eq!(tree.part(parts[0]).unwrap().color(), ColorCode::Indexed(1));
    }

    #[test]
    fn test_constraint_edit_marks_block_stale() {
        let (mut tree, step, _) = setup(&[]);
        let block = tree.create(DirectiveKind::LSynth(LSynthBlock::new(
            "rigid-hose",
            Some(SynthClass::Hose),
            ColorCode::Indexed(0),
        )
        .unwrap()));
        tree.append(block, step).unwrap();
        let constraint = tree.create(DirectiveKind::Part(Part::new(
            "LS00.dat",
            ColorCode::Current,
            Transform::identity(),
        )));
        tree.append(constraint, block).unwrap();
        tree.block_mut(block).unwrap().set_stale(false);

        let moved = Transform::translation(Vec3::new(0.0, 0.0, 40.0));
        Edit::set_transform(&tree, constraint, moved)
            .unwrap()
            .apply(&mut tree)
            .unwrap();

        assert!(tree.block(block).unwrap().is_stale());
        assert_eq!(*tree.part(constraint).unwrap().transform(), moved);
    }

    #[test]
    fn test_compound_rolls_back_on_failure() {
        let (mut tree, step, parts) = setup(&["a.dat", "b.dat"]);
        let before = tree.write();

        let result = Edit::Compound(vec![
            Edit::set_color(&tree, parts[0], ColorCode::Indexed(4)).unwrap(),
            Edit::Remove {
                node: parts[1],
                parent: step,
            },
            Edit::Insert {
                node: parts[0],
                parent: step,
                index: 0,
            },
        ])
        .apply(&mut tree);

        assert_eq!(result, Err(TreeError::AlreadyAttached));
        assert_eq!(tree.write(), before);
    }

    #[test]
    fn test_compound_inverse_runs_in_reverse() {
        let (mut tree, step, parts) = setup(&["a.dat", "b.dat"]);
        let before = tree.write();

        let inverse = Edit::Compound(vec![
            Edit::Remove {
                node: parts[0],
                parent: step,
            },
            Edit::Insert {
                node: parts[0],
                parent: step,
                index: 1,
            },
        ])
        .apply(&mut tree)
        .unwrap();
        assert_eq!(tree.children(step).unwrap(), &[parts[1], parts[0]]);

        inverse.apply(&mut tree).unwrap();
        assert_eq!(tree.write(), before);
    }

    #[test]
    fn test_moving_constraint_out_and_back_restores_role() {
        let (mut tree, step, _) = setup(&[]);
        let block = tree.create(DirectiveKind::LSynth(LSynthBlock::new(
            "rigid-hose",
            Some(SynthClass::Hose),
            ColorCode::Indexed(0),
        )
        .unwrap()));
        tree.append(block, step).unwrap();
        let cross = tree.create(DirectiveKind::Part(
            Part::new("LS00.dat", ColorCode::Current, Transform::identity())
                .with_constraint_role(ConstraintRole::CrossSection),
        ));
        tree.append(cross, block).unwrap();

        let inverse = Edit::Move {
            node: cross,
            parent: step,
            index: 0,
        }
        .apply(&mut tree)
        .unwrap();
        assert_eq!(tree.part(cross).unwrap().constraint_role(), None);
        assert_eq!(
            inverse,
            Edit::Compound(vec![
                Edit::Move {
                    node: cross,
                    parent: block,
                    index: 0,
                },
                Edit::SetRole {
                    node: cross,
                    old: None,
                    new: Some(ConstraintRole::CrossSection),
                },
            ])
        );

        let redo = inverse.apply(&mut tree).unwrap();
        assert_eq!(tree.children(block).unwrap(), &[cross]);
        assert_eq!(
            tree.part(cross).unwrap().constraint_role(),
            Some(ConstraintRole::CrossSection)
        );

        redo.apply(&mut tree).unwrap();
        assert_eq!(tree.parent(cross).unwrap(), Some(step));
        assert_eq!(tree.part(cross).unwrap().constraint_role(), None);
    }

    #[test]
    fn test_set_role_inverse() {
        let (mut tree, _, parts) = setup(&["LS00.dat"]);

        let inverse = Edit::set_role(&tree, parts[0], Some(ConstraintRole::End))
            .unwrap()
            .apply(&mut tree)
            .unwrap();
        assert_eq!(tree.part(parts[0]).unwrap().constraint_role(), Some(ConstraintRole::End));

        inverse.apply(&mut tree).unwrap();
        assert_eq!(tree.part(parts[0]).unwrap().constraint_role(), None);
    }
}
