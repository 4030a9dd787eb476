//! Piece counts and model dimensions.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::{
    color::{ColorCode, Colorable},
    directive::DirectiveKind,
    geometry::{BoundingBox, Point3, Transform, Vec3},
    part_library::PartLibrary,
    tree::{DirectiveId, DirectiveTree, TreeError},
};

/// Number of pieces per part and color, sub-models expanded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartReport {
    counts: BTreeMap<(String, ColorCode), usize>,
}

impl PartReport {
    /// Counts the pieces of `model`.
    ///
    /// References to models of the same document are expanded in place;
    /// a part colored `16` takes the color of the reference that placed it.
    /// LSynth constraints are markers and are skipped; synthesized parts are
    /// real pieces and counted. A model that references itself, directly or
    /// through others, is expanded once per path.
    pub fn collect(tree: &DirectiveTree, model: DirectiveId) -> Result<Self, TreeError> {
        tree.model(model)?;
        let mut report = Self::default();
        let mut path = vec![model];
        report.count_model(tree, model, ColorCode::Current, &mut path)?;
        debug!(pieces = report.total(), kinds = report.counts.len(); "Collected part report");
        Ok(report)
    }

    fn count_model(
        &mut self,
        tree: &DirectiveTree,
        model: DirectiveId,
        inherited: ColorCode,
        path: &mut Vec<DirectiveId>,
    ) -> Result<(), TreeError> {
        for id in placed_parts(tree, model)? {
            let part = tree.part(id)?;
            let color = match part.color() {
                ColorCode::Current => inherited,
                color => color,
            };
            match tree.referenced_submodel(id)? {
                Some(sub) if path.contains(&sub) => {
                    debug!(part = part.reference_name(); "Skipping recursive sub-model reference");
                }
                Some(sub) => {
                    path.push(sub);
                    self.count_model(tree, sub, color, path)?;
                    path.pop();
                }
                None => {
                    *self
                        .counts
                        .entry((part.reference_name().to_string(), color))
                        .or_default() += 1;
                }
            }
        }
        Ok(())
    }

    /// Total number of pieces
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// `(reference name, color, count)`, sorted by name then color.
    pub fn entries(&self) -> impl Iterator<Item = (&str, ColorCode, usize)> + '_ {
        self.counts
            .iter()
            .map(|((name, color), count)| (name.as_str(), *color, *count))
    }

    /// Part names the library cannot resolve, sorted and without duplicates.
    pub fn missing(&self, library: &dyn PartLibrary) -> Vec<&str> {
        let names: BTreeSet<&str> = self.counts.keys().map(|(name, _)| name.as_str()).collect();
        names
            .into_iter()
            .filter(|name| library.resolve(name).is_err())
            .collect()
    }
}

/// Extent of a model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dimensions {
    /// Box around every resolved part and primitive; `None` when there are
    /// none.
    pub bounds: Option<BoundingBox>,
    /// Parts skipped because the library could not resolve them
    pub unresolved: Vec<String>,
}

impl Dimensions {
    pub fn size(&self) -> Option<Vec3> {
        self.bounds.map(|bounds| bounds.size())
    }

    fn include(&mut self, other: BoundingBox) {
        self.bounds = Some(match self.bounds {
            Some(bounds) => bounds.union(&other),
            None => other,
        });
    }
}

/// Measures `model` in LDraw units, expanding referenced sub-models.
pub fn dimensions(
    tree: &DirectiveTree,
    model: DirectiveId,
    library: &dyn PartLibrary,
) -> Result<Dimensions, TreeError> {
    tree.model(model)?;
    let mut dims = Dimensions::default();
    let mut path = vec![model];
    measure_model(tree, model, &Transform::identity(), library, &mut dims, &mut path)?;
    Ok(dims)
}

fn measure_model(
    tree: &DirectiveTree,
    model: DirectiveId,
    placement: &Transform,
    library: &dyn PartLibrary,
    dims: &mut Dimensions,
    path: &mut Vec<DirectiveId>,
) -> Result<(), TreeError> {
    for id in tree.descendants(model)? {
        let points: &[Point3] = match tree.kind(id)? {
            DirectiveKind::Line(line) => line.points(),
            DirectiveKind::Triangle(triangle) => triangle.points(),
            DirectiveKind::Quadrilateral(quad) => quad.points(),
            // Control points of an optional line are not drawn
            DirectiveKind::ConditionalLine(line) => &line.points()[..2],
            _ => continue,
        };
        if let Some(bounds) = BoundingBox::from_points(points.iter().map(|p| placement.apply_point(p))) {
            dims.include(bounds);
        }
    }

    for id in placed_parts(tree, model)? {
        let part = tree.part(id)?;
        let world = part.transform().then(placement);
        match tree.referenced_submodel(id)? {
            Some(sub) if path.contains(&sub) => {}
            Some(sub) => {
                path.push(sub);
                measure_model(tree, sub, &world, library, dims, path)?;
                path.pop();
            }
            None => match library.resolve(part.reference_name()) {
                Ok(resolved) => dims.include(resolved.bounds().transformed(&world)),
                Err(_) => {
                    if !dims.unresolved.iter().any(|name| name == part.reference_name()) {
                        dims.unresolved.push(part.reference_name().to_string());
                    }
                }
            },
        }
    }
    Ok(())
}

/// Parts of `model` that stand for real pieces: everything but LSynth
/// constraints, synthesized parts included.
fn placed_parts(tree: &DirectiveTree, model: DirectiveId) -> Result<Vec<DirectiveId>, TreeError> {
    let mut parts = Vec::new();
    for id in tree.descendants(model)? {
        if !matches!(tree.kind(id)?, DirectiveKind::Part(_)) {
            continue;
        }
        let is_constraint = match tree.parent(id)? {
            Some(parent) => {
                matches!(tree.kind(parent)?, DirectiveKind::LSynth(_)) && !tree.is_synthesized(id)
            }
            None => false,
        };
        if !is_constraint {
            parts.push(id);
        }
    }
    Ok(parts)
}
