use log::{debug, warn};
use thiserror::Error;

use super::{
    block::ConstraintRole,
    rules::{Curve, RuleTable, SynthesisRule},
};
use crate::{
    color::Colorable,
    directive::{DirectiveKind, Part},
    geometry::{Point3, Transform, Vec3},
    part_library::PartLibrary,
    tree::{DirectiveId, DirectiveTree, TreeError},
};

const EPSILON: f64 = 1e-9;

/// Catmull-Rom segments are flattened into this many straight pieces.
const CURVE_SUBDIVISIONS: usize = 16;

/// Upper bound on parts placed for one block.
const MAX_SYNTHESIZED_PARTS: usize = 10_000;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SynthesisError {
    #[error("unknown synthesis type `{0}`")]
    UnknownType(String),

    #[error("directive is not an LSynth block")]
    NotABlock,

    #[error("synthesis type `{synth_type}` has invalid spacing {spacing}")]
    InvalidSpacing { synth_type: String, spacing: f64 },

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Outcome of synthesizing one block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisReport {
    /// Number of synthesized parts now held by the block
    pub placed: usize,
    /// Part names the library could not resolve, without duplicates
    pub unresolved: Vec<String>,
}

/// Runs synthesis with an injected rule table and part library.
pub struct Synthesizer<'a> {
    rules: &'a RuleTable,
    library: &'a dyn PartLibrary,
}

impl<'a> Synthesizer<'a> {
    pub fn new(rules: &'a RuleTable, library: &'a dyn PartLibrary) -> Self {
        Self { rules, library }
    }

    /// Regenerates the synthesized parts of `block`.
    ///
    /// Previously synthesized parts are discarded first, so running this
    /// twice on unchanged constraints yields identical output. Parts the
    /// library cannot resolve are still placed and listed in the report.
    ///
    /// # Errors
    ///
    /// - [`SynthesisError::NotABlock`] if `block` is not an LSynth block.
    /// - [`SynthesisError::UnknownType`] if the block's type has no rule; the
    ///   block and its current synthesized parts are left untouched.
    /// - [`SynthesisError::InvalidSpacing`] if the rule's spacing is not
    ///   positive.
    pub fn synthesize(
        &self,
        tree: &mut DirectiveTree,
        block: DirectiveId,
    ) -> Result<SynthesisReport, SynthesisError> {
        let (synth_type, color, translucent) = match tree.kind(block)? {
            DirectiveKind::LSynth(params) => (
                params.synth_type().to_string(),
                params.color(),
                params.is_translucent(),
            ),
            _ => return Err(SynthesisError::NotABlock),
        };
        let rule = self
            .rules
            .get(&synth_type)
            .ok_or_else(|| SynthesisError::UnknownType(synth_type.clone()))?;
        if rule.spacing().is_nan() || rule.spacing() <= EPSILON {
            return Err(SynthesisError::InvalidSpacing {
                synth_type,
                spacing: rule.spacing(),
            });
        }

        let points = path_points(tree, block)?;
        let samples = sample_path(&flatten(&points, rule), rule.spacing());

        let discarded = tree.clear_synthesized(block)?;
        debug!(
            synth_type = synth_type.as_str(),
            discarded = discarded,
            samples = samples.len();
            "Synthesizing LSynth block"
        );

        let mut report = SynthesisReport::default();
        for (index, sample) in samples.iter().enumerate() {
            let Some(name) = rule.part_for(index) else {
                break;
            };
            if self.library.resolve(name).is_err() && !report.unresolved.iter().any(|n| n == name) {
                warn!(part = name, synth_type = synth_type.as_str(); "Synthesized part is not in the library");
                report.unresolved.push(name.to_string());
            }
            let part = Part::new(name, color, sample.frame());
            let id = tree.insert_synthesized(block, part)?;
            tree.set_translucent(id, translucent)?;
            report.placed += 1;
        }

        tree.block_mut(block)?.set_stale(false);
        Ok(report)
    }

    /// Synthesizes every stale block in the tree.
    pub fn synthesize_stale(
        &self,
        tree: &mut DirectiveTree,
    ) -> Vec<(DirectiveId, Result<SynthesisReport, SynthesisError>)> {
        let stale: Vec<DirectiveId> = tree
            .blocks()
            .into_iter()
            .filter(|id| tree.block(*id).is_ok_and(|block| block.is_stale()))
            .collect();
        stale
            .into_iter()
            .map(|id| (id, self.synthesize(tree, id)))
            .collect()
    }

    /// Synthesizes every block in the tree.
    pub fn synthesize_all(
        &self,
        tree: &mut DirectiveTree,
    ) -> Vec<(DirectiveId, Result<SynthesisReport, SynthesisError>)> {
        tree.blocks()
            .into_iter()
            .map(|id| (id, self.synthesize(tree, id)))
            .collect()
    }
}

/// A point of the path with the up direction wanted there.
#[derive(Debug, Clone, Copy)]
struct PathPoint {
    position: Point3,
    up: Vec3,
}

impl PathPoint {
    fn lerp(&self, other: &PathPoint, t: f64) -> PathPoint {
        PathPoint {
            position: self.position + (other.position - self.position) * t,
            up: self.up.lerp(&other.up, t),
        }
    }
}

/// A placed sample: position, travel direction and up hint.
#[derive(Debug, Clone, Copy)]
struct Sample {
    point: PathPoint,
    tangent: Vec3,
}

impl Sample {
    /// Local +X follows the tangent, +Y leans towards the up hint.
    fn frame(&self) -> Transform {
        let x = self.tangent;
        let mut z = x.cross(&self.point.up);
        if z.norm() < EPSILON {
            let fallback = if x.y.abs() < 0.9 { Vec3::y() } else { Vec3::z() };
            z = x.cross(&fallback);
        }
        let z = z.normalize();
        let y = z.cross(&x);
        Transform::from_basis(x, y, z, self.point.position)
    }
}

/// Positions and local +Y axes of the block's path constraints, in order.
fn path_points(tree: &DirectiveTree, block: DirectiveId) -> Result<Vec<PathPoint>, TreeError> {
    let mut points: Vec<PathPoint> = Vec::new();
    for id in tree.children(block)? {
        let part = tree.part(*id)?;
        if part.constraint_role() == Some(ConstraintRole::CrossSection) {
            continue;
        }
        let transform = part.transform();
        let up = transform.apply_vector(&Vec3::y());
        let up = if up.norm() < EPSILON {
            Vec3::y()
        } else {
            up.normalize()
        };
        let position = transform.position();
        if points
            .last()
            .is_some_and(|last| (last.position - position).norm() < EPSILON)
        {
            continue;
        }
        points.push(PathPoint { position, up });
    }
    Ok(points)
}

/// Turns the control points into a polyline according to the rule.
fn flatten(points: &[PathPoint], rule: &SynthesisRule) -> Vec<PathPoint> {
    if points.len() < 2 {
        return points.to_vec();
    }
    let closed = rule.is_closed() && points.len() > 2;
    match rule.curve() {
        Curve::Linear => {
            let mut polyline = points.to_vec();
            if closed {
                polyline.push(points[0]);
            }
            polyline
        }
        Curve::CatmullRom => catmull_rom(points, closed),
    }
}

fn catmull_rom(points: &[PathPoint], closed: bool) -> Vec<PathPoint> {
    let n = points.len();
    let segments = if closed { n } else { n - 1 };
    let at = |index: isize| -> PathPoint {
        if closed {
            points[index.rem_euclid(n as isize) as usize]
        } else {
            points[index.clamp(0, n as isize - 1) as usize]
        }
    };

    let mut polyline = Vec::with_capacity(segments * CURVE_SUBDIVISIONS + 1);
    for segment in 0..segments as isize {
        let (p0, p1, p2, p3) = (at(segment - 1), at(segment), at(segment + 1), at(segment + 2));
        for step in 0..CURVE_SUBDIVISIONS {
            let t = step as f64 / CURVE_SUBDIVISIONS as f64;
            let (t2, t3) = (t * t, t * t * t);
            let position = Point3::from(
                (p1.position.coords * 2.0
                    + (p2.position - p0.position) * t
                    + (p0.position.coords * 2.0 - p1.position.coords * 5.0
                        + p2.position.coords * 4.0
                        - p3.position.coords)
                        * t2
                    + (p1.position.coords * 3.0 - p0.position.coords - p2.position.coords * 3.0
                        + p3.position.coords)
                        * t3)
                    * 0.5,
            );
            polyline.push(PathPoint {
                position,
                up: p1.up.lerp(&p2.up, t),
            });
        }
    }
    polyline.push(at(segments as isize));
    polyline
}

/// Samples the polyline every `spacing` units of arc length, starting at 0
/// and stopping strictly before its end.
fn sample_path(polyline: &[PathPoint], spacing: f64) -> Vec<Sample> {
    let mut samples = Vec::new();
    let mut walked = 0.0;
    for pair in polyline.windows(2) {
        let (start, end) = (&pair[0], &pair[1]);
        let delta = end.position - start.position;
        let length = delta.norm();
        if length < EPSILON {
            continue;
        }
        let tangent = delta / length;
        loop {
            let distance = samples.len() as f64 * spacing;
            if distance >= walked + length - EPSILON {
                break;
            }
            if samples.len() >= MAX_SYNTHESIZED_PARTS {
                warn!(limit = MAX_SYNTHESIZED_PARTS; "Synthesis truncated");
                return samples;
            }
            let t = (distance - walked) / length;
            samples.push(Sample {
                point: start.lerp(end, t),
                tangent,
            });
        }
        walked += length;
    }
    samples
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;

    use super::*;
    use crate::{
        color::ColorCode,
        directive::{Model, Step},
        geometry::BoundingBox,
        lsynth::{LSynthBlock, SynthClass, color_synthesized_parts_translucent},
        part_library::PartCatalog,
    };

    fn catalog() -> PartCatalog {
        let bounds = BoundingBox::new(Point3::new(-5.0, -5.0, -5.0), Point3::new(5.0, 5.0, 5.0));
        PartCatalog::new().with_part("LS71.dat", bounds)
    }

    fn hose_block(synth_type: &str, positions: &[(f64, f64, f64)]) -> (DirectiveTree, DirectiveId) {
        let mut tree = DirectiveTree::new();
        let model = tree.create(DirectiveKind::Model(Model::new()));
        tree.append(model, tree.root()).unwrap();
        let step = tree.create(DirectiveKind::Step(Step::new()));
        tree.append(step, model).unwrap();
        let block = tree.create(DirectiveKind::LSynth(LSynthBlock::new(
            synth_type,
            Some(SynthClass::Hose),
            ColorCode::Indexed(0),
        )
        .unwrap()));
        tree.append(block, step).unwrap();
        let last = positions.len().saturating_sub(1);
        for (i, (x, y, z)) in positions.iter().enumerate() {
            let role = match i {
                0 => ConstraintRole::Start,
                i if i == last => ConstraintRole::End,
                _ => ConstraintRole::Mid,
            };
            let part = Part::new(
                "LS00.dat",
                ColorCode::Current,
                Transform::translation(Vec3::new(*x, *y, *z)),
            )
            .with_constraint_role(role);
            let id = tree.create(DirectiveKind::Part(part));
            tree.append(id, block).unwrap();
        }
        (tree, block)
    }

    fn synthesized_positions(tree: &DirectiveTree, block: DirectiveId) -> Vec<Point3> {
        tree.synthesized(block)
            .unwrap()
            .iter()
            .map(|id| tree.part(*id).unwrap().transform().position())
            .collect()
    }

    #[test]
    fn test_rigid_hose_scenario() {
        let (mut tree, block) =
            hose_block("rigid-hose", &[(0.0, 0.0, 0.0), (10.0, 0.0, 0.0), (20.0, 0.0, 0.0)]);
        let rules = RuleTable::builtin();
        let library = catalog();

        let report = Synthesizer::new(&rules, &library)
            .synthesize(&mut tree, block)
            .unwrap();

        assert_eq!(report.placed, 2);
        assert!(report.unresolved.is_empty());
        assert_eq!(
            synthesized_positions(&tree, block),
            vec![Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0)]
        );
        for id in tree.synthesized(block).unwrap() {
            let part = tree.part(*id).unwrap();
            assert_eq!(part.transform().linear(), Transform::identity().linear());
            assert_eq!(part.color(), ColorCode::Indexed(0));
            assert_eq!(part.constraint_role(), None);
        }
        assert!(!tree.block(block).unwrap().is_stale());
    }

    #[test]
    fn test_synthesis_is_idempotent() {
        let (mut tree, block) = hose_block(
            "flexible-hose",
            &[(0.0, 0.0, 0.0), (40.0, 20.0, 0.0), (80.0, 0.0, 30.0)],
        );
        let rules = RuleTable::builtin();
        let library = catalog();
        let synthesizer = Synthesizer::new(&rules, &library);

        synthesizer.synthesize(&mut tree, block).unwrap();
        let first = tree.write_node(block).unwrap();
        let nodes = tree.len();
        synthesizer.synthesize(&mut tree, block).unwrap();

        assert_eq!(tree.write_node(block).unwrap(), first);
        assert_eq!(tree.len(), nodes);
    }

    #[test]
    fn test_unresolved_parts_are_placed_and_reported() {
        let (mut tree, block) =
            hose_block("rigid-hose", &[(0.0, 0.0, 0.0), (30.0, 0.0, 0.0)]);
        let rules = RuleTable::builtin();
        let library = PartCatalog::new();

        let report = Synthesizer::new(&rules, &library)
            .synthesize(&mut tree, block)
            .unwrap();

        assert_eq!(report.placed, 3);
        assert_eq!(report.unresolved, vec!["LS71.dat".to_string()]);
    }

    #[test]
    fn test_unknown_type_leaves_block_untouched() {
        let (mut tree, block) = hose_block("mystery-hose", &[(0.0, 0.0, 0.0), (30.0, 0.0, 0.0)]);
        let rules = RuleTable::builtin();
        let library = catalog();

        let result = Synthesizer::new(&rules, &library).synthesize(&mut tree, block);

        assert_eq!(
            result,
            Err(SynthesisError::UnknownType("mystery-hose".to_string()))
        );
        assert!(tree.synthesized(block).unwrap().is_empty());
        assert_eq!(tree.children(block).unwrap().len(), 2);
    }

    #[test]
    fn test_not_a_block() {
        let (mut tree, block) = hose_block("rigid-hose", &[(0.0, 0.0, 0.0)]);
        let constraint = tree.children(block).unwrap()[0];
        let rules = RuleTable::builtin();
        let library = catalog();
        assert_eq!(
            Synthesizer::new(&rules, &library).synthesize(&mut tree, constraint),
            Err(SynthesisError::NotABlock)
        );
    }

    #[test]
    fn test_single_constraint_places_nothing() {
        let (mut tree, block) = hose_block("rigid-hose", &[(5.0, 0.0, 0.0)]);
        let rules = RuleTable::builtin();
        let library = catalog();
        let report = Synthesizer::new(&rules, &library)
            .synthesize(&mut tree, block)
            .unwrap();
        assert_eq!(report.placed, 0);
    }

    #[test]
    fn test_cross_section_hints_are_not_path_points() {
        let (mut tree, block) =
            hose_block("rigid-hose", &[(0.0, 0.0, 0.0), (0.0, 0.0, 50.0), (20.0, 0.0, 0.0)]);
        let hint = tree.children(block).unwrap()[1];
        tree.part_mut(hint)
            .unwrap()
            .set_constraint_role(Some(ConstraintRole::CrossSection));
        let rules = RuleTable::builtin();
        let library = catalog();

        Synthesizer::new(&rules, &library)
            .synthesize(&mut tree, block)
            .unwrap();

        assert_eq!(
            synthesized_positions(&tree, block),
            vec![Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0)]
        );
    }

    #[test]
    fn test_closed_rule_loops_back() {
        let (mut tree, block) = hose_block(
            "loop",
            &[(0.0, 0.0, 0.0), (30.0, 0.0, 0.0), (30.0, 0.0, 40.0)],
        );
        let mut rules = RuleTable::empty();
        rules.insert(
            "loop",
            SynthesisRule::new(SynthClass::Band, vec!["LS71.dat".to_string()], 10.0).with_closed(true),
        );
        let library = catalog();

        let report = Synthesizer::new(&rules, &library)
            .synthesize(&mut tree, block)
            .unwrap();

        // Perimeter 30 + 40 + 50
        assert_eq!(report.placed, 12);
    }

    #[test]
    fn test_tangent_follows_direction() {
        let (mut tree, block) = hose_block("rigid-hose", &[(0.0, 0.0, 0.0), (0.0, 0.0, 20.0)]);
        let rules = RuleTable::builtin();
        let library = catalog();
        Synthesizer::new(&rules, &library)
            .synthesize(&mut tree, block)
            .unwrap();

        let first = tree.synthesized(block).unwrap()[0];
        let x_axis = tree.part(first).unwrap().transform().apply_vector(&Vec3::x());
        assert_approx_eq!(f64, x_axis.z, 1.0, epsilon = 1e-9);
        let y_axis = tree.part(first).unwrap().transform().apply_vector(&Vec3::y());
        assert_approx_eq!(f64, y_axis.y, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_catmull_rom_passes_through_constraints() {
        let (mut tree, block) = hose_block(
            "curve",
            &[(0.0, 0.0, 0.0), (32.0, 16.0, 0.0), (64.0, 0.0, 0.0)],
        );
        let mut rules = RuleTable::empty();
        rules.insert(
            "curve",
            SynthesisRule::new(SynthClass::Hose, vec!["LS71.dat".to_string()], 0.5)
                .with_curve(Curve::CatmullRom),
        );
        let library = catalog();
        Synthesizer::new(&rules, &library)
            .synthesize(&mut tree, block)
            .unwrap();

        let positions = synthesized_positions(&tree, block);
        let closest = positions
            .iter()
            .map(|p| (p - Point3::new(32.0, 16.0, 0.0)).norm())
            .fold(f64::MAX, f64::min);
        assert!(closest < 0.5);
    }

    #[test]
    fn test_translucent_flag_survives_resynthesis() {
        let (mut tree, block) =
            hose_block("rigid-hose", &[(0.0, 0.0, 0.0), (20.0, 0.0, 0.0)]);
        let rules = RuleTable::builtin();
        let library = catalog();
        let synthesizer = Synthesizer::new(&rules, &library);
        synthesizer.synthesize(&mut tree, block).unwrap();

        color_synthesized_parts_translucent(&mut tree, block, true).unwrap();
        synthesizer.synthesize(&mut tree, block).unwrap();

        for id in tree.synthesized(block).unwrap() {
            assert!(tree.get(*id).unwrap().flags().translucent);
        }
        for id in tree.children(block).unwrap() {
            assert!(!tree.get(*id).unwrap().flags().translucent);
        }
    }

    #[test]
    fn test_synthesize_stale_only_touches_stale_blocks() {
        let (mut tree, block) =
            hose_block("rigid-hose", &[(0.0, 0.0, 0.0), (20.0, 0.0, 0.0)]);
        let rules = RuleTable::builtin();
        let library = catalog();
        let synthesizer = Synthesizer::new(&rules, &library);

        let outcomes = synthesizer.synthesize_stale(&mut tree);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, block);

        assert!(synthesizer.synthesize_stale(&mut tree).is_empty());
        assert_eq!(synthesizer.synthesize_all(&mut tree).len(), 1);
    }
}
