//! Affine placement of parts in LDraw model space.
//!
//! This module provides the transform subsystem used by parts and LSynth
//! blocks: a raw 4×4 affine matrix, its editable decomposition and the
//! editing helpers built on top of both.
//!
//! # Overview
//!
//! - [`Transform`] - A 4×4 affine matrix in LDraw units (LDU)
//! - [`TransformComponents`] - Translation, rotation, scale and shear of a transform
//! - [`BoundingBox`] - An axis-aligned box in model space
//! - [`format_ldraw_number`] - Canonical text form of a coordinate
//!
//! # Conventions
//!
//! Vectors are columns, so a transform maps a point as `M · p`. LDraw files
//! store the matrix row-major with the last row implicitly `0 0 0 1`:
//!
//! ```text
//!   1 <color> x y z a b c d e f g h i <part>
//!
//!   | a b c x |
//!   | d e f y |
//!   | g h i z |
//!   | 0 0 0 1 |
//! ```
//!
//! Angles are degrees at every public boundary and radians internally.
//! Decomposition follows `M = T · Rz · Ry · Rx · H · S` where `H` is an
//! upper-triangular shear and `S` a diagonal scale.

use nalgebra::{Matrix3, Matrix4, Rotation3, Unit};

/// A point in model space.
pub type Point3 = nalgebra::Point3<f64>;

/// A direction or offset in model space.
pub type Vec3 = nalgebra::Vector3<f64>;

const EPSILON: f64 = 1e-9;

/// A 4×4 affine transform placing a directive in its parent's space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    matrix: Matrix4<f64>,
}

impl Transform {
    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// A pure translation by `offset`.
    pub fn translation(offset: Vec3) -> Self {
        Self {
            matrix: Matrix4::new_translation(&offset),
        }
    }

    /// Wraps a raw matrix.
    pub fn from_matrix(matrix: Matrix4<f64>) -> Self {
        Self { matrix }
    }

    /// Builds a transform whose local axes map to `x`, `y` and `z` and whose
    /// origin maps to `origin`.
    pub fn from_basis(x: Vec3, y: Vec3, z: Vec3, origin: Point3) -> Self {
        let mut matrix = Matrix4::new_translation(&origin.coords);
        matrix
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&Matrix3::from_columns(&[x, y, z]));
        Self { matrix }
    }

    /// Builds a transform from the twelve numbers of a part line, in file
    /// order `x y z a b c d e f g h i`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use brickyard_core::geometry::{Point3, Transform};
    /// let transform = Transform::from_ldraw_values([
    ///     10.0, -8.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0,
    /// ]);
    /// assert_eq!(transform.position(), Point3::new(10.0, -8.0, 0.0));
    /// ```
    pub fn from_ldraw_values(values: [f64; 12]) -> Self {
        let [x, y, z, a, b, c, d, e, f, g, h, i] = values;
        Self {
            matrix: Matrix4::new(
                a, b, c, x, //
                d, e, f, y, //
                g, h, i, z, //
                0.0, 0.0, 0.0, 1.0,
            ),
        }
    }

    /// Returns the twelve numbers of a part line, in file order.
    pub fn ldraw_values(&self) -> [f64; 12] {
        let m = &self.matrix;
        [
            m[(0, 3)],
            m[(1, 3)],
            m[(2, 3)],
            m[(0, 0)],
            m[(0, 1)],
            m[(0, 2)],
            m[(1, 0)],
            m[(1, 1)],
            m[(1, 2)],
            m[(2, 0)],
            m[(2, 1)],
            m[(2, 2)],
        ]
    }

    /// Returns the underlying matrix
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// Returns the upper-left 3×3 block (rotation, scale and shear)
    pub fn linear(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// Returns the translation part as a point
    pub fn position(&self) -> Point3 {
        Point3::new(
            self.matrix[(0, 3)],
            self.matrix[(1, 3)],
            self.matrix[(2, 3)],
        )
    }

    /// Composes two transforms: the result applies `self` first, then `next`.
    pub fn then(&self, next: &Transform) -> Self {
        Self {
            matrix: next.matrix * self.matrix,
        }
    }

    /// Maps a point through the transform.
    pub fn apply_point(&self, point: &Point3) -> Point3 {
        Point3::from_homogeneous(self.matrix * point.to_homogeneous()).unwrap_or(*point)
    }

    /// Maps a direction through the linear part only.
    pub fn apply_vector(&self, vector: &Vec3) -> Vec3 {
        self.linear() * vector
    }

    /// Returns the transform moved by `offset` in parent space.
    pub fn nudged(&self, offset: Vec3) -> Self {
        self.then(&Transform::translation(offset))
    }

    /// Returns the transform rotated by `degrees` around `axis` through
    /// `pivot`.
    ///
    /// The rotation is carried out as translate to the pivot, rotate,
    /// translate back. A zero-length axis leaves the transform unchanged.
    pub fn rotated_about(&self, axis: Vec3, degrees: f64, pivot: Point3) -> Self {
        if axis.norm() < EPSILON {
            return *self;
        }
        let rotation =
            Rotation3::from_axis_angle(&Unit::new_normalize(axis), degrees.to_radians());
        let to_origin = Matrix4::new_translation(&-pivot.coords);
        let back = Matrix4::new_translation(&pivot.coords);
        Self {
            matrix: back * rotation.to_homogeneous() * to_origin * self.matrix,
        }
    }

    /// Returns the transform rotated about its own origin by the given Euler
    /// angles in degrees, X first, then Y, then Z.
    pub fn rotated_by_degrees(&self, degrees: Vec3) -> Self {
        let rotation = Rotation3::from_euler_angles(
            degrees.x.to_radians(),
            degrees.y.to_radians(),
            degrees.z.to_radians(),
        );
        let pivot = self.position();
        let to_origin = Matrix4::new_translation(&-pivot.coords);
        let back = Matrix4::new_translation(&pivot.coords);
        Self {
            matrix: back * rotation.to_homogeneous() * to_origin * self.matrix,
        }
    }

    /// Decomposes the transform into editable components.
    ///
    /// Returns `None` for singular or projective matrices; see [`decompose`].
    pub fn components(&self) -> Option<TransformComponents> {
        decompose(self)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Editable components of an affine transform.
///
/// `rotate` holds Euler angles in degrees applied X first, then Y, then Z.
/// Shear factors follow the upper-triangular convention: `shear_xy` adds a
/// multiple of Y to X, `shear_xz` and `shear_yz` add multiples of Z to X and
/// Y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformComponents {
    pub translate: Vec3,
    pub rotate: Vec3,
    pub scale: Vec3,
    pub shear_xy: f64,
    pub shear_xz: f64,
    pub shear_yz: f64,
}

impl TransformComponents {
    /// Returns a copy with translation rounded to multiples of
    /// `grid_spacing` and each rotation angle rounded to multiples of
    /// `minimum_angle` degrees.
    ///
    /// Axes snap independently. A zero (or negative) spacing disables the
    /// translation snap, a zero angle disables the rotation snap.
    pub fn snapped_to_grid(&self, grid_spacing: f64, minimum_angle: f64) -> Self {
        let snap = |value: f64, step: f64| {
            if step > EPSILON {
                (value / step).round() * step
            } else {
                value
            }
        };
        Self {
            translate: self.translate.map(|v| snap(v, grid_spacing)),
            rotate: self.rotate.map(|v| snap(v, minimum_angle)),
            ..*self
        }
    }
}

impl Default for TransformComponents {
    fn default() -> Self {
        Self {
            translate: Vec3::zeros(),
            rotate: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            shear_xy: 0.0,
            shear_xz: 0.0,
            shear_yz: 0.0,
        }
    }
}

/// Splits a transform into translation, rotation, shear and scale.
///
/// The linear part is orthogonalised column by column (Gram-Schmidt). A
/// mirrored basis is folded into a negative Z scale so the remaining rotation
/// is proper. Returns `None` when the matrix is singular or its last row is
/// not `0 0 0 1`; such matrices are kept as opaque values and written as
/// they are.
pub fn decompose(transform: &Transform) -> Option<TransformComponents> {
    let m = transform.matrix();
    let affine_row = m[(3, 0)].abs() < EPSILON
        && m[(3, 1)].abs() < EPSILON
        && m[(3, 2)].abs() < EPSILON
        && (m[(3, 3)] - 1.0).abs() < EPSILON;
    if !affine_row {
        return None;
    }

    let linear = transform.linear();
    let c0 = linear.column(0).into_owned();
    let c1 = linear.column(1).into_owned();
    let c2 = linear.column(2).into_owned();

    let scale_x = c0.norm();
    if scale_x < EPSILON {
        return None;
    }
    let r0 = c0 / scale_x;

    let xy = c1.dot(&r0);
    let v1 = c1 - r0 * xy;
    let scale_y = v1.norm();
    if scale_y < EPSILON {
        return None;
    }
    let r1 = v1 / scale_y;

    let xz = c2.dot(&r0);
    let yz = c2.dot(&r1);
    let v2 = c2 - r0 * xz - r1 * yz;
    let mut scale_z = v2.norm();
    if scale_z < EPSILON {
        return None;
    }
    let mut r2 = v2 / scale_z;
    if r0.cross(&r1).dot(&r2) < 0.0 {
        scale_z = -scale_z;
        r2 = -r2;
    }

    let rotation = Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[r0, r1, r2]));
    let (roll, pitch, yaw) = rotation.euler_angles();

    Some(TransformComponents {
        translate: transform.position().coords,
        rotate: Vec3::new(roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees()),
        scale: Vec3::new(scale_x, scale_y, scale_z),
        shear_xy: xy / scale_y,
        shear_xz: xz / scale_z,
        shear_yz: yz / scale_z,
    })
}

/// Rebuilds a transform from its components.
pub fn recompose(components: &TransformComponents) -> Transform {
    let rotation = Rotation3::from_euler_angles(
        components.rotate.x.to_radians(),
        components.rotate.y.to_radians(),
        components.rotate.z.to_radians(),
    );
    let shear = Matrix3::new(
        1.0,
        components.shear_xy,
        components.shear_xz,
        0.0,
        1.0,
        components.shear_yz,
        0.0,
        0.0,
        1.0,
    );
    let scale = Matrix3::from_diagonal(&components.scale);
    let linear = rotation.matrix() * shear * scale;

    let mut matrix = Matrix4::new_translation(&components.translate);
    matrix.fixed_view_mut::<3, 3>(0, 0).copy_from(&linear);
    Transform::from_matrix(matrix)
}

/// An axis-aligned bounding box in model space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    min: Point3,
    max: Point3,
}

impl BoundingBox {
    /// Creates a box from two opposite corners, in any order.
    pub fn new(a: Point3, b: Point3) -> Self {
        Self {
            min: a.inf(&b),
            max: a.sup(&b),
        }
    }

    /// Returns the smallest box containing every point, or `None` for an
    /// empty iterator.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point3>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::new(first, first), |bounds, point| {
            bounds.union(&Self::new(point, point))
        }))
    }

    pub fn min(&self) -> Point3 {
        self.min
    }

    pub fn max(&self) -> Point3 {
        self.max
    }

    /// Returns the extent along each axis
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Returns the smallest box containing both boxes
    pub fn union(&self, other: &BoundingBox) -> Self {
        Self {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Returns the axis-aligned box around the eight transformed corners.
    pub fn transformed(&self, transform: &Transform) -> Self {
        let (lo, hi) = (self.min, self.max);
        let corners = [
            Point3::new(lo.x, lo.y, lo.z),
            Point3::new(hi.x, lo.y, lo.z),
            Point3::new(lo.x, hi.y, lo.z),
            Point3::new(hi.x, hi.y, lo.z),
            Point3::new(lo.x, lo.y, hi.z),
            Point3::new(hi.x, lo.y, hi.z),
            Point3::new(lo.x, hi.y, hi.z),
            Point3::new(hi.x, hi.y, hi.z),
        ];
        let mapped = corners.map(|corner| transform.apply_point(&corner));
        Self::from_points(mapped).unwrap_or(*self)
    }
}

/// Formats a coordinate the way it is written to a file.
///
/// Six decimals, trailing zeros and a dangling decimal point removed, and
/// negative zero written as `0`. Non-finite values are written as `0` so the
/// output always parses back.
///
/// # Examples
///
/// ```
/// # use brickyard_core::geometry::format_ldraw_number;
/// assert_eq!(format_ldraw_number(20.0), "20");
/// assert_eq!(format_ldraw_number(-0.5), "-0.5");
/// assert_eq!(format_ldraw_number(1.0 / 3.0), "0.333333");
/// assert_eq!(format_ldraw_number(-0.0000001), "0");
/// ```
pub fn format_ldraw_number(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let mut text = format!("{value:.6}");
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}
