//! Directive payloads: the tagged union stored in every tree node.
//!
//! A directive is either a leaf (a part reference, a drawing primitive, a
//! comment, or an opaque line kept verbatim) or a container (file, model,
//! step, LSynth block). Payloads hold data only; the ordered child lists live
//! on the [`Directive`] node and only change through
//! [`DirectiveTree`](crate::tree::DirectiveTree) operations.

use crate::{
    color::{ColorCode, Colorable},
    geometry::{Point3, Transform, Vec3},
    lsynth::{ConstraintRole, LSynthBlock},
    part_library::reference_name,
    tree::DirectiveId,
};

/// Transient per-node UI state. Never serialized.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NodeFlags {
    pub selected: bool,
    pub hidden: bool,
    /// Display the node translucent (set on synthesized parts)
    pub translucent: bool,
}

/// A node of the directive tree.
#[derive(Debug, Clone)]
pub struct Directive {
    kind: DirectiveKind,
    parent: Option<DirectiveId>,
    children: Vec<DirectiveId>,
    synthesized: Vec<DirectiveId>,
    flags: NodeFlags,
}

impl Directive {
    pub(crate) fn new(kind: DirectiveKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            synthesized: Vec::new(),
            flags: NodeFlags::default(),
        }
    }

    pub fn kind(&self) -> &DirectiveKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut DirectiveKind {
        &mut self.kind
    }

    /// Returns the container holding this node, if attached.
    ///
    /// The back-reference is non-owning and only used for contextual lookups.
    pub fn parent(&self) -> Option<DirectiveId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<DirectiveId>) {
        self.parent = parent;
    }

    /// Returns the ordered, user-editable children; empty for leaves.
    ///
    /// For an LSynth block these are the constraints.
    pub fn children(&self) -> &[DirectiveId] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<DirectiveId> {
        &mut self.children
    }

    /// Returns the derived parts of an LSynth block; empty elsewhere.
    pub fn synthesized(&self) -> &[DirectiveId] {
        &self.synthesized
    }

    pub(crate) fn synthesized_mut(&mut self) -> &mut Vec<DirectiveId> {
        &mut self.synthesized
    }

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    pub(crate) fn flags_mut(&mut self) -> &mut NodeFlags {
        &mut self.flags
    }
}

/// Every kind of directive the tree can hold.
#[derive(Debug, Clone)]
pub enum DirectiveKind {
    File(File),
    Model(Model),
    Step(Step),
    LSynth(LSynthBlock),
    Part(Part),
    Line(Line),
    Triangle(Triangle),
    Quadrilateral(Quadrilateral),
    ConditionalLine(ConditionalLine),
    Comment(Comment),
    Opaque(Opaque),
}

impl DirectiveKind {
    /// Short human-readable name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Model(_) => "model",
            Self::Step(_) => "step",
            Self::LSynth(_) => "LSynth block",
            Self::Part(_) => "part",
            Self::Line(_) => "line",
            Self::Triangle(_) => "triangle",
            Self::Quadrilateral(_) => "quadrilateral",
            Self::ConditionalLine(_) => "conditional line",
            Self::Comment(_) => "comment",
            Self::Opaque(_) => "opaque line",
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Self::File(_) | Self::Model(_) | Self::Step(_) | Self::LSynth(_)
        )
    }

    /// Whether a container of this kind may hold `child`.
    ///
    /// File holds models, models hold steps, steps hold leaves and LSynth
    /// blocks, and LSynth blocks hold parts as constraints.
    pub fn accepts(&self, child: &DirectiveKind) -> bool {
        match self {
            Self::File(_) => matches!(child, Self::Model(_)),
            Self::Model(_) => matches!(child, Self::Step(_)),
            Self::Step(_) => !matches!(child, Self::File(_) | Self::Model(_) | Self::Step(_)),
            Self::LSynth(_) => matches!(child, Self::Part(_)),
            _ => false,
        }
    }

    pub fn as_colorable(&self) -> Option<&dyn Colorable> {
        match self {
            Self::Part(part) => Some(part as &dyn Colorable),
            Self::Line(primitive) => Some(primitive as &dyn Colorable),
            Self::Triangle(primitive) => Some(primitive as &dyn Colorable),
            Self::Quadrilateral(primitive) => Some(primitive as &dyn Colorable),
            Self::ConditionalLine(primitive) => Some(primitive as &dyn Colorable),
            Self::LSynth(block) => Some(block as &dyn Colorable),
            _ => None,
        }
    }

    pub fn as_colorable_mut(&mut self) -> Option<&mut dyn Colorable> {
        match self {
            Self::Part(part) => Some(part as &mut dyn Colorable),
            Self::Line(primitive) => Some(primitive as &mut dyn Colorable),
            Self::Triangle(primitive) => Some(primitive as &mut dyn Colorable),
            Self::Quadrilateral(primitive) => Some(primitive as &mut dyn Colorable),
            Self::ConditionalLine(primitive) => Some(primitive as &mut dyn Colorable),
            Self::LSynth(block) => Some(block as &mut dyn Colorable),
            _ => None,
        }
    }
}

/// A `0` line that is not a recognised meta command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    text: String,
}

impl Comment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Returns the text after the leading `0`
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A line kept verbatim because it could not be understood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opaque {
    line: String,
}

impl Opaque {
    pub fn new(line: impl Into<String>) -> Self {
        Self { line: line.into() }
    }

    pub fn line(&self) -> &str {
        &self.line
    }
}

/// A colored drawing primitive with `N` points.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive<const N: usize> {
    color: ColorCode,
    points: [Point3; N],
}

impl<const N: usize> Primitive<N> {
    pub fn new(color: ColorCode, points: [Point3; N]) -> Self {
        Self { color, points }
    }

    pub fn points(&self) -> &[Point3; N] {
        &self.points
    }
}

impl<const N: usize> Colorable for Primitive<N> {
    fn color(&self) -> ColorCode {
        self.color
    }

    fn set_color(&mut self, color: ColorCode) {
        self.color = color;
    }
}

/// Type 2: an edge line
pub type Line = Primitive<2>;
/// Type 3: a filled triangle
pub type Triangle = Primitive<3>;
/// Type 4: a filled quadrilateral
pub type Quadrilateral = Primitive<4>;
/// Type 5: an optional line; the last two points are the control points
pub type ConditionalLine = Primitive<4>;

/// Type 1: a placed reference to another part or sub-model.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    display_name: String,
    reference_name: String,
    color: ColorCode,
    transform: Transform,
    constraint_role: Option<ConstraintRole>,
}

impl Part {
    pub fn new(display_name: impl Into<String>, color: ColorCode, transform: Transform) -> Self {
        let display_name = display_name.into();
        Self {
            reference_name: reference_name(&display_name),
            display_name,
            color,
            transform,
            constraint_role: None,
        }
    }

    pub fn with_constraint_role(mut self, role: ConstraintRole) -> Self {
        self.constraint_role = Some(role);
        self
    }

    /// Name as written in the file
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Normalised lookup key
    pub fn reference_name(&self) -> &str {
        &self.reference_name
    }

    pub fn set_display_name(&mut self, display_name: impl Into<String>) {
        self.display_name = display_name.into();
        self.reference_name = reference_name(&self.display_name);
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    /// Role of the part inside an LSynth block, `None` elsewhere
    pub fn constraint_role(&self) -> Option<ConstraintRole> {
        self.constraint_role
    }

    pub fn set_constraint_role(&mut self, role: Option<ConstraintRole>) {
        self.constraint_role = role;
    }
}

impl Colorable for Part {
    fn color(&self) -> ColorCode {
        self.color
    }

    fn set_color(&mut self, color: ColorCode) {
        self.color = color;
    }
}

/// Rotation applied to the view from a step onwards (`0 ROTSTEP`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepRotation {
    Relative(Vec3),
    Absolute(Vec3),
    Additive(Vec3),
    /// Return to the default view
    End,
}

/// An ordered group of directives shown together in building instructions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Step {
    rotation: Option<StepRotation>,
}

impl Step {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rotation(mut self, rotation: StepRotation) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn rotation(&self) -> Option<StepRotation> {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Option<StepRotation>) {
        self.rotation = rotation;
    }
}

/// A (sub-)model: header fields plus ordered steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    /// Name on the `0 FILE` line of a multi-part document
    file_name: Option<String>,
    description: Option<String>,
    name: Option<String>,
    author: Option<String>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn set_file_name(&mut self, file_name: Option<String>) {
        self.file_name = file_name;
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn set_author(&mut self, author: Option<String>) {
        self.author = author;
    }

    /// Whether a part referencing `name` refers to this model.
    pub fn answers_to(&self, name: &str) -> bool {
        let key = reference_name(name);
        [self.file_name.as_deref(), self.name.as_deref()]
            .into_iter()
            .flatten()
            .any(|candidate| reference_name(candidate) == key)
    }
}

/// The document root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct File {
    mpd: bool,
}

impl File {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the document was read from (or should be written as) a
    /// multi-part file.
    pub fn is_mpd(&self) -> bool {
        self.mpd
    }

    pub fn set_mpd(&mut self, mpd: bool) {
        self.mpd = mpd;
    }
}
