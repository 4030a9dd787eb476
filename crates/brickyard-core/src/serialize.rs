//! LDraw text output for the directive tree.
//!
//! Every directive emits its own lines; containers emit a header, their
//! children and a footer. Output depends only on the tree, never on
//! transient UI flags.

use std::fmt::Write as _;

use log::warn;

use crate::{
    color::Colorable,
    directive::{DirectiveKind, Model, Part, Primitive, StepRotation},
    geometry::{Point3, Vec3, format_ldraw_number},
    lsynth::LSynthBlock,
    tree::{DirectiveId, DirectiveTree, TreeError},
};

/// Name written on `0 FILE` for models that carry neither a file name nor a
/// `0 Name:` header.
pub const UNTITLED_MODEL: &str = "untitled.ldr";

impl DirectiveTree {
    /// Writes the whole document, one entry per line.
    pub fn write(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for model in self.models() {
            // Models come straight from the arena; writing them cannot fail.
            if let Err(err) = self.write_into(*model, &mut lines) {
                warn!(err:% = err; "Skipped model while writing");
            }
        }
        lines
    }

    /// Writes the subtree rooted at `id`.
    pub fn write_node(&self, id: DirectiveId) -> Result<Vec<String>, TreeError> {
        let mut lines = Vec::new();
        self.write_into(id, &mut lines)?;
        Ok(lines)
    }

    /// The document as LDraw text with CRLF line endings.
    pub fn to_ldraw_string(&self) -> String {
        let mut text = self.write().join("\r\n");
        if !text.is_empty() {
            text.push_str("\r\n");
        }
        text
    }

    fn write_into(&self, id: DirectiveId, out: &mut Vec<String>) -> Result<(), TreeError> {
        let node = self.get(id)?;
        match node.kind() {
            DirectiveKind::File(_) => {
                for model in node.children() {
                    self.write_into(*model, out)?;
                }
            }
            DirectiveKind::Model(model) => self.write_model(model, node.children(), out)?,
            DirectiveKind::Step(_) => {
                for child in node.children() {
                    self.write_into(*child, out)?;
                }
            }
            DirectiveKind::LSynth(block) => {
                self.write_block(block, node.children(), node.synthesized(), out)?;
            }
            DirectiveKind::Part(part) => out.push(part_line(part)),
            DirectiveKind::Line(line) => out.push(primitive_line(2, line)),
            DirectiveKind::Triangle(triangle) => out.push(primitive_line(3, triangle)),
            DirectiveKind::Quadrilateral(quad) => out.push(primitive_line(4, quad)),
            DirectiveKind::ConditionalLine(line) => out.push(primitive_line(5, line)),
            DirectiveKind::Comment(comment) => {
                if comment.text().is_empty() {
                    out.push("0".to_string());
                } else {
                    out.push(format!("0 {}", comment.text()));
                }
            }
            DirectiveKind::Opaque(opaque) => out.push(opaque.line().to_string()),
        }
        Ok(())
    }

    fn write_model(
        &self,
        model: &Model,
        steps: &[DirectiveId],
        out: &mut Vec<String>,
    ) -> Result<(), TreeError> {
        let mpd = self.is_mpd();
        if mpd {
            let name = model.file_name().or(model.name()).unwrap_or(UNTITLED_MODEL);
            out.push(format!("0 FILE {name}"));
        }
        if let Some(description) = model.description() {
            out.push(format!("0 {description}"));
        }
        if let Some(name) = model.name() {
            out.push(format!("0 Name: {name}"));
        }
        if let Some(author) = model.author() {
            out.push(format!("0 Author: {author}"));
        }

        for (index, id) in steps.iter().enumerate() {
            self.write_into(*id, out)?;
            match self.step(*id)?.rotation() {
                Some(rotation) => out.push(rotstep_line(rotation)),
                None if index + 1 < steps.len() => out.push("0 STEP".to_string()),
                None => {}
            }
        }

        if mpd {
            out.push("0 NOFILE".to_string());
        }
        Ok(())
    }

    fn write_block(
        &self,
        block: &LSynthBlock,
        constraints: &[DirectiveId],
        synthesized: &[DirectiveId],
        out: &mut Vec<String>,
    ) -> Result<(), TreeError> {
        out.push(format!("0 SYNTH BEGIN {} {}", block.synth_type(), block.color()));
        out.push(if block.is_hidden() { "0 SYNTH HIDE" } else { "0 SYNTH SHOW" }.to_string());
        for id in constraints {
            let part = self.part(*id)?;
            if let Some(role) = part.constraint_role() {
                out.push(format!("0 SYNTH CONSTRAINT {role}"));
            }
            out.push(part_line(part));
        }
        out.push("0 SYNTH SYNTHESIZED BEGIN".to_string());
        for id in synthesized {
            out.push(part_line(self.part(*id)?));
        }
        out.push("0 SYNTH SYNTHESIZED END".to_string());
        out.push("0 SYNTH END".to_string());
        Ok(())
    }
}

fn part_line(part: &Part) -> String {
    let mut line = format!("1 {}", part.color());
    for value in part.transform().ldraw_values() {
        let _ = write!(line, " {}", format_ldraw_number(value));
    }
    let _ = write!(line, " {}", part.display_name());
    line
}

fn primitive_line<const N: usize>(line_type: u8, primitive: &Primitive<N>) -> String {
    let mut line = format!("{line_type} {}", primitive.color());
    for point in primitive.points() {
        push_coords(&mut line, point);
    }
    line
}

fn push_coords(line: &mut String, point: &Point3) {
    for value in [point.x, point.y, point.z] {
        let _ = write!(line, " {}", format_ldraw_number(value));
    }
}

fn rotstep_line(rotation: StepRotation) -> String {
    let angles = |angles: Vec3, mode: &str| {
        format!(
            "0 ROTSTEP {} {} {} {mode}",
            format_ldraw_number(angles.x),
            format_ldraw_number(angles.y),
            format_ldraw_number(angles.z)
        )
    };
    match rotation {
        StepRotation::Relative(v) => angles(v, "REL"),
        StepRotation::Absolute(v) => angles(v, "ABS"),
        StepRotation::Additive(v) => angles(v, "ADD"),
        StepRotation::End => "0 ROTSTEP END".to_string(),
    }
}
