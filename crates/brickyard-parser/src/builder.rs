//! Assembles classified lines into a directive tree.
//!
//! The builder tracks the open model and step, hands `0 SYNTH` blocks to the
//! [`LSynthScanner`], and turns anything it cannot place into an opaque
//! directive plus a diagnostic.

use brickyard_core::{
    directive::{
        Comment, ConditionalLine, DirectiveKind, Line, Model, Opaque, Part, Quadrilateral, Step,
        Triangle,
    },
    lsynth::{ConstraintRole, LSynthBlock, RuleTable},
    tree::{DirectiveId, DirectiveTree, TreeError},
};
use log::{debug, info, trace, warn};

use crate::{
    Parsed,
    error::{Diagnostic, DiagnosticCollector, ErrorCode},
    line::{LineCommand, LineError, Meta, SynthMarker, classify},
    lsynth::{LSynthScanner, MalformedLSynthBlock, RawLine, Scan, ScannedBlock},
    span::Span,
};

/// Lines of a broken block that contained a nested `0 SYNTH BEGIN`; they
/// are kept verbatim up to the `0 SYNTH END` closing the outer block.
#[derive(Debug, Clone, Copy)]
struct OpaqueRun {
    /// Blocks still open, the outer one included
    depth: usize,
    opening: Span,
}

/// The model currently receiving lines.
#[derive(Debug, Clone, Copy)]
struct OpenModel {
    id: DirectiveId,
    step: DirectiveId,
    /// Description, `Name:` and `Author:` are still accepted
    header_open: bool,
    /// Lines placed in this model so far, header lines included
    lines: usize,
}

pub(crate) struct Builder<'a> {
    rules: &'a RuleTable,
    tree: DirectiveTree,
    collector: DiagnosticCollector,
    model: Option<OpenModel>,
    scanner: Option<LSynthScanner<'a>>,
    opaque_run: Option<OpaqueRun>,
    /// Blank lines seen before any model was opened
    leading_blanks: Vec<RawLine<'a>>,
}

impl<'a> Builder<'a> {
    pub fn new(rules: &'a RuleTable) -> Self {
        Self {
            rules,
            tree: DirectiveTree::new(),
            collector: DiagnosticCollector::new(),
            model: None,
            scanner: None,
            opaque_run: None,
            leading_blanks: Vec::new(),
        }
    }

    // ============================================================================
    // Main Entry Methods
    // ============================================================================

    pub fn build(mut self, source: &'a str) -> Parsed {
        debug!(bytes = source.len(); "Building directive tree");
        let mut count = 0;
        for line in raw_lines(source) {
            count += 1;
            if let Err(err) = self.process(line) {
                self.internal_error(line, err);
            }
        }

        if let Some(scanner) = self.scanner.take() {
            let malformed = scanner.finish();
            let opening = malformed.consumed.first().copied();
            if let (Err(err), Some(line)) = (self.degrade(malformed, ErrorCode::E201), opening) {
                self.internal_error(line, err);
            }
        }

        if let Some(run) = self.opaque_run.take() {
            warn!(depth = run.depth; "Input ended inside a nested LSynth block");
            self.collector.emit(
                Diagnostic::error(format!(
                    "{}: input ended before the outer `0 SYNTH END`",
                    ErrorCode::E201.description()
                ))
                .with_code(ErrorCode::E201)
                .with_label(run.opening, "block is never closed")
                .with_help("the block's lines are kept verbatim"),
            );
        }
        if !self.leading_blanks.is_empty() {
            if let Err(err) = self.ensure_model() {
                warn!(err:% = err; "Could not keep leading blank lines");
            }
        }

        info!(
            lines = count,
            models = self.tree.models().len(),
            diagnostics = self.collector.len(),
            has_errors = self.collector.has_errors();
            "Parsed LDraw document"
        );
        Parsed {
            tree: self.tree,
            diagnostics: self.collector.finish(),
        }
    }

    fn process(&mut self, line: RawLine<'a>) -> Result<(), TreeError> {
        let command = classify(line.text);

        if let Some(run) = self.opaque_run.as_mut() {
            match &command {
                Ok(LineCommand::Meta(Meta::Synth(SynthMarker::Begin { .. }))) => run.depth += 1,
                Ok(LineCommand::Meta(Meta::Synth(SynthMarker::End))) => run.depth -= 1,
                _ => {}
            }
            if run.depth == 0 {
                trace!(at = line.span.start(); "Nested LSynth block closed");
                self.opaque_run = None;
            }
            return self.push(DirectiveKind::Opaque(Opaque::new(line.text)));
        }

        if let Some(scanner) = self.scanner.as_mut() {
            match scanner.feed(line, &command) {
                Scan::Continue => return Ok(()),
                Scan::Closed(block) => {
                    self.scanner = None;
                    return self.add_block(block);
                }
                Scan::Malformed(malformed) => {
                    self.scanner = None;
                    let opening = malformed.consumed.first().map(|first| first.span);
                    self.degrade(malformed, ErrorCode::E200)?;
                    if let Ok(LineCommand::Meta(Meta::Synth(SynthMarker::Begin { .. }))) = &command {
                        // Everything up to the outer block's END stays verbatim
                        self.opaque_run = Some(OpaqueRun {
                            depth: 2,
                            opening: opening.unwrap_or(line.span),
                        });
                        return self.push(DirectiveKind::Opaque(Opaque::new(line.text)));
                    }
                    // The offending line is placed like any other below
                }
            }
        }

        self.place(line, command)
    }

    // ============================================================================
    // Line Placement
    // ============================================================================

    fn place(&mut self, line: RawLine<'a>, command: Result<LineCommand<'a>, LineError>) -> Result<(), TreeError> {
        let command = match command {
            Ok(command) => command,
            Err(err) => {
                let mut diagnostic = Diagnostic::warning(err.message)
                    .with_code(err.code)
                    .with_label(line.span, err.code.description());
                if let Some(help) = err.help {
                    diagnostic = diagnostic.with_help(help);
                }
                self.collector.emit(diagnostic);
                return self.push(DirectiveKind::Opaque(Opaque::new(line.text)));
            }
        };

        match command {
            LineCommand::Blank if self.model.is_none() && self.tree.is_mpd() => {
                trace!(at = line.span.start(); "Dropping blank line between models");
                Ok(())
            }
            LineCommand::Blank if self.model.is_none() => {
                // Kept if the document turns out not to be multi-part
                self.leading_blanks.push(line);
                Ok(())
            }
            LineCommand::Blank => self.push(DirectiveKind::Opaque(Opaque::new(line.text))),
            LineCommand::Comment(text) => {
                let model = self.ensure_model()?;
                let trimmed = text.trim();
                if model.header_open && model.lines == 0 && !trimmed.is_empty() {
                    self.tree
                        .model_mut(model.id)?
                        .set_description(Some(trimmed.to_string()));
                    self.count_header_line();
                    Ok(())
                } else {
                    self.push(DirectiveKind::Comment(Comment::new(text)))
                }
            }
            LineCommand::Meta(meta) => self.meta(line, meta),
            LineCommand::Part {
                color,
                transform,
                name,
            } => self.push(DirectiveKind::Part(Part::new(name, color, transform))),
            LineCommand::Line { color, points } => self.push(DirectiveKind::Line(Line::new(color, points))),
            LineCommand::Triangle { color, points } => {
                self.push(DirectiveKind::Triangle(Triangle::new(color, points)))
            }
            LineCommand::Quadrilateral { color, points } => {
                self.push(DirectiveKind::Quadrilateral(Quadrilateral::new(color, points)))
            }
            LineCommand::ConditionalLine { color, points } => {
                self.push(DirectiveKind::ConditionalLine(ConditionalLine::new(color, points)))
            }
        }
    }

    fn meta(&mut self, line: RawLine<'a>, meta: Meta<'a>) -> Result<(), TreeError> {
        match meta {
            Meta::Step => {
                self.ensure_model()?;
                self.next_step()
            }
            Meta::RotStep(rotation) => {
                let model = self.ensure_model()?;
                self.tree.step_mut(model.step)?.set_rotation(Some(rotation));
                self.next_step()
            }
            Meta::File(name) => {
                if let Some(open) = self.model.take() {
                    trace!(lines = open.lines; "Model closed by FILE");
                }
                if !self.leading_blanks.is_empty() {
                    trace!(count = self.leading_blanks.len(); "Dropping blank lines before FILE");
                    self.leading_blanks.clear();
                }
                self.tree.set_mpd(true);
                self.open_model(Model::new().with_file_name(name))?;
                Ok(())
            }
            Meta::NoFile => {
                if self.model.take().is_none() {
                    debug!(at = line.span.start(); "Dropping NOFILE outside a model");
                }
                Ok(())
            }
            Meta::Name(name) => {
                let model = self.ensure_model()?;
                let target = self.tree.model_mut(model.id)?;
                if model.header_open && target.name().is_none() {
                    target.set_name(Some(name.to_string()));
                    self.count_header_line();
                    Ok(())
                } else {
                    self.push(DirectiveKind::Opaque(Opaque::new(line.text)))
                }
            }
            Meta::Author(author) => {
                let model = self.ensure_model()?;
                let target = self.tree.model_mut(model.id)?;
                if model.header_open && target.author().is_none() {
                    target.set_author(Some(author.to_string()));
                    self.count_header_line();
                    Ok(())
                } else {
                    self.push(DirectiveKind::Opaque(Opaque::new(line.text)))
                }
            }
            Meta::Synth(SynthMarker::Begin { synth_type, color }) => {
                self.ensure_model()?;
                self.close_header();
                self.scanner = Some(LSynthScanner::begin(line, synth_type, color));
                Ok(())
            }
            Meta::Synth(marker) => {
                self.collector.emit(
                    Diagnostic::warning(format!("`0 {}` outside an LSynth block", marker.keyword()))
                        .with_code(ErrorCode::E202)
                        .with_label(line.span, "no block is open here")
                        .with_help("the line is kept verbatim"),
                );
                self.push(DirectiveKind::Opaque(Opaque::new(line.text)))
            }
        }
    }

    // ============================================================================
    // LSynth Blocks
    // ============================================================================

    fn add_block(&mut self, scanned: ScannedBlock) -> Result<(), TreeError> {
        let rule = self.rules.get(&scanned.synth_type);
        if rule.is_none() {
            warn!(synth_type = scanned.synth_type.as_str(); "Unknown synthesis type");
            self.collector.emit(
                Diagnostic::warning(format!("unknown synthesis type `{}`", scanned.synth_type))
                    .with_code(ErrorCode::E300)
                    .with_label(scanned.opening, "no synthesis rule for this type")
                    .with_help("the block is kept but cannot be regenerated"),
            );
        }
        let class = rule.map(|rule| rule.class());

        let mut block = LSynthBlock::new(scanned.synth_type.as_str(), class, scanned.color)?;
        block.set_hidden(scanned.hidden);
        let id = self.tree.create(DirectiveKind::LSynth(block));
        self.push_node(id)?;

        let count = scanned.constraints.len();
        for (index, (role, part)) in scanned.constraints.into_iter().enumerate() {
            let role = role.unwrap_or_else(|| positional_role(index, count));
            let constraint = self
                .tree
                .create(DirectiveKind::Part(part.with_constraint_role(role)));
            self.tree.append(constraint, id)?;
        }
        let synthesized = scanned.synthesized.len();
        for part in scanned.synthesized {
            self.tree.insert_synthesized(id, part)?;
        }

        // Content read from the file is current unless there is none yet
        let stale = class.is_some() && synthesized == 0 && count > 0;
        self.tree.block_mut(id)?.set_stale(stale);
        debug!(
            synth_type = scanned.synth_type.as_str(),
            constraints = count,
            synthesized = synthesized,
            stale = stale;
            "Read LSynth block"
        );
        Ok(())
    }

    /// Keeps the lines of a broken block verbatim.
    fn degrade(&mut self, malformed: MalformedLSynthBlock<'a>, code: ErrorCode) -> Result<(), TreeError> {
        let opening = malformed
            .consumed
            .first()
            .map(|line| line.span)
            .unwrap_or_default();
        let mut diagnostic = Diagnostic::error(format!(
            "{}: expected {}",
            code.description(),
            malformed.expected
        ))
        .with_code(code);
        diagnostic = match malformed.at {
            Some(at) => diagnostic
                .with_label(at, "unexpected line")
                .with_secondary_label(opening, "block opened here"),
            None => diagnostic.with_label(opening, "block is never closed"),
        };
        self.collector
            .emit(diagnostic.with_help("the block's lines are kept verbatim"));
        warn!(lines = malformed.consumed.len(); "Kept malformed LSynth block verbatim");

        for line in malformed.consumed {
            self.push(DirectiveKind::Opaque(Opaque::new(line.text)))?;
        }
        Ok(())
    }

    // ============================================================================
    // Model and Step Bookkeeping
    // ============================================================================

    fn ensure_model(&mut self) -> Result<OpenModel, TreeError> {
        if let Some(model) = self.model {
            return Ok(model);
        }
        let open = self.open_model(Model::new())?;
        for line in std::mem::take(&mut self.leading_blanks) {
            self.push(DirectiveKind::Opaque(Opaque::new(line.text)))?;
        }
        Ok(self.model.unwrap_or(open))
    }

    fn open_model(&mut self, model: Model) -> Result<OpenModel, TreeError> {
        let id = self.tree.create(DirectiveKind::Model(model));
        self.tree.append(id, self.tree.root())?;
        let step = self.tree.create(DirectiveKind::Step(Step::new()));
        self.tree.append(step, id)?;
        let open = OpenModel {
            id,
            step,
            header_open: true,
            lines: 0,
        };
        self.model = Some(open);
        Ok(open)
    }

    fn next_step(&mut self) -> Result<(), TreeError> {
        let model = self.ensure_model()?;
        let step = self.tree.create(DirectiveKind::Step(Step::new()));
        self.tree.append(step, model.id)?;
        self.model = Some(OpenModel {
            step,
            header_open: false,
            lines: model.lines + 1,
            ..model
        });
        Ok(())
    }

    fn push(&mut self, kind: DirectiveKind) -> Result<(), TreeError> {
        let id = self.tree.create(kind);
        self.push_node(id)
    }

    fn push_node(&mut self, id: DirectiveId) -> Result<(), TreeError> {
        let model = self.ensure_model()?;
        self.tree.append(id, model.step)?;
        self.close_header();
        Ok(())
    }

    fn close_header(&mut self) {
        if let Some(model) = self.model.as_mut() {
            model.header_open = false;
            model.lines += 1;
        }
    }

    fn count_header_line(&mut self) {
        if let Some(model) = self.model.as_mut() {
            model.lines += 1;
        }
    }

    fn internal_error(&mut self, line: RawLine<'a>, err: TreeError) {
        warn!(err:% = err, at = line.span.start(); "Line could not be placed");
        self.collector.emit(
            Diagnostic::error(format!("line could not be placed: {err}"))
                .with_code(ErrorCode::E100)
                .with_label(line.span, "dropped"),
        );
    }
}

/// Role of the `index`-th of `count` constraints written without one.
fn positional_role(index: usize, count: usize) -> ConstraintRole {
    if index == 0 {
        ConstraintRole::Start
    } else if index + 1 == count {
        ConstraintRole::End
    } else {
        ConstraintRole::Mid
    }
}

/// Splits the source into lines, without terminators, with byte spans.
fn raw_lines(source: &str) -> impl Iterator<Item = RawLine<'_>> {
    let mut offset = 0;
    source.split_inclusive('\n').map(move |chunk| {
        let start = offset;
        offset += chunk.len();
        let text = chunk.strip_suffix('\n').unwrap_or(chunk);
        let text = text.strip_suffix('\r').unwrap_or(text);
        RawLine {
            text,
            span: Span::new(start..start + text.len()),
        }
    })
}
