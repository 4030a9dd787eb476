//! Tokenizer for single LDraw lines.
//!
//! Each line is classified by its leading type code and its fields are read
//! with `winnow` combinators. Classification never looks at neighbouring
//! lines; structure (models, steps, LSynth blocks) is the builder's job.

use brickyard_core::{
    color::ColorCode,
    directive::StepRotation,
    geometry::{Point3, Transform, Vec3},
    lsynth::ConstraintRole,
};
use winnow::{
    Parser as _,
    ascii::{float, space0, space1},
    combinator::preceded,
    error::{ContextError, ModalResult},
    token::{one_of, rest, take_till},
};

use crate::error::ErrorCode;

/// Field separators inside a line.
const SEPARATORS: [char; 2] = [' ', '\t'];

/// A classified line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LineCommand<'a> {
    /// Empty or whitespace only
    Blank,
    /// A type 0 line that is not a recognised meta command; the text after
    /// the first separator, verbatim
    Comment(&'a str),
    Meta(Meta<'a>),
    Part {
        color: ColorCode,
        transform: Transform,
        name: &'a str,
    },
    Line {
        color: ColorCode,
        points: [Point3; 2],
    },
    Triangle {
        color: ColorCode,
        points: [Point3; 3],
    },
    Quadrilateral {
        color: ColorCode,
        points: [Point3; 4],
    },
    ConditionalLine {
        color: ColorCode,
        points: [Point3; 4],
    },
}

/// Type 0 meta commands that carry structure.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Meta<'a> {
    Step,
    RotStep(StepRotation),
    File(&'a str),
    NoFile,
    Name(&'a str),
    Author(&'a str),
    Synth(SynthMarker<'a>),
}

/// `0 SYNTH …` markers.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SynthMarker<'a> {
    Begin { synth_type: &'a str, color: ColorCode },
    Show,
    Hide,
    Constraint(ConstraintRole),
    SynthesizedBegin,
    SynthesizedEnd,
    End,
}

impl SynthMarker<'_> {
    pub(crate) fn keyword(&self) -> &'static str {
        match self {
            Self::Begin { .. } => "SYNTH BEGIN",
            Self::Show => "SYNTH SHOW",
            Self::Hide => "SYNTH HIDE",
            Self::Constraint(_) => "SYNTH CONSTRAINT",
            Self::SynthesizedBegin => "SYNTH SYNTHESIZED BEGIN",
            Self::SynthesizedEnd => "SYNTH SYNTHESIZED END",
            Self::End => "SYNTH END",
        }
    }
}

/// Why a line could not be classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LineError {
    pub code: ErrorCode,
    pub message: String,
    pub help: Option<&'static str>,
}

impl LineError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            help: None,
        }
    }

    fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::E100, message)
    }

    fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

/// Classifies one line (without its line terminator).
pub(crate) fn classify(line: &str) -> Result<LineCommand<'_>, LineError> {
    let mut input = line;
    let Ok(code) = line_type(&mut input) else {
        return Ok(LineCommand::Blank);
    };

    let mut fields = Fields::new(input);
    match code {
        "0" => type_zero(input),
        "1" => {
            let color = fields.color()?;
            let values = fields.numbers::<12>()?;
            let name = fields.name()?;
            Ok(LineCommand::Part {
                color,
                transform: Transform::from_ldraw_values(values),
                name,
            })
        }
        "2" => {
            let color = fields.color()?;
            let points = fields.points::<2>()?;
            fields.finish()?;
            Ok(LineCommand::Line { color, points })
        }
        "3" => {
            let color = fields.color()?;
            let points = fields.points::<3>()?;
            fields.finish()?;
            Ok(LineCommand::Triangle { color, points })
        }
        "4" => {
            let color = fields.color()?;
            let points = fields.points::<4>()?;
            fields.finish()?;
            Ok(LineCommand::Quadrilateral { color, points })
        }
        "5" => {
            let color = fields.color()?;
            let points = fields.points::<4>()?;
            fields.finish()?;
            Ok(LineCommand::ConditionalLine { color, points })
        }
        other => Err(LineError::malformed(format!("unknown line type `{other}`"))
            .with_help("LDraw lines start with a type code from 0 to 5")),
    }
}

fn line_type<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    preceded(space0, take_till(1.., SEPARATORS)).parse_next(input)
}

fn field<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    preceded(space1, take_till(1.., SEPARATORS)).parse_next(input)
}

fn comment_text<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    preceded(one_of(SEPARATORS), rest).parse_next(input)
}

fn type_zero(input: &str) -> Result<LineCommand<'_>, LineError> {
    let mut remaining = input;
    let text = if remaining.is_empty() {
        ""
    } else {
        comment_text(&mut remaining).map_err(|_| LineError::malformed("expected a separator after `0`"))?
    };
    match meta(text) {
        Some(result) => result.map(LineCommand::Meta),
        None => Ok(LineCommand::Comment(text)),
    }
}

/// Recognises a meta command in the text of a type 0 line.
///
/// Returns `None` for plain comments.
fn meta(text: &str) -> Option<Result<Meta<'_>, LineError>> {
    let mut input = text;
    let keyword = line_type(&mut input).ok()?;
    let blank = input.trim().is_empty();
    match keyword {
        "STEP" if blank => Some(Ok(Meta::Step)),
        "NOFILE" if blank => Some(Ok(Meta::NoFile)),
        "ROTSTEP" => Some(rotstep(input)),
        "FILE" => {
            let name = input.trim();
            if name.is_empty() {
                Some(Err(LineError::malformed("`0 FILE` needs a model name")))
            } else {
                Some(Ok(Meta::File(name)))
            }
        }
        "Name:" => Some(Ok(Meta::Name(input.trim()))),
        "Author:" => Some(Ok(Meta::Author(input.trim()))),
        "SYNTH" => synth(input).map(|result| result.map(Meta::Synth)),
        _ => None,
    }
}

fn rotstep(input: &str) -> Result<Meta<'_>, LineError> {
    let mut fields = Fields::new(input);
    if input.trim() == "END" {
        return Ok(Meta::RotStep(StepRotation::End));
    }
    let [x, y, z] = fields.numbers::<3>()?;
    let angles = Vec3::new(x, y, z);
    let rotation = match fields.optional()? {
        None | Some("REL") => StepRotation::Relative(angles),
        Some("ABS") => StepRotation::Absolute(angles),
        Some("ADD") => StepRotation::Additive(angles),
        Some(other) => {
            return Err(LineError::malformed(format!("unknown rotation mode `{other}`"))
                .with_help("use REL, ABS or ADD"));
        }
    };
    fields.finish()?;
    Ok(Meta::RotStep(rotation))
}

/// Recognises a `0 SYNTH` marker; unknown sub-commands are plain comments.
fn synth(input: &str) -> Option<Result<SynthMarker<'_>, LineError>> {
    let mut fields = Fields::new(input);
    let keyword = fields.next().ok()?;
    let marker = match keyword {
        "BEGIN" => synth_begin(fields),
        "SHOW" => fields.finish().map(|()| SynthMarker::Show),
        "HIDE" => fields.finish().map(|()| SynthMarker::Hide),
        "CONSTRAINT" => synth_constraint(fields),
        "SYNTHESIZED" => match fields.next() {
            Ok("BEGIN") => fields.finish().map(|()| SynthMarker::SynthesizedBegin),
            Ok("END") => fields.finish().map(|()| SynthMarker::SynthesizedEnd),
            _ => Err(LineError::malformed("expected `SYNTHESIZED BEGIN` or `SYNTHESIZED END`")),
        },
        "END" => fields.finish().map(|()| SynthMarker::End),
        _ => return None,
    };
    Some(marker)
}

fn synth_begin(mut fields: Fields<'_>) -> Result<SynthMarker<'_>, LineError> {
    let synth_type = fields.next()?;
    let color = fields.color()?;
    fields.finish()?;
    Ok(SynthMarker::Begin { synth_type, color })
}

fn synth_constraint(mut fields: Fields<'_>) -> Result<SynthMarker<'_>, LineError> {
    let role = fields.next()?.parse::<ConstraintRole>().map_err(|err| {
        LineError::malformed(err.to_string()).with_help("use START, MID, END or CROSS")
    })?;
    fields.finish()?;
    Ok(SynthMarker::Constraint(role))
}

/// Cursor over the whitespace separated fields of a line.
struct Fields<'a> {
    input: &'a str,
    read: usize,
}

impl<'a> Fields<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, read: 0 }
    }

    fn next(&mut self) -> Result<&'a str, LineError> {
        let token = field(&mut self.input).map_err(|_| {
            LineError::malformed(format!("missing field {}", self.read + 1))
        })?;
        self.read += 1;
        Ok(token)
    }

    /// The next field, or `None` at the end of the line.
    fn optional(&mut self) -> Result<Option<&'a str>, LineError> {
        if self.input.trim().is_empty() {
            Ok(None)
        } else {
            self.next().map(Some)
        }
    }

    fn color(&mut self) -> Result<ColorCode, LineError> {
        let token = self.next()?;
        token.parse::<ColorCode>().map_err(|err| {
            LineError::new(ErrorCode::E102, err.to_string())
                .with_help("use a color number or a direct color such as 0x2FF8000")
        })
    }

    fn number(&mut self) -> Result<f64, LineError> {
        let token = self.next()?;
        float::<_, f64, ContextError>
            .verify(|value: &f64| value.is_finite())
            .parse(token)
            .map_err(|_| LineError::new(ErrorCode::E101, format!("invalid number `{token}`")))
    }

    fn numbers<const N: usize>(&mut self) -> Result<[f64; N], LineError> {
        let mut values = [0.0; N];
        for value in &mut values {
            *value = self.number()?;
        }
        Ok(values)
    }

    fn points<const N: usize>(&mut self) -> Result<[Point3; N], LineError> {
        let mut points = [Point3::origin(); N];
        for point in &mut points {
            let [x, y, z] = self.numbers::<3>()?;
            *point = Point3::new(x, y, z);
        }
        Ok(points)
    }

    /// The rest of the line as a part name, which may contain spaces.
    fn name(&mut self) -> Result<&'a str, LineError> {
        let name = self.input.trim();
        if name.is_empty() {
            return Err(LineError::malformed("missing part name"));
        }
        self.input = "";
        Ok(name)
    }

    fn finish(self) -> Result<(), LineError> {
        if self.input.trim().is_empty() {
            Ok(())
        } else {
            Err(LineError::malformed(format!(
                "unexpected trailing text `{}`",
                self.input.trim()
            )))
        }
    }
}
