//! CLI logic for the Brickyard model tool.
//!
//! Reads an LDraw document, then rewrites it with freshly synthesized
//! LSynth parts or prints a piece count or the size of a model.

pub mod error_adapter;

mod args;
mod config;

pub use args::{Args, Command};

use std::{fs, io};

use log::{info, warn};

use brickyard::{
    BrickyardError, Document, DocumentBuilder, geometry::format_ldraw_number,
    part_library::PartCatalog,
};

use error_adapter::{diagnostics_to_reportables, render};

/// LDraw units across one stud.
const LDU_PER_STUD: f64 = 20.0;

/// Centimetres in one LDraw unit.
const CM_PER_LDU: f64 = 0.04;

/// Run the Brickyard CLI application, printing to standard output.
///
/// # Errors
///
/// Returns `BrickyardError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Parsing errors in strict mode
/// - Unknown model names
pub fn run(args: &Args) -> Result<(), BrickyardError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_with_output(args, &mut out)
}

/// Run the Brickyard CLI application, printing to `out`.
///
/// # Errors
///
/// See [`run`].
pub fn run_with_output(args: &Args, out: &mut dyn io::Write) -> Result<(), BrickyardError> {
    info!(input_path = args.input, command:? = args.command; "Processing model");

    let app_config = config::load_config(args.config.as_ref())?;
    let source = fs::read_to_string(&args.input)?;

    let builder = DocumentBuilder::new(app_config);
    let library = builder.library();
    let mut document = builder.parse(&source)?;
    for reportable in diagnostics_to_reportables(document.diagnostics(), &source) {
        warn!("{}", render(&reportable));
    }

    match &args.command {
        Command::Rewrite { output } => {
            rewrite(&builder, &mut document, &library, output.as_deref(), out)
        }
        Command::Report => report(&document, &library, out),
        Command::Dimensions { model } => dimensions(&document, &library, model.as_deref(), out),
    }
}

fn rewrite(
    builder: &DocumentBuilder,
    document: &mut Document,
    library: &PartCatalog,
    output: Option<&str>,
    out: &mut dyn io::Write,
) -> Result<(), BrickyardError> {
    for (block, outcome) in document.resynthesize_all(library) {
        if let Err(err) = outcome {
            warn!(block:? = block, err:% = err; "Block left as it was");
        }
    }

    let text = builder.write(document);
    match output {
        Some(path) => {
            fs::write(path, text)?;
            info!(output_file = path; "Model written");
        }
        None => out.write_all(text.as_bytes())?,
    }
    Ok(())
}

fn report(
    document: &Document,
    library: &PartCatalog,
    out: &mut dyn io::Write,
) -> Result<(), BrickyardError> {
    let model = document.model(None)?;
    let report = document.part_report(model)?;

    for (name, color, count) in report.entries() {
        writeln!(out, "{count:>5}  {name}  color {color}")?;
    }
    writeln!(out, "{:>5}  total", report.total())?;

    let missing = report.missing(library);
    if !missing.is_empty() && !library.is_empty() {
        writeln!(out)?;
        writeln!(out, "Missing from the part library:")?;
        for name in missing {
            writeln!(out, "  {name}")?;
        }
    }
    Ok(())
}

fn dimensions(
    document: &Document,
    library: &PartCatalog,
    name: Option<&str>,
    out: &mut dyn io::Write,
) -> Result<(), BrickyardError> {
    let model = document.model(name)?;
    let dims = document.dimensions(model, library)?;

    let Some(size) = dims.size() else {
        writeln!(out, "Model has no measurable parts")?;
        return Ok(());
    };

    let row = |scale: f64| {
        format!(
            "{} x {} x {}",
            format_ldraw_number(size.x * scale),
            format_ldraw_number(size.y * scale),
            format_ldraw_number(size.z * scale)
        )
    };
    writeln!(out, "LDU:   {}", row(1.0))?;
    writeln!(out, "Studs: {}", row(1.0 / LDU_PER_STUD))?;
    writeln!(out, "cm:    {}", row(CM_PER_LDU))?;

    if !dims.unresolved.is_empty() {
        writeln!(out)?;
        writeln!(out, "Not measured:")?;
        for name in &dims.unresolved {
            writeln!(out, "  {name}")?;
        }
    }
    Ok(())
}
