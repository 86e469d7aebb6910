//! md2pdf – command-line markdown → PDF converter.
//!
//! Usage:
//!   md2pdf [input.md] [-o output.pdf] [--margin 0.8] [--font-size 11] ...
//!
//! Reads stdin when the input is `-` or omitted. If `-o` is omitted the PDF
//! is written to the output directory with the input's stem
//! (e.g. `notes.md` → `output/notes.pdf`).

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::{fs, io};

use clap::Parser;

use md2pdf::{samples, Config, ConversionResult, Converter, ForgeEngine, MarkdownToPdfTool};

#[derive(Parser, Debug)]
#[command(author, version, about = "Convert markdown to a styled, paginated PDF")]
struct Cli {
    /// Markdown file to convert (`-` or omitted: read stdin)
    input: Option<PathBuf>,

    /// Output PDF path (default: <output-dir>/<input stem>.pdf)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Page margin in inches
    #[arg(long, allow_negative_numbers = true)]
    margin: Option<f32>,

    /// Maximum header image height in px
    #[arg(long, allow_negative_numbers = true)]
    header_height: Option<i32>,

    /// Body font size in pt
    #[arg(long, allow_negative_numbers = true)]
    font_size: Option<i32>,

    /// Extra stylesheet applied to the document
    #[arg(long)]
    stylesheet: Option<PathBuf>,

    /// Image repeated at the top of every page
    #[arg(long, conflicts_with = "no_header")]
    header_image: Option<PathBuf>,

    /// Do not use a header image
    #[arg(long)]
    no_header: bool,

    /// Directory for generated PDFs
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Document title
    #[arg(long)]
    title: Option<String>,

    /// Also write the assembled HTML to this path
    #[arg(long)]
    emit_html: Option<PathBuf>,

    /// Also write the paginated layout as JSON to this path
    #[arg(long)]
    emit_layout: Option<PathBuf>,

    /// Convert the built-in sample document instead of an input file
    #[arg(long, conflicts_with = "input")]
    sample: bool,

    /// Print the markdown_to_pdf tool descriptor as JSON and exit
    #[arg(long)]
    tool_schema: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if cli.tool_schema {
        println!(
            "{}",
            serde_json::to_string_pretty(&MarkdownToPdfTool::descriptor())?
        );
        return Ok(ExitCode::SUCCESS);
    }

    let config = build_config(&cli)?;

    let (markdown, stem) = if cli.sample {
        (samples::basic_document().to_string(), "sample_document".to_string())
    } else {
        read_input(cli.input.as_deref())?
    };

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| config.output_dir().join(format!("{stem}.pdf")));

    let mut engine = ForgeEngine::new();
    if let Some(path) = &cli.emit_layout {
        engine = engine.with_layout_dump(path);
    }
    let converter = Converter::new(config)?.with_engine(engine);

    if let Some(path) = &cli.emit_html {
        fs::write(path, converter.assemble(&markdown))?;
        log::info!("HTML written to {}", path.display());
    }

    match converter.convert(&markdown, &output) {
        ConversionResult::Success {
            output_path,
            size_bytes,
        } => {
            eprintln!("Wrote '{}' ({size_bytes} bytes)", output_path.display());
            Ok(ExitCode::SUCCESS)
        }
        ConversionResult::Failure { error, .. } => {
            eprintln!("Error: {error}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn build_config(cli: &Cli) -> Result<Config, md2pdf::ConfigError> {
    let mut builder = Config::builder();
    if let Some(v) = cli.margin {
        builder = builder.margin(v);
    }
    if let Some(v) = cli.header_height {
        builder = builder.header_height(v);
    }
    if let Some(v) = cli.font_size {
        builder = builder.font_size(v);
    }
    if let Some(v) = &cli.stylesheet {
        builder = builder.stylesheet_path(v);
    }
    if cli.no_header {
        builder = builder.no_header_image();
    } else if let Some(v) = &cli.header_image {
        builder = builder.header_image_path(v);
    }
    if let Some(v) = &cli.output_dir {
        builder = builder.output_dir(v);
    }
    if let Some(v) = &cli.title {
        builder = builder.title(v);
    }
    builder.build()
}

/// Markdown text and the stem used for the default output name.
fn read_input(input: Option<&Path>) -> io::Result<(String, String)> {
    match input {
        None => read_stdin(),
        Some(p) if p == Path::new("-") => read_stdin(),
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|e| {
                io::Error::new(e.kind(), format!("cannot read '{}': {e}", path.display()))
            })?;
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("document")
                .to_string();
            Ok((text, stem))
        }
    }
}

fn read_stdin() -> io::Result<(String, String)> {
    let mut text = String::new();
    io::stdin().read_to_string(&mut text)?;
    Ok((text, "document".to_string()))
}
