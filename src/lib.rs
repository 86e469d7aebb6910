//! # md2pdf – Markdown → styled, paginated PDF
//!
//! A markdown document is turned into a self-styled HTML document and then
//! rendered to PDF by a built-in engine. The stages are:
//!
//! 1. **Configure** – margins, header, font size, paths ([`config`])
//! 2. **Assemble** – markdown → full HTML document ([`markdown`], [`assembler`])
//! 3. **Parse** – HTML string → DOM tree ([`dom`])
//! 4. **Style** – CSS cascade with `@page` support ([`style`])
//! 5. **Layout** – flexbox layout with Taffy ([`layout`])
//! 6. **Paginate** – split into pages, repeat fixed headers ([`pagination`])
//! 7. **Render** – emit PDF bytes via printpdf ([`render`])
//!
//! [`Converter`] drives the whole chain and never fails loudly: every
//! problem ends up in a [`ConversionResult`]. The [`tool`] module wraps it as
//! a `markdown_to_pdf` tool call.
//!
//! ```no_run
//! use md2pdf::{Config, Converter};
//!
//! let config = Config::builder().margin(0.8).font_size(11).build()?;
//! let converter = Converter::new(config)?;
//! let result = converter.convert("# Hello\n\nWorld", "output/hello.pdf");
//! println!("{result}");
//! # Ok::<(), md2pdf::ConfigError>(())
//! ```

pub mod assembler;
pub mod config;
pub mod converter;
pub mod diagnostics;
pub mod dom;
pub mod engine;
pub mod error;
pub mod fonts;
pub mod layout;
pub mod layout_config;
pub mod markdown;
pub mod pagination;
pub mod pipeline;
pub mod render;
pub mod resources;
pub mod samples;
pub mod style;
pub mod tool;

// Re-exports for convenience
pub use assembler::DocumentAssembler;
pub use config::{Config, ConfigBuilder, EnvSource, Stylesheet};
pub use converter::{ConversionResult, Converter};
pub use diagnostics::{Diagnostics, LogDiagnostics, MemoryDiagnostics};
pub use engine::{ForgeEngine, RenderEngine};
pub use error::{ConfigError, ConvertError, RenderError};
pub use pipeline::{compute_layout_config, generate_pdf};
pub use tool::MarkdownToPdfTool;
