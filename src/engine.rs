//! The seam between the conversion service and the HTML → PDF renderer.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Stylesheet;
use crate::error::RenderError;
use crate::pipeline::generate_pdf;

/// Renders a complete HTML document to a PDF file.
///
/// Implementations must leave a file at `output` when they return `Ok`.
pub trait RenderEngine: Send + Sync {
    fn write_pdf(
        &self,
        html: &str,
        stylesheets: &[Stylesheet],
        output: &Path,
    ) -> Result<(), RenderError>;
}

/// The built-in engine: parse, style, lay out, paginate and render with
/// `printpdf`.
#[derive(Debug, Clone, Default)]
pub struct ForgeEngine {
    layout_dump: Option<PathBuf>,
}

impl ForgeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also write the paginated layout as JSON to `path` on every render.
    pub fn with_layout_dump(mut self, path: impl Into<PathBuf>) -> Self {
        self.layout_dump = Some(path.into());
        self
    }
}

impl RenderEngine for ForgeEngine {
    fn write_pdf(
        &self,
        html: &str,
        stylesheets: &[Stylesheet],
        output: &Path,
    ) -> Result<(), RenderError> {
        let (bytes, layout) = generate_pdf(html, stylesheets)?;

        if let Some(dump) = &self.layout_dump {
            let json = layout
                .to_json()
                .map_err(|e| RenderError::Layout(format!("cannot serialise layout: {e}")))?;
            fs::write(dump, json).map_err(|source| RenderError::Write {
                path: dump.clone(),
                source,
            })?;
            log::debug!("Layout written to {}", dump.display());
        }

        fs::write(output, &bytes).map_err(|source| RenderError::Write {
            path: output.to_path_buf(),
            source,
        })?;
        log::debug!(
            "Wrote {} page(s), {} bytes to {}",
            layout.pages.len(),
            bytes.len(),
            output.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout_config::LayoutConfig;

    #[test]
    fn writes_pdf_and_layout_dump() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("out.pdf");
        let json = dir.path().join("layout.json");
        let engine = ForgeEngine::new().with_layout_dump(&json);

        engine
            .write_pdf("<h1>Title</h1><p>Body</p>", &[], &pdf)
            .unwrap();

        let bytes = fs::read(&pdf).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        let layout = LayoutConfig::from_json(&fs::read_to_string(&json).unwrap()).unwrap();
        assert!(layout.all_text().contains("Title"));
    }

    #[test]
    fn unwritable_output_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("missing").join("out.pdf");
        let err = ForgeEngine::new().write_pdf("<p>x</p>", &[], &output).unwrap_err();
        assert!(matches!(err, RenderError::Write { .. }));
    }
}
