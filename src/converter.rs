//! The conversion service: markdown in, PDF file out.
//!
//! [`Converter::convert`] is fail-soft. Every error on the way (missing
//! stylesheet, engine failure, engine panic, unwritable directory) is logged
//! through the injected [`Diagnostics`] and returned as
//! [`ConversionResult::Failure`]; nothing propagates to the caller.

use std::fmt;
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use crate::assembler::DocumentAssembler;
use crate::config::{ensure_dir, Config};
use crate::diagnostics::{Diagnostics, LogDiagnostics};
use crate::engine::{ForgeEngine, RenderEngine};
use crate::error::{ConfigError, ConvertError, RenderError};

/// Outcome of a single conversion.
#[derive(Debug)]
pub enum ConversionResult {
    Success { output_path: PathBuf, size_bytes: u64 },
    Failure { output_path: PathBuf, error: ConvertError },
}

impl ConversionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn output_path(&self) -> &Path {
        match self {
            Self::Success { output_path, .. } | Self::Failure { output_path, .. } => output_path,
        }
    }

    /// Size of the written PDF; `None` on failure.
    pub fn size_bytes(&self) -> Option<u64> {
        match self {
            Self::Success { size_bytes, .. } => Some(*size_bytes),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ConvertError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }
}

impl fmt::Display for ConversionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success {
                output_path,
                size_bytes,
            } => write!(
                f,
                "PDF generated: {} ({size_bytes} bytes)",
                output_path.display()
            ),
            Self::Failure { output_path, error } => write!(
                f,
                "PDF generation to {} failed: {error}",
                output_path.display()
            ),
        }
    }
}

/// Converts markdown documents to PDF files using one [`Config`].
pub struct Converter {
    config: Config,
    assembler: DocumentAssembler,
    engine: Box<dyn RenderEngine>,
    diagnostics: Box<dyn Diagnostics>,
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Converter {
    /// Validate `config` and set up the built-in engine with `log` output.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let assembler = DocumentAssembler::new(&config);
        Ok(Self {
            config,
            assembler,
            engine: Box::new(ForgeEngine::new()),
            diagnostics: Box::new(LogDiagnostics),
        })
    }

    pub fn with_engine(mut self, engine: impl RenderEngine + 'static) -> Self {
        self.engine = Box::new(engine);
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: impl Diagnostics + 'static) -> Self {
        self.diagnostics = Box::new(diagnostics);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The HTML that [`convert`](Self::convert) would hand to the engine.
    pub fn assemble(&self, markdown: &str) -> String {
        let header = self.header_image_uri();
        self.assembler.assemble(markdown, header.as_deref())
    }

    /// Convert into `file_name` inside the configured output directory.
    pub fn convert_in_output_dir(&self, markdown: &str, file_name: &str) -> ConversionResult {
        let output_path = self.config.output_dir().join(file_name);
        self.convert(markdown, output_path)
    }

    /// Render `markdown` to a PDF at `output_path`.
    pub fn convert(&self, markdown: &str, output_path: impl AsRef<Path>) -> ConversionResult {
        let output_path = output_path.as_ref().to_path_buf();
        self.diagnostics.info(&format!(
            "Starting PDF generation to: {}",
            output_path.display()
        ));

        match self.try_convert(markdown, &output_path) {
            Ok(size_bytes) => {
                self.diagnostics.info(&format!(
                    "✓ PDF generated successfully: {} (Size: {size_bytes} bytes)",
                    output_path.display()
                ));
                ConversionResult::Success {
                    output_path,
                    size_bytes,
                }
            }
            Err(error) => {
                match &error {
                    ConvertError::MissingOutput(path) => self.diagnostics.error(&format!(
                        "✗ PDF file was not created at: {}",
                        path.display()
                    )),
                    other => self
                        .diagnostics
                        .error(&format!("Error generating PDF: {other}")),
                }
                ConversionResult::Failure { output_path, error }
            }
        }
    }

    fn try_convert(&self, markdown: &str, output_path: &Path) -> Result<u64, ConvertError> {
        let html = self.assemble(markdown);
        self.diagnostics.debug("HTML document created");

        if let Some(parent) = output_path.parent() {
            let created = ensure_dir(parent).map_err(|source| ConvertError::Filesystem {
                path: parent.to_path_buf(),
                source,
            })?;
            if created {
                self.diagnostics.info(&format!(
                    "Created output directory: {}",
                    parent.display()
                ));
            }
        }

        let stylesheet = self.config.resolve_stylesheet()?;

        // A file from an earlier run must not pass for this run's output.
        match fs::remove_file(output_path) {
            Ok(()) => self.diagnostics.debug(&format!(
                "Removed previous output: {}",
                output_path.display()
            )),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(ConvertError::Filesystem {
                    path: output_path.to_path_buf(),
                    source,
                })
            }
        }

        self.diagnostics.info("Generating PDF...");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.engine
                .write_pdf(&html, std::slice::from_ref(&stylesheet), output_path)
        }));
        match outcome {
            Ok(result) => result?,
            Err(payload) => return Err(RenderError::Panicked(panic_message(&*payload)).into()),
        }

        if !output_path.exists() {
            return Err(ConvertError::MissingOutput(output_path.to_path_buf()));
        }
        let metadata = fs::metadata(output_path).map_err(|source| ConvertError::Filesystem {
            path: output_path.to_path_buf(),
            source,
        })?;
        Ok(metadata.len())
    }

    /// `file://` URI of the configured header image, or `None` when it is
    /// unset or missing. A missing image is reported but never fatal.
    fn header_image_uri(&self) -> Option<String> {
        let path = self.config.header_image_path()?;
        if !path.exists() {
            self.diagnostics.warn(&format!(
                "Header image not found at: {}",
                path.display()
            ));
            return None;
        }
        match file_uri(path) {
            Ok(uri) => {
                self.diagnostics
                    .info(&format!("Header image found at: {}", path.display()));
                self.diagnostics.debug(&format!("Header image URI: {uri}"));
                Some(uri)
            }
            Err(e) => {
                self.diagnostics.warn(&format!(
                    "Header image at {} cannot be resolved: {e}",
                    path.display()
                ));
                None
            }
        }
    }
}

/// Absolute `file://` URI with percent-encoded path segments.
pub fn file_uri(path: &Path) -> std::io::Result<String> {
    let absolute = std::path::absolute(path)?;
    let normalised = absolute.to_string_lossy().replace('\\', "/");
    let encoded: Vec<String> = normalised
        .split('/')
        .enumerate()
        .map(|(i, segment)| {
            // Keep Windows drive letters (`C:`) readable.
            if i == 0 && segment.len() == 2 && segment.ends_with(':') {
                segment.to_string()
            } else {
                urlencoding::encode(segment).into_owned()
            }
        })
        .collect();
    let joined = encoded.join("/");
    if joined.starts_with('/') {
        Ok(format!("file://{joined}"))
    } else {
        Ok(format!("file:///{joined}"))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Stylesheet;
    use crate::diagnostics::{Level, MemoryDiagnostics};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    struct StubEngine {
        bytes: &'static [u8],
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl RenderEngine for StubEngine {
        fn write_pdf(
            &self,
            html: &str,
            stylesheets: &[Stylesheet],
            output: &Path,
        ) -> Result<(), RenderError> {
            assert_eq!(stylesheets.len(), 1);
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(html.to_string());
            }
            fs::write(output, self.bytes).map_err(|source| RenderError::Write {
                path: output.to_path_buf(),
                source,
            })
        }
    }

    struct FailingEngine;

    impl RenderEngine for FailingEngine {
        fn write_pdf(&self, _: &str, _: &[Stylesheet], _: &Path) -> Result<(), RenderError> {
            Err(RenderError::Pdf("bad font".to_string()))
        }
    }

    struct PanickingEngine;

    impl RenderEngine for PanickingEngine {
        fn write_pdf(&self, _: &str, _: &[Stylesheet], _: &Path) -> Result<(), RenderError> {
            panic!("layout exploded")
        }
    }

    struct SilentEngine;

    impl RenderEngine for SilentEngine {
        fn write_pdf(&self, _: &str, _: &[Stylesheet], _: &Path) -> Result<(), RenderError> {
            Ok(())
        }
    }

    fn setup(dir: &Path, header: Option<&Path>) -> Config {
        let css = dir.join("styles.css");
        fs::write(&css, "p { color: #111; }").unwrap();
        let mut builder = Config::builder()
            .env(HashMap::<String, String>::new())
            .stylesheet_path(css)
            .output_dir(dir.join("output"));
        builder = match header {
            Some(h) => builder.header_image_path(h),
            None => builder.no_header_image(),
        };
        builder.build().unwrap()
    }

    fn stub(seen: &Arc<Mutex<Vec<String>>>) -> StubEngine {
        StubEngine {
            bytes: b"%PDF-1.7 stub",
            seen: Arc::clone(seen),
        }
    }

    #[test]
    fn success_reports_size() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let converter = Converter::new(setup(dir.path(), None))
            .unwrap()
            .with_engine(stub(&seen));
        let result = converter.convert_in_output_dir("# Hello", "hello.pdf");
        assert!(result.is_success(), "{result}");
        assert_eq!(result.size_bytes(), Some(13));
        assert_eq!(result.output_path(), dir.path().join("output/hello.pdf"));
        assert!(seen.lock().unwrap()[0].contains("<h1"));
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let converter = Converter::new(setup(dir.path(), None))
            .unwrap()
            .with_engine(stub(&seen));
        let target = dir.path().join("a/b/c/out.pdf");
        assert!(converter.convert("x", &target).is_success());
        assert!(converter.convert("x", &target).is_success());
        assert!(target.exists());
    }

    #[test]
    fn missing_header_warns_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let diag = Arc::new(MemoryDiagnostics::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let converter = Converter::new(setup(dir.path(), Some(&dir.path().join("nope.png"))))
            .unwrap()
            .with_engine(stub(&seen))
            .with_diagnostics(Arc::clone(&diag));
        let result = converter.convert_in_output_dir("text", "doc.pdf");
        assert!(result.is_success());
        let warnings = diag.messages(Level::Warn);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Header image not found"));
        assert!(!seen.lock().unwrap()[0].contains("<img"));
    }

    #[test]
    fn existing_header_is_embedded_as_file_uri() {
        let dir = tempfile::tempdir().unwrap();
        let header = dir.path().join("my header.png");
        fs::write(&header, b"png").unwrap();
        let converter = Converter::new(setup(dir.path(), Some(&header))).unwrap();
        let html = converter.assemble("text");
        assert!(html.contains("class=\"header-image\""));
        assert!(html.contains("my%20header.png"));
        assert!(html.contains("src=\"file:///"));
    }

    #[test]
    fn engine_error_becomes_failure() {
        let dir = tempfile::tempdir().unwrap();
        let diag = Arc::new(MemoryDiagnostics::new());
        let converter = Converter::new(setup(dir.path(), None))
            .unwrap()
            .with_engine(FailingEngine)
            .with_diagnostics(Arc::clone(&diag));
        let result = converter.convert_in_output_dir("x", "f.pdf");
        assert!(matches!(
            result.error(),
            Some(ConvertError::Rendering(RenderError::Pdf(_)))
        ));
        assert_eq!(diag.messages(Level::Error).len(), 1);
    }

    #[test]
    fn engine_panic_is_contained() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Converter::new(setup(dir.path(), None))
            .unwrap()
            .with_engine(PanickingEngine)
            .with_diagnostics(MemoryDiagnostics::new());
        let result = converter.convert_in_output_dir("x", "p.pdf");
        match result.error() {
            Some(ConvertError::Rendering(RenderError::Panicked(msg))) => {
                assert_eq!(msg, "layout exploded")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn engine_without_output_is_missing_output() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Converter::new(setup(dir.path(), None))
            .unwrap()
            .with_engine(SilentEngine)
            .with_diagnostics(MemoryDiagnostics::new());
        let result = converter.convert_in_output_dir("x", "none.pdf");
        assert!(matches!(result.error(), Some(ConvertError::MissingOutput(_))));
    }

    #[test]
    fn stale_output_does_not_count_as_success() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("output/stale.pdf");
        fs::create_dir_all(dir.path().join("output")).unwrap();
        fs::write(&stale, b"%PDF-1.3 from an earlier run").unwrap();
        let converter = Converter::new(setup(dir.path(), None))
            .unwrap()
            .with_engine(SilentEngine)
            .with_diagnostics(MemoryDiagnostics::new());
        let result = converter.convert_in_output_dir("x", "stale.pdf");
        assert!(matches!(result.error(), Some(ConvertError::MissingOutput(_))));
        assert!(!stale.exists());
    }

    #[test]
    fn missing_stylesheet_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(dir.path(), None);
        config.set_stylesheet_path(dir.path().join("gone.css"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let converter = Converter::new(config)
            .unwrap()
            .with_engine(stub(&seen))
            .with_diagnostics(MemoryDiagnostics::new());
        let result = converter.convert_in_output_dir("x", "s.pdf");
        assert!(matches!(
            result.error(),
            Some(ConvertError::Config(ConfigError::StylesheetNotFound(_)))
        ));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn file_uri_encodes_segments() {
        let uri = file_uri(Path::new("/tmp/a b/c#d.png")).unwrap();
        assert_eq!(uri, "file:///tmp/a%20b/c%23d.png");
    }

    #[test]
    fn converter_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Converter>();
        assert_send_sync::<ForgeEngine>();
    }
}
