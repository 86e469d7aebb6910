//! Conversion configuration – page layout parameters and resource paths.
//!
//! Values are resolved once, at [`ConfigBuilder::build`], in the order
//! explicit value → environment variable → built-in default. The resulting
//! [`Config`] is always valid; setters re-check the invariant of the field they
//! touch and refuse bad values instead of clamping them.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const DEFAULT_MARGIN_IN: f32 = 1.0;
pub const DEFAULT_HEADER_HEIGHT_PX: i32 = 50;
pub const DEFAULT_FONT_SIZE_PT: i32 = 12;
pub const DEFAULT_STYLESHEET_PATH: &str = "styles/styles.css";
pub const DEFAULT_HEADER_IMAGE_PATH: &str = "images/header.png";
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_TITLE: &str = "Markdown Document";

pub const ENV_MARGIN: &str = "PDF_MARGIN";
pub const ENV_HEADER_HEIGHT: &str = "PDF_HEADER_HEIGHT";
pub const ENV_FONT_SIZE: &str = "PDF_FONT_SIZE";
pub const ENV_STYLESHEET_PATH: &str = "PDF_STYLESHEET_PATH";
pub const ENV_HEADER_PATH: &str = "PDF_HEADER_PATH";
pub const ENV_OUTPUT_DIR: &str = "PDF_OUTPUT_DIR";
pub const ENV_TITLE: &str = "PDF_TITLE";

// ---------------------------------------------------------------------------
// Environment source
// ---------------------------------------------------------------------------

/// String-keyed lookup used only while building a [`Config`].
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvSource for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }
}

// ---------------------------------------------------------------------------
// Stylesheet
// ---------------------------------------------------------------------------

/// A stylesheet loaded from disk, ready to hand to a rendering engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stylesheet {
    pub path: PathBuf,
    pub css: String,
}

impl Stylesheet {
    /// Build a stylesheet from CSS text that has no backing file.
    pub fn inline(css: impl Into<String>) -> Self {
        Self {
            path: PathBuf::new(),
            css: css.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Validated conversion settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    margin: f32,
    header_height: i32,
    font_size: i32,
    stylesheet_path: PathBuf,
    header_image_path: Option<PathBuf>,
    output_dir: PathBuf,
    title: String,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Build from environment variables and defaults only.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    /// Page margin in inches.
    pub fn margin(&self) -> f32 {
        self.margin
    }

    /// Pixel height reserved for the header image.
    pub fn header_height(&self) -> i32 {
        self.header_height
    }

    /// Body font size in points.
    pub fn font_size(&self) -> i32 {
        self.font_size
    }

    pub fn stylesheet_path(&self) -> &Path {
        &self.stylesheet_path
    }

    pub fn header_image_path(&self) -> Option<&Path> {
        self.header_image_path.as_deref()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_margin(&mut self, margin: f32) -> Result<(), ConfigError> {
        check_margin(margin)?;
        self.margin = margin;
        Ok(())
    }

    pub fn set_header_height(&mut self, header_height: i32) -> Result<(), ConfigError> {
        check_header_height(header_height)?;
        self.header_height = header_height;
        Ok(())
    }

    pub fn set_font_size(&mut self, font_size: i32) -> Result<(), ConfigError> {
        check_font_size(font_size)?;
        self.font_size = font_size;
        Ok(())
    }

    pub fn set_stylesheet_path(&mut self, path: impl Into<PathBuf>) {
        self.stylesheet_path = path.into();
    }

    pub fn set_header_image_path(&mut self, path: Option<PathBuf>) {
        self.header_image_path = path;
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Re-check every invariant, reporting the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_margin(self.margin)?;
        check_header_height(self.header_height)?;
        check_font_size(self.font_size)?;
        Ok(())
    }

    /// Load the configured stylesheet.
    ///
    /// Fails with [`ConfigError::StylesheetNotFound`] when the file is absent,
    /// so a bad path is reported before any rendering work starts.
    pub fn resolve_stylesheet(&self) -> Result<Stylesheet, ConfigError> {
        if !self.stylesheet_path.exists() {
            return Err(ConfigError::StylesheetNotFound(self.stylesheet_path.clone()));
        }
        let css = fs::read_to_string(&self.stylesheet_path).map_err(|source| {
            ConfigError::StylesheetRead {
                path: self.stylesheet_path.clone(),
                source,
            }
        })?;
        log::debug!("Loaded stylesheet {}", self.stylesheet_path.display());
        Ok(Stylesheet {
            path: self.stylesheet_path.clone(),
            css,
        })
    }
}

fn check_margin(margin: f32) -> Result<(), ConfigError> {
    if !margin.is_finite() {
        return Err(ConfigError::validation("margin", format!("must be a finite number, got {margin}")));
    }
    if margin < 0.0 {
        return Err(ConfigError::validation("margin", format!("must be >= 0, got {margin}")));
    }
    Ok(())
}

fn check_header_height(header_height: i32) -> Result<(), ConfigError> {
    if header_height < 0 {
        return Err(ConfigError::validation(
            "header_height",
            format!("must be >= 0, got {header_height}"),
        ));
    }
    Ok(())
}

fn check_font_size(font_size: i32) -> Result<(), ConfigError> {
    if font_size <= 0 {
        return Err(ConfigError::validation(
            "font_size",
            format!("must be greater than 0, got {font_size}"),
        ));
    }
    Ok(())
}

/// Create `dir` and its parents; an existing directory is not an error.
pub(crate) fn ensure_dir(dir: &Path) -> std::io::Result<bool> {
    if dir.as_os_str().is_empty() || dir.is_dir() {
        return Ok(false);
    }
    fs::create_dir_all(dir)?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects explicit values; anything left unset falls back to the
/// environment and then to the built-in default.
#[derive(Default)]
pub struct ConfigBuilder {
    margin: Option<f32>,
    header_height: Option<i32>,
    font_size: Option<i32>,
    stylesheet_path: Option<PathBuf>,
    header_image_path: Option<Option<PathBuf>>,
    output_dir: Option<PathBuf>,
    title: Option<String>,
    env: Option<Box<dyn EnvSource>>,
}

impl ConfigBuilder {
    pub fn margin(mut self, inches: f32) -> Self {
        self.margin = Some(inches);
        self
    }

    pub fn header_height(mut self, px: i32) -> Self {
        self.header_height = Some(px);
        self
    }

    pub fn font_size(mut self, pt: i32) -> Self {
        self.font_size = Some(pt);
        self
    }

    pub fn stylesheet_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.stylesheet_path = Some(path.into());
        self
    }

    pub fn header_image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.header_image_path = Some(Some(path.into()));
        self
    }

    /// Explicitly disable the header image, ignoring `PDF_HEADER_PATH`.
    pub fn no_header_image(mut self) -> Self {
        self.header_image_path = Some(None);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Replace the process environment as the fallback source.
    pub fn env(mut self, source: impl EnvSource + 'static) -> Self {
        self.env = Some(Box::new(source));
        self
    }

    /// Resolve, validate, and create the output directory.
    pub fn build(self) -> Result<Config, ConfigError> {
        let env: Box<dyn EnvSource> = self.env.unwrap_or_else(|| Box::new(ProcessEnv));
        let env = env.as_ref();

        let margin = match self.margin {
            Some(v) => v,
            None => env_parsed(env, ENV_MARGIN, "margin")?.unwrap_or(DEFAULT_MARGIN_IN),
        };
        let header_height = match self.header_height {
            Some(v) => v,
            None => env_parsed(env, ENV_HEADER_HEIGHT, "header_height")?
                .unwrap_or(DEFAULT_HEADER_HEIGHT_PX),
        };
        let font_size = match self.font_size {
            Some(v) => v,
            None => env_parsed(env, ENV_FONT_SIZE, "font_size")?.unwrap_or(DEFAULT_FONT_SIZE_PT),
        };
        let stylesheet_path = self
            .stylesheet_path
            .or_else(|| env.var(ENV_STYLESHEET_PATH).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STYLESHEET_PATH));
        let header_image_path = match self.header_image_path {
            Some(explicit) => explicit,
            None => match env.var(ENV_HEADER_PATH) {
                Some(v) if v.trim().is_empty() => None,
                Some(v) => Some(PathBuf::from(v)),
                None => Some(PathBuf::from(DEFAULT_HEADER_IMAGE_PATH)),
            },
        };
        let output_dir = self
            .output_dir
            .or_else(|| env.var(ENV_OUTPUT_DIR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let title = self
            .title
            .or_else(|| env.var(ENV_TITLE))
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        let config = Config {
            margin,
            header_height,
            font_size,
            stylesheet_path,
            header_image_path,
            output_dir,
            title,
        };
        config.validate()?;

        match ensure_dir(&config.output_dir) {
            Ok(true) => log::info!("Created output directory: {}", config.output_dir.display()),
            Ok(false) => {}
            Err(source) => {
                return Err(ConfigError::OutputDir {
                    path: config.output_dir.clone(),
                    source,
                })
            }
        }

        Ok(config)
    }
}

/// Parse an environment variable, mapping parse failures to a validation
/// error on `field`.
fn env_parsed<T: std::str::FromStr>(
    env: &dyn EnvSource,
    key: &str,
    field: &'static str,
) -> Result<Option<T>, ConfigError> {
    match env.var(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            ConfigError::validation(field, format!("{key}={raw:?} is not a valid number"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_env() -> HashMap<String, String> {
        HashMap::new()
    }

    fn builder_in(dir: &Path) -> ConfigBuilder {
        Config::builder()
            .env(empty_env())
            .output_dir(dir.join("out"))
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = builder_in(tmp.path()).build().unwrap();
        assert_eq!(cfg.margin(), DEFAULT_MARGIN_IN);
        assert_eq!(cfg.header_height(), DEFAULT_HEADER_HEIGHT_PX);
        assert_eq!(cfg.font_size(), DEFAULT_FONT_SIZE_PT);
        assert_eq!(cfg.stylesheet_path(), Path::new(DEFAULT_STYLESHEET_PATH));
        assert_eq!(cfg.header_image_path(), Some(Path::new(DEFAULT_HEADER_IMAGE_PATH)));
        assert_eq!(cfg.title(), DEFAULT_TITLE);
    }

    #[test]
    fn explicit_beats_env_beats_default() {
        let tmp = tempfile::tempdir().unwrap();
        let mut env = HashMap::new();
        env.insert(ENV_MARGIN.to_string(), "0.5".to_string());
        env.insert(ENV_FONT_SIZE.to_string(), "14".to_string());
        env.insert(ENV_HEADER_PATH.to_string(), "".to_string());

        let cfg = Config::builder()
            .env(env)
            .output_dir(tmp.path())
            .font_size(10)
            .build()
            .unwrap();

        assert_eq!(cfg.margin(), 0.5); // env
        assert_eq!(cfg.font_size(), 10); // explicit
        assert_eq!(cfg.header_height(), DEFAULT_HEADER_HEIGHT_PX); // default
        assert_eq!(cfg.header_image_path(), None); // empty env disables header
    }

    #[test]
    fn unparsable_env_value_is_a_validation_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut env = HashMap::new();
        env.insert(ENV_HEADER_HEIGHT.to_string(), "tall".to_string());
        let err = Config::builder()
            .env(env)
            .output_dir(tmp.path())
            .build()
            .unwrap_err();
        assert_eq!(err.field(), Some("header_height"));
    }

    #[test]
    fn valid_values_are_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        for (margin, header, font) in [(0.0, 0, 1), (1.0, 50, 12), (2.5, 400, 72)] {
            let cfg = builder_in(tmp.path())
                .margin(margin)
                .header_height(header)
                .font_size(font)
                .build();
            assert!(cfg.is_ok(), "({margin}, {header}, {font}) rejected");
        }
    }

    #[test]
    fn invalid_values_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let cases: Vec<(ConfigBuilder, &str)> = vec![
            (builder_in(tmp.path()).margin(-0.1), "margin"),
            (builder_in(tmp.path()).margin(f32::NAN), "margin"),
            (builder_in(tmp.path()).header_height(-1), "header_height"),
            (builder_in(tmp.path()).font_size(0), "font_size"),
            (builder_in(tmp.path()).font_size(-12), "font_size"),
        ];
        for (builder, field) in cases {
            let err = builder.build().unwrap_err();
            assert_eq!(err.field(), Some(field));
        }
    }

    #[test]
    fn zero_font_size_mentions_font_size() {
        let tmp = tempfile::tempdir().unwrap();
        let err = builder_in(tmp.path()).font_size(0).build().unwrap_err();
        assert!(err.to_string().contains("font_size"), "{err}");
    }

    #[test]
    fn setters_validate_without_mutating_on_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = builder_in(tmp.path()).build().unwrap();

        assert!(cfg.set_font_size(0).is_err());
        assert!(cfg.set_margin(-1.0).is_err());
        assert!(cfg.set_header_height(-5).is_err());
        assert_eq!(cfg.font_size(), DEFAULT_FONT_SIZE_PT);
        assert_eq!(cfg.margin(), DEFAULT_MARGIN_IN);

        cfg.set_font_size(9).unwrap();
        cfg.set_margin(0.25).unwrap();
        cfg.set_header_height(0).unwrap();
        assert_eq!(cfg.font_size(), 9);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn output_dir_creation_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("pdfs");
        let a = Config::builder().env(empty_env()).output_dir(&dir).build();
        let b = Config::builder().env(empty_env()).output_dir(&dir).build();
        assert!(a.is_ok() && b.is_ok());
        assert!(dir.is_dir());
    }

    #[test]
    fn missing_stylesheet_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = builder_in(tmp.path())
            .stylesheet_path("/nonexistent/x.css")
            .build()
            .unwrap();
        match cfg.resolve_stylesheet() {
            Err(ConfigError::StylesheetNotFound(p)) => {
                assert_eq!(p, PathBuf::from("/nonexistent/x.css"))
            }
            other => panic!("expected StylesheetNotFound, got {other:?}"),
        }
    }

    #[test]
    fn existing_stylesheet_is_loaded() {
        let tmp = tempfile::tempdir().unwrap();
        let css_path = tmp.path().join("styles.css");
        fs::write(&css_path, "h1 { color: #123456; }").unwrap();
        let cfg = builder_in(tmp.path()).stylesheet_path(&css_path).build().unwrap();
        let sheet = cfg.resolve_stylesheet().unwrap();
        assert_eq!(sheet.path, css_path);
        assert!(sheet.css.contains("#123456"));
    }
}
