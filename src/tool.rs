//! Tool-call adapter: exposes the converter as a `markdown_to_pdf` tool with
//! a JSON input schema and a one-line status message as its result.

use serde::Serialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::converter::{ConversionResult, Converter};
use crate::error::ConfigError;

pub const TOOL_NAME: &str = "markdown_to_pdf";
pub const ARGUMENT_NAME: &str = "markdown_to_convert";
pub const DEFAULT_FILE_NAME: &str = "sample_document.pdf";

/// Name, description and input schema announced to a tool host.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

pub struct MarkdownToPdfTool {
    converter: Converter,
    file_name: String,
}

impl MarkdownToPdfTool {
    pub fn new(converter: Converter) -> Self {
        Self {
            converter,
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }

    /// The tool's stock settings: 0.8in margins, a 60px header and 12pt text,
    /// everything else from the environment.
    pub fn with_defaults() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .margin(0.8)
            .header_height(60)
            .font_size(12)
            .build()?;
        Ok(Self::new(Converter::new(config)?))
    }

    /// Write into `file_name` inside the output directory instead of
    /// `sample_document.pdf`.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor {
            name: TOOL_NAME.to_string(),
            description: "Convert markdown content to PDF. Receives the markdown as a string \
                          and returns a message with the task status."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "markdown_to_convert": {
                        "type": "string",
                        "title": "content to convert to pdf",
                        "description": "Content string in markdown format to convert to pdf"
                    }
                },
                "required": ["markdown_to_convert"]
            }),
        }
    }

    /// Convert `markdown` and describe the outcome.
    pub fn call(&self, markdown: &str) -> String {
        match self.converter.convert_in_output_dir(markdown, &self.file_name) {
            ConversionResult::Success {
                output_path,
                size_bytes,
            } => format!(
                "✓ PDF created in: {} with size: {} bytes",
                output_path.display(),
                group_thousands(size_bytes)
            ),
            ConversionResult::Failure { error, .. } => {
                format!("✗ PDF generation failed: {error}")
            }
        }
    }

    /// Like [`call`](Self::call), taking the tool-call arguments object.
    pub fn call_json(&self, arguments: &Value) -> String {
        match arguments.get(ARGUMENT_NAME).and_then(Value::as_str) {
            Some(markdown) => self.call(markdown),
            None => format!(
                "✗ PDF generation failed: missing required string argument `{ARGUMENT_NAME}`"
            ),
        }
    }
}

/// `1234567` → `1,234,567`.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Stylesheet;
    use crate::diagnostics::MemoryDiagnostics;
    use crate::engine::RenderEngine;
    use crate::error::RenderError;
    use std::collections::HashMap;
    use std::path::Path;

    struct FixedSizeEngine(usize);

    impl RenderEngine for FixedSizeEngine {
        fn write_pdf(&self, _: &str, _: &[Stylesheet], output: &Path) -> Result<(), RenderError> {
            std::fs::write(output, vec![b'%'; self.0]).map_err(|source| RenderError::Write {
                path: output.to_path_buf(),
                source,
            })
        }
    }

    fn tool(dir: &Path, engine: FixedSizeEngine) -> MarkdownToPdfTool {
        let css = dir.join("styles.css");
        std::fs::write(&css, "").unwrap();
        let config = Config::builder()
            .env(HashMap::<String, String>::new())
            .stylesheet_path(css)
            .no_header_image()
            .output_dir(dir.join("output"))
            .build()
            .unwrap();
        let converter = Converter::new(config)
            .unwrap()
            .with_engine(engine)
            .with_diagnostics(MemoryDiagnostics::new());
        MarkdownToPdfTool::new(converter)
    }

    #[test]
    fn groups_digits() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[test]
    fn descriptor_schema() {
        let json = serde_json::to_value(MarkdownToPdfTool::descriptor()).unwrap();
        assert_eq!(json["name"], "markdown_to_pdf");
        assert_eq!(json["input_schema"]["required"][0], "markdown_to_convert");
        assert_eq!(
            json["input_schema"]["properties"]["markdown_to_convert"]["type"],
            "string"
        );
    }

    #[test]
    fn call_reports_path_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let msg = tool(dir.path(), FixedSizeEngine(12_345)).call("# Hi");
        let expected = dir.path().join("output").join("sample_document.pdf");
        assert_eq!(
            msg,
            format!(
                "✓ PDF created in: {} with size: 12,345 bytes",
                expected.display()
            )
        );
    }

    #[test]
    fn call_json_requires_argument() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool(dir.path(), FixedSizeEngine(10)).with_file_name("t.pdf");
        assert!(tool
            .call_json(&json!({ "markdown_to_convert": "x" }))
            .starts_with("✓ PDF created in:"));
        assert!(tool.call_json(&json!({})).starts_with("✗ PDF generation failed:"));
    }
}
