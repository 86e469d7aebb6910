//! Markdown → complete, self-styled HTML document.
//!
//! The document carries its own `<style>` block with the page geometry and
//! font size from [`Config`], so the rendering engine needs nothing but the
//! HTML and the optional extra stylesheet.

use std::fmt::Write as _;

use crate::config::Config;
use crate::markdown::MarkdownRenderer;

/// Space between the bottom of the header image and the content, in px.
pub const HEADER_GAP_PX: i32 = 20;

const BASE_CSS: &str = r#"
        body {
            font-family: Arial, sans-serif;
            line-height: 1.6;
            color: #333;
        }

        h1, h2, h3, h4, h5, h6 {
            color: #2c3e50;
            margin-top: 1em;
            margin-bottom: 0.5em;
        }

        table {
            border-collapse: collapse;
            width: 100%;
            margin: 1em 0;
        }

        table th, table td {
            border: 1px solid #ddd;
            padding: 8px;
            text-align: left;
        }

        table th {
            background-color: #f2f2f2;
            font-weight: bold;
        }

        blockquote {
            border-left: 4px solid #ddd;
            margin: 1em 0;
            padding-left: 1em;
            color: #666;
        }

        code {
            background-color: #f4f4f4;
            padding: 2px 4px;
            font-family: monospace;
        }

        a {
            color: #3498db;
            text-decoration: none;
        }
"#;

/// Builds the HTML handed to the rendering engine.
pub struct DocumentAssembler {
    margin: f32,
    header_height: i32,
    font_size: i32,
    title: String,
    markdown: MarkdownRenderer,
}

impl DocumentAssembler {
    pub fn new(config: &Config) -> Self {
        Self {
            margin: config.margin(),
            header_height: config.header_height(),
            font_size: config.font_size(),
            title: config.title().to_string(),
            markdown: MarkdownRenderer::new(),
        }
    }

    /// Produce the full document for `markdown`, with the header image on
    /// every page when `header_image_uri` is given.
    pub fn assemble(&self, markdown: &str, header_image_uri: Option<&str>) -> String {
        let body = self.markdown.to_html(markdown);
        let header_image_uri = header_image_uri.filter(|uri| !uri.is_empty());

        let mut html = String::with_capacity(body.len() + BASE_CSS.len() + 1024);
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
        html.push_str("    <meta charset=\"UTF-8\">\n");
        let _ = writeln!(
            html,
            "    <title>{}</title>",
            html_escape::encode_text(&self.title)
        );
        html.push_str("    <style>\n");
        html.push_str(&self.page_css(header_image_uri.is_some()));
        html.push_str(BASE_CSS);
        html.push_str("    </style>\n</head>\n<body>\n");
        if let Some(uri) = header_image_uri {
            let _ = writeln!(
                html,
                "    <img src=\"{}\" class=\"header-image\" alt=\"Header\">",
                html_escape::encode_double_quoted_attribute(uri)
            );
        }
        html.push_str("    <div class=\"content\">\n");
        html.push_str(&body);
        html.push_str("    </div>\n</body>\n</html>\n");
        html
    }

    /// The parts of the stylesheet that depend on configuration.
    fn page_css(&self, with_header: bool) -> String {
        let mut css = String::new();
        let _ = write!(
            css,
            "        @page {{\n            size: A4;\n            margin: {}in;\n        }}\n\n",
            self.margin
        );
        let _ = write!(
            css,
            "        body {{\n            font-size: {}pt;\n        }}\n",
            self.font_size
        );
        if with_header {
            let _ = write!(
                css,
                "\n        .header-image {{\n            position: fixed;\n            top: 0;\n            \
                 left: 50%;\n            transform: translateX(-50%);\n            \
                 max-height: {}px;\n            z-index: 1000;\n        }}\n",
                self.header_height
            );
            let _ = write!(
                css,
                "\n        .content {{\n            margin-top: {}px;\n        }}\n",
                self.header_height + HEADER_GAP_PX
            );
        }
        css
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &std::path::Path) -> Config {
        Config::builder()
            .env(std::collections::HashMap::<String, String>::new())
            .margin(0.8)
            .header_height(60)
            .font_size(11)
            .output_dir(dir.join("out"))
            .build()
            .unwrap()
    }

    #[test]
    fn skeleton_and_page_style() {
        let dir = tempfile::tempdir().unwrap();
        let html = DocumentAssembler::new(&config(dir.path())).assemble("# Hi", None);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<meta charset=\"UTF-8\">"));
        assert!(html.contains("<title>Markdown Document</title>"));
        assert!(html.contains("size: A4;"));
        assert!(html.contains("margin: 0.8in;"));
        assert!(html.contains("font-size: 11pt;"));
        assert!(html.contains("<div class=\"content\">"));
        assert!(html.contains("<h1"));
    }

    #[test]
    fn header_image_adds_offset() {
        let dir = tempfile::tempdir().unwrap();
        let html = DocumentAssembler::new(&config(dir.path()))
            .assemble("text", Some("file:///tmp/header%20one.png"));
        assert!(html.contains(
            "<img src=\"file:///tmp/header%20one.png\" class=\"header-image\" alt=\"Header\">"
        ));
        assert!(html.contains("max-height: 60px;"));
        assert!(html.contains("margin-top: 80px;"));
        assert!(html.contains("z-index: 1000;"));
    }

    #[test]
    fn no_header_means_no_img() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = DocumentAssembler::new(&config(dir.path()));
        for uri in [None, Some("")] {
            let html = assembler.assemble("text", uri);
            assert!(!html.contains("<img"));
            assert!(!html.contains(".content {"));
        }
    }

    #[test]
    fn title_and_uri_are_escaped() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.set_title("Q&A <draft>");
        let html = DocumentAssembler::new(&cfg).assemble("x", Some("file:///a\"b.png"));
        assert!(html.contains("<title>Q&amp;A &lt;draft&gt;</title>"));
        assert!(html.contains("src=\"file:///a&quot;b.png\""));
    }

    #[test]
    fn assembly_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = DocumentAssembler::new(&config(dir.path()));
        let md = "# T\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n```rust\nfn main() {}\n```\n";
        assert_eq!(assembler.assemble(md, None), assembler.assemble(md, None));
    }
}
