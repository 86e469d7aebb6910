//! Sample markdown documents for demonstration and testing.
//!
//! Each sample exercises a different part of the markdown → PDF path.

/// Short document with emphasis, a list and a table.
pub fn basic_document() -> &'static str {
    r#"# Sample Document

This is a **bold** text and this is *italic* text.

## Section 1

- Item 1
- Item 2
- Item 3

## Table Example

| Name | Age | City |
|------|-----|------|
| John | 25  | New York |
| Jane | 30  | London |
| Bob  | 35  | Tokyo |

## Another Section

Some more text here to test the PDF generation.
"#
}

/// Table of contents, code blocks, quotes, task lists and footnotes.
pub fn feature_tour() -> &'static str {
    r#"# Feature Tour

[TOC]

## Code

Inline `code` and a fenced block:

```rust
fn main() {
    println!("Hello, PDF!");
}
```

## Quotes

> Markdown is intended to be as easy-to-read and easy-to-write as is
> feasible.

## Tasks

- [x] Parse markdown
- [ ] Ship it

## Links and notes

See [the CommonMark site](https://commonmark.org) for details.[^1]

~~Struck out~~ text.

[^1]: Footnotes are rendered at the end of the document.
"#
}

/// Enough content to run over several pages.
pub fn long_document() -> String {
    let mut md = String::from("# Long Document\n\n");
    for section in 1..=12 {
        md.push_str(&format!("## Section {section}\n\n"));
        for para in 1..=4 {
            md.push_str(&format!(
                "Paragraph {para} of section {section}. Lorem ipsum dolor sit amet, \
                 consectetur adipiscing elit, sed do eiusmod tempor incididunt ut labore \
                 et dolore magna aliqua. Ut enim ad minim veniam, quis nostrud exercitation \
                 ullamco laboris nisi ut aliquip ex ea commodo consequat.\n\n"
            ));
        }
        md.push_str("| Key | Value |\n|-----|-------|\n");
        for row in 1..=5 {
            md.push_str(&format!("| k{row} | v{section}.{row} |\n"));
        }
        md.push('\n');
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::MarkdownRenderer;

    #[test]
    fn samples_produce_expected_elements() {
        let renderer = MarkdownRenderer::new();
        let basic = renderer.to_html(basic_document());
        assert!(basic.contains("<table>"));
        assert!(basic.contains("<ul>"));

        let tour = renderer.to_html(feature_tour());
        assert!(tour.contains("codehilite"));
        assert!(tour.contains("<blockquote>"));
        assert!(tour.contains("type=\"checkbox\""));
        assert!(!tour.contains("[TOC]"));

        assert!(long_document().matches("## Section").count() == 12);
    }
}
