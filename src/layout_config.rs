//! Layout config – the intermediate representation between layout computation
//! and PDF rendering. Every box carries page-absolute coordinates in points
//! with the origin at the top-left of the physical page.

use serde::{Deserialize, Serialize};

use crate::style::{FontFamily, TextDecoration};

/// A complete document layout ready for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Document title embedded in the PDF metadata.
    #[serde(default = "LayoutConfig::default_title")]
    pub title: String,
    /// Width of each page in PDF points (1 pt = 1/72 inch).
    pub page_width_pt: f32,
    /// Height of each page in PDF points.
    pub page_height_pt: f32,
    /// Page margins: top, right, bottom, left.
    #[serde(default)]
    pub margins_pt: [f32; 4],
    /// Ordered list of pages.
    pub pages: Vec<PageLayout>,
}

/// One page of content. Fixed-position boxes come last so they paint over
/// the flow content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_index: usize,
    pub boxes: Vec<LayoutBox>,
}

/// A positioned rectangle with optional content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,

    pub background_color: Option<[f32; 4]>,
    pub border: Option<BorderStyle>,

    pub text: Option<TextContent>,
    pub image: Option<ImageContent>,
    /// List bullet or number, positioned relative to this box.
    #[serde(default)]
    pub marker: Option<TextLine>,

    pub children: Vec<LayoutBox>,
}

/// Per-side border widths (top, right, bottom, left) with one colour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorderStyle {
    pub widths: [f32; 4],
    pub color: [f32; 4],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    pub lines: Vec<TextLine>,
}

/// One laid-out line; offsets are relative to the owning box.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLine {
    pub x_offset: f32,
    pub y_offset: f32,
    pub width: f32,
    pub height: f32,
    /// Distance from the line top to the baseline.
    pub baseline: f32,
    pub runs: Vec<TextRun>,
}

/// A span of text in a single font and colour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    /// Offset from the line start.
    pub x_offset: f32,
    pub width: f32,
    pub font_family: FontFamily,
    pub bold: bool,
    pub italic: bool,
    pub font_size: f32,
    pub color: [f32; 4],
    pub background: Option<[f32; 4]>,
    pub decoration: TextDecoration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageContent {
    pub src: String,
    pub width: f32,
    pub height: f32,
}

impl LayoutConfig {
    /// An empty A4 layout with no margins.
    pub fn a4() -> Self {
        Self {
            title: Self::default_title(),
            page_width_pt: 595.28,
            page_height_pt: 841.89,
            margins_pt: [0.0; 4],
            pages: Vec::new(),
        }
    }

    fn default_title() -> String {
        "Markdown Document".to_string()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Concatenated text of every run on `page`, in paint order.
    pub fn page_text(&self, page: usize) -> String {
        let mut out = String::new();
        if let Some(p) = self.pages.get(page) {
            for b in &p.boxes {
                b.collect_text(&mut out);
            }
        }
        out
    }

    pub fn all_text(&self) -> String {
        (0..self.pages.len())
            .map(|i| self.page_text(i))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            background_color: None,
            border: None,
            text: None,
            image: None,
            marker: None,
            children: Vec::new(),
        }
    }

    fn collect_text(&self, out: &mut String) {
        if let Some(text) = &self.text {
            for line in &text.lines {
                for run in &line.runs {
                    out.push_str(&run.text);
                }
                out.push('\n');
            }
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }

    /// Depth-first search for any box carrying an image.
    pub fn find_image(&self) -> Option<&ImageContent> {
        self.image
            .as_ref()
            .or_else(|| self.children.iter().find_map(|c| c.find_image()))
    }
}

impl TextLine {
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_keeps_runs() {
        let mut config = LayoutConfig::a4();
        let mut lbox = LayoutBox::new(72.0, 72.0, 100.0, 20.0);
        lbox.text = Some(TextContent {
            lines: vec![TextLine {
                x_offset: 0.0,
                y_offset: 0.0,
                width: 40.0,
                height: 16.8,
                baseline: 12.0,
                runs: vec![TextRun {
                    text: "Hello".into(),
                    x_offset: 0.0,
                    width: 27.3,
                    font_family: FontFamily::Monospace,
                    bold: true,
                    italic: false,
                    font_size: 12.0,
                    color: [0.0, 0.0, 0.0, 1.0],
                    background: None,
                    decoration: TextDecoration::Underline,
                }],
            }],
        });
        config.pages.push(PageLayout {
            page_index: 0,
            boxes: vec![lbox],
        });

        let json = config.to_json().unwrap();
        assert!(json.contains("\"monospace\""));
        let back = LayoutConfig::from_json(&json).unwrap();
        assert_eq!(back.page_text(0), "Hello\n");
        assert_eq!(back.pages[0].boxes[0].text.as_ref().unwrap().lines[0].runs[0].decoration, TextDecoration::Underline);
    }

    #[test]
    fn missing_title_uses_default() {
        let back = LayoutConfig::from_json(
            r#"{"page_width_pt": 612.0, "page_height_pt": 792.0, "pages": []}"#,
        )
        .unwrap();
        assert_eq!(back.title, "Markdown Document");
        assert_eq!(back.margins_pt, [0.0; 4]);
    }
}
