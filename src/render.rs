//! PDF renderer – takes a [`LayoutConfig`] and produces PDF bytes using
//! `printpdf` (v0.8 ops-based API) and the base-14 fonts.

use std::collections::{HashMap, HashSet};

use printpdf::*;

use crate::error::RenderError;
use crate::fonts::FontManager;
use crate::fonts::FontKey;
use crate::layout_config::*;
use crate::resources;
use crate::style::{FontFamily, TextDecoration};

const PT_TO_MM: f32 = 0.352778;

/// A printpdf XObject together with the pixel dimensions of the source image.
struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// Render a LayoutConfig into PDF bytes.
///
/// Images that cannot be loaded or decoded are skipped with a `log::warn`.
pub fn render_pdf(config: &LayoutConfig) -> Result<Vec<u8>, RenderError> {
    if !(config.page_width_pt > 0.0 && config.page_height_pt > 0.0) {
        return Err(RenderError::Pdf(format!(
            "invalid page size {}x{}pt",
            config.page_width_pt, config.page_height_pt
        )));
    }
    let page_w = Mm(config.page_width_pt * PT_TO_MM);
    let page_h = Mm(config.page_height_pt * PT_TO_MM);

    let mut doc = PdfDocument::new(&config.title);
    let fonts = FontManager::default();

    // ── Pre-register all images ────────────────────────────────────────────
    let mut all_srcs: HashSet<&str> = HashSet::new();
    for page_layout in &config.pages {
        for lbox in &page_layout.boxes {
            collect_image_srcs(lbox, &mut all_srcs);
        }
    }

    let mut image_resources: HashMap<String, ImageResource> = HashMap::new();
    let mut img_warnings: Vec<PdfWarnMsg> = Vec::new();

    for src in all_srcs {
        let bytes = match resources::load_image_bytes(src) {
            Ok(b) => b,
            Err(e) => {
                log::warn!("Skipping image: {e}");
                continue;
            }
        };
        let Some((px_width, px_height)) = resources::image_dimensions(&bytes) else {
            log::warn!("Skipping image: unsupported or corrupt image data");
            continue;
        };
        let raw = match RawImage::decode_from_bytes(&bytes, &mut img_warnings) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("Skipping image: PDF encode error: {e}");
                continue;
            }
        };
        let xobj_id = doc.add_image(&raw);
        image_resources.insert(
            src.to_string(),
            ImageResource {
                xobj_id,
                px_width,
                px_height,
            },
        );
    }

    // ── Render pages ──────────────────────────────────────────────────────
    let mut pages = Vec::new();
    for page_layout in &config.pages {
        let mut painter = Painter {
            ops: Vec::new(),
            page_height: config.page_height_pt,
            images: &image_resources,
            fonts: &fonts,
        };
        for lbox in &page_layout.boxes {
            painter.render_box(lbox);
        }
        pages.push(PdfPage::new(page_w, page_h, painter.ops));
    }
    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    doc.with_pages(pages);
    // Unknown ops are only emitted for WinAnsi text strings.
    let options = PdfSaveOptions {
        secure: false,
        ..PdfSaveOptions::default()
    };
    Ok(doc.save(&options, &mut Vec::new()))
}

/// Windows-1252 bytes for `s`, the encoding builtin fonts are declared with.
/// Characters outside the code page become `?`.
fn winansi_bytes(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2122}' => 0x99,
            '\u{00A0}' => 0x20,
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect()
}

/// Text-showing ops for one run in a builtin font.
///
/// printpdf copies builtin-font text bytes verbatim, so non-ASCII text is
/// written as a hex `Tj` string already in WinAnsiEncoding. The empty write
/// keeps the font registered in the page resources.
fn builtin_text_ops(text: &str, font: BuiltinFont) -> Vec<Op> {
    if text.is_ascii() {
        return vec![Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(text.to_string())],
            font,
        }];
    }
    vec![
        Op::WriteTextBuiltinFont {
            items: Vec::new(),
            font,
        },
        Op::Unknown {
            key: "Tj".to_string(),
            value: vec![DictItem::String {
                data: winansi_bytes(text),
                literal: false,
            }],
        },
    ]
}

fn builtin_font(run: &TextRun) -> BuiltinFont {
    match (run.font_family, run.bold, run.italic) {
        (FontFamily::SansSerif, false, false) => BuiltinFont::Helvetica,
        (FontFamily::SansSerif, true, false) => BuiltinFont::HelveticaBold,
        (FontFamily::SansSerif, false, true) => BuiltinFont::HelveticaOblique,
        (FontFamily::SansSerif, true, true) => BuiltinFont::HelveticaBoldOblique,
        (FontFamily::Serif, false, false) => BuiltinFont::TimesRoman,
        (FontFamily::Serif, true, false) => BuiltinFont::TimesBold,
        (FontFamily::Serif, false, true) => BuiltinFont::TimesItalic,
        (FontFamily::Serif, true, true) => BuiltinFont::TimesBoldItalic,
        (FontFamily::Monospace, false, false) => BuiltinFont::Courier,
        (FontFamily::Monospace, true, false) => BuiltinFont::CourierBold,
        (FontFamily::Monospace, false, true) => BuiltinFont::CourierOblique,
        (FontFamily::Monospace, true, true) => BuiltinFont::CourierBoldOblique,
    }
}

fn rgb(c: &[f32; 4]) -> Color {
    Color::Rgb(Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

/// Recursively collect all unique `image.src` strings from a [`LayoutBox`] tree.
fn collect_image_srcs<'a>(lbox: &'a LayoutBox, srcs: &mut HashSet<&'a str>) {
    if let Some(img) = &lbox.image {
        srcs.insert(img.src.as_str());
    }
    for child in &lbox.children {
        collect_image_srcs(child, srcs);
    }
}

/// Accumulates the ops of one page. Layout uses a top-left origin; PDF uses
/// bottom-left, so every y goes through `page_height - y`.
struct Painter<'a> {
    ops: Vec<Op>,
    page_height: f32,
    images: &'a HashMap<String, ImageResource>,
    fonts: &'a FontManager,
}

impl Painter<'_> {
    fn fill_rect(&mut self, x: f32, top: f32, width: f32, height: f32, color: &[f32; 4]) {
        if width <= 0.0 || height <= 0.0 {
            return;
        }
        let y1 = self.page_height - top - height;
        let y2 = self.page_height - top;
        self.ops.push(Op::SetFillColor { col: rgb(color) });
        self.ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing {
                    points: vec![
                        point(x, y1),
                        point(x + width, y1),
                        point(x + width, y2),
                        point(x, y2),
                    ],
                }],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            },
        });
    }

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), thickness: f32, color: &[f32; 4]) {
        self.ops.push(Op::SetOutlineColor { col: rgb(color) });
        self.ops.push(Op::SetOutlineThickness { pt: Pt(thickness) });
        self.ops.push(Op::DrawLine {
            line: Line {
                points: vec![
                    point(from.0, self.page_height - from.1),
                    point(to.0, self.page_height - to.1),
                ],
                is_closed: false,
            },
        });
    }

    /// Each side is stroked along the centre of its border band.
    fn draw_border(&mut self, lbox: &LayoutBox, border: &BorderStyle) {
        let [top, right, bottom, left] = border.widths;
        let (x1, y1) = (lbox.x, lbox.y);
        let (x2, y2) = (lbox.x + lbox.width, lbox.y + lbox.height);
        if top > 0.0 {
            self.stroke_line((x1, y1 + top / 2.0), (x2, y1 + top / 2.0), top, &border.color);
        }
        if bottom > 0.0 {
            self.stroke_line((x1, y2 - bottom / 2.0), (x2, y2 - bottom / 2.0), bottom, &border.color);
        }
        if left > 0.0 {
            self.stroke_line((x1 + left / 2.0, y1), (x1 + left / 2.0, y2), left, &border.color);
        }
        if right > 0.0 {
            self.stroke_line((x2 - right / 2.0, y1), (x2 - right / 2.0, y2), right, &border.color);
        }
    }

    fn draw_line_of_text(&mut self, origin_x: f32, origin_y: f32, line: &TextLine) {
        let line_x = origin_x + line.x_offset;
        let line_top = origin_y + line.y_offset;
        let baseline = line_top + line.baseline;

        for run in &line.runs {
            let key = FontKey {
                family: run.font_family,
                bold: run.bold,
                italic: run.italic,
            };
            let x = line_x + run.x_offset;
            let ascender = self.fonts.ascender(run.font_size, &key);
            let glyph_height = self.fonts.glyph_height(run.font_size, &key);

            if let Some(bg) = &run.background {
                self.fill_rect(x, baseline - ascender, run.width, glyph_height, bg);
            }

            let font = builtin_font(run);
            self.ops.push(Op::StartTextSection);
            self.ops.push(Op::SetTextCursor {
                pos: Point {
                    x: Pt(x),
                    y: Pt(self.page_height - baseline),
                },
            });
            self.ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(run.font_size),
                font,
            });
            self.ops.push(Op::SetLineHeight {
                lh: Pt(line.height),
            });
            self.ops.push(Op::SetFillColor { col: rgb(&run.color) });
            self.ops.extend(builtin_text_ops(&run.text, font));
            self.ops.push(Op::EndTextSection);

            let decoration_y = match run.decoration {
                TextDecoration::None => None,
                TextDecoration::Underline => Some(baseline + run.font_size * 0.1),
                TextDecoration::LineThrough => Some(baseline - run.font_size * 0.3),
            };
            if let Some(y) = decoration_y {
                let thickness = (run.font_size * 0.05).max(0.5);
                self.stroke_line((x, y), (x + run.width, y), thickness, &run.color);
            }
        }
    }

    fn render_box(&mut self, lbox: &LayoutBox) {
        if let Some(bg) = &lbox.background_color {
            self.fill_rect(lbox.x, lbox.y, lbox.width, lbox.height, bg);
        }
        if let Some(border) = &lbox.border {
            self.draw_border(lbox, border);
        }
        if let Some(marker) = &lbox.marker {
            self.draw_line_of_text(lbox.x, lbox.y, marker);
        }
        if let Some(text) = &lbox.text {
            for line in &text.lines {
                self.draw_line_of_text(lbox.x, lbox.y, line);
            }
        }

        if let Some(img) = &lbox.image {
            if let Some(res) = self.images.get(&img.src) {
                // At dpi=72 printpdf renders 1 px = 1 pt, so
                // scale = desired_pt / px_dim.
                let scale_x = if res.px_width > 0 {
                    img.width / res.px_width as f32
                } else {
                    1.0
                };
                let scale_y = if res.px_height > 0 {
                    img.height / res.px_height as f32
                } else {
                    1.0
                };
                self.ops.push(Op::UseXobject {
                    id: res.xobj_id.clone(),
                    transform: XObjectTransform {
                        translate_x: Some(Pt(lbox.x)),
                        translate_y: Some(Pt(self.page_height - lbox.y - img.height)),
                        dpi: Some(72.0),
                        scale_x: Some(scale_x),
                        scale_y: Some(scale_y),
                        rotate: None,
                    },
                });
            }
        }

        for child in &lbox.children {
            self.render_box(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_empty_page() {
        let config = LayoutConfig::a4();
        let bytes = render_pdf(&config).unwrap();
        assert!(bytes.len() > 100, "PDF should have content");
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn invalid_page_size_is_an_error() {
        let config = LayoutConfig {
            page_width_pt: 0.0,
            ..LayoutConfig::a4()
        };
        assert!(matches!(render_pdf(&config), Err(RenderError::Pdf(_))));
    }

    #[test]
    fn winansi_maps_typographic_characters() {
        assert_eq!(winansi_bytes("a\u{2022}b"), vec![b'a', 0x95, b'b']);
        assert_eq!(winansi_bytes("caf\u{e9}"), b"caf\xe9".to_vec());
        assert_eq!(winansi_bytes("\u{4e2d}"), b"?".to_vec());
    }

    #[test]
    fn ascii_runs_use_plain_builtin_text() {
        let ops = builtin_text_ops("plain", BuiltinFont::Helvetica);
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            &ops[0],
            Op::WriteTextBuiltinFont { items, .. }
                if matches!(items.as_slice(), [TextItem::Text(t)] if t == "plain")
        ));
    }

    #[test]
    fn non_ascii_runs_are_written_as_winansi_strings() {
        let ops = builtin_text_ops("\u{2022} item", BuiltinFont::TimesRoman);
        assert_eq!(ops.len(), 2);
        assert!(matches!(
            &ops[0],
            Op::WriteTextBuiltinFont { items, font: BuiltinFont::TimesRoman } if items.is_empty()
        ));
        match &ops[1] {
            Op::Unknown { key, value } => {
                assert_eq!(key, "Tj");
                assert!(matches!(
                    value.as_slice(),
                    [DictItem::String { data, literal: false }] if data.as_slice() == b"\x95 item"
                ));
            }
            other => panic!("unexpected op {other:?}"),
        }
    }

    #[test]
    fn missing_images_are_skipped() {
        let mut config = LayoutConfig::a4();
        let mut lbox = LayoutBox::new(72.0, 72.0, 100.0, 50.0);
        lbox.image = Some(ImageContent {
            src: "/no/such/header.png".into(),
            width: 100.0,
            height: 50.0,
        });
        config.pages.push(PageLayout {
            page_index: 0,
            boxes: vec![lbox],
        });
        let bytes = render_pdf(&config).unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
    }
}
