//! Text measurement against the PDF base-14 fonts.
//!
//! The renderer only uses the built-in Helvetica, Times and Courier faces, so
//! measurement uses their published advance widths (1/1000 em) rather than
//! parsing font files. Oblique faces share the upright widths.

use std::collections::HashMap;

use crate::style::{ComputedStyle, FontFamily};

/// Identifies one of the twelve built-in faces.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub family: FontFamily,
    pub bold: bool,
    pub italic: bool,
}

impl FontKey {
    pub fn regular(family: FontFamily) -> Self {
        Self {
            family,
            bold: false,
            italic: false,
        }
    }

    pub fn for_style(style: &ComputedStyle) -> Self {
        Self {
            family: style.font_family,
            bold: style.is_bold(),
            italic: style.is_italic(),
        }
    }
}

/// Advance widths for one face.
#[derive(Debug, Clone, Copy)]
pub struct FontMetrics {
    /// Widths of ASCII 32..=126.
    widths: Option<&'static [u16; 95]>,
    /// Used for characters outside the table (and for every character of a
    /// fixed-pitch face).
    default_width: u16,
    pub ascender: f32,
    pub descender: f32,
}

impl FontMetrics {
    fn advance(&self, c: char) -> u16 {
        match (self.widths, c as u32) {
            (Some(table), code @ 32..=126) => table[(code - 32) as usize],
            (_, 0x2022) => 350, // bullet
            _ => self.default_width,
        }
    }
}

#[rustfmt::skip]
static HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
static HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
static TIMES: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

#[rustfmt::skip]
static TIMES_BOLD: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778,
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500,
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500,
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
];

/// Metrics lookup for the built-in faces.
pub struct FontManager {
    fonts: HashMap<FontKey, FontMetrics>,
}

impl FontManager {
    pub fn new() -> Self {
        let mut fonts = HashMap::new();
        for bold in [false, true] {
            for italic in [false, true] {
                fonts.insert(
                    FontKey {
                        family: FontFamily::SansSerif,
                        bold,
                        italic,
                    },
                    FontMetrics {
                        widths: Some(if bold { &HELVETICA_BOLD } else { &HELVETICA }),
                        default_width: 556,
                        ascender: 718.0,
                        descender: -207.0,
                    },
                );
                fonts.insert(
                    FontKey {
                        family: FontFamily::Serif,
                        bold,
                        italic,
                    },
                    FontMetrics {
                        widths: Some(if bold { &TIMES_BOLD } else { &TIMES }),
                        default_width: 500,
                        ascender: 683.0,
                        descender: -217.0,
                    },
                );
                fonts.insert(
                    FontKey {
                        family: FontFamily::Monospace,
                        bold,
                        italic,
                    },
                    FontMetrics {
                        widths: None,
                        default_width: 600,
                        ascender: 629.0,
                        descender: -157.0,
                    },
                );
            }
        }
        Self { fonts }
    }

    pub fn get(&self, key: &FontKey) -> FontMetrics {
        self.fonts
            .get(key)
            .or_else(|| self.fonts.get(&FontKey::regular(key.family)))
            .copied()
            .unwrap_or(FontMetrics {
                widths: Some(&HELVETICA),
                default_width: 556,
                ascender: 718.0,
                descender: -207.0,
            })
    }

    /// Width of `text` in pt at `font_size` pt.
    pub fn measure_text_width(&self, text: &str, font_size: f32, key: &FontKey) -> f32 {
        let metrics = self.get(key);
        let units: u32 = text.chars().map(|c| metrics.advance(c) as u32).sum();
        units as f32 * font_size / 1000.0
    }

    /// Distance from the top of the glyph box to the baseline, in pt.
    pub fn ascender(&self, font_size: f32, key: &FontKey) -> f32 {
        self.get(key).ascender * font_size / 1000.0
    }

    /// Glyph box height (ascender − descender), in pt.
    pub fn glyph_height(&self, font_size: f32, key: &FontKey) -> f32 {
        let m = self.get(key);
        (m.ascender - m.descender) * font_size / 1000.0
    }
}

impl Default for FontManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Break `text` into chunks no wider than `max_width`, splitting between
/// characters. Used for words longer than a line and for `pre` lines.
pub fn hard_wrap(
    text: &str,
    font_size: f32,
    key: &FontKey,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut width = 0.0;
    for c in text.chars() {
        let w = fonts.measure_text_width(c.encode_utf8(&mut [0; 4]), font_size, key);
        if width + w > max_width && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            width = 0.0;
        }
        current.push(c);
        width += w;
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}
