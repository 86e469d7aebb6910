//! Style resolver – parses CSS, cascades it over the DOM, and produces a flat
//! [`ComputedStyle`] per element for the layout engine.
//!
//! The cascade order is: user-agent defaults, supplied stylesheets, document
//! `<style>` blocks, then `style=""` attributes, with `!important`
//! declarations applied last. Within an origin, rules apply by specificity and
//! then source order.
//!
//! All lengths are resolved to PDF points (1in = 72pt, 1px = 0.75pt).

use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

use serde::{Deserialize, Serialize};

use crate::dom::{DomNode, ElementNode, Tag};

/// Default styles shared by every document.
pub const USER_AGENT_CSS: &str = r#"
html, body, div, p, h1, h2, h3, h4, h5, h6, ul, ol, blockquote, pre, hr { display: block; }
li { display: list-item; }
table { display: table; margin: 0 0 1em 0; }
thead, tbody { display: table-row-group; }
tr { display: table-row; }
td, th { display: table-cell; padding: 2pt 4pt; }
th { font-weight: bold; text-align: left; }
head, title, style, script, meta, link { display: none; }
img, input { display: inline-block; }
body { font-size: 12pt; line-height: 1.4; color: #000000; }
h1 { font-size: 2em; font-weight: bold; margin: 0.67em 0 0.4em 0; }
h2 { font-size: 1.5em; font-weight: bold; margin: 0.83em 0 0.4em 0; }
h3 { font-size: 1.17em; font-weight: bold; margin: 1em 0 0.4em 0; }
h4 { font-weight: bold; margin: 1em 0 0.4em 0; }
h5 { font-size: 0.83em; font-weight: bold; margin: 1em 0 0.4em 0; }
h6 { font-size: 0.67em; font-weight: bold; margin: 1em 0 0.4em 0; }
p { margin: 0 0 1em 0; }
ul { margin: 0 0 1em 0; padding-left: 30pt; list-style-type: disc; }
ol { margin: 0 0 1em 0; padding-left: 30pt; list-style-type: decimal; }
li { margin: 0 0 0.25em 0; }
li ul, li ol { margin: 0.25em 0 0 0; }
blockquote { margin: 0 0 1em 30pt; }
pre { white-space: pre; font-family: monospace; margin: 0 0 1em 0; padding: 6pt; }
code { font-family: monospace; }
strong { font-weight: bold; }
em { font-style: italic; }
a { color: #0000ee; text-decoration: underline; }
del { text-decoration: line-through; }
sup { font-size: 0.75em; }
hr { border-top: 1px solid #888888; margin: 0.5em 0; }
"#;

/// CSS px → pt.
pub const PX_TO_PT: f32 = 0.75;

// ---------------------------------------------------------------------------
// Computed style
// ---------------------------------------------------------------------------

/// Fully resolved style for a single element.
#[derive(Debug, Clone)]
pub struct ComputedStyle {
    // Box generation
    pub display: Display,
    pub position: Position,
    /// Offset from the top of the page content area (fixed elements).
    pub top: Option<f32>,
    /// Horizontal offset for fixed elements.
    pub left: Option<Dimension>,
    /// `transform: translateX(p%)`, as a fraction of the element's own width.
    pub translate_x: f32,
    pub z_index: i32,

    // Sizing (pt)
    pub width: Dimension,
    pub height: Dimension,
    pub max_width: Dimension,
    pub max_height: Dimension,

    // Spacing (pt)
    pub margin_top: f32,
    pub margin_right: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub padding_top: f32,
    pub padding_right: f32,
    pub padding_bottom: f32,
    pub padding_left: f32,

    // Border (pt)
    pub border_top: f32,
    pub border_right: f32,
    pub border_bottom: f32,
    pub border_left: f32,
    pub border_color: Color,

    // Typography (inherited)
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub font_family: FontFamily,
    pub color: Color,
    pub text_align: TextAlign,
    /// Multiple of the font size.
    pub line_height: f32,
    pub text_decoration: TextDecoration,
    pub white_space: WhiteSpace,
    pub list_style: ListStyle,

    // Background
    pub background_color: Color,

    // Page break
    pub page_break_before: bool,
    pub page_break_after: bool,
    pub page_break_inside_avoid: bool,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Inline,
            position: Position::Static,
            top: None,
            left: None,
            translate_x: 0.0,
            z_index: 0,
            width: Dimension::Auto,
            height: Dimension::Auto,
            max_width: Dimension::Auto,
            max_height: Dimension::Auto,
            margin_top: 0.0,
            margin_right: 0.0,
            margin_bottom: 0.0,
            margin_left: 0.0,
            padding_top: 0.0,
            padding_right: 0.0,
            padding_bottom: 0.0,
            padding_left: 0.0,
            border_top: 0.0,
            border_right: 0.0,
            border_bottom: 0.0,
            border_left: 0.0,
            border_color: Color::BLACK,
            font_size: 12.0,
            font_weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
            font_family: FontFamily::SansSerif,
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.4,
            text_decoration: TextDecoration::None,
            white_space: WhiteSpace::Normal,
            list_style: ListStyle::Disc,
            background_color: Color::TRANSPARENT,
            page_break_before: false,
            page_break_after: false,
            page_break_inside_avoid: false,
        }
    }
}

impl ComputedStyle {
    /// A style carrying only the inherited properties of `parent`.
    pub fn inherit_from(parent: &ComputedStyle) -> Self {
        Self {
            font_size: parent.font_size,
            font_weight: parent.font_weight,
            font_style: parent.font_style,
            font_family: parent.font_family,
            color: parent.color,
            text_align: parent.text_align,
            line_height: parent.line_height,
            text_decoration: parent.text_decoration,
            white_space: parent.white_space,
            list_style: parent.list_style,
            ..Self::default()
        }
    }

    pub fn is_bold(&self) -> bool {
        self.font_weight == FontWeight::Bold
    }

    pub fn is_italic(&self) -> bool {
        self.font_style == FontStyle::Italic
    }

    pub fn has_border(&self) -> bool {
        self.border_top > 0.0
            || self.border_right > 0.0
            || self.border_bottom > 0.0
            || self.border_left > 0.0
    }

    pub fn is_fixed(&self) -> bool {
        self.position == Position::Fixed
    }

    pub fn is_block_level(&self) -> bool {
        !matches!(
            self.display,
            Display::Inline | Display::InlineBlock | Display::None
        )
    }
}

// ---------------------------------------------------------------------------
// Supporting enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Inline,
    InlineBlock,
    ListItem,
    Table,
    TableRowGroup,
    TableRow,
    TableCell,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Static,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontFamily {
    SansSerif,
    Serif,
    Monospace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextDecoration {
    None,
    Underline,
    LineThrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhiteSpace {
    Normal,
    Pre,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStyle {
    Disc,
    Decimal,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Pt(f32),
    Percent(f32),
}

impl Dimension {
    /// Resolve against a containing length.
    pub fn resolve(&self, base: f32) -> Option<f32> {
        match self {
            Dimension::Auto => None,
            Dimension::Pt(v) => Some(*v),
            Dimension::Percent(p) => Some(base * p / 100.0),
        }
    }
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        match hex.len() {
            6 | 8 => Some(Self {
                r: channel(&hex[0..2])?,
                g: channel(&hex[2..4])?,
                b: channel(&hex[4..6])?,
                a: if hex.len() == 8 { channel(&hex[6..8])? } else { 1.0 },
            }),
            3 => Some(Self::rgb(
                channel(&hex[0..1].repeat(2))?,
                channel(&hex[1..2].repeat(2))?,
                channel(&hex[2..3].repeat(2))?,
            )),
            _ => None,
        }
    }

    /// Parse `#hex`, `rgb()/rgba()`, or a basic colour keyword.
    pub fn parse(value: &str) -> Option<Self> {
        let v = value.trim().to_ascii_lowercase();
        if v.starts_with('#') {
            return Self::from_hex(&v);
        }
        if let Some(args) = v
            .strip_prefix("rgba(")
            .or_else(|| v.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let parts: Vec<f32> = args
                .split(|c| c == ',' || c == ' ' || c == '/')
                .filter(|p| !p.is_empty())
                .filter_map(|p| p.trim().parse::<f32>().ok())
                .collect();
            if parts.len() < 3 {
                return None;
            }
            return Some(Self {
                r: parts[0] / 255.0,
                g: parts[1] / 255.0,
                b: parts[2] / 255.0,
                a: parts.get(3).copied().unwrap_or(1.0),
            });
        }
        let named = match v.as_str() {
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "transparent" => Self::TRANSPARENT,
            "red" => Self::rgb(1.0, 0.0, 0.0),
            "green" => Self::rgb(0.0, 0.502, 0.0),
            "blue" => Self::rgb(0.0, 0.0, 1.0),
            "navy" => Self::rgb(0.0, 0.0, 0.502),
            "gray" | "grey" => Self::rgb(0.502, 0.502, 0.502),
            "silver" => Self::rgb(0.753, 0.753, 0.753),
            "lightgray" | "lightgrey" => Self::rgb(0.827, 0.827, 0.827),
            "darkgray" | "darkgrey" => Self::rgb(0.663, 0.663, 0.663),
            "orange" => Self::rgb(1.0, 0.647, 0.0),
            "purple" => Self::rgb(0.502, 0.0, 0.502),
            "teal" => Self::rgb(0.0, 0.502, 0.502),
            "maroon" => Self::rgb(0.502, 0.0, 0.0),
            _ => return None,
        };
        Some(named)
    }
}

// ---------------------------------------------------------------------------
// Stylesheets
// ---------------------------------------------------------------------------

/// Page box settings gathered from `@page` rules.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PageStyle {
    /// (width, height) in pt.
    pub size: Option<(f32, f32)>,
    /// top, right, bottom, left in pt.
    pub margin: Option<[f32; 4]>,
}

impl PageStyle {
    fn merge(&mut self, other: &PageStyle) {
        if other.size.is_some() {
            self.size = other.size;
        }
        if other.margin.is_some() {
            self.margin = other.margin;
        }
    }
}

#[derive(Debug, Clone)]
struct Declaration {
    property: String,
    value: String,
    important: bool,
}

#[derive(Debug, Clone)]
struct Rule {
    selector: ComplexSelector,
    specificity: (u32, u32, u32),
    declarations: Vec<Declaration>,
}

/// One parsed stylesheet.
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    rules: Vec<Rule>,
    pub page: PageStyle,
}

impl StyleSheet {
    /// Parse CSS text. Unsupported selectors and at-rules are skipped.
    pub fn parse(css: &str) -> Self {
        let mut sheet = StyleSheet::default();
        parse_rules(&strip_comments(css), &mut sheet);
        sheet
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Split `css` into (prelude, block body) pairs at the top nesting level.
fn top_level_blocks(css: &str) -> Vec<(&str, &str)> {
    let mut blocks = Vec::new();
    let bytes = css.as_bytes();
    let mut i = 0;
    let mut prelude_start = 0;
    while i < bytes.len() {
        match bytes[i] {
            b';' => {
                // Statement at-rule (@import, @charset): drop it.
                prelude_start = i + 1;
            }
            b'{' => {
                let body_start = i + 1;
                let mut depth = 1;
                let mut j = body_start;
                while j < bytes.len() && depth > 0 {
                    match bytes[j] {
                        b'{' => depth += 1,
                        b'}' => depth -= 1,
                        _ => {}
                    }
                    j += 1;
                }
                let body_end = if depth == 0 { j - 1 } else { j };
                blocks.push((css[prelude_start..i].trim(), &css[body_start..body_end]));
                i = j;
                prelude_start = j;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    blocks
}

fn parse_rules(css: &str, sheet: &mut StyleSheet) {
    for (prelude, body) in top_level_blocks(css) {
        if let Some(at) = prelude.strip_prefix('@') {
            let lower = at.to_ascii_lowercase();
            if lower.starts_with("page") {
                let page = parse_page_block(body);
                sheet.page.merge(&page);
            } else if lower.starts_with("media") {
                let media = lower.trim_start_matches("media").trim();
                if media.is_empty() || media.contains("print") || media.contains("all") {
                    parse_rules(body, sheet);
                }
            }
            continue;
        }
        let declarations = parse_declarations(body);
        if declarations.is_empty() {
            continue;
        }
        for sel in prelude.split(',') {
            if let Some(selector) = ComplexSelector::parse(sel) {
                sheet.rules.push(Rule {
                    specificity: selector.specificity(),
                    selector,
                    declarations: declarations.clone(),
                });
            }
        }
    }
}

fn parse_declarations(body: &str) -> Vec<Declaration> {
    // Drop nested blocks (e.g. `@top-center { … }` inside `@page`).
    let mut flat = String::with_capacity(body.len());
    let mut depth = 0;
    for c in body.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            _ if depth == 0 => flat.push(c),
            _ => {}
        }
    }

    flat.split(';')
        .filter_map(|decl| {
            let (prop, val) = decl.split_once(':')?;
            let prop = prop.trim().to_ascii_lowercase();
            // A nested block's prelude ("@top-center") leaks into the next
            // declaration name; keep only the last word.
            let prop = prop.split_whitespace().last()?.to_string();
            let mut value = val.trim().to_string();
            let important = value.to_ascii_lowercase().ends_with("!important");
            if important {
                value.truncate(value.len() - "!important".len());
                value = value.trim().to_string();
            }
            if prop.is_empty() || value.is_empty() {
                return None;
            }
            Some(Declaration {
                property: prop,
                value,
                important,
            })
        })
        .collect()
}

fn parse_page_block(body: &str) -> PageStyle {
    let mut page = PageStyle::default();
    for decl in parse_declarations(body) {
        match decl.property.as_str() {
            "size" => page.size = parse_page_size(&decl.value),
            "margin" => {
                let parts: Vec<f32> = decl
                    .value
                    .split_whitespace()
                    .filter_map(|p| parse_length(p, 12.0))
                    .collect();
                page.margin = expand_box(&parts);
            }
            side @ ("margin-top" | "margin-right" | "margin-bottom" | "margin-left") => {
                if let Some(v) = parse_length(&decl.value, 12.0) {
                    let mut m = page.margin.unwrap_or([0.0; 4]);
                    let idx = match side {
                        "margin-top" => 0,
                        "margin-right" => 1,
                        "margin-bottom" => 2,
                        _ => 3,
                    };
                    m[idx] = v;
                    page.margin = Some(m);
                }
            }
            _ => {}
        }
    }
    page
}

/// Page size keywords and explicit `<width> <height>` pairs, in pt.
pub fn parse_page_size(value: &str) -> Option<(f32, f32)> {
    let lower = value.to_ascii_lowercase();
    let mut words: Vec<&str> = lower.split_whitespace().collect();
    let landscape = words.contains(&"landscape");
    words.retain(|w| *w != "landscape" && *w != "portrait");

    let (w, h) = match words.as_slice() {
        ["a3"] => (841.89, 1190.55),
        ["a4"] => (595.28, 841.89),
        ["a5"] => (419.53, 595.28),
        ["letter"] => (612.0, 792.0),
        ["legal"] => (612.0, 1008.0),
        [len] => {
            let v = parse_length(len, 12.0)?;
            (v, v)
        }
        [a, b] => (parse_length(a, 12.0)?, parse_length(b, 12.0)?),
        [] if landscape => (595.28, 841.89),
        _ => return None,
    };
    Some(if landscape { (h.max(w), h.min(w)) } else { (w, h) })
}

/// Expand 1–4 box values into [top, right, bottom, left].
fn expand_box(parts: &[f32]) -> Option<[f32; 4]> {
    match *parts {
        [a] => Some([a, a, a, a]),
        [v, h] => Some([v, h, v, h]),
        [t, h, b] => Some([t, h, b, h]),
        [t, r, b, l] => Some([t, r, b, l]),
        _ => None,
    }
}

/// Parse a CSS length into pt. `em_base` is the font size `em` refers to.
/// Percentages are not lengths here and return `None`.
pub fn parse_length(value: &str, em_base: f32) -> Option<f32> {
    let v = value.trim().to_ascii_lowercase();
    if v == "0" {
        return Some(0.0);
    }
    let units: [(&str, f32); 8] = [
        ("rem", 12.0),
        ("em", em_base),
        ("pt", 1.0),
        ("px", PX_TO_PT),
        ("in", 72.0),
        ("cm", 72.0 / 2.54),
        ("mm", 72.0 / 25.4),
        ("pc", 12.0),
    ];
    for (unit, factor) in units {
        if let Some(num) = v.strip_suffix(unit) {
            return num.trim().parse::<f32>().ok().map(|n| n * factor);
        }
    }
    // Unitless numbers are treated as px.
    v.parse::<f32>().ok().map(|n| n * PX_TO_PT)
}

fn parse_dimension(value: &str, em_base: f32) -> Dimension {
    let v = value.trim();
    if v.eq_ignore_ascii_case("auto") || v.eq_ignore_ascii_case("none") {
        Dimension::Auto
    } else if let Some(p) = v.strip_suffix('%') {
        p.trim()
            .parse::<f32>()
            .map(Dimension::Percent)
            .unwrap_or(Dimension::Auto)
    } else {
        parse_length(v, em_base)
            .map(Dimension::Pt)
            .unwrap_or(Dimension::Auto)
    }
}

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct CompoundSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

/// Compound selectors joined by descendant combinators (`>` is treated as
/// a descendant combinator).
#[derive(Debug, Clone)]
struct ComplexSelector {
    parts: Vec<CompoundSelector>,
}

impl CompoundSelector {
    fn parse(s: &str) -> Option<Self> {
        let mut sel = CompoundSelector::default();
        let mut chars = s.chars().peekable();
        while let Some(&c) = chars.peek() {
            match c {
                '*' => {
                    chars.next();
                }
                '.' => {
                    chars.next();
                    let class = read_ident(&mut chars);
                    if class.is_empty() {
                        return None;
                    }
                    sel.classes.push(class);
                }
                '#' => {
                    chars.next();
                    let id = read_ident(&mut chars);
                    if id.is_empty() {
                        return None;
                    }
                    sel.id = Some(id);
                }
                c if c.is_alphabetic() => {
                    sel.tag = Some(read_ident(&mut chars).to_ascii_lowercase());
                }
                // Pseudo-classes, attribute selectors, etc. are unsupported:
                // the rule is dropped rather than over-applied.
                _ => return None,
            }
        }
        Some(sel)
    }

    fn matches(&self, el: &ElementRef) -> bool {
        if let Some(tag) = &self.tag {
            if tag != el.tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if el.id != Some(id.as_str()) {
                return false;
            }
        }
        self.classes.iter().all(|c| el.classes.contains(&c.as_str()))
    }
}

fn read_ident(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut ident = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            ident.push(c);
            chars.next();
        } else {
            break;
        }
    }
    ident
}

impl ComplexSelector {
    fn parse(s: &str) -> Option<Self> {
        let normalized = s.replace('>', " ");
        let parts: Option<Vec<CompoundSelector>> = normalized
            .split_whitespace()
            .map(CompoundSelector::parse)
            .collect();
        let parts = parts?;
        if parts.is_empty() {
            return None;
        }
        Some(Self { parts })
    }

    fn specificity(&self) -> (u32, u32, u32) {
        self.parts.iter().fold((0, 0, 0), |(a, b, c), p| {
            (
                a + p.id.is_some() as u32,
                b + p.classes.len() as u32,
                c + p.tag.is_some() as u32,
            )
        })
    }

    /// `element` is the subject; `ancestors` are ordered outermost first.
    fn matches(&self, element: &ElementRef, ancestors: &[ElementRef]) -> bool {
        let (subject, rest) = match self.parts.split_last() {
            Some(split) => split,
            None => return false,
        };
        if !subject.matches(element) {
            return false;
        }
        // Greedy right-to-left walk; sufficient for descendant combinators.
        let mut remaining = ancestors.iter().rev();
        'outer: for part in rest.iter().rev() {
            for anc in remaining.by_ref() {
                if part.matches(anc) {
                    continue 'outer;
                }
            }
            return false;
        }
        true
    }
}

/// The selector-relevant view of an element.
#[derive(Debug, Clone)]
pub struct ElementRef<'a> {
    pub tag: &'a str,
    pub id: Option<&'a str>,
    pub classes: Vec<&'a str>,
}

impl<'a> ElementRef<'a> {
    pub fn of(element: &'a ElementNode) -> Self {
        Self {
            tag: element.tag.name(),
            id: element.attributes.get("id").map(|s| s.as_str()),
            classes: element.classes(),
        }
    }
}

// ---------------------------------------------------------------------------
// Cascade
// ---------------------------------------------------------------------------

/// All stylesheets that apply to one document, in cascade order.
#[derive(Debug, Clone)]
pub struct Cascade {
    /// (origin, sheet); origin 0 = user agent, 1 = author.
    sheets: Vec<(u8, StyleSheet)>,
}

impl Cascade {
    /// A cascade holding only the user-agent defaults.
    pub fn new() -> Self {
        Self {
            sheets: vec![(0, StyleSheet::parse(USER_AGENT_CSS))],
        }
    }

    /// Append an author stylesheet; later sheets win ties.
    pub fn push_author(&mut self, css: &str) {
        self.sheets.push((1, StyleSheet::parse(css)));
    }

    /// Merged `@page` settings, later sheets overriding earlier ones.
    pub fn page_style(&self) -> PageStyle {
        let mut page = PageStyle::default();
        for (_, sheet) in &self.sheets {
            page.merge(&sheet.page);
        }
        page
    }

    /// Matching declarations in application order.
    fn matching(&self, element: &ElementRef, ancestors: &[ElementRef]) -> Vec<&Declaration> {
        let mut matched: Vec<((bool, u8, (u32, u32, u32), usize), &Declaration)> = Vec::new();
        let mut order = 0usize;
        for (origin, sheet) in &self.sheets {
            for rule in &sheet.rules {
                order += 1;
                if !rule.selector.matches(element, ancestors) {
                    continue;
                }
                for decl in &rule.declarations {
                    matched.push(((decl.important, *origin, rule.specificity, order), decl));
                }
            }
        }
        matched.sort_by(|a, b| a.0.cmp(&b.0));
        matched.into_iter().map(|(_, d)| d).collect()
    }
}

impl Default for Cascade {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the style for an element, inheriting text properties from its parent.
pub fn resolve_style(
    element: &ElementNode,
    parent: Option<&ComputedStyle>,
    ancestors: &[ElementRef],
    cascade: &Cascade,
) -> ComputedStyle {
    let mut style = parent
        .map(ComputedStyle::inherit_from)
        .unwrap_or_default();
    let parent_font = parent.map(|p| p.font_size).unwrap_or(style.font_size);

    let el = ElementRef::of(element);
    let mut declared: Vec<(String, String, bool)> = cascade
        .matching(&el, ancestors)
        .into_iter()
        .map(|d| (d.property.clone(), d.value.clone(), d.important))
        .collect();

    // Inline declarations beat every normal rule but not `!important` ones.
    if let Some(inline) = element.inline_style() {
        let inline_decls = parse_declarations(inline);
        let split = declared.iter().position(|d| d.2).unwrap_or(declared.len());
        let tail = declared.split_off(split);
        declared.extend(
            inline_decls
                .into_iter()
                .map(|d| (d.property, d.value, d.important)),
        );
        declared.extend(tail);
    }

    // font-size first so `em` lengths in the same rule see the final size.
    for (prop, val, _) in declared.iter().filter(|d| d.0 == "font-size") {
        apply_css_property(&mut style, prop, val, parent_font);
    }
    for (prop, val, _) in declared.iter().filter(|d| d.0 != "font-size") {
        apply_css_property(&mut style, prop, val, parent_font);
    }

    style
}

fn apply_css_property(s: &mut ComputedStyle, prop: &str, val: &str, parent_font: f32) {
    let em = s.font_size;
    match prop {
        "display" => {
            s.display = match val.trim() {
                "block" | "flex" | "grid" => Display::Block,
                "inline" => Display::Inline,
                "inline-block" => Display::InlineBlock,
                "list-item" => Display::ListItem,
                "table" => Display::Table,
                "table-row-group" | "table-header-group" | "table-footer-group" => {
                    Display::TableRowGroup
                }
                "table-row" => Display::TableRow,
                "table-cell" => Display::TableCell,
                "none" => Display::None,
                _ => s.display,
            }
        }
        "position" => {
            s.position = match val.trim() {
                "fixed" => Position::Fixed,
                _ => Position::Static,
            }
        }
        "top" => s.top = parse_length(val, em),
        "left" => s.left = Some(parse_dimension(val, em)),
        "transform" => {
            if let Some(p) = val
                .trim()
                .strip_prefix("translateX(")
                .and_then(|r| r.strip_suffix(')'))
                .and_then(|r| r.trim().strip_suffix('%'))
                .and_then(|r| r.trim().parse::<f32>().ok())
            {
                s.translate_x = p / 100.0;
            }
        }
        "z-index" => {
            if let Ok(z) = val.trim().parse::<i32>() {
                s.z_index = z;
            }
        }
        "font-size" => {
            let v = val.trim();
            let size = match v {
                "small" | "smaller" => Some(parent_font * 0.83),
                "medium" => Some(12.0),
                "large" | "larger" => Some(parent_font * 1.2),
                _ => match v.strip_suffix('%') {
                    Some(p) => p.parse::<f32>().ok().map(|p| parent_font * p / 100.0),
                    None => parse_length(v, parent_font),
                },
            };
            if let Some(size) = size.filter(|s| *s > 0.0) {
                s.font_size = size;
            }
        }
        "font-weight" => {
            s.font_weight = match val.trim() {
                "bold" | "bolder" | "600" | "700" | "800" | "900" => FontWeight::Bold,
                _ => FontWeight::Normal,
            }
        }
        "font-style" => {
            s.font_style = match val.trim() {
                "italic" | "oblique" => FontStyle::Italic,
                _ => FontStyle::Normal,
            }
        }
        "font-family" => s.font_family = parse_font_family(val),
        "font" => {
            // Only the weight/style keywords and family are honoured.
            let lower = val.to_ascii_lowercase();
            if lower.split_whitespace().any(|w| w == "bold") {
                s.font_weight = FontWeight::Bold;
            }
            if lower.split_whitespace().any(|w| w == "italic") {
                s.font_style = FontStyle::Italic;
            }
            s.font_family = parse_font_family(val);
        }
        "color" => {
            if let Some(c) = Color::parse(val) {
                s.color = c;
            }
        }
        "background-color" => {
            if let Some(c) = Color::parse(val) {
                s.background_color = c;
            }
        }
        "background" => {
            if let Some(c) = val.split_whitespace().find_map(Color::parse) {
                s.background_color = c;
            }
        }
        "text-align" => {
            s.text_align = match val.trim() {
                "center" => TextAlign::Center,
                "right" | "end" => TextAlign::Right,
                _ => TextAlign::Left,
            }
        }
        "text-decoration" | "text-decoration-line" => {
            let v = val.to_ascii_lowercase();
            s.text_decoration = if v.contains("underline") {
                TextDecoration::Underline
            } else if v.contains("line-through") {
                TextDecoration::LineThrough
            } else {
                TextDecoration::None
            }
        }
        "white-space" => {
            s.white_space = match val.trim() {
                "pre" | "pre-wrap" | "pre-line" | "break-spaces" => WhiteSpace::Pre,
                _ => WhiteSpace::Normal,
            }
        }
        "list-style" | "list-style-type" => {
            let v = val.to_ascii_lowercase();
            s.list_style = if v.contains("none") {
                ListStyle::None
            } else if v.contains("decimal") {
                ListStyle::Decimal
            } else {
                ListStyle::Disc
            }
        }
        "line-height" => {
            let v = val.trim();
            if v == "normal" {
                s.line_height = 1.2;
            } else if let Ok(factor) = v.parse::<f32>() {
                s.line_height = factor;
            } else if let Some(p) = v.strip_suffix('%').and_then(|p| p.parse::<f32>().ok()) {
                s.line_height = p / 100.0;
            } else if let Some(len) = parse_length(v, em) {
                if em > 0.0 {
                    s.line_height = len / em;
                }
            }
        }
        "width" => s.width = parse_dimension(val, em),
        "height" => s.height = parse_dimension(val, em),
        "max-width" => s.max_width = parse_dimension(val, em),
        "max-height" => s.max_height = parse_dimension(val, em),
        "margin" => {
            if let Some([t, r, b, l]) = parse_box_lengths(val, em) {
                s.margin_top = t;
                s.margin_right = r;
                s.margin_bottom = b;
                s.margin_left = l;
            }
        }
        "margin-top" => set_length(&mut s.margin_top, val, em),
        "margin-right" => set_length(&mut s.margin_right, val, em),
        "margin-bottom" => set_length(&mut s.margin_bottom, val, em),
        "margin-left" => set_length(&mut s.margin_left, val, em),
        "padding" => {
            if let Some([t, r, b, l]) = parse_box_lengths(val, em) {
                s.padding_top = t;
                s.padding_right = r;
                s.padding_bottom = b;
                s.padding_left = l;
            }
        }
        "padding-top" => set_length(&mut s.padding_top, val, em),
        "padding-right" => set_length(&mut s.padding_right, val, em),
        "padding-bottom" => set_length(&mut s.padding_bottom, val, em),
        "padding-left" => set_length(&mut s.padding_left, val, em),
        "border" => {
            let (w, c) = parse_border(val, em);
            s.border_top = w;
            s.border_right = w;
            s.border_bottom = w;
            s.border_left = w;
            if let Some(c) = c {
                s.border_color = c;
            }
        }
        "border-top" | "border-right" | "border-bottom" | "border-left" => {
            let (w, c) = parse_border(val, em);
            match prop {
                "border-top" => s.border_top = w,
                "border-right" => s.border_right = w,
                "border-bottom" => s.border_bottom = w,
                _ => s.border_left = w,
            }
            if let Some(c) = c {
                s.border_color = c;
            }
        }
        "border-width" => {
            if let Some([t, r, b, l]) = parse_box_lengths(val, em) {
                s.border_top = t;
                s.border_right = r;
                s.border_bottom = b;
                s.border_left = l;
            }
        }
        "border-color" => {
            if let Some(c) = Color::parse(val) {
                s.border_color = c;
            }
        }
        "break-after" | "page-break-after" => {
            s.page_break_after = matches!(val.trim(), "always" | "page");
        }
        "break-before" | "page-break-before" => {
            s.page_break_before = matches!(val.trim(), "always" | "page");
        }
        "break-inside" | "page-break-inside" => {
            s.page_break_inside_avoid = val.trim() == "avoid";
        }
        _ => {}
    }
}

fn set_length(field: &mut f32, val: &str, em: f32) {
    if val.trim() == "auto" {
        *field = 0.0;
    } else if let Some(v) = parse_length(val, em) {
        *field = v;
    }
}

fn parse_box_lengths(val: &str, em: f32) -> Option<[f32; 4]> {
    let parts: Vec<f32> = val
        .split_whitespace()
        .map(|p| {
            if p == "auto" {
                Some(0.0)
            } else {
                parse_length(p, em)
            }
        })
        .collect::<Option<Vec<f32>>>()?;
    expand_box(&parts)
}

/// `<width> <style> <color>` in any order; `none`/`hidden` zero the width.
fn parse_border(val: &str, em: f32) -> (f32, Option<Color>) {
    let mut width = 0.75; // medium ≈ 1px
    let mut color = None;
    let mut visible = true;
    for token in val.split_whitespace() {
        match token {
            "none" | "hidden" => visible = false,
            "solid" | "dashed" | "dotted" | "double" | "groove" | "ridge" | "inset" | "outset" => {}
            "thin" => width = 0.75,
            "medium" => width = 2.25,
            "thick" => width = 3.75,
            t => {
                if let Some(w) = parse_length(t, em) {
                    width = w;
                } else if let Some(c) = Color::parse(t) {
                    color = Some(c);
                }
            }
        }
    }
    (if visible { width } else { 0.0 }, color)
}

fn parse_font_family(val: &str) -> FontFamily {
    let lower = val.to_ascii_lowercase();
    const MONO: [&str; 6] = ["monospace", "courier", "consolas", "menlo", "monaco", " mono"];
    if MONO.iter().any(|m| lower.contains(m)) {
        return FontFamily::Monospace;
    }
    let first = lower
        .split(',')
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches(|c| c == '"' || c == '\'');
    if first == "serif" || first.starts_with("times") || first.starts_with("georgia") {
        FontFamily::Serif
    } else {
        FontFamily::SansSerif
    }
}

// ---------------------------------------------------------------------------
// Styled DOM tree
// ---------------------------------------------------------------------------

/// A DOM node annotated with its computed style.
#[derive(Debug, Clone)]
pub enum StyledNode {
    Element {
        tag: Tag,
        style: ComputedStyle,
        children: Vec<StyledNode>,
        /// Original attributes (for images src, etc.)
        attrs: HashMap<String, String>,
    },
    Text {
        text: String,
        style: ComputedStyle,
    },
}

impl StyledNode {
    pub fn style(&self) -> &ComputedStyle {
        match self {
            StyledNode::Element { style, .. } | StyledNode::Text { style, .. } => style,
        }
    }
}

/// Build a styled tree from a DOM tree, resolving styles top-down.
///
/// `display: none` subtrees are dropped. Text nodes keep only inherited
/// properties of their parent.
pub fn build_styled_tree<'a>(
    nodes: &'a [DomNode],
    parent_style: Option<&ComputedStyle>,
    ancestors: &mut Vec<ElementRef<'a>>,
    cascade: &Cascade,
) -> Vec<StyledNode> {
    let mut result = Vec::new();
    for node in nodes {
        match node {
            DomNode::Element(e) => {
                let style = resolve_style(e, parent_style, ancestors, cascade);
                if style.display == Display::None {
                    continue;
                }
                ancestors.push(ElementRef::of(e));
                let children = build_styled_tree(&e.children, Some(&style), ancestors, cascade);
                ancestors.pop();
                result.push(StyledNode::Element {
                    tag: e.tag.clone(),
                    style,
                    children,
                    attrs: e.attributes.clone(),
                });
            }
            DomNode::Text(text) => {
                if text.is_empty() {
                    continue;
                }
                let style = parent_style
                    .map(ComputedStyle::inherit_from)
                    .unwrap_or_default();
                result.push(StyledNode::Text {
                    text: text.clone(),
                    style,
                });
            }
        }
    }
    result
}

/// Style the `<body>` element (as a child of `<html>`) and its subtree.
pub fn style_document(body: &ElementNode, cascade: &Cascade) -> (ComputedStyle, Vec<StyledNode>) {
    let html = ElementNode::new(Tag::Html);
    let html_style = resolve_style(&html, None, &[], cascade);
    let mut ancestors = vec![ElementRef::of(&html)];
    let body_style = resolve_style(body, Some(&html_style), &ancestors, cascade);
    ancestors.push(ElementRef::of(body));
    let children = build_styled_tree(&body.children, Some(&body_style), &mut ancestors, cascade);
    (body_style, children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    fn first_element(html: &str) -> ElementNode {
        match parse_html(html).into_iter().next() {
            Some(DomNode::Element(e)) => e,
            _ => panic!("expected element"),
        }
    }

    #[test]
    fn lengths_convert_to_points() {
        assert_eq!(parse_length("1in", 12.0), Some(72.0));
        assert_eq!(parse_length("12pt", 12.0), Some(12.0));
        assert_eq!(parse_length("20px", 12.0), Some(15.0));
        assert_eq!(parse_length("2em", 10.0), Some(20.0));
        assert!((parse_length("25.4mm", 12.0).unwrap() - 72.0).abs() < 0.01);
        assert_eq!(parse_length("0", 12.0), Some(0.0));
        assert_eq!(parse_length("wide", 12.0), None);
    }

    #[test]
    fn page_rule_sets_size_and_margin() {
        let sheet = StyleSheet::parse(
            "@page { size: A4; margin: 0.8in; @top-center { content: \"\"; } } body { color: red; }",
        );
        assert_eq!(sheet.page.size, Some((595.28, 841.89)));
        let m = sheet.page.margin.unwrap();
        assert!((m[0] - 57.6).abs() < 0.01 && (m[3] - 57.6).abs() < 0.01);
        assert_eq!(sheet.rule_count(), 1);
    }

    #[test]
    fn landscape_swaps_page_dimensions() {
        assert_eq!(parse_page_size("letter landscape"), Some((792.0, 612.0)));
        assert_eq!(parse_page_size("210mm 297mm").map(|(w, _)| w.round()), Some(595.0));
    }

    #[test]
    fn body_font_size_in_points_is_inherited() {
        let mut cascade = Cascade::new();
        cascade.push_author("body { font-size: 14pt; } h1 { color: #2c3e50; }");
        let body = first_element("<body><h1>T</h1><p>x</p></body>");
        let (body_style, children) = style_document(&body, &cascade);
        assert_eq!(body_style.font_size, 14.0);
        // h1 = 2em of the inherited 14pt.
        assert_eq!(children[0].style().font_size, 28.0);
        assert!((children[0].style().color.r - 0.173).abs() < 0.01);
        assert_eq!(children[1].style().font_size, 14.0);
    }

    #[test]
    fn class_selectors_and_specificity() {
        let mut cascade = Cascade::new();
        cascade.push_author(".content { margin-top: 70px; } div { margin-top: 1pt; }");
        let div = first_element(r#"<div class="content">x</div>"#);
        let style = resolve_style(&div, None, &[], &cascade);
        assert_eq!(style.margin_top, 52.5);
    }

    #[test]
    fn descendant_selectors_need_matching_ancestor() {
        let mut cascade = Cascade::new();
        cascade.push_author("table th { background-color: #f2f2f2; }");
        let th = first_element("<th>h</th>");
        let table = first_element("<table></table>");
        let without = resolve_style(&th, None, &[], &cascade);
        let with = resolve_style(&th, None, &[ElementRef::of(&table)], &cascade);
        assert!(without.background_color.is_transparent());
        assert!(!with.background_color.is_transparent());
    }

    #[test]
    fn inline_style_beats_rules_but_not_important() {
        let mut cascade = Cascade::new();
        cascade.push_author("p { color: #ff0000; } p { font-weight: normal !important; }");
        let p = first_element(r#"<p style="color: #00ff00; font-weight: bold">x</p>"#);
        let style = resolve_style(&p, None, &[], &cascade);
        assert_eq!(style.color, Color::rgb(0.0, 1.0, 0.0));
        assert_eq!(style.font_weight, FontWeight::Normal);
    }

    #[test]
    fn fixed_header_image_properties() {
        let mut cascade = Cascade::new();
        cascade.push_author(
            ".header-image { position: fixed; top: 0; left: 50%; transform: translateX(-50%); max-height: 60px; z-index: 1000; }",
        );
        let img = first_element(r#"<img class="header-image" src="a.png">"#);
        let style = resolve_style(&img, None, &[], &cascade);
        assert!(style.is_fixed());
        assert_eq!(style.top, Some(0.0));
        assert_eq!(style.left, Some(Dimension::Percent(50.0)));
        assert_eq!(style.translate_x, -0.5);
        assert_eq!(style.max_height, Dimension::Pt(45.0));
        assert_eq!(style.z_index, 1000);
    }

    #[test]
    fn border_shorthands() {
        let mut cascade = Cascade::new();
        cascade.push_author("blockquote { border-left: 4px solid #ddd; } td { border: 1px solid #dddddd; }");
        let bq = resolve_style(&first_element("<blockquote>q</blockquote>"), None, &[], &cascade);
        assert_eq!(bq.border_left, 3.0);
        assert_eq!(bq.border_top, 0.0);
        let td = resolve_style(&first_element("<td>c</td>"), None, &[], &cascade);
        assert_eq!(td.border_top, 0.75);
        assert!((td.border_color.r - 0.867).abs() < 0.01);
    }

    #[test]
    fn unsupported_selectors_are_dropped() {
        let sheet = StyleSheet::parse("a:hover { color: red; } input[type=checkbox] { color: red; } p { color: red; }");
        assert_eq!(sheet.rule_count(), 1);
    }

    #[test]
    fn monospace_detection() {
        assert_eq!(parse_font_family("'Courier New', monospace"), FontFamily::Monospace);
        assert_eq!(parse_font_family("Arial, sans-serif"), FontFamily::SansSerif);
        assert_eq!(parse_font_family("Georgia, serif"), FontFamily::Serif);
    }

    #[test]
    fn colors() {
        let c = Color::parse("#ff8800").unwrap();
        assert!((c.r - 1.0).abs() < 0.01);
        assert!((c.g - 0.533).abs() < 0.01);
        assert_eq!(Color::parse("rgb(255, 0, 0)"), Some(Color::rgb(1.0, 0.0, 0.0)));
        assert_eq!(Color::parse("grey"), Some(Color::rgb(0.502, 0.502, 0.502)));
        assert_eq!(Color::parse("nonsense"), None);
    }

    #[test]
    fn nested_elements_match_descendant_rules() {
        let mut cascade = Cascade::new();
        cascade.push_author("table th { background-color: #f2f2f2; }");
        let nodes = parse_html("<table><tr><th>h</th></tr></table><th>loose</th>");
        let styled = build_styled_tree(&nodes, None, &mut Vec::new(), &cascade);
        let StyledNode::Element { children: rows, .. } = &styled[0] else {
            panic!("expected table element");
        };
        let StyledNode::Element { children: cells, .. } = &rows[0] else {
            panic!("expected row element");
        };
        assert!(!cells[0].style().background_color.is_transparent());
        assert!(styled[1].style().background_color.is_transparent());
    }

    #[test]
    fn head_elements_are_not_rendered() {
        let cascade = Cascade::new();
        let nodes = parse_html("<title>x</title><p>shown</p>");
        let styled = build_styled_tree(&nodes, None, &mut Vec::new(), &cascade);
        assert_eq!(styled.len(), 1);
    }
}
