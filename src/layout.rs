//! Layout engine – uses Taffy to compute block layout from a styled DOM tree,
//! then converts the result into positioned boxes in document coordinates.
//!
//! Block-level elements become flex columns (table rows become flex rows of
//! equal-width cells). Consecutive inline children are gathered into one
//! anonymous text leaf whose lines are broken here, before Taffy runs, so
//! every leaf has a fixed size. `position: fixed` elements are taken out of
//! the flow and laid out on their own.

use std::collections::HashMap;

use taffy::{
    AvailableSpace, LengthPercentage, LengthPercentageAuto, NodeId, Rect, Size, Style, TaffyTree,
};

use crate::dom::Tag;
use crate::error::RenderError;
use crate::fonts::{hard_wrap, FontKey, FontManager};
use crate::layout_config::{TextLine, TextRun};
use crate::resources;
use crate::style::{
    Color, ComputedStyle, Dimension, Display, ListStyle, StyledNode, TextAlign, TextDecoration,
    WhiteSpace, PX_TO_PT,
};

/// Gap between a list marker and the list item's content.
const MARKER_GAP: f32 = 6.0;

// ---------------------------------------------------------------------------
// Intermediate layout tree (pre-pagination)
// ---------------------------------------------------------------------------

/// A positioned box in document coordinates (before page splitting).
#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub style: ComputedStyle,
    pub content: BoxContent,
    /// List marker, relative to this box.
    pub marker: Option<TextLine>,
    pub children: Vec<PositionedBox>,
}

#[derive(Debug, Clone)]
pub enum BoxContent {
    None,
    Text { lines: Vec<TextLine> },
    Image { src: String },
}

impl PositionedBox {
    pub fn is_container(&self) -> bool {
        matches!(self.content, BoxContent::None) && !self.children.is_empty()
    }

    /// True if this box or any descendant forces a page break.
    pub fn has_forced_break(&self) -> bool {
        self.children.iter().any(|c| {
            c.style.page_break_before || c.style.page_break_after || c.has_forced_break()
        })
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        self.x += dx;
        self.y += dy;
        for child in &mut self.children {
            child.translate(dx, dy);
        }
    }
}

/// Flow boxes plus the fixed boxes repeated on every page.
#[derive(Debug, Clone)]
pub struct DocumentLayout {
    pub flow: Vec<PositionedBox>,
    /// Fixed boxes; `y` is relative to the top of the page content area.
    pub fixed: Vec<PositionedBox>,
}

// ---------------------------------------------------------------------------
// Inline formatting
// ---------------------------------------------------------------------------

/// Everything that distinguishes one text run from another.
#[derive(Debug, Clone, PartialEq)]
struct RunStyle {
    key: FontKey,
    font_size: f32,
    line_height: f32,
    color: Color,
    background: Option<Color>,
    decoration: TextDecoration,
}

impl RunStyle {
    fn new(style: &ComputedStyle, background: Option<Color>) -> Self {
        Self {
            key: FontKey::for_style(style),
            font_size: style.font_size,
            line_height: style.line_height,
            color: style.color,
            background,
            decoration: style.text_decoration,
        }
    }
}

enum InlineItem {
    Text(String, RunStyle),
    Break,
}

struct Word {
    text: String,
    style: usize,
    /// Style of the collapsed whitespace preceding the word, if any.
    space_before: Option<usize>,
}

enum Token {
    Word(Word),
    Break,
}

/// Flatten an inline subtree into styled text items.
fn flatten_inline(node: &StyledNode, background: Option<Color>, out: &mut Vec<InlineItem>) {
    match node {
        StyledNode::Text { text, style } => {
            out.push(InlineItem::Text(text.clone(), RunStyle::new(style, background)));
        }
        StyledNode::Element { tag: Tag::Br, .. } => out.push(InlineItem::Break),
        StyledNode::Element {
            tag: Tag::Input,
            style,
            attrs,
            ..
        } => {
            let mark = if attrs.contains_key("checked") {
                "[x] "
            } else {
                "[ ] "
            };
            out.push(InlineItem::Text(
                mark.to_string(),
                RunStyle::new(style, background),
            ));
        }
        StyledNode::Element {
            style, children, ..
        } => {
            let bg = if style.background_color.is_transparent() {
                background
            } else {
                Some(style.background_color)
            };
            for child in children {
                flatten_inline(child, bg, out);
            }
        }
    }
}

/// Split collapsed-whitespace text into words. Adjacent words with no
/// whitespace between them (a style change mid-word) stay glued.
fn tokenize(items: &[InlineItem]) -> (Vec<Token>, Vec<RunStyle>) {
    let mut tokens = Vec::new();
    let mut styles = Vec::new();
    let mut current: Option<Word> = None;
    let mut pending_space: Option<usize> = None;

    for item in items {
        match item {
            InlineItem::Break => {
                if let Some(w) = current.take() {
                    tokens.push(Token::Word(w));
                }
                tokens.push(Token::Break);
                pending_space = None;
            }
            InlineItem::Text(text, style) => {
                let idx = styles.len();
                styles.push(style.clone());
                for c in text.chars() {
                    if c.is_whitespace() {
                        if let Some(w) = current.take() {
                            tokens.push(Token::Word(w));
                        }
                        pending_space.get_or_insert(idx);
                        continue;
                    }
                    match current.as_mut() {
                        Some(w) if w.style == idx => w.text.push(c),
                        _ => {
                            if let Some(w) = current.take() {
                                tokens.push(Token::Word(w));
                            }
                            current = Some(Word {
                                text: c.to_string(),
                                style: idx,
                                space_before: pending_space.take(),
                            });
                        }
                    }
                }
            }
        }
    }
    if let Some(w) = current.take() {
        tokens.push(Token::Word(w));
    }
    (tokens, styles)
}

struct PendingRun {
    text: String,
    style: RunStyle,
    x: f32,
    width: f32,
}

#[derive(Default)]
struct LineBuilder {
    runs: Vec<PendingRun>,
    width: f32,
}

impl LineBuilder {
    fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    fn push(&mut self, text: &str, style: &RunStyle, width: f32) {
        if let Some(last) = self.runs.last_mut() {
            if last.style == *style {
                last.text.push_str(text);
                last.width += width;
                self.width += width;
                return;
            }
        }
        self.runs.push(PendingRun {
            text: text.to_string(),
            style: style.clone(),
            x: self.width,
            width,
        });
        self.width += width;
    }

    /// Close the line. Empty lines take their height from `fallback`.
    fn finish(&mut self, fallback: &RunStyle, fonts: &FontManager) -> TextLine {
        let runs = std::mem::take(&mut self.runs);
        let width = std::mem::replace(&mut self.width, 0.0);

        let mut height: f32 = 0.0;
        let mut baseline: f32 = 0.0;
        let metrics: Vec<&RunStyle> = if runs.is_empty() {
            vec![fallback]
        } else {
            runs.iter().map(|r| &r.style).collect()
        };
        for s in metrics {
            let lh = s.font_size * s.line_height;
            let half_leading = (lh - fonts.glyph_height(s.font_size, &s.key)) / 2.0;
            height = height.max(lh);
            baseline = baseline.max(half_leading + fonts.ascender(s.font_size, &s.key));
        }

        TextLine {
            x_offset: 0.0,
            y_offset: 0.0,
            width,
            height,
            baseline,
            runs: runs
                .into_iter()
                .map(|r| TextRun {
                    text: r.text,
                    x_offset: r.x,
                    width: r.width,
                    font_family: r.style.key.family,
                    bold: r.style.key.bold,
                    italic: r.style.key.italic,
                    font_size: r.style.font_size,
                    color: r.style.color.to_array(),
                    background: r.style.background.map(|c| c.to_array()),
                    decoration: r.style.decoration,
                })
                .collect(),
        }
    }
}

/// Greedy line breaking with collapsed whitespace.
fn break_lines(
    items: &[InlineItem],
    fallback: &RunStyle,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<TextLine> {
    let (tokens, styles) = tokenize(items);
    let measure = |text: &str, s: &RunStyle| fonts.measure_text_width(text, s.font_size, &s.key);

    let mut lines = Vec::new();
    let mut line = LineBuilder::default();
    let mut i = 0;
    while i < tokens.len() {
        let first = match &tokens[i] {
            Token::Break => {
                lines.push(line.finish(fallback, fonts));
                i += 1;
                continue;
            }
            Token::Word(w) => w,
        };

        // A cluster is a word plus any words glued to it.
        let mut j = i + 1;
        while j < tokens.len() && matches!(&tokens[j], Token::Word(w) if w.space_before.is_none()) {
            j += 1;
        }
        let cluster: Vec<&Word> = tokens[i..j]
            .iter()
            .filter_map(|t| match t {
                Token::Word(w) => Some(w),
                Token::Break => None,
            })
            .collect();
        let widths: Vec<f32> = cluster
            .iter()
            .map(|w| measure(&w.text, &styles[w.style]))
            .collect();
        let cluster_width: f32 = widths.iter().sum();

        let space_style = &styles[first.space_before.unwrap_or(first.style)];
        let mut space = if first.space_before.is_some() && !line.is_empty() {
            measure(" ", space_style)
        } else {
            0.0
        };
        if !line.is_empty() && line.width + space + cluster_width > max_width {
            lines.push(line.finish(fallback, fonts));
            space = 0.0;
        }
        if space > 0.0 {
            line.push(" ", space_style, space);
        }

        if cluster_width > max_width {
            for word in &cluster {
                let s = &styles[word.style];
                for (k, chunk) in hard_wrap(&word.text, s.font_size, &s.key, max_width, fonts)
                    .into_iter()
                    .enumerate()
                {
                    let w = measure(&chunk, s);
                    if (k > 0 || line.width + w > max_width) && !line.is_empty() {
                        lines.push(line.finish(fallback, fonts));
                    }
                    line.push(&chunk, s, w);
                }
            }
        } else {
            for (word, w) in cluster.iter().zip(&widths) {
                line.push(&word.text, &styles[word.style], *w);
            }
        }
        i = j;
    }
    if !line.is_empty() {
        lines.push(line.finish(fallback, fonts));
    }
    lines
}

/// Preformatted text: newlines are kept, long lines wrap at the box edge.
fn break_preformatted(
    items: &[InlineItem],
    fallback: &RunStyle,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<TextLine> {
    let mut lines = Vec::new();
    let mut line = LineBuilder::default();
    let mut at_start = true;

    for item in items {
        match item {
            InlineItem::Break => lines.push(line.finish(fallback, fonts)),
            InlineItem::Text(text, style) => {
                for c in text.chars() {
                    // A newline directly after the opening tag is not content.
                    if std::mem::take(&mut at_start) && c == '\n' {
                        continue;
                    }
                    let piece = match c {
                        '\n' => {
                            lines.push(line.finish(fallback, fonts));
                            continue;
                        }
                        '\r' => continue,
                        '\t' => "    ".to_string(),
                        c => c.to_string(),
                    };
                    let w = fonts.measure_text_width(&piece, style.font_size, &style.key);
                    if line.width + w > max_width && !line.is_empty() {
                        lines.push(line.finish(fallback, fonts));
                    }
                    line.push(&piece, style, w);
                }
            }
        }
        at_start = false;
    }
    if !line.is_empty() {
        lines.push(line.finish(fallback, fonts));
    }
    lines
}

fn has_visible_content(items: &[InlineItem]) -> bool {
    items.iter().any(|item| match item {
        InlineItem::Break => true,
        InlineItem::Text(t, _) => t.chars().any(|c| !c.is_whitespace()),
    })
}

/// True if `node` can live inside a line box.
fn is_inline_flow(node: &StyledNode) -> bool {
    match node {
        StyledNode::Text { .. } => true,
        StyledNode::Element {
            tag,
            style,
            children,
            ..
        } => {
            *tag != Tag::Img
                && matches!(style.display, Display::Inline | Display::InlineBlock)
                && children.iter().all(is_inline_flow)
        }
    }
}

// ---------------------------------------------------------------------------
// Build Taffy tree from styled nodes
// ---------------------------------------------------------------------------

struct NodeInfo {
    style: ComputedStyle,
    content: BoxContent,
    marker: Option<TextLine>,
}

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    fonts: &'a FontManager,
    nodes: HashMap<NodeId, NodeInfo>,
    fixed: Vec<StyledNode>,
}

fn taffy_err(e: impl std::fmt::Display) -> RenderError {
    RenderError::Layout(e.to_string())
}

impl<'a> LayoutBuilder<'a> {
    fn new(fonts: &'a FontManager) -> Self {
        Self {
            taffy: TaffyTree::new(),
            fonts,
            nodes: HashMap::new(),
            fixed: Vec::new(),
        }
    }

    fn build_node(&mut self, styled: &StyledNode, avail: f32) -> Result<NodeId, RenderError> {
        match styled {
            StyledNode::Element {
                tag: Tag::Img,
                style,
                attrs,
                ..
            } => self.build_image(style, attrs, avail),
            StyledNode::Element {
                tag,
                style,
                children,
                attrs,
            } => self.build_element(tag, style, children, attrs, avail),
            StyledNode::Text { style, .. } => {
                let parent = ComputedStyle::inherit_from(style);
                match self.build_inline_leaf(&[styled], &parent, avail)? {
                    Some(id) => Ok(id),
                    None => self.empty_leaf(),
                }
            }
        }
    }

    fn empty_leaf(&mut self) -> Result<NodeId, RenderError> {
        let node = self.taffy.new_leaf(Style::default()).map_err(taffy_err)?;
        self.nodes.insert(
            node,
            NodeInfo {
                style: ComputedStyle::default(),
                content: BoxContent::None,
                marker: None,
            },
        );
        Ok(node)
    }

    fn build_element(
        &mut self,
        tag: &Tag,
        style: &ComputedStyle,
        children: &[StyledNode],
        attrs: &HashMap<String, String>,
        avail: f32,
    ) -> Result<NodeId, RenderError> {
        let mut own_width = style
            .width
            .resolve(avail)
            .unwrap_or(avail - style.margin_left - style.margin_right);
        if let Some(max) = style.max_width.resolve(avail) {
            own_width = own_width.min(max);
        }
        let inner_width = (own_width
            - style.padding_left
            - style.padding_right
            - style.border_left
            - style.border_right)
            .max(1.0);

        let child_width = if style.display == Display::TableRow {
            let cells = children
                .iter()
                .filter(|c| {
                    matches!(c, StyledNode::Element { style, .. } if style.display == Display::TableCell)
                })
                .count()
                .max(1);
            inner_width / cells as f32
        } else {
            inner_width
        };

        let list_start = if *tag == Tag::Ol {
            attrs
                .get("start")
                .and_then(|s| s.trim().parse::<u32>().ok())
                .unwrap_or(1)
        } else {
            1
        };

        let child_ids = self.build_children(children, style, child_width, list_start)?;
        let node = self
            .taffy
            .new_with_children(to_taffy(style), &child_ids)
            .map_err(taffy_err)?;
        self.nodes.insert(
            node,
            NodeInfo {
                style: style.clone(),
                content: BoxContent::None,
                marker: None,
            },
        );
        Ok(node)
    }

    fn build_children(
        &mut self,
        children: &[StyledNode],
        parent: &ComputedStyle,
        avail: f32,
        list_start: u32,
    ) -> Result<Vec<NodeId>, RenderError> {
        let mut ids = Vec::new();
        let mut inline_group: Vec<&StyledNode> = Vec::new();
        let mut list_index = list_start;

        for child in children {
            if child.style().is_fixed() {
                self.fixed.push(child.clone());
                continue;
            }
            if is_inline_flow(child) {
                inline_group.push(child);
                continue;
            }
            if let Some(leaf) = self.build_inline_leaf(&inline_group, parent, avail)? {
                ids.push(leaf);
            }
            inline_group.clear();

            let id = self.build_node(child, avail)?;
            if child.style().display == Display::ListItem {
                if let Some(marker) = self.list_marker(child.style(), list_index) {
                    if let Some(info) = self.nodes.get_mut(&id) {
                        info.marker = Some(marker);
                    }
                }
                list_index += 1;
            }
            ids.push(id);
        }
        if let Some(leaf) = self.build_inline_leaf(&inline_group, parent, avail)? {
            ids.push(leaf);
        }
        Ok(ids)
    }

    /// One anonymous block holding the lines of `group`, or `None` when the
    /// group is collapsible whitespace.
    fn build_inline_leaf(
        &mut self,
        group: &[&StyledNode],
        parent: &ComputedStyle,
        avail: f32,
    ) -> Result<Option<NodeId>, RenderError> {
        if group.is_empty() {
            return Ok(None);
        }
        let mut items = Vec::new();
        for node in group {
            flatten_inline(node, None, &mut items);
        }
        let pre = parent.white_space == WhiteSpace::Pre;
        if !pre && !has_visible_content(&items) {
            return Ok(None);
        }

        let fallback = RunStyle::new(parent, None);
        let mut lines = if pre {
            break_preformatted(&items, &fallback, avail, self.fonts)
        } else {
            break_lines(&items, &fallback, avail, self.fonts)
        };
        if lines.is_empty() {
            return Ok(None);
        }

        let mut y = 0.0;
        for line in &mut lines {
            line.y_offset = y;
            line.x_offset = match parent.text_align {
                TextAlign::Left => 0.0,
                TextAlign::Center => ((avail - line.width) / 2.0).max(0.0),
                TextAlign::Right => (avail - line.width).max(0.0),
            };
            y += line.height;
        }

        let node = self
            .taffy
            .new_leaf(Style {
                size: Size {
                    width: taffy::Dimension::Length(avail),
                    height: taffy::Dimension::Length(y),
                },
                flex_shrink: 0.0,
                ..Default::default()
            })
            .map_err(taffy_err)?;
        self.nodes.insert(
            node,
            NodeInfo {
                style: ComputedStyle::inherit_from(parent),
                content: BoxContent::Text { lines },
                marker: None,
            },
        );
        Ok(Some(node))
    }

    fn build_image(
        &mut self,
        style: &ComputedStyle,
        attrs: &HashMap<String, String>,
        avail: f32,
    ) -> Result<NodeId, RenderError> {
        let src = attrs.get("src").cloned().unwrap_or_default();
        let intrinsic = match resources::load_image_bytes(&src) {
            Ok(bytes) => resources::image_dimensions(&bytes)
                .map(|(w, h)| (w as f32 * PX_TO_PT, h as f32 * PX_TO_PT)),
            Err(e) => {
                log::warn!("Image {} is unavailable: {e}", preview(&src));
                None
            }
        };

        let Some((width, height)) = image_size(style, intrinsic, avail) else {
            return self.empty_leaf();
        };

        let node = self
            .taffy
            .new_leaf(Style {
                size: Size {
                    width: taffy::Dimension::Length(width),
                    height: taffy::Dimension::Length(height),
                },
                margin: margin_rect(style),
                flex_shrink: 0.0,
                ..Default::default()
            })
            .map_err(taffy_err)?;
        let content = if intrinsic.is_some() {
            BoxContent::Image { src }
        } else {
            BoxContent::None
        };
        self.nodes.insert(
            node,
            NodeInfo {
                style: style.clone(),
                content,
                marker: None,
            },
        );
        Ok(node)
    }

    fn list_marker(&self, style: &ComputedStyle, index: u32) -> Option<TextLine> {
        let text = match style.list_style {
            ListStyle::Disc => "\u{2022}".to_string(),
            ListStyle::Decimal => format!("{index}."),
            ListStyle::None => return None,
        };
        let run = RunStyle {
            background: None,
            decoration: TextDecoration::None,
            ..RunStyle::new(style, None)
        };
        let width = self
            .fonts
            .measure_text_width(&text, run.font_size, &run.key);
        let mut line = LineBuilder::default();
        line.push(&text, &run, width);
        let mut marker = line.finish(&run, self.fonts);
        marker.x_offset = style.border_left + style.padding_left - width - MARKER_GAP;
        marker.y_offset = style.border_top + style.padding_top;
        Some(marker)
    }

    /// Extract positioned boxes after layout computation.
    fn extract(&self, node: NodeId, offset_x: f32, offset_y: f32) -> Result<PositionedBox, RenderError> {
        let layout = self.taffy.layout(node).map_err(taffy_err)?;
        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;

        let children = self
            .taffy
            .children(node)
            .map_err(taffy_err)?
            .into_iter()
            .map(|child| self.extract(child, x, y))
            .collect::<Result<Vec<_>, _>>()?;

        let (style, content, marker) = match self.nodes.get(&node) {
            Some(info) => (info.style.clone(), info.content.clone(), info.marker.clone()),
            None => (ComputedStyle::default(), BoxContent::None, None),
        };

        Ok(PositionedBox {
            x,
            y,
            width: layout.size.width,
            height: layout.size.height,
            style,
            content,
            marker,
            children,
        })
    }

    /// Lay out `root_children` in a column of `width`, returning the root's
    /// children.
    fn layout_column(
        &mut self,
        child_ids: &[NodeId],
        width: f32,
        stretch: bool,
        origin_x: f32,
    ) -> Result<Vec<PositionedBox>, RenderError> {
        let root = self
            .taffy
            .new_with_children(
                Style {
                    display: taffy::Display::Flex,
                    flex_direction: taffy::FlexDirection::Column,
                    align_items: (!stretch).then_some(taffy::AlignItems::Start),
                    size: Size {
                        width: taffy::Dimension::Length(width),
                        height: taffy::Dimension::Auto,
                    },
                    ..Default::default()
                },
                child_ids,
            )
            .map_err(taffy_err)?;
        self.taffy
            .compute_layout(
                root,
                Size {
                    width: AvailableSpace::Definite(width),
                    height: AvailableSpace::MaxContent,
                },
            )
            .map_err(taffy_err)?;
        Ok(self.extract(root, origin_x, 0.0)?.children)
    }
}

fn preview(src: &str) -> String {
    if src.len() > 60 {
        format!("{:?}…", src.chars().take(60).collect::<String>())
    } else {
        format!("{src:?}")
    }
}

/// Resolve the used size of an image from CSS sizes, intrinsic size, and
/// max constraints. Images never exceed `avail`.
fn image_size(style: &ComputedStyle, intrinsic: Option<(f32, f32)>, avail: f32) -> Option<(f32, f32)> {
    let explicit_w = style.width.resolve(avail);
    let explicit_h = match style.height {
        Dimension::Pt(h) => Some(h),
        _ => None,
    };
    let intrinsic = intrinsic.filter(|(w, h)| *w > 0.0 && *h > 0.0);

    let (mut w, mut h) = match (explicit_w, explicit_h, intrinsic) {
        (Some(w), Some(h), _) => (w, h),
        (Some(w), None, Some((iw, ih))) => (w, w * ih / iw),
        (None, Some(h), Some((iw, ih))) => (h * iw / ih, h),
        (None, None, Some(size)) => size,
        _ => return None,
    };

    let max_w = style
        .max_width
        .resolve(avail)
        .map_or(avail, |m| m.min(avail));
    if w > max_w && w > 0.0 {
        h *= max_w / w;
        w = max_w;
    }
    if let Dimension::Pt(max_h) = style.max_height {
        if h > max_h && h > 0.0 {
            w *= max_h / h;
            h = max_h;
        }
    }
    Some((w, h))
}

fn margin_rect(s: &ComputedStyle) -> Rect<LengthPercentageAuto> {
    Rect {
        top: LengthPercentageAuto::Length(s.margin_top),
        right: LengthPercentageAuto::Length(s.margin_right),
        bottom: LengthPercentageAuto::Length(s.margin_bottom),
        left: LengthPercentageAuto::Length(s.margin_left),
    }
}

fn dim_to_taffy(d: Dimension) -> taffy::Dimension {
    match d {
        Dimension::Auto => taffy::Dimension::Auto,
        Dimension::Pt(v) => taffy::Dimension::Length(v),
        Dimension::Percent(v) => taffy::Dimension::Percent(v / 100.0),
    }
}

fn to_taffy(s: &ComputedStyle) -> Style {
    let mut ts = Style {
        display: taffy::Display::Flex,
        flex_direction: taffy::FlexDirection::Column,
        ..Default::default()
    };

    match s.display {
        Display::TableRow => {
            ts.flex_direction = taffy::FlexDirection::Row;
            ts.align_items = Some(taffy::AlignItems::Stretch);
        }
        Display::TableCell => {
            // Equal-width columns.
            ts.flex_grow = 1.0;
            ts.flex_shrink = 1.0;
            ts.flex_basis = taffy::Dimension::Length(0.0);
        }
        _ => {}
    }

    ts.size = Size {
        width: dim_to_taffy(s.width),
        height: match s.height {
            Dimension::Pt(h) => taffy::Dimension::Length(h),
            _ => taffy::Dimension::Auto,
        },
    };
    ts.min_size = Size {
        width: taffy::Dimension::Length(0.0),
        height: taffy::Dimension::Auto,
    };
    ts.max_size = Size {
        width: dim_to_taffy(s.max_width),
        height: taffy::Dimension::Auto,
    };
    ts.margin = margin_rect(s);
    ts.padding = Rect {
        top: LengthPercentage::Length(s.padding_top),
        right: LengthPercentage::Length(s.padding_right),
        bottom: LengthPercentage::Length(s.padding_bottom),
        left: LengthPercentage::Length(s.padding_left),
    };
    ts.border = Rect {
        top: LengthPercentage::Length(s.border_top),
        right: LengthPercentage::Length(s.border_right),
        bottom: LengthPercentage::Length(s.border_bottom),
        left: LengthPercentage::Length(s.border_left),
    };
    ts
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute layout for the body of a document.
///
/// Flow boxes are in document coordinates: `x` includes `origin_x` (the left
/// page margin) and `y` starts at 0 at the top of the first page's content
/// area. Fixed boxes are positioned against a content area of
/// `content_width`.
pub fn compute_layout(
    body_style: &ComputedStyle,
    children: &[StyledNode],
    content_width: f32,
    origin_x: f32,
    fonts: &FontManager,
) -> Result<DocumentLayout, RenderError> {
    let mut builder = LayoutBuilder::new(fonts);

    let body = builder.build_element(&Tag::Body, body_style, children, &HashMap::new(), content_width)?;
    let flow = builder.layout_column(&[body], content_width, true, origin_x)?;

    let mut fixed_nodes = std::mem::take(&mut builder.fixed);
    fixed_nodes.sort_by_key(|n| n.style().z_index);

    let mut fixed = Vec::new();
    for node in &fixed_nodes {
        let id = builder.build_node(node, content_width)?;
        let Some(mut pbox) = builder
            .layout_column(&[id], content_width, false, origin_x)?
            .into_iter()
            .next()
        else {
            continue;
        };
        let style = node.style();
        let left = match style.left {
            Some(Dimension::Percent(p)) => content_width * p / 100.0,
            Some(Dimension::Pt(v)) => v,
            _ => 0.0,
        };
        let x = origin_x + left + style.translate_x * pbox.width;
        let y = style.top.unwrap_or(0.0);
        let (dx, dy) = (x - pbox.x, y - pbox.y);
        pbox.translate(dx, dy);
        fixed.push(pbox);
    }

    Ok(DocumentLayout { flow, fixed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{body_element, parse_html};
    use crate::style::{style_document, Cascade};

    fn layout(html: &str, css: &str) -> DocumentLayout {
        let dom = parse_html(html);
        let body = body_element(&dom);
        let mut cascade = Cascade::new();
        cascade.push_author(css);
        let (body_style, children) = style_document(&body, &cascade);
        let fonts = FontManager::default();
        compute_layout(&body_style, &children, 451.0, 72.0, &fonts).unwrap()
    }

    fn text_leaves(b: &PositionedBox, out: &mut Vec<Vec<TextLine>>) {
        if let BoxContent::Text { lines } = &b.content {
            out.push(lines.clone());
        }
        for c in &b.children {
            text_leaves(c, out);
        }
    }

    fn all_lines(doc: &DocumentLayout) -> Vec<Vec<TextLine>> {
        let mut out = Vec::new();
        for b in &doc.flow {
            text_leaves(b, &mut out);
        }
        out
    }

    #[test]
    fn layout_simple_paragraph() {
        let doc = layout("<p>Hello world</p>", "");
        assert_eq!(doc.flow.len(), 1);
        let body = &doc.flow[0];
        assert_eq!(body.x, 72.0);
        assert!(body.height > 0.0);
        let lines = all_lines(&doc);
        assert_eq!(lines[0][0].text(), "Hello world");
    }

    #[test]
    fn inline_styles_become_runs() {
        let doc = layout("<p>plain <strong>bold</strong> <code>code</code>.</p>", "");
        let lines = all_lines(&doc);
        let runs = &lines[0][0].runs;
        assert!(runs.iter().any(|r| r.bold && r.text == "bold"));
        assert!(runs
            .iter()
            .any(|r| r.font_family == crate::style::FontFamily::Monospace && r.text.starts_with("code")));
        assert_eq!(lines[0][0].text(), "plain bold code.");
    }

    #[test]
    fn long_paragraph_wraps() {
        let text = "word ".repeat(200);
        let doc = layout(&format!("<p>{text}</p>"), "");
        let lines = all_lines(&doc);
        assert!(lines[0].len() > 5);
        assert!(lines[0].iter().all(|l| l.width <= 451.0));
        // Lines stack without overlap.
        assert!(lines[0][1].y_offset >= lines[0][0].y_offset + lines[0][0].height - 0.01);
    }

    #[test]
    fn pre_keeps_line_breaks() {
        let doc = layout("<pre>\nfn main() {\n    x();\n}\n</pre>", "");
        let lines = all_lines(&doc);
        let texts: Vec<String> = lines[0].iter().map(|l| l.text()).collect();
        assert_eq!(texts, vec!["fn main() {", "    x();", "}"]);
    }

    #[test]
    fn table_cells_split_row_width() {
        let doc = layout(
            "<table><thead><tr><th>A</th><th>B</th></tr></thead><tbody><tr><td>1</td><td>2</td></tr></tbody></table>",
            "",
        );
        let body = &doc.flow[0];
        let table = &body.children[0];
        assert_eq!(table.style.display, Display::Table);
        let head_row = &table.children[0].children[0];
        assert_eq!(head_row.children.len(), 2);
        let (a, b) = (&head_row.children[0], &head_row.children[1]);
        // Taffy rounds to whole points, so an odd row width splits unevenly.
        assert!((a.width - b.width).abs() <= 1.0);
        assert!(b.x > a.x);
    }

    #[test]
    fn list_items_get_markers() {
        let doc = layout("<ul><li>one</li><li>two</li></ul><ol start=\"3\"><li>three</li></ol>", "");
        let body = &doc.flow[0];
        let ul = &body.children[0];
        let marker = ul.children[0].marker.as_ref().unwrap();
        assert_eq!(marker.text(), "\u{2022}");
        assert!(marker.x_offset < 0.0);
        let ol = &body.children[1];
        assert_eq!(ol.children[0].marker.as_ref().unwrap().text(), "3.");
    }

    #[test]
    fn fixed_elements_leave_the_flow() {
        let doc = layout(
            "<div class=\"banner\">Banner</div><p>Body</p>",
            ".banner { position: fixed; top: 10px; }",
        );
        assert_eq!(doc.fixed.len(), 1);
        assert!((doc.fixed[0].y - 7.5).abs() < 0.01);
        let lines = all_lines(&doc);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0][0].text(), "Body");
    }

    #[test]
    fn image_size_respects_max_height() {
        let style = ComputedStyle {
            max_height: Dimension::Pt(45.0),
            ..ComputedStyle::default()
        };
        let (w, h) = image_size(&style, Some((300.0, 90.0)), 451.0).unwrap();
        assert_eq!(h, 45.0);
        assert!((w - 150.0).abs() < 0.01);
        assert!(image_size(&ComputedStyle::default(), None, 451.0).is_none());
    }

    #[test]
    fn whitespace_between_blocks_is_dropped() {
        let doc = layout("<h1>T</h1>\n\n<p>x</p>\n", "");
        assert_eq!(doc.flow[0].children.len(), 2);
    }

    #[test]
    fn centered_text_is_offset() {
        let doc = layout("<p style=\"text-align: center\">mid</p>", "");
        let lines = all_lines(&doc);
        assert!(lines[0][0].x_offset > 100.0);
    }
}
