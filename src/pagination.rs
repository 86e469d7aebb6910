//! Pagination – splits positioned boxes into pages.
//!
//! Handles:
//! - Per-side page margins
//! - Page-break-before / page-break-after hints
//! - Containers that do not fit are split between their children, so table
//!   rows, list items and paragraphs flow onto the next page
//! - Text blocks split between lines
//! - Fixed-position boxes repeated on every page, painted last

use crate::layout::{BoxContent, DocumentLayout, PositionedBox};
use crate::layout_config::*;

/// Page geometry in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    /// top, right, bottom, left
    pub margins: [f32; 4],
}

impl PageGeometry {
    pub fn content_width(&self) -> f32 {
        (self.width - self.margins[1] - self.margins[3]).max(1.0)
    }

    pub fn content_height(&self) -> f32 {
        (self.height - self.margins[0] - self.margins[2]).max(1.0)
    }
}

/// Tracks the page being filled.
struct Paginator {
    geometry: PageGeometry,
    pages: Vec<PageLayout>,
    /// Document y at which each page starts.
    page_starts: Vec<f32>,
}

impl Paginator {
    fn new(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            pages: vec![PageLayout {
                page_index: 0,
                boxes: Vec::new(),
            }],
            page_starts: vec![0.0],
        }
    }

    fn current(&mut self) -> &mut PageLayout {
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn current_is_empty(&self) -> bool {
        self.pages.last().map_or(true, |p| p.boxes.is_empty())
    }

    fn page_start(&self) -> f32 {
        self.page_starts.last().copied().unwrap_or(0.0)
    }

    fn new_page(&mut self, start_doc_y: f32) {
        self.pages.push(PageLayout {
            page_index: self.pages.len(),
            boxes: Vec::new(),
        });
        self.page_starts.push(start_doc_y);
    }

    /// Page-absolute y for a document y on the current page.
    fn page_y(&self, doc_y: f32) -> f32 {
        self.geometry.margins[0] + (doc_y - self.page_start()).max(0.0)
    }

    fn fits(&self, pbox: &PositionedBox) -> bool {
        pbox.y + pbox.height - self.page_start() <= self.geometry.content_height() + 0.01
    }

    fn place(&mut self, pbox: &PositionedBox) {
        let y = self.page_y(pbox.y);
        let lb = build_layout_box(pbox, y);
        self.current().boxes.push(lb);
    }

    fn process(&mut self, pbox: &PositionedBox) {
        if pbox.style.page_break_before && !self.current_is_empty() {
            self.new_page(pbox.y);
        }

        let must_split = !self.fits(pbox) || pbox.has_forced_break();
        if !must_split {
            self.place(pbox);
        } else if pbox.is_container() && !pbox.style.page_break_inside_avoid {
            self.split_container(pbox);
        } else if matches!(&pbox.content, BoxContent::Text { lines } if lines.len() > 1) {
            self.split_text(pbox);
        } else {
            if !self.current_is_empty() {
                self.new_page(pbox.y);
            }
            // Taller than a page: placed anyway and clipped by the page edge.
            self.place(pbox);
        }

        if pbox.style.page_break_after {
            self.new_page(pbox.y + pbox.height);
        }
    }

    fn split_container(&mut self, pbox: &PositionedBox) {
        let first_page = self.pages.len() - 1;

        if let Some(marker) = &pbox.marker {
            let mut shell = LayoutBox::new(pbox.x, self.page_y(pbox.y), pbox.width, 0.0);
            shell.marker = Some(marker.clone());
            self.current().boxes.push(shell);
        }

        for child in &pbox.children {
            self.process(child);
        }

        if has_decoration(pbox) {
            self.decorate_fragments(pbox, first_page);
        }
    }

    /// Paint the background and border of a split container once per page it
    /// spans, behind that page's content.
    fn decorate_fragments(&mut self, pbox: &PositionedBox, first_page: usize) {
        let last_page = self.pages.len() - 1;
        let top_margin = self.geometry.margins[0];
        let content_h = self.geometry.content_height();
        for page in first_page..=last_page {
            let start = self.page_starts[page];
            let top = if page == first_page {
                (pbox.y - start).max(0.0)
            } else {
                0.0
            };
            let bottom = if page == last_page {
                (pbox.y + pbox.height - start).min(content_h)
            } else {
                content_h
            };
            if bottom <= top {
                continue;
            }
            let mut fragment = LayoutBox::new(pbox.x, top_margin + top, pbox.width, bottom - top);
            apply_decoration(&mut fragment, pbox);
            if let Some(border) = fragment.border.as_mut() {
                // Open edges where the box continues on another page.
                if page != first_page {
                    border.widths[0] = 0.0;
                }
                if page != last_page {
                    border.widths[2] = 0.0;
                }
            }
            self.pages[page].boxes.insert(0, fragment);
        }
    }

    fn split_text(&mut self, pbox: &PositionedBox) {
        let BoxContent::Text { lines } = &pbox.content else {
            return;
        };
        let content_h = self.geometry.content_height();
        let mut fragment: Vec<TextLine> = Vec::new();
        let mut fragment_top = pbox.y;

        for line in lines {
            let line_top = pbox.y + line.y_offset;
            let line_bottom = line_top + line.height - self.page_start();
            if line_bottom > content_h + 0.01 && (!fragment.is_empty() || !self.current_is_empty()) {
                self.emit_text_fragment(pbox, fragment_top, std::mem::take(&mut fragment));
                self.new_page(line_top);
                fragment_top = line_top;
            }
            let mut line = line.clone();
            line.y_offset = line_top - fragment_top;
            fragment.push(line);
        }
        self.emit_text_fragment(pbox, fragment_top, fragment);
    }

    fn emit_text_fragment(&mut self, pbox: &PositionedBox, doc_top: f32, lines: Vec<TextLine>) {
        if lines.is_empty() {
            return;
        }
        let height = lines
            .last()
            .map(|l| l.y_offset + l.height)
            .unwrap_or(0.0);
        let mut lb = LayoutBox::new(pbox.x, self.page_y(doc_top), pbox.width, height);
        lb.text = Some(TextContent { lines });
        self.current().boxes.push(lb);
    }

    fn finish(mut self, fixed: &[PositionedBox]) -> Vec<PageLayout> {
        // Drop a trailing blank page left by a final page-break-after.
        if self.pages.len() > 1 && self.current_is_empty() {
            self.pages.pop();
        }
        let top = self.geometry.margins[0];
        for page in &mut self.pages {
            for f in fixed {
                page.boxes.push(build_layout_box(f, top + f.y));
            }
        }
        self.pages
    }
}

fn has_decoration(pbox: &PositionedBox) -> bool {
    !pbox.style.background_color.is_transparent() || pbox.style.has_border()
}

fn apply_decoration(lb: &mut LayoutBox, pbox: &PositionedBox) {
    let s = &pbox.style;
    if !s.background_color.is_transparent() {
        lb.background_color = Some(s.background_color.to_array());
    }
    if s.has_border() {
        lb.border = Some(BorderStyle {
            widths: [s.border_top, s.border_right, s.border_bottom, s.border_left],
            color: s.border_color.to_array(),
        });
    }
}

/// Recursively build a LayoutBox tree with page-absolute coordinates.
///
/// Children keep their offset from the parent:
///   `child_abs_y = parent_abs_y + (child.y − parent.y)`
/// while `x` is already page-absolute from layout.
fn build_layout_box(pbox: &PositionedBox, abs_y: f32) -> LayoutBox {
    let mut lb = LayoutBox::new(pbox.x, abs_y, pbox.width, pbox.height);
    apply_decoration(&mut lb, pbox);
    lb.marker = pbox.marker.clone();

    match &pbox.content {
        BoxContent::Text { lines } => {
            lb.text = Some(TextContent {
                lines: lines.clone(),
            });
        }
        BoxContent::Image { src } => {
            lb.image = Some(ImageContent {
                src: src.clone(),
                width: pbox.width,
                height: pbox.height,
            });
        }
        BoxContent::None => {}
    }

    for child in &pbox.children {
        lb.children
            .push(build_layout_box(child, abs_y + (child.y - pbox.y)));
    }
    lb
}

/// Convert a document layout into pages.
pub fn paginate(doc: &DocumentLayout, geometry: PageGeometry, title: &str) -> LayoutConfig {
    let mut paginator = Paginator::new(geometry);
    for pbox in &doc.flow {
        paginator.process(pbox);
    }
    LayoutConfig {
        title: title.to_string(),
        page_width_pt: geometry.width,
        page_height_pt: geometry.height,
        margins_pt: geometry.margins,
        pages: paginator.finish(&doc.fixed),
    }
}
