//! Pipeline – ties together parsing, styling, layout, pagination, and
//! rendering into a single function call.

use crate::config::Stylesheet;
use crate::dom::{body_element, document_title, parse_html, style_blocks};
use crate::error::RenderError;
use crate::fonts::FontManager;
use crate::layout::compute_layout;
use crate::layout_config::LayoutConfig;
use crate::pagination::{paginate, PageGeometry};
use crate::render::render_pdf;
use crate::style::{style_document, Cascade, PageStyle};

/// Page size used when no `@page { size }` rule is given (A4).
pub const DEFAULT_PAGE_SIZE_PT: (f32, f32) = (595.28, 841.89);

/// Page margin used when no `@page { margin }` rule is given (75px).
pub const DEFAULT_PAGE_MARGIN_PT: f32 = 56.25;

const FALLBACK_TITLE: &str = "Untitled";

/// Resolve the page box from merged `@page` rules.
pub fn page_geometry(page: &PageStyle) -> PageGeometry {
    let (width, height) = page.size.unwrap_or(DEFAULT_PAGE_SIZE_PT);
    PageGeometry {
        width,
        height,
        margins: page.margin.unwrap_or([DEFAULT_PAGE_MARGIN_PT; 4]),
    }
}

/// Build the cascade for a document: defaults, then `stylesheets` in
/// order, then the document's own `<style>` blocks.
fn document_cascade(dom: &[crate::dom::DomNode], stylesheets: &[Stylesheet]) -> Cascade {
    let mut cascade = Cascade::new();
    for sheet in stylesheets {
        cascade.push_author(&sheet.css);
    }
    for block in style_blocks(dom) {
        cascade.push_author(&block);
    }
    cascade
}

/// Generate only the layout config (no PDF rendering).
pub fn compute_layout_config(
    html: &str,
    stylesheets: &[Stylesheet],
) -> Result<LayoutConfig, RenderError> {
    let dom = parse_html(html);
    let cascade = document_cascade(&dom, stylesheets);
    let geometry = page_geometry(&cascade.page_style());
    if geometry.width - geometry.margins[1] - geometry.margins[3] <= 0.0
        || geometry.height - geometry.margins[0] - geometry.margins[2] <= 0.0
    {
        return Err(RenderError::Layout(format!(
            "page margins leave no room for content on a {}x{}pt page",
            geometry.width, geometry.height
        )));
    }

    let body = body_element(&dom);
    let (body_style, children) = style_document(&body, &cascade);

    let fonts = FontManager::default();
    let doc = compute_layout(
        &body_style,
        &children,
        geometry.content_width(),
        geometry.margins[3],
        &fonts,
    )?;

    let title = document_title(&dom).unwrap_or_else(|| FALLBACK_TITLE.to_string());
    Ok(paginate(&doc, geometry, &title))
}

/// Full pipeline: HTML string + stylesheets → PDF bytes and the layout they
/// were rendered from.
pub fn generate_pdf(
    html: &str,
    stylesheets: &[Stylesheet],
) -> Result<(Vec<u8>, LayoutConfig), RenderError> {
    let layout_config = compute_layout_config(html, stylesheets)?;
    log::debug!(
        "Laid out {} page(s) of {}x{}pt",
        layout_config.pages.len(),
        layout_config.page_width_pt,
        layout_config.page_height_pt
    );
    let pdf_bytes = render_pdf(&layout_config)?;
    Ok((pdf_bytes, layout_config))
}
