//! Markdown → HTML fragment.
//!
//! Built on `pulldown-cmark` with tables, footnotes, strikethrough and task
//! lists enabled. Two passes over the event stream add what the parser does
//! not do itself:
//!
//! - every heading gets a unique slug `id`, and a paragraph consisting of
//!   just `[TOC]` is replaced by a nested list of links to those ids;
//! - fenced and indented code blocks are highlighted with `syntect` into
//!   `<div class="codehilite"><pre style=…>` markup with inline colours.
//!
//! Malformed markdown never fails; the parser degrades to literal text.

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

/// Marker paragraph replaced by the table of contents.
pub const TOC_MARKER: &str = "[TOC]";

const HIGHLIGHT_THEME: &str = "InspiredGitHub";

/// One heading collected for the table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub level: u8,
    pub id: String,
    pub text: String,
}

/// Output of [`MarkdownRenderer::render`].
#[derive(Debug, Clone)]
pub struct Rendered {
    pub html: String,
    pub toc: Vec<TocEntry>,
}

/// Reusable markdown renderer; holds the highlighting grammars and theme.
pub struct MarkdownRenderer {
    syntaxes: SyntaxSet,
    theme: Theme,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let mut themes = ThemeSet::load_defaults();
        let theme = themes.themes.remove(HIGHLIGHT_THEME).unwrap_or_default();
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            theme,
        }
    }

    /// Convert markdown to an HTML fragment.
    pub fn to_html(&self, markdown: &str) -> String {
        self.render(markdown).html
    }

    /// Convert markdown and also return the collected headings.
    pub fn render(&self, markdown: &str) -> Rendered {
        let events: Vec<Event> = Parser::new_ext(markdown, parser_options()).collect();
        let toc = collect_headings(&events);

        let mut out_events: Vec<Event> = Vec::with_capacity(events.len());
        let mut heading_idx = 0usize;
        let mut i = 0usize;

        while i < events.len() {
            match &events[i] {
                Event::Start(Tag::Heading {
                    level,
                    classes,
                    attrs,
                    ..
                }) => {
                    let id = toc
                        .get(heading_idx)
                        .map(|e| CowStr::from(e.id.clone()));
                    heading_idx += 1;
                    out_events.push(Event::Start(Tag::Heading {
                        level: *level,
                        id,
                        classes: classes.clone(),
                        attrs: attrs.clone(),
                    }));
                    i += 1;
                }
                Event::Start(Tag::Paragraph) => {
                    if let Some(end) = toc_marker_end(&events, i) {
                        out_events.push(Event::Html(CowStr::from(toc_html(&toc))));
                        i = end + 1;
                    } else {
                        out_events.push(events[i].clone());
                        i += 1;
                    }
                }
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => info
                            .split_whitespace()
                            .next()
                            .unwrap_or("")
                            .to_string(),
                        CodeBlockKind::Indented => String::new(),
                    };
                    let mut code = String::new();
                    i += 1;
                    while i < events.len() {
                        match &events[i] {
                            Event::End(TagEnd::CodeBlock) => break,
                            Event::Text(t) => code.push_str(t),
                            _ => {}
                        }
                        i += 1;
                    }
                    out_events.push(Event::Html(CowStr::from(self.highlight(&code, &lang))));
                    i += 1; // skip End(CodeBlock)
                }
                other => {
                    out_events.push(other.clone());
                    i += 1;
                }
            }
        }

        let mut html_out = String::with_capacity(markdown.len() * 2);
        html::push_html(&mut html_out, out_events.into_iter());
        Rendered {
            html: html_out,
            toc,
        }
    }

    /// Highlight one code block. Unknown languages render as plain text; a
    /// highlighter error falls back to escaped, unstyled `<pre><code>`.
    fn highlight(&self, code: &str, lang: &str) -> String {
        let syntax = if lang.is_empty() {
            None
        } else {
            self.syntaxes
                .find_syntax_by_token(lang)
                .or_else(|| self.syntaxes.find_syntax_by_name(lang))
        };
        let syntax = syntax.unwrap_or_else(|| self.syntaxes.find_syntax_plain_text());

        let body = match highlighted_html_for_string(code, &self.syntaxes, syntax, &self.theme) {
            Ok(h) => h,
            Err(e) => {
                log::warn!("Highlighting failed for language {lang:?}: {e}");
                format!(
                    "<pre><code>{}</code></pre>",
                    html_escape::encode_text(code)
                )
            }
        };
        format!("<div class=\"codehilite\">{body}</div>\n")
    }
}

fn parser_options() -> Options {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_FOOTNOTES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);
    opts.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    opts
}

/// First pass: gather heading text and assign unique ids. An explicit
/// `{#id}` attribute wins over the generated slug.
fn collect_headings(events: &[Event]) -> Vec<TocEntry> {
    let mut entries = Vec::new();
    let mut used: Vec<String> = Vec::new();
    let mut current: Option<(u8, Option<String>, String)> = None;

    for event in events {
        match event {
            Event::Start(Tag::Heading { level, id, .. }) => {
                current = Some((*level as u8, id.as_ref().map(|s| s.to_string()), String::new()));
            }
            Event::Text(t) | Event::Code(t) => {
                if let Some((_, _, text)) = current.as_mut() {
                    text.push_str(t);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, explicit, text)) = current.take() {
                    let base = explicit.unwrap_or_else(|| slugify(&text));
                    let id = unique_id(&base, &used);
                    used.push(id.clone());
                    entries.push(TocEntry {
                        level,
                        id,
                        text: text.trim().to_string(),
                    });
                }
            }
            _ => {}
        }
    }
    entries
}

/// Lowercase, drop punctuation, and join words with `-`.
pub fn slugify(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect::<String>()
        .to_lowercase();
    let slug = cleaned.split_whitespace().collect::<Vec<_>>().join("-");
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug
    }
}

fn unique_id(base: &str, used: &[String]) -> String {
    if !used.iter().any(|u| u == base) {
        return base.to_string();
    }
    let mut n = 1;
    loop {
        let candidate = format!("{base}_{n}");
        if !used.iter().any(|u| *u == candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// If the paragraph starting at `start` contains only the `[TOC]` marker,
/// return the index of its closing event.
fn toc_marker_end(events: &[Event], start: usize) -> Option<usize> {
    let mut text = String::new();
    for (offset, event) in events[start + 1..].iter().enumerate() {
        match event {
            Event::Text(t) => text.push_str(t),
            Event::End(TagEnd::Paragraph) => {
                return (text.trim() == TOC_MARKER).then_some(start + 1 + offset);
            }
            _ => return None,
        }
    }
    None
}

/// Nested `<ul>` of links, one level per heading depth change.
fn toc_html(entries: &[TocEntry]) -> String {
    let mut out = String::from("<div class=\"toc\">\n");
    let mut stack: Vec<u8> = Vec::new();

    for entry in entries {
        match stack.last().copied() {
            None => {
                out.push_str("<ul>\n");
                stack.push(entry.level);
            }
            Some(top) if entry.level > top => {
                out.push_str("<ul>\n");
                stack.push(entry.level);
            }
            Some(_) => {
                while stack.len() > 1 && stack.last().is_some_and(|&top| entry.level < top) {
                    out.push_str("</li>\n</ul>\n");
                    stack.pop();
                }
                out.push_str("</li>\n");
            }
        }
        out.push_str(&format!(
            "<li><a href=\"#{}\">{}</a>",
            html_escape::encode_double_quoted_attribute(&entry.id),
            html_escape::encode_text(&entry.text)
        ));
    }
    while stack.pop().is_some() {
        out.push_str("</li>\n</ul>\n");
    }
    out.push_str("</div>\n");
    out
}
