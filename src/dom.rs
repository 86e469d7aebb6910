//! HTML parser – converts an HTML string into a simple DOM tree.
//!
//! Covers the elements produced by the markdown transform and the document
//! skeleton around it:
//! - Document: html, head, title, style, meta, link, body
//! - Block: div, p, h1-h6, ul, ol, li, blockquote, pre, hr, table, thead,
//!   tbody, tr, th, td
//! - Inline: span, a, strong/b, em/i, code, del/s, sup, br, img
//!
//! Anything else is kept as an inline container so its text survives.

use std::collections::HashMap;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// The tag name of a supported element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Head,
    Title,
    Style,
    Meta,
    Link,
    Script,
    Body,
    Div,
    P,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    Ul,
    Ol,
    Li,
    Blockquote,
    Pre,
    Hr,
    Table,
    Thead,
    Tbody,
    Tr,
    Td,
    Th,
    Span,
    A,
    Strong,
    Em,
    Code,
    Del,
    Sup,
    Br,
    Img,
    Input,
    /// Catch-all for unknown tags – kept as inline containers.
    Unknown(String),
}

impl Tag {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "html" => Tag::Html,
            "head" => Tag::Head,
            "title" => Tag::Title,
            "style" => Tag::Style,
            "meta" => Tag::Meta,
            "link" => Tag::Link,
            "script" => Tag::Script,
            "body" => Tag::Body,
            "div" | "section" | "article" | "header" | "footer" | "main" | "nav" => Tag::Div,
            "p" => Tag::P,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "h4" => Tag::H4,
            "h5" => Tag::H5,
            "h6" => Tag::H6,
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "blockquote" => Tag::Blockquote,
            "pre" => Tag::Pre,
            "hr" => Tag::Hr,
            "table" => Tag::Table,
            "thead" | "tfoot" => Tag::Thead,
            "tbody" => Tag::Tbody,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            "span" => Tag::Span,
            "a" => Tag::A,
            "strong" | "b" => Tag::Strong,
            "em" | "i" => Tag::Em,
            "code" | "kbd" | "samp" | "tt" => Tag::Code,
            "del" | "s" | "strike" => Tag::Del,
            "sup" => Tag::Sup,
            "br" => Tag::Br,
            "img" => Tag::Img,
            "input" => Tag::Input,
            other => Tag::Unknown(other.to_string()),
        }
    }

    /// Lower-case tag name as used by CSS type selectors.
    pub fn name(&self) -> &str {
        match self {
            Tag::Html => "html",
            Tag::Head => "head",
            Tag::Title => "title",
            Tag::Style => "style",
            Tag::Meta => "meta",
            Tag::Link => "link",
            Tag::Script => "script",
            Tag::Body => "body",
            Tag::Div => "div",
            Tag::P => "p",
            Tag::H1 => "h1",
            Tag::H2 => "h2",
            Tag::H3 => "h3",
            Tag::H4 => "h4",
            Tag::H5 => "h5",
            Tag::H6 => "h6",
            Tag::Ul => "ul",
            Tag::Ol => "ol",
            Tag::Li => "li",
            Tag::Blockquote => "blockquote",
            Tag::Pre => "pre",
            Tag::Hr => "hr",
            Tag::Table => "table",
            Tag::Thead => "thead",
            Tag::Tbody => "tbody",
            Tag::Tr => "tr",
            Tag::Td => "td",
            Tag::Th => "th",
            Tag::Span => "span",
            Tag::A => "a",
            Tag::Strong => "strong",
            Tag::Em => "em",
            Tag::Code => "code",
            Tag::Del => "del",
            Tag::Sup => "sup",
            Tag::Br => "br",
            Tag::Img => "img",
            Tag::Input => "input",
            Tag::Unknown(name) => name,
        }
    }

    /// Elements that never have children or a closing tag.
    pub fn is_void(&self) -> bool {
        matches!(
            self,
            Tag::Img | Tag::Br | Tag::Hr | Tag::Meta | Tag::Link | Tag::Input
        )
    }

    /// Elements whose content is raw text up to the matching close tag.
    pub fn is_raw_text(&self) -> bool {
        matches!(self, Tag::Style | Tag::Script | Tag::Title)
    }

    pub fn is_heading(&self) -> bool {
        matches!(
            self,
            Tag::H1 | Tag::H2 | Tag::H3 | Tag::H4 | Tag::H5 | Tag::H6
        )
    }
}

/// A node in our DOM tree.
#[derive(Debug, Clone)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

/// An element node carrying tag, attributes, and children.
#[derive(Debug, Clone)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attributes
            .get("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().contains(&class)
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attributes.get("style").map(|s| s.as_str())
    }

    pub fn src(&self) -> Option<&str> {
        self.attributes.get("src").map(|s| s.as_str())
    }

    /// Concatenated text of all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[DomNode], out: &mut String) {
    for node in nodes {
        match node {
            DomNode::Text(t) => out.push_str(t),
            DomNode::Element(e) => collect_text(&e.children, out),
        }
    }
}

// ---------------------------------------------------------------------------
// Parser – simple recursive descent over HTML
// ---------------------------------------------------------------------------

/// Parse an HTML string into a list of DOM nodes.
///
/// Whitespace-only text is kept; the style pass decides whether it is
/// significant (inside `pre` and between inline elements) or not.
pub fn parse_html(html: &str) -> Vec<DomNode> {
    let mut parser = Parser::new(html);
    parser.parse_nodes()
}

/// Elements nested deeper than this are flattened: their start and end tags
/// are dropped and their children become siblings at the limit.
pub const MAX_NESTING_DEPTH: usize = 64;

struct OpenElement {
    tag: Tag,
    /// The document's `div.content` wrapper directly under `<body>`. Closing
    /// tags in the markdown cannot end it early.
    sealed: bool,
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    /// Elements currently open, innermost last.
    open: Vec<OpenElement>,
    /// Start tags dropped at the depth limit whose end tags are still due.
    flattened: Vec<Tag>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            open: Vec::new(),
            flattened: Vec::new(),
        }
    }

    /// Parse siblings until EOF or a closing tag that belongs to an open
    /// element. Closing tags matching nothing open are dropped, as are
    /// `</body>` and `</html>`: both elements run to the end of input.
    fn parse_nodes(&mut self) -> Vec<DomNode> {
        let mut nodes = Vec::new();
        while !self.eof() {
            if self.starts_with("</") {
                let closing = self.peek_closing_tag();
                if let Some(i) = self.flattened.iter().rposition(|t| *t == closing) {
                    self.flattened.truncate(i);
                } else if self.closes_open_element(&closing) {
                    break;
                }
                self.skip_past('>');
                continue;
            }
            if let Some(node) = self.parse_node() {
                nodes.push(node);
            }
        }
        nodes
    }

    /// Whether the closing tag at the cursor ends one of the open elements.
    fn closes_open_element(&self, closing: &Tag) -> bool {
        if matches!(closing, Tag::Body | Tag::Html) {
            return false;
        }
        let Some(target) = self.open.iter().rposition(|e| e.tag == *closing) else {
            return false;
        };
        let seals_target = self.open[target..].iter().any(|e| e.sealed);
        !seals_target || self.only_document_end_follows()
    }

    /// True when everything after the closing tag at the cursor is
    /// whitespace and `</body>` / `</html>`.
    fn only_document_end_follows(&self) -> bool {
        let rest = &self.input[self.pos..];
        let mut rest = match rest.find('>') {
            Some(i) => &rest[i + 1..],
            None => return true,
        };
        loop {
            rest = rest.trim_start();
            if rest.is_empty() {
                return true;
            }
            let lower = rest.get(..6).map(str::to_ascii_lowercase);
            if !matches!(lower.as_deref(), Some("</body" | "</html")) {
                return false;
            }
            match rest.find('>') {
                Some(i) => rest = &rest[i + 1..],
                None => return true,
            }
        }
    }

    fn peek_closing_tag(&mut self) -> Tag {
        let saved = self.pos;
        self.advance(2);
        let tag = Tag::parse(&self.parse_tag_name());
        self.pos = saved;
        tag
    }

    fn parse_node(&mut self) -> Option<DomNode> {
        if self.starts_with("<!--") {
            self.skip_comment();
            return None;
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            // Skip doctype / processing instructions
            self.skip_past('>');
            return None;
        }
        if self.starts_with("<") && self.next_is_tag_start() {
            self.parse_element()
        } else {
            Some(self.parse_text())
        }
    }

    fn next_is_tag_start(&self) -> bool {
        self.input[self.pos + 1..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
    }

    fn parse_text(&mut self) -> DomNode {
        let start = self.pos;
        // A lone '<' that does not open a tag is literal text.
        if self.starts_with("<") {
            self.advance(1);
        }
        while !self.eof() && !self.starts_with("<") {
            self.advance(1);
        }
        let text = &self.input[start..self.pos];
        DomNode::Text(decode_entities(text))
    }

    fn parse_element(&mut self) -> Option<DomNode> {
        // Consume '<'
        self.advance(1);
        let tag_name = self.parse_tag_name();
        let tag = Tag::parse(&tag_name);
        let mut elem = ElementNode::new(tag.clone());

        // Parse attributes
        loop {
            self.skip_whitespace();
            if self.eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let before = self.pos;
            let (key, value) = self.parse_attribute();
            if self.pos == before {
                // Unparseable character in the tag; skip it.
                self.advance(1);
                continue;
            }
            if !key.is_empty() {
                elem.attributes.insert(key.to_ascii_lowercase(), value);
            }
        }

        if self.starts_with("/>") {
            self.advance(2);
            return Some(DomNode::Element(elem));
        }
        if self.starts_with(">") {
            self.advance(1);
        }
        if tag.is_void() {
            return Some(DomNode::Element(elem));
        }

        if tag.is_raw_text() {
            let text = self.take_raw_text(&tag_name);
            if !text.is_empty() {
                let text = if tag == Tag::Title {
                    decode_entities(&text)
                } else {
                    text
                };
                elem.children.push(DomNode::Text(text));
            }
            return Some(DomNode::Element(elem));
        }

        if self.open.len() >= MAX_NESTING_DEPTH {
            log::debug!("nesting limit reached, flattening <{tag_name}>");
            self.flattened.push(tag);
            return None;
        }

        // Parse children
        let sealed = tag == Tag::Div
            && elem.has_class("content")
            && self.open.last().is_some_and(|e| e.tag == Tag::Body);
        self.open.push(OpenElement {
            tag: tag.clone(),
            sealed,
        });
        elem.children = self.parse_nodes();
        self.open.pop();
        if self.open.len() < MAX_NESTING_DEPTH {
            self.flattened.clear();
        }

        // Consume our closing tag if it is next; otherwise it belongs to an
        // ancestor and this element was implicitly closed.
        if self.starts_with("</") && self.peek_closing_tag() == tag {
            self.skip_past('>');
        }

        Some(DomNode::Element(elem))
    }

    /// Read everything up to `</name` (case-insensitive) and consume the
    /// closing tag.
    fn take_raw_text(&mut self, name: &str) -> String {
        let rest = &self.input[self.pos..];
        let needle = format!("</{}", name.to_ascii_lowercase());
        let end = rest.to_ascii_lowercase().find(&needle).unwrap_or(rest.len());
        let text = rest[..end].to_string();
        self.pos += end;
        if !self.eof() {
            self.skip_past('>');
        }
        text
    }

    fn parse_tag_name(&mut self) -> String {
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ':' {
                self.advance(1);
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attribute(&mut self) -> (String, String) {
        let key = self.parse_tag_name();
        self.skip_whitespace();
        if !self.starts_with("=") {
            return (key, String::new());
        }
        self.advance(1); // skip '='
        self.skip_whitespace();
        let value = self.parse_attr_value();
        (key, value)
    }

    fn parse_attr_value(&mut self) -> String {
        for quote in ["\"", "'"] {
            if self.starts_with(quote) {
                self.advance(1);
                let start = self.pos;
                while !self.eof() && !self.starts_with(quote) {
                    self.advance(1);
                }
                let val = self.input[start..self.pos].to_string();
                if !self.eof() {
                    self.advance(1);
                }
                return decode_entities(&val);
            }
        }
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_whitespace() || c == '>' {
                break;
            }
            self.advance(1);
        }
        decode_entities(&self.input[start..self.pos])
    }

    fn skip_past(&mut self, c: char) {
        while !self.eof() && self.current_char() != c {
            self.advance(1);
        }
        if !self.eof() {
            self.advance(1);
        }
    }

    fn skip_whitespace(&mut self) {
        while !self.eof() && self.current_char().is_whitespace() {
            self.advance(1);
        }
    }

    fn skip_comment(&mut self) {
        self.advance(4); // skip <!--
        while !self.eof() && !self.starts_with("-->") {
            self.advance(1);
        }
        if !self.eof() {
            self.advance(3);
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> char {
        self.input[self.pos..].chars().next().unwrap_or('\0')
    }

    fn advance(&mut self, n: usize) {
        // Advance by `n` characters (not bytes).
        for _ in 0..n {
            if let Some(c) = self.input[self.pos..].chars().next() {
                self.pos += c.len_utf8();
            }
        }
    }
}

fn decode_entities(s: &str) -> String {
    html_escape::decode_html_entities(s).into_owned()
}

// ---------------------------------------------------------------------------
// Document queries
// ---------------------------------------------------------------------------

/// Depth-first search for the first element with `tag`.
pub fn find_element<'a>(nodes: &'a [DomNode], tag: &Tag) -> Option<&'a ElementNode> {
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == *tag {
                return Some(e);
            }
            if let Some(found) = find_element(&e.children, tag) {
                return Some(found);
            }
        }
    }
    None
}

/// The `<title>` text, if the document has one.
pub fn document_title(nodes: &[DomNode]) -> Option<String> {
    find_element(nodes, &Tag::Title)
        .map(|t| t.text_content().split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
}

/// Contents of every `<style>` element, in document order.
pub fn style_blocks(nodes: &[DomNode]) -> Vec<String> {
    let mut out = Vec::new();
    collect_styles(nodes, &mut out);
    out
}

fn collect_styles(nodes: &[DomNode], out: &mut Vec<String>) {
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Style {
                out.push(e.text_content());
            } else {
                collect_styles(&e.children, out);
            }
        }
    }
}

/// The `<body>` element, or a synthetic body wrapping every node outside
/// `<head>` when the input is a bare fragment.
pub fn body_element(nodes: &[DomNode]) -> ElementNode {
    if let Some(body) = find_element(nodes, &Tag::Body) {
        return body.clone();
    }
    let mut body = ElementNode::new(Tag::Body);
    for node in nodes {
        match node {
            DomNode::Element(e) if e.tag == Tag::Html => {
                body.children.extend(
                    e.children
                        .iter()
                        .filter(|c| !matches!(c, DomNode::Element(h) if h.tag == Tag::Head))
                        .cloned(),
                );
            }
            DomNode::Element(e) if matches!(e.tag, Tag::Head | Tag::Style | Tag::Title) => {}
            other => body.children.push(other.clone()),
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elements(nodes: &[DomNode]) -> Vec<&ElementNode> {
        nodes
            .iter()
            .filter_map(|n| match n {
                DomNode::Element(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn parse_simple_div() {
        let html = r#"<div class="content main"><p>Hello</p></div>"#;
        let nodes = parse_html(html);
        assert_eq!(nodes.len(), 1);
        if let DomNode::Element(e) = &nodes[0] {
            assert_eq!(e.tag, Tag::Div);
            assert_eq!(e.classes(), vec!["content", "main"]);
            assert_eq!(e.children.len(), 1);
        } else {
            panic!("Expected element");
        }
    }

    #[test]
    fn parse_void_elements_without_slash() {
        let html = r#"<p>a<br>b</p><hr><img src="x.png" alt="X">"#;
        let nodes = parse_html(html);
        let tags: Vec<Tag> = elements(&nodes).iter().map(|e| e.tag.clone()).collect();
        assert_eq!(tags, vec![Tag::P, Tag::Hr, Tag::Img]);
        if let DomNode::Element(p) = &nodes[0] {
            assert_eq!(p.children.len(), 3); // "a", <br>, "b"
        }
    }

    #[test]
    fn whitespace_between_inline_elements_is_kept() {
        let html = "<p><strong>bold</strong> <em>italic</em></p>";
        let nodes = parse_html(html);
        if let DomNode::Element(p) = &nodes[0] {
            assert_eq!(p.children.len(), 3);
            assert!(matches!(&p.children[1], DomNode::Text(t) if t == " "));
        } else {
            panic!("Expected p element");
        }
    }

    #[test]
    fn style_content_is_raw_text() {
        let html = "<head><style>a > b { color: red; } p::before { content: '<'; }</style></head>";
        let nodes = parse_html(html);
        let styles = style_blocks(&nodes);
        assert_eq!(styles.len(), 1);
        assert!(styles[0].contains("a > b"));
        assert!(styles[0].contains("content: '<'"));
    }

    #[test]
    fn entities_are_decoded() {
        let nodes = parse_html("<p>&lt;tag&gt; &amp; &quot;q&quot; &#39;s&#39; &#x41;</p>");
        if let DomNode::Element(p) = &nodes[0] {
            assert_eq!(p.text_content(), "<tag> & \"q\" 's' A");
        }
    }

    #[test]
    fn document_queries() {
        let html = r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title> My  Doc </title><style>body{}</style></head>
<body><div class="content"><h1>Hi</h1></div></body>
</html>"#;
        let nodes = parse_html(html);
        assert_eq!(document_title(&nodes).as_deref(), Some("My Doc"));
        let body = body_element(&nodes);
        let divs = elements(&body.children);
        assert_eq!(divs.len(), 1);
        assert!(divs[0].has_class("content"));
    }

    #[test]
    fn fragment_gets_synthetic_body() {
        let nodes = parse_html("<h1>A</h1><p>B</p>");
        let body = body_element(&nodes);
        assert_eq!(elements(&body.children).len(), 2);
    }

    #[test]
    fn stray_close_tags_are_ignored() {
        let nodes = parse_html("</p><p>ok</p></div>");
        let els = elements(&nodes);
        assert_eq!(els.len(), 1);
        assert_eq!(els[0].text_content(), "ok");
    }

    fn depth(nodes: &[DomNode]) -> usize {
        nodes
            .iter()
            .map(|n| match n {
                DomNode::Element(e) => 1 + depth(&e.children),
                DomNode::Text(_) => 0,
            })
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn nesting_depth_is_capped() {
        let n = 10_000;
        let html = format!(
            "{}<p>deep</p>{}<p>after</p>",
            "<blockquote>".repeat(n),
            "</blockquote>".repeat(n)
        );
        let nodes = parse_html(&html);
        assert_eq!(depth(&nodes), MAX_NESTING_DEPTH);
        let els = elements(&nodes);
        assert_eq!(els.len(), 2);
        assert!(els[0].text_content().contains("deep"));
        assert_eq!(els[1].tag, Tag::P);
        assert_eq!(els[1].text_content(), "after");
    }

    #[test]
    fn markdown_close_tags_cannot_end_the_content_wrapper() {
        let html = "<html><head><title>t</title></head><body>\n<div class=\"content\">\n\
                    <p>alpha</p></body></html>\n<div><p>beta</p></div></div>\n<p>gamma</p>\n\
                    </div>\n</body>\n</html>\n";
        let nodes = parse_html(html);
        let body = body_element(&nodes);
        let wrappers = elements(&body.children);
        assert_eq!(wrappers.len(), 1);
        assert!(wrappers[0].has_class("content"));
        let text = wrappers[0].text_content();
        for needle in ["alpha", "beta", "gamma"] {
            assert!(text.contains(needle), "missing {needle:?} in {text:?}");
        }
    }

    #[test]
    fn unclosed_markdown_div_stays_inside_content() {
        let html = "<body><div class=\"content\"><div><p>x</p>\n<p>y</p>\n</div>\n</body>";
        let nodes = parse_html(html);
        let body = body_element(&nodes);
        let wrappers = elements(&body.children);
        assert_eq!(wrappers.len(), 1);
        assert!(wrappers[0].text_content().contains('y'));
    }

    #[test]
    fn parse_table_with_sections() {
        let html = "<table><thead><tr><th>A</th></tr></thead><tbody><tr><td>1</td></tr></tbody></table>";
        let nodes = parse_html(html);
        if let DomNode::Element(table) = &nodes[0] {
            assert_eq!(table.tag, Tag::Table);
            let sections: Vec<Tag> = elements(&table.children).iter().map(|e| e.tag.clone()).collect();
            assert_eq!(sections, vec![Tag::Thead, Tag::Tbody]);
        } else {
            panic!("Expected table");
        }
    }
}
