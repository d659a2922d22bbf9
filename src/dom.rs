//! Markup fragment parser for drag-and-drop payloads.
//!
//! Browsers put a `text/html` flavour on drags of images from other pages,
//! typically wrapped in `<html><body><!--StartFragment-->…`. We only need
//! the `src` of the first `<img>`, so this is a forgiving recursive-descent
//! parser over tags, attributes and text: unknown tags are kept, void
//! elements never take children and unclosed elements end at EOF.

use std::collections::HashMap;

/// A node in the parsed fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

/// An element with lower-cased tag name, attributes and children.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub tag: String,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    fn new(tag: String) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }
}

/// Elements that never have children or a closing tag.
fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "img" | "br" | "hr" | "meta" | "link" | "input" | "source" | "wbr" | "area" | "col"
    )
}

/// Parse an HTML fragment into a list of nodes.
pub fn parse_fragment(html: &str) -> Vec<DomNode> {
    let mut parser = Parser::new(html);
    parser.parse_nodes(None)
}

/// `src` of the first `<img>` in document order with a non-empty value.
pub fn first_img_src(html: &str) -> Option<String> {
    find_img_src(&parse_fragment(html))
}

fn find_img_src(nodes: &[DomNode]) -> Option<String> {
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == "img" {
                if let Some(src) = e.attr("src").map(str::trim).filter(|s| !s.is_empty()) {
                    return Some(src.to_string());
                }
            }
            if let Some(src) = find_img_src(&e.children) {
                return Some(src);
            }
        }
    }
    None
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Parse siblings until EOF or a closing tag. A closing tag for `parent`
    /// is left for the caller; a stray closing tag is skipped.
    fn parse_nodes(&mut self, parent: Option<&str>) -> Vec<DomNode> {
        let mut nodes = Vec::new();
        while !self.eof() {
            if self.starts_with("</") {
                let close = self.peek_closing_tag();
                if parent.is_some() {
                    break;
                }
                // Stray close at top level.
                self.skip_past('>');
                log::trace!("skipping stray </{close}>");
                continue;
            }
            if let Some(node) = self.parse_node() {
                nodes.push(node);
            }
        }
        nodes
    }

    fn parse_node(&mut self) -> Option<DomNode> {
        if self.starts_with("<!--") {
            self.skip_comment();
            return None;
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            self.skip_past('>');
            return None;
        }
        if self.starts_with("<") && self.next_is_tag_start() {
            Some(self.parse_element())
        } else {
            self.parse_text()
        }
    }

    fn parse_text(&mut self) -> Option<DomNode> {
        let start = self.pos;
        self.advance();
        while !self.eof() && !self.starts_with("<") {
            self.advance();
        }
        let text = &self.input[start..self.pos];
        if text.trim().is_empty() {
            None
        } else {
            Some(DomNode::Text(decode_entities(text)))
        }
    }

    fn parse_element(&mut self) -> DomNode {
        self.advance(); // '<'
        let tag = self.parse_name().to_ascii_lowercase();
        let mut elem = ElementNode::new(tag);

        loop {
            self.skip_whitespace();
            if self.eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let before = self.pos;
            let (key, value) = self.parse_attribute();
            if !key.is_empty() {
                elem.attributes.entry(key).or_insert(value);
            }
            if self.pos == before {
                // Garbage such as `<img "x">`; skip one char.
                self.advance();
            }
        }

        if self.starts_with("/>") {
            self.pos += 2;
            return DomNode::Element(elem);
        }
        if self.starts_with(">") {
            self.pos += 1;
        }
        if is_void(&elem.tag) {
            return DomNode::Element(elem);
        }

        elem.children = self.parse_nodes(Some(&elem.tag.clone()));

        if self.starts_with("</") && self.peek_closing_tag() == elem.tag {
            self.skip_past('>');
        }
        DomNode::Element(elem)
    }

    fn parse_name(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.current_char() {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ':' {
                self.advance();
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }

    fn parse_attribute(&mut self) -> (String, String) {
        let key = self.parse_name().to_ascii_lowercase();
        self.skip_whitespace();
        if !self.starts_with("=") {
            return (key, String::new());
        }
        self.advance();
        self.skip_whitespace();
        (key, self.parse_attr_value())
    }

    fn parse_attr_value(&mut self) -> String {
        let quote = match self.current_char() {
            Some(q @ ('"' | '\'')) => q,
            _ => {
                let start = self.pos;
                while let Some(c) = self.current_char() {
                    if c.is_whitespace() || c == '>' {
                        break;
                    }
                    if c == '/' && self.input[self.pos..].starts_with("/>") {
                        break;
                    }
                    self.advance();
                }
                return decode_entities(&self.input[start..self.pos]);
            }
        };
        self.advance();
        let start = self.pos;
        while let Some(c) = self.current_char() {
            if c == quote {
                break;
            }
            self.advance();
        }
        let value = decode_entities(&self.input[start..self.pos]);
        if !self.eof() {
            self.advance();
        }
        value
    }

    /// Lower-cased name of the closing tag at the cursor (cursor unchanged).
    fn peek_closing_tag(&self) -> String {
        self.input[self.pos + 2..]
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '-' || *c == '_' || *c == ':')
            .collect::<String>()
            .to_ascii_lowercase()
    }

    fn next_is_tag_start(&self) -> bool {
        self.input[self.pos + 1..]
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic())
            .unwrap_or(false)
    }

    fn skip_whitespace(&mut self) {
        while self.current_char().map(char::is_whitespace).unwrap_or(false) {
            self.advance();
        }
    }

    fn skip_comment(&mut self) {
        self.pos += 4; // "<!--"
        match self.input[self.pos..].find("-->") {
            Some(end) => self.pos += end + 3,
            None => self.pos = self.input.len(),
        }
    }

    fn skip_past(&mut self, c: char) {
        match self.input[self.pos..].find(c) {
            Some(i) => self.pos += i + c.len_utf8(),
            None => self.pos = self.input.len(),
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current_char() {
            self.pos += c.len_utf8();
        }
    }
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
