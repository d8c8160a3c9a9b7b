//! Text extraction: raw (`whole_text`) and rendered-ish (`text`, `own_text`).

use crate::document::{Document, NodeData, NodeId};

/// Elements whose boundaries separate words in normalized text.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "canvas", "caption", "center", "col",
    "colgroup", "dd", "details", "dir", "div", "dl", "dt", "fieldset", "figcaption", "figure",
    "footer", "form", "frameset", "h1", "h2", "h3", "h4", "h5", "h6", "head", "header", "hgroup",
    "hr", "html", "li", "main", "menu", "nav", "ol", "p", "pre", "section", "summary", "table",
    "tbody", "td", "template", "tfoot", "th", "thead", "title", "tr", "ul", "video", "audio",
];

/// Elements whose text children are data, not rendered text.
const DATA_TAGS: &[&str] = &["script", "style"];

fn is_block(tag: &str) -> bool {
    BLOCK_TAGS.contains(&tag)
}

fn ends_with_space(s: &str) -> bool {
    s.ends_with(' ')
}

/// Append `text` with whitespace runs collapsed to single spaces.
fn append_normalised(out: &mut String, text: &str, strip_leading: bool) {
    let mut last_was_white = strip_leading;
    let mut reached_non_white = false;
    for ch in text.chars() {
        if is_actually_whitespace(ch) {
            if (strip_leading && !reached_non_white) || last_was_white {
                continue;
            }
            out.push(' ');
            last_was_white = true;
        } else if !is_invisible(ch) {
            out.push(ch);
            last_was_white = false;
            reached_non_white = true;
        }
    }
}

fn is_actually_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\u{0C}' | '\r' | '\u{A0}')
}

fn is_invisible(ch: char) -> bool {
    matches!(ch, '\u{200B}' | '\u{AD}')
}

impl Document {
    /// All descendant text, unmodified. `br` contributes a newline.
    pub fn whole_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in self.descendants(id) {
            match self.data(node) {
                NodeData::Text(t) if !self.in_data_element(node) => out.push_str(t),
                NodeData::Element(el) if el.name() == "br" => out.push('\n'),
                _ => {}
            }
        }
        out
    }

    /// Normalized text: whitespace collapsed, block boundaries become
    /// spaces, result trimmed. Text inside `pre` keeps its whitespace.
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out.trim().to_string()
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        for &child in self.children(id) {
            match self.data(child) {
                NodeData::Text(t) => {
                    if self.in_data_element(child) {
                        continue;
                    }
                    if self.preserves_whitespace(child) {
                        out.push_str(t);
                    } else {
                        let strip = out.is_empty() || ends_with_space(out);
                        append_normalised(out, t, strip);
                    }
                }
                NodeData::Element(el) => {
                    let block = is_block(el.name()) || el.name() == "br";
                    if block && !out.is_empty() && !ends_with_space(out) {
                        out.push(' ');
                    }
                    self.collect_text(child, out);
                    if is_block(el.name()) && !out.is_empty() && !ends_with_space(out) {
                        let next_is_text = self
                            .next_sibling(child)
                            .is_some_and(|n| matches!(self.data(n), NodeData::Text(_)));
                        if next_is_text {
                            out.push(' ');
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Normalized text of direct text children only.
    pub fn own_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            match self.data(child) {
                NodeData::Text(t) => {
                    let strip = out.is_empty() || ends_with_space(&out);
                    append_normalised(&mut out, t, strip);
                }
                NodeData::Element(el) if el.name() == "br" && !ends_with_space(&out) => {
                    out.push(' ');
                }
                _ => {}
            }
        }
        out.trim().to_string()
    }

    fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(id)?);
        let pos = siblings.iter().position(|&s| s == id)?;
        siblings.get(pos + 1).copied()
    }

    fn in_data_element(&self, text: NodeId) -> bool {
        self.parent(text)
            .and_then(|p| self.tag_name(p))
            .is_some_and(|tag| DATA_TAGS.contains(&tag))
    }

    fn preserves_whitespace(&self, text: NodeId) -> bool {
        self.ancestors(text)
            .take(6)
            .any(|a| self.is_tag(a, "pre") || self.is_tag(a, "textarea"))
    }
}
