use crate::document::{Document, NodeData, NodeId};

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta", "param",
    "source", "track", "wbr",
];

const RAW_TEXT_TAGS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext",
];

/// Boolean attributes are written bare when their value is empty or their own name.
const COLLAPSIBLE_ATTRS: &[&str] = &[
    "allowfullscreen", "async", "autofocus", "autoplay", "checked", "compact", "controls",
    "declare", "default", "defer", "disabled", "formnovalidate", "hidden", "inert", "ismap",
    "itemscope", "loop", "multiple", "muted", "nohref", "noresize", "noshade", "novalidate",
    "nowrap", "open", "readonly", "required", "reversed", "selected",
];

impl Document {
    /// Serialize the whole document, doctype included.
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        for &child in self.children(self.root()) {
            self.write_node(child, &mut out);
        }
        out
    }

    /// Markup of `id` itself.
    pub fn outer_html_of(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    /// Markup of the children of `id`.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_node(child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match self.data(id) {
            NodeData::Document => {
                for &child in self.children(id) {
                    self.write_node(child, out);
                }
            }
            NodeData::Doctype {
                name,
                public_id,
                system_id,
            } => {
                out.push_str("<!doctype ");
                out.push_str(name);
                if !public_id.is_empty() {
                    out.push_str(&format!(" PUBLIC \"{public_id}\""));
                }
                if !system_id.is_empty() {
                    if public_id.is_empty() {
                        out.push_str(" SYSTEM");
                    }
                    out.push_str(&format!(" \"{system_id}\""));
                }
                out.push('>');
            }
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::Text(text) => {
                let raw = self
                    .parent(id)
                    .and_then(|p| self.tag_name(p))
                    .is_some_and(|tag| RAW_TEXT_TAGS.contains(&tag));
                if raw {
                    out.push_str(text);
                } else {
                    escape_text(text, out);
                }
            }
            NodeData::Element(el) => {
                out.push('<');
                out.push_str(el.name());
                for (name, value) in el.attrs() {
                    out.push(' ');
                    out.push_str(name);
                    let collapse = COLLAPSIBLE_ATTRS.contains(&name.as_str())
                        && (value.is_empty() || value.eq_ignore_ascii_case(name));
                    if !collapse {
                        out.push_str("=\"");
                        escape_attr(value, out);
                        out.push('"');
                    }
                }
                out.push('>');
                if VOID_TAGS.contains(&el.name()) {
                    return;
                }
                for &child in self.children(id) {
                    self.write_node(child, out);
                }
                out.push_str("</");
                out.push_str(el.name());
                out.push('>');
            }
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{A0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{A0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Document;
    use url::Url;

    fn doc(html: &str) -> Document {
        Document::parse(html, Url::parse("http://localhost/").unwrap())
    }

    #[test]
    fn serializes_doctype_void_and_boolean_attributes() {
        let d = doc("<!DOCTYPE html><title>T</title><input disabled value=\"a&quot;b\"><br>");
        let html = d.outer_html();
        assert!(html.starts_with("<!doctype html><html><head><title>T</title></head>"));
        assert!(html.contains(r#"<input disabled value="a&quot;b">"#));
        assert!(html.contains("<br></body>"));
        assert!(!html.contains("</input>"));
    }

    #[test]
    fn escapes_text_but_not_script_content() {
        let d = doc("<p id=p>1 &lt; 2 &amp; 3&nbsp;4</p><script>if (a < b && c) {}</script>");
        let p = d.element_by_id("p").unwrap();
        assert_eq!(d.inner_html(p), "1 &lt; 2 &amp; 3&nbsp;4");
        assert!(d.outer_html().contains("<script>if (a < b && c) {}</script>"));
    }

    #[test]
    fn outer_html_of_element_includes_its_tag() {
        let d = doc("<ul id=l><li>a</li><!-- note --></ul>");
        let ul = d.element_by_id("l").unwrap();
        assert_eq!(d.outer_html_of(ul), "<ul id=\"l\"><li>a</li><!-- note --></ul>");
    }
}
