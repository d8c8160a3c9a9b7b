//! Arena-backed mutable HTML document.
//!
//! Pages are parsed once with `scraper` (html5ever) and copied into a flat
//! arena so element handles can be plain indices that stay valid while the
//! tree is mutated by clicks and typing.

use std::collections::HashMap;

use scraper::Html;
use url::Url;

/// Index of a node in its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    name: String,
    attrs: Vec<(String, String)>,
    dirty_value: Option<String>,
}

impl ElementData {
    /// Attribute names are lowercased; the first of duplicate names wins.
    pub fn new(name: &str, attrs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut kept: Vec<(String, String)> = Vec::new();
        for (key, value) in attrs {
            let key = key.to_ascii_lowercase();
            if !kept.iter().any(|(k, _)| *k == key) {
                kept.push((key, value));
            }
        }
        Self {
            name: name.to_string(),
            attrs: kept,
            dirty_value: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn attrs(&self) -> &[(String, String)] {
        &self.attrs
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_ascii_whitespace()
    }

    /// Current value of a form control after user edits, if it was edited.
    pub fn dirty_value(&self) -> Option<&str> {
        self.dirty_value.as_deref()
    }

    fn set_attr(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match self.attrs.iter_mut().find(|(k, _)| *k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attrs.push((name, value.to_string())),
        }
    }

    fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self
            .attrs
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.attrs.remove(index).1)
    }
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    url: Url,
    base_url: Url,
}

impl Document {
    const ROOT: NodeId = NodeId(0);

    /// Parse a complete HTML document fetched from `url`.
    ///
    /// Implied elements (`html`, `head`, `body`, `tbody`) are materialised the
    /// same way a browser would, and the first `<base href>` becomes the base
    /// for URL resolution.
    pub fn parse(html: &str, url: Url) -> Self {
        let parsed = Html::parse_document(html);
        let mut doc = Self::empty(url);

        let root = parsed.tree.root();
        let mut ids = HashMap::new();
        ids.insert(root.id(), Self::ROOT);
        for node in root.descendants().skip(1) {
            let Some(parent) = node.parent().and_then(|p| ids.get(&p.id()).copied()) else {
                continue;
            };
            let data = match node.value() {
                scraper::Node::Doctype(d) => NodeData::Doctype {
                    name: d.name().to_string(),
                    public_id: d.public_id().to_string(),
                    system_id: d.system_id().to_string(),
                },
                scraper::Node::Element(e) => NodeData::Element(ElementData::new(
                    e.name(),
                    e.attrs().map(|(k, v)| (k.to_string(), v.to_string())),
                )),
                scraper::Node::Text(t) => NodeData::Text(str::to_owned(&t.text)),
                scraper::Node::Comment(c) => NodeData::Comment(str::to_owned(&c.comment)),
                _ => continue,
            };
            let id = doc.push(parent, data);
            ids.insert(node.id(), id);
        }

        doc.base_url = doc.resolve_base();
        tracing::trace!(target: "dom", url = %doc.url, nodes = doc.nodes.len(), "dom.parsed");
        doc
    }

    /// `<html><head></head><body></body></html>` at `url`.
    pub fn blank(url: Url) -> Self {
        let mut doc = Self::empty(url);
        let html = doc.push(Self::ROOT, NodeData::Element(ElementData::new("html", [])));
        doc.push(html, NodeData::Element(ElementData::new("head", [])));
        doc.push(html, NodeData::Element(ElementData::new("body", [])));
        doc
    }

    fn empty(url: Url) -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                data: NodeData::Document,
            }],
            base_url: url.clone(),
            url,
        }
    }

    fn push(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            data,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    fn resolve_base(&self) -> Url {
        self.elements_by_tag(Self::ROOT, "base")
            .into_iter()
            .find_map(|base| self.attr(base, "href"))
            .and_then(|href| self.url.join(href.trim()).ok())
            .unwrap_or_else(|| self.url.clone())
    }

    // ==============================
    // Structure
    // ==============================

    /// The document node itself.
    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    /// URL the document was loaded from.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// URL that relative links resolve against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Look up a node id by arena index, if it exists.
    pub fn node_id(&self, index: usize) -> Option<NodeId> {
        (index < self.nodes.len()).then_some(NodeId(index))
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id.0].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes[id.0].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(ElementData::name)
    }

    /// ASCII case-insensitive tag comparison.
    pub fn is_tag(&self, id: NodeId, tag: &str) -> bool {
        self.tag_name(id).is_some_and(|name| name.eq_ignore_ascii_case(tag))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|&p| self.is_element(p))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
    }

    /// Ancestors from the parent up to the document node.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    /// All nodes below `id` in document order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    pub fn descendant_elements(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&n| self.is_element(n))
            .collect()
    }

    /// Element siblings of `id`, including `id`, in document order.
    pub fn element_siblings(&self, id: NodeId) -> Vec<NodeId> {
        match self.parent(id) {
            Some(parent) => self.child_elements(parent).collect(),
            None => vec![id],
        }
    }

    /// Zero-based position of `id` among its element siblings.
    pub fn element_index(&self, id: NodeId) -> usize {
        self.element_siblings(id)
            .iter()
            .position(|&s| s == id)
            .unwrap_or(0)
    }

    /// Pre-order position of every node, indexed by arena index.
    /// Detached nodes get `usize::MAX`.
    pub fn document_order(&self) -> Vec<usize> {
        let mut order = vec![usize::MAX; self.nodes.len()];
        order[Self::ROOT.0] = 0;
        for (pos, id) in self.descendants(Self::ROOT).into_iter().enumerate() {
            order[id.0] = pos + 1;
        }
        order
    }

    /// Nearest inclusive ancestor with the given tag name.
    pub fn closest(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|&n| self.is_tag(n, tag))
    }

    pub fn element_by_id(&self, value: &str) -> Option<NodeId> {
        self.descendants(Self::ROOT)
            .into_iter()
            .find(|&n| self.attr(n, "id") == Some(value))
    }

    /// Descendant elements of `scope` with the given tag, in document order.
    pub fn elements_by_tag(&self, scope: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|&n| self.is_tag(n, tag))
            .collect()
    }

    pub fn html_element(&self) -> Option<NodeId> {
        self.child_elements(Self::ROOT).next()
    }

    pub fn head(&self) -> Option<NodeId> {
        let html = self.html_element()?;
        self.child_elements(html).find(|&c| self.is_tag(c, "head"))
    }

    pub fn body(&self) -> Option<NodeId> {
        let html = self.html_element()?;
        self.child_elements(html)
            .find(|&c| self.is_tag(c, "body") || self.is_tag(c, "frameset"))
    }

    /// Text of the first `title` element, whitespace-normalized.
    pub fn title(&self) -> String {
        self.elements_by_tag(Self::ROOT, "title")
            .first()
            .map(|&t| self.text(t))
            .unwrap_or_default()
    }

    // ==============================
    // Attributes and values
    // ==============================

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|el| el.attr(name))
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn has_class(&self, id: NodeId, class: &str, ignore_case: bool) -> bool {
        self.element(id).is_some_and(|el| {
            el.classes().any(|c| {
                if ignore_case {
                    c.eq_ignore_ascii_case(class)
                } else {
                    c == class
                }
            })
        })
    }

    /// Resolve `href` against the document's base URL.
    pub fn resolve_url(&self, href: &str) -> Option<Url> {
        self.base_url.join(href.trim()).ok()
    }

    /// Attribute value resolved to an absolute URL; empty when missing or unresolvable.
    pub fn abs_url(&self, id: NodeId, attr: &str) -> String {
        self.attr(id, attr)
            .and_then(|href| self.resolve_url(href))
            .map(String::from)
            .unwrap_or_default()
    }

    /// Form value: the edited value if any, else what the markup says.
    pub fn val(&self, id: NodeId) -> String {
        let Some(el) = self.element(id) else {
            return String::new();
        };
        if let Some(value) = el.dirty_value() {
            return value.to_string();
        }
        match el.name() {
            "textarea" => self.whole_text(id),
            "option" => el
                .attr("value")
                .map(str::to_string)
                .unwrap_or_else(|| self.text(id)),
            _ => el.attr("value").unwrap_or_default().to_string(),
        }
    }

    // ==============================
    // Mutation
    // ==============================

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(el) = self.element_mut(id) {
            el.set_attr(name, value);
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        self.element_mut(id).and_then(|el| el.remove_attr(name))
    }

    /// Set (or with `None`, reset) the edited value of a form control.
    pub fn set_dirty_value(&mut self, id: NodeId, value: Option<String>) {
        if let Some(el) = self.element_mut(id) {
            el.dirty_value = value;
        }
    }

    /// Replace all children of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        let old = std::mem::take(&mut self.nodes[id.0].children);
        for child in old {
            self.nodes[child.0].parent = None;
        }
        if !text.is_empty() {
            self.push(id, NodeData::Text(text.to_string()));
        }
    }

    /// Append `text` to the last text child of `id`, or add a new text node.
    pub fn append_text(&mut self, id: NodeId, text: &str) {
        if let Some(&last) = self.nodes[id.0].children.last() {
            if let NodeData::Text(existing) = &mut self.nodes[last.0].data {
                existing.push_str(text);
                return;
            }
        }
        self.push(id, NodeData::Text(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(html: &str) -> Document {
        Document::parse(html, Url::parse("http://localhost/dir/page.html").unwrap())
    }

    #[test]
    fn parse_materialises_implied_elements() {
        let d = doc("<title> Hello \n world </title><p>one<td>cell");
        let html = d.html_element().unwrap();
        assert_eq!(d.tag_name(html), Some("html"));
        assert!(d.head().is_some());
        assert!(d.body().is_some());
        assert_eq!(d.title(), "Hello world");
    }

    #[test]
    fn base_href_changes_url_resolution() {
        let d = doc(r#"<head><base href="/other/"></head><a id=a href="next.html">n</a><img id=i>"#);
        assert_eq!(d.base_url().as_str(), "http://localhost/other/");
        let a = d.element_by_id("a").unwrap();
        assert_eq!(d.abs_url(a, "href"), "http://localhost/other/next.html");
        let img = d.element_by_id("i").unwrap();
        assert_eq!(d.abs_url(img, "src"), "");
    }

    #[test]
    fn attributes_are_case_insensitive_and_mutable() {
        let mut d = doc(r#"<input id=x VALUE="Cheese" Disabled>"#);
        let x = d.element_by_id("x").unwrap();
        assert_eq!(d.attr(x, "value"), Some("Cheese"));
        assert!(d.has_attr(x, "DISABLED"));

        d.set_attr(x, "Value", "Brie");
        assert_eq!(d.attr(x, "value"), Some("Brie"));
        assert_eq!(d.remove_attr(x, "disabled"), Some(String::new()));
        assert!(!d.has_attr(x, "disabled"));
    }

    #[test]
    fn dirty_value_shadows_the_value_attribute() {
        let mut d = doc(r#"<input id=x value=orig><textarea id=t>body</textarea>"#);
        let x = d.element_by_id("x").unwrap();
        let t = d.element_by_id("t").unwrap();
        assert_eq!(d.val(x), "orig");
        assert_eq!(d.val(t), "body");

        d.set_dirty_value(x, Some("typed".into()));
        d.set_dirty_value(t, Some(String::new()));
        assert_eq!(d.val(x), "typed");
        assert_eq!(d.val(t), "");
        assert_eq!(d.attr(x, "value"), Some("orig"));
    }

    #[test]
    fn option_value_falls_back_to_text() {
        let d = doc(r#"<select><option id=a value=one>One</option><option id=b> Two </option></select>"#);
        assert_eq!(d.val(d.element_by_id("a").unwrap()), "one");
        assert_eq!(d.val(d.element_by_id("b").unwrap()), "Two");
    }

    #[test]
    fn set_and_append_text() {
        let mut d = doc(r#"<div id=d>old <b>bold</b></div>"#);
        let div = d.element_by_id("d").unwrap();
        d.set_text(div, "new");
        assert_eq!(d.whole_text(div), "new");
        d.append_text(div, " text");
        assert_eq!(d.children(div).len(), 1);
        assert_eq!(d.whole_text(div), "new text");
        d.set_text(div, "");
        assert!(d.children(div).is_empty());
    }

    #[test]
    fn closest_and_sibling_helpers() {
        let d = doc(r#"<form id=f><div><span id=s></span><em id=e></em></div></form>"#);
        let s = d.element_by_id("s").unwrap();
        let e = d.element_by_id("e").unwrap();
        assert_eq!(d.closest(s, "form"), d.element_by_id("f"));
        assert_eq!(d.closest(s, "span"), Some(s));
        assert_eq!(d.element_index(e), 1);
        assert!(d.is_ancestor(d.element_by_id("f").unwrap(), e));

        let order = d.document_order();
        assert!(order[s.index()] < order[e.index()]);
    }

    #[test]
    fn blank_document_has_head_and_body() {
        let d = Document::blank(Url::parse("about:blank").unwrap());
        assert!(d.head().is_some());
        assert!(d.body().is_some());
        assert_eq!(d.title(), "");
        assert_eq!(d.url().as_str(), "about:blank");
    }
}
