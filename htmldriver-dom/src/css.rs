//! CSS selector engine over the document arena.
//!
//! Covers selector groups, the four combinators, attribute operators with the
//! `i` flag, structural pseudo-classes, and the text-matching pseudo-classes
//! (`:contains`, `:containsOwn`, `:matches`, `:matchesOwn`).
//! Matching runs right to left from each candidate element.
//!
//! ```
//! use htmldriver_dom::{Document, css::Selector};
//! use url::Url;
//!
//! let doc = Document::parse(
//!     "<ul><li class=a>one</li><li>two</li></ul>",
//!     Url::parse("http://localhost/").unwrap(),
//! );
//! let sel = Selector::parse("ul > li:nth-child(2)").unwrap();
//! let found = sel.select(&doc, doc.root());
//! assert_eq!(doc.text(found[0]), "two");
//! ```

use regex::Regex;

use crate::document::{Document, NodeData, NodeId};
use crate::error::SelectorError;

const FORM_CONTROL_TAGS: &[&str] = &[
    "button", "input", "select", "textarea", "optgroup", "option", "fieldset",
];

#[derive(Debug, Clone)]
pub struct Selector {
    source: String,
    groups: Vec<Complex>,
}

#[derive(Debug, Clone)]
struct Complex {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    NextSibling,
    SubsequentSibling,
}

#[derive(Debug, Clone)]
struct Compound {
    parts: Vec<Simple>,
}

#[derive(Debug, Clone)]
enum Simple {
    Universal,
    Tag(String),
    Id(String),
    Class(String),
    Attr(AttrSelector),
    AttrNamePrefix(String),
    Pseudo(Pseudo),
}

#[derive(Debug, Clone)]
struct AttrSelector {
    name: String,
    op: AttrOp,
    value: String,
    ignore_case: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
    NotEqual,
}

#[derive(Debug, Clone)]
enum Pseudo {
    Root,
    Empty,
    FirstChild,
    LastChild,
    OnlyChild,
    FirstOfType,
    LastOfType,
    OnlyOfType,
    NthChild(Nth),
    NthLastChild(Nth),
    NthOfType(Nth),
    NthLastOfType(Nth),
    Lt(usize),
    Gt(usize),
    Eq(usize),
    Not(Box<Selector>),
    Is(Box<Selector>),
    Has(Combinator, Box<Selector>),
    Checked,
    Disabled,
    Enabled,
    Selected,
    Contains(String),
    ContainsOwn(String),
    Matches(Regex),
    MatchesOwn(Regex),
}

/// `an+b`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Nth {
    a: i64,
    b: i64,
}

impl Nth {
    fn parse(arg: &str, query: &str) -> Result<Self, SelectorError> {
        let s: String = arg
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        let bad = || SelectorError::parse(query, 0, format!("invalid nth expression {arg:?}"));
        match s.as_str() {
            "odd" => return Ok(Self { a: 2, b: 1 }),
            "even" => return Ok(Self { a: 2, b: 0 }),
            "" => return Err(bad()),
            _ => {}
        }
        match s.find('n') {
            Some(idx) => {
                let a = match &s[..idx] {
                    "" | "+" => 1,
                    "-" => -1,
                    other => other.parse().map_err(|_| bad())?,
                };
                let rest = &s[idx + 1..];
                let b = if rest.is_empty() {
                    0
                } else {
                    rest.parse().map_err(|_| bad())?
                };
                Ok(Self { a, b })
            }
            None => Ok(Self {
                a: 0,
                b: s.parse().map_err(|_| bad())?,
            }),
        }
    }

    /// `index` is one-based. Widened so any parsed `a` and `b` stay exact.
    fn matches(self, index: i64) -> bool {
        let (a, b) = (i128::from(self.a), i128::from(self.b));
        if a == 0 {
            return i128::from(index) == b;
        }
        let diff = i128::from(index) - b;
        diff % a == 0 && diff / a >= 0
    }
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        if source.trim().is_empty() {
            return Err(SelectorError::Empty);
        }
        let mut parser = Parser { src: source, pos: 0 };
        let groups = parser.parse_list()?;
        Ok(Self {
            source: source.to_string(),
            groups,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        doc.is_element(node)
            && self
                .groups
                .iter()
                .any(|c| c.matches_at(doc, node, c.compounds.len() - 1))
    }

    /// Matching descendants of `scope`, in document order. `scope` itself is
    /// never part of the result.
    pub fn select(&self, doc: &Document, scope: NodeId) -> Vec<NodeId> {
        doc.descendants(scope)
            .into_iter()
            .filter(|&n| self.matches(doc, n))
            .collect()
    }

    pub fn select_first(&self, doc: &Document, scope: NodeId) -> Option<NodeId> {
        doc.descendants(scope)
            .into_iter()
            .find(|&n| self.matches(doc, n))
    }
}

/// Parse `query` and select from `scope` in one step.
pub fn select(doc: &Document, scope: NodeId, query: &str) -> Result<Vec<NodeId>, SelectorError> {
    Ok(Selector::parse(query)?.select(doc, scope))
}

impl Complex {
    fn matches_at(&self, doc: &Document, node: NodeId, idx: usize) -> bool {
        if !self.compounds[idx].matches(doc, node) {
            return false;
        }
        if idx == 0 {
            return true;
        }
        match self.combinators[idx - 1] {
            Combinator::Child => doc
                .parent_element(node)
                .is_some_and(|p| self.matches_at(doc, p, idx - 1)),
            Combinator::Descendant => doc
                .ancestors(node)
                .filter(|&a| doc.is_element(a))
                .any(|a| self.matches_at(doc, a, idx - 1)),
            Combinator::NextSibling => preceding_siblings(doc, node)
                .last()
                .is_some_and(|&s| self.matches_at(doc, s, idx - 1)),
            Combinator::SubsequentSibling => preceding_siblings(doc, node)
                .into_iter()
                .any(|s| self.matches_at(doc, s, idx - 1)),
        }
    }
}

impl Compound {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.parts.iter().all(|part| part.matches(doc, node))
    }
}

fn preceding_siblings(doc: &Document, node: NodeId) -> Vec<NodeId> {
    let siblings = doc.element_siblings(node);
    let idx = siblings.iter().position(|&s| s == node).unwrap_or(0);
    siblings[..idx].to_vec()
}

fn following_siblings(doc: &Document, node: NodeId) -> Vec<NodeId> {
    let siblings = doc.element_siblings(node);
    match siblings.iter().position(|&s| s == node) {
        Some(idx) => siblings[idx + 1..].to_vec(),
        None => Vec::new(),
    }
}

fn same_type_siblings(doc: &Document, node: NodeId) -> Vec<NodeId> {
    let tag = doc.tag_name(node).unwrap_or_default();
    doc.element_siblings(node)
        .into_iter()
        .filter(|&s| doc.is_tag(s, tag))
        .collect()
}

/// One-based position of `node` in `list` and the list length.
fn position_in(list: &[NodeId], node: NodeId) -> (i64, i64) {
    let idx = list.iter().position(|&s| s == node).unwrap_or(0);
    (idx as i64 + 1, list.len() as i64)
}

impl Simple {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(el) = doc.element(node) else {
            return false;
        };
        match self {
            Simple::Universal => true,
            Simple::Tag(tag) => el.name().eq_ignore_ascii_case(tag),
            Simple::Id(id) => el.attr("id") == Some(id.as_str()),
            Simple::Class(class) => el.classes().any(|c| c == class),
            Simple::AttrNamePrefix(prefix) => el.attrs().iter().any(|(k, _)| k.starts_with(prefix)),
            Simple::Attr(attr) => attr.matches(el.attr(&attr.name)),
            Simple::Pseudo(pseudo) => pseudo.matches(doc, node),
        }
    }
}

impl AttrSelector {
    fn matches(&self, actual: Option<&str>) -> bool {
        if self.op == AttrOp::Exists {
            return actual.is_some();
        }
        if self.op == AttrOp::NotEqual {
            return actual.is_none_or(|v| !self.fold(v).eq(&self.fold(&self.value)));
        }
        let Some(actual) = actual else {
            return false;
        };
        let actual = self.fold(actual);
        let expected = self.fold(&self.value);
        match self.op {
            AttrOp::Equals => actual == expected,
            AttrOp::Includes => {
                !expected.is_empty() && actual.split_ascii_whitespace().any(|w| w == expected)
            }
            AttrOp::DashMatch => {
                actual == expected || actual.starts_with(&format!("{expected}-"))
            }
            AttrOp::Prefix => !expected.is_empty() && actual.starts_with(&expected),
            AttrOp::Suffix => !expected.is_empty() && actual.ends_with(&expected),
            AttrOp::Substring => !expected.is_empty() && actual.contains(&expected),
            AttrOp::Exists | AttrOp::NotEqual => false,
        }
    }

    fn fold(&self, value: &str) -> String {
        if self.ignore_case {
            value.to_lowercase()
        } else {
            value.to_string()
        }
    }
}

impl Pseudo {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        match self {
            Pseudo::Root => doc.parent(node) == Some(doc.root()),
            Pseudo::Empty => doc.children(node).iter().all(|&c| match doc.data(c) {
                NodeData::Comment(_) => true,
                NodeData::Text(t) => t.trim().is_empty(),
                _ => false,
            }),
            Pseudo::FirstChild => position_in(&doc.element_siblings(node), node).0 == 1,
            Pseudo::LastChild => {
                let (pos, len) = position_in(&doc.element_siblings(node), node);
                pos == len
            }
            Pseudo::OnlyChild => doc.element_siblings(node).len() == 1,
            Pseudo::FirstOfType => position_in(&same_type_siblings(doc, node), node).0 == 1,
            Pseudo::LastOfType => {
                let (pos, len) = position_in(&same_type_siblings(doc, node), node);
                pos == len
            }
            Pseudo::OnlyOfType => same_type_siblings(doc, node).len() == 1,
            Pseudo::NthChild(nth) => nth.matches(position_in(&doc.element_siblings(node), node).0),
            Pseudo::NthLastChild(nth) => {
                let (pos, len) = position_in(&doc.element_siblings(node), node);
                nth.matches(len - pos + 1)
            }
            Pseudo::NthOfType(nth) => nth.matches(position_in(&same_type_siblings(doc, node), node).0),
            Pseudo::NthLastOfType(nth) => {
                let (pos, len) = position_in(&same_type_siblings(doc, node), node);
                nth.matches(len - pos + 1)
            }
            Pseudo::Lt(n) => doc.element_index(node) < *n,
            Pseudo::Gt(n) => doc.element_index(node) > *n,
            Pseudo::Eq(n) => doc.element_index(node) == *n,
            Pseudo::Not(sel) => !sel.matches(doc, node),
            Pseudo::Is(sel) => sel.matches(doc, node),
            Pseudo::Has(combinator, sel) => {
                let candidates = match combinator {
                    Combinator::Descendant => doc.descendant_elements(node),
                    Combinator::Child => doc.child_elements(node).collect(),
                    Combinator::NextSibling => {
                        following_siblings(doc, node).into_iter().take(1).collect()
                    }
                    Combinator::SubsequentSibling => following_siblings(doc, node),
                };
                candidates.into_iter().any(|c| sel.matches(doc, c))
            }
            Pseudo::Checked => {
                let checkable = doc.is_tag(node, "input")
                    && doc.attr(node, "type").is_some_and(|t| {
                        t.eq_ignore_ascii_case("checkbox") || t.eq_ignore_ascii_case("radio")
                    });
                (checkable && doc.has_attr(node, "checked"))
                    || (doc.is_tag(node, "option") && doc.has_attr(node, "selected"))
            }
            Pseudo::Disabled => is_form_control(doc, node) && doc.has_attr(node, "disabled"),
            Pseudo::Enabled => is_form_control(doc, node) && !doc.has_attr(node, "disabled"),
            Pseudo::Selected => doc.is_tag(node, "option") && doc.has_attr(node, "selected"),
            Pseudo::Contains(needle) => doc.text(node).to_lowercase().contains(needle),
            Pseudo::ContainsOwn(needle) => doc.own_text(node).to_lowercase().contains(needle),
            Pseudo::Matches(re) => re.is_match(&doc.text(node)),
            Pseudo::MatchesOwn(re) => re.is_match(&doc.own_text(node)),
        }
    }
}

fn is_form_control(doc: &Document, node: NodeId) -> bool {
    doc.tag_name(node)
        .is_some_and(|tag| FORM_CONTROL_TAGS.iter().any(|t| tag.eq_ignore_ascii_case(t)))
}

// ==============================
// Parser
// ==============================

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || c == '\\' || !c.is_ascii()
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        self.pos > start
    }

    fn err(&self, message: impl Into<String>) -> SelectorError {
        SelectorError::parse(self.src, self.pos, message)
    }

    fn ident(&mut self) -> Result<String, SelectorError> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !is_ident_char(c) {
                break;
            }
            self.bump();
            if c == '\\' {
                match self.bump() {
                    Some(escaped) => out.push(escaped),
                    None => return Err(self.err("dangling escape")),
                }
            } else {
                out.push(c);
            }
        }
        if out.is_empty() {
            return Err(self.err("expected identifier"));
        }
        Ok(out)
    }

    fn parse_list(&mut self) -> Result<Vec<Complex>, SelectorError> {
        let mut groups = Vec::new();
        loop {
            self.skip_ws();
            groups.push(self.parse_complex()?);
            self.skip_ws();
            match self.peek() {
                None => return Ok(groups),
                Some(',') => {
                    self.bump();
                }
                Some(c) => return Err(self.err(format!("unexpected {c:?}"))),
            }
        }
    }

    fn parse_complex(&mut self) -> Result<Complex, SelectorError> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => Combinator::Child,
                Some('+') => Combinator::NextSibling,
                Some('~') => Combinator::SubsequentSibling,
                Some(_) if had_ws => Combinator::Descendant,
                Some(c) => return Err(self.err(format!("unexpected {c:?}"))),
            };
            if combinator != Combinator::Descendant {
                self.bump();
                self.skip_ws();
            }
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }
        Ok(Complex {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let mut parts = Vec::new();
        match self.peek() {
            Some('*') => {
                self.bump();
                parts.push(Simple::Universal);
            }
            Some(c) if is_ident_char(c) => {
                parts.push(Simple::Tag(self.ident()?.to_ascii_lowercase()));
            }
            _ => {}
        }
        loop {
            let part = match self.peek() {
                Some('#') => {
                    self.bump();
                    Simple::Id(self.ident()?)
                }
                Some('.') => {
                    self.bump();
                    Simple::Class(self.ident()?)
                }
                Some('[') => {
                    self.bump();
                    self.parse_attr()?
                }
                Some(':') => {
                    self.bump();
                    self.parse_pseudo()?
                }
                _ => break,
            };
            parts.push(part);
        }
        if parts.is_empty() {
            return Err(self.err("expected a selector"));
        }
        Ok(Compound { parts })
    }

    fn parse_attr(&mut self) -> Result<Simple, SelectorError> {
        self.skip_ws();
        if self.eat('^') {
            let prefix = self.ident()?.to_ascii_lowercase();
            self.skip_ws();
            if !self.eat(']') {
                return Err(self.err("expected ']'"));
            }
            return Ok(Simple::AttrNamePrefix(prefix));
        }
        let mut name = self.ident()?;
        while self.peek() == Some(':') {
            self.bump();
            name.push(':');
            name.push_str(&self.ident()?);
        }
        let name = name.to_ascii_lowercase();
        self.skip_ws();

        let op = match self.peek() {
            Some(']') => {
                self.bump();
                return Ok(Simple::Attr(AttrSelector {
                    name,
                    op: AttrOp::Exists,
                    value: String::new(),
                    ignore_case: false,
                }));
            }
            Some('=') => AttrOp::Equals,
            Some('~') => AttrOp::Includes,
            Some('|') => AttrOp::DashMatch,
            Some('^') => AttrOp::Prefix,
            Some('$') => AttrOp::Suffix,
            Some('*') => AttrOp::Substring,
            Some('!') => AttrOp::NotEqual,
            Some(c) => return Err(self.err(format!("unexpected {c:?} in attribute selector"))),
            None => return Err(self.err("unbalanced '['")),
        };
        self.bump();
        if op != AttrOp::Equals && !self.eat('=') {
            return Err(self.err("expected '='"));
        }
        self.skip_ws();

        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.bump();
                self.quoted(q)?
            }
            _ => {
                let start = self.pos;
                while self
                    .peek()
                    .is_some_and(|c| c != ']' && !c.is_whitespace())
                {
                    self.bump();
                }
                if self.pos == start {
                    return Err(self.err("expected attribute value"));
                }
                self.src[start..self.pos].to_string()
            }
        };
        self.skip_ws();
        let mut ignore_case = false;
        match self.peek() {
            Some('i' | 'I') => {
                self.bump();
                ignore_case = true;
            }
            Some('s' | 'S') => {
                self.bump();
            }
            _ => {}
        }
        self.skip_ws();
        if !self.eat(']') {
            return Err(self.err("unbalanced '['"));
        }
        Ok(Simple::Attr(AttrSelector {
            name,
            op,
            value,
            ignore_case,
        }))
    }

    fn quoted(&mut self, quote: char) -> Result<String, SelectorError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.err("unterminated string")),
                Some('\\') => {
                    if let Some(c) = self.bump() {
                        out.push(c);
                    }
                }
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
            }
        }
    }

    /// Raw text up to the `)` closing an already consumed `(`.
    fn balanced(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        let mut depth = 1usize;
        let mut quote: Option<char> = None;
        while let Some(c) = self.bump() {
            match quote {
                Some(q) => {
                    if c == '\\' {
                        self.bump();
                    } else if c == q {
                        quote = None;
                    }
                }
                None => match c {
                    '"' | '\'' => quote = Some(c),
                    '\\' => {
                        self.bump();
                    }
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(self.src[start..self.pos - 1].to_string());
                        }
                    }
                    _ => {}
                },
            }
        }
        Err(self.err("unbalanced '('"))
    }

    fn parse_pseudo(&mut self) -> Result<Simple, SelectorError> {
        if self.peek() == Some(':') {
            return Err(self.err("pseudo-elements are not supported"));
        }
        let name = self.ident()?;
        let lname = name.to_ascii_lowercase();
        let arg = if self.eat('(') {
            Some(self.balanced()?)
        } else {
            None
        };

        let pseudo = match (lname.as_str(), arg) {
            ("root", None) => Pseudo::Root,
            ("empty", None) => Pseudo::Empty,
            ("first-child", None) => Pseudo::FirstChild,
            ("last-child", None) => Pseudo::LastChild,
            ("only-child", None) => Pseudo::OnlyChild,
            ("first-of-type", None) => Pseudo::FirstOfType,
            ("last-of-type", None) => Pseudo::LastOfType,
            ("only-of-type", None) => Pseudo::OnlyOfType,
            ("checked", None) => Pseudo::Checked,
            ("disabled", None) => Pseudo::Disabled,
            ("enabled", None) => Pseudo::Enabled,
            ("selected", None) => Pseudo::Selected,
            ("nth-child", Some(a)) => Pseudo::NthChild(Nth::parse(&a, self.src)?),
            ("nth-last-child", Some(a)) => Pseudo::NthLastChild(Nth::parse(&a, self.src)?),
            ("nth-of-type", Some(a)) => Pseudo::NthOfType(Nth::parse(&a, self.src)?),
            ("nth-last-of-type", Some(a)) => Pseudo::NthLastOfType(Nth::parse(&a, self.src)?),
            ("lt", Some(a)) => Pseudo::Lt(self.index_arg(&a)?),
            ("gt", Some(a)) => Pseudo::Gt(self.index_arg(&a)?),
            ("eq", Some(a)) => Pseudo::Eq(self.index_arg(&a)?),
            ("not", Some(a)) => Pseudo::Not(Box::new(Selector::parse(&a)?)),
            ("is", Some(a)) => Pseudo::Is(Box::new(Selector::parse(&a)?)),
            ("has", Some(a)) => {
                let trimmed = a.trim_start();
                let (combinator, rest) = match trimmed.chars().next() {
                    Some('>') => (Combinator::Child, &trimmed[1..]),
                    Some('+') => (Combinator::NextSibling, &trimmed[1..]),
                    Some('~') => (Combinator::SubsequentSibling, &trimmed[1..]),
                    _ => (Combinator::Descendant, trimmed),
                };
                Pseudo::Has(combinator, Box::new(Selector::parse(rest)?))
            }
            ("contains", Some(a)) => Pseudo::Contains(unquote(&a).to_lowercase()),
            ("containsown", Some(a)) => Pseudo::ContainsOwn(unquote(&a).to_lowercase()),
            ("matches", Some(a)) => Pseudo::Matches(compile_regex(unquote(&a))?),
            ("matchesown", Some(a)) => Pseudo::MatchesOwn(compile_regex(unquote(&a))?),
            (
                "root" | "empty" | "first-child" | "last-child" | "only-child" | "first-of-type"
                | "last-of-type" | "only-of-type" | "checked" | "disabled" | "enabled"
                | "selected",
                Some(_),
            ) => return Err(self.err(format!(":{name} takes no argument"))),
            (
                "nth-child" | "nth-last-child" | "nth-of-type" | "nth-last-of-type" | "lt" | "gt"
                | "eq" | "not" | "is" | "has" | "contains" | "containsown" | "matches"
                | "matchesown",
                None,
            ) => return Err(self.err(format!(":{name} requires an argument"))),
            _ => return Err(SelectorError::UnknownPseudo(name)),
        };
        Ok(Simple::Pseudo(pseudo))
    }

    fn index_arg(&self, arg: &str) -> Result<usize, SelectorError> {
        arg.trim()
            .parse()
            .map_err(|_| self.err(format!("expected an index, got {arg:?}")))
    }
}

fn unquote(arg: &str) -> &str {
    let t = arg.trim();
    let quoted = t.len() >= 2
        && ((t.starts_with('"') && t.ends_with('"')) || (t.starts_with('\'') && t.ends_with('\'')));
    if quoted { &t[1..t.len() - 1] } else { t }
}

fn compile_regex(pattern: &str) -> Result<Regex, SelectorError> {
    Regex::new(pattern).map_err(|e| SelectorError::Regex {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    const PAGE: &str = r#"
        <div id="main" class="Box wide" lang="en-GB">
          <h1 title="Greeting">Hello</h1>
          <p class="intro">First <b>bold</b> para</p>
          <p>Second para</p>
          <ul>
            <li>one</li><li class="x">two</li><li>three</li><li>four</li>
          </ul>
          <form>
            <input id="c1" type="checkbox" checked>
            <input id="c2" type="checkbox">
            <input id="t" type="text" disabled data-role="name" data-size="10">
            <select><option id="o1">a</option><option id="o2" selected>b</option></select>
          </form>
          <span id="empty"> <!-- nothing --> </span>
        </div>"#;

    fn doc() -> Document {
        Document::parse(PAGE, Url::parse("http://localhost/").unwrap())
    }

    fn ids(doc: &Document, query: &str) -> Vec<String> {
        select(doc, doc.root(), query)
            .unwrap()
            .into_iter()
            .map(|n| {
                doc.attr(n, "id")
                    .map(str::to_string)
                    .unwrap_or_else(|| doc.text(n))
            })
            .collect()
    }

    #[test]
    fn combinators_and_groups() {
        let d = doc();
        assert_eq!(ids(&d, "ul > li.x + li"), vec!["three"]);
        assert_eq!(ids(&d, "li.x ~ li"), vec!["three", "four"]);
        assert_eq!(ids(&d, "div p b"), vec!["bold"]);
        assert_eq!(ids(&d, "h1, #empty"), vec!["Hello", "empty"]);
    }

    #[test]
    fn attribute_operators() {
        let d = doc();
        assert_eq!(ids(&d, "[data-role=name]"), vec!["t"]);
        assert_eq!(ids(&d, "h1[title^=Gree]"), vec!["Hello"]);
        assert_eq!(ids(&d, "h1[title=greeting]"), Vec::<String>::new());
        assert_eq!(ids(&d, "h1[title=greeting i]"), vec!["Hello"]);
        assert_eq!(ids(&d, "div[class~=wide]").len(), 1);
        assert_eq!(ids(&d, "div[lang|=en]").len(), 1);
        assert_eq!(ids(&d, "input[^data-]"), vec!["t"]);
        assert_eq!(ids(&d, "input[type!=checkbox]"), vec!["t"]);
    }

    #[test]
    fn class_matching_is_case_sensitive() {
        let d = doc();
        assert_eq!(ids(&d, ".Box").len(), 1);
        assert!(ids(&d, ".box").is_empty());
    }

    #[test]
    fn nth_with_extreme_coefficients() {
        let d = doc();
        assert!(ids(&d, "li:nth-child(-1n-9223372036854775808)").is_empty());
        assert!(ids(&d, "li:nth-last-of-type(-9223372036854775808)").is_empty());
        assert_eq!(ids(&d, "li:nth-child(n-9223372036854775808)").len(), 4);
        assert_eq!(ids(&d, "li:nth-child(9223372036854775807n+2)"), vec!["two"]);
    }

    #[test]
    fn structural_pseudo_classes() {
        let d = doc();
        assert_eq!(ids(&d, "li:first-child"), vec!["one"]);
        assert_eq!(ids(&d, "li:last-child"), vec!["four"]);
        assert_eq!(ids(&d, "li:nth-child(odd)"), vec!["one", "three"]);
        assert_eq!(ids(&d, "li:nth-child(-n+2)"), vec!["one", "two"]);
        assert_eq!(ids(&d, "li:nth-last-child(1)"), vec!["four"]);
        assert_eq!(ids(&d, "p:first-of-type"), vec!["First bold para"]);
        assert_eq!(ids(&d, "li:lt(1)"), vec!["one"]);
        assert_eq!(ids(&d, "li:eq(3)"), vec!["four"]);
        assert_eq!(ids(&d, "span:empty"), vec!["empty"]);
        assert_eq!(ids(&d, "li:not(.x)").len(), 3);
        assert_eq!(ids(&d, "p:has(b)"), vec!["First bold para"]);
        assert_eq!(ids(&d, "div:has(> ul)").len(), 1);
        assert_eq!(ids(&d, "html:root").len(), 1);
    }

    #[test]
    fn state_and_text_pseudo_classes() {
        let d = doc();
        assert_eq!(ids(&d, "input:checked"), vec!["c1"]);
        assert_eq!(ids(&d, "option:checked"), vec!["o2"]);
        assert_eq!(ids(&d, ":disabled"), vec!["t"]);
        assert_eq!(ids(&d, "input:enabled"), vec!["c1", "c2"]);
        assert_eq!(ids(&d, "option:selected"), vec!["o2"]);
        assert_eq!(ids(&d, "p:contains(SECOND)"), vec!["Second para"]);
        assert_eq!(ids(&d, "p:containsOwn(bold)"), Vec::<String>::new());
        assert_eq!(ids(&d, r"li:matches(^t\w+)"), vec!["two", "three"]);
    }

    #[test]
    fn selection_excludes_the_scope() {
        let d = doc();
        let main = d.element_by_id("main").unwrap();
        let found = Selector::parse("div").unwrap().select(&d, main);
        assert!(found.is_empty());
    }

    #[test]
    fn malformed_selectors_are_rejected() {
        assert_eq!(Selector::parse("  ").unwrap_err(), SelectorError::Empty);
        assert!(matches!(
            Selector::parse("li:bogus"),
            Err(SelectorError::UnknownPseudo(name)) if name == "bogus"
        ));
        assert!(matches!(Selector::parse("a[href"), Err(SelectorError::Parse { .. })));
        assert!(matches!(Selector::parse("li:not(.x"), Err(SelectorError::Parse { .. })));
        assert!(matches!(Selector::parse("p:matches([)"), Err(SelectorError::Regex { .. })));
        assert!(matches!(Selector::parse("a >"), Err(SelectorError::Parse { .. })));
        assert!(matches!(Selector::parse("li:nth-child(x)"), Err(SelectorError::Parse { .. })));
    }
}
