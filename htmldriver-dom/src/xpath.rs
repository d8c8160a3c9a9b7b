//! XPath 1.0 evaluation over the document arena.
//!
//! The whole expression language is parsed (paths, all thirteen axes minus
//! `namespace`, predicates, unions, comparisons, arithmetic and the core
//! function library plus `ends-with`). Name tests compare ASCII
//! case-insensitively since HTML element names are case-insensitive.
//! Results handed back to callers must be elements.

use std::collections::HashSet;

use crate::document::{Document, NodeData, NodeId};
use crate::error::SelectorError;

/// A parsed XPath expression.
///
/// ```
/// use htmldriver_dom::{Document, xpath::XPath};
/// use url::Url;
///
/// let doc = Document::parse(
///     "<table><tr><td>a</td><td>b</td></tr></table>",
///     Url::parse("http://localhost/").unwrap(),
/// );
/// let cells = XPath::parse("//td[last()]").unwrap().evaluate(&doc, doc.root()).unwrap();
/// assert_eq!(doc.text(cells[0]), "b");
/// ```
#[derive(Debug, Clone)]
pub struct XPath {
    source: String,
    expr: Expr,
}

impl XPath {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        if source.trim().is_empty() {
            return Err(SelectorError::Empty);
        }
        let toks = tokenize(source)?;
        let mut parser = Parser {
            src: source,
            toks,
            pos: 0,
        };
        let expr = parser.parse_expr()?;
        if let Some((tok, offset)) = parser.toks.get(parser.pos) {
            return Err(SelectorError::parse(
                source,
                *offset,
                format!("unexpected token {tok:?}"),
            ));
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate with `context` as the context node; the result must be a set
    /// of elements, returned in document order.
    pub fn evaluate(&self, doc: &Document, context: NodeId) -> Result<Vec<NodeId>, SelectorError> {
        let eval = Eval::new(doc);
        let ctx = Ctx {
            node: XNode::Node(context),
            position: 1,
            size: 1,
        };
        let not_elements = |found| SelectorError::NotElements {
            query: self.source.clone(),
            found,
        };
        match eval.eval(&self.expr, &ctx)? {
            Value::Nodes(nodes) => nodes
                .into_iter()
                .map(|n| match n {
                    XNode::Node(id) if doc.is_element(id) => Ok(id),
                    XNode::Node(id) => Err(not_elements(match doc.data(id) {
                        NodeData::Text(_) => "text nodes",
                        NodeData::Comment(_) => "comments",
                        _ => "the document node",
                    })),
                    XNode::Attr(..) => Err(not_elements("attributes")),
                })
                .collect(),
            Value::Str(_) => Err(not_elements("a string")),
            Value::Num(_) => Err(not_elements("a number")),
            Value::Bool(_) => Err(not_elements("a boolean")),
        }
    }
}

// ==============================
// Syntax tree
// ==============================

#[derive(Debug, Clone)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Path(PathStart, Vec<Step>),
    Filter(Box<Expr>, Vec<Expr>),
    Literal(String),
    Number(f64),
    Call(Function, Vec<Expr>),
}

#[derive(Debug, Clone)]
enum PathStart {
    Root,
    Context,
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    SelfAxis,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    Attribute,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "self" => Axis::SelfAxis,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            "following" => Axis::Following,
            "preceding" => Axis::Preceding,
            "attribute" => Axis::Attribute,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeTest {
    Name(String),
    AnyName,
    Text,
    Comment,
    Node,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Last,
    Position,
    Count,
    LocalName,
    Name,
    String,
    Concat,
    StartsWith,
    EndsWith,
    Contains,
    SubstringBefore,
    SubstringAfter,
    Substring,
    StringLength,
    NormalizeSpace,
    Translate,
    Boolean,
    Not,
    True,
    False,
    Number,
    Sum,
    Floor,
    Ceiling,
    Round,
}

impl Function {
    /// Function and its (min, max) arity.
    fn lookup(name: &str) -> Option<(Self, usize, usize)> {
        use Function::*;
        Some(match name {
            "last" => (Last, 0, 0),
            "position" => (Position, 0, 0),
            "count" => (Count, 1, 1),
            "local-name" => (LocalName, 0, 1),
            "name" => (Name, 0, 1),
            "string" => (String, 0, 1),
            "concat" => (Concat, 2, usize::MAX),
            "starts-with" => (StartsWith, 2, 2),
            "ends-with" => (EndsWith, 2, 2),
            "contains" => (Contains, 2, 2),
            "substring-before" => (SubstringBefore, 2, 2),
            "substring-after" => (SubstringAfter, 2, 2),
            "substring" => (Substring, 2, 3),
            "string-length" => (StringLength, 0, 1),
            "normalize-space" => (NormalizeSpace, 0, 1),
            "translate" => (Translate, 3, 3),
            "boolean" => (Boolean, 1, 1),
            "not" => (Not, 1, 1),
            "true" => (True, 0, 0),
            "false" => (False, 0, 0),
            "number" => (Number, 0, 1),
            "sum" => (Sum, 1, 1),
            "floor" => (Floor, 1, 1),
            "ceiling" => (Ceiling, 1, 1),
            "round" => (Round, 1, 1),
            _ => return None,
        })
    }
}

// ==============================
// Tokenizer
// ==============================

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Slash,
    DoubleSlash,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    DotDot,
    At,
    Comma,
    Pipe,
    ColonColon,
    Star,
    Mul,
    Plus,
    Minus,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Div,
    Mod,
    Name(String),
    Literal(String),
    Number(f64),
}

/// Whether the previous token puts the lexer in operator position, where `*`
/// multiplies and `and`/`or`/`div`/`mod` are operators.
fn operator_position(prev: Option<&Tok>) -> bool {
    match prev {
        None => false,
        Some(t) => !matches!(
            t,
            Tok::At
                | Tok::ColonColon
                | Tok::LParen
                | Tok::LBracket
                | Tok::Comma
                | Tok::And
                | Tok::Or
                | Tok::Mod
                | Tok::Div
                | Tok::Mul
                | Tok::Slash
                | Tok::DoubleSlash
                | Tok::Pipe
                | Tok::Plus
                | Tok::Minus
                | Tok::Eq
                | Tok::Ne
                | Tok::Lt
                | Tok::Le
                | Tok::Gt
                | Tok::Ge
        ),
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '.')
}

fn tokenize(src: &str) -> Result<Vec<(Tok, usize)>, SelectorError> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut toks: Vec<(Tok, usize)> = Vec::new();
    let mut i = 0;
    let at = |i: usize| chars.get(i).map(|&(_, c)| c);

    while i < chars.len() {
        let (offset, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let op_pos = operator_position(toks.last().map(|(t, _)| t));
        let tok = match c {
            '/' if at(i + 1) == Some('/') => {
                i += 2;
                Tok::DoubleSlash
            }
            '/' => {
                i += 1;
                Tok::Slash
            }
            '(' => {
                i += 1;
                Tok::LParen
            }
            ')' => {
                i += 1;
                Tok::RParen
            }
            '[' => {
                i += 1;
                Tok::LBracket
            }
            ']' => {
                i += 1;
                Tok::RBracket
            }
            '@' => {
                i += 1;
                Tok::At
            }
            ',' => {
                i += 1;
                Tok::Comma
            }
            '|' => {
                i += 1;
                Tok::Pipe
            }
            '+' => {
                i += 1;
                Tok::Plus
            }
            '-' => {
                i += 1;
                Tok::Minus
            }
            '=' => {
                i += 1;
                Tok::Eq
            }
            '!' if at(i + 1) == Some('=') => {
                i += 2;
                Tok::Ne
            }
            '<' if at(i + 1) == Some('=') => {
                i += 2;
                Tok::Le
            }
            '<' => {
                i += 1;
                Tok::Lt
            }
            '>' if at(i + 1) == Some('=') => {
                i += 2;
                Tok::Ge
            }
            '>' => {
                i += 1;
                Tok::Gt
            }
            ':' if at(i + 1) == Some(':') => {
                i += 2;
                Tok::ColonColon
            }
            '*' => {
                i += 1;
                if op_pos { Tok::Mul } else { Tok::Star }
            }
            '.' if at(i + 1) == Some('.') => {
                i += 2;
                Tok::DotDot
            }
            '.' if !at(i + 1).is_some_and(|d| d.is_ascii_digit()) => {
                i += 1;
                Tok::Dot
            }
            '"' | '\'' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end].1 != c {
                    end += 1;
                }
                if end >= chars.len() {
                    return Err(SelectorError::parse(src, offset, "unterminated string literal"));
                }
                let text: String = chars[start..end].iter().map(|&(_, ch)| ch).collect();
                i = end + 1;
                Tok::Literal(text)
            }
            d if d.is_ascii_digit() || d == '.' => {
                let start = i;
                while at(i).is_some_and(|ch| ch.is_ascii_digit()) {
                    i += 1;
                }
                if at(i) == Some('.') {
                    i += 1;
                    while at(i).is_some_and(|ch| ch.is_ascii_digit()) {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().map(|&(_, ch)| ch).collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| SelectorError::parse(src, offset, "invalid number"))?;
                Tok::Number(value)
            }
            n if is_name_start(n) => {
                let start = i;
                while at(i).is_some_and(is_name_char) {
                    i += 1;
                }
                // A trailing '.' belongs to the next token only when it starts `..`.
                let name: String = chars[start..i].iter().map(|&(_, ch)| ch).collect();
                if op_pos {
                    match name.as_str() {
                        "and" => Tok::And,
                        "or" => Tok::Or,
                        "div" => Tok::Div,
                        "mod" => Tok::Mod,
                        _ => {
                            return Err(SelectorError::parse(
                                src,
                                offset,
                                format!("expected an operator, found {name:?}"),
                            ));
                        }
                    }
                } else {
                    Tok::Name(name)
                }
            }
            '$' => {
                return Err(SelectorError::parse(src, offset, "variables are not supported"));
            }
            other => {
                return Err(SelectorError::parse(
                    src,
                    offset,
                    format!("unexpected character {other:?}"),
                ));
            }
        };
        toks.push((tok, offset));
    }
    Ok(toks)
}

// ==============================
// Parser
// ==============================

struct Parser<'a> {
    src: &'a str,
    toks: Vec<(Tok, usize)>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Tok> {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> Option<&Tok> {
        self.toks.get(self.pos + n).map(|(t, _)| t)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.toks.get(self.pos).map(|(t, _)| t.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok) -> Result<(), SelectorError> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(self.err(format!("expected {tok:?}")))
        }
    }

    fn err(&self, message: impl Into<String>) -> SelectorError {
        let offset = self
            .toks
            .get(self.pos)
            .map(|(_, o)| *o)
            .unwrap_or(self.src.len());
        SelectorError::parse(self.src, offset, message)
    }

    fn parse_expr(&mut self) -> Result<Expr, SelectorError> {
        let mut left = self.parse_and()?;
        while self.eat(&Tok::Or) {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, SelectorError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Tok::And) {
            let right = self.parse_equality()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, SelectorError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Eq) => CmpOp::Eq,
                Some(Tok::Ne) => CmpOp::Ne,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_relational()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, SelectorError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Lt) => CmpOp::Lt,
                Some(Tok::Le) => CmpOp::Le,
                Some(Tok::Gt) => CmpOp::Gt,
                Some(Tok::Ge) => CmpOp::Ge,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_additive()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, SelectorError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => ArithOp::Add,
                Some(Tok::Minus) => ArithOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = Expr::Arith(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, SelectorError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Mul) => ArithOp::Mul,
                Some(Tok::Div) => ArithOp::Div,
                Some(Tok::Mod) => ArithOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Arith(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, SelectorError> {
        if self.eat(&Tok::Minus) {
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        let mut left = self.parse_path()?;
        while self.eat(&Tok::Pipe) {
            let right = self.parse_path()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_path(&mut self) -> Result<Expr, SelectorError> {
        match self.peek() {
            Some(Tok::Slash) => {
                self.pos += 1;
                let steps = if self.starts_step() {
                    self.parse_relative()?
                } else {
                    Vec::new()
                };
                Ok(Expr::Path(PathStart::Root, steps))
            }
            Some(Tok::DoubleSlash) => {
                self.pos += 1;
                let mut steps = vec![descendant_or_self()];
                steps.extend(self.parse_relative()?);
                Ok(Expr::Path(PathStart::Root, steps))
            }
            Some(Tok::LParen | Tok::Literal(_) | Tok::Number(_)) => self.parse_filter(),
            Some(Tok::Name(name))
                if self.peek_at(1) == Some(&Tok::LParen) && !is_node_type(name) =>
            {
                self.parse_filter()
            }
            _ => Ok(Expr::Path(PathStart::Context, self.parse_relative()?)),
        }
    }

    fn parse_filter(&mut self) -> Result<Expr, SelectorError> {
        let primary = self.parse_primary()?;
        let predicates = self.parse_predicates()?;
        let expr = if predicates.is_empty() {
            primary
        } else {
            Expr::Filter(Box::new(primary), predicates)
        };
        let mut steps = Vec::new();
        loop {
            if self.eat(&Tok::Slash) {
                steps.push(self.parse_step()?);
            } else if self.eat(&Tok::DoubleSlash) {
                steps.push(descendant_or_self());
                steps.push(self.parse_step()?);
            } else {
                break;
            }
        }
        if steps.is_empty() {
            Ok(expr)
        } else {
            Ok(Expr::Path(PathStart::Expr(Box::new(expr)), steps))
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, SelectorError> {
        match self.next() {
            Some(Tok::LParen) => {
                let inner = self.parse_expr()?;
                self.expect(&Tok::RParen)?;
                Ok(inner)
            }
            Some(Tok::Literal(s)) => Ok(Expr::Literal(s)),
            Some(Tok::Number(n)) => Ok(Expr::Number(n)),
            Some(Tok::Name(name)) => {
                let (function, min, max) = Function::lookup(&name)
                    .ok_or_else(|| SelectorError::UnknownFunction(name.clone()))?;
                self.expect(&Tok::LParen)?;
                let mut args = Vec::new();
                if !self.eat(&Tok::RParen) {
                    loop {
                        args.push(self.parse_expr()?);
                        if self.eat(&Tok::RParen) {
                            break;
                        }
                        self.expect(&Tok::Comma)?;
                    }
                }
                if args.len() < min || args.len() > max {
                    return Err(self.err(format!(
                        "{name}() called with {} argument(s)",
                        args.len()
                    )));
                }
                Ok(Expr::Call(function, args))
            }
            _ => Err(self.err("expected an expression")),
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Tok::Dot | Tok::DotDot | Tok::At | Tok::Star | Tok::Name(_))
        )
    }

    fn parse_relative(&mut self) -> Result<Vec<Step>, SelectorError> {
        let mut steps = vec![self.parse_step()?];
        loop {
            if self.eat(&Tok::Slash) {
                steps.push(self.parse_step()?);
            } else if self.eat(&Tok::DoubleSlash) {
                steps.push(descendant_or_self());
                steps.push(self.parse_step()?);
            } else {
                return Ok(steps);
            }
        }
    }

    fn parse_step(&mut self) -> Result<Step, SelectorError> {
        if self.eat(&Tok::Dot) {
            return Ok(Step {
                axis: Axis::SelfAxis,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.eat(&Tok::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }

        let axis = if self.eat(&Tok::At) {
            Axis::Attribute
        } else if let (Some(Tok::Name(name)), Some(Tok::ColonColon)) =
            (self.peek(), self.peek_at(1))
        {
            let axis = Axis::from_name(name)
                .ok_or_else(|| self.err(format!("unknown axis {name:?}")))?;
            self.pos += 2;
            axis
        } else {
            Axis::Child
        };

        let test = match self.next() {
            Some(Tok::Star) => NodeTest::AnyName,
            Some(Tok::Name(name)) => {
                if self.peek() == Some(&Tok::LParen) && is_node_type(&name) {
                    self.pos += 1;
                    self.expect(&Tok::RParen)?;
                    match name.as_str() {
                        "text" => NodeTest::Text,
                        "comment" => NodeTest::Comment,
                        "node" => NodeTest::Node,
                        _ => return Err(self.err(format!("{name}() is not supported"))),
                    }
                } else {
                    NodeTest::Name(name)
                }
            }
            _ => return Err(self.err("expected a node test")),
        };

        Ok(Step {
            axis,
            test,
            predicates: self.parse_predicates()?,
        })
    }

    fn parse_predicates(&mut self) -> Result<Vec<Expr>, SelectorError> {
        let mut predicates = Vec::new();
        while self.eat(&Tok::LBracket) {
            predicates.push(self.parse_expr()?);
            self.expect(&Tok::RBracket)?;
        }
        Ok(predicates)
    }
}

fn is_node_type(name: &str) -> bool {
    matches!(name, "text" | "comment" | "node" | "processing-instruction")
}

fn descendant_or_self() -> Step {
    Step {
        axis: Axis::DescendantOrSelf,
        test: NodeTest::Node,
        predicates: Vec::new(),
    }
}

// ==============================
// Evaluation
// ==============================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum XNode {
    Node(NodeId),
    /// Element and attribute index.
    Attr(NodeId, usize),
}

#[derive(Debug, Clone)]
enum Value {
    Nodes(Vec<XNode>),
    Str(String),
    Num(f64),
    Bool(bool),
}

struct Ctx {
    node: XNode,
    position: usize,
    size: usize,
}

struct Eval<'d> {
    doc: &'d Document,
    order: Vec<usize>,
}

impl<'d> Eval<'d> {
    fn new(doc: &'d Document) -> Self {
        Self {
            doc,
            order: doc.document_order(),
        }
    }

    fn sort_key(&self, node: XNode) -> (usize, usize) {
        match node {
            XNode::Node(id) => (self.order[id.index()], 0),
            XNode::Attr(id, i) => (self.order[id.index()], i + 1),
        }
    }

    fn sort(&self, nodes: &mut Vec<XNode>) {
        nodes.sort_by_key(|&n| self.sort_key(n));
        nodes.dedup();
    }

    fn eval(&self, expr: &Expr, ctx: &Ctx) -> Result<Value, SelectorError> {
        Ok(match expr {
            Expr::Or(a, b) => Value::Bool(
                self.boolean(&self.eval(a, ctx)?) || self.boolean(&self.eval(b, ctx)?),
            ),
            Expr::And(a, b) => Value::Bool(
                self.boolean(&self.eval(a, ctx)?) && self.boolean(&self.eval(b, ctx)?),
            ),
            Expr::Compare(op, a, b) => {
                Value::Bool(self.compare(*op, &self.eval(a, ctx)?, &self.eval(b, ctx)?))
            }
            Expr::Arith(op, a, b) => {
                let x = self.number(&self.eval(a, ctx)?);
                let y = self.number(&self.eval(b, ctx)?);
                Value::Num(match op {
                    ArithOp::Add => x + y,
                    ArithOp::Sub => x - y,
                    ArithOp::Mul => x * y,
                    ArithOp::Div => x / y,
                    ArithOp::Mod => x % y,
                })
            }
            Expr::Neg(a) => Value::Num(-self.number(&self.eval(a, ctx)?)),
            Expr::Union(a, b) => {
                let mut nodes = self.node_set(self.eval(a, ctx)?)?;
                nodes.extend(self.node_set(self.eval(b, ctx)?)?);
                self.sort(&mut nodes);
                Value::Nodes(nodes)
            }
            Expr::Path(start, steps) => {
                let initial = match start {
                    PathStart::Root => vec![XNode::Node(self.doc.root())],
                    PathStart::Context => vec![ctx.node],
                    PathStart::Expr(e) => self.node_set(self.eval(e, ctx)?)?,
                };
                Value::Nodes(self.eval_steps(initial, steps)?)
            }
            Expr::Filter(primary, predicates) => {
                let nodes = self.node_set(self.eval(primary, ctx)?)?;
                Value::Nodes(self.apply_predicates(nodes, predicates)?)
            }
            Expr::Literal(s) => Value::Str(s.clone()),
            Expr::Number(n) => Value::Num(*n),
            Expr::Call(function, args) => self.call(*function, args, ctx)?,
        })
    }

    fn node_set(&self, value: Value) -> Result<Vec<XNode>, SelectorError> {
        match value {
            Value::Nodes(nodes) => Ok(nodes),
            _ => Err(SelectorError::parse(
                "",
                0,
                "expression does not evaluate to a node-set",
            )),
        }
    }

    fn eval_steps(&self, mut nodes: Vec<XNode>, steps: &[Step]) -> Result<Vec<XNode>, SelectorError> {
        for step in steps {
            let mut out = Vec::new();
            let mut seen = HashSet::new();
            for &node in &nodes {
                let candidates: Vec<XNode> = self
                    .axis(node, step.axis)
                    .into_iter()
                    .filter(|&c| self.test(c, step))
                    .collect();
                for c in self.apply_predicates(candidates, &step.predicates)? {
                    if seen.insert(c) {
                        out.push(c);
                    }
                }
            }
            self.sort(&mut out);
            nodes = out;
        }
        Ok(nodes)
    }

    fn apply_predicates(
        &self,
        mut nodes: Vec<XNode>,
        predicates: &[Expr],
    ) -> Result<Vec<XNode>, SelectorError> {
        for predicate in predicates {
            let size = nodes.len();
            let mut kept = Vec::with_capacity(size);
            for (i, &node) in nodes.iter().enumerate() {
                let ctx = Ctx {
                    node,
                    position: i + 1,
                    size,
                };
                let keep = match self.eval(predicate, &ctx)? {
                    Value::Num(n) => n == (i + 1) as f64,
                    other => self.boolean(&other),
                };
                if keep {
                    kept.push(node);
                }
            }
            nodes = kept;
        }
        Ok(nodes)
    }

    fn is_tree_node(&self, id: NodeId) -> bool {
        !matches!(self.doc.data(id), NodeData::Doctype { .. })
    }

    fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.doc
            .children(id)
            .iter()
            .copied()
            .filter(|&c| self.is_tree_node(c))
            .collect()
    }

    fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        self.doc
            .descendants(id)
            .into_iter()
            .filter(|&c| self.is_tree_node(c))
            .collect()
    }

    /// Nodes along `axis`, in axis order (reverse axes nearest first).
    fn axis(&self, node: XNode, axis: Axis) -> Vec<XNode> {
        let doc = self.doc;
        let wrap = |ids: Vec<NodeId>| ids.into_iter().map(XNode::Node).collect::<Vec<_>>();
        let (id, is_attr) = match node {
            XNode::Node(id) => (id, false),
            XNode::Attr(id, _) => (id, true),
        };
        match axis {
            Axis::SelfAxis => vec![node],
            Axis::Child if is_attr => Vec::new(),
            Axis::Child => wrap(self.children(id)),
            Axis::Descendant if is_attr => Vec::new(),
            Axis::Descendant => wrap(self.descendants(id)),
            Axis::DescendantOrSelf if is_attr => vec![node],
            Axis::DescendantOrSelf => {
                let mut out = vec![node];
                out.extend(wrap(self.descendants(id)));
                out
            }
            Axis::Parent if is_attr => vec![XNode::Node(id)],
            Axis::Parent => doc.parent(id).map(XNode::Node).into_iter().collect(),
            Axis::Ancestor | Axis::AncestorOrSelf => {
                let mut out = Vec::new();
                if axis == Axis::AncestorOrSelf {
                    out.push(node);
                }
                if is_attr {
                    out.push(XNode::Node(id));
                }
                out.extend(doc.ancestors(id).map(XNode::Node));
                out
            }
            Axis::FollowingSibling | Axis::PrecedingSibling if is_attr => Vec::new(),
            Axis::FollowingSibling | Axis::PrecedingSibling => {
                let Some(parent) = doc.parent(id) else {
                    return Vec::new();
                };
                let siblings = self.children(parent);
                let Some(pos) = siblings.iter().position(|&s| s == id) else {
                    return Vec::new();
                };
                if axis == Axis::FollowingSibling {
                    wrap(siblings[pos + 1..].to_vec())
                } else {
                    wrap(siblings[..pos].iter().rev().copied().collect())
                }
            }
            Axis::Following => {
                let mut out = Vec::new();
                if is_attr {
                    out.extend(self.descendants(id));
                }
                let mut cur = id;
                while let Some(parent) = doc.parent(cur) {
                    let siblings = self.children(parent);
                    if let Some(pos) = siblings.iter().position(|&s| s == cur) {
                        for &sib in &siblings[pos + 1..] {
                            out.push(sib);
                            out.extend(self.descendants(sib));
                        }
                    }
                    cur = parent;
                }
                wrap(out)
            }
            Axis::Preceding => {
                let limit = self.order[id.index()];
                let ancestors: HashSet<NodeId> = doc.ancestors(id).collect();
                let mut out: Vec<NodeId> = self
                    .descendants(doc.root())
                    .into_iter()
                    .filter(|&n| self.order[n.index()] < limit && !ancestors.contains(&n))
                    .collect();
                out.reverse();
                wrap(out)
            }
            Axis::Attribute => match doc.element(id) {
                Some(el) if !is_attr => (0..el.attrs().len()).map(|i| XNode::Attr(id, i)).collect(),
                _ => Vec::new(),
            },
        }
    }

    fn test(&self, node: XNode, step: &Step) -> bool {
        match node {
            XNode::Attr(id, i) => {
                if step.axis != Axis::Attribute {
                    return step.test == NodeTest::Node;
                }
                match &step.test {
                    NodeTest::Name(name) => self
                        .doc
                        .element(id)
                        .and_then(|el| el.attrs().get(i))
                        .is_some_and(|(k, _)| k.eq_ignore_ascii_case(name)),
                    NodeTest::AnyName | NodeTest::Node => true,
                    NodeTest::Text | NodeTest::Comment => false,
                }
            }
            XNode::Node(id) => match (&step.test, self.doc.data(id)) {
                (NodeTest::Node, _) => true,
                (NodeTest::AnyName, NodeData::Element(_)) => true,
                (NodeTest::Name(name), NodeData::Element(el)) => el.name().eq_ignore_ascii_case(name),
                (NodeTest::Text, NodeData::Text(_)) => true,
                (NodeTest::Comment, NodeData::Comment(_)) => true,
                _ => false,
            },
        }
    }

    // ---------- conversions ----------

    fn string_value(&self, node: XNode) -> String {
        match node {
            XNode::Attr(id, i) => self
                .doc
                .element(id)
                .and_then(|el| el.attrs().get(i))
                .map(|(_, v)| v.clone())
                .unwrap_or_default(),
            XNode::Node(id) => match self.doc.data(id) {
                NodeData::Text(t) | NodeData::Comment(t) => t.clone(),
                NodeData::Doctype { .. } => String::new(),
                NodeData::Document | NodeData::Element(_) => self
                    .doc
                    .descendants(id)
                    .into_iter()
                    .filter_map(|n| match self.doc.data(n) {
                        NodeData::Text(t) => Some(t.as_str()),
                        _ => None,
                    })
                    .collect(),
            },
        }
    }

    fn node_name(&self, node: XNode) -> String {
        match node {
            XNode::Attr(id, i) => self
                .doc
                .element(id)
                .and_then(|el| el.attrs().get(i))
                .map(|(k, _)| k.clone())
                .unwrap_or_default(),
            XNode::Node(id) => self.doc.tag_name(id).unwrap_or_default().to_string(),
        }
    }

    fn string(&self, value: &Value) -> String {
        match value {
            Value::Nodes(nodes) => nodes
                .first()
                .map(|&n| self.string_value(n))
                .unwrap_or_default(),
            Value::Str(s) => s.clone(),
            Value::Num(n) => number_to_string(*n),
            Value::Bool(b) => b.to_string(),
        }
    }

    fn number(&self, value: &Value) -> f64 {
        match value {
            Value::Num(n) => *n,
            Value::Bool(b) => f64::from(u8::from(*b)),
            other => string_to_number(&self.string(other)),
        }
    }

    fn boolean(&self, value: &Value) -> bool {
        match value {
            Value::Nodes(nodes) => !nodes.is_empty(),
            Value::Str(s) => !s.is_empty(),
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
        }
    }

    fn compare(&self, op: CmpOp, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Nodes(xs), Value::Nodes(ys)) => xs.iter().any(|&x| {
                let sx = self.string_value(x);
                ys.iter()
                    .any(|&y| compare_atoms(op, &Value::Str(sx.clone()), &Value::Str(self.string_value(y))))
            }),
            (Value::Nodes(xs), Value::Bool(_)) => {
                compare_atoms(op, &Value::Bool(!xs.is_empty()), b)
            }
            (Value::Bool(_), Value::Nodes(ys)) => {
                compare_atoms(op, a, &Value::Bool(!ys.is_empty()))
            }
            (Value::Nodes(xs), other) => xs
                .iter()
                .any(|&x| compare_atoms(op, &Value::Str(self.string_value(x)), other)),
            (other, Value::Nodes(ys)) => ys
                .iter()
                .any(|&y| compare_atoms(op, other, &Value::Str(self.string_value(y)))),
            _ => compare_atoms(op, a, b),
        }
    }

    // ---------- functions ----------

    fn arg_string(&self, args: &[Expr], i: usize, ctx: &Ctx) -> Result<String, SelectorError> {
        match args.get(i) {
            Some(e) => Ok(self.string(&self.eval(e, ctx)?)),
            None => Ok(self.string_value(ctx.node)),
        }
    }

    fn arg_number(&self, args: &[Expr], i: usize, ctx: &Ctx) -> Result<f64, SelectorError> {
        match args.get(i) {
            Some(e) => Ok(self.number(&self.eval(e, ctx)?)),
            None => Ok(string_to_number(&self.string_value(ctx.node))),
        }
    }

    fn call(&self, function: Function, args: &[Expr], ctx: &Ctx) -> Result<Value, SelectorError> {
        use Function as F;
        Ok(match function {
            F::Last => Value::Num(ctx.size as f64),
            F::Position => Value::Num(ctx.position as f64),
            F::Count => {
                let nodes = self.node_set(self.eval(&args[0], ctx)?)?;
                Value::Num(nodes.len() as f64)
            }
            F::LocalName | F::Name => {
                let target = match args.first() {
                    Some(e) => self.node_set(self.eval(e, ctx)?)?.first().copied(),
                    None => Some(ctx.node),
                };
                Value::Str(target.map(|n| self.node_name(n)).unwrap_or_default())
            }
            F::String => Value::Str(self.arg_string(args, 0, ctx)?),
            F::Concat => {
                let mut out = String::new();
                for i in 0..args.len() {
                    out.push_str(&self.arg_string(args, i, ctx)?);
                }
                Value::Str(out)
            }
            F::StartsWith => Value::Bool(
                self.arg_string(args, 0, ctx)?
                    .starts_with(&self.arg_string(args, 1, ctx)?),
            ),
            F::EndsWith => Value::Bool(
                self.arg_string(args, 0, ctx)?
                    .ends_with(&self.arg_string(args, 1, ctx)?),
            ),
            F::Contains => Value::Bool(
                self.arg_string(args, 0, ctx)?
                    .contains(&self.arg_string(args, 1, ctx)?),
            ),
            F::SubstringBefore => {
                let s = self.arg_string(args, 0, ctx)?;
                let pat = self.arg_string(args, 1, ctx)?;
                Value::Str(s.find(&pat).map(|i| s[..i].to_string()).unwrap_or_default())
            }
            F::SubstringAfter => {
                let s = self.arg_string(args, 0, ctx)?;
                let pat = self.arg_string(args, 1, ctx)?;
                Value::Str(
                    s.find(&pat)
                        .map(|i| s[i + pat.len()..].to_string())
                        .unwrap_or_default(),
                )
            }
            F::Substring => {
                let s = self.arg_string(args, 0, ctx)?;
                let start = xpath_round(self.arg_number(args, 1, ctx)?);
                let end = match args.get(2) {
                    Some(e) => start + xpath_round(self.number(&self.eval(e, ctx)?)),
                    None => f64::INFINITY,
                };
                Value::Str(
                    s.chars()
                        .enumerate()
                        .filter(|&(i, _)| {
                            let p = (i + 1) as f64;
                            p >= start && p < end
                        })
                        .map(|(_, c)| c)
                        .collect(),
                )
            }
            F::StringLength => Value::Num(self.arg_string(args, 0, ctx)?.chars().count() as f64),
            F::NormalizeSpace => Value::Str(
                self.arg_string(args, 0, ctx)?
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            F::Translate => {
                let s = self.arg_string(args, 0, ctx)?;
                let from: Vec<char> = self.arg_string(args, 1, ctx)?.chars().collect();
                let to: Vec<char> = self.arg_string(args, 2, ctx)?.chars().collect();
                Value::Str(
                    s.chars()
                        .filter_map(|c| match from.iter().position(|&f| f == c) {
                            Some(i) => to.get(i).copied(),
                            None => Some(c),
                        })
                        .collect(),
                )
            }
            F::Boolean => Value::Bool(self.boolean(&self.eval(&args[0], ctx)?)),
            F::Not => Value::Bool(!self.boolean(&self.eval(&args[0], ctx)?)),
            F::True => Value::Bool(true),
            F::False => Value::Bool(false),
            F::Number => Value::Num(self.arg_number(args, 0, ctx)?),
            F::Sum => {
                let nodes = self.node_set(self.eval(&args[0], ctx)?)?;
                Value::Num(
                    nodes
                        .into_iter()
                        .map(|n| string_to_number(&self.string_value(n)))
                        .sum(),
                )
            }
            F::Floor => Value::Num(self.arg_number(args, 0, ctx)?.floor()),
            F::Ceiling => Value::Num(self.arg_number(args, 0, ctx)?.ceil()),
            F::Round => Value::Num(xpath_round(self.arg_number(args, 0, ctx)?)),
        })
    }
}

fn compare_atoms(op: CmpOp, a: &Value, b: &Value) -> bool {
    let num = |v: &Value| match v {
        Value::Num(n) => *n,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Str(s) => string_to_number(s),
        Value::Nodes(_) => f64::NAN,
    };
    let string = |v: &Value| match v {
        Value::Str(s) => s.clone(),
        Value::Num(n) => number_to_string(*n),
        Value::Bool(b) => b.to_string(),
        Value::Nodes(_) => String::new(),
    };
    let boolean = |v: &Value| match v {
        Value::Bool(b) => *b,
        Value::Num(n) => *n != 0.0 && !n.is_nan(),
        Value::Str(s) => !s.is_empty(),
        Value::Nodes(nodes) => !nodes.is_empty(),
    };
    match op {
        CmpOp::Eq | CmpOp::Ne => {
            let equal = if matches!(a, Value::Bool(_)) || matches!(b, Value::Bool(_)) {
                boolean(a) == boolean(b)
            } else if matches!(a, Value::Num(_)) || matches!(b, Value::Num(_)) {
                num(a) == num(b)
            } else {
                string(a) == string(b)
            };
            if op == CmpOp::Eq { equal } else { !equal }
        }
        CmpOp::Lt => num(a) < num(b),
        CmpOp::Le => num(a) <= num(b),
        CmpOp::Gt => num(a) > num(b),
        CmpOp::Ge => num(a) >= num(b),
    }
}

fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    let digits = t.strip_prefix('-').unwrap_or(t);
    let valid = !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|&c| c == '.').count() <= 1
        && digits != ".";
    if valid {
        t.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn xpath_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        n
    } else {
        (n + 0.5).floor()
    }
}
