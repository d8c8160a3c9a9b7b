use thiserror::Error;

/// Failure to parse or evaluate a CSS or XPath expression.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("could not parse {query:?} at offset {offset}: {message}")]
    Parse {
        query: String,
        offset: usize,
        message: String,
    },
    #[error("unknown pseudo-class :{0}")]
    UnknownPseudo(String),
    #[error("invalid regular expression {pattern:?}: {message}")]
    Regex { pattern: String, message: String },
    #[error("unknown XPath function {0}()")]
    UnknownFunction(String),
    #[error("XPath {query:?} must select elements, but selected {found}")]
    NotElements { query: String, found: &'static str },
}

impl SelectorError {
    pub(crate) fn parse(query: &str, offset: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            query: query.to_string(),
            offset,
            message: message.into(),
        }
    }
}

/// A locator that can never match because its value is unusable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocatorError {
    #[error("cannot locate elements with an empty value: {by}")]
    EmptyValue { by: String },
    #[error("compound class names are not permitted: {by}")]
    CompoundClassName { by: String },
    #[error("invalid selector {by}: {source}")]
    Invalid {
        by: String,
        #[source]
        source: SelectorError,
    },
}
