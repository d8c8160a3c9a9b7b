//! Element location strategies.

use std::fmt;

use crate::css::Selector;
use crate::document::{Document, NodeId};
use crate::error::LocatorError;
use crate::xpath::XPath;

/// How to find elements, mirroring the WebDriver locator strategies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum By {
    Id(String),
    Name(String),
    TagName(String),
    ClassName(String),
    CssSelector(String),
    XPath(String),
    LinkText(String),
    PartialLinkText(String),
}

impl By {
    pub fn id(value: impl Into<String>) -> Self {
        By::Id(value.into())
    }

    pub fn name(value: impl Into<String>) -> Self {
        By::Name(value.into())
    }

    pub fn tag_name(value: impl Into<String>) -> Self {
        By::TagName(value.into())
    }

    pub fn class_name(value: impl Into<String>) -> Self {
        By::ClassName(value.into())
    }

    pub fn css(value: impl Into<String>) -> Self {
        By::CssSelector(value.into())
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        By::XPath(value.into())
    }

    pub fn link_text(value: impl Into<String>) -> Self {
        By::LinkText(value.into())
    }

    pub fn partial_link_text(value: impl Into<String>) -> Self {
        By::PartialLinkText(value.into())
    }

    pub fn value(&self) -> &str {
        match self {
            By::Id(v)
            | By::Name(v)
            | By::TagName(v)
            | By::ClassName(v)
            | By::CssSelector(v)
            | By::XPath(v)
            | By::LinkText(v)
            | By::PartialLinkText(v) => v,
        }
    }

    /// Strategy name as used in error messages (`id`, `cssSelector`, ...).
    pub fn strategy(&self) -> &'static str {
        match self {
            By::Id(_) => "id",
            By::Name(_) => "name",
            By::TagName(_) => "tagName",
            By::ClassName(_) => "className",
            By::CssSelector(_) => "cssSelector",
            By::XPath(_) => "xpath",
            By::LinkText(_) => "linkText",
            By::PartialLinkText(_) => "partialLinkText",
        }
    }
}

impl fmt::Display for By {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "By.{}: {}", self.strategy(), self.value())
    }
}

/// All elements under `scope` matching `by`, in document order.
///
/// `scope` itself is never part of the result, except that an XPath is
/// evaluated with `scope` as its context node and may select it.
pub fn find_all(doc: &Document, scope: NodeId, by: &By) -> Result<Vec<NodeId>, LocatorError> {
    let value = by.value().trim();
    if value.is_empty() {
        return match by {
            By::Name(_) => Ok(Vec::new()),
            _ => Err(LocatorError::EmptyValue { by: by.to_string() }),
        };
    }
    let invalid = |source| LocatorError::Invalid {
        by: by.to_string(),
        source,
    };

    let below = || doc.descendant_elements(scope).into_iter();
    let found = match by {
        By::Id(id) => below().filter(|&n| doc.attr(n, "id") == Some(id.as_str())).collect(),
        By::Name(name) => below()
            .filter(|&n| doc.attr(n, "name") == Some(name.as_str()))
            .collect(),
        By::TagName(tag) => below()
            .filter(|&n| doc.tag_name(n).is_some_and(|t| t.eq_ignore_ascii_case(tag)))
            .collect(),
        By::ClassName(_) => {
            if value.contains(char::is_whitespace) {
                return Err(LocatorError::CompoundClassName { by: by.to_string() });
            }
            below().filter(|&n| doc.has_class(n, value, true)).collect()
        }
        By::CssSelector(query) => Selector::parse(query).map_err(invalid)?.select(doc, scope),
        By::XPath(query) => XPath::parse(query)
            .and_then(|xpath| xpath.evaluate(doc, scope))
            .map_err(invalid)?,
        By::LinkText(text) => below()
            .filter(|&n| doc.is_tag(n, "a") && doc.text(n) == text.trim())
            .collect(),
        By::PartialLinkText(text) => below()
            .filter(|&n| doc.is_tag(n, "a") && doc.text(n).contains(text.as_str()))
            .collect(),
    };
    tracing::trace!(locator = %by, matches = found.len(), "dom.locate");
    Ok(found)
}

/// First element matching `by`, if any.
pub fn find_first(doc: &Document, scope: NodeId, by: &By) -> Result<Option<NodeId>, LocatorError> {
    Ok(find_all(doc, scope, by)?.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    const PAGE: &str = r#"
        <div id="wrap">
          <p id="cheese" class="Food tasty">Cheddar</p>
          <input name="q"><input name="q">
          <a href="/a" id="a1">Click   here</a>
          <a href="/b" id="a2">Click here for more</a>
        </div>"#;

    fn doc() -> Document {
        Document::parse(PAGE, Url::parse("http://localhost/").unwrap())
    }

    fn ids(doc: &Document, nodes: Vec<NodeId>) -> Vec<&str> {
        nodes.into_iter().filter_map(|n| doc.attr(n, "id")).collect()
    }

    #[test]
    fn display_names_the_strategy() {
        assert_eq!(By::id("cheese").to_string(), "By.id: cheese");
        assert_eq!(By::css("p > a").to_string(), "By.cssSelector: p > a");
        assert_eq!(By::partial_link_text("x").strategy(), "partialLinkText");
    }

    #[test]
    fn simple_strategies() {
        let d = doc();
        let root = d.root();
        assert_eq!(ids(&d, find_all(&d, root, &By::id("cheese")).unwrap()), vec!["cheese"]);
        assert_eq!(find_all(&d, root, &By::name("q")).unwrap().len(), 2);
        assert_eq!(find_all(&d, root, &By::tag_name("A")).unwrap().len(), 2);
        assert_eq!(ids(&d, find_all(&d, root, &By::class_name("food")).unwrap()), vec!["cheese"]);
    }

    #[test]
    fn link_text_uses_normalized_text() {
        let d = doc();
        let root = d.root();
        assert_eq!(ids(&d, find_all(&d, root, &By::link_text("Click here")).unwrap()), vec!["a1"]);
        assert_eq!(
            ids(&d, find_all(&d, root, &By::partial_link_text("here")).unwrap()),
            vec!["a1", "a2"]
        );
    }

    #[test]
    fn scope_is_excluded_except_for_xpath() {
        let d = doc();
        let wrap = d.element_by_id("wrap").unwrap();
        assert!(find_all(&d, wrap, &By::css("div")).unwrap().is_empty());
        assert!(find_all(&d, wrap, &By::id("wrap")).unwrap().is_empty());
        assert_eq!(find_all(&d, wrap, &By::xpath(".")).unwrap(), vec![wrap]);
    }

    #[test]
    fn unusable_values_are_errors() {
        let d = doc();
        let root = d.root();
        assert!(find_all(&d, root, &By::name("  ")).unwrap().is_empty());
        assert!(matches!(
            find_all(&d, root, &By::id("")),
            Err(LocatorError::EmptyValue { .. })
        ));
        assert!(matches!(
            find_all(&d, root, &By::class_name("a b")),
            Err(LocatorError::CompoundClassName { .. })
        ));
        assert!(matches!(
            find_all(&d, root, &By::css("p[")),
            Err(LocatorError::Invalid { .. })
        ));
        assert!(matches!(
            find_all(&d, root, &By::xpath("//a/@href")),
            Err(LocatorError::Invalid { .. })
        ));
    }

    #[test]
    fn find_first_returns_document_order() {
        let d = doc();
        let first = find_first(&d, d.root(), &By::tag_name("a")).unwrap();
        assert_eq!(first, d.element_by_id("a1"));
        assert_eq!(find_first(&d, d.root(), &By::id("missing")).unwrap(), None);
    }
}
