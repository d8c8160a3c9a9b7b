//! In-memory HTML document model for the driver.
//!
//! - [`Document`]: arena tree built from an html5ever parse, with form values
//!   tracked apart from the markup
//! - [`css::Selector`]: CSS selectors, including text-matching pseudo-classes
//! - [`xpath::XPath`]: XPath 1.0 expressions returning elements
//! - [`locator::By`]: WebDriver locator strategies on top of both engines
//!
//! Serialization (`outer_html`, `inner_html`) and text extraction (`text`,
//! `whole_text`, `own_text`) are inherent methods on [`Document`].

pub mod css;
mod document;
mod error;
pub mod locator;
mod serialize;
mod text;
pub mod xpath;

pub use document::{Document, ElementData, NodeData, NodeId};
pub use error::{LocatorError, SelectorError};
pub use locator::By;
