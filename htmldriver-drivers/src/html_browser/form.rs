//! Form ownership and submission data, following the HTML form-submission
//! algorithm closely enough for server-rendered pages.

use htmldriver_dom::{Document, NodeId};
use htmldriver_http::{Method, PageRequest};
use url::Url;

const SUBMITTABLE_TAGS: &[&str] = &["input", "select", "textarea"];
const SKIPPED_INPUT_TYPES: &[&str] = &["button", "image", "reset", "file", "submit"];

/// Lowercased `type` of an input or button, with the HTML defaults.
pub(crate) fn control_type(doc: &Document, node: NodeId) -> String {
    let default = if doc.is_tag(node, "button") { "submit" } else { "text" };
    doc.attr(node, "type")
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Form an element belongs to: the form named by its `form` attribute, or
/// else its nearest `form` ancestor. A `form` attribute that names no form
/// leaves the element formless.
pub(crate) fn owner(doc: &Document, node: NodeId) -> Option<NodeId> {
    if doc.is_tag(node, "form") {
        return Some(node);
    }
    match doc.attr(node, "form") {
        Some(id) => doc.element_by_id(id).filter(|&f| doc.is_tag(f, "form")),
        None => doc.closest(node, "form"),
    }
}

/// Whether `node` is disabled, directly or through a disabled `select`,
/// `optgroup` or `fieldset` (outside the fieldset's first `legend`).
pub(crate) fn is_disabled(doc: &Document, node: NodeId) -> bool {
    if doc.has_attr(node, "disabled") {
        return true;
    }
    if doc.is_tag(node, "option") || doc.is_tag(node, "optgroup") {
        return doc
            .ancestors(node)
            .take_while(|&a| doc.is_tag(a, "optgroup") || doc.is_tag(a, "select"))
            .any(|a| doc.has_attr(a, "disabled"));
    }
    let control = ["input", "select", "textarea", "button"]
        .iter()
        .any(|tag| doc.is_tag(node, tag));
    control
        && doc.ancestors(node).any(|a| {
            doc.is_tag(a, "fieldset")
                && doc.has_attr(a, "disabled")
                && !in_first_legend(doc, a, node)
        })
}

fn in_first_legend(doc: &Document, fieldset: NodeId, node: NodeId) -> bool {
    doc.child_elements(fieldset)
        .find(|&c| doc.is_tag(c, "legend"))
        .is_some_and(|legend| doc.is_ancestor(legend, node))
}

/// Options of a `select`, including those inside `optgroup`s.
pub(crate) fn options(doc: &Document, select: NodeId) -> Vec<NodeId> {
    doc.elements_by_tag(select, "option")
}

/// The `select` an option belongs to.
pub(crate) fn select_of(doc: &Document, option: NodeId) -> Option<NodeId> {
    doc.ancestors(option)
        .take(2)
        .find(|&a| doc.is_tag(a, "select"))
}

/// Controls owned by `form`, in document order.
fn controls(doc: &Document, form: NodeId) -> Vec<NodeId> {
    doc.descendant_elements(doc.root())
        .into_iter()
        .filter(|&n| SUBMITTABLE_TAGS.iter().any(|tag| doc.is_tag(n, tag)))
        .filter(|&n| owner(doc, n) == Some(form))
        .collect()
}

/// Name/value pairs `form` submits, with `submitter` (the clicked button,
/// if any) included at its document position.
pub(crate) fn form_data(doc: &Document, form: NodeId, submitter: Option<NodeId>) -> Vec<(String, String)> {
    let mut data = Vec::new();
    let mut submitter_added = false;
    let add_submitter = |data: &mut Vec<(String, String)>, node: NodeId| {
        let Some(name) = doc.attr(node, "name").filter(|n| !n.is_empty()) else {
            return;
        };
        if control_type(doc, node) == "image" {
            data.push((format!("{name}.x"), "0".to_string()));
            data.push((format!("{name}.y"), "0".to_string()));
        } else {
            data.push((name.to_string(), doc.attr(node, "value").unwrap_or_default().to_string()));
        }
    };

    for node in controls(doc, form) {
        if Some(node) == submitter {
            add_submitter(&mut data, node);
            submitter_added = true;
            continue;
        }
        if is_disabled(doc, node) {
            continue;
        }
        let Some(name) = doc.attr(node, "name").filter(|n| !n.is_empty()) else {
            continue;
        };
        let name = name.to_string();
        if doc.is_tag(node, "select") {
            let opts = options(doc, node);
            let selected: Vec<NodeId> = opts
                .iter()
                .copied()
                .filter(|&o| doc.has_attr(o, "selected"))
                .collect();
            if selected.is_empty() {
                if let Some(&first) = opts.first() {
                    data.push((name, doc.val(first)));
                }
            } else {
                for option in selected {
                    data.push((name.clone(), doc.val(option)));
                }
            }
            continue;
        }
        if doc.is_tag(node, "input") {
            let kind = control_type(doc, node);
            if SKIPPED_INPUT_TYPES.contains(&kind.as_str()) {
                continue;
            }
            if kind == "checkbox" || kind == "radio" {
                if doc.has_attr(node, "checked") {
                    let value = doc.attr(node, "value").unwrap_or("on").to_string();
                    data.push((name, value));
                }
                continue;
            }
        }
        data.push((name, doc.val(node)));
    }

    // A submitter outside the owned controls, e.g. a `button`.
    if let Some(node) = submitter {
        if !submitter_added {
            add_submitter(&mut data, node);
        }
    }
    data
}

/// The request submitting `form`. The submitter's `formmethod` and
/// `formaction` take precedence over the form's own attributes.
pub(crate) fn submission(doc: &Document, form: NodeId, submitter: Option<NodeId>) -> PageRequest {
    let method_attr = submitter_attr(doc, submitter, "formmethod").or_else(|| doc.attr(form, "method"));
    let method = if method_attr.is_some_and(|m| m.trim().eq_ignore_ascii_case("post")) {
        Method::POST
    } else {
        Method::GET
    };
    let action = submitter_attr(doc, submitter, "formaction")
        .or_else(|| doc.attr(form, "action").filter(|a| !a.trim().is_empty()));
    let url: Url = action
        .and_then(|a| doc.resolve_url(a))
        .unwrap_or_else(|| doc.url().clone());
    PageRequest::submit(method, url, form_data(doc, form, submitter))
}

fn submitter_attr<'d>(doc: &'d Document, submitter: Option<NodeId>, name: &str) -> Option<&'d str> {
    submitter
        .and_then(|s| doc.attr(s, name))
        .filter(|v| !v.trim().is_empty())
}
