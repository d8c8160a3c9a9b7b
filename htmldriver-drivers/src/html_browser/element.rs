use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use htmldriver_dom::{By, Document, NodeId, locator};
use htmldriver_http::PageRequest;
use tracing::{debug, info};
use url::Url;

use crate::html_browser::{
    driver::{HtmlDriver, SearchContext},
    error::WebDriverError,
    form,
    keys::Keys,
    page::Page,
};

/// Attributes WebDriver reports as `"true"`/`"false"` properties.
const BOOLEAN_ATTRIBUTES: &[&str] = &[
    "async", "autofocus", "autoplay", "checked", "compact", "complete", "controls", "declare",
    "defaultchecked", "defaultselected", "defer", "disabled", "draggable", "ended",
    "formnovalidate", "hidden", "indeterminate", "iscontenteditable", "ismap", "itemscope",
    "loop", "multiple", "muted", "nohref", "noresize", "noshade", "novalidate", "nowrap", "open",
    "paused", "pubdate", "readonly", "required", "reversed", "scoped", "seamless", "seeking",
    "selected", "truespeed", "willvalidate",
];

/// Content of these elements is never rendered.
const UNRENDERED_TAGS: &[&str] = &["head", "script", "style", "template", "noscript", "title"];

/// Bound on label/button indirections followed by a single click.
const MAX_CLICK_DELEGATIONS: usize = 8;

fn is_boolean_attribute(name: &str) -> bool {
    BOOLEAN_ATTRIBUTES.contains(&name.to_ascii_lowercase().as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// What a click or key press asks the driver to do after the DOM edit.
enum Followup {
    Nothing,
    Navigate(Url),
    Submit { form: NodeId, submitter: Option<NodeId> },
}

/// Handle to an element of a specific page load.
///
/// Handles stay usable after the driver navigates away; they keep reading
/// and editing the page they were found on.
#[derive(Clone)]
pub struct WebElement {
    driver: HtmlDriver,
    page: Arc<Page>,
    node: NodeId,
}

impl WebElement {
    pub(crate) fn new(driver: HtmlDriver, page: Arc<Page>, node: NodeId) -> Self {
        Self { driver, page, node }
    }

    // ==============================
    // Interaction
    // ==============================

    /// Click the element the way a browser without scripts would.
    pub async fn click(&self) -> Result<(), WebDriverError> {
        let followup = {
            let mut doc = self.page.write();
            debug!(target: "driver.element", element = %describe(&doc, self.node), "driver.element.click");
            click_in(&mut doc, self.node)?
        };
        self.follow(followup).await
    }

    /// Submit the form this element belongs to.
    pub async fn submit(&self) -> Result<(), WebDriverError> {
        let owner = form::owner(&self.page.read(), self.node);
        let form = owner.ok_or_else(|| WebDriverError::Unsupported("Can only submit forms.".into()))?;
        self.follow(Followup::Submit {
            form,
            submitter: None,
        })
        .await
    }

    /// Type `keys` into the element. A lone enter key submits the owning form.
    pub async fn send_keys(&self, keys: &str) -> Result<(), WebDriverError> {
        if keys.is_empty() {
            return Ok(());
        }
        let followup = {
            let mut doc = self.page.write();
            if form::is_disabled(&doc, self.node) {
                return Err(WebDriverError::InvalidElementState(format!(
                    "{} is disabled",
                    describe(&doc, self.node)
                )));
            }
            match form::owner(&doc, self.node) {
                Some(form) if Keys::is_enter(keys) => Followup::Submit {
                    form,
                    submitter: None,
                },
                _ => {
                    type_into(&mut doc, self.node, keys);
                    Followup::Nothing
                }
            }
        };
        self.follow(followup).await
    }

    /// Reset the element's value.
    pub fn clear(&self) -> Result<(), WebDriverError> {
        let mut doc = self.page.write();
        let node = self.node;
        if form::is_disabled(&doc, node) || doc.has_attr(node, "readonly") {
            return Err(WebDriverError::InvalidElementState(format!(
                "{} must be user-editable in order to clear it",
                describe(&doc, node)
            )));
        }
        if doc.is_tag(node, "textarea") {
            doc.set_dirty_value(node, Some(String::new()));
        } else if doc.is_tag(node, "input") {
            let cleared = match form::control_type(&doc, node).as_str() {
                "color" => "#000000".to_string(),
                "range" => range_midpoint(&doc, node),
                _ => String::new(),
            };
            doc.set_dirty_value(node, Some(cleared));
        } else if is_content_editable(&doc, node) {
            doc.set_text(node, "");
        } else {
            doc.set_attr(node, "value", "");
        }
        debug!(target: "driver.element", element = %describe(&doc, node), "driver.element.clear");
        Ok(())
    }

    async fn follow(&self, followup: Followup) -> Result<(), WebDriverError> {
        match followup {
            Followup::Nothing => Ok(()),
            Followup::Navigate(url) => {
                info!(target: "driver.navigation", url = %url, "driver.link.follow");
                self.driver.load(PageRequest::get(url)).await
            }
            Followup::Submit { form, submitter } => {
                let request = form::submission(&self.page.read(), form, submitter);
                info!(
                    target: "driver.navigation",
                    method = %request.method,
                    url = %request.url,
                    fields = request.form.as_ref().map_or(0, Vec::len),
                    "driver.form.submit"
                );
                self.driver.load(request).await
            }
        }
    }

    // ==============================
    // State
    // ==============================

    pub fn tag_name(&self) -> String {
        self.page
            .read()
            .tag_name(self.node)
            .unwrap_or_default()
            .to_ascii_lowercase()
    }

    /// Text content. `pre` keeps its whitespace; anything else is trimmed
    /// with non-breaking spaces turned into plain ones.
    pub fn text(&self) -> String {
        let doc = self.page.read();
        let raw = doc.whole_text(self.node);
        if doc.is_tag(self.node, "pre") {
            return raw;
        }
        raw.replace('\u{A0}', " ")
            .replace('\u{200E}', "")
            .trim()
            .to_string()
    }

    pub fn is_enabled(&self) -> bool {
        !form::is_disabled(&self.page.read(), self.node)
    }

    /// Checkedness of inputs and selectedness of options.
    pub fn is_selected(&self) -> Result<bool, WebDriverError> {
        let doc = self.page.read();
        let node = self.node;
        match doc.tag_name(node).unwrap_or_default() {
            "input" => Ok(doc.has_attr(node, "checked")),
            "option" => Ok(option_selected(&doc, node)),
            other => Err(WebDriverError::Unsupported(format!(
                "Unable to determine if element is selected. Tag name is: {other}"
            ))),
        }
    }

    /// Whether the element would be rendered, judged from markup alone.
    pub fn is_displayed(&self) -> bool {
        let doc = self.page.read();
        !std::iter::once(self.node)
            .chain(doc.ancestors(self.node))
            .filter(|&n| doc.is_element(n))
            .any(|n| hidden_by_markup(&doc, n))
    }

    pub fn location(&self) -> Point {
        Point::default()
    }

    pub fn size(&self) -> Size {
        Size::default()
    }

    pub fn rect(&self) -> Rect {
        Rect::default()
    }

    /// Computed styles are not available without layout.
    pub fn css_value(&self, _name: &str) -> String {
        String::new()
    }

    // ==============================
    // Attributes and properties
    // ==============================

    /// DOM property `name`, as a string.
    pub fn dom_property(&self, name: &str) -> Option<String> {
        property_in(&self.page.read(), self.node, name)
    }

    /// Attribute `name` as WebDriver reports it.
    pub fn dom_attribute(&self, name: &str) -> Option<String> {
        attribute_in(&self.page.read(), self.node, name)
    }

    /// The legacy "get attribute": a property for URL-ish and value names,
    /// otherwise the attribute, falling back to the property.
    pub fn attribute(&self, name: &str) -> Option<String> {
        let doc = self.page.read();
        let lname = name.to_ascii_lowercase();
        match lname.as_str() {
            "href" | "src" | "value" => property_in(&doc, self.node, &lname),
            _ if is_boolean_attribute(&lname) => attribute_in(&doc, self.node, &lname),
            _ => attribute_in(&doc, self.node, name).or_else(|| property_in(&doc, self.node, name)),
        }
    }
}

impl SearchContext for WebElement {
    fn find_elements(&self, by: &By) -> Result<Vec<WebElement>, WebDriverError> {
        let nodes = locator::find_all(&self.page.read(), self.node, by)?;
        Ok(nodes
            .into_iter()
            .map(|node| WebElement::new(self.driver.clone(), Arc::clone(&self.page), node))
            .collect())
    }
}

impl PartialEq for WebElement {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.page, &other.page) && self.node == other.node
    }
}

impl Eq for WebElement {}

impl Hash for WebElement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.page.id.hash(state);
        self.node.hash(state);
    }
}

impl fmt::Debug for WebElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebElement")
            .field("page", &self.page.id)
            .field("node", &self.node.index())
            .field("tag", &self.tag_name())
            .finish()
    }
}

// ==============================
// DOM edits behind the actions
// ==============================

fn describe(doc: &Document, node: NodeId) -> String {
    let tag = doc.tag_name(node).unwrap_or("#node");
    match doc.attr(node, "id") {
        Some(id) => format!("<{tag} id={id:?}>"),
        None => format!("<{tag}>"),
    }
}

fn click_in(doc: &mut Document, start: NodeId) -> Result<Followup, WebDriverError> {
    let mut node = start;
    for _ in 0..MAX_CLICK_DELEGATIONS {
        if form::is_disabled(doc, node) {
            return Ok(Followup::Nothing);
        }
        let tag = doc.tag_name(node).unwrap_or_default().to_string();
        match tag.as_str() {
            "label" if doc.has_attr(node, "for") => {
                let target = doc.attr(node, "for").unwrap_or_default().to_string();
                node = doc
                    .element_by_id(&target)
                    .ok_or_else(|| WebDriverError::NoSuchElement {
                        selector: By::id(target).to_string(),
                    })?;
                continue;
            }
            "input" => return Ok(click_input(doc, node)),
            "button" => return click_button(doc, node),
            "option" => {
                click_option(doc, node);
                return Ok(Followup::Nothing);
            }
            _ => {}
        }
        if let Some(button) = doc.ancestors(node).find(|&a| doc.is_tag(a, "button")) {
            node = button;
            continue;
        }
        let link = if doc.has_attr(node, "href") {
            Some(node)
        } else {
            doc.ancestors(node)
                .find(|&a| doc.is_tag(a, "a") && doc.has_attr(a, "href"))
        };
        return Ok(link
            .and_then(|l| link_target(doc, l))
            .map_or(Followup::Nothing, Followup::Navigate));
    }
    Ok(Followup::Nothing)
}

fn click_input(doc: &mut Document, node: NodeId) -> Followup {
    match form::control_type(doc, node).as_str() {
        "radio" => {
            if let Some(name) = doc.attr(node, "name").map(str::to_string) {
                let view: &Document = doc;
                let owner = form::owner(view, node);
                let group: Vec<NodeId> = view
                    .elements_by_tag(view.root(), "input")
                    .into_iter()
                    .filter(|&r| {
                        r != node
                            && form::control_type(view, r) == "radio"
                            && view.attr(r, "name") == Some(name.as_str())
                            && form::owner(view, r) == owner
                    })
                    .collect();
                for radio in group {
                    doc.remove_attr(radio, "checked");
                }
            }
            doc.set_attr(node, "checked", "checked");
            Followup::Nothing
        }
        "checkbox" => {
            toggle(doc, node, "checked");
            Followup::Nothing
        }
        "submit" | "image" => match form::owner(doc, node) {
            Some(form) => Followup::Submit {
                form,
                submitter: Some(node),
            },
            None => Followup::Nothing,
        },
        _ => Followup::Nothing,
    }
}

fn click_button(doc: &Document, node: NodeId) -> Result<Followup, WebDriverError> {
    let submit = |form| Followup::Submit {
        form,
        submitter: Some(node),
    };
    if doc.has_attr(node, "form") {
        return Ok(form::owner(doc, node).map_or(Followup::Nothing, submit));
    }
    match form::control_type(doc, node).as_str() {
        "button" | "reset" => Ok(Followup::Nothing),
        _ => doc
            .closest(node, "form")
            .map(submit)
            .ok_or_else(|| WebDriverError::Unsupported("Can only submit forms.".into())),
    }
}

fn click_option(doc: &mut Document, node: NodeId) {
    let Some(select) = form::select_of(doc, node) else {
        return;
    };
    if doc.has_attr(select, "multiple") {
        toggle(doc, node, "selected");
        return;
    }
    for option in form::options(doc, select) {
        doc.remove_attr(option, "selected");
    }
    doc.set_attr(node, "selected", "selected");
}

fn toggle(doc: &mut Document, node: NodeId, attr: &str) {
    if doc.remove_attr(node, attr).is_none() {
        doc.set_attr(node, attr, attr);
    }
}

fn link_target(doc: &Document, node: NodeId) -> Option<Url> {
    let href = doc.attr(node, "href")?.trim();
    if href.to_ascii_lowercase().starts_with("javascript:") {
        return None;
    }
    doc.resolve_url(href)
}

fn is_content_editable(doc: &Document, node: NodeId) -> bool {
    doc.attr(node, "contenteditable")
        .is_some_and(|v| v.trim().is_empty() || v.trim().eq_ignore_ascii_case("true"))
}

fn type_into(doc: &mut Document, node: NodeId, keys: &str) {
    if doc.is_tag(node, "input") || doc.is_tag(node, "textarea") {
        let value = apply_keys(doc.val(node), keys);
        doc.set_dirty_value(node, Some(value));
    } else if is_content_editable(doc, node) {
        let typed = apply_keys(String::new(), keys);
        doc.append_text(node, &typed);
    }
}

/// Append typed characters. Backspace deletes and the space key types a
/// space; other special keys are dropped.
fn apply_keys(mut value: String, keys: &str) -> String {
    let backspace = Keys::BACKSPACE.chars().next();
    let space = Keys::SPACE.chars().next();
    for ch in keys.chars() {
        if Some(ch) == backspace {
            value.pop();
        } else if Some(ch) == space {
            value.push(' ');
        } else if !('\u{E000}'..='\u{F8FF}').contains(&ch) {
            value.push(ch);
        }
    }
    value
}

fn range_midpoint(doc: &Document, node: NodeId) -> String {
    let bound = |name: &str, default: f64| {
        doc.attr(node, name)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(default)
    };
    let min = bound("min", 0.0);
    let max = bound("max", 100.0).max(min);
    let mid = min + (max - min) / 2.0;
    if mid.fract() == 0.0 {
        format!("{}", mid as i64)
    } else {
        mid.to_string()
    }
}

fn option_selected(doc: &Document, node: NodeId) -> bool {
    if doc.has_attr(node, "selected") {
        return true;
    }
    let Some(select) = form::select_of(doc, node) else {
        return false;
    };
    let options = form::options(doc, select);
    options.first() == Some(&node) && !options.iter().any(|&o| doc.has_attr(o, "selected"))
}

fn hidden_by_markup(doc: &Document, node: NodeId) -> bool {
    if doc.has_attr(node, "hidden") {
        return true;
    }
    if doc.is_tag(node, "input") && form::control_type(doc, node) == "hidden" {
        return true;
    }
    if UNRENDERED_TAGS.iter().any(|tag| doc.is_tag(node, tag)) {
        return true;
    }
    doc.attr(node, "style").is_some_and(|style| {
        style.split(';').any(|decl| {
            let Some((prop, value)) = decl.split_once(':') else {
                return false;
            };
            let prop = prop.trim().to_ascii_lowercase();
            let value = value
                .trim()
                .trim_end_matches("!important")
                .trim()
                .to_ascii_lowercase();
            (prop == "display" && value == "none") || (prop == "visibility" && value == "hidden")
        })
    })
}

fn property_in(doc: &Document, node: NodeId, name: &str) -> Option<String> {
    let attr = |n: &str| doc.attr(node, n).map(str::to_string);
    let absolute = |n: &str| {
        let raw = attr(n)?;
        let abs = doc.abs_url(node, n);
        Some(if abs.is_empty() { raw } else { abs })
    };
    let tag = doc.tag_name(node).unwrap_or_default();
    match name {
        "class" | "colspan" => None,
        "className" => attr("class"),
        "classList" => {
            let classes: Vec<&str> = doc
                .element(node)
                .map(|el| el.classes().collect())
                .unwrap_or_default();
            Some(format!("[{}]", classes.join(", ")))
        }
        "colSpan" => attr("colspan"),
        "index" if tag == "option" => form::select_of(doc, node)
            .and_then(|s| form::options(doc, s).iter().position(|&o| o == node))
            .map(|index| index.to_string()),
        "innerHTML" => Some(doc.inner_html(node)),
        "outerHTML" => Some(doc.outer_html_of(node)),
        "innerText" | "textContent" => Some(doc.text(node)),
        "href" => absolute("href"),
        "src" => absolute("src"),
        "selectedIndex" if tag == "select" => {
            let index = form::options(doc, node)
                .iter()
                .position(|&o| doc.has_attr(o, "selected"))
                .map_or(-1, |i| i as i64);
            Some(index.to_string())
        }
        "value" if matches!(tag, "input" | "textarea" | "option" | "select") => {
            if tag == "select" {
                let options = form::options(doc, node);
                return options
                    .iter()
                    .copied()
                    .find(|&o| doc.has_attr(o, "selected"))
                    .or_else(|| options.first().copied())
                    .map(|o| doc.val(o));
            }
            Some(doc.val(node))
        }
        _ if is_boolean_attribute(name) => {
            Some(doc.has_attr(node, &name.to_ascii_lowercase()).to_string())
        }
        _ => attr(name),
    }
}

fn attribute_in(doc: &Document, node: NodeId, name: &str) -> Option<String> {
    let lname = name.to_ascii_lowercase();
    if doc.is_tag(node, "input") {
        match lname.as_str() {
            "value" => {
                return doc
                    .attr(node, "value")
                    .filter(|v| !v.is_empty())
                    .map(str::to_string);
            }
            "selected" => return doc.has_attr(node, "checked").then(|| "true".to_string()),
            _ => {}
        }
    }
    if is_boolean_attribute(&lname) {
        return doc.has_attr(node, &lname).then(|| "true".to_string());
    }
    doc.attr(node, &lname).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(html: &str) -> Document {
        Document::parse(html, Url::parse("http://localhost/dir/page.html").unwrap())
    }

    #[test]
    fn keys_append_and_backspace() {
        assert_eq!(apply_keys("abc".into(), "d"), "abcd");
        assert_eq!(apply_keys("abc".into(), Keys::BACKSPACE), "ab");
        assert_eq!(apply_keys(String::new(), &format!("x{}y", Keys::TAB)), "xy");
        assert_eq!(apply_keys("a".into(), &format!("{}b", Keys::SPACE)), "a b");
    }

    #[test]
    fn range_midpoint_uses_bounds() {
        let d = doc(r#"<input id=a type=range><input id=b type=range min=10 max=15><input id=c type=range min=5 max=1>"#);
        assert_eq!(range_midpoint(&d, d.element_by_id("a").unwrap()), "50");
        assert_eq!(range_midpoint(&d, d.element_by_id("b").unwrap()), "12.5");
        assert_eq!(range_midpoint(&d, d.element_by_id("c").unwrap()), "5");
    }

    #[test]
    fn clicking_radios_switches_within_group() {
        let mut d = doc(r#"
            <form><input type=radio name=r id=a checked><input type=radio name=r id=b></form>
            <input type=radio name=r id=c checked>"#);
        let a = d.element_by_id("a").unwrap();
        let b = d.element_by_id("b").unwrap();
        let c = d.element_by_id("c").unwrap();
        assert!(matches!(click_in(&mut d, b).unwrap(), Followup::Nothing));
        assert!(!d.has_attr(a, "checked"));
        assert!(d.has_attr(b, "checked"));
        assert!(d.has_attr(c, "checked"));
    }

    #[test]
    fn label_click_reaches_its_control() {
        let mut d = doc(r#"<label for=cb id=l>tick</label><input type=checkbox id=cb><label for=nope id=bad>x</label>"#);
        let l = d.element_by_id("l").unwrap();
        click_in(&mut d, l).unwrap();
        assert!(d.has_attr(d.element_by_id("cb").unwrap(), "checked"));
        let bad = d.element_by_id("bad").unwrap();
        assert!(matches!(
            click_in(&mut d, bad),
            Err(WebDriverError::NoSuchElement { .. })
        ));
    }

    #[test]
    fn clicks_inside_links_and_buttons_delegate() {
        let mut d = doc(r#"
            <a href="next.html"><span id=s>go</span></a>
            <a href="javascript:void(0)" id=js>js</a>
            <form id=f><button><b id=inner>save</b></button><button type=button id=plain>x</button></form>
            <button id=loose>orphan</button>"#);
        let s = d.element_by_id("s").unwrap();
        match click_in(&mut d, s).unwrap() {
            Followup::Navigate(url) => assert_eq!(url.as_str(), "http://localhost/dir/next.html"),
            _ => panic!("expected navigation"),
        }
        let js = d.element_by_id("js").unwrap();
        assert!(matches!(click_in(&mut d, js).unwrap(), Followup::Nothing));
        let inner = d.element_by_id("inner").unwrap();
        let f = d.element_by_id("f").unwrap();
        assert!(matches!(click_in(&mut d, inner).unwrap(), Followup::Submit { form, .. } if form == f));
        let plain = d.element_by_id("plain").unwrap();
        assert!(matches!(click_in(&mut d, plain).unwrap(), Followup::Nothing));
        let loose = d.element_by_id("loose").unwrap();
        assert!(matches!(click_in(&mut d, loose), Err(WebDriverError::Unsupported(_))));
    }

    #[test]
    fn option_index_needs_a_select() {
        let d = doc(r#"
            <select><option id=a>a</option><optgroup><option id=b>b</option></optgroup></select>
            <div><option id=stray>lost</option></div>"#);
        let index = |id: &str| property_in(&d, d.element_by_id(id).unwrap(), "index");
        assert_eq!(index("a").as_deref(), Some("0"));
        assert_eq!(index("b").as_deref(), Some("1"));
        assert_eq!(index("stray"), None);
    }

    #[test]
    fn markup_visibility() {
        let d = doc(r#"
            <div style="display: none"><p id=a>x</p></div>
            <p id=b hidden>x</p><input id=c type=hidden>
            <p id=d style="visibility:hidden !important">x</p><p id=e>shown</p>"#);
        for id in ["a", "b", "c", "d"] {
            let n = d.element_by_id(id).unwrap();
            assert!(
                std::iter::once(n).chain(d.ancestors(n)).filter(|&x| d.is_element(x)).any(|x| hidden_by_markup(&d, x)),
                "{id} should be hidden"
            );
        }
        let e = d.element_by_id("e").unwrap();
        assert!(!std::iter::once(e).chain(d.ancestors(e)).filter(|&x| d.is_element(x)).any(|x| hidden_by_markup(&d, x)));
    }
}
