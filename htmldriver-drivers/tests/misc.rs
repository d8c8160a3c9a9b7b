mod common;

use common::TestSite;
use htmldriver_drivers::{By, HtmlDriver, Point, Rect, SearchContext, Size, WebDriverError};

#[tokio::test]
async fn title_url_and_source_follow_the_loaded_page() {
    let site = TestSite::start().await;
    let driver = site.open("/simple.html").await;

    assert_eq!(driver.title(), "Hello WebDriver");
    assert_eq!(driver.current_url(), site.url("/simple.html"));
    let source = driver.page_source();
    assert!(source.contains("<title>Hello WebDriver</title>"), "{source}");
    assert!(source.contains(r#"id="oneline""#));
}

#[tokio::test]
async fn fresh_driver_shows_about_blank() {
    common::init_test_tracing();
    let driver = HtmlDriver::new().unwrap();
    assert_eq!(driver.current_url(), "about:blank");
    assert_eq!(driver.title(), "");
    assert!(driver.find_elements(&By::tag_name("p")).unwrap().is_empty());
}

#[tokio::test]
async fn get_about_blank_replaces_the_page() {
    let site = TestSite::start().await;
    let driver = site.open("/simple.html").await;
    driver.get("about:blank").await.unwrap();
    assert_eq!(driver.current_url(), "about:blank");
    assert!(driver.find_element(&By::id("oneline")).is_err());
}

#[tokio::test]
async fn malformed_url_is_an_invalid_argument() {
    common::init_test_tracing();
    let driver = HtmlDriver::new().unwrap();
    let err = driver.get("not a url").await.unwrap_err();
    assert!(matches!(err, WebDriverError::InvalidArgument(_)), "{err:?}");
}

#[tokio::test]
async fn single_window_handle() {
    common::init_test_tracing();
    let driver = HtmlDriver::new().unwrap();
    let handle = driver.window_handle();
    assert!(!handle.is_empty());
    assert_eq!(driver.window_handles(), vec![handle]);
}

#[tokio::test]
async fn close_resets_to_blank_and_quit_consumes_the_driver() {
    let site = TestSite::start().await;
    let driver = site.open("/simple.html").await;
    driver.close();
    assert_eq!(driver.current_url(), "about:blank");
    driver.quit();
}

#[tokio::test]
async fn every_locator_strategy_finds_elements() {
    let site = TestSite::start().await;
    let driver = site.open("/form.html").await;

    let by_id = driver.find_element(&By::id("working")).unwrap();
    let by_name = driver.find_element(&By::name("x")).unwrap();
    let by_css = driver.find_element(&By::css("form#login > input:first-child")).unwrap();
    let by_xpath = driver.find_element(&By::xpath("//input[@name='x']")).unwrap();
    assert_eq!(by_id, by_name);
    assert_eq!(by_id, by_css);
    assert_eq!(by_id, by_xpath);

    assert_eq!(driver.find_elements(&By::tag_name("form")).unwrap().len(), 4);
    assert_eq!(driver.find_elements(&By::tag_name("FORM")).unwrap().len(), 4);

    driver.get(&site.url("/simple.html")).await.unwrap();
    let link = driver.find_element(&By::link_text("Click me to go on")).unwrap();
    assert_eq!(link.dom_attribute("id").as_deref(), Some("relative"));
    let partial = driver.find_element(&By::partial_link_text("nothing")).unwrap();
    assert_eq!(partial.dom_attribute("id").as_deref(), Some("scripted"));
}

#[tokio::test]
async fn missing_elements_and_bad_selectors_are_distinct_errors() {
    let site = TestSite::start().await;
    let driver = site.open("/simple.html").await;

    match driver.find_element(&By::id("nope")) {
        Err(WebDriverError::NoSuchElement { selector }) => assert_eq!(selector, "By.id: nope"),
        other => panic!("expected NoSuchElement, got {other:?}"),
    }
    assert!(driver.find_elements(&By::id("nope")).unwrap().is_empty());

    for by in [
        By::css("p[["),
        By::xpath("//p["),
        By::class_name("a b"),
        By::id(""),
    ] {
        let err = driver.find_elements(&by).unwrap_err();
        assert!(matches!(err, WebDriverError::InvalidSelector { .. }), "{by}: {err:?}");
    }
    assert!(driver.find_elements(&By::name("")).unwrap().is_empty());
}

#[tokio::test]
async fn element_scoped_search_stays_inside_the_subtree() {
    let site = TestSite::start().await;
    let driver = site.open("/form.html").await;

    let login = driver.find_element(&By::id("login")).unwrap();
    assert_eq!(login.find_elements(&By::tag_name("input")).unwrap().len(), 8);
    assert!(login.find_element(&By::id("cheese")).is_err());
    assert!(login.find_elements(&By::tag_name("form")).unwrap().is_empty());

    let relative = login.find_elements(&By::xpath(".//input[@type='submit']")).unwrap();
    assert_eq!(relative.len(), 2);
    let absolute = login.find_elements(&By::xpath("//form")).unwrap();
    assert_eq!(absolute.len(), 4);
}

#[tokio::test]
async fn text_normalises_whitespace_except_in_pre() {
    let site = TestSite::start().await;
    let driver = site.open("/simple.html").await;

    let text = |id: &str| driver.find_element(&By::id(id)).unwrap().text();
    assert_eq!(text("oneline"), "A single line of text");
    assert_eq!(text("span"), "An inline element");
    assert_eq!(text("nbsp"), "This line has a non-breaking space");
    assert!(text("multiline").contains("A div containing"));
    assert!(text("multiline").contains("and block level elements"));
    assert!(text("preformatted").starts_with("   This section has a preformatted"));
}

#[tokio::test]
async fn geometry_is_all_zero() {
    let site = TestSite::start().await;
    let driver = site.open("/simple.html").await;
    let p = driver.find_element(&By::id("oneline")).unwrap();
    assert_eq!(p.location(), Point::default());
    assert_eq!(p.size(), Size::default());
    assert_eq!(p.rect(), Rect::default());
    assert_eq!(p.css_value("color"), "");
}

#[tokio::test]
async fn markup_hidden_elements_are_not_displayed() {
    let site = TestSite::start().await;
    let driver = site.open("/simple.html").await;
    assert!(driver.find_element(&By::id("oneline")).unwrap().is_displayed());
    assert!(!driver.find_element(&By::id("hiddenline")).unwrap().is_displayed());
    assert!(!driver.find_element(&By::tag_name("title")).unwrap().is_displayed());

    driver.get(&site.url("/form.html")).await.unwrap();
    assert!(!driver.find_element(&By::id("secret")).unwrap().is_displayed());
}
