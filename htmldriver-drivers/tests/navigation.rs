mod common;

use common::{SHALOM, TestSite, echoed, pair};
use htmldriver_drivers::{By, HtmlDriver, SearchContext, WebDriverError};
use wiremock::matchers::{body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn redirects_are_followed_to_the_final_url() {
    let site = TestSite::start().await;
    let driver = site.open("/redirect").await;
    assert_eq!(driver.title(), "We Arrive Here");
    assert_eq!(driver.current_url(), site.url("/result.html"));
}

#[tokio::test]
async fn charset_header_decodes_utf16_pages() {
    let site = TestSite::start().await;
    let driver = site.open("/encoding").await;
    assert_eq!(driver.title(), "Character encoding (UTF 16)");
    assert_eq!(driver.find_element(&By::id("text")).unwrap().text(), SHALOM);
}

#[tokio::test]
async fn error_status_pages_still_load_on_get() {
    let site = TestSite::start().await;
    let driver = site.open("/missing.html").await;
    assert_eq!(driver.title(), "Not found");
    assert_eq!(driver.current_url(), site.url("/missing.html"));
}

#[tokio::test]
async fn unreachable_hosts_fail_with_an_http_error() {
    common::init_test_tracing();
    let driver = HtmlDriver::new().unwrap();
    let err = driver.get("http://127.0.0.1:9/").await.unwrap_err();
    assert!(matches!(err, WebDriverError::Http(_)), "{err:?}");
    assert_eq!(driver.current_url(), "about:blank");
}

#[tokio::test]
async fn back_and_forward_walk_history() {
    let site = TestSite::start().await;
    let driver = site.open("/simple.html").await;
    driver.navigate().to(&site.url("/result.html")).await.unwrap();

    driver.navigate().back();
    assert_eq!(driver.title(), "Hello WebDriver");
    driver.navigate().back();
    assert_eq!(driver.current_url(), "about:blank");
    driver.navigate().back();
    assert_eq!(driver.current_url(), "about:blank");

    driver.navigate().forward();
    driver.navigate().forward();
    assert_eq!(driver.title(), "We Arrive Here");
    driver.navigate().forward();
    assert_eq!(driver.title(), "We Arrive Here");
}

#[tokio::test]
async fn navigating_after_back_drops_forward_entries() {
    let site = TestSite::start().await;
    let driver = site.open("/simple.html").await;
    driver.get(&site.url("/result.html")).await.unwrap();
    driver.navigate().back();
    driver.get(&site.url("/tables.html")).await.unwrap();

    driver.navigate().forward();
    assert_eq!(driver.title(), "Tables");
    driver.navigate().back();
    assert_eq!(driver.title(), "Hello WebDriver");
}

#[tokio::test]
async fn back_shows_the_page_as_it_was_left() {
    let site = TestSite::start().await;
    let driver = site.open("/form.html").await;
    driver.find_element(&By::id("working")).unwrap().send_keys("kept").await.unwrap();
    driver.get(&site.url("/result.html")).await.unwrap();
    driver.navigate().back();

    let value = driver.find_element(&By::id("working")).unwrap().dom_property("value");
    assert_eq!(value.as_deref(), Some("kept"));
}

#[tokio::test]
async fn refresh_reloads_and_discards_edits() {
    let site = TestSite::start().await;
    let driver = site.open("/form.html").await;
    driver.find_element(&By::id("working")).unwrap().send_keys("lost").await.unwrap();

    driver.navigate().refresh().await.unwrap();
    let value = driver.find_element(&By::id("working")).unwrap().dom_property("value");
    assert_eq!(value.as_deref(), Some(""));

    driver.navigate().back();
    assert_eq!(driver.current_url(), "about:blank");
}

#[tokio::test]
async fn refresh_of_about_blank_stays_blank() {
    common::init_test_tracing();
    let driver = HtmlDriver::new().unwrap();
    driver.navigate().refresh().await.unwrap();
    assert_eq!(driver.current_url(), "about:blank");
}

#[tokio::test]
async fn refresh_after_a_post_resubmits_the_form() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/order"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<form method="post" action="/place"><input name="item" value="tea"></form>"#
                .as_bytes()
                .to_vec(),
            "text/html",
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/place"))
        .and(body_string("item=tea"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<title>Placed</title>".as_bytes().to_vec(), "text/html"),
        )
        .expect(2)
        .mount(&server)
        .await;

    let driver = HtmlDriver::new().unwrap();
    driver.get(&format!("{}/order", server.uri())).await.unwrap();
    driver.find_element(&By::name("item")).unwrap().submit().await.unwrap();
    assert_eq!(driver.title(), "Placed");

    driver.navigate().refresh().await.unwrap();
    assert_eq!(driver.title(), "Placed");
    server.verify().await;
}

#[tokio::test]
async fn get_forms_append_to_the_action_query() {
    let site = TestSite::start().await;
    Mock::given(method("GET"))
        .and(path("/query-form.html"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<form action="echo?kept=1"><input name="q" value="fresh"></form>"#
                .as_bytes()
                .to_vec(),
            "text/html",
        ))
        .mount(&site.server)
        .await;

    let driver = site.open("/query-form.html").await;
    driver.find_element(&By::name("q")).unwrap().submit().await.unwrap();
    assert_eq!(driver.current_url(), site.url("/echo?kept=1&q=fresh"));
    assert_eq!(echoed(&driver), vec![pair("kept", "1"), pair("q", "fresh")]);
}
