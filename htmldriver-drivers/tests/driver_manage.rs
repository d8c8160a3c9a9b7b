mod common;

use std::time::Duration;

use common::TestSite;
use htmldriver_config::DriverConfigLoader;
use htmldriver_drivers::{HtmlDriver, Point, WebDriverError};
use serial_test::serial;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn timeouts_round_trip_through_manage() {
    common::init_test_tracing();
    let driver = HtmlDriver::new().unwrap();
    let timeouts = driver.manage().timeouts();
    assert_eq!(timeouts.implicit_wait(), Duration::ZERO);
    assert_eq!(timeouts.page_load(), Duration::from_secs(30));

    timeouts
        .set_implicit_wait(Duration::from_millis(250))
        .set_script(Duration::from_secs(2))
        .set_page_load(Duration::from_secs(5));
    assert_eq!(driver.manage().timeouts().implicit_wait(), Duration::from_millis(250));
    assert_eq!(driver.manage().timeouts().script(), Duration::from_secs(2));
    assert_eq!(driver.manage().timeouts().page_load(), Duration::from_secs(5));
}

#[tokio::test]
async fn page_load_timeout_bounds_slow_pages() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<title>late</title>".as_bytes().to_vec(), "text/html")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let driver = HtmlDriver::new().unwrap();
    driver.manage().timeouts().set_page_load(Duration::from_millis(100));
    let err = driver
        .get(&format!("{}/slow", server.uri()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("timed out"), "{err}");
    assert_eq!(driver.current_url(), "about:blank");
}

#[tokio::test]
async fn window_is_fixed_and_logs_are_empty() {
    common::init_test_tracing();
    let driver = HtmlDriver::new().unwrap();
    let window = driver.manage().window();
    window.maximize();
    window.set_position(Point { x: 10, y: 20 });
    assert_eq!(window.position(), Point::default());
    assert_eq!(window.size().width, i32::MAX);

    let logs = driver.manage().logs();
    assert!(logs.available_log_types().is_empty());
    assert!(logs.get("browser").is_empty());
}

#[tokio::test]
async fn yaml_settings_shape_the_session() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/agent"))
        .and(header("user-agent", "suite-agent/1.0"))
        .and(header("x-suite", "functional"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<title>Agent seen</title>".as_bytes().to_vec(), "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let driver = HtmlDriver::from_loader(DriverConfigLoader::new().with_yaml_str(
        r#"
driver:
  user_agent: "suite-agent/1.0"
  timeouts:
    page_load_ms: 4000
  default_headers:
    x-suite: functional
"#,
    ))
    .unwrap();
    assert_eq!(driver.manage().timeouts().page_load(), Duration::from_secs(4));

    driver.get(&format!("{}/agent", server.uri())).await.unwrap();
    assert_eq!(driver.title(), "Agent seen");
}

#[tokio::test]
#[serial]
async fn environment_overrides_redirect_limit() {
    let site = TestSite::start().await;
    let driver = temp_env::with_var("HTMLDRIVER__DRIVER__MAX_REDIRECTS", Some("0"), || {
        HtmlDriver::from_loader(DriverConfigLoader::new())
    })
    .unwrap();

    let err = driver.get(&site.url("/redirect")).await.unwrap_err();
    assert!(err.to_string().contains("too many redirects"), "{err}");
}

#[tokio::test]
#[serial]
async fn malformed_configuration_is_a_config_error() {
    common::init_test_tracing();
    let result = HtmlDriver::from_loader(
        DriverConfigLoader::new().with_yaml_str("driver:\n  max_redirects: [1, 2]"),
    );
    assert!(matches!(result, Err(WebDriverError::Config(_))));
}
