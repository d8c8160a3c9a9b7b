#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::OnceLock;

use htmldriver_common::observability::{LogConfig, LogFormat};
use htmldriver_drivers::{By, HtmlDriver, SearchContext};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

static INIT_PATH: OnceLock<PathBuf> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let config = LogConfig {
            app_name: "htmldriver-tests",
            emit_stderr: true,
            format: LogFormat::from_env(),
            default_filter: "debug",
            ..LogConfig::default()
        };

        htmldriver_common::observability::init_logging(config).unwrap_or_default()
    });
}

const PAGES: &[(&str, &str)] = &[
    ("/simple.html", include_str!("../pages/simple.html")),
    ("/form.html", include_str!("../pages/form.html")),
    ("/select.html", include_str!("../pages/select.html")),
    ("/result.html", include_str!("../pages/result.html")),
    ("/tables.html", include_str!("../pages/tables.html")),
];

pub const SHALOM: &str = "\u{05E9}\u{05DC}\u{05D5}\u{05DD}";

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html")
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Echoes method, query and form parameters, and the received cookies.
struct Echo;

impl Respond for Echo {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut params: Vec<(String, String)> = request
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        params.extend(
            url::form_urlencoded::parse(&request.body).map(|(k, v)| (k.into_owned(), v.into_owned())),
        );
        let items: String = params
            .iter()
            .map(|(k, v)| format!(r#"<li class="param" data-name="{}">{}</li>"#, escape(k), escape(v)))
            .collect();
        let cookie = request
            .headers
            .get("cookie")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        html(&format!(
            r#"<html><head><title>Echo</title></head><body>
<p id="method">{}</p><ul id="params">{items}</ul><p id="cookie">{}</p>
</body></html>"#,
            request.method.as_str(),
            escape(cookie)
        ))
    }
}

/// `?action=add&name=..&value=..[&path=..][&httpOnly=true]` sets a cookie;
/// `?action=deleteAll` expires every cookie the request carried.
struct CookieEndpoint;

impl Respond for CookieEndpoint {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let query: Vec<(String, String)> = request
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let get = |key: &str| query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());
        let received = request
            .headers
            .get("cookie")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let mut response = html(&format!(
            r#"<title>Cookies</title><p id="received">{}</p>"#,
            escape(&received)
        ));
        match get("action") {
            Some("add") => {
                let mut cookie = format!("{}={}", get("name").unwrap_or("x"), get("value").unwrap_or(""));
                if let Some(p) = get("path") {
                    cookie.push_str(&format!(";path={p}"));
                }
                if get("httpOnly") == Some("true") {
                    cookie.push_str(";HttpOnly");
                }
                response = response.append_header("Set-Cookie", cookie.as_str());
            }
            Some("deleteAll") => {
                for pair in received.split(';') {
                    let name = pair.split('=').next().unwrap_or_default().trim();
                    if !name.is_empty() {
                        response = response.append_header(
                            "Set-Cookie",
                            format!("{name}=;expires=Thu, 01 Jan 1970 00:00:00 GMT").as_str(),
                        );
                    }
                }
            }
            _ => {}
        }
        response
    }
}

/// Mock web site serving the HTML fixtures plus a few dynamic endpoints.
pub struct TestSite {
    pub server: MockServer,
}

impl TestSite {
    pub async fn start() -> Self {
        init_test_tracing();
        let server = MockServer::start().await;
        for (page, body) in PAGES {
            Mock::given(method("GET"))
                .and(path(*page))
                .respond_with(html(body))
                .mount(&server)
                .await;
        }
        Mock::given(path("/echo"))
            .respond_with(Echo)
            .mount(&server)
            .await;
        Mock::given(path("/cookie"))
            .respond_with(CookieEndpoint)
            .mount(&server)
            .await;
        Mock::given(path("/redirect"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "result.html"))
            .mount(&server)
            .await;
        let utf16: Vec<u8> = format!(
            "<html><title>Character encoding (UTF 16)</title><body><p id='text'>{SHALOM}</p></body></html>"
        )
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect();
        Mock::given(path("/encoding"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(utf16, "text/html;charset=UTF-16LE"))
            .mount(&server)
            .await;
        Mock::given(path("/status/500"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_raw("<title>Broken</title>".as_bytes().to_vec(), "text/html"),
            )
            .mount(&server)
            .await;
        Mock::given(path("/missing.html"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_raw("<title>Not found</title>".as_bytes().to_vec(), "text/html"),
            )
            .mount(&server)
            .await;
        Self { server }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server.uri(), path)
    }

    /// Fresh driver with `path` loaded.
    pub async fn open(&self, path: &str) -> HtmlDriver {
        let driver = HtmlDriver::new().expect("driver");
        driver.get(&self.url(path)).await.expect("page loads");
        driver
    }
}

/// Parameters listed by the echo page currently shown.
pub fn echoed(driver: &HtmlDriver) -> Vec<(String, String)> {
    driver
        .find_elements(&By::css("li.param"))
        .expect("valid selector")
        .into_iter()
        .map(|li| (li.dom_attribute("data-name").unwrap_or_default(), li.text()))
        .collect()
}

pub fn pair(k: &str, v: &str) -> (String, String) {
    (k.to_string(), v.to_string())
}
