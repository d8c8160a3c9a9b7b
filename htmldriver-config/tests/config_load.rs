use htmldriver_config::DriverConfigLoader;
use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

const FILE_YAML: &str = r#"
version: "0.4"
driver:
  user_agent: "${HTMLDRIVER_TEST_AGENT}"
  accept_language: "en-GB"
  max_redirects: 7
  timeouts:
    page_load_ms: 1500
  default_headers:
    x-suite: functional
"#;

#[test]
#[serial]
fn loads_file_and_expands_placeholders() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "htmldriver.yaml", FILE_YAML);

    temp_env::with_var("HTMLDRIVER_TEST_AGENT", Some("suite-agent/1.0"), || {
        let config = DriverConfigLoader::new()
            .with_file(&p)
            .load()
            .expect("load driver config");

        assert_eq!(config.version.as_deref(), Some("0.4"));
        assert_eq!(config.driver.user_agent, "suite-agent/1.0");
        assert_eq!(config.driver.accept_language.as_deref(), Some("en-GB"));
        assert_eq!(config.driver.max_redirects, 7);
        assert_eq!(config.driver.timeouts.page_load_ms, 1500);
        assert_eq!(config.driver.timeouts.connect_ms, 5_000);
        assert_eq!(
            config.driver.default_headers.get("x-suite").map(String::as_str),
            Some("functional")
        );
    });
}

#[test]
#[serial]
fn environment_overrides_file_values() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "htmldriver.yaml", FILE_YAML);

    temp_env::with_vars(
        [
            ("HTMLDRIVER_TEST_AGENT", Some("suite-agent/1.0")),
            ("HTMLDRIVER__DRIVER__MAX_REDIRECTS", Some("2")),
        ],
        || {
            let config = DriverConfigLoader::new().with_file(&p).load().unwrap();
            assert_eq!(config.driver.max_redirects, 2);
            assert_eq!(config.driver.timeouts.page_load_ms, 1500);
        },
    );
}

#[test]
#[serial]
fn missing_required_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("absent.yaml");
    assert!(DriverConfigLoader::new().with_file(&missing).load().is_err());
}

#[test]
#[serial]
fn missing_optional_file_falls_back_to_defaults() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("absent.yaml");
    let config = DriverConfigLoader::new()
        .with_optional_file(&missing)
        .load()
        .unwrap();
    assert_eq!(config.driver.max_redirects, 20);
}
