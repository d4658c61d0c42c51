use inet_common::observability::LogFormat;
use inet_config::InetConfigLoader;
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
version: "1"
scraper:
  max_concurrency: 2
  timeout_secs: 5
  twitter_selector:
    css: "a[href*='x.com']"
logging:
  format: json
  stderr: true
sources:
  epo:
    key: "${INET_TEST_OPS_KEY}"
    secret: "${INET_TEST_OPS_SECRET}"
  companies_house:
    api_key: "${INET_TEST_CH_KEY}"
    cache: false
"#;

#[test]
#[serial]
fn file_with_env_placeholders() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "inet.yaml", FILE_YAML);

    temp_env::with_vars(
        [
            ("INET_TEST_OPS_KEY", Some("ops-key")),
            ("INET_TEST_OPS_SECRET", Some("ops-secret")),
            ("INET_TEST_CH_KEY", Some("ch-key")),
        ],
        || {
            let config = InetConfigLoader::new()
                .with_file(&p)
                .load()
                .expect("load config");

            assert_eq!(config.scraper.max_concurrency, 2);
            assert_eq!(config.scraper.timeout_secs, 5);
            assert!(config.scraper.about);
            assert_eq!(config.logging.format, LogFormat::Json);

            let twitter = config.scraper.twitter_selector.unwrap();
            assert_eq!(twitter.css, "a[href*='x.com']");
            assert_eq!(twitter.attr, "href");

            let epo = config.sources.epo.unwrap();
            assert_eq!(epo.credentials(), Some(("ops-key", "ops-secret")));
            assert_eq!(epo.min_interval_ms, 1000);
            assert!(epo.cache);

            let ch = config.sources.companies_house.unwrap();
            assert_eq!(ch.api_key(), Some("ch-key"));
            assert!(!ch.cache);
        },
    );
}

#[test]
#[serial]
fn environment_overrides_file() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "inet.yaml", FILE_YAML);

    temp_env::with_vars(
        [
            ("INET_SCRAPER__MAX_CONCURRENCY", Some("8")),
            ("INET_SCRAPER__ABOUT", Some("false")),
            ("INET_TEST_OPS_KEY", None),
        ],
        || {
            let config = InetConfigLoader::new().with_file(&p).load().unwrap();
            assert_eq!(config.scraper.max_concurrency, 8);
            assert!(!config.scraper.about);
            assert!(config.sources.epo.unwrap().credentials().is_none());
        },
    );
}

#[test]
#[serial]
fn later_snippets_override_earlier_files() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "inet.yaml", FILE_YAML);

    let config = InetConfigLoader::new()
        .with_file(&p)
        .with_yaml_str("scraper:\n  timeout_secs: 60")
        .load()
        .unwrap();
    assert_eq!(config.scraper.timeout_secs, 60);
    assert_eq!(config.scraper.max_concurrency, 2);
}

#[test]
#[serial]
fn missing_optional_file_falls_back_to_defaults() {
    let tmp = TempDir::new().unwrap();
    let config = InetConfigLoader::new()
        .with_optional_file(tmp.path().join("absent.yaml"))
        .load()
        .expect("optional file may be missing");
    assert_eq!(config.scraper.max_concurrency, 4);
}

#[test]
#[serial]
fn missing_required_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let err = InetConfigLoader::new()
        .with_file(tmp.path().join("absent.yaml"))
        .load();
    assert!(err.is_err());
}

#[test]
#[serial]
fn malformed_section_is_reported() {
    let err = InetConfigLoader::new()
        .with_yaml_str("scraper:\n  max_concurrency: many")
        .load()
        .unwrap_err();
    assert!(err.to_string().contains("max_concurrency") || err.to_string().contains("invalid"));
}
