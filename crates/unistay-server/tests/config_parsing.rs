use std::{env, fs, time::Duration};

use unistay_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("unistay.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8081
body_limit_bytes = 4096
wizard_ttl = "10m"

[logging]
level = "debug"

[auth]
api_base_url = "https://api.unistay.test"
request_timeout = "5s"

[auth.session]
secret = "integration-secret-integration-secret"
max_age = "7d"
refresh_window = "2m"

[auth.cookie]
secure = true
same_site = "strict"

[auth.oauth]
public_base_url = "https://unistay.test"

[[auth.oauth.providers]]
id = "google"
client_id = "google-client"
client_secret = "google-secret"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.server.wizard_ttl, Duration::from_secs(600));
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.auth.api_base_url, "https://api.unistay.test");
    assert_eq!(cfg.auth.request_timeout, Duration::from_secs(5));
    assert_eq!(cfg.auth.session.max_age, Duration::from_secs(7 * 24 * 3600));
    assert!(cfg.auth.cookie.secure);
    assert_eq!(cfg.auth.cookie.name, "unistay.session");
    assert_eq!(cfg.auth.oauth.providers.len(), 1);
    assert_eq!(cfg.auth.oauth.providers[0].client_id, "google-client");

    // 2) Env override should win over file
    unsafe {
        env::set_var("UNISTAY__SERVER__PORT", "9090");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.server.port, 9090);
    unsafe {
        env::remove_var("UNISTAY__SERVER__PORT");
    }

    // 3) Invalid values are rejected by validation
    let bad = dir.path().join("bad.toml");
    fs::write(
        &bad,
        r#"
[auth.session]
secret = "too-short"
"#,
    )
    .expect("write bad toml");
    let err = load_config(bad.to_str()).expect_err("short secret must fail");
    assert!(err.contains("secret"), "unexpected error: {err}");

    let bad_level = dir.path().join("bad_level.toml");
    fs::write(&bad_level, "[logging]\nlevel = \"chatty\"\n").expect("write bad toml");
    let err = load_config(bad_level.to_str()).expect_err("bad level must fail");
    assert!(err.contains("logging.level"));
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tmp dir");

    // Defaults alone carry no session secret.
    let missing = dir.path().join("does-not-exist.toml");
    let err = load_config(missing.to_str()).expect_err("defaults need a secret");
    assert!(err.contains("auth.session.secret"), "unexpected error: {err}");

    let minimal = dir.path().join("minimal.toml");
    fs::write(
        &minimal,
        "[auth.session]\nsecret = \"minimal-secret-minimal-secret-minimal\"\n",
    )
    .expect("write toml");
    let cfg = load_config(minimal.to_str()).expect("defaults plus secret are valid");
    assert_eq!(cfg.server.port, 3000);
    assert_eq!(cfg.auth.session.max_age, Duration::from_secs(30 * 24 * 3600));
}
