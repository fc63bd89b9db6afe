use std::{env, fs};

use strand_core::config::loader::load_process_config;

#[test]
fn process_config_file_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("strand.toml");

    let toml_content = r#"
function_addr = "127.0.0.1:8585"
api_url = "https://control.example.com"
log_level = "debug"
body_limit_bytes = 2048
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid file parses
    let cfg = load_process_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.function_addr.as_deref(), Some("127.0.0.1:8585"));
    assert_eq!(cfg.api_url.as_deref(), Some("https://control.example.com"));
    assert_eq!(cfg.body_limit_bytes, 2048);
    assert!(cfg.access_token.is_none());

    // 2) Env override should win over file
    unsafe {
        env::set_var("STRAND_FUNCTION_ADDR", "0.0.0.0:9000");
        env::set_var("STRAND_ACCESS_TOKEN", "secret-token");
    }
    let cfg_env = load_process_config(path.to_str()).expect("should parse with env overrides");
    assert_eq!(cfg_env.function_addr.as_deref(), Some("0.0.0.0:9000"));
    assert_eq!(cfg_env.access_token.as_deref(), Some("secret-token"));
    unsafe {
        env::remove_var("STRAND_FUNCTION_ADDR");
        env::remove_var("STRAND_ACCESS_TOKEN");
    }

    // 3) A missing file falls back to defaults
    let defaults = load_process_config(Some("/no/such/strand.toml")).expect("defaults");
    assert_eq!(defaults.log_level, "info");

    // 4) Invalid values are rejected
    let invalid_path = dir.path().join("invalid.toml");
    fs::write(&invalid_path, "log_level = \"chatty\"\n").expect("write invalid toml");
    let err = load_process_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.to_string().contains("log_level must be one of"));
}
