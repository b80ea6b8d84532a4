use std::{env, fs};

use companyhub_server::config::loader::load_config;
use companyhub_server::config::{ConsumerStart, EventLogBackend, StorageBackend};

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("companyhub.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8081
request_timeout_ms = 1000
body_limit_bytes = 1024

[storage]
backend = "memory"

[redis]
url = "redis://cache:6379"
pool_size = 4

[event_log]
backend = "redis"
stream_key = "company-events"
max_len = 10000

[coherence]
publish_mutations = false

[coherence.consumer]
start = "beginning"
batch_size = 50
block_ms = 2000
backoff_initial_ms = 200
backoff_max_ms = 10000

[auth]
access_token_secret = "file-secret"
access_token_ttl_secs = 600

[logging]
level = "debug"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.storage.backend, StorageBackend::Memory);
    assert_eq!(cfg.redis.pool_size, 4);
    assert_eq!(cfg.event_log.backend, EventLogBackend::Redis);
    assert_eq!(cfg.event_log.stream_key, "company-events");
    assert_eq!(cfg.event_log.max_len, Some(10_000));
    assert!(!cfg.coherence.publish_mutations);
    assert_eq!(cfg.coherence.consumer.start, ConsumerStart::Beginning);
    assert_eq!(cfg.coherence.consumer.batch_size, 50);
    assert_eq!(cfg.auth.access_token_ttl_secs, 600);
    assert!(cfg.auth.enabled);
    assert_eq!(cfg.logging.level, "debug");

    // 2) Env override should win over file
    unsafe {
        env::set_var("COMPANYHUB__COHERENCE__CONSUMER__BATCH_SIZE", "7");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.coherence.consumer.batch_size, 7);
    unsafe {
        env::remove_var("COMPANYHUB__COHERENCE__CONSUMER__BATCH_SIZE");
    }

    // 3) Invalid config (backoff initial > max) should error
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[storage]
backend = "memory"

[auth]
enabled = false

[coherence.consumer]
backoff_initial_ms = 5000
backoff_max_ms = 100
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("backoff_initial_ms"));

    // 4) Enabled auth without a secret is rejected
    let no_secret_path = dir.path().join("no-secret.toml");
    fs::write(&no_secret_path, "[storage]\nbackend = \"memory\"\n").expect("write toml");
    let err = load_config(no_secret_path.to_str()).expect_err("expected missing secret");
    assert!(err.contains("access_token_secret"));

    // 5) An explicit path that does not exist is an error
    let missing = dir.path().join("missing.toml");
    let err = load_config(missing.to_str()).expect_err("expected missing file error");
    assert!(err.contains("not found"));
}

#[test]
fn defaults_serialize_to_loadable_toml() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("defaults.toml");

    let mut cfg = companyhub_server::AppConfig::default();
    cfg.auth.access_token_secret = "s3cret".into();
    let rendered = toml::to_string(&cfg).expect("render toml");
    fs::write(&path, rendered).expect("write toml");

    let loaded = load_config(path.to_str()).expect("reload defaults");
    assert_eq!(loaded.server.port, cfg.server.port);
    assert_eq!(loaded.event_log.stream_key, "company");
    assert_eq!(loaded.coherence.consumer.block_ms, cfg.coherence.consumer.block_ms);
}
