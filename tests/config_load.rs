// tests/config_load.rs
use std::time::Duration;
use std::{env, fs};

use wetran::config::dashboard::{
    DashboardConfig, ENV_CACHE_TTL_SECS, ENV_CONFIG_PATH, ENV_TRAFFIC_API_KEY,
    ENV_UPSTREAM_TIMEOUT_MS,
};
use wetran::{bootstrap, ProviderId};

fn clear_env() {
    for k in [
        ENV_CONFIG_PATH,
        ENV_CACHE_TTL_SECS,
        ENV_UPSTREAM_TIMEOUT_MS,
        ENV_TRAFFIC_API_KEY,
    ] {
        env::remove_var(k);
    }
}

#[test]
fn shipped_config_parses() {
    let cfg = DashboardConfig::load_from_file("config/dashboard.toml").expect("shipped config");
    assert_eq!(cfg.cache_ttl(), Duration::from_secs(300));
    assert!(cfg.providers.fixture);
    assert!(cfg.internal_base_url().is_some());
}

#[serial_test::serial]
#[test]
fn default_uses_env_path_then_repo_file_then_builtins() {
    clear_env();
    // Isolate CWD so the repo's own config/ is not picked up.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    // 1) Nothing on disk -> built-in defaults
    let cfg = DashboardConfig::load_default().unwrap();
    assert_eq!(cfg.cache.ttl_secs, 300);
    assert_eq!(cfg.upstream.timeout_ms, 10_000);

    // 2) ./config/dashboard.toml
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(
        tmp.path().join("config/dashboard.toml"),
        "[cache]\nttl_secs = 60\n",
    )
    .unwrap();
    assert_eq!(DashboardConfig::load_default().unwrap().cache.ttl_secs, 60);

    // 3) WETRAN_CONFIG_PATH wins
    let p_env = tmp.path().join("other.toml");
    fs::write(&p_env, "[cache]\nttl_secs = 5\n").unwrap();
    env::set_var(ENV_CONFIG_PATH, &p_env);
    assert_eq!(DashboardConfig::load_default().unwrap().cache.ttl_secs, 5);

    // 4) ...but must exist
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml"));
    assert!(DashboardConfig::load_default().is_err());

    env::set_current_dir(old).unwrap();
    clear_env();
}

#[serial_test::serial]
#[test]
fn env_overrides_numbers_and_zero_timeout_falls_back() {
    clear_env();
    env::set_var(ENV_CACHE_TTL_SECS, "7");
    env::set_var(ENV_UPSTREAM_TIMEOUT_MS, "0");
    let cfg = DashboardConfig::from_toml_str("[cache]\nttl_secs = 60\n").unwrap();
    assert_eq!(cfg.cache_ttl(), Duration::from_secs(7));
    assert_eq!(cfg.upstream_timeout(), Duration::from_secs(10));
    clear_env();
}

#[serial_test::serial]
#[test]
fn bootstrap_registers_configured_providers() {
    clear_env();
    env::set_var(ENV_TRAFFIC_API_KEY, "ta-secret");
    let cfg = DashboardConfig::from_toml_str(
        r#"
        [providers]
        fixture = false

        [providers.trafficapi]
        base_url = "https://api.trafficapi.io"
        api_key = "ENV"
        "#,
    )
    .unwrap();

    let agg = bootstrap::build_aggregator(&cfg).expect("aggregator");
    // `internal` defaults on and points at the auth backend.
    assert_eq!(
        agg.providers(),
        vec![ProviderId::InternalStats, ProviderId::TrafficApiLike]
    );
    assert!(!agg.session().is_authenticated());
    clear_env();
}
