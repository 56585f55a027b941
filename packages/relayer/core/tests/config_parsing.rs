use std::path::PathBuf;

use hub_relayer_core::{
    config::{parse_config, RelayerConfig},
    RelayerError,
};
use serde_json::json;
use tempfile::tempdir;

/// Build a minimal valid relayer JSON configuration so that we can tweak it
/// in each test.
fn base_relayer_json() -> serde_json::Value {
    json!({
        "hub": {
            "chain_id": "dymension_100-1",
            "rpc_url": "http://localhost:36657",
            "denom": "adym",
            "binary": "dymd"
        },
        "child": {
            "chain_id": "rollapp_1-1",
            "rpc_url": "http://localhost:26657",
            "denom": "urax",
            "binary": "rollapp-evm"
        }
    })
}

fn parse(value: &serde_json::Value) -> Result<RelayerConfig, RelayerError> {
    let config: RelayerConfig = parse_config(&value.to_string())?;
    config.validate()?;
    Ok(config)
}

fn config_error(value: &serde_json::Value) -> String {
    match parse(value) {
        Err(RelayerError::Configuration(message)) => message,
        other => panic!("expected a configuration error, got {other:?}"),
    }
}

// ----------------- Defaults -----------------

#[test]
fn minimal_config_uses_defaults() {
    let config = parse(&base_relayer_json()).unwrap();

    assert_eq!(config.pricing.hub_one_day_relay_price, 1);
    assert_eq!(config.pricing.child_one_day_relay_price, 1);
    assert_eq!(config.toolchain.binary, PathBuf::from("rly"));
    assert_eq!(config.toolchain.path_name, "hub-rollapp");
    assert_eq!(config.jobs.update_clients_interval_secs, 3600);
    assert_eq!(config.jobs.relay_packets_interval_secs, 5);
    assert_eq!(config.jobs.relay_acks_interval_secs, 5);
    assert_eq!(config.observability.level(), tracing::Level::INFO);
    assert!(!config.observability.use_otel);
    assert!(config.metrics.is_none());
}

#[test]
fn overrides_are_honoured() {
    let mut json_val = base_relayer_json();
    json_val["pricing"] = json!({ "hub_one_day_relay_price": 5_000_000_000_000_000_000u128 });
    json_val["jobs"] = json!({ "relay_packets_interval_secs": 2 });
    json_val["observability"] = json!({ "level": "debug" });
    json_val["metrics"] = json!({ "address": "127.0.0.1", "port": 9100 });

    let config = parse(&json_val).unwrap();

    assert_eq!(config.pricing.hub_one_day_relay_price, 5_000_000_000_000_000_000);
    assert_eq!(config.pricing.child_one_day_relay_price, 1);
    assert_eq!(config.jobs.relay_packets_interval_secs, 2);
    assert_eq!(config.jobs.update_clients_interval_secs, 3600);
    assert_eq!(config.observability.level(), tracing::Level::DEBUG);
    assert_eq!(config.metrics.unwrap().port, 9100);
}

#[test]
fn unknown_log_level_falls_back_to_info() {
    let mut json_val = base_relayer_json();
    json_val["observability"] = json!({ "level": "chatty" });
    assert_eq!(parse(&json_val).unwrap().observability.level(), tracing::Level::INFO);
}

// ----------------- Missing and mistyped fields -----------------

#[test]
fn missing_hub_fails() {
    let mut json_val = base_relayer_json();
    json_val.as_object_mut().unwrap().remove("hub");
    assert!(config_error(&json_val).contains("hub"));
}

#[test]
fn missing_child_rpc_url_reports_path() {
    let mut json_val = base_relayer_json();
    json_val["child"].as_object_mut().unwrap().remove("rpc_url");
    let message = config_error(&json_val);
    assert!(message.contains("config error at child"), "{message}");
    assert!(message.contains("rpc_url"), "{message}");
}

#[test]
fn interval_wrong_type_reports_path() {
    let mut json_val = base_relayer_json();
    json_val["jobs"] = json!({ "relay_acks_interval_secs": "often" });
    let message = config_error(&json_val);
    assert!(message.contains("jobs.relay_acks_interval_secs"), "{message}");
    assert!(message.contains("invalid type"), "{message}");
}

// ----------------- Validation -----------------

#[test]
fn empty_chain_id_is_rejected() {
    let mut json_val = base_relayer_json();
    json_val["hub"]["chain_id"] = json!("  ");
    assert_eq!(config_error(&json_val), "hub.chain_id must not be empty");
}

#[test]
fn identical_chain_ids_are_rejected() {
    let mut json_val = base_relayer_json();
    json_val["child"]["chain_id"] = json!("dymension_100-1");
    assert!(config_error(&json_val).contains("share the chain id"));
}

#[test]
fn zero_interval_is_rejected() {
    let mut json_val = base_relayer_json();
    json_val["jobs"] = json!({ "update_clients_interval_secs": 0 });
    assert_eq!(
        config_error(&json_val),
        "jobs.update_clients_interval_secs must be greater than zero"
    );
}

// ----------------- Loading from the home directory -----------------

#[test]
fn from_home_reads_relayer_config() {
    let home = tempdir().unwrap();
    let path = RelayerConfig::path(home.path());
    assert_eq!(path, home.path().join("relayer").join("config.json"));

    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, base_relayer_json().to_string()).unwrap();

    let config = RelayerConfig::from_home(home.path()).unwrap();
    assert_eq!(config.child.chain_id, "rollapp_1-1");
}

#[test]
fn from_home_without_config_is_a_configuration_error() {
    let home = tempdir().unwrap();
    let err = RelayerConfig::from_home(home.path()).unwrap_err();
    assert!(matches!(err, RelayerError::Configuration(ref m) if m.contains("failed to read config file")));
}
