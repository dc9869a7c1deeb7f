//! Deployment-env-aware fail-closed enforcement of `resolve_secrets_for_env`.
//!
//! Uses globally-unique sentinel env var names that are never set in any CI
//! or dev environment, so no test needs `std::env::set_var` (which would
//! race across parallel tests).

use orc_config::load_layered_yaml_from_strings;
use orc_config::secrets::resolve_secrets_for_env;

fn load(yaml: &str) -> serde_json::Value {
    load_layered_yaml_from_strings(&[yaml])
        .expect("test yaml must parse cleanly")
        .config_json
}

#[test]
fn prod_fails_when_llm_api_key_missing() {
    let yaml = r#"
llm:
  api_key_env: "ORC_SENTINEL_PROD_LLM_KEY_A1"
"#;
    let cfg = load(yaml);
    let result = resolve_secrets_for_env(&cfg, "prod");
    assert!(result.is_err());
    let msg = result.unwrap_err().to_string();
    assert!(msg.contains("SECRETS_MISSING"));
    assert!(msg.contains("env=prod"));
    assert!(msg.contains("ORC_SENTINEL_PROD_LLM_KEY_A1"));
}

#[test]
fn staging_fails_when_llm_api_key_missing() {
    let yaml = r#"
llm:
  api_key_env: "ORC_SENTINEL_STAGING_LLM_KEY_B2"
"#;
    let cfg = load(yaml);
    let result = resolve_secrets_for_env(&cfg, "staging");
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("SECRETS_MISSING"));
}

#[test]
fn dev_succeeds_with_no_keys_set() {
    let yaml = r#"
llm:
  api_key_env: "ORC_SENTINEL_DEV_LLM_KEY_C3"
db:
  password_env: "ORC_SENTINEL_DEV_DB_PW_C3"
webhooks:
  human_review_queue: "ORC_SENTINEL_DEV_WEBHOOK_C3"
"#;
    let cfg = load(yaml);
    let result = resolve_secrets_for_env(&cfg, "dev");
    assert!(result.is_ok(), "{:?}", result.err());

    let secrets = result.unwrap();
    assert!(secrets.llm_api_key.is_none());
    assert!(secrets.db_password.is_none());
    assert!(secrets.webhooks.human_review_queue.is_none());
}

#[test]
fn unknown_env_is_rejected() {
    let yaml = r#"llm: { api_key_env: "SOME_KEY" }"#;
    let cfg = load(yaml);
    let result = resolve_secrets_for_env(&cfg, "canary");
    assert!(result.is_err());
    let msg = result.unwrap_err().to_string();
    assert!(msg.contains("SECRETS_UNKNOWN_ENV"));
    assert!(msg.contains("canary"));
}

#[test]
fn config_json_stores_var_names_not_values() {
    let yaml = r#"
llm:
  api_key_env: "ORC_LLM_API_KEY_PROD"
webhooks:
  operator_alerts: "ORC_WEBHOOK_OPERATOR_ALERTS"
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    assert_eq!(
        loaded.config_json.pointer("/llm/api_key_env").and_then(|v| v.as_str()),
        Some("ORC_LLM_API_KEY_PROD")
    );
}

#[test]
fn resolved_secrets_debug_output_is_redacted() {
    let yaml = r#"
llm:
  api_key_env: "ORC_SENTINEL_DBG_KEY_D4"
"#;
    let cfg = load(yaml);
    let secrets = resolve_secrets_for_env(&cfg, "dev").expect("dev must not fail");
    let debug_str = format!("{secrets:?}");
    assert!(debug_str.contains("None") || debug_str.contains("REDACTED"));
}
