//! Single source of truth for runtime secret resolution.
//!
//! Config YAML stores only **env var NAMES** (e.g. `"ORC_LLM_API_KEY"`).
//! Callers invoke [`resolve_secrets_for_env`] once at startup and pass the
//! returned [`ResolvedSecrets`] into constructors; never scatter
//! `std::env::var` calls elsewhere. `Debug` impls redact values; error
//! messages name the env var, never its value.
//!
//! | Deployment env | Required                        |
//! |-----------------|----------------------------------|
//! | `prod`           | LLM provider api key             |
//! | `staging`        | LLM provider api key             |
//! | `dev`            | nothing (all optional)           |
//!
//! Notification webhooks are always optional in every environment.

use anyhow::{bail, Result};
use serde_json::Value;

/// Notification webhook URLs resolved from the environment. Every channel is
/// optional. Values are redacted in `Debug` output.
#[derive(Clone)]
pub struct ResolvedWebhooks {
    pub human_review_queue: Option<String>,
    pub completion_notices: Option<String>,
    pub operator_alerts: Option<String>,
}

impl std::fmt::Debug for ResolvedWebhooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedWebhooks")
            .field("human_review_queue", &self.human_review_queue.as_ref().map(|_| "<REDACTED>"))
            .field("completion_notices", &self.completion_notices.as_ref().map(|_| "<REDACTED>"))
            .field("operator_alerts", &self.operator_alerts.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

/// All runtime-resolved secrets for one daemon instantiation. Built once at
/// startup via [`resolve_secrets_for_env`]; do not scatter `std::env::var`
/// calls elsewhere. Values are redacted in `Debug` output.
#[derive(Clone)]
pub struct ResolvedSecrets {
    pub llm_api_key: Option<String>,
    pub db_password: Option<String>,
    pub webhooks: ResolvedWebhooks,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("llm_api_key", &self.llm_api_key.as_ref().map(|_| "<REDACTED>"))
            .field("db_password", &self.db_password.as_ref().map(|_| "<REDACTED>"))
            .field("webhooks", &self.webhooks)
            .finish()
    }
}

struct SecretEnvNames {
    llm_api_key_var: String,
    db_password_var: String,
    human_review_queue_var: Option<String>,
    completion_notices_var: Option<String>,
    operator_alerts_var: Option<String>,
}

fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

fn parse_env_names(config_json: &Value) -> SecretEnvNames {
    SecretEnvNames {
        llm_api_key_var: read_str_at(config_json, "/llm/api_key_env")
            .unwrap_or_else(|| "ORC_LLM_API_KEY".to_string()),
        db_password_var: read_str_at(config_json, "/db/password_env")
            .unwrap_or_else(|| "ORC_DB_PASSWORD".to_string()),
        human_review_queue_var: read_str_at(config_json, "/webhooks/human_review_queue"),
        completion_notices_var: read_str_at(config_json, "/webhooks/completion_notices"),
        operator_alerts_var: read_str_at(config_json, "/webhooks/operator_alerts"),
    }
}

/// Resolve all secrets from the environment for the given deployment `env`.
///
/// `env` is case-insensitive: `"prod"`, `"staging"`, or `"dev"`.
///
/// Returns `Err` naming the first missing required env var; the actual
/// value is never mentioned.
pub fn resolve_secrets_for_env(config_json: &Value, env: &str) -> Result<ResolvedSecrets> {
    let names = parse_env_names(config_json);
    let env_lower = env.trim().to_ascii_lowercase();

    let llm_api_key = resolve_env(&names.llm_api_key_var);
    let db_password = resolve_env(&names.db_password_var);

    match env_lower.as_str() {
        "prod" | "staging" => {
            if llm_api_key.is_none() {
                bail!(
                    "SECRETS_MISSING env={env_lower}: required env var '{}' \
                     (LLM provider api key) is not set or empty",
                    names.llm_api_key_var,
                );
            }
        }
        "dev" => {
            // no required secrets in dev
        }
        other => {
            bail!(
                "SECRETS_UNKNOWN_ENV: unrecognised deployment env '{other}'; \
                 expected one of: prod | staging | dev",
            );
        }
    }

    let webhooks = ResolvedWebhooks {
        human_review_queue: names.human_review_queue_var.as_deref().and_then(resolve_env),
        completion_notices: names.completion_notices_var.as_deref().and_then(resolve_env),
        operator_alerts: names.operator_alerts_var.as_deref().and_then(resolve_env),
    };

    Ok(ResolvedSecrets {
        llm_api_key,
        db_password,
        webhooks,
    })
}
