//! Which config pointers a given deployment environment actually consumes —
//! used by `orc-cli config hash` to warn about keys set but never read.

pub enum DeployEnv {
    Dev,
    Staging,
    Prod,
}

pub fn consumed_pointers(env: DeployEnv) -> &'static [&'static str] {
    match env {
        DeployEnv::Dev => DEV,
        DeployEnv::Staging => STAGING,
        DeployEnv::Prod => PROD,
    }
}

static DEV: &[&str] = &["/db/url", "/llm/provider", "/repair/max_attempts"];

static STAGING: &[&str] = &[
    "/db/url",
    "/db/password_env",
    "/llm/provider",
    "/llm/api_key_env",
    "/repair/max_attempts",
    "/envelope/determinism_ceiling",
];

static PROD: &[&str] = &[
    "/db/url",
    "/db/password_env",
    "/llm/provider",
    "/llm/api_key_env",
    "/repair/max_attempts",
    "/envelope/determinism_ceiling",
    "/webhooks/human_review_queue",
    "/webhooks/completion_notices",
    "/webhooks/operator_alerts",
];
