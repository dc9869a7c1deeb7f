//! Context isolation: build an agent's input bundle strictly from its
//! envelope's `required_inputs`, never from the whole ledger.
//!
//! Grounded on `orc_envelope::RequestScopedStore`'s stated purpose (two
//! requests in flight must never see each other's artifacts) generalized one
//! level further: within a *single* invocation, an agent must never see an
//! artifact type its own envelope didn't ask for.

use orc_schemas::{Artifact, ArtifactType, RequestId};
use sqlx::PgPool;
use std::collections::{BTreeMap, HashSet};

use crate::error::HostError;

/// The isolated context handed to an agent's body: one artifact per
/// required input role, keyed by the type it fills.
#[derive(Debug, Clone)]
pub struct InputBundle {
    artifacts: BTreeMap<ArtifactType, Artifact>,
}

impl InputBundle {
    pub fn get(&self, artifact_type: ArtifactType) -> Option<&Artifact> {
        self.artifacts.get(&artifact_type)
    }

    /// `input_hashes` in a stable order, for the `request_hash`/`content_hash`
    /// derivations — stable because `BTreeMap` iterates by key order, and
    /// `ArtifactType` variants compare by declaration order.
    pub fn input_hashes(&self) -> Vec<String> {
        self.artifacts.values().map(|a| a.content_hash.clone()).collect()
    }

    /// Canonical JSON view of the bundle handed to the LLM provider: every
    /// required artifact's content, keyed by its artifact type tag.
    pub fn as_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (artifact_type, artifact) in &self.artifacts {
            map.insert(type_tag(*artifact_type), artifact.content.clone());
        }
        serde_json::Value::Object(map)
    }

    pub fn produced_types(&self) -> HashSet<ArtifactType> {
        self.artifacts.keys().copied().collect()
    }
}

/// Fetch the latest approved version of every artifact type `required`
/// names. Fails with `HostError::MissingInput` the first time a role has no
/// artifact yet — the caller (the Agent Host) must release its lock before
/// propagating this, per the `spec.md` §4.4 try/finally discipline.
pub async fn assemble(
    pool: &PgPool,
    request_id: RequestId,
    required: &[ArtifactType],
) -> Result<InputBundle, HostError> {
    let mut artifacts = BTreeMap::new();
    for artifact_type in required {
        let found = orc_store::current_approved_artifact(pool, request_id, *artifact_type)
            .await
            .map_err(|e| HostError::Storage(e.to_string()))?;
        match found {
            Some(a) => {
                orc_store::verify_artifact_chain(pool, a.artifact_id)
                    .await
                    .map_err(|e| HostError::Integrity(e.to_string()))?;
                artifacts.insert(*artifact_type, a);
            }
            None => return Err(HostError::MissingInput(*artifact_type)),
        }
    }
    Ok(InputBundle { artifacts })
}

pub(crate) fn type_tag(artifact_type: ArtifactType) -> String {
    serde_json::to_value(artifact_type)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use orc_schemas::{AgentName, ArtifactStatus};
    use serde_json::json;
    use uuid::Uuid;

    fn artifact(artifact_type: ArtifactType, content_hash: &str) -> Artifact {
        Artifact {
            artifact_id: Uuid::new_v4(),
            request_id: Uuid::new_v4(),
            artifact_type,
            produced_by: AgentName::IntentInterviewer,
            version: 1,
            content: json!({"ok": true}),
            content_hash: content_hash.to_string(),
            input_hashes: vec![],
            request_hash: "rh".to_string(),
            status: ArtifactStatus::Approved,
            approved_by: Some("system".to_string()),
            approved_at: Some(Utc::now()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn bundle_exposes_only_the_artifact_types_inserted() {
        let mut artifacts = BTreeMap::new();
        artifacts.insert(ArtifactType::IntentAnswers, artifact(ArtifactType::IntentAnswers, "h1"));
        let bundle = InputBundle { artifacts };

        assert!(bundle.get(ArtifactType::IntentAnswers).is_some());
        assert!(bundle.get(ArtifactType::BasePrompt).is_none());
        assert_eq!(bundle.input_hashes(), vec!["h1".to_string()]);
    }

    #[test]
    fn as_json_keys_by_snake_case_artifact_type_tag() {
        let mut artifacts = BTreeMap::new();
        artifacts.insert(ArtifactType::MasterPlan, artifact(ArtifactType::MasterPlan, "h2"));
        let bundle = InputBundle { artifacts };
        let json = bundle.as_json();
        assert!(json.get("master_plan").is_some());
    }
}
