//! Envelope Runtime (C4).
//!
//! Every agent's contract — authority tier, allowed actions, required
//! input artifacts, produced artifact type, scoped phase — is registered
//! here and enforced through one choke-point, [`EnvelopeRuntime::authorize`].
//! `orc-agent-host` calls it once per invocation before doing anything
//! observable (calling an LLM, writing an artifact, mutating a file).

mod context;
mod registry;
mod runtime;

pub use context::RequestScopedStore;
pub use runtime::{EnvelopeRefusal, EnvelopeRuntime};
