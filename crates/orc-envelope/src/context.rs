//! Per-request context isolation.
//!
//! Two requests being driven through the pipeline concurrently must never
//! see each other's input bundles. `RequestScopedStore` keys every entry by
//! `RequestId` so a bug in one agent's prompt construction cannot leak
//! artifacts belonging to a different request into its context window.

use orc_schemas::RequestId;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
pub struct RequestScopedStore<T> {
    inner: BTreeMap<RequestId, T>,
}

impl<T> Default for RequestScopedStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RequestScopedStore<T> {
    pub fn new() -> Self {
        Self {
            inner: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, request: RequestId, value: T) {
        self.inner.insert(request, value);
    }

    pub fn get(&self, request: &RequestId) -> Option<&T> {
        self.inner.get(request)
    }

    pub fn get_mut(&mut self, request: &RequestId) -> Option<&mut T> {
        self.inner.get_mut(request)
    }

    pub fn remove(&mut self, request: &RequestId) -> Option<T> {
        self.inner.remove(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn store_isolates_state_per_request() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut store: RequestScopedStore<Vec<String>> = RequestScopedStore::new();
        store.insert(a, vec!["a-artifact".to_string()]);
        store.insert(b, vec!["b-artifact".to_string()]);

        if let Some(ctx) = store.get_mut(&a) {
            ctx.push("a-artifact-2".to_string());
        }

        assert_eq!(store.get(&a).unwrap().len(), 2);
        assert_eq!(store.get(&b).unwrap().len(), 1);
        assert_eq!(store.get(&b).unwrap()[0], "b-artifact");
    }

    #[test]
    fn unknown_request_returns_none() {
        let store: RequestScopedStore<i64> = RequestScopedStore::new();
        assert_eq!(store.get(&Uuid::new_v4()), None);
    }

    #[test]
    fn remove_detaches_context_after_completion() {
        let a = Uuid::new_v4();
        let mut store: RequestScopedStore<i64> = RequestScopedStore::new();
        store.insert(a, 42);
        assert_eq!(store.remove(&a), Some(42));
        assert_eq!(store.get(&a), None);
    }
}
