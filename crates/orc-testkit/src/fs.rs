//! In-memory `WorkspaceFs` double — the Repair Agent's sole filesystem
//! dependency, faked the same way `recovery.rs`'s `FakeBroker` fakes a
//! broker: a `RefCell`-guarded map, no disk I/O, seeded up front by a test.

use orc_repair::{WorkspaceFs, WorkspaceFsError};
use std::cell::RefCell;
use std::collections::BTreeMap;

pub struct InMemoryWorkspaceFs(RefCell<BTreeMap<String, Vec<u8>>>);

impl InMemoryWorkspaceFs {
    pub fn new() -> Self {
        Self(RefCell::new(BTreeMap::new()))
    }

    pub fn seeded(files: &[(&str, &str)]) -> Self {
        let mut map = BTreeMap::new();
        for (path, content) in files {
            map.insert(path.to_string(), content.as_bytes().to_vec());
        }
        Self(RefCell::new(map))
    }

    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.0.borrow().get(path).cloned()
    }
}

impl Default for InMemoryWorkspaceFs {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkspaceFs for InMemoryWorkspaceFs {
    fn exists(&self, path: &str) -> Result<bool, WorkspaceFsError> {
        Ok(self.0.borrow().contains_key(path))
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, WorkspaceFsError> {
        self.0
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| WorkspaceFsError::NotFound(path.to_string()))
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), WorkspaceFsError> {
        self.0.borrow_mut().insert(path.to_string(), bytes.to_vec());
        Ok(())
    }
}
