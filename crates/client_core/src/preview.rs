//! Revocable display handles for previewing in-memory image bytes.
//!
//! A handle is the only way to resolve preview bytes. Releasing it, either
//! explicitly or on drop, invalidates the handle; resolving after release
//! always yields `None`.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(pub u64);

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    entries: HashMap<HandleId, Arc<[u8]>>,
}

/// Issues and revokes display handles. Cheap to clone; all clones share the
/// same handle table.
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    inner: Arc<Mutex<RegistryState>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, bytes: Arc<[u8]>) -> PreviewHandle {
        let mut state = self.inner.lock().unwrap();
        state.next_id += 1;
        let id = HandleId(state.next_id);
        state.entries.insert(id, bytes);
        PreviewHandle {
            id,
            registry: self.clone(),
            released: false,
        }
    }

    /// Bytes behind a live handle, `None` once the handle was released.
    pub fn resolve(&self, id: HandleId) -> Option<Arc<[u8]>> {
        self.inner.lock().unwrap().entries.get(&id).cloned()
    }

    pub fn live_handles(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    fn revoke(&self, id: HandleId) {
        self.inner.lock().unwrap().entries.remove(&id);
    }
}

/// Scoped reference to previewable bytes. Owned by the selection controller;
/// superseding a selection or tearing the controller down must release it.
pub struct PreviewHandle {
    id: HandleId,
    registry: PreviewRegistry,
    released: bool,
}

impl PreviewHandle {
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Explicit release. Idempotent; drop performs the same revocation.
    pub fn release(&mut self) {
        if !self.released {
            self.registry.revoke(self.id);
            self.released = true;
        }
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(content: &[u8]) -> Arc<[u8]> {
        Arc::from(content.to_vec().into_boxed_slice())
    }

    #[test]
    fn resolves_live_handle_to_acquired_bytes() {
        let registry = PreviewRegistry::new();
        let handle = registry.acquire(bytes(b"pixels"));
        let resolved = registry.resolve(handle.id()).expect("live handle");
        assert_eq!(resolved.as_ref(), b"pixels");
        assert_eq!(registry.live_handles(), 1);
    }

    #[test]
    fn released_handle_never_resolves() {
        let registry = PreviewRegistry::new();
        let mut handle = registry.acquire(bytes(b"pixels"));
        let id = handle.id();
        handle.release();
        assert!(registry.resolve(id).is_none());
        assert_eq!(registry.live_handles(), 0);
    }

    #[test]
    fn release_is_idempotent() {
        let registry = PreviewRegistry::new();
        let mut handle = registry.acquire(bytes(b"a"));
        let _other = registry.acquire(bytes(b"b"));
        handle.release();
        handle.release();
        assert_eq!(registry.live_handles(), 1);
    }

    #[test]
    fn dropping_a_handle_revokes_it() {
        let registry = PreviewRegistry::new();
        let id = {
            let handle = registry.acquire(bytes(b"pixels"));
            handle.id()
        };
        assert!(registry.resolve(id).is_none());
        assert_eq!(registry.live_handles(), 0);
    }

    #[test]
    fn handle_ids_are_never_reused() {
        let registry = PreviewRegistry::new();
        let first = registry.acquire(bytes(b"a")).id();
        let second = registry.acquire(bytes(b"b")).id();
        assert_ne!(first, second);
    }
}
