//! Id → script lookup for native upcalls.
//!
//! Upcalls only carry the integer id the native side assigned. The registry
//! maps that id back to a live script without ever owning it: entries are
//! weak and removed when the script is disposed.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};
use crate::fiber::{NativeFiber, ScriptId};
use crate::handle::{ScriptCore, ScriptHandle, ScriptRef};

#[derive(Default)]
pub struct ScriptRegistry {
    scripts: Mutex<HashMap<ScriptId, Weak<ScriptCore>>>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `fiber` in an owning handle and make it reachable by id.
    ///
    /// Fails with `DuplicateScript` while another live script holds the same
    /// id; the rejected fiber is released.
    pub fn register(self: &Arc<Self>, fiber: Box<dyn NativeFiber>) -> BridgeResult<ScriptHandle> {
        let core = ScriptCore::new(fiber, self.clone());
        let id = core.id();

        {
            let mut scripts = self.scripts.lock();
            let live = scripts
                .get(&id)
                .and_then(Weak::upgrade)
                .is_some_and(|existing| !existing.is_disposed());
            if live {
                drop(scripts);
                core.release_unregistered();
                return Err(BridgeError::DuplicateScript(id));
            }
            scripts.insert(id, Arc::downgrade(&core));
        }

        debug!(script_id = %id, "Script registered");
        Ok(ScriptHandle::new(core))
    }

    /// Resolve an upcall id to a live script.
    pub fn lookup(&self, id: ScriptId) -> BridgeResult<ScriptRef> {
        let core = self.scripts.lock().get(&id).and_then(Weak::upgrade);
        match core {
            Some(core) if !core.is_disposed() => Ok(ScriptRef::new(core)),
            _ => Err(BridgeError::Unrouteable {
                id,
                detail: "script is not registered".to_string(),
            }),
        }
    }

    /// Remove `id` if it still points at `core`.
    pub(crate) fn remove(&self, id: ScriptId, core: &ScriptCore) {
        let mut scripts = self.scripts.lock();
        let same = scripts
            .get(&id)
            .is_some_and(|entry| std::ptr::eq(entry.as_ptr(), core));
        if same {
            scripts.remove(&id);
        }
    }

    pub fn contains(&self, id: ScriptId) -> bool {
        self.lookup(id).is_ok()
    }

    /// Number of registered scripts.
    pub fn len(&self) -> usize {
        self.scripts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
