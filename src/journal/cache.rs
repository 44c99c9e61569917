use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::JournalHandle;
use crate::error::Result;

/// A journal handle shared between callers appending to the same project.
pub type SharedHandle = Arc<Mutex<JournalHandle>>;

type Slot = Arc<Mutex<Option<SharedHandle>>>;

/// Registry of open journal handles keyed by storage root.
///
/// Guarantees at most one handle, and therefore one open generation, per
/// storage root for the lifetime of the cache. The map lock is only held to
/// find a root's slot; opening a generation holds that root's slot lock, so
/// unrelated roots never wait on each other.
#[derive(Default)]
pub struct HandleCache {
    slots: Mutex<HashMap<PathBuf, Slot>>,
}

impl HandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, root: &Path) -> Slot {
        let mut slots = self.slots.lock().expect("handle cache lock poisoned");
        slots.entry(root.to_path_buf()).or_default().clone()
    }

    /// The cached handle for `root`, if one was opened.
    pub fn get(&self, root: &Path) -> Option<SharedHandle> {
        let slot = {
            let slots = self.slots.lock().expect("handle cache lock poisoned");
            slots.get(root)?.clone()
        };
        let guard = slot.lock().expect("handle slot lock poisoned");
        guard.clone()
    }

    /// Return the cached handle for `root`, opening a new generation if none
    /// is cached yet.
    pub fn get_or_open(
        &self,
        project_id: &str,
        root: &Path,
        revision_count: u64,
    ) -> Result<SharedHandle> {
        let slot = self.slot(root);
        let mut guard = slot.lock().expect("handle slot lock poisoned");
        if let Some(handle) = guard.as_ref() {
            return Ok(handle.clone());
        }

        let handle = Arc::new(Mutex::new(JournalHandle::open_or_create(
            project_id,
            root,
            revision_count,
        )?));
        *guard = Some(handle.clone());
        Ok(handle)
    }

    pub fn len(&self) -> usize {
        let slots = self.slots.lock().expect("handle cache lock poisoned");
        slots
            .values()
            .filter(|slot| slot.lock().map(|s| s.is_some()).unwrap_or(false))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
