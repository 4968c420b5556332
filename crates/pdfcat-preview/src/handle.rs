// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Preview handles — opaque references to rendered preview bytes, valid until
// revoked.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

/// An opaque reference to one rendered preview.
///
/// Only the store that issued it can resolve it, and only until it is
/// revoked.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviewHandle {
    id: Uuid,
}

impl PreviewHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// URL form, for embedding in a viewer.
    pub fn url(&self) -> String {
        format!("blob:pdfcat/{}", self.id)
    }
}

impl fmt::Display for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Issues and releases preview handles.
#[derive(Debug, Default)]
pub struct PreviewStore {
    entries: HashMap<Uuid, Arc<[u8]>>,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register bytes and return a fresh handle for them.
    pub fn create(&mut self, bytes: Arc<[u8]>) -> PreviewHandle {
        let handle = PreviewHandle { id: Uuid::new_v4() };
        debug!(handle = %handle, bytes = bytes.len(), "preview handle created");
        self.entries.insert(handle.id, bytes);
        handle
    }

    /// Release a handle. Returns `false` if it was already released.
    pub fn revoke(&mut self, handle: &PreviewHandle) -> bool {
        let removed = self.entries.remove(&handle.id).is_some();
        if removed {
            debug!(handle = %handle, "preview handle revoked");
        }
        removed
    }

    /// Bytes behind a live handle.
    pub fn get(&self, handle: &PreviewHandle) -> Option<Arc<[u8]>> {
        self.entries.get(&handle.id).cloned()
    }

    /// Number of handles not yet revoked.
    pub fn live_count(&self) -> usize {
        self.entries.len()
    }
}
