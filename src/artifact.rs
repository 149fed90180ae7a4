//! In-memory raster artifacts addressed by revocable handles
//!
//! The registry plays the role of a blob store: every successful download
//! render is registered and handed out as an [`ArtifactHandle`]. Whoever
//! replaces or discards an artifact must revoke its handle.

use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Reference to a registered artifact, printable as `blob:qrstyle/<uuid>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ArtifactHandle(Uuid);

impl fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blob:qrstyle/{}", self.0)
    }
}

/// Encoded raster plus what it was rendered from
#[derive(Debug, Clone)]
pub struct Artifact {
    /// PNG bytes
    pub png: Bytes,
    /// Side length in pixels
    pub size: u32,
    /// Render generation that produced it
    pub generation: u64,
}

/// Shared store of live artifacts
#[derive(Debug, Clone, Default)]
pub struct ArtifactRegistry {
    entries: Arc<Mutex<HashMap<Uuid, Arc<Artifact>>>>,
}

impl ArtifactRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an artifact and return its handle.
    pub fn create(&self, artifact: Artifact) -> ArtifactHandle {
        let id = Uuid::new_v4();
        let bytes = artifact.png.len();
        self.lock().insert(id, Arc::new(artifact));
        tracing::trace!(%id, bytes, "Artifact registered");
        ArtifactHandle(id)
    }

    /// Look up a live artifact.
    pub fn resolve(&self, handle: &ArtifactHandle) -> Option<Arc<Artifact>> {
        self.lock().get(&handle.0).cloned()
    }

    /// Release an artifact; returns whether it was still live.
    pub fn revoke(&self, handle: &ArtifactHandle) -> bool {
        let removed = self.lock().remove(&handle.0).is_some();
        if removed {
            tracing::trace!(%handle, "Artifact revoked");
        }
        removed
    }

    /// Number of artifacts currently held
    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Arc<Artifact>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
