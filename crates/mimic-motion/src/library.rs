//! [`MotionLibrary`] – explicitly owned store of shared motion clips.
//!
//! Behavior states receive an `Arc<MotionLibrary>` instead of reaching for a
//! process-wide pointer.  Clips are handed out as `Arc<MotionClip>`: a reload
//! replaces the map entry but never mutates a clip that a running worker is
//! still reading, so readers keep a consistent snapshot for as long as they
//! hold it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use mimic_types::LoadError;
use tracing::{debug, info};

use crate::clip::MotionClip;

/// Read-mostly cache of loaded clips keyed by archive path.
#[derive(Debug, Default)]
pub struct MotionLibrary {
    clips: RwLock<HashMap<PathBuf, Arc<MotionClip>>>,
}

impl MotionLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the clip stored for `path`, loading it on first use.
    ///
    /// A cached clip sampled at a different `dt` is reloaded and replaces the
    /// cached entry; holders of the previous `Arc` are unaffected.
    ///
    /// # Errors
    ///
    /// Any [`LoadError`] from [`MotionClip::load`].  Nothing is cached on
    /// failure.
    pub fn get_or_load(&self, path: &Path, dt: f32) -> Result<Arc<MotionClip>, LoadError> {
        if let Some(clip) = self.get(path)
            && clip.dt() == dt
        {
            debug!(path = %path.display(), "reusing cached motion clip");
            return Ok(clip);
        }

        // Load outside the lock so readers are never blocked on file I/O.
        let loaded = Arc::new(MotionClip::load(path, dt)?);
        let mut clips = self.clips.write().unwrap_or_else(PoisonError::into_inner);
        let clip = match clips.get(path) {
            // Another caller finished loading the same clip first.
            Some(existing) if existing.dt() == dt => Arc::clone(existing),
            _ => {
                info!(path = %path.display(), "motion clip cached");
                clips.insert(path.to_path_buf(), Arc::clone(&loaded));
                loaded
            }
        };
        Ok(clip)
    }

    /// Store an already built clip under `path`, replacing any previous entry.
    pub fn insert(&self, path: impl Into<PathBuf>, clip: MotionClip) -> Arc<MotionClip> {
        let clip = Arc::new(clip);
        self.clips
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), Arc::clone(&clip));
        clip
    }

    pub fn get(&self, path: &Path) -> Option<Arc<MotionClip>> {
        self.clips
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// Drop the cached clip for `path`.  Returns `true` if one was present.
    pub fn unload(&self, path: &Path) -> bool {
        let removed = self
            .clips
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
            .is_some();
        if removed {
            info!(path = %path.display(), "motion clip unloaded");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.clips.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
