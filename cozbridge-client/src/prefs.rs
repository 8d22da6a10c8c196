//! Persisted local preferences
//!
//! Stored as JSON at `$XDG_STATE_HOME/cozbridge/prefs.json`. Not part of the
//! wire protocol.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use cozbridge_utils::{ensure_dir, prefs_file, BridgeError, Result};

/// Screen position of the camera overlay widget, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayPosition {
    pub left: i32,
    pub top: i32,
}

impl OverlayPosition {
    /// Keep a widget of `widget` size fully inside a `viewport`
    ///
    /// A widget larger than the viewport is pinned to the top-left corner.
    pub fn clamp_within(self, viewport: (i32, i32), widget: (i32, i32)) -> Self {
        let max_left = viewport.0.saturating_sub(widget.0).max(0);
        let max_top = viewport.1.saturating_sub(widget.1).max(0);
        Self {
            left: self.left.clamp(0, max_left),
            top: self.top.clamp(0, max_top),
        }
    }
}

/// User preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Log protocol diagnostics
    pub verbose: bool,
    pub overlay_position: Option<OverlayPosition>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            verbose: true,
            overlay_position: None,
        }
    }
}

/// Reads and writes the preferences file
pub struct PrefsStore {
    path: PathBuf,
}

impl PrefsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location
    pub fn open_default() -> Self {
        Self::new(prefs_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load preferences; a missing or unreadable file yields defaults
    pub fn load(&self) -> Preferences {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Preferences::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cannot read preferences, using defaults");
                return Preferences::default();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Corrupt preferences, using defaults");
            Preferences::default()
        })
    }

    /// Write preferences through a temporary file and rename
    pub fn save(&self, prefs: &Preferences) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            ensure_dir(dir).map_err(|e| BridgeError::FileWrite {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }

        let data = serde_json::to_vec_pretty(prefs)?;
        let temp_path = self.path.with_extension("tmp");
        let write_err = |e| BridgeError::FileWrite {
            path: temp_path.clone(),
            source: e,
        };

        let mut file = fs::File::create(&temp_path).map_err(write_err)?;
        file.write_all(&data).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;

        fs::rename(&temp_path, &self.path).map_err(|e| BridgeError::FileWrite {
            path: self.path.clone(),
            source: e,
        })?;

        debug!(path = %self.path.display(), "Saved preferences");
        Ok(())
    }

    /// Load, modify and save in one step
    pub fn update(&self, f: impl FnOnce(&mut Preferences)) -> Result<Preferences> {
        let mut prefs = self.load();
        f(&mut prefs);
        self.save(&prefs)?;
        Ok(prefs)
    }
}
