use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::AnnotationMap;

/// The single JSON document holding every image's annotation record.
///
/// Single writer, single process; no locking. Every save rewrites the whole
/// document, so callers must hold the complete current state.
#[derive(Debug, Clone)]
pub struct AnnotationStore {
    path: PathBuf,
}

impl AnnotationStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load the full mapping. Fails with `NotFound` if the document is absent.
    pub fn load(&self) -> Result<AnnotationMap, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(self.path.clone()));
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let data: AnnotationMap =
            serde_json::from_str(text.trim_start_matches('\u{feff}')).map_err(|source| {
                StoreError::Parse {
                    path: self.path.clone(),
                    source,
                }
            })?;
        debug!(path = %self.path.display(), images = data.len(), "loaded annotations");
        Ok(data)
    }

    /// Like [`load`](Self::load), but a missing document yields an empty mapping.
    pub fn load_or_default(&self) -> Result<AnnotationMap, StoreError> {
        match self.load() {
            Err(StoreError::NotFound(_)) => {
                info!(path = %self.path.display(), "No annotation document yet, starting empty");
                Ok(AnnotationMap::new())
            }
            other => other,
        }
    }

    /// Overwrite the document with `data`.
    ///
    /// The JSON is written to a temporary file next to the target and renamed over
    /// it, so a crash mid-write never leaves a truncated document behind.
    pub fn save(&self, data: &AnnotationMap) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(data).map_err(StoreError::Serialize)?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let io_err = |source: io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| StoreError::Persist {
            path: self.path.clone(),
            source: e.error,
        })?;

        info!(path = %self.path.display(), images = data.len(), "Saved annotations");
        Ok(())
    }
}
