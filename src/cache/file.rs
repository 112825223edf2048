//! Persistent cache stored as a single bincode snapshot.
//!
//! The whole map is loaded on open and written back on [`FileCache::flush`]
//! or [`Cache::close`]. Snapshots are written to a sibling temp file and
//! renamed into place so a crash never leaves a half-written cache.

use std::collections::HashMap;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use hugin_common::{Error, Result};
use parking_lot::Mutex;

use super::Cache;

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, String>,
    dirty: bool,
}

/// Thread-safe cache persisted to disk.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    state: Mutex<State>,
}

impl FileCache {
    /// Open (or lazily create) the cache at `path`.
    ///
    /// A missing file yields an empty cache. A file that cannot be decoded
    /// is logged and ignored; it is replaced on the next flush.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = load_snapshot(&path)?;

        tracing::debug!(
            path = %path.display(),
            entries = entries.len(),
            "Opened response cache"
        );

        Ok(Self {
            path,
            state: Mutex::new(State {
                entries,
                dirty: false,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Write the snapshot to disk if anything changed since the last flush.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.path.with_extension("tmp");
        let written = fs::File::create(&tmp_path)
            .map_err(Error::from)
            .and_then(|file| write_snapshot(file, &state.entries))
            .and_then(|file| file.sync_all().map_err(Error::from));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
        fs::rename(&tmp_path, &self.path)?;

        state.dirty = false;
        tracing::debug!(
            path = %self.path.display(),
            entries = state.entries.len(),
            "Flushed response cache"
        );
        Ok(())
    }
}

/// Encode `entries` into `out`, surfacing errors from the final buffer flush.
fn write_snapshot<W: Write>(out: W, entries: &HashMap<String, String>) -> Result<W> {
    let mut writer = BufWriter::new(out);
    bincode::serialize_into(&mut writer, entries)
        .map_err(|e| Error::cache(format!("failed to encode cache snapshot: {e}")))?;
    writer
        .into_inner()
        .map_err(|e| Error::from(e.into_error()))
}

fn load_snapshot(path: &Path) -> Result<HashMap<String, String>> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(e.into()),
    };

    match bincode::deserialize_from(BufReader::new(file)) {
        Ok(entries) => Ok(entries),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Cache snapshot is unreadable; starting empty"
            );
            Ok(HashMap::new())
        }
    }
}

impl Cache for FileCache {
    fn read(&self, key: &str) -> Option<String> {
        self.state.lock().entries.get(key).cloned()
    }

    fn write(&self, key: &str, body: &str) {
        let mut state = self.state.lock();
        state.entries.insert(key.to_string(), body.to_string());
        state.dirty = true;
    }

    fn close(&self) -> Result<()> {
        self.flush()
    }
}
