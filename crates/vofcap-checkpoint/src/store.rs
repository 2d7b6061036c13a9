//! Checkpoint stores.

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::codec;
use crate::error::CheckpointError;
use crate::types::Checkpoint;

/// Where checkpoints go.
///
/// The solver calls [`write`](CheckpointStore::write) at the configured
/// interval and at the end time, and
/// [`read_latest`](CheckpointStore::read_latest) once before the time loop.
pub trait CheckpointStore: Send {
    /// Persist `checkpoint`.
    fn write(&mut self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    /// The checkpoint with the highest time index, if any.
    fn read_latest(&self) -> Result<Option<Checkpoint>, CheckpointError>;
}

// ── DirectoryStore ──────────────────────────────────────────────

/// One file per checkpoint, named by zero-padded time index.
///
/// Files are written to a temporary name and renamed into place, so a
/// reader never sees a partially written checkpoint.
#[derive(Clone, Debug)]
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    /// File extension of checkpoint files.
    pub const EXTENSION: &'static str = "vofc";

    /// Store rooted at `dir`, created if absent.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the checkpoint for `time_index`.
    pub fn path_for(&self, time_index: u64) -> PathBuf {
        self.dir
            .join(format!("{time_index:010}.{}", Self::EXTENSION))
    }

    fn indices(&self) -> Result<Vec<u64>, CheckpointError> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(Self::EXTENSION) {
                continue;
            }
            if let Some(index) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
            {
                out.push(index);
            }
        }
        out.sort_unstable();
        Ok(out)
    }
}

impl CheckpointStore for DirectoryStore {
    fn write(&mut self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let path = self.path_for(checkpoint.header.time_index);
        let tmp = path.with_extension("tmp");
        {
            let mut w = BufWriter::new(fs::File::create(&tmp)?);
            codec::encode(&mut w, checkpoint)?;
            w.flush()?;
        }
        fs::rename(&tmp, &path)?;
        info!(
            time = checkpoint.header.time,
            index = checkpoint.header.time_index,
            path = %path.display(),
            "checkpoint written"
        );
        Ok(())
    }

    fn read_latest(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        let Some(&latest) = self.indices()?.last() else {
            debug!(dir = %self.dir.display(), "no checkpoint to restore");
            return Ok(None);
        };
        let path = self.path_for(latest);
        let mut r = BufReader::new(fs::File::open(&path)?);
        let checkpoint = codec::decode(&mut r)?;
        info!(index = latest, path = %path.display(), "checkpoint read");
        Ok(Some(checkpoint))
    }
}

// ── MemoryStore ─────────────────────────────────────────────────

/// Encoded checkpoints held in memory, for tests and benchmarks.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Vec<(u64, Vec<u8>)>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of checkpoints written.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Time indices written, in write order.
    pub fn indices(&self) -> Vec<u64> {
        self.entries.iter().map(|(i, _)| *i).collect()
    }
}

impl CheckpointStore for MemoryStore {
    fn write(&mut self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let mut buf = Vec::new();
        codec::encode(&mut buf, checkpoint)?;
        let index = checkpoint.header.time_index;
        self.entries.retain(|(i, _)| *i != index);
        self.entries.push((index, buf));
        Ok(())
    }

    fn read_latest(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        match self.entries.iter().max_by_key(|(i, _)| *i) {
            Some((_, bytes)) => Ok(Some(codec::decode(&mut bytes.as_slice())?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CheckpointHeader;
    use indexmap::IndexMap;

    fn at(index: u64) -> Checkpoint {
        Checkpoint {
            header: CheckpointHeader {
                time: index as f64 * 0.1,
                time_index: index,
                delta_t: 0.1,
                delta_t0: 0.1,
                n_cells: 0,
                n_faces: 0,
            },
            fields: IndexMap::new(),
        }
    }

    #[test]
    fn memory_store_returns_highest_index() {
        let mut store = MemoryStore::new();
        assert!(store.read_latest().unwrap().is_none());
        store.write(&at(20)).unwrap();
        store.write(&at(10)).unwrap();
        store.write(&at(20)).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.read_latest().unwrap().unwrap().header.time_index, 20);
    }

    #[test]
    fn directory_store_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DirectoryStore::open(dir.path().join("cp")).unwrap();
        store.write(&at(3)).unwrap();
        store.write(&at(12)).unwrap();
        fs::write(store.dir().join("notes.txt"), b"x").unwrap();
        fs::write(store.dir().join("latest.vofc"), b"x").unwrap();
        let latest = store.read_latest().unwrap().unwrap();
        assert_eq!(latest.header.time_index, 12);
        assert!(store.path_for(12).ends_with("0000000012.vofc"));
    }
}
