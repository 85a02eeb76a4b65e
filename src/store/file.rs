//! Durable store: an append log replayed over a compacted snapshot.
//!
//! Both files are sequences of checksummed frames:
//!
//! ```text
//! len:u32 | bincode(Frame)[len] | crc32:u32
//! ```
//!
//! The checksum covers the encoded frame. Each file starts with a
//! `Generation` frame; compaction bumps the generation, so a log left
//! over from before the last compaction is recognised as stale and
//! skipped instead of replayed over the new snapshot. Replay stops at the
//! first frame that is short, fails its checksum or does not decode, and
//! the log is cut back to that point.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{Cursor, MemoryStore, PersistentStore};
use crate::error::{CacheError, Result};

const FRAME_LEN_PREFIX: usize = 4;
const FRAME_TRAILER: usize = 4;
const PAGE_SIZE: usize = 4096;

/// Tombstones tolerated before a tick rewrites the snapshot.
const COMPACT_MIN_TOMBSTONES: usize = 1024;

/// File-backed [`PersistentStore`].
#[derive(Debug)]
pub struct FileStore {
    inner: MemoryStore,
    log: BufWriter<File>,
    log_path: PathBuf,
    snapshot_path: PathBuf,
    generation: u64,
}

impl FileStore {
    // == Open ==
    /// Opens (or creates) a store from its log and snapshot files.
    ///
    /// `cache_pages` sizes the log write buffer in 4 KiB pages.
    pub fn open(
        log_path: impl AsRef<Path>,
        snapshot_path: impl AsRef<Path>,
        cache_pages: usize,
    ) -> Result<Self> {
        let log_path = log_path.as_ref().to_path_buf();
        let snapshot_path = snapshot_path.as_ref().to_path_buf();
        let mut inner = MemoryStore::new();
        let mut generation = 0;

        if snapshot_path.exists() {
            let bytes = fs::read(&snapshot_path)?;
            let (frames, consumed) = parse_frames(&bytes);
            if consumed != bytes.len() {
                return Err(CacheError::CorruptStore(format!(
                    "snapshot {} damaged at byte {}",
                    snapshot_path.display(),
                    consumed
                )));
            }
            for frame in frames {
                match frame {
                    Frame::Generation(g) => generation = g,
                    Frame::Insert { hash, bytes, .. } => {
                        inner.insert_slot(hash, &bytes);
                    }
                    Frame::Remove { .. } => {
                        return Err(CacheError::CorruptStore(format!(
                            "snapshot {} holds a remove frame",
                            snapshot_path.display()
                        )));
                    }
                }
            }
        }

        let keep_log = if log_path.exists() {
            let bytes = fs::read(&log_path)?;
            let (frames, consumed) = parse_frames(&bytes);
            let log_generation = match frames.first() {
                Some(Frame::Generation(g)) => *g,
                _ => 0,
            };
            if log_generation < generation {
                warn!(
                    "Skipping stale log {} (generation {} behind snapshot {})",
                    log_path.display(),
                    log_generation,
                    generation
                );
                false
            } else {
                generation = log_generation;
                for frame in frames {
                    apply(&mut inner, frame)?;
                }
                if consumed != bytes.len() {
                    warn!(
                        "Discarding {} torn bytes at the end of {}",
                        bytes.len() - consumed,
                        log_path.display()
                    );
                    OpenOptions::new()
                        .write(true)
                        .open(&log_path)?
                        .set_len(consumed as u64)?;
                }
                consumed > 0
            }
        } else {
            false
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;
        let mut log = BufWriter::with_capacity(cache_pages.max(1) * PAGE_SIZE, file);
        if !keep_log {
            log.get_ref().set_len(0)?;
            log.write_all(&encode_frame(&Frame::Generation(generation))?)?;
            log.flush()?;
            log.get_ref().sync_all()?;
        }

        info!(
            "Opened store {} ({} records, generation {})",
            log_path.display(),
            inner.len(),
            generation
        );
        Ok(Self {
            inner,
            log,
            log_path,
            snapshot_path,
            generation,
        })
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn append(&mut self, frame: &Frame) -> Result<()> {
        self.log.write_all(&encode_frame(frame)?)?;
        Ok(())
    }

    /// Rewrites the snapshot from live records under the next generation,
    /// then restarts the log at that generation.
    fn compact(&mut self) -> Result<()> {
        self.inner.compact();
        let generation = self.generation + 1;

        let tmp = self.snapshot_path.with_extension("tmp");
        {
            let mut out = BufWriter::new(File::create(&tmp)?);
            out.write_all(&encode_frame(&Frame::Generation(generation))?)?;
            for (hash, record) in self.inner.records() {
                out.write_all(&encode_frame(&Frame::Insert {
                    hash,
                    slot: 0,
                    bytes: record.to_vec(),
                })?)?;
            }
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        self.log.flush()?;
        fs::rename(&tmp, &self.snapshot_path)?;
        // From here the old log is stale: reopening skips it
        self.generation = generation;

        self.log.get_ref().set_len(0)?;
        self.append(&Frame::Generation(generation))?;
        self.log.flush()?;
        self.log.get_ref().sync_all()?;
        debug!(
            "Compacted store {} to {} records (generation {})",
            self.log_path.display(),
            self.inner.len(),
            generation
        );
        Ok(())
    }
}

impl PersistentStore for FileStore {
    fn insert(&mut self, hash: u32, record: &[u8]) -> Result<()> {
        let slot = self.inner.insert_slot(hash, record);
        self.append(&Frame::Insert {
            hash,
            slot: slot as u32,
            bytes: record.to_vec(),
        })
    }

    fn remove(&mut self, cursor: Cursor) -> Result<()> {
        if self.inner.remove_slot(cursor.hash, cursor.slot) {
            self.append(&Frame::Remove {
                hash: cursor.hash,
                slot: cursor.slot as u32,
            })?;
        }
        Ok(())
    }

    fn copy(&self, cursor: Cursor) -> Option<Vec<u8>> {
        self.inner.copy(cursor)
    }

    fn find_first_key(&self, hash: u32) -> Option<Cursor> {
        self.inner.find_first_key(hash)
    }

    fn find_next_key(&self, cursor: Cursor, hash: u32) -> Option<Cursor> {
        self.inner.find_next_key(cursor, hash)
    }

    fn sync(&mut self) -> Result<()> {
        self.log.flush()?;
        self.log.get_ref().sync_data()?;
        Ok(())
    }

    fn tick(&mut self) -> Result<()> {
        let tombstones = self.inner.tombstones();
        if tombstones >= COMPACT_MIN_TOMBSTONES && tombstones > self.inner.len() {
            self.compact()
        } else {
            self.log.flush()?;
            Ok(())
        }
    }

    fn close_all(&mut self) -> Result<()> {
        self.sync()?;
        info!("Closed store {}", self.log_path.display());
        Ok(())
    }
}

// == Frame Codec ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Frame {
    Generation(u64),
    Insert { hash: u32, slot: u32, bytes: Vec<u8> },
    Remove { hash: u32, slot: u32 },
}

fn encode_frame(frame: &Frame) -> Result<Vec<u8>> {
    let data = bincode::serialize(frame)
        .map_err(|e| CacheError::Internal(format!("encoding store frame: {}", e)))?;
    let mut buf = Vec::with_capacity(FRAME_LEN_PREFIX + data.len() + FRAME_TRAILER);
    buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
    buf.extend_from_slice(&data);
    buf.extend_from_slice(&crc32fast::hash(&data).to_le_bytes());
    Ok(buf)
}

/// Decodes frames until the input runs out or a frame is damaged.
/// Returns the good frames and how many bytes they span.
fn parse_frames(buf: &[u8]) -> (Vec<Frame>, usize) {
    let mut frames = Vec::new();
    let mut pos = 0;
    while let Some(len) = buf
        .get(pos..pos + FRAME_LEN_PREFIX)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
    {
        let data_start = pos + FRAME_LEN_PREFIX;
        let data_end = data_start + len as usize;
        let (Some(data), Some(crc)) = (
            buf.get(data_start..data_end),
            buf.get(data_end..data_end + FRAME_TRAILER)
                .and_then(|b| b.try_into().ok())
                .map(u32::from_le_bytes),
        ) else {
            break;
        };
        if crc32fast::hash(data) != crc {
            break;
        }
        let Ok(frame) = bincode::deserialize::<Frame>(data) else {
            break;
        };
        frames.push(frame);
        pos = data_end + FRAME_TRAILER;
    }
    (frames, pos)
}

fn apply(store: &mut MemoryStore, frame: Frame) -> Result<()> {
    match frame {
        Frame::Generation(_) => {}
        Frame::Insert { hash, slot, bytes } => {
            let replayed = store.insert_slot(hash, &bytes);
            if replayed != slot as usize {
                return Err(CacheError::CorruptStore(format!(
                    "insert replayed into slot {} but was logged at {}",
                    replayed, slot
                )));
            }
        }
        Frame::Remove { hash, slot } => {
            store.remove_slot(hash, slot as usize);
        }
    }
    Ok(())
}
