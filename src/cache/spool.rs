//! Spool Module
//!
//! Hash-partitioned append-only files that absorb attribute writes during a
//! bulk load, to be replayed later in sequential order.
//!
//! Each partition file is a run of `(len: u64 LE, key ++ payload)` records.
//! The partition is picked from the top bits of the key's store hash, so
//! every write to a given key lands in the same file and replays in the
//! order it was made.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cache::{decode_record, encode_record, AttrKey, KEY_SIZE};
use crate::error::{CacheError, Result};

const SPOOL_BUFFER: usize = 16 * 1024;

// == Spool Set ==
/// The full set of spool partitions opened by one redirect.
#[derive(Debug)]
pub struct SpoolSet {
    partitions: Vec<SpoolPartition>,
    shift: u32,
}

impl SpoolSet {
    /// Creates `count` empty partition files under `dir`.
    ///
    /// `count` must be a power of two.
    pub fn create(dir: &Path, count: usize) -> Result<Self> {
        if count == 0 || !count.is_power_of_two() {
            return Err(CacheError::InvalidRequest(format!(
                "spool partition count {} is not a power of two",
                count
            )));
        }
        let partitions = (0..count)
            .map(|i| SpoolPartition::create(dir.join(format!("attr-spool.{}", i))))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            partitions,
            shift: 32 - count.trailing_zeros(),
        })
    }

    /// Partition that receives writes for a key with this store hash.
    pub fn partition_of(&self, hash: u32) -> usize {
        hash.checked_shr(self.shift).unwrap_or(0) as usize
    }

    /// Appends one spooled write.
    pub fn append(&mut self, key: &AttrKey, payload: &[u8]) -> Result<()> {
        let i = self.partition_of(key.store_hash());
        self.partitions[i].append(&encode_record(key, payload))
    }

    /// Number of partitions.
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Hands over the partitions in replay order.
    pub fn into_partitions(self) -> Vec<SpoolPartition> {
        self.partitions
    }
}

// == Spool Partition ==
/// One spool file. The file is deleted when the partition is dropped.
#[derive(Debug)]
pub struct SpoolPartition {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    records: u64,
}

impl SpoolPartition {
    fn create(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self {
            path,
            writer: Some(BufWriter::with_capacity(SPOOL_BUFFER, file)),
            records: 0,
        })
    }

    #[cfg(test)]
    fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    fn append(&mut self, record: &[u8]) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            CacheError::Internal(format!("{} is already being replayed", self.path.display()))
        })?;
        writer.write_all(&(record.len() as u64).to_le_bytes())?;
        writer.write_all(record)?;
        self.records += 1;
        Ok(())
    }

    /// Flushes pending writes and rewinds the file for replay.
    pub fn reader(&mut self) -> Result<SpoolReader> {
        let writer = self.writer.take().ok_or_else(|| {
            CacheError::Internal(format!("{} is already being replayed", self.path.display()))
        })?;
        let mut file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
        file.seek(SeekFrom::Start(0))?;
        debug!("Replaying {} ({} records)", self.path.display(), self.records);
        Ok(SpoolReader {
            inner: BufReader::with_capacity(SPOOL_BUFFER, file),
            path: self.path.clone(),
        })
    }
}

impl Drop for SpoolPartition {
    fn drop(&mut self) {
        self.writer.take();
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                debug!("Could not remove {}: {}", self.path.display(), e);
            }
        }
    }
}

// == Spool Reader ==
/// Sequential reader over one partition.
#[derive(Debug)]
pub struct SpoolReader {
    inner: BufReader<File>,
    path: PathBuf,
}

impl SpoolReader {
    /// Next spooled write, or `None` at a clean end of file.
    pub fn next_record(&mut self) -> Result<Option<(AttrKey, Vec<u8>)>> {
        let mut len_buf = [0u8; 8];
        let got = read_full(&mut self.inner, &mut len_buf)?;
        if got == 0 {
            return Ok(None);
        }
        if got < len_buf.len() {
            return Err(self.corrupt("truncated length prefix"));
        }

        let len = u64::from_le_bytes(len_buf) as usize;
        if len < KEY_SIZE {
            return Err(self.corrupt("record shorter than its key"));
        }
        let mut record = vec![0u8; len];
        if read_full(&mut self.inner, &mut record)? < len {
            return Err(self.corrupt("truncated record"));
        }

        let (key, payload) =
            decode_record(&record).ok_or_else(|| self.corrupt("undecodable key"))?;
        Ok(Some((key, payload.to_vec())))
    }

    fn corrupt(&self, what: &str) -> CacheError {
        CacheError::CorruptSpool(format!("{}: {}", self.path.display(), what))
    }
}

/// Reads until `buf` is full or the input ends; returns bytes read.
fn read_full(r: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
