//! Persistent key-value store for registry crates
//!
//! The store is a single append-only log. Each record carries a crate name and
//! its bincode-encoded version list; the newest record for a name wins. The
//! in-memory index (name to value location) is rebuilt on open by scanning the
//! names only.
//!
//! ```text
//! header : magic[8] | format_version: u32 LE
//! record : name_len: u32 LE | name | value_len: u32 LE | value
//! ```

use bincode::Options;
use fs2::FileExt as _;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::index::constants::{STORE_FILE, STORE_LOCK_FILE};
use crate::index::error::StoreError;
use crate::index::types::{Crate, CrateVersion};
use crate::index::utils::{remove_dir_all_if_exists, sync_dir_best_effort, temp_path_for};

const STORE_MAGIC: [u8; 8] = *b"CRIDXLOG";

/// Bumped whenever the record layout or the value encoding changes
pub const STORE_FORMAT_VERSION: u32 = 1;

const HEADER_LEN: u64 = 12;
const MAX_NAME_LEN: usize = 1024;
const MAX_VALUE_LEN: usize = 64 * 1024 * 1024;
const WRITE_BUFFER_BYTES: usize = 4 * 1024 * 1024;
const COMPACTION_MIN_BYTES: u64 = 1024 * 1024;

fn bincode_options() -> impl Options + Copy {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(MAX_VALUE_LEN as u64)
}

#[derive(Debug, Clone, Copy)]
struct RecordLocation {
    value_offset: u64,
    value_len: u32,
    record_len: u64,
}

#[derive(Debug)]
struct StoreInner {
    file: File,
    index: HashMap<String, RecordLocation>,
    /// Logical end of the log, including buffered bytes
    end: u64,
    /// End of the bytes already handed to the OS
    durable_end: u64,
    pending: Vec<u8>,
    live_bytes: u64,
}

impl StoreInner {
    fn write_pending(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.file.seek(SeekFrom::Start(self.durable_end))?;
        self.file.write_all(&self.pending)?;
        self.durable_end += self.pending.len() as u64;
        self.pending.clear();
        Ok(())
    }

    fn read_value(&mut self, loc: RecordLocation) -> io::Result<Vec<u8>> {
        let len = loc.value_len as usize;
        if loc.value_offset >= self.durable_end {
            let start = (loc.value_offset - self.durable_end) as usize;
            return self
                .pending
                .get(start..start + len)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| io::Error::other("record points past the end of the log"));
        }

        let mut buf = vec![0u8; len];
        self.file.seek(SeekFrom::Start(loc.value_offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn reset(&mut self) -> io::Result<()> {
        self.file.set_len(0)?;
        write_header(&mut self.file)?;
        self.index.clear();
        self.pending.clear();
        self.end = HEADER_LEN;
        self.durable_end = HEADER_LEN;
        self.live_bytes = 0;
        Ok(())
    }
}

/// Size information about the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub crates: usize,
    pub file_bytes: u64,
    pub live_bytes: u64,
}

/// On-disk map from crate name to its versions
#[derive(Debug)]
pub struct IndexStore {
    dir: PathBuf,
    path: PathBuf,
    inner: Mutex<StoreInner>,
    lock: File,
    rebuilt: bool,
    truncated: bool,
}

impl IndexStore {
    /// Open (or create) the store in `dir`
    ///
    /// A file written with another format version is discarded and the store
    /// starts empty; [`IndexStore::was_rebuilt`] reports that case. The log is
    /// cut back to the last readable record when a crash left a torn tail or a
    /// record is damaged; [`IndexStore::was_truncated`] reports that case.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        let lock = acquire_lock(&dir.join(STORE_LOCK_FILE))?;

        let path = dir.join(STORE_FILE);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let mut rebuilt = false;
        if file.metadata()?.len() == 0 {
            write_header(&mut file)?;
        } else if let Some(reason) = check_header(&mut file)? {
            tracing::warn!(
                path = %path.display(),
                "Discarding crates index store: {}",
                reason
            );
            file.set_len(0)?;
            write_header(&mut file)?;
            rebuilt = true;
        }

        let file_len = file.metadata()?.len();
        let scan = scan_records(&file, file_len)?;
        let truncated = scan.end < file_len;
        if truncated {
            tracing::warn!(
                path = %path.display(),
                valid_bytes = scan.end,
                file_bytes = file_len,
                "Truncating unreadable records of the crates index store"
            );
            file.set_len(scan.end)?;
            file.sync_data()?;
        }

        let store = Self {
            dir: dir.to_path_buf(),
            path,
            inner: Mutex::new(StoreInner {
                file,
                index: scan.index,
                end: scan.end,
                durable_end: scan.end,
                pending: Vec::new(),
                live_bytes: scan.live_bytes,
            }),
            lock,
            rebuilt,
            truncated,
        };

        if let Err(e) = store.compact_if_needed() {
            tracing::warn!("Failed to compact crates index store: {}", e);
        }

        Ok(store)
    }

    /// Delete every on-disk file of a store directory
    pub fn remove_all(dir: &Path) -> anyhow::Result<()> {
        remove_dir_all_if_exists(dir)
    }

    /// Whether opening discarded an incompatible or unreadable file
    pub fn was_rebuilt(&self) -> bool {
        self.rebuilt
    }

    /// Whether opening dropped records that could not be read back
    pub fn was_truncated(&self) -> bool {
        self.truncated
    }

    /// Records may be missing: the store no longer matches any indexed commit
    pub fn lost_records(&self) -> bool {
        self.rebuilt || self.truncated
    }

    pub fn get(&self, name: &str) -> Result<Option<Crate>, StoreError> {
        let mut inner = self.inner.lock();
        let Some(loc) = inner.index.get(name).copied() else {
            return Ok(None);
        };

        let bytes = inner.read_value(loc)?;
        let versions: Vec<CrateVersion> =
            bincode_options()
                .deserialize(&bytes)
                .map_err(|e| StoreError::Corrupted {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?;
        Ok(Some(Crate::new(name, versions)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.lock().index.contains_key(name)
    }

    /// All crate names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.lock().index.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.inner.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().index.is_empty()
    }

    /// Replace the stored versions of `krate` wholesale
    ///
    /// Writes are buffered; call [`IndexStore::flush`] before relying on them
    /// surviving a restart.
    pub fn put(&self, krate: &Crate) -> Result<(), StoreError> {
        let name = krate.name().as_bytes();
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(StoreError::RecordTooLarge { len: name.len() });
        }
        let value = bincode_options().serialize(krate.versions())?;
        if value.len() > MAX_VALUE_LEN {
            return Err(StoreError::RecordTooLarge { len: value.len() });
        }

        let mut inner = self.inner.lock();
        let record_start = inner.end;
        let value_offset = record_start + 8 + name.len() as u64;
        let record_len = 8 + name.len() as u64 + value.len() as u64;

        inner.pending.extend_from_slice(&(name.len() as u32).to_le_bytes());
        inner.pending.extend_from_slice(name);
        inner.pending.extend_from_slice(&(value.len() as u32).to_le_bytes());
        inner.pending.extend_from_slice(&value);
        inner.end += record_len;

        let loc = RecordLocation {
            value_offset,
            value_len: value.len() as u32,
            record_len,
        };
        if let Some(previous) = inner.index.insert(krate.name().to_string(), loc) {
            inner.live_bytes -= previous.record_len;
        }
        inner.live_bytes += record_len;

        if inner.pending.len() >= WRITE_BUFFER_BYTES {
            inner.write_pending()?;
        }
        Ok(())
    }

    /// Make every prior `put` durable
    pub fn flush(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.write_pending()?;
        inner.file.sync_data()?;
        Ok(())
    }

    /// Drop every record, leaving an empty store with a fresh header
    pub fn wipe(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.reset()?;
        inner.file.sync_data()?;
        Ok(())
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.lock();
        StoreStats {
            crates: inner.index.len(),
            file_bytes: inner.end,
            live_bytes: inner.live_bytes,
        }
    }

    /// Rewrite the log when superseded records take up most of it
    pub fn compact_if_needed(&self) -> Result<bool, StoreError> {
        let needs_compaction = {
            let inner = self.inner.lock();
            let record_bytes = inner.end - HEADER_LEN;
            inner.end >= COMPACTION_MIN_BYTES && record_bytes > inner.live_bytes * 2
        };
        if needs_compaction {
            self.compact()?;
        }
        Ok(needs_compaction)
    }

    /// Rewrite the log keeping only the newest record of each crate
    pub fn compact(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.write_pending()?;

        let before = inner.end;
        let tmp_path = temp_path_for(&self.path)?;
        let result = write_compacted(&mut inner, &tmp_path);
        let new_index = match result {
            Ok(new_index) => new_index,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        sync_dir_best_effort(&self.dir);

        inner.file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        let end = inner.file.metadata()?.len();
        inner.index = new_index;
        inner.end = end;
        inner.durable_end = end;
        inner.live_bytes = end - HEADER_LEN;

        tracing::info!(
            before_bytes = before,
            after_bytes = end,
            crates = inner.index.len(),
            "Compacted crates index store"
        );
        Ok(())
    }
}

impl Drop for IndexStore {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        if let Err(e) = inner.write_pending().and_then(|()| inner.file.sync_data()) {
            tracing::warn!("Failed to flush crates index store on close: {}", e);
        }
        drop(inner);
        let _ = fs2::FileExt::unlock(&self.lock);
    }
}

fn acquire_lock(path: &Path) -> Result<File, StoreError> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    match file.try_lock_exclusive() {
        Ok(()) => Ok(file),
        Err(e) if e.kind() == fs2::lock_contended_error().kind() => Err(StoreError::Locked {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}

fn write_header(file: &mut File) -> io::Result<()> {
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&STORE_MAGIC)?;
    file.write_all(&STORE_FORMAT_VERSION.to_le_bytes())?;
    file.sync_data()
}

/// Returns the reason the header is unusable, `None` when it matches
fn check_header(file: &mut File) -> io::Result<Option<String>> {
    let mut header = [0u8; HEADER_LEN as usize];
    file.seek(SeekFrom::Start(0))?;
    if let Err(e) = file.read_exact(&mut header) {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            return Ok(Some("truncated header".to_string()));
        }
        return Err(e);
    }

    if header[..8] != STORE_MAGIC {
        return Ok(Some("unrecognized file magic".to_string()));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&header[8..12]);
    let version = u32::from_le_bytes(version);
    if version != STORE_FORMAT_VERSION {
        return Ok(Some(format!(
            "incompatible format version: expected {STORE_FORMAT_VERSION}, found {version}"
        )));
    }
    Ok(None)
}

struct ScanResult {
    index: HashMap<String, RecordLocation>,
    end: u64,
    live_bytes: u64,
}

fn scan_records(file: &File, file_len: u64) -> io::Result<ScanResult> {
    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(HEADER_LEN))?;

    let mut index: HashMap<String, RecordLocation> = HashMap::new();
    let mut offset = HEADER_LEN;
    let mut live_bytes = 0u64;

    loop {
        let Some(name_len) = read_u32(&mut reader)? else {
            break;
        };
        let name_len = name_len as usize;
        if name_len == 0 || name_len > MAX_NAME_LEN {
            break;
        }

        let mut name = vec![0u8; name_len];
        if !read_exact_or_eof(&mut reader, &mut name)? {
            break;
        }
        let Ok(name) = String::from_utf8(name) else {
            break;
        };

        let Some(value_len) = read_u32(&mut reader)? else {
            break;
        };
        if value_len as usize > MAX_VALUE_LEN {
            break;
        }

        let value_offset = offset + 8 + name_len as u64;
        let record_end = value_offset + value_len as u64;
        if record_end > file_len {
            break;
        }
        reader.seek_relative(value_len as i64)?;

        let loc = RecordLocation {
            value_offset,
            value_len,
            record_len: record_end - offset,
        };
        if let Some(previous) = index.insert(name, loc) {
            live_bytes -= previous.record_len;
        }
        live_bytes += loc.record_len;
        offset = record_end;
    }

    Ok(ScanResult {
        index,
        end: offset,
        live_bytes,
    })
}

fn read_u32(reader: &mut impl Read) -> io::Result<Option<u32>> {
    let mut buf = [0u8; 4];
    if read_exact_or_eof(reader, &mut buf)? {
        Ok(Some(u32::from_le_bytes(buf)))
    } else {
        Ok(None)
    }
}

fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

fn write_compacted(
    inner: &mut StoreInner,
    tmp_path: &Path,
) -> Result<HashMap<String, RecordLocation>, StoreError> {
    let tmp = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(tmp_path)?;
    let mut out = BufWriter::new(tmp);
    out.write_all(&STORE_MAGIC)?;
    out.write_all(&STORE_FORMAT_VERSION.to_le_bytes())?;

    let mut entries: Vec<(String, RecordLocation)> = inner
        .index
        .iter()
        .map(|(name, loc)| (name.clone(), *loc))
        .collect();
    entries.sort_by_key(|(_, loc)| loc.value_offset);

    let mut new_index = HashMap::with_capacity(entries.len());
    let mut offset = HEADER_LEN;
    for (name, loc) in entries {
        let value = inner.read_value(loc)?;
        out.write_all(&(name.len() as u32).to_le_bytes())?;
        out.write_all(name.as_bytes())?;
        out.write_all(&loc.value_len.to_le_bytes())?;
        out.write_all(&value)?;

        let value_offset = offset + 8 + name.len() as u64;
        let record_len = 8 + name.len() as u64 + loc.value_len as u64;
        new_index.insert(
            name,
            RecordLocation {
                value_offset,
                value_len: loc.value_len,
                record_len,
            },
        );
        offset += record_len;
    }

    let file = out.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(new_index)
}
