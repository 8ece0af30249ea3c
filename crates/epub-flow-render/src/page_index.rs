use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

/// Fingerprint of every layout-affecting setting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PaginationProfileId(pub [u8; 32]);

impl PaginationProfileId {
    /// Build a deterministic profile id from arbitrary payload bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        fn fnv64(seed: u64, payload: &[u8]) -> u64 {
            let mut hash = seed;
            for b in payload {
                hash ^= u64::from(*b);
                hash = hash.wrapping_mul(0x100000001b3);
            }
            hash
        }
        let seeds = [
            0xcbf29ce484222325,
            0x9e3779b97f4a7c15,
            0xd6e8feb86659fd93,
            0xa0761d6478bd642f,
        ];
        let mut out = [0u8; 32];
        for (chunk, seed) in out.chunks_exact_mut(8).zip(seeds) {
            chunk.copy_from_slice(&fnv64(seed, bytes).to_le_bytes());
        }
        Self(out)
    }

    /// Lowercase hex form, used as a directory name.
    pub fn to_hex(self) -> String {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut out = String::with_capacity(64);
        for byte in self.0 {
            out.push(HEX[usize::from(byte >> 4)] as char);
            out.push(HEX[usize::from(byte & 0x0f)] as char);
        }
        out
    }
}

/// Page-start byte offsets for every chapter of a book.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageIndex {
    pub profile: PaginationProfileId,
    /// Per chapter, the byte offset where each page begins.
    pub chapters: Vec<Vec<usize>>,
}

impl PageIndex {
    pub fn new(profile: PaginationProfileId) -> Self {
        Self {
            profile,
            chapters: Vec::new(),
        }
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    pub fn chapter(&self, chapter_index: usize) -> Option<&[usize]> {
        self.chapters.get(chapter_index).map(Vec::as_slice)
    }

    /// Total pages across all chapters.
    pub fn page_count(&self) -> usize {
        self.chapters.iter().map(Vec::len).sum()
    }

    /// Book-wide page number of `page` in `chapter_index`.
    pub fn global_page(&self, chapter_index: usize, page: usize) -> Option<usize> {
        let pages = self.chapters.get(chapter_index)?;
        if page >= pages.len() {
            return None;
        }
        let before: usize = self.chapters[..chapter_index].iter().map(Vec::len).sum();
        Some(before + page)
    }

    /// Page of `chapter_index` containing byte `offset`.
    pub fn page_for_offset(&self, chapter_index: usize, offset: usize) -> Option<usize> {
        let pages = self.chapters.get(chapter_index)?;
        if pages.is_empty() {
            return None;
        }
        Some(pages.partition_point(|start| *start <= offset).saturating_sub(1))
    }

    /// CRC-32 over chapter lengths and offsets.
    pub fn checksum(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        for pages in &self.chapters {
            hasher.update(&(pages.len() as u64).to_le_bytes());
            for offset in pages {
                hasher.update(&(*offset as u64).to_le_bytes());
            }
        }
        hasher.finalize()
    }
}

/// Storage hooks for persisted page indices.
pub trait PageIndexStore {
    /// Load the index for `profile`, if available.
    fn load(&self, _profile: PaginationProfileId) -> Option<PageIndex> {
        None
    }

    /// Persist a completed index.
    fn store(&self, _index: &PageIndex) {}
}

const INDEX_SCHEMA_VERSION: u8 = 1;
const DEFAULT_MAX_INDEX_FILE_BYTES: usize = 4 * 1024 * 1024;
const INDEX_FILE_NAME: &str = "page-index.json";
static INDEX_WRITE_NONCE: AtomicUsize = AtomicUsize::new(0);

/// File-backed page index store.
///
/// Paths are deterministic by profile: `<root>/<profile-hex>/page-index.json`.
///
/// The store uses a JSON envelope with a schema version and an offset
/// checksum, and enforces `max_file_bytes` on both reads and writes. When
/// I/O, decode, checksum or size checks fail, operations return `None`/no-op
/// instead of bubbling errors.
#[derive(Clone, Debug)]
pub struct FilePageIndexStore {
    root: PathBuf,
    max_file_bytes: usize,
}

impl FilePageIndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_file_bytes: DEFAULT_MAX_INDEX_FILE_BYTES,
        }
    }

    /// Set the maximum allowed index file size in bytes.
    ///
    /// Values of `0` are treated as `1` to keep the cap explicit.
    pub fn with_max_file_bytes(mut self, max_file_bytes: usize) -> Self {
        self.max_file_bytes = max_file_bytes.max(1);
        self
    }

    pub fn index_root(&self) -> &Path {
        &self.root
    }

    pub fn max_file_bytes(&self) -> usize {
        self.max_file_bytes
    }

    pub fn index_path(&self, profile: PaginationProfileId) -> PathBuf {
        self.root.join(profile.to_hex()).join(INDEX_FILE_NAME)
    }
}

impl PageIndexStore for FilePageIndexStore {
    fn load(&self, profile: PaginationProfileId) -> Option<PageIndex> {
        let path = self.index_path(profile);
        let max_file_bytes = self.max_file_bytes as u64;
        if fs::metadata(&path).ok()?.len() > max_file_bytes {
            return None;
        }

        let file = File::open(path).ok()?;
        let mut reader = file.take(max_file_bytes.saturating_add(1));
        let mut payload = Vec::with_capacity(256);
        if reader.read_to_end(&mut payload).is_err() {
            return None;
        }
        if payload.len() > self.max_file_bytes {
            return None;
        }
        let envelope: PersistedIndexEnvelope = serde_json::from_slice(&payload).ok()?;
        envelope.into_index(profile)
    }

    fn store(&self, index: &PageIndex) {
        let final_path = self.index_path(index.profile);
        let Some(parent) = final_path.parent() else {
            return;
        };
        if fs::create_dir_all(parent).is_err() {
            return;
        }

        let nonce = INDEX_WRITE_NONCE.fetch_add(1, Ordering::Relaxed);
        let temp_path = parent.join(format!(
            "{}.tmp-{}-{}",
            INDEX_FILE_NAME,
            std::process::id(),
            nonce
        ));

        let envelope = PersistedIndexEnvelope::from_index(index);
        let file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
        {
            Ok(file) => file,
            Err(_) => return,
        };
        let mut writer = CappedWriter::new(BufWriter::new(file), self.max_file_bytes);
        if serde_json::to_writer(&mut writer, &envelope).is_err() || writer.flush().is_err() {
            remove_file_quiet(&temp_path);
            return;
        }
        let file = match writer.into_inner().into_inner() {
            Ok(file) => file,
            Err(_) => {
                remove_file_quiet(&temp_path);
                return;
            }
        };
        if file.sync_all().is_err() {
            remove_file_quiet(&temp_path);
            return;
        }
        drop(file);
        if fs::rename(&temp_path, &final_path).is_err() {
            remove_file_quiet(&temp_path);
            return;
        }
        sync_directory(parent);
    }
}

fn remove_file_quiet(path: &Path) {
    let _ = fs::remove_file(path);
}

fn sync_directory(path: &Path) {
    if let Ok(dir) = File::open(path) {
        let _ = dir.sync_all();
    }
}

struct CappedWriter<W> {
    inner: W,
    max_bytes: usize,
    written: usize,
}

impl<W> CappedWriter<W> {
    fn new(inner: W, max_bytes: usize) -> Self {
        Self {
            inner,
            max_bytes,
            written: 0,
        }
    }

    fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CappedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let next = self.written.saturating_add(buf.len());
        if next > self.max_bytes {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "page index exceeds max_file_bytes",
            ));
        }
        let n = self.inner.write(buf)?;
        self.written = self.written.saturating_add(n);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedIndexEnvelope {
    version: u8,
    profile: String,
    checksum: u32,
    chapters: Vec<Vec<usize>>,
}

impl PersistedIndexEnvelope {
    fn from_index(index: &PageIndex) -> Self {
        Self {
            version: INDEX_SCHEMA_VERSION,
            profile: index.profile.to_hex(),
            checksum: index.checksum(),
            chapters: index.chapters.clone(),
        }
    }

    fn into_index(self, profile: PaginationProfileId) -> Option<PageIndex> {
        if self.version != INDEX_SCHEMA_VERSION || self.profile != profile.to_hex() {
            return None;
        }
        let index = PageIndex {
            profile,
            chapters: self.chapters,
        };
        if index.checksum() != self.checksum {
            return None;
        }
        let ordered = index
            .chapters
            .iter()
            .all(|pages| pages.windows(2).all(|pair| pair[0] < pair[1]));
        ordered.then_some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_index_root(label: &str) -> PathBuf {
        let nonce = INDEX_WRITE_NONCE.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "epub-flow-index-{}-{}-{}",
            label,
            std::process::id(),
            nonce
        ))
    }

    fn sample_index() -> PageIndex {
        PageIndex {
            profile: PaginationProfileId::from_bytes(b"sample"),
            chapters: vec![vec![0, 120, 480], vec![], vec![16]],
        }
    }

    #[test]
    fn profile_id_is_deterministic_and_payload_sensitive() {
        let a = PaginationProfileId::from_bytes(b"480x800");
        let b = PaginationProfileId::from_bytes(b"480x800");
        let c = PaginationProfileId::from_bytes(b"480x801");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_hex().len(), 64);
    }

    #[test]
    fn page_lookups_span_chapters() {
        let index = sample_index();
        assert_eq!(index.page_count(), 4);
        assert_eq!(index.global_page(2, 0), Some(3));
        assert_eq!(index.global_page(1, 0), None);
        assert_eq!(index.page_for_offset(0, 200), Some(1));
        assert_eq!(index.page_for_offset(0, 0), Some(0));
        assert_eq!(index.page_for_offset(1, 5), None);
    }

    #[test]
    fn file_store_persists_and_reloads() {
        let root = temp_index_root("roundtrip");
        let store = FilePageIndexStore::new(&root);
        let index = sample_index();
        assert!(store.load(index.profile).is_none());
        store.store(&index);
        assert_eq!(store.load(index.profile), Some(index));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn file_store_rejects_tampered_offsets() {
        let root = temp_index_root("tampered");
        let store = FilePageIndexStore::new(&root);
        let index = sample_index();
        store.store(&index);
        let path = store.index_path(index.profile);
        let payload = fs::read(&path).unwrap();
        let mut value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        value["chapters"][0][2] = serde_json::json!(481);
        fs::write(&path, value.to_string()).unwrap();
        assert!(store.load(index.profile).is_none());
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn file_store_enforces_max_file_bytes() {
        let root = temp_index_root("capped");
        let store = FilePageIndexStore::new(&root).with_max_file_bytes(16);
        let index = sample_index();
        store.store(&index);
        assert!(!store.index_path(index.profile).exists());
        assert!(store.load(index.profile).is_none());
        assert_eq!(FilePageIndexStore::new(&root).with_max_file_bytes(0).max_file_bytes(), 1);
        let _ = fs::remove_dir_all(root);
    }
}
