//! On-disk persistence of the (index, chunks) artifact pair.
//!
//! ## Index file
//!
//! ```text
//! offset  size  field
//!      0     4  magic "DQIX"
//!      4     4  format version (u32)
//!      8     4  dimension (u32)
//!     12     4  reserved
//!     16     8  row count (u64)
//!     24    32  BLAKE3 of the chunk file bytes
//!     56    32  BLAKE3 of the backend identity string
//!     88     -  count * dimension native-endian f32
//! ```
//!
//! ## Chunk file
//!
//! A JSON array of chunk texts, position `i` matching index row `i`.
//!
//! Writers hold an exclusive advisory lock on `<index_path>.lock`, readers a
//! shared one. Both halves are written to temporary files in the target
//! directory and renamed into place.

use crate::error::ArtifactError;
use crate::retrieval::vector_index::FlatIndex;
use bytemuck::{Pod, Zeroable};
use fs2::FileExt;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const MAGIC: [u8; 4] = *b"DQIX";
pub const FORMAT_VERSION: u32 = 1;
pub const HEADER_LEN: usize = std::mem::size_of::<IndexHeader>();

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct IndexHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub dimension: u32,
    pub reserved: u32,
    pub count: u64,
    pub chunks_digest: [u8; 32],
    pub backend_digest: [u8; 32],
}

/// A loaded artifact pair
#[derive(Debug, Clone)]
pub struct IndexArtifact {
    pub index: FlatIndex,
    pub chunks: Vec<String>,
}

/// Header-level facts about a stored artifact, for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactInfo {
    pub index_path: PathBuf,
    pub chunks_path: PathBuf,
    pub dimension: usize,
    pub count: usize,
    pub index_size_bytes: u64,
    pub chunks_size_bytes: u64,
    pub chunks_digest: String,
    pub backend_digest: String,
    /// Unix timestamp of the index file's last modification
    pub modified: Option<i64>,
}

/// Advisory lock on the artifact's lock file, released on drop
struct LockGuard {
    file: File,
}

impl LockGuard {
    fn exclusive(index_path: &Path) -> io::Result<Self> {
        let file = Self::open(index_path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }

    fn shared(index_path: &Path) -> io::Result<Self> {
        let file = Self::open(index_path)?;
        FileExt::lock_shared(&file)?;
        Ok(Self { file })
    }

    fn open(index_path: &Path) -> io::Result<File> {
        if let Some(parent) = index_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_path(index_path))
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release index lock: {}", e);
        }
    }
}

pub fn lock_path(index_path: &Path) -> PathBuf {
    let mut name = index_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Stateless reader/writer for artifact pairs.
///
/// The backend identity is part of every stored artifact: loading under a
/// different identity reports [`ArtifactError::Corrupt`] so the caller rebuilds
/// instead of mixing vector spaces.
#[derive(Debug, Clone)]
pub struct IndexStore {
    backend_id: String,
}

impl IndexStore {
    pub fn new(backend_id: impl Into<String>) -> Self {
        Self {
            backend_id: backend_id.into(),
        }
    }

    pub fn backend_id(&self) -> &str {
        &self.backend_id
    }

    /// Persist `index` and `chunks` as one pair.
    pub fn save(
        &self,
        index: &FlatIndex,
        chunks: &[String],
        index_path: &Path,
        chunks_path: &Path,
    ) -> io::Result<()> {
        if index.len() != chunks.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "index has {} rows but there are {} chunks",
                    index.len(),
                    chunks.len()
                ),
            ));
        }

        let _lock = LockGuard::exclusive(index_path)?;

        let chunk_bytes = serde_json::to_vec(chunks)?;
        let header = IndexHeader {
            magic: MAGIC,
            version: FORMAT_VERSION,
            dimension: to_u32(index.dimension())?,
            reserved: 0,
            count: index.len() as u64,
            chunks_digest: *blake3::hash(&chunk_bytes).as_bytes(),
            backend_digest: *blake3::hash(self.backend_id.as_bytes()).as_bytes(),
        };

        let mut index_file = temp_sibling(index_path)?;
        index_file.write_all(bytemuck::bytes_of(&header))?;
        index_file.write_all(bytemuck::cast_slice(index.raw()))?;
        index_file.as_file().sync_all()?;

        let mut chunks_file = temp_sibling(chunks_path)?;
        chunks_file.write_all(&chunk_bytes)?;
        chunks_file.as_file().sync_all()?;

        chunks_file.persist(chunks_path).map_err(|e| e.error)?;
        index_file.persist(index_path).map_err(|e| e.error)?;

        tracing::info!(
            "Saved index of {} vectors (dimension {}) to {}",
            index.len(),
            index.dimension(),
            index_path.display()
        );
        Ok(())
    }

    /// Load a previously saved pair.
    pub fn load(&self, index_path: &Path, chunks_path: &Path) -> Result<IndexArtifact, ArtifactError> {
        for path in [index_path, chunks_path] {
            if !path.exists() {
                return Err(ArtifactError::NotFound {
                    path: path.to_path_buf(),
                });
            }
        }

        let _lock =
            LockGuard::shared(index_path).map_err(|e| ArtifactError::corrupt(index_path, e.to_string()))?;

        let index_bytes = read_file(index_path)?;
        let chunk_bytes = read_file(chunks_path)?;

        let header = parse_header(index_path, &index_bytes)?;

        if header.chunks_digest != *blake3::hash(&chunk_bytes).as_bytes() {
            return Err(ArtifactError::corrupt(
                chunks_path,
                "chunk file does not match the index",
            ));
        }
        if header.backend_digest != *blake3::hash(self.backend_id.as_bytes()).as_bytes() {
            return Err(ArtifactError::corrupt(
                index_path,
                format!("index was built by a different backend than {}", self.backend_id),
            ));
        }

        let dimension = header.dimension as usize;
        let count = usize::try_from(header.count)
            .map_err(|_| ArtifactError::corrupt(index_path, "row count overflows"))?;
        let expected_len = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(std::mem::size_of::<f32>()))
            .ok_or_else(|| ArtifactError::corrupt(index_path, "row count overflows"))?;
        let body = &index_bytes[HEADER_LEN..];
        if body.len() != expected_len {
            return Err(ArtifactError::corrupt(
                index_path,
                format!("expected {} bytes of vectors, found {}", expected_len, body.len()),
            ));
        }
        let data: Vec<f32> = bytemuck::pod_collect_to_vec(body);

        let chunks: Vec<String> = serde_json::from_slice(&chunk_bytes)
            .map_err(|e| ArtifactError::corrupt(chunks_path, e.to_string()))?;

        let index = if count == 0 {
            FlatIndex::default()
        } else {
            FlatIndex::from_raw(dimension, data)
        };
        if index.len() != chunks.len() {
            return Err(ArtifactError::corrupt(
                index_path,
                format!("{} vectors but {} chunks", index.len(), chunks.len()),
            ));
        }

        tracing::info!(
            "Loaded index of {} vectors from {}",
            index.len(),
            index_path.display()
        );
        Ok(IndexArtifact { index, chunks })
    }

    /// Delete both halves of a pair. Missing files are not an error.
    pub fn remove(&self, index_path: &Path, chunks_path: &Path) -> io::Result<()> {
        let _lock = LockGuard::exclusive(index_path)?;
        for path in [index_path, chunks_path] {
            match fs::remove_file(path) {
                Ok(()) => tracing::info!("Removed {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Read only the header and file metadata of a stored pair.
    pub fn inspect(index_path: &Path, chunks_path: &Path) -> Result<ArtifactInfo, ArtifactError> {
        let index_meta = metadata(index_path)?;
        let chunks_meta = metadata(chunks_path)?;

        let mut header_bytes = [0u8; HEADER_LEN];
        File::open(index_path)
            .and_then(|mut f| f.read_exact(&mut header_bytes))
            .map_err(|e| ArtifactError::corrupt(index_path, e.to_string()))?;
        let header = parse_header(index_path, &header_bytes)?;

        let modified = index_meta
            .modified()
            .ok()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).timestamp());

        Ok(ArtifactInfo {
            index_path: index_path.to_path_buf(),
            chunks_path: chunks_path.to_path_buf(),
            dimension: header.dimension as usize,
            count: header.count as usize,
            index_size_bytes: index_meta.len(),
            chunks_size_bytes: chunks_meta.len(),
            chunks_digest: hex::encode(header.chunks_digest),
            backend_digest: hex::encode(header.backend_digest),
            modified,
        })
    }
}

fn parse_header(path: &Path, bytes: &[u8]) -> Result<IndexHeader, ArtifactError> {
    if bytes.len() < HEADER_LEN {
        return Err(ArtifactError::corrupt(path, "file is shorter than the header"));
    }
    let header: IndexHeader = bytemuck::pod_read_unaligned(&bytes[..HEADER_LEN]);
    if header.magic != MAGIC {
        return Err(ArtifactError::corrupt(path, "bad magic"));
    }
    if header.version != FORMAT_VERSION {
        return Err(ArtifactError::corrupt(
            path,
            format!("unsupported format version {}", header.version),
        ));
    }
    Ok(header)
}

fn read_file(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ArtifactError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ArtifactError::corrupt(path, e.to_string()),
    })
}

fn metadata(path: &Path) -> Result<fs::Metadata, ArtifactError> {
    fs::metadata(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ArtifactError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ArtifactError::corrupt(path, e.to_string()),
    })
}

fn temp_sibling(path: &Path) -> io::Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    NamedTempFile::new_in(dir)
}

fn to_u32(value: usize) -> io::Result<u32> {
    u32::try_from(value).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("dimension {value} does not fit the index header"),
        )
    })
}
