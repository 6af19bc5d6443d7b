use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::TransferError;

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Computes SHA-256 of an entire file and returns the hex-encoded digest.
pub fn calculate_file_checksum(path: &Path) -> Result<String, TransferError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// Chunk geometry
// ---------------------------------------------------------------------------

/// Returns `(offset, len)` of chunk `index`, or `None` past the last chunk.
///
/// Every chunk is `chunk_size` bytes except the last, which holds the
/// remainder and is never padded.
pub fn chunk_bounds(file_size: u64, chunk_size: u64, index: u32) -> Option<(u64, u64)> {
    if chunk_size == 0 {
        return None;
    }
    let offset = u64::from(index).checked_mul(chunk_size)?;
    if offset >= file_size {
        return None;
    }
    Some((offset, chunk_size.min(file_size - offset)))
}

/// A contiguous byte range of the source file, the unit of transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: u32,
    /// Byte offset within the file.
    pub offset: u64,
    pub data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Reads chunks of a file by index.
pub struct ChunkReader {
    file: std::fs::File,
    file_size: u64,
    chunk_size: u64,
}

impl ChunkReader {
    /// Opens `path` for chunked reading.
    ///
    /// Fails with [`TransferError::SizeMismatch`] when the file on disk no
    /// longer has the size the session was negotiated for.
    pub fn open(path: &Path, expected_size: u64, chunk_size: u64) -> Result<Self, TransferError> {
        let file = std::fs::File::open(path)?;
        let actual = file.metadata()?.len();
        if actual != expected_size {
            return Err(TransferError::SizeMismatch {
                expected: expected_size,
                actual,
            });
        }
        Ok(Self {
            file,
            file_size: actual,
            chunk_size,
        })
    }

    /// Reads chunk `index`. Returns `None` past the end of the file.
    pub fn read_chunk(&mut self, index: u32) -> Result<Option<Chunk>, TransferError> {
        let Some((offset, len)) = chunk_bounds(self.file_size, self.chunk_size, index) else {
            return Ok(None);
        };
        let len = usize::try_from(len)
            .map_err(|_| TransferError::InvalidPath(format!("chunk {index} too large")))?;
        self.file.seek(SeekFrom::Start(offset))?;
        let mut data = vec![0u8; len];
        self.file.read_exact(&mut data)?;
        Ok(Some(Chunk {
            index,
            offset,
            data,
        }))
    }

    /// Total file size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path
    }

    #[test]
    fn checksum_bytes_known_vector() {
        assert_eq!(
            checksum_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(checksum_bytes(b"chunk-0"), checksum_bytes(b"chunk-1"));
    }

    #[test]
    fn calculate_file_checksum_matches_bytes() {
        let dir = TempDir::new().unwrap();
        let data = b"test content for checksum";
        let path = create_test_file(dir.path(), "test.bin", data);

        let file_cs = calculate_file_checksum(&path).unwrap();
        assert_eq!(file_cs, checksum_bytes(data));
    }

    #[test]
    fn bounds_last_chunk_holds_remainder() {
        // 10 MB file, 2 MB chunks: five full chunks.
        let mb = 1024 * 1024;
        assert_eq!(chunk_bounds(10 * mb, 2 * mb, 4), Some((8 * mb, 2 * mb)));
        assert_eq!(chunk_bounds(10 * mb, 2 * mb, 5), None);

        // 10 bytes, 4 byte chunks: 4 + 4 + 2.
        assert_eq!(chunk_bounds(10, 4, 0), Some((0, 4)));
        assert_eq!(chunk_bounds(10, 4, 2), Some((8, 2)));
        assert_eq!(chunk_bounds(10, 4, 3), None);
    }

    #[test]
    fn bounds_zero_chunk_size() {
        assert_eq!(chunk_bounds(10, 0, 0), None);
    }

    #[test]
    fn reader_reads_by_index() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"AABBCCDDEE");

        let mut reader = ChunkReader::open(&path, 10, 4).unwrap();
        assert_eq!(reader.file_size(), 10);

        let c2 = reader.read_chunk(2).unwrap().unwrap();
        assert_eq!(c2.offset, 8);
        assert_eq!(&c2.data, b"EE");

        // Out of order reads seek correctly.
        let c0 = reader.read_chunk(0).unwrap().unwrap();
        assert_eq!(&c0.data, b"AABB");
        let c1 = reader.read_chunk(1).unwrap().unwrap();
        assert_eq!(&c1.data, b"CCDD");

        assert!(reader.read_chunk(3).unwrap().is_none());
    }

    #[test]
    fn reader_rejects_changed_file() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"0123456789");

        let result = ChunkReader::open(&path, 12, 4);
        assert!(matches!(
            result,
            Err(TransferError::SizeMismatch {
                expected: 12,
                actual: 10
            })
        ));
    }

    #[test]
    fn reader_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = ChunkReader::open(&dir.path().join("gone.bin"), 1, 1);
        assert!(matches!(result, Err(TransferError::Io(_))));
    }

    #[test]
    fn chunks_reassemble_original() {
        let dir = TempDir::new().unwrap();
        let original = b"The quick brown fox jumps over the lazy dog";
        let path = create_test_file(dir.path(), "fox.txt", original);

        let mut reader = ChunkReader::open(&path, original.len() as u64, 10).unwrap();
        let mut out = Vec::new();
        let mut index = 0;
        while let Some(chunk) = reader.read_chunk(index).unwrap() {
            assert_eq!(chunk.offset, out.len() as u64);
            out.extend_from_slice(&chunk.data);
            index += 1;
        }
        assert_eq!(index, 5);
        assert_eq!(&out, original);
    }
}
