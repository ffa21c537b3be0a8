use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// SHA-256 digest of an original's byte stream; the deduplication key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// 64 lowercase hex characters, never truncated.
    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl TryFrom<&[u8]> for ContentHash {
    type Error = std::array::TryFromSliceError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Ok(ContentHash(bytes.try_into()?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashResult {
    pub sum: ContentHash,
    /// Number of bytes consumed.
    pub len: u64,
}

/// Stream `reader` through SHA-256 with a fixed-size buffer.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<HashResult> {
    let mut hasher = Sha256::new();
    let mut len = 0u64;

    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
        len += bytes_read as u64;
    }

    let mut sum = [0u8; 32];
    sum.copy_from_slice(&hasher.finalize());
    Ok(HashResult {
        sum: ContentHash(sum),
        len,
    })
}

pub fn hash_file(path: &Path) -> io::Result<HashResult> {
    let file = File::open(path)?;
    hash_reader(BufReader::new(file))
}
