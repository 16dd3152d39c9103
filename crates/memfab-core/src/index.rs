//! Exact inner-product vector index.
//!
//! Vectors are stored contiguously and searched by brute force, which is
//! exact and fast enough for per-user collections. Positions are assigned
//! in insertion order and line up with the semantic tier's metadata.
//!
//! On-disk layout (little endian):
//!
//! ```text
//! magic "MFVX" | version u32 | dim u32 | count u64 | count * dim f32
//! ```

use std::io::{Error as IoError, ErrorKind};
use std::path::Path;

use crate::error::{FabricError, FabricResult};
use crate::utils::write_atomic;

const INDEX_MAGIC: &[u8; 4] = b"MFVX";
const INDEX_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// Flat (exhaustive) inner-product index
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dim: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim: dim.max(1),
            data: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Number of stored vectors
    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append a vector, returning its position
    pub fn add(&mut self, vector: &[f32]) -> FabricResult<usize> {
        if vector.len() != self.dim {
            return Err(FabricError::invalid_input(format!(
                "vector has {} dimensions, index expects {}",
                vector.len(),
                self.dim
            )));
        }
        self.data.extend_from_slice(vector);
        Ok(self.len() - 1)
    }

    /// Vector stored at `position`
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dim)?;
        self.data.get(start..start + self.dim)
    }

    /// Top `k` positions by inner product with `query`, best first.
    ///
    /// Equal scores keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(f32, usize)> {
        if query.len() != self.dim || k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(f32, usize)> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(position, v)| {
                let score: f32 = v.iter().zip(query).map(|(a, b)| a * b).sum();
                (score, position)
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    /// Drop every vector at or after position `len`
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len.saturating_mul(self.dim));
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        out.extend_from_slice(INDEX_MAGIC);
        out.extend_from_slice(&INDEX_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.dim as u32).to_le_bytes());
        out.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for x in &self.data {
            out.extend_from_slice(&x.to_le_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> FabricResult<Self> {
        if bytes.len() < HEADER_LEN || &bytes[..4] != INDEX_MAGIC {
            return Err(invalid_data("not a vector index file"));
        }

        let version = u32::from_le_bytes(read_array(&bytes[4..8]));
        if version != INDEX_VERSION {
            return Err(invalid_data(format!("unsupported index version {}", version)));
        }

        let dim = u32::from_le_bytes(read_array(&bytes[8..12])) as usize;
        let count = u64::from_le_bytes(read_array(&bytes[12..20])) as usize;
        if dim == 0 {
            return Err(invalid_data("index dimension is zero"));
        }

        let body = &bytes[HEADER_LEN..];
        let expected = count
            .checked_mul(dim)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| invalid_data("index header overflows"))?;
        if body.len() != expected {
            return Err(invalid_data(format!(
                "index body is {} bytes, header promises {}",
                body.len(),
                expected
            )));
        }

        let data = body
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(read_array(c)))
            .collect();

        Ok(Self { dim, data })
    }

    /// Write the index to `path` atomically
    pub fn save(&self, path: &Path) -> FabricResult<()> {
        write_atomic(path, &self.to_bytes())
    }

    pub fn load(path: &Path) -> FabricResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

fn read_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

fn invalid_data(message: impl Into<String>) -> FabricError {
    FabricError::Io(IoError::new(ErrorKind::InvalidData, message.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_add_and_search() {
        let mut index = FlatIndex::new(2);
        assert_eq!(index.add(&[1.0, 0.0]).unwrap(), 0);
        assert_eq!(index.add(&[0.0, 1.0]).unwrap(), 1);
        assert_eq!(index.add(&[0.6, 0.8]).unwrap(), 2);

        let hits = index.search(&[0.0, 1.0], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].1, 1);
        assert_eq!(hits[1].1, 2);
        assert!((hits[1].0 - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_search_ties_keep_insertion_order() {
        let mut index = FlatIndex::new(2);
        index.add(&[1.0, 0.0]).unwrap();
        index.add(&[1.0, 0.0]).unwrap();
        index.add(&[1.0, 0.0]).unwrap();

        let positions: Vec<usize> = index.search(&[1.0, 0.0], 5).into_iter().map(|h| h.1).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_rejects_wrong_dimension() {
        let mut index = FlatIndex::new(3);
        assert!(index.add(&[1.0, 0.0]).is_err());
        assert!(index.search(&[1.0], 3).is_empty());
    }

    #[test]
    fn test_truncate() {
        let mut index = FlatIndex::new(2);
        for _ in 0..4 {
            index.add(&[1.0, 0.0]).unwrap();
        }
        index.truncate(2);
        assert_eq!(index.len(), 2);
        assert!(index.vector(2).is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alice.index");

        let mut index = FlatIndex::new(3);
        index.add(&[0.1, 0.2, 0.3]).unwrap();
        index.add(&[-1.0, 0.0, 2.5]).unwrap();
        index.save(&path).unwrap();

        let loaded = FlatIndex::load(&path).unwrap();
        assert_eq!(loaded, index);
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(FlatIndex::from_bytes(b"nope").is_err());

        let mut bytes = FlatIndex::new(2).to_bytes();
        bytes.extend_from_slice(&[0, 0, 0]); // body not matching header
        assert!(FlatIndex::from_bytes(&bytes).is_err());
    }
}
