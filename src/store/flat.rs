//! Exact in-memory cosine index and its on-disk blob encoding

use crate::embed::normalize_embedding;
use crate::error::{Error, Result};
use std::cmp::Ordering;

const MAGIC: &[u8; 4] = b"KBVI";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8 + 8;

/// Row-major matrix of unit vectors; row `i` is the chunk with the
/// `i`-th smallest id
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    generation: u64,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn empty(dimension: usize, generation: u64) -> Self {
        Self {
            dimension,
            generation,
            data: Vec::new(),
        }
    }

    /// Normalize and pack `vectors` in the order given
    pub fn build(dimension: usize, generation: u64, vectors: Vec<Vec<f32>>) -> Result<Self> {
        let mut data = Vec::with_capacity(vectors.len() * dimension);
        for vector in &vectors {
            if vector.len() != dimension {
                return Err(Error::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            data.extend(normalize_embedding(vector));
        }

        Ok(Self {
            dimension,
            generation,
            data,
        })
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stored (normalized) vector for a row
    pub fn row(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.dimension)?;
        self.data.get(start..start.checked_add(self.dimension)?)
    }

    /// Top `top_k` rows by cosine similarity, best first; equal scores keep
    /// the lower row first
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query = normalize_embedding(query);
        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(row, vector)| (row, dot(&query, vector)))
            .collect();

        scored.sort_by(|a, b| match b.1.total_cmp(&a.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    /// Serialize to the blob format: magic, version, dimension, generation,
    /// row count, then little-endian f32 rows
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        bytes.extend_from_slice(&self.generation.to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::CorruptIndex(format!(
                "header truncated ({} bytes)",
                bytes.len()
            )));
        }
        if &bytes[0..4] != MAGIC {
            return Err(Error::CorruptIndex("bad magic".to_string()));
        }

        let version = read_u32(&bytes[4..8]);
        if version != FORMAT_VERSION {
            return Err(Error::CorruptIndex(format!(
                "unsupported format version {}",
                version
            )));
        }

        let dimension = read_u32(&bytes[8..12]) as usize;
        let generation = read_u64(&bytes[12..20]);
        let count = read_u64(&bytes[20..28]) as usize;

        let body = &bytes[HEADER_LEN..];
        let expected = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| Error::CorruptIndex("row count overflows".to_string()))?;
        if body.len() != expected {
            return Err(Error::CorruptIndex(format!(
                "expected {} data bytes for {} rows, found {}",
                expected,
                count,
                body.len()
            )));
        }

        let data = body
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(Self {
            dimension,
            generation,
            data,
        })
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}
