//! Observed patterns, chunked along the navigation axis.

use crate::RefineError;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Observed patterns of shape `(navigation..., rows, cols)`, stored flat as
/// `f32` in row-major order.
///
/// Patterns converted from an integer type are rescaled to `[-1, 1]` before
/// correlation; float patterns are only centered.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternStack {
    nav_shape: Vec<usize>,
    sig_shape: (usize, usize),
    data: Vec<f32>,
    chunk_len: usize,
    integer_source: bool,
}

impl PatternStack {
    /// Float patterns, one navigation chunk.
    pub fn new(nav_shape: Vec<usize>, sig_shape: (usize, usize), data: Vec<f32>) -> Result<Self, RefineError> {
        let expected = nav_shape.iter().product::<usize>() * sig_shape.0 * sig_shape.1;
        if data.len() != expected || nav_shape.is_empty() {
            return Err(RefineError::PatternDataSize {
                got: data.len(),
                expected,
                navigation: nav_shape,
                signal: sig_shape,
            });
        }
        let chunk_len = nav_shape.iter().product::<usize>().max(1);
        Ok(Self {
            nav_shape,
            sig_shape,
            data,
            chunk_len,
            integer_source: false,
        })
    }

    /// 8-bit patterns, as read from most acquisition formats.
    pub fn from_u8(nav_shape: Vec<usize>, sig_shape: (usize, usize), data: &[u8]) -> Result<Self, RefineError> {
        let mut stack = Self::new(nav_shape, sig_shape, data.iter().map(|&v| v as f32).collect())?;
        stack.integer_source = true;
        Ok(stack)
    }

    /// Store with navigation chunks of `chunk_len` points.
    pub fn with_chunk_len(mut self, chunk_len: usize) -> Self {
        self.chunk_len = chunk_len.clamp(1, self.nav_size().max(1));
        self
    }

    pub fn nav_shape(&self) -> &[usize] {
        &self.nav_shape
    }

    pub fn nav_size(&self) -> usize {
        self.nav_shape.iter().product()
    }

    pub fn sig_shape(&self) -> (usize, usize) {
        self.sig_shape
    }

    pub fn sig_size(&self) -> usize {
        self.sig_shape.0 * self.sig_shape.1
    }

    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    /// Whether patterns came from an integer type.
    pub fn is_integer_source(&self) -> bool {
        self.integer_source
    }

    pub fn pattern(&self, i: usize) -> &[f32] {
        let n = self.sig_size();
        &self.data[i * n..(i + 1) * n]
    }

    /// Navigation index ranges of the stored chunks.
    pub fn chunks(&self) -> Vec<Range<usize>> {
        chunk_ranges(self.nav_size(), self.chunk_len)
    }
}

pub(crate) fn chunk_ranges(n: usize, chunk_len: usize) -> Vec<Range<usize>> {
    let chunk_len = chunk_len.max(1);
    (0..n)
        .step_by(chunk_len)
        .map(|start| start..(start + chunk_len).min(n))
        .collect()
}

fn default_chunk_bytes() -> usize {
    30 * 1024 * 1024
}

/// How to rechunk patterns along the navigation axis before refining.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Navigation points per chunk; derived from `chunk_bytes` when unset.
    #[serde(default)]
    pub chunk_shape: Option<usize>,
    /// Target chunk size in bytes of `f32` pattern data.
    #[serde(default = "default_chunk_bytes")]
    pub chunk_bytes: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_shape: None,
            chunk_bytes: default_chunk_bytes(),
        }
    }
}

impl ChunkConfig {
    /// Navigation points per chunk for patterns of `sig_size` pixels.
    pub fn chunk_len(&self, sig_size: usize) -> usize {
        match self.chunk_shape {
            Some(n) => n.max(1),
            None => (self.chunk_bytes / (sig_size.max(1) * std::mem::size_of::<f32>())).max(1),
        }
    }
}

/// Boolean mask over a grid; `true` excludes the entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mask {
    pub shape: Vec<usize>,
    pub data: Vec<bool>,
}

impl Mask {
    /// Mask excluding nothing.
    pub fn none(shape: Vec<usize>) -> Self {
        let n = shape.iter().product();
        Self {
            shape,
            data: vec![false; n],
        }
    }

    /// Mask excluding the given flat indices.
    pub fn excluding(shape: Vec<usize>, indices: &[usize]) -> Self {
        let mut mask = Self::none(shape);
        for &i in indices {
            if let Some(v) = mask.data.get_mut(i) {
                *v = true;
            }
        }
        mask
    }

    pub fn n_excluded(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Whether shape and data agree with `expected`.
    pub(crate) fn fits(&self, expected: &[usize]) -> bool {
        self.shape == expected && self.data.len() == expected.iter().product::<usize>()
    }
}
