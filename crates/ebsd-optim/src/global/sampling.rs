//! Low-discrepancy point sets in the unit cube.

use crate::OptimizeError;
use serde::{Deserialize, Serialize};

const SOBOL_BITS: usize = 32;

/// `(s, a, m)` primitive polynomial data for Sobol dimensions 2 and up
/// (Joe and Kuo).
const SOBOL_POLYNOMIALS: [(u32, u32, &[u32]); 7] = [
    (1, 0, &[1]),
    (2, 1, &[1, 3]),
    (3, 1, &[1, 3, 1]),
    (3, 2, &[1, 1, 1]),
    (4, 1, &[1, 1, 3, 3]),
    (4, 4, &[1, 3, 5, 13]),
    (5, 2, &[1, 1, 5, 5, 17]),
];

const HALTON_PRIMES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMethod {
    #[default]
    Sobol,
    Halton,
}

impl SamplingMethod {
    /// Points `start..start + count` of the sequence in `dim` dimensions.
    pub fn points(self, dim: usize, start: usize, count: usize) -> Result<Vec<Vec<f64>>, OptimizeError> {
        match self {
            SamplingMethod::Sobol => sobol(dim, start, count),
            SamplingMethod::Halton => halton(dim, start, count),
        }
    }
}

fn direction_numbers(dim: usize) -> Vec<[u32; SOBOL_BITS]> {
    let mut out = Vec::with_capacity(dim);
    let mut first = [0u32; SOBOL_BITS];
    for (j, v) in first.iter_mut().enumerate() {
        *v = 1 << (SOBOL_BITS - 1 - j);
    }
    out.push(first);

    for &(s, a, m) in SOBOL_POLYNOMIALS.iter().take(dim.saturating_sub(1)) {
        let s = s as usize;
        let mut v = [0u32; SOBOL_BITS];
        for j in 0..SOBOL_BITS {
            v[j] = if j < s {
                m[j] << (SOBOL_BITS - 1 - j)
            } else {
                let mut x = v[j - s] ^ (v[j - s] >> s);
                for k in 1..s {
                    if (a >> (s - 1 - k)) & 1 == 1 {
                        x ^= v[j - k];
                    }
                }
                x
            };
        }
        out.push(v);
    }
    out
}

/// Sobol points (unscrambled, gray-code order) skipping the origin.
pub fn sobol(dim: usize, start: usize, count: usize) -> Result<Vec<Vec<f64>>, OptimizeError> {
    let max_dim = SOBOL_POLYNOMIALS.len() + 1;
    if dim == 0 || dim > max_dim {
        return Err(OptimizeError::InvalidParameter {
            name: "sampling_method",
            reason: format!("sobol sampling supports 1 to {max_dim} dimensions, got {dim}"),
        });
    }
    let v = direction_numbers(dim);
    let scale = 1.0 / (1u64 << SOBOL_BITS) as f64;
    Ok((start..start + count)
        .map(|i| {
            let index = (i + 1) as u64;
            let gray = index ^ (index >> 1);
            v.iter()
                .map(|dir| {
                    let mut x = 0u32;
                    for (bit, d) in dir.iter().enumerate() {
                        if (gray >> bit) & 1 == 1 {
                            x ^= d;
                        }
                    }
                    x as f64 * scale
                })
                .collect()
        })
        .collect())
}

fn radical_inverse(mut i: u64, base: u64) -> f64 {
    let inv = 1.0 / base as f64;
    let mut f = inv;
    let mut r = 0.0;
    while i > 0 {
        r += (i % base) as f64 * f;
        i /= base;
        f *= inv;
    }
    r
}

/// Halton points skipping the origin.
pub fn halton(dim: usize, start: usize, count: usize) -> Result<Vec<Vec<f64>>, OptimizeError> {
    if dim == 0 || dim > HALTON_PRIMES.len() {
        return Err(OptimizeError::InvalidParameter {
            name: "sampling_method",
            reason: format!("halton sampling supports 1 to {} dimensions, got {dim}", HALTON_PRIMES.len()),
        });
    }
    Ok((start..start + count)
        .map(|i| {
            HALTON_PRIMES[..dim]
                .iter()
                .map(|&p| radical_inverse(i as u64 + 1, p))
                .collect()
        })
        .collect())
}
