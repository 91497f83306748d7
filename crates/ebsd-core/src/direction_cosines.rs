//! Unit vectors from the beam impact point to every detector pixel.
//!
//! The detector frame follows EMsoft: PCs are converted from the Bruker
//! convention, rows are counted from the bottom of the screen, and the frame
//! is tilted by `pi/2 - sample_tilt + tilt` about the detector x axis and by
//! the azimuthal angle about the sample normal.

use crate::detector::{EbsdDetector, TiltTrig};
use nalgebra::Vector3;
use rayon::prelude::*;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Direction cosines for one or many PCs, `n_pc` blocks of `n_pixels` vectors.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectionCosines {
    pub n_pc: usize,
    pub n_pixels: usize,
    pub data: Vec<Vector3<f64>>,
}

impl DirectionCosines {
    /// Direction cosines of every detector pixel for every detector PC.
    ///
    /// A single PC yields one block; several PCs are computed in parallel.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(detector), fields(rows = detector.rows(), cols = detector.cols(), n_pc = detector.navigation_size()))
    )]
    pub fn from_detector(detector: &EbsdDetector) -> Self {
        Self::from_detector_masked(detector, None)
    }

    /// As [`DirectionCosines::from_detector`], keeping only pixels where
    /// `signal_mask` is `false`.
    pub fn from_detector_masked(detector: &EbsdDetector, signal_mask: Option<&[bool]>) -> Self {
        let n_pixels = unmasked_count(detector.size(), signal_mask);
        let pcs = detector.pc();
        let mut data = vec![Vector3::zeros(); pcs.len() * n_pixels];
        if n_pixels > 0 {
            if pcs.len() == 1 {
                direction_cosines_into(detector, pcs[0], signal_mask, &mut data);
            } else {
                data.par_chunks_mut(n_pixels)
                    .zip(pcs.par_iter())
                    .for_each(|(block, &pc)| direction_cosines_into(detector, pc, signal_mask, block));
            }
        }
        Self {
            n_pc: pcs.len(),
            n_pixels,
            data,
        }
    }

    /// Vectors of the `i`-th PC. A single-PC set returns the same block for any `i`.
    #[inline]
    pub fn for_pc(&self, i: usize) -> &[Vector3<f64>] {
        let i = if self.n_pc == 1 { 0 } else { i };
        &self.data[i * self.n_pixels..(i + 1) * self.n_pixels]
    }

    #[inline]
    pub fn is_fixed(&self) -> bool {
        self.n_pc == 1
    }
}

/// Number of pixels kept by a signal mask (`true` = excluded).
#[inline]
pub fn unmasked_count(size: usize, signal_mask: Option<&[bool]>) -> usize {
    signal_mask.map_or(size, |m| m.iter().filter(|&&excluded| !excluded).count())
}

/// Direction cosines for one PC, written in row-major pixel order into `out`.
///
/// Pixels excluded by `signal_mask` are skipped, so `out` must hold exactly
/// the number of unmasked pixels. No allocation happens here; the refinement
/// objective calls this once per evaluation when the PC is free.
pub fn direction_cosines_into(
    detector: &EbsdDetector,
    pc: [f64; 3],
    signal_mask: Option<&[bool]>,
    out: &mut [Vector3<f64>],
) {
    let (rows, cols) = detector.shape();
    let (nrows, ncols) = (rows as f64, cols as f64);
    let xpc = ncols * (0.5 - pc[0]);
    let ypc = nrows * (0.5 - pc[1]);
    let zpc = nrows * pc[2];
    let TiltTrig { ca, sa, cw, sw } = detector.tilt_trig();

    let mut dst = out.iter_mut();
    for row in 0..rows {
        let rr = (rows - 1 - row) as f64;
        let det_y = ypc - (1.0 - nrows) * 0.5 - rr;
        for col in 0..cols {
            if signal_mask.is_some_and(|m| m[row * cols + col]) {
                continue;
            }
            let det_x = xpc + (1.0 - ncols) * 0.5 + col as f64;
            let ls = -sw * det_x + zpc * cw;
            let lc = cw * det_x + zpc * sw;
            let v = Vector3::new(det_y * ca + sa * ls, lc, -sa * det_y + ca * ls);
            match dst.next() {
                Some(d) => *d = v.normalize(),
                None => return,
            }
        }
    }
}
