//! EBSD detector geometry.

use crate::GeometryError;
use serde::{Deserialize, Serialize};

/// Default projection center in the Bruker convention.
pub const DEFAULT_PC: [f64; 3] = [0.5, 0.5, 0.5];

/// Projection center in the EMsoft v5 convention.
///
/// `xpc`/`ypc` are pixel offsets from the detector center, `l` is the
/// sample-detector distance in micrometers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmsoftPc {
    pub xpc: f64,
    pub ypc: f64,
    pub l: f64,
}

/// Immutable EBSD detector description.
///
/// Projection centers (PCs) are stored in the Bruker convention: `x` and `y`
/// as fractions of the detector width and height measured from the left and
/// top edges, `z` as the sample-detector distance over the detector height.
/// The PC navigation shape is either `[1]` or the navigation shape of the
/// patterns it describes.
#[derive(Clone, Debug, PartialEq)]
pub struct EbsdDetector {
    rows: usize,
    cols: usize,
    /// Detector tilt from horizontal, degrees.
    pub tilt: f64,
    /// Sample tilt about the sample RD axis, degrees.
    pub azimuthal: f64,
    /// Sample tilt from horizontal, degrees.
    pub sample_tilt: f64,
    /// Unbinned pixel size, micrometers.
    pub px_size: f64,
    pub binning: usize,
    pc: Vec<[f64; 3]>,
    pc_nav_shape: Vec<usize>,
}

impl EbsdDetector {
    /// Detector of `rows x cols` pixels with the default geometry and one PC.
    pub fn new(rows: usize, cols: usize) -> Result<Self, GeometryError> {
        if rows == 0 || cols == 0 {
            return Err(GeometryError::EmptyDetector { rows, cols });
        }
        Ok(Self {
            rows,
            cols,
            tilt: 0.0,
            azimuthal: 0.0,
            sample_tilt: 70.0,
            px_size: 1.0,
            binning: 1,
            pc: vec![DEFAULT_PC],
            pc_nav_shape: vec![1],
        })
    }

    pub fn with_tilt(mut self, tilt: f64) -> Self {
        self.tilt = tilt;
        self
    }

    pub fn with_azimuthal(mut self, azimuthal: f64) -> Self {
        self.azimuthal = azimuthal;
        self
    }

    pub fn with_sample_tilt(mut self, sample_tilt: f64) -> Self {
        self.sample_tilt = sample_tilt;
        self
    }

    pub fn with_px_size(mut self, px_size: f64, binning: usize) -> Self {
        self.px_size = px_size;
        self.binning = binning.max(1);
        self
    }

    /// Replace the PCs with a single PC shared by all patterns.
    pub fn with_single_pc(mut self, pc: [f64; 3]) -> Self {
        self.pc = vec![pc];
        self.pc_nav_shape = vec![1];
        self
    }

    /// Replace the PCs, one per navigation point of `nav_shape`.
    pub fn with_pc(mut self, pc: Vec<[f64; 3]>, nav_shape: &[usize]) -> Result<Self, GeometryError> {
        let expected: usize = nav_shape.iter().product();
        if pc.len() != expected || nav_shape.is_empty() {
            return Err(GeometryError::ProjectionCenterCount {
                pcs: pc.len(),
                nav_shape: nav_shape.to_vec(),
                expected,
            });
        }
        self.pc = pc;
        self.pc_nav_shape = nav_shape.to_vec();
        Ok(self)
    }

    /// Replace the PCs from EMsoft v5 values.
    pub fn with_emsoft_pc(self, pc: &[EmsoftPc], nav_shape: &[usize]) -> Result<Self, GeometryError> {
        let (rows, cols) = (self.rows as f64, self.cols as f64);
        let l_scale = rows * self.px_size * self.binning as f64;
        let bruker = pc
            .iter()
            .map(|p| [0.5 - p.xpc / cols, 0.5 - p.ypc / rows, p.l / l_scale])
            .collect();
        self.with_pc(bruker, nav_shape)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Detector (signal) shape `(rows, cols)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of detector pixels.
    #[inline]
    pub fn size(&self) -> usize {
        self.rows * self.cols
    }

    /// All PCs in row-major navigation order.
    #[inline]
    pub fn pc(&self) -> &[[f64; 3]] {
        &self.pc
    }

    /// Navigation shape of the PC array, `[1]` for a single PC.
    #[inline]
    pub fn navigation_shape(&self) -> &[usize] {
        &self.pc_nav_shape
    }

    #[inline]
    pub fn navigation_size(&self) -> usize {
        self.pc.len()
    }

    /// Whether one PC is shared by all patterns.
    #[inline]
    pub fn has_fixed_pc(&self) -> bool {
        self.pc.len() == 1
    }

    /// Mean of all PCs.
    pub fn pc_average(&self) -> [f64; 3] {
        let n = self.pc.len() as f64;
        let mut sum = [0.0; 3];
        for p in &self.pc {
            for (s, v) in sum.iter_mut().zip(p) {
                *s += v;
            }
        }
        sum.map(|s| s / n)
    }

    /// PCs in the EMsoft v5 convention.
    pub fn pc_emsoft(&self) -> Vec<EmsoftPc> {
        let (rows, cols) = (self.rows as f64, self.cols as f64);
        let l_scale = rows * self.px_size * self.binning as f64;
        self.pc
            .iter()
            .map(|&[x, y, z]| EmsoftPc {
                xpc: cols * (0.5 - x),
                ypc: rows * (0.5 - y),
                l: z * l_scale,
            })
            .collect()
    }

    /// Cosine and sine of the combined tilt `alpha` and of the azimuthal angle.
    pub(crate) fn tilt_trig(&self) -> TiltTrig {
        let alpha = std::f64::consts::FRAC_PI_2 - self.sample_tilt.to_radians() + self.tilt.to_radians();
        let omega = self.azimuthal.to_radians();
        TiltTrig {
            ca: alpha.cos(),
            sa: alpha.sin(),
            cw: omega.cos(),
            sw: omega.sin(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct TiltTrig {
    pub ca: f64,
    pub sa: f64,
    pub cw: f64,
    pub sw: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn defaults() {
        let det = EbsdDetector::new(60, 80).unwrap();
        assert_eq!(det.shape(), (60, 80));
        assert_eq!(det.size(), 4800);
        assert_eq!(det.navigation_shape(), &[1]);
        assert!(det.has_fixed_pc());
        assert_eq!(det.pc_average(), DEFAULT_PC);
        assert_eq!(det.sample_tilt, 70.0);
    }

    #[test]
    fn rejects_empty_detector() {
        assert!(matches!(
            EbsdDetector::new(0, 3),
            Err(GeometryError::EmptyDetector { rows: 0, cols: 3 })
        ));
    }

    #[test]
    fn pc_count_must_match_navigation_shape() {
        let det = EbsdDetector::new(2, 3).unwrap();
        let err = det
            .clone()
            .with_pc(vec![[0.5, 0.5, 0.5]; 5], &[2, 3])
            .unwrap_err();
        assert!(matches!(err, GeometryError::ProjectionCenterCount { pcs: 5, expected: 6, .. }));

        let det = det.with_pc(vec![[0.4, 0.5, 0.6]; 6], &[2, 3]).unwrap();
        assert_eq!(det.navigation_shape(), &[2, 3]);
        assert_eq!(det.navigation_size(), 6);
        assert!(!det.has_fixed_pc());
    }

    #[test]
    fn pc_average_is_mean() {
        let det = EbsdDetector::new(2, 2)
            .unwrap()
            .with_pc(vec![[0.4, 0.2, 0.5], [0.6, 0.4, 0.7]], &[2])
            .unwrap();
        let avg = det.pc_average();
        assert_relative_eq!(avg[0], 0.5);
        assert_relative_eq!(avg[1], 0.3);
        assert_relative_eq!(avg[2], 0.6);
    }

    #[test]
    fn emsoft_round_trip() {
        let det = EbsdDetector::new(60, 80)
            .unwrap()
            .with_px_size(70.0, 8)
            .with_pc(vec![[0.42, 0.21, 0.51], [0.5, 0.6, 0.7]], &[2])
            .unwrap();
        let emsoft = det.pc_emsoft();
        assert_relative_eq!(emsoft[0].xpc, 80.0 * (0.5 - 0.42), epsilon = 1e-12);
        assert_relative_eq!(emsoft[0].l, 0.51 * 60.0 * 70.0 * 8.0, epsilon = 1e-9);

        let back = det.clone().with_emsoft_pc(&emsoft, &[2]).unwrap();
        for (a, b) in back.pc().iter().zip(det.pc()) {
            for k in 0..3 {
                assert_relative_eq!(a[k], b[k], epsilon = 1e-12);
            }
        }
    }
}
