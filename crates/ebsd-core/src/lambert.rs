//! Square Lambert projection between the unit sphere and a square grid.
//!
//! Plane coordinates are normalized to `[-1, 1]` on both axes. Vectors from
//! either hemisphere land on the same square, so the caller decides which
//! master-pattern hemisphere to read from the sign of `z`.
//!
//! Interpolation parameters follow the EMsoft convention: rows come from the
//! plane `y` coordinate, columns from `x`, and a neighbour index past the
//! grid edge falls back to the base index (nearest-neighbour at the seam).

use nalgebra::Vector3;
use std::f64::consts::PI;

/// Square Lambert half-side in sphere units, `sqrt(pi / 2)`.
pub const LAMBERT_HALF_SIDE: f64 = 1.253_314_137_315_500_3;
const FOUR_OVER_PI: f64 = 4.0 / PI;

/// Project a unit vector onto the square Lambert plane.
///
/// The poles map to the origin. The zero vector is undefined input; it maps
/// to the origin as well instead of panicking.
#[inline]
pub fn vector_to_xy(v: &Vector3<f64>) -> [f64; 2] {
    let (x, y, z) = (v.x, v.y, v.z);
    if x == 0.0 && y == 0.0 {
        return [0.0, 0.0];
    }

    let r = (1.0 - z.abs()).max(0.0).sqrt();
    if y.abs() <= x.abs() {
        let lx = if x < 0.0 { -r } else { r };
        [lx, lx * FOUR_OVER_PI * (y / x).atan()]
    } else {
        let ly = if y < 0.0 { -r } else { r };
        [ly * FOUR_OVER_PI * (x / y).atan(), ly]
    }
}

/// Map normalized square Lambert coordinates back onto the upper hemisphere.
///
/// The output is not renormalized and may deviate slightly from unit
/// length. `(0, 0)` maps to `(0, 0, 1)`.
#[inline]
pub fn xy_to_vector(x: f64, y: f64) -> Vector3<f64> {
    let xi = x * LAMBERT_HALF_SIDE;
    let yi = y * LAMBERT_HALF_SIDE;
    let (xa, ya) = (xi.abs(), yi.abs());

    if xa.max(ya) == 0.0 {
        return Vector3::new(0.0, 0.0, 1.0);
    }

    if xa <= ya {
        let q = 2.0 * yi * (PI - yi * yi).sqrt() / PI;
        let qq = xi * PI * 0.25 / yi;
        Vector3::new(q * qq.sin(), q * qq.cos(), 1.0 - 2.0 * yi * yi / PI)
    } else {
        let q = 2.0 * xi * (PI - xi * xi).sqrt() / PI;
        let qq = yi * PI * 0.25 / xi;
        Vector3::new(q * qq.cos(), q * qq.sin(), 1.0 - 2.0 * xi * xi / PI)
    }
}

/// Bilinear interpolation corners and weights for one vector.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LambertInterpolation {
    /// Base row index.
    pub nii: usize,
    /// Base column index.
    pub nij: usize,
    /// Neighbour row index.
    pub niip: usize,
    /// Neighbour column index.
    pub nijp: usize,
    /// Row weight of the neighbour row.
    pub di: f64,
    /// Column weight of the neighbour column.
    pub dj: f64,
    /// `1 - di`.
    pub dim: f64,
    /// `1 - dj`.
    pub djm: f64,
}

impl LambertInterpolation {
    /// Compute the interpolation parameters for a single vector.
    ///
    /// `scale` is `(npx - 1) / 2` for an `npx x npy` master pattern.
    #[inline]
    pub fn new(v: &Vector3<f64>, npx: usize, npy: usize, scale: f64) -> Self {
        let [x, y] = vector_to_xy(v);
        let i = scale * y;
        let j = scale * x;

        // float -> int casts truncate toward zero and saturate NaN to 0
        let mut nii = (i + scale) as i64;
        let mut nij = (j + scale) as i64;
        let mut niip = nii + 1;
        let mut nijp = nij + 1;
        if niip > npx as i64 - 1 {
            niip = nii;
        }
        if nijp > npy as i64 - 1 {
            nijp = nij;
        }
        if nii < 0 {
            nii = niip;
        }
        if nij < 0 {
            nij = nijp;
        }

        let di = i - nii as f64 + scale;
        let dj = j - nij as f64 + scale;
        Self {
            nii: nii.max(0) as usize,
            nij: nij.max(0) as usize,
            niip: niip.max(0) as usize,
            nijp: nijp.max(0) as usize,
            di,
            dj,
            dim: 1.0 - di,
            djm: 1.0 - dj,
        }
    }

    /// Blend the four neighbouring pixels of a row-major `npx`-wide grid.
    #[inline]
    pub fn blend(&self, mp: &[f32], npx: usize) -> f64 {
        let p = |r: usize, c: usize| mp[r * npx + c] as f64;
        p(self.nii, self.nij) * self.dim * self.djm
            + p(self.niip, self.nij) * self.di * self.djm
            + p(self.nii, self.nijp) * self.dim * self.dj
            + p(self.niip, self.nijp) * self.di * self.dj
    }
}

/// Interpolation parameters for every vector, written into `out`.
///
/// Pairs beyond the shorter of `vectors` and `out` are left untouched.
pub fn lambert_interpolation_parameters(
    vectors: &[Vector3<f64>],
    npx: usize,
    npy: usize,
    scale: f64,
    out: &mut [LambertInterpolation],
) {
    for (dst, v) in out.iter_mut().zip(vectors) {
        *dst = LambertInterpolation::new(v, npx, npy, scale);
    }
}

/// Scale factor from normalized Lambert coordinates to master-pattern pixels.
#[inline]
pub fn lambert_scale(npx: usize) -> f64 {
    (npx as f64 - 1.0) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit(x: f64, y: f64, z: f64) -> Vector3<f64> {
        Vector3::new(x, y, z).normalize()
    }

    #[test]
    fn half_side_constant_matches() {
        assert_relative_eq!(LAMBERT_HALF_SIDE, (PI / 2.0).sqrt(), epsilon = 1e-15);
    }

    #[test]
    fn poles_and_zero_vector_map_to_origin() {
        assert_eq!(vector_to_xy(&Vector3::new(0.0, 0.0, 1.0)), [0.0, 0.0]);
        assert_eq!(vector_to_xy(&Vector3::new(0.0, 0.0, -1.0)), [0.0, 0.0]);
        assert_eq!(vector_to_xy(&Vector3::zeros()), [0.0, 0.0]);
        assert_eq!(xy_to_vector(0.0, 0.0), Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn equator_maps_to_square_boundary() {
        let [x, y] = vector_to_xy(&Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(x, 1.0);
        assert_relative_eq!(y, 0.0);
        let [x, y] = vector_to_xy(&unit(1.0, 1.0, 0.0));
        assert_relative_eq!(x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn round_trip_upper_hemisphere() {
        for v in [
            unit(0.3, 0.1, 0.9),
            unit(-0.2, 0.7, 0.4),
            unit(0.5, -0.5, 0.2),
            unit(-0.8, -0.1, 0.6),
            unit(0.01, 0.02, 1.0),
        ] {
            let [x, y] = vector_to_xy(&v);
            let back = xy_to_vector(x, y).normalize();
            assert_relative_eq!(back, v, epsilon = 1e-10);
        }
    }

    #[test]
    fn lower_hemisphere_shares_the_square() {
        let up = unit(0.3, -0.2, 0.7);
        let down = Vector3::new(up.x, up.y, -up.z);
        assert_eq!(vector_to_xy(&up), vector_to_xy(&down));
    }

    #[test]
    fn interpolation_on_grid_node_reproduces_pixel() {
        let npx = 5;
        let scale = lambert_scale(npx);
        let mp: Vec<f32> = (0..npx * npx).map(|k| k as f32 * 1.5 + 2.0).collect();

        let nodes = [(2usize, 2usize), (1, 3), (3, 1), (2, 0), (0, 2)];
        let vectors: Vec<Vector3<f64>> = nodes
            .iter()
            .map(|&(r, c)| xy_to_vector((c as f64 - scale) / scale, (r as f64 - scale) / scale).normalize())
            .collect();
        let mut params = vec![LambertInterpolation::default(); vectors.len()];
        lambert_interpolation_parameters(&vectors, npx, npx, scale, &mut params);

        for ((r, c), p) in nodes.iter().zip(&params) {
            assert_relative_eq!(p.blend(&mp, npx), mp[r * npx + c] as f64, epsilon = 1e-6);
        }
    }

    #[test]
    fn batch_parameters_match_single_vectors() {
        let npx = 9;
        let scale = lambert_scale(npx);
        let vectors = [unit(0.2, 0.3, 0.8), unit(-0.6, 0.1, -0.4), unit(1.0, -1.0, 0.0)];
        let mut out = [LambertInterpolation::default(); 3];
        lambert_interpolation_parameters(&vectors, npx, npx, scale, &mut out);
        for (v, p) in vectors.iter().zip(&out) {
            assert_eq!(*p, LambertInterpolation::new(v, npx, npx, scale));
        }
    }

    #[test]
    fn weights_sum_to_one() {
        let p = LambertInterpolation::new(&unit(0.2, 0.3, 0.8), 11, 11, lambert_scale(11));
        assert_relative_eq!(p.di + p.dim, 1.0);
        assert_relative_eq!(p.dj + p.djm, 1.0);
    }

    #[test]
    fn edge_neighbours_fall_back_to_base_index() {
        let npx = 7;
        let scale = lambert_scale(npx);
        // (1, 0, 0) lands on the right edge: column neighbour clamps
        let p = LambertInterpolation::new(&Vector3::new(1.0, 0.0, 0.0), npx, npx, scale);
        assert_eq!(p.nij, npx - 1);
        assert_eq!(p.nijp, p.nij);
        let p = LambertInterpolation::new(&Vector3::new(0.0, 1.0, 0.0), npx, npx, scale);
        assert_eq!(p.nii, npx - 1);
        assert_eq!(p.niip, p.nii);
        // indices never leave the grid
        for v in [unit(1.0, 1.0, 0.0), unit(-1.0, -1.0, 0.0), unit(-1.0, 1.0, 0.0)] {
            let p = LambertInterpolation::new(&v, npx, npx, scale);
            for idx in [p.nii, p.nij, p.niip, p.nijp] {
                assert!(idx < npx);
            }
        }
    }
}
