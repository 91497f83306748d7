//! Quaternion rotation of direction vectors and Bunge Euler conversions.
//!
//! Quaternions are scalar-first `(a, b, c, d)` everywhere and describe the
//! crystal-to-sample rotation. The kernels never normalize: callers must pass
//! unit quaternions, anything else is garbage-in-garbage-out.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use std::f64::consts::TAU;

/// Rotate `vectors` by a single quaternion, writing into `out`.
///
/// `out` must be at least as long as `vectors`.
#[inline]
pub fn rotate_vectors(q: &UnitQuaternion<f64>, vectors: &[Vector3<f64>], out: &mut [Vector3<f64>]) {
    let k = RotationCoefficients::new(q);
    for (dst, v) in out.iter_mut().zip(vectors) {
        *dst = k.apply(v);
    }
}

/// Rotate each vector by its own quaternion, writing into `out`.
///
/// Only as many vectors as the shortest of the three slices are rotated.
pub fn rotate_vectors_varying(
    rotations: &[UnitQuaternion<f64>],
    vectors: &[Vector3<f64>],
    out: &mut [Vector3<f64>],
) {
    for ((dst, q), v) in out.iter_mut().zip(rotations).zip(vectors) {
        *dst = RotationCoefficients::new(q).apply(v);
    }
}

/// Expanded products of the quaternion components.
#[derive(Clone, Copy, Debug)]
struct RotationCoefficients {
    xx: f64,
    yy: f64,
    zz: f64,
    ab: f64,
    ac: f64,
    ad: f64,
    bc: f64,
    bd: f64,
    cd: f64,
}

impl RotationCoefficients {
    #[inline]
    fn new(q: &UnitQuaternion<f64>) -> Self {
        let (a, b, c, d) = (q.w, q.i, q.j, q.k);
        let (aa, bb, cc, dd) = (a * a, b * b, c * c, d * d);
        Self {
            xx: aa + bb - cc - dd,
            yy: aa - bb + cc - dd,
            zz: aa - bb - cc + dd,
            ab: a * b,
            ac: a * c,
            ad: a * d,
            bc: b * c,
            bd: b * d,
            cd: c * d,
        }
    }

    #[inline]
    fn apply(&self, v: &Vector3<f64>) -> Vector3<f64> {
        let (x, y, z) = (v.x, v.y, v.z);
        Vector3::new(
            self.xx * x + 2.0 * ((self.bc - self.ad) * y + (self.ac + self.bd) * z),
            self.yy * y + 2.0 * ((self.ad + self.bc) * x + (self.cd - self.ab) * z),
            self.zz * z + 2.0 * ((self.ab + self.cd) * y + (self.bd - self.ac) * x),
        )
    }
}

/// Unit quaternion from Bunge Euler angles `(phi1, Phi, phi2)` in radians.
///
/// The scalar part of the result is non-negative.
pub fn quaternion_from_euler(phi1: f64, big_phi: f64, phi2: f64) -> UnitQuaternion<f64> {
    let sigma = 0.5 * (phi1 + phi2);
    let delta = 0.5 * (phi1 - phi2);
    let (s, c) = (0.5 * big_phi).sin_cos();

    let mut q = Quaternion::new(
        c * sigma.cos(),
        -s * delta.cos(),
        -s * delta.sin(),
        -c * sigma.sin(),
    );
    if q.w < 0.0 {
        q = -q;
    }
    UnitQuaternion::new_unchecked(q)
}

/// Bunge Euler angles `(phi1, Phi, phi2)` in radians from a unit quaternion.
///
/// `phi1` and `phi2` are wrapped into `[0, 2π)`, `Phi` lies in `[0, π]`.
pub fn euler_from_quaternion(q: &UnitQuaternion<f64>) -> [f64; 3] {
    let (a, b, c, d) = (q.w, q.i, q.j, q.k);
    let q03 = a * a + d * d;
    let q12 = b * b + c * c;
    let chi = (q03 * q12).sqrt();

    let (phi1, big_phi, phi2) = if chi == 0.0 && q12 == 0.0 {
        ((-2.0 * a * d).atan2(a * a - d * d), 0.0, 0.0)
    } else if chi == 0.0 && q03 == 0.0 {
        ((2.0 * b * c).atan2(b * b - c * c), std::f64::consts::PI, 0.0)
    } else {
        (
            ((b * d - a * c) / chi).atan2((-a * b - c * d) / chi),
            (2.0 * chi).atan2(q03 - q12),
            ((a * c + b * d) / chi).atan2((c * d - a * b) / chi),
        )
    };

    [wrap_tau(phi1), big_phi, wrap_tau(phi2)]
}

#[inline]
fn wrap_tau(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Unit;

    fn random_unit_quaternions() -> Vec<UnitQuaternion<f64>> {
        [
            (0.1, -0.7, 0.3),
            (1.2, 0.4, 2.9),
            (-2.1, 0.9, -0.2),
            (0.0, 0.0, 1.0),
        ]
        .iter()
        .map(|&(x, y, z)| {
            UnitQuaternion::from_axis_angle(&Unit::new_normalize(Vector3::new(x, y, 1.0)), z)
        })
        .collect()
    }

    #[test]
    fn kernel_matches_reference_rotation() {
        let vectors = [
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.3, -0.4, 0.866),
        ];
        let mut out = [Vector3::zeros(); 3];
        for q in random_unit_quaternions() {
            rotate_vectors(&q, &vectors, &mut out);
            for (v, r) in vectors.iter().zip(&out) {
                let expected = q.transform_vector(v);
                assert_relative_eq!(*r, expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn varying_rotation_applies_one_quaternion_per_vector() {
        let qs = random_unit_quaternions();
        let vectors: Vec<Vector3<f64>> = (0..qs.len())
            .map(|i| Vector3::new(0.2 * i as f64, 1.0, -0.5).normalize())
            .collect();
        let mut out = vec![Vector3::zeros(); qs.len()];
        rotate_vectors_varying(&qs, &vectors, &mut out);
        for ((q, v), r) in qs.iter().zip(&vectors).zip(&out) {
            assert_relative_eq!(*r, q.transform_vector(v), epsilon = 1e-12);
        }
    }

    #[test]
    fn euler_round_trip() {
        for &(phi1, big_phi, phi2) in &[
            (0.3, 0.8, 1.1),
            (5.9, 2.5, 0.01),
            (3.0, 0.4, 6.0),
            (1.0, 1.5707, 4.2),
        ] {
            let q = quaternion_from_euler(phi1, big_phi, phi2);
            assert!(q.w >= 0.0);
            let [a, b, c] = euler_from_quaternion(&q);
            assert_relative_eq!(a, phi1, epsilon = 1e-9);
            assert_relative_eq!(b, big_phi, epsilon = 1e-9);
            assert_relative_eq!(c, phi2, epsilon = 1e-9);
        }
    }

    #[test]
    fn identity_has_zero_euler_angles() {
        let [a, b, c] = euler_from_quaternion(&UnitQuaternion::identity());
        assert_relative_eq!(a, 0.0);
        assert_relative_eq!(b, 0.0);
        assert_relative_eq!(c, 0.0);
    }

    #[test]
    fn quaternion_to_euler_and_back_is_same_rotation() {
        for q in random_unit_quaternions() {
            let [a, b, c] = euler_from_quaternion(&q);
            let back = quaternion_from_euler(a, b, c);
            // q and -q are the same rotation
            assert_relative_eq!(back.angle_to(&q), 0.0, epsilon = 1e-6);
        }
    }
}
