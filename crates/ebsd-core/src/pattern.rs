//! Pattern statistics: value range, rescaling and normalized cross-correlation.

/// Minimum and maximum of finite values, `None` if there are none.
pub fn min_max(data: &[f32]) -> Option<(f32, f32)> {
    data.iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Linear map of `[in_min, in_max]` onto `[out_min, out_max]`, written to `dst`.
///
/// A degenerate input range fills `dst` with `out_min`.
pub fn rescale_into(
    src: &[f32],
    dst: &mut [f32],
    in_min: f64,
    in_max: f64,
    out_min: f64,
    out_max: f64,
) {
    let span = in_max - in_min;
    if span == 0.0 || !span.is_finite() {
        dst.iter_mut().for_each(|d| *d = out_min as f32);
        return;
    }
    let k = (out_max - out_min) / span;
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = ((s as f64 - in_min) * k + out_min) as f32;
    }
}

/// Rescale `pattern` from `[in_min, in_max]` to `[out_min, out_max]` into a new buffer.
pub fn rescale_with_min_max(
    pattern: &[f32],
    in_min: f64,
    in_max: f64,
    out_min: f64,
    out_max: f64,
) -> Vec<f32> {
    let mut out = vec![0.0; pattern.len()];
    rescale_into(pattern, &mut out, in_min, in_max, out_min, out_max);
    out
}

/// Zero-mean copy of `pattern` and its squared norm.
///
/// With `rescale` the pattern is first mapped onto `[-1, 1]` from its own
/// intensity range.
pub fn prepare_pattern(pattern: &[f32], rescale: bool) -> (Vec<f32>, f64) {
    let mut prepared = match (rescale, min_max(pattern)) {
        (true, Some((lo, hi))) => rescale_with_min_max(pattern, lo as f64, hi as f64, -1.0, 1.0),
        _ => pattern.to_vec(),
    };

    let mean = mean(&prepared);
    let mut squared_norm = 0.0;
    for p in prepared.iter_mut() {
        let centered = *p as f64 - mean;
        *p = centered as f32;
        squared_norm += centered * centered;
    }
    (prepared, squared_norm)
}

/// Normalized cross-correlation of a prepared experimental pattern with a
/// simulated one.
///
/// The simulated pattern is centered here; a constant simulated pattern
/// yields `NaN`.
pub fn ncc_with_prepared(prepared: &[f32], squared_norm: f64, simulated: &[f32]) -> f64 {
    let sim_mean = mean(simulated);
    let mut cross = 0.0;
    let mut sim_sq = 0.0;
    for (&e, &s) in prepared.iter().zip(simulated) {
        let s = s as f64 - sim_mean;
        cross += e as f64 * s;
        sim_sq += s * s;
    }
    cross / (squared_norm * sim_sq).sqrt()
}

#[inline]
fn mean(data: &[f32]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().map(|&v| v as f64).sum::<f64>() / data.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn linspace(n: usize) -> Vec<f32> {
        (0..n).map(|i| i as f32 / (n - 1) as f32).collect()
    }

    #[test]
    fn prepared_linspace_norms() {
        let (p, norm) = prepare_pattern(&linspace(100), false);
        assert_relative_eq!(norm, 8.502, epsilon = 1e-3);
        assert_relative_eq!(mean(&p), 0.0, epsilon = 1e-6);

        let (p, norm) = prepare_pattern(&linspace(100), true);
        assert_relative_eq!(norm, 34.007, epsilon = 1e-3);
        assert_relative_eq!(mean(&p), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn rescale_hits_requested_range() {
        let src: Vec<f32> = vec![3.0, -1.0, 7.5, 2.0];
        let (lo, hi) = min_max(&src).unwrap();
        let out = rescale_with_min_max(&src, lo as f64, hi as f64, 0.0, 255.0);
        let (a, b) = min_max(&out).unwrap();
        assert_relative_eq!(a, 0.0);
        assert_relative_eq!(b, 255.0);
        // source untouched
        assert_eq!(src[1], -1.0);
    }

    #[test]
    fn constant_pattern_rescales_to_out_min() {
        let out = rescale_with_min_max(&[4.0; 6], 4.0, 4.0, -1.0, 1.0);
        assert!(out.iter().all(|&v| v == -1.0));
    }

    #[test]
    fn ncc_of_identical_patterns_is_one() {
        let raw: Vec<f32> = (0..30).map(|i| ((i * 7) % 11) as f32).collect();
        let (prep, norm) = prepare_pattern(&raw, false);
        assert_relative_eq!(ncc_with_prepared(&prep, norm, &raw), 1.0, epsilon = 1e-6);

        // invariant to affine intensity changes of the simulated pattern
        let scaled: Vec<f32> = raw.iter().map(|v| 3.0 * v + 10.0).collect();
        assert_relative_eq!(ncc_with_prepared(&prep, norm, &scaled), 1.0, epsilon = 1e-6);

        let inverted: Vec<f32> = raw.iter().map(|v| -v).collect();
        assert_relative_eq!(ncc_with_prepared(&prep, norm, &inverted), -1.0, epsilon = 1e-6);
    }

    #[test]
    fn constant_simulated_pattern_is_nan() {
        let (prep, norm) = prepare_pattern(&linspace(10), false);
        assert!(ncc_with_prepared(&prep, norm, &[0.5; 10]).is_nan());
    }
}
