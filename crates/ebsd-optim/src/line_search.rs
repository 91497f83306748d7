//! One-dimensional minimization along a direction.

const PHI: f64 = 1.618_033_988_749_895;
const RESP: f64 = 2.0 - PHI;
const MAX_BRACKET_STEPS: usize = 50;

/// Golden-section search for the minimum of `f` on `[a, b]`.
///
/// Stops after `max_evals` evaluations or when the interval shrinks below
/// `tol`. Returns `(x, f(x))` of the best interior point.
pub(crate) fn golden_section_minimize(
    mut f: impl FnMut(f64) -> f64,
    mut a: f64,
    mut b: f64,
    tol: f64,
    max_evals: usize,
) -> (f64, f64) {
    let mut x1 = a + RESP * (b - a);
    let mut x2 = b - RESP * (b - a);
    let mut f1 = f(x1);
    let mut f2 = f(x2);
    let mut evals = 2;

    while evals < max_evals && (b - a).abs() > tol {
        if f1 < f2 {
            b = x2;
            x2 = x1;
            f2 = f1;
            x1 = a + RESP * (b - a);
            f1 = f(x1);
        } else {
            a = x1;
            x1 = x2;
            f1 = f2;
            x2 = b - RESP * (b - a);
            f2 = f(x2);
        }
        evals += 1;
    }

    if f1 < f2 {
        (x1, f1)
    } else {
        (x2, f2)
    }
}

/// Expand `[0, 1]` downhill until the middle point is lower than both ends.
///
/// Returns an interval `(lo, hi)` that contains a local minimum, or the last
/// expansion when the function keeps decreasing.
pub(crate) fn bracket(mut f: impl FnMut(f64) -> f64, f0: f64) -> (f64, f64) {
    let (mut a, mut b) = (0.0, 1.0);
    let mut fb = f(1.0);
    if fb > f0 {
        std::mem::swap(&mut a, &mut b);
        fb = f0;
    }
    let mut c = b + PHI * (b - a);
    let mut fc = f(c);
    let mut steps = 0;
    while fc < fb && steps < MAX_BRACKET_STEPS {
        a = b;
        b = c;
        fb = fc;
        c = b + PHI * (b - a);
        fc = f(c);
        steps += 1;
    }
    if a < c {
        (a, c)
    } else {
        (c, a)
    }
}

/// Parameter range `t` such that `x + t d` stays inside `[lower, upper]`.
pub(crate) fn feasible_step_range(x: &[f64], d: &[f64], lower: &[f64], upper: &[f64]) -> (f64, f64) {
    let mut lo = f64::NEG_INFINITY;
    let mut hi = f64::INFINITY;
    for i in 0..x.len() {
        if d[i] == 0.0 {
            continue;
        }
        let t1 = (lower[i] - x[i]) / d[i];
        let t2 = (upper[i] - x[i]) / d[i];
        lo = lo.max(t1.min(t2));
        hi = hi.min(t1.max(t2));
    }
    (lo.min(0.0), hi.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn golden_section_finds_parabola_minimum() {
        let (x, fx) = golden_section_minimize(|t| (t - 0.3).powi(2) + 1.0, -1.0, 2.0, 1e-9, 200);
        assert_relative_eq!(x, 0.3, epsilon = 1e-6);
        assert_relative_eq!(fx, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn bracket_contains_minimum() {
        let f = |t: f64| (t - 7.0).powi(2);
        let (lo, hi) = bracket(f, f(0.0));
        assert!(lo <= 7.0 && 7.0 <= hi);
        let f = |t: f64| (t + 3.0).powi(2);
        let (lo, hi) = bracket(f, f(0.0));
        assert!(lo <= -3.0 && -3.0 <= hi);
    }

    #[test]
    fn feasible_range_respects_box() {
        let (lo, hi) = feasible_step_range(&[0.5, 0.5], &[1.0, -2.0], &[0.0, 0.0], &[1.0, 1.0]);
        assert_relative_eq!(lo, -0.25);
        assert_relative_eq!(hi, 0.25);
    }
}
