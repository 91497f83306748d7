/// Ordering value for an objective sample: `NaN` ranks worse than anything.
#[inline]
pub fn rank(value: f64) -> f64 {
    if value.is_nan() {
        f64::INFINITY
    } else {
        value
    }
}

/// Objective wrapper that counts evaluations and enforces an optional budget.
pub(crate) struct Counted<'a> {
    f: &'a mut dyn FnMut(&[f64]) -> f64,
    n_evals: usize,
    budget: Option<usize>,
}

impl<'a> Counted<'a> {
    pub fn new(f: &'a mut dyn FnMut(&[f64]) -> f64) -> Self {
        Self {
            f,
            n_evals: 0,
            budget: None,
        }
    }

    pub fn with_budget(f: &'a mut dyn FnMut(&[f64]) -> f64, budget: usize) -> Self {
        Self {
            f,
            n_evals: 0,
            budget: Some(budget),
        }
    }

    #[inline]
    pub fn n_evals(&self) -> usize {
        self.n_evals
    }

    #[inline]
    pub fn exhausted(&self) -> bool {
        self.budget.is_some_and(|b| self.n_evals >= b)
    }

    /// Evaluate unconditionally.
    #[inline]
    pub fn eval(&mut self, x: &[f64]) -> f64 {
        self.n_evals += 1;
        rank((self.f)(x))
    }

    /// Evaluate unless the budget is spent.
    #[inline]
    pub fn try_eval(&mut self, x: &[f64]) -> Option<f64> {
        if self.exhausted() {
            None
        } else {
            Some(self.eval(x))
        }
    }

    /// Remaining evaluations, `usize::MAX` without a budget.
    pub fn remaining(&self) -> usize {
        self.budget.map_or(usize::MAX, |b| b.saturating_sub(self.n_evals))
    }
}
