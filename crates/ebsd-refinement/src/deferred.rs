//! Lazily evaluated refinement: a list of chunk tasks and a `compute()`.

use crate::driver::RefineTask;
use crate::{RefineError, RefineTarget};
use rayon::prelude::*;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Raw refinement results, `n_points x n_fields`, row-major.
///
/// Field layout per [`RefineTarget::n_fields`]; excluded points have a `NaN`
/// score and their initial parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct RefinementTable {
    pub target: RefineTarget,
    pub n_points: usize,
    pub n_fields: usize,
    pub data: Vec<f64>,
}

impl RefinementTable {
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n_fields..(i + 1) * self.n_fields]
    }

    /// Every point's score (first field).
    pub fn scores(&self) -> Vec<f64> {
        self.column(0)
    }

    pub fn column(&self, field: usize) -> Vec<f64> {
        self.data.iter().skip(field).step_by(self.n_fields).copied().collect()
    }

    /// Objective evaluations per point; zero for orientation-only tables,
    /// which do not record them.
    pub fn num_evals(&self) -> Vec<usize> {
        match self.target {
            RefineTarget::Orientation => vec![0; self.n_points],
            _ => self
                .column(self.n_fields - 1)
                .into_iter()
                .map(|v| v as usize)
                .collect(),
        }
    }
}

type Assemble<T> = Box<dyn FnOnce(RefinementTable) -> Result<T, RefineError> + Send>;

/// Refinement that has been validated and scheduled but not run.
///
/// Shape and chunking are known up front; nothing is optimized until
/// [`compute`](Self::compute) or [`finish`](Self::finish) is called. Dropping
/// it cancels the work.
pub struct DeferredRefinement<T> {
    task: Arc<RefineTask>,
    chunks: Vec<Range<usize>>,
    assemble: Assemble<T>,
}

impl<T> fmt::Debug for DeferredRefinement<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredRefinement")
            .field("shape", &self.shape())
            .field("chunks", &self.chunks)
            .finish()
    }
}

impl<T> DeferredRefinement<T> {
    pub(crate) fn new(task: Arc<RefineTask>, chunks: Vec<Range<usize>>, assemble: Assemble<T>) -> Self {
        Self { task, chunks, assemble }
    }

    pub fn target(&self) -> RefineTarget {
        self.task.target()
    }

    /// `(n_points, n_fields)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.task.n_points(), self.target().n_fields())
    }

    pub fn n_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Largest chunk, `(chunk_len, n_fields)`.
    pub fn chunk_size(&self) -> (usize, usize) {
        let len = self.chunks.iter().map(|r| r.len()).max().unwrap_or(0);
        (len, self.target().n_fields())
    }

    /// Size of every chunk in navigation order.
    pub fn chunk_sizes(&self) -> Vec<(usize, usize)> {
        let n_fields = self.target().n_fields();
        self.chunks.iter().map(|r| (r.len(), n_fields)).collect()
    }

    /// Run every chunk in parallel and reassemble the rows in order.
    pub fn compute(&self) -> Result<RefinementTable, RefineError> {
        let slice = self.task.master_pattern_slice()?;
        let task = &self.task;
        let parts: Vec<Vec<f64>> = self
            .chunks
            .par_iter()
            .enumerate()
            .map(|(k, range)| {
                log::debug!("refining chunk {k} ({} points)", range.len());
                task.run_chunk(&slice, range.clone())
            })
            .collect::<Result<_, _>>()?;
        Ok(RefinementTable {
            target: self.target(),
            n_points: self.task.n_points(),
            n_fields: self.target().n_fields(),
            data: parts.concat(),
        })
    }

    /// Compute and build the refined map or detector.
    pub fn finish(self) -> Result<T, RefineError> {
        let table = self.compute()?;
        (self.assemble)(table)
    }
}
