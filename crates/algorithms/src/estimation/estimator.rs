//! Per-segment empirical line estimation

use super::line_fit::fit_line;
use super::samples::ExactSamples;
use crate::registry::SegmentRegistry;
use ndarray::{Array2, ArrayView1, ArrayView2};
use segelm_core::{Error, Result};
use segelm_parallel::{ParallelStrategy, ProcessingMode};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Parameters for per-segment estimation
#[derive(Debug, Clone)]
pub struct EstimatorParams {
    /// Neighboring segments pooled per fit, the segment itself included (default: 15)
    pub neighbors: usize,
    /// Worker count: 1 runs sequentially, more builds a pool (default: 1)
    pub processes: usize,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self {
            neighbors: 15,
            processes: 1,
        }
    }
}

impl EstimatorParams {
    pub fn validate(&self) -> Result<()> {
        if self.neighbors == 0 {
            return Err(Error::invalid_parameter("neighbors", self.neighbors, "must be at least 1"));
        }
        ProcessingMode::from_processes(self.processes).map(|_| ())
    }
}

/// Fitted coefficients of one segment
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentFit {
    pub slopes: Vec<f64>,
    pub intercepts: Vec<f64>,
    /// Number of bands whose fit fell back to a constant
    pub degenerate: usize,
}

/// Immutable inputs shared by every estimation task
#[derive(Debug)]
pub struct EstimationContext {
    registry: Arc<SegmentRegistry>,
    samples: ExactSamples,
    neighbors: usize,
}

impl EstimationContext {
    /// # Errors
    /// [`Error::SegmentCountMismatch`] when the sample table does not have
    /// one column per registered segment, [`Error::InvalidParameter`] for
    /// `neighbors == 0`.
    pub fn new(registry: Arc<SegmentRegistry>, samples: ExactSamples, neighbors: usize) -> Result<Self> {
        if neighbors == 0 {
            return Err(Error::invalid_parameter("neighbors", neighbors, "must be at least 1"));
        }
        samples.check_shape(registry.len(), samples.bands())?;
        Ok(Self {
            registry,
            samples,
            neighbors,
        })
    }

    pub fn registry(&self) -> &SegmentRegistry {
        &self.registry
    }

    pub fn samples(&self) -> &ExactSamples {
        &self.samples
    }

    pub fn bands(&self) -> usize {
        self.samples.bands()
    }

    /// Fit every band of segment `dense` over the samples of its nearest segments.
    pub fn fit_segment(&self, dense: usize) -> Result<SegmentFit> {
        let near = self.registry.nearest_segments(dense, self.neighbors);
        if near.is_empty() {
            return Err(Error::Algorithm(format!(
                "segment {dense} is not in the registry ({} segments)",
                self.registry.len()
            )));
        }

        let bands = self.bands();
        let mut fit = SegmentFit {
            slopes: Vec::with_capacity(bands),
            intercepts: Vec::with_capacity(bands),
            degenerate: 0,
        };
        for band in 0..bands {
            let line = fit_line(near.iter().flat_map(|&j| self.samples.pairs(j, band)));
            fit.slopes.push(line.slope);
            fit.intercepts.push(line.intercept);
            fit.degenerate += usize::from(line.degenerate);
        }
        Ok(fit)
    }
}

/// Per-segment slopes and intercepts, `(segments, bands)` each
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientTable {
    slopes: Array2<f64>,
    intercepts: Array2<f64>,
    degenerate_fits: Vec<usize>,
}

impl CoefficientTable {
    /// Assemble a table from per-segment fits in dense-identifier order
    pub fn from_fits(fits: Vec<SegmentFit>, bands: usize) -> Result<Self> {
        let segments = fits.len();
        let mut slopes = Array2::zeros((segments, bands));
        let mut intercepts = Array2::zeros((segments, bands));
        let mut degenerate_fits = Vec::with_capacity(segments);
        for (i, fit) in fits.into_iter().enumerate() {
            if fit.slopes.len() != bands || fit.intercepts.len() != bands {
                return Err(Error::BandMismatch {
                    expected: bands,
                    actual: fit.slopes.len(),
                });
            }
            slopes.row_mut(i).assign(&ArrayView1::from(&fit.slopes));
            intercepts.row_mut(i).assign(&ArrayView1::from(&fit.intercepts));
            degenerate_fits.push(fit.degenerate);
        }
        Ok(Self {
            slopes,
            intercepts,
            degenerate_fits,
        })
    }

    /// Build a table directly from coefficient arrays of identical shape
    pub fn from_arrays(slopes: Array2<f64>, intercepts: Array2<f64>) -> Result<Self> {
        if slopes.dim() != intercepts.dim() {
            let (er, ec) = slopes.dim();
            let (ar, ac) = intercepts.dim();
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        let degenerate_fits = vec![0; slopes.nrows()];
        Ok(Self {
            slopes,
            intercepts,
            degenerate_fits,
        })
    }

    pub fn segments(&self) -> usize {
        self.slopes.nrows()
    }

    pub fn bands(&self) -> usize {
        self.slopes.ncols()
    }

    pub fn slopes(&self) -> ArrayView2<'_, f64> {
        self.slopes.view()
    }

    pub fn intercepts(&self) -> ArrayView2<'_, f64> {
        self.intercepts.view()
    }

    /// Degenerate band fits per segment
    pub fn degenerate_fits(&self) -> &[usize] {
        &self.degenerate_fits
    }

    /// Degenerate band fits over all segments
    pub fn total_degenerate(&self) -> usize {
        self.degenerate_fits.iter().sum()
    }
}

/// Estimate `(slopes, intercepts)` for every registered segment.
///
/// For each dense segment the `neighbors` nearest centroids (itself
/// included) are looked up and every observation of those columns is pooled
/// into one least-squares line per band.
///
/// With `processes == 1` segments are fitted in identifier order and
/// `progress(completed, total)` is called after each one. With more workers
/// a pool of exactly that many threads shares one [`EstimationContext`];
/// results are reassembled in identifier order and progress is not reported.
///
/// # Errors
/// Invalid parameters, a sample table not matching the registry, or the
/// first failing (or panicking) task.
pub fn estimate<P>(
    registry: Arc<SegmentRegistry>,
    samples: ExactSamples,
    params: &EstimatorParams,
    progress: P,
) -> Result<CoefficientTable>
where
    P: FnMut(usize, usize),
{
    params.validate()?;
    let mode = ProcessingMode::from_processes(params.processes)?;
    let context = Arc::new(EstimationContext::new(registry, samples, params.neighbors)?);
    estimate_with(context, mode, progress)
}

/// Run the estimation over a prepared context with an explicit mode.
pub fn estimate_with<P>(context: Arc<EstimationContext>, mode: ProcessingMode, progress: P) -> Result<CoefficientTable>
where
    P: FnMut(usize, usize),
{
    let segments = context.registry().len();
    let bands = context.bands();
    debug!(
        segments,
        bands,
        neighbors = context.neighbors,
        observations = context.samples().observations(),
        workers = mode.workers(),
        "estimating per-segment coefficients"
    );

    let task_context = Arc::clone(&context);
    let fits = mode.try_map_with_progress(0..segments, move |i| task_context.fit_segment(i), progress)?;
    let table = CoefficientTable::from_fits(fits, bands)?;

    let degenerate = table.total_degenerate();
    if degenerate > 0 {
        let affected = table.degenerate_fits().iter().filter(|&&d| d > 0).count();
        warn!(
            degenerate,
            affected_segments = affected,
            "degenerate band fits fell back to constant models"
        );
    }
    info!(segments, bands, "coefficient table complete");

    Ok(table)
}
