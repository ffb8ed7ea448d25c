//! Per-segment empirical line estimation
//!
//! - **fit_line**: least-squares line with explicit degenerate fallbacks
//! - **ExactSamples**: exact retrieval pairs, one column per segment
//! - **estimate**: one `(slope, intercept)` per segment and band, pooled
//!   over the nearest neighboring segments, sequential or on a worker pool

mod estimator;
mod line_fit;
mod samples;

pub use estimator::{
    estimate, estimate_with, CoefficientTable, EstimationContext, EstimatorParams, SegmentFit,
};
pub use line_fit::{fit_line, LineFit};
pub use samples::ExactSamples;
