//! # SegElm Algorithms
//!
//! Segmented empirical-line approximation of expensive per-pixel retrievals.
//!
//! An exact retrieval is run only at a few segment representatives; every
//! other pixel gets a linear model fitted from the exact samples of its
//! nearest segments.
//!
//! ## Modules
//!
//! - **reduction**: PCA projection of spectra
//! - **segmentation**: SLIC superpixels on the projected cube, connectivity enforcement
//! - **registry**: Dense segment identifiers, centroids, k-d tree
//! - **estimation**: Per-segment least-squares lines, sequential or pooled
//! - **reconstruction**: Broadcast coefficients and apply them to every pixel
//! - **pipeline**: End-to-end wiring and configuration

pub mod estimation;
pub mod pipeline;
pub mod reconstruction;
pub mod reduction;
pub mod registry;
pub mod segmentation;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::estimation::{
        estimate, fit_line, CoefficientTable, EstimationContext, EstimatorParams, ExactSamples, LineFit,
    };
    pub use crate::pipeline::{ElmOutput, EmpiricalLinePipeline, PipelineConfig, PreparedScene};
    pub use crate::reconstruction::{apply_coefficients, broadcast_coefficients, reconstruct, PixelCoefficients};
    pub use crate::reduction::{pca, PcaParams, Projection};
    pub use crate::registry::{
        AllLabels, DenseIndex, ExcludeLabel, KdTree, LabelPredicate, Location, SegmentRegistry,
    };
    pub use crate::segmentation::{
        segment, segment_mean_spectra, slic, SegmentParams, Segmentation, Segmenter, SlicParams,
    };
    pub use segelm_core::prelude::*;
    pub use segelm_parallel::ProcessingMode;
}
