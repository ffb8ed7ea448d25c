//! End-to-end empirical line pipeline
//!
//! Segments a cube, indexes the segments, hands their representatives to an
//! exact retrieval supplied by the caller, fits one linear model per segment
//! and band from the retrieval's samples, and applies the models to every
//! pixel.
//!
//! ```text
//! cube ─► segment ─► registry ─► (retrieval) ─► estimate ─► reconstruct
//! ```

mod config;

pub use config::PipelineConfig;

use crate::estimation::{estimate, CoefficientTable, EstimatorParams, ExactSamples};
use crate::reconstruction::reconstruct;
use crate::registry::{AllLabels, ExcludeLabel, LabelPredicate, Location, SegmentRegistry};
use crate::segmentation::{segment, segment_mean_spectra, Segmentation};
use ndarray::Array2;
use segelm_core::raster::{Raster, RasterCube, SpectrumTable};
use segelm_core::Result;
use std::sync::Arc;
use tracing::info;

/// Segmented empirical line approximation of a per-pixel retrieval
#[derive(Debug, Clone)]
pub struct EmpiricalLinePipeline {
    config: PipelineConfig,
}

impl EmpiricalLinePipeline {
    /// Create a pipeline after validating `config`
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Segment the cube and index its segments.
    ///
    /// Segments come from every label except the configured excluded label.
    pub fn prepare(&self, cube: &RasterCube, mask: Option<&Raster<u8>>) -> Result<PreparedScene> {
        match self.config.excluded_label {
            Some(label) => self.prepare_with(cube, mask, &ExcludeLabel(label)),
            None => self.prepare_with(cube, mask, &AllLabels),
        }
    }

    /// Like [`prepare`](Self::prepare) with an explicit label predicate.
    pub fn prepare_with<P>(&self, cube: &RasterCube, mask: Option<&Raster<u8>>, predicate: &P) -> Result<PreparedScene>
    where
        P: LabelPredicate + ?Sized,
    {
        if let Some(m) = mask {
            m.ensure_shape(cube.rows(), cube.cols())?;
        }
        let segmentation = segment(cube, mask, &self.config.segment_params())?;
        let registry = SegmentRegistry::build(&segmentation.labels, mask, predicate)?;
        Ok(PreparedScene {
            segmentation,
            registry: Arc::new(registry),
            estimator: self.config.estimator_params(),
        })
    }

    /// Run the whole pipeline, calling `retrieval` on the prepared scene to
    /// obtain the exact samples.
    pub fn run<R>(&self, cube: &RasterCube, mask: Option<&Raster<u8>>, retrieval: R) -> Result<ElmOutput>
    where
        R: FnOnce(&PreparedScene) -> Result<ExactSamples>,
    {
        let scene = self.prepare(cube, mask)?;
        let samples = retrieval(&scene)?;
        scene.apply(samples, |done, total| {
            if done == total {
                info!(segments = total, "all segments fitted");
            }
        })
    }
}

/// A segmented and indexed scene, waiting for exact samples
#[derive(Debug, Clone)]
pub struct PreparedScene {
    segmentation: Segmentation,
    registry: Arc<SegmentRegistry>,
    estimator: EstimatorParams,
}

impl PreparedScene {
    /// Flattened spectra of the cube
    pub fn spectra(&self) -> &SpectrumTable {
        &self.segmentation.spectra
    }

    /// Label map produced by the segmentation
    pub fn labels(&self) -> &Raster<i32> {
        &self.segmentation.labels
    }

    pub fn segmentation(&self) -> &Segmentation {
        &self.segmentation
    }

    pub fn registry(&self) -> &SegmentRegistry {
        &self.registry
    }

    /// Number of registered segments `S`
    pub fn n_segments(&self) -> usize {
        self.registry.len()
    }

    /// Segment centroids in dense order, where the exact retrieval is sampled
    pub fn representative_locations(&self) -> &[Location] {
        self.registry.centroids()
    }

    /// Mean spectrum of every registered segment, `(S, bands)`
    pub fn mean_spectra(&self) -> Result<Array2<f64>> {
        segment_mean_spectra(self.spectra(), self.labels(), &self.registry)
    }

    /// Fit the per-segment models from `samples` and reconstruct the output.
    ///
    /// `progress(completed, total)` is called per fitted segment when the
    /// estimation runs sequentially.
    ///
    /// # Errors
    /// [`SegmentCountMismatch`](segelm_core::Error::SegmentCountMismatch) or
    /// [`BandMismatch`](segelm_core::Error::BandMismatch) when the
    /// sample table does not match the scene, and any estimation failure.
    pub fn apply<P>(&self, samples: ExactSamples, progress: P) -> Result<ElmOutput>
    where
        P: FnMut(usize, usize),
    {
        samples.check_shape(self.registry.len(), self.spectra().bands())?;
        let coefficients = estimate(Arc::clone(&self.registry), samples, &self.estimator, progress)?;
        let output = reconstruct(self.spectra(), self.labels(), &self.registry, &coefficients)?;
        Ok(ElmOutput {
            output,
            coefficients,
            n_segments: self.registry.len(),
        })
    }
}

/// Result of the empirical line pipeline
#[derive(Debug, Clone)]
pub struct ElmOutput {
    /// `(rows*cols, bands)` reconstruction; NaN on pixels without a segment
    pub output: SpectrumTable,
    pub coefficients: CoefficientTable,
    pub n_segments: usize,
}

impl ElmOutput {
    /// Reshape the output into a `(rows, cols, bands)` cube
    pub fn to_cube(&self) -> Result<RasterCube> {
        self.output.to_cube()
    }
}
