//! Exact retrieval samples at segment representatives

use ndarray::{Array2, Array3, ArrayView3, Axis};
use segelm_core::{Error, Result};

/// Paired input/output values of the exact retrieval.
///
/// Both arrays are `(observations, segments, bands)`; column `i` holds the
/// samples of dense segment `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExactSamples {
    inputs: Array3<f64>,
    outputs: Array3<f64>,
}

impl ExactSamples {
    /// Pair input and output arrays of identical shape.
    pub fn new(inputs: Array3<f64>, outputs: Array3<f64>) -> Result<Self> {
        if inputs.dim() != outputs.dim() {
            return Err(Error::invalid_parameter(
                "outputs",
                format!("{:?}", outputs.dim()),
                format!("must match inputs shape {:?}", inputs.dim()),
            ));
        }
        if inputs.len_of(Axis(0)) == 0 {
            return Err(Error::invalid_parameter("observations", 0, "must be at least 1"));
        }
        Ok(Self { inputs, outputs })
    }

    /// One observation per segment from `(segments, bands)` tables,
    /// e.g. the segment mean spectra and their exact retrieval.
    pub fn from_segment_spectra(inputs: Array2<f64>, outputs: Array2<f64>) -> Result<Self> {
        Self::new(inputs.insert_axis(Axis(0)), outputs.insert_axis(Axis(0)))
    }

    /// Number of observation rows
    pub fn observations(&self) -> usize {
        self.inputs.dim().0
    }

    /// Number of segment columns
    pub fn segments(&self) -> usize {
        self.inputs.dim().1
    }

    /// Number of bands
    pub fn bands(&self) -> usize {
        self.inputs.dim().2
    }

    pub fn inputs(&self) -> ArrayView3<'_, f64> {
        self.inputs.view()
    }

    pub fn outputs(&self) -> ArrayView3<'_, f64> {
        self.outputs.view()
    }

    /// All `(input, output)` pairs of one segment column and band
    pub fn pairs(&self, segment: usize, band: usize) -> impl Iterator<Item = (f64, f64)> + '_ {
        (0..self.observations()).map(move |o| (self.inputs[[o, segment, band]], self.outputs[[o, segment, band]]))
    }

    /// Check the table against a registry of `segments` and a scene of `bands`.
    ///
    /// # Errors
    /// [`Error::SegmentCountMismatch`] or [`Error::BandMismatch`]
    pub fn check_shape(&self, segments: usize, bands: usize) -> Result<()> {
        if self.segments() != segments {
            return Err(Error::SegmentCountMismatch {
                expected: segments,
                actual: self.segments(),
            });
        }
        if self.bands() != bands {
            return Err(Error::BandMismatch {
                expected: bands,
                actual: self.bands(),
            });
        }
        Ok(())
    }
}
