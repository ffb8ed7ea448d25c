//! Spatial-spectral segmentation of raster cubes
//!
//! - **segment**: PCA projection followed by SLIC superpixels whose
//!   compactness is derived from the scene's own eigenvalues
//! - **slic**: SLIC superpixel clustering on any feature cube
//! - **enforce_connectivity**: single-region relabelling of a label map

mod connectivity;
mod slic;

pub use connectivity::enforce_connectivity;
pub use slic::{slic, SlicParams, MIN_COMPACTNESS};

use crate::reduction::{pca, PcaParams};
use crate::registry::SegmentRegistry;
use ndarray::Array2;
use segelm_core::raster::{Raster, RasterCube, SpectrumTable};
use segelm_core::{Algorithm, Error, Result};
use tracing::{info, warn};

/// Parameters for PCA + SLIC segmentation
#[derive(Debug, Clone)]
pub struct SegmentParams {
    /// Number of principal components the clustering runs on (default: 5)
    pub n_components: usize,
    /// Requested number of segments (default: 100)
    pub target_segments: usize,
    /// Maximum SLIC rounds (default: 10)
    pub max_iterations: usize,
    /// Minimum segment size relative to the nominal size (default: 0.5)
    pub min_size_factor: f64,
    /// Maximum segment size relative to the nominal size (default: 3.0)
    pub max_size_factor: f64,
}

impl Default for SegmentParams {
    fn default() -> Self {
        let slic = SlicParams::default();
        Self {
            n_components: 5,
            target_segments: slic.target_segments,
            max_iterations: slic.max_iterations,
            min_size_factor: slic.min_size_factor,
            max_size_factor: slic.max_size_factor,
        }
    }
}

/// Output of [`segment`]
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Flattened `(rows*cols, bands)` spectra of the input cube
    pub spectra: SpectrumTable,
    /// Label map; masked pixels carry [`segelm_core::NO_SEGMENT`]
    pub labels: Raster<i32>,
    /// Number of segments actually produced
    pub n_segments: usize,
    /// Compactness derived from the leading eigenvalues
    pub compactness: f64,
    /// Eigenvalues of the components used for clustering
    pub eigenvalues: Vec<f64>,
}

/// Segment a raster cube into spatially contiguous, spectrally coherent regions.
///
/// The cube is projected onto its top `n_components` principal components
/// and clustered with SLIC. The compactness is the Euclidean norm of the
/// square roots of those components' eigenvalues, so low-contrast scenes get
/// spatially compact segments and high-contrast scenes spectrally purer ones.
///
/// Fewer segments than requested is not an error; read `n_segments`.
///
/// # Arguments
/// * `cube` - Input `(rows, cols, bands)` cube
/// * `mask` - Optional valid-pixel mask (non-zero = valid)
/// * `params` - Segmentation parameters
pub fn segment(cube: &RasterCube, mask: Option<&Raster<u8>>, params: &SegmentParams) -> Result<Segmentation> {
    if params.target_segments == 0 {
        return Err(Error::invalid_parameter(
            "target_segments",
            params.target_segments,
            "must be at least 1",
        ));
    }
    if params.n_components == 0 {
        return Err(Error::invalid_parameter(
            "n_components",
            params.n_components,
            "must be at least 1",
        ));
    }

    let spectra = cube.flatten();
    let projection = pca(
        &spectra,
        mask,
        PcaParams {
            n_components: Some(params.n_components),
        },
    )?;
    let compactness = projection.compactness().max(MIN_COMPACTNESS);

    let slic_params = SlicParams {
        target_segments: params.target_segments,
        compactness,
        max_iterations: params.max_iterations,
        min_size_factor: params.min_size_factor,
        max_size_factor: params.max_size_factor,
    };
    let (labels, n_segments) = slic(projection.features.view(), &projection.valid, &slic_params)?;

    if n_segments < params.target_segments {
        warn!(
            requested = params.target_segments,
            produced = n_segments,
            "segmentation produced fewer segments than requested"
        );
    }
    info!(
        rows = cube.rows(),
        cols = cube.cols(),
        bands = cube.bands(),
        segments = n_segments,
        compactness,
        "segmentation complete"
    );

    Ok(Segmentation {
        spectra,
        labels,
        n_segments,
        compactness,
        eigenvalues: projection.eigenvalues,
    })
}

/// Mean spectrum of every registered segment, `(S, bands)`.
///
/// Only valid pixels with finite spectra contribute. These are the
/// representative spectra an exact retrieval is usually run on.
pub fn segment_mean_spectra(
    spectra: &SpectrumTable,
    labels: &Raster<i32>,
    registry: &SegmentRegistry,
) -> Result<Array2<f64>> {
    let (rows, cols) = spectra.raster_shape();
    labels.ensure_shape(rows, cols)?;

    let bands = spectra.bands();
    let mut sums = Array2::<f64>::zeros((registry.len(), bands));
    let mut counts = vec![0usize; registry.len()];

    for ((r, c), label) in labels.indexed_iter() {
        let Some(dense) = registry.dense_id(label) else {
            continue;
        };
        let px = spectra.pixel(r * cols + c);
        if !px.iter().all(|v| v.is_finite()) {
            continue;
        }
        let mut row = sums.row_mut(dense);
        row += &px;
        counts[dense] += 1;
    }

    for (dense, &count) in counts.iter().enumerate() {
        let mut row = sums.row_mut(dense);
        if count == 0 {
            row.fill(f64::NAN);
        } else {
            row /= count as f64;
        }
    }

    Ok(sums)
}

/// PCA + SLIC segmentation algorithm
#[derive(Debug, Clone, Default)]
pub struct Segmenter;

impl Algorithm for Segmenter {
    type Input = RasterCube;
    type Output = Segmentation;
    type Params = SegmentParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Segmenter"
    }

    fn description(&self) -> &'static str {
        "Project spectra onto principal components and cluster into SLIC superpixels"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        segment(&input, None, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{AllLabels, SegmentRegistry};
    use segelm_core::NO_SEGMENT;

    fn two_region_cube() -> RasterCube {
        RasterCube::from_fn(20, 20, 4, |(_, c, b)| {
            if c < 10 {
                10.0 * (b + 1) as f64
            } else {
                50.0 + 10.0 * b as f64
            }
        })
        .unwrap()
    }

    #[test]
    fn test_every_pixel_labelled() {
        let cube = two_region_cube();
        let seg = segment(&cube, None, &SegmentParams { target_segments: 4, ..Default::default() }).unwrap();
        assert_eq!(seg.labels.shape(), (20, 20));
        assert!(seg.labels.data().iter().all(|&l| l >= 0 && (l as usize) < seg.n_segments));
        assert!(seg.n_segments >= 2);
        assert!(seg.compactness > 0.0);
    }

    #[test]
    fn test_mask_coverage() {
        let cube = two_region_cube();
        let mut mask: Raster<u8> = Raster::filled(20, 20, 1);
        for r in 0..5 {
            for c in 0..20 {
                mask.set(r, c, 0).unwrap();
            }
        }
        let seg = segment(&cube, Some(&mask), &SegmentParams { target_segments: 4, ..Default::default() }).unwrap();
        for ((r, c), l) in seg.labels.indexed_iter() {
            assert_eq!(l >= 0, mask.is_valid(r, c), "pixel ({r}, {c})");
        }
        assert!(seg.labels.data().iter().any(|&l| l == NO_SEGMENT));
    }

    #[test]
    fn test_zero_target_is_config_error() {
        let cube = two_region_cube();
        let err = segment(&cube, None, &SegmentParams { target_segments: 0, ..Default::default() });
        assert!(matches!(err, Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn test_target_larger_than_pixels() {
        let cube = RasterCube::from_fn(4, 5, 3, |(r, c, b)| (r * 5 + c + b) as f64).unwrap();
        let seg = segment(&cube, None, &SegmentParams { target_segments: 1000, ..Default::default() }).unwrap();
        assert_eq!(seg.n_segments, 20);
    }

    #[test]
    fn test_mean_spectra_of_constant_regions() {
        let cube = two_region_cube();
        let seg = segment(&cube, None, &SegmentParams { target_segments: 4, ..Default::default() }).unwrap();
        let registry = SegmentRegistry::build(&seg.labels, None, &AllLabels).unwrap();
        let means = segment_mean_spectra(&seg.spectra, &seg.labels, &registry).unwrap();
        assert_eq!(means.dim(), (registry.len(), 4));
        for row in means.rows() {
            let left = row[0] == 10.0 && row[3] == 40.0;
            let right = row[0] == 50.0 && row[3] == 80.0;
            assert!(left || right, "segment mean {row} mixes regions");
        }
    }

    #[test]
    fn test_segmenter_algorithm() {
        let seg = Segmenter
            .execute(two_region_cube(), SegmentParams { target_segments: 4, ..Default::default() })
            .unwrap();
        assert_eq!(Segmenter.name(), "Segmenter");
        assert!(seg.n_segments > 0);
    }
}
