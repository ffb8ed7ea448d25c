//! Full-resolution reconstruction
//!
//! Broadcasts each segment's coefficients to its pixels and applies them to
//! the original spectra: `output = spectra * slopes + intercepts`, band by
//! band. Pixels without a segment (masked, excluded label) come out NaN.

use crate::estimation::CoefficientTable;
use crate::registry::SegmentRegistry;
use ndarray::Array2;
use segelm_core::raster::{Raster, SpectrumTable};
use segelm_core::{Error, Result};
use tracing::debug;

/// Per-pixel coefficients shaped like the spectrum table, `(rows*cols, bands)`
#[derive(Debug, Clone, PartialEq)]
pub struct PixelCoefficients {
    pub slopes: Array2<f64>,
    pub intercepts: Array2<f64>,
}

/// Copy every segment's coefficient rows onto the pixels carrying its label.
///
/// Pixel `(row, col)` lands on row `row * cols + col`.
pub fn broadcast_coefficients(
    labels: &Raster<i32>,
    registry: &SegmentRegistry,
    table: &CoefficientTable,
) -> Result<PixelCoefficients> {
    if table.segments() != registry.len() {
        return Err(Error::SegmentCountMismatch {
            expected: registry.len(),
            actual: table.segments(),
        });
    }

    let cols = labels.cols();
    let bands = table.bands();
    let mut slopes = Array2::from_elem((labels.len(), bands), f64::NAN);
    let mut intercepts = Array2::from_elem((labels.len(), bands), f64::NAN);
    let mut uncovered = 0usize;

    for ((r, c), label) in labels.indexed_iter() {
        let Some(dense) = registry.dense_id(label) else {
            uncovered += 1;
            continue;
        };
        let p = r * cols + c;
        slopes.row_mut(p).assign(&table.slopes().row(dense));
        intercepts.row_mut(p).assign(&table.intercepts().row(dense));
    }

    if uncovered > 0 {
        debug!(uncovered, "pixels without a segment get NaN coefficients");
    }

    Ok(PixelCoefficients { slopes, intercepts })
}

/// Apply broadcast coefficients: `spectra * slopes + intercepts`.
pub fn apply_coefficients(spectra: &SpectrumTable, coefficients: &PixelCoefficients) -> Result<SpectrumTable> {
    let shape = spectra.view().dim();
    for arr in [&coefficients.slopes, &coefficients.intercepts] {
        if arr.dim() != shape {
            return Err(Error::SizeMismatch {
                er: shape.0,
                ec: shape.1,
                ar: arr.nrows(),
                ac: arr.ncols(),
            });
        }
    }

    let output = spectra.data() * &coefficients.slopes + &coefficients.intercepts;
    let (rows, cols) = spectra.raster_shape();
    SpectrumTable::new(output, rows, cols)
}

/// Reconstruct the full-resolution output from the per-segment table.
///
/// # Errors
/// [`Error::SizeMismatch`] if the label map does not match the spectra,
/// [`Error::SegmentCountMismatch`] if the table does not match the registry,
/// [`Error::BandMismatch`] if the table does not match the spectra.
pub fn reconstruct(
    spectra: &SpectrumTable,
    labels: &Raster<i32>,
    registry: &SegmentRegistry,
    table: &CoefficientTable,
) -> Result<SpectrumTable> {
    let (rows, cols) = spectra.raster_shape();
    labels.ensure_shape(rows, cols)?;
    if table.bands() != spectra.bands() {
        return Err(Error::BandMismatch {
            expected: spectra.bands(),
            actual: table.bands(),
        });
    }

    let coefficients = broadcast_coefficients(labels, registry, table)?;
    apply_coefficients(spectra, &coefficients)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{AllLabels, ExcludeLabel};
    use ndarray::array;
    use segelm_core::raster::RasterCube;
    use segelm_core::NO_SEGMENT;

    fn scene() -> (SpectrumTable, Raster<i32>) {
        let cube = RasterCube::from_fn(2, 3, 2, |(r, c, b)| (r * 30 + c * 10 + b) as f64).unwrap();
        #[rustfmt::skip]
        let labels = Raster::from_vec(vec![
            0, 0, 2,
            0, 2, NO_SEGMENT,
        ], 2, 3).unwrap();
        (cube.flatten(), labels)
    }

    fn table() -> CoefficientTable {
        CoefficientTable::from_arrays(array![[2.0, 3.0], [0.5, -1.0]], array![[1.0, 0.0], [4.0, 10.0]]).unwrap()
    }

    #[test]
    fn test_broadcast_constant_within_segment() {
        let (_, labels) = scene();
        let registry = SegmentRegistry::build(&labels, None, &AllLabels).unwrap();
        let coeffs = broadcast_coefficients(&labels, &registry, &table()).unwrap();
        assert_eq!(coeffs.slopes.dim(), (6, 2));
        assert_eq!(coeffs.slopes.row(0), coeffs.slopes.row(3));
        assert_eq!(coeffs.slopes.row(2), coeffs.slopes.row(4));
        assert_eq!(coeffs.intercepts.row(4), array![4.0, 10.0]);
        assert!(coeffs.slopes.row(5).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_affine_identity() {
        let (spectra, labels) = scene();
        let registry = SegmentRegistry::build(&labels, None, &AllLabels).unwrap();
        let output = reconstruct(&spectra, &labels, &registry, &table()).unwrap();
        let coeffs = broadcast_coefficients(&labels, &registry, &table()).unwrap();

        for p in 0..5 {
            for b in 0..2 {
                let expected = spectra.data()[[p, b]] * coeffs.slopes[[p, b]] + coeffs.intercepts[[p, b]];
                assert_eq!(output.data()[[p, b]], expected);
            }
        }
        // Pixel (0, 1), segment 0, band 1: 11 * 3 + 0
        assert_eq!(output.data()[[1, 1]], 33.0);
        assert!(output.pixel(5).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_excluded_label_is_nan() {
        let (spectra, labels) = scene();
        let registry = SegmentRegistry::build(&labels, None, &ExcludeLabel(2)).unwrap();
        let single = CoefficientTable::from_arrays(array![[1.0, 1.0]], array![[0.0, 0.0]]).unwrap();
        let output = reconstruct(&spectra, &labels, &registry, &single).unwrap();
        assert_eq!(output.pixel(0), spectra.pixel(0));
        assert!(output.pixel(2).iter().all(|v| v.is_nan()));
        assert!(output.pixel(4).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_output_reshapes_to_cube() {
        let (spectra, labels) = scene();
        let registry = SegmentRegistry::build(&labels, None, &AllLabels).unwrap();
        let cube = reconstruct(&spectra, &labels, &registry, &table()).unwrap().to_cube().unwrap();
        assert_eq!(cube.shape(), (2, 3, 2));
    }

    #[test]
    fn test_mismatches() {
        let (spectra, labels) = scene();
        let registry = SegmentRegistry::build(&labels, None, &AllLabels).unwrap();

        let wrong_segments = CoefficientTable::from_arrays(array![[1.0, 1.0]], array![[0.0, 0.0]]).unwrap();
        assert!(matches!(
            reconstruct(&spectra, &labels, &registry, &wrong_segments),
            Err(Error::SegmentCountMismatch { .. })
        ));

        let wrong_bands = CoefficientTable::from_arrays(array![[1.0], [1.0]], array![[0.0], [0.0]]).unwrap();
        assert!(matches!(
            reconstruct(&spectra, &labels, &registry, &wrong_bands),
            Err(Error::BandMismatch { .. })
        ));

        let small_labels: Raster<i32> = Raster::filled(1, 1, 0);
        assert!(matches!(
            reconstruct(&spectra, &small_labels, &registry, &table()),
            Err(Error::SizeMismatch { .. })
        ));
    }
}
