//! Multi-band raster cube and its flattened spectrum table

use crate::error::{Error, Result};
use ndarray::{Array2, Array3, ArrayView1, ArrayView2, ArrayView3, Axis};

/// A `(rows, cols, bands)` cube of radiometric values.
///
/// The cube is the caller-owned input of the pipeline and is never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterCube {
    data: Array3<f64>,
}

impl RasterCube {
    /// Wrap an existing `(rows, cols, bands)` array
    pub fn from_array(data: Array3<f64>) -> Result<Self> {
        let (rows, cols, bands) = data.dim();
        if rows == 0 || cols == 0 || bands == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        Ok(Self { data })
    }

    /// Build a cube from band-interleaved-by-pixel data (`bands` values per pixel, row-major)
    pub fn from_vec(data: Vec<f64>, rows: usize, cols: usize, bands: usize) -> Result<Self> {
        if data.len() != rows * cols * bands {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        Self::from_array(Array3::from_shape_vec((rows, cols, bands), data)?)
    }

    /// Build a cube by evaluating `f(row, col, band)` for every element
    pub fn from_fn<F>(rows: usize, cols: usize, bands: usize, f: F) -> Result<Self>
    where
        F: FnMut((usize, usize, usize)) -> f64,
    {
        Self::from_array(Array3::from_shape_fn((rows, cols, bands), f))
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.dim().0
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.dim().1
    }

    /// Number of spectral bands
    pub fn bands(&self) -> usize {
        self.data.dim().2
    }

    /// Dimensions as (rows, cols, bands)
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Number of pixels (rows * cols)
    pub fn n_pixels(&self) -> usize {
        self.rows() * self.cols()
    }

    /// Spectrum of the pixel at (row, col)
    pub fn spectrum(&self, row: usize, col: usize) -> Result<ArrayView1<'_, f64>> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        Ok(self.data.index_axis(Axis(0), row).index_axis_move(Axis(0), col))
    }

    /// View of the underlying array
    pub fn view(&self) -> ArrayView3<'_, f64> {
        self.data.view()
    }

    /// Consume the cube and return the underlying array
    pub fn into_array(self) -> Array3<f64> {
        self.data
    }

    /// Flatten to a `(rows*cols, bands)` spectrum table.
    ///
    /// Pixel `(row, col)` lands on table row `row * cols + col`.
    pub fn flatten(&self) -> SpectrumTable {
        let (rows, cols, bands) = self.shape();
        let data = Array2::from_shape_fn((rows * cols, bands), |(p, b)| {
            self.data[[p / cols, p % cols, b]]
        });
        SpectrumTable { data, rows, cols }
    }
}

/// Pixel spectra as a `(rows*cols, bands)` table, remembering the raster shape.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumTable {
    data: Array2<f64>,
    rows: usize,
    cols: usize,
}

impl SpectrumTable {
    /// Wrap a `(rows*cols, bands)` table for a `rows x cols` raster
    pub fn new(data: Array2<f64>, rows: usize, cols: usize) -> Result<Self> {
        if data.nrows() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        Ok(Self { data, rows, cols })
    }

    /// Raster shape (rows, cols) this table was flattened from
    pub fn raster_shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of pixels (table rows)
    pub fn n_pixels(&self) -> usize {
        self.data.nrows()
    }

    /// Number of spectral bands (table columns)
    pub fn bands(&self) -> usize {
        self.data.ncols()
    }

    /// Spectrum of the pixel at flat index `pixel`
    pub fn pixel(&self, pixel: usize) -> ArrayView1<'_, f64> {
        self.data.row(pixel)
    }

    /// View of the table
    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    /// Reference to the underlying table
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// Reshape back into a `(rows, cols, bands)` cube
    pub fn to_cube(&self) -> Result<RasterCube> {
        let bands = self.bands();
        let flat: Vec<f64> = self.data.iter().copied().collect();
        RasterCube::from_vec(flat, self.rows, self.cols, bands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_cube() -> RasterCube {
        RasterCube::from_fn(3, 4, 2, |(r, c, b)| (r * 100 + c * 10 + b) as f64).unwrap()
    }

    #[test]
    fn test_cube_shape() {
        let cube = ramp_cube();
        assert_eq!(cube.shape(), (3, 4, 2));
        assert_eq!(cube.n_pixels(), 12);
    }

    #[test]
    fn test_flatten_is_row_major() {
        let cube = ramp_cube();
        let table = cube.flatten();
        assert_eq!(table.n_pixels(), 12);
        assert_eq!(table.bands(), 2);
        // (row 2, col 1) -> flat 2 * 4 + 1
        let px = table.pixel(9);
        assert_eq!(px[0], 210.0);
        assert_eq!(px[1], 211.0);
        assert_eq!(cube.spectrum(2, 1).unwrap(), px);
    }

    #[test]
    fn test_table_back_to_cube() {
        let cube = ramp_cube();
        assert_eq!(cube.flatten().to_cube().unwrap(), cube);
    }

    #[test]
    fn test_empty_cube_rejected() {
        assert!(RasterCube::from_vec(vec![], 0, 4, 2).is_err());
        assert!(RasterCube::from_vec(vec![1.0; 5], 2, 2, 2).is_err());
    }
}
