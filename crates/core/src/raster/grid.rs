//! 2D raster grid

use crate::error::{Error, Result};
use crate::raster::RasterElement;
use ndarray::Array2;

/// A 2D raster grid.
///
/// `Raster<T>` stores one value of type `T` per pixel in row-major order.
/// In SegElm it carries label maps (`Raster<i32>`) and valid-pixel masks
/// (`Raster<u8>`, non-zero = valid).
///
/// # Example
///
/// ```ignore
/// use segelm_core::Raster;
///
/// let mut labels: Raster<i32> = Raster::new(20, 20);
/// labels.set(3, 4, 7)?;
/// assert_eq!(labels.get(3, 4)?, 7);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a raster with every cell unset
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, T::UNSET)
    }

    /// Create a raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), value),
        }
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        Ok(Self {
            data: Array2::from_shape_vec((rows, cols), data)?,
        })
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fail with [`Error::SizeMismatch`] unless this raster is `(rows, cols)`
    pub fn ensure_shape(&self, rows: usize, cols: usize) -> Result<()> {
        if self.shape() != (rows, cols) {
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar: self.rows(),
                ac: self.cols(),
            });
        }
        Ok(())
    }

    /// Value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data.get((row, col)).copied().ok_or(Error::IndexOutOfBounds {
            row,
            col,
            rows: self.rows(),
            cols: self.cols(),
        })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let (rows, cols) = self.shape();
        let cell = self
            .data
            .get_mut((row, col))
            .ok_or(Error::IndexOutOfBounds { row, col, rows, cols })?;
        *cell = value;
        Ok(())
    }

    /// Reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Iterate over `((row, col), value)` in row-major order
    pub fn indexed_iter(&self) -> impl Iterator<Item = ((usize, usize), T)> + '_ {
        self.data.indexed_iter().map(|(idx, &v)| (idx, v))
    }

    /// Number of cells holding a value other than `T::UNSET`
    pub fn set_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_unset()).count()
    }
}

impl Raster<u8> {
    /// Whether the mask marks (row, col) as valid (non-zero).
    ///
    /// Out-of-bounds cells are invalid.
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        self.data.get((row, col)).is_some_and(|v| !v.is_unset())
    }

    /// Number of valid (non-zero) cells
    pub fn valid_count(&self) -> usize {
        self.set_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NO_SEGMENT;

    #[test]
    fn test_new_raster_is_unset() {
        let labels: Raster<i32> = Raster::new(10, 20);
        assert_eq!(labels.shape(), (10, 20));
        assert_eq!(labels.len(), 200);
        assert!(labels.data().iter().all(|&l| l == NO_SEGMENT));
        assert_eq!(labels.set_count(), 0);
    }

    #[test]
    fn test_raster_access() {
        let mut raster: Raster<i32> = Raster::new(10, 10);
        raster.set(5, 5, 42).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 42);
        assert_eq!(raster.set_count(), 1);
        assert!(raster.get(10, 0).is_err());
        assert!(matches!(raster.set(0, 10, 1), Err(Error::IndexOutOfBounds { .. })));
    }

    #[test]
    fn test_from_vec_checks_length() {
        assert!(Raster::from_vec(vec![0_i32; 5], 2, 3).is_err());
        let r = Raster::from_vec(vec![1_i32, 2, 3, 4, 5, 6], 2, 3).unwrap();
        assert_eq!(r.get(1, 0).unwrap(), 4);
    }

    #[test]
    fn test_ensure_shape() {
        let r: Raster<u8> = Raster::new(4, 5);
        assert!(r.ensure_shape(4, 5).is_ok());
        assert!(matches!(r.ensure_shape(5, 4), Err(Error::SizeMismatch { .. })));
    }

    #[test]
    fn test_mask_validity() {
        let mut mask: Raster<u8> = Raster::filled(3, 3, 1);
        mask.set(1, 1, 0).unwrap();
        assert!(mask.is_valid(0, 0));
        assert!(!mask.is_valid(1, 1));
        assert!(!mask.is_valid(7, 7));
        assert_eq!(mask.valid_count(), 8);
    }
}
