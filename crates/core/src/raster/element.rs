//! Cell value types of 2D rasters

use crate::NO_SEGMENT;
use std::fmt::Debug;

/// Trait for types that can be stored in a raster cell.
///
/// Every element type has an `UNSET` value a cell holds before anything is
/// written to it: [`NO_SEGMENT`] in label maps, 0 (invalid) in masks and
/// NaN in float grids.
pub trait RasterElement: Copy + Debug + PartialEq + Send + Sync + 'static {
    const UNSET: Self;

    /// Whether this value is the unset marker
    fn is_unset(self) -> bool {
        self == Self::UNSET
    }
}

impl RasterElement for i32 {
    const UNSET: Self = NO_SEGMENT;
}

impl RasterElement for u8 {
    const UNSET: Self = 0;
}

impl RasterElement for f64 {
    const UNSET: Self = f64::NAN;

    fn is_unset(self) -> bool {
        self.is_nan()
    }
}
