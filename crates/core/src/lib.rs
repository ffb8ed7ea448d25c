//! # SegElm Core
//!
//! Core types and traits for the SegElm empirical-line pipeline.
//!
//! This crate provides:
//! - `Raster<T>`: Generic 2D grid (label maps, valid-pixel masks)
//! - `RasterCube`: Multi-band `(rows, cols, bands)` radiometric cube
//! - `SpectrumTable`: Flattened `(rows*cols, bands)` view of a cube
//! - `Neighborhood`: Pixel connectivity patterns
//! - Algorithm traits for consistent API

pub mod error;
pub mod raster;

pub use error::{Error, Result};
pub use raster::{Neighborhood, Raster, RasterCube, RasterElement, SpectrumTable};

/// Reserved label for pixels that belong to no segment (masked out).
pub const NO_SEGMENT: i32 = -1;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::raster::{Neighborhood, Raster, RasterCube, RasterElement, SpectrumTable};
    pub use crate::Algorithm;
    pub use crate::NO_SEGMENT;
}

/// Core trait for all algorithms in SegElm.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
