//! Raster data structures: 2D grids, multi-band cubes and flattened spectra

mod cube;
mod element;
mod grid;
mod neighborhood;

pub use cube::{RasterCube, SpectrumTable};
pub use element::RasterElement;
pub use grid::Raster;
pub use neighborhood::Neighborhood;
