//! Dimensionality reduction of pixel spectra
//!
//! - **PCA**: projection onto the leading eigenvectors of the band covariance

mod pca;

pub use pca::{pca, PcaParams, Projection};
