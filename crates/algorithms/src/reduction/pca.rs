//! Principal Component Analysis of pixel spectra
//!
//! Builds the band covariance matrix of valid pixels, extracts its
//! eigenvalues/eigenvectors via cyclic Jacobi rotations and projects every
//! centered spectrum onto the leading eigenvectors.

use ndarray::{Array2, Array3};
use segelm_core::raster::{Raster, SpectrumTable};
use segelm_core::{Error, Result};
use tracing::debug;

/// Rotation sweeps before the Jacobi solver gives up on convergence
const MAX_SWEEPS: usize = 64;

/// Parameters for PCA
#[derive(Debug, Clone)]
pub struct PcaParams {
    /// Number of principal components to keep (default: all bands)
    pub n_components: Option<usize>,
}

impl Default for PcaParams {
    fn default() -> Self {
        Self { n_components: None }
    }
}

/// Pixel spectra projected onto their leading principal components
#[derive(Debug, Clone)]
pub struct Projection {
    /// Projected features `(rows, cols, n_components)`; NaN on invalid pixels
    pub features: Array3<f64>,
    /// Eigenvalues of the kept components, descending
    pub eigenvalues: Vec<f64>,
    /// Proportion of total variance explained by each kept component
    pub variance_explained: Vec<f64>,
    /// Mean spectrum of the valid pixels
    pub mean: Vec<f64>,
    /// Projection basis `(bands, n_components)`, one eigenvector per column
    pub basis: Array2<f64>,
    /// Per-pixel validity (flat row-major index)
    pub valid: Vec<bool>,
}

impl Projection {
    /// Number of kept components
    pub fn n_components(&self) -> usize {
        self.eigenvalues.len()
    }

    /// Number of pixels that took part in the decomposition
    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    /// Euclidean norm of the square roots of the kept eigenvalues.
    ///
    /// Equals the square root of the variance captured by the projection, so
    /// it scales the SLIC spatial term to the scene's spectral contrast.
    /// Round-off negative eigenvalues count as zero.
    pub fn compactness(&self) -> f64 {
        self.eigenvalues
            .iter()
            .map(|ev| ev.max(0.0).sqrt())
            .fold(0.0, f64::hypot)
    }
}

/// Compute PCA over the pixels of a spectrum table.
///
/// A pixel takes part when the mask (if any) marks it valid and all of its
/// bands are finite.
///
/// # Arguments
/// * `spectra` - Flattened `(rows*cols, bands)` spectra
/// * `mask` - Optional valid-pixel mask (non-zero = valid)
/// * `params` - PCA parameters
pub fn pca(spectra: &SpectrumTable, mask: Option<&Raster<u8>>, params: PcaParams) -> Result<Projection> {
    let (rows, cols) = spectra.raster_shape();
    let n_bands = spectra.bands();
    if n_bands == 0 {
        return Err(Error::Algorithm("PCA requires at least 1 band".into()));
    }
    if let Some(m) = mask {
        m.ensure_shape(rows, cols)?;
    }

    let valid: Vec<bool> = (0..rows * cols)
        .map(|i| {
            let inside = mask.map_or(true, |m| m.is_valid(i / cols, i % cols));
            inside && spectra.pixel(i).iter().all(|v| v.is_finite())
        })
        .collect();
    let n_pixels = valid.iter().filter(|&&v| v).count();

    if n_pixels == 0 {
        return Err(Error::Algorithm("No valid pixels found across all bands".into()));
    }

    // Mean of each band
    let mut means = vec![0.0; n_bands];
    for (i, _) in valid.iter().enumerate().filter(|&(_, &v)| v) {
        for (m, v) in means.iter_mut().zip(spectra.pixel(i).iter()) {
            *m += v;
        }
    }
    for m in &mut means {
        *m /= n_pixels as f64;
    }

    // Sample covariance (upper triangle, mirrored)
    let mut cov = Array2::<f64>::zeros((n_bands, n_bands));
    let mut centered = vec![0.0; n_bands];
    for (i, _) in valid.iter().enumerate().filter(|&(_, &v)| v) {
        for (b, (c, v)) in centered.iter_mut().zip(spectra.pixel(i).iter()).enumerate() {
            *c = v - means[b];
        }
        for a in 0..n_bands {
            for b in a..n_bands {
                cov[(a, b)] += centered[a] * centered[b];
            }
        }
    }
    let denom = (n_pixels - 1).max(1) as f64;
    for a in 0..n_bands {
        for b in a..n_bands {
            cov[(a, b)] /= denom;
            cov[(b, a)] = cov[(a, b)];
        }
    }

    let (eigenvalues, eigenvectors) = jacobi_eigen(cov);

    // Sort by eigenvalue descending
    let mut order: Vec<usize> = (0..n_bands).collect();
    order.sort_by(|&a, &b| {
        eigenvalues[b]
            .partial_cmp(&eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let n_components = params.n_components.unwrap_or(n_bands).clamp(1, n_bands);
    let total_var: f64 = eigenvalues.iter().map(|ev| ev.max(0.0)).sum();

    let kept: Vec<f64> = order.iter().take(n_components).map(|&i| eigenvalues[i]).collect();
    let variance_explained = kept
        .iter()
        .map(|ev| if total_var > 0.0 { ev.max(0.0) / total_var } else { 0.0 })
        .collect();

    let basis = Array2::from_shape_fn((n_bands, n_components), |(b, k)| eigenvectors[(b, order[k])]);

    let mut features = Array3::from_elem((rows, cols, n_components), f64::NAN);
    for (i, _) in valid.iter().enumerate().filter(|&(_, &v)| v) {
        let px = spectra.pixel(i);
        let (r, c) = (i / cols, i % cols);
        for k in 0..n_components {
            features[(r, c, k)] = (0..n_bands).map(|b| (px[b] - means[b]) * basis[(b, k)]).sum();
        }
    }

    debug!(
        bands = n_bands,
        components = n_components,
        valid_pixels = n_pixels,
        leading = ?kept.first(),
        "principal components computed"
    );

    Ok(Projection {
        features,
        eigenvalues: kept,
        variance_explained,
        mean: means,
        basis,
        valid,
    })
}

/// Cyclic Jacobi eigenvalue algorithm for symmetric matrices.
///
/// Returns the eigenvalues and a matrix whose columns are the matching
/// eigenvectors.
fn jacobi_eigen(mut a: Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut v = Array2::<f64>::eye(n);

    let frob = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    if frob == 0.0 {
        return (vec![0.0; n], v);
    }
    let tol = 1e-12 * frob;

    for _ in 0..MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|p| ((p + 1)..n).map(move |q| (p, q)))
            .map(|(p, q)| a[(p, q)] * a[(p, q)])
            .sum::<f64>()
            .sqrt();
        if off <= tol {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[(p, q)];
                if apq.abs() <= f64::MIN_POSITIVE {
                    continue;
                }

                let theta = (a[(q, q)] - a[(p, p)]) / (2.0 * apq);
                let sign = if theta >= 0.0 { 1.0 } else { -1.0 };
                let t = sign / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                // A <- Jᵀ A J
                for k in 0..n {
                    let akp = a[(k, p)];
                    let akq = a[(k, q)];
                    a[(k, p)] = c * akp - s * akq;
                    a[(k, q)] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[(p, k)];
                    let aqk = a[(q, k)];
                    a[(p, k)] = c * apk - s * aqk;
                    a[(q, k)] = s * apk + c * aqk;
                }
                a[(p, q)] = 0.0;
                a[(q, p)] = 0.0;

                // V <- V J
                for k in 0..n {
                    let vkp = v[(k, p)];
                    let vkq = v[(k, q)];
                    v[(k, p)] = c * vkp - s * vkq;
                    v[(k, q)] = s * vkp + c * vkq;
                }
            }
        }
    }

    let eigenvalues = (0..n).map(|i| a[(i, i)]).collect();
    (eigenvalues, v)
}
