//! SLIC superpixels over a projected feature cube
//!
//! Simple Linear Iterative Clustering: seeds on a regular grid, then
//! alternating local assignment (within a `2s x 2s` window around each
//! center) and center update, with a distance that mixes feature distance
//! and spatial distance scaled by a compactness parameter.
//!
//! Reference:
//! Achanta, R. et al. (2012). SLIC superpixels compared to state-of-the-art
//! superpixel methods. IEEE TPAMI, 34(11).

use super::connectivity::enforce_connectivity;
use ndarray::ArrayView3;
use segelm_core::raster::{Neighborhood, Raster};
use segelm_core::{Error, Result, NO_SEGMENT};
use tracing::debug;

/// Smallest compactness used; keeps ties on flat scenes spatially resolved
pub const MIN_COMPACTNESS: f64 = 1e-3;

/// Parameters for SLIC superpixel clustering
#[derive(Debug, Clone)]
pub struct SlicParams {
    /// Requested number of superpixels (the result may have fewer)
    pub target_segments: usize,
    /// Spatial-vs-feature trade-off; larger values give more regular segments
    pub compactness: f64,
    /// Maximum assignment/update rounds (default: 10)
    pub max_iterations: usize,
    /// Segments smaller than this fraction of the nominal size are merged (default: 0.5)
    pub min_size_factor: f64,
    /// Segments are cut at this multiple of the nominal size (default: 3.0)
    pub max_size_factor: f64,
}

impl Default for SlicParams {
    fn default() -> Self {
        Self {
            target_segments: 100,
            compactness: 10.0,
            max_iterations: 10,
            min_size_factor: 0.5,
            max_size_factor: 3.0,
        }
    }
}

impl SlicParams {
    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        if self.target_segments == 0 {
            return Err(Error::invalid_parameter(
                "target_segments",
                self.target_segments,
                "must be at least 1",
            ));
        }
        if !(self.compactness.is_finite() && self.compactness >= 0.0) {
            return Err(Error::invalid_parameter(
                "compactness",
                self.compactness,
                "must be finite and non-negative",
            ));
        }
        if !(self.min_size_factor >= 0.0) || !(self.max_size_factor > self.min_size_factor) {
            return Err(Error::invalid_parameter(
                "max_size_factor",
                self.max_size_factor,
                format!("must exceed min_size_factor ({})", self.min_size_factor),
            ));
        }
        Ok(())
    }
}

struct Center {
    row: f64,
    col: f64,
    features: Vec<f64>,
}

/// Cluster the valid pixels of a `(rows, cols, n_features)` cube into superpixels.
///
/// # Arguments
/// * `features` - Projected feature cube
/// * `valid` - Per-pixel validity (flat row-major); invalid pixels get [`NO_SEGMENT`]
/// * `params` - SLIC parameters
///
/// # Returns
/// Label map with contiguous segment labels `0..S-1`, and `S`
pub fn slic(features: ArrayView3<'_, f64>, valid: &[bool], params: &SlicParams) -> Result<(Raster<i32>, usize)> {
    params.validate()?;
    let (rows, cols, n_features) = features.dim();
    let n = rows * cols;
    if valid.len() != n {
        return Err(Error::InvalidDimensions { width: cols, height: rows });
    }

    let n_valid = valid.iter().filter(|&&v| v).count();
    if n_valid == 0 {
        return Err(Error::Algorithm("SLIC requires at least one valid pixel".into()));
    }

    let nominal = n_valid as f64 / params.target_segments as f64;
    let step = (nominal.sqrt().floor() as usize).max(1);
    let compactness = params.compactness.max(MIN_COMPACTNESS);
    let spatial_weight = (compactness / step as f64).powi(2);

    let mut centers = seed_centers(&features, valid, step);
    debug!(
        seeds = centers.len(),
        step,
        compactness,
        "SLIC seeds placed"
    );

    let mut labels = vec![NO_SEGMENT; n];
    let mut distances = vec![f64::INFINITY; n];

    for iteration in 0..params.max_iterations {
        distances.iter_mut().for_each(|d| *d = f64::INFINITY);
        let mut assigned = vec![NO_SEGMENT; n];

        // Assignment step: each center claims pixels in its 2s x 2s window
        for (k, center) in centers.iter().enumerate() {
            let r0 = (center.row - step as f64).floor().max(0.0) as usize;
            let c0 = (center.col - step as f64).floor().max(0.0) as usize;
            let r1 = ((center.row + step as f64).ceil() as usize).min(rows - 1);
            let c1 = ((center.col + step as f64).ceil() as usize).min(cols - 1);

            for r in r0..=r1 {
                for c in c0..=c1 {
                    let idx = r * cols + c;
                    if !valid[idx] {
                        continue;
                    }
                    let d = distance(&features, r, c, center, spatial_weight);
                    if d < distances[idx] {
                        distances[idx] = d;
                        assigned[idx] = k as i32;
                    }
                }
            }
        }

        let changed = assigned.iter().zip(labels.iter()).filter(|(a, b)| a != b).count();
        labels = assigned;

        // Update step: move centers to the mean of their pixels
        update_centers(&mut centers, &features, &labels, cols, n_features);

        debug!(iteration, changed, "SLIC iteration");
        if changed == 0 {
            break;
        }
    }

    assign_orphans(&mut labels, &features, valid, &centers, spatial_weight, cols);

    let min_size = (params.min_size_factor * nominal).floor() as usize;
    let max_size = ((params.max_size_factor * nominal).ceil() as usize).max(1);
    let (connected, n_segments) = enforce_connectivity(&labels, valid, rows, cols, min_size, max_size);

    Ok((Raster::from_vec(connected, rows, cols)?, n_segments))
}

/// Place one seed per grid cell of size `step`, on valid pixels only.
///
/// With `step >= 3` each seed moves to the lowest-gradient pixel of its
/// 3x3 neighborhood so it does not start on an edge.
fn seed_centers(features: &ArrayView3<'_, f64>, valid: &[bool], step: usize) -> Vec<Center> {
    let (rows, cols, _) = features.dim();
    let mut centers = Vec::new();

    for r in (step / 2..rows).step_by(step) {
        for c in (step / 2..cols).step_by(step) {
            if !valid[r * cols + c] {
                continue;
            }
            let (sr, sc) = if step >= 3 {
                lowest_gradient(features, valid, r, c)
            } else {
                (r, c)
            };
            centers.push(make_center(features, sr, sc));
        }
    }

    // Masks can leave every grid point invalid; fall back to the first valid pixel.
    if centers.is_empty() {
        if let Some(idx) = valid.iter().position(|&v| v) {
            centers.push(make_center(features, idx / cols, idx % cols));
        }
    }

    centers
}

fn make_center(features: &ArrayView3<'_, f64>, r: usize, c: usize) -> Center {
    let (_, _, n_features) = features.dim();
    Center {
        row: r as f64,
        col: c as f64,
        features: (0..n_features).map(|k| features[(r, c, k)]).collect(),
    }
}

fn lowest_gradient(features: &ArrayView3<'_, f64>, valid: &[bool], r: usize, c: usize) -> (usize, usize) {
    let (rows, cols, _) = features.dim();
    let mut best = (r, c);
    let mut best_grad = gradient(features, valid, r, c).unwrap_or(f64::INFINITY);

    for (nr, nc) in Neighborhood::Queen3x3.neighbors(r, c, rows, cols) {
        if !valid[nr * cols + nc] {
            continue;
        }
        if let Some(g) = gradient(features, valid, nr, nc) {
            if g < best_grad {
                best_grad = g;
                best = (nr, nc);
            }
        }
    }
    best
}

/// Squared central-difference gradient; `None` at borders or next to invalid pixels
fn gradient(features: &ArrayView3<'_, f64>, valid: &[bool], r: usize, c: usize) -> Option<f64> {
    let (rows, cols, n_features) = features.dim();
    if r == 0 || c == 0 || r + 1 >= rows || c + 1 >= cols {
        return None;
    }
    let around = [(r - 1, c), (r + 1, c), (r, c - 1), (r, c + 1)];
    if around.iter().any(|&(nr, nc)| !valid[nr * cols + nc]) {
        return None;
    }
    let mut g = 0.0;
    for k in 0..n_features {
        let dv = features[(r + 1, c, k)] - features[(r - 1, c, k)];
        let dh = features[(r, c + 1, k)] - features[(r, c - 1, k)];
        g += dv * dv + dh * dh;
    }
    Some(g)
}

#[inline]
fn distance(features: &ArrayView3<'_, f64>, r: usize, c: usize, center: &Center, spatial_weight: f64) -> f64 {
    let mut color = 0.0;
    for (k, cf) in center.features.iter().enumerate() {
        let d = features[(r, c, k)] - cf;
        color += d * d;
    }
    let dr = r as f64 - center.row;
    let dc = c as f64 - center.col;
    color + spatial_weight * (dr * dr + dc * dc)
}

fn update_centers(
    centers: &mut [Center],
    features: &ArrayView3<'_, f64>,
    labels: &[i32],
    cols: usize,
    n_features: usize,
) {
    let k = centers.len();
    let mut counts = vec![0usize; k];
    let mut sum_rc = vec![(0.0_f64, 0.0_f64); k];
    let mut sum_f = vec![0.0_f64; k * n_features];

    for (idx, &label) in labels.iter().enumerate() {
        if label < 0 {
            continue;
        }
        let l = label as usize;
        let (r, c) = (idx / cols, idx % cols);
        counts[l] += 1;
        sum_rc[l].0 += r as f64;
        sum_rc[l].1 += c as f64;
        for f in 0..n_features {
            sum_f[l * n_features + f] += features[(r, c, f)];
        }
    }

    for (l, center) in centers.iter_mut().enumerate() {
        // Empty clusters keep their previous center
        if counts[l] == 0 {
            continue;
        }
        let n = counts[l] as f64;
        center.row = sum_rc[l].0 / n;
        center.col = sum_rc[l].1 / n;
        for f in 0..n_features {
            center.features[f] = sum_f[l * n_features + f] / n;
        }
    }
}

/// Valid pixels no window reached go to the globally nearest center.
fn assign_orphans(
    labels: &mut [i32],
    features: &ArrayView3<'_, f64>,
    valid: &[bool],
    centers: &[Center],
    spatial_weight: f64,
    cols: usize,
) {
    for idx in 0..labels.len() {
        if !valid[idx] || labels[idx] >= 0 {
            continue;
        }
        let (r, c) = (idx / cols, idx % cols);
        let nearest = centers
            .iter()
            .enumerate()
            .map(|(k, center)| (k, distance(features, r, c, center, spatial_weight)))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        if let Some((k, _)) = nearest {
            labels[idx] = k as i32;
        }
    }
}
