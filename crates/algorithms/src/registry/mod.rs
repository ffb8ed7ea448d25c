//! Segment registry and spatial index
//!
//! Turns a label map into dense segment identifiers `0..S-1`, one centroid
//! per segment, and a k-d tree over those centroids.
//!
//! Label maps are expected to hold dense-but-possibly-gapped, non-negative
//! labels starting at 0: clustering may merge labels away and masking may
//! remove every pixel of a label. Negative labels (such as
//! [`segelm_core::NO_SEGMENT`]) never form segments.

pub mod kdtree;

pub use kdtree::{KdTree, Location, NearestResult};

use segelm_core::raster::Raster;
use segelm_core::{Error, Result};
use tracing::{debug, info};

/// Decides which labels of a label map become segments.
pub trait LabelPredicate {
    /// Whether `label` is included
    fn includes(&self, label: i32) -> bool;
}

/// Include every label
#[derive(Debug, Clone, Copy, Default)]
pub struct AllLabels;

impl LabelPredicate for AllLabels {
    fn includes(&self, _label: i32) -> bool {
        true
    }
}

/// Include every label except a reserved one (e.g. a water class)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExcludeLabel(pub i32);

impl LabelPredicate for ExcludeLabel {
    fn includes(&self, label: i32) -> bool {
        label != self.0
    }
}

impl<F> LabelPredicate for F
where
    F: Fn(i32) -> bool,
{
    fn includes(&self, label: i32) -> bool {
        self(label)
    }
}

/// Bijection between surviving original labels and dense identifiers `0..S-1`.
///
/// Dense identifiers follow increasing original-label order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseIndex {
    /// Dense id for each original label `0..=max_label`
    dense_of: Vec<Option<usize>>,
    /// Original label for each dense id
    labels: Vec<i32>,
}

impl DenseIndex {
    /// Build from a presence table indexed by original label `0..=max_label`.
    pub fn from_presence(present: &[bool]) -> Self {
        let mut dense_of = vec![None; present.len()];
        let mut labels = Vec::new();
        for (label, _) in present.iter().enumerate().filter(|&(_, &p)| p) {
            dense_of[label] = Some(labels.len());
            labels.push(label as i32);
        }
        Self { dense_of, labels }
    }

    /// Number of dense identifiers
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether no label survived
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Dense identifier of an original label, if it survived
    pub fn dense_id(&self, label: i32) -> Option<usize> {
        usize::try_from(label)
            .ok()
            .and_then(|l| self.dense_of.get(l).copied().flatten())
    }

    /// Original label of a dense identifier
    pub fn label(&self, dense: usize) -> Option<i32> {
        self.labels.get(dense).copied()
    }

    /// Original labels in dense order
    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    /// Labels in `[0, max_label]` that have no dense identifier
    pub fn missing_labels(&self) -> Vec<i32> {
        self.dense_of
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_none())
            .map(|(l, _)| l as i32)
            .collect()
    }
}

/// Dense segment identifiers, centroids and their spatial index
#[derive(Debug, Clone)]
pub struct SegmentRegistry {
    index: DenseIndex,
    centroids: Vec<Location>,
    pixel_counts: Vec<usize>,
    tree: KdTree,
}

impl SegmentRegistry {
    /// Build the registry from a label map.
    ///
    /// A pixel contributes when the mask (if any) marks it valid, its label
    /// is non-negative and `predicate` includes the label. Labels left
    /// without contributing pixels are gaps and get no dense identifier.
    ///
    /// # Errors
    /// [`Error::SizeMismatch`] if the mask shape differs from the label map,
    /// [`Error::Algorithm`] if no segment survives.
    pub fn build<P>(labels: &Raster<i32>, mask: Option<&Raster<u8>>, predicate: &P) -> Result<Self>
    where
        P: LabelPredicate + ?Sized,
    {
        let (rows, cols) = labels.shape();
        if let Some(m) = mask {
            m.ensure_shape(rows, cols)?;
        }

        let included = |r: usize, c: usize, label: i32| {
            label >= 0 && mask.map_or(true, |m| m.is_valid(r, c)) && predicate.includes(label)
        };

        let max_label = labels
            .indexed_iter()
            .filter(|&((r, c), l)| included(r, c, l))
            .map(|(_, l)| l)
            .max()
            .ok_or_else(|| Error::Algorithm("No segments remain after label filtering".into()))?;

        // Discover labels and accumulate locations in one pass
        let span = max_label as usize + 1;
        let mut present = vec![false; span];
        let mut sums = vec![(0.0_f64, 0.0_f64); span];
        let mut counts = vec![0usize; span];
        for ((r, c), label) in labels.indexed_iter() {
            if !included(r, c, label) {
                continue;
            }
            let l = label as usize;
            present[l] = true;
            sums[l].0 += r as f64;
            sums[l].1 += c as f64;
            counts[l] += 1;
        }

        let index = DenseIndex::from_presence(&present);
        let centroids: Vec<Location> = index
            .labels()
            .iter()
            .map(|&label| {
                let l = label as usize;
                let n = counts[l] as f64;
                Location::new(sums[l].0 / n, sums[l].1 / n)
            })
            .collect();
        let pixel_counts = index.labels().iter().map(|&l| counts[l as usize]).collect();
        let tree = KdTree::build(&centroids);

        let missing = span - index.len();
        if missing > 0 {
            debug!(missing, max_label, "closed gaps in label range");
        }
        info!(segments = index.len(), "segment registry built");

        Ok(Self {
            index,
            centroids,
            pixel_counts,
            tree,
        })
    }

    /// Number of segments `S`
    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    /// Whether the registry holds no segments
    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    /// Dense identifier of an original label
    pub fn dense_id(&self, label: i32) -> Option<usize> {
        self.index.dense_id(label)
    }

    /// Original label of a dense identifier
    pub fn label_of(&self, dense: usize) -> Option<i32> {
        self.index.label(dense)
    }

    /// The label re-indexing
    pub fn dense_index(&self) -> &DenseIndex {
        &self.index
    }

    /// Centroid of a dense identifier
    pub fn centroid(&self, dense: usize) -> Option<Location> {
        self.centroids.get(dense).copied()
    }

    /// All centroids in dense order (`S` rows)
    pub fn centroids(&self) -> &[Location] {
        &self.centroids
    }

    /// Number of contributing pixels of a dense identifier
    pub fn pixel_count(&self, dense: usize) -> usize {
        self.pixel_counts.get(dense).copied().unwrap_or(0)
    }

    /// The spatial index over centroids
    pub fn tree(&self) -> &KdTree {
        &self.tree
    }

    /// Dense identifiers of the `k` segments whose centroids are nearest to
    /// segment `dense`'s centroid, nearest first (the segment itself leads).
    ///
    /// Returns at most `min(k, S)` identifiers; empty for an unknown id.
    pub fn nearest_segments(&self, dense: usize, k: usize) -> Vec<usize> {
        match self.centroid(dense) {
            Some(loc) => self.tree.k_nearest(loc, k).into_iter().map(|r| r.index).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use segelm_core::NO_SEGMENT;
    use std::collections::HashSet;

    #[rustfmt::skip]
    fn gapped_labels() -> Raster<i32> {
        // Labels 0, 2, 5 present; 1, 3, 4 missing
        Raster::from_vec(vec![
            0, 0, 2, 2,
            0, 0, 2, 2,
            5, 5, 5, 5,
        ], 3, 4).unwrap()
    }

    #[test]
    fn test_dense_reindexing_closes_gaps() {
        let registry = SegmentRegistry::build(&gapped_labels(), None, &AllLabels).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.dense_id(0), Some(0));
        assert_eq!(registry.dense_id(2), Some(1));
        assert_eq!(registry.dense_id(5), Some(2));
        assert_eq!(registry.dense_id(1), None);
        assert_eq!(registry.dense_id(NO_SEGMENT), None);
        assert_eq!(registry.dense_index().missing_labels(), vec![1, 3, 4]);
    }

    #[test]
    fn test_dense_index_is_bijection() {
        let registry = SegmentRegistry::build(&gapped_labels(), None, &AllLabels).unwrap();
        let ids: HashSet<usize> = [0, 2, 5].iter().filter_map(|&l| registry.dense_id(l)).collect();
        assert_eq!(ids, (0..registry.len()).collect());
        for dense in 0..registry.len() {
            let label = registry.label_of(dense).unwrap();
            assert_eq!(registry.dense_id(label), Some(dense));
        }
    }

    #[test]
    fn test_centroids() {
        let registry = SegmentRegistry::build(&gapped_labels(), None, &AllLabels).unwrap();
        assert_eq!(registry.centroids().len(), registry.len());
        let c0 = registry.centroid(0).unwrap();
        assert_relative_eq!(c0.row, 0.5);
        assert_relative_eq!(c0.col, 0.5);
        let c2 = registry.centroid(2).unwrap();
        assert_relative_eq!(c2.row, 2.0);
        assert_relative_eq!(c2.col, 1.5);
        assert_eq!(registry.pixel_count(2), 4);
    }

    #[test]
    fn test_excluded_label() {
        let registry = SegmentRegistry::build(&gapped_labels(), None, &ExcludeLabel(2)).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.dense_id(2), None);
        assert_eq!(registry.dense_id(5), Some(1));
    }

    #[test]
    fn test_closure_predicate() {
        let registry = SegmentRegistry::build(&gapped_labels(), None, &|l: i32| l > 0).unwrap();
        assert_eq!(registry.index.labels(), &[2, 5]);
    }

    #[test]
    fn test_mask_removes_label_entirely() {
        let mut mask: Raster<u8> = Raster::filled(3, 4, 1);
        for c in 0..4 {
            mask.set(2, c, 0).unwrap();
        }
        let registry = SegmentRegistry::build(&gapped_labels(), Some(&mask), &AllLabels).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.dense_id(5), None);
    }

    #[test]
    fn test_mask_shape_mismatch() {
        let mask: Raster<u8> = Raster::filled(2, 2, 1);
        assert!(SegmentRegistry::build(&gapped_labels(), Some(&mask), &AllLabels).is_err());
    }

    #[test]
    fn test_nothing_survives() {
        let labels: Raster<i32> = Raster::filled(2, 2, NO_SEGMENT);
        assert!(SegmentRegistry::build(&labels, None, &AllLabels).is_err());
    }

    #[test]
    fn test_neighbor_count_bound() {
        let labels = Raster::from_vec((0..36).collect(), 6, 6).unwrap();
        let registry = SegmentRegistry::build(&labels, None, &AllLabels).unwrap();
        for dense in 0..registry.len() {
            let near = registry.nearest_segments(dense, 15);
            assert_eq!(near.len(), 15);
            assert_eq!(near[0], dense, "segment should be its own nearest neighbor");
        }
        assert_eq!(registry.nearest_segments(0, 100).len(), 36);
        assert!(registry.nearest_segments(99, 5).is_empty());
    }
}
