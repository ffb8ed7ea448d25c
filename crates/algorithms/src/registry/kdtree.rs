//! 2D k-d tree over segment centroids
//!
//! Provides O(log n) nearest-neighbor and k-nearest-neighbor queries
//! over `(row, col)` locations.
//!
//! Reference:
//! Bentley, J.L. (1975). Multidimensional binary search trees used
//! for associative searching. CACM, 18(9).

/// A `(row, col)` location in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub row: f64,
    pub col: f64,
}

impl Location {
    pub fn new(row: f64, col: f64) -> Self {
        Self { row, col }
    }

    /// Squared Euclidean distance to another location
    #[inline]
    pub fn dist_sq(&self, other: &Location) -> f64 {
        let dr = self.row - other.row;
        let dc = self.col - other.col;
        dr * dr + dc * dc
    }

    #[inline]
    fn coord(&self, dim: u8) -> f64 {
        if dim == 0 {
            self.row
        } else {
            self.col
        }
    }
}

/// A 2D k-d tree for nearest-neighbor queries on locations.
#[derive(Debug, Clone)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    points: Vec<Location>,
}

#[derive(Debug, Clone)]
struct KdNode {
    /// Index into `points`
    point_idx: usize,
    /// Split dimension: 0 = row, 1 = col
    split_dim: u8,
    left: Option<usize>,
    right: Option<usize>,
}

/// Result of a nearest-neighbor query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestResult {
    /// Index of the point in the slice the tree was built from
    pub index: usize,
    pub distance_sq: f64,
}

impl KdTree {
    /// Build a k-d tree from locations.
    ///
    /// Construction is O(n log n) using median-of-coordinate splitting.
    /// Query results refer to points by their index in `points`.
    pub fn build(points: &[Location]) -> Self {
        let mut nodes = Vec::with_capacity(points.len());
        if !points.is_empty() {
            let mut indices: Vec<usize> = (0..points.len()).collect();
            build_recursive(points, &mut indices, 0, &mut nodes);
        }
        Self {
            nodes,
            points: points.to_vec(),
        }
    }

    /// Number of points in the tree.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Location of point `index`
    pub fn point(&self, index: usize) -> Option<Location> {
        self.points.get(index).copied()
    }

    /// Find the single nearest point to `query`.
    ///
    /// Returns `None` if the tree is empty.
    pub fn nearest(&self, query: Location) -> Option<NearestResult> {
        self.k_nearest(query, 1).into_iter().next()
    }

    /// Find the k nearest points to `query`.
    ///
    /// Returns `min(k, len)` results sorted by ascending distance; equal
    /// distances are ordered by point index.
    pub fn k_nearest(&self, query: Location, k: usize) -> Vec<NearestResult> {
        if self.nodes.is_empty() || k == 0 {
            return Vec::new();
        }

        // Sorted vec, farthest first, capped at k entries
        let mut heap: Vec<(f64, usize)> = Vec::with_capacity(k + 1);
        self.knn_recursive(0, query, k, &mut heap);

        heap.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });

        heap.into_iter()
            .map(|(distance_sq, index)| NearestResult { index, distance_sq })
            .collect()
    }

    fn knn_recursive(&self, node_idx: usize, query: Location, k: usize, heap: &mut Vec<(f64, usize)>) {
        let node = &self.nodes[node_idx];
        let p = &self.points[node.point_idx];
        let dist_sq = query.dist_sq(p);

        let candidate = (dist_sq, node.point_idx);
        if heap.len() < k || farther(&heap[0], &candidate) {
            if heap.len() >= k {
                heap.remove(0);
            }
            let pos = heap
                .binary_search_by(|probe| {
                    if farther(probe, &candidate) {
                        std::cmp::Ordering::Less
                    } else {
                        std::cmp::Ordering::Greater
                    }
                })
                .unwrap_or_else(|e| e);
            heap.insert(pos, candidate);
        }

        let diff = query.coord(node.split_dim) - p.coord(node.split_dim);
        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = first {
            self.knn_recursive(child, query, k, heap);
        }

        // The far side can still hold ties at the k-th distance, so compare inclusively
        let threshold = if heap.len() >= k { heap[0].0 } else { f64::MAX };
        if diff * diff <= threshold {
            if let Some(child) = second {
                self.knn_recursive(child, query, k, heap);
            }
        }
    }
}

/// Whether `a` ranks after `b`: larger distance, then larger index
#[inline]
fn farther(a: &(f64, usize), b: &(f64, usize)) -> bool {
    a.0 > b.0 || (a.0 == b.0 && a.1 > b.1)
}

/// Recursively build the k-d tree.
fn build_recursive(points: &[Location], indices: &mut [usize], depth: usize, nodes: &mut Vec<KdNode>) -> usize {
    let n = indices.len();
    let split_dim = (depth % 2) as u8;

    indices.sort_by(|&a, &b| {
        points[a]
            .coord(split_dim)
            .partial_cmp(&points[b].coord(split_dim))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let median = n / 2;
    let node_idx = nodes.len();
    nodes.push(KdNode {
        point_idx: indices[median],
        split_dim,
        left: None,
        right: None,
    });

    let (left, rest) = indices.split_at_mut(median);
    let right = &mut rest[1..];

    if !left.is_empty() {
        let left_idx = build_recursive(points, left, depth + 1, nodes);
        nodes[node_idx].left = Some(left_idx);
    }
    if !right.is_empty() {
        let right_idx = build_recursive(points, right, depth + 1, nodes);
        nodes[node_idx].right = Some(right_idx);
    }

    node_idx
}
