//! Connectivity enforcement for superpixel label maps
//!
//! Relabels every 4-connected component of a label as its own segment,
//! cuts components that grow past a maximum size and folds components
//! below a minimum size into an adjacent, already-labelled segment.

use segelm_core::raster::Neighborhood;
use segelm_core::NO_SEGMENT;
use std::collections::VecDeque;

/// Enforce single-region segments.
///
/// Pixels are visited in raster order. Each unvisited valid pixel starts a
/// breadth-first flood over 4-neighbors carrying the same input label,
/// stopping once the component holds `max_size` pixels. A finished
/// component smaller than `min_size` takes the label of the segment
/// adjacent to its start pixel, when there is one.
///
/// # Returns
/// Flat label vector with labels `0..S-1` ([`NO_SEGMENT`] on invalid pixels), and `S`
pub fn enforce_connectivity(
    labels: &[i32],
    valid: &[bool],
    rows: usize,
    cols: usize,
    min_size: usize,
    max_size: usize,
) -> (Vec<i32>, usize) {
    let n = rows * cols;
    let max_size = max_size.max(1);
    let mut out = vec![NO_SEGMENT; n];
    let mut next_label: i32 = 0;
    let mut queue: VecDeque<usize> = VecDeque::new();
    let mut component: Vec<usize> = Vec::new();

    for start in 0..n {
        if !valid[start] || out[start] != NO_SEGMENT {
            continue;
        }

        let label = labels[start];
        let (sr, sc) = (start / cols, start % cols);

        // Raster order guarantees any labelled neighbor was finished earlier
        let adjacent = Neighborhood::Rook3x3
            .neighbors(sr, sc, rows, cols)
            .map(|(r, c)| out[r * cols + c])
            .find(|&l| l != NO_SEGMENT);

        component.clear();
        queue.clear();
        out[start] = next_label;
        component.push(start);
        queue.push_back(start);

        while let Some(idx) = queue.pop_front() {
            let (r, c) = (idx / cols, idx % cols);
            for (nr, nc) in Neighborhood::Rook3x3.neighbors(r, c, rows, cols) {
                if component.len() >= max_size {
                    break;
                }
                let nidx = nr * cols + nc;
                if valid[nidx] && out[nidx] == NO_SEGMENT && labels[nidx] == label {
                    out[nidx] = next_label;
                    component.push(nidx);
                    queue.push_back(nidx);
                }
            }
        }

        match adjacent {
            Some(adj) if component.len() < min_size => {
                for &idx in &component {
                    out[idx] = adj;
                }
            }
            _ => next_label += 1,
        }
    }

    (out, next_label as usize)
}
