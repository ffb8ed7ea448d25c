//! Pixel connectivity patterns

const ROOK: [(isize, isize); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];
const QUEEN: [(isize, isize); 8] = [(-1, -1), (-1, 0), (-1, 1), (0, -1), (0, 1), (1, -1), (1, 0), (1, 1)];

/// Which pixels count as adjacent to a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighborhood {
    /// 8-connectivity
    Queen3x3,
    /// 4-connectivity; segments are contiguous under this pattern
    Rook3x3,
}

impl Neighborhood {
    /// Relative positions of the neighbors, excluding the center, in raster order
    pub fn offsets(&self) -> &'static [(isize, isize)] {
        match self {
            Neighborhood::Queen3x3 => &QUEEN,
            Neighborhood::Rook3x3 => &ROOK,
        }
    }

    /// In-bounds neighbors of (row, col) in a `rows x cols` grid
    pub fn neighbors(&self, row: usize, col: usize, rows: usize, cols: usize) -> impl Iterator<Item = (usize, usize)> {
        self.offsets().iter().filter_map(move |&(dr, dc)| {
            let nr = row.checked_add_signed(dr)?;
            let nc = col.checked_add_signed(dc)?;
            (nr < rows && nc < cols).then_some((nr, nc))
        })
    }
}
