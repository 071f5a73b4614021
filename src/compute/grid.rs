//! Conversions between linear cell indices and (column, row) coordinates.
//!
//! Cells are stored row-major: `index = row * columns + col`.

use crate::schema::GridConfig;

/// Convert a linear index to `(col, row)`.
#[inline]
pub fn to_2d(position: usize, columns: usize) -> (usize, usize) {
    (position % columns, position / columns)
}

/// Convert `(col, row)` to a linear index.
#[inline]
pub fn to_1d(col: usize, row: usize, columns: usize) -> usize {
    row * columns + col
}

/// Check whether signed coordinates fall inside the grid.
#[inline]
pub fn in_bounds(col: i64, row: i64, grid: &GridConfig) -> bool {
    0 <= col && col < grid.columns as i64 && 0 <= row && row < grid.rows as i64
}

/// Linear index of the cell at `(d_col, d_row)` from `position`, or `None`
/// if that cell lies outside the grid.
pub fn neighbor(position: usize, d_col: i64, d_row: i64, grid: &GridConfig) -> Option<usize> {
    let (col, row) = to_2d(position, grid.columns);
    let col = col as i64 + d_col;
    let row = row as i64 + d_row;

    if in_bounds(col, row, grid) {
        Some(to_1d(col as usize, row as usize, grid.columns))
    } else {
        None
    }
}
