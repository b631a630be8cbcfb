//! Lazy population of grid cells and mini-cube corner assembly. See §4.2.

use smallvec::SmallVec;

use crate::corner_cache::CornerRef;
use crate::error::TableError;
use crate::evaluator::Evaluator;
use crate::grid::{CellFlags, Grid, LeafRowId};
use crate::numeric::increment_and_clip;

/// Maps grid indices to the evaluator's input color: `input[d] = base[d] + scale[d] * index[d]`.
pub fn index_to_input(indices: &[i32], base: &[f64], scale: &[f64]) -> SmallVec<[f64; 4]> {
    indices
        .iter()
        .zip(base.iter())
        .zip(scale.iter())
        .map(|((&idx, &b), &s)| b + s * idx as f64)
        .collect()
}

/// Evaluates and stores the output color for a single cell. Precondition: `COLOR_PRESENT` is
/// clear (checked by the caller, since locating the cell is otherwise a no-op on a hit).
pub fn populate_cell<E: Evaluator>(
    grid: &mut Grid,
    row: LeafRowId,
    cell_index: usize,
    indices: &[i32],
    base: &[f64],
    scale: &[f64],
    evaluator: &E,
) -> Result<(), TableError<E::Error>> {
    crate::profile!("populate_cell");
    let input = index_to_input(indices, base, scale);
    log::trace!("populating grid cell at indices {:?}", indices);
    let color = evaluator.evaluate(&input).map_err(TableError::EvaluatorFailed)?;
    let cell = grid.cell_mut(row, cell_index);
    cell.color = color;
    cell.flags.insert(CellFlags::COLOR_PRESENT);
    Ok(())
}

/// Ensures every corner of the mini-cube anchored at `floor_indices` exists and is populated,
/// returning the `2^I` corner references in the fixed per-dimension ordering (corner `k`'s
/// bit `j` selects floor vs floor+1 in dimension `j`).
///
/// For `I <= 4` every corner is populated eagerly via the Gray-code corner walk (§4.2); for
/// `I >= 5`, callers instead use [`ensure_corner`] directly to populate only the corners their
/// interpolator actually references.
pub fn ensure_mini_cube_corners<E: Evaluator>(
    grid: &mut Grid,
    floor_indices: &[i32],
    inc_indices: &[i32],
    base: &[f64],
    scale: &[f64],
    evaluator: &E,
    output_dims: usize,
) -> Result<SmallVec<[CornerRef; 16]>, TableError<E::Error>> {
    let dims = floor_indices.len();
    let n = 1usize << dims;
    let mut corners: SmallVec<[CornerRef; 16]> = SmallVec::with_capacity(n);

    // tmp_indices/tmp_inc walk the mini-cube via the same index/inc-index swap algorithm as
    // gst_getInterpolateColorsN: exactly one component changes per step, and the innermost
    // dimension (0) is handled as a pair so the leaf row is touched once per two corners.
    let mut tmp_indices: SmallVec<[i32; 4]> = floor_indices.into();
    let mut tmp_inc: SmallVec<[i32; 4]> = inc_indices.into();
    let preserve = Some((floor_indices, inc_indices));

    for i in (0..n).step_by(2) {
        let corner = ensure_corner(grid, &tmp_indices, base, scale, evaluator, output_dims, preserve)?;
        corners.push(corner);

        tmp_indices[0] = tmp_inc[0];
        let corner = ensure_corner(grid, &tmp_indices, base, scale, evaluator, output_dims, preserve)?;
        corners.push(corner);
        tmp_indices[0] = floor_indices[0];

        if n > 2 {
            let mut ip1 = ((i + 2) & (n - 1)) ^ 1;
            let ips_start = 2usize;
            let mut ips = ips_start;
            let mut j = 1usize;
            loop {
                std::mem::swap(&mut tmp_indices[j], &mut tmp_inc[j]);
                j += 1;
                ip1 ^= ips;
                ips <<= 1;
                if ip1 == i + 1 {
                    break;
                }
            }
        }
    }

    Ok(corners)
}

/// Locates (allocating/populating if necessary) a single corner of a mini-cube.
///
/// `preserve` names the mini-cube currently being assembled (`(floor_indices, inc_indices)`),
/// so that if the grid is over budget, the self-purge retry below can reclaim unrelated
/// least-recently-used rows without evicting a corner this very call is in the middle of
/// populating.
pub fn ensure_corner<E: Evaluator>(
    grid: &mut Grid,
    indices: &[i32],
    base: &[f64],
    scale: &[f64],
    evaluator: &E,
    output_dims: usize,
    preserve: Option<(&[i32], &[i32])>,
) -> Result<CornerRef, TableError<E::Error>> {
    let mut located = grid.locate_cell(indices, true, output_dims);
    if located.is_none() {
        // Allocation failed: release is attempted before OutOfMemory is surfaced (§7), purging
        // the table's own least-recently-used rows outside the mini-cube under construction.
        grid.purge_lru(0.5, preserve);
        located = grid.locate_cell(indices, true, output_dims);
    }
    let (row, cell_index) = located.ok_or(TableError::OutOfMemory {
        requested_bytes: 0,
    })?;
    if !grid.cell(row, cell_index).is_present() {
        populate_cell(grid, row, cell_index, indices, base, scale, evaluator)?;
    }
    Ok((row, cell_index))
}

/// Derives the mini-cube's anchor (floor) and incremented (floor+1, clamped) index vectors
/// from a scaled input color, per §3's `MiniCube` definition.
pub fn anchor_indices(indices: &[i32], max_index: i32) -> SmallVec<[i32; 4]> {
    indices
        .iter()
        .map(|&idx| increment_and_clip(idx, max_index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::convert::Infallible;

    struct IdentityEvaluator;

    impl Evaluator for IdentityEvaluator {
        type Error = Infallible;
        fn evaluate(&self, input: &[f64]) -> Result<SmallVec<[u16; 8]>, Infallible> {
            Ok(input.iter().map(|&v| v as u16).collect())
        }
    }

    struct CountingEvaluator(Cell<u32>);

    impl Evaluator for CountingEvaluator {
        type Error = Infallible;
        fn evaluate(&self, input: &[f64]) -> Result<SmallVec<[u16; 8]>, Infallible> {
            self.0.set(self.0.get() + 1);
            Ok(input.iter().map(|&v| v as u16).collect())
        }
    }

    #[test]
    fn index_to_input_applies_base_and_scale() {
        let input = index_to_input(&[2, 3], &[10.0, -5.0], &[0.5, 2.0]);
        assert_eq!(input.as_slice(), &[11.0, 1.0]);
    }

    #[test]
    fn populate_cell_stores_the_evaluated_color_and_sets_the_flag() {
        let mut grid = Grid::new(1, 8, None, 1);
        let (row, idx) = grid.locate_cell(&[3], true, 1).unwrap();
        assert!(!grid.cell(row, idx).is_present());

        let evaluator = IdentityEvaluator;
        populate_cell(&mut grid, row, idx, &[3], &[0.0], &[1.0], &evaluator).unwrap();

        let cell = grid.cell(row, idx);
        assert!(cell.is_present());
        assert_eq!(cell.color.as_slice(), &[3]);
    }

    #[test]
    fn ensure_corner_only_evaluates_once_per_cell() {
        let mut grid = Grid::new(1, 8, None, 1);
        let evaluator = CountingEvaluator(Cell::new(0));
        ensure_corner(&mut grid, &[5], &[0.0], &[1.0], &evaluator, 1, None).unwrap();
        ensure_corner(&mut grid, &[5], &[0.0], &[1.0], &evaluator, 1, None).unwrap();
        assert_eq!(evaluator.0.get(), 1);
    }

    #[test]
    fn ensure_mini_cube_corners_visits_every_corner_in_bit_order() {
        let mut grid = Grid::new(2, 8, None, 2);
        let floor = [2, 3];
        let inc = [3, 4];
        let evaluator = IdentityEvaluator;
        let corners =
            ensure_mini_cube_corners(&mut grid, &floor, &inc, &[0.0, 0.0], &[1.0, 1.0], &evaluator, 2)
                .unwrap();

        let expected = [[2, 3], [3, 3], [2, 4], [3, 4]];
        assert_eq!(corners.len(), expected.len());
        for (k, &(row, idx)) in corners.iter().enumerate() {
            let color = &grid.cell(row, idx).color;
            assert_eq!(
                color.as_slice(),
                &[expected[k][0] as u16, expected[k][1] as u16],
                "corner {k} mismatch"
            );
        }
    }

    #[test]
    fn anchor_indices_clips_at_the_upper_face() {
        let inc = anchor_indices(&[4, 9, 10], 10);
        assert_eq!(inc.as_slice(), &[5, 10, 10]);
    }
}
