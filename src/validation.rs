//! Linearity validation of a mini-cube: does cubic interpolation at the center agree with the
//! evaluator within the configured error bound? See §4.4.

use smallvec::SmallVec;

use crate::corner_cache::CornerRef;
use crate::error::TableError;
use crate::evaluator::Evaluator;
use crate::grid::{CellFlags, Grid};

/// Recursively averages corner pairs to interpolate the mini-cube's exact center — equivalent
/// to cubic interpolation with every fraction fixed at the midpoint (half of `1 << FRACBITS`).
/// Unlike [`crate::interpolate::cubic`], this always uses the midpoint fraction and needs no
/// caller-supplied fractional offsets.
fn interpolate_center(corner_colors: &[&[u16]], output_dims: usize) -> SmallVec<[u32; 8]> {
    let mut work: Vec<SmallVec<[u32; 8]>> = corner_colors
        .iter()
        .map(|c| c.iter().map(|&v| v as u32).collect())
        .collect();
    while work.len() > 1 {
        let half = work.len() / 2;
        let mut next = Vec::with_capacity(half);
        for k in 0..half {
            let lo = &work[2 * k];
            let hi = &work[2 * k + 1];
            let mut out: SmallVec<[u32; 8]> = SmallVec::with_capacity(output_dims);
            for o in 0..output_dims {
                out.push((lo[o] + hi[o] + 1) / 2);
            }
            next.push(out);
        }
        work = next;
    }
    work.into_iter().next().unwrap_or_default()
}

/// Runs linearity validation for the mini-cube anchored at `corners[0]`, setting `CUBE_TESTED`
/// (and `CUBE_LINEAR` on success) on the anchor cell. Returns whether the mini-cube was judged
/// linear.
///
/// Precondition: every corner in `corners` is `COLOR_PRESENT` (the caller has already run
/// [`crate::population::ensure_mini_cube_corners`]).
#[allow(clippy::too_many_arguments)]
pub fn validate_mini_cube<E: Evaluator>(
    grid: &mut Grid,
    corners: &[CornerRef],
    floor_indices: &[i32],
    inc_indices: &[i32],
    base: &[f64],
    scale: &[f64],
    error_scale: &[f64],
    error_tolerance: f64,
    smoothness: f64,
    evaluator: &E,
    output_dims: usize,
) -> Result<bool, TableError<E::Error>> {
    let dims = floor_indices.len();

    if smoothness >= 1.0 || dims > 4 {
        // §4.4: >=1.0 "do not validate"; I >= 5 validation is skipped as cost-prohibitive.
        mark_anchor(grid, corners[0], true);
        return Ok(true);
    }

    let center_indices: SmallVec<[f64; 4]> = (0..dims)
        .map(|d| base[d] + scale[d] * (floor_indices[d] + inc_indices[d]) as f64 / 2.0)
        .collect();
    let true_center = evaluator
        .evaluate(&center_indices)
        .map_err(TableError::EvaluatorFailed)?;

    let corner_colors: Vec<SmallVec<[u16; 8]>> = corners
        .iter()
        .map(|&(row, idx)| grid.cell(row, idx).color.clone())
        .collect();
    let corner_refs: Vec<&[u16]> = corner_colors.iter().map(|c| c.as_slice()).collect();
    let interpolated = interpolate_center(&corner_refs, output_dims);

    let mut squared_error = 0.0f64;
    for o in 0..output_dims {
        let delta = interpolated[o] as f64 - true_center[o] as f64;
        let e = delta * error_scale[o];
        squared_error += e * e;
    }

    let linear = squared_error <= error_tolerance;
    if !linear {
        log::debug!(
            "mini-cube at {:?} failed linearity validation: squared error {:.4} > tolerance {:.4}",
            floor_indices,
            squared_error,
            error_tolerance
        );
    }
    mark_anchor(grid, corners[0], linear);
    Ok(linear)
}

/// Sets `CUBE_TESTED` (and `CUBE_LINEAR` iff `linear`) on `anchor` directly, for callers that
/// already know the verdict without running the full validation computation (the `I >= 5` /
/// `smoothness >= 1.0` "always linear" shortcuts in §4.4).
pub(crate) fn mark_anchor(grid: &mut Grid, anchor: CornerRef, linear: bool) {
    let cell = grid.cell_mut(anchor.0, anchor.1);
    cell.flags.insert(CellFlags::CUBE_TESTED);
    if linear {
        cell.flags.insert(CellFlags::CUBE_LINEAR);
    } else {
        cell.flags.remove(CellFlags::CUBE_LINEAR);
    }
}
