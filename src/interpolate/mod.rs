//! Cubic and tetrahedral interpolators, specialized for dims 1..4, generic for >=5. See §4.5.

pub mod cubic;
pub mod tetrahedral;

use smallvec::SmallVec;

use crate::config::Method;

/// Dispatches to the interpolator selected at table creation, given the already-resolved
/// `2^I` corner color arrays (the `I <= 4` eager-population path; see [`tetrahedral::tetrahedral_lazy`]
/// for the `I >= 5` lazy-population path used directly by the dispatcher).
pub fn interpolate(
    method: Method,
    corners: &[&[u16]],
    fracs: &[i32],
    output_dims: usize,
) -> SmallVec<[u16; 8]> {
    match method {
        Method::Cubic => cubic::cubic_interpolate(corners, fracs, output_dims),
        Method::Tetrahedral => {
            if fracs.len() == 3 && output_dims == 4 {
                tetrahedral::tetrahedral3_fast(corners, fracs, output_dims)
            } else {
                tetrahedral::tetrahedral_fixed(corners, fracs, output_dims)
            }
        }
    }
}
