//! Multilinear ("cubic" in the original's terminology — trilinear for I=3) interpolation.
//! See §4.5.

use smallvec::SmallVec;

use crate::numeric::FRACBITS;

/// Interpolates one output component across the `2^I` corners of a mini-cube, given the
/// fractional offsets for each dimension (`0..=256`, with `256` only ever appearing as the
/// implicit "top" of a pass — corner values themselves are always driven by `0..255`).
///
/// `corners` must be ordered so that corner `k`'s bit `j` selects floor (`0`) vs floor+1 (`1`)
/// in dimension `j`; `fracs[0]` is consumed first, halving the working set each pass, exactly
/// as §4.5 describes: "first along dimension 0 ... then along dimension 1, and so on".
///
/// For `I <= 4` the full `256^I` scale fits comfortably in `i64`, so rounding is deferred to
/// the single final step (the "extra 8 bits of precision" the spec calls out). The generic
/// `I >= 5` path instead rounds after every pass to keep the running product within `i64` —
/// cubic interpolation is the rare case for those dimensions regardless (§4.2 prefers
/// tetrahedral corner-lazy population there).
pub fn cubic_component_specialized(corners: &[u16], fracs: &[i32]) -> u16 {
    debug_assert_eq!(corners.len(), 1 << fracs.len());
    debug_assert!(fracs.len() <= 4);
    let mut work: SmallVec<[i64; 16]> = corners.iter().map(|&v| v as i64).collect();
    for &f in fracs {
        let half = work.len() / 2;
        let one = 1i64 << FRACBITS;
        for k in 0..half {
            let lo = work[2 * k];
            let hi = work[2 * k + 1];
            work[k] = lo * (one - f as i64) + hi * f as i64;
        }
        work.truncate(half);
    }
    let scale = 1i64 << (FRACBITS as u32 * fracs.len() as u32);
    (((work[0] + scale / 2) / scale) as u16).min(u16::MAX)
}

pub fn cubic_component_generic(corners: &[u16], fracs: &[i32]) -> u16 {
    debug_assert_eq!(corners.len(), 1 << fracs.len());
    let mut work: SmallVec<[i64; 16]> = corners.iter().map(|&v| v as i64).collect();
    let one = 1i64 << FRACBITS;
    for &f in fracs {
        let half = work.len() / 2;
        for k in 0..half {
            let lo = work[2 * k];
            let hi = work[2 * k + 1];
            let acc = lo * (one - f as i64) + hi * f as i64;
            work[k] = (acc + (1 << (FRACBITS - 1))) >> FRACBITS;
        }
        work.truncate(half);
    }
    work[0].clamp(0, u16::MAX as i64) as u16
}

/// Interpolates every output component, dispatching to the exact-precision path for `I <= 4`
/// and the per-pass-rounded generic path otherwise.
pub fn cubic_interpolate(
    corners: &[&[u16]],
    fracs: &[i32],
    output_dims: usize,
) -> SmallVec<[u16; 8]> {
    let dims = fracs.len();
    let mut out = SmallVec::with_capacity(output_dims);
    for o in 0..output_dims {
        let component_corners: SmallVec<[u16; 16]> = corners.iter().map(|c| c[o]).collect();
        let value = if dims <= 4 {
            cubic_component_specialized(&component_corners, fracs)
        } else {
            cubic_component_generic(&component_corners, fracs)
        };
        out.push(value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_at_grid_points_with_zero_fraction() {
        let corners = [0u16, 100];
        assert_eq!(cubic_component_specialized(&corners, &[0]), 0);
    }

    #[test]
    fn exact_at_grid_points_with_full_fraction() {
        let corners = [0u16, 100];
        let one = 1 << FRACBITS;
        assert_eq!(cubic_component_specialized(&corners, &[one]), 100);
    }

    #[test]
    fn midpoint_averages_the_two_endpoints() {
        let corners = [0u16, 256];
        let half = 1 << (FRACBITS - 1);
        assert_eq!(cubic_component_specialized(&corners, &[half]), 128);
    }

    #[test]
    fn two_d_bilinear_matches_iterated_linear_interpolation() {
        // Corners ordered bit0=x, bit1=y: (0,0)=0 (1,0)=100 (0,1)=200 (1,1)=300.
        let corners = [0u16, 100, 200, 300];
        let one = 1 << FRACBITS;
        let half = one / 2;
        let value = cubic_component_specialized(&corners, &[half, half]);
        // Interpolating x first at each y, then y: (0+100)/2=50, (200+300)/2=250, then (50+250)/2=150.
        assert_eq!(value, 150);
    }

    #[test]
    fn generic_path_matches_specialized_path_closely() {
        let corners = [10u16, 20, 30, 40];
        let fracs = [64, 192];
        let specialized = cubic_component_specialized(&corners, &fracs);
        let generic = cubic_component_generic(&corners, &fracs);
        assert!((specialized as i32 - generic as i32).abs() <= 1);
    }
}
