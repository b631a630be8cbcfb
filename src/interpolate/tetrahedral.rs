//! Tetrahedral (simplex) interpolation: select the `I+1` corners of the tetrahedron
//! containing the input and interpolate barycentrically. See §4.5.

use smallvec::SmallVec;

use crate::numeric::FRACBITS;

const ONE: i32 = 1 << FRACBITS;

/// Sorts `fracs` into descending order, returning `(sorted_fracs, dim_order)` where
/// `dim_order[k]` is the original dimension index of the k-th largest fraction. Zero
/// fractions naturally sort to the end (§4.5's "zero fractions are sorted to the end and
/// skipped").
fn sort_descending(fracs: &[i32]) -> (SmallVec<[i32; 16]>, SmallVec<[usize; 16]>) {
    let mut order: SmallVec<[usize; 16]> = (0..fracs.len()).collect();
    order.sort_by(|&a, &b| fracs[b].cmp(&fracs[a]));
    let sorted = order.iter().map(|&d| fracs[d]).collect();
    (sorted, order)
}

/// Computes the `I+1` barycentric face weights for a sorted fraction list: the difference
/// between consecutive sorted fractions, with an implicit `ONE` at the top and `0` at the
/// bottom. Weights sum to `ONE`.
fn face_weights(sorted: &[i32]) -> SmallVec<[i32; 17]> {
    let mut faces: SmallVec<[i32; 17]> = SmallVec::with_capacity(sorted.len() + 1);
    faces.push(ONE - sorted.first().copied().unwrap_or(0));
    for w in sorted.windows(2) {
        faces.push(w[0] - w[1]);
    }
    if let Some(&last) = sorted.last() {
        faces.push(last);
    }
    faces
}

/// Walks the path from the anchor (all-floor corner, bitmask `0`) to the far corner
/// (all-floor+1, bitmask `2^I - 1`), flipping one bit per step in descending-fraction order.
/// Returns the `I+1` corner bitmasks visited, in path order.
fn corner_path(dim_order: &[usize]) -> SmallVec<[u32; 17]> {
    let mut path: SmallVec<[u32; 17]> = SmallVec::with_capacity(dim_order.len() + 1);
    let mut mask = 0u32;
    path.push(mask);
    for &d in dim_order {
        mask |= 1 << d;
        path.push(mask);
    }
    path
}

/// Interpolates across an already fully-populated `2^I` corner array (the `I <= 4` eager
/// path). `corners[k]` must be ordered so that bit `j` of `k` selects floor vs floor+1 in
/// dimension `j`, matching [`crate::population::ensure_mini_cube_corners`]'s output order.
pub fn tetrahedral_fixed(
    corners: &[&[u16]],
    fracs: &[i32],
    output_dims: usize,
) -> SmallVec<[u16; 8]> {
    let (sorted, order) = sort_descending(fracs);
    let faces = face_weights(&sorted);
    let path = corner_path(&order);
    accumulate(
        path.iter().map(|&mask| corners[mask as usize]),
        &faces,
        output_dims,
    )
}

/// Exact translation of the original engine's unrolled 3-D tetrahedral fast path: the six
/// tetrahedra selected by the three pairwise comparisons `xf` vs `yf` vs `zf`, with vertex
/// sets `{0,1,3,7}`, `{0,1,5,7}`, `{0,4,5,7}`, `{0,4,6,7}`, `{0,2,6,7}`, `{0,2,3,7}` (corner
/// bit 0 = x, bit 1 = y, bit 2 = z). Kept alongside [`tetrahedral_fixed`] (which computes the
/// same selection generically) as the "entire per-pixel critical path ... written as a single
/// contiguous routine" specialization named in §4.5.
pub fn tetrahedral3_fast(corners: &[&[u16]], fracs: &[i32], output_dims: usize) -> SmallVec<[u16; 8]> {
    debug_assert_eq!(fracs.len(), 3);
    debug_assert_eq!(corners.len(), 8);
    let (xf, yf, zf) = (fracs[0], fracs[1], fracs[2]);

    let (faces, verts): ([i32; 4], [usize; 4]) = if xf >= yf {
        if yf >= zf {
            // xf >= yf >= zf
            ([ONE - xf, xf - yf, yf - zf, zf], [0, 1, 3, 7])
        } else if xf >= zf {
            // xf >= zf > yf
            ([ONE - xf, xf - zf, zf - yf, yf], [0, 1, 5, 7])
        } else {
            // zf > xf >= yf
            ([ONE - zf, zf - xf, xf - yf, yf], [0, 4, 5, 7])
        }
    } else if zf >= yf {
        // zf > yf > xf
        ([ONE - zf, zf - yf, yf - xf, xf], [0, 4, 6, 7])
    } else if zf >= xf {
        // yf >= zf > xf
        ([ONE - yf, yf - zf, zf - xf, xf], [0, 2, 6, 7])
    } else {
        // yf > xf >= zf
        ([ONE - yf, yf - xf, xf - zf, zf], [0, 2, 3, 7])
    };

    accumulate(verts.iter().map(|&v| corners[v]), &faces, output_dims)
}

/// Weighted sum `Σ face[k] * corner[k]`, rounded once at the end (faces sum to `ONE`).
fn accumulate<'a>(
    corners: impl Iterator<Item = &'a [u16]>,
    faces: &[i32],
    output_dims: usize,
) -> SmallVec<[u16; 8]> {
    let mut acc: SmallVec<[i64; 8]> = SmallVec::from_elem(0, output_dims);
    for (corner, &face) in corners.zip(faces.iter()) {
        if face == 0 {
            continue;
        }
        for o in 0..output_dims {
            acc[o] += corner[o] as i64 * face as i64;
        }
    }
    acc.into_iter()
        .map(|v| (((v + ONE as i64 / 2) / ONE as i64).clamp(0, u16::MAX as i64)) as u16)
        .collect()
}

/// `I >= 5` lazy path: given a closure that ensures (populating if necessary) the output color
/// for an arbitrary corner bitmask, walks only the `I + 1` corners the tetrahedron needs,
/// skipping any corner preceded by a zero face weight (§4.5's zero-fraction skip).
pub fn tetrahedral_lazy<F, Err>(
    fracs: &[i32],
    output_dims: usize,
    mut ensure_corner: F,
) -> Result<SmallVec<[u16; 8]>, Err>
where
    F: FnMut(u32) -> Result<SmallVec<[u16; 8]>, Err>,
{
    let (sorted, order) = sort_descending(fracs);
    let faces = face_weights(&sorted);
    let path = corner_path(&order);

    let mut acc: SmallVec<[i64; 8]> = SmallVec::from_elem(0, output_dims);
    for (&mask, &face) in path.iter().zip(faces.iter()) {
        if face == 0 {
            continue;
        }
        let color = ensure_corner(mask)?;
        for o in 0..output_dims {
            acc[o] += color[o] as i64 * face as i64;
        }
    }
    Ok(acc
        .into_iter()
        .map(|v| (((v + ONE as i64 / 2) / ONE as i64).clamp(0, u16::MAX as i64)) as u16)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corners_identity() -> Vec<Vec<u16>> {
        // Corner k's output just echoes its own bitmask, per component, so any interpolation
        // result can be checked against the barycentric weights directly.
        (0..8).map(|k| vec![k as u16, (k * 2) as u16, (k * 3) as u16, 0]).collect()
    }

    #[test]
    fn face_weights_sum_to_one() {
        let (sorted, _order) = sort_descending(&[200, 50, 10]);
        let faces = face_weights(&sorted);
        assert_eq!(faces.iter().sum::<i32>(), ONE);
    }

    #[test]
    fn corner_path_starts_at_anchor_and_ends_at_far_corner() {
        let (_sorted, order) = sort_descending(&[200, 50, 10]);
        let path = corner_path(&order);
        assert_eq!(*path.first().unwrap(), 0);
        assert_eq!(*path.last().unwrap(), 0b111);
        assert_eq!(path.len(), 4);
    }

    #[test]
    fn tetrahedral_fixed_matches_tetrahedral3_fast_for_every_ordering() {
        let corners_owned = corners_identity();
        let corners: Vec<&[u16]> = corners_owned.iter().map(|c| c.as_slice()).collect();
        let cases = [
            [200, 100, 50],
            [100, 200, 50],
            [50, 200, 100],
            [50, 100, 200],
            [100, 50, 200],
            [200, 50, 100],
        ];
        for fracs in cases {
            let fast = tetrahedral3_fast(&corners, &fracs, 4);
            let generic = tetrahedral_fixed(&corners, &fracs, 4);
            assert_eq!(fast, generic, "mismatch for fracs {:?}", fracs);
        }
    }

    #[test]
    fn identity_at_the_anchor_corner() {
        let corners_owned = corners_identity();
        let corners: Vec<&[u16]> = corners_owned.iter().map(|c| c.as_slice()).collect();
        let value = tetrahedral_fixed(&corners, &[0, 0, 0], 4);
        assert_eq!(value.as_slice(), &[0, 0, 0, 0]);
    }

    #[test]
    fn identity_at_the_far_corner() {
        let corners_owned = corners_identity();
        let corners: Vec<&[u16]> = corners_owned.iter().map(|c| c.as_slice()).collect();
        let one = ONE;
        let value = tetrahedral_fixed(&corners, &[one, one, one], 4);
        assert_eq!(value.as_slice(), &[7, 14, 21, 0]);
    }

    #[test]
    fn lazy_path_matches_eager_path() {
        let corners_owned = corners_identity();
        let fracs = [200, 50, 10];
        let corners: Vec<&[u16]> = corners_owned.iter().map(|c| c.as_slice()).collect();
        let eager = tetrahedral_fixed(&corners, &fracs, 4);

        let lazy = tetrahedral_lazy::<_, std::convert::Infallible>(&fracs, 4, |mask| {
            Ok(corners_owned[mask as usize].clone().into())
        })
        .unwrap();
        assert_eq!(eager, lazy);
    }
}
