//! Per-input-color lookup: compute indices, consult caches, dispatch the interpolator. See §4.6.

use std::sync::atomic::Ordering;

use smallvec::SmallVec;

use crate::config::{Concurrency, Method};
use crate::error::TableError;
use crate::evaluator::Evaluator;
use crate::grid::CellFlags;
use crate::numeric::{increment_and_clip, split_index};
use crate::population;
use crate::table::{TableInner, TableState};
use crate::{interpolate, validation};

/// `Convert` from §4.6: converts `inputs` (flattened `ncolors * dims` scaled components) into
/// `outputs` (flattened `ncolors * output_dims` device-level components).
pub(crate) fn convert<E>(
    inner: &TableInner<E>,
    inputs: &[i32],
    outputs: &mut [u16],
) -> Result<(), TableError<E::Error>>
where
    E: Evaluator,
{
    crate::profile!("convert");
    let dims = inner.dims;
    let output_dims = inner.output_dims;
    assert_eq!(inputs.len() % dims, 0, "inputs length must be a multiple of input_dims");
    let ncolors = inputs.len() / dims;
    assert_eq!(outputs.len(), ncolors * output_dims, "outputs length must match ncolors * output_dims");

    inner.being_used.store(true, Ordering::Release);
    let _registry_guard = if inner.concurrency == Concurrency::BackEnd {
        Some(inner.state.lock())
    } else {
        None
    };

    let result = (|| {
        let mut state = if let Some(guard) = _registry_guard {
            guard
        } else {
            inner.state.lock()
        };
        for pixel in 0..ncolors {
            let input = &inputs[pixel * dims..(pixel + 1) * dims];
            let out = &mut outputs[pixel * output_dims..(pixel + 1) * output_dims];
            match convert_one(inner, &mut state, input) {
                Ok(color) => out.copy_from_slice(&color),
                Err(e) => {
                    state.dispatcher.invalidate();
                    return Err(e);
                }
            }
        }
        Ok(())
    })();

    inner.being_used.store(false, Ordering::Release);
    result
}

/// Runs the 8-step algorithm of §4.6 for a single pixel, returning its output color.
fn convert_one<E>(
    inner: &TableInner<E>,
    state: &mut TableState,
    input: &[i32],
) -> Result<SmallVec<[u16; 8]>, TableError<E::Error>>
where
    E: Evaluator,
{
    let dims = inner.dims;
    let output_dims = inner.output_dims;

    // Step 1: previous-input shortcut.
    if state.dispatcher.last_input.as_deref() == Some(input) {
        return Ok(state.dispatcher.last_output.clone());
    }

    // Step 2: derive indices and fractional offsets.
    let mut indices: SmallVec<[i32; 4]> = SmallVec::with_capacity(dims);
    let mut fracs: SmallVec<[i32; 4]> = SmallVec::with_capacity(dims);
    for &component in input {
        let (idx, frac) = split_index(component);
        indices.push(idx.clamp(0, inner.max_index));
        fracs.push(frac);
    }
    let inc_indices: SmallVec<[i32; 4]> = indices
        .iter()
        .map(|&idx| increment_and_clip(idx, inner.max_index))
        .collect();

    let indices_changed = indices.as_slice() != state.dispatcher.last_indices.as_slice();

    let output = if dims <= 4 {
        convert_eager(
            inner,
            state,
            &indices,
            &inc_indices,
            &fracs,
            indices_changed,
        )?
    } else {
        convert_lazy(inner, state, &indices, &inc_indices, &fracs)?
    };

    // Step 8: shadow-copy for the next call.
    state.dispatcher.last_input = Some(input.into());
    state.dispatcher.last_indices = indices;
    state.dispatcher.last_inc_indices = inc_indices;
    state.dispatcher.last_fracs = fracs;
    state.dispatcher.last_output = output.clone();

    Ok(output)
}

/// The `I <= 4` path: corner-pointer cache plus eager `2^I`-corner population.
fn convert_eager<E>(
    inner: &TableInner<E>,
    state: &mut TableState,
    indices: &[i32],
    inc_indices: &[i32],
    fracs: &[i32],
    indices_changed: bool,
) -> Result<SmallVec<[u16; 8]>, TableError<E::Error>>
where
    E: Evaluator,
{
    // Step 3: reuse the dispatcher's cached corner pointers if the anchor hasn't moved.
    let mut corners = if !indices_changed {
        state.dispatcher.last_corners.clone()
    } else {
        None
    };

    let cache_enabled = state.cache.is_enabled();
    let (id, hash) = if cache_enabled {
        state.cache.encode(indices)
    } else {
        (0, 0)
    };

    // Step 4: probe the corner-pointer cache on a cache-capable miss.
    if corners.is_none() && cache_enabled {
        if let Some(hit) = state.cache.probe(id, hash) {
            corners = Some(hit.clone());
            #[cfg(feature = "metrics")]
            state.metrics.record_cache_hit();
        } else {
            #[cfg(feature = "metrics")]
            state.metrics.record_cache_miss();
        }
    }

    // Step 5: ensure the mini-cube's corners exist, then fill the cache.
    let corners = match corners {
        Some(c) => c,
        None => {
            #[cfg(feature = "metrics")]
            state.metrics.record_populate_call();
            let c = population::ensure_mini_cube_corners(
                &mut state.grid,
                indices,
                inc_indices,
                &inner.base,
                &inner.scale,
                &inner.evaluator,
                inner.output_dims,
            )?;
            if cache_enabled {
                state.cache.fill(hash, id, c.clone());
            }
            c
        }
    };

    // Step 6: validate linearity if not already tested.
    let anchor = corners[0];
    let already_tested = state
        .grid
        .cell(anchor.0, anchor.1)
        .flags
        .contains(CellFlags::CUBE_TESTED);
    if !already_tested {
        #[allow(unused_variables)]
        let linear = validation::validate_mini_cube(
            &mut state.grid,
            &corners,
            indices,
            inc_indices,
            &inner.base,
            &inner.scale,
            &inner.error_scale,
            inner.error_tolerance,
            inner.smoothness,
            &inner.evaluator,
            inner.output_dims,
        )?;
        #[cfg(feature = "metrics")]
        state.metrics.record_validation(linear);
    }

    // Step 7: interpolate.
    let corner_colors: SmallVec<[SmallVec<[u16; 8]>; 16]> = corners
        .iter()
        .map(|&(row, idx)| state.grid.cell(row, idx).color.clone())
        .collect();
    let corner_refs: SmallVec<[&[u16]; 16]> = corner_colors.iter().map(|c| c.as_slice()).collect();
    let output = interpolate::interpolate(inner.method, &corner_refs, fracs, inner.output_dims);

    state.dispatcher.last_corners = Some(corners);
    state.dispatcher.last_hash = hash;
    state.dispatcher.last_id = id;
    Ok(output)
}

/// The `I >= 5` path: no corner-pointer cache, corners populated lazily as the interpolator
/// needs them (§4.2's "do NOT eagerly populate all `2^I` corners").
fn convert_lazy<E>(
    inner: &TableInner<E>,
    state: &mut TableState,
    indices: &[i32],
    inc_indices: &[i32],
    fracs: &[i32],
) -> Result<SmallVec<[u16; 8]>, TableError<E::Error>>
where
    E: Evaluator,
{
    state.dispatcher.last_corners = None;

    match inner.method {
        Method::Cubic => {
            #[cfg(feature = "metrics")]
            state.metrics.record_populate_call();
            let corners = population::ensure_mini_cube_corners(
                &mut state.grid,
                indices,
                inc_indices,
                &inner.base,
                &inner.scale,
                &inner.evaluator,
                inner.output_dims,
            )?;
            let anchor = corners[0];
            if !state
                .grid
                .cell(anchor.0, anchor.1)
                .flags
                .contains(CellFlags::CUBE_TESTED)
            {
                #[allow(unused_variables)]
                let linear = validation::validate_mini_cube(
                    &mut state.grid,
                    &corners,
                    indices,
                    inc_indices,
                    &inner.base,
                    &inner.scale,
                    &inner.error_scale,
                    inner.error_tolerance,
                    inner.smoothness,
                    &inner.evaluator,
                    inner.output_dims,
                )?;
                #[cfg(feature = "metrics")]
                state.metrics.record_validation(linear);
            }
            let corner_colors: SmallVec<[SmallVec<[u16; 8]>; 16]> = corners
                .iter()
                .map(|&(row, idx)| state.grid.cell(row, idx).color.clone())
                .collect();
            let corner_refs: SmallVec<[&[u16]; 16]> =
                corner_colors.iter().map(|c| c.as_slice()).collect();
            Ok(interpolate::interpolate(
                inner.method,
                &corner_refs,
                fracs,
                inner.output_dims,
            ))
        }
        Method::Tetrahedral => {
            // The anchor (bitmask 0) is walked first by the tetrahedral path, but is skipped
            // entirely if its face weight is zero; mark it tested regardless, since the
            // mini-cube's validity flags live on the anchor cell irrespective of whether the
            // selected tetrahedron actually uses it.
            let mut anchor_located = state.grid.locate_cell(indices, true, inner.output_dims);
            if anchor_located.is_none() {
                state.grid.purge_lru(0.5, Some((indices, inc_indices)));
                anchor_located = state.grid.locate_cell(indices, true, inner.output_dims);
            }
            let (anchor_row, anchor_idx) =
                anchor_located.ok_or(TableError::OutOfMemory { requested_bytes: 0 })?;
            if !state
                .grid
                .cell(anchor_row, anchor_idx)
                .flags
                .contains(CellFlags::CUBE_TESTED)
            {
                // I >= 5: validation is skipped outright and CUBE_LINEAR set unconditionally.
                validation::mark_anchor(&mut state.grid, (anchor_row, anchor_idx), true);
                #[cfg(feature = "metrics")]
                state.metrics.record_validation(true);
            }
            #[cfg(feature = "metrics")]
            state.metrics.record_populate_call();

            let grid = &mut state.grid;
            let base = &inner.base;
            let scale = &inner.scale;
            let evaluator = &inner.evaluator;
            let output_dims = inner.output_dims;
            interpolate::tetrahedral::tetrahedral_lazy(fracs, output_dims, |mask| {
                let mut corner_indices: SmallVec<[i32; 4]> = SmallVec::with_capacity(indices.len());
                for d in 0..indices.len() {
                    corner_indices.push(if mask & (1 << d) != 0 {
                        inc_indices[d]
                    } else {
                        indices[d]
                    });
                }
                let corner = population::ensure_corner(
                    grid,
                    &corner_indices,
                    base,
                    scale,
                    evaluator,
                    output_dims,
                    Some((indices, inc_indices)),
                )?;
                Ok(grid.cell(corner.0, corner.1).color.clone())
            })
        }
    }
}
