//! Two-tier low-memory handler: collapse the corner-pointer cache, then purge LRU leaf rows.
//! See §4.7.

use crate::corner_cache::CornerPtrCache;
use crate::grid::Grid;

/// Dispatcher scratch that the low-memory handler needs to read/update: the last-probed hash
/// (to preserve the in-use cache entry) and the anchor's floor/incremented indices (to protect
/// in-use grid cells during a preserving purge).
pub struct PurgeContext<'a> {
    pub last_hash: Option<u32>,
    pub floor_indices: Option<&'a [i32]>,
    pub inc_indices: Option<&'a [i32]>,
}

/// Tier 1: collapse the corner-pointer cache to its single-slot fallback. Returns `true` if
/// the cache was actually collapsed (i.e. it had more than one slot beforehand).
pub fn collapse_cache(cache: &mut CornerPtrCache, ctx: &PurgeContext) -> bool {
    if !cache.is_enabled() {
        return false;
    }
    cache.collapse(ctx.last_hash);
    true
}

/// Tier 2: purge LRU leaf rows to recover a `fraction` of currently-allocated leaf rows.
/// `preserve` mirrors the front-end "beingUsed" protection (§4.7): when set, the in-flight
/// mini-cube's corners (and their ancestor subarrays) are protected and `CUBE_TESTED` is
/// cleared broadly on survivors instead of wiping the whole cache.
pub fn purge_leaf_rows(grid: &mut Grid, fraction: f64, ctx: &PurgeContext) {
    let preserve = match (ctx.floor_indices, ctx.inc_indices) {
        (Some(floor), Some(inc)) => Some((floor, inc)),
        _ => None,
    };
    grid.purge_lru(fraction, preserve);
}

/// Runs both tiers in order, as `Release` in §6 does when asked to recover `bytes_needed`.
/// Returns an estimate of bytes reclaimed (leaf-row purges dominate; cache collapse is cheap
/// enough relative to grid storage that it isn't separately accounted for here).
pub fn release(
    grid: &mut Grid,
    cache: &mut CornerPtrCache,
    fraction: f64,
    preserve_in_use: bool,
    ctx: &PurgeContext,
) -> usize {
    let before = grid.arena().len();
    collapse_cache(cache, ctx);
    purge_leaf_rows(grid, fraction, ctx);
    if !preserve_in_use {
        cache.invalidate();
    }
    let after = grid.arena().len();
    before.saturating_sub(after) * grid.side() * 10
}
