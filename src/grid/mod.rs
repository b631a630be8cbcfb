//! Sparse N-dimensional grid: the top `I-1` dimensions are arrays-of-pointers-to-subarray, the
//! innermost dimension is a dense leaf row of `S` cells. See §3/§4.1.

mod arena;
pub mod cell;

pub use arena::{LeafArena, LeafRowId};
pub use cell::{CellFlags, GridCell};

/// A non-leaf grid level: `S` optional pointers to the next level down, or (at depth `I-1`)
/// an optional pointer to a leaf row.
enum GridNode {
    Branch(Vec<Option<Box<GridNode>>>),
    Leaf(Option<LeafRowId>),
}

impl GridNode {
    fn new(dims: usize, depth: usize, side: usize) -> Self {
        if depth + 1 == dims {
            GridNode::Leaf(None)
        } else {
            GridNode::Branch((0..side).map(|_| None).collect())
        }
    }
}

/// The sparse grid owned by a [`crate::Table`].
pub struct Grid {
    root: GridNode,
    dims: usize,
    side: usize,
    output_dims: usize,
    arena: LeafArena,
    bytes_used: usize,
    memory_limit_bytes: Option<usize>,
}

/// Approximate bytes consumed by one leaf row: a cell holds one flags byte plus up to a
/// handful of u16 output components; this is a planning estimate, not exact accounting.
fn leaf_row_bytes(side: usize, output_dims: usize) -> usize {
    side * (1 + output_dims * 2 + 8)
}

const BRANCH_BYTES_PER_SLOT: usize = 8;

impl Grid {
    pub fn new(dims: usize, side: usize, memory_limit_bytes: Option<usize>, output_dims: usize) -> Self {
        Self {
            root: GridNode::new(dims, 0, side),
            dims,
            side,
            output_dims,
            arena: LeafArena::new(),
            bytes_used: 0,
            memory_limit_bytes,
        }
    }

    pub fn arena(&self) -> &LeafArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut LeafArena {
        &mut self.arena
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn side(&self) -> usize {
        self.side
    }

    /// Current estimated bytes charged against `memory_limit_bytes`. Decreases when
    /// [`Self::purge_lru`] actually frees leaf rows or empty branch slots.
    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    fn would_exceed(&self, additional: usize) -> bool {
        matches!(self.memory_limit_bytes, Some(limit) if self.bytes_used + additional > limit)
    }

    /// Walks the grid to `indices`. With `ensure = true`, allocates any missing levels and the
    /// leaf row itself (returning `None` only on a memory-budget failure); with `ensure =
    /// false`, returns `None` as soon as a level is absent without allocating anything.
    ///
    /// Returns the leaf row id and the within-row cell index (the innermost dimension).
    pub fn locate_cell(
        &mut self,
        indices: &[i32],
        ensure: bool,
        output_dims: usize,
    ) -> Option<(LeafRowId, usize)> {
        debug_assert_eq!(indices.len(), self.dims);
        let side = self.side;
        let mut node = &mut self.root;
        for depth in 0..self.dims.saturating_sub(1) {
            let idx = indices[depth] as usize;
            match node {
                GridNode::Branch(children) => {
                    if children[idx].is_none() {
                        if !ensure {
                            return None;
                        }
                        if self.bytes_used + BRANCH_BYTES_PER_SLOT * side > usize::MAX {
                            return None;
                        }
                        children[idx] = Some(Box::new(GridNode::new(self.dims, depth + 1, side)));
                        self.bytes_used += BRANCH_BYTES_PER_SLOT * side;
                    }
                    node = children[idx].as_mut().unwrap();
                }
                GridNode::Leaf(_) => unreachable!("depth invariant violated"),
            }
        }
        match node {
            GridNode::Leaf(row) => {
                if row.is_none() {
                    if !ensure {
                        return None;
                    }
                    let additional = leaf_row_bytes(side, output_dims);
                    if matches!(self.memory_limit_bytes, Some(limit) if self.bytes_used + additional > limit) {
                        return None;
                    }
                    let id = self.arena.alloc(side);
                    *row = Some(id);
                    self.bytes_used += additional;
                }
                let id = row.unwrap();
                self.arena.touch(id);
                Some((id, *indices.last().unwrap() as usize))
            }
            GridNode::Branch(_) => unreachable!("depth invariant violated"),
        }
    }

    /// Touches the leaf row holding `indices` (moves it to the MRU head) without allocating.
    pub fn touch(&mut self, row: LeafRowId) {
        self.arena.touch(row);
    }

    pub fn cell(&self, row: LeafRowId, cell_index: usize) -> &GridCell {
        &self.arena.get(row).cells[cell_index]
    }

    pub fn cell_mut(&mut self, row: LeafRowId, cell_index: usize) -> &mut GridCell {
        &mut self.arena.get_mut(row).cells[cell_index]
    }

    /// Tier-2 purge: frees the least-recently-used fraction of leaf rows (and any branch
    /// levels that become entirely empty as a result). See §4.7.
    ///
    /// `preserve` is `Some((floor_indices, inc_indices))` when the caller wants the anchor's
    /// floor/floor+1 corners (in every dimension) protected from this pass.
    pub fn purge_lru(&mut self, fraction: f64, preserve: Option<(&[i32], &[i32])>) {
        let ranked = self.arena.ranked();
        let k = ranked.len() as f64;
        if k == 0.0 {
            return;
        }
        let threshold = (k * (1.0 - fraction)).round() as u32;
        let mut to_free: std::collections::HashSet<LeafRowId> = ranked
            .into_iter()
            .filter(|&(rank, _)| rank > threshold)
            .map(|(_, id)| id)
            .collect();

        let mut freed_bytes = 0usize;
        purge_node(
            &mut self.root,
            self.dims,
            0,
            self.side,
            self.output_dims,
            &mut to_free,
            &mut self.arena,
            preserve,
            &mut freed_bytes,
        );
        self.bytes_used = self.bytes_used.saturating_sub(freed_bytes);

        if preserve.is_some() {
            // A preserving purge may have removed non-anchor corners of mini-cubes anchored at
            // any surviving leaf row; re-validation is required everywhere, not just along the
            // preserved path.
            self.arena.clear_tested_everywhere();
        }
    }
}


/// Recursively frees cube entries per `gst_purgeCube`: walks down to the leaf level, frees
/// leaf rows marked for removal (unless protected by `preserve`), then frees any branch slot
/// whose subtree became entirely empty. Returns `true` if this subtree (or one below it) was
/// disturbed and survived (so the caller should clear `CUBE_TESTED` on it). Adds the byte cost
/// of every slot actually freed (leaf row or empty branch slot) to `freed_bytes`, so the grid's
/// budget accounting shrinks back down instead of only ever growing.
#[allow(clippy::too_many_arguments)]
fn purge_node(
    node: &mut GridNode,
    dims: usize,
    depth: usize,
    side: usize,
    output_dims: usize,
    to_free: &mut std::collections::HashSet<LeafRowId>,
    arena: &mut LeafArena,
    preserve: Option<(&[i32], &[i32])>,
    freed_bytes: &mut usize,
) -> bool {
    match node {
        GridNode::Leaf(slot) => {
            if let Some(id) = *slot {
                let protected = preserve.is_some();
                if to_free.contains(&id) && !protected {
                    arena.free(id);
                    *slot = None;
                    *freed_bytes += leaf_row_bytes(side, output_dims);
                    false
                } else {
                    if protected {
                        // Surviving but possibly disturbed by sibling removal elsewhere;
                        // the caller clears CUBE_TESTED on preserved rows unconditionally.
                    }
                    true
                }
            } else {
                false
            }
        }
        GridNode::Branch(children) => {
            let mut any_survivor = false;
            for (index, child) in children.iter_mut().enumerate() {
                if let Some(boxed) = child {
                    let child_preserve = preserve.and_then(|(floor, inc)| {
                        if floor[depth] as usize == index || inc[depth] as usize == index {
                            Some((floor, inc))
                        } else {
                            None
                        }
                    });
                    let survives = if child_preserve.is_some() || preserve.is_none() {
                        purge_node(
                            boxed,
                            dims,
                            depth + 1,
                            side,
                            output_dims,
                            to_free,
                            arena,
                            child_preserve,
                            freed_bytes,
                        )
                    } else {
                        // Not on the protected path for this dimension: purge normally (no
                        // protection passed down).
                        purge_node(
                            boxed,
                            dims,
                            depth + 1,
                            side,
                            output_dims,
                            to_free,
                            arena,
                            None,
                            freed_bytes,
                        )
                    };
                    if survives {
                        any_survivor = true;
                    } else {
                        *child = None;
                        *freed_bytes += BRANCH_BYTES_PER_SLOT * side;
                    }
                }
            }
            any_survivor
        }
    }
}
