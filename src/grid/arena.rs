//! Arena of leaf rows with an intrusive MRU list, per the design notes' "arena + indices"
//! recommendation (grid ownership modeled without raw pointers).

use super::cell::GridCell;

/// Opaque handle to a [`LeafRow`] owned by a [`LeafArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LeafRowId(u32);

/// The innermost dimension's dense array of `S` cells; the unit of purge.
pub struct LeafRow {
    pub cells: Vec<GridCell>,
    prev: Option<LeafRowId>,
    next: Option<LeafRowId>,
}

impl LeafRow {
    fn new(side: usize) -> Self {
        Self {
            cells: vec![GridCell::default(); side],
            prev: None,
            next: None,
        }
    }
}

/// Owns every [`LeafRow`] in a table's grid and threads them through a doubly-linked MRU list
/// (head = most recently touched). List position alone encodes recency; there is no separate
/// timestamp field to keep in sync.
#[derive(Default)]
pub struct LeafArena {
    slots: Vec<Option<LeafRow>>,
    free: Vec<u32>,
    head: Option<LeafRowId>,
    tail: Option<LeafRowId>,
}

impl LeafArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: LeafRowId) -> &LeafRow {
        self.slots[id.0 as usize]
            .as_ref()
            .expect("LeafRowId referenced a freed row")
    }

    pub fn get_mut(&mut self, id: LeafRowId) -> &mut LeafRow {
        self.slots[id.0 as usize]
            .as_mut()
            .expect("LeafRowId referenced a freed row")
    }

    /// Allocates a new, zeroed leaf row of `side` cells and splices it at the MRU head.
    pub fn alloc(&mut self, side: usize) -> LeafRowId {
        let row = LeafRow::new(side);
        let id = if let Some(slot) = self.free.pop() {
            self.slots[slot as usize] = Some(row);
            LeafRowId(slot)
        } else {
            self.slots.push(Some(row));
            LeafRowId(self.slots.len() as u32 - 1)
        };
        self.push_head(id);
        id
    }

    /// Frees a leaf row, unlinking it from the MRU list.
    pub fn free(&mut self, id: LeafRowId) {
        self.unlink(id);
        self.slots[id.0 as usize] = None;
        self.free.push(id.0);
    }

    /// Moves `id` to the MRU head. Called whenever a cell in the row is read or written for
    /// interpolation.
    pub fn touch(&mut self, id: LeafRowId) {
        if self.head == Some(id) {
            return;
        }
        self.unlink(id);
        self.push_head(id);
    }

    fn push_head(&mut self, id: LeafRowId) {
        let old_head = self.head;
        self.get_mut(id).prev = None;
        self.get_mut(id).next = old_head;
        if let Some(h) = old_head {
            self.get_mut(h).prev = Some(id);
        }
        self.head = Some(id);
        if self.tail.is_none() {
            self.tail = Some(id);
        }
    }

    fn unlink(&mut self, id: LeafRowId) {
        let (prev, next) = {
            let row = self.get(id);
            (row.prev, row.next)
        };
        match prev {
            Some(p) => self.get_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.get_mut(n).prev = prev,
            None => self.tail = prev,
        }
    }

    /// Number of live leaf rows, `K` in the purge ranking.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears `CUBE_TESTED`/`CUBE_LINEAR` on every live cell in every live row. Used after a
    /// preserving purge, which may have dropped non-anchor corners of mini-cubes anchored
    /// anywhere in the surviving grid.
    pub fn clear_tested_everywhere(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            for cell in &mut slot.cells {
                cell.clear_tested();
            }
        }
    }

    /// Walks the MRU list head-to-tail, yielding `(rank, id)` pairs with rank `1..=K`
    /// (1 = most recently used), the ranking used by tier-2 purge thresholding.
    pub fn ranked(&self) -> Vec<(u32, LeafRowId)> {
        let mut out = Vec::with_capacity(self.len());
        let mut cur = self.head;
        let mut rank = 0u32;
        while let Some(id) = cur {
            rank += 1;
            out.push((rank, id));
            cur = self.get(id).next;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::cell::CellFlags;

    #[test]
    fn touch_moves_a_row_to_the_mru_head() {
        let mut arena = LeafArena::new();
        let a = arena.alloc(4);
        let b = arena.alloc(4);
        let c = arena.alloc(4);
        // alloc splices at head, so c, b, a is the MRU order right now.
        assert_eq!(
            arena.ranked().into_iter().map(|(_, id)| id).collect::<Vec<_>>(),
            vec![c, b, a]
        );
        arena.touch(a);
        assert_eq!(
            arena.ranked().into_iter().map(|(_, id)| id).collect::<Vec<_>>(),
            vec![a, c, b]
        );
    }

    #[test]
    fn free_unlinks_and_recycles_the_slot() {
        let mut arena = LeafArena::new();
        let a = arena.alloc(4);
        let b = arena.alloc(4);
        arena.free(a);
        assert_eq!(arena.len(), 1);
        assert_eq!(
            arena.ranked().into_iter().map(|(_, id)| id).collect::<Vec<_>>(),
            vec![b]
        );
        let c = arena.alloc(4);
        // The freed slot is reused rather than growing the backing Vec.
        assert_eq!(c, a);
    }

    #[test]
    fn ranked_assigns_one_based_mru_ranks() {
        let mut arena = LeafArena::new();
        let a = arena.alloc(4);
        let b = arena.alloc(4);
        let ranked = arena.ranked();
        assert_eq!(ranked, vec![(1, b), (2, a)]);
    }

    #[test]
    fn clear_tested_everywhere_touches_every_live_row() {
        let mut arena = LeafArena::new();
        let a = arena.alloc(2);
        arena.get_mut(a).cells[0].flags.insert(CellFlags::CUBE_TESTED | CellFlags::CUBE_LINEAR);
        arena.clear_tested_everywhere();
        assert!(!arena.get(a).cells[0].flags.contains(CellFlags::CUBE_TESTED));
    }
}
