//! Hash-indexed MRU store of pointer arrays for recently used mini-cubes. See §3/§4.3.

use smallvec::SmallVec;

use crate::config::{clamp_to_anchor_budget, default_cache_bits, side_bits};
use crate::grid::LeafRowId;

/// Sentinel anchor id meaning "this slot holds no entry" (or "the dispatcher has no cached
/// anchor"). Represented as `u32::MAX` rather than the original's reserved-top-2-bits scheme,
/// since a `u32` id has no bit-width pressure here.
pub const INVALID: u32 = u32::MAX;

/// A corner of a cached mini-cube, as a `(leaf row, cell index)` pair rather than a raw
/// pointer — non-owning references into arena-owned storage, per the design notes.
pub type CornerRef = (LeafRowId, usize);

/// The `2^I` pointers to a mini-cube's corner output vectors, plus the anchor id they were
/// filled for.
pub struct CornerPtrEntry {
    pub id: u32,
    pub pointers: SmallVec<[CornerRef; 16]>,
}

/// Direct-mapped corner-pointer cache. When `bits == 0` this degenerates to the single-slot
/// fallback cache described in §3/§4.7 Tier 1 — modeled as the same `Vec` rather than a
/// separate aliased array, since the externally observable behavior (one slot, one entry) is
/// identical either way.
pub struct CornerPtrCache {
    bits: u8,
    dims: usize,
    side_bits: u32,
    slots: Vec<Option<CornerPtrEntry>>,
    /// Advisory-only counter: incremented whenever a miss evicts an already-occupied slot.
    /// Per §9 Design Notes its exact semantics are unspecified; do not rely on its value.
    duplicate_count: u64,
}

impl CornerPtrCache {
    pub fn new(dims: usize, side: usize, cache_bits: Option<u8>) -> Self {
        let sb = side_bits(side);
        let bits = match cache_bits {
            Some(b) => clamp_to_anchor_budget(dims, sb, b),
            None => default_cache_bits(dims, side),
        };
        let size = 1usize << (dims as u32 * bits as u32).min(30);
        Self {
            bits,
            dims,
            side_bits: sb,
            slots: (0..size).map(|_| None).collect(),
            duplicate_count: 0,
        }
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }

    pub fn is_enabled(&self) -> bool {
        self.bits > 0
    }

    #[cfg(feature = "metrics")]
    pub fn duplicate_count(&self) -> u64 {
        self.duplicate_count
    }

    /// Computes `(id, hash)` for an anchor's indices, per §4.3's bit-concatenation scheme.
    pub fn encode(&self, indices: &[i32]) -> (u32, u32) {
        let mut id = 0u32;
        let mut hash = 0u32;
        for (d, &idx) in indices.iter().enumerate() {
            id |= (idx as u32) << (self.side_bits * d as u32);
            if self.bits > 0 {
                let mask = (1u32 << self.bits) - 1;
                hash |= (idx as u32 & mask) << (self.bits as u32 * d as u32);
            }
        }
        (id, hash)
    }

    /// Looks up `slot[hash]`. Returns `Some(&pointers)` on a hit (`slot.id == id`).
    pub fn probe(&self, id: u32, hash: u32) -> Option<&SmallVec<[CornerRef; 16]>> {
        self.slots
            .get(hash as usize)
            .and_then(|s| s.as_ref())
            .filter(|e| e.id == id)
            .map(|e| &e.pointers)
    }

    /// Fills (or replaces) `slot[hash]` with the anchor's corner pointers.
    pub fn fill(&mut self, hash: u32, id: u32, pointers: SmallVec<[CornerRef; 16]>) {
        if self.slots[hash as usize].is_some() {
            self.duplicate_count += 1;
        }
        self.slots[hash as usize] = Some(CornerPtrEntry { id, pointers });
    }

    /// Tier 1 of the low-memory handler: collapses the cache to a single slot, preserving the
    /// entry at `preserve_hash` (the dispatcher's currently in-use anchor) if any.
    pub fn collapse(&mut self, preserve_hash: Option<u32>) {
        if self.bits == 0 {
            return;
        }
        let preserved = preserve_hash.and_then(|h| self.slots[h as usize].take());
        self.bits = 0;
        self.slots = vec![preserved];
    }

    pub fn invalidate(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::LeafArena;

    fn dummy_ref(arena: &mut LeafArena) -> CornerRef {
        (arena.alloc(4), 0)
    }

    #[test]
    fn bits_zero_means_disabled_single_slot_cache() {
        let cache = CornerPtrCache::new(5, 17, None);
        assert_eq!(cache.bits(), 0);
        assert!(!cache.is_enabled());
    }

    #[test]
    fn fill_then_probe_round_trips_on_matching_id() {
        let mut arena = LeafArena::new();
        let mut cache = CornerPtrCache::new(2, 5, None);
        let indices = [1, 2];
        let (id, hash) = cache.encode(&indices);
        let pointers: SmallVec<[CornerRef; 16]> = (0..4).map(|_| dummy_ref(&mut arena)).collect();
        cache.fill(hash, id, pointers.clone());
        let hit = cache.probe(id, hash).expect("expected a cache hit");
        assert_eq!(hit.len(), pointers.len());
    }

    #[test]
    fn probe_misses_on_id_mismatch_at_the_same_slot() {
        let mut arena = LeafArena::new();
        let mut cache = CornerPtrCache::new(1, 5, Some(3));
        let (id_a, hash_a) = cache.encode(&[1]);
        cache.fill(hash_a, id_a, SmallVec::from_elem(dummy_ref(&mut arena), 2));
        let (id_b, hash_b) = cache.encode(&[9]);
        if hash_a == hash_b && id_a != id_b {
            assert!(cache.probe(id_b, hash_b).is_none());
        }
    }

    #[test]
    fn collapse_preserves_the_requested_slot() {
        let mut arena = LeafArena::new();
        let mut cache = CornerPtrCache::new(2, 5, None);
        let (id, hash) = cache.encode(&[0, 0]);
        cache.fill(hash, id, SmallVec::from_elem(dummy_ref(&mut arena), 4));
        cache.collapse(Some(hash));
        assert_eq!(cache.bits(), 0);
        assert!(cache.probe(id, 0).is_some());
    }

    #[test]
    fn invalidate_clears_every_slot() {
        let mut arena = LeafArena::new();
        let mut cache = CornerPtrCache::new(2, 5, None);
        let (id, hash) = cache.encode(&[1, 1]);
        cache.fill(hash, id, SmallVec::from_elem(dummy_ref(&mut arena), 4));
        cache.invalidate();
        assert!(cache.probe(id, hash).is_none());
    }
}
