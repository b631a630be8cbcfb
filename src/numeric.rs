//! Fixed-point constants and small index/fraction vector types shared across the table.

use smallvec::SmallVec;

/// Number of fractional bits carried by a scaled input color component.
pub const FRACBITS: i32 = 8;
/// Mask that extracts the fractional residue of a scaled input component.
pub const FRACMASK: i32 = (1 << FRACBITS) - 1;
/// Largest input dimension this crate supports (matches the original engine's colorant limit).
pub const MAX_DIMS: usize = 16;

/// A vector of per-dimension grid indices or fractional offsets.
///
/// Stack-allocated up to four dimensions (the common 1..4 input colorant case), spilling to
/// the heap for the rarer 5..16 dimension tables.
pub type IndexVec = SmallVec<[i32; 4]>;

/// `SCALED_COLOR = maxIndex << FRACBITS`, the per-table constant callers use to scale a raw
/// `[lo, hi]` input color into the `[0, SCALED_COLOR]` range expected by [`crate::Table::convert`].
pub fn scaled_color(max_index: i32) -> i32 {
    max_index << FRACBITS
}

/// `SCALED_COLOR` for the largest grid side this crate supports (`S = 33`, `maxIndex = 32`).
/// Individual tables expose their own bound via [`crate::Table::scaled_color`]; this constant
/// is a conservative upper bound useful for sizing buffers ahead of table creation.
pub const SCALED_COLOR: i32 = 32 << FRACBITS;

/// Splits a scaled input component into its integer grid index and fractional residue.
pub fn split_index(scaled: i32) -> (i32, i32) {
    (scaled >> FRACBITS, scaled & FRACMASK)
}

/// Increments an index by one and clamps it to `max_index`, mirroring the anchor's
/// "floor+1, clamped on the upper face" corner rule.
pub fn increment_and_clip(index: i32, max_index: i32) -> i32 {
    if index < max_index {
        index + 1
    } else {
        max_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_index_roundtrips_through_scaled_color() {
        let max_index = 32;
        let scaled = scaled_color(max_index);
        assert_eq!(split_index(scaled), (max_index, 0));
        assert_eq!(split_index(0), (0, 0));
        assert_eq!(split_index((max_index << FRACBITS) - 1), (max_index - 1, FRACMASK));
    }

    #[test]
    fn increment_and_clip_stops_at_upper_face() {
        assert_eq!(increment_and_clip(0, 2), 1);
        assert_eq!(increment_and_clip(1, 2), 2);
        assert_eq!(increment_and_clip(2, 2), 2);
    }
}
