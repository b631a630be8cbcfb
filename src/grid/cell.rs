//! The validity flags and per-gridpoint payload of a single grid cell.

use bitflags::bitflags;
use smallvec::SmallVec;

bitflags! {
    /// Per-gridpoint validity state. Bit values match the original engine exactly so that the
    /// flag arithmetic (e.g. `CUBE_LINEAR` implying `CUBE_TESTED`) reads the same way.
    #[derive(Default)]
    pub struct CellFlags: u8 {
        /// The mini-cube anchored here has been checked for linearity.
        const CUBE_TESTED = 0x01;
        /// The linearity check passed; interpolation across this mini-cube needs no further
        /// validation. Always implies `CUBE_TESTED`.
        const CUBE_LINEAR = 0x02;
        /// This cell has been evaluated; its `color` holds the evaluator's output.
        const COLOR_PRESENT = 0x04;
    }
}

/// A single discrete grid point: an optional evaluated output color plus validity flags.
#[derive(Clone, Debug, Default)]
pub struct GridCell {
    pub flags: CellFlags,
    pub color: SmallVec<[u16; 8]>,
}

impl GridCell {
    pub fn is_present(&self) -> bool {
        self.flags.contains(CellFlags::COLOR_PRESENT)
    }

    /// Clears `COLOR_PRESENT` and frees the output color, as a purge of this cell requires.
    pub fn purge_color(&mut self) {
        self.flags.remove(CellFlags::COLOR_PRESENT);
        self.color = SmallVec::new();
    }

    /// Clears `CUBE_TESTED` (and thus `CUBE_LINEAR`, since it implies the former) without
    /// touching `COLOR_PRESENT`. Used when a preserving purge disturbs a non-anchor corner.
    pub fn clear_tested(&mut self) {
        self.flags
            .remove(CellFlags::CUBE_TESTED | CellFlags::CUBE_LINEAR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_bit_values_match_the_original_engine() {
        assert_eq!(CellFlags::CUBE_TESTED.bits(), 0x01);
        assert_eq!(CellFlags::CUBE_LINEAR.bits(), 0x02);
        assert_eq!(CellFlags::COLOR_PRESENT.bits(), 0x04);
    }

    #[test]
    fn purge_color_clears_presence_and_data() {
        let mut cell = GridCell {
            flags: CellFlags::COLOR_PRESENT | CellFlags::CUBE_TESTED,
            color: smallvec::smallvec![1, 2, 3],
        };
        cell.purge_color();
        assert!(!cell.is_present());
        assert!(cell.color.is_empty());
        assert!(cell.flags.contains(CellFlags::CUBE_TESTED));
    }

    #[test]
    fn clear_tested_drops_both_validity_flags() {
        let mut cell = GridCell {
            flags: CellFlags::CUBE_TESTED | CellFlags::CUBE_LINEAR | CellFlags::COLOR_PRESENT,
            color: smallvec::smallvec![5],
        };
        cell.clear_tested();
        assert!(!cell.flags.contains(CellFlags::CUBE_TESTED));
        assert!(!cell.flags.contains(CellFlags::CUBE_LINEAR));
        assert!(cell.flags.contains(CellFlags::COLOR_PRESENT));
    }
}
