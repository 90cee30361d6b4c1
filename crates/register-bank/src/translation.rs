//! Narrow-access translation onto native-width registers.
//!
//! Lanes are little-endian: byte `k` of a native word covers bits
//! `8k..8k + 8`.

use crate::{AccessFault, AccessWidth, PermittedWidths};

/// Position of a (possibly narrow) access inside its native word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lane {
    /// Native-aligned offset of the containing register.
    pub register_offset: u64,
    /// Width of the access.
    pub width: AccessWidth,
    /// Bit shift of the lane inside the native word.
    pub shift: u32,
    /// Mask of the native-word bits covered by the lane.
    pub mask: u64,
}

impl Lane {
    /// Returns `true` when the lane covers the whole native word.
    #[must_use]
    pub const fn is_native(&self, native: AccessWidth) -> bool {
        self.width.bytes() == native.bytes()
    }

    /// Extracts the lane from a native-width value.
    #[must_use]
    pub const fn extract(&self, native_value: u64) -> u64 {
        (native_value & self.mask) >> self.shift
    }

    /// Replaces the lane bits of `native_value` with `narrow_value`.
    ///
    /// Bits of `narrow_value` beyond the lane width are dropped.
    #[must_use]
    pub const fn merge(&self, native_value: u64, narrow_value: u64) -> u64 {
        (native_value & !self.mask) | ((narrow_value << self.shift) & self.mask)
    }
}

/// Width legality policy for a bank with a fixed native width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessTranslator {
    native: AccessWidth,
    permitted: PermittedWidths,
}

impl AccessTranslator {
    /// Creates a translator; the native width is always permitted and widths
    /// larger than native are never permitted.
    #[must_use]
    pub fn new(native: AccessWidth, permitted: PermittedWidths) -> Self {
        let permitted = permitted
            .iter()
            .filter(|width| width.bytes() < native.bytes())
            .collect::<PermittedWidths>()
            .with(native);
        Self { native, permitted }
    }

    /// Returns the native access width.
    #[must_use]
    pub const fn native(&self) -> AccessWidth {
        self.native
    }

    /// Returns the effective set of legal widths.
    #[must_use]
    pub const fn permitted(&self) -> PermittedWidths {
        self.permitted
    }

    /// Validates a bus-reported width in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AccessFault::IllegalWidth`] when `width_bytes` is not a
    /// known width or not in the permitted set.
    pub fn validate_width(&self, width_bytes: u8) -> Result<AccessWidth, AccessFault> {
        match AccessWidth::from_bytes(width_bytes) {
            Some(width) if self.permitted.contains(width) => Ok(width),
            _ => Err(AccessFault::IllegalWidth),
        }
    }

    /// Resolves an access to the lane it touches within its native word.
    ///
    /// # Errors
    ///
    /// Returns [`AccessFault::IllegalWidth`] for illegal widths and
    /// [`AccessFault::MisalignedAccess`] when `offset` is not a multiple of
    /// the access width.
    pub fn resolve(&self, offset: u64, width_bytes: u8) -> Result<Lane, AccessFault> {
        let width = self.validate_width(width_bytes)?;
        if offset % u64::from(width.bytes()) != 0 {
            return Err(AccessFault::MisalignedAccess);
        }

        let native_bytes = u64::from(self.native.bytes());
        let lane_bytes = offset % native_bytes;
        #[allow(clippy::cast_possible_truncation)]
        let shift = (lane_bytes * 8) as u32;
        Ok(Lane {
            register_offset: offset - lane_bytes,
            width,
            shift,
            mask: width.mask() << shift,
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::AccessTranslator;
    use crate::{AccessFault, AccessWidth, PermittedWidths};

    fn word_translator() -> AccessTranslator {
        AccessTranslator::new(
            AccessWidth::Word,
            PermittedWidths::only(AccessWidth::Byte).with(AccessWidth::HalfWord),
        )
    }

    #[rstest]
    #[case(1, true)]
    #[case(2, true)]
    #[case(3, false)]
    #[case(4, true)]
    #[case(8, false)]
    #[case(0, false)]
    fn width_legality_follows_permitted_set(#[case] width: u8, #[case] legal: bool) {
        let translator = word_translator();
        assert_eq!(translator.validate_width(width).is_ok(), legal);
        if !legal {
            assert_eq!(
                translator.validate_width(width),
                Err(AccessFault::IllegalWidth)
            );
        }
    }

    #[test]
    fn native_width_is_always_permitted() {
        let translator = AccessTranslator::new(AccessWidth::Word, PermittedWidths::NONE);
        assert_eq!(translator.validate_width(4), Ok(AccessWidth::Word));
        assert_eq!(
            translator.validate_width(1),
            Err(AccessFault::IllegalWidth)
        );
    }

    #[test]
    fn wider_than_native_is_never_permitted() {
        let translator = AccessTranslator::new(
            AccessWidth::HalfWord,
            PermittedWidths::only(AccessWidth::Word).with(AccessWidth::Byte),
        );
        assert!(!translator.permitted().contains(AccessWidth::Word));
        assert_eq!(
            translator.validate_width(4),
            Err(AccessFault::IllegalWidth)
        );
        assert_eq!(translator.validate_width(1), Ok(AccessWidth::Byte));
    }

    #[rstest]
    #[case(0x10, 1, 0x10, 0, 0x0000_00FF)]
    #[case(0x11, 1, 0x10, 8, 0x0000_FF00)]
    #[case(0x12, 1, 0x10, 16, 0x00FF_0000)]
    #[case(0x13, 1, 0x10, 24, 0xFF00_0000)]
    #[case(0x12, 2, 0x10, 16, 0xFFFF_0000)]
    #[case(0x14, 4, 0x14, 0, 0xFFFF_FFFF)]
    fn lanes_are_little_endian(
        #[case] offset: u64,
        #[case] width: u8,
        #[case] register: u64,
        #[case] shift: u32,
        #[case] mask: u64,
    ) {
        let lane = word_translator()
            .resolve(offset, width)
            .expect("legal access");
        assert_eq!(lane.register_offset, register);
        assert_eq!(lane.shift, shift);
        assert_eq!(lane.mask, mask);
    }

    #[test]
    fn narrow_access_must_be_aligned_to_its_width() {
        let translator = word_translator();
        assert_eq!(
            translator.resolve(0x11, 2),
            Err(AccessFault::MisalignedAccess)
        );
        assert_eq!(
            translator.resolve(0x02, 4),
            Err(AccessFault::MisalignedAccess)
        );
    }

    #[test]
    fn extract_and_merge_touch_only_the_lane() {
        let lane = word_translator().resolve(0x01, 1).expect("legal access");
        assert_eq!(lane.extract(0xAABB_CCDD), 0xCC);
        assert_eq!(lane.merge(0xAABB_CCDD, 0x11), 0xAABB_11DD);
        assert_eq!(lane.merge(0xAABB_CCDD, 0x1_22), 0xAABB_22DD);
        assert!(!lane.is_native(AccessWidth::Word));
    }
}
