//! Bus access widths and width sets.

/// Width of a single bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum AccessWidth {
    /// 8-bit access.
    Byte = 1,
    /// 16-bit access.
    HalfWord = 2,
    /// 32-bit access.
    Word = 4,
    /// 64-bit access.
    DoubleWord = 8,
}

impl AccessWidth {
    /// All widths in ascending size order.
    pub const ALL: [Self; 4] = [Self::Byte, Self::HalfWord, Self::Word, Self::DoubleWord];

    /// Returns the access width in bytes.
    #[must_use]
    pub const fn bytes(self) -> u8 {
        self as u8
    }

    /// Returns the access width in bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        (self as u32) * 8
    }

    /// Returns a mask covering the low `bits()` bits.
    #[must_use]
    pub const fn mask(self) -> u64 {
        low_mask(self.bits())
    }

    /// Decodes a byte count reported by the bus.
    #[must_use]
    pub const fn from_bytes(bytes: u8) -> Option<Self> {
        match bytes {
            1 => Some(Self::Byte),
            2 => Some(Self::HalfWord),
            4 => Some(Self::Word),
            8 => Some(Self::DoubleWord),
            _ => None,
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Self::Byte => 0b0001,
            Self::HalfWord => 0b0010,
            Self::Word => 0b0100,
            Self::DoubleWord => 0b1000,
        }
    }
}

/// Returns a mask with the low `bits` bits set, saturating at 64.
#[must_use]
pub const fn low_mask(bits: u32) -> u64 {
    if bits >= u64::BITS {
        u64::MAX
    } else {
        (1_u64 << bits) - 1
    }
}

/// Set of access widths accepted by a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PermittedWidths(u8);

impl PermittedWidths {
    /// Empty set.
    pub const NONE: Self = Self(0);

    /// Set containing only `width`.
    #[must_use]
    pub const fn only(width: AccessWidth) -> Self {
        Self(width.bit())
    }

    /// Returns a copy of this set with `width` added.
    #[must_use]
    pub const fn with(self, width: AccessWidth) -> Self {
        Self(self.0 | width.bit())
    }

    /// Returns `true` when `width` is part of the set.
    #[must_use]
    pub const fn contains(self, width: AccessWidth) -> bool {
        self.0 & width.bit() != 0
    }

    /// Iterates the widths of the set in ascending order.
    pub fn iter(self) -> impl Iterator<Item = AccessWidth> {
        AccessWidth::ALL
            .into_iter()
            .filter(move |width| self.contains(*width))
    }
}

impl FromIterator<AccessWidth> for PermittedWidths {
    fn from_iter<I: IntoIterator<Item = AccessWidth>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, Self::with)
    }
}

#[cfg(test)]
mod tests {
    use super::{low_mask, AccessWidth, PermittedWidths};

    #[test]
    fn byte_counts_decode_to_known_widths_only() {
        for bytes in 0_u8..=16 {
            let decoded = AccessWidth::from_bytes(bytes);
            match bytes {
                1 | 2 | 4 | 8 => assert_eq!(decoded.map(AccessWidth::bytes), Some(bytes)),
                _ => assert_eq!(decoded, None),
            }
        }
    }

    #[test]
    fn masks_cover_exact_bit_counts() {
        assert_eq!(AccessWidth::Byte.mask(), 0xFF);
        assert_eq!(AccessWidth::HalfWord.mask(), 0xFFFF);
        assert_eq!(AccessWidth::Word.mask(), 0xFFFF_FFFF);
        assert_eq!(AccessWidth::DoubleWord.mask(), u64::MAX);
        assert_eq!(low_mask(0), 0);
        assert_eq!(low_mask(3), 0b111);
        assert_eq!(low_mask(64), u64::MAX);
        assert_eq!(low_mask(70), u64::MAX);
    }

    #[test]
    fn permitted_set_tracks_membership() {
        let set = PermittedWidths::only(AccessWidth::Word).with(AccessWidth::Byte);
        assert!(set.contains(AccessWidth::Word));
        assert!(set.contains(AccessWidth::Byte));
        assert!(!set.contains(AccessWidth::HalfWord));
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![AccessWidth::Byte, AccessWidth::Word]
        );

        let collected: PermittedWidths = [AccessWidth::HalfWord, AccessWidth::Byte]
            .into_iter()
            .collect();
        assert_eq!(
            collected,
            PermittedWidths::only(AccessWidth::Byte).with(AccessWidth::HalfWord)
        );
    }
}
