//! Field declarations, validated layouts and per-field write policy.

use std::fmt;

use crate::width::low_mask;
use crate::{FieldError, RegisterView};

/// Callback fired after a field write commits, with `(old, new)` values.
pub type WriteHook<C> = Box<dyn FnMut(&mut C, &mut RegisterView<'_>, u64, u64) + Send>;
/// Callback fired before a read packs the register, with the current value.
pub type ReadHook<C> = Box<dyn FnMut(&mut C, &mut RegisterView<'_>, u64) + Send>;
/// Callback recomputing a field value ahead of a read.
pub type ValueProvider<C> = Box<dyn FnMut(&mut C, u64) -> u64 + Send>;

/// Bus access policy of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FieldMode {
    /// Readable; bus writes are discarded.
    Read,
    /// Write-only; reads pack as zero.
    Write,
    /// Readable and writable.
    ReadWrite,
    /// Readable; each written 1 clears the stored bit.
    WriteOneToClear,
    /// Readable; each written 1 sets the stored bit.
    WriteOneToSet,
    /// Readable; each written 0 clears the stored bit.
    WriteZeroToClear,
    /// Readable; each written 1 inverts the stored bit.
    Toggle,
    /// Readable; the stored value clears after a read touching the field.
    ReadToClear,
    /// Readable; the reset value never changes.
    ReadOnlyConstant,
}

impl FieldMode {
    /// Returns `true` when reads observe the stored value.
    #[must_use]
    pub const fn is_readable(self) -> bool {
        !matches!(self, Self::Write)
    }

    /// Returns `true` when bus writes can change the stored value.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        !matches!(self, Self::Read | Self::ReadToClear | Self::ReadOnlyConstant)
    }

    /// Computes the value a write of `candidate` produces from `old`.
    ///
    /// Returns `None` when the mode discards bus writes.
    #[must_use]
    pub const fn apply(self, old: u64, candidate: u64) -> Option<u64> {
        match self {
            Self::Write | Self::ReadWrite => Some(candidate),
            Self::WriteOneToClear => Some(old & !candidate),
            Self::WriteOneToSet => Some(old | candidate),
            Self::WriteZeroToClear => Some(old & candidate),
            Self::Toggle => Some(old ^ candidate),
            Self::Read | Self::ReadToClear | Self::ReadOnlyConstant => None,
        }
    }
}

/// Handling of a written discriminant outside an enum field's valid set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum InvalidEnumPolicy {
    /// Keep the previous value.
    Reject,
    /// Store the raw bits; they read back unchanged.
    AcceptVerbatim,
    /// Replace with the given valid discriminant.
    Clamp(u64),
}

/// Closed set of discriminants an enum field may hold.
pub trait FieldEnum: Copy {
    /// Every valid discriminant.
    const DISCRIMINANTS: &'static [u64];

    /// Decodes raw field bits.
    fn from_bits(bits: u64) -> Option<Self>;

    /// Encodes the variant as raw field bits.
    fn bits(self) -> u64;
}

/// Decoded enum field value with an explicit out-of-range case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumValue<E> {
    /// Valid discriminant.
    Known(E),
    /// Raw bits that name no variant.
    Unknown(u64),
}

impl<E: FieldEnum> EnumValue<E> {
    /// Decodes raw field bits.
    #[must_use]
    pub fn from_bits(bits: u64) -> Self {
        E::from_bits(bits).map_or(Self::Unknown(bits), Self::Known)
    }

    /// Returns the raw field bits.
    #[must_use]
    pub fn bits(self) -> u64 {
        match self {
            Self::Known(variant) => variant.bits(),
            Self::Unknown(bits) => bits,
        }
    }

    /// Returns the variant when the bits are valid.
    #[must_use]
    pub const fn known(self) -> Option<E> {
        match self {
            Self::Known(variant) => Some(variant),
            Self::Unknown(_) => None,
        }
    }
}

/// Semantic type of a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Single-bit boolean.
    Flag,
    /// Unsigned integer.
    Value,
    /// Closed enumeration.
    Enum {
        /// Sorted valid discriminants.
        discriminants: Vec<u64>,
        /// Handling of out-of-set writes.
        policy: InvalidEnumPolicy,
    },
    /// Reserved bits; writes are discarded and diagnosed.
    Reserved,
    /// Unmodelled bits; writes are discarded and diagnosed.
    Tagged,
}

/// Validated, immutable shape of one field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldLayout {
    pub(crate) bit: u32,
    pub(crate) width: u32,
    pub(crate) kind: FieldKind,
    pub(crate) mode: FieldMode,
    pub(crate) name: Option<&'static str>,
}

impl FieldLayout {
    pub(crate) const fn implicit_reserved(bit: u32, width: u32) -> Self {
        Self {
            bit,
            width,
            kind: FieldKind::Reserved,
            mode: FieldMode::Read,
            name: None,
        }
    }

    /// Returns the field start bit.
    #[must_use]
    pub const fn bit(&self) -> u32 {
        self.bit
    }

    /// Returns the field width in bits.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Returns the field kind.
    #[must_use]
    pub const fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Returns the field access mode.
    #[must_use]
    pub const fn mode(&self) -> FieldMode {
        self.mode
    }

    /// Returns the diagnostic name, if any.
    #[must_use]
    pub const fn name(&self) -> Option<&'static str> {
        self.name
    }

    /// Returns `true` for reserved and tagged fields.
    #[must_use]
    pub const fn is_placeholder(&self) -> bool {
        matches!(self.kind, FieldKind::Reserved | FieldKind::Tagged)
    }

    /// Mask of the register bits owned by this field.
    #[must_use]
    pub const fn mask(&self) -> u64 {
        low_mask(self.width) << self.bit
    }

    /// Extracts this field's bits from a register value.
    #[must_use]
    pub const fn extract(&self, register_value: u64) -> u64 {
        (register_value >> self.bit) & low_mask(self.width)
    }

    /// Places a field value at this field's position.
    #[must_use]
    pub const fn place(&self, value: u64) -> u64 {
        (value & low_mask(self.width)) << self.bit
    }

    /// Returns `true` when `value` is a legal stored value for this field.
    #[must_use]
    pub fn accepts(&self, value: u64) -> bool {
        if value & !low_mask(self.width) != 0 {
            return false;
        }
        match &self.kind {
            FieldKind::Enum { discriminants, .. } => discriminants.binary_search(&value).is_ok(),
            _ => true,
        }
    }

    /// Applies the enum policy to a candidate value.
    ///
    /// Returns the value to store and whether the candidate was invalid.
    pub(crate) fn resolve_enum(&self, old: u64, candidate: u64) -> (u64, bool) {
        match &self.kind {
            FieldKind::Enum {
                discriminants,
                policy,
            } if discriminants.binary_search(&candidate).is_err() => match policy {
                InvalidEnumPolicy::Reject => (old, true),
                InvalidEnumPolicy::AcceptVerbatim => (candidate, true),
                InvalidEnumPolicy::Clamp(target) => (*target, true),
            },
            _ => (candidate, false),
        }
    }

    /// Checks a peripheral-internal assignment.
    pub(crate) fn check_assignment(&self, value: u64) -> Result<(), FieldError> {
        if self.is_placeholder() {
            return Err(FieldError::PlaceholderField);
        }
        if self.mode == FieldMode::ReadOnlyConstant {
            return Err(FieldError::ConstantField);
        }
        if value & !low_mask(self.width) != 0 {
            return Err(FieldError::ValueTooWide {
                value,
                width: self.width,
            });
        }
        if !self.accepts(value) {
            return Err(FieldError::InvalidEnumValue { value });
        }
        Ok(())
    }
}

/// Optional callbacks attached to a field.
pub struct FieldHooks<C> {
    pub(crate) on_write: Option<WriteHook<C>>,
    pub(crate) on_change: Option<WriteHook<C>>,
    pub(crate) on_read: Option<ReadHook<C>>,
    pub(crate) provider: Option<ValueProvider<C>>,
}

impl<C> Default for FieldHooks<C> {
    fn default() -> Self {
        Self {
            on_write: None,
            on_change: None,
            on_read: None,
            provider: None,
        }
    }
}

impl<C> fmt::Debug for FieldHooks<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldHooks")
            .field("on_write", &self.on_write.is_some())
            .field("on_change", &self.on_change.is_some())
            .field("on_read", &self.on_read.is_some())
            .field("provider", &self.provider.is_some())
            .finish()
    }
}

/// Declaration record for one field, validated when the bank is built.
#[derive(Debug)]
pub struct FieldDecl<C> {
    pub(crate) layout: FieldLayout,
    pub(crate) hooks: FieldHooks<C>,
}

impl<C> FieldDecl<C> {
    const fn new(bit: u32, width: u32, kind: FieldKind, mode: FieldMode) -> Self {
        Self {
            layout: FieldLayout {
                bit,
                width,
                kind,
                mode,
                name: None,
            },
            hooks: FieldHooks {
                on_write: None,
                on_change: None,
                on_read: None,
                provider: None,
            },
        }
    }

    /// Single-bit flag.
    #[must_use]
    pub const fn flag(bit: u32, mode: FieldMode) -> Self {
        Self::new(bit, 1, FieldKind::Flag, mode)
    }

    /// Unsigned value spanning `width` bits.
    #[must_use]
    pub const fn value(bit: u32, width: u32, mode: FieldMode) -> Self {
        Self::new(bit, width, FieldKind::Value, mode)
    }

    /// Enumeration whose valid set is `E::DISCRIMINANTS`.
    #[must_use]
    pub fn enumeration<E: FieldEnum>(
        bit: u32,
        width: u32,
        mode: FieldMode,
        policy: InvalidEnumPolicy,
    ) -> Self {
        Self::enumeration_of(bit, width, mode, E::DISCRIMINANTS, policy)
    }

    /// Enumeration with an explicit discriminant set.
    ///
    /// Discriminants that do not fit in `width` bits fail construction with
    /// [`BuildError::DiscriminantTooWide`](crate::BuildError::DiscriminantTooWide).
    #[must_use]
    pub fn enumeration_of(
        bit: u32,
        width: u32,
        mode: FieldMode,
        discriminants: &[u64],
        policy: InvalidEnumPolicy,
    ) -> Self {
        let mut discriminants = discriminants.to_vec();
        discriminants.sort_unstable();
        discriminants.dedup();
        Self::new(
            bit,
            width,
            FieldKind::Enum {
                discriminants,
                policy,
            },
            mode,
        )
    }

    /// Reserved bits.
    #[must_use]
    pub const fn reserved(bit: u32, width: u32) -> Self {
        Self::new(bit, width, FieldKind::Reserved, FieldMode::Read)
    }

    /// Unmodelled bits.
    #[must_use]
    pub const fn tagged(bit: u32, width: u32) -> Self {
        Self::new(bit, width, FieldKind::Tagged, FieldMode::Read)
    }

    /// Unmodelled single bit.
    #[must_use]
    pub const fn tagged_flag(bit: u32) -> Self {
        Self::tagged(bit, 1)
    }

    /// Attaches a diagnostic name.
    #[must_use]
    pub fn named(mut self, name: &'static str) -> Self {
        self.layout.name = Some(name);
        self
    }

    /// Returns the declared layout.
    #[must_use]
    pub const fn layout(&self) -> &FieldLayout {
        &self.layout
    }

    /// Registers a callback fired after every committed write touching the field.
    #[must_use]
    pub fn on_write(
        mut self,
        hook: impl FnMut(&mut C, &mut RegisterView<'_>, u64, u64) + Send + 'static,
    ) -> Self {
        self.hooks.on_write = Some(Box::new(hook));
        self
    }

    /// Registers a callback fired after a write that changed the stored value.
    #[must_use]
    pub fn on_change(
        mut self,
        hook: impl FnMut(&mut C, &mut RegisterView<'_>, u64, u64) + Send + 'static,
    ) -> Self {
        self.hooks.on_change = Some(Box::new(hook));
        self
    }

    /// Registers a callback fired before every read touching the field.
    #[must_use]
    pub fn on_read(
        mut self,
        hook: impl FnMut(&mut C, &mut RegisterView<'_>, u64) + Send + 'static,
    ) -> Self {
        self.hooks.on_read = Some(Box::new(hook));
        self
    }

    /// Registers a provider that recomputes the value before every read.
    #[must_use]
    pub fn value_provider(
        mut self,
        provider: impl FnMut(&mut C, u64) -> u64 + Send + 'static,
    ) -> Self {
        self.hooks.provider = Some(Box::new(provider));
        self
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{EnumValue, FieldDecl, FieldEnum, FieldKind, FieldMode, InvalidEnumPolicy};
    use crate::FieldError;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Speed {
        Slow = 1,
        Fast = 2,
    }

    impl FieldEnum for Speed {
        const DISCRIMINANTS: &'static [u64] = &[1, 2];

        fn from_bits(bits: u64) -> Option<Self> {
            match bits {
                1 => Some(Self::Slow),
                2 => Some(Self::Fast),
                _ => None,
            }
        }

        fn bits(self) -> u64 {
            self as u64
        }
    }

    #[rstest]
    #[case(FieldMode::ReadWrite, 0b1010, 0b0110, Some(0b0110))]
    #[case(FieldMode::Write, 0b1010, 0b0110, Some(0b0110))]
    #[case(FieldMode::WriteOneToClear, 0b1010, 0b0110, Some(0b1000))]
    #[case(FieldMode::WriteOneToSet, 0b1010, 0b0110, Some(0b1110))]
    #[case(FieldMode::WriteZeroToClear, 0b1010, 0b0110, Some(0b0010))]
    #[case(FieldMode::Toggle, 0b1010, 0b0110, Some(0b1100))]
    #[case(FieldMode::Read, 0b1010, 0b0110, None)]
    #[case(FieldMode::ReadToClear, 0b1010, 0b0110, None)]
    #[case(FieldMode::ReadOnlyConstant, 0b1010, 0b0110, None)]
    fn mode_policy_combines_old_and_candidate(
        #[case] mode: FieldMode,
        #[case] old: u64,
        #[case] candidate: u64,
        #[case] expected: Option<u64>,
    ) {
        assert_eq!(mode.apply(old, candidate), expected);
        assert_eq!(mode.is_writable(), expected.is_some());
    }

    #[test]
    fn only_write_only_mode_hides_value_from_reads() {
        assert!(!FieldMode::Write.is_readable());
        assert!(FieldMode::WriteOneToClear.is_readable());
        assert!(FieldMode::ReadToClear.is_readable());
    }

    #[test]
    fn layout_extracts_and_places_its_bits() {
        let decl = FieldDecl::<()>::value(4, 3, FieldMode::ReadWrite);
        let layout = decl.layout();
        assert_eq!(layout.mask(), 0b0111_0000);
        assert_eq!(layout.extract(0b1101_0110), 0b101);
        assert_eq!(layout.place(0b1111), 0b0111_0000);
    }

    #[test]
    fn enum_discriminants_are_sorted_and_deduplicated() {
        let decl = FieldDecl::<()>::enumeration_of(
            0,
            2,
            FieldMode::ReadWrite,
            &[3, 1, 7, 1],
            InvalidEnumPolicy::Reject,
        );
        assert_eq!(
            decl.layout().kind(),
            &FieldKind::Enum {
                discriminants: vec![1, 3, 7],
                policy: InvalidEnumPolicy::Reject,
            }
        );
    }

    #[rstest]
    #[case(InvalidEnumPolicy::Reject, 0, (2, true))]
    #[case(InvalidEnumPolicy::AcceptVerbatim, 0, (0, true))]
    #[case(InvalidEnumPolicy::Clamp(1), 3, (1, true))]
    #[case(InvalidEnumPolicy::Reject, 1, (1, false))]
    fn enum_policy_resolves_invalid_candidates(
        #[case] policy: InvalidEnumPolicy,
        #[case] candidate: u64,
        #[case] expected: (u64, bool),
    ) {
        let decl = FieldDecl::<()>::enumeration::<Speed>(0, 2, FieldMode::ReadWrite, policy);
        assert_eq!(decl.layout().resolve_enum(2, candidate), expected);
    }

    #[test]
    fn internal_assignment_is_checked_against_layout() {
        let enum_decl = FieldDecl::<()>::enumeration::<Speed>(
            0,
            2,
            FieldMode::Read,
            InvalidEnumPolicy::Reject,
        );
        assert_eq!(enum_decl.layout().check_assignment(2), Ok(()));
        assert_eq!(
            enum_decl.layout().check_assignment(3),
            Err(FieldError::InvalidEnumValue { value: 3 })
        );
        assert_eq!(
            enum_decl.layout().check_assignment(4),
            Err(FieldError::ValueTooWide { value: 4, width: 2 })
        );

        let constant = FieldDecl::<()>::value(0, 8, FieldMode::ReadOnlyConstant);
        assert_eq!(
            constant.layout().check_assignment(1),
            Err(FieldError::ConstantField)
        );
    }

    #[test]
    fn enum_value_keeps_unknown_bits() {
        assert_eq!(EnumValue::<Speed>::from_bits(2), EnumValue::Known(Speed::Fast));
        assert_eq!(EnumValue::<Speed>::from_bits(3), EnumValue::Unknown(3));
        assert_eq!(EnumValue::<Speed>::from_bits(3).bits(), 3);
        assert_eq!(EnumValue::Known(Speed::Slow).bits(), 1);
        assert_eq!(EnumValue::<Speed>::Unknown(0).known(), None);
    }
}
