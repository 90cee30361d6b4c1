use thiserror::Error;

/// Fault classes used for diagnostics aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FaultClass {
    /// Access shape rejected before reaching any register.
    Bus,
    /// Access landed on an offset with no declared register.
    Mapping,
    /// Field-level policy discarded or corrected written bits.
    Field,
}

/// Stable taxonomy of bus anomalies absorbed by a register bank.
///
/// None of these reach the bus as an error: the bank records them as
/// diagnostics and answers with a deterministic default instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum AccessFault {
    /// Access width is not the native width or a permitted narrower width.
    #[error("access width is not permitted for this bank")]
    IllegalWidth = 0x01,
    /// Narrow access is not aligned to its own width.
    #[error("access is not aligned to its width")]
    MisalignedAccess = 0x02,
    /// Access offset lies beyond the bank size.
    #[error("access offset lies outside the bank")]
    OutOfRange = 0x03,
    /// Access offset is inside the bank but no register is declared there.
    #[error("access to an offset with no declared register")]
    UnmappedOffset = 0x04,
    /// Write attempted to change reserved bits.
    #[error("write to reserved bits")]
    ReservedWrite = 0x05,
    /// Write attempted to change a field that is not writable.
    #[error("write to read-only field")]
    ReadOnlyWrite = 0x06,
    /// Write touched a field whose behaviour is not modelled.
    #[error("write to unmodelled tagged field")]
    TaggedWrite = 0x07,
    /// Write carried a discriminant outside an enum field's valid set.
    #[error("invalid enum discriminant written")]
    InvalidEnumValue = 0x08,
}

impl AccessFault {
    /// Converts a fault to its stable byte code.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a stable byte code back into a fault.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::IllegalWidth),
            0x02 => Some(Self::MisalignedAccess),
            0x03 => Some(Self::OutOfRange),
            0x04 => Some(Self::UnmappedOffset),
            0x05 => Some(Self::ReservedWrite),
            0x06 => Some(Self::ReadOnlyWrite),
            0x07 => Some(Self::TaggedWrite),
            0x08 => Some(Self::InvalidEnumValue),
            _ => None,
        }
    }

    /// Returns the diagnostics class for this fault.
    #[must_use]
    pub const fn class(self) -> FaultClass {
        match self {
            Self::IllegalWidth | Self::MisalignedAccess | Self::OutOfRange => FaultClass::Bus,
            Self::UnmappedOffset => FaultClass::Mapping,
            Self::ReservedWrite
            | Self::ReadOnlyWrite
            | Self::TaggedWrite
            | Self::InvalidEnumValue => FaultClass::Field,
        }
    }
}

/// Misconfiguration detected while building a register bank.
///
/// These are declaration defects: the bank is never constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum BuildError {
    /// Bank size is zero or not a multiple of the native width.
    #[error("bank size {size:#x} is not a positive multiple of {native_bytes} bytes")]
    InvalidSize {
        /// Declared bank size in bytes.
        size: u64,
        /// Native access width in bytes.
        native_bytes: u8,
    },
    /// Two registers were declared at the same offset.
    #[error("register offset {offset:#x} declared twice")]
    DuplicateRegister {
        /// Offending offset.
        offset: u64,
    },
    /// Register offset lies outside the bank.
    #[error("register offset {offset:#x} lies outside bank size {size:#x}")]
    RegisterOutOfRange {
        /// Offending offset.
        offset: u64,
        /// Bank size in bytes.
        size: u64,
    },
    /// Register array offset does not fit in 64 bits.
    #[error("register array starting at {first:#x} overflows the offset space at element {index}")]
    RegisterArrayOverflow {
        /// Offset of the first element.
        first: u64,
        /// Index of the first element whose offset overflows.
        index: usize,
    },
    /// Register offset is not aligned to the native width.
    #[error("register offset {offset:#x} is not aligned to {native_bytes} bytes")]
    MisalignedRegister {
        /// Offending offset.
        offset: u64,
        /// Native access width in bytes.
        native_bytes: u8,
    },
    /// Field declared with zero width.
    #[error("register {register:#x}: field at bit {bit} has zero width")]
    ZeroWidthField {
        /// Register offset.
        register: u64,
        /// Field start bit.
        bit: u32,
    },
    /// Flag field declared wider than one bit.
    #[error("register {register:#x}: flag at bit {bit} must be one bit wide, got {width}")]
    FlagWidth {
        /// Register offset.
        register: u64,
        /// Field start bit.
        bit: u32,
        /// Declared width.
        width: u32,
    },
    /// Field extends past the register width.
    #[error("register {register:#x}: field {bit}+{width} exceeds register width {register_bits}")]
    FieldExceedsRegister {
        /// Register offset.
        register: u64,
        /// Field start bit.
        bit: u32,
        /// Field width.
        width: u32,
        /// Register width in bits.
        register_bits: u32,
    },
    /// Two fields share at least one bit.
    #[error("register {register:#x}: field at bit {second} overlaps field at bit {first}")]
    OverlappingFields {
        /// Register offset.
        register: u64,
        /// Start bit of the earlier field.
        first: u32,
        /// Start bit of the overlapping field.
        second: u32,
    },
    /// Reset value has bits beyond the register width.
    #[error("register {register:#x}: reset value {value:#x} exceeds register width")]
    ResetValueTooWide {
        /// Register offset.
        register: u64,
        /// Declared reset value.
        value: u64,
    },
    /// Enum field declared with no valid discriminant that fits its width.
    #[error("register {register:#x}: enum field at bit {bit} has no valid discriminant")]
    EmptyEnum {
        /// Register offset.
        register: u64,
        /// Field start bit.
        bit: u32,
    },
    /// Reset value unpacks to an invalid discriminant for an enum field.
    #[error("register {register:#x}: reset value gives invalid discriminant {value} at bit {bit}")]
    InvalidResetEnum {
        /// Register offset.
        register: u64,
        /// Field start bit.
        bit: u32,
        /// Unpacked discriminant.
        value: u64,
    },
    /// Enum discriminant does not fit the field width.
    #[error("register {register:#x}: discriminant {value} does not fit field at bit {bit}")]
    DiscriminantTooWide {
        /// Register offset.
        register: u64,
        /// Field start bit.
        bit: u32,
        /// Offending discriminant.
        value: u64,
    },
    /// Clamp policy targets a discriminant outside the field's valid set.
    #[error("register {register:#x}: clamp target {value} at bit {bit} is not a valid discriminant")]
    InvalidClampTarget {
        /// Register offset.
        register: u64,
        /// Field start bit.
        bit: u32,
        /// Clamp target.
        value: u64,
    },
}

/// Misuse of the peripheral-internal field access API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum FieldError {
    /// No field starts at the requested bit of the requested register.
    #[error("no field at bit {bit} of register {register:#x}")]
    UnknownField {
        /// Register offset.
        register: u64,
        /// Field start bit.
        bit: u32,
    },
    /// Value does not fit in the field width.
    #[error("value {value:#x} does not fit in {width} bits")]
    ValueTooWide {
        /// Rejected value.
        value: u64,
        /// Field width.
        width: u32,
    },
    /// Value is not a valid discriminant for the enum field.
    #[error("value {value} is not a valid discriminant")]
    InvalidEnumValue {
        /// Rejected value.
        value: u64,
    },
    /// Field is a read-only constant.
    #[error("field is a read-only constant")]
    ConstantField,
    /// Field covers reserved or unmodelled bits.
    #[error("field is reserved or unmodelled")]
    PlaceholderField,
}
