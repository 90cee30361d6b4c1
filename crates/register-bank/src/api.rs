//! Bus-facing contracts and bank configuration.

use crate::{AccessWidth, BuildError, PermittedWidths};

/// Default bank size in bytes.
pub const DEFAULT_BANK_SIZE: u64 = 0x400;

/// Immutable configuration of a register bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BankConfig {
    /// Addressable extent in bytes reported to the bus.
    pub size: u64,
    /// Native width of every register in the bank.
    pub native_width: AccessWidth,
    /// Narrower widths translated onto native registers.
    pub permitted: PermittedWidths,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_BANK_SIZE,
            native_width: AccessWidth::Word,
            permitted: PermittedWidths::only(AccessWidth::Word),
        }
    }
}

impl BankConfig {
    /// Creates a configuration that accepts native accesses only.
    #[must_use]
    pub const fn new(size: u64, native_width: AccessWidth) -> Self {
        Self {
            size,
            native_width,
            permitted: PermittedWidths::only(native_width),
        }
    }

    /// Adds a narrower access width.
    #[must_use]
    pub const fn permit(mut self, width: AccessWidth) -> Self {
        self.permitted = self.permitted.with(width);
        self
    }

    /// Checks the bank size against the native width.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidSize`] when the size is zero or not a
    /// multiple of the native width.
    pub const fn validate(&self) -> Result<(), BuildError> {
        let native_bytes = self.native_width.bytes();
        if self.size == 0 || self.size % native_bytes as u64 != 0 {
            return Err(BuildError::InvalidSize {
                size: self.size,
                native_bytes,
            });
        }
        Ok(())
    }
}

/// Direction-tagged access delivered by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusAccess {
    /// Read `width` bytes at `offset`.
    Read {
        /// Offset within the peripheral.
        offset: u64,
        /// Access width in bytes.
        width: u8,
    },
    /// Write `value` as `width` bytes at `offset`.
    Write {
        /// Offset within the peripheral.
        offset: u64,
        /// Access width in bytes.
        width: u8,
        /// Value to write, right-aligned.
        value: u64,
    },
}

/// Contract between a peripheral and the bus that routes accesses to it.
///
/// Accesses never fail: anomalies are absorbed by the peripheral.
pub trait BusPeripheral {
    /// Reads `width` bytes at `offset`.
    fn read(&mut self, offset: u64, width: u8) -> u64;

    /// Writes `value` as `width` bytes at `offset`.
    fn write(&mut self, offset: u64, width: u8, value: u64);

    /// Restores power-on state.
    fn reset(&mut self);

    /// Returns the addressable extent in bytes.
    fn size(&self) -> u64;

    /// Dispatches a direction-tagged access; reads yield their value.
    fn access(&mut self, access: BusAccess) -> Option<u64> {
        match access {
            BusAccess::Read { offset, width } => Some(self.read(offset, width)),
            BusAccess::Write {
                offset,
                width,
                value,
            } => {
                self.write(offset, width, value);
                None
            }
        }
    }
}
