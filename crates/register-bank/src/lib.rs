//! Declarative memory-mapped register banks for peripheral emulation.
//!
//! A peripheral declares its registers once through [`RegisterBankBuilder`];
//! the resulting [`RegisterBank`] decodes bus accesses, applies per-field
//! access policy and absorbs malformed accesses as [`Diagnostic`]s instead of
//! surfacing errors to the bus.

/// Access widths and permitted-width sets.
pub mod width;
pub use width::{AccessWidth, PermittedWidths};

/// Access fault taxonomy and construction errors.
pub mod fault;
pub use fault::{AccessFault, BuildError, FaultClass, FieldError};

/// Narrow-access translation onto native registers.
pub mod translation;
pub use translation::{AccessTranslator, Lane};

/// Field declarations and write policy.
pub mod field;
pub use field::{
    EnumValue, FieldDecl, FieldEnum, FieldKind, FieldLayout, FieldMode, InvalidEnumPolicy,
    ReadHook, ValueProvider, WriteHook,
};

/// Diagnostics for absorbed anomalies.
pub mod diag;
pub use diag::{BankDiagnostics, Diagnostic, DiagnosticSink};

/// Registers and the callback view.
pub mod register;
pub use register::{Register, RegisterDecl, RegisterView};

/// Register banks and their builder.
pub mod bank;
pub use bank::{FieldId, RegisterBank, RegisterBankBuilder};

/// Public bus contract and bank configuration.
pub mod api;
pub use api::{BankConfig, BusAccess, BusPeripheral, DEFAULT_BANK_SIZE};

/// Peripheral models built on register banks.
pub mod peripherals;
pub use peripherals::{PwrState, Stm32h747Pwr};

#[cfg(test)]
use proptest as _;
