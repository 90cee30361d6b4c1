//! STM32H747 power controller (PWR).
//!
//! Only the control, status and domain-3 control registers are modelled.
//! Unmodelled bits are declared as tagged fields so firmware writes to them
//! show up in diagnostics.

use crate::{
    AccessWidth, BankConfig, BankDiagnostics, BuildError, BusPeripheral, EnumValue, FieldDecl,
    FieldEnum, FieldError, FieldId, FieldMode, InvalidEnumPolicy, RegisterBank, RegisterDecl,
};

/// Addressable extent of the PWR block.
pub const PWR_SIZE: u64 = 0x400;

/// Control register 1.
pub const PWR_CR1: u64 = 0x00;

/// Control and status register 1.
pub const PWR_CSR1: u64 = 0x04;

/// Domain 3 control register.
pub const PWR_D3CR: u64 = 0x18;

const CR1_RESET: u64 = 0xF000_C000;
const CSR1_RESET: u64 = 0x0000_4000;
const D3CR_RESET: u64 = 0x0000_6000;

const CR1_SVOS: FieldId = FieldId::new(PWR_CR1, 14);
const CSR1_ODRDY: FieldId = FieldId::new(PWR_CSR1, 16);
const CSR1_ODSWRDY: FieldId = FieldId::new(PWR_CSR1, 17);
const CSR1_UDRDY: FieldId = FieldId::new(PWR_CSR1, 18);
const D3CR_VOSRDY: FieldId = FieldId::new(PWR_D3CR, 13);
const D3CR_VOS: FieldId = FieldId::new(PWR_D3CR, 14);

macro_rules! field_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$variant_meta:meta])* $variant:ident = $value:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
        pub enum $name {
            $($(#[$variant_meta])* $variant = $value,)+
        }

        impl FieldEnum for $name {
            const DISCRIMINANTS: &'static [u64] = &[$($value),+];

            fn from_bits(bits: u64) -> Option<Self> {
                match bits {
                    $($value => Some(Self::$variant),)+
                    _ => None,
                }
            }

            fn bits(self) -> u64 {
                self as u64
            }
        }
    };
}

field_enum! {
    /// Programmable voltage detector threshold (`PLS`).
    PvdLevel {
        /// 1.95 V.
        V1_95 = 0,
        /// 2.1 V.
        V2_1 = 1,
        /// 2.25 V.
        V2_25 = 2,
        /// 2.4 V.
        V2_4 = 3,
        /// 2.55 V.
        V2_55 = 4,
        /// 2.7 V.
        V2_7 = 5,
        /// 2.85 V.
        V2_85 = 6,
        /// External `PVD_IN` pin.
        ExternalInput = 7,
    }
}

field_enum! {
    /// Regulator voltage scaling in run mode (`VOS`).
    VoltageScaling {
        /// Not a legal setting.
        Reserved = 0,
        /// Scale 3.
        ScaleMode3 = 1,
        /// Scale 2.
        ScaleMode2 = 2,
        /// Scale 1.
        ScaleMode1 = 3,
    }
}

field_enum! {
    /// Regulator voltage scaling in stop mode (`SVOS`).
    SystemStopScaling {
        /// Not a legal setting.
        Reserved = 0,
        /// Scale 5.
        ScaleMode5 = 1,
        /// Scale 4.
        ScaleMode4 = 2,
        /// Scale 3.
        ScaleMode3 = 3,
    }
}

field_enum! {
    /// Analog voltage detector threshold (`ALS`).
    AnalogVoltageLevel {
        /// 1.7 V.
        V1_7 = 0,
        /// 2.1 V.
        V2_1 = 1,
        /// 2.5 V.
        V2_5 = 2,
        /// 2.8 V.
        V2_8 = 3,
    }
}

field_enum! {
    /// Under-drive ready status (`UDRDY`).
    UnderDriveReady {
        /// Under-drive is off.
        UnderDriveDisabled = 0,
        /// Reserved encoding.
        Reserved1 = 1,
        /// Reserved encoding.
        Reserved2 = 2,
        /// Under-drive is active in stop mode.
        UnderDriveActivated = 3,
    }
}

/// Peripheral state shared with field callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PwrState {
    /// Run-mode voltage scaling changes committed by firmware.
    pub voltage_scaling_transitions: u32,
    /// Writes of a reserved scaling selection that were corrected.
    pub corrected_scaling_writes: u32,
}

/// STM32H747 power controller.
#[derive(Debug)]
pub struct Stm32h747Pwr {
    bank: RegisterBank<PwrState>,
    state: PwrState,
}

impl Stm32h747Pwr {
    /// Builds the register map in its reset state.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] if the register declarations are inconsistent.
    pub fn new() -> Result<Self, BuildError> {
        Ok(Self {
            bank: declare()?,
            state: PwrState::default(),
        })
    }

    /// Returns the underlying register bank.
    #[must_use]
    pub const fn bank(&self) -> &RegisterBank<PwrState> {
        &self.bank
    }

    /// Returns the peripheral state.
    #[must_use]
    pub const fn state(&self) -> &PwrState {
        &self.state
    }

    /// Returns the diagnostics recorded so far.
    #[must_use]
    pub const fn diagnostics(&self) -> &BankDiagnostics {
        self.bank.diagnostics()
    }

    /// Returns the stop-mode voltage scaling selection.
    #[must_use]
    pub fn system_stop_scaling(&self) -> Option<SystemStopScaling> {
        self.bank
            .enum_field(CR1_SVOS)
            .ok()
            .and_then(EnumValue::known)
    }

    /// Returns the run-mode voltage scaling selection.
    #[must_use]
    pub fn voltage_scaling(&self) -> Option<VoltageScaling> {
        self.bank
            .enum_field(D3CR_VOS)
            .ok()
            .and_then(EnumValue::known)
    }

    /// Returns `true` when the run-mode voltage scaling is ready.
    #[must_use]
    pub fn voltage_scaling_ready(&self) -> bool {
        self.bank.flag(D3CR_VOSRDY) == Ok(true)
    }

    /// Returns `true` when over-drive is ready.
    #[must_use]
    pub fn overdrive_ready(&self) -> bool {
        self.bank.flag(CSR1_ODRDY) == Ok(true)
    }

    /// Returns `true` when over-drive switching is ready.
    #[must_use]
    pub fn overdrive_switching_ready(&self) -> bool {
        self.bank.flag(CSR1_ODSWRDY) == Ok(true)
    }

    /// Returns the under-drive ready status.
    #[must_use]
    pub fn underdrive_ready(&self) -> Option<UnderDriveReady> {
        self.bank
            .enum_field(CSR1_UDRDY)
            .ok()
            .and_then(EnumValue::known)
    }

    /// Drives the over-drive ready status bit.
    ///
    /// # Errors
    ///
    /// Propagates [`FieldError`] from the bank.
    pub fn set_overdrive_ready(&mut self, ready: bool) -> Result<(), FieldError> {
        self.bank.set_flag(CSR1_ODRDY, ready)
    }

    /// Drives the over-drive switching ready status bit.
    ///
    /// # Errors
    ///
    /// Propagates [`FieldError`] from the bank.
    pub fn set_overdrive_switching_ready(&mut self, ready: bool) -> Result<(), FieldError> {
        self.bank.set_flag(CSR1_ODSWRDY, ready)
    }

    /// Drives the under-drive ready status field.
    ///
    /// # Errors
    ///
    /// Propagates [`FieldError`] from the bank.
    pub fn set_underdrive_ready(&mut self, status: UnderDriveReady) -> Result<(), FieldError> {
        self.bank.set_enum(CSR1_UDRDY, status)
    }

    /// Drives the run-mode voltage scaling ready bit.
    ///
    /// # Errors
    ///
    /// Propagates [`FieldError`] from the bank.
    pub fn set_voltage_scaling_ready(&mut self, ready: bool) -> Result<(), FieldError> {
        self.bank.set_flag(D3CR_VOSRDY, ready)
    }
}

impl BusPeripheral for Stm32h747Pwr {
    fn read(&mut self, offset: u64, width: u8) -> u64 {
        self.bank.read(offset, width, &mut self.state)
    }

    fn write(&mut self, offset: u64, width: u8, value: u64) {
        self.bank.write(offset, width, value, &mut self.state);
    }

    fn reset(&mut self) {
        self.bank.reset();
        self.state = PwrState::default();
    }

    fn size(&self) -> u64 {
        self.bank.size()
    }
}

fn declare() -> Result<RegisterBank<PwrState>, BuildError> {
    let config = BankConfig::new(PWR_SIZE, AccessWidth::Word)
        .permit(AccessWidth::Byte)
        .permit(AccessWidth::HalfWord);

    RegisterBank::builder(config)
        .register(control1())
        .register(control_status1())
        .register(domain3_control())
        .build()
}

fn control1() -> RegisterDecl<PwrState> {
    RegisterDecl::new(PWR_CR1)
        .named("PWR_CR1")
        .reset_value(CR1_RESET)
        .fields([
            FieldDecl::tagged_flag(0).named("LPDS"),
            FieldDecl::reserved(1, 3),
            FieldDecl::tagged_flag(4).named("PVDE"),
            FieldDecl::enumeration::<PvdLevel>(
                5,
                3,
                FieldMode::ReadWrite,
                InvalidEnumPolicy::Reject,
            )
            .named("PLS"),
            FieldDecl::tagged_flag(8).named("DBP"),
            FieldDecl::tagged_flag(9).named("FLPS"),
            FieldDecl::reserved(10, 4),
            FieldDecl::enumeration::<SystemStopScaling>(
                14,
                2,
                FieldMode::ReadWrite,
                InvalidEnumPolicy::Reject,
            )
            .named("SVOS")
            .on_write(|state: &mut PwrState, view, _, new| {
                if new == SystemStopScaling::Reserved.bits() {
                    state.corrected_scaling_writes = state.corrected_scaling_writes.saturating_add(1);
                    assign(view.set_enum(CR1_SVOS.bit, SystemStopScaling::ScaleMode3));
                }
            }),
            FieldDecl::tagged_flag(16).named("AVDEN"),
            FieldDecl::enumeration::<AnalogVoltageLevel>(
                17,
                2,
                FieldMode::ReadWrite,
                InvalidEnumPolicy::Reject,
            )
            .named("ALS"),
            FieldDecl::reserved(19, 13),
        ])
}

fn control_status1() -> RegisterDecl<PwrState> {
    RegisterDecl::new(PWR_CSR1)
        .named("PWR_CSR1")
        .reset_value(CSR1_RESET)
        .fields([
            FieldDecl::reserved(0, 1),
            FieldDecl::tagged_flag(1).named("SBF"),
            FieldDecl::tagged_flag(2).named("PVDO"),
            FieldDecl::tagged_flag(3).named("BRR"),
            FieldDecl::tagged_flag(4).named("PVDO"),
            FieldDecl::reserved(5, 3),
            FieldDecl::tagged_flag(8).named("EWUP"),
            FieldDecl::tagged_flag(9).named("BER"),
            FieldDecl::reserved(10, 4),
            FieldDecl::tagged_flag(14).named("VOSRDY"),
            FieldDecl::reserved(15, 1),
            FieldDecl::flag(CSR1_ODRDY.bit, FieldMode::Read).named("ODRDY"),
            FieldDecl::flag(CSR1_ODSWRDY.bit, FieldMode::Read).named("ODSWRDY"),
            FieldDecl::enumeration::<UnderDriveReady>(
                CSR1_UDRDY.bit,
                2,
                FieldMode::WriteOneToClear,
                InvalidEnumPolicy::Reject,
            )
            .named("UDRDY"),
            FieldDecl::reserved(20, 12),
        ])
}

fn domain3_control() -> RegisterDecl<PwrState> {
    RegisterDecl::new(PWR_D3CR)
        .named("PWR_D3CR")
        .reset_value(D3CR_RESET)
        .fields([
            FieldDecl::reserved(0, 13),
            FieldDecl::flag(D3CR_VOSRDY.bit, FieldMode::Read).named("VOSRDY"),
            FieldDecl::enumeration::<VoltageScaling>(
                D3CR_VOS.bit,
                2,
                FieldMode::ReadWrite,
                InvalidEnumPolicy::Reject,
            )
            .named("VOS")
            .on_write(|state: &mut PwrState, view, _, new| {
                if new == VoltageScaling::Reserved.bits() {
                    state.corrected_scaling_writes = state.corrected_scaling_writes.saturating_add(1);
                    assign(view.set_enum(D3CR_VOS.bit, VoltageScaling::ScaleMode3));
                }
                assign(view.set_flag(D3CR_VOSRDY.bit, true));
            })
            .on_change(|state: &mut PwrState, _, old, new| {
                state.voltage_scaling_transitions =
                    state.voltage_scaling_transitions.saturating_add(1);
                tracing::debug!(old, new, "run-mode voltage scaling changed");
            }),
            FieldDecl::reserved(16, 16),
        ])
}

fn assign(result: Result<(), FieldError>) {
    if let Err(error) = result {
        tracing::error!(%error, "PWR callback assignment rejected");
    }
}
