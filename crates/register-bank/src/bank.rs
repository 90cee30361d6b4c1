//! Address-indexed register banks.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

use crate::{
    AccessFault, AccessTranslator, AccessWidth, BankConfig, BankDiagnostics, BuildError,
    Diagnostic, DiagnosticSink, EnumValue, FieldEnum, FieldError, Register, RegisterDecl,
};

/// Handle naming one field by register offset and start bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId {
    /// Offset of the owning register.
    pub register: u64,
    /// Start bit of the field.
    pub bit: u32,
}

impl FieldId {
    /// Creates a field handle.
    #[must_use]
    pub const fn new(register: u64, bit: u32) -> Self {
        Self { register, bit }
    }
}

/// Collects register declarations and validates them into a bank.
#[derive(Debug)]
pub struct RegisterBankBuilder<C> {
    config: BankConfig,
    decls: Vec<RegisterDecl<C>>,
    overflow: Option<BuildError>,
}

impl<C> RegisterBankBuilder<C> {
    /// Starts an empty declaration set.
    #[must_use]
    pub const fn new(config: BankConfig) -> Self {
        Self {
            config,
            decls: Vec::new(),
            overflow: None,
        }
    }

    /// Adds one register.
    #[must_use]
    pub fn register(mut self, decl: RegisterDecl<C>) -> Self {
        self.decls.push(decl);
        self
    }

    /// Adds `count` registers at `first + index * stride`.
    ///
    /// `declare` receives the register index; the offset it declares is
    /// replaced by the computed one. An element whose offset overflows `u64`
    /// makes [`build`](Self::build) fail with
    /// [`BuildError::RegisterArrayOverflow`].
    #[must_use]
    pub fn define_many(
        mut self,
        first: u64,
        count: usize,
        stride: u64,
        mut declare: impl FnMut(usize) -> RegisterDecl<C>,
    ) -> Self {
        let mut offset = Some(first);
        for index in 0..count {
            let Some(at) = offset else {
                if self.overflow.is_none() {
                    self.overflow = Some(BuildError::RegisterArrayOverflow { first, index });
                }
                break;
            };
            self.decls.push(declare(index).at(at));
            offset = at.checked_add(stride);
        }
        self
    }

    /// Validates every declaration and builds the bank.
    ///
    /// # Errors
    ///
    /// Returns the first [`BuildError`] found: invalid size, an overflowing
    /// register array, misplaced or duplicate register offsets, or a
    /// malformed register declaration.
    pub fn build(self) -> Result<RegisterBank<C>, BuildError> {
        let Self {
            config,
            decls,
            overflow,
        } = self;
        config.validate()?;
        if let Some(error) = overflow {
            return Err(error);
        }

        let native = config.native_width;
        let mut registers = BTreeMap::new();
        for decl in decls {
            let offset = decl.offset();
            if offset % u64::from(native.bytes()) != 0 {
                return Err(BuildError::MisalignedRegister {
                    offset,
                    native_bytes: native.bytes(),
                });
            }
            if offset >= config.size {
                return Err(BuildError::RegisterOutOfRange {
                    offset,
                    size: config.size,
                });
            }
            match registers.entry(offset) {
                Entry::Occupied(_) => return Err(BuildError::DuplicateRegister { offset }),
                Entry::Vacant(slot) => {
                    slot.insert(Register::from_decl(decl, native.bits())?);
                }
            }
        }

        Ok(RegisterBank {
            config,
            translator: AccessTranslator::new(native, config.permitted),
            registers,
            diagnostics: BankDiagnostics::default(),
        })
    }
}

/// The register set of one peripheral instance.
///
/// `C` is the peripheral context handed to field callbacks on every access.
pub struct RegisterBank<C = ()> {
    config: BankConfig,
    translator: AccessTranslator,
    registers: BTreeMap<u64, Register<C>>,
    diagnostics: BankDiagnostics,
}

impl<C> RegisterBank<C> {
    /// Starts a builder for a bank with `config`.
    #[must_use]
    pub const fn builder(config: BankConfig) -> RegisterBankBuilder<C> {
        RegisterBankBuilder::new(config)
    }

    /// Returns the bank configuration.
    #[must_use]
    pub const fn config(&self) -> &BankConfig {
        &self.config
    }

    /// Returns the addressable extent in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.config.size
    }

    /// Returns the native register width.
    #[must_use]
    pub const fn native_width(&self) -> AccessWidth {
        self.config.native_width
    }

    /// Returns the width translation policy.
    #[must_use]
    pub const fn translator(&self) -> &AccessTranslator {
        &self.translator
    }

    /// Returns the diagnostics recorded so far.
    #[must_use]
    pub const fn diagnostics(&self) -> &BankDiagnostics {
        &self.diagnostics
    }

    /// Returns the diagnostics record for clearing.
    pub fn diagnostics_mut(&mut self) -> &mut BankDiagnostics {
        &mut self.diagnostics
    }

    /// Returns the register declared at `offset`.
    #[must_use]
    pub fn register(&self, offset: u64) -> Option<&Register<C>> {
        self.registers.get(&offset)
    }

    /// Iterates registers in ascending offset order.
    pub fn registers(&self) -> impl Iterator<Item = &Register<C>> {
        self.registers.values()
    }

    /// Returns what a native read at `offset` would yield, without side
    /// effects or diagnostics.
    #[must_use]
    pub fn peek(&self, offset: u64) -> Option<u64> {
        self.registers.get(&offset).map(Register::peek)
    }

    /// Reads `width` bytes at `offset`.
    ///
    /// Illegal, misaligned, out-of-range and unmapped accesses are recorded
    /// as diagnostics and read as zero.
    pub fn read(&mut self, offset: u64, width: u8, ctx: &mut C) -> u64 {
        let lane = match self.translator.resolve(offset, width) {
            Ok(lane) => lane,
            Err(fault) => {
                self.diagnostics.record(Diagnostic::bus(fault, offset, 0));
                return 0;
            }
        };
        if offset >= self.config.size {
            self.diagnostics
                .record(Diagnostic::bus(AccessFault::OutOfRange, offset, 0));
            return 0;
        }

        let Some(register) = self.registers.get_mut(&lane.register_offset) else {
            self.diagnostics
                .record(Diagnostic::bus(AccessFault::UnmappedOffset, offset, 0));
            return 0;
        };
        lane.extract(register.read_masked(lane.mask, ctx))
    }

    /// Writes `value` as `width` bytes at `offset`.
    ///
    /// Narrow writes merge into the stored native value and only process
    /// fields that intersect the written lane. Illegal, misaligned,
    /// out-of-range and unmapped accesses are recorded as diagnostics and
    /// ignored.
    pub fn write(&mut self, offset: u64, width: u8, value: u64, ctx: &mut C) {
        let lane = match self.translator.resolve(offset, width) {
            Ok(lane) => lane,
            Err(fault) => {
                self.diagnostics
                    .record(Diagnostic::bus(fault, offset, value));
                return;
            }
        };
        if offset >= self.config.size {
            self.diagnostics
                .record(Diagnostic::bus(AccessFault::OutOfRange, offset, value));
            return;
        }

        let Some(register) = self.registers.get_mut(&lane.register_offset) else {
            self.diagnostics
                .record(Diagnostic::bus(AccessFault::UnmappedOffset, offset, value));
            return;
        };
        let merged = lane.merge(register.stored(), value);
        register.write_masked(merged, lane.mask, ctx, &mut self.diagnostics);
    }

    /// Restores every register to its reset value without firing callbacks.
    ///
    /// Diagnostics are kept.
    pub fn reset(&mut self) {
        for register in self.registers.values_mut() {
            register.reset();
        }
    }

    /// Reads a field value.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::UnknownField`] when `id` names no field.
    pub fn field(&self, id: FieldId) -> Result<u64, FieldError> {
        self.registers
            .get(&id.register)
            .ok_or(FieldError::UnknownField {
                register: id.register,
                bit: id.bit,
            })?
            .get(id.bit)
    }

    /// Reads a flag.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::UnknownField`] when `id` names no field.
    pub fn flag(&self, id: FieldId) -> Result<bool, FieldError> {
        self.field(id).map(|value| value != 0)
    }

    /// Reads an enum field.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::UnknownField`] when `id` names no field.
    pub fn enum_field<E: FieldEnum>(&self, id: FieldId) -> Result<EnumValue<E>, FieldError> {
        self.field(id).map(EnumValue::from_bits)
    }

    /// Assigns a field from peripheral logic; no callbacks fire and the
    /// field's bus access mode does not apply.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError`] when `id` names no field, the field is a
    /// constant or a placeholder, or the value does not fit.
    pub fn set_field(&mut self, id: FieldId, value: u64) -> Result<(), FieldError> {
        self.registers
            .get_mut(&id.register)
            .ok_or(FieldError::UnknownField {
                register: id.register,
                bit: id.bit,
            })?
            .set(id.bit, value)
    }

    /// Assigns a flag from peripheral logic.
    ///
    /// # Errors
    ///
    /// See [`RegisterBank::set_field`].
    pub fn set_flag(&mut self, id: FieldId, value: bool) -> Result<(), FieldError> {
        self.set_field(id, u64::from(value))
    }

    /// Assigns an enum field from peripheral logic.
    ///
    /// # Errors
    ///
    /// See [`RegisterBank::set_field`].
    pub fn set_enum<E: FieldEnum>(&mut self, id: FieldId, value: E) -> Result<(), FieldError> {
        self.set_field(id, value.bits())
    }
}

impl<C> fmt::Debug for RegisterBank<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterBank")
            .field("config", &self.config)
            .field("registers", &self.registers)
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::{FieldId, RegisterBank};
    use crate::{
        AccessFault, AccessWidth, BankConfig, BuildError, FieldDecl, FieldError, FieldMode,
        InvalidEnumPolicy, RegisterDecl,
    };

    fn config() -> BankConfig {
        BankConfig::new(0x20, AccessWidth::Word)
            .permit(AccessWidth::Byte)
            .permit(AccessWidth::HalfWord)
    }

    fn bank() -> RegisterBank {
        RegisterBank::builder(config())
            .register(
                RegisterDecl::new(0x00)
                    .named("CTRL")
                    .reset_value(0x0000_0100)
                    .field(FieldDecl::value(0, 8, FieldMode::ReadWrite))
                    .field(FieldDecl::value(8, 8, FieldMode::ReadWrite))
                    .field(FieldDecl::value(16, 16, FieldMode::ReadWrite)),
            )
            .register(
                RegisterDecl::new(0x04)
                    .named("STATUS")
                    .field(FieldDecl::flag(0, FieldMode::Read)),
            )
            .build()
            .expect("valid bank")
    }

    #[test]
    fn native_access_round_trips() {
        let mut bank = bank();
        bank.write(0x00, 4, 0xDEAD_BEEF, &mut ());
        assert_eq!(bank.read(0x00, 4, &mut ()), 0xDEAD_BEEF);
        assert!(bank.diagnostics().is_clean());
    }

    #[test]
    fn narrow_reads_extract_lanes() {
        let mut bank = bank();
        bank.write(0x00, 4, 0x4433_2211, &mut ());
        assert_eq!(bank.read(0x00, 1, &mut ()), 0x11);
        assert_eq!(bank.read(0x01, 1, &mut ()), 0x22);
        assert_eq!(bank.read(0x03, 1, &mut ()), 0x44);
        assert_eq!(bank.read(0x02, 2, &mut ()), 0x4433);
    }

    #[test]
    fn narrow_write_preserves_other_lanes() {
        let mut bank = bank();
        bank.write(0x00, 4, 0x4433_2211, &mut ());
        bank.write(0x01, 1, 0xAA, &mut ());
        assert_eq!(bank.read(0x00, 4, &mut ()), 0x4433_AA11);
        bank.write(0x02, 2, 0xBBCC, &mut ());
        assert_eq!(bank.read(0x00, 4, &mut ()), 0xBBCC_AA11);
    }

    #[test]
    fn illegal_width_reads_zero_and_is_diagnosed() {
        let mut bank = bank();
        bank.write(0x00, 4, 0xFFFF_FFFF, &mut ());
        assert_eq!(bank.read(0x00, 3, &mut ()), 0);
        bank.write(0x00, 3, 0, &mut ());
        assert_eq!(bank.read(0x00, 4, &mut ()), 0xFFFF_FFFF);
        assert_eq!(bank.diagnostics().illegal_width_count, 2);
    }

    #[test]
    fn unmapped_offset_reads_zero_and_is_diagnosed() {
        let mut bank = bank();
        assert_eq!(bank.read(0x10, 4, &mut ()), 0);
        bank.write(0x11, 1, 0xFF, &mut ());
        assert_eq!(bank.diagnostics().unmapped_count, 2);
        assert_eq!(
            bank.diagnostics().last.map(|d| (d.fault, d.offset, d.value)),
            Some((AccessFault::UnmappedOffset, 0x11, 0xFF))
        );
    }

    #[test]
    fn out_of_range_and_misaligned_accesses_are_diagnosed() {
        let mut bank = bank();
        assert_eq!(bank.read(0x20, 4, &mut ()), 0);
        assert_eq!(bank.read(0x01, 2, &mut ()), 0);
        assert_eq!(bank.diagnostics().out_of_range_count, 1);
        assert_eq!(bank.diagnostics().misaligned_count, 1);
    }

    #[test]
    fn reset_restores_every_register_and_keeps_diagnostics() {
        let mut bank = bank();
        bank.write(0x00, 4, 0x1234_5678, &mut ());
        bank.write(0x04, 4, 0x1, &mut ());
        bank.reset();
        assert_eq!(bank.read(0x00, 4, &mut ()), 0x0000_0100);
        assert_eq!(bank.read(0x04, 4, &mut ()), 0);
        assert_eq!(bank.diagnostics().read_only_write_count, 1);
    }

    #[test]
    fn internal_field_access_uses_handles() {
        let mut bank = bank();
        let ready = FieldId::new(0x04, 0);
        bank.set_flag(ready, true).expect("known flag");
        assert_eq!(bank.flag(ready), Ok(true));
        assert_eq!(bank.read(0x04, 4, &mut ()), 1);
        assert_eq!(
            bank.field(FieldId::new(0x08, 0)),
            Err(FieldError::UnknownField {
                register: 0x08,
                bit: 0
            })
        );
        assert_eq!(
            bank.set_field(FieldId::new(0x00, 3), 1),
            Err(FieldError::UnknownField {
                register: 0x00,
                bit: 3
            })
        );
        assert_eq!(
            bank.set_field(FieldId::new(0x04, 1), 1),
            Err(FieldError::PlaceholderField)
        );
        assert_eq!(bank.peek(0x04), Some(1));
        assert!(bank.diagnostics().is_clean());
    }

    #[test]
    fn invalid_discriminants_follow_field_policy() {
        let mut bank: RegisterBank = RegisterBank::builder(config())
            .register(
                RegisterDecl::new(0x00).reset_value(1).field(FieldDecl::enumeration_of(
                    0,
                    2,
                    FieldMode::ReadWrite,
                    &[1, 2, 3],
                    InvalidEnumPolicy::Clamp(3),
                )),
            )
            .register(
                RegisterDecl::new(0x04).reset_value(1).field(FieldDecl::enumeration_of(
                    0,
                    2,
                    FieldMode::ReadWrite,
                    &[1, 2],
                    InvalidEnumPolicy::AcceptVerbatim,
                )),
            )
            .build()
            .expect("valid bank");

        bank.write(0x00, 4, 0, &mut ());
        assert_eq!(bank.read(0x00, 4, &mut ()), 3);

        bank.write(0x04, 4, 0, &mut ());
        assert_eq!(bank.read(0x04, 4, &mut ()), 0);

        assert_eq!(bank.diagnostics().invalid_enum_count, 2);
    }

    #[test]
    fn define_many_places_registers_at_stride() {
        let bank: RegisterBank = RegisterBank::builder(config())
            .define_many(0x10, 3, 4, |_| {
                RegisterDecl::new(0).field(FieldDecl::value(0, 32, FieldMode::ReadWrite))
            })
            .build()
            .expect("valid bank");
        let offsets: Vec<u64> = bank.registers().map(|r| r.offset()).collect();
        assert_eq!(offsets, vec![0x10, 0x14, 0x18]);
    }

    #[test]
    fn build_rejects_misplaced_registers() {
        let duplicate = RegisterBank::<()>::builder(config())
            .register(RegisterDecl::new(0x04))
            .register(RegisterDecl::new(0x04))
            .build();
        assert_eq!(
            duplicate.err(),
            Some(BuildError::DuplicateRegister { offset: 0x04 })
        );

        let misaligned = RegisterBank::<()>::builder(config())
            .register(RegisterDecl::new(0x02))
            .build();
        assert_eq!(
            misaligned.err(),
            Some(BuildError::MisalignedRegister {
                offset: 0x02,
                native_bytes: 4
            })
        );

        let outside = RegisterBank::<()>::builder(config())
            .register(RegisterDecl::new(0x20))
            .build();
        assert_eq!(
            outside.err(),
            Some(BuildError::RegisterOutOfRange {
                offset: 0x20,
                size: 0x20
            })
        );
    }

    #[test]
    fn callbacks_receive_peripheral_context() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let mut bank = RegisterBank::builder(config())
            .register(RegisterDecl::new(0x00).field(
                FieldDecl::value(0, 8, FieldMode::ReadWrite).on_write(
                    move |writes: &mut u32, _, old, new| {
                        *writes += 1;
                        log.lock().expect("lock").push((old, new));
                    },
                ),
            ))
            .build()
            .expect("valid bank");

        let mut writes = 0_u32;
        bank.write(0x00, 4, 0x12, &mut writes);
        bank.write(0x00, 1, 0x34, &mut writes);
        bank.write(0x01, 1, 0x56, &mut writes);

        assert_eq!(writes, 2);
        assert_eq!(*seen.lock().expect("lock"), vec![(0x00, 0x12), (0x12, 0x34)]);
    }
}
