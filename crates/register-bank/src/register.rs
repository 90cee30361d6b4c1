//! Fixed-width registers built from partitioned fields.

use std::fmt;

use crate::field::FieldHooks;
use crate::width::low_mask;
use crate::{
    AccessFault, BuildError, Diagnostic, DiagnosticSink, EnumValue, FieldDecl, FieldEnum,
    FieldError, FieldKind, FieldLayout, FieldMode, InvalidEnumPolicy,
};

/// Declaration record for one register.
#[derive(Debug)]
pub struct RegisterDecl<C> {
    pub(crate) offset: u64,
    pub(crate) name: Option<&'static str>,
    pub(crate) reset_value: u64,
    pub(crate) fields: Vec<FieldDecl<C>>,
}

impl<C> RegisterDecl<C> {
    /// Starts a register declaration at `offset` with a zero reset value.
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self {
            offset,
            name: None,
            reset_value: 0,
            fields: Vec::new(),
        }
    }

    /// Moves the declaration to another offset.
    #[must_use]
    pub fn at(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Attaches a diagnostic name.
    #[must_use]
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    /// Sets the reset value.
    #[must_use]
    pub fn reset_value(mut self, value: u64) -> Self {
        self.reset_value = value;
        self
    }

    /// Appends a field declaration.
    #[must_use]
    pub fn field(mut self, field: FieldDecl<C>) -> Self {
        self.fields.push(field);
        self
    }

    /// Appends several field declarations.
    #[must_use]
    pub fn fields(mut self, fields: impl IntoIterator<Item = FieldDecl<C>>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Returns the declared offset.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }
}

/// Mutable view of one register's field values, handed to callbacks.
///
/// The view lives only for the duration of the access that created it.
/// Fields are addressed by their start bit.
pub struct RegisterView<'a> {
    offset: u64,
    layouts: &'a [FieldLayout],
    values: &'a mut [u64],
}

impl RegisterView<'_> {
    /// Returns the offset of the register being accessed.
    #[must_use]
    pub const fn register_offset(&self) -> u64 {
        self.offset
    }

    /// Returns the packed stored value of the register.
    #[must_use]
    pub fn value(&self) -> u64 {
        pack_stored(self.layouts, self.values)
    }

    /// Reads the field starting at `bit`.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::UnknownField`] when no field starts at `bit`.
    pub fn get(&self, bit: u32) -> Result<u64, FieldError> {
        let index = field_index(self.layouts, self.offset, bit)?;
        Ok(self.values[index])
    }

    /// Reads the flag starting at `bit`.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::UnknownField`] when no field starts at `bit`.
    pub fn flag(&self, bit: u32) -> Result<bool, FieldError> {
        self.get(bit).map(|value| value != 0)
    }

    /// Reads the enum field starting at `bit`.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::UnknownField`] when no field starts at `bit`.
    pub fn enum_value<E: FieldEnum>(&self, bit: u32) -> Result<EnumValue<E>, FieldError> {
        self.get(bit).map(EnumValue::from_bits)
    }

    /// Assigns the field starting at `bit` without firing callbacks.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError`] when the field is unknown, constant, reserved or
    /// unmodelled, or the value does not fit the field.
    pub fn set(&mut self, bit: u32, value: u64) -> Result<(), FieldError> {
        let index = field_index(self.layouts, self.offset, bit)?;
        self.layouts[index].check_assignment(value)?;
        self.values[index] = value;
        Ok(())
    }

    /// Assigns the flag starting at `bit`.
    ///
    /// # Errors
    ///
    /// See [`RegisterView::set`].
    pub fn set_flag(&mut self, bit: u32, value: bool) -> Result<(), FieldError> {
        self.set(bit, u64::from(value))
    }

    /// Assigns the enum field starting at `bit`.
    ///
    /// # Errors
    ///
    /// See [`RegisterView::set`].
    pub fn set_enum<E: FieldEnum>(&mut self, bit: u32, value: E) -> Result<(), FieldError> {
        self.set(bit, value.bits())
    }
}

impl fmt::Debug for RegisterView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterView")
            .field("offset", &self.offset)
            .field("value", &self.value())
            .finish()
    }
}

/// A fixed-width register whose fields partition its bits.
pub struct Register<C> {
    offset: u64,
    name: Option<&'static str>,
    bits: u32,
    reset_value: u64,
    layouts: Vec<FieldLayout>,
    hooks: Vec<FieldHooks<C>>,
    values: Vec<u64>,
}

impl<C> Register<C> {
    /// Validates a declaration and builds a register of `bits` width.
    ///
    /// Undeclared gaps become reserved fields.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] when fields overlap, exceed the register, have
    /// illegal widths, or when the reset value is too wide or unpacks to an
    /// invalid enum discriminant.
    pub fn from_decl(decl: RegisterDecl<C>, bits: u32) -> Result<Self, BuildError> {
        let RegisterDecl {
            offset,
            name,
            reset_value,
            mut fields,
        } = decl;

        if reset_value & !low_mask(bits) != 0 {
            return Err(BuildError::ResetValueTooWide {
                register: offset,
                value: reset_value,
            });
        }

        fields.sort_by_key(|field| field.layout.bit);

        let mut layouts = Vec::with_capacity(fields.len());
        let mut hooks = Vec::with_capacity(fields.len());
        let mut cursor = 0_u32;
        let mut previous_bit = 0_u32;

        for field in fields {
            let FieldDecl { layout, hooks: field_hooks } = field;
            validate_shape(offset, bits, &layout)?;

            if layout.bit < cursor {
                return Err(BuildError::OverlappingFields {
                    register: offset,
                    first: previous_bit,
                    second: layout.bit,
                });
            }
            if layout.bit > cursor {
                layouts.push(FieldLayout::implicit_reserved(cursor, layout.bit - cursor));
                hooks.push(FieldHooks::default());
            }

            validate_enum(offset, reset_value, &layout)?;

            cursor = layout.bit + layout.width;
            previous_bit = layout.bit;
            layouts.push(layout);
            hooks.push(field_hooks);
        }

        if cursor < bits {
            layouts.push(FieldLayout::implicit_reserved(cursor, bits - cursor));
            hooks.push(FieldHooks::default());
        }

        let mut register = Self {
            offset,
            name,
            bits,
            reset_value,
            values: vec![0; layouts.len()],
            layouts,
            hooks,
        };
        register.reset();
        Ok(register)
    }

    /// Returns the register offset within its bank.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the diagnostic name, if any.
    #[must_use]
    pub const fn name(&self) -> Option<&'static str> {
        self.name
    }

    /// Returns the register width in bits.
    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Returns the declared reset value.
    #[must_use]
    pub const fn reset_value(&self) -> u64 {
        self.reset_value
    }

    /// Returns the field layouts in ascending bit order, gaps included.
    #[must_use]
    pub fn fields(&self) -> &[FieldLayout] {
        &self.layouts
    }

    /// Returns what a read would yield, without read side effects.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.layouts
            .iter()
            .zip(&self.values)
            .filter(|(layout, _)| layout.mode.is_readable())
            .fold(0, |acc, (layout, value)| acc | layout.place(*value))
    }

    /// Returns every stored field value packed, write-only fields included.
    #[must_use]
    pub fn stored(&self) -> u64 {
        pack_stored(&self.layouts, &self.values)
    }

    /// Reads the field starting at `bit`.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::UnknownField`] when no field starts at `bit`.
    pub fn get(&self, bit: u32) -> Result<u64, FieldError> {
        let index = field_index(&self.layouts, self.offset, bit)?;
        Ok(self.values[index])
    }

    /// Assigns the field starting at `bit` without firing callbacks.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError`] when the field is unknown, constant, reserved or
    /// unmodelled, or the value does not fit the field.
    pub fn set(&mut self, bit: u32, value: u64) -> Result<(), FieldError> {
        let index = field_index(&self.layouts, self.offset, bit)?;
        self.layouts[index].check_assignment(value)?;
        self.values[index] = value;
        Ok(())
    }

    /// Restores every field to its slice of the reset value.
    ///
    /// No callbacks fire.
    pub fn reset(&mut self) {
        for (layout, value) in self.layouts.iter().zip(self.values.iter_mut()) {
            *value = layout.extract(self.reset_value);
        }
    }

    /// Reads the whole register.
    pub fn read(&mut self, ctx: &mut C) -> u64 {
        self.read_masked(low_mask(self.bits), ctx)
    }

    /// Writes the whole register.
    pub fn write(&mut self, value: u64, ctx: &mut C, sink: &mut impl DiagnosticSink) {
        self.write_masked(value, low_mask(self.bits), ctx, sink);
    }

    /// Reads the register, running read side effects only for fields that
    /// intersect `mask`.
    ///
    /// Value providers and read callbacks run in ascending bit order before
    /// packing; read-to-clear fields clear after packing.
    pub fn read_masked(&mut self, mask: u64, ctx: &mut C) -> u64 {
        for index in 0..self.layouts.len() {
            let layout = &self.layouts[index];
            if layout.mask() & mask == 0 {
                continue;
            }
            if layout.kind == FieldKind::Tagged {
                tracing::debug!(
                    offset = self.offset,
                    register = self.name,
                    bit = layout.bit,
                    field = layout.name,
                    "read from tagged field"
                );
            }

            let hooks = &mut self.hooks[index];
            if let Some(provider) = hooks.provider.as_mut() {
                let provided = provider(ctx, self.values[index]) & low_mask(layout.width);
                self.values[index] = layout.resolve_enum(self.values[index], provided).0;
            }
            if let Some(on_read) = hooks.on_read.as_mut() {
                let current = self.values[index];
                let mut view = RegisterView {
                    offset: self.offset,
                    layouts: &self.layouts,
                    values: &mut self.values,
                };
                on_read(ctx, &mut view, current);
            }
        }

        let value = self.peek();

        for (layout, stored) in self.layouts.iter().zip(self.values.iter_mut()) {
            if layout.mode == FieldMode::ReadToClear && layout.mask() & mask != 0 {
                *stored = 0;
            }
        }

        value
    }

    /// Writes the register, processing only fields that intersect `mask`.
    ///
    /// Fields are processed in ascending bit order: the candidate bits are
    /// passed through the field's mode and enum policy, committed, and then
    /// the write and change callbacks fire. Fields outside `mask` keep their
    /// value and observe no callback. A field that straddles the edge of
    /// `mask` only has its bits inside `mask` subjected to its mode.
    pub fn write_masked(
        &mut self,
        value: u64,
        mask: u64,
        ctx: &mut C,
        sink: &mut impl DiagnosticSink,
    ) {
        for index in 0..self.layouts.len() {
            let layout = &self.layouts[index];
            if layout.mask() & mask == 0 {
                continue;
            }

            let candidate = layout.extract(value);
            let old = self.values[index];

            let discarded = match layout.kind {
                FieldKind::Reserved => Some(AccessFault::ReservedWrite),
                FieldKind::Tagged => Some(AccessFault::TaggedWrite),
                _ if !layout.mode.is_writable() => Some(AccessFault::ReadOnlyWrite),
                _ => None,
            };
            if let Some(fault) = discarded {
                if candidate != old {
                    sink.record(self.diagnostic(index, fault, candidate));
                }
                continue;
            }

            let Some(next) = layout.mode.apply(old, candidate) else {
                continue;
            };
            let lane_bits = layout.extract(mask);
            let next = (next & lane_bits) | (old & !lane_bits);
            let (new, invalid) = layout.resolve_enum(old, next);
            if invalid {
                sink.record(self.diagnostic(index, AccessFault::InvalidEnumValue, next));
            }
            self.values[index] = new;

            let hooks = &mut self.hooks[index];
            if let Some(on_write) = hooks.on_write.as_mut() {
                let mut view = RegisterView {
                    offset: self.offset,
                    layouts: &self.layouts,
                    values: &mut self.values,
                };
                on_write(ctx, &mut view, old, new);
            }
            if let Some(on_change) = hooks.on_change.as_mut() {
                let current = self.values[index];
                if current != old {
                    let mut view = RegisterView {
                        offset: self.offset,
                        layouts: &self.layouts,
                        values: &mut self.values,
                    };
                    on_change(ctx, &mut view, old, current);
                }
            }
        }
    }

    fn diagnostic(&self, index: usize, fault: AccessFault, value: u64) -> Diagnostic {
        let layout = &self.layouts[index];
        Diagnostic {
            fault,
            offset: self.offset,
            register: self.name,
            bit: Some(layout.bit),
            field: layout.name,
            value,
        }
    }
}

impl<C> fmt::Debug for Register<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Register")
            .field("offset", &self.offset)
            .field("name", &self.name)
            .field("bits", &self.bits)
            .field("reset_value", &self.reset_value)
            .field("value", &self.stored())
            .field("fields", &self.layouts)
            .finish_non_exhaustive()
    }
}

fn pack_stored(layouts: &[FieldLayout], values: &[u64]) -> u64 {
    layouts
        .iter()
        .zip(values)
        .fold(0, |acc, (layout, value)| acc | layout.place(*value))
}

fn field_index(layouts: &[FieldLayout], register: u64, bit: u32) -> Result<usize, FieldError> {
    layouts
        .binary_search_by_key(&bit, FieldLayout::bit)
        .map_err(|_| FieldError::UnknownField { register, bit })
}

fn validate_shape(register: u64, bits: u32, layout: &FieldLayout) -> Result<(), BuildError> {
    if layout.width == 0 {
        return Err(BuildError::ZeroWidthField {
            register,
            bit: layout.bit,
        });
    }
    if layout.kind == FieldKind::Flag && layout.width != 1 {
        return Err(BuildError::FlagWidth {
            register,
            bit: layout.bit,
            width: layout.width,
        });
    }
    if u64::from(layout.bit) + u64::from(layout.width) > u64::from(bits) {
        return Err(BuildError::FieldExceedsRegister {
            register,
            bit: layout.bit,
            width: layout.width,
            register_bits: bits,
        });
    }
    Ok(())
}

fn validate_enum(register: u64, reset_value: u64, layout: &FieldLayout) -> Result<(), BuildError> {
    let FieldKind::Enum {
        discriminants,
        policy,
    } = &layout.kind
    else {
        return Ok(());
    };

    if let Some(&value) = discriminants
        .iter()
        .find(|value| *value & !low_mask(layout.width) != 0)
    {
        return Err(BuildError::DiscriminantTooWide {
            register,
            bit: layout.bit,
            value,
        });
    }
    if discriminants.is_empty() {
        return Err(BuildError::EmptyEnum {
            register,
            bit: layout.bit,
        });
    }
    if let InvalidEnumPolicy::Clamp(target) = policy {
        if !layout.accepts(*target) {
            return Err(BuildError::InvalidClampTarget {
                register,
                bit: layout.bit,
                value: *target,
            });
        }
    }
    let reset_slice = layout.extract(reset_value);
    if !layout.accepts(reset_slice) {
        return Err(BuildError::InvalidResetEnum {
            register,
            bit: layout.bit,
            value: reset_slice,
        });
    }
    Ok(())
}
