//! Diagnostics for absorbed bus anomalies.

use crate::{AccessFault, FaultClass};

/// One absorbed anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    /// What went wrong.
    pub fault: AccessFault,
    /// Bus offset for bus-class faults; register offset otherwise.
    pub offset: u64,
    /// Register name, when the anomaly is tied to a named register.
    pub register: Option<&'static str>,
    /// Field start bit, for field-class faults.
    pub bit: Option<u32>,
    /// Field name, for named fields.
    pub field: Option<&'static str>,
    /// Written value, or the offending bits for field-class faults.
    pub value: u64,
}

impl Diagnostic {
    /// Creates a diagnostic for an access rejected before reaching a register.
    #[must_use]
    pub const fn bus(fault: AccessFault, offset: u64, value: u64) -> Self {
        Self {
            fault,
            offset,
            register: None,
            bit: None,
            field: None,
            value,
        }
    }
}

/// Receiver for diagnostics produced during register accesses.
pub trait DiagnosticSink {
    /// Records a diagnostic in occurrence order.
    fn record(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn record(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Saturating per-fault counters plus the most recent diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BankDiagnostics {
    /// Most recent diagnostic, if any.
    pub last: Option<Diagnostic>,
    /// Accesses with an illegal width.
    pub illegal_width_count: u32,
    /// Narrow accesses not aligned to their width.
    pub misaligned_count: u32,
    /// Accesses beyond the bank size.
    pub out_of_range_count: u32,
    /// Accesses to offsets with no declared register.
    pub unmapped_count: u32,
    /// Writes changing reserved bits.
    pub reserved_write_count: u32,
    /// Writes changing read-only fields.
    pub read_only_write_count: u32,
    /// Writes changing tagged fields.
    pub tagged_write_count: u32,
    /// Writes carrying invalid enum discriminants.
    pub invalid_enum_count: u32,
}

impl BankDiagnostics {
    /// Creates an empty diagnostics record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counter for one fault.
    #[must_use]
    pub const fn count(&self, fault: AccessFault) -> u32 {
        match fault {
            AccessFault::IllegalWidth => self.illegal_width_count,
            AccessFault::MisalignedAccess => self.misaligned_count,
            AccessFault::OutOfRange => self.out_of_range_count,
            AccessFault::UnmappedOffset => self.unmapped_count,
            AccessFault::ReservedWrite => self.reserved_write_count,
            AccessFault::ReadOnlyWrite => self.read_only_write_count,
            AccessFault::TaggedWrite => self.tagged_write_count,
            AccessFault::InvalidEnumValue => self.invalid_enum_count,
        }
    }

    /// Sums the counters of every fault in `class`.
    #[must_use]
    pub const fn class_count(&self, class: FaultClass) -> u32 {
        match class {
            FaultClass::Bus => self
                .illegal_width_count
                .saturating_add(self.misaligned_count)
                .saturating_add(self.out_of_range_count),
            FaultClass::Mapping => self.unmapped_count,
            FaultClass::Field => self
                .reserved_write_count
                .saturating_add(self.read_only_write_count)
                .saturating_add(self.tagged_write_count)
                .saturating_add(self.invalid_enum_count),
        }
    }

    /// Returns `true` when nothing has been recorded.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.last.is_none()
    }

    /// Clears every counter and the last diagnostic.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn counter_mut(&mut self, fault: AccessFault) -> &mut u32 {
        match fault {
            AccessFault::IllegalWidth => &mut self.illegal_width_count,
            AccessFault::MisalignedAccess => &mut self.misaligned_count,
            AccessFault::OutOfRange => &mut self.out_of_range_count,
            AccessFault::UnmappedOffset => &mut self.unmapped_count,
            AccessFault::ReservedWrite => &mut self.reserved_write_count,
            AccessFault::ReadOnlyWrite => &mut self.read_only_write_count,
            AccessFault::TaggedWrite => &mut self.tagged_write_count,
            AccessFault::InvalidEnumValue => &mut self.invalid_enum_count,
        }
    }
}

impl DiagnosticSink for BankDiagnostics {
    fn record(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(
            code = diagnostic.fault.as_u8(),
            offset = diagnostic.offset,
            register = diagnostic.register,
            bit = diagnostic.bit,
            field = diagnostic.field,
            value = diagnostic.value,
            "{}",
            diagnostic.fault
        );
        let counter = self.counter_mut(diagnostic.fault);
        *counter = counter.saturating_add(1);
        self.last = Some(diagnostic);
    }
}
