//! Power controller behaviour as seen from a system bus.

#![allow(clippy::pedantic, clippy::nursery)]

use proptest as _;
use register_bank::peripherals::{
    SystemStopScaling, UnderDriveReady, VoltageScaling, PWR_CR1, PWR_CSR1, PWR_D3CR,
};
use register_bank::{AccessFault, BusAccess, BusPeripheral, FaultClass, Stm32h747Pwr};
use rstest::{fixture, rstest};
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

const PWR_BASE: u64 = 0x5802_4800;

/// Minimal system bus routing absolute addresses to one mapped peripheral.
struct SystemBus {
    base: u64,
    peripheral: Box<dyn BusPeripheral>,
}

impl SystemBus {
    fn new(base: u64, peripheral: Box<dyn BusPeripheral>) -> Self {
        Self { base, peripheral }
    }

    fn read(&mut self, address: u64, width: u8) -> Option<u64> {
        let offset = self.route(address)?;
        self.peripheral
            .access(BusAccess::Read { offset, width })
    }

    fn write(&mut self, address: u64, width: u8, value: u64) {
        if let Some(offset) = self.route(address) {
            self.peripheral.access(BusAccess::Write {
                offset,
                width,
                value,
            });
        }
    }

    fn route(&self, address: u64) -> Option<u64> {
        let offset = address.checked_sub(self.base)?;
        (offset < self.peripheral.size()).then_some(offset)
    }
}

#[fixture]
fn pwr() -> Stm32h747Pwr {
    Stm32h747Pwr::new().expect("valid PWR declaration")
}

#[rstest]
fn firmware_boot_sequence_through_the_bus(pwr: Stm32h747Pwr) {
    let mut bus = SystemBus::new(PWR_BASE, Box::new(pwr));

    // Select scale 1, then poll VOSRDY.
    let d3cr = bus.read(PWR_BASE + PWR_D3CR, 4).expect("mapped");
    bus.write(PWR_BASE + PWR_D3CR, 4, (d3cr & !0xC000) | 0xC000);
    let d3cr = bus.read(PWR_BASE + PWR_D3CR, 4).expect("mapped");
    assert_eq!(d3cr & 0xC000, 0xC000);
    assert_ne!(d3cr & (1 << 13), 0);

    assert_eq!(bus.read(PWR_BASE + 0x400, 4), None);
    bus.peripheral.reset();
    assert_eq!(bus.read(PWR_BASE + PWR_D3CR, 4), Some(0x6000));
}

#[rstest]
#[case::byte(1, 0x00)]
#[case::halfword(2, 0xC000)]
#[case::word(4, 0xF000_C000)]
fn control_register_is_readable_at_every_permitted_width(
    mut pwr: Stm32h747Pwr,
    #[case] width: u8,
    #[case] expected: u64,
) {
    assert_eq!(pwr.read(PWR_CR1, width), expected);
    assert!(pwr.diagnostics().is_clean());
}

#[rstest]
#[case::three_bytes(3)]
#[case::double_word(8)]
#[case::zero(0)]
fn illegal_widths_read_zero_and_leave_state(mut pwr: Stm32h747Pwr, #[case] width: u8) {
    assert_eq!(pwr.read(PWR_CR1, width), 0);
    pwr.write(PWR_CR1, width, 0);
    assert_eq!(pwr.read(PWR_CR1, 4), 0xF000_C000);
    assert_eq!(pwr.diagnostics().illegal_width_count, 2);
    assert_eq!(pwr.diagnostics().class_count(FaultClass::Bus), 2);
}

#[rstest]
fn reserved_stop_scaling_written_by_byte_is_corrected(mut pwr: Stm32h747Pwr) {
    pwr.write(PWR_CR1 + 1, 1, 0x00);
    assert_eq!(pwr.system_stop_scaling(), Some(SystemStopScaling::ScaleMode3));
    assert_eq!(pwr.read(PWR_CR1, 4), 0xF000_C000);
    assert_eq!(pwr.state().corrected_scaling_writes, 1);
}

#[rstest]
fn byte_write_outside_stop_scaling_fires_no_callback(mut pwr: Stm32h747Pwr) {
    pwr.write(PWR_CR1, 1, 0x20);
    assert_eq!(pwr.state().corrected_scaling_writes, 0);
    assert_eq!(pwr.read(PWR_CR1, 4), 0xF000_C020);
}

#[rstest]
fn tagged_bits_are_diagnosed_when_firmware_changes_them(mut pwr: Stm32h747Pwr) {
    pwr.write(PWR_CR1, 4, 0xF000_C001);
    assert_eq!(pwr.read(PWR_CR1, 4), 0xF000_C000);
    let last = pwr.diagnostics().last.expect("diagnosed");
    assert_eq!(last.fault, AccessFault::TaggedWrite);
    assert_eq!(last.register, Some("PWR_CR1"));
    assert_eq!(last.field, Some("LPDS"));
    assert_eq!(last.bit, Some(0));
}

#[rstest]
fn underdrive_status_is_cleared_by_firmware(mut pwr: Stm32h747Pwr) {
    pwr.set_underdrive_ready(UnderDriveReady::UnderDriveActivated)
        .expect("UDRDY");
    pwr.write(PWR_CSR1 + 2, 1, 0x0C);
    assert_eq!(
        pwr.underdrive_ready(),
        Some(UnderDriveReady::UnderDriveDisabled)
    );
    assert!(pwr.diagnostics().is_clean());
}

#[rstest]
fn misaligned_halfword_is_absorbed(mut pwr: Stm32h747Pwr) {
    pwr.write(PWR_D3CR + 1, 2, 0xFFFF);
    assert_eq!(pwr.voltage_scaling(), Some(VoltageScaling::ScaleMode3));
    assert_eq!(pwr.diagnostics().misaligned_count, 1);
}

#[rstest]
fn diagnostics_survive_peripheral_reset(mut pwr: Stm32h747Pwr) {
    pwr.read(0x100, 4);
    pwr.reset();
    assert_eq!(pwr.diagnostics().unmapped_count, 1);
}
