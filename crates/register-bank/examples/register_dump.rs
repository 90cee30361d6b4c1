//! Drives the PWR model through a short firmware sequence and dumps its
//! register map, field layout and diagnostics.

use proptest as _;
use register_bank::peripherals::{PWR_CR1, PWR_CSR1, PWR_D3CR};
use register_bank::{BusPeripheral, FieldKind, Stm32h747Pwr};
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

fn kind_label(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::Flag => "flag",
        FieldKind::Value => "value",
        FieldKind::Enum { .. } => "enum",
        FieldKind::Reserved => "reserved",
        FieldKind::Tagged => "tagged",
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut pwr = Stm32h747Pwr::new()?;

    pwr.write(PWR_D3CR, 4, 0x0000_E000);
    pwr.write(PWR_CR1 + 1, 1, 0x00);
    pwr.write(PWR_CSR1, 3, 0);
    pwr.write(0x40, 4, 0xDEAD_BEEF);
    pwr.set_overdrive_ready(true)?;

    for register in pwr.bank().registers() {
        println!(
            "{:<9} @ {:#05x} = {:#010x}",
            register.name().unwrap_or("?"),
            register.offset(),
            register.peek()
        );
        for field in register.fields() {
            println!(
                "    [{:>2}+{:<2}] {:<8} {:<8} {:?}",
                field.bit(),
                field.width(),
                field.name().unwrap_or("-"),
                kind_label(field.kind()),
                field.mode()
            );
        }
    }

    let diagnostics = pwr.diagnostics();
    println!("illegal widths:   {}", diagnostics.illegal_width_count);
    println!("unmapped offsets: {}", diagnostics.unmapped_count);
    println!("vos transitions:  {}", pwr.state().voltage_scaling_transitions);
    if let Some(last) = diagnostics.last {
        println!("last: {} at {:#x} (code {:#04x})", last.fault, last.offset, last.fault.as_u8());
    }
    Ok(())
}
