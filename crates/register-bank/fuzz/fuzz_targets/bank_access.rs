#![no_main]

use libfuzzer_sys::fuzz_target;
use register_bank::{BusPeripheral, FaultClass, Stm32h747Pwr};

fuzz_target!(|data: &[u8]| {
    let Ok(mut pwr) = Stm32h747Pwr::new() else {
        return;
    };

    for chunk in data.chunks_exact(8) {
        let offset = u64::from(u16::from_le_bytes([chunk[0], chunk[1]]));
        let width = chunk[2] & 0x0F;
        let value = u64::from(u32::from_le_bytes([chunk[3], chunk[4], chunk[5], chunk[6]]));

        if chunk[7] & 1 == 0 {
            let read = pwr.read(offset, width);
            if !matches!(width, 1 | 2 | 4) || offset >= pwr.size() {
                assert_eq!(read, 0);
            } else {
                assert!(read < 1 << (u32::from(width) * 8) || width == 4);
            }
        } else {
            pwr.write(offset, width, value);
        }

        if chunk[7] & 0x80 != 0 {
            let before = *pwr.diagnostics();
            pwr.reset();
            assert_eq!(*pwr.diagnostics(), before);
            assert_eq!(pwr.read(0x00, 4), 0xF000_C000);
            assert_eq!(pwr.diagnostics().class_count(FaultClass::Bus), before.class_count(FaultClass::Bus));
        }
    }
});
