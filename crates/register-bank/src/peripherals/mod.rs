//! Peripherals modelled on top of [`crate::RegisterBank`].

/// STM32H747 power controller.
pub mod stm32h747_pwr;
pub use stm32h747_pwr::{
    AnalogVoltageLevel, PvdLevel, PwrState, Stm32h747Pwr, SystemStopScaling, UnderDriveReady,
    VoltageScaling, PWR_CR1, PWR_CSR1, PWR_D3CR, PWR_SIZE,
};
