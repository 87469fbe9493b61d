pub mod ds18b20;
pub mod max30100;
pub mod mpu6050;
pub mod onewire;

#[cfg(test)]
pub(crate) mod mock;

pub use ds18b20::Ds18b20;
pub use max30100::{Max30100, Oximeter, OximetryEstimate};
pub use mpu6050::Mpu6050;
pub use onewire::OneWire;
