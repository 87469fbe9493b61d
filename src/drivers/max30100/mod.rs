pub mod driver;
pub mod oximetry;

pub use driver::{Error, Max30100, MAX30100_ADDRESS};
pub use oximetry::{OximetryEstimate, Oximeter};

/// One FIFO entry: 16-bit IR and red photodiode readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSample {
    pub ir: u16,
    pub red: u16,
}
