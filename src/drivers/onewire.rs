//! Bit-banged 1-Wire master on an open-drain pin.
//!
//! Slot timings are the standard-speed values from the Maxim 1-Wire
//! guidelines. The pin must idle high through an external pull-up.

use crc_any::CRCu8;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

pub const CMD_SKIP_ROM: u8 = 0xCC;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    Pin(E),
    /// The line stayed low after release; shorted or missing pull-up.
    BusStuckLow,
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Self::Pin(e)
    }
}

/// Byte-level access to a 1-Wire bus.
pub trait OneWireBus {
    type Error;

    /// Issues a reset pulse; returns true if any device answered with a
    /// presence pulse.
    fn reset(&mut self) -> Result<bool, Self::Error>;
    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error>;
    fn read_byte(&mut self) -> Result<u8, Self::Error>;
}

pub struct OneWire<P, D> {
    pin: P,
    delay: D,
}

impl<P, D> OneWire<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    pub fn new(pin: P, delay: D) -> Self {
        Self { pin, delay }
    }

    fn write_bit(&mut self, bit: bool) -> Result<(), Error<P::Error>> {
        let (low_us, recovery_us) = if bit { (6, 64) } else { (60, 10) };
        self.pin.set_low()?;
        self.delay.delay_us(low_us);
        self.pin.set_high()?;
        self.delay.delay_us(recovery_us);
        Ok(())
    }

    fn read_bit(&mut self) -> Result<bool, Error<P::Error>> {
        self.pin.set_low()?;
        self.delay.delay_us(6);
        self.pin.set_high()?;
        self.delay.delay_us(9);
        let bit = self.pin.is_high()?;
        self.delay.delay_us(55);
        Ok(bit)
    }
}

impl<P, D> OneWireBus for OneWire<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    type Error = Error<P::Error>;

    fn reset(&mut self) -> Result<bool, Self::Error> {
        if self.pin.is_low()? {
            return Err(Error::BusStuckLow);
        }
        self.pin.set_low()?;
        self.delay.delay_us(480);
        self.pin.set_high()?;
        self.delay.delay_us(70);
        let present = self.pin.is_low()?;
        self.delay.delay_us(410);
        Ok(present)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        for i in 0..8 {
            self.write_bit(byte & (1 << i) != 0)?;
        }
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        let mut byte = 0u8;
        for i in 0..8 {
            if self.read_bit()? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }
}

/// Dallas/Maxim CRC-8 (x⁸ + x⁵ + x⁴ + 1, LSB first) as used for ROM codes
/// and scratchpads.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = CRCu8::crc8maxim();
    crc.digest(data);
    crc.get_crc()
}
