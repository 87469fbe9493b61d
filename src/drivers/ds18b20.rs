use super::onewire::{crc8, OneWireBus, CMD_SKIP_ROM};

const CMD_CONVERT_T: u8 = 0x44;
const CMD_READ_SCRATCHPAD: u8 = 0xBE;

const SCRATCHPAD_LEN: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    Bus(E),
    NoDevice,
    BadCrc,
    /// No conversion has been started since power-up.
    NotReady,
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Self::Bus(e)
    }
}

/// Single DS18B20 addressed with SKIP ROM.
///
/// A 12-bit conversion takes up to 750 ms, so the probe is used in
/// start-then-collect fashion: each `poll` reads the conversion started by
/// the previous one and kicks off the next.
pub struct Ds18b20<B> {
    bus: B,
    converting: bool,
}

impl<B: OneWireBus> Ds18b20<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            converting: false,
        }
    }

    pub fn is_present(&mut self) -> Result<bool, Error<B::Error>> {
        Ok(self.bus.reset()?)
    }

    pub fn start_conversion(&mut self) -> Result<(), Error<B::Error>> {
        self.converting = false;
        self.select()?;
        self.bus.write_byte(CMD_CONVERT_T)?;
        self.converting = true;
        Ok(())
    }

    pub fn read_temperature(&mut self) -> Result<f32, Error<B::Error>> {
        if !self.converting {
            return Err(Error::NotReady);
        }
        self.select()?;
        self.bus.write_byte(CMD_READ_SCRATCHPAD)?;
        let mut pad = [0u8; SCRATCHPAD_LEN];
        for b in pad.iter_mut() {
            *b = self.bus.read_byte()?;
        }
        // An absent or unpowered device floats the line to all ones
        if crc8(&pad[..8]) != pad[8] || pad.iter().all(|&b| b == 0xFF) {
            return Err(Error::BadCrc);
        }
        Ok(raw_to_celsius(pad[0], pad[1]))
    }

    /// Collects the pending conversion and starts the next one.
    pub fn poll(&mut self) -> Result<f32, Error<B::Error>> {
        let reading = self.read_temperature();
        let restart = self.start_conversion();
        let celsius = reading?;
        restart?;
        Ok(celsius)
    }

    fn select(&mut self) -> Result<(), Error<B::Error>> {
        if !self.bus.reset()? {
            return Err(Error::NoDevice);
        }
        self.bus.write_byte(CMD_SKIP_ROM)?;
        Ok(())
    }
}

fn raw_to_celsius(lsb: u8, msb: u8) -> f32 {
    i16::from_le_bytes([lsb, msb]) as f32 / 16.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use std::collections::VecDeque;
    use std::vec::Vec;

    /// Byte-level stand-in for a probe on the bus.
    struct FakeBus {
        present: bool,
        written: Vec<u8>,
        reply: VecDeque<u8>,
        scratchpad: [u8; 9],
    }

    impl FakeBus {
        fn with_scratchpad(scratchpad: [u8; 9]) -> Self {
            Self {
                present: true,
                written: Vec::new(),
                reply: VecDeque::new(),
                scratchpad,
            }
        }
    }

    impl OneWireBus for FakeBus {
        type Error = Infallible;

        fn reset(&mut self) -> Result<bool, Infallible> {
            self.reply.clear();
            Ok(self.present)
        }

        fn write_byte(&mut self, byte: u8) -> Result<(), Infallible> {
            self.written.push(byte);
            if byte == CMD_READ_SCRATCHPAD {
                self.reply.extend(self.scratchpad);
            }
            Ok(())
        }

        fn read_byte(&mut self) -> Result<u8, Infallible> {
            Ok(self.reply.pop_front().unwrap_or(0xFF))
        }
    }

    const PAD_25_0625: [u8; 9] = [0x91, 0x01, 0x4B, 0x46, 0x7F, 0xFF, 0x0F, 0x10, 0x25];
    const PAD_MINUS_10_125: [u8; 9] = [0x5E, 0xFF, 0x4B, 0x46, 0x7F, 0xFF, 0x02, 0x10, 0xB6];
    const PAD_POWER_ON: [u8; 9] = [0x50, 0x05, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10, 0x1C];

    #[test]
    fn converts_positive_and_negative_readings() {
        assert_eq!(raw_to_celsius(0x50, 0x05), 85.0);
        let mut probe = Ds18b20::new(FakeBus::with_scratchpad(PAD_25_0625));
        probe.start_conversion().unwrap();
        assert_eq!(probe.read_temperature(), Ok(25.0625));

        let mut probe = Ds18b20::new(FakeBus::with_scratchpad(PAD_MINUS_10_125));
        probe.start_conversion().unwrap();
        assert_eq!(probe.read_temperature(), Ok(-10.125));
    }

    #[test]
    fn read_before_conversion_is_not_ready() {
        let mut probe = Ds18b20::new(FakeBus::with_scratchpad(PAD_POWER_ON));
        assert_eq!(probe.read_temperature(), Err(Error::NotReady));
        assert_eq!(probe.poll(), Err(Error::NotReady));
        assert_eq!(probe.poll(), Ok(85.0));
    }

    #[test]
    fn corrupted_scratchpad_is_rejected() {
        let mut pad = PAD_25_0625;
        pad[0] ^= 0x01;
        let mut probe = Ds18b20::new(FakeBus::with_scratchpad(pad));
        probe.start_conversion().unwrap();
        assert_eq!(probe.read_temperature(), Err(Error::BadCrc));
    }

    #[test]
    fn missing_probe_reports_no_device() {
        let mut bus = FakeBus::with_scratchpad(PAD_25_0625);
        bus.present = false;
        let mut probe = Ds18b20::new(bus);
        assert_eq!(probe.is_present(), Ok(false));
        assert_eq!(probe.start_conversion(), Err(Error::NoDevice));
        assert_eq!(probe.poll(), Err(Error::NotReady));
    }

    #[test]
    fn poll_issues_read_then_convert() {
        let mut probe = Ds18b20::new(FakeBus::with_scratchpad(PAD_25_0625));
        probe.start_conversion().unwrap();
        probe.bus.written.clear();
        probe.poll().unwrap();
        assert_eq!(
            probe.bus.written,
            [CMD_SKIP_ROM, CMD_READ_SCRATCHPAD, CMD_SKIP_ROM, CMD_CONVERT_T]
        );
    }
}
