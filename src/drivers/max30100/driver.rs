//! MAX30100 pulse-oximeter driver
//! ===========================================================

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use heapless::Vec;

use super::oximetry::Oximeter;
use super::RawSample;
use crate::config::{INIT_ATTEMPTS, INIT_BACKOFF_BASE_MS};

pub const MAX30100_ADDRESS: u8 = 0x57;

/* ────────────────── Register addresses ────────── */
const REG_INT_STATUS: u8 = 0x00;
const REG_FIFO_WR_PTR: u8 = 0x02;
const REG_OVF_COUNTER: u8 = 0x03;
const REG_FIFO_RD_PTR: u8 = 0x04;
const REG_FIFO_DATA: u8 = 0x05;
const REG_MODE_CONFIG: u8 = 0x06;
const REG_SPO2_CONFIG: u8 = 0x07;
const REG_LED_CONFIG: u8 = 0x09;
const REG_PART_ID: u8 = 0xFF;

const PART_ID: u8 = 0x11;

/* ────────────────── Field values ──────────────── */
const MODE_RESET: u8 = 0x40;
const MODE_SPO2: u8 = 0x03;
const SPO2_HI_RES_EN: u8 = 0x40;
const SPO2_SAMPLE_RATE_100HZ: u8 = 0x01 << 2;
const SPO2_PULSE_WIDTH_1600US: u8 = 0x03;
const LED_CURRENT_27_1MA: u8 = 0x08;
const LED_CURRENT_50MA: u8 = 0x0F;

pub const FIFO_DEPTH: usize = 16;
const FIFO_SAMPLE_BYTES: usize = 4;
pub const SAMPLE_PERIOD_MS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    I2c(E),
    WrongPartId(u8),
    ResetTimeout,
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Self::I2c(e)
    }
}

pub struct Max30100<I, D> {
    i2c: I,
    delay: D,
    overflows: u32,
}

impl<I, D, E> Max30100<I, D>
where
    I: I2c<Error = E>,
    D: DelayNs,
{
    /// Configures SpO2 mode at 100 Hz, 1600 µs pulses, 16-bit ADC,
    /// IR LED at 50 mA and red LED at 27.1 mA.
    pub async fn new(i2c: I, delay: D) -> Result<Self, Error<E>> {
        let mut dev = Self {
            i2c,
            delay,
            overflows: 0,
        };

        let mut last_error = Error::ResetTimeout;
        for attempt in 1..=INIT_ATTEMPTS {
            #[cfg(feature = "defmt")]
            defmt::debug!("MAX30100 init attempt {}/{}", attempt, INIT_ATTEMPTS);

            match dev.try_init().await {
                Ok(()) => {
                    #[cfg(feature = "defmt")]
                    defmt::info!("MAX30100 initialized on attempt {}", attempt);
                    return Ok(dev);
                }
                Err(e) => {
                    last_error = e;
                    if attempt < INIT_ATTEMPTS {
                        // Progressive backoff: 200ms, 400ms, 800ms, 1600ms
                        let delay_ms = INIT_BACKOFF_BASE_MS << (attempt - 1);
                        #[cfg(feature = "defmt")]
                        defmt::warn!(
                            "MAX30100 init attempt {} failed, retrying in {}ms",
                            attempt,
                            delay_ms
                        );
                        dev.delay.delay_ms(delay_ms).await;
                    }
                }
            }
        }

        #[cfg(feature = "defmt")]
        defmt::error!("MAX30100 initialization failed after {} attempts", INIT_ATTEMPTS);
        Err(last_error)
    }

    async fn try_init(&mut self) -> Result<(), Error<E>> {
        let id = self.read_byte(REG_PART_ID).await?;
        if id != PART_ID {
            return Err(Error::WrongPartId(id));
        }

        self.write_byte(REG_MODE_CONFIG, MODE_RESET).await?;
        self.wait_for_reset().await?;

        self.write_byte(REG_MODE_CONFIG, MODE_SPO2).await?;
        self.write_byte(
            REG_SPO2_CONFIG,
            SPO2_HI_RES_EN | SPO2_SAMPLE_RATE_100HZ | SPO2_PULSE_WIDTH_1600US,
        )
        .await?;
        self.write_byte(REG_LED_CONFIG, (LED_CURRENT_27_1MA << 4) | LED_CURRENT_50MA)
            .await?;
        self.clear_fifo().await?;
        Ok(())
    }

    async fn wait_for_reset(&mut self) -> Result<(), Error<E>> {
        for _ in 0..20 {
            self.delay.delay_ms(5).await;
            if self.read_byte(REG_MODE_CONFIG).await? & MODE_RESET == 0 {
                return Ok(());
            }
        }
        Err(Error::ResetTimeout)
    }

    async fn clear_fifo(&mut self) -> Result<(), Error<E>> {
        self.write_byte(REG_FIFO_WR_PTR, 0).await?;
        self.write_byte(REG_OVF_COUNTER, 0).await?;
        self.write_byte(REG_FIFO_RD_PTR, 0).await?;
        // Reading the status register clears pending interrupt flags
        self.read_byte(REG_INT_STATUS).await?;
        Ok(())
    }

    /// FIFO overflow events seen so far; each one loses samples.
    pub fn overflows(&self) -> u32 {
        self.overflows
    }

    /// Drains every sample currently in the FIFO.
    pub async fn read_fifo(&mut self, out: &mut Vec<RawSample, FIFO_DEPTH>) -> Result<usize, Error<E>> {
        out.clear();
        let ptrs = self.read_bytes::<3>(REG_FIFO_WR_PTR).await?;
        let (wr, ovf, rd) = (ptrs[0], ptrs[1], ptrs[2]);

        let available = if ovf > 0 {
            self.overflows = self.overflows.wrapping_add(1);
            FIFO_DEPTH
        } else {
            (wr.wrapping_sub(rd) as usize) & (FIFO_DEPTH - 1)
        };
        if available == 0 {
            return Ok(0);
        }

        let mut raw = [0u8; FIFO_DEPTH * FIFO_SAMPLE_BYTES];
        let raw = &mut raw[..available * FIFO_SAMPLE_BYTES];
        self.i2c.write_read(MAX30100_ADDRESS, &[REG_FIFO_DATA], raw).await?;

        for chunk in raw.chunks_exact(FIFO_SAMPLE_BYTES) {
            let _ = out.push(RawSample {
                ir: u16::from_be_bytes([chunk[0], chunk[1]]),
                red: u16::from_be_bytes([chunk[2], chunk[3]]),
            });
        }
        Ok(available)
    }

    /// Feeds all pending samples to `oximeter`, back-dating each one by the
    /// sample period from `now_ms`. Returns the number of beats seen.
    pub async fn update(&mut self, now_ms: u64, oximeter: &mut Oximeter) -> Result<u32, Error<E>> {
        let mut samples = Vec::new();
        let n = self.read_fifo(&mut samples).await?;
        let mut beats = 0;
        for (i, sample) in samples.iter().enumerate() {
            let age = (n - 1 - i) as u64 * SAMPLE_PERIOD_MS;
            if oximeter.push(now_ms.saturating_sub(age), *sample) {
                beats += 1;
            }
        }
        if n == 0 {
            oximeter.expire(now_ms);
        }
        Ok(beats)
    }

    async fn write_byte(&mut self, reg: u8, value: u8) -> Result<(), E> {
        self.i2c.write(MAX30100_ADDRESS, &[reg, value]).await
    }

    async fn read_byte(&mut self, reg: u8) -> Result<u8, E> {
        let mut buf = [0u8; 1];
        self.i2c.write_read(MAX30100_ADDRESS, &[reg], &mut buf).await?;
        Ok(buf[0])
    }

    async fn read_bytes<const N: usize>(&mut self, reg: u8) -> Result<[u8; N], E> {
        let mut buf = [0u8; N];
        self.i2c.write_read(MAX30100_ADDRESS, &[reg], &mut buf).await?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::mock::{MockI2c, NoDelay, RecordingDelay};
    use embassy_futures::block_on;

    fn sensor_bus() -> MockI2c {
        let mut bus = MockI2c::new(MAX30100_ADDRESS);
        bus.regs[REG_PART_ID as usize] = PART_ID;
        bus.self_clearing.push((REG_MODE_CONFIG, MODE_RESET));
        bus.fifo_reg = Some(REG_FIFO_DATA);
        bus
    }

    #[test]
    fn init_configures_spo2_mode() {
        let dev = block_on(Max30100::new(sensor_bus(), NoDelay)).unwrap();
        let regs = &dev.i2c.regs;
        assert_eq!(regs[REG_MODE_CONFIG as usize], MODE_SPO2);
        assert_eq!(regs[REG_SPO2_CONFIG as usize], 0x47);
        assert_eq!(regs[REG_LED_CONFIG as usize], 0x8F);
        assert!(dev.i2c.writes.contains(&(REG_MODE_CONFIG, MODE_RESET)));
    }

    #[test]
    fn wrong_part_is_rejected() {
        let mut bus = sensor_bus();
        bus.regs[REG_PART_ID as usize] = 0x15;
        let result = block_on(Max30100::new(bus, NoDelay));
        assert!(matches!(result, Err(Error::WrongPartId(0x15))));
    }

    #[test]
    fn bring_up_backs_off_between_attempts() {
        let mut bus = sensor_bus();
        bus.regs[REG_PART_ID as usize] = 0x00;
        let mut delay = RecordingDelay::default();
        let rejected = matches!(
            block_on(Max30100::new(bus, &mut delay)),
            Err(Error::WrongPartId(0x00))
        );
        assert!(rejected);
        assert_eq!(delay.ms, [200, 400, 800, 1600]);
    }

    #[test]
    fn reads_pending_fifo_samples() {
        let mut dev = block_on(Max30100::new(sensor_bus(), NoDelay)).unwrap();
        dev.i2c.regs[REG_FIFO_WR_PTR as usize] = 2;
        dev.i2c.regs[REG_FIFO_RD_PTR as usize] = 0;
        dev.i2c
            .fifo
            .extend([0xC3, 0x50, 0x9C, 0x40, 0xC3, 0x51, 0x9C, 0x41]);

        let mut samples = Vec::new();
        assert_eq!(block_on(dev.read_fifo(&mut samples)), Ok(2));
        assert_eq!(samples[0], RawSample { ir: 50_000, red: 40_000 });
        assert_eq!(samples[1], RawSample { ir: 50_001, red: 40_001 });
    }

    #[test]
    fn fifo_pointer_wraps() {
        let mut dev = block_on(Max30100::new(sensor_bus(), NoDelay)).unwrap();
        dev.i2c.regs[REG_FIFO_WR_PTR as usize] = 1;
        dev.i2c.regs[REG_FIFO_RD_PTR as usize] = 15;
        dev.i2c.fifo.extend([0u8; 8]);
        let mut samples = Vec::new();
        assert_eq!(block_on(dev.read_fifo(&mut samples)), Ok(2));
    }

    #[test]
    fn overflow_reads_full_fifo() {
        let mut dev = block_on(Max30100::new(sensor_bus(), NoDelay)).unwrap();
        dev.i2c.regs[REG_OVF_COUNTER as usize] = 3;
        let mut samples = Vec::new();
        assert_eq!(block_on(dev.read_fifo(&mut samples)), Ok(FIFO_DEPTH));
        assert_eq!(dev.overflows(), 1);
    }

    #[test]
    fn empty_fifo_feeds_nothing() {
        let mut dev = block_on(Max30100::new(sensor_bus(), NoDelay)).unwrap();
        let mut ox = Oximeter::new();
        assert_eq!(block_on(dev.update(1_000, &mut ox)), Ok(0));
        assert_eq!(ox.estimate().heart_rate, 0.0);
    }
}
