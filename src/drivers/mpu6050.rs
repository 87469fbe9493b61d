use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::config::{INIT_ATTEMPTS, INIT_BACKOFF_BASE_MS};
use crate::telemetry::{MotionSample, Vector3};

// MPU6050 I2C address with AD0 tied low
pub const MPU6050_ADDRESS_A: u8 = 0x68;

// Register addresses
const MPU6050_SMPLRT_DIV_ADDR: u8 = 0x19;
const MPU6050_CONFIG_ADDR: u8 = 0x1A;
const MPU6050_GYRO_CONFIG_ADDR: u8 = 0x1B;
const MPU6050_ACCEL_CONFIG_ADDR: u8 = 0x1C;
const MPU6050_ACCEL_XOUT_H_ADDR: u8 = 0x3B;
const MPU6050_SIGNAL_PATH_RESET_ADDR: u8 = 0x68;
const MPU6050_PWR_MGMT_1_ADDR: u8 = 0x6B;
const MPU6050_WHO_AM_I_ADDR: u8 = 0x75;

const MPU6050_ID: u8 = 0x68;

const PWR_DEVICE_RESET: u8 = 0x80;
const PWR_CLOCK_PLL_XGYRO: u8 = 0x01;
const SIGNAL_PATH_RESET_ALL: u8 = 0x07;
const DLPF_BAND_21_HZ: u8 = 0x04;
const GYRO_RANGE_500_DPS: u8 = 0x08;
const ACCEL_RANGE_8_G: u8 = 0x10;

const STANDARD_GRAVITY: f32 = 9.806_65;
// LSB per g at ±8 g, LSB per °/s at ±500 °/s
const ACCEL_LSB_PER_G: f32 = 4096.0;
const GYRO_LSB_PER_DPS: f32 = 65.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    I2c(E),
    WrongChipId(u8),
    ConfigMismatch { reg: u8, expected: u8, got: u8 },
    ResetTimeout,
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Self::I2c(e)
    }
}

pub struct Mpu6050<I, D> {
    i2c: I,
    delay: D,
    addr: u8,
}

impl<I, D, E> Mpu6050<I, D>
where
    I: I2c<Error = E>,
    D: DelayNs,
{
    /// Brings the sensor up, retrying with progressive backoff
    /// (200 ms, 400 ms, 800 ms, 1600 ms) before giving up.
    pub async fn new(i2c: I, delay: D, addr: u8) -> Result<Self, Error<E>> {
        let mut mpu = Self { i2c, delay, addr };

        // Give the chip time to power up
        mpu.delay.delay_ms(100).await;

        let mut last_error = Error::ResetTimeout;
        for attempt in 1..=INIT_ATTEMPTS {
            #[cfg(feature = "defmt")]
            defmt::debug!("MPU6050 init attempt {}/{}", attempt, INIT_ATTEMPTS);

            match mpu.try_init().await {
                Ok(()) => {
                    #[cfg(feature = "defmt")]
                    defmt::info!("MPU6050 initialized on attempt {}", attempt);
                    return Ok(mpu);
                }
                Err(e) => {
                    last_error = e;
                    if attempt < INIT_ATTEMPTS {
                        // Progressive backoff: 200ms, 400ms, 800ms, 1600ms
                        let delay_ms = INIT_BACKOFF_BASE_MS << (attempt - 1);
                        #[cfg(feature = "defmt")]
                        defmt::warn!(
                            "MPU6050 init attempt {} failed, retrying in {}ms",
                            attempt,
                            delay_ms
                        );
                        mpu.delay.delay_ms(delay_ms).await;
                    }
                }
            }
        }

        #[cfg(feature = "defmt")]
        defmt::error!("MPU6050 initialization failed after {} attempts", INIT_ATTEMPTS);

        Err(last_error)
    }

    async fn try_init(&mut self) -> Result<(), Error<E>> {
        let id = self.read_byte_with_retries(MPU6050_WHO_AM_I_ADDR, 5).await?;
        if id != MPU6050_ID {
            return Err(Error::WrongChipId(id));
        }

        self.write_byte(MPU6050_PWR_MGMT_1_ADDR, PWR_DEVICE_RESET).await?;
        self.wait_for_reset().await?;
        self.delay.delay_ms(100).await;

        self.write_byte(MPU6050_SIGNAL_PATH_RESET_ADDR, SIGNAL_PATH_RESET_ALL)
            .await?;
        self.delay.delay_ms(100).await;

        self.write_byte(MPU6050_SMPLRT_DIV_ADDR, 0).await?;
        self.write_byte(MPU6050_CONFIG_ADDR, DLPF_BAND_21_HZ).await?;
        self.write_byte(MPU6050_GYRO_CONFIG_ADDR, GYRO_RANGE_500_DPS).await?;
        self.write_byte(MPU6050_ACCEL_CONFIG_ADDR, ACCEL_RANGE_8_G).await?;
        self.write_byte(MPU6050_PWR_MGMT_1_ADDR, PWR_CLOCK_PLL_XGYRO).await?;
        self.delay.delay_ms(100).await;

        self.verify(MPU6050_ACCEL_CONFIG_ADDR, ACCEL_RANGE_8_G).await?;
        self.verify(MPU6050_GYRO_CONFIG_ADDR, GYRO_RANGE_500_DPS).await?;
        Ok(())
    }

    async fn wait_for_reset(&mut self) -> Result<(), Error<E>> {
        // Reset bit self-clears once the device is back
        for _ in 0..20 {
            self.delay.delay_ms(10).await;
            if let Ok(v) = self.read_byte(MPU6050_PWR_MGMT_1_ADDR).await {
                if v & PWR_DEVICE_RESET == 0 {
                    return Ok(());
                }
            }
        }
        Err(Error::ResetTimeout)
    }

    async fn verify(&mut self, reg: u8, expected: u8) -> Result<(), Error<E>> {
        let got = self.read_byte(reg).await?;
        if got != expected {
            return Err(Error::ConfigMismatch { reg, expected, got });
        }
        Ok(())
    }

    async fn read_byte_with_retries(&mut self, reg: u8, retries: u8) -> Result<u8, Error<E>> {
        let mut last_error = Error::ResetTimeout;

        for attempt in 1..=retries {
            match self.read_byte(reg).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    last_error = Error::I2c(e);
                    if attempt < retries {
                        self.delay.delay_ms(10).await;
                    }
                }
            }
        }

        Err(last_error)
    }

    /// Reads acceleration (m/s²) and angular rate (°/s) in one burst.
    pub async fn read(&mut self) -> Result<MotionSample, Error<E>> {
        let raw = self.read_bytes::<14>(MPU6050_ACCEL_XOUT_H_ADDR).await?;
        Ok(decode_sample(&raw))
    }

    async fn write_byte(&mut self, reg: u8, value: u8) -> Result<(), E> {
        self.i2c.write(self.addr, &[reg, value]).await
    }

    async fn read_byte(&mut self, reg: u8) -> Result<u8, E> {
        let mut buf = [0u8; 1];
        self.i2c.write_read(self.addr, &[reg], &mut buf).await?;
        Ok(buf[0])
    }

    async fn read_bytes<const N: usize>(&mut self, reg: u8) -> Result<[u8; N], E> {
        let mut buf = [0u8; N];
        self.i2c.write_read(self.addr, &[reg], &mut buf).await?;
        Ok(buf)
    }
}

/// Burst layout: accel XYZ, die temperature, gyro XYZ, all big-endian i16.
fn decode_sample(raw: &[u8; 14]) -> MotionSample {
    let word = |i: usize| i16::from_be_bytes([raw[i], raw[i + 1]]) as f32;
    let accel_scale = STANDARD_GRAVITY / ACCEL_LSB_PER_G;
    MotionSample {
        accel: Vector3 {
            x: word(0) * accel_scale,
            y: word(2) * accel_scale,
            z: word(4) * accel_scale,
        },
        gyro: Vector3 {
            x: word(8) / GYRO_LSB_PER_DPS,
            y: word(10) / GYRO_LSB_PER_DPS,
            z: word(12) / GYRO_LSB_PER_DPS,
        },
    }
}
