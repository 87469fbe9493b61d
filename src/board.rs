use embassy_stm32::gpio::{Input, Level, OutputOpenDrain, Pull, Speed};
use embassy_stm32::mode::Async;
use embassy_stm32::time::Hertz;
use embassy_stm32::usart::{Config as UsartConfig, ConfigError, RingBufferedUartRx, Uart, UartTx};
use embassy_stm32::{bind_interrupts, i2c, peripherals, rcc, usart, Config};
use embassy_time::Delay;
use static_cell::StaticCell;

use crate::config::{
    BRIDGE_BAUDRATE, BRIDGE_DMA_BUF_SIZE, IMU_I2C_FREQUENCY_HZ, LINK_BAUDRATE, LINK_DMA_BUF_SIZE,
    OXIMETER_I2C_FREQUENCY_HZ,
};
use crate::drivers::{Ds18b20, Max30100, Mpu6050, OneWire};
use crate::uplink::HttpUplink;

// ── IRQ table ─────────────────────────────────────────────
bind_interrupts!(pub struct Irqs {
    USART1 => usart::InterruptHandler<peripherals::USART1>;
    USART2 => usart::InterruptHandler<peripherals::USART2>;
    I2C2   => i2c::EventInterruptHandler<peripherals::I2C2>,
              i2c::ErrorInterruptHandler<peripherals::I2C2>;
});

static LINK_DMA_BUF: StaticCell<[u8; LINK_DMA_BUF_SIZE]> = StaticCell::new();
static BRIDGE_DMA_BUF: StaticCell<[u8; BRIDGE_DMA_BUF_SIZE]> = StaticCell::new();

const SYSCLK_MHZ: u32 = 64;

pub type SensorBus = i2c::I2c<'static, Async>;
pub type Imu = Mpu6050<SensorBus, Delay>;
pub type PulseOximeter = Max30100<SensorBus, Delay>;
pub type TemperatureProbe = Ds18b20<OneWire<OutputOpenDrain<'static>, CycleDelay>>;
pub type LinkTx = UartTx<'static, Async>;
pub type LinkRx = RingBufferedUartRx<'static>;
pub type Uplink = HttpUplink<UartTx<'static, Async>, RingBufferedUartRx<'static>>;

/// Busy-wait delay counted in core cycles. The 1-Wire slots need
/// microsecond resolution, finer than the time driver's tick.
pub struct CycleDelay;

impl embedded_hal::delay::DelayNs for CycleDelay {
    fn delay_ns(&mut self, ns: u32) {
        let cycles = (ns as u64 * SYSCLK_MHZ as u64).div_ceil(1_000);
        cortex_m::asm::delay(cycles.min(u32::MAX as u64) as u32);
    }
}

fn clock_config() -> Config {
    let mut config = Config::default();

    // HSI16 → PLL → 64 MHz SYSCLK
    config.rcc.hsi = Some(rcc::Hsi {
        sys_div: rcc::HsiSysDiv::DIV1,
    });
    config.rcc.pll = Some(rcc::Pll {
        source: rcc::PllSource::HSI,
        prediv: rcc::PllPreDiv::DIV2,   // 16MHz / 2 = 8MHz
        mul: rcc::PllMul::MUL16,        // 8MHz * 16 = 128MHz
        divp: None,
        divq: None,
        divr: Some(rcc::PllRDiv::DIV2), // 128MHz / 2 = 64MHz
    });
    config.rcc.sys = rcc::Sysclk::PLL1_R;
    config
}

fn sensor_bus_config() -> i2c::Config {
    // Breakout boards carry their own pull-ups
    let mut i2c_cfg = i2c::Config::default();
    i2c_cfg.sda_pullup = false;
    i2c_cfg.scl_pullup = false;
    i2c_cfg
}

// ── Master node ───────────────────────────────────────────
pub struct MasterBoard {
    pub imu_i2c: SensorBus,
    /// DS18B20 data line, open drain with external 4.7k pull-up.
    pub onewire_pin: OutputOpenDrain<'static>,
    pub link_rx: LinkRx,
    pub bridge_tx: UartTx<'static, Async>,
    pub bridge_rx: RingBufferedUartRx<'static>,
    /// High while the network bridge reports an upstream connection.
    pub bridge_ready: Input<'static>,
}

impl MasterBoard {
    pub fn init() -> Result<Self, ConfigError> {
        let p = embassy_stm32::init(clock_config());

        // I²C2 (DMA CH7 TX, CH6 RX) to the MPU6050
        let imu_i2c = i2c::I2c::new(
            p.I2C2,
            p.PB10,
            p.PB11,
            Irqs,
            p.DMA1_CH7,
            p.DMA1_CH6,
            Hertz(IMU_I2C_FREQUENCY_HZ),
            sensor_bus_config(),
        );

        let onewire_pin = OutputOpenDrain::new(p.PA8, Level::High, Speed::Low);

        // USART1 ← Slave node. Only RX is wired.
        let mut link_cfg = UsartConfig::default();
        link_cfg.baudrate = LINK_BAUDRATE;
        link_cfg.rx_pull = Pull::Up;
        let link = Uart::new(p.USART1, p.PC5, p.PC4, Irqs, p.DMA1_CH2, p.DMA1_CH3, link_cfg)?;
        let (_, link_rx) = link.split();
        let link_rx = link_rx.into_ring_buffered(LINK_DMA_BUF.init([0; LINK_DMA_BUF_SIZE]));

        // USART2 ↔ network bridge
        let mut bridge_cfg = UsartConfig::default();
        bridge_cfg.baudrate = BRIDGE_BAUDRATE;
        bridge_cfg.rx_pull = Pull::Up;
        let bridge = Uart::new(p.USART2, p.PA3, p.PA2, Irqs, p.DMA1_CH4, p.DMA1_CH5, bridge_cfg)?;
        let (bridge_tx, bridge_rx) = bridge.split();
        let bridge_rx = bridge_rx.into_ring_buffered(BRIDGE_DMA_BUF.init([0; BRIDGE_DMA_BUF_SIZE]));

        let bridge_ready = Input::new(p.PB0, Pull::Down);

        Ok(Self {
            imu_i2c,
            onewire_pin,
            link_rx,
            bridge_tx,
            bridge_rx,
            bridge_ready,
        })
    }
}

// ── Slave node ────────────────────────────────────────────
pub struct SlaveBoard {
    pub oximeter_i2c: SensorBus,
    pub link_tx: LinkTx,
}

impl SlaveBoard {
    pub fn init() -> Result<Self, ConfigError> {
        let p = embassy_stm32::init(clock_config());

        // The MAX30100 tops out at 400 kHz but breakouts are flaky above 100
        let oximeter_i2c = i2c::I2c::new(
            p.I2C2,
            p.PB10,
            p.PB11,
            Irqs,
            p.DMA1_CH7,
            p.DMA1_CH6,
            Hertz(OXIMETER_I2C_FREQUENCY_HZ),
            sensor_bus_config(),
        );

        // USART1 → Master node. Only TX is wired.
        let mut link_cfg = UsartConfig::default();
        link_cfg.baudrate = LINK_BAUDRATE;
        let link = Uart::new(p.USART1, p.PC5, p.PC4, Irqs, p.DMA1_CH2, p.DMA1_CH3, link_cfg)?;
        let (link_tx, _) = link.split();

        Ok(Self {
            oximeter_i2c,
            link_tx,
        })
    }
}
