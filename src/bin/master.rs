#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_time::{Delay, Timer};
use {defmt_rtt as _, panic_probe as _};

use vitals_link::{
    board::CycleDelay,
    config::{API_HOST, API_PATH, BRIDGE_CONNECT_ATTEMPTS, BRIDGE_CONNECT_POLL_MS},
    drivers::{mpu6050::MPU6050_ADDRESS_A, Ds18b20, Mpu6050, OneWire},
    tasks::{master_task, MasterPeripherals},
    uplink::HttpUplink,
    MasterBoard,
};

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Starting vitals master node");
    let board = match MasterBoard::init() {
        Ok(board) => board,
        Err(e) => {
            error!("Board init failed: {:?}", e);
            core::future::pending::<()>().await;
            return;
        }
    };

    // No motion sensor means no fall detection; refuse to run without it
    let imu = match Mpu6050::new(board.imu_i2c, Delay, MPU6050_ADDRESS_A).await {
        Ok(imu) => {
            info!("MPU6050 ready");
            imu
        }
        Err(e) => {
            error!("MPU6050 initialization failed: {:?}", e);
            core::future::pending::<()>().await;
            return;
        }
    };

    let mut probe = Ds18b20::new(OneWire::new(board.onewire_pin, CycleDelay));
    match cortex_m::interrupt::free(|_| probe.is_present()) {
        Ok(true) => info!("DS18B20 found"),
        Ok(false) => warn!("No DS18B20 on the 1-Wire bus, temperature will read 0"),
        Err(e) => warn!("1-Wire bus fault: {:?}", e),
    }
    if let Err(e) = cortex_m::interrupt::free(|_| probe.start_conversion()) {
        debug!("First conversion not started: {:?}", e);
    }

    info!("Waiting for network bridge ({})", API_HOST);
    let mut connected = false;
    for _ in 0..BRIDGE_CONNECT_ATTEMPTS {
        if board.bridge_ready.is_high() {
            connected = true;
            break;
        }
        Timer::after_millis(BRIDGE_CONNECT_POLL_MS).await;
    }
    if connected {
        info!("Network bridge connected");
    } else {
        warn!("Network bridge not connected, uploads skipped until it is");
    }

    let io = MasterPeripherals {
        imu,
        probe,
        link_rx: board.link_rx,
        uplink: HttpUplink::new(board.bridge_tx, board.bridge_rx, API_HOST, API_PATH),
        bridge_ready: board.bridge_ready,
    };
    if spawner.spawn(master_task(io)).is_err() {
        error!("Failed to spawn master task");
    }

    core::future::pending::<()>().await;
}
