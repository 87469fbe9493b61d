#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_time::Delay;
use {defmt_rtt as _, panic_probe as _};

use vitals_link::{drivers::Max30100, tasks::slave_task, SlaveBoard};

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Starting vitals slave node");
    let board = match SlaveBoard::init() {
        Ok(board) => board,
        Err(e) => {
            error!("Board init failed: {:?}", e);
            core::future::pending::<()>().await;
            return;
        }
    };

    let sensor = match Max30100::new(board.oximeter_i2c, Delay).await {
        Ok(sensor) => {
            info!("MAX30100 ready");
            sensor
        }
        Err(e) => {
            error!("MAX30100 initialization failed: {:?}", e);
            core::future::pending::<()>().await;
            return;
        }
    };

    if spawner.spawn(slave_task(sensor, board.link_tx)).is_err() {
        error!("Failed to spawn slave task");
    }

    core::future::pending::<()>().await;
}
