use defmt::*;
use embassy_executor::task;
use embassy_time::{Duration, Instant, Ticker};
use embedded_io_async::Write;

use crate::board::{LinkTx, PulseOximeter};
use crate::config::SLAVE_UPDATE_PERIOD_MS;
use crate::drivers::Oximeter;
use crate::slave::{FingerChange, SlaveNode};

#[task]
pub async fn slave_task(mut sensor: PulseOximeter, mut link: LinkTx) {
    info!(
        "Slave loop started - updating oximeter every {}ms",
        SLAVE_UPDATE_PERIOD_MS
    );
    let mut ticker = Ticker::every(Duration::from_millis(SLAVE_UPDATE_PERIOD_MS));
    let mut oximeter = Oximeter::new();
    let mut node = SlaveNode::new();
    let mut errors = 0u32;
    let mut overflows = 0u32;

    loop {
        ticker.next().await;
        let now = Instant::now().as_millis();

        match sensor.update(now, &mut oximeter).await {
            Ok(beats) if beats > 0 => debug!("Beat"),
            Ok(_) => {}
            Err(e) => {
                errors += 1;
                if errors % 100 == 1 {
                    warn!("Oximeter read error #{}: {:?}", errors, e);
                }
            }
        }
        if sensor.overflows() != overflows {
            overflows = sensor.overflows();
            warn!("Oximeter FIFO overflow, samples lost ({} total)", overflows);
        }

        let step = node.step(now, &oximeter.estimate());
        match step.finger {
            Some(FingerChange::Placed) => info!("Finger detected"),
            Some(FingerChange::Removed) => info!("No finger detected"),
            None => {}
        }
        if let Some(reading) = step.reading {
            info!("HR: {} bpm, SpO2: {} %", reading.heart_rate, reading.spo2);
        }
        if let Some(frame) = step.frame {
            debug!("Sending {=str}", frame.trim_end());
            if let Err(e) = link.write_all(frame.as_bytes()).await {
                warn!("Link TX error: {:?}", e);
            }
        }
    }
}
