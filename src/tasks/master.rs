use defmt::*;
use embassy_executor::task;
use embassy_stm32::gpio::Input;
use embassy_time::{with_timeout, Duration, Instant, Timer};
use embedded_io_async::Read;

use crate::board::{Imu, LinkRx, TemperatureProbe, Uplink};
use crate::config::{MASTER_LOOP_TICK_MS, UPLINK_TIMEOUT_MS};
use crate::drivers::ds18b20;
use crate::fall::FallEvent;
use crate::master::{MasterNode, TemperatureStatus};
use crate::telemetry::DEVICE_DISCONNECTED_C;

const DRAIN_SLICE: Duration = Duration::from_millis(1);
const MAX_DRAIN_TIME: Duration = Duration::from_millis(5);

/// Everything the Master loop drives.
pub struct MasterPeripherals {
    pub imu: Imu,
    pub probe: TemperatureProbe,
    pub link_rx: LinkRx,
    pub uplink: Uplink,
    pub bridge_ready: Input<'static>,
}

#[task]
pub async fn master_task(mut io: MasterPeripherals) {
    info!("Master loop started");
    let mut node = MasterNode::new();
    let mut imu_errors = 0u32;
    let mut consecutive_imu_errors = 0u32;
    let mut link_buf = [0u8; 64];

    loop {
        let now = Instant::now().as_millis();
        let due = node.due(now);

        if due.motion {
            match io.imu.read().await {
                Ok(sample) => {
                    if consecutive_imu_errors > 0 {
                        info!("IMU recovered after {} consecutive errors", consecutive_imu_errors);
                        consecutive_imu_errors = 0;
                    }
                    match node.record_motion(now, sample) {
                        Some(FallEvent::Triggered { magnitude }) => {
                            warn!("FALL DETECTED (|a| = {} m/s²)", magnitude)
                        }
                        Some(FallEvent::Cleared) => info!("Fall alert cleared"),
                        None => {}
                    }
                }
                Err(e) => {
                    imu_errors += 1;
                    consecutive_imu_errors += 1;
                    if consecutive_imu_errors % 100 == 1 {
                        warn!("IMU read error #{}: {:?}", imu_errors, e);
                    }
                }
            }
        }

        if due.temperature {
            // 1-Wire slots are timed by busy-waiting; keep interrupts out
            let reading = cortex_m::interrupt::free(|_| io.probe.poll());
            let celsius = match reading {
                Ok(c) => c,
                Err(ds18b20::Error::NotReady) => DEVICE_DISCONNECTED_C,
                Err(e) => {
                    debug!("Probe read failed: {:?}", e);
                    DEVICE_DISCONNECTED_C
                }
            };
            match node.record_temperature(now, celsius) {
                TemperatureStatus::Valid(c) => debug!("Temperature: {} °C", c),
                TemperatureStatus::Invalid { raw, warn: true } => {
                    warn!("Temperature probe disconnected or out of range ({} °C)", raw)
                }
                TemperatureStatus::Invalid { .. } => {}
            }
        }

        if due.link {
            let start = Instant::now();
            while start.elapsed() < MAX_DRAIN_TIME {
                match with_timeout(DRAIN_SLICE, io.link_rx.read(&mut link_buf)).await {
                    Ok(Ok(n)) => {
                        let report = node.receive(&link_buf[..n]);
                        if let Some(frame) = report.latest {
                            info!("Slave: HR={} SpO2={}", frame.heart_rate, frame.spo2);
                        }
                        if report.overflowed > 0 {
                            warn!("Discarded {} over-long link line(s)", report.overflowed);
                        }
                        if let Some(e) = report.last_error {
                            debug!("Dropped {} malformed frame(s): {:?}", report.dropped, e);
                        }
                    }
                    Ok(Err(e)) => {
                        warn!("Link RX error: {:?}", e);
                        break;
                    }
                    Err(_) => break,
                }
            }
        }

        if due.upload {
            if let Some(FallEvent::Cleared) = node.expire_alert(now) {
                info!("Fall alert cleared");
            }
            let t = node.telemetry();
            info!(
                "Temp={} °C HR={} SpO2={} |a|={} m/s² fall={} (frames ok={} bad={})",
                t.temperature,
                t.heart_rate,
                t.spo2,
                t.accel_total,
                t.fall_alert,
                node.frames_accepted(),
                node.frames_dropped()
            );

            if io.bridge_ready.is_low() {
                warn!("Uplink offline, skipping upload");
            } else {
                upload(&node, &mut io.uplink, now).await;
            }
        }

        Timer::after_millis(MASTER_LOOP_TICK_MS).await;
    }
}

async fn upload(node: &MasterNode, uplink: &mut Uplink, now: u64) {
    let body = match node.upload_body(now) {
        Ok(body) => body,
        Err(_) => {
            error!("Telemetry record does not fit the JSON buffer");
            return;
        }
    };

    // Discard anything left over from the previous response
    let mut trash = [0u8; 64];
    let start = Instant::now();
    while start.elapsed() < MAX_DRAIN_TIME {
        match with_timeout(DRAIN_SLICE, uplink.rx_mut().read(&mut trash)).await {
            Ok(Ok(n)) if n > 0 => continue,
            _ => break,
        }
    }

    let result = with_timeout(
        Duration::from_millis(UPLINK_TIMEOUT_MS),
        uplink.post_json(&body),
    )
    .await;
    match result {
        Ok(Ok(code)) => info!("Upload ok (HTTP {})", code),
        Ok(Err(e)) => warn!("Upload failed: {:?} ({} of {})", e, uplink.failures(), uplink.posts()),
        Err(_) => {
            uplink.record_timeout();
            warn!(
                "Upload timed out after {} ms ({} of {})",
                UPLINK_TIMEOUT_MS,
                uplink.failures(),
                uplink.posts()
            )
        }
    }
}
