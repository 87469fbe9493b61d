//! Master node state: the merged telemetry record and the handlers each
//! poller calls with fresh readings. The firmware loop owns one
//! `MasterNode` and does all I/O; everything here is synchronous and takes
//! the current time explicitly.

use crate::config::{LINK_LINE_CAPACITY, PROBE_WARNING_PERIOD_MS};
use crate::fall::{FallDetector, FallEvent};
use crate::protocol::{FrameError, LineBuffer, VitalsFrame};
use crate::schedule::{Interval, MasterDue, MasterSchedule};
use crate::telemetry::{is_valid_celsius, MasterTelemetry, MotionSample};
use crate::uplink::{encode_json, EncodeError, JsonBody};

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TemperatureStatus {
    Valid(f32),
    /// Held at 0; `warn` is set at most once per warning period.
    Invalid { raw: f32, warn: bool },
}

/// Outcome of draining the serial link once.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkReport {
    pub accepted: u32,
    pub dropped: u32,
    /// Over-long lines thrown away without parsing.
    pub overflowed: u32,
    pub last_error: Option<FrameError>,
    pub latest: Option<VitalsFrame>,
}

pub struct MasterNode {
    telemetry: MasterTelemetry,
    fall: FallDetector,
    schedule: MasterSchedule,
    probe_warning: Interval,
    lines: LineBuffer<LINK_LINE_CAPACITY>,
    frames_accepted: u32,
    frames_dropped: u32,
}

impl MasterNode {
    pub fn new() -> Self {
        Self {
            telemetry: MasterTelemetry::default(),
            fall: FallDetector::new(),
            schedule: MasterSchedule::new(),
            probe_warning: Interval::new(PROBE_WARNING_PERIOD_MS),
            lines: LineBuffer::new(),
            frames_accepted: 0,
            frames_dropped: 0,
        }
    }

    pub fn telemetry(&self) -> &MasterTelemetry {
        &self.telemetry
    }

    pub fn frames_accepted(&self) -> u32 {
        self.frames_accepted
    }

    pub fn frames_dropped(&self) -> u32 {
        self.frames_dropped
    }

    pub fn due(&mut self, now_ms: u64) -> MasterDue {
        self.schedule.poll(now_ms)
    }

    pub fn record_motion(&mut self, now_ms: u64, sample: MotionSample) -> Option<FallEvent> {
        let t = &mut self.telemetry;
        t.accel = sample.accel;
        t.gyro = sample.gyro;
        t.accel_total = sample.accel.magnitude();

        let event = self.fall.update(now_ms, t.accel_total);
        t.fall_alert = self.fall.alert();
        event
    }

    /// Clears a latched alert whose hold window ran out between samples.
    pub fn expire_alert(&mut self, now_ms: u64) -> Option<FallEvent> {
        let event = self.fall.expire(now_ms);
        self.telemetry.fall_alert = self.fall.alert();
        event
    }

    /// Stores a probe reading; disconnected or out-of-range values become 0.
    pub fn record_temperature(&mut self, now_ms: u64, celsius: f32) -> TemperatureStatus {
        if is_valid_celsius(celsius) {
            self.telemetry.temperature = celsius;
            TemperatureStatus::Valid(celsius)
        } else {
            self.telemetry.temperature = 0.0;
            TemperatureStatus::Invalid {
                raw: celsius,
                warn: self.probe_warning.poll(now_ms),
            }
        }
    }

    /// Feeds raw link bytes; every complete line is parsed and applied. A
    /// rejected frame leaves the previous heart rate and SpO2 in place.
    pub fn receive(&mut self, bytes: &[u8]) -> LinkReport {
        let Self {
            lines, telemetry, ..
        } = self;
        let mut report = LinkReport::default();
        let overflows_before = lines.overflows();

        lines.feed(bytes, |line| {
            if line.iter().all(u8::is_ascii_whitespace) {
                return;
            }
            let result = VitalsFrame::parse_bytes(line);
            apply_frame(telemetry, result);
            match result {
                Ok(frame) => {
                    report.accepted += 1;
                    report.latest = Some(frame);
                }
                Err(e) => {
                    report.dropped += 1;
                    report.last_error = Some(e);
                }
            }
        });
        report.overflowed = lines.overflows().wrapping_sub(overflows_before);

        self.frames_accepted = self.frames_accepted.wrapping_add(report.accepted);
        self.frames_dropped = self.frames_dropped.wrapping_add(report.dropped);
        report
    }

    pub fn upload_body(&self, timestamp_ms: u64) -> Result<JsonBody, EncodeError> {
        encode_json(timestamp_ms, &self.telemetry)
    }
}

impl Default for MasterNode {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_frame(telemetry: &mut MasterTelemetry, result: Result<VitalsFrame, FrameError>) {
    if let Ok(frame) = result {
        telemetry.heart_rate = frame.heart_rate as f32;
        telemetry.spo2 = frame.spo2 as f32;
    }
}
