//! Slave node state: finger presence, the validated reading and the frame
//! sent to the Master once per second.

use crate::drivers::max30100::OximetryEstimate;
use crate::protocol::{EncodedFrame, VitalsFrame};
use crate::schedule::SlaveSchedule;
use crate::telemetry::{clamp_heart_rate, clamp_spo2, SlaveTelemetry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FingerChange {
    Placed,
    Removed,
}

/// What one pass of the Slave loop produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlaveStep {
    pub finger: Option<FingerChange>,
    /// Set on read cycles while a finger is on the sensor.
    pub reading: Option<SlaveTelemetry>,
    pub frame: Option<EncodedFrame>,
}

pub struct SlaveNode {
    telemetry: SlaveTelemetry,
    schedule: SlaveSchedule,
    frames_sent: u32,
}

impl SlaveNode {
    pub fn new() -> Self {
        Self {
            telemetry: SlaveTelemetry::default(),
            schedule: SlaveSchedule::new(),
            frames_sent: 0,
        }
    }

    pub fn telemetry(&self) -> &SlaveTelemetry {
        &self.telemetry
    }

    pub fn frames_sent(&self) -> u32 {
        self.frames_sent
    }

    pub fn step(&mut self, now_ms: u64, estimate: &OximetryEstimate) -> SlaveStep {
        let mut step = SlaveStep::default();
        let t = &mut self.telemetry;

        let finger = estimate.heart_rate > 0.0 || estimate.spo2 > 0.0;
        if finger != t.finger_present {
            t.finger_present = finger;
            if finger {
                step.finger = Some(FingerChange::Placed);
            } else {
                t.heart_rate = 0.0;
                t.spo2 = 0.0;
                step.finger = Some(FingerChange::Removed);
            }
        }

        let due = self.schedule.poll(now_ms);
        if due.read {
            t.heart_rate = clamp_heart_rate(estimate.heart_rate);
            t.spo2 = clamp_spo2(estimate.spo2);
            if t.finger_present {
                step.reading = Some(*t);
            }
        }
        if due.send {
            step.frame = Some(VitalsFrame::from_readings(t.heart_rate, t.spo2).encode());
            self.frames_sent = self.frames_sent.wrapping_add(1);
        }
        step
    }
}

impl Default for SlaveNode {
    fn default() -> Self {
        Self::new()
    }
}
