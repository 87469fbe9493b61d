//! Telemetry records owned by each node's loop, plus the sentinel clamps
//! applied to raw sensor values before they are stored.

use crate::config::{
    HEART_RATE_MAX_BPM, HEART_RATE_MIN_BPM, SPO2_MAX_PERCENT, SPO2_MIN_PERCENT,
    TEMPERATURE_MAX_C, TEMPERATURE_MIN_C,
};

/// Value reported by a one-wire probe that did not answer.
pub const DEVICE_DISCONNECTED_C: f32 = -127.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f32 {
        libm::sqrtf(self.x * self.x + self.y * self.y + self.z * self.z)
    }
}

/// One inertial sample: acceleration in m/s², angular rate in °/s.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionSample {
    pub accel: Vector3,
    pub gyro: Vector3,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MasterTelemetry {
    pub temperature: f32,
    pub accel: Vector3,
    pub accel_total: f32,
    pub gyro: Vector3,
    pub fall_alert: bool,
    pub heart_rate: f32,
    pub spo2: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlaveTelemetry {
    pub heart_rate: f32,
    pub spo2: f32,
    pub finger_present: bool,
}

pub fn is_valid_celsius(celsius: f32) -> bool {
    celsius != DEVICE_DISCONNECTED_C && celsius > TEMPERATURE_MIN_C && celsius < TEMPERATURE_MAX_C
}

/// Maps disconnected or out-of-range probe readings to 0.
pub fn sanitize_celsius(celsius: f32) -> f32 {
    if is_valid_celsius(celsius) {
        celsius
    } else {
        0.0
    }
}

pub fn clamp_heart_rate(bpm: f32) -> f32 {
    if (HEART_RATE_MIN_BPM..=HEART_RATE_MAX_BPM).contains(&bpm) {
        bpm
    } else {
        0.0
    }
}

pub fn clamp_spo2(percent: f32) -> f32 {
    if (SPO2_MIN_PERCENT..=SPO2_MAX_PERCENT).contains(&percent) {
        percent
    } else {
        0.0
    }
}
