//! Slave→Master line protocol.
//!
//! One frame per line: `HR:<int>,SPO2:<int>\n`. The parser is a tolerant
//! tokenizer over comma-separated `KEY:VALUE` fields; both `HR` and `SPO2`
//! must be present or the frame is rejected and the receiver keeps its last
//! values.

use core::fmt::Write;

use heapless::{String, Vec};

pub const HEART_RATE_KEY: &str = "HR";
pub const SPO2_KEY: &str = "SPO2";
pub const FIELD_SEPARATOR: char = ',';
pub const KEY_SEPARATOR: char = ':';
pub const LINE_TERMINATOR: u8 = b'\n';

/// Longest encoded frame: `HR:65535,SPO2:65535\n`.
pub const MAX_FRAME_LEN: usize = 24;

pub type EncodedFrame = String<MAX_FRAME_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    NotText,
    MissingHeartRate,
    MissingSpo2,
    BadNumber,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VitalsFrame {
    pub heart_rate: u16,
    pub spo2: u16,
}

impl VitalsFrame {
    /// Rounds readings to whole units, half away from zero.
    pub fn from_readings(heart_rate: f32, spo2: f32) -> Self {
        Self {
            heart_rate: round_to_u16(heart_rate),
            spo2: round_to_u16(spo2),
        }
    }

    pub fn encode(&self) -> EncodedFrame {
        let mut out = EncodedFrame::new();
        // Capacity covers the widest u16 pair.
        let _ = write!(
            out,
            "{}{}{}{}{}{}{}{}",
            HEART_RATE_KEY,
            KEY_SEPARATOR,
            self.heart_rate,
            FIELD_SEPARATOR,
            SPO2_KEY,
            KEY_SEPARATOR,
            self.spo2,
            LINE_TERMINATOR as char
        );
        out
    }

    pub fn parse_bytes(line: &[u8]) -> Result<Self, FrameError> {
        let text = core::str::from_utf8(line).map_err(|_| FrameError::NotText)?;
        Self::parse(text)
    }

    pub fn parse(line: &str) -> Result<Self, FrameError> {
        let mut heart_rate = None;
        let mut spo2 = None;

        for field in line.trim().split(FIELD_SEPARATOR) {
            let Some((key, value)) = field.split_once(KEY_SEPARATOR) else {
                continue;
            };
            match key.trim() {
                HEART_RATE_KEY => heart_rate = Some(parse_reading(value)?),
                SPO2_KEY => spo2 = Some(parse_reading(value)?),
                _ => {}
            }
        }

        Ok(Self {
            heart_rate: heart_rate.ok_or(FrameError::MissingHeartRate)?,
            spo2: spo2.ok_or(FrameError::MissingSpo2)?,
        })
    }
}

fn parse_reading(value: &str) -> Result<u16, FrameError> {
    let value = value.trim();
    if let Ok(n) = value.parse::<u16>() {
        return Ok(n);
    }
    match value.parse::<f32>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v <= u16::MAX as f32 => Ok(round_to_u16(v)),
        _ => Err(FrameError::BadNumber),
    }
}

fn round_to_u16(v: f32) -> u16 {
    if v.is_nan() || v <= 0.0 {
        0
    } else {
        libm::roundf(v).min(u16::MAX as f32) as u16
    }
}

/// Assembles bytes from the serial link into lines.
///
/// A line longer than `N` is discarded up to its terminator so the receiver
/// resynchronizes on the next frame boundary.
pub struct LineBuffer<const N: usize> {
    buf: Vec<u8, N>,
    discarding: bool,
    overflows: u32,
}

impl<const N: usize> LineBuffer<N> {
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            discarding: false,
            overflows: 0,
        }
    }

    /// Number of over-long lines thrown away so far.
    pub fn overflows(&self) -> u32 {
        self.overflows
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Feeds raw bytes; `on_line` receives each complete line without its
    /// terminator.
    pub fn feed(&mut self, bytes: &[u8], mut on_line: impl FnMut(&[u8])) {
        for &b in bytes {
            if b == LINE_TERMINATOR {
                if !self.discarding {
                    on_line(&self.buf);
                }
                self.buf.clear();
                self.discarding = false;
                continue;
            }
            if self.discarding {
                continue;
            }
            if self.buf.push(b).is_err() {
                self.buf.clear();
                self.discarding = true;
                self.overflows = self.overflows.wrapping_add(1);
            }
        }
    }
}

impl<const N: usize> Default for LineBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
