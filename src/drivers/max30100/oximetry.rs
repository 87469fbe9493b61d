//! Running heart-rate / SpO2 estimate from raw IR and red photodiode samples.
//!
//! IR drives beat detection: DC removal, a light low-pass, then a hysteresis
//! crossing detector whose threshold follows the signal envelope. Each beat
//! closes a window over which the AC RMS of both channels is compared to
//! their DC levels (ratio of ratios) to estimate SpO2.

use super::RawSample;

const DC_ALPHA: f32 = 0.95;
const LOW_PASS_GAIN: f32 = 0.4;
const ENVELOPE_DECAY: f32 = 0.995;
const HYSTERESIS_RATIO: f32 = 0.3;
const MIN_HYSTERESIS: f32 = 20.0;

// 200 BPM / 30 BPM
const MIN_BEAT_INTERVAL_MS: u64 = 300;
const MAX_BEAT_INTERVAL_MS: u64 = 2_000;
const BEAT_TIMEOUT_MS: u64 = 2_500;

const RATE_SMOOTHING: f32 = 0.25;
const SPO2_SMOOTHING: f32 = 0.25;
const MIN_DC_LEVEL: f32 = 1_000.0;

/// Snapshot consumed by the Slave loop. `last_beat_ms` replaces a beat
/// callback: the loop polls it instead of being called back.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OximetryEstimate {
    pub heart_rate: f32,
    pub spo2: f32,
    pub last_beat_ms: Option<u64>,
}

impl OximetryEstimate {
    pub fn millis_since_beat(&self, now_ms: u64) -> Option<u64> {
        self.last_beat_ms.map(|t| now_ms.saturating_sub(t))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct DcRemover {
    w: Option<f32>,
}

impl DcRemover {
    /// Returns the AC component; the state is seeded so a constant input
    /// yields zero from the first sample.
    fn step(&mut self, x: f32) -> f32 {
        let prev = self.w.unwrap_or(x / (1.0 - DC_ALPHA));
        let w = x + DC_ALPHA * prev;
        self.w = Some(w);
        w - prev
    }

    fn dc(&self) -> f32 {
        self.w.map_or(0.0, |w| w * (1.0 - DC_ALPHA))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BeatDetector {
    armed: bool,
    envelope: f32,
    last_beat_ms: Option<u64>,
}

impl BeatDetector {
    fn step(&mut self, now_ms: u64, ac: f32) -> bool {
        self.envelope = libm::fabsf(ac).max(self.envelope * ENVELOPE_DECAY);
        let hysteresis = (self.envelope * HYSTERESIS_RATIO).max(MIN_HYSTERESIS);

        if ac < -hysteresis {
            self.armed = true;
            return false;
        }
        if !self.armed || ac <= hysteresis {
            return false;
        }
        self.armed = false;

        match self.last_beat_ms {
            Some(t) if now_ms.saturating_sub(t) < MIN_BEAT_INTERVAL_MS => false,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Oximeter {
    ir_dc: DcRemover,
    red_dc: DcRemover,
    ir_filtered: f32,
    beats: BeatDetector,
    heart_rate: f32,
    spo2: f32,
    ir_sq_sum: f32,
    red_sq_sum: f32,
    window_len: u32,
}

impl Oximeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn estimate(&self) -> OximetryEstimate {
        OximetryEstimate {
            heart_rate: self.heart_rate,
            spo2: self.spo2,
            last_beat_ms: self.beats.last_beat_ms,
        }
    }

    /// Feeds one FIFO sample taken at `now_ms`; returns true on a beat.
    pub fn push(&mut self, now_ms: u64, sample: RawSample) -> bool {
        let ir_ac = self.ir_dc.step(sample.ir as f32);
        let red_ac = self.red_dc.step(sample.red as f32);

        self.ir_sq_sum += ir_ac * ir_ac;
        self.red_sq_sum += red_ac * red_ac;
        self.window_len += 1;

        self.ir_filtered += LOW_PASS_GAIN * (ir_ac - self.ir_filtered);
        let beat = self.beats.step(now_ms, self.ir_filtered);

        if beat {
            self.on_beat(now_ms);
        } else {
            self.expire(now_ms);
        }
        beat
    }

    /// Drops the estimate once beats stop arriving (finger lifted).
    pub fn expire(&mut self, now_ms: u64) {
        if let Some(t) = self.beats.last_beat_ms {
            if now_ms.saturating_sub(t) > BEAT_TIMEOUT_MS {
                self.heart_rate = 0.0;
                self.spo2 = 0.0;
            }
        }
    }

    fn on_beat(&mut self, now_ms: u64) {
        if let Some(prev) = self.beats.last_beat_ms {
            let interval = now_ms.saturating_sub(prev);
            if interval <= MAX_BEAT_INTERVAL_MS {
                let bpm = 60_000.0 / interval as f32;
                self.heart_rate = smooth(self.heart_rate, bpm, RATE_SMOOTHING);
                if let Some(sample) = self.window_spo2() {
                    self.spo2 = smooth(self.spo2, sample, SPO2_SMOOTHING);
                }
            }
        }
        self.beats.last_beat_ms = Some(now_ms);
        self.ir_sq_sum = 0.0;
        self.red_sq_sum = 0.0;
        self.window_len = 0;
    }

    fn window_spo2(&self) -> Option<f32> {
        let (ir_dc, red_dc) = (self.ir_dc.dc(), self.red_dc.dc());
        if self.window_len == 0 || ir_dc < MIN_DC_LEVEL || red_dc < MIN_DC_LEVEL {
            return None;
        }
        let n = self.window_len as f32;
        let ir_rms = libm::sqrtf(self.ir_sq_sum / n);
        let red_rms = libm::sqrtf(self.red_sq_sum / n);
        if ir_rms <= 0.0 {
            return None;
        }
        let ratio = (red_rms / red_dc) / (ir_rms / ir_dc);
        Some((110.0 - 25.0 * ratio).clamp(0.0, 100.0))
    }
}

fn smooth(current: f32, sample: f32, gain: f32) -> f32 {
    if current <= 0.0 {
        sample
    } else {
        current + gain * (sample - current)
    }
}
