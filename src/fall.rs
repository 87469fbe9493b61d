//! Threshold fall detector: one latch, a re-arm cooldown and an auto-clear
//! timeout. The magnitude includes gravity, so at the default threshold
//! ordinary movement trips it; it acts as a coarse motion detector.

use crate::config::{FALL_ALERT_HOLD_MS, FALL_COOLDOWN_MS, FALL_THRESHOLD_MS2};

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FallEvent {
    Triggered { magnitude: f32 },
    Cleared,
}

#[derive(Debug, Clone, Copy)]
pub struct FallDetector {
    threshold: f32,
    cooldown_ms: u64,
    hold_ms: u64,
    last_trigger_ms: Option<u64>,
    alert: bool,
}

impl FallDetector {
    pub const fn new() -> Self {
        Self::with_params(FALL_THRESHOLD_MS2, FALL_COOLDOWN_MS, FALL_ALERT_HOLD_MS)
    }

    pub const fn with_params(threshold: f32, cooldown_ms: u64, hold_ms: u64) -> Self {
        Self {
            threshold,
            cooldown_ms,
            hold_ms,
            last_trigger_ms: None,
            alert: false,
        }
    }

    pub fn alert(&self) -> bool {
        self.alert
    }

    pub fn last_trigger_ms(&self) -> Option<u64> {
        self.last_trigger_ms
    }

    /// Feeds one acceleration magnitude sample taken at `now_ms`.
    pub fn update(&mut self, now_ms: u64, magnitude: f32) -> Option<FallEvent> {
        let armed = match self.last_trigger_ms {
            None => true,
            Some(t) => now_ms.saturating_sub(t) >= self.cooldown_ms,
        };

        if magnitude > self.threshold && armed {
            self.alert = true;
            self.last_trigger_ms = Some(now_ms);
            return Some(FallEvent::Triggered { magnitude });
        }

        self.expire(now_ms)
    }

    /// Clears the latch once the hold window has passed, without a new sample.
    pub fn expire(&mut self, now_ms: u64) -> Option<FallEvent> {
        match self.last_trigger_ms {
            Some(t) if self.alert && now_ms.saturating_sub(t) >= self.hold_ms => {
                self.alert = false;
                Some(FallEvent::Cleared)
            }
            _ => None,
        }
    }
}

impl Default for FallDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_or_below_threshold_never_triggers() {
        let mut det = FallDetector::new();
        for i in 0..200u64 {
            let mag = FALL_THRESHOLD_MS2 * (i as f32 / 200.0);
            assert_eq!(det.update(i * 100, mag), None);
            assert!(!det.alert());
        }
        assert_eq!(det.update(20_100, FALL_THRESHOLD_MS2), None);
        assert!(!det.alert());
    }

    #[test]
    fn alert_holds_for_exactly_the_clear_window() {
        let mut det = FallDetector::new();
        assert_eq!(
            det.update(1_000, 9.8),
            Some(FallEvent::Triggered { magnitude: 9.8 })
        );
        let mut t = 1_100;
        while t < 1_000 + FALL_ALERT_HOLD_MS {
            det.update(t, 0.0);
            assert!(det.alert(), "alert dropped early at {}", t);
            t += 100;
        }
        assert_eq!(det.update(1_000 + FALL_ALERT_HOLD_MS, 0.0), Some(FallEvent::Cleared));
        assert!(!det.alert());
    }

    #[test]
    fn motion_inside_hold_window_does_not_extend_it() {
        let mut det = FallDetector::new();
        det.update(0, 12.0);
        assert_eq!(det.update(1_500, 12.0), None);
        assert_eq!(det.update(3_000, 12.0), Some(FallEvent::Cleared));
        assert_eq!(det.last_trigger_ms(), Some(0));
    }

    #[test]
    fn cannot_retrigger_inside_cooldown() {
        let mut det = FallDetector::new();
        det.update(0, 12.0);
        let mut t = 100;
        while t < FALL_COOLDOWN_MS {
            assert!(!matches!(det.update(t, 12.0), Some(FallEvent::Triggered { .. })));
            t += 100;
        }
        assert!(!det.alert());
        assert_eq!(
            det.update(FALL_COOLDOWN_MS, 12.0),
            Some(FallEvent::Triggered { magnitude: 12.0 })
        );
        assert!(det.alert());
    }

    #[test]
    fn expire_clears_without_samples() {
        let mut det = FallDetector::new();
        det.update(10_000, 5.0);
        assert_eq!(det.expire(12_999), None);
        assert_eq!(det.expire(13_000), Some(FallEvent::Cleared));
        assert_eq!(det.expire(14_000), None);
    }
}
