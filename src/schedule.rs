//! Elapsed-time gates for the round-robin polling loops.
//!
//! Every gate is independent: a gate fires when at least `period_ms` has
//! passed since it last fired, and the first check after boot always fires.

use crate::config::{
    LINK_POLL_PERIOD_MS, MOTION_POLL_PERIOD_MS, SLAVE_READ_PERIOD_MS, SLAVE_SEND_PERIOD_MS,
    TEMPERATURE_POLL_PERIOD_MS, UPLOAD_PERIOD_MS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Interval {
    period_ms: u64,
    last_ms: Option<u64>,
}

impl Interval {
    pub const fn new(period_ms: u64) -> Self {
        Self {
            period_ms,
            last_ms: None,
        }
    }

    /// Returns true and re-arms the gate if the period has elapsed.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        let due = match self.last_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.period_ms,
        };
        if due {
            self.last_ms = Some(now_ms);
        }
        due
    }
}

/// Which Master pollers run on this loop iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MasterDue {
    pub motion: bool,
    pub temperature: bool,
    pub link: bool,
    pub upload: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct MasterSchedule {
    motion: Interval,
    temperature: Interval,
    link: Interval,
    upload: Interval,
}

impl MasterSchedule {
    pub const fn new() -> Self {
        Self {
            motion: Interval::new(MOTION_POLL_PERIOD_MS),
            temperature: Interval::new(TEMPERATURE_POLL_PERIOD_MS),
            link: Interval::new(LINK_POLL_PERIOD_MS),
            upload: Interval::new(UPLOAD_PERIOD_MS),
        }
    }

    pub fn poll(&mut self, now_ms: u64) -> MasterDue {
        MasterDue {
            motion: self.motion.poll(now_ms),
            temperature: self.temperature.poll(now_ms),
            link: self.link.poll(now_ms),
            upload: self.upload.poll(now_ms),
        }
    }
}

impl Default for MasterSchedule {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlaveDue {
    pub read: bool,
    pub send: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SlaveSchedule {
    read: Interval,
    send: Interval,
}

impl SlaveSchedule {
    pub const fn new() -> Self {
        Self {
            read: Interval::new(SLAVE_READ_PERIOD_MS),
            send: Interval::new(SLAVE_SEND_PERIOD_MS),
        }
    }

    pub fn poll(&mut self, now_ms: u64) -> SlaveDue {
        SlaveDue {
            read: self.read.poll(now_ms),
            send: self.send.poll(now_ms),
        }
    }
}

impl Default for SlaveSchedule {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_poll_fires_then_waits_full_period() {
        let mut gate = Interval::new(500);
        assert!(gate.poll(1_000));
        assert!(!gate.poll(1_001));
        assert!(!gate.poll(1_499));
        assert!(gate.poll(1_500));
        assert!(!gate.poll(1_999));
    }

    #[test]
    fn late_poll_rearms_from_actual_time() {
        let mut gate = Interval::new(100);
        assert!(gate.poll(0));
        assert!(gate.poll(250));
        assert!(!gate.poll(349));
        assert!(gate.poll(350));
    }

    #[test]
    fn master_gates_run_independently() {
        let mut schedule = MasterSchedule::new();
        let boot = schedule.poll(0);
        assert!(boot.motion && boot.temperature && boot.link && boot.upload);

        let due = schedule.poll(100);
        assert_eq!(
            due,
            MasterDue {
                motion: true,
                ..MasterDue::default()
            }
        );

        let due = schedule.poll(500);
        assert!(due.motion && due.link);
        assert!(!due.temperature && !due.upload);

        let due = schedule.poll(2_000);
        assert!(due.motion && due.link && due.temperature && due.upload);
    }

    #[test]
    fn slave_read_and_send_share_one_second_cadence() {
        let mut schedule = SlaveSchedule::new();
        assert_eq!(schedule.poll(0), SlaveDue { read: true, send: true });
        assert_eq!(schedule.poll(990), SlaveDue::default());
        assert_eq!(schedule.poll(1_000), SlaveDue { read: true, send: true });
    }
}
