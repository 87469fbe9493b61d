//! Slave frames fed byte for byte into the Master's receive path.

use vitals_link::drivers::OximetryEstimate;
use vitals_link::protocol::FrameError;
use vitals_link::{MasterNode, SlaveNode};

fn estimate(heart_rate: f32, spo2: f32) -> OximetryEstimate {
    OximetryEstimate {
        heart_rate,
        spo2,
        last_beat_ms: Some(0),
    }
}

#[test]
fn slave_frames_reach_master_record() {
    let mut slave = SlaveNode::new();
    let mut master = MasterNode::new();

    let readings = [(0, 71.6, 97.2), (1_000, 74.0, 98.0), (2_000, 260.0, 98.0)];
    let mut expected = [(72.0, 97.0), (74.0, 98.0), (0.0, 98.0)].into_iter();

    for (now, hr, spo2) in readings {
        let frame = slave.step(now, &estimate(hr, spo2)).frame.unwrap();
        // 9600 baud delivers the frame in pieces
        let (head, tail) = frame.as_bytes().split_at(5);
        assert_eq!(master.receive(head).accepted, 0);
        assert_eq!(master.receive(tail).accepted, 1);

        let (hr, spo2) = expected.next().unwrap();
        assert_eq!(master.telemetry().heart_rate, hr);
        assert_eq!(master.telemetry().spo2, spo2);
    }
    assert_eq!(master.frames_accepted(), 3);
    assert_eq!(master.frames_dropped(), 0);
}

#[test]
fn finger_removal_propagates_as_zeroes() {
    let mut slave = SlaveNode::new();
    let mut master = MasterNode::new();

    let frame = slave.step(0, &estimate(80.0, 96.0)).frame.unwrap();
    master.receive(frame.as_bytes());
    assert_eq!(master.telemetry().heart_rate, 80.0);

    assert!(slave.step(500, &estimate(0.0, 0.0)).frame.is_none());
    let frame = slave.step(1_000, &estimate(0.0, 0.0)).frame.unwrap();
    assert_eq!(frame.as_str(), "HR:0,SPO2:0\n");
    master.receive(frame.as_bytes());
    assert_eq!(master.telemetry().heart_rate, 0.0);
    assert_eq!(master.telemetry().spo2, 0.0);
}

#[test]
fn line_noise_does_not_clobber_last_values() {
    let mut master = MasterNode::new();
    master.receive(b"HR:66,SPO2:99\n");

    let report = master.receive(b"\x00\x13HR:7\n");
    assert_eq!(report.accepted, 0);
    assert_eq!(report.dropped, 1);
    assert_eq!(report.last_error, Some(FrameError::MissingHeartRate));

    let report = master.receive(&[b'x'; 200]);
    assert_eq!(report.accepted + report.dropped, 0);
    assert_eq!(report.overflowed, 1);
    let report = master.receive(b"\nHR:68,SPO2:97\n");
    assert_eq!(report.accepted, 1);
    assert_eq!(report.dropped, 0);

    assert_eq!(master.telemetry().heart_rate, 68.0);
    assert_eq!(master.telemetry().spo2, 97.0);
}
