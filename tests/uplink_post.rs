//! The HTTP upload against an in-memory bridge.

use std::collections::VecDeque;
use std::convert::Infallible;

use embassy_futures::block_on;
use embassy_futures::select::{select, Either};
use embedded_io_async::{ErrorType, Read, Write};

use vitals_link::telemetry::{MotionSample, Vector3};
use vitals_link::uplink::{HttpUplink, UplinkError};
use vitals_link::MasterNode;

#[derive(Default)]
struct Sent(Vec<u8>);

impl ErrorType for Sent {
    type Error = Infallible;
}

impl Write for Sent {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Infallible> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }
}

struct Reply(VecDeque<u8>);

impl Reply {
    fn new(text: &str) -> Self {
        Self(text.bytes().collect())
    }
}

impl ErrorType for Reply {
    type Error = Infallible;
}

impl Read for Reply {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Infallible> {
        let n = buf.len().min(self.0.len());
        for slot in &mut buf[..n] {
            *slot = self.0.pop_front().unwrap_or(0);
        }
        Ok(n)
    }
}

/// A bridge that accepts the request and never answers.
struct Silent;

impl ErrorType for Silent {
    type Error = Infallible;
}

impl Read for Silent {
    async fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Infallible> {
        core::future::pending().await
    }
}

fn uplink(reply: &str) -> HttpUplink<Sent, Reply> {
    HttpUplink::new(Sent::default(), Reply::new(reply), "example.test", "/vitals")
}

#[test]
fn posts_master_record_as_json() {
    let mut node = MasterNode::new();
    node.record_temperature(0, 36.8);
    node.record_motion(
        0,
        MotionSample {
            accel: Vector3::new(0.0, 3.0, 4.0),
            gyro: Vector3::default(),
        },
    );
    node.receive(b"HR:70,SPO2:97\n");
    let body = node.upload_body(2_000).unwrap();

    let mut link = uplink("HTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n");
    assert_eq!(block_on(link.post_json(&body)), Ok(201));

    let (sent, _) = link.into_parts();
    let sent = String::from_utf8(sent.0).unwrap();
    let (head, payload) = sent.split_once("\r\n\r\n").unwrap();
    assert_eq!(
        head,
        format!(
            "POST /vitals HTTP/1.1\r\nHost: example.test\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close",
            body.len()
        )
    );
    assert_eq!(payload, body.as_str());
    assert!(payload.contains("\"heartRate\":70,\"spo2\":97"));
    assert!(payload.contains("\"total\":5.00"));
    assert!(payload.ends_with("\"fallAlert\":true}"));
}

#[test]
fn non_2xx_status_is_a_failure() {
    let mut link = uplink("HTTP/1.1 500 Internal Server Error\r\n\r\n");
    assert_eq!(block_on(link.post_json("{}")), Err(UplinkError::Status(500)));
    assert_eq!(link.posts(), 1);
    assert_eq!(link.failures(), 1);
}

#[test]
fn closed_or_garbled_responses_fail() {
    let mut link = uplink("");
    assert_eq!(block_on(link.post_json("{}")), Err(UplinkError::Closed));

    let mut link = uplink("CONNECT FAIL\r\n");
    assert_eq!(block_on(link.post_json("{}")), Err(UplinkError::BadStatusLine));
}

#[test]
fn abandoned_post_counts_as_failure() {
    let mut link = HttpUplink::new(Sent::default(), Silent, "example.test", "/vitals");
    let outcome = block_on(select(link.post_json("{}"), core::future::ready(())));
    assert!(matches!(outcome, Either::Second(())));

    link.record_timeout();
    assert_eq!(link.posts(), 1);
    assert_eq!(link.failures(), 1);

    let (sent, _) = link.into_parts();
    assert!(sent.0.starts_with(b"POST /vitals HTTP/1.1\r\n"));
}
