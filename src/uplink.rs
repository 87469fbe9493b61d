//! Upload of the Master record: the JSON body and the single HTTP/1.1 POST
//! written to the network bridge.
//!
//! The bridge is a transparent serial-to-TCP passthrough, so the request is
//! framed here byte for byte and the status line is read back from the same
//! link. Nothing is queued or retried; a failed upload is simply reported.

use core::fmt::{self, Write as _};

use embedded_io_async::{Read, Write};
use heapless::{String, Vec};

use crate::config::{HTTP_HEAD_CAPACITY, HTTP_STATUS_LINE_CAPACITY, JSON_BODY_CAPACITY};
use crate::telemetry::MasterTelemetry;

pub type JsonBody = String<JSON_BODY_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncodeError;

impl From<fmt::Error> for EncodeError {
    fn from(_: fmt::Error) -> Self {
        EncodeError
    }
}

/// Two-decimal fixed point, rounding ties away from zero. `{:.2}` would
/// round the exact binary ties (every 1/16 °C step ending in .125, .375,
/// .625 or .875) to even instead.
struct Centi(f32);

impl fmt::Display for Centi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scaled = libm::round(self.0 as f64 * 100.0);
        let hundredths = if scaled.is_finite() { scaled as i64 } else { 0 };
        let sign = if hundredths < 0 { "-" } else { "" };
        let abs = hundredths.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// Serializes the record as a flat JSON object with a fixed field order:
/// continuous values with two decimals, heart rate and SpO2 with none.
pub fn encode_json(timestamp_ms: u64, t: &MasterTelemetry) -> Result<JsonBody, EncodeError> {
    let mut body = JsonBody::new();
    write!(
        body,
        "{{\"timestamp\":{},\"temperature\":{},\"heartRate\":{:.0},\"spo2\":{:.0},",
        timestamp_ms,
        Centi(t.temperature),
        t.heart_rate,
        t.spo2
    )?;
    write!(
        body,
        "\"accelerometer\":{{\"x\":{},\"y\":{},\"z\":{},\"total\":{}}},",
        Centi(t.accel.x),
        Centi(t.accel.y),
        Centi(t.accel.z),
        Centi(t.accel_total)
    )?;
    write!(
        body,
        "\"gyroscope\":{{\"x\":{},\"y\":{},\"z\":{}}},",
        Centi(t.gyro.x),
        Centi(t.gyro.y),
        Centi(t.gyro.z)
    )?;
    write!(body, "\"fallAlert\":{}}}", t.fall_alert)?;
    Ok(body)
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UplinkError<E> {
    Io(E),
    /// The bridge closed the connection before a status line arrived.
    Closed,
    HeadOverflow,
    BadStatusLine,
    Status(u16),
}

impl<E> From<E> for UplinkError<E> {
    fn from(e: E) -> Self {
        Self::Io(e)
    }
}

/// Parses `HTTP/1.x NNN ...` into the status code.
pub fn parse_status_line(line: &[u8]) -> Option<u16> {
    let text = core::str::from_utf8(line).ok()?;
    let mut parts = text.trim().split(' ').filter(|p| !p.is_empty());
    let version = parts.next()?;
    if !version.starts_with("HTTP/1.") {
        return None;
    }
    let code = parts.next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse().ok().filter(|c| (100..600).contains(c))
}

pub struct HttpUplink<W, R> {
    tx: W,
    rx: R,
    host: &'static str,
    path: &'static str,
    posts: u32,
    failures: u32,
}

impl<W, R, E> HttpUplink<W, R>
where
    W: Write<Error = E>,
    R: Read<Error = E>,
{
    pub fn new(tx: W, rx: R, host: &'static str, path: &'static str) -> Self {
        Self {
            tx,
            rx,
            host,
            path,
            posts: 0,
            failures: 0,
        }
    }

    pub fn rx_mut(&mut self) -> &mut R {
        &mut self.rx
    }

    pub fn into_parts(self) -> (W, R) {
        (self.tx, self.rx)
    }

    pub fn posts(&self) -> u32 {
        self.posts
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Counts a post whose future was dropped by the caller's deadline.
    pub fn record_timeout(&mut self) {
        self.failures = self.failures.wrapping_add(1);
    }

    /// Sends one POST and waits for the response status line.
    pub async fn post_json(&mut self, body: &str) -> Result<u16, UplinkError<E>> {
        self.posts = self.posts.wrapping_add(1);
        let result = self.exchange(body).await;
        if result.is_err() {
            self.failures = self.failures.wrapping_add(1);
        }
        result
    }

    async fn exchange(&mut self, body: &str) -> Result<u16, UplinkError<E>> {
        let mut head: String<HTTP_HEAD_CAPACITY> = String::new();
        write!(
            head,
            "POST {} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.path,
            self.host,
            body.len()
        )
        .map_err(|_| UplinkError::HeadOverflow)?;

        self.tx.write_all(head.as_bytes()).await?;
        self.tx.write_all(body.as_bytes()).await?;
        self.tx.flush().await?;

        let line = self.read_status_line().await?;
        let code = parse_status_line(&line).ok_or(UplinkError::BadStatusLine)?;
        if (200..300).contains(&code) {
            Ok(code)
        } else {
            Err(UplinkError::Status(code))
        }
    }

    async fn read_status_line(&mut self) -> Result<Vec<u8, HTTP_STATUS_LINE_CAPACITY>, UplinkError<E>> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = self.rx.read(&mut byte).await?;
            if n == 0 {
                return Err(UplinkError::Closed);
            }
            match byte[0] {
                b'\n' => return Ok(line),
                b'\r' => {}
                b => line.push(b).map_err(|_| UplinkError::BadStatusLine)?,
            }
        }
    }
}
