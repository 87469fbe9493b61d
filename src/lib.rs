#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod drivers;
pub mod fall;
pub mod master;
pub mod protocol;
pub mod schedule;
pub mod slave;
pub mod telemetry;
pub mod uplink;

#[cfg(feature = "firmware")]
pub mod board;
#[cfg(feature = "firmware")]
pub mod tasks;

#[cfg(feature = "firmware")]
pub use board::{MasterBoard, SlaveBoard};
pub use master::MasterNode;
pub use protocol::VitalsFrame;
pub use slave::SlaveNode;
pub use telemetry::{MasterTelemetry, SlaveTelemetry};
