// Centralize all configuration constants

// Master cadence
pub const MOTION_POLL_PERIOD_MS: u64 = 100;
pub const TEMPERATURE_POLL_PERIOD_MS: u64 = 2_000;
pub const LINK_POLL_PERIOD_MS: u64 = 500;
pub const UPLOAD_PERIOD_MS: u64 = 2_000;
pub const MASTER_LOOP_TICK_MS: u64 = 10;

// Slave cadence
pub const SLAVE_UPDATE_PERIOD_MS: u64 = 10;
pub const SLAVE_READ_PERIOD_MS: u64 = 1_000;
pub const SLAVE_SEND_PERIOD_MS: u64 = 1_000;

// Fall detection (m/s², compared against the raw acceleration magnitude)
pub const FALL_THRESHOLD_MS2: f32 = 1.5;
pub const FALL_COOLDOWN_MS: u64 = 5_000;
pub const FALL_ALERT_HOLD_MS: u64 = 3_000;

// Physiological / sensor validity bounds
pub const HEART_RATE_MIN_BPM: f32 = 30.0;
pub const HEART_RATE_MAX_BPM: f32 = 250.0;
pub const SPO2_MIN_PERCENT: f32 = 70.0;
pub const SPO2_MAX_PERCENT: f32 = 100.0;
pub const TEMPERATURE_MIN_C: f32 = -55.0;
pub const TEMPERATURE_MAX_C: f32 = 125.0;
pub const PROBE_WARNING_PERIOD_MS: u64 = 10_000;

// Inter-node link
pub const LINK_BAUDRATE: u32 = 9_600;
pub const LINK_LINE_CAPACITY: usize = 64;
pub const LINK_DMA_BUF_SIZE: usize = 256;

// Network bridge (serial passthrough to the HTTP endpoint)
pub const BRIDGE_BAUDRATE: u32 = 115_200;
pub const BRIDGE_DMA_BUF_SIZE: usize = 512;
pub const BRIDGE_CONNECT_ATTEMPTS: u32 = 20;
pub const BRIDGE_CONNECT_POLL_MS: u64 = 500;
pub const UPLINK_TIMEOUT_MS: u64 = 5_000;
pub const JSON_BODY_CAPACITY: usize = 320;
pub const HTTP_HEAD_CAPACITY: usize = 256;
pub const HTTP_STATUS_LINE_CAPACITY: usize = 64;

pub const API_HOST: &str = match option_env!("VITALS_API_HOST") {
    Some(host) => host,
    None => "health-monitor-uyt6.onrender.com",
};
pub const API_PATH: &str = match option_env!("VITALS_API_PATH") {
    Some(path) => path,
    None => "/vitals",
};

// Buses
pub const IMU_I2C_FREQUENCY_HZ: u32 = 400_000;
pub const OXIMETER_I2C_FREQUENCY_HZ: u32 = 100_000;

// Driver bring-up
pub const INIT_ATTEMPTS: u32 = 5;
pub const INIT_BACKOFF_BASE_MS: u32 = 200;
