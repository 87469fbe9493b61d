pub mod master;
pub mod slave;

pub use master::{master_task, MasterPeripherals};
pub use slave::slave_task;
