//! Register-file bus doubles for driver tests.

use std::collections::VecDeque;
use std::vec::Vec;

use embedded_hal::i2c::{ErrorKind, ErrorType, NoAcknowledgeSource, Operation};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

pub struct NoDelay;

impl DelayNs for NoDelay {
    async fn delay_ns(&mut self, _ns: u32) {}
}

/// Remembers every millisecond delay requested, in order.
#[derive(Default)]
pub struct RecordingDelay {
    pub ms: Vec<u32>,
}

impl DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, _ns: u32) {}

    async fn delay_ms(&mut self, ms: u32) {
        self.ms.push(ms);
    }
}

/// Auto-incrementing register map at one address. Reads from `fifo_reg`
/// pop from `fifo` instead and leave the pointer in place; bits listed in
/// `self_clearing` never stick after a write.
pub struct MockI2c {
    pub addr: u8,
    pub regs: [u8; 256],
    pub writes: Vec<(u8, u8)>,
    pub fifo_reg: Option<u8>,
    pub fifo: VecDeque<u8>,
    pub self_clearing: Vec<(u8, u8)>,
}

impl MockI2c {
    pub fn new(addr: u8) -> Self {
        Self {
            addr,
            regs: [0; 256],
            writes: Vec::new(),
            fifo_reg: None,
            fifo: VecDeque::new(),
            self_clearing: Vec::new(),
        }
    }

    fn clear_mask(&self, reg: u8) -> u8 {
        self.self_clearing
            .iter()
            .filter(|(r, _)| *r == reg)
            .fold(0, |m, (_, mask)| m | mask)
    }
}

impl ErrorType for MockI2c {
    type Error = ErrorKind;
}

impl I2c for MockI2c {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if address != self.addr {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        let mut ptr = 0u8;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    let Some((&reg, data)) = bytes.split_first() else {
                        continue;
                    };
                    ptr = reg;
                    for &b in data {
                        let value = b & !self.clear_mask(ptr);
                        self.regs[ptr as usize] = value;
                        self.writes.push((ptr, b));
                        ptr = ptr.wrapping_add(1);
                    }
                }
                Operation::Read(buf) => {
                    for slot in buf.iter_mut() {
                        if self.fifo_reg == Some(ptr) {
                            *slot = self.fifo.pop_front().unwrap_or(0);
                        } else {
                            *slot = self.regs[ptr as usize];
                            ptr = ptr.wrapping_add(1);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
