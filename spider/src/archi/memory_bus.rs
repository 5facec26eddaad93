//! Inter-cluster data transfer cost model.

use crate::common::ceil_div;

type SendRoutine = fn(bytes: i64, packet_ix: i32, buffer: *const u8);
type ReceiveRoutine = fn(bytes: i64, packet_ix: i32, buffer: *mut u8);

/// Connects two clusters for cross-cluster data transfer. `write_speed`/
/// `read_speed` are in bytes per time unit (the same unit the scheduler's
/// `start`/`end` timestamps are expressed in).
pub struct MemoryBus {
    pub write_speed: u64,
    pub read_speed: u64,
    send_routine: Option<SendRoutine>,
    receive_routine: Option<ReceiveRoutine>,
}

impl std::fmt::Debug for MemoryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBus")
            .field("write_speed", &self.write_speed)
            .field("read_speed", &self.read_speed)
            .finish()
    }
}

impl MemoryBus {
    pub fn new() -> Self {
        MemoryBus {
            write_speed: 1,
            read_speed: 1,
            send_routine: None,
            receive_routine: None,
        }
    }

    pub fn set_write_speed(&mut self, bytes_per_time_unit: u64) {
        self.write_speed = bytes_per_time_unit.max(1);
    }

    pub fn set_read_speed(&mut self, bytes_per_time_unit: u64) {
        self.read_speed = bytes_per_time_unit.max(1);
    }

    pub fn set_send_routine(&mut self, cb: SendRoutine) {
        self.send_routine = Some(cb);
    }

    pub fn set_receive_routine(&mut self, cb: ReceiveRoutine) {
        self.receive_routine = Some(cb);
    }

    /// Time to push `bytes` onto this bus (the SEND task's execution time).
    pub fn send_cost(&self, bytes: u64) -> u64 {
        ceil_div(bytes as i64, self.write_speed as i64) as u64
    }

    /// Time to drain `bytes` off this bus (the RECEIVE task's execution
    /// time).
    pub fn receive_cost(&self, bytes: u64) -> u64 {
        ceil_div(bytes as i64, self.read_speed as i64) as u64
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        MemoryBus::new()
    }
}
