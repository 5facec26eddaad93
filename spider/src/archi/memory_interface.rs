//! Per-cluster, mutex-guarded virtual-address-to-buffer map with
//! reference-counted entries.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::{SpiderError, SpiderResult};

struct Buffer {
    data: Box<[u8]>,
    size: u64,
    count: i64,
}

/// Allocates, reads, and deallocates buffers keyed by virtual address
/// within one cluster. `allocate` reserves a fresh buffer and seeds its
/// reader count; `read` registers additional readers; `deallocate`
/// releases one reader, freeing the buffer once the count reaches zero.
pub struct MemoryInterface {
    total: u64,
    used: Mutex<u64>,
    buffers: Mutex<HashMap<u64, Buffer>>,
}

impl std::fmt::Debug for MemoryInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryInterface")
            .field("total", &self.total)
            .field("used", &*self.used.lock())
            .finish()
    }
}

impl MemoryInterface {
    pub fn new(total: u64) -> Self {
        MemoryInterface {
            total,
            used: Mutex::new(0),
            buffers: Mutex::new(HashMap::new()),
        }
    }

    pub fn available(&self) -> u64 {
        self.total - *self.used.lock()
    }

    /// Reserve `size` bytes at `vaddr`, seeded with `count` readers.
    pub fn allocate(&self, vaddr: u64, size: u64, count: i64) -> SpiderResult<()> {
        let mut used = self.used.lock();
        let available = self.total - *used;
        if size > available {
            return Err(SpiderError::MemoryAllocationFailure {
                requested: size,
                available,
            });
        }
        let data = vec![0u8; size as usize].into_boxed_slice();
        self.buffers.lock().insert(vaddr, Buffer { data, size, count });
        *used += size;
        Ok(())
    }

    /// Register `count` additional readers of the buffer at `vaddr`.
    pub fn read(&self, vaddr: u64, count: i64) -> SpiderResult<u64> {
        let mut buffers = self.buffers.lock();
        let buffer = buffers
            .get_mut(&vaddr)
            .ok_or_else(|| SpiderError::InvalidApiUsage {
                message: format!("read of unregistered virtual address {:#x}", vaddr),
            })?;
        buffer.count += count;
        Ok(buffer.size)
    }

    /// Borrow the physical storage at `vaddr`, for kernel invocation.
    pub fn with_buffer<R>(&self, vaddr: u64, f: impl FnOnce(&[u8]) -> R) -> SpiderResult<R> {
        let buffers = self.buffers.lock();
        let buffer = buffers
            .get(&vaddr)
            .ok_or_else(|| SpiderError::InvalidApiUsage {
                message: format!("access to unregistered virtual address {:#x}", vaddr),
            })?;
        Ok(f(&buffer.data))
    }

    /// Release one reader of the buffer at `vaddr`; frees it once the
    /// count reaches zero. Debug builds reject double frees and negative
    /// deallocate counts, matching the original's debug-only assertions.
    pub fn deallocate(&self, vaddr: u64, size: u64) -> SpiderResult<()> {
        let mut buffers = self.buffers.lock();
        let went_negative = {
            let buffer = buffers
                .get_mut(&vaddr)
                .ok_or(SpiderError::DoubleFree { address: vaddr })?;
            buffer.count -= 1;
            buffer.count < 0
        };
        if went_negative && cfg!(debug_assertions) {
            return Err(SpiderError::NegativeDeallocate { address: vaddr });
        }
        let should_free = buffers.get(&vaddr).map(|b| b.count <= 0).unwrap_or(false);
        if should_free {
            buffers.remove(&vaddr);
            let mut used = self.used.lock();
            *used = used.saturating_sub(size);
        }
        Ok(())
    }

    /// Sweep every entry whose count went below zero (an external release
    /// outlived its registered readers) and free it.
    pub fn garbage_collect(&self) {
        let mut buffers = self.buffers.lock();
        let stale: Vec<u64> = buffers
            .iter()
            .filter(|(_, b)| b.count < 0)
            .map(|(&vaddr, _)| vaddr)
            .collect();
        let mut used = self.used.lock();
        for vaddr in stale {
            if let Some(buffer) = buffers.remove(&vaddr) {
                *used = used.saturating_sub(buffer.size);
            }
        }
    }

    /// Drop the entire virtual-address map without running any release
    /// hook. Used at platform teardown, not per-iteration.
    pub fn clear(&self) {
        self.buffers.lock().clear();
        *self.used.lock() = 0;
    }
}
