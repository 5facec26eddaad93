//! Per-edge buffer descriptors and the allocator that produces them.

use std::collections::HashMap;

use crate::archi::MemoryInterface;
use crate::error::SpiderResult;
use crate::sched::schedule::Schedule;
use crate::sched::task::TaskState;

pub const SENTINEL_ADDRESS: u64 = u64::MAX;

/// Ownership/sharing semantics of a [`Fifo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FifoAttribute {
    /// Producer-allocated buffer, freed when the reference count drops to
    /// zero.
    RwOwn,
    /// A view into a producer's buffer (FORK/DUPLICATE outputs); never
    /// freed directly.
    RwOnly,
    /// An externally registered address; never allocated or freed by the
    /// runtime.
    RwExt,
}

/// A descriptor for one port-side buffer: virtual address, byte offset
/// within it, size, remaining-consumer count, and ownership attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fifo {
    pub address: u64,
    pub offset: u32,
    pub size: u32,
    pub count: u32,
    pub attribute: FifoAttribute,
}

impl Fifo {
    pub fn unallocated() -> Self {
        Fifo {
            address: SENTINEL_ADDRESS,
            offset: 0,
            size: 0,
            count: 0,
            attribute: FifoAttribute::RwOwn,
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.address != SENTINEL_ADDRESS
    }
}

/// Per-cluster bump allocator handing out virtual addresses for `RW_OWN`
/// buffers. A `NoSync`-enabled allocator additionally permits the
/// FORK/DUPLICATE/EXTERN_IN shortcut of §4.8.
#[derive(Debug, Default)]
pub struct FifoAllocator {
    next_address: HashMap<u32, u64>,
    no_sync: bool,
}

impl FifoAllocator {
    pub fn new(no_sync: bool) -> Self {
        FifoAllocator {
            next_address: HashMap::new(),
            no_sync,
        }
    }

    pub fn no_sync(&self) -> bool {
        self.no_sync
    }

    fn reserve(&mut self, cluster: u32, size: u32) -> u64 {
        let next = self.next_address.entry(cluster).or_insert(0);
        let addr = *next;
        *next += size as u64;
        addr
    }

    /// Output of a normal actor: `bytes = rate * producer_firing_count`,
    /// `count` is the number of consuming firings. The address is reserved
    /// from this allocator's bump cursor, then registered with the owning
    /// cluster's `MemoryInterface` so capacity is actually tracked and
    /// `MemoryAllocationFailure` can surface once a cluster runs out.
    pub fn allocate_normal_output(
        &mut self,
        cluster: u32,
        rate: u32,
        producer_firing_count: u32,
        consumer_count: u32,
        memory: &MemoryInterface,
    ) -> SpiderResult<Fifo> {
        let size = rate * producer_firing_count;
        let address = self.reserve(cluster, size);
        memory.allocate(address, size as u64, consumer_count as i64)?;
        Ok(Fifo {
            address,
            offset: 0,
            size,
            count: consumer_count,
            attribute: FifoAttribute::RwOwn,
        })
    }

    /// Output of EXTERN_IN, or input of EXTERN_OUT: the externally
    /// registered address, never owned by the runtime.
    pub fn allocate_extern(&self, address: u64, size: u32) -> Fifo {
        Fifo {
            address,
            offset: 0,
            size,
            count: 0,
            attribute: FifoAttribute::RwExt,
        }
    }
}

/// FORK output: fragment the input buffer into successive offset views,
/// one per output edge, `RW_ONLY`.
pub fn allocate_fork_outputs(input: &Fifo, output_sizes: &[u32], consumer_counts: &[u32]) -> Vec<Fifo> {
    let mut offset = input.offset;
    output_sizes
        .iter()
        .zip(consumer_counts.iter())
        .map(|(&size, &count)| {
            let fifo = Fifo {
                address: input.address,
                offset,
                size,
                count,
                attribute: FifoAttribute::RwOnly,
            };
            offset += size;
            fifo
        })
        .collect()
}

/// DUPLICATE output: every output references the same `(address, offset)`,
/// `RW_ONLY`.
pub fn allocate_duplicate_outputs(input: &Fifo, consumer_counts: &[u32]) -> Vec<Fifo> {
    consumer_counts
        .iter()
        .map(|&count| Fifo {
            address: input.address,
            offset: input.offset,
            size: input.size,
            count,
            attribute: FifoAttribute::RwOnly,
        })
        .collect()
}

/// The NoSync shortcut for a FORK/DUPLICATE/EXTERN_IN predecessor: if the
/// producer task is still `RUNNING`, fold the consumer's input count into
/// the producer's own output Fifo and mark the intermediate task
/// `SKIPPED` so no job message is sent for it.
///
/// Returns `true` if the shortcut applied.
pub fn try_no_sync_shortcut(
    schedule: &mut Schedule,
    producer_task_ix: usize,
    intermediate_task_ix: usize,
    producer_fifo: &mut Fifo,
    consumer_input_count: u32,
) -> bool {
    let producer_running = schedule
        .task(producer_task_ix)
        .map(|t| t.state == TaskState::Running)
        .unwrap_or(false);
    if !producer_running {
        return false;
    }
    producer_fifo.count += consumer_input_count.saturating_sub(1);
    if let Some(task) = schedule.task_mut(intermediate_task_ix) {
        task.state = TaskState::Skipped;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_sharing_scenario() {
        // V(outRate 4) -> F(fork, 4 outputs of rate 1) -> {C0..C3 each rate 1}.
        let memory = MemoryInterface::new(1 << 16);
        let mut allocator = FifoAllocator::new(false);
        let v_output = allocator.allocate_normal_output(0, 4, 1, 4, &memory).unwrap();
        assert_eq!(v_output.attribute, FifoAttribute::RwOwn);
        assert_eq!(v_output.count, 4);

        let fork_outputs = allocate_fork_outputs(&v_output, &[1, 1, 1, 1], &[1, 1, 1, 1]);
        assert_eq!(fork_outputs.len(), 4);
        for (i, fifo) in fork_outputs.iter().enumerate() {
            assert_eq!(fifo.address, v_output.address);
            assert_eq!(fifo.offset, i as u32);
            assert_eq!(fifo.attribute, FifoAttribute::RwOnly);
        }
    }

    #[test]
    fn duplicate_outputs_share_same_offset() {
        let memory = MemoryInterface::new(1 << 16);
        let mut allocator = FifoAllocator::new(false);
        let input = allocator.allocate_normal_output(0, 8, 1, 3, &memory).unwrap();
        let outs = allocate_duplicate_outputs(&input, &[1, 1, 1]);
        for fifo in &outs {
            assert_eq!(fifo.address, input.address);
            assert_eq!(fifo.offset, input.offset);
        }
    }

    #[test]
    fn allocate_normal_output_fails_beyond_cluster_capacity() {
        let memory = MemoryInterface::new(4);
        let mut allocator = FifoAllocator::new(false);
        let err = allocator.allocate_normal_output(0, 8, 1, 1, &memory).unwrap_err();
        assert_eq!(err.kind(), "MemoryAllocationFailure");
    }

    #[test]
    fn no_sync_shortcut_requires_running_producer() {
        use crate::sched::task::Task;
        let mut schedule = Schedule::new();
        let producer_ix = schedule.add_task(Task::new_vertex(0, 0, 0));
        let intermediate_ix = schedule.add_task(Task::new_vertex(1, 0, 0));
        let mut producer_fifo = Fifo {
            address: 0,
            offset: 0,
            size: 4,
            count: 1,
            attribute: FifoAttribute::RwOwn,
        };
        assert!(!try_no_sync_shortcut(
            &mut schedule,
            producer_ix,
            intermediate_ix,
            &mut producer_fifo,
            2
        ));
        schedule.task_mut(producer_ix).unwrap().state = TaskState::Running;
        assert!(try_no_sync_shortcut(
            &mut schedule,
            producer_ix,
            intermediate_ix,
            &mut producer_fifo,
            2
        ));
        assert_eq!(producer_fifo.count, 2);
        assert_eq!(schedule.task(intermediate_ix).unwrap().state, TaskState::Skipped);
    }
}
