//! Platform topology: clusters, processing elements, memory buses, and the
//! per-cluster memory interface.

pub mod memory_bus;
pub mod memory_interface;
pub mod platform;

pub use memory_bus::MemoryBus;
pub use memory_interface::MemoryInterface;
pub use platform::{Cluster, Pe, Platform};
