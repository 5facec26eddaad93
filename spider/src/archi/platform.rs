//! Clusters and processing elements.

use crate::archi::memory_interface::MemoryInterface;

/// A concrete executor within a cluster.
#[derive(Debug, Clone)]
pub struct Pe {
    pub name: String,
    pub hw_type: u32,
    pub hw_ix: u32,
    pub virtual_ix: u32,
    pub enabled: bool,
}

impl Pe {
    pub fn new(name: &str, hw_type: u32, hw_ix: u32, virtual_ix: u32) -> Self {
        Pe {
            name: name.to_owned(),
            hw_type,
            hw_ix,
            virtual_ix,
            enabled: true,
        }
    }
}

/// A group of PEs sharing one memory interface.
#[derive(Debug)]
pub struct Cluster {
    pub ix: u32,
    pub pes: Vec<Pe>,
    pub memory_interface: MemoryInterface,
    /// Round-robin search cursor, one per cluster, preserved across mapper
    /// invocations (`currentPeIx_` in the original mapper).
    pub(crate) round_robin_cursor: usize,
}

impl Cluster {
    pub fn new(ix: u32, memory_size: u64) -> Self {
        Cluster {
            ix,
            pes: Vec::new(),
            memory_interface: MemoryInterface::new(memory_size),
            round_robin_cursor: 0,
        }
    }

    pub fn add_pe(&mut self, pe: Pe) -> usize {
        self.pes.push(pe);
        self.pes.len() - 1
    }

    pub fn pe_count(&self) -> usize {
        self.pes.len()
    }
}

/// The full multiprocessor target: a set of clusters plus which PE hosts
/// the GRT.
#[derive(Debug, Default)]
pub struct Platform {
    pub clusters: Vec<Cluster>,
    pub grt_pe: Option<(u32, usize)>,
}

impl Platform {
    pub fn new(cluster_count: u32, memory_size_per_cluster: u64) -> Self {
        Platform {
            clusters: (0..cluster_count)
                .map(|ix| Cluster::new(ix, memory_size_per_cluster))
                .collect(),
            grt_pe: None,
        }
    }

    pub fn set_grt_pe(&mut self, cluster_ix: u32, pe_ix: usize) {
        self.grt_pe = Some((cluster_ix, pe_ix));
    }

    pub fn find_pe_by_virtual_ix(&self, virtual_ix: u32) -> Option<(u32, usize)> {
        for cluster in &self.clusters {
            for (pe_ix, pe) in cluster.pes.iter().enumerate() {
                if pe.virtual_ix == virtual_ix {
                    return Some((cluster.ix, pe_ix));
                }
            }
        }
        None
    }

    pub fn pe_count(&self) -> usize {
        self.clusters.iter().map(|c| c.pe_count()).sum()
    }
}
