//! Rolling history buffers for ingested utilization samples
//!
//! Three parallel bounded sequences (CPU%, RAM%, process features) share one
//! capacity; the oldest entry of each is evicted once the capacity is
//! exceeded. All three buffers always hold the same number of entries.

use std::collections::VecDeque;

use crate::features::ProcessFeatures;

/// One utilization observation as stored by the history buffers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub cpu_percent: f64,
    pub ram_percent: f64,
    pub processes: ProcessFeatures,
}

/// Owned point-in-time copy of the CPU and RAM series, oldest first
#[derive(Debug, Clone, Default)]
pub struct HistorySnapshot {
    pub cpu: Vec<f64>,
    pub ram: Vec<f64>,
}

/// Fixed-capacity rolling store for the three sample series
#[derive(Debug)]
pub struct HistoryStore {
    capacity: usize,
    cpu: VecDeque<f64>,
    ram: VecDeque<f64>,
    features: VecDeque<ProcessFeatures>,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            cpu: VecDeque::with_capacity(capacity),
            ram: VecDeque::with_capacity(capacity),
            features: VecDeque::with_capacity(capacity),
        }
    }

    /// Append one sample, evicting the oldest entries at capacity.
    ///
    /// All three buffers are pushed in lockstep so the equal-length invariant
    /// holds at every exit point.
    pub fn push(&mut self, sample: Sample) {
        if self.cpu.len() == self.capacity {
            self.cpu.pop_front();
            self.ram.pop_front();
            self.features.pop_front();
        }

        self.cpu.push_back(sample.cpu_percent);
        self.ram.push_back(sample.ram_percent);
        self.features.push_back(sample.processes);
    }

    /// Current sample count
    pub fn len(&self) -> usize {
        self.cpu.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cpu.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent raw CPU/RAM pair, if any sample has been recorded
    pub fn latest(&self) -> Option<(f64, f64)> {
        match (self.cpu.back(), self.ram.back()) {
            (Some(&cpu), Some(&ram)) => Some((cpu, ram)),
            _ => None,
        }
    }

    /// Owned copy of the CPU and RAM series, oldest first.
    ///
    /// Callers that iterate for longer than a single lock hold (training,
    /// prediction) read from the snapshot, never from the live buffers.
    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            cpu: self.cpu.iter().copied().collect(),
            ram: self.ram.iter().copied().collect(),
        }
    }

    /// The trailing `len` entries of the CPU series, oldest first
    pub fn cpu_tail(&self, len: usize) -> Vec<f64> {
        let skip = self.cpu.len().saturating_sub(len);
        self.cpu.iter().skip(skip).copied().collect()
    }

    /// The trailing `len` entries of the RAM series, oldest first
    pub fn ram_tail(&self, len: usize) -> Vec<f64> {
        let skip = self.ram.len().saturating_sub(len);
        self.ram.iter().skip(skip).copied().collect()
    }

    #[cfg(test)]
    fn feature_len(&self) -> usize {
        self.features.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(v: f64) -> Sample {
        Sample {
            cpu_percent: v,
            ram_percent: v * 0.5,
            processes: ProcessFeatures::default(),
        }
    }

    #[test]
    fn test_length_is_bounded_by_capacity() {
        let mut store = HistoryStore::new(5);
        for i in 0..3 {
            store.push(sample(i as f64));
        }
        assert_eq!(store.len(), 3);

        for i in 3..20 {
            store.push(sample(i as f64));
        }
        assert_eq!(store.len(), 5);
        assert_eq!(store.feature_len(), 5);
    }

    #[test]
    fn test_eviction_keeps_most_recent_suffix() {
        let mut store = HistoryStore::new(4);
        for i in 0..10 {
            store.push(sample(i as f64));
        }

        let snap = store.snapshot();
        assert_eq!(snap.cpu, vec![6.0, 7.0, 8.0, 9.0]);
        assert_eq!(snap.ram, vec![3.0, 3.5, 4.0, 4.5]);
    }

    #[test]
    fn test_latest() {
        let mut store = HistoryStore::new(4);
        assert_eq!(store.latest(), None);

        store.push(sample(42.0));
        assert_eq!(store.latest(), Some((42.0, 21.0)));
    }

    #[test]
    fn test_tails() {
        let mut store = HistoryStore::new(10);
        for i in 0..6 {
            store.push(sample(i as f64));
        }

        assert_eq!(store.cpu_tail(3), vec![3.0, 4.0, 5.0]);
        assert_eq!(store.ram_tail(100).len(), 6);
    }

    #[test]
    fn test_snapshot_is_detached_from_store() {
        let mut store = HistoryStore::new(4);
        store.push(sample(1.0));

        let snap = store.snapshot();
        store.push(sample(2.0));

        assert_eq!(snap.cpu, vec![1.0]);
        assert_eq!(store.len(), 2);
    }
}
