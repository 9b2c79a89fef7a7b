use std::collections::VecDeque;

use crate::models::WaterQualityRecord;

/// The most recent readings, oldest first. Overflow evicts from the front.
#[derive(Debug, Clone)]
pub struct LiveWindow {
    capacity: usize,
    records: VecDeque<WaterQualityRecord>,
}

impl LiveWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
        }
    }

    /// Append and return how many readings were evicted.
    pub fn push(&mut self, record: WaterQualityRecord) -> usize {
        self.records.push_back(record);

        let mut evicted = 0;
        while self.records.len() > self.capacity {
            self.records.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn latest(&self) -> Option<&WaterQualityRecord> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn to_vec(&self) -> Vec<WaterQualityRecord> {
        self.records.iter().cloned().collect()
    }
}
