//! Append-only partition log for the in-memory broker

use std::collections::VecDeque;

use crate::topic::ConsumerRecord;

/// In-memory, append-only log of a single partition
#[derive(Debug, Default)]
pub struct PartitionLog {
    records: VecDeque<ConsumerRecord>,
    /// Offset of the next record to be appended
    high_watermark: u64,
    /// Earliest available offset (advances on retention)
    log_start_offset: u64,
}

impl PartitionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and return its assigned offset
    pub fn append(&mut self, mut record: ConsumerRecord) -> u64 {
        let offset = self.high_watermark;
        record.metadata.offset = offset;
        self.records.push_back(record);
        self.high_watermark += 1;
        offset
    }

    /// Record stored at `offset`, if still retained
    pub fn read(&self, offset: u64) -> Option<&ConsumerRecord> {
        if offset < self.log_start_offset || offset >= self.high_watermark {
            return None;
        }
        self.records.get((offset - self.log_start_offset) as usize)
    }

    /// Drop the oldest records so at most `max_records` remain.
    ///
    /// Returns the number of records removed.
    pub fn retain_last(&mut self, max_records: usize) -> usize {
        let excess = self.records.len().saturating_sub(max_records);
        self.records.drain(..excess);
        self.log_start_offset += excess as u64;
        excess
    }

    pub fn high_watermark(&self) -> u64 {
        self.high_watermark
    }

    pub fn log_start_offset(&self) -> u64 {
        self.log_start_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topic::{Headers, RecordMetadata};

    fn make_record(partition: u32) -> ConsumerRecord {
        ConsumerRecord {
            metadata: RecordMetadata {
                topic: "t".into(),
                partition,
                offset: 0,
                timestamp: 1_700_000_000_000,
            },
            key: None,
            value: b"data".to_vec(),
            headers: Headers::new(),
        }
    }

    #[test]
    fn test_append_and_read() {
        let mut log = PartitionLog::new();
        assert_eq!(log.append(make_record(0)), 0);
        assert_eq!(log.append(make_record(0)), 1);
        assert_eq!(log.high_watermark(), 2);

        assert_eq!(log.read(1).unwrap().offset(), 1);
        assert!(log.read(2).is_none());
    }

    #[test]
    fn test_retention() {
        let mut log = PartitionLog::new();
        for _ in 0..5 {
            log.append(make_record(0));
        }
        assert_eq!(log.retain_last(2), 3);
        assert_eq!(log.log_start_offset(), 3);
        assert_eq!(log.high_watermark() - log.log_start_offset(), 2);
        assert!(log.read(2).is_none());
        assert_eq!(log.read(3).unwrap().offset(), 3);
        assert_eq!(log.retain_last(10), 0);
    }
}
