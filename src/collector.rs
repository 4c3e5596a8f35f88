//! Task-safe sink for completed request records.

use std::sync::Mutex;

use crate::record::RequestRecord;

/// Accumulates one record per completed request.
///
/// The mutex guards only the push itself, so unrelated completions contend
/// for nanoseconds rather than serializing behind the whole record set.
/// `into_records` consumes the collector and is only reachable once the
/// runner has joined every request task, which is what makes the read safe.
#[derive(Debug, Default)]
pub struct ResultCollector {
    records: Mutex<Vec<RequestRecord>>,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record. Safe to call concurrently from completing tasks.
    pub fn append(&self, record: RequestRecord) {
        // A poisoned mutex means a panic mid-push; losing the run at that
        // point is correct, a silently incomplete record set is not.
        self.records
            .lock()
            .expect("result collector mutex poisoned")
            .push(record);
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .expect("result collector mutex poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume the collector and return all records in completion order.
    pub fn into_records(self) -> Vec<RequestRecord> {
        self.records
            .into_inner()
            .expect("result collector mutex poisoned")
    }
}
