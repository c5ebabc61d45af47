//! Append-only payload storage.
//!
//! The [`RecordStore`] owns every payload inserted into the log, addressed
//! directly by [`RecordId`]. Appends are not visible to readers until the
//! writer publishes them: the store keeps a `published` watermark and every
//! read path ignores ids at or above it.
//!
//! Payloads live in fixed-size segments. A segment is allocated at its full
//! length up front, so an append never moves existing payloads and readers
//! are only held off for the push itself.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::model::RecordId;

/// Number of payloads held by one segment.
pub(crate) const SEGMENT_LEN: usize = 4096;

pub(crate) struct RecordStore {
    segments: RwLock<Vec<Vec<Bytes>>>,
    /// Number of records whose insertion has fully completed.
    published: AtomicU64,
}

impl RecordStore {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            segments: RwLock::new(Vec::with_capacity(capacity.div_ceil(SEGMENT_LEN))),
            published: AtomicU64::new(0),
        }
    }

    /// Returns the id the next [`append`](Self::append) will assign.
    pub(crate) fn next_id(&self) -> RecordId {
        let segments = self.segments.read();
        match segments.last() {
            Some(last) => ((segments.len() - 1) * SEGMENT_LEN + last.len()) as RecordId,
            None => 0,
        }
    }

    /// Stores a payload under the next record id and returns that id.
    ///
    /// The record stays invisible to readers until [`publish`](Self::publish)
    /// is called with the returned id. Only the writer may call this.
    pub(crate) fn append(&self, payload: Bytes) -> RecordId {
        let mut segments = self.segments.write();
        if segments.last().is_none_or(|last| last.len() == SEGMENT_LEN) {
            segments.push(Vec::with_capacity(SEGMENT_LEN));
        }
        let position = segments.len() - 1;
        let segment = &mut segments[position];
        let record_id = (position * SEGMENT_LEN + segment.len()) as RecordId;
        segment.push(payload);
        record_id
    }

    /// Makes every record up to and including `record_id` visible.
    pub(crate) fn publish(&self, record_id: RecordId) {
        self.published.store(record_id + 1, Ordering::Release);
    }

    /// Returns the number of published records.
    ///
    /// Any structure updated before a publish is complete for every id
    /// below the returned watermark.
    pub(crate) fn published(&self) -> RecordId {
        self.published.load(Ordering::Acquire)
    }

    /// Returns the payload for a published record.
    pub(crate) fn read(&self, record_id: RecordId) -> Option<Bytes> {
        if record_id >= self.published() {
            return None;
        }
        let segments = self.segments.read();
        locate(&segments, record_id).cloned()
    }

    /// Copies a published payload into the front of `buf`.
    ///
    /// Returns `false` and leaves `buf` untouched when the record is not
    /// published or `buf` cannot hold the payload.
    pub(crate) fn copy_into(&self, buf: &mut [u8], record_id: RecordId) -> bool {
        if record_id >= self.published() {
            return false;
        }
        let segments = self.segments.read();
        match locate(&segments, record_id) {
            Some(payload) if payload.len() <= buf.len() => {
                buf[..payload.len()].copy_from_slice(payload);
                true
            }
            _ => false,
        }
    }
}

fn locate(segments: &[Vec<Bytes>], record_id: RecordId) -> Option<&Bytes> {
    let position = record_id as usize;
    segments
        .get(position / SEGMENT_LEN)
        .and_then(|segment| segment.get(position % SEGMENT_LEN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_assign_sequential_ids() {
        // given
        let store = RecordStore::with_capacity(0);

        // when
        let first = store.append(Bytes::from("a"));
        let second = store.append(Bytes::from("b"));

        // then
        assert_eq!(first, 0);
        assert_eq!(second, 1);
    }

    #[test]
    fn should_hide_records_until_published() {
        // given
        let store = RecordStore::with_capacity(0);
        let record_id = store.append(Bytes::from("pending"));

        // when
        let before = store.read(record_id);
        store.publish(record_id);
        let after = store.read(record_id);

        // then
        assert_eq!(before, None);
        assert_eq!(after, Some(Bytes::from("pending")));
        assert_eq!(store.published(), 1);
    }

    #[test]
    fn should_copy_payload_into_buffer_prefix() {
        // given
        let store = RecordStore::with_capacity(4);
        let record_id = store.append(Bytes::from_static(&[1, 2, 3]));
        store.publish(record_id);
        let mut buf = [9u8; 5];

        // when
        let found = store.copy_into(&mut buf, record_id);

        // then
        assert!(found);
        assert_eq!(buf, [1, 2, 3, 9, 9]);
    }

    #[test]
    fn should_leave_buffer_untouched_when_too_small() {
        // given
        let store = RecordStore::with_capacity(0);
        let record_id = store.append(Bytes::from_static(&[1, 2, 3]));
        store.publish(record_id);
        let mut buf = [0u8; 2];

        // when
        let found = store.copy_into(&mut buf, record_id);

        // then
        assert!(!found);
        assert_eq!(buf, [0, 0]);
    }

    #[test]
    fn should_leave_buffer_untouched_when_out_of_range() {
        // given
        let store = RecordStore::with_capacity(0);
        let mut buf = [7u8; 4];

        // when
        let found = store.copy_into(&mut buf, 0);

        // then
        assert!(!found);
        assert_eq!(buf, [7; 4]);
    }

    #[test]
    fn should_report_next_id_before_append() {
        // given
        let store = RecordStore::with_capacity(0);
        let before = store.next_id();

        // when
        let record_id = store.append(Bytes::from("a"));

        // then
        assert_eq!(before, record_id);
        assert_eq!(store.next_id(), 1);
    }

    #[test]
    fn should_read_records_across_segment_boundary() {
        // given
        let store = RecordStore::with_capacity(0);
        for i in 0..=SEGMENT_LEN {
            store.append(Bytes::from((i as u32).to_le_bytes().to_vec()));
        }
        store.publish(SEGMENT_LEN as RecordId);

        // when
        let last_of_first = store.read(SEGMENT_LEN as RecordId - 1);
        let first_of_second = store.read(SEGMENT_LEN as RecordId);

        // then
        let expected = |i: usize| Some(Bytes::from((i as u32).to_le_bytes().to_vec()));
        assert_eq!(last_of_first, expected(SEGMENT_LEN - 1));
        assert_eq!(first_of_second, expected(SEGMENT_LEN));
        assert_eq!(store.next_id(), SEGMENT_LEN as RecordId + 1);
    }

    #[test]
    fn should_not_move_payloads_when_growing() {
        // given
        let store = RecordStore::with_capacity(0);
        store.append(Bytes::from("first"));
        let segment_start = store.segments.read()[0].as_ptr();

        // when
        for _ in 1..=SEGMENT_LEN {
            store.append(Bytes::from("more"));
        }

        // then
        let segments = store.segments.read();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].as_ptr(), segment_start);
        assert_eq!(segments[0].capacity(), SEGMENT_LEN);
    }
}
