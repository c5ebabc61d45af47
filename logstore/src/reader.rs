//! Read-only log access and the [`LogRead`] trait.
//!
//! This module provides:
//! - [`LogRead`]: The trait defining read operations on the log.
//! - [`LogStoreReader`]: A read-only handle to a log that implements `LogRead`.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;
use crate::model::{FilterConjunction, IndexId, RecordId, StreamId, TokenValue};
use crate::store::StoreState;
use crate::stream::StreamView;

/// Trait for read operations on the log.
///
/// This trait defines the common read interface shared by
/// [`LogStore`](crate::LogStore) and [`LogStoreReader`].
///
/// # Read Visibility
///
/// Reads only observe records whose insert has fully completed. A record
/// that is being inserted concurrently is invisible to every read method
/// until its payload, postings and stream entries are all in place.
///
/// # Example
///
/// ```
/// use logstore::{LogRead, LogStore};
///
/// fn payload_len(reader: &impl LogRead, record_id: u64) -> Option<usize> {
///     reader.read(record_id).map(|payload| payload.len())
/// }
///
/// let store = LogStore::new();
/// let id = store.insert(b"abc", &[]);
/// assert_eq!(payload_len(&store, id), Some(3));
/// assert_eq!(payload_len(&store.reader(), id + 1), None);
/// ```
pub trait LogRead {
    /// Copies the payload of `record_id` into the front of `buf`.
    ///
    /// Returns `false` and leaves `buf` untouched if the record does not
    /// exist or `buf` is shorter than the payload. Never panics, so it can
    /// be called in tight retrieval loops.
    fn get(&self, buf: &mut [u8], record_id: RecordId) -> bool;

    /// Returns the payload of `record_id`, if it exists.
    fn read(&self, record_id: RecordId) -> Option<Bytes>;

    /// Adds the ids of all records matching `query` to `results`.
    ///
    /// The query is in disjunctive normal form: a record matches if it
    /// satisfies every basic filter of at least one conjunction. Empty
    /// conjunctions and filters naming unregistered indexes match nothing.
    fn filter(&self, results: &mut HashSet<RecordId>, query: &[FilterConjunction]);

    /// Returns the ascending ids of records that carried `value` under
    /// `index_id`.
    fn lookup(&self, index_id: IndexId, value: TokenValue) -> Vec<RecordId>;

    /// Returns a view over a stream's entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StreamNotFound`](crate::Error::StreamNotFound) if
    /// `stream_id` was never registered.
    fn get_stream(&self, stream_id: StreamId) -> Result<StreamView>;

    /// Returns the number of records in the log.
    fn len(&self) -> u64;

    /// Returns `true` if the log has no records.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A read-only handle to a log store.
///
/// `LogStoreReader` shares its data with the [`LogStore`](crate::LogStore)
/// it was created from but cannot insert records or register indexes and
/// streams. It is cheap to clone and can be moved to reader threads while
/// the store keeps ingesting.
///
/// # Example
///
/// ```
/// use std::thread;
///
/// use logstore::{LogRead, LogStore};
///
/// let store = LogStore::new();
/// store.insert(b"first", &[]);
///
/// let reader = store.reader();
/// let handle = thread::spawn(move || reader.read(0));
/// assert_eq!(handle.join().unwrap().as_deref(), Some(&b"first"[..]));
/// ```
#[derive(Clone)]
pub struct LogStoreReader {
    state: Arc<StoreState>,
}

impl LogStoreReader {
    pub(crate) fn new(state: Arc<StoreState>) -> Self {
        Self { state }
    }
}

impl LogRead for LogStoreReader {
    fn get(&self, buf: &mut [u8], record_id: RecordId) -> bool {
        self.state.get(buf, record_id)
    }

    fn read(&self, record_id: RecordId) -> Option<Bytes> {
        self.state.read(record_id)
    }

    fn filter(&self, results: &mut HashSet<RecordId>, query: &[FilterConjunction]) {
        self.state.filter(results, query)
    }

    fn lookup(&self, index_id: IndexId, value: TokenValue) -> Vec<RecordId> {
        self.state.lookup(index_id, value)
    }

    fn get_stream(&self, stream_id: StreamId) -> Result<StreamView> {
        self.state.get_stream(stream_id)
    }

    fn len(&self) -> u64 {
        self.state.len()
    }
}
