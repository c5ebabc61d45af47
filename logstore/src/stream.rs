//! Predicate-filtered streams.
//!
//! A stream is a materialized view: it owns a [`Predicate`] and the
//! insertion-ordered list of record ids for which that predicate held when
//! the record was inserted. Predicates are evaluated exactly once per record
//! and never retroactively, so a stream registered late only sees records
//! inserted after it.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::model::{RecordId, RecordRef, StreamId};

/// Decides whether a record belongs to a stream.
///
/// Implementations must be deterministic and side-effect free, and must not
/// call back into the store that evaluates them. Any
/// `Fn(&RecordRef<'_>) -> bool` closure is a predicate.
///
/// # Example
///
/// ```
/// use logstore::{LogStore, RecordRef};
///
/// let store = LogStore::new();
/// let every_tenth = store.add_stream(|record: &RecordRef<'_>| record.id % 10 == 0);
/// assert_eq!(every_tenth, 0);
/// ```
pub trait Predicate: Send + Sync {
    /// Returns `true` if `record` belongs to the stream.
    fn matches(&self, record: &RecordRef<'_>) -> bool;
}

impl<F> Predicate for F
where
    F: Fn(&RecordRef<'_>) -> bool + Send + Sync,
{
    fn matches(&self, record: &RecordRef<'_>) -> bool {
        self(record)
    }
}

type EntryList = Arc<RwLock<Vec<RecordId>>>;

struct Stream {
    predicate: Box<dyn Predicate>,
    entries: EntryList,
}

/// Registry of all streams.
pub(crate) struct StreamRegistry {
    streams: RwLock<Vec<Stream>>,
    entry_capacity: usize,
}

impl StreamRegistry {
    pub(crate) fn new(entry_capacity: usize) -> Self {
        Self {
            streams: RwLock::new(Vec::new()),
            entry_capacity,
        }
    }

    /// Registers a predicate and returns the new stream's id.
    pub(crate) fn add_stream(&self, predicate: Box<dyn Predicate>) -> StreamId {
        let mut streams = self.streams.write();
        let stream_id = streams.len() as StreamId;
        streams.push(Stream {
            predicate,
            entries: Arc::new(RwLock::new(Vec::with_capacity(self.entry_capacity))),
        });
        tracing::debug!(stream_id, "registered stream");
        stream_id
    }

    /// Evaluates every stream's predicate against `record` and appends the
    /// record id to each stream that matches. Returns the number of matches.
    ///
    /// All predicates run before any entry list is touched, so a predicate
    /// that panics leaves every stream unchanged.
    pub(crate) fn evaluate_and_append(&self, record: &RecordRef<'_>) -> usize {
        let streams = self.streams.read();
        let matching: Vec<&Stream> = streams
            .iter()
            .filter(|stream| stream.predicate.matches(record))
            .collect();
        for stream in &matching {
            stream.entries.write().push(record.id);
        }
        matching.len()
    }

    /// Returns a view over a stream's entries below `published`.
    pub(crate) fn get_stream(&self, stream_id: StreamId, published: RecordId) -> Result<StreamView> {
        let streams = self.streams.read();
        let stream = streams
            .get(stream_id as usize)
            .ok_or(Error::StreamNotFound(stream_id))?;
        Ok(StreamView::snapshot(Arc::clone(&stream.entries), published))
    }

    /// Returns the number of registered streams.
    pub(crate) fn len(&self) -> usize {
        self.streams.read().len()
    }
}

/// Read-only view over a stream's entries.
///
/// The view is fixed when it is created: it covers every entry appended by
/// inserts that completed before [`get_stream`](crate::LogRead::get_stream)
/// returned and ignores anything appended afterwards. Entries are record ids
/// in ascending order.
#[derive(Clone)]
pub struct StreamView {
    entries: EntryList,
    len: usize,
}

impl StreamView {
    fn snapshot(entries: EntryList, published: RecordId) -> Self {
        let len = entries
            .read()
            .partition_point(|&record_id| record_id < published);
        Self { entries, len }
    }

    /// Returns the number of entries in the view.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the view has no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the `position`-th entry of the view.
    pub fn get(&self, position: usize) -> Option<RecordId> {
        if position >= self.len {
            return None;
        }
        self.entries.read().get(position).copied()
    }

    /// Returns the most recent entry of the view.
    pub fn last(&self) -> Option<RecordId> {
        self.len.checked_sub(1).and_then(|position| self.get(position))
    }

    /// Copies the view's entries into a vector.
    pub fn to_vec(&self) -> Vec<RecordId> {
        self.entries.read()[..self.len].to_vec()
    }

    /// Iterates over the view's entries in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = RecordId> + '_ {
        (0..self.len).filter_map(move |position| self.get(position))
    }
}

impl std::fmt::Debug for StreamView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamView").field("len", &self.len).finish()
    }
}
