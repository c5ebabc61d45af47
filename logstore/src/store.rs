//! The log store and its insertion pipeline.
//!
//! This module provides [`LogStore`], the primary entry point. It owns the
//! record store, the index and stream registries, and the metrics, and keeps
//! them consistent as records are inserted. Read operations are provided via
//! the [`LogRead`] trait.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::Result;
use crate::index::IndexRegistry;
use crate::metrics::Metrics;
use crate::model::{FilterConjunction, IndexId, RecordId, RecordRef, StreamId, Token, TokenValue};
use crate::query;
use crate::reader::{LogRead, LogStoreReader};
use crate::records::RecordStore;
use crate::stream::{Predicate, StreamRegistry, StreamView};

/// State shared between a [`LogStore`] and its readers.
pub(crate) struct StoreState {
    records: RecordStore,
    indexes: IndexRegistry,
    streams: StreamRegistry,
    metrics: Metrics,
}

impl StoreState {
    pub(crate) fn get(&self, buf: &mut [u8], record_id: RecordId) -> bool {
        let found = self.records.copy_into(buf, record_id);
        if !found {
            self.metrics.get_misses_total.inc();
        }
        found
    }

    pub(crate) fn read(&self, record_id: RecordId) -> Option<Bytes> {
        let payload = self.records.read(record_id);
        if payload.is_none() {
            self.metrics.get_misses_total.inc();
        }
        payload
    }

    #[tracing::instrument(level = "trace", skip_all)]
    pub(crate) fn filter(&self, results: &mut HashSet<RecordId>, query: &[FilterConjunction]) {
        self.metrics.filter_queries_total.inc();
        let published = self.records.published();
        let matched = query::evaluate(&self.indexes, query, published);
        results.extend(matched.iter());
    }

    pub(crate) fn lookup(&self, index_id: IndexId, value: TokenValue) -> Vec<RecordId> {
        self.indexes
            .lookup(index_id, value, self.records.published())
    }

    pub(crate) fn get_stream(&self, stream_id: StreamId) -> Result<StreamView> {
        self.streams
            .get_stream(stream_id, self.records.published())
    }

    pub(crate) fn len(&self) -> u64 {
        self.records.published()
    }
}

/// An in-memory, append-only log with secondary indexes and streams.
///
/// Records are opaque payloads identified by dense sequential ids. Each
/// insert may carry [`Token`]s that add the record to the posting lists of
/// registered indexes, and every registered stream evaluates its predicate
/// against the record exactly once.
///
/// # Thread Safety
///
/// `LogStore` is designed to be shared across threads. Inserts are
/// serialized internally, so ids follow the order in which inserts acquire
/// the writer lock. Readers run concurrently with inserts and only ever see
/// records whose insert has completed: a record becomes visible to `get`,
/// `filter`, `lookup` and `get_stream` at the same instant, never
/// half-indexed.
///
/// # Example
///
/// ```
/// use std::collections::HashSet;
///
/// use logstore::{BasicFilter, LogRead, LogStore, RecordRef, Token};
///
/// let store = LogStore::new();
/// let service = store.add_index(1).unwrap();
/// let errors = store.add_stream(|r: &RecordRef<'_>| r.payload.starts_with(b"ERR"));
///
/// let id = store.insert(b"ERR disk full", &[Token::new(service, 7)]);
/// store.insert(b"OK", &[Token::new(service, 8)]);
///
/// let mut results = HashSet::new();
/// store.filter(&mut results, &[vec![BasicFilter::new(service, 7)]]);
/// assert_eq!(results, HashSet::from([id]));
/// assert_eq!(store.get_stream(errors).unwrap().to_vec(), vec![id]);
/// ```
pub struct LogStore {
    state: Arc<StoreState>,
    /// Serializes inserts.
    writer: Mutex<()>,
}

impl LogStore {
    /// Creates an empty store with the default configuration.
    pub fn new() -> Self {
        Self::open(Config::default())
    }

    /// Creates an empty store with the given configuration.
    pub fn open(config: Config) -> Self {
        Self::open_with_metrics(config, Metrics::new())
    }

    /// Creates an empty store that reports into `metrics`.
    ///
    /// Metrics registered on [`Metrics::registry_mut`] beforehand are encoded
    /// alongside the store's own.
    pub fn open_with_metrics(config: Config, metrics: Metrics) -> Self {
        let state = StoreState {
            records: RecordStore::with_capacity(config.record_capacity),
            indexes: IndexRegistry::new(),
            streams: StreamRegistry::new(config.stream_capacity),
            metrics,
        };
        Self {
            state: Arc::new(state),
            writer: Mutex::new(()),
        }
    }

    /// Registers a secondary index and returns its id.
    ///
    /// The k-th index registered receives `2^(10 + k)`. `width` is the byte
    /// width of the attribute's values; it sizes the index's posting table
    /// but does not restrict the values that may be inserted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityExhausted`](crate::Error::CapacityExhausted)
    /// once [`MAX_INDEXES`](crate::MAX_INDEXES) indexes are registered.
    pub fn add_index(&self, width: u32) -> Result<IndexId> {
        let index_id = self.state.indexes.add_index(width)?;
        self.state
            .metrics
            .indexes
            .set(self.state.indexes.len() as i64);
        Ok(index_id)
    }

    /// Registers a stream and returns its id.
    ///
    /// Stream ids are sequential starting at 0. The predicate is evaluated
    /// for every record inserted after registration; earlier records are
    /// never evaluated.
    pub fn add_stream<P>(&self, predicate: P) -> StreamId
    where
        P: Predicate + 'static,
    {
        let stream_id = self.state.streams.add_stream(Box::new(predicate));
        self.state
            .metrics
            .streams
            .set(self.state.streams.len() as i64);
        stream_id
    }

    /// Inserts a copy of `payload` and returns the record's id.
    ///
    /// Every token naming a registered index adds the record to that index's
    /// posting list for the token's value. Tokens naming an unregistered
    /// index are ignored.
    pub fn insert(&self, payload: &[u8], tokens: &[Token]) -> RecordId {
        self.insert_bytes(Bytes::copy_from_slice(payload), tokens)
    }

    /// Inserts `payload` without copying it and returns the record's id.
    pub fn insert_bytes(&self, payload: Bytes, tokens: &[Token]) -> RecordId {
        let _writer = self.writer.lock();
        let state = &*self.state;

        // Predicates run first: a panicking predicate must leave nothing
        // behind. Everything else is built next and published in one step.
        let record_id = state.records.next_id();
        let record = RecordRef {
            id: record_id,
            payload: &payload,
            tokens,
        };
        let matched = state.streams.evaluate_and_append(&record);
        let mut indexed = 0;
        for token in tokens {
            if state
                .indexes
                .record_token(token.index_id, token.value, record_id)
            {
                indexed += 1;
            }
        }
        let payload_len = payload.len();
        state.records.append(payload);
        state.records.publish(record_id);

        let metrics = &state.metrics;
        metrics.records_inserted_total.inc();
        metrics.bytes_inserted_total.inc_by(payload_len as u64);
        metrics.tokens_indexed_total.inc_by(indexed);
        metrics
            .tokens_ignored_total
            .inc_by(tokens.len() as u64 - indexed);
        metrics.stream_matches_total.inc_by(matched as u64);

        record_id
    }

    /// Returns the width an index was registered with.
    pub fn index_width(&self, index_id: IndexId) -> Option<u32> {
        self.state.indexes.width(index_id)
    }

    /// Returns the number of registered indexes.
    pub fn index_count(&self) -> usize {
        self.state.indexes.len()
    }

    /// Returns the number of registered streams.
    pub fn stream_count(&self) -> usize {
        self.state.streams.len()
    }

    /// Returns a read-only handle sharing this store's data.
    pub fn reader(&self) -> LogStoreReader {
        LogStoreReader::new(Arc::clone(&self.state))
    }

    /// Returns the store's metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.state.metrics
    }
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogRead for LogStore {
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
