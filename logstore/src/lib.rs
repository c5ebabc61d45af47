//! LogStore - An in-memory append-only log with secondary indexes and streams.
//!
//! LogStore ingests a high-velocity sequence of opaque records. Each record is
//! tagged with a small set of integer attribute assignments ([`Token`]s) and
//! can then be found three ways without re-scanning history:
//!
//! - by position, through its dense sequential [`RecordId`];
//! - by attribute, through filter queries over registered indexes;
//! - through streams, materialized views of records that matched a fixed
//!   predicate at insertion time.
//!
//! # Architecture
//!
//! The store is a single append-only array of payloads plus two registries.
//! The index registry maps each (index, value) pair to a posting list of
//! record ids; the stream registry keeps one entry list per predicate. An
//! insert appends to all three and then advances a published watermark, so
//! concurrent readers observe each record either completely or not at all.
//!
//! # Key Concepts
//!
//! - **LogStore**: The main entry point providing both read and write
//!   operations.
//! - **LogStoreReader**: A read-only handle, useful for reader threads that
//!   should not have write access.
//! - **Index ids**: The k-th registered index gets id `2^(10 + k)`, which
//!   limits a store to [`MAX_INDEXES`] indexes.
//! - **Filter queries**: Disjunctions of conjunctions of equality tests on
//!   indexed attributes.
//!
//! # Example
//!
//! ```
//! use std::collections::HashSet;
//!
//! use logstore::{BasicFilter, LogRead, LogStore, RecordRef, Token};
//!
//! let store = LogStore::new();
//! let host = store.add_index(2).unwrap();
//! let level = store.add_index(1).unwrap();
//! let stream = store.add_stream(move |r: &RecordRef<'_>| r.token_value(level) == Some(3));
//!
//! store.insert(b"disk warning", &[Token::new(host, 1), Token::new(level, 2)]);
//! let error = store.insert(b"disk error", &[Token::new(host, 1), Token::new(level, 3)]);
//!
//! let mut results = HashSet::new();
//! store.filter(
//!     &mut results,
//!     &[vec![BasicFilter::new(host, 1), BasicFilter::new(level, 3)]],
//! );
//! assert_eq!(results, HashSet::from([error]));
//! assert_eq!(store.get_stream(stream).unwrap().to_vec(), vec![error]);
//! ```

mod config;
mod error;
mod index;
pub mod metrics;
mod model;
#[cfg(feature = "perf-cli")]
pub mod perf;
mod query;
mod reader;
mod records;
mod store;
mod stream;

pub use config::Config;
pub use error::{Error, Result};
pub use index::{INDEX_ID_SHIFT, MAX_INDEXES};
pub use metrics::Metrics;
pub use model::{
    BasicFilter, FilterConjunction, FilterQuery, IndexId, RecordId, RecordRef, StreamId, Token,
    TokenValue,
};
pub use reader::{LogRead, LogStoreReader};
pub use store::LogStore;
pub use stream::{Predicate, StreamView};
