//! Configuration for opening a [`LogStore`](crate::LogStore).

use serde::{Deserialize, Serialize};

/// Configuration for a log store.
///
/// All fields are sizing hints: the store grows on demand regardless of the
/// values chosen here.
///
/// # Example
///
/// ```
/// use logstore::{Config, LogRead, LogStore};
///
/// let store = LogStore::open(Config {
///     record_capacity: 1 << 20,
///     ..Default::default()
/// });
/// assert!(store.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of records the record store reserves room for up front.
    pub record_capacity: usize,

    /// Number of entries each newly registered stream reserves room for.
    pub stream_capacity: usize,
}
