//! Prometheus metrics for the log store.

use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

/// Container for all Prometheus metrics.
pub struct Metrics {
    registry: Registry,

    /// Counter of records inserted.
    pub records_inserted_total: Counter,

    /// Counter of payload bytes inserted.
    pub bytes_inserted_total: Counter,

    /// Counter of tokens appended to a posting list.
    pub tokens_indexed_total: Counter,

    /// Counter of tokens naming an unregistered index
    pub tokens_ignored_total: Counter,

    /// Counter of record ids appended to streams.
    pub stream_matches_total: Counter,

    /// Counter of filter queries evaluated.
    pub filter_queries_total: Counter,

    /// Counter of point reads for records that are not published.
    pub get_misses_total: Counter,

    /// Gauge of registered indexes.
    pub indexes: Gauge,

    /// Gauge of registered streams.
    pub streams: Gauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics registry with all metrics registered.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let records_inserted_total = Counter::default();
        registry.register(
            "logstore_records_inserted",
            "Total number of records inserted into the log store",
            records_inserted_total.clone(),
        );

        let bytes_inserted_total = Counter::default();
        registry.register(
            "logstore_bytes_inserted",
            "Total number of payload bytes inserted into the log store",
            bytes_inserted_total.clone(),
        );

        let tokens_indexed_total = Counter::default();
        registry.register(
            "logstore_tokens_indexed",
            "Total number of tokens appended to posting lists",
            tokens_indexed_total.clone(),
        );

        let tokens_ignored_total = Counter::default();
        registry.register(
            "logstore_tokens_ignored",
            "Total number of tokens referencing an unregistered index",
            tokens_ignored_total.clone(),
        );

        let stream_matches_total = Counter::default();
        registry.register(
            "logstore_stream_matches",
            "Total number of record ids appended to streams",
            stream_matches_total.clone(),
        );

        let filter_queries_total = Counter::default();
        registry.register(
            "logstore_filter_queries",
            "Total number of filter queries evaluated",
            filter_queries_total.clone(),
        );

        let get_misses_total = Counter::default();
        registry.register(
            "logstore_get_misses",
            "Total number of point reads for unpublished record ids",
            get_misses_total.clone(),
        );

        let indexes = Gauge::default();
        registry.register(
            "logstore_indexes",
            "Number of registered indexes",
            indexes.clone(),
        );

        let streams = Gauge::default();
        registry.register(
            "logstore_streams",
            "Number of registered streams",
            streams.clone(),
        );

        Self {
            registry,
            records_inserted_total,
            bytes_inserted_total,
            tokens_indexed_total,
            tokens_ignored_total,
            stream_matches_total,
            filter_queries_total,
            get_misses_total,
            indexes,
            streams,
        }
    }

    /// Returns a mutable reference to the underlying Prometheus registry.
    ///
    /// Use this to register additional metrics before handing the registry
    /// to [`LogStore::open_with_metrics`](crate::LogStore::open_with_metrics).
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Encode all metrics to Prometheus text format.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)
            .expect("encoding metrics should not fail");
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_create_default_metrics() {
        // given/when
        let metrics = Metrics::new();

        // then
        let encoded = metrics.encode();
        assert!(encoded.contains("# HELP logstore_records_inserted"));
        assert!(encoded.contains("# HELP logstore_bytes_inserted"));
        assert!(encoded.contains("# HELP logstore_tokens_indexed"));
        assert!(encoded.contains("# HELP logstore_tokens_ignored"));
        assert!(encoded.contains("# HELP logstore_stream_matches"));
        assert!(encoded.contains("# HELP logstore_filter_queries"));
        assert!(encoded.contains("# HELP logstore_get_misses"));
        assert!(encoded.contains("# HELP logstore_indexes"));
        assert!(encoded.contains("# HELP logstore_streams"));
    }

    #[test]
    fn should_encode_counter_values() {
        // given
        let metrics = Metrics::new();

        // when
        metrics.records_inserted_total.inc_by(3);
        metrics.streams.set(2);

        // then
        let encoded = metrics.encode();
        assert!(encoded.contains("logstore_records_inserted_total 3"));
        assert!(encoded.contains("logstore_streams 2"));
    }
}
