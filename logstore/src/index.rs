//! Secondary indexes and their posting lists.
//!
//! Each registered index maps an attribute value to the posting list of
//! record ids that carried that value at insertion. Posting lists are
//! [`RoaringTreemap`]s appended in ascending id order, so they stay sorted
//! without any extra work and intersect cheaply at query time.
//!
//! # Index ids
//!
//! The k-th registered index receives id `2^(10 + k)`. The encoding reserves
//! the low 10 bits of [`IndexId`] and caps the registry at [`MAX_INDEXES`].

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use roaring::RoaringTreemap;

use crate::error::{Error, Result};
use crate::model::{IndexId, RecordId, TokenValue};

/// Number of low bits of an [`IndexId`] that are never set.
pub const INDEX_ID_SHIFT: u32 = 10;

/// Maximum number of indexes a single store can register.
pub const MAX_INDEXES: usize = (IndexId::BITS - INDEX_ID_SHIFT) as usize;

/// Upper bound on the number of posting lists pre-sized for an index.
const MAX_PRESIZED_VALUES_BITS: u32 = 12;

/// Ordered set of record ids sharing an (index, value) pair.
pub(crate) type PostingList = Arc<RwLock<RoaringTreemap>>;

struct Index {
    width: u32,
    postings: DashMap<TokenValue, PostingList>,
}

impl Index {
    fn new(width: u32) -> Self {
        // width is the byte width of the value domain; only used for sizing.
        let bits = width.saturating_mul(8).min(MAX_PRESIZED_VALUES_BITS);
        Self {
            width,
            postings: DashMap::with_capacity(1 << bits),
        }
    }
}

/// Registry of all secondary indexes.
pub(crate) struct IndexRegistry {
    indexes: RwLock<Vec<Arc<Index>>>,
}

impl IndexRegistry {
    pub(crate) fn new() -> Self {
        Self {
            indexes: RwLock::new(Vec::new()),
        }
    }

    /// Registers a new index and returns its id.
    ///
    /// Fails with [`Error::CapacityExhausted`] once [`MAX_INDEXES`] indexes
    /// exist.
    pub(crate) fn add_index(&self, width: u32) -> Result<IndexId> {
        let mut indexes = self.indexes.write();
        let registered = indexes.len();
        if registered >= MAX_INDEXES {
            tracing::warn!(registered, "index id space exhausted");
            return Err(Error::CapacityExhausted { registered });
        }

        let index_id: IndexId = 1 << (INDEX_ID_SHIFT as usize + registered);
        indexes.push(Arc::new(Index::new(width)));
        tracing::debug!(index_id, width, "registered index");
        Ok(index_id)
    }

    /// Appends `record_id` to the posting list for `value` under `index_id`.
    ///
    /// Returns `false` without touching any state when `index_id` is not
    /// registered. Record ids must be recorded in ascending order; repeating
    /// the latest id is a no-op.
    pub(crate) fn record_token(
        &self,
        index_id: IndexId,
        value: TokenValue,
        record_id: RecordId,
    ) -> bool {
        let Some(index) = self.index(index_id) else {
            tracing::trace!(index_id, record_id, "ignoring token for unregistered index");
            return false;
        };

        let list = Arc::clone(index.postings.entry(value).or_default().value());
        list.write().push(record_id);
        true
    }

    /// Returns the posting list for an (index, value) pair, if any record
    /// ever carried it.
    pub(crate) fn posting_list(&self, index_id: IndexId, value: TokenValue) -> Option<PostingList> {
        let index = self.index(index_id)?;
        let list = index.postings.get(&value)?;
        Some(Arc::clone(list.value()))
    }

    /// Returns the ascending ids of records below `published` that carried
    /// `value` under `index_id`.
    pub(crate) fn lookup(
        &self,
        index_id: IndexId,
        value: TokenValue,
        published: RecordId,
    ) -> Vec<RecordId> {
        match self.posting_list(index_id, value) {
            Some(list) => list
                .read()
                .iter()
                .take_while(|&record_id| record_id < published)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Returns the width an index was registered with.
    pub(crate) fn width(&self, index_id: IndexId) -> Option<u32> {
        self.index(index_id).map(|index| index.width)
    }

    /// Returns the number of registered indexes.
    pub(crate) fn len(&self) -> usize {
        self.indexes.read().len()
    }

    fn index(&self, index_id: IndexId) -> Option<Arc<Index>> {
        let slot = slot(index_id)?;
        self.indexes.read().get(slot).cloned()
    }
}

/// Maps an index id back to its registration order.
fn slot(index_id: IndexId) -> Option<usize> {
    if !index_id.is_power_of_two() {
        return None;
    }
    let bit = index_id.trailing_zeros();
    bit.checked_sub(INDEX_ID_SHIFT).map(|k| k as usize)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn should_assign_bit_encoded_index_ids() {
        // given
        let registry = IndexRegistry::new();

        // when
        let ids: Vec<IndexId> = (1..=8)
            .map(|width| registry.add_index(width).unwrap())
            .collect();

        // then
        assert_eq!(
            ids,
            vec![1024, 2048, 4096, 8192, 16384, 32768, 65536, 131072]
        );
        assert_eq!(registry.len(), 8);
    }

    #[test]
    fn should_fail_when_index_capacity_exhausted() {
        // given
        let registry = IndexRegistry::new();
        for _ in 0..MAX_INDEXES {
            registry.add_index(1).unwrap();
        }

        // when
        let result = registry.add_index(1);

        // then
        assert_eq!(
            result,
            Err(Error::CapacityExhausted {
                registered: MAX_INDEXES
            })
        );
        assert_eq!(registry.len(), MAX_INDEXES);
    }

    #[test]
    fn should_hand_out_highest_bit_as_last_index() {
        // given
        let registry = IndexRegistry::new();

        // when
        let last = (0..MAX_INDEXES)
            .map(|_| registry.add_index(4).unwrap())
            .last()
            .unwrap();

        // then
        assert_eq!(last, 1 << 31);
    }

    #[test]
    fn should_append_postings_in_ascending_order() {
        // given
        let registry = IndexRegistry::new();
        let index_id = registry.add_index(1).unwrap();

        // when
        for record_id in [0, 3, 7] {
            assert!(registry.record_token(index_id, 5, record_id));
        }
        registry.record_token(index_id, 6, 4);

        // then
        assert_eq!(registry.lookup(index_id, 5, u64::MAX), vec![0, 3, 7]);
        assert_eq!(registry.lookup(index_id, 6, u64::MAX), vec![4]);
        assert!(registry.lookup(index_id, 8, u64::MAX).is_empty());
    }

    #[test]
    fn should_clip_lookup_to_published_records() {
        // given
        let registry = IndexRegistry::new();
        let index_id = registry.add_index(2).unwrap();
        for record_id in 0..5 {
            registry.record_token(index_id, 1, record_id);
        }

        // when
        let visible = registry.lookup(index_id, 1, 3);

        // then
        assert_eq!(visible, vec![0, 1, 2]);
    }

    #[test]
    fn should_ignore_duplicate_token_within_a_record() {
        // given
        let registry = IndexRegistry::new();
        let index_id = registry.add_index(1).unwrap();

        // when
        registry.record_token(index_id, 9, 2);
        registry.record_token(index_id, 9, 2);

        // then
        assert_eq!(registry.lookup(index_id, 9, u64::MAX), vec![2]);
    }

    #[rstest]
    #[case::never_registered(2048)]
    #[case::low_bits(7)]
    #[case::not_power_of_two(1024 + 2048)]
    #[case::zero(0)]
    fn should_ignore_unregistered_index_ids(#[case] index_id: IndexId) {
        // given
        let registry = IndexRegistry::new();
        registry.add_index(1).unwrap();

        // when
        let recorded = registry.record_token(index_id, 1, 0);

        // then
        assert!(!recorded);
        assert!(registry.lookup(index_id, 1, u64::MAX).is_empty());
        assert!(registry.posting_list(index_id, 1).is_none());
        assert!(registry.lookup(1024, 1, u64::MAX).is_empty());
    }

    #[test]
    fn should_report_registered_width() {
        // given
        let registry = IndexRegistry::new();
        let narrow = registry.add_index(1).unwrap();
        let wide = registry.add_index(8).unwrap();

        // when / then
        assert_eq!(registry.width(narrow), Some(1));
        assert_eq!(registry.width(wide), Some(8));
        assert_eq!(registry.width(4096), None);
    }
}
