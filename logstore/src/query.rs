//! Evaluation of disjunctive-normal-form filter queries.
//!
//! Each conjunction intersects the posting lists of its basic filters,
//! starting from the shortest list. The query result is the union of all
//! conjunction results, clipped to the published records.

use roaring::RoaringTreemap;

use crate::index::{IndexRegistry, PostingList};
use crate::model::{FilterConjunction, RecordId};

/// Evaluates `query` against `indexes`, ignoring records at or above
/// `published`.
pub(crate) fn evaluate(
    indexes: &IndexRegistry,
    query: &[FilterConjunction],
    published: RecordId,
) -> RoaringTreemap {
    let mut matched = RoaringTreemap::new();
    for conjunction in query {
        if let Some(ids) = intersect(indexes, conjunction) {
            matched |= ids;
        }
    }
    matched.remove_range(published..);
    matched
}

/// Intersects the posting lists of a conjunction.
///
/// Returns `None` when the conjunction is empty or any of its filters has no
/// posting list, both of which match nothing.
fn intersect(indexes: &IndexRegistry, conjunction: &FilterConjunction) -> Option<RoaringTreemap> {
    if conjunction.is_empty() {
        return None;
    }

    let mut lists: Vec<(u64, PostingList)> = Vec::with_capacity(conjunction.len());
    for filter in conjunction {
        let Some(list) = indexes.posting_list(filter.index_id, filter.value) else {
            tracing::trace!(
                index_id = filter.index_id,
                value = filter.value,
                "no postings for filter"
            );
            return None;
        };
        let len = list.read().len();
        lists.push((len, list));
    }
    lists.sort_by_key(|(len, _)| *len);

    let (_, shortest) = &lists[0];
    let mut ids = shortest.read().clone();
    for (_, list) in &lists[1..] {
        if ids.is_empty() {
            break;
        }
        ids &= &*list.read();
    }
    Some(ids)
}
