//! Core data types for the log store.
//!
//! This module defines the identifiers handed out by the store, the tokens
//! attached to records at insertion time, and the disjunctive-normal-form
//! filter queries evaluated against the indexes.

/// Sequential identifier of a record.
///
/// Record ids start at 0 and are assigned densely in insertion order. They
/// double as the position of the payload in the record store.
pub type RecordId = u64;

/// Identifier of a secondary index.
///
/// The k-th registered index receives `2^(10 + k)`, so the low 10 bits are
/// never used and at most [`MAX_INDEXES`](crate::MAX_INDEXES) indexes exist.
pub type IndexId = u32;

/// Sequential identifier of a stream, starting at 0.
pub type StreamId = u32;

/// Attribute value carried under an index.
pub type TokenValue = u64;

/// An attribute assignment attached to a record at insertion.
///
/// Declares that the record carries `value` under the index identified by
/// `index_id`.
///
/// # Example
///
/// ```
/// use logstore::Token;
///
/// let token = Token::new(1024, 42);
/// assert_eq!(token.index_id, 1024);
/// assert_eq!(token.value, 42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
    /// The index this assignment belongs to.
    pub index_id: IndexId,
    /// The attribute value.
    pub value: TokenValue,
}

impl Token {
    /// Creates a new token.
    pub fn new(index_id: IndexId, value: TokenValue) -> Self {
        Self { index_id, value }
    }
}

/// Equality test on a single indexed attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BasicFilter {
    /// The index to consult.
    pub index_id: IndexId,
    /// The value records must carry under `index_id`.
    pub value: TokenValue,
}

impl BasicFilter {
    /// Creates a new basic filter.
    pub fn new(index_id: IndexId, value: TokenValue) -> Self {
        Self { index_id, value }
    }
}

impl From<Token> for BasicFilter {
    fn from(token: Token) -> Self {
        Self::new(token.index_id, token.value)
    }
}

/// Basic filters combined with AND semantics.
///
/// An empty conjunction matches no records.
pub type FilterConjunction = Vec<BasicFilter>;

/// Conjunctions combined with OR semantics.
pub type FilterQuery = Vec<FilterConjunction>;

/// The record under evaluation, as seen by a stream predicate.
///
/// Only available while the record is being inserted; predicates never see
/// other records.
#[derive(Debug, Clone, Copy)]
pub struct RecordRef<'a> {
    /// The id assigned to the record.
    pub id: RecordId,
    /// The record payload.
    pub payload: &'a [u8],
    /// The tokens supplied with the record.
    pub tokens: &'a [Token],
}

impl RecordRef<'_> {
    /// Returns the first value the record carries under `index_id`.
    pub fn token_value(&self, index_id: IndexId) -> Option<TokenValue> {
        self.tokens
            .iter()
            .find(|token| token.index_id == index_id)
            .map(|token| token.value)
    }
}
