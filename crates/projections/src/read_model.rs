//! Read model trait for query-side views.

use async_trait::async_trait;
use common::AggregateId;

/// A read model providing query access to denormalized data.
///
/// Read models are the query-side data structures in CQRS. They are
/// updated by projections and may lag the write side.
#[async_trait]
pub trait ReadModel: Send + Sync {
    /// The record returned by queries.
    type Item: Clone + Send + Sync;

    /// Returns the name of this read model.
    fn name(&self) -> &'static str;

    async fn find_by_id(&self, id: AggregateId) -> Option<Self::Item>;

    async fn find_all(&self) -> Vec<Self::Item>;

    /// Returns the number of entries in this read model.
    async fn count(&self) -> usize;

    async fn exists(&self, id: AggregateId) -> bool {
        self.find_by_id(id).await.is_some()
    }
}
