//! Lazy query results.
//!
//! A [`Retrieval`] describes a query; nothing is fetched until it is streamed or collected.
//! Streaming again issues the query again, so a retrieval can be consumed any number of times.

use futures::{
    StreamExt, TryStreamExt,
    stream::{self, BoxStream},
};

use crate::{
    document::Mapped,
    error::{MappingError, MappingResult},
    mapper::Mapper,
    query::{Expr, Query, Sort, SortDirection},
};

/// A restartable, lazily deserialized result sequence.
#[derive(Debug)]
pub struct Retrieval<'a, T> {
    mapper: &'a Mapper<T>,
    query: Query,
}

impl<'a, T> Clone for Retrieval<'a, T> {
    fn clone(&self) -> Self {
        Self {
            mapper: self.mapper,
            query: self.query.clone(),
        }
    }
}

impl<'a, T: Mapped> Retrieval<'a, T> {
    pub(crate) fn new(mapper: &'a Mapper<T>, filter: Option<Expr>) -> Self {
        Self {
            mapper,
            query: Query {
                filter,
                ..Query::default()
            },
        }
    }

    /// Returns at most `limit` objects.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Skips the first `offset` objects.
    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    pub fn sort(mut self, attribute: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort = Some(Sort {
            field: attribute.into(),
            direction,
        });
        self
    }

    /// The query sent to the store.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Issues the query and yields objects as they are deserialized.
    pub fn stream(&self) -> BoxStream<'a, MappingResult<T>> {
        let mapper = self.mapper;
        let query = self.query.clone();

        stream::once(async move {
            mapper
                .backend()
                .query_documents(mapper.collection(), query)
                .await
                .map_err(MappingError::from)
        })
        .map_ok(move |documents| {
            stream::iter(
                documents
                    .into_iter()
                    .map(move |document| mapper.deserialize(document)),
            )
        })
        .try_flatten()
        .boxed()
    }

    pub async fn to_vec(&self) -> MappingResult<Vec<T>> {
        self.stream().try_collect().await
    }

    /// The first object of the sequence, honoring offset and a zero limit.
    pub async fn first(&self) -> MappingResult<Option<T>> {
        let limit = self.query.limit.map_or(1, |limit| limit.min(1));
        self.clone().limit(limit).stream().try_next().await
    }

    /// Number of stored objects matching the filter. Limit and offset are not applied.
    pub async fn count(&self) -> MappingResult<u64> {
        Ok(self
            .mapper
            .backend()
            .count_documents(self.mapper.collection(), self.query.filter.clone())
            .await?)
    }
}
