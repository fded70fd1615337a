//! Typed handles over one physical partition.
//!
//! [`Collection<T>`] is the async handle; [`Collection::blocking`] returns a
//! [`BlockingCollection`] view with the same operations that block the
//! calling thread instead. Both run the same request plans from
//! [`crate::ops`], so identical inputs give identical results.
//!
//! Reads only need `T: DeserializeOwned`; writes need `T: Document`.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::binding::CollectionBinding;
use crate::config::ConnectionConfig;
use crate::engine::Transport;
use crate::error::Result;
use crate::field::{Field, Sort};
use crate::models::{Document, DocumentId, Visibility};
use crate::ops;
use crate::provision::Provisioner;
use crate::query::{self, Query, SearchRequest};
use crate::result::SearchResult;

/// Async handle for the documents of one collection.
///
/// Cheap to clone; every clone shares the context's transport.
pub struct Collection<T> {
    binding: Arc<CollectionBinding>,
    transport: Arc<dyn Transport>,
    config: Arc<ConnectionConfig>,
    _doc: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            binding: Arc::clone(&self.binding),
            transport: Arc::clone(&self.transport),
            config: Arc::clone(&self.config),
            _doc: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("index", &self.binding.physical_name)
            .field("document", &self.binding.type_name)
            .field("transport", &self.transport.name())
            .finish()
    }
}

fn page(query: Query, skip: u64, take: u64, sort: Option<Sort>) -> SearchRequest {
    SearchRequest::new(query).page(skip, take).sorted(sort)
}

impl<T> Collection<T>
where
    T: DeserializeOwned + Send + 'static,
{
    pub(crate) fn new(
        binding: Arc<CollectionBinding>,
        transport: Arc<dyn Transport>,
        config: Arc<ConnectionConfig>,
    ) -> Self {
        Self {
            binding,
            transport,
            config,
            _doc: PhantomData,
        }
    }

    pub fn binding(&self) -> &CollectionBinding {
        &self.binding
    }

    /// Physical partition name.
    pub fn index(&self) -> &str {
        &self.binding.physical_name
    }

    pub fn blocking(&self) -> BlockingCollection<'_, T> {
        BlockingCollection { inner: self }
    }

    fn diagnostics(&self) -> bool {
        self.config.disable_direct_streaming
    }

    /// The document with this id, or `None`.
    pub async fn get(&self, id: impl Into<DocumentId>) -> Result<Option<T>> {
        let plan = ops::get(self.index(), id.into());
        plan.run(self.transport.as_ref()).await
    }

    /// Documents for the given ids in request order; absent ids are skipped.
    ///
    /// Duplicate ids are fetched once. More than 10 000 distinct ids are
    /// fetched in several round trips, one per 10 000.
    pub async fn get_many<I, D>(&self, ids: I) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = D>,
        D: Into<DocumentId>,
    {
        let mut out = Vec::new();
        for plan in ops::get_many(self.index(), ids.into_iter().map(Into::into).collect()) {
            out.extend(plan.run(self.transport.as_ref()).await?);
        }
        Ok(out)
    }

    /// Succeeds whether or not the document existed.
    pub async fn delete_by_id(&self, id: impl Into<DocumentId>, visibility: Visibility) -> Result<()> {
        let plan = ops::delete_by_id(self.index(), id.into(), visibility);
        plan.run(self.transport.as_ref()).await
    }

    /// Makes every earlier write visible to search.
    pub async fn refresh(&self) -> Result<()> {
        ops::refresh(self.index()).run(self.transport.as_ref()).await
    }

    /// Any of `fields` starts with `text`.
    pub async fn search_starts_with(
        &self,
        text: &str,
        skip: u64,
        take: u64,
        sort: Option<Sort>,
        fields: &[Field],
    ) -> Result<SearchResult<T>> {
        let query = query::starts_with(text, fields)?;
        self.search(&page(query, skip, take, sort)).await
    }

    /// Any of `fields` contains `text` as a whole phrase.
    pub async fn search_exact_match(
        &self,
        text: &str,
        skip: u64,
        take: u64,
        sort: Option<Sort>,
        fields: &[Field],
    ) -> Result<SearchResult<T>> {
        let query = query::exact_match(text, fields)?;
        self.search(&page(query, skip, take, sort)).await
    }

    pub async fn search_wildcard(
        &self,
        pattern: &str,
        skip: u64,
        take: u64,
        sort: Option<Sort>,
        field: impl Into<Field>,
    ) -> Result<SearchResult<T>> {
        let query = query::wildcard(pattern, field);
        self.search(&page(query, skip, take, sort)).await
    }

    /// Caller-built predicate, engine relevance order.
    pub async fn search_freeform(&self, skip: u64, take: u64, query: Query) -> Result<SearchResult<T>> {
        self.search(&page(query, skip, take, None)).await
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResult<T>> {
        let plan = ops::search(self.index(), request, self.diagnostics());
        plan.run(self.transport.as_ref()).await
    }

    /// Creates the partition if needed; returns whether it was created.
    pub async fn ensure_exists(&self) -> Result<bool> {
        Provisioner::new(self.transport.as_ref(), &self.config)
            .ensure_exists(&self.binding)
            .await
    }

    /// Deletes the partition with every document in it.
    pub async fn drop_if_exists(&self) -> Result<bool> {
        Provisioner::new(self.transport.as_ref(), &self.config)
            .drop_if_exists(&self.binding)
            .await
    }
}

impl<T> Collection<T>
where
    T: Document + 'static,
{
    /// Creates or replaces the document under its id.
    pub async fn upsert(&self, doc: &T, visibility: Visibility) -> Result<()> {
        let plan = ops::upsert(self.index(), doc, visibility)?;
        plan.run(self.transport.as_ref()).await
    }

    /// All documents in one bulk round trip.
    pub async fn upsert_many(&self, docs: &[T], visibility: Visibility) -> Result<()> {
        let plan = ops::upsert_many(self.index(), docs, visibility)?;
        plan.run(self.transport.as_ref()).await
    }

    /// Merges `partial` into the stored document; fails with
    /// [`Error::NotFound`](crate::error::Error::NotFound) if there is none.
    pub async fn partial_update<P>(
        &self,
        id: impl Into<DocumentId>,
        partial: &P,
        visibility: Visibility,
    ) -> Result<()>
    where
        P: Serialize + Sync + ?Sized,
    {
        let plan = ops::partial_update(self.index(), id.into(), partial, visibility)?;
        plan.run(self.transport.as_ref()).await
    }
}

/// Thread-blocking view of a [`Collection`].
///
/// Must not be used from inside an async runtime worker thread.
pub struct BlockingCollection<'a, T> {
    inner: &'a Collection<T>,
}

impl<T> BlockingCollection<'_, T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    pub fn get(&self, id: impl Into<DocumentId>) -> Result<Option<T>> {
        ops::get(self.inner.index(), id.into()).run_blocking(self.transport())
    }

    pub fn get_many<I, D>(&self, ids: I) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = D>,
        D: Into<DocumentId>,
    {
        let mut out = Vec::new();
        for plan in ops::get_many(self.inner.index(), ids.into_iter().map(Into::into).collect()) {
            out.extend(plan.run_blocking(self.transport())?);
        }
        Ok(out)
    }

    pub fn delete_by_id(&self, id: impl Into<DocumentId>, visibility: Visibility) -> Result<()> {
        ops::delete_by_id(self.inner.index(), id.into(), visibility).run_blocking(self.transport())
    }

    pub fn refresh(&self) -> Result<()> {
        ops::refresh(self.inner.index()).run_blocking(self.transport())
    }

    pub fn search_starts_with(
        &self,
        text: &str,
        skip: u64,
        take: u64,
        sort: Option<Sort>,
        fields: &[Field],
    ) -> Result<SearchResult<T>> {
        let query = query::starts_with(text, fields)?;
        self.search(&page(query, skip, take, sort))
    }

    pub fn search_exact_match(
        &self,
        text: &str,
        skip: u64,
        take: u64,
        sort: Option<Sort>,
        fields: &[Field],
    ) -> Result<SearchResult<T>> {
        let query = query::exact_match(text, fields)?;
        self.search(&page(query, skip, take, sort))
    }

    pub fn search_wildcard(
        &self,
        pattern: &str,
        skip: u64,
        take: u64,
        sort: Option<Sort>,
        field: impl Into<Field>,
    ) -> Result<SearchResult<T>> {
        self.search(&page(query::wildcard(pattern, field), skip, take, sort))
    }

    pub fn search_freeform(&self, skip: u64, take: u64, query: Query) -> Result<SearchResult<T>> {
        self.search(&page(query, skip, take, None))
    }

    pub fn search(&self, request: &SearchRequest) -> Result<SearchResult<T>> {
        ops::search(self.inner.index(), request, self.inner.diagnostics())
            .run_blocking(self.transport())
    }

    pub fn ensure_exists(&self) -> Result<bool> {
        Provisioner::new(self.transport(), &self.inner.config).ensure_exists_blocking(&self.inner.binding)
    }

    pub fn drop_if_exists(&self) -> Result<bool> {
        Provisioner::new(self.transport(), &self.inner.config)
            .drop_if_exists_blocking(&self.inner.binding)
    }
}

impl<T> BlockingCollection<'_, T>
where
    T: Document + 'static,
{
    pub fn upsert(&self, doc: &T, visibility: Visibility) -> Result<()> {
        ops::upsert(self.inner.index(), doc, visibility)?.run_blocking(self.transport())
    }

    pub fn upsert_many(&self, docs: &[T], visibility: Visibility) -> Result<()> {
        ops::upsert_many(self.inner.index(), docs, visibility)?.run_blocking(self.transport())
    }

    pub fn partial_update<P>(
        &self,
        id: impl Into<DocumentId>,
        partial: &P,
        visibility: Visibility,
    ) -> Result<()>
    where
        P: Serialize + ?Sized,
    {
        ops::partial_update(self.inner.index(), id.into(), partial, visibility)?
            .run_blocking(self.transport())
    }
}
