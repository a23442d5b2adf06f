use std::{future::Future, marker::PhantomData, sync::Arc};

use async_trait::async_trait;

use crate::Context;

/// A named request to read state, paired with the type of its result.
///
/// Queries never emit events: whatever a query handler does, the pipeline
/// treats its execution as free of side effects.
pub trait Query: Send + Sync + 'static {
    type Output: Send + 'static;

    fn query_name(&self) -> &str;
}

#[async_trait]
pub trait QueryHandler<Q: Query>: Send + Sync {
    async fn handle(&self, ctx: &Context, query: Q) -> anyhow::Result<Q::Output>;
}

pub type SharedQueryHandler<Q> = Arc<dyn QueryHandler<Q>>;

#[async_trait]
impl<Q, H> QueryHandler<Q> for Arc<H>
where
    Q: Query,
    H: QueryHandler<Q> + ?Sized,
{
    async fn handle(&self, ctx: &Context, query: Q) -> anyhow::Result<Q::Output> {
        (**self).handle(ctx, query).await
    }
}

/// Adapter turning a closure into a [`QueryHandler`]. Built with [`query_handler_fn`].
pub struct QueryHandlerFn<Q, F> {
    f: F,
    _phantom: PhantomData<fn(Q)>,
}

pub fn query_handler_fn<Q, F, Fut>(f: F) -> QueryHandlerFn<Q, F>
where
    Q: Query,
    F: Fn(Context, Q) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Q::Output>> + Send + 'static,
{
    QueryHandlerFn {
        f,
        _phantom: PhantomData,
    }
}

#[async_trait]
impl<Q, F, Fut> QueryHandler<Q> for QueryHandlerFn<Q, F>
where
    Q: Query,
    F: Fn(Context, Q) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Q::Output>> + Send + 'static,
{
    async fn handle(&self, ctx: &Context, query: Q) -> anyhow::Result<Q::Output> {
        (self.f)(ctx.clone(), query).await
    }
}

/// Decorates a query handler; same contract as [`CommandMiddleware`](crate::CommandMiddleware).
pub trait QueryMiddleware<Q: Query>: Send + Sync {
    fn wrap(&self, inner: SharedQueryHandler<Q>) -> SharedQueryHandler<Q>;
}

impl<Q, F> QueryMiddleware<Q> for F
where
    Q: Query,
    F: Fn(SharedQueryHandler<Q>) -> SharedQueryHandler<Q> + Send + Sync,
{
    fn wrap(&self, inner: SharedQueryHandler<Q>) -> SharedQueryHandler<Q> {
        self(inner)
    }
}

/// Ordered query middlewares, the first one being the outermost wrapper.
pub struct QueryMiddlewareChain<Q: Query> {
    middlewares: Vec<Arc<dyn QueryMiddleware<Q>>>,
}

impl<Q: Query> QueryMiddlewareChain<Q> {
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    pub fn with<M>(mut self, middleware: M) -> Self
    where
        M: QueryMiddleware<Q> + 'static,
    {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    pub fn apply<H>(&self, handler: H) -> SharedQueryHandler<Q>
    where
        H: QueryHandler<Q> + 'static,
    {
        self.wrap(Arc::new(handler))
    }
}

impl<Q: Query> Default for QueryMiddlewareChain<Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q: Query> QueryMiddleware<Q> for QueryMiddlewareChain<Q> {
    fn wrap(&self, inner: SharedQueryHandler<Q>) -> SharedQueryHandler<Q> {
        self.middlewares
            .iter()
            .rev()
            .fold(inner, |handler, middleware| middleware.wrap(handler))
    }
}

impl<Q: Query> FromIterator<Arc<dyn QueryMiddleware<Q>>> for QueryMiddlewareChain<Q> {
    fn from_iter<I: IntoIterator<Item = Arc<dyn QueryMiddleware<Q>>>>(iter: I) -> Self {
        Self {
            middlewares: iter.into_iter().collect(),
        }
    }
}

pub fn multi_query_middleware<Q, I>(middlewares: I) -> QueryMiddlewareChain<Q>
where
    Q: Query,
    I: IntoIterator<Item = Arc<dyn QueryMiddleware<Q>>>,
{
    middlewares.into_iter().collect()
}
