use std::{future::Future, marker::PhantomData, sync::Arc};

use async_trait::async_trait;

use crate::{Context, Event};

/// The `Command` trait identifies a request to mutate the state of the system.
///
/// Payload fields belong to each concrete command type; the pipeline only
/// needs a name, used by middlewares for logging and routing.
///
/// ## Example
///
/// ```rust
/// use mini_cqs::Command;
///
/// struct OpenAccount {
///     owner: String,
/// }
///
/// impl Command for OpenAccount {
///     fn command_name(&self) -> &str {
///         "open_account"
///     }
/// }
/// ```
pub trait Command: Send + Sync + 'static {
    fn command_name(&self) -> &str;
}

/// The `CommandHandler` trait holds the logic that mutates the domain.
///
/// A handler receives one command of a fixed type together with the caller's
/// [`Context`] and returns the events it produced, possibly none. Ownership
/// of the events passes to the caller, which usually forwards them to an
/// [`EventBus`](crate::EventBus).
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    async fn handle(&self, ctx: &Context, command: C) -> anyhow::Result<Vec<Event>>;
}

/// A type-erased, shareable command handler.
pub type SharedCommandHandler<C> = Arc<dyn CommandHandler<C>>;

#[async_trait]
impl<C, H> CommandHandler<C> for Arc<H>
where
    C: Command,
    H: CommandHandler<C> + ?Sized,
{
    async fn handle(&self, ctx: &Context, command: C) -> anyhow::Result<Vec<Event>> {
        (**self).handle(ctx, command).await
    }
}

/// Adapter turning a closure into a [`CommandHandler`]. Built with [`command_handler_fn`].
pub struct CommandHandlerFn<C, F> {
    f: F,
    _phantom: PhantomData<fn(C)>,
}

/// Wraps a closure returning a future as a [`CommandHandler`].
///
/// The closure receives its own clone of the context, so the returned future
/// does not borrow from the caller.
///
/// ```rust
/// use mini_cqs::{Command, CommandHandler, Context, command_handler_fn};
///
/// struct Ping;
///
/// impl Command for Ping {
///     fn command_name(&self) -> &str {
///         "ping"
///     }
/// }
///
/// let handler = command_handler_fn(|_ctx, _cmd: Ping| async { Ok(vec![]) });
/// ```
pub fn command_handler_fn<C, F, Fut>(f: F) -> CommandHandlerFn<C, F>
where
    C: Command,
    F: Fn(Context, C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Vec<Event>>> + Send + 'static,
{
    CommandHandlerFn {
        f,
        _phantom: PhantomData,
    }
}

#[async_trait]
impl<C, F, Fut> CommandHandler<C> for CommandHandlerFn<C, F>
where
    C: Command,
    F: Fn(Context, C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Vec<Event>>> + Send + 'static,
{
    async fn handle(&self, ctx: &Context, command: C) -> anyhow::Result<Vec<Event>> {
        (self.f)(ctx.clone(), command).await
    }
}

/// A `CommandMiddleware` turns a command handler into another one for the same
/// command type, layering cross-cutting behaviour (logging, authorization,
/// validation...) around it.
///
/// Any `Fn(SharedCommandHandler<C>) -> SharedCommandHandler<C>` closure is a middleware.
pub trait CommandMiddleware<C: Command>: Send + Sync {
    fn wrap(&self, inner: SharedCommandHandler<C>) -> SharedCommandHandler<C>;
}

impl<C, F> CommandMiddleware<C> for F
where
    C: Command,
    F: Fn(SharedCommandHandler<C>) -> SharedCommandHandler<C> + Send + Sync,
{
    fn wrap(&self, inner: SharedCommandHandler<C>) -> SharedCommandHandler<C> {
        self(inner)
    }
}

/// An ordered sequence of middlewares applied as one.
///
/// Wrapping `h` with the chain `[m1, m2, m3]` yields `m1(m2(m3(h)))`: the first
/// middleware is the outermost one. On a single call its pre-logic runs first
/// and its post-logic runs last.
pub struct CommandMiddlewareChain<C: Command> {
    middlewares: Vec<Arc<dyn CommandMiddleware<C>>>,
}

impl<C: Command> CommandMiddlewareChain<C> {
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Appends a middleware, which ends up inside every middleware added before it.
    pub fn with<M>(mut self, middleware: M) -> Self
    where
        M: CommandMiddleware<C> + 'static,
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

    /// Wraps a concrete handler with the whole chain.
    pub fn apply<H>(&self, handler: H) -> SharedCommandHandler<C>
    where
        H: CommandHandler<C> + 'static,
    {
        self.wrap(Arc::new(handler))
    }
}

impl<C: Command> Default for CommandMiddlewareChain<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Command> CommandMiddleware<C> for CommandMiddlewareChain<C> {
    fn wrap(&self, inner: SharedCommandHandler<C>) -> SharedCommandHandler<C> {
        self.middlewares
            .iter()
            .rev()
            .fold(inner, |handler, middleware| middleware.wrap(handler))
    }
}

impl<C: Command> FromIterator<Arc<dyn CommandMiddleware<C>>> for CommandMiddlewareChain<C> {
    fn from_iter<I: IntoIterator<Item = Arc<dyn CommandMiddleware<C>>>>(iter: I) -> Self {
        Self {
            middlewares: iter.into_iter().collect(),
        }
    }
}

/// Composes a sequence of middlewares into a single one, first = outermost.
pub fn multi_command_middleware<C, I>(middlewares: I) -> CommandMiddlewareChain<C>
where
    C: Command,
    I: IntoIterator<Item = Arc<dyn CommandMiddleware<C>>>,
{
    middlewares.into_iter().collect()
}
