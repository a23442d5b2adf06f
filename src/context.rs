use tokio_util::sync::CancellationToken;

/// Execution context handed to every handler.
///
/// The core never looks at it: middlewares, the event bus and the
/// event-to-command bridge pass the very same context down to the handlers
/// they wrap. Cancellation is advisory, a handler decides whether and when to
/// honour it.
#[derive(Clone, Debug, Default)]
pub struct Context {
    token: CancellationToken,
}

impl Context {
    /// A fresh root context, never cancelled unless asked to.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context cancelled together with the given token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self { token }
    }

    /// A context cancelled whenever `self` is, which can also be cancelled on
    /// its own without affecting the parent.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the context is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}
