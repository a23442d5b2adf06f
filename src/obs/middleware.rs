use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use serde_json::json;

use super::{LogLevel, Logger};
use crate::{
    Command, CommandHandler, CommandMiddleware, Context, Event, Query, QueryHandler,
    QueryMiddleware, SharedCommandHandler, SharedQueryHandler,
};

/// Middleware logging how long each command or query took and whether it failed.
///
/// After every call it writes one `info` entry with the name and the elapsed
/// seconds, plus one `error` entry with the error message when the call
/// failed. What the wrapped handler returns is handed back untouched; a
/// failing logger is only reported through `tracing`.
#[derive(Clone)]
pub struct ObsMiddleware {
    logger: Arc<dyn Logger>,
}

impl ObsMiddleware {
    pub fn new(logger: impl Logger + 'static) -> Self {
        Self {
            logger: Arc::new(logger),
        }
    }
}

impl<C: Command> CommandMiddleware<C> for ObsMiddleware {
    fn wrap(&self, inner: SharedCommandHandler<C>) -> SharedCommandHandler<C> {
        Arc::new(ObservedCommandHandler {
            inner,
            logger: self.logger.clone(),
        })
    }
}

impl<Q: Query> QueryMiddleware<Q> for ObsMiddleware {
    fn wrap(&self, inner: SharedQueryHandler<Q>) -> SharedQueryHandler<Q> {
        Arc::new(ObservedQueryHandler {
            inner,
            logger: self.logger.clone(),
        })
    }
}

struct ObservedCommandHandler<C: Command> {
    inner: SharedCommandHandler<C>,
    logger: Arc<dyn Logger>,
}

#[async_trait]
impl<C: Command> CommandHandler<C> for ObservedCommandHandler<C> {
    async fn handle(&self, ctx: &Context, command: C) -> anyhow::Result<Vec<Event>> {
        let name = command.command_name().to_string();
        let start = Instant::now();

        let result = self.inner.handle(ctx, command).await;

        report(
            self.logger.as_ref(),
            "command",
            &name,
            start,
            result.as_ref().err(),
        );
        result
    }
}

struct ObservedQueryHandler<Q: Query> {
    inner: SharedQueryHandler<Q>,
    logger: Arc<dyn Logger>,
}

#[async_trait]
impl<Q: Query> QueryHandler<Q> for ObservedQueryHandler<Q> {
    async fn handle(&self, ctx: &Context, query: Q) -> anyhow::Result<Q::Output> {
        let name = query.query_name().to_string();
        let start = Instant::now();

        let result = self.inner.handle(ctx, query).await;

        report(
            self.logger.as_ref(),
            "query",
            &name,
            start,
            result.as_ref().err(),
        );
        result
    }
}

fn report(logger: &dyn Logger, kind: &str, name: &str, start: Instant, err: Option<&anyhow::Error>) {
    let elapsed = start.elapsed().as_secs_f64();

    let logged = logger.log(
        LogLevel::Info,
        &format!("{kind} handled"),
        &[json!({ kind: name, "elapsed_seconds": elapsed })],
    );
    if let Err(log_err) = logged {
        tracing::warn!(%kind, %name, error = %log_err, "failed to log handler timing");
    }

    if let Some(err) = err {
        let logged = logger.log(
            LogLevel::Error,
            &format!("{kind} failed"),
            &[json!({ kind: name, "error": err.to_string() })],
        );
        if let Err(log_err) = logged {
            tracing::warn!(%kind, %name, error = %log_err, "failed to log handler error");
        }
    }
}
