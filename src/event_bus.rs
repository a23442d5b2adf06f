//! Named event routing and the event-to-command bridge.

use std::{collections::HashMap, future::Future, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::{
    Command, CommandHandler, Context, CqsError, Event, EventName, MultiError, Result,
    SharedCommandHandler,
};

/// Reacts to a dispatched event. Unlike a command handler it produces no events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, ctx: &Context, event: &Event) -> anyhow::Result<()>;
}

pub type SharedEventHandler = Arc<dyn EventHandler>;

#[async_trait]
impl<H> EventHandler for Arc<H>
where
    H: EventHandler + ?Sized,
{
    async fn handle(&self, ctx: &Context, event: &Event) -> anyhow::Result<()> {
        (**self).handle(ctx, event).await
    }
}

/// Adapter turning a closure into an [`EventHandler`]. Built with [`event_handler_fn`].
pub struct EventHandlerFn<F> {
    f: F,
}

/// Wraps a closure as an [`EventHandler`]. The closure gets owned copies of
/// the context and of the event.
pub fn event_handler_fn<F, Fut>(f: F) -> EventHandlerFn<F>
where
    F: Fn(Context, Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    EventHandlerFn { f }
}

#[async_trait]
impl<F, Fut> EventHandler for EventHandlerFn<F>
where
    F: Fn(Context, Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, ctx: &Context, event: &Event) -> anyhow::Result<()> {
        (self.f)(ctx.clone(), event.clone()).await
    }
}

/// Failure of a single handler during a dispatch. Its `source` is the handler's own error.
#[derive(Debug, Error)]
#[error("dispatch event: {source}")]
pub struct DispatchError {
    #[source]
    source: anyhow::Error,
}

impl DispatchError {
    pub fn new(source: anyhow::Error) -> Self {
        Self { source }
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.source
    }

    pub fn into_inner(self) -> anyhow::Error {
        self.source
    }
}

/// The `EventBus` trait relates event names to their handlers.
///
/// Subscriptions take `&mut self` while dispatching takes `&self`: every
/// handler has to be subscribed before the bus starts serving events.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Links a handler to an event name. `None` stands for a missing handler.
    fn subscribe(&mut self, name: EventName, handler: Option<SharedEventHandler>) -> Result<()>;

    /// Hands an event to every handler subscribed to its name.
    ///
    /// Retries are up to the caller.
    async fn dispatch(&self, ctx: &Context, event: &Event) -> std::result::Result<(), MultiError>;

    /// Subscribes a concrete handler.
    fn subscribe_handler<H>(&mut self, name: impl Into<EventName>, handler: H) -> Result<()>
    where
        Self: Sized,
        H: EventHandler + 'static,
    {
        self.subscribe(name.into(), Some(Arc::new(handler)))
    }
}

/// In-process event bus.
///
/// Handlers for an event run one after the other, in subscription order, on
/// the caller's task. A failing handler does not stop the ones after it: every
/// failure is wrapped in a [`DispatchError`] and collected into the
/// [`MultiError`] returned by [`EventBus::dispatch`].
///
/// ```rust
/// use mini_cqs::{BasicEventBus, Context, Event, EventBus, event_handler_fn, vo::Id};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
///
/// let mut bus = BasicEventBus::new();
/// bus.subscribe_handler("account.opened", event_handler_fn(|_ctx, event: Event| async move {
///     println!("opened {}", event.aggregate_root_id());
///     Ok(())
/// }))?;
///
/// let event = Event::new("account.opened", Id::new(), 1u32, &())?;
/// bus.dispatch(&Context::new(), &event).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct BasicEventBus {
    handlers_by_name: HashMap<EventName, Vec<SharedEventHandler>>,
}

impl BasicEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handlers subscribed to `name`.
    pub fn handler_count(&self, name: &EventName) -> usize {
        self.handlers_by_name.get(name).map_or(0, Vec::len)
    }
}

#[async_trait]
impl EventBus for BasicEventBus {
    fn subscribe(&mut self, name: EventName, handler: Option<SharedEventHandler>) -> Result<()> {
        if name.is_empty() {
            return Err(CqsError::EmptyEventName);
        }

        let Some(handler) = handler else {
            return Err(CqsError::EmptyEventHandler);
        };

        debug!(event = %name, "subscribing event handler");
        self.handlers_by_name.entry(name).or_default().push(handler);

        Ok(())
    }

    async fn dispatch(&self, ctx: &Context, event: &Event) -> std::result::Result<(), MultiError> {
        let Some(handlers) = self.handlers_by_name.get(event.name()) else {
            trace!(event = %event.name(), "no handlers subscribed");
            return Ok(());
        };

        debug!(
            event = %event.name(),
            event_id = %event.id(),
            handlers = handlers.len(),
            "dispatching event"
        );

        let mut errors = MultiError::new();

        for handler in handlers {
            if let Err(err) = handler.handle(ctx, event).await {
                warn!(event = %event.name(), error = %err, "event handler failed");
                errors.push(DispatchError::new(err));
            }
        }

        errors.into_result()
    }
}

/// Converts an event into the command it should trigger.
pub type EventToCommandFn<C> = Arc<dyn Fn(&Event) -> anyhow::Result<C> + Send + Sync>;

/// Bridges the event bus back into the command pipeline.
///
/// On every event it builds a command with its conversion function and runs
/// it through the wrapped command handler. Conversion errors and handler
/// errors are returned untouched. Events emitted by the bridged command are
/// dropped: re-injecting them into a bus is up to the caller.
pub struct EventCommandHandler<C: Command> {
    event_to_command: EventToCommandFn<C>,
    command_handler: SharedCommandHandler<C>,
}

impl<C: Command> EventCommandHandler<C> {
    /// Checks both parts before anything else, the conversion function first.
    pub fn new(
        event_to_command: Option<EventToCommandFn<C>>,
        command_handler: Option<SharedCommandHandler<C>>,
    ) -> Result<Self> {
        let event_to_command = event_to_command.ok_or(CqsError::EmptyEventToCommandFunc)?;
        let command_handler = command_handler.ok_or(CqsError::EmptyCommandHandler)?;

        Ok(Self {
            event_to_command,
            command_handler,
        })
    }

    pub fn from_parts<F, H>(event_to_command: F, command_handler: H) -> Self
    where
        F: Fn(&Event) -> anyhow::Result<C> + Send + Sync + 'static,
        H: CommandHandler<C> + 'static,
    {
        Self {
            event_to_command: Arc::new(event_to_command),
            command_handler: Arc::new(command_handler),
        }
    }
}

#[async_trait]
impl<C: Command> EventHandler for EventCommandHandler<C> {
    async fn handle(&self, ctx: &Context, event: &Event) -> anyhow::Result<()> {
        let command = (self.event_to_command)(event)?;

        trace!(
            event = %event.name(),
            command = command.command_name(),
            "event converted to command"
        );

        self.command_handler.handle(ctx, command).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::{command_handler_fn, vo::Id};

    #[derive(Debug, PartialEq, Error)]
    #[error("handler {0} failed")]
    struct HandlerFailure(u32);

    #[derive(Default)]
    struct EventHandlerMock {
        calls: AtomicUsize,
        seen: Mutex<Vec<Event>>,
        fail_with: Option<u32>,
        order: Option<(u32, Arc<Mutex<Vec<u32>>>)>,
    }

    impl EventHandlerMock {
        fn failing(code: u32) -> Self {
            Self {
                fail_with: Some(code),
                ..Self::default()
            }
        }

        fn ordered(label: u32, order: Arc<Mutex<Vec<u32>>>) -> Self {
            Self {
                order: Some((label, order)),
                ..Self::default()
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EventHandler for EventHandlerMock {
        async fn handle(&self, _ctx: &Context, event: &Event) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(event.clone());

            if let Some((label, order)) = &self.order {
                order.lock().unwrap().push(*label);
            }

            match self.fail_with {
                Some(code) => Err(HandlerFailure(code).into()),
                None => Ok(()),
            }
        }
    }

    struct Credit {
        account: Id,
    }

    impl Command for Credit {
        fn command_name(&self) -> &str {
            "credit"
        }
    }

    fn event(name: &str) -> Event {
        Event::new(name, Id::new(), 1u32, &serde_json::Value::Null).unwrap()
    }

    fn shared(handler: &Arc<EventHandlerMock>) -> Option<SharedEventHandler> {
        Some(handler.clone())
    }

    #[test]
    fn test_subscribe_rejects_empty_name() {
        let mut bus = BasicEventBus::new();

        let err = bus
            .subscribe(EventName::from(""), Some(Arc::new(EventHandlerMock::default())))
            .unwrap_err();

        assert!(matches!(err, CqsError::EmptyEventName));
    }

    #[test]
    fn test_subscribe_rejects_missing_handler() {
        let mut bus = BasicEventBus::new();

        let err = bus.subscribe("foo".into(), None).unwrap_err();

        assert!(matches!(err, CqsError::EmptyEventHandler));
        assert_eq!(bus.handler_count(&"foo".into()), 0);
    }

    #[test]
    fn test_subscribe_empty_name_wins_over_missing_handler() {
        let mut bus = BasicEventBus::new();

        let err = bus.subscribe("".into(), None).unwrap_err();

        assert!(matches!(err, CqsError::EmptyEventName));
    }

    #[test]
    fn test_subscribe_two_handlers_same_name() {
        let mut bus = BasicEventBus::new();

        bus.subscribe_handler("foo", EventHandlerMock::default()).unwrap();
        bus.subscribe_handler("foo", EventHandlerMock::default()).unwrap();

        assert_eq!(bus.handler_count(&"foo".into()), 2);
        assert_eq!(bus.handler_count(&"bar".into()), 0);
    }

    #[tokio::test]
    async fn test_dispatch_without_handlers_is_a_noop() {
        let mut bus = BasicEventBus::new();
        let other = Arc::new(EventHandlerMock::default());
        bus.subscribe("bar".into(), shared(&other)).unwrap();

        bus.dispatch(&Context::new(), &event("foo")).await.unwrap();

        assert_eq!(other.call_count(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_calls_every_handler_once_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let first = Arc::new(EventHandlerMock::ordered(1, order.clone()));
        let second = Arc::new(EventHandlerMock::ordered(2, order.clone()));
        let third = Arc::new(EventHandlerMock::ordered(3, order.clone()));

        let mut bus = BasicEventBus::new();
        for handler in [&first, &second, &third] {
            bus.subscribe("foo".into(), shared(handler)).unwrap();
        }

        let ev = event("foo");
        bus.dispatch(&Context::new(), &ev).await.unwrap();

        for handler in [&first, &second, &third] {
            assert_eq!(handler.call_count(), 1);
            assert_eq!(*handler.seen.lock().unwrap(), vec![ev.clone()]);
        }
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_dispatch_aggregates_every_failure() {
        let first = Arc::new(EventHandlerMock::failing(1));
        let second = Arc::new(EventHandlerMock::default());
        let third = Arc::new(EventHandlerMock::failing(3));

        let mut bus = BasicEventBus::new();
        for handler in [&first, &second, &third] {
            bus.subscribe("foo".into(), shared(handler)).unwrap();
        }

        let err = bus.dispatch(&Context::new(), &event("foo")).await.unwrap_err();

        assert_eq!(err.len(), 2);
        assert_eq!(
            err.to_string(),
            "multi error: dispatch event: handler 1 failed; dispatch event: handler 3 failed"
        );
        assert!(err.contains(&HandlerFailure(1)));
        assert!(err.contains(&HandlerFailure(3)));
        assert!(!err.contains(&HandlerFailure(2)));
        assert!(err.find::<DispatchError>().is_some());

        for handler in [&first, &second, &third] {
            assert_eq!(handler.call_count(), 1);
        }
    }

    #[tokio::test]
    async fn test_dispatch_boom_scenario() {
        let a = Arc::new(EventHandlerMock::default());
        let b_calls = Arc::new(AtomicUsize::new(0));
        let b_counter = b_calls.clone();

        let mut bus = BasicEventBus::new();
        bus.subscribe("foo".into(), shared(&a)).unwrap();
        bus.subscribe_handler(
            "foo",
            event_handler_fn(move |_ctx, _event| {
                let calls = b_counter.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow::anyhow!("boom"))
                }
            }),
        )
        .unwrap();

        let err = bus.dispatch(&Context::new(), &event("foo")).await.unwrap_err();

        assert!(err.to_string().contains("boom"));
        assert_eq!(a.call_count(), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bridge_requires_conversion_function() {
        let handler: SharedCommandHandler<Credit> =
            Arc::new(command_handler_fn(|_ctx, _cmd: Credit| async { Ok(vec![]) }));

        let err = EventCommandHandler::new(None, Some(handler)).err().unwrap();

        assert!(matches!(err, CqsError::EmptyEventToCommandFunc));
    }

    #[test]
    fn test_bridge_requires_command_handler() {
        let convert: EventToCommandFn<Credit> = Arc::new(|event: &Event| -> anyhow::Result<Credit> {
            Ok(Credit {
                account: event.aggregate_root_id(),
            })
        });

        let err = EventCommandHandler::new(Some(convert), None).err().unwrap();

        assert!(matches!(err, CqsError::EmptyCommandHandler));
    }

    #[tokio::test]
    async fn test_bridge_returns_conversion_error_without_running_command() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler_calls = calls.clone();

        let bridge = EventCommandHandler::from_parts(
            |_event: &Event| -> anyhow::Result<Credit> { Err(HandlerFailure(42).into()) },
            command_handler_fn(move |_ctx, _cmd: Credit| {
                let calls = handler_calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![])
                }
            }),
        );

        let err = bridge.handle(&Context::new(), &event("foo")).await.unwrap_err();

        assert_eq!(err.downcast_ref::<HandlerFailure>(), Some(&HandlerFailure(42)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bridge_runs_mapped_command_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler_seen = seen.clone();

        let bridge = EventCommandHandler::from_parts(
            |event: &Event| {
                Ok(Credit {
                    account: event.aggregate_root_id(),
                })
            },
            command_handler_fn(move |_ctx, cmd: Credit| {
                let seen = handler_seen.clone();
                async move {
                    seen.lock().unwrap().push(cmd.account);
                    Ok(vec![Event::new("credited", cmd.account, 1u32, &())?])
                }
            }),
        );

        let ev = event("foo");
        bridge.handle(&Context::new(), &ev).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![ev.aggregate_root_id()]);
    }

    #[tokio::test]
    async fn test_bridge_propagates_command_error_unchanged() {
        let bridge = EventCommandHandler::from_parts(
            |event: &Event| {
                Ok(Credit {
                    account: event.aggregate_root_id(),
                })
            },
            command_handler_fn(|_ctx, _cmd: Credit| async {
                Err(HandlerFailure(7).into())
            }),
        );

        let err = bridge.handle(&Context::new(), &event("foo")).await.unwrap_err();

        assert_eq!(err.downcast_ref::<HandlerFailure>(), Some(&HandlerFailure(7)));
        assert_eq!(err.to_string(), "handler 7 failed");
    }

    #[tokio::test]
    async fn test_bridge_failure_is_wrapped_once_by_the_bus() {
        let mut bus = BasicEventBus::new();
        bus.subscribe_handler(
            "foo",
            EventCommandHandler::from_parts(
                |event: &Event| {
                    Ok(Credit {
                        account: event.aggregate_root_id(),
                    })
                },
                command_handler_fn(|_ctx, _cmd: Credit| async {
                    Err(HandlerFailure(5).into())
                }),
            ),
        )
        .unwrap();

        let err = bus.dispatch(&Context::new(), &event("foo")).await.unwrap_err();

        assert_eq!(err.to_string(), "multi error: dispatch event: handler 5 failed");
        assert!(err.contains(&HandlerFailure(5)));
    }
}
