//! # mini_cqs
//!
//! Minimal substrate to keep writes (commands), reads (queries) and the domain
//! events they produce apart, and to route events back into new commands.
//!
//! - **Command pipeline**: [`CommandHandler`]s return the [`Event`]s they
//!   produced; [`CommandMiddleware`]s layer cross-cutting behaviour around them.
//! - **Query pipeline**: [`QueryHandler`]s return a typed result, with the same
//!   middleware composition rules.
//! - **Event bus**: [`BasicEventBus`] maps event names to ordered handlers,
//!   runs all of them on dispatch and collects failures in a [`MultiError`].
//! - **Event-to-command bridge**: [`EventCommandHandler`] turns an event into
//!   a command and runs it through a command handler.
//! - **Observability**: [`obs::ObsMiddleware`] logs timing and failures of any
//!   command or query through an [`obs::Logger`].
//!
//! Nothing is spawned: every call runs on the caller's task, and the
//! [`Context`] given by the caller reaches the handlers as is.
//!
//! ## Example
//!
//! ```rust
//! use mini_cqs::{
//!     BasicEventBus, Command, CommandHandler, CommandMiddlewareChain, Context, Event, EventBus,
//!     EventCommandHandler, command_handler_fn, obs::{ObsMiddleware, TracingLogger}, vo::Id,
//! };
//!
//! struct OpenAccount {
//!     id: Id,
//! }
//!
//! impl Command for OpenAccount {
//!     fn command_name(&self) -> &str {
//!         "open_account"
//!     }
//! }
//!
//! struct SendWelcome {
//!     id: Id,
//! }
//!
//! impl Command for SendWelcome {
//!     fn command_name(&self) -> &str {
//!         "send_welcome"
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let open = CommandMiddlewareChain::new()
//!     .with(ObsMiddleware::new(TracingLogger))
//!     .apply(command_handler_fn(|_ctx, cmd: OpenAccount| async move {
//!         Ok(vec![Event::new("account_opened", cmd.id, 1u32, &())?])
//!     }));
//!
//! let welcome = command_handler_fn(|_ctx, cmd: SendWelcome| async move {
//!     println!("welcome {}", cmd.id);
//!     Ok(vec![])
//! });
//!
//! let mut bus = BasicEventBus::new();
//! bus.subscribe_handler(
//!     "account_opened",
//!     EventCommandHandler::from_parts(
//!         |event: &Event| Ok(SendWelcome { id: event.aggregate_root_id() }),
//!         welcome,
//!     ),
//! )?;
//!
//! let ctx = Context::new();
//! for event in open.handle(&ctx, OpenAccount { id: Id::new() }).await? {
//!     bus.dispatch(&ctx, &event).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod context;
pub mod error;
pub mod event;
pub mod event_bus;
pub mod multi_error;
pub mod obs;
pub mod query;
pub mod vo;

pub use command::{
    Command, CommandHandler, CommandHandlerFn, CommandMiddleware, CommandMiddlewareChain,
    SharedCommandHandler, command_handler_fn, multi_command_middleware,
};
pub use context::Context;
pub use error::{CqsError, ObsError, Result};
pub use event::{Event, EventName, EventPayload, EventVersion};
pub use event_bus::{
    BasicEventBus, DispatchError, EventBus, EventCommandHandler, EventHandler, EventHandlerFn,
    EventToCommandFn, SharedEventHandler, event_handler_fn,
};
pub use multi_error::MultiError;
pub use query::{
    Query, QueryHandler, QueryHandlerFn, QueryMiddleware, QueryMiddlewareChain,
    SharedQueryHandler, multi_query_middleware, query_handler_fn,
};

pub use uuid::Uuid;
