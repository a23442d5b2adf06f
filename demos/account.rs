/// # mini_cqs Example: Bank Account
///
/// Commands open accounts and deposit money, emitting events. A projection keeps
/// balances up to date from the event bus, and the `account.opened` event is
/// bridged into a welcome bonus deposit. Every command and query goes through
/// the observability middleware.
///
/// ## Usage
///
/// ```sh
/// RUST_LOG=mini_cqs=debug cargo run --example account
/// ```
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use mini_cqs::{
    BasicEventBus, Command, CommandHandler, CommandMiddlewareChain, Context, Event, EventBus,
    EventCommandHandler, EventName, EventPayload, Query, QueryHandler, QueryMiddlewareChain,
    SharedCommandHandler, command_handler_fn, event_handler_fn,
    obs::{BasicLogger, Logger, LogLevel, Metrics, NoopMetrics, ObsMiddleware, Observer, Tag},
    query_handler_fn,
    vo::Id,
};

const WELCOME_BONUS: u64 = 10;

// Events
#[derive(Clone, Debug, Serialize, Deserialize)]
struct AccountOpened {
    account: Id,
    owner: String,
}

impl EventPayload for AccountOpened {
    fn event_name(&self) -> EventName {
        "account.opened".into()
    }

    fn aggregate_root_id(&self) -> Id {
        self.account
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct MoneyDeposited {
    account: Id,
    amount: u64,
}

impl EventPayload for MoneyDeposited {
    fn event_name(&self) -> EventName {
        "account.deposited".into()
    }

    fn aggregate_root_id(&self) -> Id {
        self.account
    }
}

// Commands
struct OpenAccount {
    owner: String,
}

impl Command for OpenAccount {
    fn command_name(&self) -> &str {
        "open_account"
    }
}

struct Deposit {
    account: Id,
    amount: u64,
}

impl Command for Deposit {
    fn command_name(&self) -> &str {
        "deposit"
    }
}

// Queries
struct GetBalance {
    account: Id,
}

impl Query for GetBalance {
    type Output = Option<u64>;

    fn query_name(&self) -> &str {
        "get_balance"
    }
}

// Read model
type Balances = Arc<Mutex<HashMap<Id, u64>>>;

fn lock<T>(mutex: &Mutex<T>) -> anyhow::Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| anyhow::anyhow!("lock poisoned"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let observer = Observer::new(BasicLogger::new(), NoopMetrics);
    let obs = ObsMiddleware::new(observer.clone());
    let balances: Balances = Arc::default();

    let open_account = CommandMiddlewareChain::new()
        .with(obs.clone())
        .apply(command_handler_fn(|_ctx, cmd: OpenAccount| async move {
            if cmd.owner.is_empty() {
                anyhow::bail!("an account needs an owner");
            }

            let opened = AccountOpened {
                account: Id::new(),
                owner: cmd.owner,
            };
            Ok(vec![Event::from_payload(&opened, 1u32)?])
        }));

    let deposit_metrics = observer.clone();
    let deposit: SharedCommandHandler<Deposit> = CommandMiddlewareChain::new()
        .with(obs.clone())
        .apply(command_handler_fn(move |ctx, cmd: Deposit| {
            let metrics = deposit_metrics.clone();
            async move {
                if cmd.amount == 0 {
                    anyhow::bail!("deposit amount must be positive");
                }

                metrics.count(
                    &ctx,
                    "deposits",
                    1.0,
                    &[Tag::new("account", cmd.account.to_string())],
                )?;

                let deposited = MoneyDeposited {
                    account: cmd.account,
                    amount: cmd.amount,
                };
                Ok(vec![Event::from_payload(&deposited, 1u32)?])
            }
        }));

    let get_balance = QueryMiddlewareChain::new().with(obs).apply(query_handler_fn({
        let balances = balances.clone();
        move |_ctx, query: GetBalance| {
            let balances = balances.clone();
            async move { Ok(lock(&balances)?.get(&query.account).copied()) }
        }
    }));

    // Events emitted by the bridged deposit are collected here and dispatched
    // by the loop below.
    let pending: Arc<Mutex<Vec<Event>>> = Arc::default();

    let mut bus = BasicEventBus::new();
    bus.subscribe_handler(
        "account.opened",
        event_handler_fn({
            let balances = balances.clone();
            move |_ctx, event: Event| {
                let balances = balances.clone();
                async move {
                    lock(&balances)?.insert(event.aggregate_root_id(), 0);
                    Ok(())
                }
            }
        }),
    )?;
    bus.subscribe_handler(
        "account.opened",
        EventCommandHandler::from_parts(
            |event: &Event| {
                Ok(Deposit {
                    account: event.aggregate_root_id(),
                    amount: WELCOME_BONUS,
                })
            },
            command_handler_fn({
                let deposit = deposit.clone();
                let pending = pending.clone();
                move |ctx, cmd: Deposit| {
                    let deposit = deposit.clone();
                    let pending = pending.clone();
                    async move {
                        let events = deposit.handle(&ctx, cmd).await?;
                        lock(&pending)?.extend(events);
                        Ok(vec![])
                    }
                }
            }),
        ),
    )?;
    bus.subscribe_handler(
        "account.deposited",
        event_handler_fn({
            let balances = balances.clone();
            move |_ctx, event: Event| {
                let balances = balances.clone();
                async move {
                    let deposited: MoneyDeposited = event.payload_as()?;
                    *lock(&balances)?.entry(deposited.account).or_default() += deposited.amount;
                    Ok(())
                }
            }
        }),
    )?;

    let ctx = Context::new();

    let mut events = open_account
        .handle(
            &ctx,
            OpenAccount {
                owner: "alice".to_string(),
            },
        )
        .await?;
    let account = events
        .first()
        .map(Event::aggregate_root_id)
        .ok_or("no account opened")?;

    events.extend(deposit.handle(&ctx, Deposit { account, amount: 25 }).await?);

    while !events.is_empty() {
        for event in std::mem::take(&mut events) {
            bus.dispatch(&ctx, &event).await?;
        }
        events.extend(std::mem::take(&mut *lock(&pending)?));
    }

    let balance = get_balance.handle(&ctx, GetBalance { account }).await?;
    observer.log(
        LogLevel::Info,
        "balance computed",
        &[serde_json::json!({ "account": account, "balance": balance })],
    )?;
    assert_eq!(balance, Some(25 + WELCOME_BONUS));

    if let Err(err) = deposit.handle(&ctx, Deposit { account, amount: 0 }).await {
        println!("rejected deposit: {err}");
    }

    Ok(())
}
