//! Logging and metrics collaborators, plus the middleware that reports on
//! every command and query going through a pipeline.

mod logger;
mod metrics;
mod middleware;

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{Context, error::ObsError};

pub use logger::{BasicLogger, BasicLoggerBuilder, Entry, JsonMarshaler, Marshaler, TimeFn, TracingLogger};
pub use metrics::NoopMetrics;
pub use middleware::ObsMiddleware;

/// Severity of a log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level `{other}`")),
        }
    }
}

/// An opaque piece of structured data attached to a log entry.
pub type PayloadEntry = serde_json::Value;

/// A key-value attribute giving context to a metric value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, payload: &[PayloadEntry]) -> Result<(), ObsError>;
}

/// Records numeric observations. Not used by the pipelines themselves: it is
/// there for handler authors.
pub trait Metrics: Send + Sync {
    fn count(&self, ctx: &Context, name: &str, value: f64, tags: &[Tag]) -> Result<(), ObsError>;

    fn gauge(&self, ctx: &Context, name: &str, value: f64, tags: &[Tag]) -> Result<(), ObsError>;

    fn histogram(&self, ctx: &Context, name: &str, value: f64, tags: &[Tag]) -> Result<(), ObsError>;
}

impl<L: Logger + ?Sized> Logger for Arc<L> {
    fn log(&self, level: LogLevel, message: &str, payload: &[PayloadEntry]) -> Result<(), ObsError> {
        (**self).log(level, message, payload)
    }
}

impl<M: Metrics + ?Sized> Metrics for Arc<M> {
    fn count(&self, ctx: &Context, name: &str, value: f64, tags: &[Tag]) -> Result<(), ObsError> {
        (**self).count(ctx, name, value, tags)
    }

    fn gauge(&self, ctx: &Context, name: &str, value: f64, tags: &[Tag]) -> Result<(), ObsError> {
        (**self).gauge(ctx, name, value, tags)
    }

    fn histogram(&self, ctx: &Context, name: &str, value: f64, tags: &[Tag]) -> Result<(), ObsError> {
        (**self).histogram(ctx, name, value, tags)
    }
}

/// Both observability collaborators behind one value.
#[derive(Clone)]
pub struct Observer {
    logger: Arc<dyn Logger>,
    metrics: Arc<dyn Metrics>,
}

impl Observer {
    pub fn new(logger: impl Logger + 'static, metrics: impl Metrics + 'static) -> Self {
        Self {
            logger: Arc::new(logger),
            metrics: Arc::new(metrics),
        }
    }
}

impl Logger for Observer {
    fn log(&self, level: LogLevel, message: &str, payload: &[PayloadEntry]) -> Result<(), ObsError> {
        self.logger.log(level, message, payload)
    }
}

impl Metrics for Observer {
    fn count(&self, ctx: &Context, name: &str, value: f64, tags: &[Tag]) -> Result<(), ObsError> {
        self.metrics.count(ctx, name, value, tags)
    }

    fn gauge(&self, ctx: &Context, name: &str, value: f64, tags: &[Tag]) -> Result<(), ObsError> {
        self.metrics.gauge(ctx, name, value, tags)
    }

    fn histogram(&self, ctx: &Context, name: &str, value: f64, tags: &[Tag]) -> Result<(), ObsError> {
        self.metrics.histogram(ctx, name, value, tags)
    }
}
