use std::{
    io::{self, Write},
    sync::{Arc, Mutex},
};

use serde::{Deserialize, Serialize};

use super::{LogLevel, Logger, PayloadEntry};
use crate::{error::ObsError, vo::DateTime};

/// One log line as written by [`BasicLogger`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payload: Vec<PayloadEntry>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub time: String,
    #[serde(rename = "log_level")]
    pub level: LogLevel,
}

/// Turns a log entry into the bytes of one line.
pub trait Marshaler: Send + Sync {
    fn marshal(&self, entry: &Entry) -> anyhow::Result<Vec<u8>>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct JsonMarshaler;

impl Marshaler for JsonMarshaler {
    fn marshal(&self, entry: &Entry) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec(entry)?)
    }
}

/// Clock used to stamp entries.
pub type TimeFn = Arc<dyn Fn() -> DateTime + Send + Sync>;

/// A [`Logger`] writing one marshaled entry per line.
///
/// Defaults to JSON lines on stdout, stamped with the current time.
pub struct BasicLogger {
    marshaler: Box<dyn Marshaler>,
    writer: Mutex<Box<dyn Write + Send>>,
    time_fn: TimeFn,
}

impl BasicLogger {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> BasicLoggerBuilder {
        BasicLoggerBuilder::new()
    }
}

impl Default for BasicLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger for BasicLogger {
    fn log(&self, level: LogLevel, message: &str, payload: &[PayloadEntry]) -> Result<(), ObsError> {
        let entry = Entry {
            message: message.to_string(),
            payload: payload.to_vec(),
            time: (self.time_fn)().as_chrono().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            level,
        };

        let mut line = self
            .marshaler
            .marshal(&entry)
            .map_err(|source| ObsError::Marshal { source })?;
        line.push(b'\n');

        let mut writer = self.writer.lock().map_err(|_| ObsError::Poisoned)?;
        writer.write_all(&line)?;
        writer.flush()?;

        Ok(())
    }
}

/// Builder for [`BasicLogger`].
pub struct BasicLoggerBuilder {
    marshaler: Box<dyn Marshaler>,
    writer: Box<dyn Write + Send>,
    time_fn: TimeFn,
}

impl BasicLoggerBuilder {
    pub fn new() -> Self {
        Self {
            marshaler: Box::new(JsonMarshaler),
            writer: Box::new(io::stdout()),
            time_fn: Arc::new(DateTime::now),
        }
    }

    pub fn marshaler(mut self, marshaler: impl Marshaler + 'static) -> Self {
        self.marshaler = Box::new(marshaler);
        self
    }

    pub fn writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.writer = Box::new(writer);
        self
    }

    pub fn time_fn(mut self, time_fn: impl Fn() -> DateTime + Send + Sync + 'static) -> Self {
        self.time_fn = Arc::new(time_fn);
        self
    }

    pub fn build(self) -> BasicLogger {
        BasicLogger {
            marshaler: self.marshaler,
            writer: Mutex::new(self.writer),
            time_fn: self.time_fn,
        }
    }
}

impl Default for BasicLoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`Logger`] forwarding entries to `tracing`, payload rendered as JSON.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str, payload: &[PayloadEntry]) -> Result<(), ObsError> {
        let payload = serde_json::Value::from(payload.to_vec());

        match level {
            LogLevel::Debug => tracing::debug!(%payload, "{message}"),
            LogLevel::Info => tracing::info!(%payload, "{message}"),
            LogLevel::Warning => tracing::warn!(%payload, "{message}"),
            LogLevel::Error => tracing::error!(%payload, "{message}"),
        }

        Ok(())
    }
}
