use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    CqsError, Result,
    vo::{DateTime, Id},
};

/// Name used to route an event to its handlers.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventName(String);

impl EventName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for EventName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for EventName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Display for EventName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of an event within the history of its aggregate root.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EventVersion(u32);

impl EventVersion {
    pub fn new(version: u32) -> Self {
        Self(version)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl From<u32> for EventVersion {
    fn from(version: u32) -> Self {
        Self(version)
    }
}

impl Display for EventVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The `Event` struct is an immutable fact about a state change of an aggregate root.
///
/// Every field is set once, when the event is built, through one of the
/// constructors ([`Event::new`], [`Event::from_payload`] or [`Event::hydrate`]).
/// After that only read accessors are available.
///
/// The payload is kept as JSON so the event bus can route events without
/// knowing their concrete shape; [`Event::payload_as`] deserializes it back
/// into a typed value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: Id,
    name: EventName,
    at: DateTime,
    aggregate_root_id: Id,
    version: EventVersion,
    #[serde(default)]
    payload: serde_json::Value,
}

impl Event {
    /// Creates a new event, stamped with a fresh id and the current time.
    pub fn new<P: Serialize>(
        name: impl Into<EventName>,
        aggregate_root_id: Id,
        version: impl Into<EventVersion>,
        payload: &P,
    ) -> Result<Self> {
        Ok(Self::hydrate(
            Id::new(),
            name.into(),
            DateTime::now(),
            aggregate_root_id,
            version.into(),
            serde_json::to_value(payload)?,
        ))
    }

    /// Creates a new event out of a payload that knows its own name and aggregate root.
    pub fn from_payload<P: EventPayload>(payload: &P, version: impl Into<EventVersion>) -> Result<Self> {
        Self::new(payload.event_name(), payload.aggregate_root_id(), version, payload)
    }

    /// Builds an event from already known values, e.g. when loading it back from storage.
    pub fn hydrate(
        id: Id,
        name: EventName,
        at: DateTime,
        aggregate_root_id: Id,
        version: EventVersion,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id,
            name,
            at,
            aggregate_root_id,
            version,
            payload,
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn name(&self) -> &EventName {
        &self.name
    }

    pub fn at(&self) -> DateTime {
        self.at
    }

    pub fn aggregate_root_id(&self) -> Id {
        self.aggregate_root_id
    }

    pub fn version(&self) -> EventVersion {
        self.version
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Gets the payload of the event.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.payload.clone()).map_err(CqsError::Payload)
    }
}

/// The `EventPayload` trait is implemented by the typed content of an event.
///
/// It lets [`Event::from_payload`] take the routing name and the aggregate root
/// straight from the payload.
pub trait EventPayload: Serialize + DeserializeOwned {
    fn event_name(&self) -> EventName;

    fn aggregate_root_id(&self) -> Id;
}
