//! Lifecycle notifications
//!
//! Every manager owns an [`EventBus`]. Subscribers receive [`LifecycleEvent`]s
//! over a `tokio::sync::broadcast` channel; dropping the receiver
//! unsubscribes. Events emitted by one operation arrive in the order they
//! were sent, e.g. `EndpointChanged` always precedes its `SettingChanged`.

use std::fmt;
use tokio::sync::broadcast;
use tracing::trace;

use crate::settings::{Change, ClientSettings};

/// Which setting a [`SettingChange`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Endpoint,
    DatabaseName,
    Options,
}

impl SettingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKind::Endpoint => "endpoint",
            SettingKind::DatabaseName => "database-name",
            SettingKind::Options => "options",
        }
    }
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value carried by a generic setting change
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Text(String),
    Options(ClientSettings),
}

/// Generic change notification, sent after every specific `*Changed` event
#[derive(Debug, Clone, PartialEq)]
pub struct SettingChange {
    pub kind: SettingKind,
    pub current: SettingValue,
    pub previous: SettingValue,
}

impl SettingChange {
    pub(crate) fn text(kind: SettingKind, change: &Change<String>) -> Self {
        Self {
            kind,
            current: SettingValue::Text(change.current.clone()),
            previous: SettingValue::Text(change.previous.clone()),
        }
    }

    pub(crate) fn options(change: &Change<ClientSettings>) -> Self {
        Self {
            kind: SettingKind::Options,
            current: SettingValue::Options(change.current.clone()),
            previous: SettingValue::Options(change.previous.clone()),
        }
    }
}

/// Notification emitted by a [`crate::ConnectionManager`]
///
/// `C` is the driver's client handle type.
#[derive(Debug, Clone)]
pub enum LifecycleEvent<C> {
    /// A connect attempt produced a client
    Connected(C),
    /// The client reported that it closed
    Disconnect(C),
    /// A connect attempt failed; `client` is the previously stored handle, if any
    ConnectionFailed { client: Option<C>, reason: String },
    EndpointChanged { current: String, previous: String },
    DatabaseNameChanged { current: String, previous: String },
    OptionsChanged {
        current: ClientSettings,
        previous: ClientSettings,
    },
    SettingChanged(SettingChange),
}

impl<C> LifecycleEvent<C> {
    /// Short event name, matching the notification names used in logs
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Connected(_) => "connected",
            LifecycleEvent::Disconnect(_) => "disconnect",
            LifecycleEvent::ConnectionFailed { .. } => "connection-failed",
            LifecycleEvent::EndpointChanged { .. } => "endpoint-changed",
            LifecycleEvent::DatabaseNameChanged { .. } => "database-name-changed",
            LifecycleEvent::OptionsChanged { .. } => "options-changed",
            LifecycleEvent::SettingChanged(_) => "setting-changed",
        }
    }
}

/// Broadcast channel for lifecycle events
#[derive(Debug)]
pub struct EventBus<C> {
    tx: broadcast::Sender<LifecycleEvent<C>>,
}

impl<C: Clone> EventBus<C> {
    /// Default number of buffered events per subscriber
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent<C>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Send an event; having no subscribers is not an error.
    pub fn emit(&self, event: LifecycleEvent<C>) {
        let name = event.name();
        match self.tx.send(event) {
            Ok(receivers) => trace!(event = name, receivers, "Lifecycle event sent"),
            Err(_) => trace!(event = name, "Lifecycle event dropped, no subscribers"),
        }
    }
}

impl<C: Clone> Default for EventBus<C> {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
