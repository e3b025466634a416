//! Configuration schema definitions.
//!
//! This module defines the declarative server topology: an ordered list of
//! logical server definitions plus global setting and callback layers that
//! merge beneath each definition's own entries. All types deserialize from
//! config files; callback maps additionally accept function values built in
//! code, which have no file representation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer};

use crate::handler::EventCallback;

/// Protocol personality of a logical server.
///
/// The kind of the first-ordered definition decides which engine listener
/// becomes the primary one, so kinds also drive startup ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    /// HTTP request/response server.
    Http,
    /// WebSocket server (also serves plain HTTP on the same port).
    WebSocket,
    /// Raw TCP/UDP server with no protocol layer.
    Base,
}

impl ServerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ServerKind::Http => "http",
            ServerKind::WebSocket => "websocket",
            ServerKind::Base => "base",
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport socket family for a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SocketKind {
    /// TCP over IPv4.
    #[default]
    Tcp,
    /// TCP over IPv6.
    Tcp6,
    /// UDP over IPv4.
    Udp,
    /// UDP over IPv6.
    Udp6,
    /// Unix domain stream socket; `host` carries the filesystem path.
    Unix,
}

impl SocketKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SocketKind::Tcp => "tcp",
            SocketKind::Tcp6 => "tcp6",
            SocketKind::Udp => "udp",
            SocketKind::Udp6 => "udp6",
            SocketKind::Unix => "unix",
        }
    }

    /// True for datagram transports.
    pub fn is_datagram(self) -> bool {
        matches!(self, SocketKind::Udp | SocketKind::Udp6)
    }
}

impl fmt::Display for SocketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process model the engine runs after bootstrap hands over control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Everything in one process; no manager lifecycle events.
    SingleProcess,
    /// Manager plus worker processes (or tasks standing in for them).
    #[default]
    MultiProcess,
    /// Reactor-only mode without a manager.
    Base,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::SingleProcess => "single_process",
            RunMode::MultiProcess => "multi_process",
            RunMode::Base => "base",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single engine option value. Options are an open set, so values stay
/// loosely typed until the engine interprets them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl SettingValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SettingValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            SettingValue::Float(value) => Some(*value),
            SettingValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::Str(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Int(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Float(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Str(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Str(value)
    }
}

/// Engine option map (option name to value).
pub type Settings = BTreeMap<String, SettingValue>;

/// Event-name to handler-reference map.
pub type CallbackMap = BTreeMap<String, HandlerRef>;

/// Reference to the code that handles one event.
///
/// Configuration files produce the symbolic form, a `(handler, method)`
/// pair resolved through the handler container at bind time. The direct
/// form wraps a ready-made callback and only exists in code.
#[derive(Clone)]
pub enum HandlerRef {
    /// Resolve `handler` in the container, then look up `method` on it.
    Symbolic { handler: String, method: String },
    /// Invoke this callback as-is; never resolved, never deduplicated.
    Direct(EventCallback),
}

impl HandlerRef {
    pub fn symbolic(handler: impl Into<String>, method: impl Into<String>) -> Self {
        HandlerRef::Symbolic {
            handler: handler.into(),
            method: method.into(),
        }
    }

    pub fn direct(callback: EventCallback) -> Self {
        HandlerRef::Direct(callback)
    }

    pub fn as_symbolic(&self) -> Option<(&str, &str)> {
        match self {
            HandlerRef::Symbolic { handler, method } => Some((handler, method)),
            HandlerRef::Direct(_) => None,
        }
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerRef::Symbolic { handler, method } => f
                .debug_struct("Symbolic")
                .field("handler", handler)
                .field("method", method)
                .finish(),
            HandlerRef::Direct(_) => f.write_str("Direct(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for HandlerRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (handler, method) = <(String, String)>::deserialize(deserializer)?;
        Ok(HandlerRef::Symbolic { handler, method })
    }
}

/// One logical server. Immutable once read from configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerDefinition {
    /// Unique identifier, used for registry lookup and log context.
    pub name: String,

    /// Protocol personality.
    pub kind: ServerKind,

    /// Bind host, or the socket path for unix sockets.
    pub host: String,

    /// Bind port; ignored for unix sockets.
    pub port: u16,

    /// Transport socket family.
    #[serde(default)]
    pub socket: SocketKind,

    /// Engine options for this server only.
    #[serde(default)]
    pub settings: Settings,

    /// Event callbacks for this server only.
    #[serde(default)]
    pub callbacks: CallbackMap,
}

impl ServerDefinition {
    pub fn new(
        name: impl Into<String>,
        kind: ServerKind,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            host: host.into(),
            port,
            socket: SocketKind::default(),
            settings: Settings::new(),
            callbacks: CallbackMap::new(),
        }
    }

    pub fn with_socket(mut self, socket: SocketKind) -> Self {
        self.socket = socket;
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn with_callback(mut self, event: impl Into<String>, handler: HandlerRef) -> Self {
        self.callbacks.insert(event.into(), handler);
        self
    }
}

/// Root of the server topology configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerCollection {
    /// Engine process model, shared by every listener.
    pub mode: RunMode,

    /// Logical servers in configured order; the orderer decides the
    /// actual bootstrap order.
    pub servers: Vec<ServerDefinition>,

    /// Settings applied beneath each primary definition's own settings.
    /// Secondary listeners do not inherit these.
    pub settings: Settings,

    /// Callbacks merged beneath each definition's own callbacks.
    pub callbacks: CallbackMap,
}

impl ServerCollection {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_server(mut self, definition: ServerDefinition) -> Self {
        self.servers.push(definition);
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn with_callback(mut self, event: impl Into<String>, handler: HandlerRef) -> Self {
        self.callbacks.insert(event.into(), handler);
        self
    }
}

/// Merge two setting layers; `overlay` wins per key.
pub fn layer_settings(base: &Settings, overlay: &Settings) -> Settings {
    let mut merged = base.clone();
    merged.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Merge two callback layers; `overlay` wins per event name.
pub fn layer_callbacks(base: &CallbackMap, overlay: &CallbackMap) -> CallbackMap {
    let mut merged = base.clone();
    merged.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
