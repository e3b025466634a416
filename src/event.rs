//! Recognized server event hooks.
//!
//! # Responsibilities
//! - Define the closed set of engine event hooks
//! - Parse event names from configuration keys
//! - Answer "is this name something a listener can bind?"
//!
//! # Design Decisions
//! - The set is static; no dynamic registration
//! - Callback maps keep string keys so configurations may carry event names
//!   this version does not recognize yet; the binder skips those
//! - `before_start` is a configuration key but not a bindable event: the
//!   orchestrator invokes it directly during bootstrap

use std::fmt;

/// Callback key for the synchronous hook that runs during bootstrap, right
/// before a server's start notification. Looked up by the orchestrator,
/// never attached to a listener.
pub const BEFORE_START: &str = "before_start";

/// Event hooks a listener can bind callbacks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServerEvent {
    Start,
    Shutdown,
    ManagerStart,
    ManagerStop,
    WorkerStart,
    WorkerStop,
    WorkerExit,
    WorkerError,
    Connect,
    Receive,
    Close,
    Packet,
    Request,
    Handshake,
    Open,
    Message,
    Task,
    Finish,
    PipeMessage,
}

impl ServerEvent {
    /// Every bindable event, in declaration order.
    pub const ALL: [ServerEvent; 19] = [
        ServerEvent::Start,
        ServerEvent::Shutdown,
        ServerEvent::ManagerStart,
        ServerEvent::ManagerStop,
        ServerEvent::WorkerStart,
        ServerEvent::WorkerStop,
        ServerEvent::WorkerExit,
        ServerEvent::WorkerError,
        ServerEvent::Connect,
        ServerEvent::Receive,
        ServerEvent::Close,
        ServerEvent::Packet,
        ServerEvent::Request,
        ServerEvent::Handshake,
        ServerEvent::Open,
        ServerEvent::Message,
        ServerEvent::Task,
        ServerEvent::Finish,
        ServerEvent::PipeMessage,
    ];

    /// Parse a configuration key into an event. Returns `None` for anything
    /// outside the recognized set, including [`BEFORE_START`].
    pub fn from_name(name: &str) -> Option<ServerEvent> {
        let event = match name {
            "start" => ServerEvent::Start,
            "shutdown" => ServerEvent::Shutdown,
            "manager_start" => ServerEvent::ManagerStart,
            "manager_stop" => ServerEvent::ManagerStop,
            "worker_start" => ServerEvent::WorkerStart,
            "worker_stop" => ServerEvent::WorkerStop,
            "worker_exit" => ServerEvent::WorkerExit,
            "worker_error" => ServerEvent::WorkerError,
            "connect" => ServerEvent::Connect,
            "receive" => ServerEvent::Receive,
            "close" => ServerEvent::Close,
            "packet" => ServerEvent::Packet,
            "request" => ServerEvent::Request,
            "handshake" => ServerEvent::Handshake,
            "open" => ServerEvent::Open,
            "message" => ServerEvent::Message,
            "task" => ServerEvent::Task,
            "finish" => ServerEvent::Finish,
            "pipe_message" => ServerEvent::PipeMessage,
            _ => return None,
        };
        Some(event)
    }

    /// The configuration key for this event.
    pub fn name(self) -> &'static str {
        match self {
            ServerEvent::Start => "start",
            ServerEvent::Shutdown => "shutdown",
            ServerEvent::ManagerStart => "manager_start",
            ServerEvent::ManagerStop => "manager_stop",
            ServerEvent::WorkerStart => "worker_start",
            ServerEvent::WorkerStop => "worker_stop",
            ServerEvent::WorkerExit => "worker_exit",
            ServerEvent::WorkerError => "worker_error",
            ServerEvent::Connect => "connect",
            ServerEvent::Receive => "receive",
            ServerEvent::Close => "close",
            ServerEvent::Packet => "packet",
            ServerEvent::Request => "request",
            ServerEvent::Handshake => "handshake",
            ServerEvent::Open => "open",
            ServerEvent::Message => "message",
            ServerEvent::Task => "task",
            ServerEvent::Finish => "finish",
            ServerEvent::PipeMessage => "pipe_message",
        }
    }
}

impl fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns true when `name` parses to a bindable event.
pub fn is_recognized(name: &str) -> bool {
    ServerEvent::from_name(name).is_some()
}
