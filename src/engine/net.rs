//! Tokio-backed listener engine.
//!
//! # Responsibilities
//! - Bind TCP/UDP/unix sockets for primary and secondary listeners
//! - Enforce per-listener connection limits via semaphore
//! - Run accept/receive loops and dispatch bound event callbacks
//! - Stop cleanly when the shutdown coordinator fires
//!
//! # Design Decisions
//! - One worker task per listener stands in for a process-per-worker model;
//!   worker lifecycle events carry the task index as the worker id
//! - The primary listener's kind picks its data event (request, message or
//!   receive); secondary stream ports always dispatch `receive`, datagram
//!   ports always dispatch `packet`
//! - Protocol-level hooks (handshake, open, task, finish, pipe_message,
//!   worker_exit) are bindable but this engine never emits them
//! - Accept errors are logged and the loop continues; only bind failures
//!   are fatal

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, UdpSocket};
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Semaphore;

use crate::config::schema::{RunMode, ServerKind, Settings, SocketKind};
use crate::engine::{
    format_address, EngineError, ListenerControl, ListenerSpec, MainServer, ServerEngine,
};
use crate::event::ServerEvent;
use crate::handler::{EventCallback, EventContext};
use crate::lifecycle::Shutdown;

/// Engine that runs listeners on the ambient tokio runtime.
pub struct TokioEngine {
    shutdown: Arc<Shutdown>,
}

impl TokioEngine {
    pub fn new() -> Self {
        Self::with_shutdown(Arc::new(Shutdown::new()))
    }

    /// Share an externally-owned shutdown coordinator, so signal handling
    /// can stop the engine.
    pub fn with_shutdown(shutdown: Arc<Shutdown>) -> Self {
        Self { shutdown }
    }

    pub fn shutdown_handle(&self) -> Arc<Shutdown> {
        Arc::clone(&self.shutdown)
    }
}

impl Default for TokioEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServerEngine for TokioEngine {
    async fn create_listener(
        &self,
        spec: ListenerSpec,
    ) -> Result<Box<dyn MainServer>, EngineError> {
        let data_event = primary_data_event(spec.kind, spec.socket);
        let listener =
            TokioListener::bind(&spec.host, spec.port, spec.socket, data_event).await?;
        Ok(Box::new(TokioMainServer {
            mode: spec.mode,
            main: Arc::new(listener),
            extras: Vec::new(),
            shutdown: Arc::clone(&self.shutdown),
        }))
    }
}

/// Data event dispatched when payload arrives on the primary listener.
fn primary_data_event(kind: ServerKind, socket: SocketKind) -> ServerEvent {
    if socket.is_datagram() {
        return ServerEvent::Packet;
    }
    match kind {
        ServerKind::Http => ServerEvent::Request,
        ServerKind::WebSocket => ServerEvent::Message,
        ServerKind::Base => ServerEvent::Receive,
    }
}

/// Data event for secondary ports, which are raw transports.
fn secondary_data_event(socket: SocketKind) -> ServerEvent {
    if socket.is_datagram() {
        ServerEvent::Packet
    } else {
        ServerEvent::Receive
    }
}

/// Options a listener honors from its settings map.
struct ListenerOptions {
    max_connections: usize,
    tcp_nodelay: bool,
    recv_buffer_size: usize,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            max_connections: 10_000,
            tcp_nodelay: false,
            recv_buffer_size: 4096,
        }
    }
}

enum BoundSocket {
    Tcp(TcpListener),
    Udp(UdpSocket),
    #[cfg(unix)]
    Unix(UnixListener),
}

/// One bound listening socket plus its event bindings.
struct TokioListener {
    address: String,
    data_event: ServerEvent,
    local: Option<SocketAddr>,
    bound: Mutex<Option<BoundSocket>>,
    callbacks: Mutex<BTreeMap<ServerEvent, EventCallback>>,
    options: Mutex<ListenerOptions>,
}

impl TokioListener {
    async fn bind(
        host: &str,
        port: u16,
        socket: SocketKind,
        data_event: ServerEvent,
    ) -> Result<Self, EngineError> {
        let address = format_address(host, port, socket);
        check_family(host, socket, &address)?;

        let (bound, local) = match socket {
            SocketKind::Tcp | SocketKind::Tcp6 => {
                let listener = TcpListener::bind((host, port)).await.map_err(|source| {
                    EngineError::Bind {
                        address: address.clone(),
                        source,
                    }
                })?;
                let local = listener.local_addr().ok();
                (BoundSocket::Tcp(listener), local)
            }
            SocketKind::Udp | SocketKind::Udp6 => {
                let socket = UdpSocket::bind((host, port)).await.map_err(|source| {
                    EngineError::Bind {
                        address: address.clone(),
                        source,
                    }
                })?;
                let local = socket.local_addr().ok();
                (BoundSocket::Udp(socket), local)
            }
            SocketKind::Unix => bind_unix(host, &address)?,
        };

        tracing::info!(address = %address, data_event = %data_event, "Listener bound");

        Ok(Self {
            address,
            data_event,
            local,
            bound: Mutex::new(Some(bound)),
            callbacks: Mutex::new(BTreeMap::new()),
            options: Mutex::new(ListenerOptions::default()),
        })
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn take_socket(&self) -> Option<BoundSocket> {
        self.lock_bound().take()
    }

    fn callback_for(&self, event: ServerEvent) -> Option<EventCallback> {
        self.lock_callbacks().get(&event).cloned()
    }

    /// Invoke the callback bound for `event`, if any. The callback is
    /// cloned out of the lock before awaiting.
    async fn dispatch(&self, event: ServerEvent, ctx: EventContext) {
        if let Some(callback) = self.callback_for(event) {
            callback.invoke(ctx).await;
        }
    }

    fn base_context(&self, peer: Option<SocketAddr>) -> EventContext {
        let mut ctx = EventContext::default();
        if let Some(peer) = peer {
            ctx = ctx.with_peer(peer);
        }
        if let Some(local) = self.local {
            ctx = ctx.with_local(local);
        }
        ctx
    }

    fn connection_options(&self) -> (usize, bool) {
        let options = self.lock_options();
        (options.max_connections, options.tcp_nodelay)
    }

    fn recv_buffer_size(&self) -> usize {
        self.lock_options().recv_buffer_size.max(1)
    }

    fn lock_bound(&self) -> MutexGuard<'_, Option<BoundSocket>> {
        self.bound.lock().expect("listener socket mutex poisoned")
    }

    fn lock_callbacks(&self) -> MutexGuard<'_, BTreeMap<ServerEvent, EventCallback>> {
        self.callbacks.lock().expect("listener callback mutex poisoned")
    }

    fn lock_options(&self) -> MutexGuard<'_, ListenerOptions> {
        self.options.lock().expect("listener options mutex poisoned")
    }
}

impl ListenerControl for TokioListener {
    fn bind_event(&self, event: ServerEvent, callback: EventCallback) {
        self.lock_callbacks().insert(event, callback);
    }

    fn apply_settings(&self, settings: &Settings) {
        let mut options = self.lock_options();
        for (key, value) in settings {
            match key.as_str() {
                "max_connections" => match value.as_int() {
                    Some(limit) if limit > 0 => options.max_connections = limit as usize,
                    _ => log_bad_option(&self.address, key),
                },
                "open_tcp_nodelay" => match value.as_bool() {
                    Some(flag) => options.tcp_nodelay = flag,
                    None => log_bad_option(&self.address, key),
                },
                "recv_buffer_size" => match value.as_int() {
                    Some(size) if size > 0 => options.recv_buffer_size = size as usize,
                    _ => log_bad_option(&self.address, key),
                },
                _ => {
                    tracing::debug!(
                        listener = %self.address,
                        option = %key,
                        "Ignoring unrecognized engine option"
                    );
                }
            }
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.local
    }
}

fn log_bad_option(address: &str, key: &str) {
    tracing::warn!(listener = %address, option = %key, "Engine option has unusable value, keeping default");
}

#[cfg(unix)]
fn bind_unix(path: &str, address: &str) -> Result<(BoundSocket, Option<SocketAddr>), EngineError> {
    let listener = UnixListener::bind(path).map_err(|source| EngineError::Bind {
        address: address.to_string(),
        source,
    })?;
    Ok((BoundSocket::Unix(listener), None))
}

#[cfg(not(unix))]
fn bind_unix(_path: &str, address: &str) -> Result<(BoundSocket, Option<SocketAddr>), EngineError> {
    Err(EngineError::Unsupported {
        what: format!("unix socket {address} on this platform"),
    })
}

/// Reject addresses whose family contradicts the socket kind. Hostnames
/// that need resolution are left to the bind call.
fn check_family(host: &str, socket: SocketKind, address: &str) -> Result<(), EngineError> {
    let Ok(ip) = host.parse::<IpAddr>() else {
        return Ok(());
    };
    let expected = match socket {
        SocketKind::Tcp | SocketKind::Udp => ip.is_ipv4().then_some(()).ok_or("an IPv4 address"),
        SocketKind::Tcp6 | SocketKind::Udp6 => ip.is_ipv6().then_some(()).ok_or("an IPv6 address"),
        SocketKind::Unix => Ok(()),
    };
    expected.map_err(|family| EngineError::Address {
        address: address.to_string(),
        reason: format!("{socket} requires {family}"),
    })
}

/// Primary listener plus any secondary ports, ready to serve.
struct TokioMainServer {
    mode: RunMode,
    main: Arc<TokioListener>,
    extras: Vec<Arc<TokioListener>>,
    shutdown: Arc<Shutdown>,
}

#[async_trait]
impl MainServer for TokioMainServer {
    fn handle(&self) -> Arc<dyn ListenerControl> {
        Arc::clone(&self.main) as Arc<dyn ListenerControl>
    }

    async fn add_listener(
        &mut self,
        host: &str,
        port: u16,
        socket: SocketKind,
    ) -> Result<Arc<dyn ListenerControl>, EngineError> {
        let data_event = secondary_data_event(socket);
        let listener = TokioListener::bind(host, port, socket, data_event).await?;
        let listener = Arc::new(listener);
        self.extras.push(Arc::clone(&listener));
        Ok(listener as Arc<dyn ListenerControl>)
    }

    async fn serve(self: Box<Self>) -> Result<(), EngineError> {
        let TokioMainServer {
            mode,
            main,
            extras,
            shutdown,
        } = *self;

        tracing::info!(address = %main.address(), mode = %mode, listeners = extras.len() + 1, "Engine serving");

        main.dispatch(ServerEvent::Start, EventContext::default()).await;
        if mode == RunMode::MultiProcess {
            main.dispatch(ServerEvent::ManagerStart, EventContext::default()).await;
        }

        let listeners: Vec<Arc<TokioListener>> =
            std::iter::once(Arc::clone(&main)).chain(extras).collect();
        let mut workers = Vec::with_capacity(listeners.len());
        for (worker_id, listener) in listeners.into_iter().enumerate() {
            let shutdown = Arc::clone(&shutdown);
            workers.push(tokio::spawn(worker_loop(worker_id, listener, shutdown)));
        }

        for (worker_id, worker) in workers.into_iter().enumerate() {
            if let Err(error) = worker.await {
                tracing::error!(worker_id, error = %error, "Worker task failed");
                main.dispatch(
                    ServerEvent::WorkerError,
                    EventContext::default().with_worker_id(worker_id),
                )
                .await;
            }
        }

        if mode == RunMode::MultiProcess {
            main.dispatch(ServerEvent::ManagerStop, EventContext::default()).await;
        }
        main.dispatch(ServerEvent::Shutdown, EventContext::default()).await;

        tracing::info!(address = %main.address(), "Engine stopped");
        Ok(())
    }
}

async fn worker_loop(worker_id: usize, listener: Arc<TokioListener>, shutdown: Arc<Shutdown>) {
    listener
        .dispatch(
            ServerEvent::WorkerStart,
            EventContext::default().with_worker_id(worker_id),
        )
        .await;

    match listener.take_socket() {
        Some(BoundSocket::Tcp(tcp)) => accept_tcp_loop(&listener, tcp, &shutdown).await,
        Some(BoundSocket::Udp(udp)) => datagram_loop(&listener, udp, &shutdown).await,
        #[cfg(unix)]
        Some(BoundSocket::Unix(unix)) => accept_unix_loop(&listener, unix, &shutdown).await,
        None => wait_for_shutdown(&shutdown).await,
    }

    listener
        .dispatch(
            ServerEvent::WorkerStop,
            EventContext::default().with_worker_id(worker_id),
        )
        .await;
}

async fn wait_for_shutdown(shutdown: &Shutdown) {
    let mut rx = shutdown.subscribe();
    if !shutdown.is_triggered() {
        let _ = rx.recv().await;
    }
}

async fn accept_tcp_loop(listener: &Arc<TokioListener>, tcp: TcpListener, shutdown: &Arc<Shutdown>) {
    let (max_connections, nodelay) = listener.connection_options();
    let limit = Arc::new(Semaphore::new(max_connections));
    let mut rx = shutdown.subscribe();

    loop {
        if shutdown.is_triggered() {
            break;
        }

        // Permit first, accept second: backpressure before the kernel queue.
        let permit = tokio::select! {
            permit = Arc::clone(&limit).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            _ = rx.recv() => break,
        };

        let (stream, peer) = tokio::select! {
            accepted = tcp.accept() => match accepted {
                Ok(pair) => pair,
                Err(error) => {
                    tracing::warn!(listener = %listener.address(), error = %error, "Accept failed");
                    continue;
                }
            },
            _ = rx.recv() => break,
        };

        if nodelay {
            let _ = stream.set_nodelay(true);
        }

        let listener = Arc::clone(listener);
        tokio::spawn(async move {
            let _permit = permit;
            stream_connection(listener, stream, Some(peer)).await;
        });
    }
}

#[cfg(unix)]
async fn accept_unix_loop(
    listener: &Arc<TokioListener>,
    unix: UnixListener,
    shutdown: &Arc<Shutdown>,
) {
    let (max_connections, _) = listener.connection_options();
    let limit = Arc::new(Semaphore::new(max_connections));
    let mut rx = shutdown.subscribe();

    loop {
        if shutdown.is_triggered() {
            break;
        }

        let permit = tokio::select! {
            permit = Arc::clone(&limit).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            _ = rx.recv() => break,
        };

        let stream: UnixStream = tokio::select! {
            accepted = unix.accept() => match accepted {
                Ok((stream, _)) => stream,
                Err(error) => {
                    tracing::warn!(listener = %listener.address(), error = %error, "Accept failed");
                    continue;
                }
            },
            _ = rx.recv() => break,
        };

        let listener = Arc::clone(listener);
        tokio::spawn(async move {
            let _permit = permit;
            stream_connection(listener, stream, None).await;
        });
    }
}

/// Per-connection read loop: connect event, data events per read, close
/// event when the peer goes away.
async fn stream_connection<S>(listener: Arc<TokioListener>, mut stream: S, peer: Option<SocketAddr>)
where
    S: tokio::io::AsyncRead + Unpin + Send,
{
    listener
        .dispatch(ServerEvent::Connect, listener.base_context(peer))
        .await;

    let mut buf = vec![0u8; listener.recv_buffer_size()];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(read) => {
                let ctx = listener.base_context(peer).with_data(buf[..read].to_vec());
                listener.dispatch(listener.data_event, ctx).await;
            }
            Err(error) => {
                tracing::debug!(listener = %listener.address(), error = %error, "Read failed");
                break;
            }
        }
    }

    listener
        .dispatch(ServerEvent::Close, listener.base_context(peer))
        .await;
}

async fn datagram_loop(listener: &Arc<TokioListener>, udp: UdpSocket, shutdown: &Arc<Shutdown>) {
    let mut rx = shutdown.subscribe();
    let mut buf = vec![0u8; listener.recv_buffer_size()];

    loop {
        if shutdown.is_triggered() {
            break;
        }

        let (read, peer) = tokio::select! {
            received = udp.recv_from(&mut buf) => match received {
                Ok(pair) => pair,
                Err(error) => {
                    tracing::warn!(listener = %listener.address(), error = %error, "Receive failed");
                    continue;
                }
            },
            _ = rx.recv() => break,
        };

        let ctx = listener
            .base_context(Some(peer))
            .with_data(buf[..read].to_vec());
        listener.dispatch(ServerEvent::Packet, ctx).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn primary_data_event_follows_kind() {
        assert_eq!(
            primary_data_event(ServerKind::Http, SocketKind::Tcp),
            ServerEvent::Request
        );
        assert_eq!(
            primary_data_event(ServerKind::WebSocket, SocketKind::Tcp),
            ServerEvent::Message
        );
        assert_eq!(
            primary_data_event(ServerKind::Base, SocketKind::Tcp),
            ServerEvent::Receive
        );
        assert_eq!(
            primary_data_event(ServerKind::Http, SocketKind::Udp),
            ServerEvent::Packet
        );
    }

    #[test]
    fn secondary_data_event_follows_transport() {
        assert_eq!(secondary_data_event(SocketKind::Tcp), ServerEvent::Receive);
        assert_eq!(secondary_data_event(SocketKind::Udp6), ServerEvent::Packet);
    }

    #[tokio::test]
    async fn settings_adjust_listener_options() {
        let listener = TokioListener::bind("127.0.0.1", 0, SocketKind::Tcp, ServerEvent::Receive)
            .await
            .expect("ephemeral bind");

        let mut settings = Settings::new();
        settings.insert("max_connections".to_string(), 64i64.into());
        settings.insert("open_tcp_nodelay".to_string(), true.into());
        settings.insert("recv_buffer_size".to_string(), 1024i64.into());
        settings.insert("mystery_option".to_string(), "ignored".into());
        listener.apply_settings(&settings);

        assert_eq!(listener.connection_options(), (64, true));
        assert_eq!(listener.recv_buffer_size(), 1024);
    }

    #[tokio::test]
    async fn settings_with_bad_values_keep_defaults() {
        let listener = TokioListener::bind("127.0.0.1", 0, SocketKind::Tcp, ServerEvent::Receive)
            .await
            .expect("ephemeral bind");

        let mut settings = Settings::new();
        settings.insert("max_connections".to_string(), (-3i64).into());
        listener.apply_settings(&settings);

        assert_eq!(listener.connection_options(), (10_000, false));
    }

    #[tokio::test]
    async fn family_mismatch_is_rejected() {
        let err = TokioListener::bind("127.0.0.1", 0, SocketKind::Tcp6, ServerEvent::Receive)
            .await
            .err()
            .expect("IPv6 socket accepted an IPv4 host");
        assert!(matches!(err, EngineError::Address { .. }));
    }

    #[tokio::test]
    async fn secondary_port_conflict_is_a_bind_error() {
        let engine = TokioEngine::new();
        let mut main = engine
            .create_listener(ListenerSpec {
                kind: ServerKind::Http,
                host: "127.0.0.1".to_string(),
                port: 0,
                mode: RunMode::SingleProcess,
                socket: SocketKind::Tcp,
            })
            .await
            .expect("primary bind");

        let taken = main.handle().local_addr().expect("tcp has an address").port();
        let err = main
            .add_listener("127.0.0.1", taken, SocketKind::Tcp)
            .await
            .err()
            .expect("conflicting bind succeeded");
        assert!(matches!(err, EngineError::Bind { .. }));
    }

    #[tokio::test]
    async fn rebinding_an_event_replaces_the_callback() {
        let listener = TokioListener::bind("127.0.0.1", 0, SocketKind::Tcp, ServerEvent::Receive)
            .await
            .expect("ephemeral bind");

        let hits = Arc::new(AtomicUsize::new(0));
        let first = Arc::clone(&hits);
        listener.bind_event(
            ServerEvent::Receive,
            EventCallback::new(move |_| {
                let hits = Arc::clone(&first);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                }
            }),
        );
        let second = Arc::clone(&hits);
        listener.bind_event(
            ServerEvent::Receive,
            EventCallback::new(move |_| {
                let hits = Arc::clone(&second);
                async move {
                    hits.fetch_add(100, Ordering::SeqCst);
                }
            }),
        );

        listener
            .dispatch(ServerEvent::Receive, EventContext::default())
            .await;
        assert_eq!(hits.load(Ordering::SeqCst), 100);
    }
}
