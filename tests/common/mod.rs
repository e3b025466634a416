//! Shared mocks for bootstrap integration tests.
//!
//! The mock engine records every listener it creates and can be told to
//! refuse specific addresses. A shared journal collects creation,
//! notification and handler activity in one ordered log so tests can
//! assert cross-component ordering.

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use multiserve::config::Settings;
use multiserve::engine::EngineError;
use multiserve::{
    EventCallback, EventHandler, HandlerContainer, LifecycleEvent, LifecycleNotifier,
    ListenerControl, ListenerSpec, MainServer, MiddlewareInitializer, ServerEngine, ServerEvent,
    ServerNameAware, ServerOrchestrator, SocketKind,
};

/// Ordered log shared by mocks and handlers.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn new_journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn record(journal: &Journal, entry: impl Into<String>) {
    journal.lock().unwrap().push(entry.into());
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

/// Index of the first journal entry equal to `entry`, panicking when absent.
pub fn position(journal: &Journal, entry: &str) -> usize {
    entries(journal)
        .iter()
        .position(|e| e == entry)
        .unwrap_or_else(|| panic!("journal has no entry '{entry}': {:?}", entries(journal)))
}

/// Listener that records bindings and applied settings instead of serving.
pub struct MockListener {
    address: String,
    callbacks: Mutex<BTreeMap<String, EventCallback>>,
    applied: Mutex<Vec<Settings>>,
}

impl MockListener {
    fn new(address: String) -> Self {
        Self {
            address,
            callbacks: Mutex::new(BTreeMap::new()),
            applied: Mutex::new(Vec::new()),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Event names with a bound callback, in name order.
    pub fn bound_events(&self) -> Vec<String> {
        self.callbacks.lock().unwrap().keys().cloned().collect()
    }

    /// The callback currently bound for `event`, if any.
    pub fn callback(&self, event: &str) -> Option<EventCallback> {
        self.callbacks.lock().unwrap().get(event).cloned()
    }

    pub fn applied_settings(&self) -> Vec<Settings> {
        self.applied.lock().unwrap().clone()
    }

    pub fn apply_count(&self) -> usize {
        self.applied.lock().unwrap().len()
    }
}

impl ListenerControl for MockListener {
    fn bind_event(&self, event: ServerEvent, callback: EventCallback) {
        self.callbacks
            .lock()
            .unwrap()
            .insert(event.name().to_string(), callback);
    }

    fn apply_settings(&self, settings: &Settings) {
        self.applied.lock().unwrap().push(settings.clone());
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

struct MockEngineState {
    journal: Journal,
    refuse: Mutex<HashSet<String>>,
    listeners: Mutex<Vec<Arc<MockListener>>>,
    specs: Mutex<Vec<ListenerSpec>>,
}

impl MockEngineState {
    fn make_listener(&self, address: String) -> Result<Arc<MockListener>, EngineError> {
        if self.refuse.lock().unwrap().contains(&address) {
            return Err(EngineError::Bind {
                address,
                source: io::Error::new(io::ErrorKind::AddrInUse, "address already bound"),
            });
        }
        let listener = Arc::new(MockListener::new(address));
        self.listeners.lock().unwrap().push(Arc::clone(&listener));
        Ok(listener)
    }
}

/// Engine double: hands out [`MockListener`]s and never touches a socket.
pub struct MockEngine {
    state: Arc<MockEngineState>,
}

impl MockEngine {
    pub fn new(journal: Journal) -> Self {
        Self {
            state: Arc::new(MockEngineState {
                journal,
                refuse: Mutex::new(HashSet::new()),
                listeners: Mutex::new(Vec::new()),
                specs: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Make future creation of `address` (as `host:port`) fail.
    pub fn refuse(&self, address: &str) {
        self.state.refuse.lock().unwrap().insert(address.to_string());
    }

    /// Every listener created so far, primary first.
    pub fn listeners(&self) -> Vec<Arc<MockListener>> {
        self.state.listeners.lock().unwrap().clone()
    }

    pub fn listener(&self, address: &str) -> Option<Arc<MockListener>> {
        self.listeners()
            .into_iter()
            .find(|listener| listener.address() == address)
    }

    /// Specs passed to `create_listener`, one per primary creation.
    pub fn specs(&self) -> Vec<ListenerSpec> {
        self.state.specs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServerEngine for MockEngine {
    async fn create_listener(
        &self,
        spec: ListenerSpec,
    ) -> Result<Box<dyn MainServer>, EngineError> {
        let address = spec.address();
        self.state.specs.lock().unwrap().push(spec);
        let primary = self.state.make_listener(address.clone())?;
        record(&self.state.journal, format!("create:{address}"));
        Ok(Box::new(MockMainServer {
            primary,
            state: Arc::clone(&self.state),
        }))
    }
}

pub struct MockMainServer {
    primary: Arc<MockListener>,
    state: Arc<MockEngineState>,
}

#[async_trait]
impl MainServer for MockMainServer {
    fn handle(&self) -> Arc<dyn ListenerControl> {
        Arc::clone(&self.primary) as Arc<dyn ListenerControl>
    }

    async fn add_listener(
        &mut self,
        host: &str,
        port: u16,
        _socket: SocketKind,
    ) -> Result<Arc<dyn ListenerControl>, EngineError> {
        let address = format!("{host}:{port}");
        let listener = self.state.make_listener(address.clone())?;
        record(&self.state.journal, format!("attach:{address}"));
        Ok(listener as Arc<dyn ListenerControl>)
    }

    async fn serve(self: Box<Self>) -> Result<(), EngineError> {
        record(&self.state.journal, "serve");
        Ok(())
    }
}

/// Notifier that journals every lifecycle event it sees.
pub struct RecordingNotifier {
    journal: Journal,
    events: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl LifecycleNotifier for RecordingNotifier {
    fn notify(&self, event: LifecycleEvent) {
        let entry = match &event {
            LifecycleEvent::BeforeMainServerStart { .. } => {
                "notify:before_main_server_start".to_string()
            }
            LifecycleEvent::BeforeServerStart { server } => {
                format!("notify:before_server_start:{server}")
            }
        };
        record(&self.journal, &entry);
        self.events.lock().unwrap().push(entry);
    }
}

const TRACKED_METHODS: &[&str] = &[
    "on_request",
    "on_receive",
    "on_connect",
    "on_message",
    "on_worker_start",
    "warm_up",
];

/// Handler whose methods journal their invocations.
pub struct TrackingHandler {
    label: String,
    journal: Journal,
    server_names: Mutex<Vec<String>>,
    middleware_inits: Mutex<Vec<String>>,
    calls: Mutex<Vec<String>>,
}

impl TrackingHandler {
    pub fn new(label: &str, journal: Journal) -> Self {
        Self {
            label: label.to_string(),
            journal,
            server_names: Mutex::new(Vec::new()),
            middleware_inits: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Server names passed via the name-aware capability, in order.
    pub fn server_names(&self) -> Vec<String> {
        self.server_names.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn middleware_inits(&self) -> Vec<String> {
        self.middleware_inits.lock().unwrap().clone()
    }

    /// Methods actually invoked (not merely resolved), in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl EventHandler for TrackingHandler {
    fn resolve_method(self: Arc<Self>, method: &str) -> Option<EventCallback> {
        if !TRACKED_METHODS.contains(&method) {
            return None;
        }
        let this = Arc::clone(&self);
        let method = method.to_string();
        Some(EventCallback::new(move |_ctx| {
            let this = Arc::clone(&this);
            let method = method.clone();
            async move {
                record(&this.journal, format!("call:{}:{}", this.label, method));
                this.calls.lock().unwrap().push(method);
            }
        }))
    }

    fn server_name_aware(&self) -> Option<&dyn ServerNameAware> {
        Some(self)
    }

    fn middleware_initializer(&self) -> Option<&dyn MiddlewareInitializer> {
        Some(self)
    }
}

impl ServerNameAware for TrackingHandler {
    fn set_server_name(&self, name: &str) {
        record(&self.journal, format!("name:{}:{name}", self.label));
        self.server_names.lock().unwrap().push(name.to_string());
    }
}

impl MiddlewareInitializer for TrackingHandler {
    fn init_core_middleware(&self, server_name: &str) {
        record(&self.journal, format!("middleware:{}:{server_name}", self.label));
        self.middleware_inits
            .lock()
            .unwrap()
            .push(server_name.to_string());
    }
}

/// Register a tracking handler in the container and keep a test-side handle.
pub fn register_tracking(
    container: &HandlerContainer,
    name: &str,
    journal: &Journal,
) -> Arc<TrackingHandler> {
    let handler = Arc::new(TrackingHandler::new(name, journal.clone()));
    container.register_instance(name, Arc::clone(&handler) as Arc<dyn EventHandler>);
    handler
}

/// Everything a bootstrap test needs, wired together.
pub struct TestHarness {
    pub journal: Journal,
    pub engine: Arc<MockEngine>,
    pub container: Arc<HandlerContainer>,
    pub notifier: Arc<RecordingNotifier>,
    pub orchestrator: ServerOrchestrator,
}

pub fn harness() -> TestHarness {
    let journal = new_journal();
    let engine = Arc::new(MockEngine::new(journal.clone()));
    let container = Arc::new(HandlerContainer::new());
    let notifier = Arc::new(RecordingNotifier::new(journal.clone()));
    let orchestrator = ServerOrchestrator::new(
        Arc::clone(&engine) as Arc<dyn ServerEngine>,
        Arc::clone(&container),
        Arc::clone(&notifier) as Arc<dyn LifecycleNotifier>,
    );
    TestHarness {
        journal,
        engine,
        container,
        notifier,
        orchestrator,
    }
}
