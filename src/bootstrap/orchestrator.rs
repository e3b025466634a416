//! Bootstrap orchestration.
//!
//! # Responsibilities
//! - Drive the two-phase startup: wire every server, then hand control to
//!   the engine
//! - Create the primary listener and attach secondary ports to it
//! - Merge callback and setting layers per server
//! - Emit lifecycle notifications in their contractual order
//!
//! # Design Decisions
//! - Bootstrap is strictly sequential; servers are wired one at a time in
//!   the order produced by the orderer
//! - All bootstrap state (registry, dedup map, emitted flag) is owned by
//!   the orchestrator instance, never process-global
//! - Failures abort immediately with no rollback of listeners already
//!   created; process exit is the recovery mechanism

use std::sync::Arc;

use crate::bootstrap::binder::{CallbackBinder, CallbackCollision};
use crate::bootstrap::orderer::order_servers;
use crate::bootstrap::registry::ServerRegistry;
use crate::config::schema::{CallbackMap, HandlerRef, RunMode, ServerCollection};
use crate::config::{layer_callbacks, layer_settings, validate, ConfigError};
use crate::engine::{format_address, ListenerControl, ListenerSpec, MainServer, ServerEngine};
use crate::error::ServerError;
use crate::event::BEFORE_START;
use crate::handler::{EventCallback, EventContext, HandlerContainer};
use crate::lifecycle::{LifecycleEvent, LifecycleNotifier};

/// Drives server bootstrap against an engine, a handler container and a
/// lifecycle notifier.
///
/// One orchestrator performs one bootstrap run: `initialize` wires every
/// configured server, `start` hands control to the engine and blocks until
/// shutdown.
pub struct ServerOrchestrator {
    engine: Arc<dyn ServerEngine>,
    container: Arc<HandlerContainer>,
    notifier: Arc<dyn LifecycleNotifier>,
    main: Option<Box<dyn MainServer>>,
    config: Option<Arc<ServerCollection>>,
    registry: ServerRegistry,
    main_start_emitted: bool,
    collisions: Vec<CallbackCollision>,
}

impl ServerOrchestrator {
    pub fn new(
        engine: Arc<dyn ServerEngine>,
        container: Arc<HandlerContainer>,
        notifier: Arc<dyn LifecycleNotifier>,
    ) -> Self {
        Self {
            engine,
            container,
            notifier,
            main: None,
            config: None,
            registry: ServerRegistry::default(),
            main_start_emitted: false,
            collisions: Vec::new(),
        }
    }

    /// Wire every configured server: order them, create the primary
    /// listener, attach the rest as secondary ports, bind callbacks, apply
    /// settings and emit lifecycle notifications.
    ///
    /// The engine is not running yet when this returns; call [`start`] to
    /// hand over control.
    ///
    /// [`start`]: ServerOrchestrator::start
    pub async fn initialize(&mut self, config: ServerCollection) -> Result<(), ServerError> {
        if self.config.is_some() {
            return Err(ServerError::AlreadyInitialized);
        }
        validate(&config)
            .map_err(|errors| ServerError::Configuration(ConfigError::Validation(errors)))?;

        let config = Arc::new(config);
        self.config = Some(Arc::clone(&config));

        let ordered = order_servers(&config.servers);
        let defaults = default_callbacks(config.mode);
        let mut binder = CallbackBinder::new(Arc::clone(&self.container));

        for definition in &ordered {
            let creating_primary = self.main.is_none();
            let merged_callbacks: CallbackMap;
            let listener: Arc<dyn ListenerControl>;
            let hook_callbacks: &CallbackMap;

            if creating_primary {
                let spec = ListenerSpec {
                    kind: definition.kind,
                    host: definition.host.clone(),
                    port: definition.port,
                    mode: config.mode,
                    socket: definition.socket,
                };
                let address = spec.address();
                tracing::info!(
                    server = %definition.name,
                    kind = %definition.kind,
                    address = %address,
                    "Creating primary listener"
                );
                let main = self.engine.create_listener(spec).await.map_err(|source| {
                    ServerError::ListenerCreation {
                        server: definition.name.clone(),
                        address,
                        source,
                    }
                })?;
                listener = main.handle();
                self.main = Some(main);

                merged_callbacks = layer_callbacks(
                    &layer_callbacks(&defaults, &config.callbacks),
                    &definition.callbacks,
                );
                binder.bind(&listener, &merged_callbacks, &definition.name)?;

                let merged_settings = layer_settings(&config.settings, &definition.settings);
                listener.apply_settings(&merged_settings);

                hook_callbacks = &merged_callbacks;
            } else {
                let mut main = match self.main.take() {
                    Some(main) => main,
                    None => return Err(ServerError::Uninitialized),
                };
                let address = format_address(&definition.host, definition.port, definition.socket);
                tracing::info!(
                    server = %definition.name,
                    kind = %definition.kind,
                    address = %address,
                    "Attaching secondary listener"
                );
                let attached = main
                    .add_listener(&definition.host, definition.port, definition.socket)
                    .await;
                self.main = Some(main);
                listener = attached.map_err(|source| ServerError::ListenerCreation {
                    server: definition.name.clone(),
                    address,
                    source,
                })?;

                // Secondary ports are self-describing: globals are not
                // inherited and nothing is applied when they carry no
                // settings of their own.
                if !definition.settings.is_empty() {
                    listener.apply_settings(&definition.settings);
                }
                binder.bind(&listener, &definition.callbacks, &definition.name)?;

                hook_callbacks = &definition.callbacks;
            }

            self.registry
                .insert(&definition.name, definition.kind, Arc::clone(&listener));

            if creating_primary && !self.main_start_emitted {
                self.main_start_emitted = true;
                self.notifier.notify(LifecycleEvent::BeforeMainServerStart {
                    server: Arc::clone(&listener),
                    config: Arc::clone(&config),
                });
            }

            self.run_before_start(hook_callbacks, &definition.name).await?;

            self.notifier.notify(LifecycleEvent::BeforeServerStart {
                server: definition.name.clone(),
            });
            tracing::info!(server = %definition.name, "Server wired");
        }

        self.collisions = binder.into_collisions();
        Ok(())
    }

    /// Hand control to the engine. Blocks until shutdown.
    pub async fn start(&mut self) -> Result<(), ServerError> {
        let main = self.main.take().ok_or(ServerError::Uninitialized)?;
        tracing::info!(servers = self.registry.len(), "Bootstrap complete, starting engine");
        main.serve().await?;
        Ok(())
    }

    /// Control handle of the primary listener, once one exists.
    pub fn primary_handle(&self) -> Option<Arc<dyn ListenerControl>> {
        self.main.as_ref().map(|main| main.handle())
    }

    /// The initialized main server, until `start` consumes it.
    pub fn main_server(&self) -> Option<&dyn MainServer> {
        self.main.as_deref()
    }

    /// Name-to-listener registry built during `initialize`.
    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    /// Callback collisions observed during `initialize`.
    pub fn collisions(&self) -> &[CallbackCollision] {
        &self.collisions
    }

    /// The configuration snapshot accepted by `initialize`.
    pub fn config(&self) -> Option<&ServerCollection> {
        self.config.as_deref()
    }

    /// Run the definition's synchronous before-start hook, if configured.
    ///
    /// Symbolic hooks whose handler type is absent from the container are
    /// skipped silently; a registered handler lacking the named method is
    /// fatal.
    async fn run_before_start(
        &self,
        callbacks: &CallbackMap,
        server_name: &str,
    ) -> Result<(), ServerError> {
        let Some(handler_ref) = callbacks.get(BEFORE_START) else {
            return Ok(());
        };

        let callback = match handler_ref {
            HandlerRef::Direct(callback) => callback.clone(),
            HandlerRef::Symbolic { handler, method } => {
                if !self.container.contains(handler) {
                    tracing::debug!(
                        server = %server_name,
                        handler = %handler,
                        "Skipping before_start hook, handler not registered"
                    );
                    return Ok(());
                }
                let instance = self.container.resolve(handler).map_err(|_| {
                    ServerError::HandlerResolution {
                        server: server_name.to_string(),
                        handler: handler.clone(),
                        method: method.clone(),
                    }
                })?;
                Arc::clone(&instance).resolve_method(method).ok_or_else(|| {
                    tracing::error!(
                        server = %server_name,
                        handler = %handler,
                        method = %method,
                        "before_start hook has no such method"
                    );
                    ServerError::HandlerResolution {
                        server: server_name.to_string(),
                        handler: handler.clone(),
                        method: method.clone(),
                    }
                })?
            }
        };

        tracing::debug!(server = %server_name, "Running before_start hook");
        callback.invoke(EventContext::default()).await;
        Ok(())
    }
}

/// Callbacks every primary listener gets unless configuration overrides
/// them. Base mode has no separate start phase, so its set omits `start`.
fn default_callbacks(mode: RunMode) -> CallbackMap {
    let mut callbacks = CallbackMap::new();
    callbacks.insert(
        "manager_start".to_string(),
        HandlerRef::direct(EventCallback::new(|_ctx| async {
            tracing::info!("Manager started");
        })),
    );
    callbacks.insert(
        "worker_start".to_string(),
        HandlerRef::direct(EventCallback::new(|ctx: EventContext| async move {
            tracing::info!(worker_id = ?ctx.worker_id, "Worker started");
        })),
    );
    callbacks.insert(
        "worker_stop".to_string(),
        HandlerRef::direct(EventCallback::new(|ctx: EventContext| async move {
            tracing::info!(worker_id = ?ctx.worker_id, "Worker stopped");
        })),
    );
    callbacks.insert(
        "worker_exit".to_string(),
        HandlerRef::direct(EventCallback::new(|ctx: EventContext| async move {
            tracing::debug!(worker_id = ?ctx.worker_id, "Worker exiting");
        })),
    );
    if mode != RunMode::Base {
        callbacks.insert(
            "start".to_string(),
            HandlerRef::direct(EventCallback::new(|_ctx| async {
                tracing::info!("Server started");
            })),
        );
    }
    callbacks
}
