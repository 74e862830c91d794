//! Runtime server - owns the gateway connection and the plugin containers

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::errors::{PluginError, RuntimeError};
use crate::domain::entities::{Event, EventKind, Message};
use crate::domain::traits::{EventHandler, Gateway, Presence, ResourceProvisioner, SubscriptionId};
use crate::infrastructure::config::{ConfigSource, PluginEntry, RuntimeConfig, DEFAULT_ADMIN_ROLE};
use crate::infrastructure::plugins::PluginRegistry;
use crate::plugins::context::ClientHandle;
use crate::plugins::{PluginContainer, PluginContext, PluginSummary};

/// Named function callable through [`RuntimeServer::call_method`]
pub type RuntimeMethod =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, RuntimeError>> + Send + Sync>;

/// Lifecycle of the runtime
///
/// ```text
/// Unconfigured ──setup()──► Configuring ──► AwaitingRegistrations ──start()──► Connected
///      ▲                                                                  │   ▲
///      │                                                       disconnect │   │ reconnect
///      │                                                                  ▼   │
///      └──────────────── ShuttingDown ◄──quit()───────────────────── Disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Unconfigured,
    Configuring,
    AwaitingRegistrations,
    Connected,
    Disconnected,
    ShuttingDown,
}

type Registration = JoinHandle<Result<(), PluginError>>;

/// How long `reboot` waits for the gateway's ready event
pub const READY_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RuntimeServer {
    me: Weak<RuntimeServer>,
    gateway: Arc<dyn Gateway>,
    provisioner: Arc<dyn ResourceProvisioner>,
    registry: PluginRegistry,
    config_source: Arc<dyn ConfigSource>,
    config: RwLock<Option<RuntimeConfig>>,
    containers: RwLock<Vec<Arc<PluginContainer>>>,
    registrations: Mutex<Vec<Registration>>,
    listeners: Mutex<Vec<(EventKind, SubscriptionId)>>,
    methods: RwLock<HashMap<String, RuntimeMethod>>,
    started: AtomicBool,
    state: RwLock<RuntimeState>,
    lifecycle: AsyncMutex<()>,
    ready: watch::Sender<bool>,
}

impl RuntimeServer {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        provisioner: Arc<dyn ResourceProvisioner>,
        registry: PluginRegistry,
        config_source: Arc<dyn ConfigSource>,
    ) -> Arc<Self> {
        let (ready, _) = watch::channel(false);
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            gateway,
            provisioner,
            registry,
            config_source,
            config: RwLock::new(None),
            containers: RwLock::new(Vec::new()),
            registrations: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            methods: RwLock::new(HashMap::new()),
            started: AtomicBool::new(false),
            state: RwLock::new(RuntimeState::Unconfigured),
            lifecycle: AsyncMutex::new(()),
            ready,
        })
    }

    pub fn state(&self) -> RuntimeState {
        self.state
            .read()
            .map(|state| *state)
            .unwrap_or(RuntimeState::Unconfigured)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Watch that turns `true` once the gateway reports ready
    pub fn ready(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }

    /// The configuration of the current setup
    pub fn config(&self) -> Option<RuntimeConfig> {
        self.config.read().ok().and_then(|config| config.clone())
    }

    pub fn admin_role(&self) -> String {
        self.config()
            .map(|config| config.admin_role().to_string())
            .unwrap_or_else(|| DEFAULT_ADMIN_ROLE.to_string())
    }

    /// Read the configuration and create one container per loadable plugin.
    /// Registrations start right away; `start()` waits for them.
    pub async fn setup(&self) -> Result<(), RuntimeError> {
        let _guard = self.lifecycle.lock().await;
        self.setup_locked().await
    }

    /// Wait for every registration, then go online. Does nothing when
    /// already started.
    pub async fn start(&self) -> Result<(), RuntimeError> {
        let _guard = self.lifecycle.lock().await;
        self.start_locked().await
    }

    /// Stop delivering events, destroy every plugin and disconnect.
    /// Does nothing when not started.
    pub async fn quit(&self) {
        let _guard = self.lifecycle.lock().await;
        self.quit_locked().await;
    }

    /// Quit, then set up from a freshly read configuration and start again.
    /// Resolves once the new session is ready, or after `READY_TIMEOUT`.
    pub async fn reboot(&self) -> Result<(), RuntimeError> {
        let mut ready = {
            let _guard = self.lifecycle.lock().await;
            info!("Rebooting");
            self.quit_locked().await;
            let ready = self.ready.subscribe();
            self.setup_locked().await?;
            self.start_locked().await?;
            ready
        };

        match tokio::time::timeout(READY_TIMEOUT, ready.wait_for(|ready| *ready)).await {
            Ok(_) => info!("Reboot complete"),
            Err(_) => warn!(timeout_secs = READY_TIMEOUT.as_secs(), "Gateway not ready after reboot"),
        }
        Ok(())
    }

    async fn setup_locked(&self) -> Result<(), RuntimeError> {
        if self.is_started() {
            return Err(RuntimeError::Internal("Runtime is already started".to_string()));
        }
        // a previous setup that never started
        self.teardown_containers().await;

        let config = self
            .config_source
            .load()
            .map_err(|e| RuntimeError::ConfigNotFound {
                source_name: self.config_source.describe(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        self.provisioner.relocate(&config.data_dir());

        self.set_state(RuntimeState::Configuring);
        if let Some(index) = config.plugins.iter().position(|entry| entry.plugin_name().is_none()) {
            self.set_state(RuntimeState::Unconfigured);
            return Err(RuntimeError::MissingPluginName(format!(
                "plugin entry #{} in {}",
                index + 1,
                self.config_source.describe()
            )));
        }

        let mut containers: Vec<Arc<PluginContainer>> = Vec::with_capacity(config.plugins.len());
        for entry in &config.plugins {
            match self.load_plugin(entry, &containers) {
                Ok(container) => containers.push(container),
                Err(e) => warn!(plugin = entry.plugin_name().unwrap_or_default(), error = %e, "Skipping plugin"),
            }
        }
        info!(
            loaded = containers.len(),
            configured = config.plugins.len(),
            source = %self.config_source.describe(),
            "Plugins loaded"
        );

        let registrations: Vec<Registration> = containers
            .iter()
            .map(|container| {
                let container = container.clone();
                tokio::spawn(async move { container.register().await })
            })
            .collect();

        self.replace(&self.config, Some(config))?;
        self.replace(&self.containers, containers)?;
        *self.registrations.lock().map_err(poisoned)? = registrations;
        self.set_state(RuntimeState::AwaitingRegistrations);
        Ok(())
    }

    fn load_plugin(
        &self,
        entry: &PluginEntry,
        loaded: &[Arc<PluginContainer>],
    ) -> Result<Arc<PluginContainer>, PluginError> {
        let plugin = self.registry.resolve(entry)?;
        let name = plugin.descriptor().name.clone();
        if loaded.iter().any(|container| container.name() == name) {
            return Err(PluginError::Load(format!("Plugin '{}' is already loaded", name)));
        }

        let store = self.provisioner.open(&name)?;
        let context = PluginContext::new(
            self.me.clone(),
            ClientHandle::new(self.gateway.clone()),
            store,
            entry.options.clone(),
        );
        debug!(plugin = %name, "Created plugin container");
        Ok(Arc::new(PluginContainer::new(plugin, self.gateway.clone(), context)))
    }

    async fn start_locked(&self) -> Result<(), RuntimeError> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Runtime already started");
            return Ok(());
        }

        if let Err(e) = self.go_online().await {
            error!(error = %e, "Startup failed, tearing down");
            self.release_listeners();
            self.teardown_containers().await;
            self.started.store(false, Ordering::SeqCst);
            self.set_state(RuntimeState::Unconfigured);
            return Err(e);
        }
        Ok(())
    }

    async fn go_online(&self) -> Result<(), RuntimeError> {
        let token = self
            .config()
            .map(|config| config.token().to_string())
            .ok_or_else(|| RuntimeError::Internal("Runtime is not configured".to_string()))?;

        // fail-fast join; siblings that already registered are not rolled back
        let registrations = std::mem::take(&mut *self.registrations.lock().map_err(poisoned)?);
        future::try_join_all(registrations.into_iter().map(settle)).await?;

        self.listen_events();
        self.gateway.connect(&token).await?;
        self.gateway.set_presence(Presence::Online).await?;
        self.set_state(RuntimeState::Connected);
        info!(plugins = self.plugin_list().len(), "Runtime online");
        Ok(())
    }

    async fn quit_locked(&self) {
        if !self.is_started() {
            debug!("Runtime not started, nothing to quit");
            return;
        }
        self.set_state(RuntimeState::ShuttingDown);

        self.release_listeners();
        if let Err(e) = self.gateway.set_presence(Presence::Invisible).await {
            warn!(error = %e, "Failed to set presence");
        }
        self.teardown_containers().await;
        if let Err(e) = self.gateway.disconnect().await {
            warn!(error = %e, "Failed to disconnect");
        }

        self.started.store(false, Ordering::SeqCst);
        self.ready.send_replace(false);
        self.set_state(RuntimeState::Unconfigured);
        info!("Runtime stopped");
    }

    /// Destroy every container, each bounded by the configured timeout
    async fn teardown_containers(&self) {
        let pending = self
            .registrations
            .lock()
            .map(|mut registrations| std::mem::take(&mut *registrations))
            .unwrap_or_default();
        for registration in pending {
            registration.abort();
        }

        let containers = self
            .containers
            .write()
            .map(|mut containers| std::mem::take(&mut *containers))
            .unwrap_or_default();
        if containers.is_empty() {
            return;
        }

        let limit = self
            .config()
            .map(|config| config.destroy_timeout())
            .unwrap_or_else(|| RuntimeConfig::default().destroy_timeout());

        future::join_all(containers.iter().map(|container| async move {
            match tokio::time::timeout(limit, container.destroy()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(plugin = %container.name(), error = %e, "Plugin destroy failed"),
                Err(_) => warn!(
                    plugin = %container.name(),
                    timeout_secs = limit.as_secs(),
                    "Plugin destroy timed out"
                ),
            }
        }))
        .await;
    }

    /// Runtime-level subscriptions, installed once per connection
    fn listen_events(&self) {
        let Ok(mut listeners) = self.listeners.lock() else {
            error!("Listener registry poisoned");
            return;
        };
        if !listeners.is_empty() {
            return;
        }
        for kind in [EventKind::Ready, EventKind::Disconnect, EventKind::Error] {
            let id = self.gateway.subscribe(kind, self.listener());
            listeners.push((kind, id));
        }
    }

    fn release_listeners(&self) {
        let listeners = self
            .listeners
            .lock()
            .map(|mut listeners| std::mem::take(&mut *listeners))
            .unwrap_or_default();
        for (kind, id) in listeners {
            self.gateway.unsubscribe(kind, id);
        }
    }

    fn listener(&self) -> EventHandler {
        let runtime = self.me.clone();
        Arc::new(move |event: Event| {
            let runtime = runtime.clone();
            async move {
                if let Some(runtime) = runtime.upgrade() {
                    runtime.on_event(event).await;
                }
            }
            .boxed()
        })
    }

    async fn on_event(&self, event: Event) {
        match event {
            Event::Ready => self.on_ready().await,
            Event::Disconnect { reason } => {
                warn!(reason = %reason, "Gateway disconnected");
                self.ready.send_replace(false);
                if self.transition(RuntimeState::Connected, RuntimeState::Disconnected) {
                    self.reconnect().await;
                }
            }
            Event::Error { message } => error!(error = %message, "Gateway error"),
            Event::Message(_) => {}
        }
    }

    async fn on_ready(&self) {
        let info = self.gateway.bot_info();
        info!(bot = %info.username, id = %info.id, "Gateway ready");

        if let Some(config) = self.config() {
            if let Some(activity) = config.initial_activity.as_deref() {
                if let Err(e) = self.gateway.set_activity(Some(activity)).await {
                    warn!(error = %e, "Failed to set initial activity");
                }
            }
            if let Some(name) = config.display_name.as_deref() {
                if let Err(e) = self.gateway.set_username(name).await {
                    warn!(error = %e, "Failed to set display name");
                }
            }
        }
        self.ready.send_replace(true);
    }

    async fn reconnect(&self) {
        let _guard = self.lifecycle.lock().await;
        if !self.is_started() || self.state() != RuntimeState::Disconnected {
            return;
        }

        info!("Reconnecting");
        self.started.store(false, Ordering::SeqCst);
        if let Err(e) = self.start_locked().await {
            error!(error = %e, "Reconnect failed");
        }
    }

    /// True when the author holds the configured admin role in the
    /// message's guild. Plugins check this themselves.
    pub fn is_authorized(&self, message: &Message) -> bool {
        let (Some(guild), Some(member)) = (&message.guild, &message.member) else {
            return false;
        };
        let admin_role = self.admin_role();
        let authorized = guild.roles_named(&admin_role).any(|role| member.has_role(&role.id));
        authorized
    }

    pub fn plugin_list(&self) -> Vec<PluginSummary> {
        self.containers
            .read()
            .map(|containers| containers.iter().map(|c| c.summary()).collect())
            .unwrap_or_default()
    }

    pub fn plugin_info(&self, name: &str) -> Result<PluginSummary, PluginError> {
        self.containers
            .read()
            .map_err(|_| PluginError::Internal("Lock poisoned".to_string()))?
            .iter()
            .find(|container| container.name() == name)
            .map(|container| container.summary())
            .ok_or_else(|| PluginError::NotFound(name.to_string()))
    }

    /// Register a named method, replacing any previous one
    pub fn register_method<F>(&self, name: impl Into<String>, method: F)
    where
        F: Fn(Value) -> BoxFuture<'static, Result<Value, RuntimeError>> + Send + Sync + 'static,
    {
        let name = name.into();
        if let Ok(mut methods) = self.methods.write() {
            if methods.insert(name.clone(), Arc::new(method)).is_some() {
                debug!(method = %name, "Replaced runtime method");
            }
        }
    }

    pub async fn call_method(&self, name: &str, args: Value) -> Result<Value, RuntimeError> {
        let method = self
            .methods
            .read()
            .map_err(poisoned)?
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownMethod(name.to_string()))?;
        method(args).await
    }

    pub async fn set_activity(&self, activity: Option<&str>) -> Result<(), RuntimeError> {
        self.gateway.set_activity(activity).await?;
        info!(activity = activity.unwrap_or_default(), "Activity updated");
        Ok(())
    }

    pub async fn set_display_name(&self, name: &str) -> Result<(), RuntimeError> {
        self.gateway.set_username(name).await?;
        info!(name, "Display name updated");
        Ok(())
    }

    pub async fn set_avatar(&self, url: &str) -> Result<(), RuntimeError> {
        self.gateway.set_avatar(url).await?;
        info!(url, "Avatar updated");
        Ok(())
    }

    fn set_state(&self, state: RuntimeState) {
        if let Ok(mut current) = self.state.write() {
            let previous = *current;
            if previous != state {
                debug!(from = ?previous, to = ?state, "Runtime state");
                *current = state;
            }
        }
    }

    /// Move from `from` to `to`, false when the runtime was elsewhere
    fn transition(&self, from: RuntimeState, to: RuntimeState) -> bool {
        match self.state.write() {
            Ok(mut current) if *current == from => {
                debug!(from = ?from, to = ?to, "Runtime state");
                *current = to;
                true
            }
            _ => false,
        }
    }

    fn replace<T>(&self, slot: &RwLock<T>, value: T) -> Result<(), RuntimeError> {
        *slot.write().map_err(poisoned)? = value;
        Ok(())
    }
}

async fn settle(registration: Registration) -> Result<(), PluginError> {
    registration
        .await
        .map_err(|e| PluginError::Internal(format!("Registration task failed: {}", e)))?
}

fn poisoned<E>(_: E) -> RuntimeError {
    RuntimeError::Internal("Lock poisoned".to_string())
}
