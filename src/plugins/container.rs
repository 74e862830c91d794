//! Plugin container - owns one plugin's subscriptions and lifecycle

use futures::FutureExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, RwLock as AsyncRwLock};
use tracing::{debug, info, warn};

use super::context::PluginContext;
use super::trait_def::{Plugin, PluginDescriptor, PluginSummary};
use crate::application::errors::PluginError;
use crate::domain::entities::{Event, EventKind};
use crate::domain::traits::{EventHandler, Gateway, SubscriptionId};

/// Lifecycle of a container
///
/// ```text
/// new() ──► Created ──register()──► Registering ──► Registered
///                                               └─► Failed
/// destroy() from any state ──► Destroyed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Registering,
    Registered,
    Failed,
    Destroyed,
}

pub struct PluginContainer {
    plugin: Arc<dyn Plugin>,
    gateway: Arc<dyn Gateway>,
    context: Arc<PluginContext>,
    subscriptions: Mutex<HashMap<EventKind, SubscriptionId>>,
    lifecycle: AsyncMutex<ContainerState>,
    /// Handlers hold a read guard while relaying; destroy closes it under the write guard
    open: Arc<AsyncRwLock<bool>>,
}

impl PluginContainer {
    pub fn new(plugin: Arc<dyn Plugin>, gateway: Arc<dyn Gateway>, context: PluginContext) -> Self {
        Self {
            plugin,
            gateway,
            context: Arc::new(context),
            subscriptions: Mutex::new(HashMap::new()),
            lifecycle: AsyncMutex::new(ContainerState::Created),
            open: Arc::new(AsyncRwLock::new(true)),
        }
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        self.plugin.descriptor()
    }

    pub fn name(&self) -> &str {
        &self.descriptor().name
    }

    pub fn summary(&self) -> PluginSummary {
        self.descriptor().summary()
    }

    pub fn context(&self) -> &Arc<PluginContext> {
        &self.context
    }

    pub async fn state(&self) -> ContainerState {
        *self.lifecycle.lock().await
    }

    /// Event kinds with a live subscription
    pub fn subscribed_events(&self) -> Vec<EventKind> {
        self.subscriptions
            .lock()
            .map(|s| s.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Run the plugin's register hook, then subscribe its declared events
    pub async fn register(&self) -> Result<(), PluginError> {
        let mut state = self.lifecycle.lock().await;
        match *state {
            ContainerState::Created | ContainerState::Failed => {}
            ContainerState::Registered => return Ok(()),
            other => {
                return Err(PluginError::RegistrationFailed {
                    plugin: self.name().to_string(),
                    reason: format!("container is {:?}", other),
                })
            }
        }
        *state = ContainerState::Registering;

        if let Err(e) = self.plugin.register(&self.context).await {
            *state = ContainerState::Failed;
            return Err(PluginError::RegistrationFailed {
                plugin: self.name().to_string(),
                reason: e.to_string(),
            });
        }

        self.listen_events()?;
        *state = ContainerState::Registered;
        info!(plugin = %self.name(), version = %self.descriptor().version, "Plugin registered");
        Ok(())
    }

    /// Stop relaying, drop every subscription, then run the plugin's destroy
    /// hook. A handler already running finishes first; queued events are
    /// never delivered. A second call does nothing.
    pub async fn destroy(&self) -> Result<(), PluginError> {
        let mut state = self.lifecycle.lock().await;
        if *state == ContainerState::Destroyed {
            return Ok(());
        }
        *self.open.write().await = false;

        let subscriptions = {
            let mut subscriptions = self
                .subscriptions
                .lock()
                .map_err(|_| PluginError::Internal("Lock poisoned".to_string()))?;
            std::mem::take(&mut *subscriptions)
        };
        for (kind, id) in subscriptions {
            if !self.gateway.unsubscribe(kind, id) {
                debug!(plugin = %self.name(), event = %kind, "Subscription was already removed");
            }
        }

        *state = ContainerState::Destroyed;
        let result = self.plugin.destroy(&self.context).await;
        info!(plugin = %self.name(), "Plugin destroyed");
        result
    }

    fn listen_events(&self) -> Result<(), PluginError> {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .map_err(|_| PluginError::Internal("Lock poisoned".to_string()))?;

        for &kind in &self.descriptor().events {
            if subscriptions.contains_key(&kind) {
                warn!(plugin = %self.name(), event = %kind, "Event already subscribed");
                continue;
            }
            let id = self.gateway.subscribe(kind, self.handler());
            subscriptions.insert(kind, id);
        }
        Ok(())
    }

    /// Handler forwarding gateway events to the plugin, context first
    fn handler(&self) -> EventHandler {
        let plugin = self.plugin.clone();
        let context = self.context.clone();
        let open = self.open.clone();
        Arc::new(move |event: Event| {
            let plugin = plugin.clone();
            let context = context.clone();
            let open = open.clone();
            async move {
                let open = open.read().await;
                if *open {
                    relay(plugin.as_ref(), &context, event).await;
                }
            }
            .boxed()
        })
    }
}

async fn relay(plugin: &dyn Plugin, ctx: &PluginContext, event: Event) {
    match event {
        Event::Ready => plugin.on_ready(ctx).await,
        Event::Message(message) => plugin.on_message(ctx, &message).await,
        Event::Disconnect { reason } => plugin.on_disconnect(ctx, &reason).await,
        Event::Error { message } => plugin.on_error(ctx, &message).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Message, User};
    use crate::infrastructure::adapters::ConsoleAdapter;
    use crate::infrastructure::storage::MemoryCollection;
    use crate::plugins::context::ClientHandle;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Weak;
    use std::time::Duration;

    struct Recorder {
        descriptor: PluginDescriptor,
        fail_register: bool,
        destroyed: AtomicUsize,
    }

    impl Recorder {
        fn new(events: &[EventKind], fail_register: bool) -> Arc<Self> {
            let descriptor = events
                .iter()
                .fold(PluginDescriptor::new("recorder", "1.0.0"), |d, &k| d.observes(k));
            Arc::new(Self {
                descriptor,
                fail_register,
                destroyed: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Plugin for Recorder {
        fn descriptor(&self) -> &PluginDescriptor {
            &self.descriptor
        }

        async fn register(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
            if self.fail_register {
                return Err(PluginError::Internal("boom".to_string()));
            }
            Ok(())
        }

        async fn destroy(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn on_message(&self, ctx: &PluginContext, message: &Message) {
            let _ = ctx.client().send(&message.channel_id, &message.content).await;
        }
    }

    /// Slow message handler noting anything handled after its destroy hook
    struct Sluggish {
        descriptor: PluginDescriptor,
        destroyed: AtomicBool,
        handled: AtomicUsize,
        late: AtomicUsize,
    }

    #[async_trait]
    impl Plugin for Sluggish {
        fn descriptor(&self) -> &PluginDescriptor {
            &self.descriptor
        }

        async fn destroy(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
            self.destroyed.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn on_message(&self, _ctx: &PluginContext, _message: &Message) {
            tokio::time::sleep(Duration::from_millis(40)).await;
            self.handled.fetch_add(1, Ordering::SeqCst);
            if self.destroyed.load(Ordering::SeqCst) {
                self.late.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn container(plugin: Arc<dyn Plugin>, gateway: Arc<ConsoleAdapter>) -> PluginContainer {
        let context = PluginContext::new(
            Weak::new(),
            ClientHandle::new(gateway.clone()),
            Arc::new(MemoryCollection::new()),
            None,
        );
        PluginContainer::new(plugin, gateway, context)
    }

    #[tokio::test]
    async fn test_register_subscribes_declared_events() {
        let gateway = Arc::new(ConsoleAdapter::new());
        let recorder = Recorder::new(&[EventKind::Message, EventKind::Ready], false);
        let container = container(recorder, gateway.clone());

        container.register().await.unwrap();

        let mut events = container.subscribed_events();
        events.sort_by_key(|k| k.as_str());
        assert_eq!(events, vec![EventKind::Message, EventKind::Ready]);
        assert_eq!(gateway.subscriber_count(EventKind::Message), 1);
        assert_eq!(container.state().await, ContainerState::Registered);

        // registering again does not double-subscribe
        container.register().await.unwrap();
        assert_eq!(gateway.subscriber_count(EventKind::Message), 1);
    }

    #[tokio::test]
    async fn test_no_events_no_subscriptions() {
        let gateway = Arc::new(ConsoleAdapter::new());
        let container = container(Recorder::new(&[], false), gateway.clone());

        container.register().await.unwrap();
        assert!(container.subscribed_events().is_empty());
        assert_eq!(gateway.subscriber_count(EventKind::Message), 0);
    }

    #[tokio::test]
    async fn test_failed_hook_creates_no_subscriptions() {
        let gateway = Arc::new(ConsoleAdapter::new());
        let container = container(Recorder::new(&[EventKind::Message], true), gateway.clone());

        let err = container.register().await.unwrap_err();
        assert!(matches!(err, PluginError::RegistrationFailed { ref plugin, .. } if plugin == "recorder"));
        assert!(container.subscribed_events().is_empty());
        assert_eq!(gateway.subscriber_count(EventKind::Message), 0);
        assert_eq!(container.state().await, ContainerState::Failed);
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let gateway = Arc::new(ConsoleAdapter::new());
        let recorder = Recorder::new(&[EventKind::Message], false);
        let container = container(recorder.clone(), gateway.clone());
        container.register().await.unwrap();

        container.destroy().await.unwrap();
        container.destroy().await.unwrap();

        assert_eq!(recorder.destroyed.load(Ordering::SeqCst), 1);
        assert!(container.subscribed_events().is_empty());
        assert_eq!(gateway.subscriber_count(EventKind::Message), 0);
        assert_eq!(container.state().await, ContainerState::Destroyed);
    }

    #[tokio::test]
    async fn test_destroy_tolerates_removed_subscription() {
        let gateway = Arc::new(ConsoleAdapter::new());
        let container = container(Recorder::new(&[EventKind::Message], false), gateway.clone());
        container.register().await.unwrap();

        let id = *container.subscriptions.lock().unwrap().get(&EventKind::Message).unwrap();
        assert!(gateway.unsubscribe(EventKind::Message, id));

        container.destroy().await.unwrap();
        assert!(container.subscribed_events().is_empty());
    }

    #[tokio::test]
    async fn test_events_are_forwarded_with_context() {
        let gateway = Arc::new(ConsoleAdapter::new());
        let container = container(Recorder::new(&[EventKind::Message], false), gateway.clone());
        container.register().await.unwrap();
        gateway.connect("token").await.unwrap();

        gateway.inject(Message::new("c1", User::new("u1"), "echo me"));
        assert!(gateway.wait_for_outbox(1, Duration::from_secs(2)).await);
        assert_eq!(gateway.outbox()[0].text(), Some("echo me"));

        container.destroy().await.unwrap();
        assert_eq!(gateway.inject(Message::new("c1", User::new("u1"), "again")), 0);
    }

    #[tokio::test]
    async fn test_nothing_is_handled_after_destroy() {
        let gateway = Arc::new(ConsoleAdapter::new());
        let plugin = Arc::new(Sluggish {
            descriptor: PluginDescriptor::new("sluggish", "1.0.0").observes(EventKind::Message),
            destroyed: AtomicBool::new(false),
            handled: AtomicUsize::new(0),
            late: AtomicUsize::new(0),
        });
        let container = container(plugin.clone(), gateway.clone());
        container.register().await.unwrap();
        gateway.connect("token").await.unwrap();

        for text in ["m1", "m2", "m3"] {
            gateway.inject(Message::new("c1", User::new("u1"), text));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        container.destroy().await.unwrap();
        // the message in flight when destroy began has been handled by now
        assert_eq!(plugin.handled.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(plugin.handled.load(Ordering::SeqCst), 1);
        assert_eq!(plugin.late.load(Ordering::SeqCst), 0);
    }
}
