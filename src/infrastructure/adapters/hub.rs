//! Subscription bookkeeping shared by gateway adapters
//!
//! Every subscription gets its own channel and task, so a slow handler only
//! delays its own later events while events still reach each handler in
//! emission order. Unsubscribing closes the subscription at once: a handler
//! already running finishes, events still queued for it are dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::domain::entities::{Event, EventKind};
use crate::domain::traits::{EventHandler, SubscriptionId};

struct Subscriber {
    id: SubscriptionId,
    sender: mpsc::UnboundedSender<Event>,
    closed: Arc<AtomicBool>,
}

#[derive(Default)]
pub struct EventHub {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<EventKind, Vec<Subscriber>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Must be called from within a tokio runtime
    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (sender, mut receiver) = mpsc::unbounded_channel::<Event>();
        let closed = Arc::new(AtomicBool::new(false));

        let drained = closed.clone();
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                if drained.load(Ordering::SeqCst) {
                    break;
                }
                handler(event).await;
            }
        });

        match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers
                .entry(kind)
                .or_default()
                .push(Subscriber { id, sender, closed }),
            Err(_) => tracing::error!(event = %kind, "Subscriber table poisoned, handler dropped"),
        }
        id
    }

    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            return false;
        };
        let Some(list) = subscribers.get_mut(&kind) else {
            return false;
        };
        let Some(index) = list.iter().position(|s| s.id == id) else {
            return false;
        };
        list.remove(index).closed.store(true, Ordering::SeqCst);
        true
    }

    /// Queue an event for every subscriber of its kind, returns how many
    pub fn emit(&self, event: Event) -> usize {
        let kind = event.kind();
        let Ok(mut subscribers) = self.subscribers.lock() else {
            return 0;
        };
        let Some(list) = subscribers.get_mut(&kind) else {
            return 0;
        };
        list.retain(|s| !s.sender.is_closed());
        for subscriber in list.iter() {
            let _ = subscriber.sender.send(event.clone());
        }
        list.len()
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers
            .lock()
            .map(|s| s.get(&kind).map(Vec::len).unwrap_or(0))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc::unbounded_channel;

    fn forwarding_handler(tx: mpsc::UnboundedSender<String>, tag: &'static str) -> EventHandler {
        Arc::new(move |event: Event| {
            let tx = tx.clone();
            async move {
                if let Event::Error { message } = event {
                    let _ = tx.send(format!("{}:{}", tag, message));
                }
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let hub = EventHub::new();
        let (tx, mut rx) = unbounded_channel();
        hub.subscribe(EventKind::Error, forwarding_handler(tx, "a"));

        for i in 0..20 {
            hub.emit(Event::Error { message: i.to_string() });
        }
        for i in 0..20 {
            assert_eq!(rx.recv().await.unwrap(), format!("a:{}", i));
        }
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let hub = EventHub::new();
        let (tx, mut rx) = unbounded_channel();
        let id = hub.subscribe(EventKind::Error, forwarding_handler(tx, "a"));

        assert!(hub.unsubscribe(EventKind::Error, id));
        assert!(!hub.unsubscribe(EventKind::Error, id));
        assert!(!hub.unsubscribe(EventKind::Ready, id));
        assert_eq!(hub.emit(Event::Error { message: "x".into() }), 0);

        let got = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(!matches!(got, Ok(Some(_))));
    }

    #[tokio::test]
    async fn test_unsubscribe_drops_queued_events() {
        let hub = EventHub::new();
        let (tx, mut rx) = unbounded_channel();
        let handler: EventHandler = Arc::new(move |event: Event| {
            let tx = tx.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                if let Event::Error { message } = event {
                    let _ = tx.send(message);
                }
            }
            .boxed()
        });
        let id = hub.subscribe(EventKind::Error, handler);

        for i in 0..3 {
            hub.emit(Event::Error { message: i.to_string() });
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(hub.unsubscribe(EventKind::Error, id));

        // the first event was already being handled
        assert_eq!(rx.recv().await.unwrap(), "0");
        let got = tokio::time::timeout(Duration::from_millis(150), rx.recv()).await;
        assert!(!matches!(got, Ok(Some(_))));
    }

    #[tokio::test]
    async fn test_only_matching_kind_receives() {
        let hub = EventHub::new();
        let (tx, _rx) = unbounded_channel();
        hub.subscribe(EventKind::Error, forwarding_handler(tx, "a"));

        assert_eq!(hub.emit(Event::Ready), 0);
        assert_eq!(hub.subscriber_count(EventKind::Error), 1);
        assert_eq!(hub.subscriber_count(EventKind::Message), 0);
    }
}
