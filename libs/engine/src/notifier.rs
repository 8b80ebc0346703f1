use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, mpsc};

use txwatch_api::{
    Annotation, EventPublisher, EventSubscriber, EventSubscription, LiveEvent, OverflowPolicy,
};

// ═══════════════════════════════════════════════════════════════
//  Subscriber
// ═══════════════════════════════════════════════════════════════

#[derive(Clone)]
struct Subscriber {
    tx: mpsc::Sender<LiveEvent>,
    overflow: OverflowPolicy,
}

// ═══════════════════════════════════════════════════════════════
//  MpscSubscription: server-side EventSubscription impl
// ═══════════════════════════════════════════════════════════════

pub struct MpscSubscription {
    rx: mpsc::Receiver<LiveEvent>,
}

impl EventSubscription for MpscSubscription {
    fn recv(&mut self) -> Pin<Box<dyn Future<Output = Option<LiveEvent>> + Send + '_>> {
        Box::pin(async { self.rx.recv().await })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Broadcaster
// ═══════════════════════════════════════════════════════════════

/// In-process pub/sub: one topic per stream, every subscriber of a topic
/// gets every event published to it.
///
/// Publishing works on a snapshot of the subscriber list, so concurrent
/// subscribe/disconnect never races the fan-out. Closed subscribers are
/// pruned after the fan-out.
pub struct Broadcaster {
    topics: RwLock<HashMap<String, Vec<Subscriber>>>,
    send_timeout: Duration,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl Broadcaster {
    /// `send_timeout` bounds the wait on a full `BackPressure` subscriber.
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            send_timeout,
        }
    }

    pub async fn subscribe(
        &self,
        topic: &str,
        buffer: usize,
        overflow: OverflowPolicy,
    ) -> MpscSubscription {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let mut topics = self.topics.write().await;
        topics
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber { tx, overflow });
        MpscSubscription { rx }
    }

    /// Push `event` to every current subscriber of `topic`.
    pub async fn publish(&self, topic: &str, event: LiveEvent) -> usize {
        let snapshot: Vec<Subscriber> = {
            let topics = self.topics.read().await;
            match topics.get(topic) {
                Some(subs) => subs.clone(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        let mut saw_closed = false;
        for sub in &snapshot {
            if sub.tx.is_closed() {
                saw_closed = true;
                continue;
            }
            match sub.overflow {
                OverflowPolicy::Drop => match sub.tx.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(topic, event = event.name(), "subscriber channel full, dropping");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => saw_closed = true,
                },
                OverflowPolicy::BackPressure => {
                    match sub.tx.send_timeout(event.clone(), self.send_timeout).await {
                        Ok(()) => delivered += 1,
                        Err(mpsc::error::SendTimeoutError::Timeout(_)) => {
                            tracing::warn!(topic, event = event.name(), "subscriber too slow, dropping");
                        }
                        Err(mpsc::error::SendTimeoutError::Closed(_)) => saw_closed = true,
                    }
                }
            }
        }

        if saw_closed {
            let mut topics = self.topics.write().await;
            if let Some(subs) = topics.get_mut(topic) {
                subs.retain(|s| !s.tx.is_closed());
                if subs.is_empty() {
                    topics.remove(topic);
                }
            }
        }

        delivered
    }

    /// Live subscribers of `topic`.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        let topics = self.topics.read().await;
        topics
            .get(topic)
            .map(|subs| subs.iter().filter(|s| !s.tx.is_closed()).count())
            .unwrap_or(0)
    }
}

impl EventPublisher for Broadcaster {
    fn publish(
        &self,
        topic: &str,
        event: LiveEvent,
    ) -> Pin<Box<dyn Future<Output = usize> + Send + '_>> {
        let topic = topic.to_string();
        Box::pin(async move { Broadcaster::publish(self, &topic, event).await })
    }
}

impl EventSubscriber for Broadcaster {
    fn subscribe(
        &self,
        topic: &str,
        buffer: usize,
        overflow: OverflowPolicy,
    ) -> Pin<Box<dyn Future<Output = Box<dyn EventSubscription>> + Send + '_>> {
        let topic = topic.to_string();
        Box::pin(async move {
            let sub = Broadcaster::subscribe(self, &topic, buffer, overflow).await;
            Box::new(sub) as Box<dyn EventSubscription>
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Notifier
// ═══════════════════════════════════════════════════════════════

/// Typed front of an `EventPublisher`: the two events the engine emits.
#[derive(Clone)]
pub struct Notifier {
    publisher: Arc<dyn EventPublisher>,
}

impl Notifier {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }

    pub async fn broadcast_new_data(&self, stream: &str) -> usize {
        let event = LiveEvent::NewDataAvailable {
            stream: stream.to_string(),
        };
        let delivered = self.publisher.publish(stream, event).await;
        tracing::debug!(stream, delivered, "new_data_available sent");
        delivered
    }

    pub async fn broadcast_annotation_update(
        &self,
        stream: &str,
        id: &str,
        annotation: &Annotation,
    ) -> usize {
        let event = LiveEvent::TransactionUpdated {
            id: id.to_string(),
            field: annotation.field().to_string(),
            value: annotation.value(),
        };
        let delivered = self.publisher.publish(stream, event).await;
        tracing::debug!(stream, id, field = annotation.field(), delivered, "transaction_updated sent");
        delivered
    }
}
