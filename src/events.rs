use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use tokio::sync::mpsc as tokio_mpsc;
use tracing::debug;

type SubscriptionId = u64;

/// Fan-out for core events
///
/// Services push events into a single queue; the fan dispatches each event
/// to every live subscriber. Subscriptions are removed automatically when
/// their receiver is dropped.
#[derive(Clone)]
pub struct EventFan<T> {
    subscriptions: Arc<Mutex<HashMap<SubscriptionId, tokio_mpsc::UnboundedSender<T>>>>,
    next_id: Arc<AtomicU64>,
}

impl<T: Clone + Send + 'static> EventFan<T> {
    /// Create a new fan and spawn the dispatch task on the given runtime
    pub fn new(
        mut event_rx: tokio_mpsc::UnboundedReceiver<T>,
        runtime_handle: tokio::runtime::Handle,
    ) -> Self {
        let subscriptions: Arc<Mutex<HashMap<SubscriptionId, tokio_mpsc::UnboundedSender<T>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let subscriptions_clone = subscriptions.clone();

        runtime_handle.spawn(async move {
            loop {
                match event_rx.recv().await {
                    Some(event) => {
                        let mut subs = subscriptions_clone.lock().unwrap();
                        let mut to_remove = Vec::new();

                        for (id, tx) in subs.iter() {
                            // Send failure means the receiver was dropped
                            if tx.send(event.clone()).is_err() {
                                to_remove.push(*id);
                            }
                        }

                        for id in to_remove {
                            subs.remove(&id);
                        }
                    }
                    None => {
                        debug!("event channel closed, dispatch task exiting");
                        break;
                    }
                }
            }
        });

        EventFan {
            subscriptions,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Subscribe to all events delivered after this call
    pub fn subscribe(&self) -> tokio_mpsc::UnboundedReceiver<T> {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscriptions.lock().unwrap().insert(id, tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_reach_all_subscribers() {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        let fan = EventFan::new(rx, tokio::runtime::Handle::current());

        let mut a = fan.subscribe();
        let mut b = fan.subscribe();

        tx.send(7u32).unwrap();
        assert_eq!(a.recv().await, Some(7));
        assert_eq!(b.recv().await, Some(7));
    }

    #[tokio::test]
    async fn test_dropped_subscriber_does_not_block_others() {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        let fan = EventFan::new(rx, tokio::runtime::Handle::current());

        let a = fan.subscribe();
        let mut b = fan.subscribe();
        drop(a);

        tx.send(1u32).unwrap();
        tx.send(2u32).unwrap();
        assert_eq!(b.recv().await, Some(1));
        assert_eq!(b.recv().await, Some(2));
    }
}
