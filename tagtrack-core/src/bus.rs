//! Internal publish/subscribe fan-out of typed events.
//!
//! One bounded broadcast channel per event category. Every subscriber
//! gets its own buffered view of the stream: a slow or stalled observer
//! lags and loses its oldest events, it never blocks the ingestion path
//! or other observers. Telemetry is best-effort, not guaranteed-delivery.

use std::sync::Arc;
use tagtrack_models::{EventCategory, TrackEvent};
use tokio::sync::broadcast;
use tracing::{debug, trace};

pub struct EventBus {
    telemetry: broadcast::Sender<Arc<TrackEvent>>,
    status: broadcast::Sender<Arc<TrackEvent>>,
    nfc: broadcast::Sender<Arc<TrackEvent>>,
}

impl EventBus {
    /// Create a bus whose per-subscriber buffers hold `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (telemetry, _) = broadcast::channel(capacity);
        let (status, _) = broadcast::channel(capacity);
        let (nfc, _) = broadcast::channel(capacity);
        Self {
            telemetry,
            status,
            nfc,
        }
    }

    fn channel(&self, category: EventCategory) -> &broadcast::Sender<Arc<TrackEvent>> {
        match category {
            EventCategory::Telemetry => &self.telemetry,
            EventCategory::Status => &self.status,
            EventCategory::NfcScan => &self.nfc,
        }
    }

    /// Register a listener on one category.
    ///
    /// Dropping the receiver unsubscribes it; there is no separate
    /// handle to forget.
    pub fn subscribe(&self, category: EventCategory) -> broadcast::Receiver<Arc<TrackEvent>> {
        self.channel(category).subscribe()
    }

    /// Number of live listeners on a category.
    pub fn subscriber_count(&self, category: EventCategory) -> usize {
        self.channel(category).receiver_count()
    }

    /// Deliver an event to every current listener of its category, in
    /// registration order. Returns the number of listeners reached.
    ///
    /// Publishing with zero subscribers is a no-op, never an error.
    pub fn publish(&self, event: TrackEvent) -> usize {
        let category = event.category();
        let sender = self.channel(category);
        if sender.receiver_count() == 0 {
            trace!(?category, "no subscribers for event");
            return 0;
        }
        match sender.send(Arc::new(event)) {
            Ok(delivered) => delivered,
            // All receivers dropped between the count and the send
            Err(_) => {
                debug!(?category, "subscribers vanished during publish");
                0
            }
        }
    }
}
