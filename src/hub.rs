//! ==============================================================================
//! hub.rs - fan-out of accepted readings to live subscribers
//! ==============================================================================
//!
//! purpose:
//!     owns the state cache and the table of connected subscribers.
//!     every accepted reading is written to the cache and pushed to every
//!     subscriber; every new subscriber first receives the cached reading.
//!
//! delivery model:
//!     each subscriber has its own bounded ring drained by its own
//!     websocket writer task. publish never waits: when a stalled client's
//!     ring is full the oldest frame is evicted, so the newest reading is
//!     always the last thing it receives. the receiver sees a lag count for
//!     what it missed. a ring with no receiver means the client went away
//!     and its entry is removed.
//!
//! ordering:
//!     publish and subscribe take the same lock, so a new subscriber's
//!     catch-up frame is always the reading right before its first live
//!     frame. with a single producer each subscriber sees readings in
//!     acceptance order.
//!
//! relationships:
//!     - used by: pipeline.rs (publish), ws.rs (subscribe / unsubscribe),
//!       api.rs (snapshot, subscriber count)
//!     - owns: cache.rs (StateCache)
//!
//! ==============================================================================

use crate::cache::StateCache;
use crate::domain::Reading;
use crate::error::Result;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Event name carried by every push frame
pub const READING_EVENT: &str = "sensor-data";

/// A serialized push frame, shared between all recipients
pub type Frame = Arc<str>;

pub type SubscriberId = u64;

#[derive(Serialize)]
struct PushFrame<'a> {
    event: &'static str,
    data: &'a Reading,
}

/// encode a reading as the frame sent to clients
pub fn encode_frame(reading: &Reading) -> Result<Frame> {
    let json = serde_json::to_string(&PushFrame {
        event: READING_EVENT,
        data: reading,
    })?;
    Ok(Arc::from(json))
}

/// The receiving half handed to a new subscriber
///
/// `recv` yields `RecvError::Lagged(n)` when `n` older frames were evicted
/// before this subscriber got to them.
pub struct Subscription {
    pub id: SubscriberId,
    pub receiver: broadcast::Receiver<Frame>,
}

pub struct BroadcastHub {
    cache: StateCache,
    subscribers: Mutex<HashMap<SubscriberId, broadcast::Sender<Frame>>>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl BroadcastHub {
    pub fn new(cache: StateCache, queue_capacity: usize) -> Self {
        Self {
            cache,
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// current cached reading; never waits on the device
    pub fn snapshot(&self) -> Arc<Reading> {
        self.cache.snapshot()
    }

    /// Accept a reading into the cache and push it to every subscriber.
    ///
    /// Returns how many subscribers had the frame queued. A full subscriber
    /// still counts; it loses its oldest queued frame instead.
    pub fn publish(&self, reading: Reading) -> usize {
        let mut subs = self.subscribers.lock();
        let reading = self.cache.accept(reading);

        let frame = match encode_frame(&reading) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode reading frame");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut gone = Vec::new();
        for (id, tx) in subs.iter() {
            match tx.send(Arc::clone(&frame)) {
                Ok(_) => delivered += 1,
                Err(_) => gone.push(*id),
            }
        }
        for id in gone {
            subs.remove(&id);
            tracing::debug!(subscriber = id, "removed closed subscriber");
        }

        tracing::debug!(recipients = delivered, "reading broadcast");
        delivered
    }

    /// Register a subscriber; its queue already holds the catch-up frame.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, receiver) = broadcast::channel(self.queue_capacity);

        let mut subs = self.subscribers.lock();
        match encode_frame(&self.cache.snapshot()) {
            Ok(frame) => {
                // receiver is alive, send cannot fail
                let _ = tx.send(frame);
            }
            Err(e) => tracing::warn!(subscriber = id, error = %e, "failed to encode catch-up frame"),
        }
        subs.insert(id, tx);
        drop(subs);

        tracing::info!(subscriber = id, "subscriber connected");
        Subscription { id, receiver }
    }

    /// Forget a subscriber. Safe to call more than once.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.lock().remove(&id).is_some();
        if removed {
            tracing::info!(subscriber = id, "subscriber disconnected");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
