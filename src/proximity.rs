//! "Near the end of rendered content" as a discrete signal.
//!
//! The controller only sees `ProximityTrigger`; whether the signal comes from
//! scroll geometry, a "load more" button or a polling loop is up to the
//! implementation. Triggers may fire repeatedly while the edge stays near,
//! so subscribers must treat signals as idempotent.

use std::sync::{Arc, Mutex, PoisonError};
use tracing::trace;

pub type NearEndCallback = Box<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

pub trait ProximityTrigger: Send + Sync {
    fn subscribe(&self, on_near_end: NearEndCallback) -> SubscriptionHandle;
    fn unsubscribe(&self, handle: SubscriptionHandle);
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    entries: Vec<(SubscriptionHandle, Arc<dyn Fn() + Send + Sync>)>,
}

/// Callback bookkeeping shared by the trigger implementations.
#[derive(Default)]
struct SubscriberRegistry {
    inner: Mutex<Subscribers>,
}

impl SubscriberRegistry {
    fn subscribe(&self, on_near_end: NearEndCallback) -> SubscriptionHandle {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.next_id = inner.next_id.wrapping_add(1);
        let handle = SubscriptionHandle(inner.next_id);
        inner.entries.push((handle, Arc::from(on_near_end)));
        handle
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.entries.retain(|(existing, _)| *existing != handle);
    }

    fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    fn fire(&self) -> usize {
        // Call outside the lock; a callback may unsubscribe.
        let callbacks: Vec<_> = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in &callbacks {
            callback();
        }
        callbacks.len()
    }
}

/// Trigger driven by an explicit "load more" action.
#[derive(Default)]
pub struct ManualProximityTrigger {
    subscribers: SubscriberRegistry,
}

impl ManualProximityTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal every current subscriber. Returns how many were notified.
    pub fn request_more(&self) -> usize {
        self.subscribers.fire()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl ProximityTrigger for ManualProximityTrigger {
    fn subscribe(&self, on_near_end: NearEndCallback) -> SubscriptionHandle {
        self.subscribers.subscribe(on_near_end)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.subscribers.unsubscribe(handle);
    }
}

/// Geometry of the reading viewport, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub offset_y: f32,
    pub viewport_height: f32,
    pub content_height: f32,
}

impl ScrollMetrics {
    /// Pixels left between the bottom of the viewport and the end of content.
    pub fn remaining(&self) -> f32 {
        let offset = finite_or_zero(self.offset_y).max(0.0);
        let viewport = finite_or_zero(self.viewport_height).max(0.0);
        let content = finite_or_zero(self.content_height).max(0.0);
        content - (offset + viewport)
    }
}

fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() { value } else { 0.0 }
}

/// Trigger fed with scroll positions; fires within `threshold_px` of the end.
pub struct ScrollProximityTrigger {
    threshold_px: f32,
    subscribers: SubscriberRegistry,
}

impl ScrollProximityTrigger {
    pub fn new(threshold_px: f32) -> Self {
        Self {
            threshold_px: finite_or_zero(threshold_px).max(0.0),
            subscribers: SubscriberRegistry::default(),
        }
    }

    /// Report the latest scroll position. Returns whether the signal fired.
    pub fn observe(&self, metrics: ScrollMetrics) -> bool {
        let remaining = metrics.remaining();
        if remaining > self.threshold_px {
            return false;
        }
        let notified = self.subscribers.fire();
        trace!(remaining, notified, "Near end of rendered content");
        notified > 0
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl ProximityTrigger for ScrollProximityTrigger {
    fn subscribe(&self, on_near_end: NearEndCallback) -> SubscriptionHandle {
        self.subscribers.subscribe(on_near_end)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.subscribers.unsubscribe(handle);
    }
}
