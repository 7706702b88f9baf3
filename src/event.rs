//! Event handling for caller-facing notifications.
//!
//! The session emits events onto an [`EventBus`]; [`EventQueue`] is the
//! lock-free bus the D-Bus dispatcher drains.

use std::{sync::Arc, time::Duration};

use crossbeam::queue::SegQueue;
use tokio::{sync::Notify, time};

use crate::tag::TagHandle;

/// Events that can be emitted by a tag session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
   /// A tag was registered. `payload` carries the handle and the serialized
   /// tag metadata.
   TagDiscovered {
      handle: TagHandle,
      payload: serde_json::Value,
   },
}

/// Trait for implementing event emission.
pub trait EventBus: Send + Sync {
   /// Emits an event to all registered listeners. Must not block.
   fn emit(&self, event: SessionEvent);
}

/// Type alias for a thread-safe event sender.
pub type EventSender = Arc<dyn EventBus>;

/// Unbounded multi-producer event queue with async receive.
pub struct EventQueue {
   queue: SegQueue<SessionEvent>,
   notifier: Notify,
}

impl EventQueue {
   pub fn new() -> Arc<Self> {
      Arc::new(Self {
         queue: SegQueue::new(),
         notifier: Notify::new(),
      })
   }

   /// Waits for the next event. Returns `None` once every other owner of the
   /// queue is gone and the queue is drained.
   pub async fn recv(self: &Arc<Self>) -> Option<SessionEvent> {
      loop {
         if let Some(event) = self.queue.pop() {
            return Some(event);
         }
         let notify = self.notifier.notified();
         if let Some(event) = self.queue.pop() {
            return Some(event);
         }
         if Arc::strong_count(self) == 1 {
            return None;
         }
         let _ = time::timeout(Duration::from_secs(1), notify).await;
      }
   }

   pub fn len(&self) -> usize {
      self.queue.len()
   }

   pub fn is_empty(&self) -> bool {
      self.queue.is_empty()
   }
}

impl EventBus for EventQueue {
   fn emit(&self, event: SessionEvent) {
      self.queue.push(event);
      self.notifier.notify_waiters();
   }
}
