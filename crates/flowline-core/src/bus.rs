// In-process publish/subscribe router for stored events
//
// The bus is a live fan-out mechanism only: durability is the event log's
// job, so delivery guarantees end at process boundaries. Dispatch is
// synchronous on the publisher's task and panics are isolated per
// callback.
//
// The bus is an explicitly constructed object handed around via state;
// tests instantiate independent buses instead of sharing a global.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::event::Event;
use crate::types::{EntityType, EventType};

/// Callback invoked for each published event matching a subscription
pub type EventCallback = Arc<dyn Fn(&Event) + Send + Sync>;

/// Channel a subscription is registered on. All channels are scoped to a
/// workspace; ordering and fan-out never cross workspaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ChannelKey {
    Workspace(Uuid),
    Entity(Uuid, EntityType, Uuid),
    Type(Uuid, EventType),
}

impl ChannelKey {
    fn workspace_id(&self) -> Uuid {
        match self {
            ChannelKey::Workspace(ws) | ChannelKey::Entity(ws, _, _) | ChannelKey::Type(ws, _) => {
                *ws
            }
        }
    }
}

struct BusInner {
    channels: RwLock<HashMap<ChannelKey, Vec<(u64, EventCallback)>>>,
    next_id: AtomicU64,
}

/// Process-local publish/subscribe router keyed by workspace, entity, and
/// event type.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                channels: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Subscribe to every event published for a workspace.
    pub fn subscribe_to_workspace(
        &self,
        workspace_id: Uuid,
        callback: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe(ChannelKey::Workspace(workspace_id), Arc::new(callback))
    }

    /// Subscribe to events attributed to one entity within a workspace.
    pub fn subscribe_to_entity(
        &self,
        workspace_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
        callback: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe(
            ChannelKey::Entity(workspace_id, entity_type, entity_id),
            Arc::new(callback),
        )
    }

    /// Subscribe to one event kind within a workspace.
    pub fn subscribe_to_type(
        &self,
        workspace_id: Uuid,
        event_type: EventType,
        callback: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe(ChannelKey::Type(workspace_id, event_type), Arc::new(callback))
    }

    fn subscribe(&self, key: ChannelKey, callback: EventCallback) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .channels
            .write()
            .entry(key)
            .or_default()
            .push((id, callback));
        Subscription {
            inner: Arc::clone(&self.inner),
            key,
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Deliver a stored event to every subscription registered on the
    /// workspace channel, the event's entity channel (when derivable),
    /// and the event-type channel.
    ///
    /// Invocation order across subscribers is unspecified. A callback
    /// registered on two channels is two registrations and fires twice.
    /// A panicking callback is logged and skipped; it never prevents
    /// delivery to the remaining callbacks.
    pub fn publish(&self, workspace_id: Uuid, event: &Event) {
        let callbacks: Vec<EventCallback> = {
            let channels = self.inner.channels.read();
            let mut out = Vec::new();
            let mut collect = |key: &ChannelKey| {
                if let Some(list) = channels.get(key) {
                    out.extend(list.iter().map(|(_, cb)| Arc::clone(cb)));
                }
            };
            collect(&ChannelKey::Workspace(workspace_id));
            if let (Some(entity_type), Some(entity_id)) = (event.entity_type, event.entity_id) {
                collect(&ChannelKey::Entity(workspace_id, entity_type, entity_id));
            }
            collect(&ChannelKey::Type(workspace_id, event.event_type));
            out
        };

        // Callbacks run outside the registry lock so they may subscribe
        // or unsubscribe without deadlocking.
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                let error = crate::error::EventError::subscriber("callback panicked");
                tracing::warn!(
                    workspace_id = %workspace_id,
                    event_type = %event.event_type,
                    sequence_number = event.sequence_number,
                    error = %error,
                    "event subscriber failed; continuing delivery"
                );
            }
        }
    }

    /// Whether any subscription references this workspace. The write path
    /// uses this to skip publishing entirely when no one is listening.
    pub fn has_workspace_subscribers(&self, workspace_id: Uuid) -> bool {
        self.inner
            .channels
            .read()
            .keys()
            .any(|key| key.workspace_id() == workspace_id)
    }
}

/// Handle for one bus registration. Unsubscribing twice is a no-op;
/// dropping the handle unsubscribes as well.
pub struct Subscription {
    inner: Arc<BusInner>,
    key: ChannelKey,
    id: u64,
    active: AtomicBool,
}

impl Subscription {
    /// Remove exactly this registration. Idempotent.
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            let mut channels = self.inner.channels.write();
            if let Some(list) = channels.get_mut(&self.key) {
                list.retain(|(id, _)| *id != self.id);
                if list.is_empty() {
                    channels.remove(&self.key);
                }
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
