//! Lifecycle events published around unit of work commits.
//!
//! Listeners observe the persistence lifecycle of tracked entities: an event
//! fires before and after each insert, update, and delete, plus one before
//! and one after the whole commit. Listener failures are logged and never
//! abort a commit.

use crate::common::DOCMAP_EVENT;
use crate::document::DocumentRef;
use crate::errors::{DocmapError, DocmapResult, ErrorKind};
use basu::error::BasuError;
use basu::event::Event;
use basu::{EventBus, Handle, HandlerId};
use std::fmt::Debug;
use std::sync::Arc;

/// The lifecycle moments a listener can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEventKind {
    /// Before an insert is dispatched for a new entity.
    PrePersist,
    /// After the persister applied an insert.
    PostPersist,
    /// Before an update is dispatched for a dirty managed entity.
    PreUpdate,
    /// After the persister applied an update.
    PostUpdate,
    /// Before a delete is dispatched for a removed entity.
    PreRemove,
    /// After the persister applied a delete.
    PostRemove,
    /// Before the first operation of a commit is dispatched.
    PreCommit,
    /// After a commit finished with every operation applied.
    PostCommit,
}

/// Information about one lifecycle event.
///
/// # Characteristics
/// - **Cloneable**: Thread-safe sharing via Arc
/// - **Immutable**: Captured at event time
#[derive(Clone)]
pub struct LifecycleEventInfo {
    inner: Arc<LifecycleEventInner>,
}

struct LifecycleEventInner {
    kind: LifecycleEventKind,
    doc_ref: Option<DocumentRef>,
}

impl LifecycleEventInfo {
    /// Creates a new lifecycle event.
    ///
    /// # Arguments
    /// * `kind` - The lifecycle moment
    /// * `doc_ref` - The affected document, `None` for commit-level events
    pub fn new(kind: LifecycleEventKind, doc_ref: Option<DocumentRef>) -> Self {
        LifecycleEventInfo {
            inner: Arc::new(LifecycleEventInner { kind, doc_ref }),
        }
    }

    /// Returns the lifecycle moment this event marks.
    pub fn kind(&self) -> LifecycleEventKind {
        self.inner.kind
    }

    /// Returns the affected document, if the event is entity-scoped.
    pub fn doc_ref(&self) -> Option<&DocumentRef> {
        self.inner.doc_ref.as_ref()
    }
}

impl Debug for LifecycleEventInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.doc_ref() {
            Some(doc_ref) => write!(f, "{:?}({})", self.kind(), doc_ref),
            None => write!(f, "{:?}", self.kind()),
        }
    }
}

/// Trait for closure-based lifecycle event handlers.
///
/// Any closure matching `Fn(LifecycleEventInfo) -> DocmapResult<()>`
/// implements this trait automatically.
pub trait LifecycleEventCallback:
    Send + Sync + Fn(LifecycleEventInfo) -> DocmapResult<()>
{
}

impl<F> LifecycleEventCallback for F where
    F: Send + Sync + Fn(LifecycleEventInfo) -> DocmapResult<()>
{
}

/// Listener for lifecycle events.
///
/// Wraps an event handler callback for registration with a
/// [LifecycleEventBus]. A callback returning an error is logged by the bus;
/// it never aborts the commit in progress.
///
/// ```rust,ignore
/// let listener = LifecycleEventListener::new(|event| {
///     log::info!("lifecycle: {:?}", event);
///     Ok(())
/// });
/// ```
#[derive(Clone)]
pub struct LifecycleEventListener {
    on_event: Arc<dyn LifecycleEventCallback>,
}

impl LifecycleEventListener {
    /// Creates a new listener wrapping the provided callback.
    pub fn new(on_event: impl LifecycleEventCallback + 'static) -> Self {
        LifecycleEventListener {
            on_event: Arc::new(on_event),
        }
    }
}

impl Handle<LifecycleEventInfo> for LifecycleEventListener {
    fn handle(&self, event: &Event<LifecycleEventInfo>) -> Result<(), BasuError> {
        if let Err(e) = (self.on_event)(event.data.clone()) {
            // Listener failures must not abort the commit in progress.
            log::warn!("Lifecycle listener failed: {}", e);
        }
        Ok(())
    }
}

impl Debug for LifecycleEventListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleEventListener").finish()
    }
}

/// Publishes lifecycle events to registered listeners.
///
/// # Responsibilities
/// * **Event Publishing**: Broadcasts events to all registered listeners
/// * **Listener Registration**: Registers handlers to receive notifications
/// * **Listener Deregistration**: Removes previously registered handlers
/// * **Performance**: Fast path skips event construction when nobody listens
#[derive(Clone)]
pub struct LifecycleEventBus {
    inner: Arc<LifecycleEventBusInner>,
}

impl Default for LifecycleEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleEventBus {
    /// Creates a new event bus instance.
    pub fn new() -> Self {
        LifecycleEventBus {
            inner: Arc::new(LifecycleEventBusInner {
                event_bus: EventBus::new(),
            }),
        }
    }

    /// Registers a lifecycle listener with the bus.
    pub fn register(&self, listener: LifecycleEventListener) -> DocmapResult<SubscriberRef> {
        self.inner.register(listener)
    }

    /// Deregisters a previously registered listener.
    pub fn deregister(&self, subscriber: SubscriberRef) -> DocmapResult<()> {
        self.inner.deregister(subscriber)
    }

    /// Publishes an event to all registered listeners.
    pub fn publish(&self, event: LifecycleEventInfo) -> DocmapResult<()> {
        self.inner.publish(event)
    }

    /// Closes the event bus and clears all registered listeners.
    pub fn close(&self) -> DocmapResult<()> {
        self.inner.close()
    }

    /// Returns true if there are any registered listeners.
    pub fn has_listeners(&self) -> bool {
        self.inner.has_listeners()
    }
}

/// Opaque handle to a registered listener, used to deregister it.
pub struct SubscriberRef {
    pub(crate) inner: HandlerId,
}

impl SubscriberRef {
    pub fn new(inner: HandlerId) -> Self {
        SubscriberRef { inner }
    }
}

struct LifecycleEventBusInner {
    event_bus: EventBus<LifecycleEventInfo>,
}

impl LifecycleEventBusInner {
    fn register(&self, listener: LifecycleEventListener) -> DocmapResult<SubscriberRef> {
        match self.event_bus.subscribe(DOCMAP_EVENT, Box::new(listener)) {
            Ok(subscriber) => Ok(SubscriberRef::new(subscriber)),
            Err(e) => Err(Self::docmap_error(e)),
        }
    }

    #[inline]
    fn deregister(&self, subscriber: SubscriberRef) -> DocmapResult<()> {
        match self.event_bus.unsubscribe(DOCMAP_EVENT, &subscriber.inner) {
            Ok(_) => Ok(()),
            Err(e) => Err(Self::docmap_error(e)),
        }
    }

    #[inline]
    fn publish(&self, event: LifecycleEventInfo) -> DocmapResult<()> {
        // Fast path: check if there are listeners before creating the event
        let handler_count = match self.event_bus.get_handler_count(DOCMAP_EVENT) {
            Ok(count) => count,
            Err(e) => {
                // If event type not found, no listeners - early return
                if matches!(e, BasuError::EventTypeNotFOUND) {
                    return Ok(());
                }
                return Err(Self::docmap_error(e));
            }
        };

        if handler_count == 0 {
            return Ok(());
        }

        let basu_event = Event::new(event);
        match self.event_bus.publish(DOCMAP_EVENT, &basu_event) {
            Ok(_) => Ok(()),
            Err(e) => Err(Self::docmap_error(e)),
        }
    }

    #[inline]
    fn close(&self) -> DocmapResult<()> {
        match self.event_bus.clear() {
            Ok(_) => Ok(()),
            Err(e) => Err(Self::docmap_error(e)),
        }
    }

    #[inline]
    fn has_listeners(&self) -> bool {
        match self.event_bus.get_handler_count(DOCMAP_EVENT) {
            Ok(count) => count > 0,
            Err(e) => {
                if matches!(e, BasuError::EventTypeNotFOUND) {
                    false
                } else {
                    log::warn!("Failed to check listeners: {}, defaulting to false", e);
                    false
                }
            }
        }
    }

    #[inline]
    fn docmap_error(e: BasuError) -> DocmapError {
        match e {
            BasuError::EventTypeNotFOUND => DocmapError::new(
                "Event bus error: the requested event type is not registered",
                ErrorKind::EventError,
            ),
            BasuError::MutexPoisoned => DocmapError::new(
                "Event bus error: internal mutex poisoned - the event bus may be in an inconsistent state",
                ErrorKind::EventError,
            ),
            BasuError::HandlerError(e) => DocmapError::new(
                &format!("Event handler error: {}", e),
                ErrorKind::EventError,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Value;
    use parking_lot::Mutex;

    fn sample_event() -> LifecycleEventInfo {
        LifecycleEventInfo::new(
            LifecycleEventKind::PostPersist,
            Some(DocumentRef::new("Book", Value::I64(1))),
        )
    }

    #[test]
    fn event_info_carries_kind_and_ref() {
        let event = sample_event();
        assert_eq!(event.kind(), LifecycleEventKind::PostPersist);
        assert_eq!(
            event.doc_ref(),
            Some(&DocumentRef::new("Book", Value::I64(1)))
        );
    }

    #[test]
    fn commit_level_event_has_no_ref() {
        let event = LifecycleEventInfo::new(LifecycleEventKind::PreCommit, None);
        assert!(event.doc_ref().is_none());
    }

    #[test]
    fn registered_listener_receives_published_events() {
        let bus = LifecycleEventBus::new();
        let seen: Arc<Mutex<Vec<LifecycleEventKind>>> = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        let listener = LifecycleEventListener::new(move |event: LifecycleEventInfo| {
            seen_clone.lock().push(event.kind());
            Ok(())
        });
        let _subscriber = bus.register(listener).unwrap();

        bus.publish(sample_event()).unwrap();
        bus.publish(LifecycleEventInfo::new(LifecycleEventKind::PostCommit, None))
            .unwrap();

        let kinds = seen.lock().clone();
        assert_eq!(
            kinds,
            vec![LifecycleEventKind::PostPersist, LifecycleEventKind::PostCommit]
        );
    }

    #[test]
    fn publish_without_listeners_is_a_no_op() {
        let bus = LifecycleEventBus::new();
        assert!(!bus.has_listeners());
        assert!(bus.publish(sample_event()).is_ok());
    }

    #[test]
    fn deregistered_listener_stops_receiving() {
        let bus = LifecycleEventBus::new();
        let seen: Arc<Mutex<usize>> = Arc::new(Mutex::new(0));

        let seen_clone = seen.clone();
        let subscriber = bus
            .register(LifecycleEventListener::new(move |_| {
                *seen_clone.lock() += 1;
                Ok(())
            }))
            .unwrap();

        bus.publish(sample_event()).unwrap();
        bus.deregister(subscriber).unwrap();
        bus.publish(sample_event()).unwrap();

        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn failing_listener_does_not_abort_publish() {
        let bus = LifecycleEventBus::new();
        let _subscriber = bus
            .register(LifecycleEventListener::new(|_| {
                Err(DocmapError::new("listener bug", ErrorKind::InternalError))
            }))
            .unwrap();

        assert!(bus.publish(sample_event()).is_ok());
    }

    #[test]
    fn has_listeners_reflects_registration() {
        let bus = LifecycleEventBus::new();
        assert!(!bus.has_listeners());
        let _subscriber = bus
            .register(LifecycleEventListener::new(|_| Ok(())))
            .unwrap();
        assert!(bus.has_listeners());
    }

    #[test]
    fn close_clears_listeners() {
        let bus = LifecycleEventBus::new();
        let _subscriber = bus
            .register(LifecycleEventListener::new(|_| Ok(())))
            .unwrap();
        bus.close().unwrap();
        assert!(!bus.has_listeners());
    }
}
