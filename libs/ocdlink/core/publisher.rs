//! Forwards demultiplexed notifications and connection changes to
//! subscribers through the configured [`Dispatcher`].

use crate::notification::{Notification, TargetEvent, TargetResetMode, TargetState};
use crate::traits::Dispatcher;
use parking_lot::RwLock;
use std::sync::Arc;

type Callback<T> = Arc<dyn Fn(T) + Send + Sync + 'static>;

/// Everything the worker publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    /// Recognized `#EVENT` / `#STATE` / `#RESET` frame
    Notification(Notification),
    /// Connection came up (`true`) or went down (`false`)
    ConnectionChanged(bool),
}

#[derive(Default)]
struct Subscribers {
    target_event: Vec<Callback<TargetEvent>>,
    target_state: Vec<Callback<TargetState>>,
    target_reset: Vec<Callback<TargetResetMode>>,
    connection: Vec<Callback<bool>>,
    all: Vec<Callback<ClientEvent>>,
}

/// Fire-and-forget publisher
///
/// Each published event becomes exactly one job on the dispatcher, so jobs
/// are handed over in publish order. Events nobody subscribed to are not
/// dispatched at all.
pub struct EventPublisher {
    dispatcher: Arc<dyn Dispatcher>,
    subscribers: RwLock<Subscribers>,
}

impl EventPublisher {
    pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            dispatcher,
            subscribers: RwLock::new(Subscribers::default()),
        }
    }

    pub fn on_target_event(&self, callback: impl Fn(TargetEvent) + Send + Sync + 'static) {
        self.subscribers.write().target_event.push(Arc::new(callback));
    }

    pub fn on_target_state(&self, callback: impl Fn(TargetState) + Send + Sync + 'static) {
        self.subscribers.write().target_state.push(Arc::new(callback));
    }

    pub fn on_target_reset(&self, callback: impl Fn(TargetResetMode) + Send + Sync + 'static) {
        self.subscribers.write().target_reset.push(Arc::new(callback));
    }

    pub fn on_connection_changed(&self, callback: impl Fn(bool) + Send + Sync + 'static) {
        self.subscribers.write().connection.push(Arc::new(callback));
    }

    /// Subscribe to every event, after the typed subscribers
    pub fn on_event(&self, callback: impl Fn(ClientEvent) + Send + Sync + 'static) {
        self.subscribers.write().all.push(Arc::new(callback));
    }

    /// Hand `event` to the dispatcher
    ///
    /// Returns `false` when nobody was subscribed.
    pub fn publish(&self, event: ClientEvent) -> bool {
        let subscribers = self.subscribers.read();
        let all = subscribers.all.clone();

        let typed: Option<Box<dyn FnOnce() + Send>> = match event {
            ClientEvent::Notification(Notification::Event(e)) => {
                bind(&subscribers.target_event, e)
            }
            ClientEvent::Notification(Notification::State(s)) => {
                bind(&subscribers.target_state, s)
            }
            ClientEvent::Notification(Notification::Reset(r)) => {
                bind(&subscribers.target_reset, r)
            }
            ClientEvent::ConnectionChanged(connected) => {
                bind(&subscribers.connection, connected)
            }
        };
        drop(subscribers);

        if typed.is_none() && all.is_empty() {
            return false;
        }

        self.dispatcher.dispatch(Box::new(move || {
            if let Some(typed) = typed {
                typed();
            }
            for callback in &all {
                callback(event);
            }
        }));
        true
    }
}

fn bind<T>(callbacks: &[Callback<T>], value: T) -> Option<Box<dyn FnOnce() + Send>>
where
    T: Copy + Send + 'static,
{
    if callbacks.is_empty() {
        return None;
    }
    let callbacks = callbacks.to_vec();
    Some(Box::new(move || {
        for callback in &callbacks {
            callback(value);
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{InlineDispatcher, Job};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn inline_publisher() -> EventPublisher {
        EventPublisher::new(Arc::new(InlineDispatcher))
    }

    #[test]
    fn test_routes_to_typed_subscribers() {
        let publisher = inline_publisher();
        let states = Arc::new(Mutex::new(Vec::new()));
        let events = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&states);
        publisher.on_target_state(move |state| s.lock().push(state));
        let e = Arc::clone(&events);
        publisher.on_target_event(move |event| e.lock().push(event));

        publisher.publish(ClientEvent::Notification(Notification::State(TargetState::Halted)));
        publisher.publish(ClientEvent::Notification(Notification::Event(TargetEvent::ResetStart)));
        publisher.publish(ClientEvent::Notification(Notification::State(TargetState::Running)));

        assert_eq!(*states.lock(), vec![TargetState::Halted, TargetState::Running]);
        assert_eq!(*events.lock(), vec![TargetEvent::ResetStart]);
    }

    #[test]
    fn test_unsubscribed_events_are_not_dispatched() {
        let jobs = Arc::new(AtomicUsize::new(0));
        let j = Arc::clone(&jobs);
        let publisher = EventPublisher::new(Arc::new(move |job: Job| {
            j.fetch_add(1, Ordering::SeqCst);
            job();
        }));

        assert!(!publisher.publish(ClientEvent::ConnectionChanged(true)));
        assert_eq!(jobs.load(Ordering::SeqCst), 0);

        publisher.on_connection_changed(|_| {});
        publisher.on_connection_changed(|_| {});
        assert!(publisher.publish(ClientEvent::ConnectionChanged(true)));
        // Two subscribers, one job
        assert_eq!(jobs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_catch_all_sees_events_in_order() {
        let publisher = inline_publisher();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        publisher.on_event(move |event| s.lock().push(event));

        let sequence = [
            ClientEvent::ConnectionChanged(true),
            ClientEvent::Notification(Notification::Reset(TargetResetMode::Init)),
            ClientEvent::Notification(Notification::Event(TargetEvent::Halted)),
            ClientEvent::ConnectionChanged(false),
        ];
        for event in sequence {
            publisher.publish(event);
        }
        assert_eq!(*seen.lock(), sequence.to_vec());
    }

    #[test]
    fn test_subscribing_from_inside_a_callback_does_not_deadlock() {
        let publisher = Arc::new(inline_publisher());
        let inner = Arc::clone(&publisher);
        publisher.on_connection_changed(move |_| inner.on_target_state(|_| {}));
        assert!(publisher.publish(ClientEvent::ConnectionChanged(true)));
    }
}
