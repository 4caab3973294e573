/// Type-state markers for the builder pattern
///
/// These types track at compile time whether a dispatcher has been set,
/// so a client can never be built without somewhere to run callbacks.
use crate::traits::Dispatcher;
use std::sync::Arc;

/// Marker trait for dispatcher state
pub trait DispatcherState {}

/// Dispatcher has not been set
pub struct NoDispatcher;
impl DispatcherState for NoDispatcher {}

/// Dispatcher has been set
pub struct HasDispatcher(pub(crate) Arc<dyn Dispatcher>);
impl DispatcherState for HasDispatcher {}
