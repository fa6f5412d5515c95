//! Per-invocation pipeline context.
//!
//! The pipeline host creates one [`PipelineContext`] per request, hands a
//! clone to every command in the pipeline and drops it when the request
//! completes. Commands use it to pass ephemeral data between steps, most
//! importantly the scheduled sequence numbers a later cancel consumes.
//!
//! Clones share state. The push handler of `RegisterMessageHandler` invokes
//! hooks on broker tasks, so the state sits behind a mutex.

use bus_runtime::{SequenceNumber, Timestamp};
use std::any::{Any, TypeId};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct ContextState {
    enqueue_time: Option<Timestamp>,
    sequence_numbers: VecDeque<SequenceNumber>,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

/// Shared, typed key-value state for one pipeline invocation
#[derive(Clone, Default)]
pub struct PipelineContext {
    state: Arc<Mutex<ContextState>>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue time agreed between the pipeline host and a schedule command
    pub fn enqueue_time(&self) -> Option<Timestamp> {
        self.lock().enqueue_time
    }

    pub fn set_enqueue_time(&self, enqueue_time: Timestamp) {
        self.lock().enqueue_time = Some(enqueue_time);
    }

    pub fn clear_enqueue_time(&self) -> Option<Timestamp> {
        self.lock().enqueue_time.take()
    }

    /// Record a scheduled message awaiting possible cancellation
    pub fn push_sequence_number(&self, sequence_number: SequenceNumber) {
        self.lock().sequence_numbers.push_back(sequence_number);
    }

    /// Take the oldest pending sequence number
    pub fn pop_sequence_number(&self) -> Option<SequenceNumber> {
        self.lock().sequence_numbers.pop_front()
    }

    /// Oldest pending sequence number, left in place
    pub fn peek_sequence_number(&self) -> Option<SequenceNumber> {
        self.lock().sequence_numbers.front().copied()
    }

    /// Drop the first pending entry equal to `sequence_number`
    ///
    /// Returns `false` when the number was no longer pending.
    pub fn remove_sequence_number(&self, sequence_number: SequenceNumber) -> bool {
        let mut state = self.lock();
        let position = state
            .sequence_numbers
            .iter()
            .position(|pending| *pending == sequence_number);

        position.is_some_and(|index| state.sequence_numbers.remove(index).is_some())
    }

    /// Pending sequence numbers, oldest first
    pub fn pending_sequence_numbers(&self) -> Vec<SequenceNumber> {
        self.lock().sequence_numbers.iter().copied().collect()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().sequence_numbers.len()
    }

    /// Store a value keyed by its type, returning the previous one
    pub fn insert<T: Any + Send + Sync>(&self, value: T) -> Option<T> {
        self.lock()
            .extensions
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|previous| previous.downcast::<T>().ok())
            .map(|previous| *previous)
    }

    /// Clone out the value stored for type `T`
    pub fn get<T: Any + Send + Sync + Clone>(&self) -> Option<T> {
        self.lock()
            .extensions
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    pub fn remove<T: Any + Send + Sync>(&self) -> Option<T> {
        self.lock()
            .extensions
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.lock().extensions.contains_key(&TypeId::of::<T>())
    }

    /// Run `f` with mutable access to the value stored for `T`
    pub fn update<T, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R>
    where
        T: Any + Send + Sync,
    {
        self.lock()
            .extensions
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
            .map(f)
    }
}

impl fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("PipelineContext")
            .field("enqueue_time", &state.enqueue_time)
            .field("sequence_numbers", &state.sequence_numbers)
            .field("extensions", &state.extensions.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
