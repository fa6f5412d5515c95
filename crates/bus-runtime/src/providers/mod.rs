//! Broker implementations.
//!
//! This module contains concrete implementations of the channel traits in
//! [`crate::client`]. SDK-backed brokers live in the host application and
//! implement the same traits.

pub mod memory;

pub use memory::{InMemoryBroker, InMemoryHandlerClient, InMemoryReceiver, InMemorySender};
