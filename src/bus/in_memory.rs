//! In-memory bus for testing and single-process scenarios.
//!
//! Implements [`BusConnection`] and [`BusChannel`] without a broker:
//! - Exchanges, queues and bindings are tracked so declares behave like the real thing
//! - Every publish is appended to a shared log that tests can inspect
//! - `close()` flips the connection and all its channels to closed

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;

use super::{BusChannel, BusConnection, BusError};

/// A message accepted by the in-memory bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Published {
    pub exchange: String,
    pub routing_key: String,
    pub body: Vec<u8>,
}

impl Published {
    /// Get the body as a string (if valid UTF-8).
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Decode the JSON body, as a consumer would.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[derive(Clone, Debug)]
struct Exchange {
    kind: &'static str,
    durable: bool,
}

#[derive(Debug, Default)]
struct State {
    exchanges: HashMap<String, Exchange>,
    queues: Vec<String>,
    bindings: Vec<(String, String, String)>,
    published: Vec<Published>,
}

/// In-memory bus connection.
///
/// Cheap to clone; clones share the same state and open flag.
///
/// ## Example
///
/// ```
/// use sourced_broker::bus::{EventEmitter, InMemoryBus};
///
/// # tokio_test_block(async {
/// let bus = InMemoryBus::new();
/// let emitter = EventEmitter::new(&bus, "logs_topic", "log.*").await.unwrap();
/// emitter.push(r#"{"name":"n","data":"d"}"#, "log.INFO").await.unwrap();
/// assert_eq!(bus.published().len(), 1);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryBus {
    state: Arc<RwLock<State>>,
    open: Arc<AtomicBool>,
    next_queue: Arc<AtomicU64>,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBus {
    /// Create a new, open in-memory bus.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            open: Arc::new(AtomicBool::new(true)),
            next_queue: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Pre-declare a non-durable exchange, so a later durable declare of the
    /// same name fails like a topology mismatch on a real broker.
    pub fn with_transient_exchange(self, name: &str) -> Self {
        self.state.write().exchanges.insert(
            name.to_string(),
            Exchange {
                kind: "topic",
                durable: false,
            },
        );
        self
    }

    /// Get every accepted publish, in order.
    pub fn published(&self) -> Vec<Published> {
        self.state.read().published.clone()
    }

    /// Get all publishes with the given routing key.
    pub fn published_with_key(&self, routing_key: &str) -> Vec<Published> {
        self.state
            .read()
            .published
            .iter()
            .filter(|p| p.routing_key == routing_key)
            .cloned()
            .collect()
    }

    /// Names of declared exchanges.
    pub fn exchanges(&self) -> Vec<String> {
        self.state.read().exchanges.keys().cloned().collect()
    }

    /// Names of declared queues.
    pub fn queues(&self) -> Vec<String> {
        self.state.read().queues.clone()
    }

    /// Declared bindings as `(queue, exchange, binding_key)`.
    pub fn bindings(&self) -> Vec<(String, String, String)> {
        self.state.read().bindings.clone()
    }
}

#[async_trait]
impl BusConnection for InMemoryBus {
    type Channel = InMemoryChannel;

    async fn create_channel(&self) -> Result<InMemoryChannel, BusError> {
        if !self.is_open() {
            return Err(BusError::Unavailable);
        }
        Ok(InMemoryChannel {
            bus: self.clone(),
            open: AtomicBool::new(true),
        })
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), BusError> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// A channel on an [`InMemoryBus`].
pub struct InMemoryChannel {
    bus: InMemoryBus,
    open: AtomicBool,
}

impl InMemoryChannel {
    fn ensure_open(&self) -> Result<(), BusError> {
        if self.open.load(Ordering::SeqCst) && self.bus.is_open() {
            Ok(())
        } else {
            Err(BusError::Unavailable)
        }
    }
}

#[async_trait]
impl BusChannel for InMemoryChannel {
    async fn declare_topic_exchange(&self, name: &str) -> Result<(), BusError> {
        self.ensure_open()?;
        let mut state = self.bus.state.write();
        let existing = state.exchanges.get(name).cloned();
        match existing {
            Some(existing) if existing.kind == "topic" && existing.durable => Ok(()),
            Some(_) => Err(BusError::Topology(format!(
                "inequivalent arguments for exchange '{}'",
                name
            ))),
            None => {
                state.exchanges.insert(
                    name.to_string(),
                    Exchange {
                        kind: "topic",
                        durable: true,
                    },
                );
                Ok(())
            }
        }
    }

    async fn declare_private_queue(&self) -> Result<String, BusError> {
        self.ensure_open()?;
        let id = self.bus.next_queue.fetch_add(1, Ordering::SeqCst);
        let name = format!("amq.gen-{}", id);
        self.bus.state.write().queues.push(name.clone());
        Ok(name)
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        binding_key: &str,
    ) -> Result<(), BusError> {
        self.ensure_open()?;
        let mut state = self.bus.state.write();
        if !state.exchanges.contains_key(exchange) {
            return Err(BusError::Topology(format!("no exchange '{}'", exchange)));
        }
        state
            .bindings
            .push((queue.to_string(), exchange.to_string(), binding_key.to_string()));
        Ok(())
    }

    async fn publish(&self, exchange: &str, routing_key: &str, body: &[u8]) -> Result<(), BusError> {
        self.ensure_open()
            .map_err(|_| BusError::PublishFailed("channel closed".into()))?;
        let mut state = self.bus.state.write();
        if !state.exchanges.contains_key(exchange) {
            return Err(BusError::PublishFailed(format!("no exchange '{}'", exchange)));
        }
        state.published.push(Published {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            body: body.to_vec(),
        });
        Ok(())
    }

    async fn close(&self) -> Result<(), BusError> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }
}
