//! The narrow seam between the bridge core and a live hub channel.
//!
//! [`HubGateway`] opens connections; [`HubConnection`] is the channel
//! itself. The WebSocket implementation lives in [`crate::websocket`];
//! tests substitute in-memory fakes.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::auth::Credentials;
use crate::error::Error;
use crate::models::{EntityDelivery, EntityState, ServiceCatalog};

/// Handler invoked on every entity push.
pub type EntityCallback = Arc<dyn Fn(EntityDelivery) + Send + Sync>;

/// Opens live channels to a hub.
pub trait HubGateway: Send + Sync + 'static {
    type Connection: HubConnection;

    /// Open and authenticate a new channel.
    fn open(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Self::Connection, Error>> + Send;
}

/// A live, authenticated channel to the hub.
pub trait HubConnection: Send + Sync + 'static {
    /// One-time bulk state fetch.
    fn fetch_states(&self) -> impl Future<Output = Result<Vec<EntityState>, Error>> + Send;

    /// Register a standing entity subscription.
    fn subscribe_entities(
        &self,
        callback: EntityCallback,
    ) -> impl Future<Output = Result<Subscription, Error>> + Send;

    /// Generic request/response call for a named command.
    ///
    /// Channels that cannot carry arbitrary commands keep this default.
    fn request(
        &self,
        kind: &str,
        payload: Map<String, Value>,
    ) -> impl Future<Output = Result<Value, Error>> + Send {
        let _ = (kind, payload);
        async { Err(Error::UnsupportedOperation("request")) }
    }

    /// Invoke `domain.service` with a data payload.
    fn call_service(
        &self,
        domain: &str,
        service: &str,
        data: Map<String, Value>,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// The hub's service schema description.
    fn get_services(&self) -> impl Future<Output = Result<ServiceCatalog, Error>> + Send;

    /// `true` once the underlying channel has gone away.
    fn is_closed(&self) -> bool {
        false
    }

    /// Tear the channel down. Idempotent.
    fn close(&self) {}
}

// ── Subscription ─────────────────────────────────────────────────────

/// Handle to a standing subscription.
///
/// Dropping the handle leaves the subscription running;
/// call [`unsubscribe`](Self::unsubscribe) to stop deliveries.
pub struct Subscription {
    id: u64,
    cancel: Box<dyn FnOnce() + Send + Sync>,
}

impl Subscription {
    pub fn new(id: u64, cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            cancel: Box::new(cancel),
        }
    }

    /// Subscription id as assigned by the channel.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn unsubscribe(self) {
        (self.cancel)();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
