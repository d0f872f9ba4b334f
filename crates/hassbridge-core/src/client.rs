// ── HubClient: connection lifecycle and operation facade ──
//
// One lazily established connection per client. The connection slot is a
// tri-state (Absent / Pending / Ready) behind a mutex that is only held
// to inspect or replace the slot, never across an await on the network.
// Concurrent callers that arrive while an attempt is pending all await
// the same shared future, so the gateway's `open` runs at most once per
// attempt.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use hassbridge_api::{
    AreaEntry, DeviceEntry, EntityRegistryEntry, EntityState, HistoryQuery, HubConnection,
    HubGateway, LIGHT_DOMAIN, LogbookQuery, RestClient, ServiceCatalog, Subscription, WsGateway,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::area::{self, AreaLightsOutcome, LightAction, ServiceAck};
use crate::config::BridgeConfig;
use crate::error::CoreError;
use crate::store::{StateMap, StateStore};

const AREA_REGISTRY_LIST: &str = "config/area_registry/list";
const DEVICE_REGISTRY_LIST: &str = "config/device_registry/list";
const ENTITY_REGISTRY_LIST: &str = "config/entity_registry/list";

// ── Session ──────────────────────────────────────────────────────────

/// An established connection together with its entity subscription.
pub struct Session<C: HubConnection> {
    connection: C,
    subscription: StdMutex<Option<Subscription>>,
}

impl<C: HubConnection> Session<C> {
    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn is_closed(&self) -> bool {
        self.connection.is_closed()
    }

    /// Stop the subscription and close the channel. Idempotent.
    fn shutdown(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        self.connection.close();
    }
}

impl<C: HubConnection> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

type Attempt<C> = Shared<BoxFuture<'static, Result<Arc<Session<C>>, CoreError>>>;

enum Slot<C: HubConnection> {
    Absent,
    Pending(Attempt<C>),
    Ready(Arc<Session<C>>),
}

// ── HubClient ────────────────────────────────────────────────────────

/// Bridge to one Home Assistant hub.
///
/// Cheaply cloneable; clones share the connection and the state cache.
pub struct HubClient<G: HubGateway = WsGateway> {
    inner: Arc<ClientInner<G>>,
}

struct ClientInner<G: HubGateway> {
    config: BridgeConfig,
    gateway: Arc<G>,
    store: Arc<StateStore>,
    slot: Mutex<Slot<G::Connection>>,
    rest: RestClient,
}

impl<G: HubGateway> Clone for HubClient<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl HubClient<WsGateway> {
    /// Client backed by the Home Assistant WebSocket API.
    pub fn new(config: BridgeConfig) -> Result<Self, CoreError> {
        let gateway = WsGateway::new(config.timeout);
        Self::with_gateway(config, gateway)
    }
}

impl<G: HubGateway> HubClient<G> {
    /// Client backed by an arbitrary gateway. Nothing connects until the
    /// first operation that needs the hub.
    pub fn with_gateway(config: BridgeConfig, gateway: G) -> Result<Self, CoreError> {
        config.validate()?;
        let rest = RestClient::new(config.credentials()?, &config.transport())?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                gateway: Arc::new(gateway),
                store: Arc::new(StateStore::new()),
                slot: Mutex::new(Slot::Absent),
                rest,
            }),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &StateStore {
        &self.inner.store
    }

    /// Notified after every cache update.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.store.subscribe()
    }

    /// `true` while a live connection is held.
    pub async fn is_connected(&self) -> bool {
        matches!(&*self.inner.slot.lock().await, Slot::Ready(session) if !session.is_closed())
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Return the live session, establishing one if needed.
    ///
    /// Callers arriving while an attempt is in flight share it. A settled
    /// failure is never handed to a later caller, so the next call starts
    /// over. A connection that has gone away is replaced.
    pub async fn ensure_connected(&self) -> Result<Arc<Session<G::Connection>>, CoreError> {
        let attempt = {
            let mut slot = self.inner.slot.lock().await;
            settle(&mut slot);
            if let Slot::Ready(session) = &*slot {
                if !session.is_closed() {
                    return Ok(Arc::clone(session));
                }
                warn!("hub connection lost, reconnecting");
                session.shutdown();
            }
            if let Slot::Pending(attempt) = &*slot {
                attempt.clone()
            } else {
                let attempt = self.start_attempt();
                *slot = Slot::Pending(attempt.clone());
                attempt
            }
        };

        let outcome = attempt.clone().await;

        let mut slot = self.inner.slot.lock().await;
        if matches!(&*slot, Slot::Pending(current) if current.ptr_eq(&attempt)) {
            *slot = match &outcome {
                Ok(session) => Slot::Ready(Arc::clone(session)),
                Err(_) => Slot::Absent,
            };
        }
        let committed = matches!(
            (&*slot, &outcome),
            (Slot::Ready(current), Ok(session)) if Arc::ptr_eq(current, session)
        );

        match outcome {
            Ok(session) if !committed => {
                // The slot moved on (disconnect) while this attempt ran
                debug!("discarding superseded hub connection");
                session.shutdown();
                if matches!(&*slot, Slot::Absent) {
                    self.inner.store.clear();
                }
                Err(CoreError::ConnectionFailed {
                    reason: "disconnected while connecting".into(),
                })
            }
            other => other,
        }
    }

    fn start_attempt(&self) -> Attempt<G::Connection> {
        let gateway = Arc::clone(&self.inner.gateway);
        let store = Arc::clone(&self.inner.store);
        let config = self.inner.config.clone();

        async move {
            match establish(&*gateway, &store, &config).await {
                Ok(session) => Ok(Arc::new(session)),
                Err(e) => {
                    warn!(error = %e, "hub connection attempt failed");
                    Err(e)
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Drop the connection and clear the cache.
    pub async fn disconnect(&self) {
        let previous = std::mem::replace(&mut *self.inner.slot.lock().await, Slot::Absent);
        if let Slot::Ready(session) = previous {
            session.shutdown();
        }
        self.inner.store.clear();
        info!("disconnected from hub");
    }

    // ── Entity state (cache reads) ───────────────────────────────────

    /// Latest cached record for `entity_id`, connecting first if needed.
    ///
    /// `Ok(None)` means the entity has never been delivered.
    pub async fn get_state(&self, entity_id: &str) -> Result<Option<Arc<EntityState>>, CoreError> {
        self.ensure_connected().await?;
        Ok(self.inner.store.get(entity_id))
    }

    /// The full cached mapping, connecting first if needed.
    pub async fn list_states(&self) -> Result<Arc<StateMap>, CoreError> {
        self.ensure_connected().await?;
        Ok(self.inner.store.snapshot())
    }

    /// Cache read with no connection attempt.
    pub fn cached_state(&self, entity_id: &str) -> Option<Arc<EntityState>> {
        self.inner.store.get(entity_id)
    }

    // ── Registries ───────────────────────────────────────────────────

    pub async fn list_areas(&self) -> Result<Vec<AreaEntry>, CoreError> {
        self.registry(AREA_REGISTRY_LIST).await
    }

    pub async fn list_devices(&self) -> Result<Vec<DeviceEntry>, CoreError> {
        self.registry(DEVICE_REGISTRY_LIST).await
    }

    pub async fn list_entity_registry(&self) -> Result<Vec<EntityRegistryEntry>, CoreError> {
        self.registry(ENTITY_REGISTRY_LIST).await
    }

    pub async fn list_services(&self) -> Result<ServiceCatalog, CoreError> {
        let session = self.ensure_connected().await?;
        self.deadline(session.connection().get_services()).await
    }

    async fn registry<T: DeserializeOwned>(&self, kind: &'static str) -> Result<Vec<T>, CoreError> {
        let session = self.ensure_connected().await?;
        debug!(kind, "registry request");
        let value = self
            .deadline(session.connection().request(kind, Map::new()))
            .await?;
        serde_json::from_value(value).map_err(|e| CoreError::Api {
            message: format!("malformed {kind} response: {e}"),
            code: None,
            status: None,
        })
    }

    // ── Services ─────────────────────────────────────────────────────

    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        data: Map<String, Value>,
    ) -> Result<ServiceAck, CoreError> {
        let session = self.ensure_connected().await?;
        debug!(domain, service, "calling service");
        self.deadline(session.connection().call_service(domain, service, data))
            .await?;
        Ok(ServiceAck::ok())
    }

    pub async fn turn_on_light(&self, entity_id: &str) -> Result<ServiceAck, CoreError> {
        self.switch_light(entity_id, LightAction::TurnOn).await
    }

    pub async fn turn_off_light(&self, entity_id: &str) -> Result<ServiceAck, CoreError> {
        self.switch_light(entity_id, LightAction::TurnOff).await
    }

    async fn switch_light(&self, entity_id: &str, action: LightAction) -> Result<ServiceAck, CoreError> {
        let mut data = Map::new();
        data.insert("entity_id".into(), Value::String(entity_id.to_string()));
        self.call_service(LIGHT_DOMAIN, action.into(), data).await
    }

    // ── Areas ────────────────────────────────────────────────────────

    /// Turn on every light assigned to `area_id` with one service call.
    pub async fn turn_on_area_lights(
        &self,
        area_id: &str,
        brightness_pct: Option<u8>,
        transition: Option<Number>,
    ) -> Result<AreaLightsOutcome, CoreError> {
        self.switch_area_lights(area_id, LightAction::TurnOn, brightness_pct, transition)
            .await
    }

    /// Turn off every light assigned to `area_id` with one service call.
    pub async fn turn_off_area_lights(
        &self,
        area_id: &str,
        transition: Option<Number>,
    ) -> Result<AreaLightsOutcome, CoreError> {
        self.switch_area_lights(area_id, LightAction::TurnOff, None, transition)
            .await
    }

    async fn switch_area_lights(
        &self,
        area_id: &str,
        action: LightAction,
        brightness_pct: Option<u8>,
        transition: Option<Number>,
    ) -> Result<AreaLightsOutcome, CoreError> {
        let entries = self.list_entity_registry().await?;
        let targets = area::lights_in_area(&entries, area_id);
        if targets.is_empty() {
            debug!(area_id, "no lights assigned to area");
            return Ok(AreaLightsOutcome::targeted(0));
        }

        let changed = targets.len();
        let data = area::light_payload(targets, brightness_pct, transition);
        self.call_service(LIGHT_DOMAIN, action.into(), data).await?;
        info!(area_id, changed, %action, "switched area lights");
        Ok(AreaLightsOutcome::targeted(changed))
    }

    // ── History / logbook ────────────────────────────────────────────

    /// State history over a period. Independent of the WebSocket connection.
    pub async fn history(&self, query: &HistoryQuery) -> Result<Value, CoreError> {
        Ok(self.inner.rest.history(query).await?)
    }

    /// Logbook entries over a period. Independent of the WebSocket connection.
    pub async fn logbook(&self, query: &LogbookQuery) -> Result<Value, CoreError> {
        Ok(self.inner.rest.logbook(query).await?)
    }

    // ── Helpers ──────────────────────────────────────────────────────

    async fn deadline<T>(
        &self,
        call: impl Future<Output = Result<T, hassbridge_api::Error>>,
    ) -> Result<T, CoreError> {
        with_deadline(self.inner.config.timeout, call).await
    }
}

/// Fold a finished attempt into the slot: a success becomes `Ready`,
/// a failure becomes `Absent`.
fn settle<C: HubConnection>(slot: &mut Slot<C>) {
    let settled = match &*slot {
        Slot::Pending(attempt) => match attempt.peek() {
            Some(Ok(session)) => Some(Slot::Ready(Arc::clone(session))),
            Some(Err(_)) => Some(Slot::Absent),
            None => None,
        },
        _ => None,
    };
    if let Some(next) = settled {
        *slot = next;
    }
}

async fn with_deadline<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, hassbridge_api::Error>>,
) -> Result<T, CoreError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(CoreError::Timeout {
            timeout_secs: timeout.as_secs(),
        }),
    }
}

/// Open, prime, and subscribe. Nothing is published until every step succeeds.
async fn establish<G: HubGateway>(
    gateway: &G,
    store: &Arc<StateStore>,
    config: &BridgeConfig,
) -> Result<Session<G::Connection>, CoreError> {
    let credentials = config.credentials()?;
    info!(url = %credentials.base_url(), "connecting to hub");
    let connection = with_deadline(config.timeout, gateway.open(&credentials)).await?;

    match prime_and_subscribe(&connection, store, config).await {
        Ok(subscription) => {
            info!(entities = store.len(), "hub connection ready");
            Ok(Session {
                connection,
                subscription: StdMutex::new(Some(subscription)),
            })
        }
        Err(e) => {
            connection.close();
            Err(e)
        }
    }
}

async fn prime_and_subscribe<C: HubConnection>(
    connection: &C,
    store: &Arc<StateStore>,
    config: &BridgeConfig,
) -> Result<Subscription, CoreError> {
    if config.prime_states {
        let states = with_deadline(config.timeout, connection.fetch_states()).await?;
        store.replace(states);
    }
    let sink = Arc::clone(store);
    with_deadline(
        config.timeout,
        connection.subscribe_entities(Arc::new(move |delivery| sink.apply(delivery))),
    )
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hassbridge_api::{EntityCallback, Error};

    use super::*;

    struct Idle;

    impl HubConnection for Idle {
        async fn fetch_states(&self) -> Result<Vec<EntityState>, Error> {
            Ok(Vec::new())
        }

        async fn subscribe_entities(&self, _callback: EntityCallback) -> Result<Subscription, Error> {
            Ok(Subscription::new(1, || {}))
        }

        async fn call_service(
            &self,
            _domain: &str,
            _service: &str,
            _data: Map<String, Value>,
        ) -> Result<(), Error> {
            Ok(())
        }

        async fn get_services(&self) -> Result<ServiceCatalog, Error> {
            Ok(ServiceCatalog::new())
        }
    }

    fn finished(outcome: Result<Arc<Session<Idle>>, CoreError>) -> Attempt<Idle> {
        let attempt = async move { outcome }.boxed().shared();
        assert!(attempt.clone().now_or_never().is_some());
        attempt
    }

    #[test]
    fn finished_failure_is_not_replayed() {
        let mut slot = Slot::Pending(finished(Err(CoreError::ConnectionFailed {
            reason: "refused".into(),
        })));
        settle(&mut slot);
        assert!(matches!(slot, Slot::Absent));
    }

    #[test]
    fn finished_success_becomes_ready() {
        let session = Arc::new(Session {
            connection: Idle,
            subscription: StdMutex::new(None),
        });
        let mut slot = Slot::Pending(finished(Ok(Arc::clone(&session))));
        settle(&mut slot);
        assert!(matches!(slot, Slot::Ready(ref s) if Arc::ptr_eq(s, &session)));
    }

    #[test]
    fn in_flight_attempt_stays_pending() {
        let attempt: Attempt<Idle> =
            futures_util::future::pending::<Result<Arc<Session<Idle>>, CoreError>>()
                .boxed()
                .shared();
        let mut slot = Slot::Pending(attempt);
        settle(&mut slot);
        assert!(matches!(slot, Slot::Pending(_)));
    }
}
