// hassbridge-api: Async Rust client for the Home Assistant WebSocket and REST APIs

pub mod auth;
pub mod error;
pub mod gateway;
pub mod models;
pub mod rest;
pub mod transport;
pub mod websocket;

pub use auth::{Credentials, normalize_base_url};
pub use error::Error;
pub use gateway::{EntityCallback, HubConnection, HubGateway, Subscription};
pub use models::{
    AreaEntry, DeviceEntry, EntityDelivery, EntityDiff, EntityPatch, EntityRegistryEntry,
    EntityState, LIGHT_DOMAIN, ServiceCatalog, entity_domain,
};
pub use rest::{HistoryQuery, LogbookQuery, RestClient};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{WsConnection, WsGateway};
