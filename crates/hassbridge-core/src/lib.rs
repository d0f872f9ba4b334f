//! Connection lifecycle and entity-state layer between `hassbridge-api`
//! and the tool surface.
//!
//! - **[`HubClient`]**: lazily establishes exactly one hub connection,
//!   shared by concurrent callers, and fronts every operation: cached
//!   state reads, registry queries, service calls, area-wide light
//!   commands and the history/logbook pass-through.
//!
//! - **[`StateStore`]**: lock-free entity cache fed by the hub's entity
//!   subscription. Each delivery is applied atomically.
//!
//! - **[`area`]**: selection of the lights assigned to an area and the
//!   batched service payload.

pub mod area;
pub mod client;
pub mod config;
pub mod error;
pub mod store;

pub use area::{AreaLightsOutcome, LightAction, ServiceAck, lights_in_area};
pub use client::{HubClient, Session};
pub use config::{BridgeConfig, TlsVerification};
pub use error::CoreError;
pub use store::{StateMap, StateStore};

// Wire types that appear in this crate's public signatures.
pub use hassbridge_api::{
    AreaEntry, DeviceEntry, EntityRegistryEntry, EntityState, HistoryQuery, HubConnection,
    HubGateway, LogbookQuery, ServiceCatalog,
};
