//! Gateway command/response correlation core for meshgate.
//!
//! This crate owns the domain model and the in-memory machinery that sits
//! between an MQTT transport and the interactive shell:
//!
//! - **[`Hub`]**: central facade. The transport hands every inbound message
//!   to [`Hub::deliver`] and publishes whatever [`Hub::next_outbound`] yields;
//!   commands call [`Hub::execute`] and block until the correlated response
//!   arrives or the configured timeout elapses.
//!
//! - **[`DeviceRegistry`]**: gateways, sinks and nodes discovered from live traffic,
//!   stored in `DashMap`-backed collections. Listings are owned snapshots and
//!   a sink can never outlive the gateway it hangs off.
//!
//! - **[`MessageQueue<T>`]**: unbounded FIFO shared between the transport and
//!   its consumers. Supports non-blocking drains and a `Notify`-driven
//!   `pop_matching` wait that leaves non-matching items in place.
//!
//! - **[`Correlator`]**: registers a pending request per [`CorrelationKey`],
//!   publishes the envelope, and waits on the response queue. Two requests
//!   under the same key are never in flight at once.
//!
//! - **Requests** ([`command`]): a typed [`Request`] sum type replaces
//!   free-form argument maps; each kind carries only the fields it needs.

pub mod command;
pub mod config;
pub mod correlator;
pub mod error;
pub mod hub;
pub mod model;
pub mod queue;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::requests::*;
pub use command::{
    CorrelationKey, Delivery, Outbound, Request, RequestEnvelope, RequestKind, SinkTarget,
};
pub use config::HubConfig;
pub use correlator::{Correlator, Outcome, PendingRequest};
pub use error::CoreError;
pub use hub::Hub;
pub use queue::{MessageQueue, TimedOut};
pub use store::DeviceRegistry;

pub use model::{
    AppConfig, DataPacket, DeviceId, Gateway, GatewayEvent, GatewayState, Inbound, Network,
    Node, Response, ResponseBody, ResultCode, ScratchpadStatus, Sink, SinkConfig,
};
