//! Traits (ports) for the gateway's external collaborators
//!
//! The gateway defines what it needs from the business tier and the service
//! registry; the infrastructure crates provide the implementations.

mod logic;
mod registry;

pub use logic::{ConnectRequest, DisconnectRequest, LogicResult, LogicService, SendRoomRequest};
pub use registry::{
    InstanceResolver, RegistryResult, ServiceEntry, ServiceRegistry, ServiceSnapshot,
    SERVER_TYPE_TCP, SERVER_TYPE_WS,
};
