//! Request/reply rendezvous between inbound chat HTTP requests and the
//! single push channel held by the browser extension.

pub mod gateway;
pub mod manager;

pub use manager::{BridgeError, Manager, ProxyRequest, RequestFormat, Subscription};
