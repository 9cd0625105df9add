//! Shared dark-rendering policy model for the coordinator and its clients.
//!
//! ARCHITECTURE
//! ============
//! This crate owns everything both sides of the websocket agree on: the
//! persisted policy record, the precedence rule that turns it into an
//! effective decision, the darkness heuristic, hostname normalization, the
//! wire frames, and the per-page agent state machine. It performs no I/O;
//! stores, sockets and style injection live behind traits or in the
//! binaries that depend on it.

pub mod agent;
pub mod badge;
pub mod frame;
pub mod heuristic;
pub mod hostname;
pub mod model;
pub mod resolve;

pub use agent::{DocumentState, PageAgent, RenderState, StyleReader, Transform};
pub use badge::Badge;
pub use frame::{ClientFrame, ErrorCode, PageAction, Request, ServerFrame};
pub use heuristic::{ElementSignals, PageSignals, looks_dark};
pub use hostname::{Hostname, HostnameError, PageAddress};
pub use model::Policy;
pub use resolve::resolve;
