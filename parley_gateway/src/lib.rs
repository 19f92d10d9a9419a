#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! WebSocket chat gateway and HTTP surface.
//!
//! Clients connect to `/ws/chat?userId=...` and exchange JSON [`Frame`]s.
//! [`SessionRegistry`] tracks which connections belong to which user and who
//! sits in which room; [`MessageRouter`] turns each inbound frame into
//! deliveries plus an ACK or ERROR for the sender.

pub mod frame;
pub mod http;
pub mod registry;
pub mod router;
pub mod server;
pub mod socket;

pub use frame::{Frame, FrameError, FrameType};
pub use registry::{Connection, ConnectionId, SessionRegistry};
pub use router::{HandshakeError, MessageRouter};
pub use server::{AppState, ServerConfig, build_router, serve};
