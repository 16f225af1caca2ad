//! The transport core of an RPC substrate, and a virtual network to run it
//! on.
//!
//! # Uses
//!
//! - Framing: [`MessageParser`] turns an arbitrarily chunked byte stream
//!   into whole [`Message`]s without copying the bodies it finds.
//! - Simulation: [`SimNetwork`]s attached to one [`Fabric`] exchange
//!   messages through a simulated switch with a configurable, seeded delay,
//!   so distributed protocols can be exercised deterministically in a single
//!   process.
//!
//! # Organization
//! - [`Blob`] and [`Message`] are the units of traffic
//! - [`MessageParser`] frames incoming bytes
//! - [`Switch`], [`SimNetwork`], [`ClientSession`] and [`ServerSession`]
//!   move messages between nodes
//! - [`Timeline`] orders deliveries in virtual time and consults an
//!   [`AdmissionController`] before queueing each one
//! - [`sync`] holds the pluggable lock, reader-writer lock and semaphore
//!   providers
//!
//! # Delivery structure
//!
//! A node sends through a [`ClientSession`] to a remote [`Address`]. The
//! switch table for the channel bound to the message's [`RpcCode`] resolves
//! that address to the destination [`SimNetwork`], which accepts a
//! [`ServerSession`] for the sender on first contact. The message is copied,
//! given a delay, and queued on the [`Timeline`]. When the timeline reaches
//! it, the destination's [`RpcHandler`] runs. Replies retrace the same path
//! in the other direction and are matched to their request by id.

mod logging;

pub mod blob;
pub use blob::Blob;

pub mod message;
pub use message::{Message, MessagePtr};

pub mod parser;
pub use parser::{MessageParser, ReadResult};

pub mod address;
pub use address::{Address, Channel};

pub mod rpc_code;
pub use rpc_code::{CodeBook, RpcCode};

pub mod config;
pub use config::{Config, ParserConfig, SimulatorConfig};

pub mod switch;
pub use switch::Switch;

pub mod timeline;
pub use timeline::{NodeContext, NodeId, Timeline};

pub mod admission;
pub use admission::AdmissionController;

pub mod session;
pub use session::{ClientSession, ServerSession};

pub mod network;
pub use network::{RpcHandler, SimNetwork};

mod fabric;
pub use fabric::Fabric;

pub mod sync;

/// A [`DashMap`](dashmap::DashMap) using the fast, non-cryptographic Fx hash.
pub type FxDashMap<K, V> = dashmap::DashMap<K, V, std::hash::BuildHasherDefault<rustc_hash::FxHasher>>;
