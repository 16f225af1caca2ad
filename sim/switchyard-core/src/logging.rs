//! Wrapper functions for structured simulator events.
//!
//! Each function corresponds to one kind of event. Events go to the
//! `MESSAGE` and `NODE` targets so a subscriber can filter traffic from
//! topology changes.

use crate::{address::Address, message::Message, timeline::NodeId};
use std::time::Duration;
use tracing::{event, Level};

/// Logs a message handed to the simulated network.
/// Captures the source and destination addresses, the message id, RPC code
/// and body length, and the delay it was given.
pub fn message_event(from: &Address, to: &Address, message: &Message, delay: Duration) {
    event!(
        target: "MESSAGE",
        Level::INFO,
        from = %from,
        to = %to,
        id = message.id(),
        rpc_code = %message.rpc_code(),
        kind = ?message.kind(),
        body_length = message.body_len(),
        delay_us = delay.as_micros() as u64,
    );
}

/// Logs the creation of a simulated node.
pub fn node_creation_event(node: NodeId, host: &str) {
    event!(target: "NODE", Level::INFO, node, host, "node created");
}

/// Logs a node binding or releasing an address.
pub fn binding_event(node: NodeId, address: &Address, channel: &str, bound: bool) {
    event!(
        target: "NODE",
        Level::INFO,
        node,
        address = %address,
        channel,
        bound,
    );
}
