//! Operation codes and the channel each one travels on.

use crate::{address::Channel, FxDashMap};
use const_fnv1a_hash::fnv1a_hash_str_32;
use std::fmt::Display;

/// Identifies the remote operation a message invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RpcCode(u32);

impl RpcCode {
    /// Creates a code with the given number.
    pub const fn new(code: u32) -> Self {
        Self(code)
    }

    /// Creates a pseudorandom code by hashing the operation name.
    pub const fn from_name(name: &'static str) -> Self {
        Self(fnv1a_hash_str_32(name))
    }

    /// Gets the underlying code number.
    pub fn into_inner(self) -> u32 {
        self.0
    }
}

impl From<u32> for RpcCode {
    fn from(n: u32) -> Self {
        Self(n)
    }
}

impl From<RpcCode> for u32 {
    fn from(code: RpcCode) -> Self {
        code.0
    }
}

impl Display for RpcCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Maps operation codes to the channel their calls are carried on.
///
/// Codes that were never bound use the default channel.
#[derive(Debug, Default)]
pub struct CodeBook {
    channels: FxDashMap<RpcCode, Channel>,
    default: Channel,
}

impl CodeBook {
    /// Creates a code book whose unbound codes use `default`.
    pub fn new(default: Channel) -> Self {
        Self {
            channels: Default::default(),
            default,
        }
    }

    /// Routes calls of `code` over `channel`.
    pub fn bind(&self, code: RpcCode, channel: Channel) {
        self.channels.insert(code, channel);
    }

    /// The channel that calls of `code` are carried on.
    pub fn channel_of(&self, code: RpcCode) -> Channel {
        self.channels
            .get(&code)
            .map(|entry| *entry)
            .unwrap_or(self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PING: RpcCode = RpcCode::from_name("RPC_PING");

    #[test]
    fn names_hash_consistently() {
        assert_eq!(PING, RpcCode::from_name("RPC_PING"));
        assert_ne!(PING, RpcCode::from_name("RPC_PONG"));
    }

    #[test]
    fn unbound_codes_use_default() {
        let book = CodeBook::new(Channel::Udp);
        assert_eq!(book.channel_of(PING), Channel::Udp);
        book.bind(PING, Channel::Tcp);
        assert_eq!(book.channel_of(PING), Channel::Tcp);
        assert_eq!(book.channel_of(RpcCode::new(1)), Channel::Udp);
    }
}
